use zova_composer::{AttachmentFile, AttachmentKind, SendRequest};

/// Textual attachments longer than this are listed instead of inlined.
pub const MAX_INLINE_BYTES: usize = 256 * 1024;

/// How one attachment is represented in the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSection<'a> {
    Inline {
        name: &'a str,
        kind: AttachmentKind,
        content: &'a str,
    },
    Listed {
        name: &'a str,
        kind: AttachmentKind,
        media_type: &'a str,
        size: u64,
    },
}

impl<'a> AttachmentSection<'a> {
    pub fn for_file(file: &'a AttachmentFile) -> Self {
        let kind = file.kind();
        let inlined = kind
            .is_textual()
            .then(|| file.bytes())
            .filter(|bytes| !bytes.is_empty() && bytes.len() <= MAX_INLINE_BYTES)
            .and_then(|bytes| std::str::from_utf8(bytes).ok());

        match inlined {
            Some(content) => Self::Inline {
                name: file.name(),
                kind,
                content,
            },
            None => Self::Listed {
                name: file.name(),
                kind,
                media_type: file.media_type(),
                size: file.size(),
            },
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Self::Inline {
                name,
                kind,
                content,
            } => {
                out.push_str(&format!("<file name=\"{name}\" kind=\"{}\">\n", kind.label()));
                out.push_str(content.trim_end());
                out.push_str("\n</file>\n");
            }
            Self::Listed {
                name,
                kind,
                media_type,
                size,
            } => {
                out.push_str(&format!(
                    "<file name=\"{name}\" kind=\"{}\" media_type=\"{media_type}\" bytes=\"{size}\" />\n",
                    kind.label()
                ));
            }
        }
    }
}

/// Renders the user text followed by one section per attachment, in staging order.
pub fn build_prompt(request: &SendRequest) -> String {
    let mut prompt = request.user_input.clone();
    if !request.has_attachments() {
        return prompt;
    }

    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str("Attached files:\n");
    for file in &request.files {
        AttachmentSection::for_file(file).render(&mut prompt);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(user_input: &str, files: Vec<AttachmentFile>) -> SendRequest {
        SendRequest {
            conversation_id: None,
            user_input: user_input.to_string(),
            files,
            file_previews: None,
        }
    }

    #[test]
    fn text_only_prompt_is_the_input() {
        assert_eq!(
            build_prompt(&request("Summarize Q3 revenue", Vec::new())),
            "Summarize Q3 revenue"
        );
    }

    #[test]
    fn textual_files_are_inlined_and_others_listed() {
        let files = vec![
            AttachmentFile::new("q3.csv", "text/csv", b"region,revenue\nemea,12\n".to_vec()),
            AttachmentFile::new("chart.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]),
        ];

        assert_eq!(
            build_prompt(&request("Compare these", files)),
            "Compare these\n\nAttached files:\n\
             <file name=\"q3.csv\" kind=\"CSV\">\nregion,revenue\nemea,12\n</file>\n\
             <file name=\"chart.png\" kind=\"Image\" media_type=\"image/png\" bytes=\"4\" />\n"
        );
    }

    #[test]
    fn invalid_utf8_text_is_listed() {
        let file = AttachmentFile::new("notes.txt", "text/plain", vec![0xff, 0xfe, 0x00]);

        assert!(matches!(
            AttachmentSection::for_file(&file),
            AttachmentSection::Listed { size: 3, .. }
        ));
    }

    #[test]
    fn attachments_without_text_skip_the_blank_line() {
        let files = vec![AttachmentFile::declared("deck.pdf", "application/pdf", 2048)];

        assert_eq!(
            build_prompt(&request("", files)),
            "Attached files:\n\
             <file name=\"deck.pdf\" kind=\"PDF\" media_type=\"application/pdf\" bytes=\"2048\" />\n"
        );
    }
}
