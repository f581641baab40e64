use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use zova_composer::{ConversationId, SessionToken};
use zova_llm::{DEFAULT_OPENAI_MODEL, DEFAULT_REQUEST_TIMEOUT, OPENAI_PROVIDER_ID, ProviderConfig};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const SETTINGS_DIRECTORY_NAME: &str = "zova";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "ZOVA_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerSettings {
    #[serde(default = "default_provider_id")]
    pub provider_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub max_tokens: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub preamble: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            provider_id: default_provider_id(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            model_name: default_model_name(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout_secs(),
            preamble: String::new(),
            conversation_id: None,
        }
    }
}

impl ComposerSettings {
    /// The API key doubles as the session credential: without one, submits are blocked.
    pub fn session_token(&self) -> Option<SessionToken> {
        SessionToken::new(self.api_key.as_str())
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id.clone().map(ConversationId::new)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn to_provider_config(&self) -> Option<ProviderConfig> {
        if self.api_key.trim().is_empty() {
            return None;
        }

        let mut config = ProviderConfig::new(
            &self.provider_id,
            &self.api_key,
            &self.endpoint,
            &self.model_name,
        )
        .with_preamble(self.preamble.as_str())
        .with_request_timeout(self.request_timeout());
        if let Some(max_tokens) = self.max_tokens {
            config = config.with_max_tokens(max_tokens);
        }
        Some(config)
    }

    /// Fills a missing key, model or endpoint from the conventional `OPENAI_*` variables.
    pub fn with_openai_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if self.api_key.trim().is_empty()
            && let Some(api_key) = lookup("OPENAI_API_KEY")
        {
            self.api_key = api_key;
            if let Some(model_name) = lookup("OPENAI_MODEL") {
                self.model_name = model_name;
            }
            if let Some(endpoint) = lookup("OPENAI_BASE_URL") {
                self.endpoint = endpoint;
            }
        }

        self
    }

    pub fn normalized(mut self) -> Self {
        self.provider_id = non_blank_or(self.provider_id, default_provider_id);
        self.api_key = self.api_key.trim().to_string();
        self.endpoint = non_blank_or(self.endpoint, default_endpoint);
        self.model_name = non_blank_or(self.model_name, default_model_name);
        self.preamble = self.preamble.trim().to_string();
        self.conversation_id = self
            .conversation_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
        self.max_tokens = self.max_tokens.filter(|tokens| *tokens > 0);
        self
    }
}

/// Process-level overrides layered over the settings file.
struct Environment {
    prefixed: bool,
    lookup: fn(&str) -> Option<String>,
}

impl Environment {
    fn process() -> Self {
        Self {
            prefixed: true,
            lookup: |name| std::env::var(name).ok(),
        }
    }

    #[cfg(test)]
    fn empty() -> Self {
        Self {
            prefixed: false,
            lookup: |_| None,
        }
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ComposerSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".zova"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        Self::with_environment(config_path, Environment::process())
    }

    fn with_environment(config_path: PathBuf, environment: Environment) -> Self {
        let settings = Self::load_from_disk(&config_path, &environment);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ComposerSettings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: ComposerSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path, environment: &Environment) -> ComposerSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        // Later layers win: defaults, then the JSON file, then `ZOVA_*` variables.
        let mut figment =
            Figment::from(Serialized::defaults(ComposerSettings::default())).merge(Json::file(path));
        if environment.prefixed {
            figment = figment.merge(Env::prefixed(ENV_PREFIX));
        }

        let settings = match figment.extract::<ComposerSettings>() {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ComposerSettings::default()
            }
        };

        settings
            .with_openai_fallback(environment.lookup)
            .normalized()
    }

    fn persist(&self, settings: &ComposerSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

fn non_blank_or(value: String, fallback: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_string()
    }
}

fn default_provider_id() -> String {
    OPENAI_PROVIDER_ID.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model_name() -> String {
    DEFAULT_OPENAI_MODEL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}
