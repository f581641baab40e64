use zova_composer::RunLike;

/// Emitted once for every submit the send collaborator completed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCreated {
    pub run: RunLike,
}

/// Emitted when a submit was refused locally because there is no session.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitBlocked {
    pub run: RunLike,
}
