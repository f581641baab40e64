//! rig-backed message sender for the zova composer.

pub mod prompt;
pub mod provider;
pub mod rig_adapter;

pub use prompt::{AttachmentSection, build_prompt};
pub use provider::{
    DEFAULT_OPENAI_MODEL, DEFAULT_REQUEST_TIMEOUT, OPENAI_PROVIDER_ID, ProviderConfig,
    ProviderError, ProviderResult,
};
pub use rig_adapter::{RigRunSender, completed_run};
