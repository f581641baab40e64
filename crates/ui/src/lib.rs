#![deny(unsafe_code)]

/// Desktop host for the zova composer.
///
/// The shell owns the window and notifications; [`chat::ChatView`] wires the
/// composer core to settings, the rig sender and the run list.
pub mod app;
pub mod chat;
/// Loading picked paths into attachment files.
pub mod files;
/// Settings persistence.
pub mod settings;
