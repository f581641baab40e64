pub mod composer_view;
/// Event contracts between the composer and the conversation pane.
pub mod events;
pub mod run_list;
pub mod view;

pub use composer_view::{ComposerView, ComposerViewDeps};
pub use events::{RunCreated, SubmitBlocked};
pub use run_list::RunList;
pub use view::ChatView;
