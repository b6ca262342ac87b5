//! Modal editors layered over the builder.

mod buffer;
pub mod component_editor;
pub mod creator;
pub mod file_picker;
pub mod input;
pub mod name_dialog;
pub mod tag_editor;

pub use component_editor::{ComponentEditor, EditorEvent};
pub use creator::{ComponentCreator, CreatorOutcome};
pub use name_dialog::{DialogOutcome, NameAction, NameDialog};
pub use tag_editor::{TagEditor, TagEvent};
