//! SQLite-backed stores, one per aggregate root.
//!
//! Stores own the SQL for their table and expose async CRUD over the
//! shared [`crate::db::Database`] handle. Row mappers are plain functions
//! kept next to the store that owns the table.

pub mod example_store;
pub mod note_store;
pub mod step_store;
pub mod task_store;
pub mod template_store;
pub mod workflow_store;

pub use example_store::ExampleStore;
pub use note_store::NoteStore;
pub use step_store::StepStore;
pub use task_store::TaskStore;
pub use template_store::TemplateStore;
pub use workflow_store::WorkflowStore;
