//! Shared application state for the axum server.

use std::sync::Arc;

use sopforge_core::db::Database;
use sopforge_core::llm::LlmClient;
use sopforge_core::store::{
    ExampleStore, NoteStore, StepStore, TaskStore, TemplateStore, WorkflowStore,
};
use sopforge_core::upload::FileStorage;

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub db: Database,
    pub workflow_store: WorkflowStore,
    pub task_store: TaskStore,
    pub step_store: StepStore,
    pub example_store: ExampleStore,
    pub note_store: NoteStore,
    pub template_store: TemplateStore,
    pub files: FileStorage,
    pub llm: LlmClient,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database, files: FileStorage, llm: LlmClient) -> Self {
        Self {
            workflow_store: WorkflowStore::new(db.clone()),
            task_store: TaskStore::new(db.clone()),
            step_store: StepStore::new(db.clone()),
            example_store: ExampleStore::new(db.clone()),
            note_store: NoteStore::new(db.clone()),
            template_store: TemplateStore::new(db.clone()),
            db,
            files,
            llm,
        }
    }
}
