//! Sopforge core domain — SOP workflow authoring backend.
//!
//! Transport-agnostic building blocks shared by the HTTP server and the CLI:
//! - SQLite persistence (workflows, tasks, steps, examples, branches, notes)
//! - the workflow lifecycle status flow engine
//! - the Protocol JSON projector consumed by downstream automation engines
//! - the LLM-backed data-contract drafting service
//! - local file storage for uploaded media

pub mod analysis;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod protocol;
pub mod status;
pub mod store;
pub mod upload;

pub use db::Database;
pub use error::ServerError;
