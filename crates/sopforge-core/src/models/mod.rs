pub mod example;
pub mod note;
pub mod step;
pub mod task;
pub mod workflow;

pub use example::{Example, ExampleContentType, ExampleLabel};
pub use note::{NoteAuthor, NoteContentType, StepNote};
pub use step::{ContextType, LogicStrategy, RoutingBranch, StepStatus, WorkflowStep};
pub use task::{Task, TaskStatus};
pub use workflow::{Workflow, WorkflowStatus, WorkflowSummary};
