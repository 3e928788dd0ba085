pub mod form;
pub mod run;

pub use form::{FieldCategory, FieldValue, FilledDocument, FormField, Provenance};
pub use run::{RunState, RunStatus, WorkflowKind, WorkflowRun};
