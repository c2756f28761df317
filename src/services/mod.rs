//! External collaborators
//!
//! HTTP clients for the Question/Analysis service and the artifact upload
//! endpoints, both behind traits so the orchestrator can be driven against
//! mocks.

mod questions;
mod uploads;

pub use questions::{FollowupDecision, FollowupRequest, HttpQuestionService, QuestionService};
pub use uploads::{ArtifactSink, HttpArtifactSink};
