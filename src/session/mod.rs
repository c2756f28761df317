//! Interview session orchestration
//!
//! Question sequencing and the turn state machine:
//! - Question shaping: ordering, introduction-first, deterministic
//!   augmentation, adaptive follow-up insertion
//! - `SessionOrchestrator` driving prompt → record → upload → follow-up
//!   per turn, with a `SessionHandle` for manual advance and early end

mod config;
mod orchestrator;
mod question;
mod status;

pub use config::{derive_interview_id, email_localpart, SessionConfig};
pub use orchestrator::{SessionCommand, SessionHandle, SessionOrchestrator};
pub use question::{
    augment_questions, from_question_map, order_questions, Question, DEFAULT_INTRO_MARKERS,
    SUPPLEMENTARY_SUFFIX,
};
pub use status::{InterviewOutcome, Phase, SessionStatus};
