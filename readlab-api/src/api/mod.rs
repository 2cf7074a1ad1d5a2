//! HTTP API handlers for readlab-api

pub mod error;
pub mod health;
pub mod passages;
pub mod randomize;
pub mod session;
pub mod submit;
pub mod telemetry;
pub mod vocab;

pub use error::ApiError;
pub use health::health_check;
pub use passages::{get_passage, get_questions, posttask_data};
pub use randomize::randomize;
pub use session::{log_participation_end, session_start, submit_demographics, submit_final_check};
pub use submit::{posttask_feedback, submit_mcq};
pub use telemetry::{log_attention, log_rc_event};
pub use vocab::{vocab_answer, vocab_next, vocab_start};
