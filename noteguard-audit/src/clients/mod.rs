//! External service clients
//!
//! Every outbound API the pipeline touches lives here, each behind a trait
//! so the pipeline and its tests can run against in-memory doubles.

pub mod board;
pub mod judgment;
pub mod retry;
pub mod telephony;

pub use board::{BoardApi, BoardClient, BoardGroup, FetchOutcome, RawItem};
pub use judgment::{JudgmentApi, JudgmentClient, JudgmentRequest, NoteAnalysisEntry};
pub use retry::{RetryPolicy, RetryingClient};
pub use telephony::{PhoneLine, TelephonyApi, TelephonyClient};
