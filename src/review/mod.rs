// src/review/mod.rs

//! Human review gate.
//!
//! A `human_review` step does not compute anything: the executor opens a
//! [`ReviewRequest`] on the [`ReviewGate`] and suspends until a reviewer's
//! decision is submitted from outside.

pub mod gate;
pub mod notify;
pub mod request;

pub use gate::{ReviewGate, ReviewTimeoutWarning};
pub use notify::{LogNotifier, ReviewNotifier};
pub use request::{ReviewId, ReviewRequest, ReviewStatus, ReviewSubmission};
