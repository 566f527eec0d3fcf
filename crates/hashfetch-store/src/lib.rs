//! Content store layout and persistent retry bookkeeping.
//!
//! [`Store`] owns the on-disk layout: finished artifacts under `files/`,
//! transient work under `partial/` and `partial-extract/`. [`RetryLedger`]
//! records failed fetch attempts in `fail_history.json` and gates new
//! attempts behind an exponential backoff.

mod atomic;
mod error;
mod layout;
mod ledger;

pub use atomic::atomic_write;
pub use error::{Error, Result};
pub use layout::{ArtifactKind, Store};
pub use ledger::{
    Attempt, BackoffPolicy, Clock, FailHistory, FailRecord, ManualClock, RetryLedger, SystemClock,
};
