//! Append-only event log abstraction.
//!
//! The runtime only needs five things from a log: its first version, an
//! ordered scan, an unconditional append, a conditional append that drives
//! retries through [`ConditionalAppend`], and a way to recognize "scanned
//! past the tip" errors. [`inmemory::Log`] implements it for tests and
//! examples.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    context::{Context, Interrupted},
    version::Version,
};

pub mod inmemory;

/// A scanned log entry.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    pub offset: &'a Version,
    /// Version of the log once this entry is applied.
    pub next: &'a Version,
    pub timestamp: DateTime<Utc>,
    /// One encoded event envelope.
    pub payload: &'a [u8],
}

/// Result of a successful append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    /// Offset of the first appended entry.
    pub offset: Version,
    /// Version of the log after the append.
    pub version: Version,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ScanError<LogError, CallbackError> {
    #[error("event log error: {0}")]
    Log(#[source] LogError),
    #[error(transparent)]
    Callback(CallbackError),
    #[error(transparent)]
    Interrupted(Interrupted),
}

#[derive(Debug, Error)]
pub enum TryAppendError<LogError, AttemptError> {
    #[error("event log error: {0}")]
    Log(#[source] LogError),
    #[error(transparent)]
    Attempt(AttemptError),
    #[error(transparent)]
    Interrupted(Interrupted),
}

/// Caller side of a conditional append.
///
/// The log calls [`produce`](Self::produce) to obtain the payload, appends
/// it if the log still sits at the assumed version, and otherwise calls
/// [`resync`](Self::resync) to learn the new version before trying again.
pub trait ConditionalAppend: Send {
    type Error: Send;

    /// Returns the payload to append, or `None` when there is nothing to
    /// append and the attempt is complete.
    ///
    /// # Errors
    ///
    /// Aborts the append.
    fn produce(&mut self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Catches up with the log and returns the version to assume next.
    fn resync(&mut self) -> impl Future<Output = Result<Version, Self::Error>> + Send;
}

/// An append-only event log.
pub trait EventLog: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Version of an empty log, where every scan starts.
    fn begin<'a>(
        &'a self,
        ctx: &'a Context,
    ) -> impl Future<Output = Result<Version, Self::Error>> + Send + 'a;

    /// Feeds entries at and after `from` to `on_event`, in order. `limit == 0`
    /// means no limit.
    ///
    /// Scanning from the tip fails with an error for which
    /// [`is_offset_out_of_bound`](Self::is_offset_out_of_bound) holds.
    fn scan<'a, F, CE>(
        &'a self,
        ctx: &'a Context,
        from: &'a Version,
        limit: usize,
        on_event: F,
    ) -> impl Future<Output = Result<(), ScanError<Self::Error, CE>>> + Send + 'a
    where
        F: FnMut(Entry<'_>) -> Result<(), CE> + Send + 'a,
        CE: Send + 'a;

    /// Appends `payload` (a JSON array of event envelopes) unconditionally.
    fn append_json<'a>(
        &'a self,
        ctx: &'a Context,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Appended, Self::Error>> + Send + 'a;

    /// Appends what `attempt` produces, provided the log is still at
    /// `assumed`. On conflict the attempt is resynced and produced again,
    /// until it succeeds, fails or `ctx` is interrupted.
    ///
    /// Implementations call [`ConditionalAppend::produce`] at least once
    /// before returning `Ok`. Returns `None` if the attempt produced nothing
    /// to append.
    fn try_append_json<'a, A>(
        &'a self,
        ctx: &'a Context,
        assumed: Version,
        attempt: &'a mut A,
    ) -> impl Future<Output = Result<Option<Appended>, TryAppendError<Self::Error, A::Error>>> + Send + 'a
    where
        A: ConditionalAppend + 'a;

    fn is_offset_out_of_bound(&self, error: &Self::Error) -> bool;
}
