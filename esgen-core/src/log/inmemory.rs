//! In-memory event log for tests and examples.
//!
//! Versions are decimal entry offsets: an empty log is at `"0"`, and a log
//! holding three entries is at `"3"`.
//!
//! ```
//! use esgen_core::log::inmemory;
//!
//! let log = inmemory::Log::new();
//! assert!(log.is_empty());
//! ```

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use nonempty::NonEmpty;

use crate::{
    context::Context,
    event::{DecodeError, EventSet, decode_event},
    log::{Appended, ConditionalAppend, Entry, EventLog, ScanError, TryAppendError},
    version::Version,
};

/// Thread-safe in-memory log. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct Log {
    records: Arc<RwLock<Vec<Record>>>,
}

#[derive(Debug, Clone)]
struct Record {
    timestamp: DateTime<Utc>,
    payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("offset {offset} is out of bound, log ends at {tip}")]
    OffsetOutOfBound { offset: u64, tip: u64 },
    #[error("malformed version {0:?}")]
    MalformedVersion(String),
    #[error("malformed append payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
    #[error("append payload holds no events")]
    EmptyAppend,
}

impl Log {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().expect("in-memory log lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version after the last entry.
    #[must_use]
    pub fn tip(&self) -> Version {
        Version::from(self.len() as u64)
    }

    /// Decodes every entry, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the first entry that doesn't decode as `E`.
    pub fn events<E: EventSet>(&self) -> Result<Vec<E>, DecodeError> {
        self.records
            .read()
            .expect("in-memory log lock poisoned")
            .iter()
            .map(|record| decode_event(&record.payload))
            .collect()
    }

    /// Appends `records` if the log holds exactly `expected` entries, or
    /// unconditionally when `expected` is `None`.
    fn push_if(&self, expected: Option<u64>, records: NonEmpty<Vec<u8>>) -> Option<Appended> {
        let mut log = self.records.write().expect("in-memory log lock poisoned");
        let offset = log.len() as u64;
        if expected.is_some_and(|expected| expected != offset) {
            return None;
        }
        let timestamp = Utc::now();
        let count = records.len() as u64;
        log.extend(records.into_iter().map(|payload| Record { timestamp, payload }));
        Some(Appended {
            offset: Version::from(offset),
            version: Version::from(offset + count),
            timestamp,
        })
    }
}

fn parse_version(version: &Version) -> Result<u64, InMemoryError> {
    version
        .as_str()
        .parse()
        .map_err(|_| InMemoryError::MalformedVersion(version.to_string()))
}

/// Splits an append payload into one record per envelope.
fn split_payload(payload: &[u8]) -> Result<NonEmpty<Vec<u8>>, InMemoryError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(InMemoryError::MalformedPayload)?;
    match value {
        serde_json::Value::Array(envelopes) => {
            let records = envelopes
                .iter()
                .map(serde_json::to_vec)
                .collect::<Result<Vec<_>, _>>()
                .map_err(InMemoryError::MalformedPayload)?;
            NonEmpty::from_vec(records).ok_or(InMemoryError::EmptyAppend)
        }
        _ => Ok(NonEmpty::new(payload.to_vec())),
    }
}

impl EventLog for Log {
    type Error = InMemoryError;

    fn begin<'a>(
        &'a self,
        _ctx: &'a Context,
    ) -> impl Future<Output = Result<Version, Self::Error>> + Send + 'a {
        std::future::ready(Ok(Version::from(0)))
    }

    #[tracing::instrument(skip_all, fields(from = %from, limit = limit))]
    fn scan<'a, F, CE>(
        &'a self,
        ctx: &'a Context,
        from: &'a Version,
        limit: usize,
        mut on_event: F,
    ) -> impl Future<Output = Result<(), ScanError<Self::Error, CE>>> + Send + 'a
    where
        F: FnMut(Entry<'_>) -> Result<(), CE> + Send + 'a,
        CE: Send + 'a,
    {
        let result = (|| {
            let start = parse_version(from).map_err(ScanError::Log)?;
            let records = {
                let log = self.records.read().expect("in-memory log lock poisoned");
                let tip = log.len() as u64;
                if start >= tip {
                    return Err(ScanError::Log(InMemoryError::OffsetOutOfBound {
                        offset: start,
                        tip,
                    }));
                }
                let rest = &log[start as usize..];
                let take = if limit == 0 { rest.len() } else { limit.min(rest.len()) };
                rest[..take].to_vec()
            };

            for (offset, record) in (start..).zip(&records) {
                ctx.check().map_err(ScanError::Interrupted)?;
                let (offset, next) = (Version::from(offset), Version::from(offset + 1));
                on_event(Entry {
                    offset: &offset,
                    next: &next,
                    timestamp: record.timestamp,
                    payload: &record.payload,
                })
                .map_err(ScanError::Callback)?;
            }
            tracing::trace!(scanned = records.len(), "scanned in-memory log");
            Ok(())
        })();
        std::future::ready(result)
    }

    // atomic: `ctx` is not consulted
    #[tracing::instrument(skip_all, fields(bytes = payload.len()))]
    fn append_json<'a>(
        &'a self,
        _ctx: &'a Context,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<Appended, Self::Error>> + Send + 'a {
        let result = (|| {
            let records = split_payload(&payload)?;
            let appended = self
                .push_if(None, records)
                .expect("unconditional append always succeeds");
            tracing::debug!(version = %appended.version, "appended to in-memory log");
            Ok(appended)
        })();
        std::future::ready(result)
    }

    fn try_append_json<'a, A>(
        &'a self,
        ctx: &'a Context,
        assumed: Version,
        attempt: &'a mut A,
    ) -> impl Future<Output = Result<Option<Appended>, TryAppendError<Self::Error, A::Error>>> + Send + 'a
    where
        A: ConditionalAppend + 'a,
    {
        async move {
            let mut assumed = assumed;
            loop {
                ctx.check().map_err(TryAppendError::Interrupted)?;
                let Some(payload) = attempt.produce().map_err(TryAppendError::Attempt)? else {
                    return Ok(None);
                };
                let records = split_payload(&payload).map_err(TryAppendError::Log)?;
                let expected = parse_version(&assumed).map_err(TryAppendError::Log)?;
                if let Some(appended) = self.push_if(Some(expected), records) {
                    tracing::debug!(version = %appended.version, "conditionally appended to in-memory log");
                    return Ok(Some(appended));
                }
                tracing::debug!(%assumed, tip = %self.tip(), "log advanced, resyncing");
                assumed = attempt.resync().await.map_err(TryAppendError::Attempt)?;
            }
        }
    }

    fn is_offset_out_of_bound(&self, error: &Self::Error) -> bool {
        matches!(error, InMemoryError::OffsetOutOfBound { .. })
    }
}
