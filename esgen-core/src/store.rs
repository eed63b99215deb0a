//! Projection storage abstraction.
//!
//! A store holds one projection together with the log version it reflects.
//! It hands out shared read transactions and an exclusive write transaction;
//! a write transaction is either committed or rolled back as a whole.

use chrono::{DateTime, Utc};

use crate::{event::EventSet, version::Version};

pub mod inmemory;

/// Operations available in both read and write transactions.
pub trait Transaction: Send + Sync {
    type Projection;
    type Error;

    fn projection(&self) -> &Self::Projection;

    /// The recorded version, or `None` if the projection was never synced.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    fn projection_version(&self) -> Result<Option<Version>, Self::Error>;
}

pub trait ReadTransaction: Transaction {
    /// Ends the transaction.
    fn complete(self);
}

/// Exclusive access to the projection. Dropping a writer without calling
/// [`commit`](Self::commit) rolls it back.
pub trait WriteTransaction: Transaction {
    type Event;

    /// # Errors
    ///
    /// Returns the store's error.
    fn update_projection_version(&mut self, version: Version) -> Result<(), Self::Error>;

    /// Folds `event` into the projection.
    ///
    /// # Errors
    ///
    /// Returns the projection's error.
    fn apply(
        &mut self,
        version: &Version,
        timestamp: DateTime<Utc>,
        event: &Self::Event,
    ) -> Result<(), Self::Error>;

    fn commit(self);

    fn rollback(self);
}

pub trait Store: Send + Sync {
    type Projection: Send + Sync;
    type Event: EventSet;
    type Error: std::error::Error + Send + Sync + 'static;
    type Reader: ReadTransaction<Projection = Self::Projection, Error = Self::Error>;
    type Writer: WriteTransaction<
            Projection = Self::Projection,
            Event = Self::Event,
            Error = Self::Error,
        >;

    /// Begins a shared read transaction.
    fn read(&self) -> impl Future<Output = Result<Self::Reader, Self::Error>> + Send + '_;

    /// Begins the exclusive write transaction, waiting for readers and any
    /// other writer to finish.
    fn write(&self) -> impl Future<Output = Result<Self::Writer, Self::Error>> + Send + '_;
}
