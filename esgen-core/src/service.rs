//! Service runtime: projection synchronization and method dispatch.
//!
//! A [`Service`] couples a projection [`Store`] with an [`EventLog`] under
//! the rules of a [`ServiceContract`]:
//!
//! - [`sync`](Service::sync) folds new log entries into the projection
//!   under the exclusive write transaction.
//! - [`readonly`](Service::readonly) methods read the projection and never
//!   touch the log.
//! - [`append`](Service::append) methods append whatever they emit, without
//!   a consistency check.
//! - [`transaction`](Service::transaction) methods append only if the log
//!   has not moved since the projection was read, resyncing and rerunning
//!   the method otherwise.

use std::marker::PhantomData;

use esgen_schema::{MethodKind, Schema};
use nonempty::NonEmpty;
use thiserror::Error;

use crate::{
    context::{Context, Interrupted},
    contract::{ContractError, MethodContract, ServiceContract},
    event::{DecodeError, EventSet, decode_event, encode_events},
    log::{Appended, ConditionalAppend, Entry, EventLog, ScanError, TryAppendError},
    store::{ReadTransaction, Store, Transaction, WriteTransaction},
    version::Version,
};

/// Error synchronizing a projection with the log.
#[derive(Debug, Error)]
pub enum SyncError<LogError, StoreError> {
    #[error(transparent)]
    Interrupted(Interrupted),
    #[error("failed to read the event log: {0}")]
    Log(#[source] LogError),
    #[error("failed to update the projection: {0}")]
    Store(#[source] StoreError),
    #[error("failed to decode event at offset {offset}: {source}")]
    Decode {
        offset: Version,
        #[source]
        source: DecodeError,
    },
}

impl<LogError, StoreError> SyncError<LogError, StoreError> {
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// Error running a service method.
#[derive(Debug, Error)]
pub enum MethodError<LogicError, LogError, StoreError> {
    #[error("method rejected the call: {0}")]
    Logic(LogicError),
    #[error(transparent)]
    Interrupted(Interrupted),
    #[error("failed to synchronize the projection: {0}")]
    Sync(#[source] SyncError<LogError, StoreError>),
    #[error("failed to append to the event log: {0}")]
    Log(#[source] LogError),
    #[error("projection store error: {0}")]
    Store(#[source] StoreError),
    #[error("failed to encode events: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("method `{0}` is not declared by the service")]
    UnknownMethod(String),
    #[error("method `{method}` is declared `{declared}` but was called as `{called}`")]
    KindMismatch {
        method: String,
        declared: MethodKind,
        called: MethodKind,
    },
    #[error("event log finished a conditional append without running the method")]
    NothingProduced,
}

impl<LogicError, LogError, StoreError> MethodError<LogicError, LogError, StoreError> {
    /// Whether the call stopped because its context was canceled or timed out.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Interrupted(_) | Self::Sync(SyncError::Interrupted(_))
        )
    }
}

pub type SyncResult<L, S> =
    Result<Version, SyncError<<L as EventLog>::Error, <S as Store>::Error>>;

pub type MethodResult<T, LE, L, S> =
    Result<T, MethodError<LE, <L as EventLog>::Error, <S as Store>::Error>>;

/// What an emitting method produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Emitted<O, E> {
    pub output: O,
    pub events: Vec<E>,
    /// `None` when the method emitted nothing and the log was left alone.
    pub appended: Option<Appended>,
}

/// Runtime for one service of a schema.
pub struct Service<L, S> {
    contract: ServiceContract,
    log: L,
    store: S,
}

impl<L, S> Service<L, S>
where
    L: EventLog,
    S: Store,
{
    /// # Errors
    ///
    /// Returns [`ContractError::UncoveredEvent`] if the store's event set
    /// cannot decode every event of the schema.
    pub fn new(contract: ServiceContract, store: S, log: L) -> Result<Self, ContractError> {
        contract.check_event_set::<S::Event>()?;
        Ok(Self {
            contract,
            log,
            store,
        })
    }

    /// Builds the contract for `service` from `schema`.
    ///
    /// # Errors
    ///
    /// See [`ServiceContract::from_schema`] and [`Service::new`].
    pub fn from_schema(
        schema: &Schema,
        service: &str,
        store: S,
        log: L,
    ) -> Result<Self, ContractError> {
        Self::new(ServiceContract::from_schema(schema, service)?, store, log)
    }

    pub const fn contract(&self) -> &ServiceContract {
        &self.contract
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn log(&self) -> &L {
        &self.log
    }

    /// Version the projection reflects, or the beginning of the log if it
    /// was never synced.
    ///
    /// # Errors
    ///
    /// Fails if the store or the log fails.
    pub async fn projection_version(&self, ctx: &Context) -> SyncResult<L, S> {
        let tx = ctx
            .run(self.store.read())
            .await
            .map_err(SyncError::Interrupted)?
            .map_err(SyncError::Store)?;
        let recorded = tx.projection_version().map_err(SyncError::Store);
        tx.complete();
        self.version_or_begin(ctx, recorded?).await
    }

    async fn version_or_begin(&self, ctx: &Context, recorded: Option<Version>) -> SyncResult<L, S> {
        match recorded {
            Some(version) => Ok(version),
            None => self.log.begin(ctx).await.map_err(SyncError::Log),
        }
    }

    /// Brings the projection up to the tip of the log and returns the
    /// version reached. Syncing an up-to-date projection changes nothing.
    ///
    /// # Errors
    ///
    /// See [`Service::sync_with`].
    pub async fn sync(&self, ctx: &Context) -> SyncResult<L, S> {
        self.sync_with(ctx, |_| false).await
    }

    /// Like [`sync`](Self::sync), committing partial progress when the
    /// error is an interruption or `is_acceptable` holds for it. Any other
    /// error rolls the projection back.
    ///
    /// # Errors
    ///
    /// Fails if the context is interrupted, the log or the store fails, or
    /// a log entry cannot be decoded.
    #[tracing::instrument(skip_all, fields(service = %self.contract.name()))]
    pub async fn sync_with<F>(&self, ctx: &Context, is_acceptable: F) -> SyncResult<L, S>
    where
        F: Fn(&SyncError<L::Error, S::Error>) -> bool,
    {
        let mut tx = ctx
            .run(self.store.write())
            .await
            .map_err(SyncError::Interrupted)?
            .map_err(SyncError::Store)?;
        let result = self.sync_in(ctx, &mut tx).await;
        match &result {
            Ok(_) => tx.commit(),
            Err(error) if error.is_interrupted() || is_acceptable(error) => {
                tracing::debug!(%error, "keeping partial sync");
                tx.commit();
            }
            Err(error) => {
                tracing::warn!(%error, "sync failed, rolling back");
                tx.rollback();
            }
        }
        result
    }

    /// Applies every entry after the recorded version within `tx`.
    async fn sync_in(&self, ctx: &Context, tx: &mut S::Writer) -> SyncResult<L, S> {
        let recorded = tx.projection_version().map_err(SyncError::Store)?;
        let from = self.version_or_begin(ctx, recorded).await?;

        let contract = &self.contract;
        let mut reached = from.clone();
        let mut applied = 0_usize;
        let scanned = self
            .log
            .scan(ctx, &from, 0, |entry: Entry<'_>| {
                let event: S::Event =
                    decode_event(entry.payload).map_err(|source| SyncError::Decode {
                        offset: entry.offset.clone(),
                        source,
                    })?;
                if contract.subscribes_to(event.name()) {
                    tx.apply(entry.next, entry.timestamp, &event)
                        .map_err(SyncError::Store)?;
                    applied += 1;
                }
                tx.update_projection_version(entry.next.clone())
                    .map_err(SyncError::Store)?;
                reached = entry.next.clone();
                Ok(())
            })
            .await;

        match scanned {
            Ok(()) => {}
            Err(ScanError::Log(error)) if self.log.is_offset_out_of_bound(&error) => {}
            Err(ScanError::Log(error)) => return Err(SyncError::Log(error)),
            Err(ScanError::Callback(error)) => return Err(error),
            Err(ScanError::Interrupted(reason)) => return Err(SyncError::Interrupted(reason)),
        }
        tracing::debug!(%from, %reached, applied, "projection synced");
        Ok(reached)
    }

    fn method<LE>(
        &self,
        name: &str,
        called: MethodKind,
    ) -> MethodResult<&MethodContract, LE, L, S> {
        let method = self
            .contract
            .method(name)
            .ok_or_else(|| MethodError::UnknownMethod(name.to_owned()))?;
        if method.kind != called {
            return Err(MethodError::KindMismatch {
                method: name.to_owned(),
                declared: method.kind,
                called,
            });
        }
        Ok(method)
    }

    /// Runs a readonly method against the current projection.
    ///
    /// # Errors
    ///
    /// Fails if the method is not declared `readonly`, the context is
    /// interrupted while waiting for the store, or `logic` fails.
    #[tracing::instrument(skip_all, fields(service = %self.contract.name(), method = name))]
    pub async fn readonly<O, LE, F>(
        &self,
        ctx: &Context,
        name: &str,
        logic: F,
    ) -> MethodResult<O, LE, L, S>
    where
        F: FnOnce(&Context, &S::Projection) -> Result<O, LE>,
    {
        self.method::<LE>(name, MethodKind::Readonly)?;
        self.run_readonly(ctx, logic).await
    }

    async fn run_readonly<O, LE, F>(&self, ctx: &Context, logic: F) -> MethodResult<O, LE, L, S>
    where
        F: FnOnce(&Context, &S::Projection) -> Result<O, LE>,
    {
        let tx = ctx
            .run(self.store.read())
            .await
            .map_err(MethodError::Interrupted)?
            .map_err(MethodError::Store)?;
        let result = logic(ctx, tx.projection()).map_err(MethodError::Logic);
        tx.complete();
        result
    }

    /// Runs an append method: its events are appended unconditionally.
    ///
    /// # Errors
    ///
    /// Fails if the method is not declared `append`, the context is
    /// interrupted, `logic` fails, or encoding or appending fails.
    ///
    /// # Panics
    ///
    /// Panics if `logic` emits an event outside the method's emits.
    #[tracing::instrument(skip_all, fields(service = %self.contract.name(), method = name))]
    pub async fn append<O, LE, F>(
        &self,
        ctx: &Context,
        name: &str,
        logic: F,
    ) -> MethodResult<Emitted<O, S::Event>, LE, L, S>
    where
        F: FnOnce(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE>,
    {
        let method = self.method::<LE>(name, MethodKind::Append)?;
        self.run_append(ctx, method, logic).await
    }

    async fn run_append<O, LE, F>(
        &self,
        ctx: &Context,
        method: &MethodContract,
        logic: F,
    ) -> MethodResult<Emitted<O, S::Event>, LE, L, S>
    where
        F: FnOnce(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE>,
    {
        let (output, events) = self.run_readonly(ctx, logic).await?;
        method.check_emits(self.contract.name(), &events);
        ctx.check().map_err(MethodError::Interrupted)?;

        let Some(batch) = NonEmpty::from_vec(events) else {
            tracing::debug!("nothing emitted");
            return Ok(Emitted {
                output,
                events: Vec::new(),
                appended: None,
            });
        };
        let payload = encode_events(&batch).map_err(MethodError::Encode)?;
        let appended = self
            .log
            .append_json(ctx, payload)
            .await
            .map_err(MethodError::Log)?;
        tracing::debug!(version = %appended.version, events = batch.len(), "appended");
        Ok(Emitted {
            output,
            events: batch.into(),
            appended: Some(appended),
        })
    }

    /// Runs a transaction method under optimistic concurrency.
    ///
    /// `logic` may run several times: whenever the log advanced between
    /// reading the projection and appending, the projection is resynced and
    /// `logic` runs again on the fresh state. Retries stop only on success,
    /// on a failure, or when `ctx` is interrupted.
    ///
    /// The write transaction commits on success or interruption and rolls
    /// back on any other error.
    ///
    /// # Errors
    ///
    /// Fails if the method is not declared `transaction`, the context is
    /// interrupted, `logic` fails, or the log or store fails.
    ///
    /// # Panics
    ///
    /// Panics if `logic` emits an event outside the method's emits.
    #[tracing::instrument(skip_all, fields(service = %self.contract.name(), method = name))]
    pub async fn transaction<O, LE, F>(
        &self,
        ctx: &Context,
        name: &str,
        logic: F,
    ) -> MethodResult<Emitted<O, S::Event>, LE, L, S>
    where
        F: FnMut(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE> + Send,
        O: Send,
        LE: Send,
    {
        let method = self.method::<LE>(name, MethodKind::Transaction)?;
        self.run_transaction(ctx, method, logic).await
    }

    async fn run_transaction<O, LE, F>(
        &self,
        ctx: &Context,
        method: &MethodContract,
        logic: F,
    ) -> MethodResult<Emitted<O, S::Event>, LE, L, S>
    where
        F: FnMut(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE> + Send,
        O: Send,
        LE: Send,
    {
        let mut tx = ctx
            .run(self.store.write())
            .await
            .map_err(MethodError::Interrupted)?
            .map_err(MethodError::Store)?;
        let result = self.transact(ctx, method, &mut tx, logic).await;
        match &result {
            Ok(_) => tx.commit(),
            Err(error) if error.is_interrupted() => {
                tracing::debug!("transaction interrupted, keeping synced state");
                tx.commit();
            }
            Err(_) => {
                tracing::warn!("transaction failed, rolling back");
                tx.rollback();
            }
        }
        result
    }

    async fn transact<O, LE, F>(
        &self,
        ctx: &Context,
        method: &MethodContract,
        tx: &mut S::Writer,
        logic: F,
    ) -> MethodResult<Emitted<O, S::Event>, LE, L, S>
    where
        F: FnMut(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE> + Send,
        O: Send,
        LE: Send,
    {
        let recorded = tx.projection_version().map_err(MethodError::Store)?;
        let assumed = self
            .version_or_begin(ctx, recorded)
            .await
            .map_err(MethodError::Sync)?;

        let mut attempt = Attempt {
            service: self,
            ctx,
            method,
            tx,
            logic,
            produced: None,
            attempts: 0,
            _error: PhantomData,
        };
        let appended = match self.log.try_append_json(ctx, assumed, &mut attempt).await {
            Ok(appended) => appended,
            Err(TryAppendError::Attempt(error)) => return Err(error),
            Err(TryAppendError::Log(error)) => return Err(MethodError::Log(error)),
            Err(TryAppendError::Interrupted(reason)) => return Err(MethodError::Interrupted(reason)),
        };

        let attempts = attempt.attempts;
        let (output, events) = attempt.produced.ok_or(MethodError::NothingProduced)?;
        if let Some(appended) = &appended {
            tracing::debug!(version = %appended.version, attempts, "committed transaction");
        }
        Ok(Emitted {
            output,
            events,
            appended,
        })
    }

    /// Dispatches on the method's declared kind. Readonly methods must
    /// return no events.
    ///
    /// # Errors
    ///
    /// Fails if the method is not declared, and otherwise as the entry
    /// point for its kind.
    ///
    /// # Panics
    ///
    /// Panics if `logic` emits an event outside the method's emits.
    #[tracing::instrument(skip_all, fields(service = %self.contract.name(), method = name))]
    pub async fn call<O, LE, F>(
        &self,
        ctx: &Context,
        name: &str,
        logic: F,
    ) -> MethodResult<Emitted<O, S::Event>, LE, L, S>
    where
        F: FnMut(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE> + Send,
        O: Send,
        LE: Send,
    {
        let method = self
            .contract
            .method(name)
            .ok_or_else(|| MethodError::UnknownMethod(name.to_owned()))?;
        match method.kind {
            MethodKind::Readonly => {
                let (output, events) = self.run_readonly(ctx, logic).await?;
                method.check_emits(self.contract.name(), &events);
                Ok(Emitted {
                    output,
                    events,
                    appended: None,
                })
            }
            MethodKind::Append => self.run_append(ctx, method, logic).await,
            MethodKind::Transaction => self.run_transaction(ctx, method, logic).await,
        }
    }
}

/// One run of a transaction method's logic per conditional append attempt.
struct Attempt<'a, L, S: Store, F, O, LE> {
    service: &'a Service<L, S>,
    ctx: &'a Context,
    method: &'a MethodContract,
    tx: &'a mut S::Writer,
    logic: F,
    produced: Option<(O, Vec<S::Event>)>,
    attempts: usize,
    _error: PhantomData<fn() -> LE>,
}

impl<L, S, F, O, LE> ConditionalAppend for Attempt<'_, L, S, F, O, LE>
where
    L: EventLog,
    S: Store,
    F: FnMut(&Context, &S::Projection) -> Result<(O, Vec<S::Event>), LE> + Send,
    O: Send,
    LE: Send,
{
    type Error = MethodError<LE, L::Error, S::Error>;

    fn produce(&mut self) -> Result<Option<Vec<u8>>, Self::Error> {
        self.attempts += 1;
        let (output, events) =
            (self.logic)(self.ctx, self.tx.projection()).map_err(MethodError::Logic)?;
        self.method
            .check_emits(self.service.contract.name(), &events);
        let (payload, events) = match NonEmpty::from_vec(events) {
            Some(batch) => (
                Some(encode_events(&batch).map_err(MethodError::Encode)?),
                batch.into(),
            ),
            None => (None, Vec::new()),
        };
        self.produced = Some((output, events));
        Ok(payload)
    }

    fn resync(&mut self) -> impl Future<Output = Result<Version, Self::Error>> + Send {
        async move {
            self.service
                .sync_in(self.ctx, self.tx)
                .await
                .map_err(MethodError::Sync)
        }
    }
}
