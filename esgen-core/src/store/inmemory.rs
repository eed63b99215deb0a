//! In-memory projection store for tests and examples.
//!
//! Write transactions snapshot the projection when they begin and restore
//! it unless committed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::{
    projection::Projection,
    store::{ReadTransaction, Store as StoreTrait, Transaction, WriteTransaction},
    version::Version,
};

/// Thread-safe in-memory store. Clones share the same projection.
#[derive(Debug)]
pub struct Store<P> {
    inner: Arc<RwLock<State<P>>>,
}

#[derive(Debug, Clone)]
struct State<P> {
    projection: P,
    version: Option<Version>,
}

impl<P> Clone for Store<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Projection> Store<P> {
    #[must_use]
    pub fn new(projection: P) -> Self {
        Self {
            inner: Arc::new(RwLock::new(State {
                projection,
                version: None,
            })),
        }
    }

    /// A copy of the current projection.
    pub async fn projection(&self) -> P {
        self.inner.read().await.projection.clone()
    }

    /// The recorded version.
    pub async fn version(&self) -> Option<Version> {
        self.inner.read().await.version.clone()
    }
}

impl<P: Projection + Default> Default for Store<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

pub struct Reader<P> {
    guard: OwnedRwLockReadGuard<State<P>>,
}

pub struct Writer<P> {
    guard: OwnedRwLockWriteGuard<State<P>>,
    snapshot: Option<State<P>>,
}

impl<P: Projection> Transaction for Reader<P> {
    type Error = P::Error;
    type Projection = P;

    fn projection(&self) -> &P {
        &self.guard.projection
    }

    fn projection_version(&self) -> Result<Option<Version>, P::Error> {
        Ok(self.guard.version.clone())
    }
}

impl<P: Projection> ReadTransaction for Reader<P> {
    fn complete(self) {}
}

impl<P: Projection> Transaction for Writer<P> {
    type Error = P::Error;
    type Projection = P;

    fn projection(&self) -> &P {
        &self.guard.projection
    }

    fn projection_version(&self) -> Result<Option<Version>, P::Error> {
        Ok(self.guard.version.clone())
    }
}

impl<P: Projection> WriteTransaction for Writer<P> {
    type Event = P::Event;

    fn update_projection_version(&mut self, version: Version) -> Result<(), P::Error> {
        self.guard.version = Some(version);
        Ok(())
    }

    fn apply(
        &mut self,
        version: &Version,
        timestamp: DateTime<Utc>,
        event: &P::Event,
    ) -> Result<(), P::Error> {
        tracing::trace!(%version, "applying event");
        self.guard.projection.apply(version, timestamp, event)
    }

    fn commit(mut self) {
        self.snapshot = None;
        tracing::trace!(version = ?self.guard.version, "committed write transaction");
    }

    fn rollback(self) {}
}

impl<P> Drop for Writer<P> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
            tracing::debug!("rolled back write transaction");
        }
    }
}

impl<P: Projection> StoreTrait for Store<P> {
    type Error = P::Error;
    type Event = P::Event;
    type Projection = P;
    type Reader = Reader<P>;
    type Writer = Writer<P>;

    fn read(&self) -> impl Future<Output = Result<Reader<P>, P::Error>> + Send + '_ {
        let inner = Arc::clone(&self.inner);
        async move {
            Ok(Reader {
                guard: inner.read_owned().await,
            })
        }
    }

    fn write(&self) -> impl Future<Output = Result<Writer<P>, P::Error>> + Send + '_ {
        let inner = Arc::clone(&self.inner);
        async move {
            let guard = inner.write_owned().await;
            let snapshot = Some((*guard).clone());
            Ok(Writer { guard, snapshot })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;
    use crate::event::tests::Ticket;

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    struct Titles(Vec<String>);

    impl Projection for Titles {
        type Error = Infallible;
        type Event = Ticket;

        fn apply(&mut self, _: &Version, _: DateTime<Utc>, event: &Ticket) -> Result<(), Infallible> {
            if let Ticket::Opened { title } = event {
                self.0.push(title.clone());
            }
            Ok(())
        }
    }

    fn opened(title: &str) -> Ticket {
        Ticket::Opened {
            title: title.into(),
        }
    }

    #[tokio::test]
    async fn commit_keeps_changes() {
        let store = Store::<Titles>::default();
        let mut tx = store.write().await.unwrap();
        tx.apply(&Version::from(1), Utc::now(), &opened("a")).unwrap();
        tx.update_projection_version(Version::from(1)).unwrap();
        tx.commit();

        assert_eq!(store.projection().await, Titles(vec!["a".into()]));
        assert_eq!(store.version().await, Some(Version::from(1)));
    }

    #[tokio::test]
    async fn rollback_and_drop_restore_the_snapshot() {
        let store = Store::<Titles>::default();
        let mut tx = store.write().await.unwrap();
        tx.apply(&Version::from(1), Utc::now(), &opened("a")).unwrap();
        tx.update_projection_version(Version::from(1)).unwrap();
        tx.rollback();
        assert_eq!(store.projection().await, Titles::default());
        assert_eq!(store.version().await, None);

        {
            let mut tx = store.write().await.unwrap();
            tx.apply(&Version::from(1), Utc::now(), &opened("b")).unwrap();
        }
        assert_eq!(store.projection().await, Titles::default());
    }

    #[tokio::test]
    async fn readers_see_committed_state() {
        let store = Store::new(Titles(vec!["seed".into()]));
        let reader = store.read().await.unwrap();
        assert_eq!(reader.projection().0, ["seed"]);
        assert_eq!(reader.projection_version().unwrap(), None);
        reader.complete();
    }
}
