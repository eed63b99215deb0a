//! Read models folded from events.

use chrono::{DateTime, Utc};

use crate::{event::EventSet, version::Version};

/// State built by applying events in log order.
///
/// Implementations hold whatever the service's methods need to read. The
/// in-memory store clones the projection when a write transaction starts so
/// it can roll back, so keep it cheap to clone or wrap large state in `Arc`.
///
/// ```ignore
/// impl Projection for Orders {
///     type Event = OrderEvent;
///     type Error = Infallible;
///
///     fn apply(&mut self, _: &Version, at: DateTime<Utc>, event: &OrderEvent) -> Result<(), Infallible> {
///         match event {
///             OrderEvent::Created(e) => self.open.insert(e.id.clone(), at),
///             OrderEvent::Shipped(e) => self.open.remove(&e.id),
///         };
///         Ok(())
///     }
/// }
/// ```
pub trait Projection: Clone + Send + Sync + 'static {
    type Event: EventSet;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Applies one event. `version` is the log version once the event is
    /// applied.
    ///
    /// # Errors
    ///
    /// Aborts synchronization; the write transaction rolls back.
    fn apply(
        &mut self,
        version: &Version,
        timestamp: DateTime<Utc>,
        event: &Self::Event,
    ) -> Result<(), Self::Error>;
}
