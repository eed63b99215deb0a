//! Runtime protocol for event-sourced services compiled by `esgen-schema`.
//!
//! - [`context`] - Cancellation and deadlines (`Context`, `Interrupted`)
//! - [`event`] - Event sum types and their log encoding (`EventSet`)
//! - [`log`] - Append-only event log abstraction (`EventLog`)
//! - [`store`] - Projection storage with read/write transactions (`Store`)
//! - [`projection`] - Read models folded from events (`Projection`)
//! - [`contract`] - Runtime view of a compiled service (`ServiceContract`)
//! - [`service`] - Sync and method dispatch (`Service`)
//!
//! # Example
//!
//! ```ignore
//! use esgen_core::{context::Context, log, service::Service, store};
//!
//! let service = Service::from_schema(&schema, "Orders", store::inmemory::Store::<Orders>::default(), log::inmemory::Log::new())?;
//! service.sync(&Context::new()).await?;
//! ```
//!
//! Most users should depend on the `esgen` crate, which re-exports these
//! types together with the schema compiler and the `EventSet` derive.

pub mod context;
pub mod contract;
pub mod event;
pub mod log;
pub mod projection;
pub mod service;
pub mod store;
pub mod version;
