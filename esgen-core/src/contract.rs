//! The runtime view of a compiled service.

use esgen_schema::{
    Schema,
    ir::{self, MethodKind},
};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::event::EventSet;

/// What the runtime needs to know about one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodContract {
    pub name: String,
    pub kind: MethodKind,
    pub emits: IndexSet<String>,
}

impl MethodContract {
    #[must_use]
    pub fn may_emit(&self, event: &str) -> bool {
        self.emits.contains(event)
    }

    /// # Panics
    ///
    /// Panics if an event is not in the method's emits. Emitting an
    /// undeclared event is a programming error in the method's logic.
    pub(crate) fn check_emits<'a, E: EventSet + 'a>(
        &self,
        service: &str,
        events: impl IntoIterator<Item = &'a E>,
    ) {
        for (index, event) in events.into_iter().enumerate() {
            assert!(
                self.may_emit(event.name()),
                "{service}.{} is not allowed to emit event {} (index {index})",
                self.name,
                event.name()
            );
        }
    }
}

/// The subscriptions and method table of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceContract {
    name: String,
    events: IndexSet<String>,
    subscriptions: IndexSet<String>,
    methods: IndexMap<String, MethodContract>,
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("service `{0}` is not declared in the schema")]
    UnknownService(String),
    #[error("event set does not cover event `{event}` declared for service `{service}`")]
    UncoveredEvent { service: String, event: String },
}

impl ServiceContract {
    /// # Errors
    ///
    /// Returns [`ContractError::UnknownService`] if `service` is not declared.
    pub fn from_schema(schema: &Schema, service: &str) -> Result<Self, ContractError> {
        schema
            .service(service)
            .map(|s| Self::from_service(schema, s))
            .ok_or_else(|| ContractError::UnknownService(service.to_owned()))
    }

    #[must_use]
    pub fn from_service(schema: &Schema, service: &ir::Service) -> Self {
        let event_name = |id| schema.event_by_id(id).name.clone();
        let methods = service
            .methods
            .values()
            .map(|method| {
                let contract = MethodContract {
                    name: method.name.clone(),
                    kind: method.kind,
                    emits: method.emits.iter().copied().map(event_name).collect(),
                };
                (method.name.clone(), contract)
            })
            .collect();
        Self {
            name: service.name.clone(),
            events: schema.events().map(|e| e.name.clone()).collect(),
            subscriptions: service.subscriptions.iter().copied().map(event_name).collect(),
            methods,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Events the service's projections react to.
    #[must_use]
    pub const fn subscriptions(&self) -> &IndexSet<String> {
        &self.subscriptions
    }

    #[must_use]
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.subscriptions.contains(event)
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodContract> {
        self.methods.get(name)
    }

    pub fn methods(&self) -> impl ExactSizeIterator<Item = &MethodContract> {
        self.methods.values()
    }

    /// Checks that `E` can decode every event of the schema, so any entry
    /// in a shared log can be read.
    ///
    /// # Errors
    ///
    /// Returns the first event `E` does not cover.
    pub fn check_event_set<E: EventSet>(&self) -> Result<(), ContractError> {
        match self.events.iter().find(|event| !E::is_member(event)) {
            Some(event) => Err(ContractError::UncoveredEvent {
                service: self.name.clone(),
                event: event.clone(),
            }),
            None => Ok(()),
        }
    }
}
