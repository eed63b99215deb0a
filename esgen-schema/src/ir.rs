//! Intermediate representation of a validated schema.
//!
//! Nodes live in insertion-ordered arenas owned by [`Schema`] and refer to
//! each other through index ids. Back references (who uses an event or a
//! type) are kept in a separate reverse index so nodes stay acyclic.

use std::{fmt, str::FromStr};

use indexmap::{IndexMap, IndexSet};

use crate::{
    ident::TypeRef,
    source::{DeclarationKind, SourceLocation},
};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position in declaration order.
            #[must_use]
            pub const fn index(self) -> usize {
                self.0
            }
        }
    };
}

arena_id!(
    /// Identifies an [`Event`] within its [`Schema`].
    EventId
);
arena_id!(
    /// Identifies a [`Projection`] within its [`Schema`].
    ProjectionId
);
arena_id!(
    /// Identifies a [`Service`] within its [`Schema`].
    ServiceId
);
arena_id!(
    /// Identifies a resolved [`Type`] within its [`Schema`].
    TypeId
);

/// A compiled schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub(crate) raw: String,
    pub(crate) events: IndexMap<String, Event>,
    pub(crate) projections: IndexMap<String, Projection>,
    pub(crate) services: IndexMap<String, Service>,
    pub(crate) types: IndexMap<TypeRef, Type>,
    pub(crate) references: References,
}

impl Schema {
    /// The schema text this IR was compiled from.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn events(&self) -> impl ExactSizeIterator<Item = &Event> {
        self.events.values()
    }

    #[must_use]
    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.get(name)
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by another schema.
    #[must_use]
    pub fn event_by_id(&self, id: EventId) -> &Event {
        &self.events[id.0]
    }

    pub fn projections(&self) -> impl ExactSizeIterator<Item = &Projection> {
        self.projections.values()
    }

    #[must_use]
    pub fn projection(&self, name: &str) -> Option<&Projection> {
        self.projections.get(name)
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by another schema.
    #[must_use]
    pub fn projection_by_id(&self, id: ProjectionId) -> &Projection {
        &self.projections[id.0]
    }

    pub fn services(&self) -> impl ExactSizeIterator<Item = &Service> {
        self.services.values()
    }

    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by another schema.
    #[must_use]
    pub fn service_by_id(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    pub fn types(&self) -> impl ExactSizeIterator<Item = &Type> {
        self.types.values()
    }

    #[must_use]
    pub fn type_by_ref(&self, reference: &TypeRef) -> Option<&Type> {
        self.types.get(reference)
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by another schema.
    #[must_use]
    pub fn type_by_id(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }

    /// Everything that names the event.
    #[must_use]
    pub fn event_referrers(&self, id: EventId) -> &[Referrer] {
        self.references.events.get(id.0).map_or(&[], Vec::as_slice)
    }

    /// Everything that names the type.
    #[must_use]
    pub fn type_referrers(&self, id: TypeId) -> &[Referrer] {
        self.references.types.get(id.0).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub properties: IndexMap<String, Property>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub ty: TypeId,
    pub doc: Vec<String>,
}

/// An externally declared data type, resolved against the source roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub id: TypeId,
    pub reference: TypeRef,
    pub kind: DeclarationKind,
    pub location: SourceLocation,
    pub doc: Vec<String>,
}

/// A finite-state view folded from events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub id: ProjectionId,
    pub name: String,
    /// Declared states. The first one is the initial state.
    pub states: IndexSet<String>,
    pub properties: IndexMap<String, Property>,
    pub create_on: EventId,
    pub transitions: IndexMap<EventId, Vec<Transition>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: String,
    pub to: String,
}

impl Projection {
    /// # Panics
    ///
    /// Never for a compiled projection: the compiler rejects empty state
    /// lists.
    #[must_use]
    pub fn initial_state(&self) -> &str {
        self.states
            .first()
            .expect("compiled projections declare at least one state")
    }

    #[must_use]
    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains(state)
    }

    #[must_use]
    pub fn transitions_on(&self, event: EventId) -> &[Transition] {
        self.transitions.get(&event).map_or(&[], Vec::as_slice)
    }

    /// The state reached from `from` when `event` is applied, if the event
    /// triggers a transition out of `from`.
    #[must_use]
    pub fn next_state(&self, event: EventId, from: &str) -> Option<&str> {
        self.transitions_on(event)
            .iter()
            .find(|t| t.from == from)
            .map(|t| t.to.as_str())
    }

    /// Events that trigger at least one transition.
    pub fn triggers(&self) -> impl Iterator<Item = EventId> + '_ {
        self.transitions.keys().copied()
    }

    /// The createOn event followed by every trigger.
    pub fn subscriptions(&self) -> impl Iterator<Item = EventId> + '_ {
        std::iter::once(self.create_on).chain(self.triggers())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub projections: Vec<ProjectionId>,
    pub methods: IndexMap<String, Method>,
    /// Union of the subscriptions of every projection, in first-seen order.
    pub subscriptions: IndexSet<EventId>,
}

impl Service {
    #[must_use]
    pub fn subscribes_to(&self, event: EventId) -> bool {
        self.subscriptions.contains(&event)
    }

    #[must_use]
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub kind: MethodKind,
    pub input: Option<TypeId>,
    pub output: Option<TypeId>,
    pub emits: Vec<EventId>,
}

impl Method {
    #[must_use]
    pub fn may_emit(&self, event: EventId) -> bool {
        self.emits.contains(&event)
    }
}

/// Concurrency discipline of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Reads the projection, never touches the log.
    Readonly,
    /// Appends unconditionally, no consistency guarantee.
    Append,
    /// Appends only if the log has not advanced since the projection was
    /// read, resynchronizing and retrying otherwise.
    Transaction,
}

impl MethodKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Append => "append",
            Self::Transaction => "transaction",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string is not a method type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown method type {0:?}")]
pub struct UnknownMethodKind(pub String);

impl FromStr for MethodKind {
    type Err = UnknownMethodKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readonly" => Ok(Self::Readonly),
            "append" => Ok(Self::Append),
            "transaction" => Ok(Self::Transaction),
            other => Err(UnknownMethodKind(other.to_owned())),
        }
    }
}

/// A node that names an event or a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Referrer {
    EventProperty { event: EventId, property: String },
    ProjectionProperty { projection: ProjectionId, property: String },
    CreateOn(ProjectionId),
    Transition { projection: ProjectionId, index: usize },
    Emit { service: ServiceId, method: String },
    MethodInput { service: ServiceId, method: String },
    MethodOutput { service: ServiceId, method: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct References {
    events: Vec<Vec<Referrer>>,
    types: Vec<Vec<Referrer>>,
}

impl References {
    pub(crate) fn refer_event(&mut self, id: EventId, referrer: Referrer) {
        push_at(&mut self.events, id.0, referrer);
    }

    pub(crate) fn refer_type(&mut self, id: TypeId, referrer: Referrer) {
        push_at(&mut self.types, id.0, referrer);
    }

    pub(crate) fn is_event_referenced(&self, id: EventId) -> bool {
        self.events.get(id.0).is_some_and(|r| !r.is_empty())
    }
}

fn push_at(slots: &mut Vec<Vec<Referrer>>, index: usize, referrer: Referrer) {
    if slots.len() <= index {
        slots.resize_with(index + 1, Vec::new);
    }
    slots[index].push(referrer);
}
