//! Compilation errors.
//!
//! Every error names the dotted [`SchemaPath`] of the offending node and is
//! classified as either syntactic (the document is malformed or breaks a
//! naming rule) or semantic (it is well-formed but inconsistent).

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::{
    ident::{IdentError, TypeRefError},
    ir::MethodKind,
    path::SchemaPath,
    source::SourceError,
};

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error in {path}: {kind}")]
    Syntax {
        path: SchemaPath,
        #[source]
        kind: SyntaxErrorKind,
    },
    #[error("semantic error in {path}: {kind}")]
    Semantic {
        path: SchemaPath,
        #[source]
        kind: SemanticErrorKind,
    },
    #[error("failed to read schema file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CompileError {
    pub(crate) const fn syntax(path: SchemaPath, kind: SyntaxErrorKind) -> Self {
        Self::Syntax { path, kind }
    }

    pub(crate) const fn semantic(path: SchemaPath, kind: SemanticErrorKind) -> Self {
        Self::Semantic { path, kind }
    }

    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    #[must_use]
    pub const fn is_semantic(&self) -> bool {
        matches!(self, Self::Semantic { .. })
    }

    /// Location of the offending node, if the error concerns the document.
    #[must_use]
    pub const fn path(&self) -> Option<&SchemaPath> {
        match self {
            Self::Syntax { path, .. } | Self::Semantic { path, .. } => Some(path),
            Self::Read { .. } => None,
        }
    }

    #[must_use]
    pub const fn semantic_kind(&self) -> Option<&SemanticErrorKind> {
        match self {
            Self::Semantic { kind, .. } => Some(kind),
            _ => None,
        }
    }

    #[must_use]
    pub const fn syntax_kind(&self) -> Option<&SyntaxErrorKind> {
        match self {
            Self::Syntax { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

/// What kind of declaration a rejected name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Event,
    Projection,
    State,
    Property,
    Service,
    Method,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Event => "event",
            Self::Projection => "projection",
            Self::State => "state",
            Self::Property => "property",
            Self::Service => "service",
            Self::Method => "method",
        })
    }
}

#[derive(Debug, Error)]
pub enum SyntaxErrorKind {
    #[error("malformed schema document: {0}")]
    MalformedDocument(#[source] serde_yaml::Error),
    #[error("invalid {kind} name {name:?}: {source}")]
    InvalidName {
        kind: NameKind,
        name: String,
        #[source]
        source: IdentError,
    },
    #[error("invalid type reference {reference:?}: {source}")]
    InvalidTypeReference {
        reference: String,
        #[source]
        source: TypeRefError,
    },
    #[error("malformed transition {expression:?}, expected `FROM -> TO`")]
    MalformedTransition { expression: String },
    #[error("illegal method type {0:?}, expected one of `readonly`, `append`, `transaction`")]
    IllegalMethodType(String),
}

/// Role a state plays in a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRole {
    Source,
    Target,
}

impl fmt::Display for StateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Target => "target",
        })
    }
}

#[derive(Debug, Error)]
pub enum SemanticErrorKind {
    #[error("missing event declarations")]
    MissingEvents,
    #[error("missing service declarations")]
    MissingServices,
    #[error("missing method declarations")]
    MissingMethods,
    #[error("missing state declarations")]
    MissingStates,
    #[error("duplicate state {0:?}")]
    DuplicateState(String),
    #[error("undefined event {0:?}")]
    UndefinedEvent(String),
    #[error("undefined projection {0:?}")]
    UndefinedProjection(String),
    #[error("duplicate projection {0:?}")]
    DuplicateProjection(String),
    #[error("undefined {role} state {state:?}")]
    UndefinedState { role: StateRole, state: String },
    #[error("duplicate transition ({from} -> {to})")]
    DuplicateTransition { from: String, to: String },
    #[error("event {event} is used for both {create_on} and {transition}")]
    CreateOnTransition {
        event: String,
        create_on: SchemaPath,
        transition: SchemaPath,
    },
    #[error("duplicate event {0:?}")]
    DuplicateEmit(String),
    #[error("method type `{0}` requires emits not to be empty")]
    EmitsRequired(MethodKind),
    #[error("method type `readonly` can't emit events")]
    ReadonlyEmits,
    #[error("unused event {0}")]
    UnusedEvent(String),
    #[error("types ({}) undefined in source", .0.join(", "))]
    UndefinedTypes(Vec<String>),
    #[error("types ({}) declared more than once in source", .0.join(", "))]
    AmbiguousTypes(Vec<String>),
    #[error("failed to load source: {0}")]
    Source(#[source] SourceError),
}
