#![doc = include_str!("../README.md")]

pub use esgen_core::{
    context,
    context::{Context, Interrupted},
    contract,
    contract::{ContractError, MethodContract, ServiceContract},
    event,
    event::{DecodeError, EventSet},
    projection,
    projection::Projection,
    service,
    service::{Emitted, MethodError, Service, SyncError},
    version,
    version::Version,
};
#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub use esgen_core::test;
// Re-export the derive so consumers only depend on `esgen`.
#[cfg(feature = "macros")]
pub use esgen_macros::EventSet;
pub use esgen_schema::{
    CompileError, CompileResult, Compiler, MethodKind, Schema, SchemaPath, SemanticErrorKind,
    SourceTree, SyntaxErrorKind, TypeRef, compile,
};

pub mod schema {
    pub use esgen_schema::{error, ident, ir, model, path, source};
}

pub mod log {

    pub use esgen_core::log::{
        Appended, ConditionalAppend, Entry, EventLog, ScanError, TryAppendError,
    };

    pub use esgen_core::log::inmemory;
}

pub mod store {

    pub use esgen_core::store::{ReadTransaction, Store, Transaction, WriteTransaction};

    pub use esgen_core::store::inmemory;
}

// Used by `#[derive(EventSet)]`.
#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
