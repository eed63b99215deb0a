//! Schema compiler for event-sourced services.
//!
//! A schema declares **events**, **projections** (finite-state views folded
//! from events) and **services** (methods backed by projections). The
//! compiler checks naming rules and internal consistency, resolves every
//! referenced data type against Rust source trees, and produces a [`Schema`]
//! IR that parameterizes the runtime.
//!
//! ```ignore
//! let schema = esgen_schema::compile(&yaml, ["src/domain"])?;
//! for service in schema.services() {
//!     println!("{} subscribes to {} events", service.name, service.subscriptions.len());
//! }
//! ```

pub mod compile;
pub mod error;
pub mod ident;
pub mod ir;
pub mod model;
pub mod path;
pub mod source;

pub use compile::{Compiler, compile};
pub use error::{CompileError, CompileResult, SemanticErrorKind, SyntaxErrorKind};
pub use ident::TypeRef;
pub use ir::{MethodKind, Schema};
pub use path::SchemaPath;
pub use source::SourceTree;
