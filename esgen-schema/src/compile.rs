//! Compilation of a schema document into a [`Schema`].
//!
//! Phases run in a fixed order: events, projections, services, the unused
//! event check and finally type resolution against the source roots. Each
//! phase stops at its first error; unresolved types are reported together.

mod events;
mod projections;
mod resolve;
mod services;

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::{IndexMap, IndexSet};

use crate::{
    error::{CompileError, CompileResult, NameKind, SemanticErrorKind, SyntaxErrorKind},
    ident::{self, IdentError, TypeRef},
    ir::{Event, EventId, Projection, Property, References, Referrer, Service, TypeId},
    ir::Schema,
    model::{PropertiesModel, SchemaDocument},
    path::SchemaPath,
    source::SourceTree,
};

/// Compiles `raw` and resolves its types against `source_roots`.
///
/// # Errors
///
/// Returns the first syntax or semantic error found.
pub fn compile<P: AsRef<Path>>(
    raw: &str,
    source_roots: impl IntoIterator<Item = P>,
) -> CompileResult<Schema> {
    source_roots
        .into_iter()
        .fold(Compiler::new(), |compiler, root| {
            compiler.source_root(root.as_ref())
        })
        .compile_str(raw)
}

/// Configures and runs schema compilation.
///
/// ```ignore
/// let schema = Compiler::new()
///     .source_root("src/domain")
///     .compile_file("service.yaml")?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    roots: Vec<PathBuf>,
    sources: SourceTree,
}

impl Compiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of Rust sources that declares referenced types.
    #[must_use]
    pub fn source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Adds already loaded declarations, e.g. built with
    /// [`SourceTree::add_source`].
    #[must_use]
    pub fn sources(mut self, tree: SourceTree) -> Self {
        self.sources.extend(tree);
        self
    }

    /// # Errors
    ///
    /// Fails with [`CompileError::Read`] if the file cannot be read, and
    /// otherwise as [`Compiler::compile_str`].
    pub fn compile_file(&self, path: impl AsRef<Path>) -> CompileResult<Schema> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CompileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_str(&raw)
    }

    /// # Errors
    ///
    /// Returns the first syntax or semantic error found.
    pub fn compile_str(&self, raw: &str) -> CompileResult<Schema> {
        let document = SchemaDocument::from_yaml(raw).map_err(|e| {
            CompileError::syntax(SchemaPath::root(), SyntaxErrorKind::MalformedDocument(e))
        })?;
        self.compile_document(raw.to_owned(), document)
    }

    /// Compiles an already decoded document. `raw` is kept on the IR.
    ///
    /// # Errors
    ///
    /// Returns the first syntax or semantic error found.
    #[tracing::instrument(skip_all)]
    pub fn compile_document(&self, raw: String, document: SchemaDocument) -> CompileResult<Schema> {
        let mut cx = CompileContext::default();
        cx.compile_events(document.events.unwrap_or_default())?;
        cx.compile_projections(document.projections.unwrap_or_default())?;
        cx.compile_services(document.services.unwrap_or_default())?;
        cx.check_unused_events()?;
        tracing::debug!(
            events = cx.events.len(),
            projections = cx.projections.len(),
            services = cx.services.len(),
            types = cx.types.len(),
            "schema validated"
        );

        let mut sources = self.sources.clone();
        for root in &self.roots {
            sources
                .load_root(root)
                .map_err(|e| CompileError::semantic(SchemaPath::root(), SemanticErrorKind::Source(e)))?;
        }
        cx.resolve(raw, &sources)
    }
}

/// Registries and arenas filled while walking the document.
#[derive(Debug, Default)]
pub(crate) struct CompileContext {
    events: IndexMap<String, Event>,
    projections: IndexMap<String, Projection>,
    services: IndexMap<String, Service>,
    types: IndexSet<TypeRef>,
    references: References,
}

impl CompileContext {
    fn event_id(&self, name: &str) -> Option<EventId> {
        self.events.get_index_of(name).map(EventId)
    }

    /// Parses and registers a type reference. Repeated references share
    /// one id.
    fn register_type(
        &mut self,
        path: &SchemaPath,
        raw: &str,
        referrer: Referrer,
    ) -> CompileResult<TypeId> {
        let reference = TypeRef::parse(raw).map_err(|source| {
            CompileError::syntax(
                path.clone(),
                SyntaxErrorKind::InvalidTypeReference {
                    reference: raw.to_owned(),
                    source,
                },
            )
        })?;
        let (index, inserted) = self.types.insert_full(reference);
        if inserted {
            tracing::trace!(reference = raw, "registered type");
        }
        let id = TypeId(index);
        self.references.refer_type(id, referrer);
        Ok(id)
    }

    /// Validates names and registers the types of a property block.
    fn compile_properties(
        &mut self,
        path: &SchemaPath,
        model: PropertiesModel,
        referrer: impl Fn(&str) -> Referrer,
    ) -> CompileResult<IndexMap<String, Property>> {
        let mut properties = IndexMap::with_capacity(model.len());
        for (name, property) in model {
            let path = path.join(&name);
            check_name(&path, NameKind::Property, &name, ident::validate_property_name)?;
            let ty = self.register_type(&path, property.type_ref(), referrer(&name))?;
            properties.insert(
                name.clone(),
                Property {
                    doc: property.doc(),
                    name,
                    ty,
                },
            );
        }
        Ok(properties)
    }

    fn check_unused_events(&self) -> CompileResult<()> {
        match self
            .events
            .values()
            .find(|event| !self.references.is_event_referenced(event.id))
        {
            Some(event) => Err(CompileError::semantic(
                SchemaPath::new("events").join(&event.name),
                SemanticErrorKind::UnusedEvent(event.name.clone()),
            )),
            None => Ok(()),
        }
    }
}

fn check_name(
    path: &SchemaPath,
    kind: NameKind,
    name: &str,
    validate: fn(&str) -> Result<(), IdentError>,
) -> CompileResult<()> {
    validate(name).map_err(|source| {
        CompileError::syntax(
            path.clone(),
            SyntaxErrorKind::InvalidName {
                kind,
                name: name.to_owned(),
                source,
            },
        )
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ir::MethodKind;

    pub(crate) const VALID: &str = r"
events:
  E1:
    foo: Foo
    bar: Bar
  E2:
    foo: Foo
    baz: { type: Baz, doc: The baz of E2. }
  E3:
    bazz: Bazz
projections:
  P1:
    states: [ST1, ST2, ST3]
    properties:
      foo: Foo
    createOn: E1
    transitions:
      E2: [ST1 -> ST2]
      E3: [ST2 -> ST2, ST3 -> ST3]
services:
  S1:
    projections: [P1]
    methods:
      M1: { in: Foo, out: Bar, emits: [E1] }
      M2: { in: Baz, out: Bar, type: append, emits: [E2, E3] }
      M3: { out: Baz }
      M4: { type: readonly }
      M5: { in: Bazz, emits: [E3] }
";

    pub(crate) fn sources() -> SourceTree {
        let mut tree = SourceTree::new();
        tree.add_source(
            "lib.rs",
            "pub struct Foo;\npub struct Bar;\n/// Baz docs.\npub enum Baz { A }\npub type Bazz = u32;\n",
        )
        .unwrap();
        tree
    }

    pub(crate) fn compile(raw: &str) -> CompileResult<Schema> {
        Compiler::new().sources(sources()).compile_str(raw)
    }

    #[test]
    fn compiles_valid_schema() {
        let schema = compile(VALID).unwrap();
        assert_eq!(schema.raw(), VALID);
        assert_eq!(
            schema.events().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            ["E1", "E2", "E3"]
        );
        assert_eq!(schema.types().len(), 4);

        let service = schema.service("S1").unwrap();
        let kinds: Vec<_> = service.methods.values().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            [
                MethodKind::Transaction,
                MethodKind::Append,
                MethodKind::Readonly,
                MethodKind::Readonly,
                MethodKind::Transaction,
            ]
        );
        let subscriptions: Vec<_> = service
            .subscriptions
            .iter()
            .map(|id| schema.event_by_id(*id).name.as_str())
            .collect();
        assert_eq!(subscriptions, ["E1", "E2", "E3"]);
    }

    #[test]
    fn repeated_type_references_share_an_id() {
        let schema = compile(VALID).unwrap();
        let e1 = schema.event("E1").unwrap();
        let e2 = schema.event("E2").unwrap();
        let p1 = schema.projection("P1").unwrap();
        assert_eq!(e1.properties["foo"].ty, e2.properties["foo"].ty);
        assert_eq!(e1.properties["foo"].ty, p1.properties["foo"].ty);

        let foo = e1.properties["foo"].ty;
        // E1.foo, E2.foo, P1.foo and S1.M1.in
        assert_eq!(schema.type_referrers(foo).len(), 4);
        assert_eq!(schema.type_by_id(foo).reference.name(), "Foo");
    }

    #[test]
    fn type_and_property_docs_are_kept() {
        let schema = compile(VALID).unwrap();
        let baz = &schema.event("E2").unwrap().properties["baz"];
        assert_eq!(baz.doc, ["The baz of E2."]);
        assert_eq!(schema.type_by_id(baz.ty).doc, ["Baz docs."]);
    }

    #[test]
    fn reports_first_unused_event() {
        let raw = VALID.replace("  E3:\n    bazz: Bazz\n", "  E3:\n    bazz: Bazz\n  E4: {}\n  E5: {}\n");
        let err = compile(&raw).unwrap_err();
        assert!(err.is_semantic());
        assert!(matches!(
            err.semantic_kind(),
            Some(SemanticErrorKind::UnusedEvent(name)) if name == "E4"
        ));
        assert_eq!(err.path().unwrap().to_string(), "events.E4");
    }

    #[test]
    fn malformed_yaml_is_a_syntax_error() {
        let err = compile("events: [unclosed").unwrap_err();
        assert!(err.is_syntax());
        assert!(err.path().unwrap().is_root());
    }
}
