use indexmap::IndexMap;

use super::CompileContext;
use crate::{
    error::{CompileError, CompileResult, SemanticErrorKind},
    ir::{Schema, Type, TypeId},
    path::SchemaPath,
    source::{Resolution, SourceTree},
};

impl CompileContext {
    /// Binds every registered type reference to its declaration and seals
    /// the IR.
    #[tracing::instrument(skip_all, fields(types = self.types.len(), declarations = sources.len()))]
    pub(super) fn resolve(self, raw: String, sources: &SourceTree) -> CompileResult<Schema> {
        let mut types = IndexMap::with_capacity(self.types.len());
        let mut undefined = Vec::new();
        let mut ambiguous = Vec::new();

        for (index, reference) in self.types.into_iter().enumerate() {
            match sources.resolve(&reference) {
                Resolution::Found(declaration) => {
                    let ty = Type {
                        id: TypeId(index),
                        reference: reference.clone(),
                        kind: declaration.kind,
                        location: declaration.location.clone(),
                        doc: declaration.doc.clone(),
                    };
                    types.insert(reference, ty);
                }
                Resolution::Missing => undefined.push(reference.to_string()),
                Resolution::Ambiguous(_) => ambiguous.push(reference.to_string()),
            }
        }

        if !undefined.is_empty() {
            return Err(CompileError::semantic(
                SchemaPath::root(),
                SemanticErrorKind::UndefinedTypes(undefined),
            ));
        }
        if !ambiguous.is_empty() {
            return Err(CompileError::semantic(
                SchemaPath::root(),
                SemanticErrorKind::AmbiguousTypes(ambiguous),
            ));
        }

        tracing::debug!(types = types.len(), "resolved types");
        Ok(Schema {
            raw,
            events: self.events,
            projections: self.projections,
            services: self.services,
            types,
            references: self.references,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        compile::{
            Compiler,
            tests::{VALID, compile, sources},
        },
        error::SemanticErrorKind,
        source::{DeclarationKind, SourceTree},
    };

    #[test]
    fn undefined_types_are_reported_together() {
        let raw = VALID.replace("foo: Foo\n    bar: Bar", "foo: Nope\n    bar: AlsoNope");
        let err = compile(&raw).unwrap_err();
        let Some(SemanticErrorKind::UndefinedTypes(types)) = err.semantic_kind() else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(types, &["Nope", "AlsoNope"]);
        assert!(err.to_string().contains("types (Nope, AlsoNope) undefined in source"));
    }

    #[test]
    fn dotted_references_resolve_in_nested_modules() {
        let raw = VALID.replace("bazz: Bazz", "bazz: ledger.entry.Entry");
        let mut tree = sources();
        tree.add_source("ledger/mod.rs", "pub mod entry { pub enum Entry {} }")
            .unwrap();

        let schema = Compiler::new().sources(tree).compile_str(&raw).unwrap();
        let e3 = schema.event("E3").unwrap();
        let entry = schema.type_by_id(e3.properties["bazz"].ty);
        assert_eq!(entry.kind, DeclarationKind::Enum);
        assert_eq!(entry.reference.modules(), ["ledger", "entry"]);
        assert_eq!(entry.location.file.to_str(), Some("ledger/mod.rs"));
    }

    #[test]
    fn ambiguous_declarations_are_rejected() {
        let mut tree = sources();
        tree.add_source("main.rs", "pub struct Foo;").unwrap();
        let err = Compiler::new().sources(tree).compile_str(VALID).unwrap_err();
        assert!(matches!(
            err.semantic_kind(),
            Some(SemanticErrorKind::AmbiguousTypes(types)) if types == &["Foo"]
        ));
    }

    #[test]
    fn no_sources_means_every_type_is_undefined() {
        let err = Compiler::new().sources(SourceTree::new()).compile_str(VALID).unwrap_err();
        assert!(matches!(
            err.semantic_kind(),
            Some(SemanticErrorKind::UndefinedTypes(types)) if types.len() == 4
        ));
    }
}
