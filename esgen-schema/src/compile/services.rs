use indexmap::{IndexMap, IndexSet};

use super::{CompileContext, check_name};
use crate::{
    error::{CompileError, CompileResult, NameKind, SemanticErrorKind, SyntaxErrorKind},
    ident,
    ir::{EventId, Method, MethodKind, ProjectionId, Referrer, Service, ServiceId},
    model::{MethodModel, ServiceModel},
    path::SchemaPath,
};

impl CompileContext {
    #[tracing::instrument(skip_all, fields(count = services.len()))]
    pub(super) fn compile_services(
        &mut self,
        services: IndexMap<String, ServiceModel>,
    ) -> CompileResult<()> {
        let section = SchemaPath::new("services");
        if services.is_empty() {
            return Err(CompileError::semantic(section, SemanticErrorKind::MissingServices));
        }

        for (name, model) in services {
            let path = section.join(&name);
            check_name(&path, NameKind::Service, &name, ident::validate_type_name)?;
            let id = ServiceId(self.services.len());

            let projections = self.resolve_projections(&path.join("projections"), &model.projections)?;

            let methods_path = path.join("methods");
            let methods_model = model.methods.unwrap_or_default();
            if methods_model.is_empty() {
                return Err(CompileError::semantic(methods_path, SemanticErrorKind::MissingMethods));
            }
            let mut methods = IndexMap::with_capacity(methods_model.len());
            for (method, model) in methods_model {
                let compiled =
                    self.compile_method(id, &methods_path.join(&method), method, model.unwrap_or_default())?;
                methods.insert(compiled.name.clone(), compiled);
            }

            let subscriptions: IndexSet<EventId> = projections
                .iter()
                .flat_map(|p| self.projections[p.0].subscriptions())
                .collect();

            tracing::trace!(
                service = %name,
                methods = methods.len(),
                subscriptions = subscriptions.len(),
                "compiled service"
            );
            self.services.insert(
                name.clone(),
                Service {
                    id,
                    name,
                    projections,
                    methods,
                    subscriptions,
                },
            );
        }
        Ok(())
    }

    fn resolve_projections(
        &self,
        path: &SchemaPath,
        names: &[String],
    ) -> CompileResult<Vec<ProjectionId>> {
        let mut projections = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let path = path.join(index);
            let id = self
                .projections
                .get_index_of(name.as_str())
                .map(ProjectionId)
                .ok_or_else(|| {
                    CompileError::semantic(
                        path.clone(),
                        SemanticErrorKind::UndefinedProjection(name.clone()),
                    )
                })?;
            if projections.contains(&id) {
                return Err(CompileError::semantic(
                    path,
                    SemanticErrorKind::DuplicateProjection(name.clone()),
                ));
            }
            projections.push(id);
        }
        Ok(projections)
    }

    fn compile_method(
        &mut self,
        service: ServiceId,
        path: &SchemaPath,
        name: String,
        model: MethodModel,
    ) -> CompileResult<Method> {
        check_name(path, NameKind::Method, &name, ident::validate_type_name)?;

        let input = model
            .input
            .as_deref()
            .map(|raw| {
                let referrer = Referrer::MethodInput {
                    service,
                    method: name.clone(),
                };
                self.register_type(&path.join("in"), raw, referrer)
            })
            .transpose()?;
        let output = model
            .output
            .as_deref()
            .map(|raw| {
                let referrer = Referrer::MethodOutput {
                    service,
                    method: name.clone(),
                };
                self.register_type(&path.join("out"), raw, referrer)
            })
            .transpose()?;

        let mut emits = Vec::with_capacity(model.emits.len());
        for (index, event) in model.emits.iter().enumerate() {
            let path = path.join("emits").join(index);
            let id = self.event_id(event).ok_or_else(|| {
                CompileError::semantic(path.clone(), SemanticErrorKind::UndefinedEvent(event.clone()))
            })?;
            if emits.contains(&id) {
                return Err(CompileError::semantic(
                    path,
                    SemanticErrorKind::DuplicateEmit(event.clone()),
                ));
            }
            self.references.refer_event(
                id,
                Referrer::Emit {
                    service,
                    method: name.clone(),
                },
            );
            emits.push(id);
        }

        let kind = classify(&path.join("type"), model.kind.as_deref(), !emits.is_empty())?;
        Ok(Method {
            name,
            kind,
            input,
            output,
            emits,
        })
    }
}

/// Settles the method type. Without an explicit type, a method that emits is
/// a transaction and one that doesn't is readonly.
fn classify(path: &SchemaPath, declared: Option<&str>, emits: bool) -> CompileResult<MethodKind> {
    let declared = match declared {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<MethodKind>().map_err(|_| {
            CompileError::syntax(path.clone(), SyntaxErrorKind::IllegalMethodType(raw.to_owned()))
        })?),
    };
    match (declared, emits) {
        (None, false) => Ok(MethodKind::Readonly),
        (None, true) => Ok(MethodKind::Transaction),
        (Some(MethodKind::Readonly), true) => Err(CompileError::semantic(
            path.clone(),
            SemanticErrorKind::ReadonlyEmits,
        )),
        (Some(kind @ (MethodKind::Append | MethodKind::Transaction)), false) => Err(
            CompileError::semantic(path.clone(), SemanticErrorKind::EmitsRequired(kind)),
        ),
        (Some(kind), _) => Ok(kind),
    }
}
