use indexmap::{IndexMap, IndexSet};

use super::{CompileContext, check_name};
use crate::{
    error::{CompileError, CompileResult, NameKind, SemanticErrorKind, StateRole, SyntaxErrorKind},
    ident,
    ir::{EventId, Projection, ProjectionId, Referrer, Transition},
    model::ProjectionModel,
    path::SchemaPath,
};

impl CompileContext {
    #[tracing::instrument(skip_all, fields(count = projections.len()))]
    pub(super) fn compile_projections(
        &mut self,
        projections: IndexMap<String, ProjectionModel>,
    ) -> CompileResult<()> {
        let section = SchemaPath::new("projections");
        for (name, model) in projections {
            let path = section.join(&name);
            check_name(&path, NameKind::Projection, &name, ident::validate_type_name)?;
            let id = ProjectionId(self.projections.len());

            let states = compile_states(&path.join("states"), model.states)?;
            let properties = self.compile_properties(
                &path.join("properties"),
                model.properties.unwrap_or_default(),
                |property| Referrer::ProjectionProperty {
                    projection: id,
                    property: property.to_owned(),
                },
            )?;

            let create_on_path = path.join("createOn");
            let create_on = self.event_id(&model.create_on).ok_or_else(|| {
                CompileError::semantic(
                    create_on_path.clone(),
                    SemanticErrorKind::UndefinedEvent(model.create_on.clone()),
                )
            })?;
            self.references.refer_event(create_on, Referrer::CreateOn(id));

            let transitions_path = path.join("transitions");
            let transitions = self.compile_transitions(
                id,
                &transitions_path,
                &states,
                model.transitions.unwrap_or_default(),
            )?;
            if transitions.contains_key(&create_on) {
                return Err(CompileError::semantic(
                    transitions_path.join(&model.create_on),
                    SemanticErrorKind::CreateOnTransition {
                        event: model.create_on,
                        create_on: create_on_path,
                        transition: transitions_path.join(self.events[create_on.0].name.as_str()),
                    },
                ));
            }

            tracing::trace!(projection = %name, states = states.len(), "compiled projection");
            self.projections.insert(
                name.clone(),
                Projection {
                    id,
                    name,
                    states,
                    properties,
                    create_on,
                    transitions,
                },
            );
        }
        Ok(())
    }

    fn compile_transitions(
        &mut self,
        projection: ProjectionId,
        path: &SchemaPath,
        states: &IndexSet<String>,
        model: IndexMap<String, Vec<String>>,
    ) -> CompileResult<IndexMap<EventId, Vec<Transition>>> {
        let mut transitions = IndexMap::new();
        for (event, expressions) in model {
            let path = path.join(&event);
            let id = self.event_id(&event).ok_or_else(|| {
                CompileError::semantic(path.clone(), SemanticErrorKind::UndefinedEvent(event.clone()))
            })?;

            let mut parsed: Vec<Transition> = Vec::with_capacity(expressions.len());
            for (index, expression) in expressions.iter().enumerate() {
                let transition = parse_transition(&path.join(index), expression)?;
                for (role, state) in [
                    (StateRole::Source, &transition.from),
                    (StateRole::Target, &transition.to),
                ] {
                    if !states.contains(state) {
                        return Err(CompileError::semantic(
                            path.clone(),
                            SemanticErrorKind::UndefinedState {
                                role,
                                state: state.clone(),
                            },
                        ));
                    }
                }
                if parsed.contains(&transition) {
                    return Err(CompileError::semantic(
                        path.clone(),
                        SemanticErrorKind::DuplicateTransition {
                            from: transition.from,
                            to: transition.to,
                        },
                    ));
                }
                self.references
                    .refer_event(id, Referrer::Transition { projection, index });
                parsed.push(transition);
            }

            // an empty list declares no trigger
            if !parsed.is_empty() {
                transitions.insert(id, parsed);
            }
        }
        Ok(transitions)
    }
}

fn compile_states(path: &SchemaPath, model: Vec<String>) -> CompileResult<IndexSet<String>> {
    if model.is_empty() {
        return Err(CompileError::semantic(path.clone(), SemanticErrorKind::MissingStates));
    }
    let mut states = IndexSet::with_capacity(model.len());
    for (index, state) in model.into_iter().enumerate() {
        let path = path.join(index);
        check_name(&path, NameKind::State, &state, ident::validate_type_name)?;
        if states.contains(&state) {
            return Err(CompileError::semantic(path, SemanticErrorKind::DuplicateState(state)));
        }
        states.insert(state);
    }
    Ok(states)
}

/// Parses `FROM -> TO`. Whitespace around the arrow is free-form.
fn parse_transition(path: &SchemaPath, expression: &str) -> CompileResult<Transition> {
    match expression.split_whitespace().collect::<Vec<_>>().as_slice() {
        [from, "->", to] => Ok(Transition {
            from: (*from).to_owned(),
            to: (*to).to_owned(),
        }),
        _ => Err(CompileError::syntax(
            path.clone(),
            SyntaxErrorKind::MalformedTransition {
                expression: expression.to_owned(),
            },
        )),
    }
}
