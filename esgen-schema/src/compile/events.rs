use indexmap::IndexMap;

use super::{CompileContext, check_name};
use crate::{
    error::{CompileError, CompileResult, NameKind, SemanticErrorKind},
    ident,
    ir::{Event, EventId, Referrer},
    model::PropertiesModel,
    path::SchemaPath,
};

impl CompileContext {
    #[tracing::instrument(skip_all, fields(count = events.len()))]
    pub(super) fn compile_events(
        &mut self,
        events: IndexMap<String, Option<PropertiesModel>>,
    ) -> CompileResult<()> {
        let section = SchemaPath::new("events");
        if events.is_empty() {
            return Err(CompileError::semantic(section, SemanticErrorKind::MissingEvents));
        }

        for (name, properties) in events {
            let path = section.join(&name);
            check_name(&path, NameKind::Event, &name, ident::validate_type_name)?;

            let id = EventId(self.events.len());
            let properties = self.compile_properties(
                &path,
                properties.unwrap_or_default(),
                |property| Referrer::EventProperty {
                    event: id,
                    property: property.to_owned(),
                },
            )?;
            self.events.insert(name.clone(), Event { id, name, properties });
        }
        Ok(())
    }
}
