//! The schema document as written, before validation.
//!
//! ```yaml
//! events:
//!   Created:
//!     id: OrderId
//!   Shipped:
//!     at: { type: Timestamp, doc: "When the parcel left." }
//! projections:
//!   Order:
//!     states: [Open, Shipped]
//!     createOn: Created
//!     transitions:
//!       Shipped: ["Open -> Shipped"]
//! services:
//!   Orders:
//!     projections: [Order]
//!     methods:
//!       Ship: { in: ShipRequest, emits: [Shipped] }
//! ```

use indexmap::IndexMap;
use serde::Deserialize;

pub type PropertiesModel = IndexMap<String, PropertyModel>;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub events: Option<IndexMap<String, Option<PropertiesModel>>>,
    #[serde(default)]
    pub projections: Option<IndexMap<String, ProjectionModel>>,
    #[serde(default)]
    pub services: Option<IndexMap<String, ServiceModel>>,
}

impl SchemaDocument {
    /// Decodes a YAML document. Unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// Returns the YAML error if the text is not a well-formed document.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // serde_yaml rejects an empty stream outright
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Option<Self>>(raw).map(Option::unwrap_or_default)
    }
}

/// A property is either `name: Type` or `name: { type: Type, doc: ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PropertyModel {
    Type(String),
    Documented(DocumentedProperty),
}

impl PropertyModel {
    #[must_use]
    pub fn type_ref(&self) -> &str {
        match self {
            Self::Type(ty) => ty,
            Self::Documented(documented) => &documented.ty,
        }
    }

    #[must_use]
    pub fn doc(&self) -> Vec<String> {
        match self {
            Self::Type(_) => Vec::new(),
            Self::Documented(documented) => match &documented.doc {
                None => Vec::new(),
                Some(Documentation::Text(text)) => text.lines().map(str::to_owned).collect(),
                Some(Documentation::Lines(lines)) => lines.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentedProperty {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub doc: Option<Documentation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Documentation {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectionModel {
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub properties: Option<PropertiesModel>,
    #[serde(rename = "createOn")]
    pub create_on: String,
    #[serde(default)]
    pub transitions: Option<IndexMap<String, Vec<String>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceModel {
    #[serde(default)]
    pub projections: Vec<String>,
    #[serde(default)]
    pub methods: Option<IndexMap<String, Option<MethodModel>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodModel {
    #[serde(rename = "in", default)]
    pub input: Option<String>,
    #[serde(rename = "out", default)]
    pub output: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub emits: Vec<String>,
}
