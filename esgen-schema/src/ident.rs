//! Naming rules for schema identifiers and type references.
//!
//! Declarative names (events, projections, states, services, methods and the
//! final segment of a type reference) start with an upper case ASCII letter.
//! Property names start with a lower case ASCII letter. Both continue with
//! ASCII letters, digits and underscores. Leading segments of a dotted type
//! reference name Rust modules and are restricted to lower case.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("empty")]
    Empty,
    #[error("must begin with an upper case latin character")]
    MustBeginWithUpperLatin,
    #[error("must begin with a lower case latin character")]
    MustBeginWithLowerLatin,
    #[error("contains illegal character {character:?} at index {index}")]
    IllegalCharacter { character: char, index: usize },
}

/// Validates an event, projection, state, service, method or type name.
///
/// # Errors
///
/// Returns the first rule the name violates.
pub fn validate_type_name(name: &str) -> Result<(), IdentError> {
    validate(
        name,
        |c| c.is_ascii_uppercase(),
        IdentError::MustBeginWithUpperLatin,
        is_word,
    )
}

/// Validates a property name.
///
/// # Errors
///
/// Returns the first rule the name violates.
pub fn validate_property_name(name: &str) -> Result<(), IdentError> {
    validate(
        name,
        |c| c.is_ascii_lowercase(),
        IdentError::MustBeginWithLowerLatin,
        is_word,
    )
}

/// Validates a module segment of a dotted type reference.
///
/// # Errors
///
/// Returns the first rule the name violates.
pub fn validate_module_name(name: &str) -> Result<(), IdentError> {
    validate(
        name,
        |c| c.is_ascii_lowercase(),
        IdentError::MustBeginWithLowerLatin,
        |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_',
    )
}

const fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn validate(
    name: &str,
    first: impl Fn(char) -> bool,
    first_error: IdentError,
    rest: impl Fn(char) -> bool,
) -> Result<(), IdentError> {
    let mut chars = name.char_indices();
    let Some((_, head)) = chars.next() else {
        return Err(IdentError::Empty);
    };
    if !first(head) {
        return Err(first_error);
    }
    match chars.find(|&(_, c)| !rest(c)) {
        Some((index, character)) => Err(IdentError::IllegalCharacter { character, index }),
        None => Ok(()),
    }
}

/// A reference to an externally declared data type, such as `Money` or
/// `billing.invoice.Invoice`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef {
    modules: Vec<String>,
    name: String,
}

/// A type reference segment broke a naming rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("segment {index} ({segment:?}) {reason}")]
pub struct TypeRefError {
    pub index: usize,
    pub segment: String,
    #[source]
    pub reason: IdentError,
}

impl TypeRef {
    /// Parses a dotted reference. Every segment but the last must be a module
    /// name, the last must be a type name.
    ///
    /// # Errors
    ///
    /// Returns the first offending segment.
    pub fn parse(reference: &str) -> Result<Self, TypeRefError> {
        let segments: Vec<&str> = reference.split('.').collect();
        let (name, modules) = segments
            .split_last()
            .expect("str::split yields at least one segment");

        for (index, segment) in modules.iter().enumerate() {
            validate_module_name(segment).map_err(|reason| TypeRefError {
                index,
                segment: (*segment).to_owned(),
                reason,
            })?;
        }
        validate_type_name(name).map_err(|reason| TypeRefError {
            index: modules.len(),
            segment: (*name).to_owned(),
            reason,
        })?;

        Ok(Self {
            modules: modules.iter().map(|m| (*m).to_owned()).collect(),
            name: (*name).to_owned(),
        })
    }

    /// The declared type name (last segment).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module path leading to the type, outermost first.
    #[must_use]
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    #[must_use]
    pub fn is_qualified(&self) -> bool {
        !self.modules.is_empty()
    }
}

impl FromStr for TypeRef {
    type Err = TypeRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for module in &self.modules {
            write!(f, "{module}.")?;
        }
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_follow_upper_camel_rules() {
        assert_eq!(validate_type_name("Created"), Ok(()));
        assert_eq!(validate_type_name("E_2"), Ok(()));
        assert_eq!(validate_type_name(""), Err(IdentError::Empty));
        assert_eq!(
            validate_type_name("created"),
            Err(IdentError::MustBeginWithUpperLatin)
        );
        assert_eq!(
            validate_type_name("Ünderscored"),
            Err(IdentError::MustBeginWithUpperLatin)
        );
    }

    #[test]
    fn every_character_after_the_first_is_checked() {
        assert_eq!(
            validate_type_name("Ab-"),
            Err(IdentError::IllegalCharacter {
                character: '-',
                index: 2
            })
        );
        assert_eq!(
            validate_type_name("A-b"),
            Err(IdentError::IllegalCharacter {
                character: '-',
                index: 1
            })
        );
    }

    #[test]
    fn property_names_start_lower_case() {
        assert_eq!(validate_property_name("amount_due"), Ok(()));
        assert_eq!(
            validate_property_name("Amount"),
            Err(IdentError::MustBeginWithLowerLatin)
        );
        assert_eq!(validate_property_name(""), Err(IdentError::Empty));
    }

    #[test]
    fn module_names_reject_upper_case() {
        assert_eq!(validate_module_name("billing_v2"), Ok(()));
        assert!(matches!(
            validate_module_name("billingV2"),
            Err(IdentError::IllegalCharacter { character: 'V', .. })
        ));
    }

    #[test]
    fn parses_qualified_reference() {
        let reference = TypeRef::parse("billing.invoice.Invoice").unwrap();
        assert_eq!(reference.name(), "Invoice");
        assert_eq!(reference.modules(), ["billing", "invoice"]);
        assert!(reference.is_qualified());
        assert_eq!(reference.to_string(), "billing.invoice.Invoice");
    }

    #[test]
    fn rejects_bad_segments_with_their_index() {
        let err = TypeRef::parse("billing.Invoice.Line").unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.segment, "Invoice");

        let err = TypeRef::parse("billing.line").unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.reason, IdentError::MustBeginWithUpperLatin);

        let err = "a..B".parse::<TypeRef>().unwrap_err();
        assert_eq!(err.reason, IdentError::Empty);
    }
}
