//! Property serializer shared by all structure types.
//!
//! Each type declares the names of the properties it persists. Building the
//! serializer validates that declaration, so a type with a broken property list
//! fails as soon as it is loaded instead of the first time it is saved.

use crate::extension::ExtensionError;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Serializes a type's property values to and from JSON bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSerializer {
    type_name: String,
    properties: Vec<String>,
}

impl DataSerializer {
    /// Creates a serializer for `type_name` with the given property layout.
    ///
    /// Property names must be non-empty identifiers (ASCII letters, digits and
    /// `_`, not starting with a digit) and unique within the type.
    pub fn new<I, S>(type_name: &str, properties: I) -> Result<Self, ExtensionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if type_name.trim().is_empty() {
            return Err(ExtensionError::Misconfigured(
                "type name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut layout = Vec::new();
        for property in properties {
            let property = property.into();
            validate_property_name(&property)?;
            if !seen.insert(property.clone()) {
                return Err(ExtensionError::InvalidProperty {
                    property,
                    reason: "declared more than once".to_string(),
                });
            }
            layout.push(property);
        }

        Ok(Self {
            type_name: type_name.to_string(),
            properties: layout,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Property names in declaration order.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Serializes `values`, which must contain exactly the declared properties.
    pub fn serialize(&self, values: &Map<String, Value>) -> Result<Vec<u8>, ExtensionError> {
        self.check_layout(values)?;
        Ok(serde_json::to_vec(values)?)
    }

    /// Reads back bytes produced by [`DataSerializer::serialize`].
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Map<String, Value>, ExtensionError> {
        match serde_json::from_slice::<Value>(bytes)? {
            Value::Object(values) => {
                self.check_layout(&values)?;
                Ok(values)
            }
            other => Err(ExtensionError::PropertyMismatch(format!(
                "expected an object for type '{}', got {}",
                self.type_name, other
            ))),
        }
    }

    fn check_layout(&self, values: &Map<String, Value>) -> Result<(), ExtensionError> {
        if let Some(missing) = self.properties.iter().find(|p| !values.contains_key(p.as_str())) {
            return Err(ExtensionError::PropertyMismatch(format!(
                "missing property '{}' for type '{}'",
                missing, self.type_name
            )));
        }
        if let Some(unknown) = values.keys().find(|k| !self.properties.contains(*k)) {
            return Err(ExtensionError::PropertyMismatch(format!(
                "unknown property '{}' for type '{}'",
                unknown, self.type_name
            )));
        }
        Ok(())
    }
}

fn validate_property_name(property: &str) -> Result<(), ExtensionError> {
    let invalid = |reason: &str| ExtensionError::InvalidProperty {
        property: property.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = property.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(c) if c.is_ascii_digit() => return Err(invalid("name starts with a digit")),
        _ => {}
    }
    if !property.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("name contains characters other than [A-Za-z0-9_]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn door_serializer() -> DataSerializer {
        DataSerializer::new("Portcullis", ["open_speed", "block_height"]).unwrap()
    }

    #[test]
    fn test_valid_layout() {
        let serializer = door_serializer();
        assert_eq!(serializer.type_name(), "Portcullis");
        assert_eq!(serializer.properties(), &["open_speed", "block_height"]);
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let result = DataSerializer::new("Door", ["speed", "speed"]);
        assert!(matches!(
            result,
            Err(ExtensionError::InvalidProperty { ref property, .. }) if property == "speed"
        ));
    }

    #[test]
    fn test_invalid_property_names_rejected() {
        assert!(DataSerializer::new("Door", [""]).is_err());
        assert!(DataSerializer::new("Door", ["1speed"]).is_err());
        assert!(DataSerializer::new("Door", ["open-speed"]).is_err());
        assert!(DataSerializer::new("Door", ["_hidden", "speed2"]).is_ok());
    }

    #[test]
    fn test_empty_type_name_rejected() {
        let result = DataSerializer::new("  ", ["speed"]);
        assert!(matches!(result, Err(ExtensionError::Misconfigured(_))));
    }

    #[test]
    fn test_serialize_checks_layout() {
        let serializer = door_serializer();

        let complete = json!({"open_speed": 1.5, "block_height": 4});
        let bytes = serializer.serialize(complete.as_object().unwrap()).unwrap();
        let restored = serializer.deserialize(&bytes).unwrap();
        assert_eq!(restored.get("block_height"), Some(&json!(4)));

        let missing = json!({"open_speed": 1.5});
        assert!(matches!(
            serializer.serialize(missing.as_object().unwrap()),
            Err(ExtensionError::PropertyMismatch(_))
        ));

        let extra = json!({"open_speed": 1.5, "block_height": 4, "color": "red"});
        assert!(serializer.serialize(extra.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_deserialize_rejects_non_object() {
        let serializer = door_serializer();
        assert!(matches!(
            serializer.deserialize(b"[1, 2]"),
            Err(ExtensionError::PropertyMismatch(_))
        ));
        assert!(matches!(
            serializer.deserialize(b"not json"),
            Err(ExtensionError::Serialization(_))
        ));
    }
}
