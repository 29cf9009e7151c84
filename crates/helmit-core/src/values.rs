//! Chart values with deep merge support

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};

/// Values container backed by a JSON tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Parse values from YAML text
    ///
    /// An empty document yields an empty mapping.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(match value {
            JsonValue::Null => Self::new(),
            other => Self(other),
        })
    }

    /// Parse the bytes of a named values file
    pub(crate) fn from_file_bytes(file: &str, data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|e| CoreError::Decode {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(text).map_err(|e| CoreError::Decode {
            file: file.to_string(),
            message: e.to_string(),
        })
    }

    /// Deep merge another Values into this one
    ///
    /// Objects merge recursively; scalars and arrays from the overlay replace the base.
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.0, |current, part| current.get(part))
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if values are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }
}

fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_document_is_empty_mapping() {
        let values = Values::from_yaml("").unwrap();
        assert!(values.is_empty());
        assert_eq!(values, Values::new());
    }

    #[test]
    fn test_deep_merge() {
        let mut base = Values::from_yaml("image:\n  repo: nginx\n  tag: '1.0'\nreplicas: 1\n").unwrap();
        let overlay = Values(json!({"image": {"tag": "2.0"}, "ports": [80]}));

        base.merge(&overlay);

        assert_eq!(base.get("image.repo"), Some(&json!("nginx")));
        assert_eq!(base.get("image.tag"), Some(&json!("2.0")));
        assert_eq!(base.get("replicas"), Some(&json!(1)));
        assert_eq!(base.get("ports"), Some(&json!([80])));
    }

    #[test]
    fn test_get_missing_path() {
        let values = Values(json!({"a": {"b": 1}}));
        assert!(values.get("a.c").is_none());
        assert!(values.get("x").is_none());
    }

    #[test]
    fn test_invalid_yaml_reports_file() {
        let err = Values::from_file_bytes("values.yaml", b"key: [unterminated").unwrap_err();
        assert!(err.to_string().starts_with("cannot load values.yaml"));
    }
}
