//! Records exchanged with the resource store.
//!
//! The store is schemaless: every row is a JSON object carrying its type tag
//! (`tid`), its id, and whatever fields the writer chose to send. [`Resource`]
//! keeps that shape and lets callers decode it into typed entities.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vnet_core::{ResourceKind, SwitchId};

use crate::error::{Result, StoreError};

/// Field map sent with `set` and `delete`, and held by every record.
pub type Fields = serde_json::Map<String, Value>;

/// Addressing target of a store call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The host agent: switch definitions, runs, host subnets and NAT.
    Agent,
    /// The networking namespace of one running switch.
    Switch(SwitchId),
    /// The downstream mux, which publishes `connection` resources.
    Mux,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => f.write_str("agent"),
            Self::Switch(id) => write!(f, "switch:{id}"),
            Self::Mux => f.write_str("mux"),
        }
    }
}

/// A row as returned by `walk`, `get` or `set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Type tag of the row.
    #[serde(rename = "tid")]
    pub kind: ResourceKind,
    /// Store-generated id, unique within the type tag.
    #[serde(default)]
    pub id: String,
    /// Remaining fields.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Resource {
    /// Create a record from its parts.
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>, fields: Fields) -> Self {
        Self {
            kind,
            id: id.into(),
            fields,
        }
    }

    /// Look up a field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a string field.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Decode the record into a typed entity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the record does not have the
    /// shape `T` expects.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let value = serde_json::to_value(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| {
            StoreError::Serialization(format!("{} {}: {e}", self.kind, self.id))
        })
    }
}

/// A typed pointer to another row, as embedded in bindings, domains and runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Type tag of the referenced row.
    pub tid: ResourceKind,
    /// Id of the referenced row.
    pub id: String,
}

impl ResourceRef {
    /// Create a reference.
    #[must_use]
    pub fn new(tid: ResourceKind, id: impl Into<String>) -> Self {
        Self { tid, id: id.into() }
    }

    /// Encode the reference as a field value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "tid": self.tid, "id": self.id })
    }
}

/// Encode any serializable request body into a field map.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if `body` does not serialize to a JSON
/// object.
pub fn to_fields<T: Serialize>(body: &T) -> Result<Fields> {
    match serde_json::to_value(body).map_err(|e| StoreError::Serialization(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Build a selector that addresses a single row by id.
#[must_use]
pub fn id_selector(id: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("id".to_string(), Value::String(id.to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_flattens_fields() {
        let raw = json!({
            "tid": "networking.network",
            "id": "cce575af",
            "name": "vm",
            "network_type": "associate",
            "subnets": ["c4e3dfcd"]
        });
        let resource: Resource = serde_json::from_value(raw).unwrap();
        assert_eq!(resource.kind, ResourceKind::Network);
        assert_eq!(resource.id, "cce575af");
        assert_eq!(resource.str_field("name"), Some("vm"));
        assert!(resource.field("tid").is_none());
    }

    #[test]
    fn decode_into_typed_entity() {
        #[derive(Deserialize)]
        struct Named {
            id: String,
            name: String,
        }

        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("demo"));
        let resource = Resource::new(ResourceKind::Switch, "sw-1", fields);

        let named: Named = resource.decode().unwrap();
        assert_eq!(named.id, "sw-1");
        assert_eq!(named.name, "demo");
    }

    #[test]
    fn decode_reports_the_record() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct NeedsCidr {
            cidr: String,
        }

        let resource = Resource::new(ResourceKind::Subnet, "s-1", Fields::new());
        let err = resource.decode::<NeedsCidr>().unwrap_err();
        assert!(matches!(err, StoreError::Serialization(msg) if msg.contains("s-1")));
    }

    #[test]
    fn reference_value_shape() {
        let reference = ResourceRef::new(ResourceKind::GrePort, "p-1");
        assert_eq!(
            reference.to_value(),
            json!({ "tid": "networking.port.gre", "id": "p-1" })
        );
    }

    #[test]
    fn to_fields_rejects_non_objects() {
        assert!(to_fields(&"plain").is_err());
        let fields = to_fields(&json!({ "name": "n" })).unwrap();
        assert_eq!(fields.get("name"), Some(&json!("n")));
    }

    #[test]
    fn scope_display() {
        let id = SwitchId::new("sw").unwrap();
        assert_eq!(Scope::Switch(id).to_string(), "switch:sw");
        assert_eq!(Scope::Agent.to_string(), "agent");
    }
}
