//! Resource - Entity records and the attribute values exchanged with the host

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Attribute value of a resource as the declarative host sees it
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "String",
            Value::Int(_) => "Int",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Attributes of one resource, keyed by schema attribute name
pub type Attributes = HashMap<String, Value>;

/// Typed accessors over an attribute map
pub trait AttributesExt {
    fn get_string(&self, key: &str) -> Option<&str>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn get_map(&self, key: &str) -> Option<&Attributes>;
    fn get_string_list(&self, key: &str) -> Vec<String>;

    /// String value with empty strings treated as unset
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get_string(key)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }

    /// Insert `value` only when it is set and non-empty
    fn set_opt_string(&mut self, key: &str, value: Option<&str>);
    fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>);
}

impl AttributesExt for Attributes {
    fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    fn get_map(&self, key: &str) -> Option<&Attributes> {
        self.get(key).and_then(Value::as_map)
    }

    fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn set_opt_string(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.insert(key.to_string(), Value::String(v.to_string()));
        }
    }

    fn set_opt<V: Into<Value>>(&mut self, key: &str, value: Option<V>) {
        if let Some(v) = value {
            self.insert(key.to_string(), v.into());
        }
    }
}

/// Identity and metadata envelope shared by every resource kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    /// Identifier assigned by the remote service; empty until the first create
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Left to the service's default when unset
    pub is_active: Option<bool>,
    pub tags: BTreeMap<String, String>,
}

impl EntityRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = external_id.into();
        self
    }

    /// True until the remote service has assigned an identifier
    pub fn is_new(&self) -> bool {
        self.external_id.is_empty()
    }

    /// Read the envelope from host attributes (`id`, `name`, `description`, `is_active`, `tags`)
    pub fn from_attributes(attrs: &Attributes) -> Result<Self, ValidationError> {
        let name = attrs
            .get_non_empty("name")
            .ok_or_else(|| ValidationError::MissingRequired {
                name: "name".to_string(),
            })?;

        let tags = attrs
            .get_map("tags")
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            external_id: attrs.get_string("id").unwrap_or_default().to_string(),
            name,
            description: attrs.get_non_empty("description"),
            is_active: attrs.get_bool("is_active"),
            tags,
        })
    }

    /// Write the envelope into host attributes; unset fields are omitted
    pub fn write_attributes(&self, attrs: &mut Attributes) {
        attrs.set_opt_string("id", Some(&self.external_id));
        attrs.insert("name".to_string(), Value::String(self.name.clone()));
        attrs.set_opt_string("description", self.description.as_deref());
        attrs.set_opt("is_active", self.is_active);
        if !self.tags.is_empty() {
            let tags = self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            attrs.insert("tags".to_string(), Value::Map(tags));
        }
    }

    /// Build the wire envelope. `prior_external_id` is set on the update path only.
    pub fn to_dto(&self, prior_external_id: Option<&str>) -> EntityDto {
        EntityDto {
            external_id: prior_external_id.unwrap_or_default().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_active: self.is_active,
            tags: self
                .tags
                .iter()
                .map(|(key, value)| TagDto {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }

    pub fn from_dto(dto: &EntityDto) -> Self {
        Self {
            external_id: dto.external_id.clone(),
            name: dto.name.clone(),
            description: dto.description.clone().filter(|d| !d.is_empty()),
            is_active: dto.is_active,
            tags: dto
                .tags
                .iter()
                .map(|t| (t.key.clone(), t.value.clone()))
                .collect(),
        }
    }
}

/// Wire envelope carried by every DTO
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDto {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub tags: Vec<TagDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDto {
    pub key: String,
    pub value: String,
}
