//! Convert - Mapping between models and wire DTOs
//!
//! Three wire encodings of a variant exist:
//! - attribute/value match rules, emitted sparsely (`encode_rules`)
//! - an embedded serialized blob (`encode_blob`)
//! - flat DTO fields, handled by each kind directly

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;
use crate::resource::{Attributes, AttributesExt, Value};
use crate::variant::VariantShape;

/// Bidirectional mapping between a model and its wire DTO
pub trait ModelConverter {
    type Model;
    type Dto;

    /// Build the DTO. `prior_external_id` is given on update and left out on create.
    fn to_dto(
        &self,
        model: &Self::Model,
        prior_external_id: Option<&str>,
    ) -> Result<Self::Dto, ConversionError>;

    /// Build the model from a DTO. Secret fields missing from the DTO are
    /// taken from `prior` when it holds the same variant.
    fn from_dto(
        &self,
        dto: Self::Dto,
        prior: Option<&Self::Model>,
    ) -> Result<Self::Model, ConversionError>;
}

/// One attribute/value match rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRule {
    pub attribute: String,
    pub value: String,
}

impl MatchRule {
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// Encode the string fields of a variant block as match rules.
///
/// Only fields with a wire name and a non-empty value are emitted, in the
/// shape's field order.
pub fn encode_rules(shape: &VariantShape, block: &Attributes) -> Vec<MatchRule> {
    shape
        .fields
        .iter()
        .filter_map(|field| {
            let attribute = field.provider_name.as_deref()?;
            let value = block.get_non_empty(&field.name)?;
            Some(MatchRule::new(attribute, value))
        })
        .collect()
}

/// Decode match rules back into variant block attributes.
///
/// Rules naming an attribute the shape does not declare are dropped. When an
/// attribute repeats, the first rule wins.
pub fn decode_rules(shape: &VariantShape, rules: &[MatchRule]) -> Attributes {
    let mut block = Attributes::new();
    for rule in rules {
        match shape.field_by_provider_name(&rule.attribute) {
            Some(field) if !rule.value.is_empty() => {
                block
                    .entry(field.name.clone())
                    .or_insert_with(|| Value::String(rule.value.clone()));
            }
            Some(_) => {}
            None => log::debug!(
                "ignoring match rule '{}' not declared by variant '{}'",
                rule.attribute,
                shape.block
            ),
        }
    }
    block
}

/// Serialize a variant's detail struct into the opaque string the DTO carries
pub fn encode_blob<T: Serialize>(kind: &str, detail: &T) -> Result<String, ConversionError> {
    serde_json::to_string(detail).map_err(|e| {
        ConversionError::new(kind, format!("failed to serialize variant detail: {}", e))
    })
}

/// Parse an embedded variant blob
pub fn decode_blob<T: DeserializeOwned>(kind: &str, blob: &str) -> Result<T, ConversionError> {
    serde_json::from_str(blob)
        .map_err(|e| ConversionError::new(kind, format!("malformed variant detail: {}", e)))
}

/// Keep a secret the service did not echo back.
///
/// Returns the wire value when it is non-empty, the prior value otherwise.
pub fn preserve_secret(wire: Option<String>, prior: Option<&str>) -> Option<String> {
    match wire {
        Some(value) if !value.is_empty() => Some(value),
        _ => prior.filter(|p| !p.is_empty()).map(|p| p.to_string()),
    }
}

/// Fill the variant's secret and computed fields missing from `block` with
/// the values in `prior_block`, the same variant as last known locally.
pub fn carry_over(shape: &VariantShape, block: &mut Attributes, prior_block: &Attributes) {
    for name in shape.carried_fields() {
        let wire = block.get_string(name).map(|s| s.to_string());
        match preserve_secret(wire, prior_block.get_string(name)) {
            Some(value) => {
                block.insert(name.to_string(), Value::String(value));
            }
            None => {
                block.remove(name);
            }
        }
    }
}
