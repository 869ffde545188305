//! Access condition
//!
//! Posture checks evaluated against a third-party integration (Wiz,
//! CrowdStrike) before access is granted. The variant travels as an
//! `integrationType` discriminator and a flat `conditions` object whose
//! fields depend on the type.

use log::debug;
use serde::{Deserialize, Serialize};
use tether_core::schema::{AttributeSchema, AttributeType, ResourceSchema};
use tether_core::{
    AttributeCodec, Attributes, AttributesExt, ConversionError, EntityDto, EntityRecord,
    ModelConverter, ResourceKind, ValidationError, Value, Variant, VariantRegistry, VariantShape,
    WireRecord,
};

use super::entity_attributes;

pub const KIND: &str = "access_condition";

/// Accepted staleness windows for the last time the integration saw the workload
const LAST_SEEN_WINDOWS: &[&str] = &["1 hour", "2 hours", "6 hours", "12 hours", "1 day", "7 days"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizConditions {
    pub max_last_seen: String,
    pub container_cluster_connected: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrowdStrikeConditions {
    pub max_last_seen: String,
    pub match_hostname: Option<bool>,
    pub match_serial_number: Option<bool>,
    pub prevent_rfm: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccessConditionConfig {
    Wiz(WizConditions),
    CrowdStrike(CrowdStrikeConditions),
}

impl Variant for AccessConditionConfig {
    fn block_name(&self) -> &'static str {
        match self {
            AccessConditionConfig::Wiz(_) => "wiz_conditions",
            AccessConditionConfig::CrowdStrike(_) => "crowdstrike_conditions",
        }
    }

    fn from_block(block: &str, attrs: &Attributes) -> Result<Self, ValidationError> {
        let max_last_seen = attrs.get_non_empty("max_last_seen").unwrap_or_default();
        match block {
            "wiz_conditions" => Ok(AccessConditionConfig::Wiz(WizConditions {
                max_last_seen,
                container_cluster_connected: attrs.get_bool("container_cluster_connected"),
            })),
            "crowdstrike_conditions" => Ok(AccessConditionConfig::CrowdStrike(
                CrowdStrikeConditions {
                    max_last_seen,
                    match_hostname: attrs.get_bool("match_hostname"),
                    match_serial_number: attrs.get_bool("match_serial_number"),
                    prevent_rfm: attrs.get_bool("prevent_rfm"),
                },
            )),
            other => Err(ValidationError::UnknownVariant {
                kind: KIND.to_string(),
                block: other.to_string(),
            }),
        }
    }

    fn to_block(&self) -> Attributes {
        let mut attrs = Attributes::new();
        match self {
            AccessConditionConfig::Wiz(c) => {
                attrs.set_opt_string("max_last_seen", Some(&c.max_last_seen));
                attrs.set_opt("container_cluster_connected", c.container_cluster_connected);
            }
            AccessConditionConfig::CrowdStrike(c) => {
                attrs.set_opt_string("max_last_seen", Some(&c.max_last_seen));
                attrs.set_opt("match_hostname", c.match_hostname);
                attrs.set_opt("match_serial_number", c.match_serial_number);
                attrs.set_opt("prevent_rfm", c.prevent_rfm);
            }
        }
        attrs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccessCondition {
    pub record: EntityRecord,
    /// Integration the conditions are evaluated against
    pub integration_id: String,
    pub config: AccessConditionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionsDto {
    #[serde(default)]
    pub max_last_seen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_cluster_connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_hostname: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_serial_number: Option<bool>,
    #[serde(rename = "preventRFM", default, skip_serializing_if = "Option::is_none")]
    pub prevent_rfm: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConditionDto {
    #[serde(flatten)]
    pub entity: EntityDto,
    #[serde(rename = "integrationID")]
    pub integration_id: String,
    pub integration_type: String,
    #[serde(default)]
    pub conditions: ConditionsDto,
}

impl WireRecord for AccessConditionDto {
    fn entity(&self) -> &EntityDto {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut EntityDto {
        &mut self.entity
    }
}

fn max_last_seen() -> AttributeSchema {
    AttributeSchema::new(
        "max_last_seen",
        AttributeType::Enum(LAST_SEEN_WINDOWS.iter().map(|s| s.to_string()).collect()),
    )
    .required()
    .with_description("How recently the integration must have seen the workload")
    .with_provider_name("maxLastSeen")
}

fn flag(name: &str, wire_name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Bool).with_provider_name(wire_name)
}

fn registry() -> VariantRegistry {
    VariantRegistry::new(KIND)
        .variant(
            VariantShape::new("wiz_conditions", "WizIntegrationApi")
                .with_description("Posture reported by Wiz")
                .field(max_last_seen())
                .field(flag("container_cluster_connected", "containerClusterConnected")),
        )
        .variant(
            VariantShape::new("crowdstrike_conditions", "CrowdStrike")
                .with_description("Posture reported by CrowdStrike Falcon")
                .field(max_last_seen())
                .field(flag("match_hostname", "matchHostname"))
                .field(flag("match_serial_number", "matchSerialNumber"))
                .field(flag("prevent_rfm", "preventRFM")),
        )
}

/// Conversion and lifecycle rules for access conditions
pub struct AccessConditionKind {
    registry: VariantRegistry,
}

impl AccessConditionKind {
    pub fn new() -> Self {
        Self {
            registry: registry(),
        }
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }
}

impl Default for AccessConditionKind {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelConverter for AccessConditionKind {
    type Model = AccessCondition;
    type Dto = AccessConditionDto;

    fn to_dto(
        &self,
        model: &AccessCondition,
        prior_external_id: Option<&str>,
    ) -> Result<AccessConditionDto, ConversionError> {
        let integration_type = self
            .registry
            .discriminator_for(model.config.block_name())
            .ok_or_else(|| {
                ConversionError::new(
                    KIND,
                    format!("no variant registered for '{}'", model.config.block_name()),
                )
            })?;

        let conditions = match &model.config {
            AccessConditionConfig::Wiz(c) => ConditionsDto {
                max_last_seen: c.max_last_seen.clone(),
                container_cluster_connected: c.container_cluster_connected,
                ..Default::default()
            },
            AccessConditionConfig::CrowdStrike(c) => ConditionsDto {
                max_last_seen: c.max_last_seen.clone(),
                match_hostname: c.match_hostname,
                match_serial_number: c.match_serial_number,
                prevent_rfm: c.prevent_rfm,
                ..Default::default()
            },
        };

        Ok(AccessConditionDto {
            entity: model.record.to_dto(prior_external_id),
            integration_id: model.integration_id.clone(),
            integration_type: integration_type.to_string(),
            conditions,
        })
    }

    fn from_dto(
        &self,
        dto: AccessConditionDto,
        _prior: Option<&AccessCondition>,
    ) -> Result<AccessCondition, ConversionError> {
        let shape = self
            .registry
            .variant_for(&dto.integration_type)
            .ok_or_else(|| ConversionError::unknown_discriminator(KIND, &dto.integration_type))?;

        let c = dto.conditions;
        let config = match shape.block {
            "wiz_conditions" => {
                if c.match_hostname.is_some() || c.prevent_rfm.is_some() {
                    debug!("dropping CrowdStrike-only conditions from Wiz access condition");
                }
                AccessConditionConfig::Wiz(WizConditions {
                    max_last_seen: c.max_last_seen,
                    container_cluster_connected: c.container_cluster_connected,
                })
            }
            "crowdstrike_conditions" => AccessConditionConfig::CrowdStrike(CrowdStrikeConditions {
                max_last_seen: c.max_last_seen,
                match_hostname: c.match_hostname,
                match_serial_number: c.match_serial_number,
                prevent_rfm: c.prevent_rfm,
            }),
            other => {
                return Err(ConversionError::new(
                    KIND,
                    format!("no decoder for variant '{}'", other),
                ));
            }
        };

        Ok(AccessCondition {
            record: EntityRecord::from_dto(&dto.entity),
            integration_id: dto.integration_id,
            config,
        })
    }
}

impl ResourceKind for AccessConditionKind {
    const NAME: &'static str = KIND;

    fn record<'a>(&self, model: &'a AccessCondition) -> &'a EntityRecord {
        &model.record
    }
}

impl AttributeCodec for AccessConditionKind {
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(KIND)
            .with_description("Posture conditions checked through an integration")
            .attributes(entity_attributes())
            .attribute(
                AttributeSchema::new("integration_id", AttributeType::String)
                    .required()
                    .with_provider_name("integrationID"),
            )
            .attributes(self.registry.schema_attributes())
    }

    fn parse(&self, attrs: &Attributes) -> Result<AccessCondition, ValidationError> {
        let record = EntityRecord::from_attributes(attrs)?;
        let integration_id =
            attrs
                .get_non_empty("integration_id")
                .ok_or_else(|| ValidationError::MissingRequired {
                    name: "integration_id".to_string(),
                })?;

        Ok(AccessCondition {
            record,
            integration_id,
            config: self.registry.parse(attrs)?,
        })
    }

    fn render(&self, model: &AccessCondition) -> Attributes {
        let mut attrs = Attributes::new();
        model.record.write_attributes(&mut attrs);
        attrs.insert(
            "integration_id".to_string(),
            Value::String(model.integration_id.clone()),
        );
        self.registry.render(&model.config, &mut attrs);
        attrs
    }
}
