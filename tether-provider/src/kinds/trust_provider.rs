//! Trust provider
//!
//! A trust provider attests the identity of a workload from one platform
//! source (cloud instance metadata, an OIDC token, Kerberos). The chosen
//! source is sent as a `provider` discriminator plus a list of
//! attribute/value match rules; only the fields the user set become rules.

use serde::{Deserialize, Serialize};
use tether_core::convert::{decode_rules, encode_rules};
use tether_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use tether_core::{
    AttributeCodec, Attributes, AttributesExt, ConversionError, EntityDto, EntityRecord,
    MatchRule, ModelConverter, ResourceKind, ValidationError, Value, Variant, VariantRegistry,
    VariantShape, WireRecord,
};

use super::{entity_attributes, rule_field, string_variant};

pub const KIND: &str = "trust_provider";

string_variant!(
    /// Azure instance metadata service
    AzureMetadata { sku, vm_id, subscription_id }
);

string_variant!(
    /// AWS instance identity document; `certificate` verifies its signature
    AwsMetadata {
        account_id,
        architecture,
        availability_zone,
        image_id,
        instance_id,
        instance_type,
        region,
        certificate,
    }
);

string_variant!(
    /// AWS IAM role (STS caller identity)
    AwsRole { account_id, assumed_role, role_arn, username }
);

string_variant!(
    /// Google Cloud identity token
    GcpIdentity { email }
);

string_variant!(
    /// GitHub Actions OIDC token
    GitHubAction { actor, repository, workflow }
);

string_variant!(
    /// Kubernetes service account token
    KubernetesServiceAccount {
        issuer,
        namespace,
        pod_name,
        service_account_name,
        subject,
        oidc_endpoint,
    }
);

string_variant!(
    /// Terraform Cloud workload identity token
    TerraformWorkspace { organization_id, project_id, workspace_id }
);

/// Kerberos principal, attested by the listed agent controllers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kerberos {
    pub agent_controller_ids: Vec<String>,
    pub principal: Option<String>,
    pub realm: Option<String>,
    pub source_ip: Option<String>,
}

impl Kerberos {
    fn from_block(attrs: &Attributes) -> Self {
        Self {
            agent_controller_ids: attrs.get_string_list("agent_controller_ids"),
            principal: attrs.get_non_empty("principal"),
            realm: attrs.get_non_empty("realm"),
            source_ip: attrs.get_non_empty("source_ip"),
        }
    }

    fn write_block(&self, attrs: &mut Attributes) {
        if !self.agent_controller_ids.is_empty() {
            attrs.insert(
                "agent_controller_ids".to_string(),
                Value::List(
                    self.agent_controller_ids
                        .iter()
                        .map(|id| Value::String(id.clone()))
                        .collect(),
                ),
            );
        }
        attrs.set_opt_string("principal", self.principal.as_deref());
        attrs.set_opt_string("realm", self.realm.as_deref());
        attrs.set_opt_string("source_ip", self.source_ip.as_deref());
    }
}

/// The one attestation source a trust provider uses
#[derive(Debug, Clone, PartialEq)]
pub enum TrustProviderConfig {
    AzureMetadata(AzureMetadata),
    AwsMetadata(AwsMetadata),
    AwsRole(AwsRole),
    GcpIdentity(GcpIdentity),
    GitHubAction(GitHubAction),
    Kerberos(Kerberos),
    KubernetesServiceAccount(KubernetesServiceAccount),
    TerraformWorkspace(TerraformWorkspace),
}

impl Variant for TrustProviderConfig {
    fn block_name(&self) -> &'static str {
        match self {
            TrustProviderConfig::AzureMetadata(_) => "azure_metadata",
            TrustProviderConfig::AwsMetadata(_) => "aws_metadata",
            TrustProviderConfig::AwsRole(_) => "aws_role",
            TrustProviderConfig::GcpIdentity(_) => "gcp_identity",
            TrustProviderConfig::GitHubAction(_) => "github_action",
            TrustProviderConfig::Kerberos(_) => "kerberos",
            TrustProviderConfig::KubernetesServiceAccount(_) => "kubernetes_service_account",
            TrustProviderConfig::TerraformWorkspace(_) => "terraform_workspace",
        }
    }

    fn from_block(block: &str, attrs: &Attributes) -> Result<Self, ValidationError> {
        let config = match block {
            "azure_metadata" => TrustProviderConfig::AzureMetadata(AzureMetadata::from_block(attrs)),
            "aws_metadata" => TrustProviderConfig::AwsMetadata(AwsMetadata::from_block(attrs)),
            "aws_role" => TrustProviderConfig::AwsRole(AwsRole::from_block(attrs)),
            "gcp_identity" => TrustProviderConfig::GcpIdentity(GcpIdentity::from_block(attrs)),
            "github_action" => TrustProviderConfig::GitHubAction(GitHubAction::from_block(attrs)),
            "kerberos" => TrustProviderConfig::Kerberos(Kerberos::from_block(attrs)),
            "kubernetes_service_account" => TrustProviderConfig::KubernetesServiceAccount(
                KubernetesServiceAccount::from_block(attrs),
            ),
            "terraform_workspace" => {
                TrustProviderConfig::TerraformWorkspace(TerraformWorkspace::from_block(attrs))
            }
            other => {
                return Err(ValidationError::UnknownVariant {
                    kind: KIND.to_string(),
                    block: other.to_string(),
                });
            }
        };
        Ok(config)
    }

    fn to_block(&self) -> Attributes {
        let mut attrs = Attributes::new();
        match self {
            TrustProviderConfig::AzureMetadata(v) => v.write_block(&mut attrs),
            TrustProviderConfig::AwsMetadata(v) => v.write_block(&mut attrs),
            TrustProviderConfig::AwsRole(v) => v.write_block(&mut attrs),
            TrustProviderConfig::GcpIdentity(v) => v.write_block(&mut attrs),
            TrustProviderConfig::GitHubAction(v) => v.write_block(&mut attrs),
            TrustProviderConfig::Kerberos(v) => v.write_block(&mut attrs),
            TrustProviderConfig::KubernetesServiceAccount(v) => v.write_block(&mut attrs),
            TrustProviderConfig::TerraformWorkspace(v) => v.write_block(&mut attrs),
        }
        attrs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrustProvider {
    pub record: EntityRecord,
    pub config: TrustProviderConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustProviderDto {
    #[serde(flatten)]
    pub entity: EntityDto,
    /// Discriminator
    pub provider: String,
    #[serde(default)]
    pub match_rules: Vec<MatchRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_controller_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc_endpoint: Option<String>,
}

impl WireRecord for TrustProviderDto {
    fn entity(&self) -> &EntityDto {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut EntityDto {
        &mut self.entity
    }
}

fn registry() -> VariantRegistry {
    VariantRegistry::new(KIND)
        .variant(
            VariantShape::new("azure_metadata", "AzureMetadataService")
                .with_description("Azure instance metadata service")
                .field(rule_field("sku", "Azure Sku"))
                .field(rule_field("vm_id", "AzureVmId"))
                .field(rule_field("subscription_id", "AzureSubscriptionId")),
        )
        .variant(
            VariantShape::new("aws_metadata", "AWSMetadataService")
                .with_description("AWS instance identity document")
                .field(rule_field("account_id", "AwsAccountId"))
                .field(rule_field("architecture", "AwsArchitecture"))
                .field(rule_field("availability_zone", "AwsAvailabilityZone"))
                .field(rule_field("image_id", "AwsImageId"))
                .field(rule_field("instance_id", "AwsInstanceId"))
                .field(rule_field("instance_type", "AwsInstanceType"))
                .field(rule_field("region", "AwsRegion"))
                .field(
                    AttributeSchema::new("certificate", AttributeType::String)
                        .with_description("PEM certificate that signs the identity document"),
                ),
        )
        .variant(
            VariantShape::new("aws_role", "AWSRole")
                .field(rule_field("account_id", "AwsAccountId"))
                .field(rule_field("assumed_role", "AwsAssumedRole"))
                .field(rule_field("role_arn", "AwsRoleARN"))
                .field(rule_field("username", "AwsUsername")),
        )
        .variant(
            VariantShape::new("gcp_identity", "GcpIdentityToken")
                .field(rule_field("email", "Email")),
        )
        .variant(
            VariantShape::new("github_action", "GitHubIdentityToken")
                .field(rule_field("actor", "GithubActor"))
                .field(rule_field("repository", "GithubRepository"))
                .field(rule_field("workflow", "GithubWorkflow")),
        )
        .variant(
            VariantShape::new("kerberos", "Kerberos")
                .field(
                    AttributeSchema::new("agent_controller_ids", types::string_list())
                        .required()
                        .with_description("Agent controllers that validate Kerberos tickets"),
                )
                .field(rule_field("principal", "Principal"))
                .field(rule_field("realm", "Realm"))
                .field(rule_field("source_ip", "SourceIp")),
        )
        .variant(
            VariantShape::new("kubernetes_service_account", "KubernetesServiceAccount")
                .field(rule_field("issuer", "KubernetesIss"))
                .field(rule_field("namespace", "KubernetesNamespace"))
                .field(rule_field("pod_name", "KubernetesPodName"))
                .field(rule_field("service_account_name", "KubernetesServiceAccountName"))
                .field(rule_field("subject", "KubernetesSub"))
                .field(
                    AttributeSchema::new("oidc_endpoint", types::url())
                        .with_description("OIDC discovery endpoint of the cluster"),
                ),
        )
        .variant(
            VariantShape::new("terraform_workspace", "TerraformIdentityToken")
                .field(rule_field("organization_id", "TerraformOrganizationId"))
                .field(rule_field("project_id", "TerraformProjectId"))
                .field(rule_field("workspace_id", "TerraformWorkspaceId")),
        )
}

/// Conversion and lifecycle rules for trust providers
pub struct TrustProviderKind {
    registry: VariantRegistry,
}

impl TrustProviderKind {
    pub fn new() -> Self {
        Self {
            registry: registry(),
        }
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    fn shape(&self, config: &TrustProviderConfig) -> Result<&VariantShape, ConversionError> {
        self.registry.shape(config.block_name()).ok_or_else(|| {
            ConversionError::new(
                KIND,
                format!("no variant registered for '{}'", config.block_name()),
            )
        })
    }
}

impl Default for TrustProviderKind {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelConverter for TrustProviderKind {
    type Model = TrustProvider;
    type Dto = TrustProviderDto;

    fn to_dto(
        &self,
        model: &TrustProvider,
        prior_external_id: Option<&str>,
    ) -> Result<TrustProviderDto, ConversionError> {
        let shape = self.shape(&model.config)?;
        let block = model.config.to_block();

        let mut dto = TrustProviderDto {
            entity: model.record.to_dto(prior_external_id),
            provider: shape.discriminator.to_string(),
            match_rules: encode_rules(shape, &block),
            ..Default::default()
        };

        match &model.config {
            TrustProviderConfig::AwsMetadata(m) => dto.certificate = m.certificate.clone(),
            TrustProviderConfig::Kerberos(k) => {
                dto.agent_controller_ids = k.agent_controller_ids.clone()
            }
            TrustProviderConfig::KubernetesServiceAccount(k) => {
                dto.oidc_endpoint = k.oidc_endpoint.clone()
            }
            _ => {}
        }

        Ok(dto)
    }

    fn from_dto(
        &self,
        dto: TrustProviderDto,
        _prior: Option<&TrustProvider>,
    ) -> Result<TrustProvider, ConversionError> {
        let shape = self
            .registry
            .variant_for(&dto.provider)
            .ok_or_else(|| ConversionError::unknown_discriminator(KIND, &dto.provider))?;

        let mut block = decode_rules(shape, &dto.match_rules);
        match shape.block {
            "aws_metadata" => block.set_opt_string("certificate", dto.certificate.as_deref()),
            "kerberos" if !dto.agent_controller_ids.is_empty() => {
                block.insert(
                    "agent_controller_ids".to_string(),
                    Value::List(
                        dto.agent_controller_ids
                            .iter()
                            .map(|id| Value::String(id.clone()))
                            .collect(),
                    ),
                );
            }
            "kubernetes_service_account" => {
                block.set_opt_string("oidc_endpoint", dto.oidc_endpoint.as_deref())
            }
            _ => {}
        }

        let config = TrustProviderConfig::from_block(shape.block, &block)
            .map_err(|e| ConversionError::new(KIND, e.to_string()))?;

        Ok(TrustProvider {
            record: EntityRecord::from_dto(&dto.entity),
            config,
        })
    }
}

impl ResourceKind for TrustProviderKind {
    const NAME: &'static str = KIND;

    fn record<'a>(&self, model: &'a TrustProvider) -> &'a EntityRecord {
        &model.record
    }
}

impl AttributeCodec for TrustProviderKind {
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(KIND)
            .with_description("Attests workload identity from a single platform source")
            .attributes(entity_attributes())
            .attributes(self.registry.schema_attributes())
    }

    fn parse(&self, attrs: &Attributes) -> Result<TrustProvider, ValidationError> {
        Ok(TrustProvider {
            record: EntityRecord::from_attributes(attrs)?,
            config: self.registry.parse(attrs)?,
        })
    }

    fn render(&self, model: &TrustProvider) -> Attributes {
        let mut attrs = Attributes::new();
        model.record.write_attributes(&mut attrs);
        self.registry.render(&model.config, &mut attrs);
        attrs
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tether_core::memory::{Call, InMemoryClient};
    use tether_core::{KindHandler, ResourceController, ResourceHandler};

    use super::*;

    fn azure_provider() -> TrustProvider {
        TrustProvider {
            record: EntityRecord::new("azure-vms").with_active(true),
            config: TrustProviderConfig::AzureMetadata(AzureMetadata {
                sku: Some("Standard_B1s".to_string()),
                vm_id: Some(String::new()),
                subscription_id: Some("sub-123".to_string()),
            }),
        }
    }

    fn block(pairs: &[(&str, &str)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn azure_metadata_emits_sparse_rules() {
        let kind = TrustProviderKind::new();
        let dto = kind.to_dto(&azure_provider(), None).unwrap();

        assert_eq!(dto.provider, "AzureMetadataService");
        assert_eq!(
            dto.match_rules,
            vec![
                MatchRule::new("Azure Sku", "Standard_B1s"),
                MatchRule::new("AzureSubscriptionId", "sub-123"),
            ]
        );
        assert_eq!(dto.entity.external_id, "");
        assert_eq!(
            serde_json::to_value(&dto.match_rules).unwrap(),
            serde_json::json!([
                {"attribute": "Azure Sku", "value": "Standard_B1s"},
                {"attribute": "AzureSubscriptionId", "value": "sub-123"},
            ])
        );

        let back = kind.from_dto(dto, None).unwrap();
        assert_eq!(
            back.config,
            TrustProviderConfig::AzureMetadata(AzureMetadata {
                sku: Some("Standard_B1s".to_string()),
                vm_id: None,
                subscription_id: Some("sub-123".to_string()),
            })
        );
    }

    #[test]
    fn two_of_five_fields_make_two_rules() {
        let kind = TrustProviderKind::new();
        let model = TrustProvider {
            record: EntityRecord::new("ci"),
            config: TrustProviderConfig::KubernetesServiceAccount(KubernetesServiceAccount {
                namespace: Some("payments".to_string()),
                service_account_name: Some("api".to_string()),
                ..Default::default()
            }),
        };
        let dto = kind.to_dto(&model, Some("tp-1")).unwrap();
        assert_eq!(
            dto.match_rules,
            vec![
                MatchRule::new("KubernetesNamespace", "payments"),
                MatchRule::new("KubernetesServiceAccountName", "api"),
            ]
        );
        assert_eq!(dto.entity.external_id, "tp-1");
        assert_eq!(dto.oidc_endpoint, None);
    }

    #[test]
    fn round_trip_keeps_flat_fields() {
        let kind = TrustProviderKind::new();
        let model = TrustProvider {
            record: EntityRecord::new("krb")
                .with_description("corp realm")
                .with_active(false)
                .with_tag("owner", "it"),
            config: TrustProviderConfig::Kerberos(Kerberos {
                agent_controller_ids: vec!["ac-1".to_string(), "ac-2".to_string()],
                principal: Some("svc/host@CORP".to_string()),
                realm: Some("CORP".to_string()),
                source_ip: None,
            }),
        };

        let dto = kind.to_dto(&model, Some("tp-7")).unwrap();
        assert_eq!(dto.agent_controller_ids, vec!["ac-1", "ac-2"]);
        assert_eq!(dto.match_rules.len(), 2);

        let back = kind.from_dto(dto, Some(&model)).unwrap();
        let mut expected = model.clone();
        expected.record.external_id = "tp-7".to_string();
        assert_eq!(back, expected);
    }

    #[test]
    fn aws_metadata_certificate_is_not_a_rule() {
        let kind = TrustProviderKind::new();
        let model = TrustProvider {
            record: EntityRecord::new("ec2"),
            config: TrustProviderConfig::AwsMetadata(AwsMetadata {
                account_id: Some("123456789012".to_string()),
                certificate: Some("-----BEGIN CERTIFICATE-----".to_string()),
                ..Default::default()
            }),
        };
        let dto = kind.to_dto(&model, None).unwrap();
        assert_eq!(dto.match_rules, vec![MatchRule::new("AwsAccountId", "123456789012")]);
        assert_eq!(dto.certificate.as_deref(), Some("-----BEGIN CERTIFICATE-----"));

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["provider"], "AWSMetadataService");
        assert_eq!(json["matchRules"][0]["attribute"], "AwsAccountId");
        assert!(json.get("agentControllerIds").is_none());

        let back = kind.from_dto(dto, None).unwrap();
        assert_eq!(back.config, model.config);
    }

    #[test]
    fn unknown_provider_type_is_conversion_error() {
        let kind = TrustProviderKind::new();
        let dto = TrustProviderDto {
            provider: "OktaIdentityToken".to_string(),
            ..Default::default()
        };
        let err = kind.from_dto(dto, None).unwrap_err();
        assert!(err.message.contains("OktaIdentityToken"));
    }

    #[test]
    fn every_variant_is_registered() {
        let kind = TrustProviderKind::new();
        let configs = [
            TrustProviderConfig::AzureMetadata(AzureMetadata::default()),
            TrustProviderConfig::AwsMetadata(AwsMetadata::default()),
            TrustProviderConfig::AwsRole(AwsRole::default()),
            TrustProviderConfig::GcpIdentity(GcpIdentity::default()),
            TrustProviderConfig::GitHubAction(GitHubAction::default()),
            TrustProviderConfig::Kerberos(Kerberos::default()),
            TrustProviderConfig::KubernetesServiceAccount(KubernetesServiceAccount::default()),
            TrustProviderConfig::TerraformWorkspace(TerraformWorkspace::default()),
        ];
        for config in &configs {
            let shape = kind.registry().shape(config.block_name()).unwrap();
            assert_eq!(
                kind.registry().variant_for(shape.discriminator).unwrap().block,
                config.block_name()
            );
        }
        assert_eq!(kind.registry().shapes().len(), configs.len());
    }

    #[test]
    fn parse_and_render_host_attributes() {
        let kind = TrustProviderKind::new();
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("gha"));
        attrs.insert(
            "github_action".to_string(),
            block(&[("repository", "acme/api"), ("workflow", "")]),
        );

        let model = kind.parse(&attrs).unwrap();
        assert_eq!(
            model.config,
            TrustProviderConfig::GitHubAction(GitHubAction {
                repository: Some("acme/api".to_string()),
                ..Default::default()
            })
        );

        let rendered = kind.render(&model);
        assert_eq!(
            rendered
                .get_map("github_action")
                .and_then(|b| b.get_string("repository")),
            Some("acme/api")
        );
        assert!(rendered.get_map("github_action").unwrap().get("workflow").is_none());
    }

    #[tokio::test]
    async fn conflicting_blocks_never_reach_the_service() {
        let client = Arc::new(InMemoryClient::<TrustProviderDto>::new("tp"));
        let handler = KindHandler::new(TrustProviderKind::new(), client.clone());

        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("both"));
        attrs.insert("azure_metadata".to_string(), block(&[("sku", "B1")]));
        attrs.insert("gcp_identity".to_string(), block(&[("email", "a@b.c")]));
        let err = handler.create(&attrs).await.unwrap_err();
        assert!(err.is_validation());

        attrs.remove("azure_metadata");
        attrs.remove("gcp_identity");
        let err = handler.create(&attrs).await.unwrap_err();
        assert!(matches!(
            err.controller_error(),
            Some(tether_core::ControllerError::Validation(
                ValidationError::MissingVariant { .. }
            ))
        ));

        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn lifecycle_against_in_memory_service() {
        let client = Arc::new(InMemoryClient::<TrustProviderDto>::new("tp").with_default_active(true));
        let controller = ResourceController::new(TrustProviderKind::new(), client.clone());

        let created = controller.create(&azure_provider()).await.unwrap();
        assert_eq!(created.record.external_id, "tp-1");

        let mut desired = created.clone();
        desired.config = TrustProviderConfig::GcpIdentity(GcpIdentity {
            email: Some("ci@project.iam.gserviceaccount.com".to_string()),
        });
        desired.record.is_active = Some(false);
        let updated = controller.update("tp-1", &desired).await.unwrap();
        assert_eq!(updated.config, desired.config);
        assert_eq!(client.record("tp-1").unwrap().provider, "GcpIdentityToken");

        controller.delete("tp-1", false).await.unwrap();
        assert_eq!(
            client.calls(),
            vec![
                Call::Create,
                Call::Update("tp-1".to_string()),
                Call::Delete("tp-1".to_string()),
            ]
        );
    }
}
