//! Credential provider
//!
//! A credential provider tells the service how to obtain the credential a
//! workload presents to a server. The wire record carries a `type`
//! discriminator and the variant's settings serialized as one JSON string in
//! `providerDetail`. Secrets (API keys, client secrets, passwords) are
//! write-only: the service omits them from responses, so they are carried
//! over from the last known local state.

use serde::{Deserialize, Serialize};
use tether_core::convert::{carry_over, decode_blob, encode_blob};
use tether_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use tether_core::{
    AttributeCodec, Attributes, AttributesExt, ConversionError, EntityDto, EntityRecord,
    ModelConverter, ResourceKind, ValidationError, Variant, VariantRegistry, VariantShape,
    WireRecord,
};

use super::entity_attributes;

pub const KIND: &str = "credential_provider";

/// Static API key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// OAuth 2.0 client credentials grant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClientCredentials {
    pub token_url: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, rename = "scope", skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernamePassword {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// HashiCorp Vault token minted from a signed identity assertion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultClientToken {
    pub subject: String,
    pub subject_type: String,
    pub lifetime: i64,
    pub vault_host: String,
    pub vault_port: i64,
    pub vault_tls: bool,
    pub vault_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_forwarding: Option<String>,
}

/// AWS STS AssumeRoleWithWebIdentity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSts {
    pub role_arn: String,
    pub lifetime: i64,
}

/// Google Cloud workload identity federation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleWorkloadIdentity {
    pub audience: String,
    pub service_account: String,
    pub lifetime: i64,
}

/// Snowflake key-pair JWT
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowflakeJwt {
    pub account_id: String,
    pub username: String,
    /// Computed by the service: the SQL statement that registers the public key
    #[serde(default, skip_serializing)]
    pub alter_user_command: Option<String>,
}

/// The one credential source a credential provider uses
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialProviderConfig {
    ApiKey(ApiKey),
    OAuthClientCredentials(OAuthClientCredentials),
    UsernamePassword(UsernamePassword),
    VaultClientToken(VaultClientToken),
    AwsSts(AwsSts),
    GoogleWorkloadIdentity(GoogleWorkloadIdentity),
    SnowflakeJwt(SnowflakeJwt),
}

fn required_string(attrs: &Attributes, key: &str) -> String {
    attrs.get_non_empty(key).unwrap_or_default()
}

impl Variant for CredentialProviderConfig {
    fn block_name(&self) -> &'static str {
        match self {
            CredentialProviderConfig::ApiKey(_) => "api_key",
            CredentialProviderConfig::OAuthClientCredentials(_) => "oauth_client_credentials",
            CredentialProviderConfig::UsernamePassword(_) => "username_password",
            CredentialProviderConfig::VaultClientToken(_) => "vault_client_token",
            CredentialProviderConfig::AwsSts(_) => "aws_sts",
            CredentialProviderConfig::GoogleWorkloadIdentity(_) => "google_workload_identity",
            CredentialProviderConfig::SnowflakeJwt(_) => "snowflake_jwt",
        }
    }

    fn from_block(block: &str, attrs: &Attributes) -> Result<Self, ValidationError> {
        let config = match block {
            "api_key" => CredentialProviderConfig::ApiKey(ApiKey {
                api_key: attrs.get_non_empty("api_key"),
            }),
            "oauth_client_credentials" => {
                CredentialProviderConfig::OAuthClientCredentials(OAuthClientCredentials {
                    token_url: required_string(attrs, "token_url"),
                    client_id: required_string(attrs, "client_id"),
                    client_secret: attrs.get_non_empty("client_secret"),
                    scopes: attrs.get_non_empty("scopes"),
                })
            }
            "username_password" => CredentialProviderConfig::UsernamePassword(UsernamePassword {
                username: required_string(attrs, "username"),
                password: attrs.get_non_empty("password"),
            }),
            "vault_client_token" => CredentialProviderConfig::VaultClientToken(VaultClientToken {
                subject: required_string(attrs, "subject"),
                subject_type: required_string(attrs, "subject_type"),
                lifetime: attrs.get_int("lifetime").unwrap_or_default(),
                vault_host: required_string(attrs, "vault_host"),
                vault_port: attrs.get_int("vault_port").unwrap_or(8200),
                vault_tls: attrs.get_bool("vault_tls").unwrap_or(true),
                vault_path: required_string(attrs, "vault_path"),
                vault_namespace: attrs.get_non_empty("vault_namespace"),
                vault_role: attrs.get_non_empty("vault_role"),
                vault_forwarding: attrs.get_non_empty("vault_forwarding"),
            }),
            "aws_sts" => CredentialProviderConfig::AwsSts(AwsSts {
                role_arn: required_string(attrs, "role_arn"),
                lifetime: attrs.get_int("lifetime").unwrap_or(3600),
            }),
            "google_workload_identity" => {
                CredentialProviderConfig::GoogleWorkloadIdentity(GoogleWorkloadIdentity {
                    audience: required_string(attrs, "audience"),
                    service_account: required_string(attrs, "service_account"),
                    lifetime: attrs.get_int("lifetime").unwrap_or(3600),
                })
            }
            "snowflake_jwt" => CredentialProviderConfig::SnowflakeJwt(SnowflakeJwt {
                account_id: required_string(attrs, "account_id"),
                username: required_string(attrs, "username"),
                alter_user_command: attrs.get_non_empty("alter_user_command"),
            }),
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
            CredentialProviderConfig::ApiKey(c) => {
                attrs.set_opt_string("api_key", c.api_key.as_deref());
            }
            CredentialProviderConfig::OAuthClientCredentials(c) => {
                attrs.set_opt_string("token_url", Some(&c.token_url));
                attrs.set_opt_string("client_id", Some(&c.client_id));
                attrs.set_opt_string("client_secret", c.client_secret.as_deref());
                attrs.set_opt_string("scopes", c.scopes.as_deref());
            }
            CredentialProviderConfig::UsernamePassword(c) => {
                attrs.set_opt_string("username", Some(&c.username));
                attrs.set_opt_string("password", c.password.as_deref());
            }
            CredentialProviderConfig::VaultClientToken(c) => {
                attrs.set_opt_string("subject", Some(&c.subject));
                attrs.set_opt_string("subject_type", Some(&c.subject_type));
                attrs.set_opt("lifetime", Some(c.lifetime));
                attrs.set_opt_string("vault_host", Some(&c.vault_host));
                attrs.set_opt("vault_port", Some(c.vault_port));
                attrs.set_opt("vault_tls", Some(c.vault_tls));
                attrs.set_opt_string("vault_path", Some(&c.vault_path));
                attrs.set_opt_string("vault_namespace", c.vault_namespace.as_deref());
                attrs.set_opt_string("vault_role", c.vault_role.as_deref());
                attrs.set_opt_string("vault_forwarding", c.vault_forwarding.as_deref());
            }
            CredentialProviderConfig::AwsSts(c) => {
                attrs.set_opt_string("role_arn", Some(&c.role_arn));
                attrs.set_opt("lifetime", Some(c.lifetime));
            }
            CredentialProviderConfig::GoogleWorkloadIdentity(c) => {
                attrs.set_opt_string("audience", Some(&c.audience));
                attrs.set_opt_string("service_account", Some(&c.service_account));
                attrs.set_opt("lifetime", Some(c.lifetime));
            }
            CredentialProviderConfig::SnowflakeJwt(c) => {
                attrs.set_opt_string("account_id", Some(&c.account_id));
                attrs.set_opt_string("username", Some(&c.username));
                attrs.set_opt_string("alter_user_command", c.alter_user_command.as_deref());
            }
        }
        attrs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CredentialProvider {
    pub record: EntityRecord,
    pub config: CredentialProviderConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProviderDto {
    #[serde(flatten)]
    pub entity: EntityDto,
    /// Discriminator
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Variant settings as a serialized JSON document
    #[serde(default)]
    pub provider_detail: String,
}

impl WireRecord for CredentialProviderDto {
    fn entity(&self) -> &EntityDto {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut EntityDto {
        &mut self.entity
    }
}

fn string_field(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

fn lifetime_field() -> AttributeSchema {
    AttributeSchema::new("lifetime", types::positive_int())
        .with_description("Credential lifetime in seconds")
}

fn registry() -> VariantRegistry {
    VariantRegistry::new(KIND)
        .variant(
            VariantShape::new("api_key", "apikey")
                .with_description("Static API key")
                .field(string_field("api_key").required().sensitive()),
        )
        .variant(
            VariantShape::new("oauth_client_credentials", "oauth-client-credential")
                .field(AttributeSchema::new("token_url", types::url()).required())
                .field(string_field("client_id").required())
                .field(string_field("client_secret").required().sensitive())
                .field(string_field("scopes").with_description("Space separated scopes")),
        )
        .variant(
            VariantShape::new("username_password", "username-password")
                .field(string_field("username").required())
                .field(string_field("password").required().sensitive()),
        )
        .variant(
            VariantShape::new("vault_client_token", "vaultClientToken")
                .field(string_field("subject").required())
                .field(
                    AttributeSchema::new(
                        "subject_type",
                        AttributeType::Enum(vec!["literal".to_string(), "dynamic".to_string()]),
                    )
                    .required(),
                )
                .field(lifetime_field().required())
                .field(string_field("vault_host").required())
                .field(AttributeSchema::new("vault_port", types::port()))
                .field(AttributeSchema::new("vault_tls", AttributeType::Bool))
                .field(string_field("vault_path").required())
                .field(string_field("vault_namespace"))
                .field(string_field("vault_role"))
                .field(
                    AttributeSchema::new(
                        "vault_forwarding",
                        AttributeType::Enum(vec![
                            "unconditional".to_string(),
                            "conditional".to_string(),
                        ]),
                    ),
                ),
        )
        .variant(
            VariantShape::new("aws_sts", "aws-sts-oidc")
                .field(AttributeSchema::new("role_arn", role_arn_type()).required())
                .field(lifetime_field()),
        )
        .variant(
            VariantShape::new("google_workload_identity", "gcp-identity-federation")
                .field(string_field("audience").required())
                .field(string_field("service_account").required())
                .field(lifetime_field()),
        )
        .variant(
            VariantShape::new("snowflake_jwt", "signed-jwt")
                .field(string_field("account_id").required())
                .field(string_field("username").required())
                .field(
                    string_field("alter_user_command")
                        .computed()
                        .with_description("SQL that registers the key pair (read-only)"),
                ),
        )
}

/// IAM role ARN (e.g., "arn:aws:iam::123456789012:role/deploy")
fn role_arn_type() -> AttributeType {
    AttributeType::Custom {
        name: "RoleArn".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value.as_str() {
            Some(arn) => crate::utils::validate_role_arn(arn),
            None => Err("Expected string".to_string()),
        },
    }
}

/// Conversion and lifecycle rules for credential providers
pub struct CredentialProviderKind {
    registry: VariantRegistry,
}

impl CredentialProviderKind {
    pub fn new() -> Self {
        Self {
            registry: registry(),
        }
    }

    pub fn registry(&self) -> &VariantRegistry {
        &self.registry
    }

    fn decode_detail(
        &self,
        block: &str,
        detail: &str,
    ) -> Result<CredentialProviderConfig, ConversionError> {
        let config = match block {
            "api_key" => CredentialProviderConfig::ApiKey(decode_blob(KIND, detail)?),
            "oauth_client_credentials" => {
                CredentialProviderConfig::OAuthClientCredentials(decode_blob(KIND, detail)?)
            }
            "username_password" => {
                CredentialProviderConfig::UsernamePassword(decode_blob(KIND, detail)?)
            }
            "vault_client_token" => {
                CredentialProviderConfig::VaultClientToken(decode_blob(KIND, detail)?)
            }
            "aws_sts" => CredentialProviderConfig::AwsSts(decode_blob(KIND, detail)?),
            "google_workload_identity" => {
                CredentialProviderConfig::GoogleWorkloadIdentity(decode_blob(KIND, detail)?)
            }
            "snowflake_jwt" => CredentialProviderConfig::SnowflakeJwt(decode_blob(KIND, detail)?),
            other => {
                return Err(ConversionError::new(
                    KIND,
                    format!("no decoder for variant '{}'", other),
                ));
            }
        };
        Ok(config)
    }
}

impl Default for CredentialProviderKind {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_detail(config: &CredentialProviderConfig) -> Result<String, ConversionError> {
    match config {
        CredentialProviderConfig::ApiKey(c) => encode_blob(KIND, c),
        CredentialProviderConfig::OAuthClientCredentials(c) => encode_blob(KIND, c),
        CredentialProviderConfig::UsernamePassword(c) => encode_blob(KIND, c),
        CredentialProviderConfig::VaultClientToken(c) => encode_blob(KIND, c),
        CredentialProviderConfig::AwsSts(c) => encode_blob(KIND, c),
        CredentialProviderConfig::GoogleWorkloadIdentity(c) => encode_blob(KIND, c),
        CredentialProviderConfig::SnowflakeJwt(c) => encode_blob(KIND, c),
    }
}

impl ModelConverter for CredentialProviderKind {
    type Model = CredentialProvider;
    type Dto = CredentialProviderDto;

    fn to_dto(
        &self,
        model: &CredentialProvider,
        prior_external_id: Option<&str>,
    ) -> Result<CredentialProviderDto, ConversionError> {
        let provider_type = self
            .registry
            .discriminator_for(model.config.block_name())
            .ok_or_else(|| {
                ConversionError::new(
                    KIND,
                    format!("no variant registered for '{}'", model.config.block_name()),
                )
            })?;

        Ok(CredentialProviderDto {
            entity: model.record.to_dto(prior_external_id),
            provider_type: provider_type.to_string(),
            provider_detail: encode_detail(&model.config)?,
        })
    }

    fn from_dto(
        &self,
        dto: CredentialProviderDto,
        prior: Option<&CredentialProvider>,
    ) -> Result<CredentialProvider, ConversionError> {
        let shape = self
            .registry
            .variant_for(&dto.provider_type)
            .ok_or_else(|| ConversionError::unknown_discriminator(KIND, &dto.provider_type))?;

        let mut config = self.decode_detail(shape.block, &dto.provider_detail)?;

        if let Some(prior) = prior.filter(|p| p.config.block_name() == shape.block) {
            let mut block = config.to_block();
            carry_over(shape, &mut block, &prior.config.to_block());
            config = CredentialProviderConfig::from_block(shape.block, &block)
                .map_err(|e| ConversionError::new(KIND, e.to_string()))?;
        }

        Ok(CredentialProvider {
            record: EntityRecord::from_dto(&dto.entity),
            config,
        })
    }
}

impl ResourceKind for CredentialProviderKind {
    const NAME: &'static str = KIND;

    fn record<'a>(&self, model: &'a CredentialProvider) -> &'a EntityRecord {
        &model.record
    }
}

impl AttributeCodec for CredentialProviderKind {
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(KIND)
            .with_description("Source of the credential a workload presents to a server")
            .attributes(entity_attributes())
            .attributes(self.registry.schema_attributes())
    }

    fn parse(&self, attrs: &Attributes) -> Result<CredentialProvider, ValidationError> {
        Ok(CredentialProvider {
            record: EntityRecord::from_attributes(attrs)?,
            config: self.registry.parse(attrs)?,
        })
    }

    fn render(&self, model: &CredentialProvider) -> Attributes {
        let mut attrs = Attributes::new();
        model.record.write_attributes(&mut attrs);
        self.registry.render(&model.config, &mut attrs);
        attrs
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tether_core::memory::InMemoryClient;
    use tether_core::{ControllerError, KindHandler, ResourceController, ResourceHandler, Value};

    use super::*;

    fn oauth(secret: Option<&str>) -> CredentialProvider {
        CredentialProvider {
            record: EntityRecord::new("billing-api").with_tag("team", "payments"),
            config: CredentialProviderConfig::OAuthClientCredentials(OAuthClientCredentials {
                token_url: "https://login.example.com/oauth/token".to_string(),
                client_id: "billing".to_string(),
                client_secret: secret.map(|s| s.to_string()),
                scopes: Some("read write".to_string()),
            }),
        }
    }

    /// The service never echoes secrets back
    fn strip_secrets(mut dto: CredentialProviderDto) -> CredentialProviderDto {
        if let Ok(mut detail) = serde_json::from_str::<serde_json::Value>(&dto.provider_detail)
            && let Some(obj) = detail.as_object_mut()
        {
            for key in ["apiKey", "clientSecret", "password"] {
                obj.remove(key);
            }
            dto.provider_detail = detail.to_string();
        }
        dto
    }

    #[test]
    fn detail_is_embedded_as_json_string() {
        let kind = CredentialProviderKind::new();
        let dto = kind.to_dto(&oauth(Some("s3cr3t")), None).unwrap();

        assert_eq!(dto.provider_type, "oauth-client-credential");
        let detail: serde_json::Value = serde_json::from_str(&dto.provider_detail).unwrap();
        assert_eq!(detail["tokenUrl"], "https://login.example.com/oauth/token");
        assert_eq!(detail["clientSecret"], "s3cr3t");
        assert_eq!(detail["scope"], "read write");

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["type"], "oauth-client-credential");
        assert!(json["providerDetail"].is_string());
    }

    #[test]
    fn missing_secret_is_taken_from_prior() {
        let kind = CredentialProviderKind::new();
        let prior = oauth(Some("s3cr3t"));
        let response = strip_secrets(kind.to_dto(&prior, Some("cp-1")).unwrap());

        let model = kind.from_dto(response.clone(), Some(&prior)).unwrap();
        assert_eq!(model.config, prior.config);
        assert_eq!(model.record.external_id, "cp-1");

        // without prior state the secret is simply unknown
        let imported = kind.from_dto(response, None).unwrap();
        assert_eq!(imported.config, oauth(None).config);
    }

    #[test]
    fn prior_of_another_variant_is_ignored() {
        let kind = CredentialProviderKind::new();
        let prior = CredentialProvider {
            record: EntityRecord::new("x"),
            config: CredentialProviderConfig::UsernamePassword(UsernamePassword {
                username: "svc".to_string(),
                password: Some("pw".to_string()),
            }),
        };
        let dto = CredentialProviderDto {
            entity: EntityDto {
                name: "x".to_string(),
                ..Default::default()
            },
            provider_type: "apikey".to_string(),
            provider_detail: "{}".to_string(),
        };
        let model = kind.from_dto(dto, Some(&prior)).unwrap();
        assert_eq!(
            model.config,
            CredentialProviderConfig::ApiKey(ApiKey { api_key: None })
        );
    }

    #[test]
    fn malformed_detail_is_a_conversion_error() {
        let kind = CredentialProviderKind::new();
        let dto = CredentialProviderDto {
            provider_type: "vaultClientToken".to_string(),
            provider_detail: "{\"subject\": 12".to_string(),
            ..Default::default()
        };
        let err = kind.from_dto(dto, None).unwrap_err();
        assert_eq!(err.kind, KIND);
        assert!(err.message.contains("malformed"));
    }

    #[test]
    fn snowflake_command_survives_a_response_without_it() {
        let kind = CredentialProviderKind::new();
        let model = CredentialProvider {
            record: EntityRecord::new("warehouse")
                .with_description("nightly loads")
                .with_tag("team", "data"),
            config: CredentialProviderConfig::SnowflakeJwt(SnowflakeJwt {
                account_id: "acme-xy12345".to_string(),
                username: "LOADER".to_string(),
                alter_user_command: Some("ALTER USER LOADER SET RSA_PUBLIC_KEY='MII'".to_string()),
            }),
        };

        let dto = kind.to_dto(&model, Some("cp-1")).unwrap();
        let back = kind.from_dto(dto, Some(&model)).unwrap();

        let mut expected = model.clone();
        expected.record.external_id = "cp-1".to_string();
        assert_eq!(back, expected);
    }

    #[test]
    fn full_round_trip_with_prior_state() {
        let kind = CredentialProviderKind::new();
        let model = oauth(Some("s3cr3t"));

        let dto = strip_secrets(kind.to_dto(&model, Some("cp-7")).unwrap());
        let back = kind.from_dto(dto, Some(&model)).unwrap();

        let mut expected = model.clone();
        expected.record.external_id = "cp-7".to_string();
        assert_eq!(back, expected);
    }

    #[test]
    fn snowflake_command_is_read_only() {
        let kind = CredentialProviderKind::new();
        let model = CredentialProvider {
            record: EntityRecord::new("warehouse"),
            config: CredentialProviderConfig::SnowflakeJwt(SnowflakeJwt {
                account_id: "acme-xy12345".to_string(),
                username: "LOADER".to_string(),
                alter_user_command: Some("stale".to_string()),
            }),
        };
        let dto = kind.to_dto(&model, None).unwrap();
        assert!(!dto.provider_detail.contains("alterUserCommand"));

        let response = CredentialProviderDto {
            provider_detail: r#"{"accountId":"acme-xy12345","username":"LOADER","alterUserCommand":"ALTER USER LOADER SET RSA_PUBLIC_KEY='MII'"}"#.to_string(),
            ..dto
        };
        let back = kind.from_dto(response, Some(&model)).unwrap();
        match back.config {
            CredentialProviderConfig::SnowflakeJwt(c) => {
                assert!(c.alter_user_command.unwrap().starts_with("ALTER USER LOADER"));
            }
            other => panic!("Expected SnowflakeJwt, got {:?}", other),
        }
    }

    #[test]
    fn host_block_round_trip() {
        let kind = CredentialProviderKind::new();
        let model = CredentialProvider {
            record: EntityRecord::new("vault").with_active(true),
            config: CredentialProviderConfig::VaultClientToken(VaultClientToken {
                subject: "app".to_string(),
                subject_type: "literal".to_string(),
                lifetime: 900,
                vault_host: "vault.internal".to_string(),
                vault_port: 8200,
                vault_tls: true,
                vault_path: "/auth/jwt".to_string(),
                vault_namespace: None,
                vault_role: Some("app".to_string()),
                vault_forwarding: None,
            }),
        };

        let attrs = kind.render(&model);
        assert!(kind.schema().validate(&attrs).is_ok());
        assert_eq!(kind.parse(&attrs).unwrap(), model);
    }

    #[test]
    fn schema_rejects_bad_role_arn() {
        let kind = CredentialProviderKind::new();
        let mut block = Attributes::new();
        block.insert("role_arn".to_string(), Value::from("not-an-arn"));
        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("sts"));
        attrs.insert("aws_sts".to_string(), Value::Map(block));

        assert!(kind.schema().validate(&attrs).is_err());
        assert!(matches!(
            kind.parse(&attrs),
            Err(ValidationError::Schema(_))
        ));
    }

    #[test]
    fn secrets_are_declared_sensitive() {
        let kind = CredentialProviderKind::new();
        let secrets: Vec<&str> = kind
            .registry()
            .shapes()
            .iter()
            .flat_map(|s| s.secret_fields())
            .collect();
        assert_eq!(secrets, vec!["api_key", "client_secret", "password"]);

        let carried: Vec<&str> = kind
            .registry()
            .shapes()
            .iter()
            .flat_map(|s| s.carried_fields())
            .collect();
        assert_eq!(
            carried,
            vec!["api_key", "client_secret", "password", "alter_user_command"]
        );
    }

    #[tokio::test]
    async fn conflicting_blocks_never_reach_the_service() {
        let client = Arc::new(InMemoryClient::<CredentialProviderDto>::new("cp"));
        let handler = KindHandler::new(CredentialProviderKind::new(), client.clone());

        let mut api_key = Attributes::new();
        api_key.insert("api_key".to_string(), Value::from("k"));
        let mut login = Attributes::new();
        login.insert("username".to_string(), Value::from("svc"));
        login.insert("password".to_string(), Value::from("pw"));

        let mut attrs = Attributes::new();
        attrs.insert("name".to_string(), Value::from("both"));
        attrs.insert("api_key".to_string(), Value::Map(api_key));
        attrs.insert("username_password".to_string(), Value::Map(login));
        let err = handler.create(&attrs).await.unwrap_err();
        assert!(err.is_validation());

        attrs.remove("api_key");
        attrs.remove("username_password");
        let err = handler.create(&attrs).await.unwrap_err();
        assert!(matches!(
            err.controller_error(),
            Some(ControllerError::Validation(ValidationError::MissingVariant { .. }))
        ));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn update_keeps_secret_the_service_withholds() {
        let client = Arc::new(
            InMemoryClient::<CredentialProviderDto>::new("cp").with_response_filter(strip_secrets),
        );
        let controller = ResourceController::new(CredentialProviderKind::new(), client.clone());

        let created = controller.create(&oauth(Some("s3cr3t"))).await.unwrap();
        assert_eq!(created.config, oauth(Some("s3cr3t")).config);

        let refreshed = controller.read("cp-1", Some(&created)).await.unwrap();
        assert_eq!(refreshed, created);

        let mut desired = created.clone();
        desired.record.description = Some("rotated".to_string());
        let updated = controller.update("cp-1", &desired).await.unwrap();
        assert_eq!(updated.config, created.config);
        assert_eq!(updated.record.description.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn corrupt_remote_detail_surfaces_on_read() {
        let client = Arc::new(InMemoryClient::<CredentialProviderDto>::new("cp"));
        client.insert(CredentialProviderDto {
            entity: EntityDto {
                external_id: "cp-9".to_string(),
                name: "legacy".to_string(),
                ..Default::default()
            },
            provider_type: "apikey".to_string(),
            provider_detail: "not json".to_string(),
        });
        let controller = ResourceController::new(CredentialProviderKind::new(), client);

        assert!(matches!(
            controller.import("cp-9").await,
            Err(ControllerError::Conversion(_))
        ));
    }
}
