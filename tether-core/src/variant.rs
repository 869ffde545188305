//! Variant - Closed sets of mutually exclusive configuration shapes
//!
//! A resource kind such as a trust provider carries exactly one type-specific
//! configuration block. At the host boundary every block is a separate
//! optional attribute; inside the crate the chosen block becomes a Rust enum.
//! The registry is the bridge: it knows every block name, the discriminator
//! the remote service uses for it, and the schema of its fields.

use crate::error::ValidationError;
use crate::resource::{Attributes, Value};
use crate::schema::{AttributeSchema, AttributeType};

/// A typed variant enum for one resource kind
pub trait Variant: Sized {
    /// Host block name of the populated variant (e.g. "azure_metadata")
    fn block_name(&self) -> &'static str;

    /// Build the variant from the attributes of `block`
    fn from_block(block: &str, attrs: &Attributes) -> Result<Self, ValidationError>;

    /// Render the variant's fields as block attributes; unset fields are omitted
    fn to_block(&self) -> Attributes;
}

/// One named variant: its host block, wire discriminator and fields
#[derive(Debug, Clone)]
pub struct VariantShape {
    pub block: &'static str,
    pub discriminator: &'static str,
    pub fields: Vec<AttributeSchema>,
    pub description: Option<String>,
}

impl VariantShape {
    pub fn new(block: &'static str, discriminator: &'static str) -> Self {
        Self {
            block,
            discriminator,
            fields: Vec::new(),
            description: None,
        }
    }

    pub fn field(mut self, schema: AttributeSchema) -> Self {
        self.fields.push(schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Field whose wire name is `provider_name`
    pub fn field_by_provider_name(&self, provider_name: &str) -> Option<&AttributeSchema> {
        self.fields
            .iter()
            .find(|f| f.provider_name.as_deref() == Some(provider_name))
    }

    /// Names of fields the remote service never returns
    pub fn secret_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.sensitive)
            .map(|f| f.name.as_str())
    }

    /// Names of fields a response may leave out: secrets and server-computed values
    pub fn carried_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.sensitive || f.computed)
            .map(|f| f.name.as_str())
    }

    /// Attribute schema describing this variant as an optional host block
    pub fn block_schema(&self) -> AttributeSchema {
        let schema = AttributeSchema::new(self.block, AttributeType::Block(self.fields.clone()));
        match &self.description {
            Some(desc) => schema.with_description(desc.clone()),
            None => schema,
        }
    }
}

/// Variant declarations for one resource kind
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    kind: &'static str,
    shapes: Vec<VariantShape>,
}

impl VariantRegistry {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            shapes: Vec::new(),
        }
    }

    pub fn variant(mut self, shape: VariantShape) -> Self {
        self.shapes.push(shape);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn shapes(&self) -> &[VariantShape] {
        &self.shapes
    }

    /// Shape selected by a wire discriminator
    pub fn variant_for(&self, discriminator: &str) -> Option<&VariantShape> {
        self.shapes.iter().find(|s| s.discriminator == discriminator)
    }

    /// Shape declared for a host block
    pub fn shape(&self, block: &str) -> Option<&VariantShape> {
        self.shapes.iter().find(|s| s.block == block)
    }

    /// Wire discriminator for a populated host block
    pub fn discriminator_for(&self, block: &str) -> Option<&'static str> {
        self.shape(block).map(|s| s.discriminator)
    }

    /// Find the single populated variant block in `attrs`
    pub fn resolve(&self, attrs: &Attributes) -> Result<&VariantShape, ValidationError> {
        let populated: Vec<&VariantShape> = self
            .shapes
            .iter()
            .filter(|s| matches!(attrs.get(s.block), Some(Value::Map(_))))
            .collect();

        match populated.as_slice() {
            [shape] => Ok(shape),
            [] => Err(ValidationError::MissingVariant {
                kind: self.kind.to_string(),
                expected: self.block_names(),
            }),
            many => Err(ValidationError::ConflictingVariants {
                kind: self.kind.to_string(),
                expected: self.block_names(),
                found: many.iter().map(|s| s.block.to_string()).collect(),
            }),
        }
    }

    /// Resolve, type check and build the typed variant
    pub fn parse<V: Variant>(&self, attrs: &Attributes) -> Result<V, ValidationError> {
        let shape = self.resolve(attrs)?;
        let value = attrs
            .get(shape.block)
            .ok_or_else(|| ValidationError::MissingVariant {
                kind: self.kind.to_string(),
                expected: self.block_names(),
            })?;
        AttributeType::Block(shape.fields.clone())
            .validate(value)
            .map_err(|e| ValidationError::Schema(vec![e]))?;

        let block = value.as_map().ok_or_else(|| ValidationError::MissingVariant {
            kind: self.kind.to_string(),
            expected: self.block_names(),
        })?;
        V::from_block(shape.block, block)
    }

    /// Write the populated variant into host attributes as its block
    pub fn render<V: Variant>(&self, variant: &V, attrs: &mut Attributes) {
        attrs.insert(
            variant.block_name().to_string(),
            Value::Map(variant.to_block()),
        );
    }

    /// One optional block attribute per variant, for the kind's resource schema
    pub fn schema_attributes(&self) -> Vec<AttributeSchema> {
        self.shapes.iter().map(VariantShape::block_schema).collect()
    }

    fn block_names(&self) -> Vec<String> {
        self.shapes.iter().map(|s| s.block.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AttributesExt;

    #[derive(Debug, PartialEq)]
    enum Shape {
        Circle { radius: i64 },
        Label { text: String },
    }

    impl Variant for Shape {
        fn block_name(&self) -> &'static str {
            match self {
                Shape::Circle { .. } => "circle",
                Shape::Label { .. } => "label",
            }
        }

        fn from_block(block: &str, attrs: &Attributes) -> Result<Self, ValidationError> {
            match block {
                "circle" => Ok(Shape::Circle {
                    radius: attrs.get_int("radius").unwrap_or_default(),
                }),
                _ => Ok(Shape::Label {
                    text: attrs.get_non_empty("text").unwrap_or_default(),
                }),
            }
        }

        fn to_block(&self) -> Attributes {
            let mut attrs = Attributes::new();
            match self {
                Shape::Circle { radius } => attrs.set_opt("radius", Some(*radius)),
                Shape::Label { text } => attrs.set_opt_string("text", Some(text)),
            }
            attrs
        }
    }

    fn registry() -> VariantRegistry {
        VariantRegistry::new("drawing")
            .variant(
                VariantShape::new("circle", "Circle")
                    .field(AttributeSchema::new("radius", AttributeType::Int).required()),
            )
            .variant(
                VariantShape::new("label", "TextLabel").field(
                    AttributeSchema::new("text", AttributeType::String)
                        .with_provider_name("Text")
                        .sensitive(),
                ),
            )
    }

    fn block(pairs: &[(&str, Value)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn lookups_by_discriminator_and_block() {
        let registry = registry();
        assert_eq!(registry.variant_for("TextLabel").unwrap().block, "label");
        assert!(registry.variant_for("Square").is_none());
        assert_eq!(registry.discriminator_for("circle"), Some("Circle"));
        assert_eq!(registry.discriminator_for("square"), None);
    }

    #[test]
    fn resolve_requires_a_variant() {
        let attrs = Attributes::new();
        let err = registry().resolve(&attrs).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingVariant {
                kind: "drawing".to_string(),
                expected: vec!["circle".to_string(), "label".to_string()],
            }
        );
    }

    #[test]
    fn resolve_rejects_two_variants() {
        let mut attrs = Attributes::new();
        attrs.insert("circle".to_string(), block(&[("radius", Value::Int(2))]));
        attrs.insert("label".to_string(), block(&[("text", "hi".into())]));

        match registry().resolve(&attrs) {
            Err(ValidationError::ConflictingVariants { found, .. }) => {
                assert_eq!(found, vec!["circle".to_string(), "label".to_string()]);
            }
            other => panic!("Expected ConflictingVariants, got {:?}", other),
        }
    }

    #[test]
    fn non_map_block_counts_as_unset() {
        let mut attrs = Attributes::new();
        attrs.insert("circle".to_string(), Value::List(vec![]));
        attrs.insert("label".to_string(), block(&[("text", "hi".into())]));
        assert_eq!(registry().resolve(&attrs).unwrap().block, "label");
    }

    #[test]
    fn parse_builds_typed_variant() {
        let mut attrs = Attributes::new();
        attrs.insert("circle".to_string(), block(&[("radius", Value::Int(3))]));
        let shape: Shape = registry().parse(&attrs).unwrap();
        assert_eq!(shape, Shape::Circle { radius: 3 });
    }

    #[test]
    fn parse_type_checks_block() {
        let mut attrs = Attributes::new();
        attrs.insert("circle".to_string(), block(&[("radius", "big".into())]));
        assert!(matches!(
            registry().parse::<Shape>(&attrs),
            Err(ValidationError::Schema(_))
        ));
    }

    #[test]
    fn render_writes_block() {
        let mut attrs = Attributes::new();
        registry().render(&Shape::Label { text: "x".into() }, &mut attrs);
        assert_eq!(
            attrs.get_map("label").and_then(|m| m.get_string("text")),
            Some("x")
        );
    }

    #[test]
    fn shape_metadata() {
        let registry = registry();
        let label = registry.shape("label").unwrap();
        assert_eq!(label.field_by_provider_name("Text").unwrap().name, "text");
        assert_eq!(label.secret_fields().collect::<Vec<_>>(), vec!["text"]);
        assert_eq!(label.carried_fields().collect::<Vec<_>>(), vec!["text"]);
        assert_eq!(registry.shape("circle").unwrap().carried_fields().count(), 0);
        assert_eq!(registry.schema_attributes().len(), 2);
    }
}
