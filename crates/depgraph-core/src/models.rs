//! Shared typed models used across classification, reconciliation and storage.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GraphResult;
use crate::identity::{generate_id, EntityKey};

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// Kind of a persisted graph entity. The ID prefix of every entity encodes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Package,
    /// Class, interface, enum, annotation-type or record declaration.
    Class,
    Method,
    Field,
    Repository,
    SubProject,
    AnnotationUsage,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Package,
        EntityKind::Class,
        EntityKind::Method,
        EntityKind::Field,
        EntityKind::Repository,
        EntityKind::SubProject,
        EntityKind::AnnotationUsage,
    ];

    /// ID prefix (the text before the first `:`).
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Package => "pkg",
            EntityKind::Class => "cls",
            EntityKind::Method => "mth",
            EntityKind::Field => "fld",
            EntityKind::Repository => "repo",
            EntityKind::SubProject => "sub",
            EntityKind::AnnotationUsage => "annu",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Package => "Package",
            EntityKind::Class => "Class",
            EntityKind::Method => "Method",
            EntityKind::Field => "Field",
            EntityKind::Repository => "Repository",
            EntityKind::SubProject => "SubProject",
            EntityKind::AnnotationUsage => "AnnotationUsage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete flavour of a [`EntityKind::Class`] declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
}

impl DeclarationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Annotation => "annotation",
            DeclarationKind::Record => "record",
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// A single attribute value. The variant is the attribute's declared type;
/// a variant mismatch between stored and incoming values is a conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Text(_) => "text",
            PropertyValue::List(_) => "list",
            PropertyValue::Map(_) => "map",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::List(v)
    }
}

impl From<BTreeMap<String, String>> for PropertyValue {
    fn from(v: BTreeMap<String, String>) -> Self {
        PropertyValue::Map(v)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// Small builder that skips `None` values so absent attributes stay absent.
#[derive(Default)]
struct PropertyBuilder(Properties);

impl PropertyBuilder {
    fn set(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    fn set_opt<V: Into<PropertyValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(name, v),
            None => self,
        }
    }

    fn location(self, location: Option<&SourceLocation>) -> Self {
        match location {
            Some(loc) => self
                .set("file_path", loc.file_path.as_str())
                .set("start_line", loc.start_line)
                .set("end_line", loc.end_line),
            None => self,
        }
    }

    fn build(self) -> Properties {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Source span of a declaration, relative to the repository root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file_path: String,
    pub start_line: i64,
    pub end_line: i64,
}

/// Kind-erased entity as handed to the reconciliation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    /// Placeholder created from a forward reference.
    pub provisional: bool,
    pub properties: Properties,
}

impl Entity {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_text)
    }

    /// Set the `indexed_at` audit timestamp.
    pub fn stamped(mut self, indexed_at: &str) -> Self {
        self.properties
            .insert("indexed_at".to_string(), indexed_at.into());
        self
    }
}

/// Typed view of one entity kind. Attribute extraction is explicit per kind.
pub trait GraphEntity {
    fn key(&self) -> EntityKey;

    fn properties(&self) -> Properties;

    fn provisional(&self) -> bool {
        false
    }

    fn to_entity(&self) -> GraphResult<Entity> {
        let key = self.key();
        Ok(Entity {
            id: generate_id(&key)?,
            kind: key.kind(),
            provisional: self.provisional(),
            properties: self.properties(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PackageEntity {
    pub name: String,
    pub is_external: bool,
    pub provisional: bool,
}

impl GraphEntity for PackageEntity {
    fn key(&self) -> EntityKey {
        EntityKey::Package {
            package: self.name.clone(),
        }
    }

    fn properties(&self) -> Properties {
        PropertyBuilder::default()
            .set("name", self.name.as_str())
            .set("is_external", self.is_external)
            .build()
    }

    fn provisional(&self) -> bool {
        self.provisional
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassEntity {
    pub package: String,
    /// Binary simple name, nested types joined with `$`.
    pub name: String,
    pub qualified_name: String,
    pub declaration_kind: Option<DeclarationKind>,
    pub visibility: Option<String>,
    pub modifiers: Vec<String>,
    pub type_parameters: Vec<String>,
    pub outer_class_id: Option<String>,
    pub is_external: bool,
    pub location: Option<SourceLocation>,
    pub provisional: bool,
}

impl ClassEntity {
    /// Placeholder for a referenced type whose declaration is not (yet) known.
    pub fn placeholder(package: &str, name: &str, qualified_name: &str, is_external: bool) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
            qualified_name: qualified_name.to_string(),
            declaration_kind: None,
            visibility: None,
            modifiers: Vec::new(),
            type_parameters: Vec::new(),
            outer_class_id: None,
            is_external,
            location: None,
            provisional: true,
        }
    }
}

impl GraphEntity for ClassEntity {
    fn key(&self) -> EntityKey {
        EntityKey::Class {
            package: self.package.clone(),
            name: self.name.clone(),
        }
    }

    fn properties(&self) -> Properties {
        let simple = self.name.rsplit('$').next().unwrap_or(&self.name);
        PropertyBuilder::default()
            .set("name", simple)
            .set("binary_name", self.name.as_str())
            .set("qualified_name", self.qualified_name.as_str())
            .set("package", self.package.as_str())
            .set_opt("declaration_kind", self.declaration_kind.map(|k| k.as_str()))
            .set_opt("visibility", self.visibility.clone())
            .set("modifiers", self.modifiers.clone())
            .set("type_parameters", self.type_parameters.clone())
            .set_opt("outer_class_id", self.outer_class_id.clone())
            .set("is_external", self.is_external)
            .location(self.location.as_ref())
            .build()
    }

    fn provisional(&self) -> bool {
        self.provisional
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodEntity {
    pub class_id: String,
    pub name: String,
    pub return_type: Option<String>,
    pub parameter_names: Vec<String>,
    pub parameter_types: Vec<String>,
    pub visibility: Option<String>,
    pub modifiers: Vec<String>,
    pub type_parameters: Vec<String>,
    pub is_constructor: bool,
    pub location: Option<SourceLocation>,
}

impl MethodEntity {
    /// Identity member name; constructors share `<init>`.
    pub fn member_name(&self) -> &str {
        if self.is_constructor {
            "<init>"
        } else {
            &self.name
        }
    }

    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .parameter_types
            .iter()
            .zip(self.parameter_names.iter())
            .map(|(t, n)| format!("{t} {n}"))
            .collect();
        match &self.return_type {
            Some(ret) => format!("{ret} {}({})", self.name, params.join(", ")),
            None => format!("{}({})", self.name, params.join(", ")),
        }
    }
}

impl GraphEntity for MethodEntity {
    fn key(&self) -> EntityKey {
        EntityKey::Method {
            class_id: self.class_id.clone(),
            name: self.member_name().to_string(),
            parameter_types: self.parameter_types.clone(),
        }
    }

    fn properties(&self) -> Properties {
        PropertyBuilder::default()
            .set("name", self.name.as_str())
            .set("class_id", self.class_id.as_str())
            .set("signature", self.signature())
            .set_opt("return_type", self.return_type.clone())
            .set("parameter_names", self.parameter_names.clone())
            .set("parameter_types", self.parameter_types.clone())
            .set_opt("visibility", self.visibility.clone())
            .set("modifiers", self.modifiers.clone())
            .set("type_parameters", self.type_parameters.clone())
            .set("is_constructor", self.is_constructor)
            .location(self.location.as_ref())
            .build()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldEntity {
    pub class_id: String,
    pub name: String,
    pub type_name: Option<String>,
    pub visibility: Option<String>,
    pub modifiers: Vec<String>,
    pub is_external: bool,
    pub location: Option<SourceLocation>,
    pub provisional: bool,
}

impl GraphEntity for FieldEntity {
    fn key(&self) -> EntityKey {
        EntityKey::Field {
            class_id: self.class_id.clone(),
            name: self.name.clone(),
        }
    }

    fn properties(&self) -> Properties {
        PropertyBuilder::default()
            .set("name", self.name.as_str())
            .set("class_id", self.class_id.as_str())
            .set_opt("type_name", self.type_name.clone())
            .set_opt("visibility", self.visibility.clone())
            .set("modifiers", self.modifiers.clone())
            .set("is_external", self.is_external)
            .location(self.location.as_ref())
            .build()
    }

    fn provisional(&self) -> bool {
        self.provisional
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryEntity {
    pub name: String,
    pub path: String,
    pub remote_url: Option<String>,
    pub default_branch: Option<String>,
}

impl GraphEntity for RepositoryEntity {
    fn key(&self) -> EntityKey {
        EntityKey::Repository {
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    fn properties(&self) -> Properties {
        PropertyBuilder::default()
            .set("name", self.name.as_str())
            .set("path", crate::identity::normalize_path(&self.path))
            .set_opt("remote_url", self.remote_url.clone())
            .set_opt("default_branch", self.default_branch.clone())
            .build()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubProjectEntity {
    pub repository_path: String,
    pub repository_id: String,
    pub name: String,
    /// Path relative to the repository root.
    pub path: String,
    pub build_system: Option<String>,
}

impl GraphEntity for SubProjectEntity {
    fn key(&self) -> EntityKey {
        EntityKey::SubProject {
            repository_path: self.repository_path.clone(),
            path: self.path.clone(),
            name: self.name.clone(),
        }
    }

    fn properties(&self) -> Properties {
        PropertyBuilder::default()
            .set("name", self.name.as_str())
            .set("path", crate::identity::normalize_path(&self.path))
            .set("repository_id", self.repository_id.as_str())
            .set_opt("build_system", self.build_system.clone())
            .build()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationUsageEntity {
    pub target_id: String,
    /// Parameter name when the annotation sits on a method parameter.
    pub parameter: Option<String>,
    pub name: String,
    pub qualified_name: String,
    pub attributes: BTreeMap<String, String>,
    pub is_external: bool,
    pub location: Option<SourceLocation>,
}

impl GraphEntity for AnnotationUsageEntity {
    fn key(&self) -> EntityKey {
        EntityKey::AnnotationUsage {
            target_id: self.target_id.clone(),
            annotation: self.qualified_name.clone(),
            discriminator: self.parameter.clone(),
        }
    }

    fn properties(&self) -> Properties {
        PropertyBuilder::default()
            .set("name", self.name.as_str())
            .set("qualified_name", self.qualified_name.as_str())
            .set("target_id", self.target_id.as_str())
            .set_opt("parameter", self.parameter.clone())
            .set("attributes", self.attributes.clone())
            .set("is_external", self.is_external)
            .location(self.location.as_ref())
            .build()
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Contains,
    Extends,
    Implements,
    Calls,
    Uses,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::Extends => "EXTENDS",
            EdgeType::Implements => "IMPLEMENTS",
            EdgeType::Calls => "CALLS",
            EdgeType::Uses => "USES",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CONTAINS" => Some(EdgeType::Contains),
            "EXTENDS" => Some(EdgeType::Extends),
            "IMPLEMENTS" => Some(EdgeType::Implements),
            "CALLS" => Some(EdgeType::Calls),
            "USES" => Some(EdgeType::Uses),
            _ => None,
        }
    }
}

/// Why one type uses another; carried by every `USES` edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Import,
    Instantiation,
    ParameterType,
    ReturnType,
    FieldType,
    StaticMethodCall,
    FieldUsage,
    GenericTypeArgument,
    AnnotationUsage,
}

impl UsageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageKind::Import => "import",
            UsageKind::Instantiation => "instantiation",
            UsageKind::ParameterType => "parameter_type",
            UsageKind::ReturnType => "return_type",
            UsageKind::FieldType => "field_type",
            UsageKind::StaticMethodCall => "static_method_call",
            UsageKind::FieldUsage => "field_usage",
            UsageKind::GenericTypeArgument => "generic_type_argument",
            UsageKind::AnnotationUsage => "annotation_usage",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    pub usage_kind: Option<UsageKind>,
    pub context: String,
    pub qualified_name: Option<String>,
    pub is_external: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// A typed, directed relationship produced for one usage site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from_id: String,
    pub to_id: String,
    pub edge_type: EdgeType,
    pub metadata: EdgeMetadata,
    /// Normalized path of the source unit the edge was extracted from.
    pub source_path: Option<String>,
}

impl DependencyEdge {
    pub fn new(from_id: &str, to_id: &str, edge_type: EdgeType) -> Self {
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            edge_type,
            metadata: EdgeMetadata::default(),
            source_path: None,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            from_id: self.from_id.clone(),
            to_id: self.to_id.clone(),
            edge_type: self.edge_type,
            usage_kind: self
                .metadata
                .usage_kind
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            context: self.metadata.context.clone(),
        }
    }
}

/// Identity of an edge for idempotent re-application.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub from_id: String,
    pub to_id: String,
    pub edge_type: EdgeType,
    /// Empty for non-`USES` edges.
    pub usage_kind: String,
    pub context: String,
}

// ---------------------------------------------------------------------------
// Upsert outcomes and audit
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Insert,
    Update,
    Skip,
    Conflict,
    Failure,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Insert => "INSERT",
            OutcomeKind::Update => "UPDATE",
            OutcomeKind::Skip => "SKIP",
            OutcomeKind::Conflict => "CONFLICT",
            OutcomeKind::Failure => "FAILURE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    pub change: ChangeKind,
    pub old: Option<PropertyValue>,
    pub new: Option<PropertyValue>,
    /// False for ephemeral timestamp/update-marker attributes.
    pub significant: bool,
}

/// Result of reconciling one entity. Never mutated after it is returned.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UpsertOutcome {
    pub kind: OutcomeKind,
    pub entity_id: String,
    pub entity_kind: EntityKind,
    pub changes: Vec<AttributeChange>,
    pub reason: Option<String>,
    pub operation_id: String,
    pub elapsed: Duration,
}

impl UpsertOutcome {
    pub fn failure(entity: &Entity, operation_id: &str, reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            entity_id: entity.id.clone(),
            entity_kind: entity.kind,
            changes: Vec::new(),
            reason: Some(reason.into()),
            operation_id: operation_id.to_string(),
            elapsed: Duration::ZERO,
        }
    }

    /// Names of the significant changed attributes.
    pub fn changed_attributes(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.significant)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Immutable audit row keyed by `(operation_id, kind, entity_id, recorded_at)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditRecord {
    pub operation_id: String,
    pub kind: EntityKind,
    pub entity_id: String,
    pub recorded_at: DateTime<Utc>,
    pub outcome: OutcomeKind,
    pub changes: Vec<AttributeChange>,
    pub reason: Option<String>,
    pub elapsed_us: i64,
}

impl AuditRecord {
    pub fn from_outcome(outcome: &UpsertOutcome) -> Self {
        Self {
            operation_id: outcome.operation_id.clone(),
            kind: outcome.entity_kind,
            entity_id: outcome.entity_id.clone(),
            recorded_at: Utc::now(),
            outcome: outcome.kind,
            changes: outcome.changes.clone(),
            reason: outcome.reason.clone(),
            elapsed_us: i64::try_from(outcome.elapsed.as_micros()).unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_prefix(kind.prefix()), Some(kind));
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::from_prefix("nope"), None);
    }

    #[test]
    fn property_values_keep_their_declared_type() {
        let json = r#"{"a":true,"b":3,"c":"x","d":["y"],"e":{"k":"v"}}"#;
        let props: Properties = serde_json::from_str(json).unwrap();
        assert_eq!(props["a"].type_name(), "bool");
        assert_eq!(props["b"].type_name(), "int");
        assert_eq!(props["c"].type_name(), "text");
        assert_eq!(props["d"].type_name(), "list");
        assert_eq!(props["e"].type_name(), "map");
    }

    #[test]
    fn class_entity_properties_use_simple_name() {
        let class = ClassEntity {
            package: "com.example".to_string(),
            name: "Outer$Inner".to_string(),
            qualified_name: "com.example.Outer.Inner".to_string(),
            declaration_kind: Some(DeclarationKind::Interface),
            visibility: Some("public".to_string()),
            modifiers: vec!["static".to_string()],
            type_parameters: Vec::new(),
            outer_class_id: None,
            is_external: false,
            location: None,
            provisional: false,
        };
        let entity = class.to_entity().unwrap();
        assert_eq!(entity.id, "cls:com.example:Outer$Inner");
        assert_eq!(entity.kind, EntityKind::Class);
        assert_eq!(entity.text("name"), Some("Inner"));
        assert_eq!(entity.text("declaration_kind"), Some("interface"));
        assert!(entity.property("file_path").is_none());
    }

    #[test]
    fn placeholder_has_no_declaration_kind() {
        let entity = ClassEntity::placeholder("java.util", "List", "java.util.List", true)
            .to_entity()
            .unwrap();
        assert!(entity.provisional);
        assert!(entity.property("declaration_kind").is_none());
        assert_eq!(entity.property("is_external"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn constructor_signature_has_no_return_type() {
        let ctor = MethodEntity {
            class_id: "cls:a:B".to_string(),
            name: "B".to_string(),
            return_type: None,
            parameter_names: vec!["x".to_string()],
            parameter_types: vec!["int".to_string()],
            visibility: None,
            modifiers: Vec::new(),
            type_parameters: Vec::new(),
            is_constructor: true,
            location: None,
        };
        assert_eq!(ctor.signature(), "B(int x)");
        assert_eq!(ctor.member_name(), "<init>");
    }

    #[test]
    fn edge_key_ignores_metadata_beyond_identity() {
        let mut a = DependencyEdge::new("cls:a:A", "cls:a:B", EdgeType::Uses);
        a.metadata.usage_kind = Some(UsageKind::FieldType);
        a.metadata.context = "field: b type: B".to_string();
        let mut b = a.clone();
        b.metadata.is_external = true;
        b.source_path = Some("src/A.java".to_string());
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().usage_kind, "field_type");
    }
}
