//! Dependency classification.
//!
//! Turns declaration and usage facts into entities and typed edges. Every
//! usage site produces its own edge row; the only merging is per-pass
//! de-duplication on the edge identity `(from, to, type, usage_kind,
//! context)`. Unresolved names never fail: they become provisional
//! placeholder entities whose IDs match the real declaration's.

pub mod annotations;
pub mod generics;
pub mod resolve;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::errors::GraphResult;
use crate::facts::{
    AnnotationFact, Fact, FieldFact, ImportFact, MethodFact, SourceFacts, Span, TypeFact,
    UsageFact,
};
use crate::identity::{generate_id, normalize_package, normalize_path, EntityKey};
use crate::models::{
    AnnotationUsageEntity, ClassEntity, DependencyEdge, EdgeKey, EdgeType, Entity, FieldEntity,
    GraphEntity, MethodEntity, PackageEntity, SourceLocation, UsageKind,
};

use generics::{parse_type, type_parameter_name, TypeRef};
pub use resolve::{ImportContext, Resolution, ResolveContext, ResolvedType};

const VISIBILITY_MODIFIERS: &[&str] = &["public", "protected", "private"];

// ---------------------------------------------------------------------------
// Classified output
// ---------------------------------------------------------------------------

/// Entities and edges produced by one classification pass.
#[derive(Clone, Debug, Default)]
pub struct Classified {
    /// Keyed by entity ID in first-seen order.
    pub entities: IndexMap<String, Entity>,
    pub edges: Vec<DependencyEdge>,
    /// Normalized path of the unit, when the pass covered one.
    pub source_path: Option<String>,
    seen_edges: HashSet<EdgeKey>,
}

impl Classified {
    pub fn new() -> Self {
        Self::default()
    }

    /// A real declaration replaces a placeholder; a placeholder never
    /// replaces anything.
    pub fn add_entity(&mut self, entity: Entity) {
        if entity.provisional && self.entities.contains_key(&entity.id) {
            return;
        }
        self.entities.insert(entity.id.clone(), entity);
    }

    /// Returns false for a duplicate of an edge already in this pass.
    pub fn add_edge(&mut self, edge: DependencyEdge) -> bool {
        if self.seen_edges.insert(edge.key()) {
            self.edges.push(edge);
            true
        } else {
            false
        }
    }

    pub fn merge(&mut self, other: Classified) {
        if self.source_path.is_none() {
            self.source_path = other.source_path;
        }
        for entity in other.entities.into_values() {
            self.add_entity(entity);
        }
        for edge in other.edges {
            self.add_edge(edge);
        }
    }

    pub fn entity_list(&self) -> Vec<Entity> {
        self.entities.values().cloned().collect()
    }

    pub fn edges_of(&self, usage_kind: UsageKind) -> impl Iterator<Item = &DependencyEdge> {
        self.edges
            .iter()
            .filter(move |e| e.metadata.usage_kind == Some(usage_kind))
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.edges.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Unit scope
// ---------------------------------------------------------------------------

struct MethodSlot {
    class_id: String,
    name: String,
    arity: usize,
    id: String,
}

struct PendingCall {
    caller_id: String,
    class_id: String,
    name: String,
    arity: usize,
    context: String,
}

/// Mutable state carried across the facts of one source unit.
#[derive(Default)]
pub struct UnitScope {
    source_path: Option<String>,
    package: String,
    imports: ImportContext,
    pending_imports: Vec<ImportFact>,
    local_types: HashMap<String, String>,
    type_parameters: HashMap<String, Vec<String>>,
    methods: Vec<MethodSlot>,
    pending_calls: Vec<PendingCall>,
}

impl UnitScope {
    pub fn new(source_path: Option<&str>) -> Self {
        Self {
            source_path: source_path.map(normalize_path),
            ..Self::default()
        }
    }

    /// Scope seeded with an existing import table.
    pub fn with_imports(source_path: Option<&str>, imports: ImportContext) -> Self {
        Self {
            imports,
            ..Self::new(source_path)
        }
    }

    /// Scope for a whole unit. Declared types are registered up front so
    /// references to types declared later in the unit resolve locally.
    pub fn for_unit(unit: &SourceFacts) -> Self {
        let mut scope = Self::new(Some(&unit.path));
        scope.prescan(&unit.facts);
        scope
    }

    pub fn prescan(&mut self, facts: &[Fact]) {
        for fact in facts {
            match fact {
                Fact::Package(p) if self.package.is_empty() => {
                    self.package = normalize_package(&p.name);
                }
                Fact::Type(t) => self.register_type(t),
                _ => {}
            }
        }
    }

    pub fn imports(&self) -> &ImportContext {
        &self.imports
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    fn register_type(&mut self, fact: &TypeFact) {
        let binary = fact.binary_name();
        self.local_types
            .entry(fact.name.clone())
            .or_insert_with(|| binary.clone());
        let params = fact
            .type_parameters
            .iter()
            .map(|p| type_parameter_name(p).to_string())
            .filter(|p| !p.is_empty())
            .collect();
        self.type_parameters.insert(binary, params);
    }

    fn location(&self, span: Span) -> Option<SourceLocation> {
        self.source_path.as_ref().map(|path| SourceLocation {
            file_path: path.clone(),
            start_line: span.start_line,
            end_line: span.end_line,
        })
    }

    fn resolver<'a>(&'a self, config: &'a ClassifierConfig) -> ResolveContext<'a> {
        ResolveContext {
            config,
            imports: &self.imports,
            local_types: &self.local_types,
            package: &self.package,
        }
    }

    /// Type parameters visible inside `owner` (and its enclosing types).
    fn type_parameters_of(&self, owner: &str) -> HashSet<String> {
        let mut visible = HashSet::new();
        let mut current = Some(owner.to_string());
        while let Some(name) = current {
            if let Some(params) = self.type_parameters.get(&name) {
                visible.extend(params.iter().cloned());
            }
            current = name.rsplit_once('$').map(|(outer, _)| outer.to_string());
        }
        visible
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Per-usage-site bookkeeping while classifying one declaration.
struct Site<'a> {
    /// Entity the `USES` edges originate from.
    from_id: &'a str,
    type_parameters: &'a HashSet<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Classifier {
    config: ClassifierConfig,
    repository_id: Option<String>,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            repository_id: None,
        }
    }

    /// Emit `CONTAINS` edges from this repository to every package.
    pub fn with_repository(mut self, repository_id: impl Into<String>) -> Self {
        self.repository_id = Some(repository_id.into());
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a whole unit. Facts with malformed identities are logged and
    /// skipped; the rest of the unit is still classified.
    pub fn classify_unit(&self, unit: &SourceFacts) -> Classified {
        let mut scope = UnitScope::for_unit(unit);
        let mut out = Classified::new();
        out.source_path = scope.source_path.clone();
        for fact in &unit.facts {
            match self.classify(fact, &mut scope) {
                Ok(classified) => out.merge(classified),
                Err(e) => warn!(path = %unit.path, error = %e, "skipping malformed fact"),
            }
        }
        out.merge(self.finish(&mut scope));
        debug!(
            path = %unit.path,
            entities = out.entities.len(),
            edges = out.edges.len(),
            "classified unit"
        );
        out
    }

    /// Classify one fact against the unit state accumulated so far.
    pub fn classify(&self, fact: &Fact, scope: &mut UnitScope) -> GraphResult<Classified> {
        let mut out = Classified::new();
        out.source_path = scope.source_path.clone();
        match fact {
            Fact::Package(p) => {
                scope.package = normalize_package(&p.name);
                self.classify_package(scope, &mut out)?;
            }
            Fact::Import(import) => {
                scope.imports.add(import);
                scope.pending_imports.push(import.clone());
            }
            Fact::Type(t) => self.classify_type(t, scope, &mut out)?,
            Fact::Field(f) => self.classify_field(f, scope, &mut out)?,
            Fact::Method(m) => self.classify_method(m, scope, &mut out)?,
        }
        Ok(out)
    }

    /// Resolve calls recorded during the unit. Call once all facts of the
    /// unit have been classified.
    pub fn finish(&self, scope: &mut UnitScope) -> Classified {
        let mut out = Classified::new();
        out.source_path = scope.source_path.clone();
        for call in std::mem::take(&mut scope.pending_calls) {
            let exact: Vec<&MethodSlot> = scope
                .methods
                .iter()
                .filter(|m| m.class_id == call.class_id && m.name == call.name)
                .filter(|m| m.arity == call.arity)
                .collect();
            if exact.len() != 1 {
                continue;
            }
            let mut edge = self.edge(scope, &call.caller_id, &exact[0].id, EdgeType::Calls);
            edge.metadata.context = call.context;
            edge.metadata
                .attributes
                .insert("method".to_string(), call.name);
            out.add_edge(edge);
        }
        out
    }

    // -- declarations --------------------------------------------------------

    fn classify_package(&self, scope: &UnitScope, out: &mut Classified) -> GraphResult<()> {
        if scope.package.is_empty() {
            return Ok(());
        }
        let package = PackageEntity {
            name: scope.package.clone(),
            is_external: self.config.is_external(&format!("{}.", scope.package)),
            provisional: false,
        }
        .to_entity()?;
        if let Some(repo_id) = &self.repository_id {
            let mut edge = self.edge(scope, repo_id, &package.id, EdgeType::Contains);
            // Shared by every unit of the package.
            edge.source_path = None;
            out.add_edge(edge);
        }
        out.add_entity(package);
        Ok(())
    }

    fn class_id(&self, scope: &UnitScope, binary_name: &str) -> GraphResult<String> {
        generate_id(&EntityKey::Class {
            package: scope.package.clone(),
            name: binary_name.to_string(),
        })
    }

    fn classify_type(
        &self,
        fact: &TypeFact,
        scope: &mut UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        scope.register_type(fact);
        let binary = fact.binary_name();
        let qualified_name = resolve::qualified_for(&scope.package, &binary);

        let outer_class_id = match &fact.enclosing {
            Some(outer) => Some(self.class_id(scope, outer)?),
            None => None,
        };
        let (visibility, modifiers) = split_modifiers(&fact.modifiers);
        let class = ClassEntity {
            package: scope.package.clone(),
            name: binary.clone(),
            qualified_name: qualified_name.clone(),
            declaration_kind: Some(fact.declaration_kind),
            visibility,
            modifiers,
            type_parameters: fact.type_parameters.clone(),
            outer_class_id: outer_class_id.clone(),
            is_external: self.config.is_external(&qualified_name),
            location: scope.location(fact.span),
            provisional: false,
        }
        .to_entity()?;
        let class_id = class.id.clone();
        out.add_entity(class);

        match &outer_class_id {
            Some(outer) => {
                out.add_edge(self.edge(scope, outer, &class_id, EdgeType::Contains));
            }
            None => {
                if !scope.package.is_empty() {
                    let package_id = generate_id(&EntityKey::Package {
                        package: scope.package.clone(),
                    })?;
                    out.add_edge(self.edge(scope, &package_id, &class_id, EdgeType::Contains));
                }
                self.classify_imports(&class_id, scope, out)?;
            }
        }

        let visible = scope.type_parameters_of(&binary);
        let site = Site {
            from_id: &class_id,
            type_parameters: &visible,
        };
        for (edge_type, supertypes, label) in [
            (EdgeType::Extends, &fact.extends, "extends"),
            (EdgeType::Implements, &fact.implements, "implements"),
        ] {
            for raw in supertypes {
                let Some(parsed) = parse_type(raw) else {
                    continue;
                };
                let Some(target) = self.target(&parsed, &site, scope, out)? else {
                    continue;
                };
                let mut edge = self.edge(scope, &class_id, &target.0, edge_type);
                edge.metadata.qualified_name = Some(target.1.qualified_name.clone());
                edge.metadata.is_external = target.1.is_external;
                out.add_edge(edge);
                let context = format!("{label}: {}", parsed.simple_name());
                self.generic_arguments(&parsed, &context, 1, &site, scope, out)?;
            }
        }

        let context = format!("class: {}", fact.name);
        self.classify_annotations(&fact.annotations, &class_id, None, &context, &site, scope, out)
    }

    fn classify_imports(
        &self,
        class_id: &str,
        scope: &UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        let no_params = HashSet::new();
        let site = Site {
            from_id: class_id,
            type_parameters: &no_params,
        };
        for import in &scope.pending_imports {
            let path = import.path.trim().trim_end_matches(".*");
            let class_path = match (import.is_static, import.is_wildcard) {
                (false, true) => continue,
                (true, false) => match path.rsplit_once('.') {
                    Some((owner, _)) => owner,
                    None => continue,
                },
                _ => path,
            };
            let resolved = scope.resolver(&self.config).resolve(class_path);
            let Some(resolved) = resolved else {
                continue;
            };
            let target_id = self.placeholder(&resolved, out)?;
            self.uses_edge(
                &site,
                scope,
                out,
                &target_id,
                &resolved,
                UsageKind::Import,
                path.to_string(),
            );
        }
        Ok(())
    }

    fn classify_field(
        &self,
        fact: &FieldFact,
        scope: &mut UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        let class_id = self.class_id(scope, &fact.owner)?;
        let (visibility, modifiers) = split_modifiers(&fact.modifiers);
        let field = FieldEntity {
            class_id: class_id.clone(),
            name: fact.name.clone(),
            type_name: Some(fact.type_name.clone()).filter(|t| !t.is_empty()),
            visibility,
            modifiers,
            is_external: false,
            location: scope.location(fact.span),
            provisional: false,
        }
        .to_entity()?;
        let field_id = field.id.clone();
        out.add_entity(field);
        out.add_edge(self.edge(scope, &class_id, &field_id, EdgeType::Contains));

        let visible = scope.type_parameters_of(&fact.owner);
        let site = Site {
            from_id: &class_id,
            type_parameters: &visible,
        };
        if let Some(parsed) = parse_type(&fact.type_name) {
            let context = format!("field: {} type: {}", fact.name, parsed.simple_name());
            self.type_usage(&parsed, UsageKind::FieldType, &context, &site, scope, out)?;
        }

        let member_context = format!("field: {}", fact.name);
        self.classify_annotations(
            &fact.annotations,
            &field_id,
            None,
            &member_context,
            &site,
            scope,
            out,
        )?;
        self.body_usages(&fact.usages, None, &member_context, &site, &class_id, scope, out)
    }

    fn classify_method(
        &self,
        fact: &MethodFact,
        scope: &mut UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        let class_id = self.class_id(scope, &fact.owner)?;
        let (visibility, modifiers) = split_modifiers(&fact.modifiers);
        let method = MethodEntity {
            class_id: class_id.clone(),
            name: fact.name.clone(),
            return_type: if fact.is_constructor {
                None
            } else {
                fact.return_type.clone()
            },
            parameter_names: fact.parameters.iter().map(|p| p.name.clone()).collect(),
            parameter_types: fact.parameters.iter().map(|p| p.type_name.clone()).collect(),
            visibility,
            modifiers,
            type_parameters: fact.type_parameters.clone(),
            is_constructor: fact.is_constructor,
            location: scope.location(fact.span),
        }
        .to_entity()?;
        let method_id = method.id.clone();
        out.add_entity(method);
        out.add_edge(self.edge(scope, &class_id, &method_id, EdgeType::Contains));
        scope.methods.push(MethodSlot {
            class_id: class_id.clone(),
            name: fact.name.clone(),
            arity: fact.parameters.len(),
            id: method_id.clone(),
        });

        let mut visible = scope.type_parameters_of(&fact.owner);
        visible.extend(
            fact.type_parameters
                .iter()
                .map(|p| type_parameter_name(p).to_string()),
        );
        let site = Site {
            from_id: &class_id,
            type_parameters: &visible,
        };

        if !fact.is_constructor {
            if let Some(parsed) = fact.return_type.as_deref().and_then(parse_type) {
                let context = format!("method: {} returns: {}", fact.name, parsed.simple_name());
                self.type_usage(&parsed, UsageKind::ReturnType, &context, &site, scope, out)?;
            }
        }

        for param in &fact.parameters {
            if let Some(parsed) = parse_type(&param.type_name) {
                let context = format!(
                    "param: {} type: {} method: {}",
                    param.name,
                    parsed.simple_name(),
                    fact.name
                );
                self.type_usage(&parsed, UsageKind::ParameterType, &context, &site, scope, out)?;
            }
            let context = format!("parameter: {} method: {}", param.name, fact.name);
            self.classify_annotations(
                &param.annotations,
                &method_id,
                Some(&param.name),
                &context,
                &site,
                scope,
                out,
            )?;
        }

        let member_context = format!("method: {}", fact.name);
        self.classify_annotations(
            &fact.annotations,
            &method_id,
            None,
            &member_context,
            &site,
            scope,
            out,
        )?;
        self.body_usages(
            &fact.usages,
            Some(&method_id),
            &member_context,
            &site,
            &class_id,
            scope,
            out,
        )
    }

    // -- usages --------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn body_usages(
        &self,
        usages: &[UsageFact],
        caller_id: Option<&str>,
        member_context: &str,
        site: &Site<'_>,
        class_id: &str,
        scope: &mut UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        for usage in usages {
            match usage {
                UsageFact::Instantiation { type_name } => {
                    let Some(parsed) = parse_type(type_name) else {
                        continue;
                    };
                    self.type_usage(&parsed, UsageKind::Instantiation, member_context, site, scope, out)?;
                }
                UsageFact::MethodCall {
                    scope: call_scope,
                    name,
                    argument_count,
                } => {
                    let receiver = call_scope.as_deref().map(str::trim);
                    let owner = match receiver {
                        None | Some("this") => match scope.imports.static_owner(name) {
                            Some(owner) => Some(owner.to_string()),
                            None => {
                                if let Some(caller) = caller_id {
                                    scope.pending_calls.push(PendingCall {
                                        caller_id: caller.to_string(),
                                        class_id: class_id.to_string(),
                                        name: name.clone(),
                                        arity: *argument_count,
                                        context: format!("{member_context} calls: {name}"),
                                    });
                                }
                                None
                            }
                        },
                        Some(receiver) => Some(receiver.to_string()),
                    };
                    let Some(owner) = owner else {
                        continue;
                    };
                    let Some(resolved) = scope.resolver(&self.config).resolve_type_scope(&owner)
                    else {
                        continue;
                    };
                    // Unimported capitalized receivers are not known types.
                    if resolved.resolution == Resolution::SamePackage {
                        continue;
                    }
                    let target_id = self.placeholder(&resolved, out)?;
                    self.uses_edge(
                        site,
                        scope,
                        out,
                        &target_id,
                        &resolved,
                        UsageKind::StaticMethodCall,
                        format!("static method call: {name} {member_context}"),
                    );
                    if let (Some(caller), Resolution::Imported | Resolution::Qualified) =
                        (caller_id, resolved.resolution)
                    {
                        let mut edge = self.edge(scope, caller, &target_id, EdgeType::Calls);
                        edge.metadata.context = format!("{member_context} calls: {name}");
                        edge.metadata.qualified_name = Some(resolved.qualified_name.clone());
                        edge.metadata.is_external = resolved.is_external;
                        edge.metadata
                            .attributes
                            .insert("method".to_string(), name.clone());
                        out.add_edge(edge);
                    }
                }
                UsageFact::FieldAccess {
                    scope: access_scope,
                    field,
                } => {
                    let Some(resolved) =
                        scope.resolver(&self.config).resolve_type_scope(access_scope)
                    else {
                        continue;
                    };
                    let target_id = self.placeholder(&resolved, out)?;
                    self.uses_edge(
                        site,
                        scope,
                        out,
                        &target_id,
                        &resolved,
                        UsageKind::FieldUsage,
                        format!("{member_context} field: {field}"),
                    );
                }
            }
        }
        Ok(())
    }

    /// Edge for the outer type of a usage plus generic-argument edges.
    fn type_usage(
        &self,
        parsed: &TypeRef,
        usage_kind: UsageKind,
        context: &str,
        site: &Site<'_>,
        scope: &UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        if let Some((target_id, resolved)) = self.target(parsed, site, scope, out)? {
            self.uses_edge(
                site,
                scope,
                out,
                &target_id,
                &resolved,
                usage_kind,
                context.to_string(),
            );
        }
        self.generic_arguments(parsed, context, 1, site, scope, out)
    }

    /// One `generic_type_argument` edge per argument, recursively; the
    /// context of each nested level extends its parent's.
    fn generic_arguments(
        &self,
        parsed: &TypeRef,
        parent_context: &str,
        depth: usize,
        site: &Site<'_>,
        scope: &UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        for argument in &parsed.arguments {
            let context = format!("{parent_context} generic{depth}: {}", argument.simple_name());
            if let Some((target_id, resolved)) = self.target(argument, site, scope, out)? {
                self.uses_edge(
                    site,
                    scope,
                    out,
                    &target_id,
                    &resolved,
                    UsageKind::GenericTypeArgument,
                    context.clone(),
                );
            }
            self.generic_arguments(argument, &context, depth + 1, site, scope, out)?;
        }
        Ok(())
    }

    /// Resolve a parsed type to a target entity, creating its placeholder.
    /// `None` for primitives and in-scope type parameters.
    fn target(
        &self,
        parsed: &TypeRef,
        site: &Site<'_>,
        scope: &UnitScope,
        out: &mut Classified,
    ) -> GraphResult<Option<(String, ResolvedType)>> {
        if parsed.is_primitive() || site.type_parameters.contains(&parsed.base) {
            return Ok(None);
        }
        let Some(resolved) = scope.resolver(&self.config).resolve(&parsed.base) else {
            return Ok(None);
        };
        let target_id = self.placeholder(&resolved, out)?;
        Ok(Some((target_id, resolved)))
    }

    fn placeholder(&self, resolved: &ResolvedType, out: &mut Classified) -> GraphResult<String> {
        let entity = ClassEntity::placeholder(
            &resolved.package,
            &resolved.binary_name,
            &resolved.qualified_name,
            resolved.is_external,
        )
        .to_entity()?;
        let id = entity.id.clone();
        out.add_entity(entity);
        Ok(id)
    }

    // -- annotations ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn classify_annotations(
        &self,
        annotations: &[AnnotationFact],
        target_id: &str,
        parameter: Option<&str>,
        context: &str,
        site: &Site<'_>,
        scope: &UnitScope,
        out: &mut Classified,
    ) -> GraphResult<()> {
        for annotation in annotations {
            let Some(resolved) = scope.resolver(&self.config).resolve(&annotation.name) else {
                continue;
            };
            let attributes = annotations::clean_arguments(&annotation.arguments);
            let usage = AnnotationUsageEntity {
                target_id: target_id.to_string(),
                parameter: parameter.map(str::to_string),
                name: resolved
                    .binary_name
                    .rsplit('$')
                    .next()
                    .unwrap_or(&resolved.binary_name)
                    .to_string(),
                qualified_name: resolved.qualified_name.clone(),
                attributes: attributes.clone(),
                is_external: resolved.is_external,
                location: None,
            }
            .to_entity()?;
            let usage_id = usage.id.clone();
            out.add_entity(usage);
            out.add_edge(self.edge(scope, target_id, &usage_id, EdgeType::Contains));

            let annotation_type = self.placeholder(&resolved, out)?;
            let mut edge = self.uses(
                site,
                scope,
                &annotation_type,
                &resolved,
                UsageKind::AnnotationUsage,
                context.to_string(),
            );
            edge.metadata.attributes = attributes;
            out.add_edge(edge);
        }
        Ok(())
    }

    // -- edges ---------------------------------------------------------------

    fn edge(&self, scope: &UnitScope, from: &str, to: &str, edge_type: EdgeType) -> DependencyEdge {
        let mut edge = DependencyEdge::new(from, to, edge_type);
        edge.source_path = scope.source_path.clone();
        edge
    }

    fn uses(
        &self,
        site: &Site<'_>,
        scope: &UnitScope,
        target_id: &str,
        resolved: &ResolvedType,
        usage_kind: UsageKind,
        context: String,
    ) -> DependencyEdge {
        let mut edge = self.edge(scope, site.from_id, target_id, EdgeType::Uses);
        edge.metadata.usage_kind = Some(usage_kind);
        edge.metadata.context = context;
        edge.metadata.qualified_name = Some(resolved.qualified_name.clone());
        edge.metadata.is_external = resolved.is_external;
        edge
    }

    #[allow(clippy::too_many_arguments)]
    fn uses_edge(
        &self,
        site: &Site<'_>,
        scope: &UnitScope,
        out: &mut Classified,
        target_id: &str,
        resolved: &ResolvedType,
        usage_kind: UsageKind,
        context: String,
    ) {
        let edge = self.uses(site, scope, target_id, resolved, usage_kind, context);
        out.add_edge(edge);
    }
}

fn split_modifiers(modifiers: &[String]) -> (Option<String>, Vec<String>) {
    let visibility = modifiers
        .iter()
        .find(|m| VISIBILITY_MODIFIERS.contains(&m.as_str()))
        .cloned();
    let rest = modifiers
        .iter()
        .filter(|m| !VISIBILITY_MODIFIERS.contains(&m.as_str()))
        .cloned()
        .collect();
    (visibility, rest)
}

/// Classify a fact list against an explicit import context, with default
/// configuration. Calls are resolved once all facts have been seen.
pub fn classify(facts: &[Fact], import_context: ImportContext) -> GraphResult<Classified> {
    let classifier = Classifier::default();
    let mut scope = UnitScope::with_imports(None, import_context);
    scope.prescan(facts);
    let mut out = Classified::new();
    for fact in facts {
        out.merge(classifier.classify(fact, &mut scope)?);
    }
    out.merge(classifier.finish(&mut scope));
    Ok(out)
}
