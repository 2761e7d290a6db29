//! Java syntax tree → declaration and usage facts.

use tree_sitter::Node;

use crate::classify::annotations::parse_arguments;
use crate::errors::GraphResult;
use crate::facts::{
    AnnotationFact, Fact, FieldFact, ImportFact, MethodFact, PackageFact, ParameterFact,
    SourceFacts, Span, TypeFact, UsageFact,
};
use crate::models::DeclarationKind;

use super::parser::{parse_source, ParsedUnit};

fn declaration_kind(kind: &str) -> Option<DeclarationKind> {
    match kind {
        "class_declaration" => Some(DeclarationKind::Class),
        "interface_declaration" => Some(DeclarationKind::Interface),
        "enum_declaration" => Some(DeclarationKind::Enum),
        "annotation_type_declaration" => Some(DeclarationKind::Annotation),
        "record_declaration" => Some(DeclarationKind::Record),
        _ => None,
    }
}

/// Facts for an already-parsed unit.
pub fn extract_facts(unit: &ParsedUnit) -> SourceFacts {
    let mut extractor = Extractor {
        source: unit.source.as_bytes(),
        facts: Vec::new(),
    };
    extractor.program(unit.tree.root_node());
    SourceFacts {
        path: unit.path.clone(),
        facts: extractor.facts,
    }
}

/// Parse and extract in one step.
pub fn extract_source(path: &str, source: &str) -> GraphResult<SourceFacts> {
    let unit = parse_source(path, "java", source.to_string())?;
    Ok(extract_facts(&unit))
}

struct Extractor<'a> {
    source: &'a [u8],
    facts: Vec<Fact>,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        node.utf8_text(self.source).unwrap_or("")
    }

    /// Node text with whitespace runs collapsed.
    fn squeezed(&self, node: Node<'_>) -> String {
        self.text(node).split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|n| self.squeezed(n))
    }

    fn span(node: Node<'_>) -> Span {
        Span {
            start_line: node.start_position().row as i64 + 1,
            end_line: node.end_position().row as i64 + 1,
        }
    }

    fn program(&mut self, root: Node<'_>) {
        let mut cursor = root.walk();
        let children: Vec<Node<'_>> = root.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "package_declaration" => {
                    if let Some(name) = first_named(child, &["scoped_identifier", "identifier"]) {
                        self.facts.push(Fact::Package(PackageFact {
                            name: self.text(name).to_string(),
                        }));
                    }
                }
                "import_declaration" => self.import(child),
                kind if declaration_kind(kind).is_some() => self.type_declaration(child, None),
                _ => {}
            }
        }
    }

    fn import(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let mut is_static = false;
        let mut is_wildcard = false;
        let mut path = None;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "static" => is_static = true,
                "asterisk" => is_wildcard = true,
                "scoped_identifier" | "identifier" => path = Some(self.text(child)),
                _ => {}
            }
        }
        let Some(path) = path else {
            return;
        };
        let path = if is_wildcard {
            format!("{path}.*")
        } else {
            path.to_string()
        };
        self.facts.push(Fact::Import(ImportFact {
            path,
            is_static,
            is_wildcard,
            line: Self::span(node).start_line,
        }));
    }

    fn type_declaration(&mut self, node: Node<'_>, enclosing: Option<&str>) {
        let Some(declaration_kind) = declaration_kind(node.kind()) else {
            return;
        };
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let (modifiers, annotations) = self.modifiers(node);

        let type_parameters = node
            .child_by_field_name("type_parameters")
            .map(|params| self.named_texts(params, &["type_parameter"]))
            .unwrap_or_default();

        let mut extends = Vec::new();
        let mut implements = Vec::new();
        if let Some(superclass) = node.child_by_field_name("superclass") {
            if let Some(ty) = superclass.named_child(0) {
                extends.push(self.squeezed(ty));
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in &children {
            match child.kind() {
                "super_interfaces" => implements.extend(self.type_list(*child)),
                "extends_interfaces" => extends.extend(self.type_list(*child)),
                _ => {}
            }
        }

        let fact = TypeFact {
            name,
            enclosing: enclosing.map(str::to_string),
            declaration_kind,
            modifiers,
            type_parameters,
            extends,
            implements,
            annotations,
            span: Self::span(node),
        };
        let binary = fact.binary_name();
        self.facts.push(Fact::Type(fact));

        if let Some(body) = node.child_by_field_name("body") {
            self.members(body, &binary);
        }
    }

    fn type_list(&self, node: Node<'_>) -> Vec<String> {
        let Some(list) = first_named(node, &["type_list"]) else {
            return Vec::new();
        };
        let mut cursor = list.walk();
        list.named_children(&mut cursor)
            .map(|ty| self.squeezed(ty))
            .collect()
    }

    fn members(&mut self, body: Node<'_>, owner: &str) {
        let mut cursor = body.walk();
        let children: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "field_declaration" | "constant_declaration" => self.field(child, owner),
                "method_declaration" | "annotation_type_element_declaration" => {
                    self.method(child, owner, false)
                }
                "constructor_declaration" | "compact_constructor_declaration" => {
                    self.method(child, owner, true)
                }
                "enum_body_declarations" => self.members(child, owner),
                kind if declaration_kind(kind).is_some() => {
                    self.type_declaration(child, Some(owner))
                }
                _ => {}
            }
        }
    }

    fn field(&mut self, node: Node<'_>, owner: &str) {
        let Some(type_name) = self.field_text(node, "type") else {
            return;
        };
        let (modifiers, annotations) = self.modifiers(node);
        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let Some(name) = self.field_text(declarator, "name") else {
                continue;
            };
            let dimensions = self.field_text(declarator, "dimensions").unwrap_or_default();
            let mut usages = Vec::new();
            if let Some(value) = declarator.child_by_field_name("value") {
                self.usages(value, &mut usages);
            }
            self.facts.push(Fact::Field(FieldFact {
                owner: owner.to_string(),
                name,
                type_name: format!("{type_name}{dimensions}"),
                modifiers: modifiers.clone(),
                annotations: annotations.clone(),
                usages,
                span: Self::span(declarator),
            }));
        }
    }

    fn method(&mut self, node: Node<'_>, owner: &str, is_constructor: bool) {
        let name = match self.field_text(node, "name") {
            Some(name) => name,
            // compact record constructors carry no name node
            None if is_constructor => owner.rsplit('$').next().unwrap_or(owner).to_string(),
            None => return,
        };
        let (modifiers, annotations) = self.modifiers(node);
        let return_type = if is_constructor {
            None
        } else {
            self.field_text(node, "type")
        };
        let parameters = node
            .child_by_field_name("parameters")
            .map(|params| self.parameters(params))
            .unwrap_or_default();
        let type_parameters = node
            .child_by_field_name("type_parameters")
            .map(|params| self.named_texts(params, &["type_parameter"]))
            .unwrap_or_default();
        let mut usages = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.usages(body, &mut usages);
        }
        self.facts.push(Fact::Method(MethodFact {
            owner: owner.to_string(),
            name,
            return_type,
            parameters,
            modifiers,
            annotations,
            type_parameters,
            usages,
            is_constructor,
            span: Self::span(node),
        }));
    }

    fn parameters(&self, node: Node<'_>) -> Vec<ParameterFact> {
        let mut cursor = node.walk();
        let mut out = Vec::new();
        for param in node.named_children(&mut cursor) {
            match param.kind() {
                "formal_parameter" => {
                    let (Some(type_name), Some(name)) =
                        (self.field_text(param, "type"), self.field_text(param, "name"))
                    else {
                        continue;
                    };
                    let dimensions = self.field_text(param, "dimensions").unwrap_or_default();
                    out.push(ParameterFact {
                        name,
                        type_name: format!("{type_name}{dimensions}"),
                        annotations: self.modifiers(param).1,
                    });
                }
                "spread_parameter" => {
                    let mut inner = param.walk();
                    let children: Vec<Node<'_>> = param.named_children(&mut inner).collect();
                    let type_node = children
                        .iter()
                        .find(|c| !matches!(c.kind(), "modifiers" | "variable_declarator"));
                    let name = children
                        .iter()
                        .find(|c| c.kind() == "variable_declarator")
                        .and_then(|d| self.field_text(*d, "name"));
                    let (Some(type_node), Some(name)) = (type_node, name) else {
                        continue;
                    };
                    out.push(ParameterFact {
                        name,
                        type_name: format!("{}...", self.squeezed(*type_node)),
                        annotations: self.modifiers(param).1,
                    });
                }
                _ => {}
            }
        }
        out
    }

    /// Keyword modifiers and annotations of a declaration.
    fn modifiers(&self, node: Node<'_>) -> (Vec<String>, Vec<AnnotationFact>) {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        let Some(list) = first_named(node, &["modifiers"]) else {
            return (modifiers, annotations);
        };
        let mut cursor = list.walk();
        for child in list.children(&mut cursor) {
            match child.kind() {
                "marker_annotation" | "annotation" => {
                    if let Some(annotation) = self.annotation(child) {
                        annotations.push(annotation);
                    }
                }
                _ if !child.is_named() => modifiers.push(self.text(child).to_string()),
                _ => {}
            }
        }
        (modifiers, annotations)
    }

    fn annotation(&self, node: Node<'_>) -> Option<AnnotationFact> {
        let name = self.field_text(node, "name")?;
        let arguments = node
            .child_by_field_name("arguments")
            .map(|args| parse_arguments(self.text(args)))
            .unwrap_or_default();
        Some(AnnotationFact { name, arguments })
    }

    /// Collect use sites below `node`, depth first in source order.
    fn usages(&self, node: Node<'_>, out: &mut Vec<UsageFact>) {
        match node.kind() {
            "object_creation_expression" => {
                if let Some(type_name) = self.field_text(node, "type") {
                    out.push(UsageFact::Instantiation { type_name });
                }
            }
            "method_invocation" => {
                if let Some(name) = self.field_text(node, "name") {
                    let argument_count = node
                        .child_by_field_name("arguments")
                        .map(|args| {
                            let mut cursor = args.walk();
                            args.named_children(&mut cursor)
                                .filter(|a| !a.kind().ends_with("comment"))
                                .count()
                        })
                        .unwrap_or(0);
                    match node.child_by_field_name("object") {
                        None => out.push(UsageFact::MethodCall {
                            scope: None,
                            name,
                            argument_count,
                        }),
                        Some(object) => {
                            if let Some(scope) = self.call_scope(object) {
                                out.push(UsageFact::MethodCall {
                                    scope: Some(scope),
                                    name,
                                    argument_count,
                                });
                            }
                        }
                    }
                }
            }
            "field_access" => {
                let object = node.child_by_field_name("object");
                let field = self.field_text(node, "field");
                if let (Some(object), Some(field)) = (object, field) {
                    if object.kind() == "identifier" {
                        out.push(UsageFact::FieldAccess {
                            scope: self.text(object).to_string(),
                            field,
                        });
                    }
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.usages(child, out);
        }
    }

    /// Receiver text worth resolving: a bare name, `this`, or a qualified
    /// name starting with a package segment. Call chains and expressions
    /// are skipped.
    fn call_scope(&self, object: Node<'_>) -> Option<String> {
        match object.kind() {
            "identifier" | "this" => Some(self.text(object).to_string()),
            "field_access" | "scoped_identifier" => {
                let text = self.squeezed(object).replace(' ', "");
                let qualified = text
                    .split('.')
                    .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'));
                let package_head = text.chars().next().is_some_and(char::is_lowercase);
                (qualified && package_head && text.contains('.')).then_some(text)
            }
            _ => None,
        }
    }

    fn named_texts(&self, node: Node<'_>, kinds: &[&str]) -> Vec<String> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|c| kinds.contains(&c.kind()))
            .map(|c| self.squeezed(c))
            .collect()
    }
}

fn first_named<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| kinds.contains(&c.kind()));
    found
}
