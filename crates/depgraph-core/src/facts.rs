//! Declaration and usage facts produced by a language front-end.
//!
//! Facts are plain data: the front-end does not resolve names or compute
//! identities. Type names are kept as written in source (`List<String>`,
//! `Map.Entry`, `int[]`), member owners are binary names relative to the
//! unit's package (`Outer$Inner`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::DeclarationKind;

/// All facts extracted from one source unit, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFacts {
    /// Path of the unit relative to the repository root.
    pub path: String,
    pub facts: Vec<Fact>,
}

impl SourceFacts {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            facts: Vec::new(),
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.facts.iter().find_map(|f| match f {
            Fact::Package(p) => Some(p.name.as_str()),
            _ => None,
        })
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeFact> {
        self.facts.iter().filter_map(|f| match f {
            Fact::Type(t) => Some(t),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fact", rename_all = "snake_case")]
pub enum Fact {
    Package(PackageFact),
    Import(ImportFact),
    Type(TypeFact),
    Field(FieldFact),
    Method(MethodFact),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start_line: i64,
    pub end_line: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFact {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFact {
    /// Dotted path without the trailing `.*` of wildcard imports.
    pub path: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_wildcard: bool,
    #[serde(default)]
    pub line: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationFact {
    /// Name as written, without the `@`.
    pub name: String,
    /// Raw argument text; a single unnamed argument is keyed `value`.
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFact {
    pub name: String,
    /// Binary name of the enclosing type for nested declarations.
    #[serde(default)]
    pub enclosing: Option<String>,
    pub declaration_kind: DeclarationKind,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    /// `extends` clause: the superclass of a class, the super-interfaces of
    /// an interface.
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationFact>,
    #[serde(default)]
    pub span: Span,
}

impl TypeFact {
    /// `Outer$Inner` for nested types, the plain name otherwise.
    pub fn binary_name(&self) -> String {
        match &self.enclosing {
            Some(outer) => format!("{outer}${}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFact {
    /// Binary name of the declaring type.
    pub owner: String,
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationFact>,
    /// Usages inside the initializer expression.
    #[serde(default)]
    pub usages: Vec<UsageFact>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFact {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub annotations: Vec<AnnotationFact>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFact {
    pub owner: String,
    pub name: String,
    /// `None` for constructors.
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterFact>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationFact>,
    #[serde(default)]
    pub type_parameters: Vec<String>,
    #[serde(default)]
    pub usages: Vec<UsageFact>,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub span: Span,
}

/// A use site inside a method body or field initializer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "usage", rename_all = "snake_case")]
pub enum UsageFact {
    /// `new Foo<...>(...)`.
    Instantiation { type_name: String },
    /// `scope.name(...)` or unscoped `name(...)`.
    MethodCall {
        #[serde(default)]
        scope: Option<String>,
        name: String,
        #[serde(default)]
        argument_count: usize,
    },
    /// `scope.field` read or write.
    FieldAccess { scope: String, field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_binary_name() {
        let fact = TypeFact {
            name: "Inner".to_string(),
            enclosing: Some("Outer".to_string()),
            declaration_kind: DeclarationKind::Class,
            modifiers: Vec::new(),
            type_parameters: Vec::new(),
            extends: Vec::new(),
            implements: Vec::new(),
            annotations: Vec::new(),
            span: Span::default(),
        };
        assert_eq!(fact.binary_name(), "Outer$Inner");
    }

    #[test]
    fn facts_deserialize_with_defaults() {
        let json = r#"{
            "path": "src/A.java",
            "facts": [
                {"fact": "package", "name": "com.example"},
                {"fact": "import", "path": "java.util.List"},
                {"fact": "method", "owner": "A", "name": "run",
                 "usages": [{"usage": "method_call", "name": "helper"}]}
            ]
        }"#;
        let unit: SourceFacts = serde_json::from_str(json).unwrap();
        assert_eq!(unit.package(), Some("com.example"));
        match &unit.facts[2] {
            Fact::Method(m) => {
                assert!(!m.is_constructor);
                assert_eq!(
                    m.usages[0],
                    UsageFact::MethodCall {
                        scope: None,
                        name: "helper".to_string(),
                        argument_count: 0
                    }
                );
            }
            other => panic!("unexpected fact {other:?}"),
        }
    }
}
