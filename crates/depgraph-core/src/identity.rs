//! Deterministic entity identity and canonical forms.
//!
//! Every ID is `<prefix>:<body>` where the prefix comes from
//! [`EntityKind::prefix`]. Generation is pure: the same natural key always
//! yields the same ID, across calls and across processes.
//!
//! Repository, sub-project and method IDs embed truncated hashes to bound
//! their length. Collisions are unlikely within one repository but become a
//! real risk if IDs from many repositories share one namespace.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::errors::{GraphError, GraphResult};
use crate::models::EntityKind;

/// Package segment used for types declared without a `package` statement.
pub const DEFAULT_PACKAGE: &str = "_default";

/// Natural-key parts for each entity kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Package {
        package: String,
    },
    Class {
        package: String,
        name: String,
    },
    Method {
        class_id: String,
        name: String,
        parameter_types: Vec<String>,
    },
    Field {
        class_id: String,
        name: String,
    },
    Repository {
        path: String,
        name: String,
    },
    SubProject {
        repository_path: String,
        path: String,
        name: String,
    },
    AnnotationUsage {
        target_id: String,
        annotation: String,
        discriminator: Option<String>,
    },
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Package { .. } => EntityKind::Package,
            EntityKey::Class { .. } => EntityKind::Class,
            EntityKey::Method { .. } => EntityKind::Method,
            EntityKey::Field { .. } => EntityKind::Field,
            EntityKey::Repository { .. } => EntityKind::Repository,
            EntityKey::SubProject { .. } => EntityKind::SubProject,
            EntityKey::AnnotationUsage { .. } => EntityKind::AnnotationUsage,
        }
    }

    /// Build a key from positional parts.
    ///
    /// Layout per kind: Package `[package]`; Class `[package, name]`; Method
    /// `[class_id, name, param_types...]`; Field `[class_id, name]`;
    /// Repository `[path, name]`; SubProject `[repository_path, path, name]`;
    /// AnnotationUsage `[target_id, annotation, discriminator?]`.
    pub fn from_parts(kind: EntityKind, parts: &[&str]) -> GraphResult<Self> {
        let part = |i: usize| -> GraphResult<String> {
            parts.get(i).map(|p| p.to_string()).ok_or_else(|| {
                GraphError::invalid_identity(kind.as_str(), format!("missing key part {i}"))
            })
        };
        Ok(match kind {
            EntityKind::Package => EntityKey::Package { package: part(0)? },
            EntityKind::Class => EntityKey::Class {
                package: part(0)?,
                name: part(1)?,
            },
            EntityKind::Method => EntityKey::Method {
                class_id: part(0)?,
                name: part(1)?,
                parameter_types: parts.iter().skip(2).map(|p| p.to_string()).collect(),
            },
            EntityKind::Field => EntityKey::Field {
                class_id: part(0)?,
                name: part(1)?,
            },
            EntityKind::Repository => EntityKey::Repository {
                path: part(0)?,
                name: part(1)?,
            },
            EntityKind::SubProject => EntityKey::SubProject {
                repository_path: part(0)?,
                path: part(1)?,
                name: part(2)?,
            },
            EntityKind::AnnotationUsage => EntityKey::AnnotationUsage {
                target_id: part(0)?,
                annotation: part(1)?,
                discriminator: parts.get(2).map(|p| p.to_string()),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Unify package separators (`/`, `\`, `::`) to `.`, drop empty segments and
/// lower-case the result.
pub fn normalize_package(raw: &str) -> String {
    raw.replace("::", ".")
        .replace(['/', '\\'], ".")
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(".")
        .to_lowercase()
}

/// Forward slashes, no `.` segments, `..` folded, no leading or trailing
/// separator.
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let mut stack: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(part),
        }
    }
    stack.join("/")
}

/// Binary type name: nested types joined with `$`, generic arguments and
/// array brackets dropped.
pub fn normalize_class_name(raw: &str) -> String {
    let base = raw.split('<').next().unwrap_or("");
    base.replace("[]", "")
        .replace("...", "")
        .split(['.', '$'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("$")
}

static WILDCARD_EXTENDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?\s*extends\s+").unwrap());

static WILDCARD_SUPER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?\s*super\s+").unwrap());

/// Canonical form of one parameter type for signature hashing.
///
/// Qualifiers are stripped per component, array dimensions and varargs
/// become an `Array` suffix, and generic argument lists are flattened in
/// order, so `Map<String, List<Integer>>` becomes `Map_String_List_Integer`.
pub fn normalize_type_for_signature(raw: &str) -> String {
    let marked = WILDCARD_EXTENDS_RE.replace_all(raw.trim(), "+");
    let marked = WILDCARD_SUPER_RE.replace_all(&marked, "-");
    let compact: String = marked.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .split(['<', '>', ','])
        .filter(|s| !s.is_empty())
        .map(normalize_type_component)
        .collect::<Vec<_>>()
        .join("_")
}

fn normalize_type_component(component: &str) -> String {
    let mut base = component;
    let mut dimensions = 0usize;
    loop {
        if let Some(stripped) = base.strip_suffix("[]") {
            base = stripped;
            dimensions += 1;
        } else if let Some(stripped) = base.strip_suffix("...") {
            base = stripped;
            dimensions += 1;
        } else {
            break;
        }
    }
    let (marker, body) = match base.chars().next() {
        Some(c @ ('+' | '-')) => (c.to_string(), &base[1..]),
        _ => (String::new(), base),
    };
    let simple = body.rsplit('.').next().unwrap_or(body);
    format!("{marker}{simple}{}", "Array".repeat(dimensions))
}

/// 4-byte (8 hex chars) CRC-32 over the normalized, order-preserving
/// parameter type list.
pub fn parameter_signature_hash(parameter_types: &[String]) -> String {
    let normalized: Vec<String> = parameter_types
        .iter()
        .map(|t| normalize_type_for_signature(t))
        .collect();
    format!("{:08x}", crc32fast::hash(normalized.join(",").as_bytes()))
}

/// First 16 hex chars of the SHA-256 digest of `input`.
pub fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

// ---------------------------------------------------------------------------
// Generation and validation
// ---------------------------------------------------------------------------

fn require(kind: EntityKind, what: &str, value: &str) -> GraphResult<()> {
    if value.is_empty() {
        return Err(GraphError::invalid_identity(
            kind.as_str(),
            format!("empty {what}"),
        ));
    }
    Ok(())
}

fn require_simple_identifier(kind: EntityKind, what: &str, value: &str) -> GraphResult<()> {
    require(kind, what, value)?;
    if value.contains([':', '#', '@', '/']) || value.chars().any(char::is_whitespace) {
        return Err(GraphError::invalid_identity(
            kind.as_str(),
            format!("{what} contains reserved characters: {value:?}"),
        ));
    }
    Ok(())
}

/// The body of `id` if it carries the expected kind prefix.
fn owner_body(owner_kind: EntityKind, child: EntityKind, id: &str) -> GraphResult<String> {
    if !validate_id(id, owner_kind) {
        return Err(GraphError::invalid_identity(
            child.as_str(),
            format!("owner {id:?} is not a valid {owner_kind} id"),
        ));
    }
    Ok(id[owner_kind.prefix().len() + 1..].to_string())
}

/// Compute the stable ID of an entity from its natural key.
pub fn generate_id(key: &EntityKey) -> GraphResult<String> {
    let kind = key.kind();
    let prefix = kind.prefix();
    match key {
        EntityKey::Package { package } => {
            let package = normalize_package(package);
            require(kind, "package", &package)?;
            Ok(format!("{prefix}:{package}"))
        }
        EntityKey::Class { package, name } => {
            let name = normalize_class_name(name);
            require_simple_identifier(kind, "class name", &name)?;
            let package = normalize_package(package);
            let package = if package.is_empty() {
                DEFAULT_PACKAGE.to_string()
            } else {
                package
            };
            Ok(format!("{prefix}:{package}:{name}"))
        }
        EntityKey::Method {
            class_id,
            name,
            parameter_types,
        } => {
            let owner = owner_body(EntityKind::Class, kind, class_id)?;
            let name = name.trim();
            require_simple_identifier(kind, "method name", name)?;
            let hash = parameter_signature_hash(parameter_types);
            Ok(format!("{prefix}:{owner}#{name}:{hash}"))
        }
        EntityKey::Field { class_id, name } => {
            let owner = owner_body(EntityKind::Class, kind, class_id)?;
            let name = name.trim();
            require_simple_identifier(kind, "field name", name)?;
            Ok(format!("{prefix}:{owner}#{name}"))
        }
        EntityKey::Repository { path, name } => {
            let path = normalize_path(path);
            require(kind, "repository path", &path)?;
            let name = name.trim();
            require(kind, "repository name", name)?;
            Ok(format!("{prefix}:{}", short_hash(&format!("{path}|{name}"))))
        }
        EntityKey::SubProject {
            repository_path,
            path,
            name,
        } => {
            let repository_path = normalize_path(repository_path);
            require(kind, "repository path", &repository_path)?;
            let name = name.trim();
            require(kind, "sub-project name", name)?;
            let path = normalize_path(path);
            Ok(format!(
                "{prefix}:{}",
                short_hash(&format!("{repository_path}|{path}|{name}"))
            ))
        }
        EntityKey::AnnotationUsage {
            target_id,
            annotation,
            discriminator,
        } => {
            if extract_kind(target_id).is_none() {
                return Err(GraphError::invalid_identity(
                    kind.as_str(),
                    format!("annotation target {target_id:?} is not a valid id"),
                ));
            }
            let annotation = annotation.trim().trim_start_matches('@');
            require_simple_identifier(kind, "annotation name", annotation)?;
            match discriminator.as_deref().map(str::trim) {
                Some(d) if !d.is_empty() => {
                    require_simple_identifier(kind, "annotation discriminator", d)?;
                    Ok(format!("{prefix}:{target_id}/{d}@{annotation}"))
                }
                _ => Ok(format!("{prefix}:{target_id}@{annotation}")),
            }
        }
    }
}

/// Positional-parts form of [`generate_id`].
pub fn generate_id_from_parts(kind: EntityKind, parts: &[&str]) -> GraphResult<String> {
    generate_id(&EntityKey::from_parts(kind, parts)?)
}

/// Reverse lookup of the kind encoded in `id`. `None` for malformed input.
pub fn extract_kind(id: &str) -> Option<EntityKind> {
    let (prefix, body) = id.split_once(':')?;
    if body.is_empty() {
        return None;
    }
    EntityKind::from_prefix(prefix)
}

/// True if `id` is well-formed and carries the prefix of `expected`.
pub fn validate_id(id: &str, expected: EntityKind) -> bool {
    extract_kind(id) == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_id(package: &str, name: &str) -> String {
        generate_id(&EntityKey::Class {
            package: package.to_string(),
            name: name.to_string(),
        })
        .unwrap()
    }

    fn method_id(class: &str, name: &str, params: &[&str]) -> String {
        generate_id(&EntityKey::Method {
            class_id: class.to_string(),
            name: name.to_string(),
            parameter_types: params.iter().map(|p| p.to_string()).collect(),
        })
        .unwrap()
    }

    #[test]
    fn package_normalization() {
        assert_eq!(normalize_package("Com/Example\\App"), "com.example.app");
        assert_eq!(normalize_package("a::b..c."), "a.b.c");
        assert_eq!(normalize_package("  "), "");
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("./src\\main//java/"), "src/main/java");
        assert_eq!(normalize_path("/repo/a/../b"), "repo/b");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn class_ids_are_deterministic() {
        let a = class_id("com.example", "Service");
        let b = class_id("COM/example", "Service");
        assert_eq!(a, "cls:com.example:Service");
        assert_eq!(a, b);
        assert_eq!(class_id("", "Main"), "cls:_default:Main");
        assert_eq!(class_id("a", "Outer.Inner"), "cls:a:Outer$Inner");
    }

    #[test]
    fn empty_natural_keys_are_rejected() {
        let err = generate_id(&EntityKey::Class {
            package: "a".to_string(),
            name: " ".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, GraphError::InvalidIdentity { kind: "Class", .. }));

        assert!(generate_id(&EntityKey::Package {
            package: "".to_string()
        })
        .is_err());
        assert!(generate_id(&EntityKey::Repository {
            path: "/".to_string(),
            name: "repo".to_string()
        })
        .is_err());
        assert!(generate_id(&EntityKey::Method {
            class_id: "not-an-id".to_string(),
            name: "run".to_string(),
            parameter_types: vec![],
        })
        .is_err());
    }

    #[test]
    fn overloads_get_distinct_ids() {
        let owner = class_id("com.example", "Processor");
        let a = method_id(&owner, "process", &["String"]);
        let b = method_id(&owner, "process", &["String", "int"]);
        let c = method_id(&owner, "process", &[]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("mth:com.example:Processor#process:"));
        assert_eq!(a.len(), "mth:com.example:Processor#process:".len() + 8);
    }

    #[test]
    fn parameter_order_matters() {
        let owner = class_id("p", "C");
        assert_ne!(
            method_id(&owner, "m", &["int", "String"]),
            method_id(&owner, "m", &["String", "int"])
        );
    }

    #[test]
    fn signature_normalization_rules() {
        assert_eq!(normalize_type_for_signature("java.util.List<String>"), "List_String");
        assert_eq!(
            normalize_type_for_signature("Map<String, List<Integer>>"),
            "Map_String_List_Integer"
        );
        assert_eq!(normalize_type_for_signature("int[][]"), "intArrayArray");
        assert_eq!(normalize_type_for_signature("String..."), "StringArray");
        assert_eq!(
            normalize_type_for_signature("List<? extends Number>"),
            "List_+Number"
        );
        assert_ne!(
            parameter_signature_hash(&["List<String>".to_string()]),
            parameter_signature_hash(&["List<Integer>".to_string()])
        );
        assert_eq!(
            parameter_signature_hash(&["java.util.List<java.lang.String>".to_string()]),
            parameter_signature_hash(&["List< String >".to_string()])
        );
        assert_ne!(
            parameter_signature_hash(&["int".to_string()]),
            parameter_signature_hash(&["int[]".to_string()])
        );
    }

    #[test]
    fn repository_ids_depend_on_path_and_name() {
        let a = generate_id_from_parts(EntityKind::Repository, &["/work/app/", "app"]).unwrap();
        let b = generate_id_from_parts(EntityKind::Repository, &["\\work\\app", "app"]).unwrap();
        let c = generate_id_from_parts(EntityKind::Repository, &["/work/app", "other"]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), "repo:".len() + 16);
    }

    #[test]
    fn kind_safety_for_every_kind() {
        let owner = class_id("a.b", "C");
        let cases = [
            (EntityKind::Package, vec!["a.b"]),
            (EntityKind::Class, vec!["a.b", "C"]),
            (EntityKind::Method, vec![owner.as_str(), "run", "int"]),
            (EntityKind::Field, vec![owner.as_str(), "count"]),
            (EntityKind::Repository, vec!["/repo", "repo"]),
            (EntityKind::SubProject, vec!["/repo", "modules/api", "api"]),
            (EntityKind::AnnotationUsage, vec![owner.as_str(), "java.lang.Deprecated"]),
        ];
        for (kind, parts) in cases {
            let id = generate_id_from_parts(kind, &parts).unwrap();
            assert_eq!(extract_kind(&id), Some(kind), "id {id}");
            assert!(validate_id(&id, kind));
        }
    }

    #[test]
    fn malformed_ids_fail_closed() {
        assert_eq!(extract_kind(""), None);
        assert_eq!(extract_kind("cls"), None);
        assert_eq!(extract_kind("cls:"), None);
        assert_eq!(extract_kind("zzz:abc"), None);
        assert!(!validate_id("cls:a:B", EntityKind::Method));
    }

    #[test]
    fn annotation_usage_ids() {
        let owner = class_id("a", "B");
        let method = method_id(&owner, "run", &["String"]);
        let on_class = generate_id(&EntityKey::AnnotationUsage {
            target_id: owner.clone(),
            annotation: "@org.junit.Test".to_string(),
            discriminator: None,
        })
        .unwrap();
        assert_eq!(on_class, "annu:cls:a:B@org.junit.Test");
        let on_param = generate_id(&EntityKey::AnnotationUsage {
            target_id: method.clone(),
            annotation: "NotNull".to_string(),
            discriminator: Some("name".to_string()),
        })
        .unwrap();
        assert_eq!(on_param, format!("annu:{method}/name@NotNull"));
        assert_eq!(extract_kind(&on_param), Some(EntityKind::AnnotationUsage));
    }
}
