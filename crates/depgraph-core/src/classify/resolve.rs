//! Name resolution: import context, built-in types and same-unit lookup.

use std::collections::HashMap;

use crate::config::ClassifierConfig;
use crate::facts::ImportFact;
use crate::identity::{normalize_package, DEFAULT_PACKAGE};

/// Types visible without an import, forced external.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    // java.lang
    ("Object", "java.lang"),
    ("String", "java.lang"),
    ("CharSequence", "java.lang"),
    ("StringBuilder", "java.lang"),
    ("Integer", "java.lang"),
    ("Long", "java.lang"),
    ("Short", "java.lang"),
    ("Byte", "java.lang"),
    ("Double", "java.lang"),
    ("Float", "java.lang"),
    ("Boolean", "java.lang"),
    ("Character", "java.lang"),
    ("Number", "java.lang"),
    ("Void", "java.lang"),
    ("Math", "java.lang"),
    ("System", "java.lang"),
    ("Thread", "java.lang"),
    ("Runnable", "java.lang"),
    ("Class", "java.lang"),
    ("Enum", "java.lang"),
    ("Record", "java.lang"),
    ("Iterable", "java.lang"),
    ("Comparable", "java.lang"),
    ("AutoCloseable", "java.lang"),
    ("Throwable", "java.lang"),
    ("Exception", "java.lang"),
    ("Error", "java.lang"),
    ("RuntimeException", "java.lang"),
    ("IllegalArgumentException", "java.lang"),
    ("IllegalStateException", "java.lang"),
    ("NullPointerException", "java.lang"),
    ("UnsupportedOperationException", "java.lang"),
    ("Override", "java.lang"),
    ("Deprecated", "java.lang"),
    ("SuppressWarnings", "java.lang"),
    ("FunctionalInterface", "java.lang"),
    // core collections
    ("Collection", "java.util"),
    ("Collections", "java.util"),
    ("List", "java.util"),
    ("ArrayList", "java.util"),
    ("LinkedList", "java.util"),
    ("Map", "java.util"),
    ("HashMap", "java.util"),
    ("LinkedHashMap", "java.util"),
    ("TreeMap", "java.util"),
    ("Set", "java.util"),
    ("HashSet", "java.util"),
    ("LinkedHashSet", "java.util"),
    ("TreeSet", "java.util"),
    ("Queue", "java.util"),
    ("Deque", "java.util"),
    ("ArrayDeque", "java.util"),
    ("Iterator", "java.util"),
    ("Optional", "java.util"),
    ("Objects", "java.util"),
    ("Arrays", "java.util"),
    ("UUID", "java.util"),
    // IO
    ("File", "java.io"),
    ("InputStream", "java.io"),
    ("OutputStream", "java.io"),
    ("Reader", "java.io"),
    ("Writer", "java.io"),
    ("BufferedReader", "java.io"),
    ("PrintStream", "java.io"),
    ("Serializable", "java.io"),
    ("IOException", "java.io"),
    ("Path", "java.nio.file"),
    ("Paths", "java.nio.file"),
    ("Files", "java.nio.file"),
];

pub fn builtin_package(simple_name: &str) -> Option<&'static str> {
    BUILTIN_TYPES
        .iter()
        .find(|(name, _)| *name == simple_name)
        .map(|(_, package)| *package)
}

// ---------------------------------------------------------------------------
// ImportContext
// ---------------------------------------------------------------------------

/// Per-unit import table. Simple-name lookups are case-sensitive and the
/// last import of a simple name wins.
///
/// Wildcard imports are recorded but never consulted by [`ResolveContext`]:
/// without the imported package's type list a name under `import a.b.*`
/// cannot be told apart from a type in the unit's own package, so such
/// names resolve as [`Resolution::SamePackage`].
#[derive(Clone, Debug, Default)]
pub struct ImportContext {
    single: HashMap<String, String>,
    static_members: HashMap<String, String>,
    wildcards: Vec<String>,
    static_wildcards: Vec<String>,
}

impl ImportContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, simple_name: &str, qualified_name: &str) {
        self.single
            .insert(simple_name.to_string(), qualified_name.to_string());
    }

    pub fn add(&mut self, import: &ImportFact) {
        let path = import.path.trim().trim_end_matches(".*");
        if path.is_empty() {
            return;
        }
        match (import.is_static, import.is_wildcard) {
            (false, false) => {
                let simple = path.rsplit('.').next().unwrap_or(path);
                self.insert(simple, path);
            }
            (false, true) => self.wildcards.push(path.to_string()),
            (true, false) => {
                if let Some((owner, member)) = path.rsplit_once('.') {
                    self.static_members
                        .insert(member.to_string(), owner.to_string());
                }
            }
            (true, true) => self.static_wildcards.push(path.to_string()),
        }
    }

    pub fn lookup(&self, simple_name: &str) -> Option<&str> {
        self.single.get(simple_name).map(String::as_str)
    }

    /// Owning class of a statically imported member.
    pub fn static_owner(&self, member: &str) -> Option<&str> {
        self.static_members.get(member).map(String::as_str)
    }


    pub fn is_empty(&self) -> bool {
        self.single.is_empty()
            && self.static_members.is_empty()
            && self.wildcards.is_empty()
            && self.static_wildcards.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How a name was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Qualified,
    Imported,
    Builtin,
    /// Declared in the unit being classified.
    Local,
    /// Assumed to live in the unit's package.
    SamePackage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedType {
    pub package: String,
    /// Binary name relative to the package (`Outer$Inner`).
    pub binary_name: String,
    pub qualified_name: String,
    pub is_external: bool,
    pub resolution: Resolution,
}

/// Split a dotted name into package and binary name. Package segments are
/// the leading segments that start lower-case.
pub fn split_qualified(qualified_name: &str) -> (String, String) {
    let segments: Vec<&str> = qualified_name.split('.').filter(|s| !s.is_empty()).collect();
    let boundary = segments
        .iter()
        .position(|s| s.chars().next().is_some_and(|c| !c.is_lowercase()))
        .unwrap_or(segments.len().saturating_sub(1));
    let package = segments[..boundary].join(".");
    let binary = segments[boundary..].join("$");
    (package, binary)
}

/// Dotted qualified name of a binary name in `package`.
pub fn qualified_for(package: &str, binary_name: &str) -> String {
    let dotted = binary_name.replace('$', ".");
    if package.is_empty() || package == DEFAULT_PACKAGE {
        dotted
    } else {
        format!("{package}.{dotted}")
    }
}

/// Lookup tables the resolver needs from the unit being classified.
pub struct ResolveContext<'a> {
    pub config: &'a ClassifierConfig,
    pub imports: &'a ImportContext,
    /// Simple name to binary name of types declared in the unit.
    pub local_types: &'a HashMap<String, String>,
    /// Normalized unit package; empty for the default package.
    pub package: &'a str,
}

impl ResolveContext<'_> {
    fn finish(&self, package: String, binary_name: String, resolution: Resolution) -> ResolvedType {
        let qualified_name = qualified_for(&package, &binary_name);
        let is_external =
            resolution == Resolution::Builtin || self.config.is_external(&qualified_name);
        ResolvedType {
            package,
            binary_name,
            qualified_name,
            is_external,
            resolution,
        }
    }

    /// Resolve a base type name as written (`List`, `Map.Entry`,
    /// `java.util.List`, `Outer.Inner`). Always succeeds for a non-empty name.
    pub fn resolve(&self, name: &str) -> Option<ResolvedType> {
        let name = name.trim().trim_start_matches('@');
        if name.is_empty() {
            return None;
        }

        if let Some((head, rest)) = name.split_once('.') {
            if head.chars().next().is_some_and(char::is_lowercase) {
                let (package, binary) = split_qualified(name);
                return Some(self.finish(normalize_package(&package), binary, Resolution::Qualified));
            }
            let outer = self.resolve(head)?;
            let binary = format!("{}${}", outer.binary_name, rest.replace('.', "$"));
            return Some(self.finish(outer.package, binary, outer.resolution));
        }

        if let Some(qualified) = self.imports.lookup(name) {
            let (package, binary) = split_qualified(qualified);
            return Some(self.finish(normalize_package(&package), binary, Resolution::Imported));
        }
        if let Some(package) = builtin_package(name) {
            return Some(self.finish(package.to_string(), name.to_string(), Resolution::Builtin));
        }
        if let Some(binary) = self.local_types.get(name) {
            return Some(self.finish(self.package.to_string(), binary.clone(), Resolution::Local));
        }
        Some(self.finish(
            self.package.to_string(),
            name.to_string(),
            Resolution::SamePackage,
        ))
    }

    /// Resolve the scope of a member access if it names a type rather than
    /// a variable. Constants (`LOG`, `MAX_SIZE`) and lower-case names are
    /// treated as variables.
    pub fn resolve_type_scope(&self, scope: &str) -> Option<ResolvedType> {
        let scope = scope.trim();
        let head = scope.split('.').next().unwrap_or(scope);
        if head.chars().next().is_some_and(char::is_lowercase) {
            return if scope.contains('.') {
                let last = scope.rsplit('.').next().unwrap_or(scope);
                if last.chars().next().is_some_and(char::is_uppercase) && !is_constant(last) {
                    self.resolve(scope)
                } else {
                    None
                }
            } else {
                None
            };
        }
        if is_constant(head) {
            return None;
        }
        self.resolve(scope)
    }
}

fn is_constant(name: &str) -> bool {
    name.chars().count() > 1
        && name
            .chars()
            .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_')
}
