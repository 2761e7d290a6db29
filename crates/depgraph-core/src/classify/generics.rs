//! Type-string parsing for declared types.
//!
//! Turns source spellings such as `Map<String, List<? extends Number>>[]`
//! into a small tree so the classifier can emit one edge for the outer type
//! and one per generic argument, recursively.

use std::sync::LazyLock;

use regex::Regex;

/// Leading type-use annotations (`@NonNull String`).
static TYPE_ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z_][A-Za-z0-9_.]*(\([^)]*\))?\s*").unwrap());

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void", "var",
];

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

/// One node of a parsed type spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeRef {
    /// Base name as written, possibly dotted (`Map.Entry`, `java.util.List`).
    pub base: String,
    /// Generic arguments in order. Bare wildcards are dropped; bounded
    /// wildcards contribute their bound.
    pub arguments: Vec<TypeRef>,
    /// Array dimensions, varargs counting as one.
    pub dimensions: usize,
}

impl TypeRef {
    /// Last dotted segment of the base name.
    pub fn simple_name(&self) -> &str {
        self.base.rsplit('.').next().unwrap_or(&self.base)
    }

    pub fn is_primitive(&self) -> bool {
        is_primitive(&self.base)
    }
}

/// Parse a type spelling. `None` for empty input or a bare wildcard.
pub fn parse_type(raw: &str) -> Option<TypeRef> {
    let cleaned = TYPE_ANNOTATION_RE.replace_all(raw, "");
    let chars: Vec<char> = cleaned.chars().collect();
    let mut cursor = Cursor { chars, pos: 0 };
    cursor.parse_ref()
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        let len = token.chars().count();
        let matches = self
            .chars
            .get(self.pos..self.pos + len)
            .is_some_and(|slice| slice.iter().copied().eq(token.chars()));
        if matches {
            self.pos += len;
        }
        matches
    }

    fn keyword(&mut self, word: &str) -> bool {
        let start = self.pos;
        if !self.eat(word) {
            return false;
        }
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos = start;
            return false;
        }
        true
    }

    fn parse_ref(&mut self) -> Option<TypeRef> {
        self.skip_ws();
        if self.peek() == Some('?') {
            self.pos += 1;
            self.skip_ws();
            if self.keyword("extends") || self.keyword("super") {
                return self.parse_ref();
            }
            return None;
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            // `...` is varargs, not a name separator.
            if self.peek() == Some('.') && self.chars.get(self.pos + 1) == Some(&'.') {
                break;
            }
            self.pos += 1;
        }
        let base: String = self.chars[start..self.pos].iter().collect();
        let base = base.trim_matches('.').to_string();

        let mut arguments = Vec::new();
        self.skip_ws();
        if self.peek() == Some('<') {
            self.pos += 1;
            loop {
                if let Some(arg) = self.parse_ref() {
                    arguments.push(arg);
                }
                self.skip_ws();
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some('>') => {
                        self.pos += 1;
                        break;
                    }
                    None => break,
                    Some(_) => self.pos += 1,
                }
            }
        }

        let mut dimensions = 0;
        loop {
            self.skip_ws();
            if self.eat("[]") || self.eat("...") {
                dimensions += 1;
            } else if self.peek() == Some('[') {
                // `[ ]` with inner whitespace
                self.pos += 1;
                self.skip_ws();
                if self.peek() == Some(']') {
                    self.pos += 1;
                    dimensions += 1;
                }
            } else {
                break;
            }
        }

        if base.is_empty() {
            return None;
        }
        Some(TypeRef {
            base,
            arguments,
            dimensions,
        })
    }
}

/// Name of a declared type parameter (`T extends Comparable<T>` → `T`).
pub fn type_parameter_name(raw: &str) -> &str {
    TYPE_PARAMETER_PREFIX_RE
        .find(raw.trim())
        .map_or("", |m| m.as_str())
}

static TYPE_PARAMETER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*").unwrap());

#[cfg(test)]
mod tests {
    use super::*;

    fn names(t: &TypeRef) -> Vec<String> {
        let mut out = vec![t.base.clone()];
        for arg in &t.arguments {
            out.extend(names(arg));
        }
        out
    }

    #[test]
    fn test_simple_and_qualified() {
        let t = parse_type("String").unwrap();
        assert_eq!(t.base, "String");
        assert!(t.arguments.is_empty());

        let t = parse_type(" java.util.List<java.lang.String> ").unwrap();
        assert_eq!(t.base, "java.util.List");
        assert_eq!(t.simple_name(), "List");
        assert_eq!(t.arguments[0].base, "java.lang.String");
    }

    #[test]
    fn test_nested_generics() {
        let t = parse_type("Map<String, List<Integer>>").unwrap();
        assert_eq!(names(&t), vec!["Map", "String", "List", "Integer"]);
        assert_eq!(t.arguments.len(), 2);
        assert_eq!(t.arguments[1].arguments[0].base, "Integer");
    }

    #[test]
    fn test_wildcards() {
        let t = parse_type("List<? extends Number>").unwrap();
        assert_eq!(t.arguments[0].base, "Number");
        let t = parse_type("Comparator<? super T>").unwrap();
        assert_eq!(t.arguments[0].base, "T");
        let t = parse_type("Class<?>").unwrap();
        assert!(t.arguments.is_empty());
        assert!(parse_type("?").is_none());
    }

    #[test]
    fn test_arrays_and_varargs() {
        assert_eq!(parse_type("int[][]").unwrap().dimensions, 2);
        let t = parse_type("String...").unwrap();
        assert_eq!(t.base, "String");
        assert_eq!(t.dimensions, 1);
        assert_eq!(parse_type("List<String>[]").unwrap().dimensions, 1);
        assert!(parse_type("int").unwrap().is_primitive());
    }

    #[test]
    fn test_annotations_and_garbage() {
        let t = parse_type("@NonNull String").unwrap();
        assert_eq!(t.base, "String");
        assert!(parse_type("").is_none());
        let t = parse_type("Map<String,,>").unwrap();
        assert_eq!(names(&t), vec!["Map", "String"]);
        let t = parse_type("Map<String").unwrap();
        assert_eq!(names(&t), vec!["Map", "String"]);
    }

    #[test]
    fn test_type_parameter_name() {
        assert_eq!(type_parameter_name("T extends Comparable<T>"), "T");
        assert_eq!(type_parameter_name(" K "), "K");
    }
}
