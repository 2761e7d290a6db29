//! Annotation argument normalization.

use std::collections::BTreeMap;

/// Strip surrounding double quotes from a string literal, and from each
/// element of an array initializer (`{"a", "b"}` → `a, b`).
pub fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
    {
        return split_top_level(inner)
            .iter()
            .map(|item| clean_value(item))
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
    }
    strip_quotes(trimmed).to_string()
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Split on commas that are not inside quotes, braces or parentheses.
pub fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                current.push(c);
            }
            '{' | '(' => {
                depth += 1;
                current.push(c);
            }
            '}' | ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Parse the text between an annotation's parentheses into named values.
/// A single unnamed argument is keyed `value`.
pub fn parse_arguments(text: &str) -> BTreeMap<String, String> {
    let inner = text.trim();
    let inner = inner
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(inner);
    let mut arguments = BTreeMap::new();
    for part in split_top_level(inner) {
        match split_pair(&part) {
            Some((name, value)) => {
                arguments.insert(name.to_string(), value.to_string());
            }
            None => {
                arguments.insert("value".to_string(), part);
            }
        }
    }
    arguments
}

/// `name = value`, ignoring `=` inside string literals or `==`.
fn split_pair(part: &str) -> Option<(&str, &str)> {
    let eq = part.find('=')?;
    let name = part[..eq].trim();
    let is_identifier = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if !is_identifier || part[eq + 1..].starts_with('=') {
        return None;
    }
    Some((name, part[eq + 1..].trim()))
}

/// Cleaned copy of an annotation's raw argument map.
pub fn clean_arguments(arguments: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    arguments
        .iter()
        .map(|(name, value)| (name.clone(), clean_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("\"/api/users\""), "/api/users");
        assert_eq!(clean_value(" 42 "), "42");
        assert_eq!(clean_value("{\"a\", \"b\"}"), "a, b");
        assert_eq!(clean_value("\""), "\"");
    }

    #[test]
    fn test_parse_arguments() {
        let args = parse_arguments("(\"/users\")");
        assert_eq!(args.get("value").map(String::as_str), Some("\"/users\""));

        let args = parse_arguments("value = \"/a,b\", method = {GET, POST}");
        assert_eq!(args.len(), 2);
        assert_eq!(args["value"], "\"/a,b\"");
        assert_eq!(args["method"], "{GET, POST}");

        let cleaned = clean_arguments(&args);
        assert_eq!(cleaned["value"], "/a,b");
        assert_eq!(cleaned["method"], "GET, POST");

        assert!(parse_arguments("()").is_empty());
    }

    #[test]
    fn test_split_respects_nesting() {
        assert_eq!(
            split_top_level("a, f(b, c), \"d, e\""),
            vec!["a", "f(b, c)", "\"d, e\""]
        );
    }
}
