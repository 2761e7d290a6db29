//! tree-sitter parsing wrapper used by fact extraction.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::errors::{GraphError, GraphResult};

pub const SUPPORTED_LANGUAGES: &[&str] = &["java"];

/// Parsed source unit: the raw text plus its syntax tree.
pub struct ParsedUnit {
    pub path: String,
    pub language: String,
    pub source: String,
    pub tree: tree_sitter::Tree,
}

/// Language for a file extension, if any grammar handles it.
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("java") => Some("java"),
        _ => None,
    }
}

pub fn parse_source(path: &str, language: &str, source: String) -> GraphResult<ParsedUnit> {
    let ts_language = match language {
        "java" => tree_sitter_java::LANGUAGE,
        _ => return Err(GraphError::Parse(format!("Unsupported language: {language}"))),
    };

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&ts_language.into())
        .map_err(|e| GraphError::Parse(format!("Failed to set language: {e}")))?;

    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| GraphError::Parse(format!("Failed to parse {path}")))?;

    Ok(ParsedUnit {
        path: path.to_string(),
        language: language.to_string(),
        source,
        tree,
    })
}

/// Read and parse one file. `display_path` is the repository-relative path
/// recorded on the facts.
pub fn parse_file(path: &Path, display_path: &str) -> GraphResult<ParsedUnit> {
    let language = language_for_path(path)
        .ok_or_else(|| GraphError::Parse(format!("Unsupported file: {}", path.display())))?;
    let source = std::fs::read_to_string(path)?;
    parse_source(display_path, language, source)
}

#[derive(Clone, Debug, Serialize)]
pub struct LanguageCapability {
    pub language: String,
    pub backend: String,
    pub available: bool,
    pub reason: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CapabilityReport {
    pub module_available: bool,
    pub all_required_available: bool,
    pub required_languages: Vec<String>,
    pub versions: BTreeMap<String, String>,
    pub languages: Vec<LanguageCapability>,
}

/// Which grammars load in this build.
pub fn capability_report() -> CapabilityReport {
    let languages: Vec<LanguageCapability> = SUPPORTED_LANGUAGES
        .iter()
        .map(|lang| {
            let available = parse_source("<probe>", lang, String::new()).is_ok();
            LanguageCapability {
                language: lang.to_string(),
                backend: format!("tree-sitter-{lang}"),
                available,
                reason: if available { "ok" } else { "parser_unavailable" }.to_string(),
            }
        })
        .collect();

    let mut versions = BTreeMap::new();
    versions.insert("tree-sitter".to_string(), "0.24".to_string());
    versions.insert("tree-sitter-java".to_string(), "0.23".to_string());

    CapabilityReport {
        module_available: true,
        all_required_available: languages.iter().all(|l| l.available),
        required_languages: SUPPORTED_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        versions,
        languages,
    }
}
