//! Environment-driven configuration.
//!
//! Every setting has a default; `from_env` overlays `DEPGRAPH_*` variables.
//! Boolean flags are on unless set to `0`, `false`, `no` or `off`.

use serde::{Deserialize, Serialize};

/// Package prefixes treated as framework / standard-library code.
pub const DEFAULT_EXTERNAL_PREFIXES: &[&str] = &[
    "java.",
    "javax.",
    "jakarta.",
    "jdk.",
    "sun.",
    "com.sun.",
    "org.springframework.",
    "org.apache.",
    "org.junit.",
    "org.hibernate.",
    "org.slf4j.",
    "com.google.",
    "com.fasterxml.",
    "lombok.",
    "io.micronaut.",
    "reactor.",
];

/// Attribute names that are always tracked but never significant for diffs.
pub const DEFAULT_EPHEMERAL_ATTRIBUTES: &[&str] = &["indexed_at"];

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

fn flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(val) => {
            let v = val.trim().to_lowercase();
            !matches!(v.as_str(), "0" | "false" | "no" | "off")
        }
        None => default,
    }
}

fn list(value: Option<String>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn number<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub external_prefixes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            external_prefixes: DEFAULT_EXTERNAL_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `DEPGRAPH_EXTERNAL_PREFIXES` replaces the default list;
    /// `DEPGRAPH_EXTRA_EXTERNAL_PREFIXES` extends it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(prefixes) = list(lookup("DEPGRAPH_EXTERNAL_PREFIXES")) {
            config.external_prefixes = prefixes;
        }
        if let Some(extra) = list(lookup("DEPGRAPH_EXTRA_EXTERNAL_PREFIXES")) {
            config.external_prefixes.extend(extra);
        }
        config
    }

    pub fn is_external(&self, qualified_name: &str) -> bool {
        self.external_prefixes
            .iter()
            .any(|p| qualified_name.starts_with(p.as_str()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audit_enabled: bool,
    pub ephemeral_attributes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            ephemeral_attributes: DEFAULT_EPHEMERAL_ATTRIBUTES
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        config.audit_enabled = flag(lookup("DEPGRAPH_AUDIT"), true);
        if let Some(extra) = list(lookup("DEPGRAPH_EPHEMERAL_ATTRIBUTES")) {
            config.ephemeral_attributes.extend(extra);
        }
        config
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub workers: usize,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub exclude_sensitive: bool,
    pub busy_timeout_ms: u64,
    pub classifier: ClassifierConfig,
    pub engine: EngineConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            exclude_sensitive: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            classifier: ClassifierConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            workers: number(lookup("DEPGRAPH_WORKERS"), DEFAULT_WORKERS).max(1),
            include_patterns: list(lookup("DEPGRAPH_INCLUDE")).unwrap_or_default(),
            exclude_patterns: list(lookup("DEPGRAPH_EXCLUDE")).unwrap_or_default(),
            exclude_sensitive: flag(lookup("DEPGRAPH_EXCLUDE_SENSITIVE"), true),
            busy_timeout_ms: number(lookup("DEPGRAPH_BUSY_TIMEOUT_MS"), DEFAULT_BUSY_TIMEOUT_MS),
            classifier: ClassifierConfig::from_lookup(&lookup),
            engine: EngineConfig::from_lookup(&lookup),
        }
    }
}
