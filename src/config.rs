//! Router configuration
//!
//! Read from the process environment (after loading `.env` with `dotenvy`).
//! Every field can be overridden with a builder method afterwards.

use std::path::PathBuf;

use crate::agentic::openai_client::DEFAULT_MODEL;
use crate::error::ConfigError;

pub const DEFAULT_SCHEMA_FILE: &str = "neo4j_schema.md";
pub const DEFAULT_DATABASE: &str = "neo4j";
pub const DEFAULT_HISTORY_TURNS: usize = 10;
pub const DEFAULT_OPTIMIZATION_MODEL: &str = "gpt-4o-mini";

/// Model and sampling temperature for one LLM collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(model: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            temperature,
        }
    }
}

/// Graph store connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    pub uri: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: None,
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

/// Everything [`Router::from_config`](crate::Router::from_config) needs
#[derive(Clone)]
pub struct RouterConfig {
    pub openai_api_key: Option<String>,
    pub classifier_model: ModelConfig,
    pub insight_model: ModelConfig,
    pub optimization_model: ModelConfig,
    pub insight_schema_file: PathBuf,
    pub optimization_schema_file: PathBuf,
    /// Fallback directory for relative schema references
    pub schema_base_dir: Option<PathBuf>,
    pub graph: GraphConfig,
    /// Conversation turns rendered into the classifier prompt
    pub history_turns: usize,
    /// Emit the variant "workflow started" status event
    pub emit_stage_markers: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            classifier_model: ModelConfig::new(DEFAULT_MODEL, 0.0),
            insight_model: ModelConfig::new(DEFAULT_MODEL, 0.0),
            optimization_model: ModelConfig::new(DEFAULT_OPTIMIZATION_MODEL, 0.1),
            insight_schema_file: PathBuf::from(DEFAULT_SCHEMA_FILE),
            optimization_schema_file: PathBuf::from(DEFAULT_SCHEMA_FILE),
            schema_base_dir: None,
            graph: GraphConfig::default(),
            history_turns: DEFAULT_HISTORY_TURNS,
            emit_stage_markers: false,
        }
    }
}

impl RouterConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to load .env file");
            }
        }
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.openai_api_key = var("OPENAI_API_KEY");
        if let Some(model) = var("CLASSIFIER_MODEL") {
            config.classifier_model.model = model;
        }
        if let Some(model) = var("INSIGHT_QUERY_MODEL") {
            config.insight_model.model = model;
        }
        if let Some(model) = var("OPTIMIZATION_QUERY_MODEL") {
            config.optimization_model.model = model;
        }

        if let Some(schema) = var("SCHEMA_FILE") {
            config.insight_schema_file = PathBuf::from(&schema);
            config.optimization_schema_file = PathBuf::from(schema);
        }
        if let Some(schema) = var("INSIGHT_SCHEMA_FILE") {
            config.insight_schema_file = PathBuf::from(schema);
        }
        if let Some(schema) = var("OPTIMIZATION_SCHEMA_FILE") {
            config.optimization_schema_file = PathBuf::from(schema);
        }
        config.schema_base_dir = var("SCHEMA_BASE_DIR").map(PathBuf::from);

        config.graph.uri = var("NEO4J_URI");
        config.graph.username = var("NEO4J_USERNAME");
        config.graph.password = var("NEO4J_PASSWORD");
        if let Some(database) = var("NEO4J_DATABASE") {
            config.graph.database = database;
        }

        if let Some(raw) = var("ROUTER_HISTORY_TURNS") {
            config.history_turns =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: "ROUTER_HISTORY_TURNS".to_string(),
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }
        if let Some(raw) = var("ROUTER_EMIT_STAGE_MARKERS") {
            config.emit_stage_markers = parse_flag("ROUTER_EMIT_STAGE_MARKERS", &raw)?;
        }

        Ok(config)
    }

    /// The API key, or an error naming the variable to set
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("OPENAI_API_KEY".to_string()))
    }

    /// Use one schema file for both variants
    pub fn schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.insight_schema_file = path.clone();
        self.optimization_schema_file = path;
        self
    }

    pub fn insight_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.insight_schema_file = path.into();
        self
    }

    pub fn optimization_schema_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.optimization_schema_file = path.into();
        self
    }

    pub fn schema_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_base_dir = Some(dir.into());
        self
    }

    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn classifier_model(mut self, model: ModelConfig) -> Self {
        self.classifier_model = model;
        self
    }

    pub fn insight_model(mut self, model: ModelConfig) -> Self {
        self.insight_model = model;
        self
    }

    pub fn optimization_model(mut self, model: ModelConfig) -> Self {
        self.optimization_model = model;
        self
    }

    pub fn graph(mut self, graph: GraphConfig) -> Self {
        self.graph = graph;
        self
    }

    pub fn history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn emit_stage_markers(mut self, enabled: bool) -> Self {
        self.emit_stage_markers = enabled;
        self
    }
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "***"))
            .field("classifier_model", &self.classifier_model)
            .field("insight_model", &self.insight_model)
            .field("optimization_model", &self.optimization_model)
            .field("insight_schema_file", &self.insight_schema_file)
            .field("optimization_schema_file", &self.optimization_schema_file)
            .field("schema_base_dir", &self.schema_base_dir)
            .field("graph_uri", &self.graph.uri)
            .field("graph_database", &self.graph.database)
            .field("history_turns", &self.history_turns)
            .field("emit_stage_markers", &self.emit_stage_markers)
            .finish()
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RouterConfig::from_vars(vars(&[])).unwrap();

        assert_eq!(config.classifier_model, ModelConfig::new("gpt-4o", 0.0));
        assert_eq!(config.optimization_model, ModelConfig::new("gpt-4o-mini", 0.1));
        assert_eq!(config.insight_schema_file, PathBuf::from("neo4j_schema.md"));
        assert_eq!(config.graph.database, "neo4j");
        assert_eq!(config.history_turns, 10);
        assert!(!config.emit_stage_markers);
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let config = RouterConfig::from_vars(vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("SCHEMA_FILE", "schemas/ads.md"),
            ("OPTIMIZATION_SCHEMA_FILE", "schemas/opt.md"),
            ("NEO4J_URI", "http://graph:7474"),
            ("NEO4J_DATABASE", "ads"),
            ("ROUTER_HISTORY_TURNS", "4"),
            ("ROUTER_EMIT_STAGE_MARKERS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.insight_schema_file, PathBuf::from("schemas/ads.md"));
        assert_eq!(config.optimization_schema_file, PathBuf::from("schemas/opt.md"));
        assert_eq!(config.graph.uri.as_deref(), Some("http://graph:7474"));
        assert_eq!(config.graph.database, "ads");
        assert_eq!(config.history_turns, 4);
        assert!(config.emit_stage_markers);
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = RouterConfig::from_vars(vars(&[("OPENAI_API_KEY", "  "), ("NEO4J_DATABASE", "")]))
            .unwrap();
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.graph.database, "neo4j");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RouterConfig::from_vars(vars(&[("ROUTER_HISTORY_TURNS", "lots")])).unwrap_err();
        assert!(err.to_string().contains("ROUTER_HISTORY_TURNS"));

        let err =
            RouterConfig::from_vars(vars(&[("ROUTER_EMIT_STAGE_MARKERS", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_builder_overrides() {
        let config = RouterConfig::default()
            .schema_file("a.md")
            .optimization_schema_file("b.md")
            .history_turns(2)
            .emit_stage_markers(true);

        assert_eq!(config.insight_schema_file, PathBuf::from("a.md"));
        assert_eq!(config.optimization_schema_file, PathBuf::from("b.md"));
        assert_eq!(config.history_turns, 2);
        assert!(config.emit_stage_markers);
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = RouterConfig::default().openai_api_key("sk-secret");
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
