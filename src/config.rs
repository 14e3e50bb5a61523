use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::compiler::InvocationPattern;
use crate::error::{EngineError, Result};
use crate::matcher::CaptureKind;
use crate::tag::{TagPolicy, TagRequirement};

#[derive(Debug, Deserialize)]
pub struct Config {
    /// tracing filter directive, `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Tags active at startup
    #[serde(default)]
    pub active_tags: Vec<String>,
    #[serde(default)]
    pub tag_policy: TagPolicy,
    /// Abort a rebuild when any command fails to compile
    #[serde(default)]
    pub strict_rebuild: bool,
    /// Enable `~word` fuzzy literals in phrases
    #[serde(default = "default_fuzzy_words")]
    pub fuzzy_words: bool,
    #[serde(default = "default_commands")]
    pub commands: Vec<CommandConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            active_tags: Vec::new(),
            tag_policy: TagPolicy::default(),
            strict_rebuild: false,
            fuzzy_words: default_fuzzy_words(),
            commands: default_commands(),
        }
    }
}

// ============================================================================
// Commands Config
// ============================================================================

#[derive(Debug, Deserialize, Clone)]
pub struct CommandConfig {
    pub id: String,
    pub phrase: String,
    /// Tags gating the whole command
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tags gating the phrase from a given word onwards
    #[serde(default)]
    pub tags_at: Vec<PositionalTags>,
    /// Capture kinds for `{name}` placeholders without an inline kind
    #[serde(default)]
    pub captures: BTreeMap<String, CaptureKind>,
    pub action: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PositionalTags {
    pub position: usize,
    pub tags: Vec<String>,
}

impl CommandConfig {
    pub fn new(id: &str, phrase: &str, action: &str) -> Self {
        Self {
            id: id.to_string(),
            phrase: phrase.to_string(),
            tags: Vec::new(),
            tags_at: Vec::new(),
            captures: BTreeMap::new(),
            action: action.to_string(),
        }
    }

    fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn to_pattern(&self) -> InvocationPattern {
        let mut pattern = InvocationPattern::new(&self.id, &self.phrase);
        if !self.tags.is_empty() {
            pattern = pattern.with_tags(TagRequirement::from_names(&self.tags));
        }
        for positional in &self.tags_at {
            let requirement = TagRequirement::from_names(&positional.tags);
            pattern = pattern.with_tags_at(positional.position, requirement);
        }
        for (name, kind) in &self.captures {
            pattern = pattern.with_capture(name, *kind);
        }
        pattern.with_value("action", &self.action)
    }
}

fn default_log_filter() -> String {
    "utter=info".into()
}

fn default_fuzzy_words() -> bool {
    true
}

fn default_commands() -> Vec<CommandConfig> {
    vec![
        CommandConfig::new("stop", "stop listening", "stop"),
        CommandConfig::new("volume", "set volume {amount:number}", "echo:volume set to {amount}"),
        CommandConfig::new("enable", "enable {tag}", "tag:+{tag}"),
        CommandConfig::new("disable", "disable {tag}", "tag:-{tag}"),
        CommandConfig::new("save", "save file", "echo:saving file").with_tags(&["ide"]),
        CommandConfig::new("open", "open {name:any}", "echo:opening {name}"),
    ]
}

impl Config {
    /// Load from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text).map_err(|e| match e {
            EngineError::Config(msg) => EngineError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.log_filter, "utter=info");
        assert_eq!(config.tag_policy, TagPolicy::Any);
        assert!(config.fuzzy_words);
        assert!(!config.strict_rebuild);
        assert!(config.commands.iter().any(|c| c.id == "stop"));
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
            active_tags = ["ide"]
            tag_policy = "all"
            strict_rebuild = true

            [[commands]]
            id = "volume"
            phrase = "set volume {amount}"
            tags = ["media"]
            action = "echo:{amount}"
            captures = { amount = "number" }

            [[commands]]
            id = "commit"
            phrase = "git commit now"
            action = "log:commit"
            tags_at = [{ position = 1, tags = ["git"] }]
            "#,
        )
        .unwrap();

        assert_eq!(config.tag_policy, TagPolicy::All);
        assert_eq!(config.commands.len(), 2);

        let volume = config.commands[0].to_pattern();
        assert_eq!(volume.captures.get("amount"), Some(&CaptureKind::Number));
        assert_eq!(volume.requirements[0].requirement, TagRequirement::from_names(["media"]));
        assert_eq!(volume.values.get("action").map(String::as_str), Some("echo:{amount}"));

        let commit = config.commands[1].to_pattern();
        assert_eq!(commit.requirements[0].position, 1);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let err = Config::from_toml("tag_policy = \"sometimes\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load(Path::new("definitely/not/here.toml")).unwrap();
        assert!(!config.commands.is_empty());
    }
}
