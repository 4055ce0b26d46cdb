//! Moderation configuration

use std::path::{Path, PathBuf};

use mq_registry::{ApplyOptions, DEFAULT_SLUG_MAX_ATTEMPTS, DEFAULT_SLUG_MAX_LENGTH};
use serde::{Deserialize, Serialize};

/// Top-level moderation configuration from .mq/moderation.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Apply every submission immediately, with no changeset.
    #[serde(default)]
    pub skip_moderation: bool,

    /// Elevated actors (administrators) bypass moderation.
    #[serde(default = "default_elevated_skip")]
    pub elevated_skip: bool,

    /// Base directory that file-reference names resolve under
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,

    /// Unique text field handling
    #[serde(default)]
    pub slug: SlugConfig,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            skip_moderation: false,
            elevated_skip: default_elevated_skip(),
            media_root: default_media_root(),
            slug: SlugConfig::default(),
        }
    }
}

/// Slug disambiguation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlugConfig {
    /// Longest stored value, in characters
    #[serde(default = "default_slug_max_length")]
    pub max_length: usize,

    /// Random suffixes tried before approval fails with a conflict
    #[serde(default = "default_slug_max_attempts")]
    pub max_attempts: usize,
}

impl Default for SlugConfig {
    fn default() -> Self {
        Self {
            max_length: default_slug_max_length(),
            max_attempts: default_slug_max_attempts(),
        }
    }
}

// Serde default functions
fn default_elevated_skip() -> bool {
    true
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_slug_max_length() -> usize {
    DEFAULT_SLUG_MAX_LENGTH
}

fn default_slug_max_attempts() -> usize {
    DEFAULT_SLUG_MAX_ATTEMPTS
}

/// Whoever is submitting a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// `None` for anonymous submitters.
    pub id: Option<String>,
    /// Administrator-level privileges.
    #[serde(default)]
    pub elevated: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn named(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            elevated: false,
        }
    }

    pub fn elevated(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            elevated: true,
        }
    }
}

impl ModerationConfig {
    /// Load moderation config from .mq/moderation.toml
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config, returning the default if the file doesn't exist.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Whether a submission by `actor` should skip the queue.
    ///
    /// A helper only: the submission pipeline takes an explicit bypass flag
    /// and callers may ignore this.
    pub fn should_bypass(&self, actor: &Actor) -> bool {
        self.skip_moderation || (self.elevated_skip && actor.elevated)
    }

    /// Options for the apply routine derived from this config.
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            media_root: self.media_root.clone(),
            slug_max_length: self.slug.max_length,
            slug_max_attempts: self.slug.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempdir().unwrap();
        let config =
            ModerationConfig::load_or_default(&dir.path().join("moderation.toml")).unwrap();
        assert!(!config.skip_moderation);
        assert!(config.elevated_skip);
        assert_eq!(config.slug.max_length, 50);
        assert_eq!(config.slug.max_attempts, 100);
        assert_eq!(config.media_root, PathBuf::from("media"));
    }

    #[test]
    fn malformed_file_is_an_error_not_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moderation.toml");
        std::fs::write(&path, "skip_moderation = \"maybe\"\n").unwrap();
        assert!(ModerationConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moderation.toml");
        std::fs::write(
            &path,
            "elevated_skip = false\nmedia_root = \"/var/uploads\"\n\n[slug]\nmax_attempts = 5\n",
        )
        .unwrap();

        let config = ModerationConfig::load(&path).unwrap();
        assert!(!config.elevated_skip);
        assert_eq!(config.slug.max_attempts, 5);
        assert_eq!(config.slug.max_length, 50);

        let options = config.apply_options();
        assert_eq!(options.media_root, PathBuf::from("/var/uploads"));
        assert_eq!(options.slug_max_attempts, 5);
    }

    #[test]
    fn bypass_policy() {
        let mut config = ModerationConfig::default();
        assert!(!config.should_bypass(&Actor::anonymous()));
        assert!(!config.should_bypass(&Actor::named("sam")));
        assert!(config.should_bypass(&Actor::elevated("root")));

        config.elevated_skip = false;
        assert!(!config.should_bypass(&Actor::elevated("root")));

        config.skip_moderation = true;
        assert!(config.should_bypass(&Actor::anonymous()));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moderation.toml");
        std::fs::write(&path, "skip_moderation = \"sometimes\"").unwrap();
        assert!(ModerationConfig::load(&path).is_err());
    }
}
