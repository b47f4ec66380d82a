//! Site configuration module.
//!
//! Handles loading and validating the `blog.toml` configuration file. The
//! loaded [`SiteConfig`] is an explicit value handed to the orchestrator and
//! every component at construction — there is no global configuration state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # Paths
//! site_root = "public/blog"        # The published site (a symlink after full rebuilds)
//! generations_dir = "generations"  # Where full rebuilds assemble before the swap
//! repository = "content"           # Git checkout holding posts/ and media/
//!
//! # Publishing
//! base_url = "https://example.com/blog/"
//! per_page = 20                    # Items per paginated HTML page
//! feed_cap = 20                    # Item cap for the public rss.xml
//! chunk_size = 100                 # Max items per tag feed chunk file
//! upstream = "origin/master"       # Diff base for incremental runs
//! tag_snippets = ["code"]          # Tags that get embeddable snippet fragments
//!
//! [metadata]
//! title = "My Journal"
//! description = "Assorted writing"
//! language = "en-au"
//! ttl = 3600
//! webmaster = "me@example.com (Me)"
//! copyright = "Creative Commons 4.0 with Attribution"
//! ```
//!
//! Config files are sparse — override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `blog.toml`.
///
/// All fields have defaults so a minimal config only names the paths it
/// cares about. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// The published site root. For full rebuilds this is the symlink that
    /// gets atomically repointed; for incremental runs writes land here.
    pub site_root: PathBuf,
    /// Directory holding timestamp-named generation directories.
    pub generations_dir: PathBuf,
    /// Git checkout containing the `posts/` and `media/` source trees.
    pub repository: PathBuf,
    /// Absolute URL prefix for every published permalink.
    pub base_url: String,
    /// Items per paginated HTML page.
    pub per_page: usize,
    /// Maximum item count for the public `rss.xml`; the archive feed is uncapped.
    pub feed_cap: usize,
    /// Maximum items per tag feed chunk file (`tag/<slug>-<n>.xml`).
    pub chunk_size: usize,
    /// Ref to diff against for incremental runs.
    pub upstream: String,
    /// Tags that get an embeddable `tag-snippet-<tag>.html` fragment.
    pub tag_snippets: Vec<String>,
    /// Feed channel metadata.
    pub metadata: MetadataConfig,
}

/// Channel-level metadata stamped into every generated feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub title: String,
    pub description: String,
    pub language: String,
    /// Feed time-to-live in seconds.
    pub ttl: u32,
    pub webmaster: String,
    pub copyright: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_root: PathBuf::from("public/blog"),
            generations_dir: PathBuf::from("generations"),
            repository: PathBuf::from("content"),
            base_url: "https://example.com/blog/".to_string(),
            per_page: 20,
            feed_cap: 20,
            chunk_size: 100,
            upstream: "origin/master".to_string(),
            tag_snippets: Vec::new(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            title: "Journal".to_string(),
            description: String::new(),
            language: "en".to_string(),
            ttl: 3600,
            webmaster: String::new(),
            copyright: "Creative Commons 4.0 with Attribution".to_string(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are usable before a run starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation("site_root must not be empty".into()));
        }
        if self.repository.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "repository must not be empty".into(),
            ));
        }
        if self.per_page == 0 {
            return Err(ConfigError::Validation("per_page must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "chunk_size must be at least 1".into(),
            ));
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::Validation("base_url must not be empty".into()));
        }
        Ok(())
    }
}

/// Load config from a TOML file, filling unspecified keys from defaults.
///
/// A missing file is not an error — the stock defaults apply — but a file
/// that exists and fails to parse is.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let config: SiteConfig = if path.exists() {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)?
    } else {
        SiteConfig::default()
    };
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `blog.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Blogsmith Configuration
# =======================
# All keys are optional; defaults shown below.

# The published site root. Full rebuilds replace this symlink atomically;
# incremental runs write into it in place.
site_root = "public/blog"

# Where full rebuilds assemble timestamp-named generation directories
# before the symlink swap. Old generations are garbage-collected after a
# successful swap.
generations_dir = "generations"

# Git checkout containing the posts/ and media/ source trees.
repository = "content"

# Absolute URL prefix for every published permalink.
base_url = "https://example.com/blog/"

# Items per paginated HTML page (index-<n>.html, tag/<slug>-<n>.html).
per_page = 20

# Item cap for the public rss.xml. The archive feed (all-rss.xml) is
# never capped.
feed_cap = 20

# Maximum items per tag feed chunk file (tag/<slug>-<n>.xml).
chunk_size = 100

# Ref incremental runs diff against after fetching.
upstream = "origin/master"

# Tags that get an embeddable tag-snippet-<tag>.html fragment for
# external pages.
tag_snippets = []

[metadata]
title = "Journal"
description = ""
language = "en"
ttl = 3600
webmaster = ""
copyright = "Creative Commons 4.0 with Attribution"
"##
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = load_config(Path::new("/definitely/not/here/blog.toml")).unwrap();
        assert_eq!(config.per_page, 20);
        assert_eq!(config.upstream, "origin/master");
    }

    #[test]
    fn sparse_file_overrides_only_named_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blog.toml");
        std::fs::write(&path, "per_page = 5\n[metadata]\ntitle = \"T\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.per_page, 5);
        assert_eq!(config.metadata.title, "T");
        assert_eq!(config.feed_cap, 20);
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blog.toml");
        std::fs::write(&path, "per_pge = 5\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn zero_per_page_rejected() {
        let config = SiteConfig {
            per_page: 0,
            ..SiteConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_template_parses_to_defaults() {
        let from_template: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(from_template.per_page, SiteConfig::default().per_page);
        assert_eq!(from_template.metadata.ttl, SiteConfig::default().metadata.ttl);
    }
}
