//! `wajs.toml`: defaults for `build` and `run`.
//!
//! ```toml
//! [build]
//! minify = true
//! allow_imports = ["env"]
//!
//! [embed]
//! "level1.txt" = "assets/level1.txt"
//!
//! [runtime]
//! step_limit = 1000000
//! ```
//!
//! Command-line flags override the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use wajs_runtime::RuntimeOptions;
use wajs_synth::SynthOptions;

pub const DEFAULT_CONFIG: &str = "wajs.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WajsConfig {
    pub build: SynthOptions,
    /// Embedded file name to path, relative to the config file.
    pub embed: BTreeMap<String, PathBuf>,
    pub runtime: RuntimeOptions,
    /// Directory the config was read from.
    #[serde(skip)]
    pub base: PathBuf,
}

impl WajsConfig {
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.base = base.to_path_buf();
        Ok(config)
    }

    /// Read `path`, or `./wajs.toml` when it exists, or use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG);
                if !default.is_file() {
                    log::debug!("no {DEFAULT_CONFIG}; using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("")).to_path_buf();
        let config = Self::parse(&text, &base)
            .with_context(|| format!("invalid config {}", path.display()))?;
        log::info!("loaded config {}", path.display());
        Ok(config)
    }

    /// Paths of the `[embed]` table, resolved against the config directory.
    pub fn embed_paths(&self) -> impl Iterator<Item = (&str, PathBuf)> {
        self.embed
            .iter()
            .map(|(name, path)| (name.as_str(), self.base.join(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config = WajsConfig::parse(
            "[build]\nminify = true\n\n[embed]\n\"a.txt\" = \"assets/a.txt\"\n",
            Path::new("proj"),
        )
        .unwrap();
        assert!(config.build.minify);
        assert_eq!(config.runtime, RuntimeOptions::default());
        let embeds: Vec<_> = config.embed_paths().collect();
        assert_eq!(embeds, [("a.txt", PathBuf::from("proj/assets/a.txt"))]);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(WajsConfig::parse("[build]\nminfy = true\n", Path::new("")).is_err());
        assert!(WajsConfig::parse("[server]\n", Path::new("")).is_err());
    }
}
