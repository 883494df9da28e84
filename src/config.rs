//! Configuration file parsing, defaults, and merging.
//!
//! Configuration is loaded in layers (last wins):
//! 1. Built-in defaults
//! 2. Global config from `~/.goscope/config.toml`
//! 3. Per-module config from `<module_root>/.goscope/config.toml`
//!
//! Each layer only overrides fields it explicitly sets; absent fields
//! are left at their previous value.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::output::Format;
use crate::types::{InferenceMode, Options};

// ---------------------------------------------------------------------------
// Public config types (fully resolved, no Options)
// ---------------------------------------------------------------------------

/// Top-level configuration, fully resolved with defaults applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub extract: ExtractConfig,
    pub interfaces: InterfacesConfig,
    pub output: OutputConfig,
    pub ignore: IgnoreConfig,
}

/// Dependency collection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    /// Default dependency depth.
    pub depth: usize,
    /// Record external dependencies as stub references.
    pub stub_external: bool,
    /// Count universe-scope builtins (`len`, `string`, ...) as external.
    pub include_builtins: bool,
}

/// Interface/implementation analysis settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfacesConfig {
    /// Name prefixes that mark a constructor (`New` + interface name, ...).
    pub constructor_prefixes: Vec<String>,
    /// Implementation inference strategy: `"composite-literal"` or `"none"`.
    pub inference: String,
}

/// Output / display settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    /// Default output format: `"markdown"`, `"json"`, or `"toon"`.
    pub format: String,
}

/// Ignore / exclusion settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IgnoreConfig {
    /// Extra glob patterns to exclude when loading the module.
    pub patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ExtractConfig {
    fn default() -> Self {
        let options = Options::default();
        Self {
            depth: options.depth,
            stub_external: options.stub_external,
            include_builtins: options.include_builtins,
        }
    }
}

impl Default for InterfacesConfig {
    fn default() -> Self {
        Self {
            constructor_prefixes: Options::default().constructor_prefixes,
            inference: "composite-literal".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "markdown".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Option-based overlay types (for partial deserialization)
// ---------------------------------------------------------------------------

/// Mirror of [`Config`] where every field is `Option`, so we can
/// deserialize a partial TOML file and overlay only the keys that are
/// present.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigOverlay {
    extract: Option<ExtractOverlay>,
    interfaces: Option<InterfacesOverlay>,
    output: Option<OutputOverlay>,
    ignore: Option<IgnoreOverlay>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ExtractOverlay {
    depth: Option<usize>,
    stub_external: Option<bool>,
    include_builtins: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct InterfacesOverlay {
    constructor_prefixes: Option<Vec<String>>,
    inference: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OutputOverlay {
    format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct IgnoreOverlay {
    patterns: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Merge helpers
// ---------------------------------------------------------------------------

impl Config {
    /// Apply an overlay on top of this config, replacing only the fields
    /// that are `Some` in the overlay.
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(e) = overlay.extract {
            if let Some(v) = e.depth {
                self.extract.depth = v;
            }
            if let Some(v) = e.stub_external {
                self.extract.stub_external = v;
            }
            if let Some(v) = e.include_builtins {
                self.extract.include_builtins = v;
            }
        }
        if let Some(i) = overlay.interfaces {
            if let Some(v) = i.constructor_prefixes {
                self.interfaces.constructor_prefixes = v;
            }
            if let Some(v) = i.inference {
                self.interfaces.inference = v;
            }
        }
        if let Some(out) = overlay.output
            && let Some(v) = out.format
        {
            self.output.format = v;
        }
        if let Some(ign) = overlay.ignore
            && let Some(v) = ign.patterns
        {
            self.ignore.patterns = v;
        }
    }

    /// Extraction options derived from this configuration.
    pub fn options(&self) -> Result<Options> {
        let inference = match self.interfaces.inference.as_str() {
            "composite-literal" => InferenceMode::CompositeLiteral,
            "none" => InferenceMode::Disabled,
            other => bail!("unknown inference strategy in config: {other}"),
        };
        Ok(Options {
            depth: self.extract.depth,
            stub_external: self.extract.stub_external,
            include_builtins: self.extract.include_builtins,
            constructor_prefixes: self.interfaces.constructor_prefixes.clone(),
            inference,
        })
    }

    /// The configured default output format.
    pub fn format(&self) -> Result<Format> {
        self.output
            .format
            .parse()
            .with_context(|| format!("invalid output format in config: {}", self.output.format))
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Return the user's home directory.
fn home_dir() -> Option<PathBuf> {
    #[allow(deprecated)]
    std::env::home_dir()
}

/// Parse a TOML string into a [`ConfigOverlay`], producing a clear error
/// message on malformed input.
fn parse_overlay(contents: &str, path: &Path) -> Result<ConfigOverlay> {
    toml::from_str(contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Try to read a config file and parse it as an overlay.
/// Returns `Ok(None)` if the file does not exist.
fn load_overlay(path: &Path) -> Result<Option<ConfigOverlay>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let overlay = parse_overlay(&contents, path)?;
            Ok(Some(overlay))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!(
            "failed to read config file {}: {}",
            path.display(),
            e
        )),
    }
}

impl Config {
    /// Load configuration by merging layers:
    /// defaults -> global (`~/.goscope/config.toml`) -> per-module
    /// (`<root>/.goscope/config.toml`).
    pub fn load(module_root: Option<&Path>) -> Result<Config> {
        let global_dir = home_dir().map(|h| h.join(".goscope"));
        Self::load_with_global_dir(global_dir.as_deref(), module_root)
    }

    /// Internal: load config with an explicit global config directory.
    ///
    /// This allows tests to supply a temporary directory instead of the
    /// real `~/.goscope` without mutating environment variables.
    fn load_with_global_dir(global_dir: Option<&Path>, module_root: Option<&Path>) -> Result<Config> {
        let mut config = Config::default();

        if let Some(dir) = global_dir {
            let global_path = dir.join("config.toml");
            if let Some(overlay) = load_overlay(&global_path)? {
                config.apply_overlay(overlay);
            }
        }

        if let Some(root) = module_root {
            let module_config_path = root.join(".goscope").join("config.toml");
            if let Some(overlay) = load_overlay(&module_config_path)? {
                config.apply_overlay(overlay);
            }
        }

        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
