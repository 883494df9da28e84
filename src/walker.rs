//! Go source walker with gitignore support and default exclusions.
//!
//! Wraps the `ignore` crate's `WalkBuilder` to enumerate the files of one
//! Go module:
//! - Respects `.gitignore` rules
//! - Skips `vendor`, `testdata` and hidden directories
//! - Stops at nested modules (subdirectories with their own `go.mod`)
//! - Applies extra exclusion globs from configuration
//! - Yields only non-test `.go` files, sorted by path

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use crate::errors::ExtractError;
use crate::indexer::is_go_source;

/// Directories that are always excluded from walks, regardless of `.gitignore`.
const DEFAULT_EXCLUSIONS: &[&str] = &["vendor", "testdata", "node_modules"];

/// A file-system walker over one Go module.
pub struct Walker {
    root: PathBuf,
    patterns: Vec<String>,
}

impl Walker {
    /// Create a new walker rooted at the module directory.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            patterns: Vec::new(),
        }
    }

    /// Add exclusion globs (gitignore syntax, relative to the root).
    pub fn ignore_patterns(mut self, patterns: &[String]) -> Self {
        self.patterns.extend(patterns.iter().cloned());
        self
    }

    /// Build the underlying `WalkBuilder` with all our configuration applied.
    fn make_builder(&self) -> Result<WalkBuilder, ExtractError> {
        let mut builder = WalkBuilder::new(&self.root);

        // Let the ignore crate handle .gitignore, .ignore, etc.
        builder.standard_filters(true);
        builder.hidden(false);

        // In the overrides system a glob WITH `!` means "exclude".
        let mut overrides = OverrideBuilder::new(&self.root);
        let excluded = DEFAULT_EXCLUSIONS
            .iter()
            .map(|dir| format!("!{dir}/"))
            .chain(self.patterns.iter().map(|p| format!("!{p}")));
        for pattern in excluded {
            overrides.add(&pattern).map_err(|e| {
                ExtractError::InvalidInput(format!("invalid ignore pattern {pattern}: {e}"))
            })?;
        }
        let overrides = overrides
            .build()
            .map_err(|e| ExtractError::InvalidInput(format!("invalid ignore patterns: {e}")))?;
        builder.overrides(overrides);

        builder.filter_entry(|entry| {
            // The root entry itself (depth 0) always passes through.
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                return false;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir && entry.path().join("go.mod").is_file())
        });

        Ok(builder)
    }

    /// Walk the module and collect all loadable Go source files, sorted.
    pub fn collect_paths(&self) -> Result<Vec<PathBuf>, ExtractError> {
        let builder = self.make_builder()?;
        let mut paths = Vec::new();
        for result in builder.build() {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.file_type().is_some_and(|ft| ft.is_file()) && is_go_source(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}
