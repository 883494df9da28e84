//! Go module fixtures for unit tests.

use std::fs;
use std::path::{Path, PathBuf};

use crate::program::{GoProgram, LoadOptions};

/// A Go module written to a temporary directory.
pub struct GoModule {
    dir: tempfile::TempDir,
}

impl GoModule {
    /// A module with a `go.mod` declaring `module`.
    pub fn new(module: &str) -> Self {
        let m = Self::without_go_mod();
        fs::write(
            m.dir.path().join("go.mod"),
            format!("module {module}\n\ngo 1.22\n"),
        )
        .unwrap();
        m
    }

    /// A bare directory with no `go.mod`.
    pub fn without_go_mod() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Add a source file (and any necessary parent directories).
    pub fn file(self, relative: &str, contents: &str) -> Self {
        let p = self.dir.path().join(relative);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, contents).unwrap();
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Canonical absolute path of a fixture file.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().canonicalize().unwrap().join(relative)
    }

    pub fn load(&self) -> GoProgram {
        GoProgram::load(self.root(), &LoadOptions::default()).unwrap()
    }
}
