//! Archived file locations
//!
//! A `PathEntry` is a platform-neutral relative path, stored as
//! ordered segments. Exactly one is written per discovered regular
//! file; its record hash names the file's content chain.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Relative location of one archived file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub segments: Vec<String>,
}

impl PathEntry {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Derive the entry for `file`, discovered while walking `root`.
    ///
    /// Segments are the walked root's final component plus the path
    /// below it, so archives never leak the absolute prefix the
    /// command was invoked with. A root without a final component
    /// (`.`, `/`) contributes nothing and the entry is the relative
    /// remainder alone.
    pub fn for_file(root: &Path, file: &Path) -> Result<Self> {
        let mut segments = Vec::new();
        if let Some(base) = root.file_name() {
            segments.push(component_utf8(base, root)?);
        }
        let rest = file
            .strip_prefix(root)
            .with_context(|| format!("{} is not under {}", file.display(), root.display()))?;
        for component in rest.components() {
            segments.push(component_utf8(component.as_os_str(), file)?);
        }
        anyhow::ensure!(!segments.is_empty(), "empty path entry for {}", file.display());
        Ok(Self { segments })
    }

    /// Resolve this entry under a destination root
    pub fn join(&self, dest_root: &Path) -> PathBuf {
        let mut path = dest_root.to_path_buf();
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }
}

impl std::fmt::Display for PathEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

fn component_utf8(component: &std::ffi::OsStr, path: &Path) -> Result<String> {
    component
        .to_str()
        .map(str::to_string)
        .with_context(|| format!("non-UTF-8 path component in {}", path.display()))
}
