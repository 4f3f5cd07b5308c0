use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::error::GtdbtkError;

/// Per-invocation directories under the scratch root.
#[derive(Debug, Clone)]
pub struct StagingLayout {
    root: Utf8PathBuf,
}

impl StagingLayout {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Materialized input FASTA files.
    pub fn fastas(&self) -> Utf8PathBuf {
        self.root.join("fastas")
    }

    /// Classifier results.
    pub fn output(&self) -> Utf8PathBuf {
        self.root.join("output")
    }

    /// Classifier scratch, passed as `--tmpdir`.
    pub fn temp_output(&self) -> Utf8PathBuf {
        self.root.join("temp_output")
    }

    /// Target of the `TEMP_DIR` override.
    pub fn tmp(&self) -> Utf8PathBuf {
        self.root.join("tmp")
    }

    pub fn dirs(&self) -> [Utf8PathBuf; 4] {
        [self.fastas(), self.output(), self.temp_output(), self.tmp()]
    }

    /// Creates every directory, emptying any left behind by an earlier run.
    pub fn create(&self) -> Result<(), GtdbtkError> {
        for dir in self.dirs() {
            if dir.as_std_path().is_dir() {
                let cleared = clear_dir(&dir)?;
                if cleared > 0 {
                    debug!(dir = %dir, cleared, "emptied stale staging directory");
                }
            } else {
                fs::create_dir_all(dir.as_std_path())
                    .map_err(|err| GtdbtkError::Filesystem(format!("create {dir}: {err}")))?;
            }
        }
        Ok(())
    }

    pub fn remove(&self) -> Result<(), GtdbtkError> {
        for dir in self.dirs() {
            if dir.as_std_path().exists() {
                fs::remove_dir_all(dir.as_std_path())
                    .map_err(|err| GtdbtkError::Filesystem(format!("remove {dir}: {err}")))?;
            }
        }
        Ok(())
    }
}

fn clear_dir(dir: &Utf8Path) -> Result<usize, GtdbtkError> {
    let fs_err = |err: std::io::Error| GtdbtkError::Filesystem(format!("clear {dir}: {err}"));
    let mut cleared = 0;
    for entry in fs::read_dir(dir.as_std_path()).map_err(fs_err)? {
        let path = entry.map_err(fs_err)?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path).map_err(fs_err)?;
        } else {
            fs::remove_file(&path).map_err(fs_err)?;
        }
        cleared += 1;
    }
    Ok(cleared)
}

/// Removes the layout when dropped unless it is being kept for inspection.
pub struct StagingGuard {
    layout: StagingLayout,
    keep: bool,
}

impl StagingGuard {
    pub fn new(layout: StagingLayout, keep: bool) -> Self {
        Self { layout, keep }
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.keep {
            debug!(root = %self.layout.root(), "keeping staging directories");
            return;
        }
        if let Err(err) = self.layout.remove() {
            warn!(root = %self.layout.root(), error = %err, "failed to remove staging directories");
        }
    }
}
