//! Per-level media pools

use crate::error::Result;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use vela_common::config::LevelConfig;

/// Candidate media files, keyed by level
#[derive(Debug, Clone, Default)]
pub struct MediaLibrary {
    pools: BTreeMap<usize, Vec<PathBuf>>,
}

impl MediaLibrary {
    pub fn new(pools: BTreeMap<usize, Vec<PathBuf>>) -> Self {
        Self { pools }
    }

    /// List every level folder
    ///
    /// Folders are not searched recursively; only regular files count. An
    /// unreadable folder leaves its level with an empty pool.
    pub fn discover(levels: &BTreeMap<usize, LevelConfig>) -> Self {
        let mut pools = BTreeMap::new();
        for (level, config) in levels {
            let files = match list_folder(&config.folder) {
                Ok(files) => files,
                Err(e) => {
                    warn!(level, "cannot list {:?}: {}", config.folder, e);
                    Vec::new()
                }
            };
            info!(level, count = files.len(), "media files found in {:?}", config.folder);
            pools.insert(*level, files);
        }
        Self { pools }
    }

    pub fn files(&self, level: usize) -> &[PathBuf] {
        self.pools.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn file_count(&self, level: usize) -> usize {
        self.files(level).len()
    }

    pub fn levels(&self) -> impl Iterator<Item = usize> + '_ {
        self.pools.keys().copied()
    }

    /// Uniform random pick, with replacement across calls
    pub fn pick(&self, level: usize) -> Option<PathBuf> {
        self.files(level).choose(&mut rand::thread_rng()).cloned()
    }
}

fn list_folder(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
