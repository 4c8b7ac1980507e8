//! # Partitioned Input
//!
//! Loads the upstream score table. A directory contributes one partition per
//! file; a single file is split round-robin into the requested number of
//! partitions. Each file holds one JSON object per line:
//!
//! ```text
//! {"id": 17, "scores": [-2.31, -7.02, -0.45]}
//! ```

use crate::error::{ExtractError, Result};
use crate::model::ScoredItem;
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The partitioned record stream shared, read-only, by every round.
#[derive(Debug, Clone, Default)]
pub struct PartitionedInput {
    partitions: Vec<Vec<ScoredItem>>,
}

impl PartitionedInput {
    pub fn from_partitions(partitions: Vec<Vec<ScoredItem>>) -> Self {
        Self { partitions }
    }

    /// Split a flat record list round-robin into `count` partitions
    pub fn split(items: Vec<ScoredItem>, count: usize) -> Self {
        let count = count.max(1);
        let mut partitions: Vec<Vec<ScoredItem>> = vec![Vec::new(); count];
        for (i, item) in items.into_iter().enumerate() {
            partitions[i % count].push(item);
        }
        Self { partitions }
    }

    /// Load a file or a directory of partition files.
    pub fn load(path: &Path, split_count: usize) -> Result<Self> {
        let meta = fs::metadata(path)
            .map_err(|e| ExtractError::io(format!("reading {}", path.display()), e))?;
        if !meta.is_dir() {
            let items = read_partition_file(path)?;
            return Ok(Self::split(items, split_count));
        }

        let files = list_partition_files(path)?;
        let mut partitions = Vec::with_capacity(files.len());
        for file in &files {
            partitions.push(read_partition_file(file)?);
        }
        debug!(
            path = %path.display(),
            partitions = partitions.len(),
            "loaded partitioned input"
        );
        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> &[Vec<ScoredItem>] {
        &self.partitions
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn record_count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    /// Eager check of the input contract: ids unique across all partitions
    /// and every vector holding at least `min_len` scores.
    pub fn validate(&self, min_len: usize) -> Result<()> {
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        seen.reserve(self.record_count());
        for item in self.partitions.iter().flatten() {
            if !seen.insert(item.id.0) {
                return Err(ExtractError::DuplicateItem { id: item.id });
            }
            if item.scores.len() < min_len {
                return Err(ExtractError::ExtractionIndexOutOfRange {
                    id: item.id,
                    index: min_len - 1,
                    len: item.scores.len(),
                });
            }
        }
        Ok(())
    }
}

/// Regular files of `dir` sorted by name, hidden and marker files skipped.
/// An entry that cannot be listed or inspected fails the load.
fn list_partition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let listing = |e: std::io::Error| ExtractError::io(format!("listing {}", dir.display()), e);
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(listing)? {
        let path = entry.map_err(listing)?.path();
        if is_hidden(&path) {
            continue;
        }
        let meta = fs::metadata(&path)
            .map_err(|e| ExtractError::io(format!("reading {}", path.display()), e))?;
        if meta.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') || n.starts_with('_'))
        .unwrap_or(false)
}

/// Read one JSON-lines partition file. Blank lines are skipped.
pub fn read_partition_file(path: &Path) -> Result<Vec<ScoredItem>> {
    let file =
        File::open(path).map_err(|e| ExtractError::io(format!("opening {}", path.display()), e))?;
    let reader = BufReader::new(file);
    let mut items = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line =
            line.map_err(|e| ExtractError::io(format!("reading {}", path.display()), e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let item: ScoredItem = serde_json::from_str(trimmed).map_err(|e| ExtractError::Parse {
            path: path.to_path_buf(),
            line: n + 1,
            source: e,
        })?;
        items.push(item);
    }
    Ok(items)
}
