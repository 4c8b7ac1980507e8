//! # Round Output
//!
//! Each round's results go to a destination tagged by the round's iteration
//! index, so sources never overwrite each other. Lines have the form
//! `"<probability, 5 decimals> <item id>"`, highest probability first.
//!
//! Sinks are two-phase. `stage_round` prepares a round's output without
//! making it visible; `commit_round` publishes it. The sequential driver
//! commits each round as soon as it is staged. The parallel driver stages
//! every round first and commits only once all of them staged cleanly.

use crate::error::{ExtractError, Result};
use crate::model::{RoundContext, TopResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Format a single result line.
pub fn format_result_line(result: &TopResult) -> String {
    format!("{:.5} {}", result.probability, result.id)
}

/// Render a round's results, one line each, newline terminated.
pub fn render_results(results: &[TopResult]) -> String {
    let mut out = String::with_capacity(results.len() * 16);
    for result in results {
        out.push_str(&format_result_line(result));
        out.push('\n');
    }
    out
}

/// Destination for completed rounds.
///
/// Only called with a round's complete result; a failed round never reaches
/// the sink. Committing an index with nothing staged is a no-op.
pub trait OutputSink {
    /// Prepare a round's output without publishing it.
    fn stage_round(&mut self, ctx: &RoundContext, results: &[TopResult]) -> Result<()>;

    /// Publish a previously staged round.
    fn commit_round(&mut self, iteration_index: usize) -> Result<()>;

    /// Drop every staged, uncommitted round.
    fn discard_staged(&mut self);

    /// Stage and publish in one step.
    fn write_round(&mut self, ctx: &RoundContext, results: &[TopResult]) -> Result<()> {
        self.stage_round(ctx, results)?;
        self.commit_round(ctx.iteration_index)
    }
}

#[derive(Debug)]
struct StagedFile {
    source_id: u32,
    lines: usize,
    dest: PathBuf,
    file: NamedTempFile,
}

/// Writes each round to `<base><iteration index>`.
///
/// Staged content lives in a temp file next to the destination and is
/// renamed into place on commit. Dropping the sink deletes anything staged.
#[derive(Debug)]
pub struct FileSink {
    base: String,
    staged: BTreeMap<usize, StagedFile>,
}

impl FileSink {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            staged: BTreeMap::new(),
        }
    }

    pub fn destination(&self, iteration_index: usize) -> PathBuf {
        PathBuf::from(format!("{}{}", self.base, iteration_index))
    }

    /// Rounds staged but not yet committed
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

impl OutputSink for FileSink {
    fn stage_round(&mut self, ctx: &RoundContext, results: &[TopResult]) -> Result<()> {
        let dest = self.destination(ctx.iteration_index);
        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| ExtractError::io(format!("creating {}", dir.display()), e))?;

        // Stage next to the destination so the rename stays on one filesystem
        let mut file = NamedTempFile::new_in(&dir)
            .map_err(|e| ExtractError::io(format!("staging in {}", dir.display()), e))?;
        file.write_all(render_results(results).as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| ExtractError::io(format!("writing {}", dest.display()), e))?;

        debug!(source = ctx.source_id, path = %dest.display(), "round output staged");
        self.staged.insert(
            ctx.iteration_index,
            StagedFile {
                source_id: ctx.source_id,
                lines: results.len(),
                dest,
                file,
            },
        );
        Ok(())
    }

    fn commit_round(&mut self, iteration_index: usize) -> Result<()> {
        let Some(staged) = self.staged.remove(&iteration_index) else {
            return Ok(());
        };
        remove_existing(&staged.dest)?;
        staged.file.persist(&staged.dest).map_err(|e| {
            ExtractError::io(format!("persisting {}", staged.dest.display()), e.error)
        })?;

        info!(
            source = staged.source_id,
            path = %staged.dest.display(),
            lines = staged.lines,
            "round output written"
        );
        Ok(())
    }

    fn discard_staged(&mut self) {
        // NamedTempFile deletes itself on drop
        self.staged.clear();
    }
}

fn remove_existing(path: &Path) -> Result<()> {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return Ok(()),
    };
    removed.map_err(|e| ExtractError::io(format!("removing {}", path.display()), e))
}

/// In-memory sink keyed by iteration index.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rounds: BTreeMap<usize, (u32, Vec<TopResult>)>,
    staged: BTreeMap<usize, (u32, Vec<TopResult>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, iteration_index: usize) -> Option<&[TopResult]> {
        self.rounds
            .get(&iteration_index)
            .map(|(_, results)| results.as_slice())
    }

    /// Source id recorded for a round
    pub fn source_of(&self, iteration_index: usize) -> Option<u32> {
        self.rounds.get(&iteration_index).map(|(source, _)| *source)
    }

    /// Committed rounds
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

impl OutputSink for MemorySink {
    fn stage_round(&mut self, ctx: &RoundContext, results: &[TopResult]) -> Result<()> {
        self.staged
            .insert(ctx.iteration_index, (ctx.source_id, results.to_vec()));
        Ok(())
    }

    fn commit_round(&mut self, iteration_index: usize) -> Result<()> {
        if let Some(round) = self.staged.remove(&iteration_index) {
            self.rounds.insert(iteration_index, round);
        }
        Ok(())
    }

    fn discard_staged(&mut self) {
        self.staged.clear();
    }
}

/// Wraps a sink and echoes every committed round to `out` as a
/// `Source: <id>` header followed by its result lines.
///
/// The echo follows the inner commit, so a round is printed exactly when its
/// output becomes visible.
#[derive(Debug)]
pub struct EchoSink<S, W> {
    inner: S,
    out: W,
    pending: BTreeMap<usize, String>,
}

impl<S: OutputSink, W: Write> EchoSink<S, W> {
    pub fn new(inner: S, out: W) -> Self {
        Self {
            inner,
            out,
            pending: BTreeMap::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_parts(self) -> (S, W) {
        (self.inner, self.out)
    }
}

impl<S: OutputSink, W: Write> OutputSink for EchoSink<S, W> {
    fn stage_round(&mut self, ctx: &RoundContext, results: &[TopResult]) -> Result<()> {
        self.inner.stage_round(ctx, results)?;
        let block = format!("Source: {}\n{}", ctx.source_id, render_results(results));
        self.pending.insert(ctx.iteration_index, block);
        Ok(())
    }

    fn commit_round(&mut self, iteration_index: usize) -> Result<()> {
        self.inner.commit_round(iteration_index)?;
        if let Some(block) = self.pending.remove(&iteration_index) {
            self.out
                .write_all(block.as_bytes())
                .and_then(|_| self.out.flush())
                .map_err(|e| ExtractError::io("echoing round output", e))?;
        }
        Ok(())
    }

    fn discard_staged(&mut self) {
        self.inner.discard_staged();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemId;

    #[test]
    fn test_line_format() {
        let line = format_result_line(&TopResult {
            id: ItemId(367),
            probability: 0.123456,
        });
        assert_eq!(line, "0.12346 367");
    }

    #[test]
    fn test_destinations_do_not_collide() {
        let sink = FileSink::new("out/TestOutput");
        assert_eq!(sink.destination(0), PathBuf::from("out/TestOutput0"));
        assert_ne!(sink.destination(1), sink.destination(11));
    }

    #[test]
    fn test_file_sink_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("top").to_string_lossy().into_owned();
        let mut sink = FileSink::new(base);
        let ctx = RoundContext::new(8, 1, 5);

        fs::create_dir_all(sink.destination(1)).unwrap();
        fs::write(sink.destination(1).join("part-r-00000"), "stale").unwrap();

        let results = vec![
            TopResult {
                id: ItemId(2),
                probability: 0.75,
            },
            TopResult {
                id: ItemId(1),
                probability: 0.25,
            },
        ];
        sink.write_round(&ctx, &results).unwrap();
        let written = fs::read_to_string(sink.destination(1)).unwrap();
        assert_eq!(written, "0.75000 2\n0.25000 1\n");
    }

    #[test]
    fn test_staged_file_is_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("top").to_string_lossy().into_owned();
        let mut sink = FileSink::new(base);
        fs::write(sink.destination(0), "previous run\n").unwrap();

        let results = [TopResult {
            id: ItemId(4),
            probability: 1.0,
        }];
        sink.stage_round(&RoundContext::new(9, 0, 1), &results).unwrap();
        sink.stage_round(&RoundContext::new(8, 1, 1), &results).unwrap();
        assert_eq!(sink.staged_len(), 2);
        assert_eq!(fs::read_to_string(sink.destination(0)).unwrap(), "previous run\n");
        assert!(!sink.destination(1).exists());

        sink.commit_round(0).unwrap();
        assert_eq!(fs::read_to_string(sink.destination(0)).unwrap(), "1.00000 4\n");

        sink.discard_staged();
        assert_eq!(sink.staged_len(), 0);
        assert!(!sink.destination(1).exists());
        // Only the committed destination and no leftover temp files
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_echo_prints_each_round_on_commit() {
        let mut sink = EchoSink::new(MemorySink::new(), Vec::new());
        let first = [TopResult {
            id: ItemId(2),
            probability: 0.5,
        }];
        sink.write_round(&RoundContext::new(7, 0, 1), &first).unwrap();
        assert_eq!(String::from_utf8_lossy(&sink.out), "Source: 7\n0.50000 2\n");

        sink.stage_round(&RoundContext::new(3, 1, 1), &[]).unwrap();
        assert_eq!(sink.out.len(), "Source: 7\n0.50000 2\n".len());
        sink.discard_staged();
        sink.commit_round(1).unwrap();

        let (inner, out) = sink.into_parts();
        assert_eq!(inner.len(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Source: 7\n0.50000 2\n");
    }

    #[test]
    fn test_memory_sink_commit_publishes_staged_round() {
        let mut sink = MemorySink::new();
        sink.stage_round(&RoundContext::new(5, 2, 1), &[]).unwrap();
        assert!(sink.get(2).is_none());
        sink.commit_round(2).unwrap();
        assert_eq!(sink.source_of(2), Some(5));
        assert_eq!(sink.staged_len(), 0);
    }

    #[test]
    fn test_memory_sink_keys_by_index() {
        let mut sink = MemorySink::new();
        sink.write_round(&RoundContext::new(7, 0, 1), &[]).unwrap();
        sink.write_round(&RoundContext::new(3, 1, 1), &[]).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.source_of(1), Some(3));
    }
}
