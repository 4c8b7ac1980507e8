use std::fs;

use tempfile::TempDir;
use topn_extract::{
    EchoSink, ExtractError, FileSink, IterationDriver, PartitionedInput, RoundScheduling, RunPlan,
};

fn write_partitions(dir: &TempDir) -> anyhow::Result<std::path::PathBuf> {
    let input = dir.path().join("iter0010");
    fs::create_dir_all(&input)?;
    fs::write(
        input.join("part-00000"),
        format!(
            "{{\"id\": 1, \"scores\": [{}, {}]}}\n\n{{\"id\": 2, \"scores\": [{}, {}]}}\n",
            0.5f32.ln(),
            0.1f32.ln(),
            0.25f32.ln(),
            0.6f32.ln()
        ),
    )?;
    fs::write(
        input.join("part-00001"),
        format!(
            "{{\"id\": 3, \"scores\": [{}, {}]}}\n",
            0.125f32.ln(),
            0.3f32.ln()
        ),
    )?;
    // Marker files are not partitions
    fs::write(input.join("_SUCCESS"), "")?;
    Ok(input)
}

#[test]
fn directory_input_to_indexed_output_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input_path = write_partitions(&dir)?;
    let input = PartitionedInput::load(&input_path, 4)?;
    assert_eq!(input.partition_count(), 2);
    assert_eq!(input.record_count(), 3);

    let base = dir.path().join("TestOutput").to_string_lossy().into_owned();
    let mut sink = FileSink::new(base.clone());
    IterationDriver::new(RunPlan::new(vec![367, 249], 2)?, &input).run(&mut sink)?;

    let first = fs::read_to_string(format!("{base}0"))?;
    let second = fs::read_to_string(format!("{base}1"))?;
    assert_eq!(first, "0.50000 1\n0.25000 2\n");
    assert_eq!(second, "0.60000 2\n0.30000 3\n");
    Ok(())
}

#[test]
fn single_file_is_split_into_partitions() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("scores.jsonl");
    let lines: String = (0..10)
        .map(|i| format!("{{\"id\": {i}, \"scores\": [{}]}}\n", -(i as f32)))
        .collect();
    fs::write(&path, lines)?;

    let input = PartitionedInput::load(&path, 3)?;
    assert_eq!(input.partition_count(), 3);
    assert_eq!(input.record_count(), 10);
    Ok(())
}

#[test]
fn unparsable_line_names_file_and_line() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("broken.jsonl");
    fs::write(&path, "{\"id\": 1, \"scores\": [0.0]}\nnot json\n")?;

    match PartitionedInput::load(&path, 1) {
        Err(ExtractError::Parse { line, .. }) => assert_eq!(line, 2),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn failed_round_leaves_no_output_for_that_source() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("scores.jsonl");
    fs::write(
        &path,
        "{\"id\": 1, \"scores\": [0.0, 0.0]}\n{\"id\": 2, \"scores\": [0.0]}\n",
    )?;
    let input = PartitionedInput::load(&path, 2)?;

    let base = dir.path().join("out").to_string_lossy().into_owned();
    let mut sink = FileSink::new(base.clone());
    let plan = RunPlan::new(vec![1, 2], 5)?.with_validation(false);
    let err = IterationDriver::new(plan, &input).run(&mut sink).unwrap_err();

    assert!(matches!(
        err,
        ExtractError::RoundFailed {
            iteration_index: 1,
            ..
        }
    ));
    assert!(fs::metadata(format!("{base}0")).is_ok());
    assert!(fs::metadata(format!("{base}1")).is_err());
    Ok(())
}

#[test]
fn parallel_rounds_echo_each_source_once_committed() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let input = PartitionedInput::load(&write_partitions(&dir)?, 4)?;

    let base = dir.path().join("TestOutput").to_string_lossy().into_owned();
    let mut sink = EchoSink::new(FileSink::new(base.clone()), Vec::new());
    let plan = RunPlan::new(vec![367, 249], 2)?.with_scheduling(RoundScheduling::Parallel);
    IterationDriver::new(plan, &input).run(&mut sink)?;

    let (files, echoed) = sink.into_parts();
    assert_eq!(files.staged_len(), 0);
    assert_eq!(
        String::from_utf8(echoed)?,
        "Source: 367\n0.50000 1\n0.25000 2\nSource: 249\n0.60000 2\n0.30000 3\n"
    );
    assert_eq!(fs::read_to_string(format!("{base}1"))?, "0.60000 2\n0.30000 3\n");
    Ok(())
}

#[test]
fn parallel_failure_leaves_no_files_behind() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("scores.jsonl");
    fs::write(
        &path,
        "{\"id\": 1, \"scores\": [0.0, 0.0]}\n{\"id\": 2, \"scores\": [0.0]}\n",
    )?;
    let input = PartitionedInput::load(&path, 2)?;

    let out_dir = dir.path().join("out");
    let base = out_dir.join("top").to_string_lossy().into_owned();
    let mut sink = EchoSink::new(FileSink::new(base), Vec::new());
    let plan = RunPlan::new(vec![1, 2], 5)?
        .with_validation(false)
        .with_scheduling(RoundScheduling::Parallel);
    assert!(IterationDriver::new(plan, &input).run(&mut sink).is_err());

    let leftovers = match fs::read_dir(&out_dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    };
    assert_eq!(leftovers, 0);
    let (_, echoed) = sink.into_parts();
    assert!(echoed.is_empty());
    Ok(())
}
