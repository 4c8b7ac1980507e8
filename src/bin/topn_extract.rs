use std::path::PathBuf;

use anyhow::Context;
use topn_extract::config::{parse_sources, ConfigOverrides, ExtractConfig};
use topn_extract::{EchoSink, FileSink, IterationDriver, PartitionedInput, RoundScheduling};
use tracing::info;

fn parse_arg(flag: &str) -> Option<String> {
    let mut args = std::env::args();
    while let Some(arg) = args.next() {
        if arg == flag {
            return args.next();
        }
    }
    None
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|arg| arg == flag)
}

fn print_help() {
    println!(
        r#"topn-extract - per-source top-N items from a partitioned log-probability score table

USAGE:
    topn-extract --input <path> --top <n> --sources <id,id,...> [OPTIONS]

OPTIONS:
    -i, --input <path>          Input file or directory of JSON-lines partition files
    -n, --top <n>               Items kept per source [default: 100]
    -s, --sources <ids>         Comma-separated source ids; source i reads score slot i
    -o, --output <base>         Output base; source i is written to <base><i> [default: TestOutput]
    -p, --partitions <n>        Partitions a single input file is split into [default: CPU cores]
        --parallel-rounds       Run the rounds for all sources concurrently
        --no-validate           Skip the eager input check before the first round
    -c, --config <path>         TOML config file
    -h, --help                  Print help

ENVIRONMENT:
    TOPN_CONFIG                 Config file path
    TOPN_INPUT, TOPN_TOP, ...   Any config key, prefixed with TOPN_
    RUST_LOG                    Log filter (e.g. info, topn_extract=debug)
"#
    );
}

fn main() -> anyhow::Result<()> {
    if has_flag("-h") || has_flag("--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Build CLI overrides
    let mut overrides = ConfigOverrides::default();
    if let Some(input) = parse_arg("--input").or_else(|| parse_arg("-i")) {
        overrides.input = Some(PathBuf::from(input));
    }
    if let Some(output) = parse_arg("--output").or_else(|| parse_arg("-o")) {
        overrides.output = Some(output);
    }
    if let Some(top) = parse_arg("--top").or_else(|| parse_arg("-n")) {
        overrides.top = Some(top.parse().context("--top must be a positive integer")?);
    }
    if let Some(sources) = parse_arg("--sources").or_else(|| parse_arg("-s")) {
        overrides.sources = Some(parse_sources(&sources)?);
    }
    if let Some(partitions) = parse_arg("--partitions").or_else(|| parse_arg("-p")) {
        overrides.partitions = Some(partitions.parse().context("--partitions must be an integer")?);
    }
    if has_flag("--parallel-rounds") {
        overrides.scheduling = Some(RoundScheduling::Parallel);
    }
    if has_flag("--no-validate") {
        overrides.validate_input = Some(false);
    }

    // Load config: CLI > Env > File > Defaults
    let config_path = parse_arg("--config")
        .or_else(|| parse_arg("-c"))
        .or_else(|| std::env::var("TOPN_CONFIG").ok());
    let config = ExtractConfig::load(config_path.as_deref(), overrides)?;

    let input_path = config
        .input
        .clone()
        .ok_or_else(|| anyhow::anyhow!("--input is required (see --help)"))?;
    let plan = config.plan()?;

    info!("Tool name: topn-extract");
    info!(" - input: {}", input_path.display());
    info!(" - output: {}", config.output);
    info!(" - top: {}", plan.capacity());
    info!(" - sources: {:?}", plan.sources());

    let input = PartitionedInput::load(&input_path, config.partitions)?;
    // Each source's block is printed as soon as its output is committed
    let mut sink = EchoSink::new(FileSink::new(config.output.clone()), std::io::stdout());
    let reports = IterationDriver::new(plan, &input).run(&mut sink)?;
    info!(rounds = reports.len(), "extraction finished");

    Ok(())
}
