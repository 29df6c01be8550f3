//! `clvote` — differential-testing driver: collect per-platform results,
//! vote a golden reference out of them, and merge corrected re-runs.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clvote_error::{Result, VoteError};
use clvote_harness::collect::{
    CollectorConfig, DEFAULT_TIMEOUT_SECS, LauncherConfig, collect_platform,
};
use clvote_harness::merge::merge_files;
use tracing::error;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
clvote — cross-platform result reconciliation for differential compiler testing

USAGE:
    clvote run --corpus <dir> --output <file> --launcher <path> [options] [-- <launcher args>]
    clvote vote [--results <dir>] [--golden <file>] [--report <file>] [--summary <file>]
    clvote merge <original> <replacement> [--output <file>]

RUN OPTIONS:
    --corpus <dir>        directory of generated kernels (required)
    --output <file>       per-platform result artifact to append to (required)
    --launcher <path>     platform launcher binary (required)
    --platform-idx <n>    OpenCL platform index          [default: 0]
    --device-idx <n>      OpenCL device index            [default: 0]
    --device-name <s>     device-name filter passed to the launcher
    --timeout <secs>      per-test wall-clock deadline   [default: 150]
    --resume <file>       skip tests already recorded in this artifact
    --disable-opts        pass ---disable_opts to the launcher
    --debug               pass ---debug to the launcher

VOTE OPTIONS:
    --results <dir>       directory of *.csv result artifacts [default: .]
    --golden <file>       golden artifact to write   [default: <dir>/sample_results.csv]
    --report <file>       HTML report to write       [default: <dir>/diff_out.html]
    --summary <file>      optional JSON vote summary

EXIT CODES:
    0  normal completion
    1  missing corpus directory, device-mismatch abort, or any fatal error
";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    match dispatch(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "fatal");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("run") => cmd_run(&args[1..]),
        Some("vote") => cmd_vote(&args[1..]),
        Some("merge") => cmd_merge(&args[1..]),
        Some("--help" | "-h") | None => {
            print!("{USAGE}");
            Ok(())
        }
        Some(other) => Err(VoteError::invalid(format!(
            "unknown subcommand `{other}`\n\n{USAGE}"
        ))),
    }
}

// ─── run ───────────────────────────────────────────────────────────────

fn cmd_run(args: &[String]) -> Result<()> {
    let mut corpus: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut launcher_path: Option<PathBuf> = None;
    let mut platform_index = 0u32;
    let mut device_index = 0u32;
    let mut device_name: Option<String> = None;
    let mut timeout_secs = DEFAULT_TIMEOUT_SECS;
    let mut resume: Option<PathBuf> = None;
    let mut disable_opts = false;
    let mut debug = false;
    let mut extra_args: Vec<String> = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--corpus" => corpus = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--output" => output = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--launcher" => launcher_path = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--platform-idx" => platform_index = parse_number(&value(&mut iter, arg)?, arg)?,
            "--device-idx" => device_index = parse_number(&value(&mut iter, arg)?, arg)?,
            "--device-name" => device_name = Some(value(&mut iter, arg)?),
            "--timeout" => timeout_secs = parse_number(&value(&mut iter, arg)?, arg)?,
            "--resume" => resume = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--disable-opts" => disable_opts = true,
            "--debug" => debug = true,
            "--" => {
                extra_args.extend(iter.by_ref().cloned());
                break;
            }
            other => return Err(VoteError::invalid(format!("unknown run flag `{other}`"))),
        }
    }

    let mut launcher = LauncherConfig::new(required(launcher_path, "--launcher")?);
    launcher.platform_index = platform_index;
    launcher.device_index = device_index;
    launcher.device_name = device_name;
    launcher.disable_opts = disable_opts;
    launcher.debug = debug;
    launcher.extra_args = extra_args;

    let config = CollectorConfig {
        corpus_dir: required(corpus, "--corpus")?,
        output_path: required(output, "--output")?,
        resume_from: resume,
        timeout: Duration::from_secs(timeout_secs),
        launcher,
    };

    let summary = collect_platform(&config)?;
    println!(
        "collected {} of {} tests ({} skipped, {} run errors, {} timeouts) -> {}",
        summary.executed,
        summary.corpus_size,
        summary.skipped,
        summary.run_errors,
        summary.timeouts,
        config.output_path.display()
    );
    Ok(())
}

// ─── vote ──────────────────────────────────────────────────────────────

fn cmd_vote(args: &[String]) -> Result<()> {
    let mut results_dir = PathBuf::from(".");
    let mut golden_path: Option<PathBuf> = None;
    let mut report_path: Option<PathBuf> = None;
    let mut summary_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--results" => results_dir = PathBuf::from(value(&mut iter, arg)?),
            "--golden" => golden_path = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--report" => report_path = Some(PathBuf::from(value(&mut iter, arg)?)),
            "--summary" => summary_path = Some(PathBuf::from(value(&mut iter, arg)?)),
            other => return Err(VoteError::invalid(format!("unknown vote flag `{other}`"))),
        }
    }

    let golden_path = golden_path.unwrap_or_else(|| results_dir.join("sample_results.csv"));
    let report_path = report_path.unwrap_or_else(|| results_dir.join("diff_out.html"));

    // Never count the golden artifact itself as a voting platform.
    let golden_name = golden_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let input = clvote_consensus::reconcile::load_results_dir(&results_dir, &[&golden_name])?;
    let outcome = clvote_consensus::reconcile::reconcile(&input);

    clvote_consensus::reconcile::write_golden_artifact(
        &golden_path,
        &input.tests,
        &outcome.golden,
    )?;
    fs::write(
        &report_path,
        clvote_consensus::report::render_html(&input, &outcome.golden),
    )?;
    if let Some(path) = summary_path {
        clvote_consensus::reconcile::write_summary(&path, &outcome.summary)?;
    }

    let conclusive = outcome.golden.values().filter(|g| g.is_conclusive()).count();
    println!(
        "voted {} tests across {} platforms: {} conclusive, {} inconclusive -> {}",
        outcome.golden.len(),
        input.platforms.len(),
        conclusive,
        outcome.golden.len() - conclusive,
        report_path.display()
    );
    Ok(())
}

// ─── merge ─────────────────────────────────────────────────────────────

fn cmd_merge(args: &[String]) -> Result<()> {
    let mut positional: Vec<PathBuf> = Vec::new();
    let mut output: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--output" => output = Some(PathBuf::from(value(&mut iter, arg)?)),
            other if other.starts_with("--") => {
                return Err(VoteError::invalid(format!("unknown merge flag `{other}`")));
            }
            path => positional.push(PathBuf::from(path)),
        }
    }

    let [original, replacement] = positional.as_slice() else {
        return Err(VoteError::invalid(
            "merge expects exactly two files: <original> <replacement>",
        ));
    };

    let merged = merge_files(original, replacement)?;
    match output {
        Some(path) => fs::write(path, merged)?,
        None => print!("{merged}"),
    }
    Ok(())
}

// ─── flag helpers ──────────────────────────────────────────────────────

fn value<'a, I>(iter: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = &'a String>,
{
    iter.next()
        .cloned()
        .ok_or_else(|| VoteError::invalid(format!("flag `{flag}` expects a value")))
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| VoteError::invalid(format!("flag `{flag}` expects a number, got `{raw}`")))
}

fn required<T>(option: Option<T>, flag: &str) -> Result<T> {
    option.ok_or_else(|| VoteError::invalid(format!("missing required flag `{flag}`")))
}
