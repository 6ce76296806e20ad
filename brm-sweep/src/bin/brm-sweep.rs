// Entry point of the sweep harness.
// 4 sub-commands
// - run      (sequential, pops jobs from <data-dir>/jobs.txt until empty)
// - sweep    (concurrent, every (m, k) of a grid)
// - enqueue  (append one job record)
// - validate (check one candidate file against the true state)
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use brm_oracle::{BuildHook, ProcessOracle};
use brm_sweep::cli::{self, Command};
use brm_sweep::config::{available_workers, Config, SweepConfig};
use brm_sweep::controller::SearchController;
use brm_sweep::def::MAX_WORD_LENGTH;
use brm_sweep::executor::SweepExecutor;
use brm_sweep::job::Job;
use brm_sweep::queue::JobQueue;
use brm_sweep::{utils, validator};
use chrono::Utc;
use clap::Parser;
use log::info;
use serde_json::{json, Value};

fn make_config(args: &cli::SweepCli) -> Config {
    let mut config = Config::from_dir(&args.data_dir);
    config.worker_budget = if args.workers == 0 {
        available_workers()
    } else {
        args.workers
    };
    config.m_step = args.m_step;
    config.oracle_timeout = match args.oracle_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    config
}

fn make_oracle(args: &cli::SweepCli, config: &Config) -> ProcessOracle {
    let oracle = ProcessOracle::new(&args.oracle_bin, args.protocol.into())
        .with_timeout(config.oracle_timeout);
    if args.oracle_dir.is_empty() {
        oracle
    } else {
        oracle.with_work_dir(&args.oracle_dir)
    }
}

fn make_build_hook(args: &cli::SweepCli) -> Option<BuildHook> {
    let hook = BuildHook::parse(&args.build_cmd)?;
    if args.oracle_dir.is_empty() {
        Some(hook)
    } else {
        Some(hook.with_work_dir(&args.oracle_dir))
    }
}

fn run_queue(args: &cli::SweepCli, config: Config) -> Result<Value> {
    let queue = JobQueue::new(config.layout().jobs_path());
    let oracle = make_oracle(args, &config);
    let controller =
        SearchController::new(oracle, config).with_build_hook(make_build_hook(args));
    let report = controller.run_queue(&queue)?;
    Ok(serde_json::to_value(&report)?)
}

fn run_sweep(
    args: &cli::SweepCli,
    mut config: Config,
    sweep: SweepConfig,
    channel_capacity: usize,
) -> Result<Value> {
    if sweep.error_ratio == 0 {
        bail!("error ratio must be at least 1");
    }
    if sweep.max_m > MAX_WORD_LENGTH {
        bail!("max m {} exceeds {}", sweep.max_m, MAX_WORD_LENGTH);
    }
    config.channel_capacity = channel_capacity;
    if let Some(hook) = make_build_hook(args) {
        hook.prepare(None)?;
    }
    let oracle = Arc::new(make_oracle(args, &config));
    let executor = SweepExecutor::new(oracle, config).with_progress_bar(args.progress);

    let start = Instant::now();
    let outcome = executor.run(&sweep)?;
    let duration = start.elapsed();
    info!("Sweep finished in {:.1?}", duration);
    metrics::gauge!("brm.sweep.duration_s").set(duration.as_secs_f64());

    Ok(json!({
        "sweep": &sweep,
        "attempted": outcome.attempted,
        "total": outcome.total,
        "matches": outcome.matches.len(),
        "validated": outcome.validated,
        "discarded": outcome.discarded,
        "entries": outcome.matches.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
    }))
}

fn main() -> Result<()> {
    utils::init_logging("info");
    let run_start_ts = Utc::now();
    let metrics_recorder = utils::MetricsRecorder::install()?;
    let args = cli::SweepCli::parse();
    let config = make_config(&args);

    let result = match &args.command {
        Command::Run => run_queue(&args, config.clone())?,
        Command::Sweep {
            degree,
            min_m,
            max_m,
            error_low,
            error_ratio,
            r1,
            r2,
            collision_accept,
            validate,
            channel_capacity,
        } => {
            let mut sweep = SweepConfig::new(*degree, *min_m, *max_m, *r1, *r2);
            sweep.error_low = *error_low;
            sweep.error_ratio = *error_ratio;
            sweep.collision_accept = *collision_accept;
            sweep.validate = *validate;
            run_sweep(&args, config.clone(), sweep, *channel_capacity)?
        }
        Command::Enqueue { record } => {
            let job = Job::parse_record(record)?;
            std::fs::create_dir_all(&args.data_dir)
                .with_context(|| format!("cannot create {}", args.data_dir))?;
            let queue = JobQueue::new(config.layout().jobs_path());
            queue.push(&job)?;
            info!("Queued {}, {} jobs pending", job, queue.len()?);
            json!({ "job": job })
        }
        Command::Validate {
            file,
            truth,
            discard,
        } => {
            let found = if *discard {
                validator::validate_or_discard(file, *truth)?
            } else {
                validator::validate(file, *truth)?
            };
            info!(
                "{}: state {} {}",
                file,
                truth,
                if found { "found" } else { "missing" }
            );
            json!({ "file": file, "truth": truth, "found": found })
        }
    };

    let values = metrics_recorder.snapshot_values();
    let value = |name: &str| values.get(name).copied().unwrap_or(0.0);
    info!(
        "Oracle: {} calls, {} failed",
        value("brm.oracle.calls"),
        value("brm.oracle.failures")
    );

    let cmd = args.command.name();
    let metrics_filename = if !args.output.is_empty() {
        args.output.clone()
    } else {
        format!("{}/metrics/{}.json", args.data_dir, cmd)
    };
    let run_end_ts = Utc::now();
    let duration_secs = (run_end_ts - run_start_ts).num_milliseconds() as f64 / 1000.0;

    let output_json = json!({
        "cli": &args,
        "config": &config,
        "command": std::env::args().collect::<Vec<_>>().join(" "),
        "timestamps": {
            "start": run_start_ts.to_rfc3339(),
            "end": run_end_ts.to_rfc3339(),
            "duration_seconds": duration_secs
        },
        "result": result,
        "metrics": metrics_recorder.snapshot_metrics()
    });

    info!("Dumping summary to {}", metrics_filename);
    if let Some(parent) = Path::new(&metrics_filename).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(
        &metrics_filename,
        serde_json::to_string_pretty(&output_json)?,
    )
    .with_context(|| format!("cannot write {}", metrics_filename))?;
    Ok(())
}
