use std::fs;
use std::sync::Arc;

use brm_oracle::{BuildHook, ProcessOracle, ProcessProtocol, Verdict};
use brm_sweep::classify::Status;
use brm_sweep::config::{Config, SweepConfig};
use brm_sweep::controller::{SearchController, SearchState};
use brm_sweep::executor::SweepExecutor;
use brm_sweep::job::Job;
use brm_sweep::queue::JobQueue;
use brm_sweep::sink::read_log;
use brm_sweep::test_helper::ScriptedOracle;
use brm_sweep::validator::validate_or_discard;
use serial_test::serial;

fn data_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new().prefix(prefix).tempdir().unwrap()
}

fn config_for(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::from_dir(dir.path().to_str().unwrap());
    config.worker_budget = 4;
    config
}

#[test]
fn test_queue_to_controller() {
    let dir = data_dir("queue_controller");
    let config = config_for(&dir);
    let queue = JobQueue::new(config.layout().jobs_path());
    fs::write(
        queue.path(),
        "11,32,64,5.0,40,100,100,0,and\n16,20,40,4.0,21,20012,32022,1,or2\n",
    )
    .unwrap();

    // 6 -> valid, 5 -> zero set, 6 visited so 7 -> full set past the floor
    let oracle = ScriptedOracle::new(|_, _| Verdict::no_match())
        .with_point(32, 6, 0, 150)
        .with_point(32, 5, -1, 0)
        .with_point(32, 7, -2, 2048);
    let controller = SearchController::new(&oracle, config.clone())
        .with_build_hook(BuildHook::parse("true"));

    let job = queue.dequeue_next().unwrap();
    assert_eq!(queue.len().unwrap(), 1);
    let report = controller.run_job(&job).unwrap();
    assert_eq!(oracle.calls(), vec![(32, 6), (32, 5), (32, 7)]);
    assert_eq!(report.valid, vec![(32, 6)]);

    let log = config.layout().log_path("and", 11, 100, 100, 32, 64, 0);
    let lines = fs::read_to_string(&log).unwrap();
    let first = lines.lines().next().unwrap();
    assert!(first.starts_with("32,64,6,150,valid,"), "{}", first);
    assert!(first.ends_with(",4"));
    let statuses: Vec<_> = read_log(&log).unwrap().iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![Status::Valid, Status::InvalidZeroSet, Status::InvalidFullSet]
    );

    // same first step through the bare search state
    let mut state = SearchState::new(job.m, job.k_factor);
    let k = state.next_k().unwrap();
    let (mut state, _) = state.observe(k, &Verdict::new(0, 150).unwrap());
    assert_eq!(state.next_k(), Some(5));
}

#[test]
fn test_run_queue_drains_all_jobs() {
    let dir = data_dir("run_queue");
    let config = config_for(&dir);
    let queue = JobQueue::new(config.layout().jobs_path());
    for record in [
        "11,20,40,4.0,41,1,2,0,or2",
        "11,30,60,5.0,31,1,2,0,or3",
    ] {
        queue.push(&Job::parse_record(record).unwrap()).unwrap();
    }
    let oracle = ScriptedOracle::new(|_, k| {
        if k < 4 {
            Verdict::new(-1, 0).unwrap()
        } else {
            Verdict::new(-3, 9).unwrap()
        }
    });
    let controller = SearchController::new(&oracle, config.clone());
    let run = controller.run_queue(&queue).unwrap();

    assert_eq!(run.jobs.len(), 2);
    assert!(queue.is_empty().unwrap());
    // m = 20 and 40 for the first job, m = 30 for the second
    let ms: Vec<usize> = oracle.calls().iter().map(|(m, _)| *m).collect();
    assert!(ms.contains(&20) && ms.contains(&40) && ms.contains(&30));
    assert_eq!(run.valid(), 0);
    assert_eq!(run.points(), oracle.calls().len() as u64);
}

#[test]
fn test_exhaustive_sweep_without_matches() {
    let dir = data_dir("exhaustive_sweep");
    let oracle = Arc::new(ScriptedOracle::never_matching());
    let executor = SweepExecutor::new(oracle.clone(), config_for(&dir));
    let mut sweep = SweepConfig::new(16, 10, 13, 20012, 32022);
    sweep.error_ratio = 3;

    let outcome = executor.run(&sweep).unwrap();
    assert!(outcome.matches.is_empty());
    assert_eq!(executor.progress(), sweep.total_points());
    assert_eq!(outcome.attempted, sweep.total_points());

    let mut calls = oracle.calls();
    calls.sort();
    assert_eq!(calls, sweep.points().collect::<Vec<_>>());
}

#[test]
fn test_validation_is_idempotent_and_keeps_log() {
    let dir = data_dir("validation");
    let config = config_for(&dir);
    let layout = config.layout();
    let oracle = Arc::new(ScriptedOracle::never_matching().with_point(10, 2, 0, 1));
    let mut sweep = SweepConfig::new(16, 10, 11, 20012, 32022);
    sweep.validate = true;

    let cand = layout.candidate_path(16, 10, 20, 2, 20012, 32022);
    fs::write(&cand, "\n99,xyz\n").unwrap();

    let outcome = SweepExecutor::new(oracle, config.clone())
        .run(&sweep)
        .unwrap();
    assert_eq!(outcome.discarded, 1);
    assert!(!cand.exists());
    let entries = read_log(layout.sweep_log_path(&sweep)).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!((entries[0].m, entries[0].k), (10, 2));

    // a kept set validates the same way every time
    fs::write(&cand, "32022,abc[!]\n").unwrap();
    for _ in 0..3 {
        assert!(validate_or_discard(&cand, 32022).unwrap());
    }
}

#[test]
#[serial]
fn test_process_oracle_drives_controller() {
    let dir = data_dir("process_oracle");
    let script = dir.path().join("oracle.sh");
    // argv: deg m n k r1 r2 col workers
    fs::write(
        &script,
        "case \"$4\" in\n  6) echo 0,150 ;;\n  5) echo -1,0 ;;\n  *) echo -3,1 ;;\nesac\n",
    )
    .unwrap();
    let oracle = ProcessOracle::new("sh", ProcessProtocol::Report)
        .with_prefix_args([script.as_os_str()]);
    let mut config = config_for(&dir);
    config.worker_budget = 2;
    let controller = SearchController::new(oracle, config.clone());

    let job = Job::parse_record("11,32,64,5.0,40,100,100,0,and").unwrap();
    let report = controller.run_job(&job).unwrap();
    assert_eq!(report.points, 3);
    assert_eq!(report.valid, vec![(32, 6)]);

    let log = config.layout().log_path("and", 11, 100, 100, 32, 64, 0);
    let ks: Vec<usize> = read_log(log).unwrap().iter().map(|e| e.k).collect();
    assert_eq!(ks, vec![6, 5, 7]);
}
