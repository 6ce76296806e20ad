//! Subprocess backend.
//!
//! The oracle binary is started once per point. Two calling conventions exist in the field:
//!
//! - [`ProcessProtocol::Report`]: `prog deg m n k r1 r2 col workers [plaintext cipher]`, and the
//!   binary prints `"<code>,<count>"` on standard output. Its exit status carries no meaning.
//! - [`ProcessProtocol::ExitCode`]: `prog deg m k r1 r2`, and only the exit status matters:
//!   zero is a match, anything else is a miss.
//!
//! A hung binary would stall the whole search, so every call can be bounded by a timeout. The
//! child runs in its own process group and the whole group is killed when the deadline passes.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use log::{debug, warn};

use crate::error::OracleError;
use crate::params::{OracleParams, Verdict};
use crate::Oracle;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const KILL_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessProtocol {
    Report,
    ExitCode,
}

#[derive(Debug, Clone)]
pub struct ProcessOracle {
    program: PathBuf,
    prefix_args: Vec<OsString>,
    protocol: ProcessProtocol,
    timeout: Option<Duration>,
    work_dir: Option<PathBuf>,
}

impl ProcessOracle {
    pub fn new(program: impl AsRef<Path>, protocol: ProcessProtocol) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            prefix_args: vec![],
            protocol,
            timeout: None,
            work_dir: None,
        }
    }

    /// Arguments placed before the point parameters, e.g. a script path when `program` is an
    /// interpreter.
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn protocol(&self) -> ProcessProtocol {
        self.protocol
    }

    pub fn point_args(&self, p: &OracleParams) -> Vec<String> {
        match self.protocol {
            ProcessProtocol::Report => {
                let mut args = vec![
                    p.degree.to_string(),
                    p.m.to_string(),
                    p.n.to_string(),
                    p.k.to_string(),
                    p.r1.to_string(),
                    p.r2.to_string(),
                    p.collision_accept.to_string(),
                    p.worker_budget.to_string(),
                ];
                if let (Some(plain), Some(cipher)) = (p.plaintext, p.target_cipher) {
                    args.push(plain.to_string());
                    args.push(cipher.to_string());
                }
                args
            }
            ProcessProtocol::ExitCode => vec![
                p.degree.to_string(),
                p.m.to_string(),
                p.k.to_string(),
                p.r1.to_string(),
                p.r2.to_string(),
            ],
        }
    }

    fn spawn(&self, p: &OracleParams) -> Result<Child, OracleError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(self.point_args(p))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd.spawn().map_err(|source| OracleError::Launch {
            program: self.program.display().to_string(),
            source,
        })
    }

    fn wait(&self, child: &mut Child, start: Instant) -> Result<ExitStatus, OracleError> {
        let timeout = match self.timeout {
            None => return Ok(child.wait()?),
            Some(t) => t,
        };
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if start.elapsed() > timeout {
                self.kill_on_timeout(child.id(), timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(OracleError::Timeout(timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Collects what the reader thread captured. With a timeout, the deadline also covers
    /// descendants that keep stdout open after the oracle itself exited.
    fn collect_output(
        &self,
        output: Receiver<String>,
        pgid: u32,
        start: Instant,
    ) -> Result<String, OracleError> {
        let timeout = match self.timeout {
            None => return Ok(output.recv().unwrap_or_default()),
            Some(t) => t,
        };
        match output.recv_timeout(timeout.saturating_sub(start.elapsed())) {
            Ok(out) => Ok(out),
            Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
            Err(RecvTimeoutError::Timeout) => {
                self.kill_on_timeout(pgid, timeout);
                Err(OracleError::Timeout(timeout))
            }
        }
    }

    fn kill_on_timeout(&self, pgid: u32, timeout: Duration) {
        warn!(
            "oracle {} exceeded {:?}, killing process group",
            self.program.display(),
            timeout
        );
        kill_group(pgid);
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let pgid = pgid as i32;
    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
    }
    thread::sleep(KILL_GRACE);
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

// no process groups: only the direct child is killed, in `wait`
#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

impl Oracle for ProcessOracle {
    fn query(&self, p: &OracleParams) -> Result<Verdict, OracleError> {
        let start = Instant::now();
        let mut child = self.spawn(p)?;
        // drained on a side thread so a chatty oracle cannot fill the pipe and block
        let (sender, receiver) = bounded(1);
        match child.stdout.take() {
            Some(mut out) => {
                thread::spawn(move || {
                    let mut buf = String::new();
                    let _ = out.read_to_string(&mut buf);
                    let _ = sender.send(buf);
                });
            }
            None => drop(sender),
        }

        let status = self.wait(&mut child, start)?;
        let stdout = self.collect_output(receiver, child.id(), start)?;
        debug!(
            "oracle m={} k={} exited with {} stdout={:?}",
            p.m,
            p.k,
            status,
            stdout.trim()
        );

        match self.protocol {
            ProcessProtocol::ExitCode => {
                if status.success() {
                    Ok(Verdict::new(0, 0)?)
                } else {
                    Ok(Verdict::no_match())
                }
            }
            ProcessProtocol::Report => {
                let last = stdout
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("");
                Verdict::parse_report(last)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn script_oracle(body: &str, protocol: ProcessProtocol) -> (ProcessOracle, tempfile::TempDir) {
        let temp_dir = tempfile::Builder::new()
            .prefix("oracle_test")
            .tempdir()
            .unwrap();
        let script = temp_dir.path().join("oracle.sh");
        fs::write(&script, body).unwrap();
        let oracle = ProcessOracle::new("sh", protocol).with_prefix_args([script.as_os_str()]);
        (oracle, temp_dir)
    }

    #[test]
    fn test_point_args() {
        let p = OracleParams::new(16, 30, 7, 20012, 32022)
            .with_collision_accept(2)
            .with_worker_budget(4);
        let report = ProcessOracle::new("./main", ProcessProtocol::Report);
        assert_eq!(
            report.point_args(&p),
            vec!["16", "30", "60", "7", "20012", "32022", "2", "4"]
        );
        let p = p.with_known_plaintext(0, 12345);
        assert_eq!(report.point_args(&p).len(), 10);

        let exit = ProcessOracle::new("./main", ProcessProtocol::ExitCode);
        assert_eq!(
            exit.point_args(&p),
            vec!["16", "30", "7", "20012", "32022"]
        );
    }

    #[test]
    #[serial]
    fn test_report_protocol() {
        // echoes the k argument back as the candidate count
        let (oracle, _dir) = script_oracle(
            "echo \"Runtime: 0.1 seconds\"\nprintf '0,%s' \"$4\"\nexit 3\n",
            ProcessProtocol::Report,
        );
        let v = oracle
            .query(&OracleParams::new(11, 32, 6, 100, 100))
            .unwrap();
        assert_eq!(v.raw_code, 0);
        assert_eq!(v.candidate_count, 6);
    }

    #[test]
    #[serial]
    fn test_exit_code_protocol() {
        let (oracle, _dir) = script_oracle(
            "if [ \"$3\" -eq 2 ]; then exit 0; fi\nexit 1\n",
            ProcessProtocol::ExitCode,
        );
        let hit = oracle.query(&OracleParams::new(16, 10, 2, 1, 1)).unwrap();
        assert!(hit.is_match());
        let miss = oracle.query(&OracleParams::new(16, 10, 3, 1, 1)).unwrap();
        assert_eq!(miss, Verdict::no_match());
    }

    #[test]
    #[serial]
    fn test_timeout_kills_oracle() {
        let (oracle, _dir) = script_oracle("sleep 5\necho 0,1\n", ProcessProtocol::Report);
        let oracle = oracle.with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let res = oracle.query(&OracleParams::new(11, 20, 3, 1, 1));
        assert!(matches!(res, Err(OracleError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    #[serial]
    fn test_timeout_covers_lingering_descendants() {
        // the oracle exits at once but a background child keeps stdout open
        let (oracle, _dir) =
            script_oracle("sleep 4 &\necho 0,1\nexit 0\n", ProcessProtocol::Report);
        let oracle = oracle.with_timeout(Some(Duration::from_millis(300)));
        let start = Instant::now();
        let res = oracle.query(&OracleParams::new(11, 20, 3, 1, 1));
        assert!(matches!(res, Err(OracleError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    #[serial]
    fn test_work_dir() {
        let (oracle, dir) = script_oracle(
            "if [ -f marker ]; then echo 0,1; else echo -1,0; fi\n",
            ProcessProtocol::Report,
        );
        fs::write(dir.path().join("marker"), "").unwrap();
        let p = OracleParams::new(11, 20, 3, 1, 1);
        assert_eq!(oracle.clone().query(&p).unwrap().raw_code, -1);
        let oracle = oracle.with_work_dir(dir.path());
        assert!(oracle.query(&p).unwrap().is_match());
    }

    #[test]
    fn test_launch_failure() {
        let oracle = ProcessOracle::new("/nonexistent/brm-oracle-main", ProcessProtocol::Report);
        let res = oracle.query(&OracleParams::new(11, 20, 3, 1, 1));
        assert!(matches!(res, Err(OracleError::Launch { .. })));
    }
}
