use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::{debug, info};

use crate::error::OracleError;

/// Rebuilds the oracle binary for a cipher mode before a job runs, e.g. `make or2`.
///
/// The oracle selects its combining function at compile time, so a job whose mode differs from
/// the previous one needs a fresh build. A failed build leaves no usable oracle and is fatal.
#[derive(Debug, Clone)]
pub struct BuildHook {
    program: String,
    args: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl BuildHook {
    /// Parses a whitespace separated command line such as `"make -j4"`.
    /// Returns `None` for an empty command, meaning no build step.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            work_dir: None,
        })
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn command_line(&self, target: Option<&str>) -> String {
        let mut line = self.program.clone();
        for a in self.args.iter().map(String::as_str).chain(target) {
            line.push(' ');
            line.push_str(a);
        }
        line
    }

    /// Runs the build, appending `target` (the mode name) when given.
    pub fn prepare(&self, target: Option<&str>) -> Result<(), OracleError> {
        let line = self.command_line(target);
        info!("Building oracle: {}", line);
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(target)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        let status = cmd.status().map_err(|e| OracleError::Build {
            command: line.clone(),
            reason: e.to_string(),
        })?;
        debug!("{} exited with: {}", line, status);
        if !status.success() {
            return Err(OracleError::Build {
                command: line,
                reason: status.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_command_line() {
        assert!(BuildHook::parse("   ").is_none());
        let hook = BuildHook::parse("make -j4").unwrap();
        assert_eq!(hook.command_line(Some("or2")), "make -j4 or2");
        assert_eq!(hook.command_line(None), "make -j4");
    }

    #[test]
    fn test_prepare_reports_failure() {
        let ok = BuildHook::parse("true").unwrap();
        assert!(ok.prepare(None).is_ok());

        let failing = BuildHook::parse("false").unwrap();
        assert!(matches!(
            failing.prepare(Some("and")),
            Err(OracleError::Build { .. })
        ));

        let missing = BuildHook::parse("/nonexistent/make-brm").unwrap();
        assert!(missing.prepare(None).is_err());
    }

    #[test]
    fn test_work_dir() {
        let temp_dir = tempfile::Builder::new()
            .prefix("build_test")
            .tempdir()
            .unwrap();
        std::fs::write(temp_dir.path().join("marker"), "").unwrap();
        let hook = BuildHook::parse("test -f marker").unwrap();
        assert!(hook.prepare(None).is_err());
        assert!(hook.with_work_dir(temp_dir.path()).prepare(None).is_ok());
    }
}
