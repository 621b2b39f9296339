//! # External Local-Search Solver
//!
//! Runs the weighted local-search executable as a child process. The instance is written to
//! a temporary file passed as `stdin`, `stdout` and `stderr` both go to a log file that is
//! parsed with [`fio::parse_log`] once the process exits.

use std::{fs, io, path::PathBuf, process::Command};

use anyhow::Context;
use log::{debug, info};

use super::{
    fio::{self, SolverLog},
    ScopInstance,
};

/// Options for the local-search solver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSearchOptions {
    /// The executable
    pub program: PathBuf,
    /// Verbosity passed as `-display`, between 0 and 3
    pub verbose: u8,
    /// Random seed
    pub seed: u32,
    /// Time limit in seconds, 0 for none
    pub timeout: u32,
    /// Stop once the penalty reaches this value, 0 for none
    pub target: u32,
    /// Keep the log at this path instead of a temporary file
    pub log_path: Option<PathBuf>,
}

impl Default for LocalSearchOptions {
    fn default() -> Self {
        LocalSearchOptions {
            program: PathBuf::from("scop"),
            verbose: 0,
            seed: 1,
            timeout: 0,
            target: 0,
            log_path: None,
        }
    }
}

impl LocalSearchOptions {
    /// The command line arguments, without the program
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![];
        if self.verbose > 0 {
            args.push("-display".to_string());
            args.push(self.verbose.to_string());
        }
        args.push("-seed".to_string());
        args.push(self.seed.to_string());
        if self.timeout > 0 {
            args.push("-time".to_string());
            args.push(self.timeout.to_string());
        }
        if self.target > 0 {
            args.push("-target".to_string());
            args.push(self.target.to_string());
        }
        args
    }

    fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.verbose <= 3,
            "local-search verbosity must be between 0 and 3, got {}",
            self.verbose
        );
        Ok(())
    }
}

/// The answer of one local-search run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSearchResult {
    /// What was read from the log
    pub log: SolverLog,
    /// The full log text
    pub log_text: String,
}

/// A local-search solver called via an external executable
#[derive(Debug, Clone, Default)]
pub struct LocalSearchSolver {
    opts: LocalSearchOptions,
}

impl LocalSearchSolver {
    /// Creates a solver with the given options
    ///
    /// # Errors
    ///
    /// If an option is out of range.
    pub fn new(opts: LocalSearchOptions) -> anyhow::Result<Self> {
        opts.check()?;
        Ok(LocalSearchSolver { opts })
    }

    /// The options
    #[must_use]
    pub fn options(&self) -> &LocalSearchOptions {
        &self.opts
    }

    /// Runs the solver on `inst` and waits for it to exit
    ///
    /// # Errors
    ///
    /// If the process cannot be run, exits with a non-zero status, or leaves a log that does
    /// not parse.
    pub fn solve(&self, inst: &ScopInstance) -> anyhow::Result<LocalSearchResult> {
        let mut writer = io::BufWriter::new(
            tempfile::Builder::new()
                .prefix("coptool")
                .suffix(".scop")
                .tempfile()?,
        );
        fio::write_instance(&mut writer, inst)?;
        let input = writer.into_inner()?.into_temp_path();

        // a temporary log is removed when `temp_log` drops
        let (log_path, temp_log) = match &self.opts.log_path {
            Some(path) => (path.clone(), None),
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("coptool")
                    .suffix(".log")
                    .tempfile()?
                    .into_temp_path();
                (temp.to_path_buf(), Some(temp))
            }
        };
        let log_file = fs::File::create(&log_path)
            .with_context(|| format!("could not create log file {}", log_path.display()))?;

        let mut cmd = Command::new(&self.opts.program);
        cmd.args(self.opts.args())
            .stdin(fs::File::open(&input)?)
            .stdout(log_file.try_clone()?)
            .stderr(log_file);
        info!(
            "running {} {}",
            self.opts.program.display(),
            self.opts.args().join(" ")
        );
        let status = cmd
            .status()
            .with_context(|| format!("could not run {}", self.opts.program.display()))?;
        match status.code() {
            Some(0) => (),
            Some(x) => anyhow::bail!("local-search solver returned unexpected code {x}"),
            None => anyhow::bail!("local-search solver terminated by signal"),
        }

        let log_text = fs::read_to_string(&log_path)?;
        let log = fio::parse_log(log_text.as_bytes()).context("malformed solver log")?;
        debug!(
            "local search: penalty {}/{} after {} ms",
            log.hard_penalty, log.soft_penalty, log.cpu_ms
        );
        input.close()?;
        if let Some(temp) = temp_log {
            temp.close()?;
        }
        Ok(LocalSearchResult { log, log_text })
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalSearchOptions, LocalSearchSolver};

    #[test]
    fn command_line() {
        let opts = LocalSearchOptions::default();
        assert_eq!(opts.args(), vec!["-seed", "1"]);
        let opts = LocalSearchOptions {
            verbose: 2,
            seed: 7,
            timeout: 10,
            target: 3,
            ..Default::default()
        };
        assert_eq!(
            opts.args(),
            vec!["-display", "2", "-seed", "7", "-time", "10", "-target", "3"]
        );
    }

    #[test]
    fn verbosity_range() {
        let opts = LocalSearchOptions {
            verbose: 4,
            ..Default::default()
        };
        assert!(LocalSearchSolver::new(opts).is_err());
    }

    #[test]
    fn missing_program() {
        let solver = LocalSearchSolver::new(LocalSearchOptions {
            program: "/nonexistent/local-search".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(solver.solve(&crate::scop::ScopInstance::new()).is_err());
    }
}
