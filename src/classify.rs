use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{error, info};

use crate::error::GtdbtkError;
use crate::materialize::{FASTA_EXTENSION, SequenceFileMap};

/// Environment variable GTDB-Tk consults for its internal temp files.
pub const TEMP_DIR_ENV: &str = "TEMP_DIR";

pub type EnvOverrides = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Value following `flag`, if the flag is present.
    pub fn arg_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStatus {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ProcessStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a command to completion. Implementations own timeouts, if any.
pub trait ProcessExecutor {
    fn execute(
        &self,
        command: &CommandLine,
        env: &EnvOverrides,
    ) -> Result<ProcessStatus, GtdbtkError>;
}

/// Spawns the real process with stdout and stderr passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn execute(
        &self,
        command: &CommandLine,
        env: &EnvOverrides,
    ) -> Result<ProcessStatus, GtdbtkError> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|err| {
                GtdbtkError::ClassifierExecution(format!(
                    "could not start {}: {err}",
                    command.program
                ))
            })?;
        Ok(ProcessStatus {
            code: status.code(),
        })
    }
}

pub struct ClassifyJob<'a> {
    pub program: &'a str,
    pub files: &'a SequenceFileMap,
    pub output_dir: &'a Path,
    /// Passed to GTDB-Tk as `--tmpdir`.
    pub temp_dir: &'a Path,
    /// Exported as `TEMP_DIR` for the tool's children.
    pub env_temp_dir: &'a Path,
    pub min_perc_aa: f64,
    pub cpus: usize,
}

pub fn build_command(job: &ClassifyJob<'_>) -> Result<CommandLine, GtdbtkError> {
    let genome_dirs = job
        .files
        .keys()
        .filter_map(|path| path.parent())
        .collect::<BTreeSet<_>>();
    let dir_count = genome_dirs.len();
    let genome_dir = genome_dirs
        .into_iter()
        .next()
        .filter(|_| dir_count == 1)
        .ok_or_else(|| {
            GtdbtkError::InternalContract(format!(
                "sequence files must share exactly one directory, found {dir_count}"
            ))
        })?;

    let args = vec![
        "classify_wf".to_string(),
        "--genome_dir".to_string(),
        genome_dir.to_string_lossy().to_string(),
        "--extension".to_string(),
        FASTA_EXTENSION.to_string(),
        "--out_dir".to_string(),
        job.output_dir.to_string_lossy().to_string(),
        "--cpus".to_string(),
        job.cpus.to_string(),
        "--min_perc_aa".to_string(),
        job.min_perc_aa.to_string(),
        "--tmpdir".to_string(),
        job.temp_dir.to_string_lossy().to_string(),
    ];
    Ok(CommandLine {
        program: job.program.to_string(),
        args,
    })
}

/// Runs `gtdbtk classify_wf` over the staged files. A failed run is not retried.
pub fn classify(job: &ClassifyJob<'_>, executor: &dyn ProcessExecutor) -> Result<(), GtdbtkError> {
    let command = build_command(job)?;
    let mut env = EnvOverrides::new();
    env.insert(
        TEMP_DIR_ENV.to_string(),
        job.env_temp_dir.to_string_lossy().to_string(),
    );

    info!(%command, genomes = job.files.len(), "running classifier");
    let status = executor.execute(&command, &env)?;
    if !status.success() {
        let reason = match status.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        error!(%command, %reason, "classifier failed");
        return Err(GtdbtkError::ClassifierExecution(format!(
            "{} classify_wf: {reason}",
            command.program
        )));
    }
    info!("classifier finished");
    Ok(())
}
