use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::identity::ScriptPaths;
use crate::platform::{Invocation, Platform};
use crate::transport::{Envelope, Operation};

/// Why an envelope did not lead to a process launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnknownOperation(String),
    MissingTestname,
    MissingTester,
    SpawnFailed(String),
}

/// Outcome of handing an operation to an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Launched(Invocation),
    Skipped(SkipReason),
}

/// Turns an operation into a running local process.
pub trait Executor: Send {
    fn execute(&self, operation: &Operation, tester: Option<&str>, envelope: &Envelope) -> Dispatch;
}

/// Launches operation scripts as detached children of this process.
///
/// Children are never awaited. Their output is piped and drained in the
/// background without being looked at.
#[derive(Debug)]
pub struct ProcessExecutor {
    platform: Arc<dyn Platform>,
    workdir: PathBuf,
    shell: String,
    interpreter: String,
}

impl ProcessExecutor {
    pub fn new(platform: Arc<dyn Platform>, workdir: PathBuf) -> Self {
        let shell = platform
            .locate_shell()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| platform.shell_fallback().to_string());
        let interpreter = platform
            .locate_interpreter()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| platform.interpreter_fallback().to_string());
        Self::with_programs(platform, workdir, shell, interpreter)
    }

    pub fn with_programs(
        platform: Arc<dyn Platform>,
        workdir: PathBuf,
        shell: impl Into<String>,
        interpreter: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            workdir,
            shell: shell.into(),
            interpreter: interpreter.into(),
        }
    }

    /// Builds the command line for an operation without running it.
    pub fn plan(
        &self,
        operation: &Operation,
        tester: Option<&str>,
        envelope: &Envelope,
    ) -> Result<Invocation, SkipReason> {
        match operation {
            Operation::Update => Ok(self.platform.update_invocation(&self.shell)),
            Operation::Start => {
                let testname = envelope
                    .testname
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .ok_or(SkipReason::MissingTestname)?;
                Ok(self
                    .platform
                    .start_invocation(&self.shell, &self.interpreter, testname))
            }
            Operation::Stop => {
                let tester = tester
                    .filter(|tester| !tester.is_empty())
                    .ok_or(SkipReason::MissingTester)?;
                Ok(self
                    .platform
                    .stop_invocation(&self.shell, &self.interpreter, tester))
            }
            other => Err(SkipReason::UnknownOperation(other.to_string())),
        }
    }

    fn spawn(&self, invocation: &Invocation) -> io::Result<()> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(discard(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(discard(stderr));
        }
        debug!(pid = ?child.id(), "child detached");
        Ok(())
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, operation: &Operation, tester: Option<&str>, envelope: &Envelope) -> Dispatch {
        let invocation = match self.plan(operation, tester, envelope) {
            Ok(invocation) => invocation,
            Err(reason) => return Dispatch::Skipped(reason),
        };

        match self.spawn(&invocation) {
            Ok(()) => {
                info!(
                    operation = %operation,
                    program = %invocation.program,
                    args = ?invocation.args,
                    workdir = %self.workdir.display(),
                    "operation launched"
                );
                Dispatch::Launched(invocation)
            }
            Err(e) => {
                warn!(operation = %operation, program = %invocation.program, error = %e, "spawn failed");
                Dispatch::Skipped(SkipReason::SpawnFailed(e.to_string()))
            }
        }
    }
}

async fn discard<R: AsyncRead + Unpin>(mut stream: R) {
    let _ = tokio::io::copy(&mut stream, &mut tokio::io::sink()).await;
}

/// Directory operation scripts run from.
///
/// An explicit setting wins, then the platform's own lookup, then the
/// current directory.
pub fn resolve_workdir(
    explicit: Option<&Path>,
    platform: &dyn Platform,
    paths: &ScriptPaths,
) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| platform.script_root(paths))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Executor that records what it was asked to do.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingExecutor {
    pub calls: Arc<std::sync::Mutex<Vec<(Operation, Option<String>, Envelope)>>>,
}

#[cfg(test)]
impl RecordingExecutor {
    pub fn calls(&self) -> Vec<(Operation, Option<String>, Envelope)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Executor for RecordingExecutor {
    fn execute(&self, operation: &Operation, tester: Option<&str>, envelope: &Envelope) -> Dispatch {
        self.calls.lock().unwrap().push((
            operation.clone(),
            tester.map(str::to_string),
            envelope.clone(),
        ));
        match operation {
            Operation::Start | Operation::Stop | Operation::Update => {
                Dispatch::Launched(Invocation::new(operation.as_str(), Vec::<String>::new()))
            }
            other => Dispatch::Skipped(SkipReason::UnknownOperation(other.to_string())),
        }
    }
}
