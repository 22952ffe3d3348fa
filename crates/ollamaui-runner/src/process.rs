use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One line of output from a child process, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChunk {
    Stdout(String),
    Stderr(String),
}

impl OutputChunk {
    pub fn text(&self) -> &str {
        match self {
            OutputChunk::Stdout(line) | OutputChunk::Stderr(line) => line,
        }
    }

    pub fn is_stderr(&self) -> bool {
        matches!(self, OutputChunk::Stderr(_))
    }
}

/// What a finished process left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error while running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ChunkSender = mpsc::UnboundedSender<OutputChunk>;

/// Spawns external programs and streams their output line by line.
///
/// Every line is sent on `chunks` as it arrives; the returned [`ProcessExit`]
/// carries the exit code once the process is gone.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        chunks: ChunkSender,
    ) -> Result<ProcessExit, RunnerError>;
}

/// Runs real OS processes through `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        chunks: ChunkSender,
    ) -> Result<ProcessExit, RunnerError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| {
            error!(command, error = %source, "Failed to spawn process");
            RunnerError::Spawn {
                command: command.to_string(),
                source,
            }
        })?;
        info!(pid = child.id(), command, ?args, "Process spawned");

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump_lines(out, chunks.clone(), OutputChunk::Stdout)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump_lines(err, chunks.clone(), OutputChunk::Stderr)));
        drop(chunks);

        let status = child.wait().await.map_err(|source| RunnerError::Io {
            command: command.to_string(),
            source,
        })?;

        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;
        debug!(command, code = ?status.code(), "Process exited");

        Ok(ProcessExit {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

async fn collect(task: Option<JoinHandle<std::io::Result<String>>>) -> String {
    let Some(task) = task else {
        return String::new();
    };
    match task.await {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed reading process output");
            String::new()
        }
        Err(e) => {
            warn!(error = %e, "Output reader task failed");
            String::new()
        }
    }
}

/// Read until EOF, forwarding each complete line and returning all of them joined by `\n`
async fn pump_lines<R>(
    mut reader: R,
    chunks: ChunkSender,
    wrap: fn(String) -> OutputChunk,
) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut collected = String::new();
    let mut buf = [0u8; 4096];

    let forward = |line: String, collected: &mut String| {
        collected.push_str(&line);
        collected.push('\n');
        // Receiver may be gone if the caller stopped listening
        let _ = chunks.send(wrap(line));
    };

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        for line in splitter.push(&buf[..n]) {
            forward(line, &mut collected);
        }
    }
    if let Some(line) = splitter.finish() {
        forward(line, &mut collected);
    }

    Ok(collected)
}

/// Splits a byte stream into lines on `\n`, `\r\n` and bare `\r`.
///
/// A `\r` that ends an empty segment is swallowed so carriage-return redraws
/// and CRLF endings don't produce blank lines; a bare `\n` always ends a line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    after_cr: bool,
}

impl LineSplitter {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\r' => {
                    if !self.pending.is_empty() {
                        lines.push(self.take());
                    }
                    self.after_cr = true;
                }
                b'\n' => {
                    if !(self.after_cr && self.pending.is_empty()) {
                        lines.push(self.take());
                    }
                    self.after_cr = false;
                }
                _ => {
                    self.pending.push(byte);
                    self.after_cr = false;
                }
            }
        }
        lines
    }

    /// Flush whatever is left once the stream ends
    pub fn finish(&mut self) -> Option<String> {
        self.after_cr = false;
        (!self.pending.is_empty()).then(|| self.take())
    }

    fn take(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}
