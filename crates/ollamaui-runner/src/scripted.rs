//! Canned process runner for tests

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::process::{ChunkSender, OutputChunk, ProcessExit, ProcessRunner, RunnerError};

/// Output a scripted process produces, in order
#[derive(Debug, Clone, Default)]
pub struct Script {
    chunks: Vec<OutputChunk>,
    code: i32,
    final_stderr: String,
    spawn_error: Option<io::ErrorKind>,
    delay: Option<Duration>,
}

impl Script {
    /// Exit 0 after printing `lines` on stdout
    pub fn ok<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: lines.into_iter().map(|l| OutputChunk::Stdout(l.into())).collect(),
            ..Default::default()
        }
    }

    pub fn exit(code: i32) -> Self {
        Self {
            code,
            ..Default::default()
        }
    }

    pub fn spawn_error(kind: io::ErrorKind) -> Self {
        Self {
            spawn_error: Some(kind),
            ..Default::default()
        }
    }

    pub fn stdout(mut self, line: impl Into<String>) -> Self {
        self.chunks.push(OutputChunk::Stdout(line.into()));
        self
    }

    pub fn stderr(mut self, line: impl Into<String>) -> Self {
        self.chunks.push(OutputChunk::Stderr(line.into()));
        self
    }

    /// Stderr reported with the exit status rather than streamed
    pub fn final_stderr(mut self, text: impl Into<String>) -> Self {
        self.final_stderr = text.into();
        self
    }

    /// Sleep before each chunk and before exiting
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Replays [`Script`]s keyed by the full command line (`"ollama pull llama3"`).
///
/// Several scripts for one command line are consumed in order, the last one
/// repeating. Unknown command lines fail to spawn with `NotFound`.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, command_line: &str, script: Script) -> Self {
        self.push(command_line, script);
        self
    }

    pub fn push(&self, command_line: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .entry(command_line.to_string())
            .or_default()
            .push_back(script);
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_script(&self, line: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(line)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        chunks: ChunkSender,
    ) -> Result<ProcessExit, RunnerError> {
        let line = command_line(command, args);
        self.calls.lock().unwrap().push(line.clone());

        let script = self
            .next_script(&line)
            .unwrap_or_else(|| Script::spawn_error(io::ErrorKind::NotFound));

        if let Some(kind) = script.spawn_error {
            return Err(RunnerError::Spawn {
                command: command.to_string(),
                source: io::Error::new(kind, format!("no script for `{line}`")),
            });
        }

        let mut stdout = String::new();
        for chunk in script.chunks {
            if let Some(delay) = script.delay {
                tokio::time::sleep(delay).await;
            }
            if let OutputChunk::Stdout(text) = &chunk {
                stdout.push_str(text);
                stdout.push('\n');
            }
            let _ = chunks.send(chunk);
        }
        if let Some(delay) = script.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(ProcessExit {
            code: Some(script.code),
            stdout,
            stderr: script.final_stderr,
        })
    }
}
