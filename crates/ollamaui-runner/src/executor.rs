use std::sync::Arc;

use ollamaui_core::{CommandResult, OllamaUiError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::bus::{OutputBus, OutputEvent};
use crate::process::{OutputChunk, ProcessExit, ProcessRunner, RunnerError, TokioProcessRunner};

/// Failure of a command run through [`CommandExecutor::execute_sync`]
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
    /// Stdout gathered before the failure
    pub output: Option<String>,
}

impl From<CommandError> for OllamaUiError {
    fn from(e: CommandError) -> Self {
        OllamaUiError::CommandFailed(e.message)
    }
}

#[derive(Default)]
struct Accumulated {
    stdout: String,
    stderr: String,
}

/// Runs commands, aggregating their output and mirroring every line onto the [`OutputBus`]
#[derive(Clone)]
pub struct CommandExecutor {
    runner: Arc<dyn ProcessRunner>,
    bus: OutputBus,
}

impl CommandExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::with_bus(runner, OutputBus::new())
    }

    pub fn with_bus(runner: Arc<dyn ProcessRunner>, bus: OutputBus) -> Self {
        Self { runner, bus }
    }

    /// Executor backed by real OS processes
    pub fn system() -> Self {
        Self::new(Arc::new(TokioProcessRunner))
    }

    pub fn bus(&self) -> &OutputBus {
        &self.bus
    }

    pub async fn execute<I, S>(&self, command: &str, args: I) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.execute_with_progress(command, args, |_| {}).await
    }

    /// Like [`execute`](Self::execute) but failure becomes an `Err`
    pub async fn execute_sync<I, S>(&self, command: &str, args: I) -> Result<String, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let result = self.execute(command, args).await;
        if result.is_success() {
            return Ok(result.output.unwrap_or_default());
        }
        Err(CommandError {
            message: result.error_message().to_string(),
            output: result.output,
        })
    }

    /// Run `command`, calling `on_chunk` for each stdout or stderr line as it arrives
    #[instrument(skip(self, args, on_chunk))]
    pub async fn execute_with_progress<I, S, F>(
        &self,
        command: &str,
        args: I,
        mut on_chunk: F,
    ) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&OutputChunk) + Send,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        info!(?args, "Executing command");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut acc = Accumulated::default();

        let outcome = {
            let run = self.runner.run(command, &args, tx);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    biased;
                    Some(chunk) = rx.recv() => self.handle_chunk(chunk, &mut acc, &mut on_chunk),
                    outcome = &mut run => break outcome,
                }
            }
        };
        while let Ok(chunk) = rx.try_recv() {
            self.handle_chunk(chunk, &mut acc, &mut on_chunk);
        }

        self.finish(outcome, acc)
    }

    fn handle_chunk<F>(&self, chunk: OutputChunk, acc: &mut Accumulated, on_chunk: &mut F)
    where
        F: FnMut(&OutputChunk),
    {
        let event = match &chunk {
            OutputChunk::Stdout(line) => {
                debug!(line = %line, "stdout");
                acc.stdout.push_str(line);
                acc.stdout.push('\n');
                OutputEvent::Stdout(line.clone())
            }
            OutputChunk::Stderr(line) => {
                debug!(line = %line, "stderr");
                acc.stderr.push_str(line);
                acc.stderr.push('\n');
                OutputEvent::Stderr(line.clone())
            }
        };
        self.bus.publish(&event);
        on_chunk(&chunk);
    }

    fn finish(&self, outcome: Result<ProcessExit, RunnerError>, acc: Accumulated) -> CommandResult {
        let exit = match outcome {
            Ok(exit) => exit,
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "Command could not run");
                self.bus.publish(&OutputEvent::Failure(message.clone()));
                return CommandResult::failure(message, None);
            }
        };

        if exit.success() {
            info!(bytes = acc.stdout.len(), "Command succeeded");
            return CommandResult::success(acc.stdout);
        }

        let message = [exit.stderr.trim(), acc.stderr.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("Command failed with exit code {}", exit.code.unwrap_or(-1))
            });
        warn!(code = ?exit.code, error = %message, "Command failed");

        let output = (!acc.stdout.is_empty()).then_some(acc.stdout);
        CommandResult::failure(message, output)
    }
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor").field("bus", &self.bus).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::scripted::{Script, ScriptedRunner};

    fn executor(runner: ScriptedRunner) -> CommandExecutor {
        CommandExecutor::new(Arc::new(runner))
    }

    #[tokio::test]
    async fn success_accumulates_stdout_lines() {
        let exec = executor(
            ScriptedRunner::new().on("ollama list", Script::ok(["NAME ID SIZE MODIFIED", "a 1 2 GB now"])),
        );
        let result = exec.execute("ollama", ["list"]).await;
        assert!(result.is_success());
        assert_eq!(result.output_or_empty(), "NAME ID SIZE MODIFIED\na 1 2 GB now\n");
    }

    #[tokio::test]
    async fn failure_prefers_process_stderr() {
        let exec = executor(ScriptedRunner::new().on(
            "ollama rm x",
            Script::exit(1).stderr("streamed").final_stderr("Error: model 'x' not found"),
        ));
        let result = exec.execute("ollama", ["rm", "x"]).await;
        assert!(result.is_error());
        assert_eq!(result.error_message(), "Error: model 'x' not found");
    }

    #[tokio::test]
    async fn failure_falls_back_to_streamed_stderr_then_exit_code() {
        let exec = executor(
            ScriptedRunner::new()
                .on("a", Script::exit(2).stderr("only streamed"))
                .on("b", Script::exit(7)),
        );
        let streamed = exec.execute("a", Vec::<String>::new()).await;
        assert_eq!(streamed.error_message(), "only streamed");

        let bare = exec.execute("b", Vec::<String>::new()).await;
        assert_eq!(bare.error_message(), "Command failed with exit code 7");
        assert_eq!(bare.output, None);
    }

    #[tokio::test]
    async fn spawn_failure_reaches_error_listeners() {
        let exec = executor(ScriptedRunner::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = exec
            .bus()
            .subscribe(move |e| sink.lock().unwrap().push(e.terminal_text()));

        let result = exec.execute("ollama", ["list"]).await;
        assert!(result.is_error());
        let rendered = seen.lock().unwrap().clone();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].starts_with("\x1b[31mError: "));
    }

    #[tokio::test]
    async fn progress_callback_sees_every_line_in_order() {
        let exec = executor(ScriptedRunner::new().on(
            "ollama pull m",
            Script::ok(["pulling manifest"]).stderr("downloading 42%").stdout("success"),
        ));
        let mut lines = Vec::new();
        let result = exec
            .execute_with_progress("ollama", ["pull", "m"], |chunk| lines.push(chunk.clone()))
            .await;

        assert!(result.is_success());
        assert_eq!(
            lines,
            vec![
                OutputChunk::Stdout("pulling manifest".into()),
                OutputChunk::Stderr("downloading 42%".into()),
                OutputChunk::Stdout("success".into()),
            ]
        );
    }

    #[tokio::test]
    async fn execute_sync_maps_failure_to_err() {
        let exec = executor(ScriptedRunner::new().on("x", Script::exit(1).stdout("partial")));
        let err = exec.execute_sync("x", Vec::<String>::new()).await.unwrap_err();
        assert_eq!(err.message, "Command failed with exit code 1");
        assert_eq!(err.output.as_deref(), Some("partial\n"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_process_output_is_aggregated() {
        let exec = CommandExecutor::system();
        let result = exec.execute("sh", ["-c", "echo hi; echo there"]).await;
        assert_eq!(result.output_or_empty(), "hi\nthere\n");
    }
}
