use std::io::Write;
use std::time::{Duration, Instant};

use ollamaui_core::{ModelRecord, OllamaUiError, PartialDetails, PullProgress, Result, UNKNOWN};
use tracing::{debug, info, instrument, warn};

use crate::executor::CommandExecutor;
use crate::parse::{family_from_name, parse_details, parse_list, parse_progress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaStatus {
    pub running: bool,
    pub version: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub version: String,
    /// Value of `OLLAMA_MODELS` as reported by `ollama env`
    pub models_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PingResult {
    pub success: bool,
    pub response_time: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(t) = self.temperature {
            flags.extend(["--temperature".to_string(), t.to_string()]);
        }
        if let Some(p) = self.top_p {
            flags.extend(["--top-p".to_string(), p.to_string()]);
        }
        if let Some(n) = self.max_tokens {
            flags.extend(["--max-tokens".to_string(), n.to_string()]);
        }
        flags
    }
}

/// Typed front for the `ollama` binary; one spawned process per call
#[derive(Debug, Clone)]
pub struct OllamaCli {
    executor: CommandExecutor,
    binary: String,
}

impl OllamaCli {
    pub fn new(executor: CommandExecutor, binary: impl Into<String>) -> Self {
        Self {
            executor,
            binary: binary.into(),
        }
    }

    pub fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn ollama(&self, args: Vec<String>) -> Result<String> {
        Ok(self.executor.execute_sync(&self.binary, args).await?)
    }

    // --- models ---

    #[instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let raw = self.ollama(vec!["list".into()]).await?;
        let models = parse_list(&raw);
        info!(count = models.len(), "Listed models");
        Ok(models)
    }

    /// List, then fill in details from `show` for each model.
    ///
    /// A model whose `show` fails keeps default details with the family
    /// guessed from its name.
    #[instrument(skip(self))]
    pub async fn list_models_with_details(&self) -> Result<Vec<ModelRecord>> {
        let mut models = self.list_models().await?;
        for model in &mut models {
            match self.get_model_details(&model.name).await {
                Ok(details) => model.details.merge(details),
                Err(e) => {
                    warn!(model = %model.name, error = %e, "Could not load model details");
                    model.details.family = family_from_name(&model.name);
                }
            }
        }
        Ok(models)
    }

    /// Pull a model, reporting one [`PullProgress`] per recognised output line.
    ///
    /// On failure a final snapshot with `error` set is reported before the
    /// error is returned. A successful pull that never printed a success line
    /// gets a synthetic completed snapshot.
    #[instrument(skip(self, on_progress))]
    pub async fn pull_model<F>(&self, name: &str, mut on_progress: F) -> Result<()>
    where
        F: FnMut(PullProgress) + Send,
    {
        OllamaUiError::require_non_empty("model name", name)?;
        let model = name.trim().to_string();
        let mut completed = false;

        let result = self
            .executor
            .execute_with_progress(&self.binary, ["pull".to_string(), model.clone()], |chunk| {
                let Some(estimate) = parse_progress(chunk.text()) else {
                    return;
                };
                debug!(model = %model, pct = estimate.percentage, "Pull progress");
                completed |= estimate.is_complete();
                on_progress(PullProgress::update(
                    &model,
                    estimate.percentage,
                    estimate.status.clone(),
                    estimate.is_complete(),
                ));
            })
            .await;

        if result.is_error() {
            let error = result.error_message().to_string();
            warn!(model = %model, error = %error, "Pull failed");
            on_progress(PullProgress::failed(&model, &error));
            return Err(OllamaUiError::CommandFailed(error));
        }

        if !completed {
            on_progress(PullProgress::update(&model, 100, "Success", true));
        }
        info!(model = %model, "Pull completed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_model(&self, name: &str) -> Result<()> {
        OllamaUiError::require_non_empty("model name", name)?;
        self.ollama(vec!["rm".into(), name.trim().into()]).await?;
        info!(model = name, "Removed model");
        Ok(())
    }

    pub async fn show_model(&self, name: &str) -> Result<String> {
        OllamaUiError::require_non_empty("model name", name)?;
        self.ollama(vec!["show".into(), name.trim().into()]).await
    }

    /// Details parsed from `show`, with the family falling back to the name prefix
    pub async fn get_model_details(&self, name: &str) -> Result<PartialDetails> {
        let raw = self.show_model(name).await?;
        let mut details = parse_details(&raw);
        if details.family.is_none() {
            let family = family_from_name(name.trim());
            if family != UNKNOWN {
                details.families = Some(vec![family.clone()]);
                details.family = Some(family);
            }
        }
        Ok(details)
    }

    pub async fn is_model_available(&self, name: &str) -> bool {
        self.show_model(name).await.is_ok()
    }

    // --- chat ---

    /// One-shot prompt; returns the trimmed reply
    #[instrument(skip(self, prompt))]
    pub async fn chat_with_model(&self, model: &str, prompt: &str) -> Result<String> {
        OllamaUiError::require_non_empty("model name", model)?;
        OllamaUiError::require_non_empty("prompt", prompt)?;
        let reply = self
            .ollama(vec!["run".into(), model.trim().into(), prompt.into()])
            .await?;
        Ok(reply.trim().to_string())
    }

    #[instrument(skip(self, prompt))]
    pub async fn generate(&self, model: &str, prompt: &str, options: &GenerateOptions) -> Result<String> {
        OllamaUiError::require_non_empty("model name", model)?;
        OllamaUiError::require_non_empty("prompt", prompt)?;
        let mut args = vec!["run".to_string(), model.trim().to_string()];
        args.extend(options.to_flags());
        args.push(prompt.to_string());
        Ok(self.ollama(args).await?.trim().to_string())
    }

    /// Run the model with no prompt, streaming every stdout line to `on_message`
    #[instrument(skip(self, on_message))]
    pub async fn start_interactive_chat<F>(&self, model: &str, mut on_message: F) -> Result<()>
    where
        F: FnMut(&str) + Send,
    {
        OllamaUiError::require_non_empty("model name", model)?;
        let result = self
            .executor
            .execute_with_progress(&self.binary, ["run".to_string(), model.trim().to_string()], |chunk| {
                if !chunk.is_stderr() {
                    on_message(chunk.text());
                }
            })
            .await;
        if result.is_error() {
            return Err(OllamaUiError::CommandFailed(result.error_message().to_string()));
        }
        Ok(())
    }

    /// Follow-up messages need a persistent process, which is not offered
    pub async fn send_message(&self, _message: &str) -> Result<String> {
        Err(OllamaUiError::Unsupported(
            "Interactive sessions not yet implemented".to_string(),
        ))
    }

    // --- create ---

    /// Write `modelfile` to a temporary file and run `create <name> -f <file>`
    #[instrument(skip(self, modelfile))]
    pub async fn create_model(&self, name: &str, modelfile: &str) -> Result<String> {
        OllamaUiError::require_non_empty("model name", name)?;
        OllamaUiError::require_non_empty("Modelfile", modelfile)?;

        let mut file = tempfile::Builder::new().prefix("Modelfile-").tempfile()?;
        file.write_all(modelfile.as_bytes())?;
        file.flush()?;
        let path = file.path().to_string_lossy().into_owned();

        let output = self
            .ollama(vec!["create".into(), name.trim().into(), "-f".into(), path])
            .await?;
        info!(model = name, "Created model");
        Ok(output)
    }

    // --- status ---

    pub async fn check_status(&self) -> bool {
        self.ollama(vec!["--version".into()]).await.is_ok()
    }

    pub async fn detailed_status(&self) -> OllamaStatus {
        match self.ollama(vec!["--version".into()]).await {
            Ok(version) => {
                let version = version.trim();
                OllamaStatus {
                    running: true,
                    version: Some(if version.is_empty() { UNKNOWN } else { version }.to_string()),
                    error: None,
                }
            }
            Err(e) => OllamaStatus {
                running: false,
                version: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// `None` when the binary can't even report its version
    pub async fn system_info(&self) -> Option<SystemInfo> {
        let version = self.ollama(vec!["--version".into()]).await.ok()?;
        let models_path = match self.ollama(vec!["env".into()]).await {
            Ok(env) => models_path_from_env(&env),
            Err(e) => {
                debug!(error = %e, "`env` not available");
                None
            }
        };
        Some(SystemInfo {
            version: version.trim().to_string(),
            models_path,
        })
    }

    pub async fn ping(&self) -> PingResult {
        let start = Instant::now();
        let outcome = self.ollama(vec!["--version".into()]).await;
        let response_time = start.elapsed();
        PingResult {
            success: outcome.is_ok(),
            response_time,
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    /// Lines of `ps aux` mentioning ollama; empty when `ps` is unavailable
    pub async fn running_processes(&self) -> Vec<String> {
        match self.executor.execute_sync("ps", ["aux"]).await {
            Ok(out) => out
                .lines()
                .filter(|line| line.contains("ollama"))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                debug!(error = %e, "ps failed");
                Vec::new()
            }
        }
    }
}

fn models_path_from_env(env: &str) -> Option<String> {
    env.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("OLLAMA_MODELS"))
        .map(|rest| rest.trim_start_matches([':', '=', ' ']).trim().trim_matches('"'))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::scripted::{Script, ScriptedRunner};

    fn cli(runner: ScriptedRunner) -> (OllamaCli, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let executor = CommandExecutor::new(runner.clone());
        (OllamaCli::new(executor, "ollama"), runner)
    }

    #[tokio::test]
    async fn pull_reports_each_stage() {
        let (cli, _) = cli(ScriptedRunner::new().on(
            "ollama pull llama3:latest",
            Script::ok(["pulling manifest", "downloading 10%", "success"]),
        ));

        let mut events = Vec::new();
        cli.pull_model("llama3:latest", |p| events.push(p)).await.unwrap();

        let pcts: Vec<u8> = events.iter().filter_map(|p| p.percentage()).collect();
        assert_eq!(pcts, vec![5, 10, 100]);
        let completed: Vec<bool> = events.iter().map(|p| p.completed).collect();
        assert_eq!(completed, vec![false, false, true]);
    }

    #[tokio::test]
    async fn pull_without_success_line_still_completes() {
        let (cli, _) = cli(ScriptedRunner::new().on("ollama pull m", Script::ok(["pulling 50%"])));
        let mut events = Vec::new();
        cli.pull_model("m", |p| events.push(p)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].completed);
        assert_eq!(events[1].percentage(), Some(100));
    }

    #[tokio::test]
    async fn pull_failure_reports_error_snapshot() {
        let (cli, _) = cli(ScriptedRunner::new().on(
            "ollama pull nope",
            Script::exit(1).final_stderr("Error: pull model manifest: file does not exist"),
        ));
        let mut events = Vec::new();
        let err = cli.pull_model("nope", |p| events.push(p)).await.unwrap_err();

        assert!(matches!(err, OllamaUiError::CommandFailed(_)));
        let last = events.last().unwrap();
        assert!(last.completed);
        assert!(last.error.as_deref().unwrap().contains("file does not exist"));
    }

    #[tokio::test]
    async fn blank_names_never_spawn() {
        let (cli, runner) = cli(ScriptedRunner::new());
        assert!(matches!(
            cli.pull_model("  ", |_| {}).await,
            Err(OllamaUiError::InvalidInput(_))
        ));
        assert!(cli.remove_model("").await.is_err());
        assert!(cli.chat_with_model("llama3", " ").await.is_err());
        assert!(cli.create_model("x", "").await.is_err());
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn details_fall_back_to_name_family() {
        let (cli, _) = cli(
            ScriptedRunner::new()
                .on(
                    "ollama list",
                    Script::ok([
                        "NAME ID SIZE MODIFIED",
                        "llama3:latest 365c0bd3c000 4.7 GB 2 weeks ago",
                        "phi3:mini 4f2222927938 2.2 GB 3 days ago",
                    ]),
                )
                .on(
                    "ollama show llama3:latest",
                    Script::ok(["  Model", "    parameters   8.0B", "    quantization Q4_0"]),
                )
                .on("ollama show phi3:mini", Script::exit(1)),
        );

        let models = cli.list_models_with_details().await.unwrap();
        assert_eq!(models[0].details.family, "llama");
        assert_eq!(models[0].details.parameter_size, "8.0B");
        assert_eq!(models[1].details.family, "phi");
        assert_eq!(models[1].details.quantization_level, UNKNOWN);
    }

    #[tokio::test]
    async fn generate_puts_flags_before_prompt() {
        let (cli, runner) = cli(ScriptedRunner::new().on(
            "ollama run m --temperature 0.5 --max-tokens 64 hi",
            Script::ok(["  hello  "]),
        ));
        let options = GenerateOptions {
            temperature: Some(0.5),
            max_tokens: Some(64),
            ..Default::default()
        };
        assert_eq!(cli.generate("m", "hi", &options).await.unwrap(), "hello");
        assert_eq!(runner.calls(), vec!["ollama run m --temperature 0.5 --max-tokens 64 hi"]);
    }

    #[tokio::test]
    async fn interactive_chat_streams_stdout_only() {
        let (cli, _) = cli(ScriptedRunner::new().on(
            "ollama run llama3",
            Script::ok(["Hello!", ""])
                .stderr("loading model")
                .stdout("How can I help?"),
        ));

        let mut messages = Vec::new();
        cli.start_interactive_chat(" llama3 ", |line| messages.push(line.to_string()))
            .await
            .unwrap();
        assert_eq!(messages, vec!["Hello!", "", "How can I help?"]);
    }

    #[tokio::test]
    async fn interactive_chat_failure_is_command_failed() {
        let (cli, _) = cli(ScriptedRunner::new().on(
            "ollama run ghost",
            Script::exit(1).stdout("partial").stderr("Error: model 'ghost' not found"),
        ));

        let mut messages = Vec::new();
        let err = cli
            .start_interactive_chat("ghost", |line| messages.push(line.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, OllamaUiError::CommandFailed(ref m) if m.contains("not found")));
        assert_eq!(messages, vec!["partial"]);
    }

    #[tokio::test]
    async fn interactive_chat_needs_model() {
        let (cli, runner) = cli(ScriptedRunner::new());
        let mut called = false;
        let err = cli.start_interactive_chat("  ", |_| called = true).await.unwrap_err();
        assert!(matches!(err, OllamaUiError::InvalidInput(_)));
        assert!(!called);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn send_message_is_unsupported() {
        let (cli, _) = cli(ScriptedRunner::new());
        assert!(matches!(
            cli.send_message("hi").await,
            Err(OllamaUiError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn status_reflects_version_command() {
        let (cli, _) = cli(
            ScriptedRunner::new()
                .on("ollama --version", Script::ok(["ollama version is 0.3.12"]))
                .on("ollama env", Script::ok(["OLLAMA_HOST=127.0.0.1", "OLLAMA_MODELS=\"/data/models\""])),
        );
        assert!(cli.check_status().await);

        let status = cli.detailed_status().await;
        assert!(status.running);
        assert_eq!(status.version.as_deref(), Some("ollama version is 0.3.12"));

        let info = cli.system_info().await.unwrap();
        assert_eq!(info.models_path.as_deref(), Some("/data/models"));
        assert!(cli.ping().await.success);
    }

    #[tokio::test]
    async fn missing_binary_means_not_running() {
        let (cli, _) = cli(ScriptedRunner::new());
        let status = cli.detailed_status().await;
        assert!(!status.running);
        assert!(status.error.is_some());
        assert!(cli.system_info().await.is_none());
        assert!(cli.running_processes().await.is_empty());
    }

    #[tokio::test]
    async fn running_processes_filters_ps() {
        let (cli, _) = cli(ScriptedRunner::new().on(
            "ps aux",
            Script::ok(["USER PID COMMAND", "me 1 /usr/bin/ollama serve", "me 2 bash"]),
        ));
        assert_eq!(cli.running_processes().await, vec!["me 1 /usr/bin/ollama serve"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn create_model_passes_modelfile_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ollama");
        // Echo the Modelfile contents back so the test can see them
        std::fs::write(&script, "#!/bin/sh\ncat \"$4\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = OllamaCli::new(CommandExecutor::system(), script.to_string_lossy());
        let out = cli.create_model("mine", "FROM llama3\n").await.unwrap();
        assert_eq!(out, "FROM llama3\n");
    }
}
