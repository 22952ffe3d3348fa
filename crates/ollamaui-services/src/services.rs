//! Service container - stateless controllers
//!
//! Single entry point for all service access. Services operate on the
//! [`AppState`] owned by the caller via &mut references; the container owns
//! the tokio runtime their work runs on.

use std::sync::Arc;

use ollamaui_core::{AppConfig, AppState, OllamaUiError, Result};
use ollamaui_runner::{CommandExecutor, OllamaCli, OutputBus, ProcessRunner, TokioProcessRunner};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::info;

use crate::{ChatService, ModelService, StatusService, TerminalSession};

pub struct Services {
    pub models: ModelService,
    pub chat: ChatService,
    pub status: StatusService,
    config: AppConfig,
    cli: OllamaCli,
    runtime: Arc<Runtime>,
}

impl Services {
    /// Services backed by real processes
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_runner(config, Arc::new(TokioProcessRunner))
    }

    /// Services backed by any [`ProcessRunner`]
    pub fn with_runner(config: AppConfig, runner: Arc<dyn ProcessRunner>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("ollamaui-worker")
            .enable_all()
            .build()
            .map_err(OllamaUiError::Io)?;
        let runtime = Arc::new(runtime);

        let executor = CommandExecutor::new(runner);
        let cli = OllamaCli::new(executor, config.ollama.binary.clone());
        let handle = runtime.handle().clone();
        info!(binary = %config.ollama.binary, "Services ready");

        Ok(Self {
            models: ModelService::new(cli.clone(), handle.clone()),
            chat: ChatService::new(cli.clone(), handle.clone()),
            status: StatusService::new(cli.clone(), handle),
            config,
            cli,
            runtime,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cli(&self) -> &OllamaCli {
        &self.cli
    }

    pub fn bus(&self) -> &OutputBus {
        self.cli.executor().bus()
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }

    /// Open a terminal attached to this container's output bus
    pub fn open_terminal(&self, state: &mut AppState) -> TerminalSession {
        TerminalSession::initialize(
            state,
            self.cli.executor().clone(),
            self.handle(),
            &self.config.terminal,
        )
    }

    /// Drop finished pulls whose linger period is over
    pub fn prune_pulls(&self, state: &mut AppState) -> Vec<String> {
        state.prune_pulls(std::time::Instant::now(), self.config.pull.linger())
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("binary", &self.config.ollama.binary)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use ollamaui_runner::scripted::{Script, ScriptedRunner};
    use ollamaui_runner::OutputEvent;

    use super::*;

    #[test]
    fn terminal_sees_output_of_service_commands() {
        let runner = ScriptedRunner::new().on("ollama rm gone", Script::exit(1).stderr("Error: not found"));
        let services = Services::with_runner(AppConfig::default(), Arc::new(runner)).unwrap();
        let mut state = AppState::new();
        let mut terminal = services.open_terminal(&mut state);

        let rx = services.models.remove("gone").unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        terminal.pump(&state, Instant::now());

        assert!(terminal.screen().contents().contains("Error: not found"));
    }

    #[test]
    fn binary_comes_from_config() {
        let mut config = AppConfig::default();
        config.ollama.binary = "/opt/bin/ollama".into();
        let runner = ScriptedRunner::new().on("/opt/bin/ollama --version", Script::ok(["v1"]));
        let services = Services::with_runner(config, Arc::new(runner)).unwrap();
        let report = services.status.check().recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(report.status.running);
    }

    #[test]
    fn bus_is_shared() {
        let services = Services::with_runner(AppConfig::default(), Arc::new(ScriptedRunner::new())).unwrap();
        let (_sub, rx) = services.bus().channel();
        services.bus().publish(&OutputEvent::Stdout("x".into()));
        assert_eq!(rx.try_recv().unwrap(), OutputEvent::Stdout("x".into()));
    }
}
