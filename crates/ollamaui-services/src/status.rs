use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;

use ollamaui_runner::{OllamaCli, OllamaStatus, SystemInfo};
use tokio::runtime::Handle;
use tracing::info;

/// Everything the settings tab shows about the local ollama install
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: OllamaStatus,
    pub info: Option<SystemInfo>,
    pub response_time: Duration,
    pub processes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StatusService {
    cli: OllamaCli,
    handle: Handle,
}

impl StatusService {
    pub fn new(cli: OllamaCli, handle: Handle) -> Self {
        Self { cli, handle }
    }

    pub fn check(&self) -> Receiver<StatusReport> {
        let (tx, rx) = channel();
        let cli = self.cli.clone();
        self.handle.spawn(async move {
            let ping = cli.ping().await;
            let status = cli.detailed_status().await;
            let info = if status.running { cli.system_info().await } else { None };
            let processes = cli.running_processes().await;
            info!(running = status.running, processes = processes.len(), "Status checked");
            let _ = tx.send(StatusReport {
                status,
                info,
                response_time: ping.response_time,
                processes,
            });
        });
        rx
    }

    pub fn is_model_available(&self, name: &str) -> Receiver<bool> {
        let (tx, rx) = channel();
        let cli = self.cli.clone();
        let name = name.to_string();
        self.handle.spawn(async move {
            let _ = tx.send(cli.is_model_available(&name).await);
        });
        rx
    }
}
