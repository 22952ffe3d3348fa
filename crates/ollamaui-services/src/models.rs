use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use ollamaui_core::{AppAction, AppState, ModelRecord, OllamaUiError, PartialDetails, PullProgress, Result};
use ollamaui_runner::OllamaCli;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

/// Results of model operations, delivered to the view thread
#[derive(Debug, Clone)]
pub enum ModelEvent {
    Listed(std::result::Result<Vec<ModelRecord>, String>),
    Progress(PullProgress),
    Pulled {
        model: String,
        result: std::result::Result<(), String>,
    },
    Removed {
        model: String,
        result: std::result::Result<(), String>,
    },
    Details {
        model: String,
        result: std::result::Result<PartialDetails, String>,
    },
    Created {
        model: String,
        result: std::result::Result<String, String>,
    },
}

/// What a poll pass observed that the view may want to act on
#[derive(Debug, Default)]
pub struct ModelPoll {
    /// The installed set changed (pull or create finished); a refresh is due
    pub refresh: bool,
    /// Pull snapshots applied during this pass, in order
    pub pulls: Vec<PullProgress>,
}

/// Stateless model controller - operates on [`AppState`] via &mut references
#[derive(Debug, Clone)]
pub struct ModelService {
    cli: OllamaCli,
    handle: Handle,
}

impl ModelService {
    pub fn new(cli: OllamaCli, handle: Handle) -> Self {
        Self { cli, handle }
    }

    fn spawn<Fut>(&self, job: impl FnOnce(OllamaCli, Sender<ModelEvent>) -> Fut) -> Receiver<ModelEvent>
    where
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = channel();
        self.handle.spawn(job(self.cli.clone(), tx));
        rx
    }

    /// Reload the installed model list, details included.
    ///
    /// Overlapping refreshes are not coordinated; whichever finishes last wins.
    #[instrument(skip(self, state))]
    pub fn refresh(&self, state: &mut AppState) -> Receiver<ModelEvent> {
        state.apply(AppAction::SetLoading(true));
        state.apply(AppAction::SetError(None));
        self.spawn(|cli, tx| async move {
            let result = cli.list_models_with_details().await.map_err(|e| e.to_string());
            let _ = tx.send(ModelEvent::Listed(result));
        })
    }

    #[instrument(skip(self, state))]
    pub fn pull(&self, state: &mut AppState, name: &str) -> Result<Receiver<ModelEvent>> {
        OllamaUiError::require_non_empty("model name", name)?;
        let model = name.trim().to_string();
        info!(model = %model, "Starting pull");
        state.apply(AppAction::PullProgress(PullProgress::started(&model)));

        Ok(self.spawn(move |cli, tx| async move {
            let progress_tx = tx.clone();
            let result = cli
                .pull_model(&model, |p| {
                    let _ = progress_tx.send(ModelEvent::Progress(p));
                })
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(ModelEvent::Pulled { model, result });
        }))
    }

    #[instrument(skip(self))]
    pub fn remove(&self, name: &str) -> Result<Receiver<ModelEvent>> {
        OllamaUiError::require_non_empty("model name", name)?;
        let model = name.trim().to_string();
        Ok(self.spawn(move |cli, tx| async move {
            let result = cli.remove_model(&model).await.map_err(|e| e.to_string());
            let _ = tx.send(ModelEvent::Removed { model, result });
        }))
    }

    pub fn details(&self, name: &str) -> Result<Receiver<ModelEvent>> {
        OllamaUiError::require_non_empty("model name", name)?;
        let model = name.trim().to_string();
        Ok(self.spawn(move |cli, tx| async move {
            let result = cli.get_model_details(&model).await.map_err(|e| e.to_string());
            let _ = tx.send(ModelEvent::Details { model, result });
        }))
    }

    #[instrument(skip(self, modelfile))]
    pub fn create(&self, name: &str, modelfile: &str) -> Result<Receiver<ModelEvent>> {
        OllamaUiError::require_non_empty("model name", name)?;
        OllamaUiError::require_non_empty("Modelfile", modelfile)?;
        let model = name.trim().to_string();
        let modelfile = modelfile.to_string();
        Ok(self.spawn(move |cli, tx| async move {
            let result = cli
                .create_model(&model, &modelfile)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(ModelEvent::Created { model, result });
        }))
    }

    /// Drain every pending receiver into `state`, dropping the finished ones
    pub fn poll_all(state: &mut AppState, receivers: &mut Vec<Receiver<ModelEvent>>) -> ModelPoll {
        let mut poll = ModelPoll::default();
        receivers.retain(|rx| Self::drain(state, rx, &mut poll));
        poll
    }

    /// Returns false once the sender side is gone
    fn drain(state: &mut AppState, rx: &Receiver<ModelEvent>, poll: &mut ModelPoll) -> bool {
        loop {
            match rx.try_recv() {
                Ok(event) => Self::handle_event(state, event, poll),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn handle_event(state: &mut AppState, event: ModelEvent, poll: &mut ModelPoll) {
        match event {
            ModelEvent::Listed(Ok(models)) => {
                debug!(count = models.len(), "Model list received");
                state.apply(AppAction::SetModels(models));
                state.apply(AppAction::SetLoading(false));
            }
            ModelEvent::Listed(Err(e)) => {
                warn!(error = %e, "Model refresh failed");
                state.apply(AppAction::SetError(Some(e)));
                state.apply(AppAction::SetLoading(false));
            }
            ModelEvent::Progress(progress) => {
                poll.pulls.push(progress.clone());
                state.apply(AppAction::PullProgress(progress));
            }
            ModelEvent::Pulled { model, result } => match result {
                Ok(()) => {
                    info!(model = %model, "Pull finished");
                    poll.refresh = true;
                }
                Err(e) => state.apply(AppAction::SetError(Some(format!("Pull of {model} failed: {e}")))),
            },
            ModelEvent::Removed { model, result } => match result {
                Ok(()) => state.apply(AppAction::RemoveModel(model)),
                Err(e) => state.apply(AppAction::SetError(Some(format!("Could not remove {model}: {e}")))),
            },
            ModelEvent::Details { model, result } => match result {
                Ok(details) => state.apply(AppAction::UpdateDetails { name: model, details }),
                Err(e) => warn!(model = %model, error = %e, "Details unavailable"),
            },
            ModelEvent::Created { model, result } => match result {
                Ok(_) => {
                    info!(model = %model, "Model created");
                    poll.refresh = true;
                }
                Err(e) => state.apply(AppAction::SetError(Some(format!("Could not create {model}: {e}")))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use ollamaui_runner::scripted::{Script, ScriptedRunner};
    use ollamaui_runner::CommandExecutor;
    use tokio::runtime::Runtime;

    use super::*;

    const LIST: [&str; 2] = [
        "NAME ID SIZE MODIFIED",
        "llama3:latest 365c0bd3c000 4.7 GB 2 weeks ago",
    ];

    fn service(runner: ScriptedRunner) -> (ModelService, Runtime) {
        let rt = Runtime::new().unwrap();
        let cli = OllamaCli::new(CommandExecutor::new(Arc::new(runner)), "ollama");
        (ModelService::new(cli, rt.handle().clone()), rt)
    }

    /// Poll until every receiver has finished
    fn settle(state: &mut AppState, mut receivers: Vec<Receiver<ModelEvent>>) -> ModelPoll {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut total = ModelPoll::default();
        while !receivers.is_empty() && Instant::now() < deadline {
            let poll = ModelService::poll_all(state, &mut receivers);
            total.refresh |= poll.refresh;
            total.pulls.extend(poll.pulls);
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(receivers.is_empty(), "operations did not finish");
        total
    }

    #[test]
    fn refresh_populates_store() {
        let (svc, _rt) = service(
            ScriptedRunner::new()
                .on("ollama list", Script::ok(LIST))
                .on("ollama show llama3:latest", Script::ok(["    architecture  llama"])),
        );
        let mut state = AppState::new();
        let rx = svc.refresh(&mut state);
        assert!(state.loading);

        settle(&mut state, vec![rx]);
        assert!(!state.loading);
        assert_eq!(state.model_names(), vec!["llama3:latest".to_string()]);
        assert_eq!(state.models[0].details.family, "llama");
    }

    #[test]
    fn refresh_failure_sets_error() {
        let (svc, _rt) = service(ScriptedRunner::new().on("ollama list", Script::exit(1).final_stderr("boom")));
        let mut state = AppState::new();
        let rx = svc.refresh(&mut state);
        settle(&mut state, vec![rx]);
        assert_eq!(state.error.as_deref(), Some("Command failed: boom"));
        assert!(!state.loading);
    }

    #[test]
    fn last_resolving_refresh_wins() {
        let runner = ScriptedRunner::new();
        runner.push("ollama list", Script::ok(LIST).with_delay(Duration::from_millis(50)));
        runner.push("ollama list", Script::ok(["NAME ID SIZE MODIFIED"]));
        let (svc, _rt) = service(runner.on("ollama show llama3:latest", Script::exit(1)));

        let mut state = AppState::new();
        let slow = svc.refresh(&mut state);
        let fast = svc.refresh(&mut state);
        settle(&mut state, vec![slow, fast]);

        assert_eq!(state.model_count(), 1);
    }

    #[test]
    fn pull_tracks_progress_and_requests_refresh() {
        let (svc, _rt) = service(ScriptedRunner::new().on(
            "ollama pull llama3:latest",
            Script::ok(["pulling manifest", "downloading 10%", "success"]),
        ));
        let mut state = AppState::new();
        let rx = svc.pull(&mut state, "llama3:latest").unwrap();
        assert!(state.pulls.is_pulling("llama3:latest"));

        let poll = settle(&mut state, vec![rx]);
        assert!(poll.refresh);
        assert_eq!(poll.pulls.len(), 3);
        let entry = state.pulls.get("llama3:latest").unwrap();
        assert!(entry.completed);
        assert_eq!(entry.percentage(), Some(100));
    }

    #[test]
    fn remove_updates_store_only_on_success() {
        let (svc, _rt) = service(
            ScriptedRunner::new()
                .on("ollama rm a", Script::ok(Vec::<String>::new()))
                .on("ollama rm b", Script::exit(1).final_stderr("not found")),
        );
        let mut state = AppState::new();
        state.apply(AppAction::SetModels(vec![
            ModelRecord::new("a", "abcdef", 1, "now"),
            ModelRecord::new("b", "abcdef", 1, "now"),
        ]));

        let a = svc.remove("a").unwrap();
        let b = svc.remove("b").unwrap();
        settle(&mut state, vec![a, b]);

        assert_eq!(state.model_names(), vec!["b".to_string()]);
        assert!(state.error.as_deref().unwrap().contains("not found"));
    }

    #[test]
    fn blank_input_is_rejected_up_front() {
        let (svc, _rt) = service(ScriptedRunner::new());
        let mut state = AppState::new();
        assert!(svc.pull(&mut state, " ").is_err());
        assert!(state.pulls.is_empty());
        assert!(svc.create("name", "  ").is_err());
    }
}
