use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, Instant};

use ollamaui_core::{AppAction, AppState, PullProgress, TerminalConfig};
use ollamaui_runner::bus::{GREEN, RED, RESET, YELLOW};
use ollamaui_runner::{CommandExecutor, OutputEvent, Subscription};
use tokio::runtime::Handle;
use tracing::{debug, info, instrument};

use super::screen::ScreenBuffer;

pub const PROMPT: &str = "$ ";
pub const WELCOME: &str = "Welcome to Ollama UI Terminal";

const CTRL_C: char = '\u{3}';
const DELETE: char = '\u{7f}';
const ENTER: char = '\r';

/// An interactive shell-like terminal bound to the shared output bus.
///
/// Keystrokes go through [`handle_input`](Self::handle_input); output from
/// every command run through the executor (not just the ones typed here)
/// lands on the screen when [`pump`](Self::pump) is called.
pub struct TerminalSession {
    executor: CommandExecutor,
    handle: Handle,
    screen: ScreenBuffer,
    output: Option<(Subscription, Receiver<OutputEvent>)>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
    prompts_due: Vec<Instant>,
    prompt_delay: Duration,
    running: usize,
    /// Cursor is on the input line (prompt plus echoed command)
    at_prompt: bool,
    /// Running pull line the cursor sits on
    pull_line: Option<String>,
    /// Input line to redraw once the pull line is done with
    prompt_after_pull: bool,
}

impl TerminalSession {
    #[instrument(skip_all)]
    pub fn initialize(
        state: &mut AppState,
        executor: CommandExecutor,
        handle: Handle,
        config: &TerminalConfig,
    ) -> Self {
        let output = executor.bus().channel();
        let (done_tx, done_rx) = channel();

        let mut session = Self {
            executor,
            handle,
            screen: ScreenBuffer::new(config.scrollback),
            output: Some(output),
            done_tx,
            done_rx,
            prompts_due: Vec::new(),
            prompt_delay: config.prompt_delay(),
            running: 0,
            at_prompt: false,
            pull_line: None,
            prompt_after_pull: false,
        };
        session.write(&format!("{WELCOME}\r\n"));
        session.show_prompt("");

        state.terminal.set_history_limit(config.history_limit);
        state.apply(AppAction::SetTerminalInitialized(true));
        info!("Terminal initialized");
        session
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    pub fn write(&mut self, text: &str) {
        self.screen.write(text);
    }

    pub fn is_released(&self) -> bool {
        self.output.is_none()
    }

    /// Commands started here that have not finished yet
    pub fn running(&self) -> usize {
        self.running
    }

    fn show_prompt(&mut self, command: &str) {
        self.write(PROMPT);
        self.write(command);
        self.at_prompt = true;
    }

    /// Leave a running pull line where it is so input echoes below it
    fn detach_pull_line(&mut self, state: &AppState) {
        if self.pull_line.take().is_none() {
            return;
        }
        self.write("\r\n");
        if std::mem::take(&mut self.prompt_after_pull) {
            self.show_prompt(&state.terminal.current_command);
        }
    }

    /// Feed raw terminal input: Enter is `\r`, Backspace `\x7f`, Ctrl-C `\x03`
    pub fn handle_input(&mut self, state: &mut AppState, data: &str) {
        if !data.is_empty() {
            self.detach_pull_line(state);
        }
        for c in data.chars() {
            match c {
                CTRL_C => {
                    self.write("^C\r\n");
                    state.apply(AppAction::SetCurrentCommand(String::new()));
                    self.show_prompt("");
                }
                ENTER => self.submit(state),
                DELETE => {
                    let mut command = state.terminal.current_command.clone();
                    if command.pop().is_some() {
                        state.apply(AppAction::SetCurrentCommand(command));
                        self.write("\x08 \x08");
                    }
                }
                c if c >= ' ' || c == '\t' => {
                    let mut command = state.terminal.current_command.clone();
                    command.push(c);
                    state.apply(AppAction::SetCurrentCommand(command));
                    let mut echo = [0u8; 4];
                    self.write(c.encode_utf8(&mut echo));
                }
                _ => {}
            }
        }
    }

    fn submit(&mut self, state: &mut AppState) {
        self.write("\r\n");
        self.at_prompt = false;
        let command = state.terminal.current_command.trim().to_string();
        state.apply(AppAction::SetCurrentCommand(String::new()));

        if command.is_empty() {
            self.show_prompt("");
            return;
        }
        state.apply(AppAction::AddToHistory(command.clone()));
        self.spawn(&command);
    }

    fn spawn(&mut self, line: &str) {
        let mut parts = line.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else { return };
        let args: Vec<String> = parts.collect();
        debug!(program = %program, ?args, "Running terminal command");

        let executor = self.executor.clone();
        let done = self.done_tx.clone();
        self.running += 1;
        self.handle.spawn(async move {
            executor.execute(&program, args).await;
            let _ = done.send(());
        });
    }

    /// Copy pending output onto the screen and show any prompt that is due.
    ///
    /// Output lands above a running pull line and below an input line that
    /// is redrawn afterwards. Returns true when the screen changed.
    pub fn pump(&mut self, state: &AppState, now: Instant) -> bool {
        let mut changed = false;

        // Completions first: a finished command's output is already queued
        while self.done_rx.try_recv().is_ok() {
            self.running = self.running.saturating_sub(1);
            self.prompts_due.push(now + self.prompt_delay);
        }

        let events: Vec<OutputEvent> = match &self.output {
            Some((_, rx)) => rx.try_iter().collect(),
            None => Vec::new(),
        };
        if !events.is_empty() {
            let pull_line = self.pull_line.take();
            let at_prompt = std::mem::take(&mut self.at_prompt);
            if pull_line.is_some() {
                self.write("\r\x1b[K");
            } else if at_prompt {
                self.write("\r\n");
            }

            for event in events {
                self.write(&event.terminal_text());
            }

            match pull_line {
                Some(line) => {
                    self.write(&line);
                    self.pull_line = Some(line);
                }
                None if at_prompt => self.show_prompt(&state.terminal.current_command),
                None => {}
            }
            changed = true;
        }

        let before = self.prompts_due.len();
        self.prompts_due.retain(|due| *due > now);
        for _ in self.prompts_due.len()..before {
            if self.pull_line.is_some() {
                self.prompt_after_pull = true;
            } else if !self.at_prompt {
                self.show_prompt(&state.terminal.current_command);
                changed = true;
            }
        }
        changed
    }

    /// Next moment a delayed prompt needs drawing, for repaint scheduling
    pub fn next_deadline(&self) -> Option<Instant> {
        self.prompts_due.iter().min().copied()
    }

    /// Draw a pull snapshot as a single line rewritten in place.
    ///
    /// The pull line starts below whatever the cursor was on. When it
    /// finishes, the input line is redrawn under it if it was showing.
    pub fn show_pull(&mut self, state: &AppState, progress: &PullProgress) {
        let (line, finished) = match (&progress.error, progress.completed) {
            (Some(error), _) => (format!("{RED}Pull failed for {}: {error}{RESET}", progress.model), true),
            (None, true) => (format!("{GREEN}{} - Complete!{RESET}", progress.display_line()), true),
            (None, false) => (format!("{YELLOW}{}{RESET}", progress.display_line()), false),
        };

        if self.pull_line.take().is_some() {
            self.write("\r\x1b[K");
        } else {
            self.prompt_after_pull = std::mem::take(&mut self.at_prompt);
            if !self.screen.current_line().is_empty() {
                self.write("\r\n");
            }
        }

        self.write(&line);
        if !finished {
            self.pull_line = Some(line);
            return;
        }
        self.write("\r\n");
        if std::mem::take(&mut self.prompt_after_pull) {
            self.show_prompt(&state.terminal.current_command);
        }
    }

    pub fn clear(&mut self) {
        self.screen.clear();
        self.pull_line = None;
        self.prompt_after_pull = false;
        self.show_prompt("");
    }

    /// Stop listening to the output bus. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some((subscription, _)) = self.output.take() {
            subscription.cancel();
            info!("Terminal released");
        }
    }

    /// Release and mark the terminal uninitialized in `state`
    pub fn shutdown(mut self, state: &mut AppState) {
        self.release();
        state.apply(AppAction::SetTerminalInitialized(false));
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TerminalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalSession")
            .field("lines", &self.screen.line_count())
            .field("running", &self.running)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ollamaui_runner::scripted::{Script, ScriptedRunner};
    use tokio::runtime::Runtime;

    use super::*;
    use crate::terminal::Tone;

    struct Fixture {
        session: TerminalSession,
        state: AppState,
        runner: Arc<ScriptedRunner>,
        _rt: Runtime,
    }

    fn fixture(runner: ScriptedRunner) -> Fixture {
        let rt = Runtime::new().unwrap();
        let runner = Arc::new(runner);
        let executor = CommandExecutor::new(runner.clone());
        let mut state = AppState::new();
        let config = TerminalConfig {
            prompt_delay_ms: 0,
            ..Default::default()
        };
        let session = TerminalSession::initialize(&mut state, executor, rt.handle().clone(), &config);
        Fixture {
            session,
            state,
            runner,
            _rt: rt,
        }
    }

    impl Fixture {
        fn type_str(&mut self, data: &str) {
            self.session.handle_input(&mut self.state, data);
        }

        /// Pump until every spawned command has finished and its prompt is drawn
        fn settle(&mut self) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                self.session.pump(&self.state, Instant::now());
                if self.session.running() == 0 && self.session.next_deadline().is_none() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            panic!("terminal did not settle");
        }
    }

    #[test]
    fn welcome_banner_and_prompt() {
        let f = fixture(ScriptedRunner::new());
        assert!(f.state.terminal.initialized);
        assert_eq!(f.session.screen().contents(), format!("{WELCOME}\n$"));
    }

    #[test]
    fn enter_runs_command_and_records_history() {
        let mut f = fixture(ScriptedRunner::new().on("ollama list", Script::ok(["NAME ID SIZE MODIFIED"])));
        f.type_str("ollama list\r");
        assert_eq!(f.state.terminal.last_command(), Some("ollama list"));
        assert!(f.state.terminal.current_command.is_empty());

        f.settle();
        assert_eq!(f.runner.calls(), vec!["ollama list"]);
        assert_eq!(
            f.session.screen().contents(),
            format!("{WELCOME}\n$ ollama list\nNAME ID SIZE MODIFIED\n$")
        );
    }

    #[test]
    fn blank_enter_only_redraws_prompt() {
        let mut f = fixture(ScriptedRunner::new());
        f.type_str("   \r");
        f.settle();
        assert_eq!(f.state.terminal.history_len(), 0);
        assert_eq!(f.runner.call_count(), 0);
        assert_eq!(f.session.screen().contents(), format!("{WELCOME}\n$\n$"));
    }

    #[test]
    fn backspace_edits_buffer() {
        let mut f = fixture(ScriptedRunner::new());
        f.type_str("lsx\u{7f}");
        assert_eq!(f.state.terminal.current_command, "ls");
        f.type_str("\u{7f}\u{7f}\u{7f}");
        assert!(f.state.terminal.current_command.is_empty());
        assert_eq!(f.session.screen().current_line().text().trim_end(), "$");
    }

    #[test]
    fn ctrl_c_clears_buffer() {
        let mut f = fixture(ScriptedRunner::new());
        f.type_str("ollama pu");
        f.type_str("\u{3}");
        assert!(f.state.terminal.current_command.is_empty());
        assert_eq!(f.state.terminal.history_len(), 0);
        assert!(f.session.screen().contents().ends_with("$ ollama pu^C\n$"));

        // Nothing to interrupt is still fine
        f.type_str("\u{3}\u{3}");
        assert!(f.state.terminal.current_command.is_empty());
    }

    #[test]
    fn stderr_and_spawn_failures_are_red() {
        let mut f = fixture(ScriptedRunner::new().on("ollama rm x", Script::exit(1).stderr("Error: not found")));
        f.type_str("ollama rm x\r");
        f.settle();
        f.type_str("nosuchthing\r");
        f.settle();

        let red: Vec<String> = f
            .session
            .screen()
            .lines()
            .filter(|l| l.tone == Tone::Red)
            .map(|l| l.text())
            .collect();
        assert_eq!(red.len(), 2);
        assert_eq!(red[0], "Error: not found");
        assert!(red[1].starts_with("Error: Failed to spawn nosuchthing"));
    }

    #[test]
    fn commands_may_overlap() {
        let mut f = fixture(
            ScriptedRunner::new()
                .on("slow", Script::ok(["slow done"]).with_delay(Duration::from_millis(40)))
                .on("fast", Script::ok(["fast done"])),
        );
        f.type_str("slow\rfast\r");
        assert_eq!(f.session.running(), 2);
        f.settle();

        let text = f.session.screen().contents();
        assert!(text.contains("slow done"));
        assert!(text.contains("fast done"));
        assert_eq!(f.state.terminal.history_len(), 2);
    }

    fn screen_lines(session: &TerminalSession) -> Vec<(String, Tone)> {
        session
            .screen()
            .lines()
            .map(|l| (l.text().trim_end().to_string(), l.tone))
            .collect()
    }

    #[test]
    fn pull_line_is_rewritten_in_place() {
        let mut f = fixture(ScriptedRunner::new());
        let before = f.session.screen().line_count();
        f.session.show_pull(&f.state, &PullProgress::update("m", 10, "downloading 10%", false));
        f.session.show_pull(&f.state, &PullProgress::update("m", 40, "downloading 40%", false));
        assert_eq!(f.session.screen().line_count(), before + 1);
        assert_eq!(f.session.screen().current_line().tone, Tone::Yellow);

        f.session.show_pull(&f.state, &PullProgress::update("m", 100, "Success", true));
        let lines: Vec<String> = screen_lines(&f.session).into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            lines,
            vec![WELCOME, "$", "Pulling m: Success (100%) - Complete!", "$"]
        );
    }

    #[test]
    fn output_during_pull_lands_above_pull_line() {
        let mut f = fixture(ScriptedRunner::new());
        let bus = f.session.executor.bus().clone();

        f.session.show_pull(&f.state, &PullProgress::update("llama3", 10, "downloading 10%", false));
        bus.publish(&OutputEvent::Stderr("pulling abc... 10%".into()));
        f.session.pump(&f.state, Instant::now());

        assert_eq!(
            screen_lines(&f.session),
            vec![
                (WELCOME.to_string(), Tone::Normal),
                ("$".to_string(), Tone::Normal),
                ("pulling abc... 10%".to_string(), Tone::Red),
                ("Pulling llama3: downloading 10% (10%)".to_string(), Tone::Yellow),
            ]
        );

        f.session.show_pull(&f.state, &PullProgress::update("llama3", 100, "Success", true));
        assert!(f
            .session
            .screen()
            .contents()
            .ends_with("Pulling llama3: Success (100%) - Complete!\n$"));
    }

    #[test]
    fn typing_during_pull_keeps_command() {
        let mut f = fixture(ScriptedRunner::new());
        f.type_str("ollama ");
        f.session.show_pull(&f.state, &PullProgress::update("m", 40, "downloading 40%", false));
        f.type_str("li");
        assert_eq!(f.session.screen().current_line().text(), "$ ollama li");

        f.session.show_pull(&f.state, &PullProgress::failed("m", "not found"));
        assert_eq!(f.state.terminal.current_command, "ollama li");
        let lines = screen_lines(&f.session);
        let n = lines.len();
        assert_eq!(lines[n - 2], ("Pull failed for m: not found".to_string(), Tone::Red));
        assert_eq!(lines[n - 1].0, "$ ollama li");
    }

    #[test]
    fn outside_output_redraws_input_line() {
        let mut f = fixture(ScriptedRunner::new());
        let bus = f.session.executor.bus().clone();
        f.type_str("ls");
        bus.publish(&OutputEvent::Failure("Could not remove m".into()));
        f.session.pump(&f.state, Instant::now());

        let lines = screen_lines(&f.session);
        assert_eq!(lines[1].0, "$ ls");
        assert_eq!(lines[2], ("Error: Could not remove m".to_string(), Tone::Red));
        assert_eq!(lines[3].0, "$ ls");
    }

    #[test]
    fn release_is_idempotent_and_stops_output() {
        let mut f = fixture(ScriptedRunner::new());
        let bus = f.session.executor.bus().clone();
        assert_eq!(bus.listener_count(), 1);

        f.session.release();
        f.session.release();
        assert!(f.session.is_released());
        assert_eq!(bus.listener_count(), 0);

        bus.publish(&OutputEvent::Stdout("ignored".into()));
        assert!(!f.session.pump(&f.state, Instant::now()));

        let Fixture { session, mut state, .. } = f;
        session.shutdown(&mut state);
        assert!(!state.terminal.initialized);
    }

    #[test]
    fn prompt_waits_for_delay() {
        let rt = Runtime::new().unwrap();
        let executor = CommandExecutor::new(Arc::new(ScriptedRunner::new().on("x", Script::ok(["out"]))));
        let mut state = AppState::new();
        let config = TerminalConfig::default();
        let mut session = TerminalSession::initialize(&mut state, executor, rt.handle().clone(), &config);

        session.handle_input(&mut state, "x\r");
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.next_deadline().is_none() && Instant::now() < deadline {
            session.pump(&state, Instant::now());
            std::thread::sleep(Duration::from_millis(5));
        }
        let due = session.next_deadline().unwrap();
        assert!(session.screen().contents().ends_with("out\n"));

        session.pump(&state, due);
        assert!(session.screen().contents().ends_with("out\n$"));
    }
}
