pub mod bus;
pub mod executor;
pub mod ollama;
pub mod parse;
pub mod process;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use bus::{OutputBus, OutputEvent, Subscription};
pub use executor::{CommandError, CommandExecutor};
pub use ollama::{GenerateOptions, OllamaCli, OllamaStatus, PingResult, SystemInfo};
pub use parse::{
    family_from_name, parse_details, parse_list, parse_progress, parse_size_to_bytes,
    ProgressEstimate, PullStage,
};
pub use process::{OutputChunk, ProcessExit, ProcessRunner, RunnerError, TokioProcessRunner};
