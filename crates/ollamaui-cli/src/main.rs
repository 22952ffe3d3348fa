use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ollamaui_core::{format_size, AppConfig, PullProgress, TerminalState};
use ollamaui_runner::{CommandExecutor, GenerateOptions, OllamaCli};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ollamaui")]
#[command(about = "Ollama UI - manage and chat with local models", long_about = None)]
struct Cli {
    /// Path to the ollama binary (overrides config and OLLAMAUI_BINARY)
    #[arg(long, global = true)]
    binary: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List installed models
    List {
        /// Also load family, parameters and quantization for each model
        #[arg(short, long)]
        details: bool,
    },

    /// Download a model
    Pull { model: String },

    /// Delete a model
    Rm { model: String },

    /// Print `ollama show` output for a model
    Show { model: String },

    /// Show ollama status and install info
    Status,

    /// Send a single prompt to a model
    Run {
        model: String,

        /// Prompt text
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,

        #[arg(short, long)]
        temperature: Option<f32>,

        #[arg(long)]
        top_p: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,
    },

    /// Create a model from a Modelfile
    Create {
        name: String,

        /// Modelfile to read
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Cli::parse();
    let mut config = AppConfig::load().context("loading config")?;
    if let Some(binary) = args.binary {
        config.ollama.binary = binary;
    }
    let ollama = OllamaCli::new(CommandExecutor::system(), config.ollama.binary.clone());

    match args.command {
        Some(Commands::List { details }) => cmd_list(&ollama, details).await?,
        Some(Commands::Pull { model }) => cmd_pull(&ollama, &model).await?,
        Some(Commands::Rm { model }) => cmd_rm(&ollama, &model).await?,
        Some(Commands::Show { model }) => cmd_show(&ollama, &model).await?,
        Some(Commands::Status) => cmd_status(&ollama).await?,
        Some(Commands::Run {
            model,
            prompt,
            temperature,
            top_p,
            max_tokens,
        }) => {
            let options = GenerateOptions {
                temperature,
                top_p,
                max_tokens,
            };
            cmd_run(&ollama, &model, &prompt.join(" "), &options).await?
        }
        Some(Commands::Create { name, file }) => {
            let modelfile = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            cmd_create(&ollama, &name, &modelfile).await?
        }
        None => run_interactive(&ollama, &config).await?,
    }

    Ok(())
}

async fn run_interactive(ollama: &OllamaCli, config: &AppConfig) -> Result<()> {
    display_welcome();
    cmd_status(ollama).await?;
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut history = TerminalState::with_history_limit(config.terminal.history_limit);

    loop {
        print!("$ ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        history.push_history(trimmed.to_string());

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();
        let rest = &parts[1..];

        let outcome = match (cmd.as_str(), rest) {
            ("help" | "h" | "?", _) => {
                display_help();
                Ok(())
            }
            ("list" | "ls" | "l", _) => cmd_list(ollama, rest.contains(&"--details")).await,
            ("status" | "s", _) => cmd_status(ollama).await,
            ("pull", [model]) => cmd_pull(ollama, model).await,
            ("rm", [model]) => cmd_rm(ollama, model).await,
            ("show", [model]) => cmd_show(ollama, model).await,
            ("run", [model, prompt @ ..]) if !prompt.is_empty() => {
                cmd_run(ollama, model, &prompt.join(" "), &GenerateOptions::default()).await
            }
            ("history", _) => {
                for (i, entry) in history.history().enumerate() {
                    println!("  {:>4}  {}", i + 1, entry);
                }
                Ok(())
            }
            ("clear" | "cls", _) => {
                print!("\x1B[2J\x1B[1;1H");
                stdout.flush()?;
                Ok(())
            }
            ("exit" | "quit" | "q", _) => break,
            ("pull" | "rm" | "show" | "run", _) => {
                println!("Usage: {} <model>{}", cmd, if cmd == "run" { " <prompt>" } else { "" });
                Ok(())
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", cmd);
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("\x1b[31mError: {}\x1b[0m", e);
        }
    }

    Ok(())
}

fn display_welcome() {
    println!();
    println!("  Welcome to Ollama UI Terminal");
    println!();
    println!("  list, l [--details]    # List installed models");
    println!("  pull <model>           # Download a model");
    println!("  run <model> <prompt>   # Ask a model something");
    println!("  status, s              # Show ollama status");
    println!("  help                   # Show all command options");
    println!("  exit, quit, q          # Leave");
    println!();
}

fn display_help() {
    println!();
    println!("Available Commands:");
    println!("  list, ls, l [--details]  List installed models");
    println!("  pull <model>             Download a model, showing progress");
    println!("  rm <model>               Delete a model");
    println!("  show <model>             Print model information");
    println!("  run <model> <prompt>     Send one prompt and print the reply");
    println!("  status, s                Show ollama status and install info");
    println!("  history                  Show commands entered this session");
    println!("  clear, cls               Clear screen");
    println!("  help, h                  Show this help message");
    println!("  exit, quit, q            Leave");
    println!();
}

async fn cmd_list(ollama: &OllamaCli, details: bool) -> Result<()> {
    let models = if details {
        ollama.list_models_with_details().await?
    } else {
        ollama.list_models().await?
    };

    println!();
    if models.is_empty() {
        println!("  No models installed. Try `pull llama3`.");
        println!();
        return Ok(());
    }

    if details {
        println!("  {:<4} {:<32} {:>10} {:<12} {:<10} {:<10}", "#", "NAME", "SIZE", "FAMILY", "PARAMS", "QUANT");
        println!("{:-<86}", "");
        for (i, m) in models.iter().enumerate() {
            println!(
                "  {:<4} {:<32} {:>10} {:<12} {:<10} {:<10}",
                i + 1,
                m.name,
                format_size(m.size),
                m.details.family,
                m.details.parameter_size,
                m.details.quantization_level
            );
        }
    } else {
        println!("  {:<4} {:<32} {:>10} {}", "#", "NAME", "SIZE", "MODIFIED");
        println!("{:-<70}", "");
        for (i, m) in models.iter().enumerate() {
            println!("  {:<4} {:<32} {:>10} {}", i + 1, m.name, format_size(m.size), m.modified_at);
        }
    }
    let total: u64 = models.iter().map(|m| m.size).sum();
    println!();
    println!("  {} models, {} total", models.len(), format_size(total));
    println!();
    Ok(())
}

async fn cmd_pull(ollama: &OllamaCli, model: &str) -> Result<()> {
    let mut stdout = io::stdout();
    ollama
        .pull_model(model, |progress| render_pull(&mut stdout, &progress))
        .await?;
    Ok(())
}

fn render_pull(out: &mut impl Write, progress: &PullProgress) {
    let line = match (&progress.error, progress.completed) {
        (Some(error), _) => format!("\r\x1b[31mPull failed for {}: {}\x1b[0m\x1b[K\n", progress.model, error),
        (None, true) => format!("\r\x1b[32m{} - Complete!\x1b[0m\x1b[K\n", progress.display_line()),
        (None, false) => format!("\r\x1b[33m{}\x1b[0m\x1b[K", progress.display_line()),
    };
    let _ = write!(out, "{line}");
    let _ = out.flush();
}

async fn cmd_rm(ollama: &OllamaCli, model: &str) -> Result<()> {
    ollama.remove_model(model).await?;
    println!("Deleted '{}'", model);
    Ok(())
}

async fn cmd_show(ollama: &OllamaCli, model: &str) -> Result<()> {
    print!("{}", ollama.show_model(model).await?);
    Ok(())
}

async fn cmd_run(ollama: &OllamaCli, model: &str, prompt: &str, options: &GenerateOptions) -> Result<()> {
    let reply = if *options == GenerateOptions::default() {
        ollama.chat_with_model(model, prompt).await?
    } else {
        ollama.generate(model, prompt, options).await?
    };
    println!("{}", reply);
    Ok(())
}

async fn cmd_create(ollama: &OllamaCli, name: &str, modelfile: &str) -> Result<()> {
    let output = ollama.create_model(name, modelfile).await?;
    print!("{}", output);
    println!("Created '{}'", name);
    Ok(())
}

async fn cmd_status(ollama: &OllamaCli) -> Result<()> {
    println!("System Status:");
    println!("{:-<40}", "");
    println!("  Binary: {}", ollama.binary());

    let status = ollama.detailed_status().await;
    if !status.running {
        println!(
            "  Ollama: not available ({})",
            status.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(());
    }
    println!("  Ollama: {}", status.version.as_deref().unwrap_or("unknown version"));

    let ping = ollama.ping().await;
    println!("  Response time: {} ms", ping.response_time.as_millis());

    if let Some(info) = ollama.system_info().await {
        if let Some(path) = info.models_path {
            println!("  Models path: {}", path);
        }
    }
    match ollama.list_models().await {
        Ok(models) => println!("  Models installed: {}", models.len()),
        Err(e) => println!("  Models: unavailable ({})", e),
    }
    let processes = ollama.running_processes().await;
    println!("  Ollama processes: {}", processes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_render_rewrites_one_line() {
        let mut out = Vec::new();
        render_pull(&mut out, &PullProgress::update("m", 40, "downloading 40%", false));
        render_pull(&mut out, &PullProgress::update("m", 100, "Success", true));
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\r\x1b[33mPulling m: downloading 40% (40%)"));
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.contains("Complete!"));
    }

    #[test]
    fn run_requires_prompt() {
        assert!(Cli::try_parse_from(["ollamaui", "run", "llama3"]).is_err());
        let cli = Cli::try_parse_from(["ollamaui", "--binary", "/x/ollama", "run", "llama3", "hi", "there"]).unwrap();
        assert_eq!(cli.binary.as_deref(), Some("/x/ollama"));
        match cli.command {
            Some(Commands::Run { prompt, .. }) => assert_eq!(prompt.join(" "), "hi there"),
            _ => panic!("expected run"),
        }
    }
}
