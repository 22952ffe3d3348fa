mod app;
mod panels;

use anyhow::Context;
use app::OllamaUiApp;
use eframe::egui;
use ollamaui_services::{AppConfig, Services};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Log to stdout and to ollamaui.log in the temp dir
    let file_appender = tracing_appender::rolling::never(std::env::temp_dir(), "ollamaui.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("ollamaui_services=debug,ollamaui_runner=info,ollamaui_gui=info")
        }))
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    tracing::info!("Ollama UI starting");

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Config unreadable, using defaults");
        AppConfig::default()
    });
    let services = Services::new(config).context("starting services")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Ollama UI"),
        ..Default::default()
    };

    eframe::run_native(
        "Ollama UI",
        options,
        Box::new(|cc| Ok(Box::new(OllamaUiApp::new(cc, services)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
