mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::MelbvizApp;
use clap::Parser;
use eframe::egui;
use melbviz::Settings;

#[derive(Parser)]
#[command(name = "melbviz")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Melbourne CBD pedestrian traffic dashboard")]
struct Cli {
    /// Counts CSV or Parquet snapshot to open instead of the configured data
    file: Option<PathBuf>,
}

fn main() -> eframe::Result {
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::load_default();
    let app = MelbvizApp::new(&settings, cli.file.as_deref());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Melbviz – Pedestrian Traffic",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
