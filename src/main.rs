//! qrshield - QR Code Scanner
//!
//! Scans QR codes from a camera or image files, classifies what they carry
//! and warns about links and text that look dangerous.

mod app;
mod cli;
mod error;
mod guard;
mod media;
mod scanner;
mod ui;

use anyhow::Result;
use clap::Parser;
use log::{debug, info};

use app::App;
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins over -v
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    info!("qrshield v{}", env!("CARGO_PKG_VERSION"));
    debug!("Platform: {}", std::env::consts::OS);

    // Everything runs as one cooperative task; the native camera brings its
    // own capture thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut app = App::new(cli.config, cli.json, cli.no_interactive);
    runtime.block_on(app.run(cli.command))
}
