mod capture;
mod config;
mod credentials;
mod error;
mod gemini;
mod hint;
mod hotkey;
mod logging;
mod overlay;
mod scanner;
mod server;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::capture::PrimaryMonitor;
use crate::config::Settings;
use crate::credentials::CredentialPool;
use crate::gemini::{GeminiBackend, InferenceClient};
use crate::scanner::Scanner;

fn cli() -> Command {
    Command::new("hintlens")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Screen hint overlay backed by a Gemini vision model")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Settings file (defaults to ./hintlens.toml when present)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("overlay").about("Run the desktop overlay (default)"))
        .subcommand(
            Command::new("serve")
                .about("Run the companion web server")
                .arg(
                    Arg::new("port")
                        .long("port")
                        .value_name("PORT")
                        .help("Port to listen on")
                        .value_parser(value_parser!(u16)),
                ),
        )
        .subcommand(Command::new("once").about("Scan the screen once and print the hint"))
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut settings = Settings::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    logging::init(matches.get_flag("verbose") || settings.debug);

    let pool = CredentialPool::new(&settings.api_keys);
    if pool.is_empty() {
        warn!("No API keys configured; scans will fail until HINTLENS_API_KEYS or GEMINI_KEYS is set");
    } else {
        info!("Loaded {} API key(s), model {}", pool.len(), settings.model);
    }

    let backend = GeminiBackend::new(&settings.api_base, settings.request_timeout())?;
    let client = InferenceClient::new(pool, settings.model.clone(), Box::new(backend));
    let scanner = Arc::new(Scanner::new(Arc::new(PrimaryMonitor), client));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hintlens-rt")
        .build()
        .context("Failed to start async runtime")?;

    match matches.subcommand() {
        Some(("serve", sub)) => {
            if let Some(port) = sub.get_one::<u16>("port") {
                settings.server.port = *port;
            }
            runtime.block_on(server::run(&settings.server, scanner))
        }
        Some(("once", _)) => {
            let result = runtime
                .block_on(scanner.scan())
                .context("Scan failed")?;
            println!("{}", result);
            Ok(())
        }
        _ => overlay::run(&settings, scanner, runtime.handle().clone()),
    }
}
