use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use classcraft::{Config, Downloader, HttpClient, Session, TerminalView};

fn cli() -> Command {
    let file_arg = Arg::new("file")
        .value_name("FILE")
        .help("CSV file with student records")
        .required(true);
    let download_arg = Arg::new("download")
        .long("download")
        .help("Save the generated file once the link is available")
        .action(clap::ArgAction::SetTrue);

    Command::new("classcraft")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Upload student rosters to ClassCraft for class sorting or MAP scores")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file to use instead of the default search path")
                .global(true),
        )
        .arg(
            Arg::new("server")
                .short('s')
                .long("server")
                .value_name("URL")
                .help("Base URL of the ClassCraft service")
                .global(true),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for downloaded files")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("sort")
                .about("Sort students into classes")
                .arg(file_arg.clone())
                .arg(
                    Arg::new("num-classes")
                        .short('n')
                        .long("num-classes")
                        .value_name("NUM")
                        .help("How many classes are available for students")
                        .allow_hyphen_values(true),
                )
                .arg(download_arg.clone()),
        )
        .subcommand(
            Command::new("score")
                .about("Add MAP scores (average of math_score and reading_score)")
                .arg(file_arg)
                .arg(download_arg),
        )
        .subcommand(
            Command::new("download")
                .about("Download a file from a link returned by the service")
                .arg(
                    Arg::new("url")
                        .value_name("URL")
                        .help("Download link")
                        .required(true),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => {
            let mut config = Config::from_file(&PathBuf::from(path))
                .with_context(|| format!("Failed to load config from {}", path))?;
            config.apply_env();
            config
        }
        None => Config::load()?,
    };

    if let Some(server) = matches.get_one::<String>("server") {
        config.server.base_url = server.clone();
    }
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output.download_dir = PathBuf::from(dir);
    }

    config.validate()?;
    Ok(config)
}

type LogHandle = reload::Handle<EnvFilter, Registry>;

fn log_filter(verbose: bool, level: &str) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("classcraft={},warn", level)))
}

/// Start logging before the config is read; the configured level is applied
/// afterwards through the returned handle
fn init_logging(verbose: bool) -> LogHandle {
    let (filter, handle) = reload::Layer::new(log_filter(verbose, "info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(verbose).with_writer(std::io::stderr))
        .init();
    handle
}

/// Render session events until the session is dropped
fn spawn_renderer(session: &Session) -> JoinHandle<()> {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        let mut view = TerminalView::new(std::io::stdout());
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = view.render(&event) {
                        debug!("Failed to render event: {}", e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} progress events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn run_flow(config: Config, sub: &ArgMatches, sort: bool) -> Result<ExitCode> {
    let file = sub.get_one::<String>("file").map(PathBuf::from).unwrap_or_default();
    let download = sub.get_flag("download");

    let client = HttpClient::new(config.clone())?;
    let session = Session::new(Arc::new(client));
    let renderer = spawn_renderer(&session);

    // A path that cannot be opened leaves the selection empty, like
    // dismissing the file picker
    if let Err(e) = session.select_file(&file).await {
        tracing::warn!("{}", e);
    }

    let message = if sort {
        let num_classes = sub.get_one::<String>("num-classes").cloned().unwrap_or_default();
        session.set_num_classes(&num_classes).await;
        session.submit_sort().await
    } else {
        session.submit_compute_score().await
    };

    let state = session.snapshot().await;
    drop(session);
    renderer.await?;

    // The renderer has already printed the status line
    if let Some(kind) = message.failure_kind() {
        debug!("{} flow ended with {:?}", if sort { "sort" } else { "score" }, kind);
        return Ok(ExitCode::from(kind.exit_code()));
    }

    if download {
        if let Some(offer) = state.download_offer() {
            let downloader = Downloader::new(&config)?;
            let saved = downloader.fetch(&offer.url).await?;
            println!("Saved {} ({} bytes)", saved.path.display(), saved.bytes);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    let verbose = matches.get_flag("verbose");
    let log_handle = init_logging(verbose);

    let config = load_config(&matches)?;
    if let Err(e) = log_handle.reload(log_filter(verbose, &config.logging.level)) {
        debug!("Keeping startup log filter: {}", e);
    }

    info!("🚀 ClassCraft client starting...");
    debug!("{}", config.summary());

    match matches.subcommand() {
        Some(("sort", sub)) => run_flow(config, sub, true).await,
        Some(("score", sub)) => run_flow(config, sub, false).await,
        Some(("download", sub)) => {
            let url = sub
                .get_one::<String>("url")
                .context("download link is required")?;
            let downloader = Downloader::new(&config)?;
            let saved = downloader.fetch(url).await?;
            println!("Saved {} ({} bytes)", saved.path.display(), saved.bytes);
            Ok(ExitCode::SUCCESS)
        }
        _ => unreachable!("subcommand is required"),
    }
}
