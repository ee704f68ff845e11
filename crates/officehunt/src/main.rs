//! `hunt` - CLI for officehunt
//!
//! This binary plays the hunt from the command line and runs the local
//! classification endpoint.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use officehunt::camera::{acquire, ImageFileSource, StreamConstraints};
use officehunt::capture::{downsample, CaptureSettings};
use officehunt::classify::{EndpointClassifier, FixedClassifier, GeminiClassifier};
use officehunt::cli::{Cli, Command, ConfigCommand, PlayCommand};
use officehunt::game::{Phase, Resolution};
use officehunt::server::{self, AppState};
use officehunt::{init_logging, Catalog, Classifier, Config, HuntSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(&config, cmd.bind).await,
        Command::Play(cmd) => handle_play(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Summary(cmd) => handle_summary(&config, cmd.json),
        Command::Restart(cmd) => handle_restart(&config, cmd.yes),
        Command::Items(cmd) => handle_items(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_session(config: &Config, classifier: Arc<dyn Classifier>) -> anyhow::Result<HuntSession> {
    HuntSession::open(config, classifier).with_context(|| {
        format!(
            "failed to open hunt at {}",
            config.database_path().display()
        )
    })
}

/// Open the saved hunt for commands that never classify.
fn idle_session(config: &Config) -> anyhow::Result<HuntSession> {
    open_session(config, Arc::new(FixedClassifier::no()))
}

async fn handle_serve(config: &Config, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let addr = match bind {
        Some(addr) => addr,
        None => config
            .server
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind address {}", config.server.bind_addr))?,
    };

    let catalog = Catalog::load_or_builtin(config.game.items_path.as_deref())
        .context("failed to load item catalog")?;
    let classifier = GeminiClassifier::from_config(config)?;
    let state = AppState::new(Arc::new(classifier), catalog);

    server::serve(addr, state, config.server.max_body_bytes)
        .await
        .with_context(|| format!("classification endpoint on {addr} failed"))
}

async fn handle_play(config: &Config, cmd: &PlayCommand) -> anyhow::Result<()> {
    let classifier: Arc<dyn Classifier> = match (cmd.assume, cmd.direct) {
        (Some(assume), _) => Arc::new(FixedClassifier::from(assume)),
        (None, true) => Arc::new(GeminiClassifier::from_config(config)?),
        (None, false) => Arc::new(EndpointClassifier::from_config(config)?),
    };
    let mut session = open_session(config, classifier)?;

    if session.hunt().is_complete() {
        println!("The hunt is already complete. Run `hunt restart --yes` to play again.");
        return Ok(());
    }

    let image = match capture_photo(config, cmd) {
        Ok(image) => image,
        Err(e) if e.is_retryable() => {
            println!("{e}");
            println!("Please try again.");
            return Ok(());
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("failed to capture {}", cmd.image.display())));
        }
    };

    let outcome = session.attempt(&image).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome.resolution {
        Resolution::Found {
            item,
            offline,
            completed_hunt,
        } => {
            println!("Found: {item}");
            if *offline {
                println!("  (offline mode: the photo was accepted without checking)");
            }
            println!(
                "Progress: {}/{} ({}%)",
                outcome.progress.completed, outcome.progress.total, outcome.progress.percentage
            );
            if *completed_hunt {
                println!();
                print!("{}", session.summary());
            } else if let Some(next) = session.current_item() {
                println!("Next: find {}", next.name);
            }
        }
        Resolution::NotFound { item } => {
            println!("That doesn't look like {}. Try again!", outcome.item.prompt_fragment);
            println!("Still looking for: {item}");
        }
    }
    Ok(())
}

fn capture_photo(
    config: &Config,
    cmd: &PlayCommand,
) -> officehunt::Result<officehunt::capture::EncodedImage> {
    let mut camera = acquire(
        ImageFileSource::new(&cmd.image),
        &StreamConstraints::preferred(&config.capture),
    )?;
    let frame = camera.capture()?;
    downsample(&frame, &CaptureSettings::from(&config.capture))
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let session = idle_session(config)?;
    let hunt = session.hunt();
    let progress = session.progress();
    let stats = session.storage().stats()?;

    if json {
        let status = serde_json::json!({
            "phase": hunt.phase(),
            "current_item": session.current_item(),
            "progress": progress,
            "attempts": stats.total_attempts,
            "database_path": session.storage().path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("hunt status");
    println!("-----------");
    match hunt.phase() {
        Phase::NotStarted => println!("Hunt:          Not started"),
        Phase::Complete => println!("Hunt:          Complete"),
        Phase::Presenting { .. } | Phase::Validating { .. } => {
            println!("Hunt:          In progress");
        }
    }
    if let Some(item) = session.current_item() {
        println!("Current item:  {}", item.name);
    }
    println!(
        "Progress:      {}/{} ({}%)",
        progress.completed, progress.total, progress.percentage
    );
    println!(
        "Attempts:      {} ({} offline)",
        stats.total_attempts, stats.offline_attempts
    );
    println!("Database:      {}", session.storage().path().display());
    Ok(())
}

fn handle_summary(config: &Config, json: bool) -> anyhow::Result<()> {
    let summary = idle_session(config)?.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn handle_restart(config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!("This will erase all progress and captured photos.");
        println!("Use --yes to confirm.");
        return Ok(());
    }

    let mut session = idle_session(config)?;
    session.restart().context("failed to restart hunt")?;

    println!("Hunt restarted.");
    if let Some(item) = session.catalog().get(0) {
        println!("First item: {}", item.name);
    }
    Ok(())
}

fn handle_items(config: &Config, json: bool) -> anyhow::Result<()> {
    let catalog = Catalog::load_or_builtin(config.game.items_path.as_deref())
        .context("failed to load item catalog")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    for (index, item) in catalog.items().iter().enumerate() {
        let extra = if index < config.game.target_count {
            ""
        } else {
            " (not hunted)"
        };
        println!("{:>2}. {} [{}]{extra}", index + 1, item.name, item.id);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_addr);
                println!("  Max body bytes:     {}", config.server.max_body_bytes);
                println!();
                println!("[Classifier]");
                println!("  Model:              {}", config.classifier.model);
                println!("  Base URL:           {}", config.classifier.base_url);
                println!(
                    "  API key:            {}",
                    if config.api_key().is_some() {
                        "set"
                    } else {
                        "not set"
                    }
                );
                println!("  Timeout (ms):       {}", config.classifier.timeout_ms);
                println!("  Endpoint URL:       {}", config.classifier.endpoint_url);
                println!();
                println!("[Capture]");
                println!("  Size:               {}", config.capture.size);
                println!("  JPEG quality:       {}", config.capture.jpeg_quality);
                println!(
                    "  Ideal resolution:   {}x{}",
                    config.capture.ideal_width, config.capture.ideal_height
                );
                println!();
                println!("[Game]");
                println!("  Target count:       {}", config.game.target_count);
                println!(
                    "  Items:              {}",
                    config
                        .game
                        .items_path
                        .as_ref()
                        .map_or_else(|| "built-in".to_string(), |p| p.display().to_string())
                );
                println!("  Database path:      {}", config.database_path().display());
                println!("  Photos directory:   {}", config.photos_dir().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
