use anyhow::{Context, Result};
use clap::Parser;
use pcmchunk::app::{apply_chunk_args, run_convert, run_serve, run_watch};
use pcmchunk::cli::{Cli, Commands, ConfigAction};
use pcmchunk::config::Config;
use pcmchunk::error::PcmChunkError;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    tracing::debug!(version = %pcmchunk::version_string(), "starting");

    match cli.command {
        #[cfg(feature = "cpal-audio")]
        Commands::Record {
            device,
            duration,
            output,
            chunk,
        } => {
            let config = apply_chunk_args(load_config(cli.config.as_deref())?, &chunk);
            pcmchunk::app::run_record(&config, device, duration, &output, cli.quiet)?;
        }
        Commands::Convert {
            input,
            frame_len,
            output,
            chunk,
        } => {
            let config = apply_chunk_args(load_config(cli.config.as_deref())?, &chunk);
            run_convert(&config, &input, frame_len, &output, cli.quiet)
                .with_context(|| format!("converting {}", input.display()))?;
        }
        Commands::Serve {
            input,
            output,
            chunk,
        } => {
            let config = apply_chunk_args(load_config(cli.config.as_deref())?, &chunk);
            let stdin = std::io::stdin();
            run_serve(&config, input, &output, stdin.lock(), cli.quiet)?;
        }
        Commands::Watch => {
            let summary = run_watch(std::io::stdin().lock())?;
            println!(
                "{} chunk(s), {} bytes; {} other message(s), {} malformed line(s)",
                summary.chunks, summary.bytes, summary.ignored, summary.malformed
            );
        }
        #[cfg(feature = "cpal-audio")]
        Commands::Devices => {
            list_audio_devices()?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-q`/`-v` pick the level.
fn init_tracing(quiet: bool, verbose: u8) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "pcmchunk=debug,info",
        (false, _) => "pcmchunk=trace,debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose >= 2)
                .with_thread_names(verbose >= 2),
        )
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/pcmchunk/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        if !path.exists() {
            return Err(PcmChunkError::ConfigFileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        Config::load(path).with_context(|| format!("loading {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

/// List available audio input devices.
#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = pcmchunk::audio::capture::list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            if let Err(e) = config.validate() {
                eprintln!("Warning: {}", e);
            }
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                eprintln!(
                    "Config already exists at {} (use --force to overwrite)",
                    config_path.display()
                );
                std::process::exit(1);
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(&config_path, Config::default().to_toml()?)
                .with_context(|| format!("writing {}", config_path.display()))?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}
