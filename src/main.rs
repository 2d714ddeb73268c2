use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use voxparse::app::{self, ConsumeOptions};
use voxparse::cli::{Cli, Commands, ConfigAction, TopicsAction};
use voxparse::codec::decode_parsed;
use voxparse::config::Config;
use voxparse::transport::{LogRecord, LogTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Run { create_topics } => {
            let config = load_config(cli.config.as_deref(), cli.log_dir)?;
            let report = app::run_service(config, create_topics)
                .await
                .context("voxparse run failed")?;

            for (partition, stats) in &report.partitions {
                tracing::info!(
                    partition,
                    recognized = stats.recognized,
                    translated = stats.translated,
                    unrecognized = stats.unrecognized,
                    dropped = stats.dropped,
                    malformed = stats.malformed,
                    "partition summary"
                );
            }
            if !report.is_clean() {
                for failure in &report.failures {
                    eprintln!("voxparse: {} halted: {}", failure.station, failure.message);
                }
                if report.detached_threads > 0 {
                    eprintln!(
                        "voxparse: {} worker thread(s) did not stop in time",
                        report.detached_threads
                    );
                }
                std::process::exit(1);
            }
        }
        Commands::Topics { action } => {
            let config = load_config(cli.config.as_deref(), cli.log_dir)?;
            handle_topics_command(action, &config)?;
        }
        Commands::Produce { file, topic } => {
            let config = load_config(cli.config.as_deref(), cli.log_dir)?;
            let log = app::open_log(&config)?;
            let topic = topic.unwrap_or_else(|| config.topics.input.clone());
            let count = app::produce_file(&log, &topic, &file)
                .with_context(|| format!("Failed to produce {}", file.display()))?;
            if !cli.quiet {
                println!("Produced {} command(s) to {}", count, topic);
            }
        }
        Commands::Consume {
            topics,
            follow,
            idle,
            group,
            commit,
            json,
        } => {
            let config = load_config(cli.config.as_deref(), cli.log_dir)?;
            let log = app::open_log(&config)?;
            let topics = if topics.is_empty() {
                vec![
                    config.topics.recognized.clone(),
                    config.topics.unrecognized.clone(),
                ]
            } else {
                topics
            };
            let options = ConsumeOptions {
                group,
                follow,
                idle,
                commit,
            };
            app::consume(&log, &topics, &options, |record| {
                print_record(record, json)
            })?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref(), cli.log_dir)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "voxparse", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Install the tracing subscriber. `RUST_LOG` directives win over the flags.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxparse/config.toml)
/// 3. Built-in defaults
///
/// Environment overrides apply on top, then `--log-dir`.
fn load_config(custom_path: Option<&Path>, log_dir: Option<PathBuf>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::default(),
        },
    };

    let mut config = config.with_env_overrides()?;
    if let Some(dir) = log_dir {
        config.transport.log_dir = dir;
    }
    config.validate()?;
    Ok(config)
}

fn handle_topics_command(action: TopicsAction, config: &Config) -> Result<()> {
    match action {
        TopicsAction::Create { partitions } => {
            let log = voxparse::transport::FileLog::create(&config.transport.log_dir)?;
            let partitions = partitions.unwrap_or(config.transport.partitions);
            for (name, count) in app::create_topics(&log, &config.topics, partitions)? {
                println!("{} ({} partitions)", name, count);
            }
        }
        TopicsAction::List => {
            let log = app::open_log(config)?;
            let mut names = vec![config.topics.input.as_str()];
            names.extend(config.topics.outputs());
            for name in names {
                match log.partitions(name) {
                    Ok(count) => println!("{} ({} partitions)", name.green(), count),
                    Err(_) => println!("{} {}", name.red(), "(missing)".dimmed()),
                }
            }
        }
    }
    Ok(())
}

fn handle_config_command(
    action: ConfigAction,
    custom_path: Option<&Path>,
    log_dir: Option<PathBuf>,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path, log_dir)?;
            print!("{}", app::render_config(&config)?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .or_else(Config::default_path)
                .context("No configuration directory on this platform")?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn print_record(record: &LogRecord, json: bool) {
    if json {
        println!("{}", String::from_utf8_lossy(&record.value));
        return;
    }

    let location = format!("{}/{}@{}", record.topic, record.partition, record.offset);
    match decode_parsed(&record.value) {
        Ok(parsed) => println!(
            "{} {} {:?} [{} {:.3}]",
            location.dimmed(),
            parsed.id.bold(),
            parsed.text,
            parsed.language,
            parsed.confidence
        ),
        Err(_) => println!(
            "{} {} {}",
            location.dimmed(),
            record.key.as_deref().unwrap_or("-").bold(),
            String::from_utf8_lossy(&record.value).yellow()
        ),
    }
}
