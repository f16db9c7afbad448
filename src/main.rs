//! k6gen CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use k6gen::{RunOptions, Runner};

#[derive(Parser)]
#[command(name = "k6gen")]
#[command(about = "Generate and run k6 load tests from YAML configurations", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a k6 script from a config and run it
    Run {
        /// Path to config YAML file
        #[arg(short, long)]
        config: PathBuf,

        /// Directory for the generated script and results
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        /// Generate the script without executing k6
        #[arg(long)]
        dry_run: bool,

        /// Keep the generated script after the run
        #[arg(long)]
        keep_script: bool,
    },

    /// Generate a k6 script without running it
    Generate {
        /// Path to config YAML file
        #[arg(short, long)]
        config: PathBuf,

        /// Path for the generated script
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate a config file
    Validate {
        /// Path to config YAML file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List available config files in a directory
    List {
        /// Configs directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            dry_run,
            keep_script,
        } => {
            Runner::run(
                &config,
                &RunOptions {
                    output_dir,
                    dry_run,
                    keep_script,
                },
            )?;
            Ok(())
        }
        Commands::Generate { config, output } => {
            Runner::generate(&config, &output)?;
            Ok(())
        }
        Commands::Validate { config } => {
            Runner::validate(&config)?;
            Ok(())
        }
        Commands::List { dir } => {
            println!("Available configs in {}:", dir.display());
            println!();

            match std::fs::read_dir(&dir) {
                Ok(entries) => {
                    let mut configs = Vec::new();

                    for entry in entries.flatten() {
                        let path = entry.path();
                        let ext = path.extension().and_then(|s| s.to_str());
                        if ext == Some("yaml") || ext == Some("yml") {
                            if let Ok(config) = k6gen::LoadTestConfig::from_file(&path) {
                                configs.push((
                                    path.file_name()
                                        .map(|n| n.to_string_lossy().to_string())
                                        .unwrap_or_default(),
                                    config.name,
                                    config.description.unwrap_or_default(),
                                ));
                            }
                        }
                    }

                    configs.sort_by(|a, b| a.0.cmp(&b.0));

                    if configs.is_empty() {
                        println!("No config files found");
                    } else {
                        for (filename, name, description) in configs {
                            println!("  {filename} - {name}");
                            if !description.is_empty() {
                                println!("    {description}");
                            }
                            println!();
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error reading directory: {e}");
                    eprintln!("Make sure the directory exists and is readable");
                }
            }

            Ok(())
        }
    }
}
