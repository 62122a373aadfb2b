//! RouteSage command-line entry point

use clap::Parser;
use routesage::cli::{Cli, Command, DEFAULT_CONFIG_FILE, GenerateArgs, generate_config_template};
use routesage::config::Config;
use routesage::export::{self, ExportFormat};
use routesage::llm::Provider;
use routesage::metrics::Metrics;
use routesage::pipeline::{self, Pipeline};
use routesage::telemetry;
use routesage::writeback;
use std::path::Path;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Config { output } => {
            let template = generate_config_template();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)?;
                    eprintln!("Configuration template written to: {}", path.display());
                }
                None => print!("{}", template),
            }
        }
        Command::Providers => print_providers(),
        Command::Formats => {
            for format in ExportFormat::ALL {
                println!(
                    "{:<10} .{:<5} {}",
                    format.as_str(),
                    format.extension(),
                    format.description()
                );
            }
        }
        Command::ClearCache => {
            let config = load_config(cli.config.as_deref())?;
            init_logging(&config, cli.verbose);
            let removed = pipeline::clear_cache(&config.cache).await?;
            println!(
                "Removed {} cached response(s) from {}",
                removed,
                config.cache.resolved_path().display()
            );
        }
        Command::Generate(args) => generate(cli.config.as_deref(), cli.verbose, args).await?,
    }

    Ok(())
}

async fn generate(
    config_path: Option<&Path>,
    verbose: bool,
    args: GenerateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);
    config.validate()?;
    init_logging(&config, verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight work and writing partial output");
            on_interrupt.cancel();
        }
    });

    let metrics = Metrics::new()?;
    let mut pipeline = Pipeline::from_config(config.clone(), args.api_key.clone(), metrics.clone())?
        .with_cancellation(cancel);
    if args.no_cache {
        pipeline = pipeline.without_cache();
    }

    let doc = pipeline.run(&args.path).await?;
    let written = export::export(&doc, config.export.format, &config.export.output_dir)?;
    let write_back = if args.write_back {
        Some(writeback::write_back(&doc.routes)?)
    } else {
        None
    };

    if let Some(metrics_path) = &args.metrics {
        write_metrics(&metrics, metrics_path)?;
    }

    let summary = &doc.summary;
    println!("Documentation written to: {}", written.display());
    println!(
        "Routes: {} found, {} enriched ({} from cache), {} failed, {} skipped",
        summary.routes_found,
        summary.enriched(),
        summary.enriched_from_cache,
        summary.failed,
        summary.skipped
    );
    if !summary.file_warnings.is_empty() {
        println!("Files skipped or partially read: {}", summary.file_warnings.len());
    }
    if let Some(report) = write_back {
        println!(
            "Decorators updated: {} in {} file(s), {} route(s) no longer matched their source",
            report.decorators_updated, report.files_updated, report.unmatched
        );
    }
    Ok(())
}

/// Explicit path, else `./routesage.toml` when present, else defaults
fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => Config::default(),
    };
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.observability.log_level.as_str()
    };
    telemetry::init(level);
}

fn write_metrics(metrics: &Metrics, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::write(path, metrics.gather()?)?;
    tracing::info!(path = %path.display(), "Metrics written");
    Ok(())
}

fn print_providers() {
    for provider in Provider::ALL {
        let key = match provider.api_key_env() {
            Some(var) => var,
            None => "no API key",
        };
        println!(
            "{:<10} default: {:<18} ({})",
            provider.as_str(),
            provider.default_model(),
            key
        );
        if !provider.known_models().is_empty() {
            println!("           models: {}", provider.known_models().join(", "));
        }
    }
}
