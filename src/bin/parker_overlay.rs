use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use parker_overlay::parker_config::load_pipeline_config;
use parker_overlay::pipeline::{self, RunReport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when the image was written but some series were left out.
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Render the Parker spiral with spacecraft trajectories overlaid"
)]
struct Cli {
    /// Run configuration (TOML, or YAML for any other extension)
    #[arg(long, default_value = "configs/pipeline.toml")]
    config: PathBuf,

    /// Override the output image path from the configuration
    #[arg(long)]
    output: Option<PathBuf>,

    /// Override the plot title
    #[arg(long)]
    title: Option<String>,

    /// Skip the heliospheric current sheet surface
    #[arg(long, default_value_t = false)]
    no_current_sheet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(report) if report.is_partial() => {
            for dropped in &report.dropped {
                warn!(
                    source = %dropped.name,
                    stage = %dropped.error.stage(),
                    error = %dropped.error,
                    "left out of the image"
                );
            }
            println!("{} (partial: {} dropped)", report.output.display(), report.dropped.len());
            ExitCode::from(EXIT_PARTIAL)
        }
        Ok(report) => {
            println!("{}", report.output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let mut config = load_pipeline_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(output) = cli.output {
        config.output.path = output;
    }
    if let Some(title) = cli.title {
        config.render.title = Some(title);
    }
    if cli.no_current_sheet {
        config.current_sheet.enabled = false;
    }

    let report = pipeline::run(&config)?;
    info!(
        output = %report.output.display(),
        trajectories = report.trajectories.len(),
        markers = report.markers,
        dropped = report.dropped.len(),
        "render complete"
    );
    Ok(report)
}
