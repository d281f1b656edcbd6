use clap::{Parser, Subcommand};
use cli::JobFile;
use color_eyre::eyre::Result;
use mask_geometry::{MaskCommand, MaskManager};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the mask jobs listed in a job file
    Run {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        job: PathBuf,
        /// Write the per-job metrics as JSON to this path
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Print the JSON schema of mask commands
    Schema,
    /// List the available commands and their parameters
    Commands,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { job, report } => run_jobs(job, report.as_deref())?,
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&MaskCommand::schema())?);
        }
        Commands::Commands => list_commands()?,
    }

    Ok(())
}

fn run_jobs(job_path: &Path, report_path: Option<&Path>) -> Result<()> {
    let job_file = JobFile::from_file(job_path)?;
    info!("Loaded {} jobs from {:?}", job_file.jobs.len(), job_path);

    let manager = MaskManager::new();
    let mut reports = Vec::with_capacity(job_file.jobs.len());
    for job in &job_file.jobs {
        info!("Running job '{}' ({}) -> {}", job.name, job.command, job.output);
        let report = job.run(&manager)?;
        info!(
            "Job '{}': mask {}x{} centered at ({}, {}) on a {}x{} canvas",
            report.name,
            report.width,
            report.height,
            report.center_x,
            report.center_y,
            report.canvas_width,
            report.canvas_height
        );
        if let Some(flag) = report.flag {
            info!("Job '{}': flag = {}", report.name, flag);
        }
        if let Some(ratio) = report.ratio {
            info!(
                "Job '{}': grow {} px, blur {} px",
                report.name, ratio.grow_pixels, ratio.blur_pixels
            );
        }
        reports.push(report);
    }

    if let Some(path) = report_path {
        std::fs::write(path, serde_json::to_string_pretty(&reports)?)?;
        info!("Report saved to: {:?}", path);
    }
    info!("Finished {} jobs", reports.len());
    Ok(())
}

fn list_commands() -> Result<()> {
    for command in MaskCommand::all_defaults() {
        println!("{command}: {}", command.description());
        for (param, help, required) in command.parameters_info() {
            let marker = if required { " (required)" } else { "" };
            println!("    {param}{marker}: {help}");
        }
    }
    Ok(())
}
