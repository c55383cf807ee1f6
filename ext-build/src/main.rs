use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ext_build::{write_plan, BuildEnv, Collaborators, Plan, Platform, Project};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log compiler invocations.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile and link all extension modules.
    Build {
        #[arg(name = "BUILD_TOML", default_value = "build.toml")]
        build_toml: PathBuf,

        /// Number of parallel jobs (all cores when absent).
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Write the resolved build targets as JSON.
    Plan {
        #[arg(name = "BUILD_TOML", default_value = "build.toml")]
        build_toml: PathBuf,

        /// File to write the plan to (stdout when absent).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force-overwrite an existing plan file.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the build.toml file.
    Validate {
        #[arg(name = "BUILD_TOML")]
        build_toml: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Build { build_toml, jobs } => build(build_toml, jobs),
        Commands::Plan {
            build_toml,
            output,
            force,
        } => plan(build_toml, output, force),
        Commands::Validate { build_toml } => validate(build_toml),
    }
}

fn load(build_toml: &Path) -> Result<(Plan, Collaborators)> {
    let platform = Platform::current();
    let project = Project::from_file(build_toml)?;
    let env = BuildEnv::from_env();
    let collaborators = Collaborators::for_project(&project, platform)?;
    let plan = Plan::new(&project, &env, platform, &collaborators)?;
    Ok((plan, collaborators))
}

fn build(build_toml: PathBuf, jobs: Option<usize>) -> Result<()> {
    let (plan, collaborators) = load(&build_toml)?;
    let modules = plan.build(&collaborators, jobs)?;
    info!(
        "Built {} module(s) in {}",
        modules.len(),
        plan.build_dir().to_string_lossy()
    );
    Ok(())
}

fn plan(build_toml: PathBuf, output: Option<PathBuf>, force: bool) -> Result<()> {
    let (plan, _) = load(&build_toml)?;
    let json = plan.to_json()?;

    match output {
        Some(output) => write_plan(&output, &json, force),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn validate(build_toml: PathBuf) -> Result<()> {
    let project = Project::from_file(&build_toml)?;
    Collaborators::for_project(&project, Platform::current())?;
    Ok(())
}
