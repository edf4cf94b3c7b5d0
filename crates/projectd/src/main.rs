//! `projectd`: drives the project orchestrator from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use project_orchestration::ProjectType;
use std::path::PathBuf;
use tracing::Level;

mod commands;

#[derive(Parser)]
#[command(name = "projectd")]
#[command(about = "Project lifecycle orchestrator")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "projectd.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the repository into the store and ensure the baseline projects,
    /// retrying until the repository answers
    Bootstrap,

    /// List projects
    List {
        /// Only projects of this type (normal, templates, kamelets, services)
        #[arg(short = 't', long = "type")]
        project_type: Option<ProjectType>,

        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Import one project folder from the repository
    Import {
        /// Project id (folder name)
        project: String,
    },

    /// Commit and push a project
    Commit {
        /// Project id
        project: String,

        /// Commit message
        #[arg(short, long)]
        message: String,
    },

    /// Start the dev-mode container of a project
    Run {
        /// Project id
        project: String,

        /// Options passed to the dev-mode runtime
        #[arg(short, long, default_value = "")]
        options: String,
    },

    /// Build the image of a project
    Build {
        /// Project id
        project: String,

        /// Image tag, generated from the current time when omitted
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Point a project's runtime descriptor at an image
    SetImage {
        /// Project id
        project: String,

        /// Image reference
        image: String,

        /// Commit and push the change
        #[arg(long)]
        commit: bool,

        /// Commit message
        #[arg(short, long, default_value = "Set image")]
        message: String,
    },

    /// Print the host port of a project
    Port {
        /// Project id
        project: String,
    },

    /// Print the container status of a project
    Status {
        /// Project id
        project: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Bootstrap => commands::bootstrap::run(&cli.config).await,
            Commands::List {
                project_type,
                format,
            } => commands::projects::list(&cli.config, project_type, &format).await,
            Commands::Import { project } => commands::projects::import(&cli.config, &project).await,
            Commands::Commit { project, message } => {
                commands::projects::commit(&cli.config, &project, &message).await
            }
            Commands::Run { project, options } => {
                commands::runtime::run(&cli.config, &project, &options).await
            }
            Commands::Build { project, tag } => {
                commands::runtime::build(&cli.config, &project, tag.as_deref()).await
            }
            Commands::SetImage {
                project,
                image,
                commit,
                message,
            } => {
                commands::projects::set_image(&cli.config, &project, &image, commit, &message)
                    .await
            }
            Commands::Port { project } => commands::projects::port(&cli.config, &project).await,
            Commands::Status { project } => commands::runtime::status(&cli.config, &project).await,
        }
    })
}
