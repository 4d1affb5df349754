//! Jumpship CLI - deploy catalog models to managed inference endpoints.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use commands::ModelOverrides;

#[derive(Parser)]
#[command(name = "jumpship")]
#[command(about = "Deploy pretrained catalog models to managed inference endpoints")]
#[command(version)]
struct Cli {
    /// Configuration file, layered over ./jumpship.toml
    #[arg(short, long, global = true, env = "JUMPSHIP_CONFIG")]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an endpoint for the configured model
    Deploy {
        #[command(flatten)]
        overrides: ModelOverrides,

        /// Return once creation is submitted instead of waiting for the endpoint
        #[arg(long)]
        no_wait: bool,
    },

    /// Resolve artifacts and print the model descriptor without deploying
    Resolve {
        #[command(flatten)]
        overrides: ModelOverrides,
    },

    /// Show the status of an endpoint
    Status {
        /// Endpoint name
        name: String,
    },

    /// Delete an endpoint with its configuration and model
    Delete {
        /// Endpoint name
        name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Deploy { overrides, no_wait } => {
            commands::deploy::run(config, &overrides, no_wait).await
        }
        Commands::Resolve { overrides } => commands::resolve::run(config, &overrides).await,
        Commands::Status { name } => commands::status::run(config, &name).await,
        Commands::Delete { name } => commands::delete::run(config, &name).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn deploy_flags() {
        let cli = Cli::try_parse_from([
            "jumpship",
            "--config",
            "prod.toml",
            "deploy",
            "--model-id",
            "model-txt2img-stabilityai-stable-diffusion-v1-4",
            "--instance-type",
            "ml.g5.2xlarge",
            "--instance-count",
            "2",
            "--no-wait",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));
        match cli.command {
            Commands::Deploy { overrides, no_wait } => {
                assert!(no_wait);
                assert_eq!(
                    overrides.model_id.as_deref(),
                    Some("model-txt2img-stabilityai-stable-diffusion-v1-4")
                );
                assert_eq!(overrides.instance_type.as_deref(), Some("ml.g5.2xlarge"));
                assert_eq!(overrides.instance_count, Some(2));
                assert_eq!(overrides.model_version, None);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["jumpship", "status", "my-endpoint", "--quiet"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Status { name } if name == "my-endpoint"));
    }

    #[test]
    fn delete_requires_name() {
        assert!(Cli::try_parse_from(["jumpship", "delete"]).is_err());
    }
}
