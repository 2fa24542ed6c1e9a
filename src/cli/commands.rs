//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::resource::ResourceKind;
use crate::store::DEFAULT_SNAPSHOT_PATH;

/// Halldyll Converge - Declarative reconciliation of application resources.
#[derive(Parser, Debug)]
#[command(name = "halldyll-converge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the application manifest.
    #[arg(short, long, global = true, env = "HALLDYLL_MANIFEST")]
    pub manifest: Option<PathBuf>,

    /// Path to the cluster snapshot file.
    #[arg(long, global = true, env = "HALLDYLL_CLUSTER", default_value = DEFAULT_SNAPSHOT_PATH)]
    pub cluster: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the application manifest.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Show what an apply would change, without writing.
    Plan,

    /// Converge the cluster onto the manifest.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Upgrade ingress routes and secrets from a previously applied manifest.
    Upgrade {
        /// Manifest that was applied before.
        #[arg(long)]
        from: PathBuf,

        /// Stop at the first error instead of skipping the failed entry.
        #[arg(long)]
        abort_on_error: bool,
    },

    /// Show the objects held in the cluster snapshot.
    Status {
        /// Only show objects of this kind.
        #[arg(short, long)]
        kind: Option<KindFilter>,
    },
}

/// Resource kinds accepted by `status --kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum KindFilter {
    /// Tenant namespaces.
    Namespace,
    /// Services.
    Service,
    /// Ingress routes.
    Ingress,
    /// Secrets.
    Secret,
    /// Endpoint sets.
    Endpoints,
    /// Autoscalers.
    Autoscaler,
}

impl From<KindFilter> for ResourceKind {
    fn from(filter: KindFilter) -> Self {
        match filter {
            KindFilter::Namespace => Self::Namespace,
            KindFilter::Service => Self::Service,
            KindFilter::Ingress => Self::Ingress,
            KindFilter::Secret => Self::Secret,
            KindFilter::Endpoints => Self::Endpoints,
            KindFilter::Autoscaler => Self::Autoscaler,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upgrade() {
        let cli = Cli::try_parse_from([
            "halldyll-converge",
            "--manifest",
            "app.yaml",
            "upgrade",
            "--from",
            "old.yaml",
            "--abort-on-error",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.manifest, Some(PathBuf::from("app.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Upgrade {
                abort_on_error: true,
                ..
            }
        ));
    }

    #[test]
    fn test_status_kind_filter() {
        let cli = Cli::try_parse_from(["halldyll-converge", "status", "--kind", "endpoints"])
            .expect("arguments should parse");
        match cli.command {
            Commands::Status { kind: Some(kind) } => {
                assert_eq!(ResourceKind::from(kind), ResourceKind::Endpoints);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
