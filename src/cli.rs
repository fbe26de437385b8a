//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;

/// Apply declarative YAML configuration to a running application.
#[derive(Parser, Debug)]
#[command(name = "casc", version, about, long_about = None)]
pub struct Cli {
    /// Define a property, e.g. `-D casc.config=/etc/casc`. Repeatable.
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", global = true)]
    pub define: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns the log level based on verbosity flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one load cycle and print the resulting state.
    Apply {
        /// Print JSON instead of YAML.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Describe the available configurators.
    Describe {
        /// Only list root configurators.
        #[arg(long, default_value = "false")]
        roots: bool,

        /// Print JSON instead of text.
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Load the configuration, then serve the admin endpoint until stopped.
    Serve(ServeArgs),
}

/// Arguments for the serve subcommand.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address of the admin endpoint.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,

    /// Token administrators present as `Authorization: Bearer <token>`.
    #[arg(long, env = "CASC_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Reload automatically when configuration files change.
    #[arg(long, default_value = "false")]
    pub watch: bool,
}
