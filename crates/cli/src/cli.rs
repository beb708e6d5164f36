//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Queue fan-out relay - copies every message of one queue to several others
#[derive(Parser, Debug)]
#[command(
    name = "queue-fanout",
    author,
    version,
    about = "Fan messages out from one queue to several destination queues",
    long_about = "Consumes a source queue on an AMQP broker and publishes one unmodified \n\
                  copy of every message to each destination queue. Messages without a \n\
                  body are dropped and reported as `Message is empty!`."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "QUEUE_FANOUT_VERBOSE")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "QUEUE_FANOUT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay until Ctrl+C
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective route
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "QUEUE_FANOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the broker URL from configuration
    #[arg(long, env = "QUEUE_FANOUT_BROKER_URL")]
    pub broker_url: Option<String>,

    /// Override the acknowledgement mode from configuration
    #[arg(long, value_enum, env = "QUEUE_FANOUT_ACK_MODE")]
    pub ack_mode: Option<AckModeArg>,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "QUEUE_FANOUT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, env = "QUEUE_FANOUT_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long, env = "QUEUE_FANOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Acknowledgement mode as accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckModeArg {
    /// Broker acknowledges on delivery
    Auto,
    /// Relay acknowledges after dispatch
    AfterDispatch,
}

impl From<AckModeArg> for contracts::AckMode {
    fn from(mode: AckModeArg) -> Self {
        match mode {
            AckModeArg::Auto => Self::Auto,
            AckModeArg::AfterDispatch => Self::AfterDispatch,
        }
    }
}
