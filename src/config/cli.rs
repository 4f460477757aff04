use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the stereogramaxo binary.
#[derive(Debug, Parser)]
#[command(
    name = "stereogramaxo",
    version,
    about = "Stereogram generation web service"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "STEREOGRAMAXO_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Resolve settings, prepare directories and print the generator command prefix.
    Check(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the generator executable.
    #[arg(long = "generator-program", value_name = "PATH")]
    pub generator_program: Option<PathBuf>,

    /// Replace the leading generator arguments (repeatable).
    #[arg(long = "generator-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub generator_args: Vec<String>,

    /// Override the generator timeout.
    #[arg(long = "generator-timeout-seconds", value_name = "SECONDS")]
    pub generator_timeout_seconds: Option<u64>,

    /// Override the staging directory for uploads.
    #[arg(long = "storage-staging-dir", value_name = "PATH")]
    pub staging_dir: Option<PathBuf>,

    /// Override the generator output directory.
    #[arg(long = "storage-output-dir", value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Override the URL path segment generated images are served under.
    #[arg(long = "storage-public-output-path", value_name = "SEGMENT")]
    pub public_output_path: Option<String>,

    /// Override the maximum request size in bytes.
    #[arg(long = "storage-max-request-bytes", value_name = "BYTES")]
    pub max_request_bytes: Option<u64>,
}
