//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::NonZeroUsize,
    path::{Component, Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "stereogramaxo";
const ENV_PREFIX: &str = "STEREOGRAMAXO";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_GENERATOR_PROGRAM: &str = "python3";
const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 120;
const DEFAULT_STAGING_DIR: &str = "staging";
const DEFAULT_OUTPUT_DIR: &str = "out";
const DEFAULT_PUBLIC_OUTPUT_PATH: &str = "out";
const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub generator: GeneratorSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub program: PathBuf,
    /// Placed before the per-request arguments, typically the generator script.
    pub args: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub public_output_path: String,
    pub max_request_bytes: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(environment());

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) | Some(Command::Check(args)) => {
            raw.apply_serve_overrides(&args.overrides)
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// `STEREOGRAMAXO__SECTION__KEY` variables; `generator.args` is a comma-separated list.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("generator.args")
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    generator: RawGeneratorSettings,
    storage: RawStorageSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGeneratorSettings {
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    staging_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    public_output_path: Option<String>,
    max_request_bytes: Option<u64>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(program) = overrides.generator_program.as_ref() {
            self.generator.program = Some(program.clone());
        }
        if !overrides.generator_args.is_empty() {
            self.generator.args = Some(overrides.generator_args.clone());
        }
        if let Some(seconds) = overrides.generator_timeout_seconds {
            self.generator.timeout_seconds = Some(seconds);
        }
        if let Some(dir) = overrides.staging_dir.as_ref() {
            self.storage.staging_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.output_dir.as_ref() {
            self.storage.output_dir = Some(dir.clone());
        }
        if let Some(path) = overrides.public_output_path.as_ref() {
            self.storage.public_output_path = Some(path.clone());
        }
        if let Some(limit) = overrides.max_request_bytes {
            self.storage.max_request_bytes = Some(limit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            generator,
            storage,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            generator: build_generator_settings(generator)?,
            storage: build_storage_settings(storage)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid("server.port", "port must be greater than zero"));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = non_zero_secs(
        server.graceful_shutdown_seconds,
        DEFAULT_GRACEFUL_SHUTDOWN_SECS,
        "server.graceful_shutdown_seconds",
    )?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_generator_settings(
    generator: RawGeneratorSettings,
) -> Result<GeneratorSettings, LoadError> {
    let program = generator
        .program
        .unwrap_or_else(|| PathBuf::from(DEFAULT_GENERATOR_PROGRAM));
    if program.as_os_str().is_empty() {
        return Err(LoadError::invalid("generator.program", "must not be empty"));
    }

    let timeout_secs = non_zero_secs(
        generator.timeout_seconds,
        DEFAULT_GENERATOR_TIMEOUT_SECS,
        "generator.timeout_seconds",
    )?;

    Ok(GeneratorSettings {
        program,
        args: generator.args.unwrap_or_default(),
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let RawStorageSettings {
        staging_dir,
        output_dir,
        public_output_path,
        max_request_bytes,
    } = storage;

    let staging_dir = non_empty_dir(staging_dir, DEFAULT_STAGING_DIR, "storage.staging_dir")?;
    let output_dir = non_empty_dir(output_dir, DEFAULT_OUTPUT_DIR, "storage.output_dir")?;

    let public_output_path =
        public_output_path.unwrap_or_else(|| DEFAULT_PUBLIC_OUTPUT_PATH.to_string());
    let public_output_path = public_output_path.trim().trim_matches('/').to_string();
    if !is_single_segment(&public_output_path) {
        return Err(LoadError::invalid(
            "storage.public_output_path",
            format!("`{public_output_path}` must be a single path segment"),
        ));
    }

    let limit = max_request_bytes.unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let limit: usize = limit.try_into().map_err(|_| {
        LoadError::invalid(
            "storage.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;
    let max_request_bytes = NonZeroUsize::new(limit).ok_or_else(|| {
        LoadError::invalid("storage.max_request_bytes", "must be greater than zero")
    })?;

    Ok(StorageSettings {
        staging_dir,
        output_dir,
        public_output_path,
        max_request_bytes,
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_secs(value: Option<u64>, default: u64, key: &'static str) -> Result<u64, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        secs => Ok(secs),
    }
}

fn non_empty_dir(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let dir = value.unwrap_or_else(|| PathBuf::from(default));
    if dir.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(dir)
}

fn is_single_segment(segment: &str) -> bool {
    if segment.is_empty() || segment.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
