use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides `--log-level` with a full filter directive.
pub const LOG_ENV: &str = "H4LINK_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn build_filter(level: LogLevel, env_override: Option<&str>) -> EnvFilter {
    env_override
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_directive()))
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let env_override = std::env::var(LOG_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, env_override.as_deref()))
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
