//! tracing の初期化
//!
//! 優先順位: RUST_LOG > --log-level > "info"

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::args::LogFormat;

pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout は空けておく（ログはすべて stderr）
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}
