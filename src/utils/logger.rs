use crate::config::LoggerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn build_filter(config: &LoggerConfig, verbose: bool) -> EnvFilter {
    let default_directive = if verbose {
        format!("batch_relay=debug,{}", config.level)
    } else {
        config.level.clone()
    };

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

pub fn init_logger(config: &LoggerConfig, verbose: bool) {
    let filter = build_filter(config, verbose);

    let base = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // 格式與輸出目標的組合型別不同，統一裝箱
    let layer = match (config.format.as_str(), config.sink.as_str()) {
        ("json", "stderr") => base.json().with_writer(std::io::stderr).boxed(),
        ("json", _) => base.json().boxed(),
        (_, "stderr") => base.compact().with_writer(std::io::stderr).boxed(),
        _ => base.compact().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_crate_level() {
        let config = LoggerConfig::default();
        let filter = build_filter(&config, true);
        if std::env::var("RUST_LOG").is_err() {
            assert!(filter.to_string().contains("batch_relay=debug"));
        }
    }
}
