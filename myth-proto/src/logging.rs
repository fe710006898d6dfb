//! Debug/trace output is routed through a caller-supplied `slog::Logger`
//! rather than a global printf-style debug level: every `Connection` is
//! handed a `Logger` at construction time, and callers that want silence
//! simply pass [`discard`].

pub use slog::{debug, error, info, o, trace, warn, Logger};

use sloggers::Config;

/// A logger that drops everything. The default when a caller does not care
/// to observe protocol traffic.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Build a logger from a `sloggers`-flavored TOML config, e.g.:
///
/// ```toml
/// type = "terminal"
/// level = "debug"
/// destination = "stderr"
/// ```
pub fn from_config_str(toml: &str) -> Result<Logger, serdeconv::Error> {
    let config: sloggers::LoggerConfig = serdeconv::from_toml_str(toml)?;
    config.build_logger().map_err(|err| {
        serdeconv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discard_logger_does_not_panic() {
        let log = discard();
        info!(log, "unobserved"; "field" => 1);
    }

    #[test]
    fn test_from_config_str_builds_terminal_logger() {
        let log = from_config_str(
            r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
        )
        .unwrap();

        debug!(log, "constructed");
    }
}
