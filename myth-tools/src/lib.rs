//! Shared scaffolding for the `myth-tools` command-line front-ends: the
//! common `--host`/`--port`/`--rcvbuf`/`--verbose` argument set and the
//! logger each binary builds from it. The front-ends themselves are thin —
//! almost everything they do is a single call into `myth-client`.

use clap::{App, Arg};
use myth_client::{Logger, CONTROL_RCVBUF, DEFAULT_PORT};

/// Options every tool in this crate accepts.
pub struct CommonOpts {
    pub host: String,
    pub port: u16,
    pub rcvbuf: usize,
    pub verbose: bool,
}

/// Add the common flag set to a clap `App`. Tools add their own
/// subcommand-specific args on top of this.
pub fn with_common_args<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("host")
            .short("H")
            .long("host")
            .value_name("HOST")
            .help("Backend hostname or address")
            .default_value("localhost")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("port")
            .short("p")
            .long("port")
            .value_name("PORT")
            .help("Backend control port")
            .default_value("6543")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .help("Raise the logger to debug level"),
    )
}

/// Pull `CommonOpts` out of parsed matches, matching the defaults declared
/// by [`with_common_args`].
pub fn parse_common(matches: &clap::ArgMatches<'_>) -> CommonOpts {
    let host = matches.value_of("host").unwrap_or("localhost").to_string();
    let port: u16 = matches
        .value_of("port")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let verbose = matches.is_present("verbose");

    CommonOpts { host, port, rcvbuf: CONTROL_RCVBUF, verbose }
}

/// Build a terminal logger at `debug` (when `--verbose`) or `info` level.
pub fn build_logger(verbose: bool) -> Logger {
    let level = if verbose { "debug" } else { "info" };
    let toml = format!(
        r#"
type = "terminal"
level = "{}"
destination = "stderr"
"#,
        level
    );

    myth_proto::logging::from_config_str(&toml).unwrap_or_else(|_| myth_client::default_logger())
}

/// Print `message` to stderr and exit with status 1 — the uniform failure
/// path every tool in this crate funnels into.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {}", message);
    std::process::exit(1);
}
