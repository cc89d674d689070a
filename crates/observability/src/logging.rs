//! Subscriber initialisation.

use eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use crate::LogArgs;

/// Build the filter for `args`.
///
/// Precedence:
/// 1. `--quiet` shows errors only
/// 2. otherwise `RUST_LOG` if set, else a level from the `-v` count
/// 3. `--log.filter` directives are added on top
pub fn build_filter(args: &LogArgs) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let base_level = match args.verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base_level));

    if let Some(custom) = &args.filter {
        for directive in custom.split(',').filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(error) => eprintln!("ignoring log directive {directive:?}: {error}"),
            }
        }
    }
    filter
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = build_filter(args);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match (args.json, args.timestamps) {
        (true, _) => builder.json().try_init(),
        (false, true) => builder.try_init(),
        (false, false) => builder.without_time().try_init(),
    };
    installed.map_err(|error| eyre!("failed to initialise logging: {error}"))
}
