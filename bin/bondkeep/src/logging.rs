//! Logging setup.

use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::LogArgs;

/// Initialize logging based on command line arguments.
///
/// The filter is built with the following precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise, start with `RUST_LOG` if set, or a level from the verbosity flags
/// 3. Apply any custom directives from `--log.filter`
pub(crate) fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else {
        let base_level = match args.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };

        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(base_level));

        if let Some(custom_filter) = &args.filter {
            for directive in custom_filter.split(',') {
                if let Ok(d) = directive.parse() {
                    filter = filter.add_directive(d);
                }
            }
        }

        filter
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if args.json {
        builder.json().try_init()
    } else {
        builder.without_time().try_init()
    };
    result.map_err(|e| eyre::eyre!("failed to install log subscriber: {e}"))
}
