use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. Logs go to stderr, stdout is left for the
/// decoded output.
///
/// `levels` is an `EnvFilter` directive, e.g. `info` or `sflow=debug`.
pub fn init(color: bool, json: bool, levels: &str) {
    let filter = match EnvFilter::try_new(levels) {
        Ok(filter) => filter,
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("invalid log level {levels:?}, {err}");
            }

            EnvFilter::new("info")
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_ansi(color)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // tests might init more than once
    let _ = if json {
        builder.json().finish().try_init()
    } else {
        builder.finish().try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice() {
        init(false, false, "sflow=debug");
        init(false, true, "not a [valid directive");
        tracing::debug!(message = "still works");
    }
}
