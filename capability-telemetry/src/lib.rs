//! Observability setup for binaries built on the capability engine.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support {
    //! Structured tracing helpers.

    use tracing_subscriber::EnvFilter;

    /// Directive used when neither `RUST_LOG` nor the caller supplies one.
    pub const DEFAULT_FILTER: &str = "info";

    /// Builds the filter: `RUST_LOG` when set and valid, `fallback` otherwise.
    #[must_use]
    pub fn env_filter(fallback: &str) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(fallback))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    /// Installs a global fmt subscriber writing to stderr.
    ///
    /// Returns `false` when a global subscriber was already installed; the
    /// existing one is kept.
    pub fn init(fallback: &str) -> bool {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(env_filter(fallback))
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(fallback, "tracing subscriber installed");
        }
        installed
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn second_init_is_a_no_op() {
            let _ = init("debug");
            assert!(!init("debug"));
        }

        #[test]
        fn invalid_fallback_uses_default() {
            let filter = env_filter("not==a=filter");
            assert!(!filter.to_string().is_empty());
        }
    }
}
