//! Logging utilities and configuration for timely-report.
//!
//! Report runs, row materialization, data-source queries and cache I/O all
//! emit `tracing` events. [`LogConfig`] controls how chatty the hot paths are;
//! [`setup::init_logging`] wires a subscriber for binaries and tests.

use tracing::Level;

/// Logging switches for report evaluation.
///
/// Cell-level logging runs once per (row, column) pair, so production setups
/// usually turn it off.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Most verbose level emitted from cell-level code paths
    pub level: Level,
    /// Log every cache hit and write
    pub log_cache_io: bool,
    /// Log the text of every data-source query
    pub log_queries: bool,
    /// Logged queries are cut after this many bytes
    pub max_query_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_cache_io: false,
            log_queries: true,
            max_query_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on, long queries kept.
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            log_cache_io: true,
            log_queries: true,
            max_query_length: 2048,
        }
    }

    /// Warnings only; no per-query or per-cell events.
    pub fn quiet() -> Self {
        Self {
            level: Level::WARN,
            log_cache_io: false,
            log_queries: false,
            max_query_length: 128,
        }
    }

    /// Returns true if cell-level debug events should be emitted.
    pub fn debug_enabled(&self) -> bool {
        self.level >= Level::DEBUG
    }
}

/// Emits a `debug!` event only when the [`LogConfig`] level allows it.
///
/// Arguments are not evaluated otherwise.
#[macro_export]
macro_rules! cell_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Emits a `debug!` event for cache traffic when enabled.
#[macro_export]
macro_rules! log_cache_io {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_cache_io {
            tracing::debug!($($arg)*);
        }
    };
}

/// Emits an `info!` event describing a source query when enabled.
#[macro_export]
macro_rules! log_query {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_queries {
            tracing::info!($($arg)*);
        }
    };
}

/// Shortens a query for logging, noting how many bytes were dropped.
pub fn truncate_query(query: &str, max_length: usize) -> String {
    if query.len() <= max_length {
        return query.to_string();
    }
    let mut end = max_length;
    while !query.is_char_boundary(end) {
        end -= 1;
    }
    format!("{} [+{} bytes]", &query[..end], query.len() - end)
}

/// Subscriber installation for binaries.
pub mod setup {
    use tracing::Level;
    use tracing_subscriber::util::TryInitError;

    /// Which events reach the process-wide subscriber, and how they look.
    #[derive(Debug, Clone)]
    pub struct SubscriberConfig {
        /// Level for every target other than this crate
        pub default_level: Level,
        /// Level for the `timely_report` target
        pub crate_level: Level,
        /// Emit one JSON object per event
        pub json: bool,
        /// Raw `EnvFilter` directives replacing the two levels
        pub directives: Option<String>,
    }

    impl Default for SubscriberConfig {
        fn default() -> Self {
            Self {
                default_level: Level::INFO,
                crate_level: Level::DEBUG,
                json: false,
                directives: None,
            }
        }
    }

    impl SubscriberConfig {
        /// JSON lines; warnings from dependencies, info from the crate.
        pub fn production() -> Self {
            Self {
                default_level: Level::WARN,
                crate_level: Level::INFO,
                json: true,
                directives: None,
            }
        }

        pub fn with_default_level(mut self, level: Level) -> Self {
            self.default_level = level;
            self
        }

        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        pub fn with_json(mut self, json: bool) -> Self {
            self.json = json;
            self
        }

        /// Uses `directives` verbatim, e.g. `"warn,timely_report::cache=trace"`.
        pub fn with_directives(mut self, directives: impl Into<String>) -> Self {
            self.directives = Some(directives.into());
            self
        }

        /// Filter directives handed to `EnvFilter`.
        pub fn filter_directives(&self) -> String {
            match &self.directives {
                Some(directives) => directives.clone(),
                None => format!(
                    "{},timely_report={}",
                    self.default_level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs the global `tracing` subscriber.
    ///
    /// `RUST_LOG`, when set and valid, wins over the configured directives.
    /// Fails if a global subscriber is already installed.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use timely_report::logging::setup::{init_logging, SubscriberConfig};
    ///
    /// init_logging(&SubscriberConfig::default().with_json(true)).unwrap();
    /// ```
    pub fn init_logging(config: &SubscriberConfig) -> Result<(), TryInitError> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));
        let output = match config.json {
            true => tracing_subscriber::fmt::layer().json().boxed(),
            false => tracing_subscriber::fmt::layer().boxed(),
        };

        tracing_subscriber::registry().with(filter).with(output).try_init()
    }
}
