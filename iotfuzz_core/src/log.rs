use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Manual manage the logging behavior of iotfuzz
#[derive(Clone, Debug)]
pub struct Logger {
    level_filter: LevelFilter,
}

impl Logger {
    /// Initializes the global `tracing` subscriber. Log level is INFO or DEBUG if `verbose`
    /// is set. If a subscriber is already installed it is left in place.
    #[must_use]
    pub fn init(verbose: bool) -> Self {
        let level_filter = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        let fmt_logger = tracing_subscriber::fmt::Layer::new()
            .with_target(false)
            .with_filter(level_filter);

        if tracing_subscriber::registry()
            .with(fmt_logger)
            .try_init()
            .is_err()
        {
            tracing::debug!("tracing subscriber already initialized");
        }

        Self { level_filter }
    }

    /// Level of the fmt layer installed by `init`
    #[must_use]
    pub fn level_filter(&self) -> LevelFilter {
        self.level_filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice() {
        assert_eq!(Logger::init(true).level_filter(), LevelFilter::DEBUG);
        // the second subscriber is rejected, the call must not panic
        assert_eq!(Logger::init(false).level_filter(), LevelFilter::INFO);
    }
}
