//! A background poller thread that periodically requests features from the server and stores
//! them in the feature store.
use std::{sync::Arc, time::Duration};

use rand::{thread_rng, Rng};

use crate::{
    feature_store::FeatureStore, fetcher::FeatureFetcher, refresh::RefreshThread, Error, Result,
};

/// Interval settings of the poller thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PollerThreadConfig {
    /// Interval to wait between requests for features.
    pub interval: Duration,
    /// Randomized duration subtracted from `interval`, so that many processes started together do
    /// not poll in lockstep.
    pub jitter: Duration,
}

impl PollerThreadConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
    pub const DEFAULT_POLL_JITTER: Duration = Duration::ZERO;
}

impl Default for PollerThreadConfig {
    fn default() -> PollerThreadConfig {
        PollerThreadConfig {
            interval: PollerThreadConfig::DEFAULT_POLL_INTERVAL,
            jitter: PollerThreadConfig::DEFAULT_POLL_JITTER,
        }
    }
}

/// Start a thread that fetches features right away and then once per interval until stopped.
pub(crate) fn start_poller_thread(
    mut fetcher: FeatureFetcher,
    store: Arc<FeatureStore>,
    config: PollerThreadConfig,
) -> Result<RefreshThread> {
    let thread = RefreshThread::spawn("molasses-poller", move |ctx| loop {
        match fetcher.fetch_features() {
            Ok(Some(features)) => {
                store.update(features);
                ctx.report(Ok(()));
            }
            Ok(None) => {
                // Not modified; whatever is stored is current.
                ctx.report(Ok(()));
            }
            Err(err @ Error::Unauthorized) => {
                // Unrecoverable.
                ctx.report(Err(err));
                return;
            }
            Err(err) => {
                log::warn!(target: "molasses", "error refreshing features: {}", err);
            }
        }

        if ctx.wait(jitter(config.interval, config.jitter)) {
            return;
        }
    })?;
    Ok(thread)
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}
