//! A background thread that keeps a server-sent events connection open and applies every pushed
//! features payload to the feature store.
use std::{
    io::{BufRead, BufReader},
    sync::Arc,
    time::Duration,
};

use rand::{thread_rng, Rng};
use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    StatusCode, Url,
};

use crate::{
    feature::FeaturesResponse,
    feature_store::FeatureStore,
    fetcher::{bearer, endpoint_url},
    refresh::{RefreshContext, RefreshThread},
    Error, Result,
};

const STREAM_ENDPOINT: &str = "/event-stream";
const STREAM_NAME: &str = "messages";

/// Longest a single read on the stream blocks. A quiet connection notices a stop request within
/// this long. Also bounds the wait for response headers.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Reconnect delays, growing exponentially.
#[derive(Debug, Clone)]
struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    /// Fraction of the delay randomly added or removed.
    randomization: f64,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Backoff {
        let initial = Duration::from_millis(500);
        Backoff {
            initial,
            max: Duration::from_secs(60),
            multiplier: 1.5,
            randomization: 0.5,
            current: initial,
        }
    }
}

impl Backoff {
    fn reset(&mut self) {
        self.current = self.initial;
    }

    fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = base.mul_f64(self.multiplier).min(self.max);
        let delta = base.mul_f64(self.randomization);
        let low = base.saturating_sub(delta);
        thread_rng().gen_range(low..=base + delta)
    }
}

/// Incremental parser of a `text/event-stream` body. Feed it lines; it returns the `data` of an
/// event once the blank line terminating it arrives.
#[derive(Debug, Default)]
struct EventParser {
    data: Vec<String>,
}

impl EventParser {
    fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            let data = self.data.join("\n");
            self.data.clear();
            return Some(data);
        }
        if line.starts_with(':') {
            // Comment, used by servers as a keep-alive.
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_owned());
        }
        None
    }
}

/// Start a thread that subscribes to feature updates and reconnects until stopped.
pub(crate) fn start_stream_thread(
    base_url: &str,
    api_key: &str,
    store: Arc<FeatureStore>,
    read_timeout: Duration,
) -> Result<RefreshThread> {
    let mut url = endpoint_url(base_url, STREAM_ENDPOINT)?;
    url.query_pairs_mut().append_pair("stream", STREAM_NAME);
    let authorization = bearer(api_key);

    // The blocking client applies its timeout to every read of the body, not to the whole
    // response.
    let client = reqwest::blocking::Client::builder()
        .timeout(read_timeout)
        .build()?;

    let thread = RefreshThread::spawn("molasses-stream", move |ctx| {
        let mut backoff = Backoff::default();
        loop {
            match subscribe(&client, &url, &authorization, &store, ctx, &mut backoff) {
                Ok(()) => {
                    log::info!(target: "molasses", "event stream closed");
                }
                Err(err @ Error::Unauthorized) => {
                    log::warn!(target: "molasses", "client is not authorized. Check your API key");
                    ctx.report(Err(err));
                    return;
                }
                Err(err) => {
                    log::warn!(target: "molasses", "event stream disconnected: {}", err);
                }
            }
            if ctx.is_stopped() {
                return;
            }

            let delay = backoff.next_delay();
            log::debug!(target: "molasses", delay:debug; "reconnecting to event stream");
            if ctx.wait(delay) {
                return;
            }
        }
    })?;
    Ok(thread)
}

/// Hold one connection open and apply events until it closes or a stop is requested.
fn subscribe(
    client: &reqwest::blocking::Client,
    url: &Url,
    authorization: &str,
    store: &FeatureStore,
    ctx: &RefreshContext,
    backoff: &mut Backoff,
) -> Result<()> {
    let response = client
        .get(url.clone())
        .header(AUTHORIZATION, authorization)
        .header(ACCEPT, "text/event-stream")
        .send()?;

    match response.status() {
        StatusCode::OK => {}
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(Error::Unauthorized),
        status => return Err(Error::UnexpectedStatus(status)),
    }

    log::info!(target: "molasses", "connected to event stream");
    backoff.reset();

    let mut reader = BufReader::new(response);
    let mut parser = EventParser::default();
    // Bytes of the current line. Kept across timed out reads, which may end mid-line.
    let mut line = Vec::new();
    loop {
        if ctx.is_stopped() {
            return Ok(());
        }
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                let text = String::from_utf8_lossy(&line).into_owned();
                line.clear();
                let data = parser.push_line(text.trim_end_matches('\n'));
                if let Some(data) = data {
                    apply_event(&data, store, ctx);
                }
            }
            Err(err) if is_timeout(&err) => {}
            Err(err) => return Err(err.into()),
        }
    }
}

fn is_timeout(err: &std::io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
        .is_some_and(reqwest::Error::is_timeout)
}

fn apply_event(data: &str, store: &FeatureStore, ctx: &RefreshContext) {
    match serde_json::from_str::<FeaturesResponse>(data) {
        Ok(response) => {
            store.update(response.into_features());
            ctx.report(Ok(()));
        }
        Err(err) => {
            log::warn!(target: "molasses", "error refreshing features: {}", err);
        }
    }
}
