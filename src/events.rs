//! Analytics events and their delivery to the Molasses API.
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};

use reqwest::{header::AUTHORIZATION, Url};
use serde::{Deserialize, Serialize};

use crate::{
    fetcher::{bearer, endpoint_url},
    Attributes, Branch, Result,
};

/// Name of the event sent when a user is exposed to an experiment.
pub const EXPERIMENT_STARTED: &str = "experiment_started";
/// Name of the event sent when a user reaches the goal of an experiment.
pub const EXPERIMENT_SUCCESS: &str = "experiment_success";

const ANALYTICS_ENDPOINT: &str = "/analytics";
const QUEUE_CAPACITY: usize = 1024;

/// An analytics event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event name, e.g. [`EXPERIMENT_STARTED`].
    pub event: String,
    /// Id of the user the event is about.
    pub user_id: String,
    /// Id of the feature, for experiment events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    /// Key of the feature, for experiment events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,
    /// Branch the user was in, for experiment events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_type: Option<Branch>,
    /// User attributes merged with caller-supplied details.
    pub tags: Attributes,
}

/// A destination for analytics events.
///
/// The client calls `send` on the thread that evaluated a feature, so implementations must not
/// block. Failures should be handled (or logged) by the implementation.
///
/// # Examples
///
/// ```
/// # use molasses::ClientConfig;
/// let mut config = ClientConfig::from_api_key("api-key");
/// config.event_sink(|event| {
///     println!("{:?}", event);
/// });
/// ```
pub trait EventSink {
    /// Deliver `event`.
    fn send(&self, event: Event);
}

impl<T: Fn(Event)> EventSink for T {
    fn send(&self, event: Event) {
        self(event);
    }
}

/// Uploads events to the analytics endpoint from a dedicated thread.
///
/// Events are queued without blocking. When the queue is full, new events are dropped. Dropping
/// the uploader lets the thread exit once the queue is drained.
pub(crate) struct EventUploader {
    sender: SyncSender<Event>,
}

impl EventUploader {
    pub fn start(base_url: &str, api_key: &str) -> Result<EventUploader> {
        let url = endpoint_url(base_url, ANALYTICS_ENDPOINT)?;
        let authorization = bearer(api_key);
        let client = reqwest::blocking::Client::new();
        let (sender, receiver) = std::sync::mpsc::sync_channel::<Event>(QUEUE_CAPACITY);

        std::thread::Builder::new()
            .name("molasses-events".to_owned())
            .spawn(move || upload_loop(&client, &url, &authorization, receiver))?;

        Ok(EventUploader { sender })
    }
}

impl EventSink for EventUploader {
    fn send(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!(target: "molasses", event:serde; "analytics queue is full, dropping event");
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!(target: "molasses", "analytics thread is gone, dropping event");
            }
        }
    }
}

fn upload_loop(
    client: &reqwest::blocking::Client,
    url: &Url,
    authorization: &str,
    receiver: Receiver<Event>,
) {
    for event in receiver {
        log::trace!(target: "molasses", event:serde; "uploading event");
        let result = client
            .post(url.clone())
            .header(AUTHORIZATION, authorization)
            .json(&event)
            .send()
            .and_then(|response| response.error_for_status());
        if let Err(err) = result {
            log::warn!(target: "molasses", "error uploading event to analytics endpoint: {}", err);
        }
    }
    log::debug!(target: "molasses", "analytics thread exited");
}
