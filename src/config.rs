use std::time::Duration;

use crate::{poller::PollerThreadConfig, Client, EventSink, Result};

/// Configuration for [`Client`].
///
/// # Examples
/// ```
/// # use molasses::ClientConfig;
/// let mut config = ClientConfig::from_api_key("api-key");
/// config.polling(true).event_sink(|event| {
///     println!("{:?}", event);
/// });
/// let client = config.to_client();
/// ```
pub struct ClientConfig<'a> {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) polling: bool,
    pub(crate) poller: PollerThreadConfig,
    pub(crate) auto_send_events: bool,
    pub(crate) event_sink: Option<Box<dyn EventSink + Send + Sync + 'a>>,
}

impl<'a> ClientConfig<'a> {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://sdk.molasses.app/v1";

    /// Create a default Molasses configuration using the specified API key.
    ///
    /// ```
    /// # use molasses::ClientConfig;
    /// ClientConfig::from_api_key("api-key");
    /// ```
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            polling: false,
            poller: PollerThreadConfig::default(),
            auto_send_events: false,
            event_sink: None,
        }
    }

    /// Override base URL for API calls. Clients should use the default setting unless they run a
    /// self-hosted Molasses.
    pub fn base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = base_url.into();
        self
    }

    /// Poll for features on an interval instead of subscribing to pushed updates.
    pub fn polling(&mut self, polling: bool) -> &mut Self {
        self.polling = polling;
        self
    }

    /// Interval between polls. Defaults to 15 seconds. Only used with [`ClientConfig::polling`].
    pub fn poll_interval(&mut self, interval: Duration) -> &mut Self {
        self.poller.interval = interval;
        self
    }

    /// Randomized duration subtracted from every poll interval. Defaults to zero.
    pub fn poll_jitter(&mut self, jitter: Duration) -> &mut Self {
        self.poller.jitter = jitter;
        self
    }

    /// Send an `experiment_started` event every time a feature is evaluated for a user.
    pub fn auto_send_events(&mut self, auto_send_events: bool) -> &mut Self {
        self.auto_send_events = auto_send_events;
        self
    }

    /// Replace the default analytics uploader, e.g. to forward events to your own pipeline.
    pub fn event_sink(&mut self, event_sink: impl EventSink + Send + Sync + 'a) -> &mut Self {
        self.event_sink = Some(Box::new(event_sink));
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// ```
    /// # use molasses::{ClientConfig, Client};
    /// let client: Client = ClientConfig::from_api_key("api-key").to_client().unwrap();
    /// ```
    pub fn to_client(self) -> Result<Client<'a>> {
        Client::new(self)
    }
}
