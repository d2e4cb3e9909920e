use std::sync::{Arc, Mutex};

use crate::{
    events::{EventUploader, EXPERIMENT_STARTED, EXPERIMENT_SUCCESS},
    feature_store::FeatureStore,
    fetcher::{endpoint_url, FeatureFetcher},
    poller::{start_poller_thread, PollerThreadConfig},
    refresh::RefreshThread,
    stream::{self, start_stream_thread},
    Attributes, ClientConfig, Error, Evaluation, Event, EventSink, Result, User,
};

/// A client for Molasses.
///
/// The client keeps a local copy of all features and evaluates them without any network round
/// trip. Call [`Client::start`] to begin fetching features in the background, then
/// [`Client::wait_for_features`] if you need them to be loaded before serving traffic.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// # Examples
/// ```
/// # use molasses::{Client, ClientConfig, User};
/// let client = Client::new(ClientConfig::from_api_key("api-key")).unwrap();
/// // Not started yet, so no feature is known.
/// assert!(!client.is_active("NEW_CHECKOUT", Some(&User::new("1234"))));
/// ```
pub struct Client<'a> {
    store: Arc<FeatureStore>,
    api_key: String,
    base_url: String,
    polling: bool,
    poller: PollerThreadConfig,
    auto_send_events: bool,
    event_sink: Box<dyn EventSink + Send + Sync + 'a>,
    refresh: Mutex<Option<RefreshThread>>,
}

impl<'a> Client<'a> {
    /// Create a new `Client` using the specified configuration.
    ///
    /// Unless an event sink was configured, this starts the thread uploading analytics events.
    /// Features are not fetched until [`Client::start`] is called.
    pub fn new(config: ClientConfig<'a>) -> Result<Self> {
        Client::with_store(config, Arc::new(FeatureStore::new()))
    }

    fn with_store(config: ClientConfig<'a>, store: Arc<FeatureStore>) -> Result<Self> {
        let ClientConfig {
            api_key,
            base_url,
            polling,
            poller,
            auto_send_events,
            event_sink,
        } = config;

        if api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }
        endpoint_url(&base_url, "")?;

        let event_sink = match event_sink {
            Some(event_sink) => event_sink,
            None => Box::new(EventUploader::start(&base_url, &api_key)?),
        };

        Ok(Client {
            store,
            api_key,
            base_url,
            polling,
            poller,
            auto_send_events,
            event_sink,
            refresh: Mutex::new(None),
        })
    }

    /// Start fetching features in the background, by polling or by subscribing to updates
    /// depending on [`ClientConfig::polling`].
    ///
    /// Calling `start` on a running client does nothing.
    pub fn start(&self) -> Result<()> {
        let mut refresh = self
            .refresh
            .lock()
            .map_err(|_| Error::RefreshThreadPanicked)?;
        if refresh.is_some() {
            log::debug!(target: "molasses", "client is already started");
            return Ok(());
        }

        let thread = if self.polling {
            let fetcher = FeatureFetcher::new(&self.base_url, &self.api_key)?;
            start_poller_thread(fetcher, self.store.clone(), self.poller)?
        } else {
            start_stream_thread(
                &self.base_url,
                &self.api_key,
                self.store.clone(),
                stream::READ_TIMEOUT,
            )?
        };
        log::info!(target: "molasses", polling = self.polling; "started refreshing features");
        *refresh = Some(thread);
        Ok(())
    }

    /// Stop refreshing features. Features already loaded stay available.
    ///
    /// This function does not wait for the background thread to exit. Calling it more than once
    /// is harmless.
    pub fn stop(&self) {
        if let Some(thread) = self.take_refresh_thread() {
            thread.stop();
        }
    }

    /// Stop refreshing features and block until the background thread exits.
    pub fn shutdown(&self) -> Result<()> {
        match self.take_refresh_thread() {
            Some(thread) => thread.shutdown(),
            None => Ok(()),
        }
    }

    fn take_refresh_thread(&self) -> Option<RefreshThread> {
        match self.refresh.lock() {
            Ok(mut refresh) => refresh.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Block until features have been loaded for the first time.
    ///
    /// Returns an error if the client is not started, or if the background thread gave up
    /// before loading features (e.g. [`Error::Unauthorized`]).
    pub fn wait_for_features(&self) -> Result<()> {
        if self.store.is_initialized() {
            return Ok(());
        }

        // Waiting must not hold the lock, otherwise `stop` would block.
        let ready = {
            let refresh = self
                .refresh
                .lock()
                .map_err(|_| Error::RefreshThreadPanicked)?;
            match refresh.as_ref() {
                Some(thread) => thread.ready().clone(),
                None => return Err(Error::NotStarted),
            }
        };
        ready.wait()
    }

    /// Whether features have been loaded from the server at least once.
    pub fn is_initiated(&self) -> bool {
        self.store.is_initialized()
    }

    /// Evaluate feature `key` for `user`. Returns `None` if the feature is unknown.
    ///
    /// Without a user, an active feature is on for everybody.
    pub fn evaluate(&self, key: &str, user: Option<&User>) -> Option<Evaluation> {
        let Some(feature) = self.store.get(key) else {
            log::warn!(target: "molasses",
                       feature_key = key,
                       initiated = self.is_initiated();
                       "evaluating a feature that does not exist");
            return None;
        };
        Some(feature.evaluate(user))
    }

    /// Return `true` if feature `key` is active for `user`. Unknown features are inactive.
    ///
    /// When [`ClientConfig::auto_send_events`] is enabled and a user is given, an
    /// `experiment_started` event is sent as well.
    pub fn is_active(&self, key: &str, user: Option<&User>) -> bool {
        let Some(evaluation) = self.evaluate(key, user) else {
            return false;
        };

        if self.auto_send_events {
            if let Some(user) = user {
                self.send_experiment_event(EXPERIMENT_STARTED, &evaluation, user, &Attributes::new());
            }
        }

        evaluation.active
    }

    /// Report that `user` was exposed to feature `key`. `additional` details are merged over the
    /// user's params.
    ///
    /// Nothing is sent before features are loaded, or if the feature is unknown.
    pub fn experiment_started(&self, key: &str, user: &User, additional: &Attributes) {
        self.experiment_event(EXPERIMENT_STARTED, key, user, additional);
    }

    /// Report that `user` reached the goal of the experiment on feature `key`. `additional`
    /// details are merged over the user's params.
    ///
    /// Nothing is sent before features are loaded, or if the feature is unknown.
    pub fn experiment_success(&self, key: &str, user: &User, additional: &Attributes) {
        self.experiment_event(EXPERIMENT_SUCCESS, key, user, additional);
    }

    /// Send a custom event named `event_name` for `user`.
    pub fn track(&self, event_name: &str, user: &User, additional: &Attributes) {
        self.send(Event {
            event: event_name.to_owned(),
            user_id: user.id.clone(),
            feature_id: None,
            feature_name: None,
            test_type: None,
            tags: tags(user, additional),
        });
    }

    fn experiment_event(&self, name: &str, key: &str, user: &User, additional: &Attributes) {
        if !self.is_initiated() {
            log::debug!(target: "molasses", event = name, feature_key = key; "features are not loaded, skipping event");
            return;
        }
        let Some(evaluation) = self.evaluate(key, Some(user)) else {
            return;
        };
        self.send_experiment_event(name, &evaluation, user, additional);
    }

    fn send_experiment_event(
        &self,
        name: &str,
        evaluation: &Evaluation,
        user: &User,
        additional: &Attributes,
    ) {
        self.send(Event {
            event: name.to_owned(),
            user_id: user.id.clone(),
            feature_id: Some(evaluation.feature_id.clone()),
            feature_name: Some(evaluation.feature_key.clone()),
            test_type: Some(evaluation.branch),
            tags: tags(user, additional),
        });
    }

    fn send(&self, event: Event) {
        log::trace!(target: "molasses", event:serde; "sending event");
        self.event_sink.send(event);
    }
}

impl Drop for Client<'_> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tags(user: &User, additional: &Attributes) -> Attributes {
    let mut tags = user.params.clone();
    tags.extend(additional.iter().map(|(k, v)| (k.clone(), v.clone())));
    tags
}
