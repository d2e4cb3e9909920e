//! The Rust SDK for Molasses, a feature flagging and experimentation platform.
//!
//! # Overview
//!
//! The SDK revolves around a [`Client`] that keeps a local copy of all [`Feature`]s and decides
//! whether a feature is active for a [`User`], where each user has a unique id and key-value
//! params associated with it. Evaluation happens entirely in memory: features are rolled out to a
//! stable percentage of users, and segments force particular users in or out based on their
//! params.
//!
//! Features are kept fresh by a background thread, either subscribed to pushed updates (the
//! default) or polling on an interval. Call [`Client::start`] to begin and [`Client::stop`] to
//! end it.
//!
//! The client can also report experiment exposures and goals as analytics [`Event`]s. By default
//! they are uploaded to Molasses; provide an [`EventSink`] to send them elsewhere.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum. They only surface from client construction,
//! [`Client::start`] and [`Client::wait_for_features`]. Feature evaluation never fails: an unknown
//! feature, or a constraint that cannot be checked, simply counts as inactive.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages under the `molasses` target. Consider integrating a `log`-compatible logger
//! implementation for better visibility into SDK operations.
//!
//! # Examples
//!
//! ```no_run
//! # use molasses::{ClientConfig, User};
//! let client = ClientConfig::from_api_key("api-key").to_client()?;
//! client.start()?;
//! client.wait_for_features()?;
//!
//! let user = User::new("1234").with_param("isBetaUser", true);
//! if client.is_active("NEW_CHECKOUT", Some(&user)) {
//!     // ...
//! }
//! # Ok::<(), molasses::Error>(())
//! ```

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod eval;
mod events;
mod feature;
mod feature_store;
mod fetcher;
mod poller;
mod refresh;
mod rules;
mod sharder;
mod stream;
#[cfg(test)]
mod test_server;
mod user;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use eval::{Branch, Evaluation};
pub use events::{Event, EventSink, EXPERIMENT_STARTED, EXPERIMENT_SUCCESS};
pub use feature::{
    Constraint, ConstraintMode, Feature, Operator, Segment, SegmentType, UserParamType,
};
pub use user::{AttributeValue, Attributes, User};
