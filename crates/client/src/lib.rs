//! neuroscout-client: talks to the Neuroscout API on the wizard's behalf.
//!
//! - [`NeuroscoutApi`] -- the backend as a trait; [`HttpApi`] implements it
//!   over HTTP
//! - [`KeyValueStore`] -- token and bookmark storage ([`FileStore`],
//!   [`MemoryStore`])
//! - [`poll_status`] / [`PollHandle`] -- cancellable status polling
//! - [`Session`] -- runs a wizard against an API

pub mod api;
pub mod error;
pub mod http;
pub mod poll;
pub mod session;
pub mod store;

pub use api::NeuroscoutApi;
pub use error::ClientError;
pub use http::{HttpApi, DEFAULT_BASE_URL};
pub use poll::{poll_status, PollHandle, PollOutcome, DEFAULT_POLL_INTERVAL};
pub use session::{snapshot, Session};
pub use store::{bookmark_key, FileStore, KeyValueStore, MemoryStore, TOKEN_KEY};
