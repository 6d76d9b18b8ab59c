//! # Upstream
//!
//! Production clients for the two destinations plus configurable mocks.
//!
//! Responsibilities:
//! - `MySqlStorageClient`: direct inserts and assignment lookups (sqlx pool)
//! - `HttpApiClient`: remote API registration and assignment checks (reqwest)
//! - Mock clients with injectable failures for tests
//!
//! Pool sizing, reconnects and transport-level concerns stay inside this
//! crate; the relay core sees only the `contracts` client traits.

mod api;
mod mock;
mod storage;

pub use api::HttpApiClient;
pub use mock::{MockRemoteApiClient, MockStorageClient};
pub use storage::MySqlStorageClient;
