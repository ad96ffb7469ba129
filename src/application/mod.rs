// Application layer - orchestration between callers and the account store.
// The service is stateless apart from the limit cache, which only ever
// holds immutable data.

mod cache;
pub mod error;
mod service;

pub use cache::*;
pub use error::*;
pub use service::*;
