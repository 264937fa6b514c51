//! Outbound side: the third-party JSON API and the envelope every call yields.

pub mod envelope;
pub mod upstream;

pub use envelope::Envelope;
pub use upstream::{RequestOptions, UpstreamClient};
