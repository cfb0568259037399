//! The network boundary.

use crate::error::TransportError;
use crate::types::{ListFeedsResponse, PollRequest, PollResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Performs the two network operations the protocol needs.
///
/// Implementations own the wire (HTTP or otherwise). They should map a
/// missing provider or feed to [`TransportError::NotFound`] and report any
/// other non-success status as [`TransportError::Status`]; the helpers
/// [`decode_poll_response`] and [`decode_list_feeds`] do this for
/// status-plus-body transports.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Fetch the feeds offered at `provider_url`.
    async fn list_feeds(&self, provider_url: &str) -> Result<ListFeedsResponse, TransportError>;

    /// Poll a single feed at `provider_url`.
    async fn poll_feed(
        &self,
        provider_url: &str,
        request: &PollRequest,
    ) -> Result<PollResponse, TransportError>;
}

/// Decode a poll response from an HTTP-like status and body.
pub fn decode_poll_response(status: u16, body: &[u8]) -> Result<PollResponse, TransportError> {
    decode(status, body)
}

/// Decode a list-feeds response from an HTTP-like status and body.
pub fn decode_list_feeds(status: u16, body: &[u8]) -> Result<ListFeedsResponse, TransportError> {
    decode(status, body)
}

fn decode<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, TransportError> {
    match status {
        200..=299 => {
            serde_json::from_slice(body).map_err(|e| TransportError::Malformed(e.to_string()))
        }
        404 => Err(TransportError::NotFound(
            String::from_utf8_lossy(body).into_owned(),
        )),
        _ => Err(TransportError::Status {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }),
    }
}
