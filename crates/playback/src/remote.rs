//! HTTP client for the server's stream negotiation endpoint

use crate::services::{NegotiationApi, NegotiationRequest, NegotiationResponse, TokenProvider};
use async_trait::async_trait;
use earshot_core::Result;
use earshot_network::Client;
use std::sync::Arc;

/// Path of the negotiation endpoint, relative to the server base URL
pub const PREPARE_PATH: &str = "/playback/prepare";

/// [`NegotiationApi`] backed by `POST {base_url}/playback/prepare`
pub struct HttpNegotiationApi {
    client: Client,
    endpoint: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpNegotiationApi {
    pub fn new(client: Client, base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), PREPARE_PATH),
            tokens,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NegotiationApi for HttpNegotiationApi {
    async fn prepare(&self, request: &NegotiationRequest) -> Result<NegotiationResponse> {
        let token = self.tokens.token();
        log::trace!(
            "Negotiating file {} of book {}",
            request.file_id,
            request.book_id
        );

        let response: NegotiationResponse = self
            .client
            .post_json(&self.endpoint, request, token.as_deref())
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StaticTokenProvider;

    #[test]
    fn test_endpoint_joins_base_url() {
        let tokens = Arc::new(StaticTokenProvider::new(None));
        let api = HttpNegotiationApi::new(Client::new().unwrap(), "https://books.example/api/", tokens);
        assert_eq!(api.endpoint(), "https://books.example/api/playback/prepare");
    }
}
