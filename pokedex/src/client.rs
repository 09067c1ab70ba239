//! `PokeAPI` client implementation

use crate::{Pokemon, PokemonPage, PokedexConfig};
use pagestore_core::{FetchError, FetchFuture, PageFetcher};
use reqwest::Client;

/// `PokeAPI` list client
#[derive(Debug, Clone)]
pub struct PokeApiClient {
    client: Client,
    api_url: String,
}

impl PokeApiClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transport` if the HTTP client cannot be built
    pub fn new(config: &PokedexConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Fetch one page of the Pokémon list
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, non-success statuses, or bodies
    /// that are not a list page
    #[tracing::instrument(skip(self), name = "pokeapi_get_page")]
    pub async fn get_page(&self, limit: i64, offset: i64) -> Result<PokemonPage, FetchError> {
        let response = self
            .client
            .get(format!("{}/pokemon", self.api_url))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let page = response
            .json::<PokemonPage>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(count = page.results.len(), total = page.count, "Fetched page");
        Ok(page)
    }
}

impl PageFetcher<Pokemon> for PokeApiClient {
    fn fetch_page(&self, limit: i64, offset: i64) -> FetchFuture<'_, Pokemon> {
        Box::pin(async move { self.get_page(limit, offset).await.map(|page| page.results) })
    }
}
