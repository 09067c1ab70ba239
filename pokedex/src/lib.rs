//! # Pokedex
//!
//! A pagestore deployment that pages through the `PokeAPI` Pokémon list.
//!
//! - [`Pokemon`]: the list item type
//! - [`PokeApiClient`]: `reqwest`-backed [`PageFetcher`](pagestore_core::PageFetcher)
//! - [`PokedexConfig`]: configuration from `POKEDEX_*` environment variables
//!
//! ## Example
//!
//! ```no_run
//! use pokedex::{PokeApiClient, PokedexConfig};
//! use pagestore_runtime::Store;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PokedexConfig::from_env()?;
//! let store = Store::new(PokeApiClient::new(&config)?)?;
//!
//! let _sub = store.items().subscribe(|page| {
//!     for pokemon in page.iter() {
//!         println!("{}", pokemon.name);
//!     }
//! });
//! store.request_load();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;

pub use client::PokeApiClient;
pub use config::{ConfigError, PokedexConfig};

use serde::{Deserialize, Serialize};

/// One entry of the Pokémon list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    /// Species name, e.g. `bulbasaur`
    pub name: String,
    /// Detail resource URL
    pub url: String,
}

impl Pokemon {
    /// National dex number, parsed from the resource URL
    ///
    /// ```
    /// use pokedex::Pokemon;
    ///
    /// let pokemon = Pokemon {
    ///     name: "ivysaur".into(),
    ///     url: "https://pokeapi.co/api/v2/pokemon/2/".into(),
    /// };
    /// assert_eq!(pokemon.id(), Some(2));
    /// ```
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse().ok())
    }
}

/// One page of the list endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PokemonPage {
    /// Total number of entries
    pub count: u64,
    /// URL of the next page, if any
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any
    #[serde(default)]
    pub previous: Option<String>,
    /// Entries on this page
    pub results: Vec<Pokemon>,
}
