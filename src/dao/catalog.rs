//! Candidate catalog boundary: the external service that knows which movies
//! each user has not watched yet.

use std::error::Error;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One catalog entry: the shape returned per user by the candidate source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Stable catalog identifier of the movie.
    pub candidate_id: i64,
    /// Display title.
    pub title: String,
    /// Poster/image reference, when the catalog provides one.
    pub poster_ref: Option<String>,
}

/// Error raised by candidate source implementations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog could not be queried.
    #[error("catalog lookup failed: {message}")]
    Lookup {
        /// Human readable description of the failed lookup.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl CatalogError {
    /// Construct a lookup error from any backend failure.
    pub fn lookup(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        CatalogError::Lookup {
            message,
            source: Box::new(source),
        }
    }
}

/// Abstraction over the per-user unwatched-candidate lookup.
pub trait CandidateSource: Send + Sync {
    /// Unwatched candidates for the given user, in the catalog's order.
    fn unwatched_for(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, Result<Vec<CandidateRecord>, CatalogError>>;
}

/// Candidate source that serves the configured fallback pool to every user.
///
/// Used when no catalog service is wired up; the bracket builder treats the
/// resulting candidates as contributed by both participants' requests, so a
/// tournament can still run end to end.
pub struct FallbackCatalog {
    pool: Vec<CandidateRecord>,
}

impl FallbackCatalog {
    /// Build a catalog serving the given pool.
    pub fn new(pool: Vec<CandidateRecord>) -> Self {
        Self { pool }
    }
}

impl CandidateSource for FallbackCatalog {
    fn unwatched_for(
        &self,
        _user_id: Uuid,
    ) -> BoxFuture<'static, Result<Vec<CandidateRecord>, CatalogError>> {
        let pool = self.pool.clone();
        Box::pin(async move { Ok(pool) })
    }
}

/// HTTP-backed candidate source querying `GET {base}/users/{id}/unwatched`.
#[cfg(feature = "http-catalog")]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "http-catalog")]
impl HttpCatalog {
    /// Build a client against the given catalog base URL.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[cfg(feature = "http-catalog")]
impl CandidateSource for HttpCatalog {
    fn unwatched_for(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, Result<Vec<CandidateRecord>, CatalogError>> {
        let client = self.client.clone();
        let url = format!("{}/users/{user_id}/unwatched", self.base_url);

        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|source| {
                    CatalogError::lookup(format!("request to `{url}` failed"), source)
                })?;

            response.json::<Vec<CandidateRecord>>().await.map_err(|source| {
                CatalogError::lookup(format!("malformed catalog payload from `{url}`"), source)
            })
        })
    }
}
