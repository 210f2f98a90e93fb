//! Europe PMC literature lookup.
//!
//! Fetches a handful of citations per ingredient name. Lookup failures never
//! propagate: an ingredient that cannot be enriched ships with an empty
//! `papers` list.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::models::analysis::PaperRef;

/// How many citations to attach per ingredient.
const MAX_PAPERS: usize = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Europe PMC REST search API.
pub struct ReferenceClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultList")]
    result_list: ResultList,
}

#[derive(Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: Option<String>,
    source: Option<String>,
    title: Option<String>,
}

impl ReferenceClient {
    pub fn new(base_url: &str) -> Result<Self, ReferenceError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Look up citations for an ingredient, degrading to empty on any error.
    pub async fn lookup(&self, ingredient: &str) -> Vec<PaperRef> {
        match self.search(ingredient).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::warn!(
                    ingredient,
                    error = %e,
                    "reference lookup failed, continuing without citations"
                );
                Vec::new()
            }
        }
    }

    async fn search(&self, ingredient: &str) -> Result<Vec<PaperRef>, ReferenceError> {
        let url = format!("{}/search", self.base_url);
        let query = format!("\"{ingredient}\" AND (food OR diet OR nutrition)");

        let response: SearchResponse = self
            .http
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("format", "json"),
                ("pageSize", "3"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let papers = response
            .result_list
            .result
            .into_iter()
            .filter_map(|hit| {
                let title = hit.title?;
                let id = hit.id?;
                let source = hit.source?;
                Some(PaperRef {
                    title,
                    url: format!("https://europepmc.org/article/{source}/{id}"),
                })
            })
            .take(MAX_PAPERS)
            .collect();

        Ok(papers)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("HTTP request to Europe PMC failed: {0}")]
    Http(#[from] reqwest::Error),
}
