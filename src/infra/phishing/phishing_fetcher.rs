// Fetches the community-maintained phishing domain lists and swaps them
// into the shared state the phishing detector reads.
//
// Source: nikolaischunk/discord-phishing-links. `domain-list.json` holds
// confirmed phishing domains, `suspicious-list.json` lookalikes.

use crate::core::automod::PhishingLists;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use thiserror::Error;

const GUARANTEED_URL: &str =
    "https://raw.githubusercontent.com/nikolaischunk/discord-phishing-links/main/domain-list.json";
const SUSPICIOUS_URL: &str =
    "https://raw.githubusercontent.com/nikolaischunk/discord-phishing-links/main/suspicious-list.json";

#[derive(Debug, Error)]
pub enum PhishingFetchError {
    #[error("phishing list request failed: {0}")]
    Http(String),

    #[error("phishing list lock poisoned")]
    Lock,
}

#[derive(Debug, Deserialize)]
struct DomainList {
    domains: Vec<String>,
}

pub struct PhishingListFetcher {
    client: reqwest::Client,
    lists: Arc<RwLock<PhishingLists>>,
}

impl PhishingListFetcher {
    pub fn new(lists: Arc<RwLock<PhishingLists>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            lists,
        }
    }

    /// Fetch both lists and swap them in under a single write lock.
    /// Returns (guaranteed, suspicious) domain counts for logging.
    pub async fn refresh(&self) -> Result<(usize, usize), PhishingFetchError> {
        let guaranteed = self.fetch_domains(GUARANTEED_URL).await?;
        let suspicious = self.fetch_domains(SUSPICIOUS_URL).await?;
        let counts = (guaranteed.len(), suspicious.len());

        let mut lists = self.lists.write().map_err(|_| PhishingFetchError::Lock)?;
        *lists = PhishingLists {
            suspicious,
            guaranteed,
        };
        Ok(counts)
    }

    async fn fetch_domains(&self, url: &str) -> Result<Vec<String>, PhishingFetchError> {
        let list: DomainList = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PhishingFetchError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| PhishingFetchError::Http(e.to_string()))?
            .json()
            .await
            .map_err(|e| PhishingFetchError::Http(e.to_string()))?;

        Ok(normalize(list.domains))
    }
}

/// The detector compares lowercased content, so stored domains must be
/// lowercase too.
fn normalize(domains: Vec<String>) -> Vec<String> {
    domains
        .into_iter()
        .map(|d| d.trim().to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_published_list_format() {
        let json = r#"{"domains": ["Discorcl.com", " free-nitro.example ", ""]}"#;
        let list: DomainList = serde_json::from_str(json).unwrap();
        assert_eq!(
            normalize(list.domains),
            vec!["discorcl.com".to_string(), "free-nitro.example".to_string()]
        );
    }
}
