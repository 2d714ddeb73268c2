//! Blocking JSON-over-HTTP client shared by the network capability backends.

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A single service URL that accepts a JSON POST and answers with JSON.
#[derive(Debug, Clone)]
pub struct JsonEndpoint {
    client: reqwest::blocking::Client,
    url: String,
}

impl JsonEndpoint {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POSTs `body` and decodes the response. Non-2xx statuses are errors.
    pub fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, body: &B) -> Result<R> {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}
