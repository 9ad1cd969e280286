use async_trait::async_trait;
use events_common::enrich::{GenderGuess, GenderLookup, GenderLookupError};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// `GenderLookup` backed by a genderize.io compatible HTTP service.
pub struct GenderizeClient {
    client: Client,
    url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenderizeResponse {
    gender: Option<String>,
    probability: Option<f64>,
    count: Option<u64>,
}

impl GenderizeClient {
    pub fn new(client: Client, url: Url, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }

    fn request_url(&self, name: &str) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("name", name);
            if let Some(key) = &self.api_key {
                query.append_pair("apikey", key);
            }
        }
        url
    }

    async fn fetch(&self, name: &str) -> Result<GenderGuess, GenderLookupError> {
        let response = self
            .client
            .get(self.request_url(name))
            .send()
            .await
            .map_err(|e| GenderLookupError::Request(e.to_string()))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(GenderLookupError::RateLimited),
            status if !status.is_success() => {
                Err(GenderLookupError::Request(format!("unexpected status {status}")))
            }
            _ => {
                let body: GenderizeResponse = response
                    .json()
                    .await
                    .map_err(|e| GenderLookupError::InvalidResponse(e.to_string()))?;
                Ok(GenderGuess {
                    gender: body.gender,
                    probability: body.probability,
                    count: body.count,
                })
            }
        }
    }
}

#[async_trait]
impl GenderLookup for GenderizeClient {
    async fn lookup(&self, name: &str) -> Result<GenderGuess, GenderLookupError> {
        let result = self.fetch(name).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(GenderLookupError::RateLimited) => "rate_limited",
            Err(_) => "error",
        };
        let labels = [("outcome", outcome.to_string())];
        metrics::counter!("events_gender_lookups", &labels).increment(1);
        debug!(name, outcome, "genderize lookup");

        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer, api_key: Option<&str>) -> GenderizeClient {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let url = Url::parse(&server.url("/")).unwrap();
        GenderizeClient::new(http, url, api_key.map(String::from))
    }

    #[tokio::test]
    async fn test_lookup_parses_guess() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/")
                .query_param("name", "Ana")
                .query_param("apikey", "secret");
            then.status(200).json_body(json!({
                "name": "Ana", "gender": "female", "probability": 0.99, "count": 4321
            }));
        });

        let guess = client(&server, Some("secret")).lookup("Ana").await.unwrap();

        assert_eq!(
            guess,
            GenderGuess {
                gender: Some("female".to_string()),
                probability: Some(0.99),
                count: Some(4321),
            }
        );
        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn test_unknown_name_has_no_gender() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).query_param("name", "Zork");
            then.status(200).json_body(json!({
                "name": "Zork", "gender": null, "probability": 0.0, "count": 0
            }));
        });

        let guess = client(&server, None).lookup("Zork").await.unwrap();

        assert_eq!(guess.gender, None);
    }

    #[tokio::test]
    async fn test_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).query_param("name", "Limit");
            then.status(429).json_body(json!({"error": "Request limit reached"}));
        });
        server.mock(|when, then| {
            when.method(GET).query_param("name", "Broken");
            then.status(200).body("not json");
        });
        let client = client(&server, None);

        assert!(matches!(
            client.lookup("Limit").await,
            Err(GenderLookupError::RateLimited)
        ));
        assert!(matches!(
            client.lookup("Broken").await,
            Err(GenderLookupError::InvalidResponse(_))
        ));
    }
}
