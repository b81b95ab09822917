pub mod universalis_client;

pub use universalis_client::UniversalisClient;

use crate::domain::errors::NetworkError;
use crate::domain::logging::{LogComponent, get_logger};
use gloo_net::http::Request;
use serde::de::DeserializeOwned;

/// Thin JSON-over-GET client built on gloo-net.
#[derive(Debug, Clone)]
pub struct GlooHttpClient {
    base_url: String,
    default_headers: Vec<(String, String)>,
}

impl GlooHttpClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers: vec![("Accept".to_string(), "application/json".to_string())],
        }
    }

    pub fn add_header(mut self, key: &str, value: &str) -> Self {
        self.default_headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    /// GET `endpoint` and decode the body as `T`.
    pub async fn get_json<T>(&self, endpoint: &str) -> Result<T, NetworkError>
    where
        T: DeserializeOwned,
    {
        let url = self.url_for(endpoint);
        get_logger().debug(LogComponent::Infrastructure("HTTP"), &format!("GET {url}"));

        let mut request = Request::get(&url);
        for (key, value) in &self.default_headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::HttpRequestFailed(format!("{e:?}")))?;

        if !response.ok() {
            let error = NetworkError::HttpStatus {
                status: response.status(),
                text: response.status_text(),
            };
            get_logger().error(LogComponent::Infrastructure("HTTP"), &error.to_string());
            return Err(error);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| NetworkError::InvalidResponse(format!("{e:?}")))
    }
}
