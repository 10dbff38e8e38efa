//! Signed HTTP exchange shared by the service backends.

use reqwest::{Client, Method, Url};
use tracing::trace;

use crate::credentials::Credentials;
use crate::sigv4::{self, SigningParams};

/// Everything a backend needs from a finished exchange. Status and the
/// service's error type are kept apart from the body so each service can
/// map failures onto its own error enum.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Value of `x-amzn-ErrorType`, stripped of any `:` suffix.
    pub error_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error message from a JSON error body (`message` or `Message`),
    /// falling back to the raw text.
    pub fn error_message(&self) -> String {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.body) {
            for key in ["message", "Message", "errorMessage"] {
                if let Some(message) = value.get(key).and_then(|m| m.as_str()) {
                    return message.to_string();
                }
            }
        }
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct Transport {
    http: Client,
    region: String,
    credentials: Option<Credentials>,
}

impl Transport {
    pub fn new(region: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Transport {
            http: Client::new(),
            region: region.into(),
            credentials,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Sends one request, signing it for `service` when credentials are known.
    pub async fn send(
        &self,
        service: &str,
        method: Method,
        url: Url,
        body: Option<(&'static str, Vec<u8>)>,
    ) -> Result<RawResponse, reqwest::Error> {
        let (content_type, payload) = match body {
            Some((content_type, payload)) => (Some(content_type), payload),
            None => (None, Vec::new()),
        };

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }
        if let Some(credentials) = &self.credentials {
            // IAM is global and always signs for us-east-1.
            let region = if service == "iam" { "us-east-1" } else { &self.region };
            let params = SigningParams {
                credentials,
                region,
                service,
                time: chrono::Utc::now(),
            };
            for (name, value) in sigv4::sign(&params, method.as_str(), &url, &payload) {
                request = request.header(name, value);
            }
        }
        if content_type.is_some() {
            request = request.body(payload);
        }

        trace!(%method, %url, "sending request");
        let response = request.send().await?;
        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get("x-amzn-ErrorType")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let body = response.bytes().await?.to_vec();
        trace!(status, "received response");

        Ok(RawResponse {
            status,
            error_type,
            body,
        })
    }
}

/// Base URL for a service: the override when one is configured, the public
/// regional endpoint otherwise.
pub fn service_endpoint(service: &str, region: &str, endpoint_override: Option<&str>) -> String {
    if let Some(endpoint) = endpoint_override {
        return endpoint.trim_end_matches('/').to_string();
    }
    match service {
        "iam" => "https://iam.amazonaws.com".to_string(),
        other => format!("https://{}.{}.amazonaws.com", other, region),
    }
}
