//! Per-request metadata and sign request options

use serde::{Deserialize, Serialize};

/// Transport details of the request that triggered a signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Direct peer address
    pub remote_addr: Option<String>,

    /// Raw `X-Forwarded-For` header
    pub forwarded_for: Option<String>,
}

impl RequestMeta {
    pub fn from_peer(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: Some(remote_addr.into()),
            forwarded_for: None,
        }
    }

    pub fn with_forwarded_for(mut self, header: impl Into<String>) -> Self {
        self.forwarded_for = Some(header.into());
        self
    }

    /// Left-most `X-Forwarded-For` entry, else the direct peer
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or_else(|| self.remote_addr.as_deref().map(str::trim).filter(|ip| !ip.is_empty()))
            .map(str::to_string)
    }
}

/// Caller-supplied parts of a signature
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub note: String,
    pub payload: serde_json::Value,
    pub meta: RequestMeta,
}

impl Default for SignRequest {
    fn default() -> Self {
        Self {
            note: String::new(),
            payload: serde_json::Value::Object(Default::default()),
            meta: RequestMeta::default(),
        }
    }
}

impl SignRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded() {
        let meta = RequestMeta::from_peer("10.0.0.1").with_forwarded_for("203.0.113.7, 10.0.0.2");
        assert_eq!(meta.client_ip().as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        assert_eq!(RequestMeta::from_peer("10.0.0.1").client_ip().as_deref(), Some("10.0.0.1"));

        let blank = RequestMeta::from_peer("10.0.0.1").with_forwarded_for(" ");
        assert_eq!(blank.client_ip().as_deref(), Some("10.0.0.1"));

        assert_eq!(RequestMeta::default().client_ip(), None);
    }

    #[test]
    fn test_sign_request_defaults() {
        let request = SignRequest::new().note("checked");
        assert_eq!(request.note, "checked");
        assert_eq!(request.payload, serde_json::json!({}));
    }
}
