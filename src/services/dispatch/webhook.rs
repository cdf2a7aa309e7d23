use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::NotificationDispatcher;

/// Posts workflow events to a configured endpoint. The JSON body is
/// signed with HMAC-SHA1 over the raw bytes so the receiver can verify
/// provenance.
pub struct WebhookDispatcher {
    endpoint: String,
    secret: String,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(endpoint: String, secret: String) -> Self {
        Self {
            endpoint,
            secret,
            client: reqwest::Client::new(),
        }
    }
}

pub fn sign_payload(secret: &str, body: &str) -> Option<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body.as_bytes());
    let result = mac.finalize().into_bytes();
    Some(base64::engine::general_purpose::STANDARD.encode(result))
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn emit(&self, event: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        let body = serde_json::json!({ "event": event, "payload": payload });
        let body_str = serde_json::to_string(&body)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(body_str.clone());

        if !self.secret.is_empty() {
            if let Some(signature) = sign_payload(&self.secret, &body_str) {
                request = request.header("X-Bookflow-Signature", signature);
            }
        }

        request
            .send()
            .await
            .context("failed to deliver webhook")?
            .error_for_status()
            .context("webhook endpoint returned error")?;

        Ok(())
    }
}
