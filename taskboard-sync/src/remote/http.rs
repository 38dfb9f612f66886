/// REST backend over HTTP.
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::Remote;
use crate::config::ClientConfig;
use crate::error::RemoteError;

pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    /// Sent as `?user=` on every request when set.
    user: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: &str, user: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport {
                path: base_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, RemoteError> {
        Self::new(
            &config.base_url,
            config.user.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.user {
            Some(user) => builder.query(&[("user", user)]),
            None => builder,
        }
    }

    async fn send(
        &self,
        method: &'static str,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, RemoteError> {
        let resp = builder.send().await.map_err(|e| {
            log::warn!(target: "taskboard.remote", "{} {} failed: {}", method, path, e);
            RemoteError::Transport {
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                log::error!(target: "taskboard.remote", "{} {} returned {}", method, path, status);
            } else {
                log::warn!(target: "taskboard.remote", "{} {} returned {}", method, path, status);
            }
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(RemoteError::NotFound(path.to_string()));
            }
            return Err(RemoteError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| RemoteError::Transport {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::decode(path, e))
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn get(&self, path: &str) -> Result<Value, RemoteError> {
        self.send("GET", path, self.request(reqwest::Method::GET, path))
            .await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send("POST", path, self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        self.send("PUT", path, self.request(reqwest::Method::PUT, path).json(body))
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.send("DELETE", path, self.request(reqwest::Method::DELETE, path))
            .await
            .map(|_| ())
    }
}
