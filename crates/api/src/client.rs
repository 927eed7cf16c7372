//! Outbound HTTP requests to JSON endpoints.
//!
//! Every call expects `200 OK`; anything else is [`ClientError::UnexpectedStatus`].

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot send {method} request: {source}")]
    Transport {
        method: Method,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected http status code: {0}")]
    UnexpectedStatus(u16),

    #[error("cannot read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("number of items in pairs must be even; got {0}")]
    OddPairs(usize),

    #[error("cannot read file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Method used by [`ApiClient::send_form_with_auth`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormMethod {
    #[default]
    Post,
    Put,
}

impl FormMethod {
    fn as_method(self) -> Method {
        match self {
            FormMethod::Post => Method::POST,
            FormMethod::Put => Method::PUT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an already configured client (timeouts, proxies, ...).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn get(&self, url: &str) -> ClientResult<Bytes> {
        self.send(Method::GET, self.http.get(url)).await
    }

    pub async fn get_with_auth(&self, url: &str, token: &str) -> ClientResult<Bytes> {
        self.send(Method::GET, self.http.get(url).bearer_auth(token))
            .await
    }

    pub async fn post_json(&self, url: &str, json: impl Into<reqwest::Body>) -> ClientResult<Bytes> {
        let req = self.http.post(url);
        self.send(Method::POST, with_json(req, json)).await
    }

    pub async fn post_json_with_auth(
        &self,
        url: &str,
        json: impl Into<reqwest::Body>,
        token: &str,
    ) -> ClientResult<Bytes> {
        let req = self.http.post(url).bearer_auth(token);
        self.send(Method::POST, with_json(req, json)).await
    }

    pub async fn put_json_with_auth(
        &self,
        url: &str,
        json: impl Into<reqwest::Body>,
        token: &str,
    ) -> ClientResult<Bytes> {
        let req = self.http.put(url).bearer_auth(token);
        self.send(Method::PUT, with_json(req, json)).await
    }

    pub async fn delete_with_auth(&self, url: &str, token: &str) -> ClientResult<Bytes> {
        self.send(Method::DELETE, self.http.delete(url).bearer_auth(token))
            .await
    }

    /// Send a multipart form built from `pairs` (`name, value, name, value, ...`).
    ///
    /// When `file_field` names one of the pairs, its value is a path on disk and
    /// the file's contents are attached under the file's base name.
    pub async fn send_form_with_auth(
        &self,
        url: &str,
        token: &str,
        file_field: Option<&str>,
        method: FormMethod,
        pairs: &[&str],
    ) -> ClientResult<Bytes> {
        let form = build_form(file_field, pairs).await?;
        let method = method.as_method();
        let req = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .multipart(form);
        self.send(method, req).await
    }

    async fn send(&self, method: Method, req: RequestBuilder) -> ClientResult<Bytes> {
        let resp = req.send().await.map_err(|source| ClientError::Transport {
            method: method.clone(),
            source,
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            tracing::debug!(%method, status = status.as_u16(), "unexpected response status");
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        resp.bytes().await.map_err(ClientError::Body)
    }
}

/// Read the remaining body of `resp` as text.
pub async fn response_body_text(resp: Response) -> ClientResult<String> {
    resp.text().await.map_err(ClientError::Body)
}

fn with_json(req: RequestBuilder, json: impl Into<reqwest::Body>) -> RequestBuilder {
    req.header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(json)
}

async fn build_form(file_field: Option<&str>, pairs: &[&str]) -> ClientResult<Form> {
    if pairs.len() % 2 != 0 {
        return Err(ClientError::OddPairs(pairs.len()));
    }

    let mut form = Form::new();
    for pair in pairs.chunks_exact(2) {
        let (key, value) = (pair[0], pair[1]);

        if file_field == Some(key) {
            let path = Path::new(value);
            let content = tokio::fs::read(path).await.map_err(|source| ClientError::File {
                path: path.to_path_buf(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| value.to_string());
            form = form.part(key.to_string(), Part::bytes(content).file_name(file_name));
        } else {
            form = form.text(key.to_string(), value.to_string());
        }
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn odd_pairs_are_rejected_before_sending() {
        let err = ApiClient::new()
            .send_form_with_auth("http://127.0.0.1:9/", "t", None, FormMethod::Post, &["a"])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::OddPairs(1)));
        assert_eq!(err.to_string(), "number of items in pairs must be even; got 1");
    }

    #[tokio::test]
    async fn missing_upload_file_is_reported() {
        let err = build_form(Some("image"), &["image", "/definitely/not/here.png"])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::File { .. }));
    }

    #[tokio::test]
    async fn form_with_file_builds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, b"PNG").unwrap();
        let path = path.to_string_lossy().into_owned();

        let form = build_form(Some("image"), &["title", "holiday", "image", &path]).await;
        assert!(form.is_ok());
    }

    #[test]
    fn form_methods() {
        assert_eq!(FormMethod::default().as_method(), Method::POST);
        assert_eq!(FormMethod::Put.as_method(), Method::PUT);
    }
}
