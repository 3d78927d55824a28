//! HTTP access to release providers.
//!
//! Redirects are not followed by the client. [`UpdateClient`] follows at most
//! one itself and sends the same auth header to the redirect target.

use std::path::Path;

use reqwest::header::LOCATION;
use reqwest::{Client, RequestBuilder, Response, redirect};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::ManagerConfig;
use crate::error::UpdateError;

/// A request header as `(name, value)`.
pub type AuthHeader = (&'static str, String);

/// Client for release listings and asset downloads.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    client: Client,
}

impl UpdateClient {
    pub fn new(config: &ManagerConfig) -> Result<Self, UpdateError> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    fn request(&self, url: &str, auth: Option<&AuthHeader>) -> RequestBuilder {
        let request = self.client.get(url);
        match auth {
            Some((name, value)) => request.header(*name, value),
            None => request,
        }
    }

    /// GET with one manual redirect; non-success statuses are errors.
    async fn send(&self, url: &str, auth: Option<&AuthHeader>) -> Result<Response, UpdateError> {
        let response = self.request(url, auth).send().await?;
        if !response.status().is_redirection() {
            return ensure_success(response);
        }

        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| response.url().join(location).ok());
        let Some(target) = target else {
            return ensure_success(response);
        };

        debug!("Following redirect {} -> {}", url, target);
        let response = self.request(target.as_str(), auth).send().await?;
        ensure_success(response)
    }

    /// Fetch a response body as text.
    pub async fn get_text(&self, url: &str, auth: Option<&AuthHeader>) -> Result<String, UpdateError> {
        let response = self.send(url, auth).await?;
        Ok(response.text().await?)
    }

    /// Stream a download into `temp`, then rename it to `dest`.
    ///
    /// `dest` only ever appears complete; on failure `temp` is removed.
    pub async fn download(
        &self,
        url: &str,
        auth: Option<&AuthHeader>,
        temp: &Path,
        dest: &Path,
    ) -> Result<u64, UpdateError> {
        let result = self.download_to(url, auth, temp).await;
        match result {
            Ok(written) => {
                tokio::fs::rename(temp, dest).await?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(temp).await;
                Err(e)
            }
        }
    }

    async fn download_to(
        &self,
        url: &str,
        auth: Option<&AuthHeader>,
        temp: &Path,
    ) -> Result<u64, UpdateError> {
        let mut response = self.send(url, auth).await?;
        if let Some(parent) = temp.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(temp).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(written)
    }
}

fn ensure_success(response: Response) -> Result<Response, UpdateError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(UpdateError::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> UpdateClient {
        UpdateClient::new(&ManagerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_get_text_sends_auth_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases"))
            .and(header("Authorization", "Bearer secret"))
            .and(header("User-Agent", "modhost-updater"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let auth = ("Authorization", "Bearer secret".to_string());
        let body = client()
            .get_text(&format!("{}/releases", server.uri()), Some(&auth))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_follows_one_redirect_with_auth() {
        let server = MockServer::start().await;
        Mock::given(path("/first"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/second"))
            .mount(&server)
            .await;
        Mock::given(path("/second"))
            .and(header("PRIVATE-TOKEN", "t"))
            .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
            .mount(&server)
            .await;

        let auth = ("PRIVATE-TOKEN", "t".to_string());
        let body = client()
            .get_text(&format!("{}/first", server.uri()), Some(&auth))
            .await
            .unwrap();
        assert_eq!(body, "landed");
    }

    #[tokio::test]
    async fn test_second_redirect_is_not_followed() {
        let server = MockServer::start().await;
        Mock::given(path("/a"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
            .mount(&server)
            .await;
        Mock::given(path("/b"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/c"))
            .mount(&server)
            .await;

        let err = client()
            .get_text(&format!("{}/a", server.uri()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::HttpStatus { status: 302, .. }));
    }

    #[tokio::test]
    async fn test_download_is_atomic() {
        let server = MockServer::start().await;
        Mock::given(path("/asset.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive-bytes".to_vec()))
            .mount(&server)
            .await;
        Mock::given(path("/missing.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let temp = dir.path().join("m.zip.tmp");
        let dest = dir.path().join("m.zip.update");

        let written = client()
            .download(&format!("{}/asset.zip", server.uri()), None, &temp, &dest)
            .await
            .unwrap();
        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&dest).unwrap(), b"archive-bytes");
        assert!(!temp.exists());

        std::fs::remove_file(&dest).unwrap();
        let err = client()
            .download(&format!("{}/missing.zip", server.uri()), None, &temp, &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::HttpStatus { status: 404, .. }));
        assert!(!temp.exists());
        assert!(!dest.exists());
    }
}
