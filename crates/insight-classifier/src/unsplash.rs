//! Unsplash random-photo client

use crate::image::{ImageError, ImageLookup, ImageRef};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";
const TRACKING_TIMEOUT: Duration = Duration::from_secs(2);

/// Looks up landscape photos through the Unsplash API
#[derive(Debug, Clone)]
pub struct UnsplashLookup {
    client: reqwest::Client,
    access_key: String,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Photo {
    urls: PhotoUrls,
    links: PhotoLinks,
    user: PhotoUser,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoUrls {
    regular: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoLinks {
    download_location: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoUser {
    name: String,
    links: UserLinks,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserLinks {
    html: String,
}

enum Fetch {
    Found(ImageRef),
    NotFound,
}

impl UnsplashLookup {
    /// Create a client whose every request is bounded by `timeout`
    ///
    /// # Errors
    /// - `ImageError::Http` if the HTTP client cannot be built
    pub fn new(access_key: impl Into<String>, timeout: Duration) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            access_key: access_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at another API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, query: &str) -> Result<Fetch, ImageError> {
        let response = self
            .client
            .get(format!("{}/photos/random", self.base_url))
            .query(&[
                ("query", query),
                ("orientation", "landscape"),
                ("client_id", self.access_key.as_str()),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(Fetch::NotFound),
            status if !status.is_success() => return Err(ImageError::Status(status.as_u16())),
            _ => {}
        }

        let photo: Photo = response.json().await?;
        if photo.urls.regular.is_empty() {
            return Ok(Fetch::NotFound);
        }
        if !photo.links.download_location.is_empty() {
            self.track_download(&photo.links.download_location);
        }
        Ok(Fetch::Found(
            ImageRef::new(photo.urls.regular).with_credit(photo.user.name, photo.user.links.html),
        ))
    }

    /// Report the download without waiting for the answer.
    fn track_download(&self, location: &str) {
        let url = if location.contains("client_id=") {
            location.to_string()
        } else {
            let separator = if location.contains('?') { '&' } else { '?' };
            format!("{location}{separator}client_id={}", self.access_key)
        };
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.get(&url).timeout(TRACKING_TIMEOUT).send().await {
                Ok(response) => debug!(status = %response.status(), "download tracked"),
                Err(e) => debug!(error = %e, "download tracking failed"),
            }
        });
    }
}

/// Broaden a query that matched nothing: keep the text before the first comma
/// and swap overly specific suffixes for generic ones.
#[must_use]
pub fn simplify_query(query: &str) -> String {
    let head = match query.find(',') {
        Some(at) if at > 0 => query[..at].trim(),
        _ => query,
    };
    head.replace(" culture tradition", " travel")
        .replace(" weather sky", " landscape")
}

#[async_trait]
impl ImageLookup for UnsplashLookup {
    async fn lookup(&self, query: &str) -> Result<Option<ImageRef>, ImageError> {
        match self.fetch(query).await? {
            Fetch::Found(image) => Ok(Some(image)),
            Fetch::NotFound => {
                let simplified = simplify_query(query);
                if simplified == query {
                    warn!(query, "no image found");
                    return Ok(None);
                }
                debug!(query, retry = %simplified, "retrying image lookup with simpler query");
                match self.fetch(&simplified).await? {
                    Fetch::Found(image) => Ok(Some(image)),
                    Fetch::NotFound => Ok(None),
                }
            }
        }
    }
}
