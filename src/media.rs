//! Media fetching
//!
//! The host media pipeline hands this core fully-resolved URLs; publishers
//! that upload raw bytes (Mastodon, YouTube, Bluesky, Pinterest video) pull
//! them through this fetcher. MIME is sniffed from the first bytes where a
//! platform branches on it (Facebook), falling back to the stored type.

use reqwest::Client;
use tracing::debug;

use crate::error::PublishError;
use crate::models::media;
use crate::models::platform::Platform;

/// A fetched attachment ready for upload.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

#[derive(Debug, Clone)]
pub struct MediaFetcher {
    http: Client,
}

impl MediaFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    pub async fn fetch(
        &self,
        platform: Platform,
        media: &media::Model,
    ) -> Result<FetchedMedia, PublishError> {
        let response = self
            .http
            .get(&media.url)
            .send()
            .await
            .map_err(|e| PublishError::http(platform, e))?;

        if !response.status().is_success() {
            return Err(PublishError::rejected(
                platform,
                format!("media fetch failed with HTTP {}", response.status().as_u16()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PublishError::http(platform, e))?
            .to_vec();

        let mime_type = sniff_mime(&bytes)
            .map(str::to_string)
            .unwrap_or_else(|| media.mime_type.clone());

        debug!(
            platform = %platform,
            media_id = %media.id,
            size_bytes = bytes.len(),
            mime_type = %mime_type,
            "Fetched media attachment"
        );

        Ok(FetchedMedia {
            bytes,
            mime_type,
            file_name: file_name_from_url(&media.url),
        })
    }
}

/// Recognize the common image container formats (and MP4) from their magic
/// prefixes. Returns `None` when the bytes don't match a known prefix.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        Some("video/mp4")
    } else {
        None
    }
}

fn file_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .map(|segment| segment.split('?').next().unwrap_or(segment))
        .filter(|name| !name.is_empty())
        .unwrap_or("media")
        .to_string()
}
