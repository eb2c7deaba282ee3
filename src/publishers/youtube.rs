//! YouTube Shorts publisher (resumable upload)
//!
//! Two-step Google resumable upload: an init POST with the video metadata
//! returns a session URL in the `Location` header, then the raw bytes go up
//! in a single PUT with an extended timeout. The Shorts title is derived
//! from the post text and always ends in `#Shorts`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AppConfig;
use crate::error::{classify_status_error, PublishError};
use crate::media::MediaFetcher;
use crate::models::content_type::ContentType;
use crate::models::platform::Platform;

use super::{PublishContext, PublishResult, Publisher};

const TITLE_MAX_CHARS: usize = 100;
const SHORTS_SUFFIX: &str = " #Shorts";

pub struct YouTubePublisher {
    http: Client,
    upload_base: String,
    upload_timeout: Duration,
    fetcher: Arc<MediaFetcher>,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

impl YouTubePublisher {
    pub fn new(config: &Arc<AppConfig>, http: Client, fetcher: Arc<MediaFetcher>) -> Self {
        Self {
            http,
            upload_base: config.youtube_upload_base.clone(),
            upload_timeout: Duration::from_secs(config.upload_timeout_seconds),
            fetcher,
        }
    }
}

/// Build a Shorts title from the post text: first line, cut back to the
/// first sentence and then truncated with an ellipsis until
/// `title + " #Shorts"` fits in 100 characters.
pub fn shorts_title(content: &str) -> String {
    let budget = TITLE_MAX_CHARS - SHORTS_SUFFIX.chars().count();

    let first_line = content.lines().next().unwrap_or("").trim();
    let mut title = first_line.to_string();

    if title.chars().count() > budget {
        if let Some(sentence_end) = title.find(". ") {
            title.truncate(sentence_end + 1);
        }
    }
    if title.chars().count() > budget {
        title = title.chars().take(budget - 1).collect::<String>();
        let trimmed = title.trim_end().len();
        title.truncate(trimmed);
        title.push('…');
    }

    format!("{title}{SHORTS_SUFFIX}")
}

#[async_trait]
impl Publisher for YouTubePublisher {
    fn platform(&self) -> Platform {
        Platform::Youtube
    }

    async fn publish(&self, ctx: &PublishContext) -> Result<PublishResult, PublishError> {
        match ctx.content_kind()? {
            ContentType::Short => {}
            other => {
                return Err(PublishError::UnsupportedContentType {
                    platform: Platform::Youtube,
                    content_type: other.as_str().to_string(),
                })
            }
        }

        let media = ctx.first_media()?;
        if !media.is_video() {
            return Err(PublishError::rejected(
                Platform::Youtube,
                format!("first media item must be a video, got '{}'", media.mime_type),
            ));
        }

        let init = self
            .http
            .post(format!(
                "{}/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status",
                self.upload_base
            ))
            .bearer_auth(&ctx.access_token)
            .json(&json!({
                "snippet": {
                    "title": shorts_title(&ctx.post.content),
                    "description": ctx.post.content,
                    "categoryId": "22",
                },
                "status": {
                    "privacyStatus": "public",
                    "selfDeclaredMadeForKids": false,
                },
            }))
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Youtube, e))?;

        let status = init.status();
        if !status.is_success() {
            let body = init.text().await.unwrap_or_default();
            return Err(classify_status_error(
                Platform::Youtube,
                status.as_u16(),
                &body,
            ));
        }

        let location = init
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PublishError::rejected(
                    Platform::Youtube,
                    "resumable init returned no Location header",
                )
            })?;

        let fetched = self.fetcher.fetch(Platform::Youtube, media).await?;
        let upload = self
            .http
            .put(&location)
            .bearer_auth(&ctx.access_token)
            .header(reqwest::header::CONTENT_TYPE, fetched.mime_type)
            .timeout(self.upload_timeout)
            .body(fetched.bytes)
            .send()
            .await
            .map_err(|e| PublishError::http(Platform::Youtube, e))?;

        let status = upload.status();
        if !status.is_success() {
            let body = upload.text().await.unwrap_or_default();
            return Err(classify_status_error(
                Platform::Youtube,
                status.as_u16(),
                &body,
            ));
        }

        let video: UploadedVideo = upload
            .json()
            .await
            .map_err(|e| PublishError::http(Platform::Youtube, e))?;

        let url = format!("https://www.youtube.com/shorts/{}", video.id);
        Ok(PublishResult {
            id: video.id,
            url: Some(url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_title_passes_through() {
        assert_eq!(shorts_title("Morning espresso"), "Morning espresso #Shorts");
    }

    #[test]
    fn title_uses_first_line_only() {
        assert_eq!(
            shorts_title("Headline\nrest of the description"),
            "Headline #Shorts"
        );
    }

    #[test]
    fn long_title_cut_to_first_sentence() {
        let content = format!("Short sentence. {}", "x".repeat(120));
        assert_eq!(shorts_title(&content), "Short sentence. #Shorts");
    }

    #[test]
    fn overlong_title_truncated_with_ellipsis() {
        let content = "y".repeat(150);
        let title = shorts_title(&content);
        assert!(title.ends_with(" #Shorts"));
        assert!(title.contains('…'));
        assert!(title.chars().count() <= TITLE_MAX_CHARS);
    }

    #[test]
    fn multibyte_content_respects_char_budget() {
        let content = "😀".repeat(150);
        let title = shorts_title(&content);
        assert!(title.chars().count() <= TITLE_MAX_CHARS);
        assert!(title.ends_with(" #Shorts"));
    }
}
