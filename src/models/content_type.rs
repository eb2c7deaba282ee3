//! Content type enumeration
//!
//! Each post-platform row carries a content type scoped to its platform.
//! Publishers match on the variants they recognize and fail fast with an
//! unsupported-content-type error for anything else, so a mismatched pairing
//! never degrades silently.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain text tweet (X).
    Text,
    /// Generic feed post (Facebook, LinkedIn, LinkedIn Page, Bluesky).
    Post,
    /// Mastodon status.
    Status,
    InstagramPost,
    InstagramReel,
    InstagramStory,
    InstagramCarousel,
    PinterestPin,
    PinterestVideo,
    PinterestCarousel,
    ThreadsPost,
    ThreadsCarousel,
    /// TikTok video.
    Video,
    /// YouTube Short.
    Short,
}

impl ContentType {
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "text" => Some(ContentType::Text),
            "post" => Some(ContentType::Post),
            "status" => Some(ContentType::Status),
            "instagram_post" => Some(ContentType::InstagramPost),
            "instagram_reel" => Some(ContentType::InstagramReel),
            "instagram_story" => Some(ContentType::InstagramStory),
            "instagram_carousel" => Some(ContentType::InstagramCarousel),
            "pinterest_pin" => Some(ContentType::PinterestPin),
            "pinterest_video" => Some(ContentType::PinterestVideo),
            "pinterest_carousel" => Some(ContentType::PinterestCarousel),
            "threads_post" => Some(ContentType::ThreadsPost),
            "threads_carousel" => Some(ContentType::ThreadsCarousel),
            "video" => Some(ContentType::Video),
            "short" => Some(ContentType::Short),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Post => "post",
            ContentType::Status => "status",
            ContentType::InstagramPost => "instagram_post",
            ContentType::InstagramReel => "instagram_reel",
            ContentType::InstagramStory => "instagram_story",
            ContentType::InstagramCarousel => "instagram_carousel",
            ContentType::PinterestPin => "pinterest_pin",
            ContentType::PinterestVideo => "pinterest_video",
            ContentType::PinterestCarousel => "pinterest_carousel",
            ContentType::ThreadsPost => "threads_post",
            ContentType::ThreadsCarousel => "threads_carousel",
            ContentType::Video => "video",
            ContentType::Short => "short",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
