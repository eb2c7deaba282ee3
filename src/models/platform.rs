//! Platform enumeration
//!
//! The fixed set of remote platforms a workspace can connect. LinkedIn and
//! LinkedIn Page are distinct platform values (they publish through
//! different author URNs) even though they share one OAuth grant family.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    X,
    Facebook,
    Instagram,
    Linkedin,
    LinkedinPage,
    Tiktok,
    Youtube,
    Pinterest,
    Threads,
    Bluesky,
    Mastodon,
}

/// All platforms, in display order.
pub const ALL_PLATFORMS: [Platform; 11] = [
    Platform::X,
    Platform::Facebook,
    Platform::Instagram,
    Platform::Linkedin,
    Platform::LinkedinPage,
    Platform::Tiktok,
    Platform::Youtube,
    Platform::Pinterest,
    Platform::Threads,
    Platform::Bluesky,
    Platform::Mastodon,
];

impl Platform {
    /// Parse a stored platform slug.
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "x" => Some(Platform::X),
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            "linkedin" => Some(Platform::Linkedin),
            "linkedin_page" => Some(Platform::LinkedinPage),
            "tiktok" => Some(Platform::Tiktok),
            "youtube" => Some(Platform::Youtube),
            "pinterest" => Some(Platform::Pinterest),
            "threads" => Some(Platform::Threads),
            "bluesky" => Some(Platform::Bluesky),
            "mastodon" => Some(Platform::Mastodon),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::LinkedinPage => "linkedin_page",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Pinterest => "pinterest",
            Platform::Threads => "threads",
            Platform::Bluesky => "bluesky",
            Platform::Mastodon => "mastodon",
        }
    }

    /// Platforms whose access tokens expire and can be renewed. Mastodon
    /// tokens and Facebook/Instagram long-lived page tokens do not expire,
    /// so their verify/publish paths skip the refresh pre-step entirely.
    pub fn has_refresh_flow(&self) -> bool {
        !matches!(
            self,
            Platform::Facebook | Platform::Instagram | Platform::Mastodon
        )
    }

    /// The other half of the LinkedIn platform family, if any.
    pub fn linkedin_counterpart(&self) -> Option<Platform> {
        match self {
            Platform::Linkedin => Some(Platform::LinkedinPage),
            Platform::LinkedinPage => Some(Platform::Linkedin),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
