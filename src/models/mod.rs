//! # Data Models
//!
//! SeaORM entities for the publishing core plus the platform/content-type
//! enums and typed per-platform meta structs.

pub mod content_type;
pub mod media;
pub mod meta;
pub mod platform;
pub mod post_platform;
pub mod social_account;
pub mod workspace;

pub use content_type::ContentType;
pub use media::Entity as Media;
pub use platform::Platform;
pub use post_platform::Entity as PostPlatform;
pub use social_account::Entity as SocialAccount;
pub use workspace::Entity as Workspace;
