//! Repositories encapsulating credential-store and post access.

pub mod post_platform;
pub mod social_account;

pub use post_platform::PostPlatformRepository;
pub use social_account::SocialAccountRepository;
