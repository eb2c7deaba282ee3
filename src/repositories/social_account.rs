//! Social account repository
//!
//! Encapsulates credential-store access: token encryption/decryption under
//! the account AAD, refresh-driven token updates, status transitions, and
//! the workspace-scoped counterpart lookup the LinkedIn synchronizer uses.

use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::warn;
use uuid::Uuid;

use crate::crypto::{self, CryptoError, CryptoKey};
use crate::error::PublishError;
use crate::models::meta::BlueskyMeta;
use crate::models::platform::Platform;
use crate::models::social_account::{
    self, Entity as SocialAccount, STATUS_CONNECTED, STATUS_DISCONNECTED,
};

#[derive(Debug, Clone)]
pub struct SocialAccountRepository {
    pub db: Arc<DatabaseConnection>,
    crypto_key: CryptoKey,
}

impl SocialAccountRepository {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<social_account::Model, PublishError> {
        SocialAccount::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(PublishError::AccountNotFound(id))
    }

    /// Reload after a refresh so subsequent calls see the new token.
    pub async fn reload(
        &self,
        account: &social_account::Model,
    ) -> Result<social_account::Model, PublishError> {
        self.get_by_id(account.id).await
    }

    /// All accounts the periodic verification sweep should look at.
    /// Disconnected accounts are excluded at the query level.
    pub async fn find_connected(&self) -> Result<Vec<social_account::Model>, PublishError> {
        Ok(SocialAccount::find()
            .filter(social_account::Column::Status.eq(STATUS_CONNECTED))
            .all(self.db.as_ref())
            .await?)
    }

    /// The single account on `platform` in `workspace_id`, if any. The
    /// store enforces at most one row per (workspace, platform).
    pub async fn find_by_workspace_platform(
        &self,
        workspace_id: Uuid,
        platform: Platform,
    ) -> Result<Option<social_account::Model>, PublishError> {
        Ok(SocialAccount::find()
            .filter(social_account::Column::WorkspaceId.eq(workspace_id))
            .filter(social_account::Column::Platform.eq(platform.as_str()))
            .one(self.db.as_ref())
            .await?)
    }

    fn aad(&self, account: &social_account::Model) -> String {
        crypto::account_aad(
            &account.workspace_id,
            &account.platform,
            &account.platform_user_id,
        )
    }

    pub fn decrypt_access_token(
        &self,
        account: &social_account::Model,
    ) -> Result<String, CryptoError> {
        crypto::decrypt_token(
            &self.crypto_key,
            &self.aad(account),
            &account.access_token_ciphertext,
        )
    }

    pub fn decrypt_refresh_token(
        &self,
        account: &social_account::Model,
    ) -> Result<Option<String>, CryptoError> {
        account
            .refresh_token_ciphertext
            .as_deref()
            .map(|ciphertext| crypto::decrypt_token(&self.crypto_key, &self.aad(account), ciphertext))
            .transpose()
    }

    /// Encrypt a token under this account's AAD (used when tokens are
    /// copied onto a counterpart account, which has a different AAD).
    pub fn encrypt_token_for(
        &self,
        account: &social_account::Model,
        token: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        crypto::encrypt_token(&self.crypto_key, &self.aad(account), token)
    }

    /// Decrypt the Bluesky app password stored (base64 ciphertext) in meta.
    pub fn decrypt_bluesky_password(
        &self,
        account: &social_account::Model,
        meta: &BlueskyMeta,
    ) -> Result<String, CryptoError> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(&meta.password_ciphertext)
            .map_err(|e| CryptoError::DecryptionFailed(format!("invalid base64: {e}")))?;
        crypto::decrypt_token(&self.crypto_key, &self.aad(account), &ciphertext)
    }

    /// Persist freshly obtained tokens. `refresh_token` of `None` leaves the
    /// stored refresh token untouched (several grants only rotate the access
    /// token).
    pub async fn update_tokens(
        &self,
        account: &social_account::Model,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<social_account::Model, PublishError> {
        let aad = self.aad(account);
        let access_ciphertext = crypto::encrypt_token(&self.crypto_key, &aad, access_token)?;
        let refresh_ciphertext = refresh_token
            .map(|token| crypto::encrypt_token(&self.crypto_key, &aad, token))
            .transpose()?;

        let mut active = social_account::ActiveModel {
            id: Set(account.id),
            access_token_ciphertext: Set(access_ciphertext),
            token_expires_at: Set(expires_at.map(Into::into)),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        if let Some(ciphertext) = refresh_ciphertext {
            active.refresh_token_ciphertext = Set(Some(ciphertext));
        }

        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Copy token material onto a counterpart account, re-encrypting under
    /// the counterpart's AAD and reconnecting it if it had been marked
    /// disconnected.
    pub async fn apply_synced_tokens(
        &self,
        counterpart: &social_account::Model,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<social_account::Model, PublishError> {
        let aad = self.aad(counterpart);
        let access_ciphertext = crypto::encrypt_token(&self.crypto_key, &aad, access_token)?;
        let refresh_ciphertext = refresh_token
            .map(|token| crypto::encrypt_token(&self.crypto_key, &aad, token))
            .transpose()?;

        let was_disconnected = counterpart.status == STATUS_DISCONNECTED;
        if was_disconnected {
            warn!(
                account_id = %counterpart.id,
                platform = %counterpart.platform,
                "Reconnecting counterpart account via token sync"
            );
        }

        let active = social_account::ActiveModel {
            id: Set(counterpart.id),
            access_token_ciphertext: Set(access_ciphertext),
            refresh_token_ciphertext: Set(refresh_ciphertext
                .or_else(|| counterpart.refresh_token_ciphertext.clone())),
            token_expires_at: Set(expires_at.map(Into::into)),
            status: Set(STATUS_CONNECTED.to_string()),
            error_message: Set(None),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn mark_disconnected(
        &self,
        id: Uuid,
        error_message: &str,
    ) -> Result<(), PublishError> {
        let active = social_account::ActiveModel {
            id: Set(id),
            status: Set(STATUS_DISCONNECTED.to_string()),
            error_message: Set(Some(error_message.to_string())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}
