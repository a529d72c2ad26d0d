//! Email and password logins.

use tracing::{debug, info};

use super::{IdentityBroker, missing};
use crate::error::{IdentityError, Result};
use crate::hashing::{generate_reset_token, hash_password, hash_reset_token, verify_password};
use crate::mail::render_reset_mail;
use crate::models::LoginOutcome;
use crate::records::RecordUpdate;

impl IdentityBroker {
    /// Create an identity keyed by `email`.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<LoginOutcome> {
        if self.get_id(None, email).await?.is_some() {
            return Err(IdentityError::Conflict(format!(
                "An account already exists with {email}"
            )));
        }

        let identity_id = self
            .open_id_token(None, &self.developer_logins(email))
            .await?
            .identity_id;
        info!(identity_id, "signed up");

        self.update_password(&identity_id, password).await?;
        self.on_login(&identity_id, None, email, None, None, Some(name))
            .await
    }

    /// Log in with either the password or a reset token from
    /// [`Self::forgot_password`]. A reset token works once.
    pub async fn login(
        &self,
        email: &str,
        password: Option<&str>,
        reset: Option<&str>,
    ) -> Result<LoginOutcome> {
        let identity_id = self
            .get_id(None, email)
            .await?
            .ok_or_else(|| missing(format!("does not exist {email}")))?;

        let stored = self
            .records
            .get_records(&identity_id, &["password", "reset"])
            .await?;

        match (password, reset) {
            (None, Some(reset)) => {
                let expected = stored
                    .get("reset")
                    .ok_or_else(|| IdentityError::Unauthorized("reset does not exist".into()))?;
                if hash_reset_token(reset) != *expected {
                    return Err(IdentityError::Unauthorized("reset does not match".into()));
                }
                self.records
                    .update_records(&identity_id, RecordUpdate::new().remove("reset"))
                    .await?;
                debug!(identity_id, "reset token consumed");
            }
            (Some(password), None) => {
                let hash = stored
                    .get("password")
                    .ok_or_else(|| IdentityError::Unauthorized("password does not exist".into()))?;
                if !verify_password(password, hash) {
                    return Err(IdentityError::Unauthorized("password does not match".into()));
                }
            }
            (None, None) => {
                return Err(IdentityError::Validation("neither password nor reset".into()));
            }
            (Some(_), Some(_)) => {
                return Err(IdentityError::Validation("both password and reset".into()));
            }
        }

        self.on_login(&identity_id, None, email, None, None, None)
            .await
    }

    /// Email a single-use reset token and return it.
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let identity_id = self
            .get_id(None, email)
            .await?
            .ok_or_else(|| missing(format!("does not exist {email}")))?;

        let reset = generate_reset_token();
        let mail = render_reset_mail(&self.config.password_reset, email, &reset);
        self.mail.send(&mail).await?;

        self.records
            .update_records(
                &identity_id,
                RecordUpdate::new().replace("reset", hash_reset_token(&reset)),
            )
            .await?;
        info!(identity_id, "password reset sent");
        Ok(reset)
    }

    /// Replace the stored password hash.
    pub async fn update_password(&self, identity_id: &str, password: &str) -> Result<()> {
        let hash = hash_password(password)?;
        self.records
            .update_records(identity_id, RecordUpdate::new().replace("password", hash))
            .await
    }
}
