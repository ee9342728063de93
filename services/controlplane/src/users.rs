//! Broker user provisioning.
//!
//! # Purpose
//! Lazily creates broker users with a generated password and deny-by-default
//! permissions, records them in the registry, and applies grant updates through
//! the permission algebra.
//!
//! # Security notes
//! - Plaintext passwords are returned once, to the caller that caused the user to
//!   be created, and never logged. The registry stores only a SHA-256 hex digest.
use crate::app::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::model::{BrokerUser, PasswordReset, UserCredentials};
use crate::store::StoreError;
use chrono::Utc;
use courier_authz::{PermissionGrant, PermissionOp};
use courier_mgmt::MgmtError;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

/// Returned in place of the API key when the user already existed.
pub const API_KEY_HINT: &str =
    "Use the apiKey returned on registration, if lost please use /resetPassword API";

pub const PASSWORD_LENGTH: usize = 16;

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

impl ControlPlane {
    /// Ensure `username` exists on the broker.
    ///
    /// # What it does
    /// Looks the user up; when absent, creates it with a fresh password, sets
    /// empty permissions on `vhost`, and records the password hash.
    ///
    /// # Errors
    /// - [`ControlPlaneError::Remote`] for management API failures.
    /// - [`ControlPlaneError::Persistence`] when the user row cannot be written.
    pub async fn ensure_user(
        &self,
        username: &str,
        vhost: &str,
    ) -> ControlPlaneResult<UserCredentials> {
        match self.broker.get_user(username).await {
            Ok(_) => return Ok(existing_user(username)),
            Err(MgmtError::NotFound(_)) => {}
            Err(err) => return Err(ControlPlaneError::remote("User lookup failed", err)),
        }

        let password = generate_password();
        match self.broker.create_user(username, &password).await {
            Ok(()) => {}
            // Another request created it between our lookup and create.
            Err(MgmtError::AlreadyExists(_)) => return Ok(existing_user(username)),
            Err(err) => return Err(ControlPlaneError::remote("User creation failed", err)),
        }
        self.broker
            .set_user_permissions(vhost, username, &PermissionGrant::deny_all())
            .await
            .map_err(|err| ControlPlaneError::remote("Setting vhost permissions failed", err))?;

        let password_hash = hash_password(&password);
        let row = BrokerUser {
            username: username.to_string(),
            password_hash: password_hash.clone(),
            created_at: Utc::now(),
        };
        match self.store.insert_broker_user(row).await {
            Ok(()) => {}
            // Stale row left by a user deleted out of band; keep it in sync.
            Err(StoreError::Conflict(_)) => self
                .store
                .update_broker_password(username, &password_hash)
                .await
                .map_err(|err| ControlPlaneError::persistence("Saving credentials failed", err))?,
            Err(err) => {
                return Err(ControlPlaneError::persistence(
                    "Saving credentials failed",
                    err,
                ));
            }
        }
        tracing::info!(username, vhost, "broker user created");
        Ok(UserCredentials {
            username: username.to_string(),
            api_key: password,
            created: true,
        })
    }

    /// Apply one grant operation to `username`'s permissions on `vhost`.
    ///
    /// A vhost with no permission entry yet starts from the empty grant.
    pub async fn update_user_permissions(
        &self,
        vhost: &str,
        username: &str,
        op: PermissionOp,
        resource_id: &str,
    ) -> ControlPlaneResult<()> {
        let mut grant = match self.broker.get_user_permissions(vhost, username).await {
            Ok(grant) => grant,
            Err(MgmtError::NotFound(_)) => PermissionGrant::deny_all(),
            Err(err) => return Err(ControlPlaneError::remote("Reading permissions failed", err)),
        };
        grant.apply(op, resource_id);
        self.broker
            .set_user_permissions(vhost, username, &grant)
            .await
            .map_err(|err| ControlPlaneError::remote("Updating permissions failed", err))?;
        tracing::debug!(username, vhost, op = %op, resource_id, "permissions updated");
        Ok(())
    }

    /// Issue a new password for an existing broker user.
    ///
    /// # Errors
    /// - [`ControlPlaneError::NotFound`] when the broker has no such user.
    pub async fn reset_password(&self, username: &str) -> ControlPlaneResult<PasswordReset> {
        if username.trim().is_empty() {
            return Err(ControlPlaneError::validation("username must not be empty"));
        }
        self.broker
            .get_user(username)
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("User lookup failed", err))?;

        let password = generate_password();
        self.broker
            .update_user_password(username, &password)
            .await
            .map_err(|err| ControlPlaneError::from_mgmt("Password reset failed", err))?;

        let password_hash = hash_password(&password);
        match self
            .store
            .update_broker_password(username, &password_hash)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => self
                .store
                .insert_broker_user(BrokerUser {
                    username: username.to_string(),
                    password_hash,
                    created_at: Utc::now(),
                })
                .await
                .map_err(|err| ControlPlaneError::persistence("Saving credentials failed", err))?,
            Err(err) => {
                return Err(ControlPlaneError::persistence(
                    "Saving credentials failed",
                    err,
                ));
            }
        }
        tracing::info!(username, "broker user password reset");
        Ok(PasswordReset {
            username: username.to_string(),
            api_key: password,
        })
    }
}

fn existing_user(username: &str) -> UserCredentials {
    UserCredentials {
        username: username.to_string(),
        api_key: API_KEY_HINT.to_string(),
        created: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passwords_are_alphanumeric() {
        let password = generate_password();
        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
