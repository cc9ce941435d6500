//! Account activation codes
//!
//! Invited accounts start inactive with a one-time code. Presenting the code
//! together with the account's email activates the account and burns the code.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::auth::random_token;
use crate::model::{User, UserPatch};
use crate::store::{Repository, StoreError};

pub const ACTIVATION_CODE_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("Invalid email or activation code")]
    Invalid,

    #[error("User not found")]
    UnknownUser,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fresh 8-character code over `[A-Za-z0-9]`
pub fn generate_activation_code() -> String {
    random_token(ACTIVATION_CODE_LENGTH)
}

/// Activates the account registered under `email` if `code` matches
///
/// The code comparison and the write that burns the code are one atomic
/// store update, so concurrent attempts with the same code succeed once.
pub fn activate(repo: &Repository, email: &str, code: &str) -> Result<User, ActivationError> {
    if code.is_empty() {
        return Err(ActivationError::Invalid);
    }
    let user: User = repo
        .get_by_foreign_key("email", email)?
        .ok_or(ActivationError::Invalid)?;

    let patch = UserPatch {
        is_active: Some(true),
        activation_code: Some(None),
        ..Default::default()
    };
    let user = repo
        .update_if::<User>(
            user.id,
            |stored| stored.activation_code.as_deref() == Some(code),
            &patch,
        )?
        .ok_or(ActivationError::Invalid)?;

    info!(user_id = user.id, username = %user.username, "account activated");
    Ok(user)
}

/// Code handed back to an admin for out-of-band delivery
#[derive(Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    pub user_id: u64,
    pub username: String,
    pub email: String,
    pub activation_code: String,
}

/// Replaces the user's code and deactivates the account until it is used
pub fn reset_activation_code(
    repo: &Repository,
    user_id: u64,
) -> Result<IssuedCode, ActivationError> {
    let code = generate_activation_code();
    let patch = UserPatch {
        is_active: Some(false),
        activation_code: Some(Some(code.clone())),
        ..Default::default()
    };
    let user = repo
        .update::<User>(user_id, &patch)?
        .ok_or(ActivationError::UnknownUser)?;

    info!(user_id = user.id, "activation code reset");
    Ok(IssuedCode {
        user_id: user.id,
        username: user.username,
        email: user.email,
        activation_code: code,
    })
}
