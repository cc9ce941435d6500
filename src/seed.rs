//! Startup bootstrap of the first administrator

use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{hash_password, PasswordError};
use crate::config::AdminSeed;
use crate::model::{NewUser, User};
use crate::store::{Repository, StoreError};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("ADMIN_EMAIL {0} already belongs to another user")]
    EmailTaken(String),
}

/// Creates an active admin unless the username is already taken
///
/// Returns the created user, or `None` when one already existed. An email
/// held by a differently named user is an error.
pub fn seed_admin(repo: &Repository, seed: &AdminSeed) -> Result<Option<User>, SeedError> {
    if repo
        .get_by_foreign_key::<User>("username", seed.username.as_str())?
        .is_some()
    {
        return Ok(None);
    }
    if let Some(holder) = repo.get_by_foreign_key::<User>("email", seed.email.as_str())? {
        warn!(user_id = holder.id, email = %seed.email, "bootstrap admin email already in use");
        return Err(SeedError::EmailTaken(seed.email.clone()));
    }

    let user = repo.create::<User>(NewUser {
        username: seed.username.clone(),
        email: seed.email.clone(),
        password: hash_password(&seed.password)?,
        is_admin: true,
        is_active: true,
        activation_code: None,
    })?;
    info!(user_id = user.id, username = %user.username, "bootstrap admin created");

    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_once() {
        let repo = Repository::in_memory();
        let seed = AdminSeed {
            username: "root".into(),
            email: "root@example.com".into(),
            password: "hunter22".into(),
        };

        let admin = seed_admin(&repo, &seed).unwrap().unwrap();
        assert!(admin.is_admin && admin.is_active);
        assert!(admin.activation_code.is_none());
        assert!(seed_admin(&repo, &seed).unwrap().is_none());
        assert_eq!(repo.all::<User>().unwrap().len(), 1);
    }

    #[test]
    fn refuses_email_of_another_user() {
        let repo = Repository::in_memory();
        repo.create::<User>(NewUser {
            username: "owner".into(),
            email: "root@example.com".into(),
            password: "hash".into(),
            is_admin: false,
            is_active: true,
            activation_code: None,
        })
        .unwrap();

        let seed = AdminSeed {
            username: "root".into(),
            email: "root@example.com".into(),
            password: "hunter22".into(),
        };
        assert!(matches!(
            seed_admin(&repo, &seed),
            Err(SeedError::EmailTaken(email)) if email == "root@example.com"
        ));
        assert_eq!(repo.all::<User>().unwrap().len(), 1);
    }
}
