/// Startup tasks run before the server accepts requests

use crate::config::SuperuserConfig;
use prman_shared::{
    auth::password,
    models::user::{CreateUser, User},
};
use sqlx::PgPool;

/// Outcome of [`ensure_superuser`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperuserOutcome {
    Created,
    Promoted,
}

/// Makes sure the configured superuser exists with staff and superuser flags
///
/// An existing account with that username is promoted; its password is left
/// untouched.
pub async fn ensure_superuser(pool: &PgPool, config: &SuperuserConfig) -> anyhow::Result<SuperuserOutcome> {
    let mut tx = pool.begin().await?;

    let outcome = match User::find_by_username(&mut *tx, &config.username).await? {
        Some(user) => {
            User::promote_to_superuser(&mut *tx, user.id).await?;
            SuperuserOutcome::Promoted
        }
        None => {
            User::create(
                &mut *tx,
                CreateUser {
                    username: config.username.clone(),
                    email: config.email.clone(),
                    password_hash: password::hash_password(&config.password)?,
                    is_staff: true,
                    is_superuser: true,
                    ..Default::default()
                },
            )
            .await?;
            SuperuserOutcome::Created
        }
    };

    tx.commit().await?;

    tracing::info!(username = %config.username, ?outcome, "Superuser ensured");

    Ok(outcome)
}
