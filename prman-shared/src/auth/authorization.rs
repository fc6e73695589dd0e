/// Permission policy
///
/// Every API action is checked against a fixed table keyed by resource and
/// action. The table mirrors what the service promises:
///
/// | Resource        | Action  | Permission      |
/// |-----------------|---------|-----------------|
/// | users           | create  | AllowAny        |
/// | users           | other   | IsAuthenticated |
/// | projects        | any     | IsAuthenticated |
/// | project members | any     | IsAuthenticated |
/// | tasks           | any     | IsAuthenticated |
/// | comments        | any     | IsAuthenticated |
///
/// There is no ownership or role enforcement: any authenticated user may
/// modify any project, membership, task or comment.
///
/// The admin layer additionally requires an active staff account, checked
/// against the database by [`require_staff`].
///
/// # Example
///
/// ```
/// use prman_shared::auth::authorization::{check, Action, Resource};
///
/// // Registration is open
/// assert!(check(Resource::Users, Action::Create, None).is_ok());
/// // Everything else needs a caller
/// assert!(check(Resource::Projects, Action::Create, None).is_err());
/// ```

use sqlx::PgExecutor;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::User;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Anonymous caller on a protected action
    #[error("Authentication credentials were not provided")]
    NotAuthenticated,

    /// Caller is authenticated but lacks staff status
    #[error("Staff access required")]
    NotStaff,

    /// Token refers to a user that no longer exists or is inactive
    #[error("User {0} is inactive or does not exist")]
    InactiveUser(Uuid),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// API resources guarded by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Users,
    Projects,
    ProjectMembers,
    Tasks,
    Comments,
}

/// Actions on a resource, named after the HTTP operation they serve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    Destroy,
}

/// What the caller must be to perform an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    AllowAny,
    IsAuthenticated,
}

impl Permission {
    pub fn allows(&self, auth: Option<&AuthContext>) -> bool {
        match self {
            Permission::AllowAny => true,
            Permission::IsAuthenticated => auth.is_some(),
        }
    }
}

/// The permission required for `action` on `resource`
pub fn permission_for(resource: Resource, action: Action) -> Permission {
    match (resource, action) {
        (Resource::Users, Action::Create) => Permission::AllowAny,
        _ => Permission::IsAuthenticated,
    }
}

/// Checks the policy and returns the caller's context when one is required
///
/// # Errors
///
/// `AuthzError::NotAuthenticated` if the action needs a caller and there is none.
pub fn check(
    resource: Resource,
    action: Action,
    auth: Option<&AuthContext>,
) -> Result<(), AuthzError> {
    if permission_for(resource, action).allows(auth) {
        Ok(())
    } else {
        Err(AuthzError::NotAuthenticated)
    }
}

/// Requires an authenticated caller and returns its context
pub fn require_authenticated(auth: Option<&AuthContext>) -> Result<AuthContext, AuthzError> {
    auth.copied().ok_or(AuthzError::NotAuthenticated)
}

/// Loads the caller and requires an active staff account
pub async fn require_staff<'e, E>(executor: E, auth: Option<&AuthContext>) -> Result<User, AuthzError>
where
    E: PgExecutor<'e>,
{
    let auth = require_authenticated(auth)?;

    let user = User::find_by_id(executor, auth.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthzError::InactiveUser(auth.user_id))?;

    if !user.is_staff {
        return Err(AuthzError::NotStaff);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 6] = [
        Action::List,
        Action::Create,
        Action::Retrieve,
        Action::Update,
        Action::PartialUpdate,
        Action::Destroy,
    ];

    #[test]
    fn test_user_create_is_open() {
        assert_eq!(permission_for(Resource::Users, Action::Create), Permission::AllowAny);
        assert!(check(Resource::Users, Action::Create, None).is_ok());
    }

    #[test]
    fn test_other_user_actions_require_authentication() {
        for action in ALL_ACTIONS.into_iter().filter(|a| *a != Action::Create) {
            assert_eq!(
                permission_for(Resource::Users, action),
                Permission::IsAuthenticated,
                "{:?}",
                action
            );
            assert!(matches!(
                check(Resource::Users, action, None),
                Err(AuthzError::NotAuthenticated)
            ));
        }
    }

    #[test]
    fn test_protected_resources_require_authentication() {
        let auth = AuthContext::new(Uuid::new_v4());

        for resource in [
            Resource::Projects,
            Resource::ProjectMembers,
            Resource::Tasks,
            Resource::Comments,
        ] {
            for action in ALL_ACTIONS {
                assert!(check(resource, action, None).is_err(), "{:?} {:?}", resource, action);
                assert!(check(resource, action, Some(&auth)).is_ok());
            }
        }
    }

    #[test]
    fn test_require_authenticated() {
        let auth = AuthContext::new(Uuid::new_v4());
        assert_eq!(require_authenticated(Some(&auth)).unwrap(), auth);
        assert!(matches!(
            require_authenticated(None),
            Err(AuthzError::NotAuthenticated)
        ));
    }
}
