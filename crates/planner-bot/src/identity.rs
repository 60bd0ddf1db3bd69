//! Maps a platform sender to a persisted [`User`], creating it on first contact.

use std::collections::HashSet;

use planner_core::{NewUser, PlannerError, PlatformId, User};
use planner_store::{Database, StoreError, UserRepo};
use tracing::{info, instrument, warn};

pub struct IdentityResolver {
    users: UserRepo,
    bootstrap_admins: HashSet<PlatformId>,
}

impl IdentityResolver {
    pub fn new(db: Database) -> Self {
        Self {
            users: UserRepo::new(db),
            bootstrap_admins: HashSet::new(),
        }
    }

    /// Platform ids that are granted admin rights on contact.
    pub fn with_bootstrap_admins(mut self, ids: impl IntoIterator<Item = PlatformId>) -> Self {
        self.bootstrap_admins.extend(ids);
        self
    }

    /// Find or create the user for a sender. Stored profile fields are
    /// returned as-is; the message's profile is only used on creation.
    #[instrument(skip(self, username, given_name, family_name), fields(platform_id = %platform_id))]
    pub fn resolve(
        &self,
        platform_id: PlatformId,
        username: Option<&str>,
        given_name: &str,
        family_name: Option<&str>,
    ) -> Result<User, PlannerError> {
        let bootstrap = self.bootstrap_admins.contains(&platform_id);

        match self.users.get_by_platform_id(platform_id).map_err(auth)? {
            Some(user) if bootstrap && !user.is_admin => Ok(self.bootstrap_promote(user)),
            Some(user) => Ok(user),
            None => {
                let new_user = NewUser {
                    platform_id,
                    username: username.map(str::to_string),
                    given_name: given_name.to_string(),
                    family_name: family_name.map(str::to_string),
                    is_admin: bootstrap,
                };
                match self.users.create(&new_user) {
                    Ok(user) => {
                        info!(is_admin = user.is_admin, "registered user");
                        Ok(user)
                    }
                    // Lost a first-contact race; the other insert won.
                    Err(StoreError::Constraint(_)) => self
                        .users
                        .get_by_platform_id(platform_id)
                        .map_err(auth)?
                        .ok_or_else(|| {
                            PlannerError::Auth(format!("user {platform_id} vanished after conflict"))
                        }),
                    Err(e) => Err(auth(e)),
                }
            }
        }
    }

    fn bootstrap_promote(&self, mut user: User) -> User {
        match self.users.set_admin(user.platform_id, true) {
            Ok(()) => {
                info!("promoted configured admin");
                user.is_admin = true;
            }
            Err(e) => warn!(error = %e, "failed to promote configured admin"),
        }
        user
    }

    /// False when the user is unknown or the lookup fails.
    pub fn is_admin(&self, platform_id: PlatformId) -> bool {
        match self.users.get_by_platform_id(platform_id) {
            Ok(user) => user.is_some_and(|u| u.is_admin),
            Err(e) => {
                warn!(platform_id = %platform_id, error = %e, "admin lookup failed");
                false
            }
        }
    }

    #[instrument(skip(self), fields(platform_id = %platform_id))]
    pub fn promote_to_admin(&self, platform_id: PlatformId) -> Result<(), PlannerError> {
        self.users.set_admin(platform_id, true).map_err(|e| match e {
            StoreError::NotFound(_) => PlannerError::NotFound(format!("user {platform_id}")),
            other => PlannerError::from(other),
        })?;
        info!("promoted user to admin");
        Ok(())
    }
}

fn auth(err: StoreError) -> PlannerError {
    PlannerError::Auth(err.to_string())
}
