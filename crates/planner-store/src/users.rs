use chrono::{DateTime, Utc};
use tracing::instrument;

use planner_core::{NewUser, PlatformId, User, UserId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

const USER_COLUMNS: &str =
    "id, platform_id, username, given_name, family_name, is_admin, created_at";

pub struct UserRepo {
    db: Database,
}

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a user. Fails with `Constraint` if the platform id is taken.
    #[instrument(skip(self, user), fields(platform_id = %user.platform_id))]
    pub fn create(&self, user: &NewUser) -> Result<User, StoreError> {
        let created_at = Utc::now();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (platform_id, username, given_name, family_name, is_admin, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.platform_id.get(),
                    user.username,
                    user.given_name,
                    user.family_name,
                    user.is_admin,
                    created_at.to_rfc3339(),
                ],
            )?;

            Ok(User {
                id: UserId::new(conn.last_insert_rowid()),
                platform_id: user.platform_id,
                username: user.username.clone(),
                given_name: user.given_name.clone(),
                family_name: user.family_name.clone(),
                is_admin: user.is_admin,
                created_at,
            })
        })
    }

    /// Look up a user by external identity. `Ok(None)` when unknown.
    #[instrument(skip(self), fields(platform_id = %platform_id))]
    pub fn get_by_platform_id(&self, platform_id: PlatformId) -> Result<Option<User>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE platform_id = ?1"
            ))?;
            let mut rows = stmt.query([platform_id.get()])?;
            match rows.next()? {
                Some(row) => row_to_user(row).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Persist the admin flag. Fails with `NotFound` if no row matched.
    #[instrument(skip(self), fields(platform_id = %platform_id, is_admin = is_admin))]
    pub fn set_admin(&self, platform_id: PlatformId, is_admin: bool) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET is_admin = ?1 WHERE platform_id = ?2",
                rusqlite::params![is_admin, platform_id.get()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("user {platform_id}")));
            }
            Ok(())
        })
    }

    /// All users, oldest registration first.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<User>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_user(row)?);
            }
            Ok(results)
        })
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn count_admins(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM users WHERE is_admin = 1", [], |row| {
                    row.get(0)
                })?;
            Ok(n as u64)
        })
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<User, StoreError> {
    let created_at: String = row_helpers::get(row, 6, "users", "created_at")?;
    let created_at: DateTime<Utc> = row_helpers::parse_timestamp(&created_at, "users", "created_at")?;

    Ok(User {
        id: UserId::new(row_helpers::get(row, 0, "users", "id")?),
        platform_id: PlatformId::new(row_helpers::get(row, 1, "users", "platform_id")?),
        username: row_helpers::get_opt(row, 2, "users", "username")?,
        given_name: row_helpers::get(row, 3, "users", "given_name")?,
        family_name: row_helpers::get_opt(row, 4, "users", "family_name")?,
        is_admin: row_helpers::get(row, 5, "users", "is_admin")?,
        created_at,
    })
}
