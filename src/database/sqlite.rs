//! SQLite implementation of the store traits
//!
//! One `tokio_rusqlite::Connection` serializes all statements behind an
//! async facade; WAL is not needed because every store call is a single
//! statement. Use `:memory:` for tests.

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::{PathStore, TokenStore, UserStore};
use crate::error::DbError;
use crate::models::{NewUser, PathEntry, PathInfo, SessionToken, User, UserInfo};

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open a database and apply the schema
    ///
    /// Use `:memory:` for an in-memory database or a file path for
    /// persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_admin: row.get(2)?,
        password_hash: row.get(3)?,
        api_key_secret_hash: row.get(4)?,
        api_key_fingerprint: row.get(5)?,
    })
}

const USER_COLUMNS: &str =
    "id, username, is_admin, password_hash, api_key_secret_hash, api_key_fingerprint";

#[async_trait]
impl UserStore for SqliteDatabase {
    async fn get_user(&self, username: &str) -> Result<Option<User>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users WHERE username = ?1",
                    USER_COLUMNS
                ))?;
                let user = stmt.query_row([&username], user_from_row).optional()?;
                Ok(user)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_user_by_fingerprint(&self, fingerprint: &str) -> Result<Option<User>, DbError> {
        let fingerprint = fingerprint.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM users WHERE api_key_fingerprint = ?1",
                    USER_COLUMNS
                ))?;
                let user = stmt.query_row([&fingerprint], user_from_row).optional()?;
                Ok(user)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_user_info(&self, username: &str) -> Result<Option<UserInfo>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT users.username, users.is_admin, paths.path, paths.target
                    FROM users LEFT JOIN paths ON users.id = paths.user_id
                    WHERE users.username = ?1
                    ORDER BY paths.path
                    "#,
                )?;

                let mut rows = stmt.query([&username])?;
                let mut info: Option<UserInfo> = None;

                while let Some(row) = rows.next()? {
                    let entry = info.get_or_insert_with(|| UserInfo {
                        username: String::new(),
                        is_admin: false,
                        paths: Vec::new(),
                    });
                    entry.username = row.get(0)?;
                    entry.is_admin = row.get(1)?;

                    if let Some(path) = row.get::<_, Option<String>>(2)? {
                        entry.paths.push(PathInfo {
                            path,
                            target: row.get(3)?,
                        });
                    }
                }

                Ok(info)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_users(&self) -> Result<Vec<UserInfo>, DbError> {
        self.conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT username, is_admin FROM users ORDER BY username")?;

                let users = stmt
                    .query_map([], |row| {
                        Ok(UserInfo {
                            username: row.get(0)?,
                            is_admin: row.get(1)?,
                            paths: Vec::new(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(users)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_user(&self, user: &NewUser) -> Result<(), DbError> {
        let user = user.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO users
                    (username, is_admin, password_hash, api_key_secret_hash, api_key_fingerprint)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    rusqlite::params![
                        user.username,
                        user.is_admin,
                        user.password_hash,
                        user.api_key_secret_hash,
                        user.api_key_fingerprint
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn update_password(&self, username: &str, password_hash: &str) -> Result<(), DbError> {
        let username = username.to_string();
        let password_hash = password_hash.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET password_hash = ?2 WHERE username = ?1",
                    rusqlite::params![username, password_hash],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn update_api_key(
        &self,
        username: &str,
        fingerprint: &str,
        secret_hash: &str,
    ) -> Result<(), DbError> {
        let username = username.to_string();
        let fingerprint = fingerprint.to_string();
        let secret_hash = secret_hash.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    UPDATE users SET api_key_fingerprint = ?2, api_key_secret_hash = ?3
                    WHERE username = ?1
                    "#,
                    rusqlite::params![username, fingerprint, secret_hash],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_user(&self, username: &str) -> Result<(), DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM users WHERE username = ?1", [&username])?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl PathStore for SqliteDatabase {
    async fn get_target(&self, path: &str) -> Result<Option<String>, DbError> {
        let path = path.to_string();

        self.conn
            .call(move |conn| {
                let target = conn
                    .query_row(
                        "SELECT target FROM paths WHERE path = ?1",
                        [&path],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(target)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_path(&self, entry: &PathEntry) -> Result<(), DbError> {
        let entry = entry.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO paths (path, target, user_id) VALUES (?1, ?2, ?3)",
                    rusqlite::params![entry.path, entry.target, entry.user_id],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_path(&self, path: &str, owner: Option<i64>) -> Result<(), DbError> {
        let path = path.to_string();

        self.conn
            .call(move |conn| {
                match owner {
                    Some(user_id) => conn.execute(
                        "DELETE FROM paths WHERE path = ?1 AND user_id = ?2",
                        rusqlite::params![path, user_id],
                    )?,
                    None => conn.execute("DELETE FROM paths WHERE path = ?1", [&path])?,
                };
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl TokenStore for SqliteDatabase {
    async fn get_token(&self, token: &str) -> Result<Option<SessionToken>, DbError> {
        let token = token.to_string();

        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT token, username, expires_at FROM session_tokens WHERE token = ?1",
                        [&token],
                        |row| {
                            Ok(SessionToken {
                                token: row.get(0)?,
                                username: row.get(1)?,
                                expires_at: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_token_for_user(&self, username: &str) -> Result<Option<SessionToken>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT token, username, expires_at FROM session_tokens WHERE username = ?1",
                        [&username],
                        |row| {
                            Ok(SessionToken {
                                token: row.get(0)?,
                                username: row.get(1)?,
                                expires_at: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_token(&self, token: &SessionToken) -> Result<(), DbError> {
        let token = token.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO session_tokens (token, username, expires_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![token.token, token.username, token.expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn update_token_expiry(&self, token: &str, expires_at: i64) -> Result<(), DbError> {
        let token = token.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE session_tokens SET expires_at = ?2 WHERE token = ?1",
                    rusqlite::params![token, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn delete_token_for_user(&self, username: &str) -> Result<(), DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM session_tokens WHERE username = ?1",
                    [&username],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> SqliteDatabase {
        SqliteDatabase::in_memory().await.unwrap()
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            is_admin: false,
            password_hash: format!("ph-{}", name),
            api_key_secret_hash: format!("kh-{}", name),
            api_key_fingerprint: format!("fp-{}", name),
        }
    }

    // Test 1: insert then fetch a user by username
    #[tokio::test]
    async fn test_insert_and_get_user() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();

        let user = db.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin);
        assert_eq!(user.password_hash, "ph-alice");
        assert_eq!(user.api_key_fingerprint, "fp-alice");

        assert!(db.get_user("bob").await.unwrap().is_none());
    }

    // Test 2: fetch a user by API-key fingerprint
    #[tokio::test]
    async fn test_get_user_by_fingerprint() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();

        let user = db.get_user_by_fingerprint("fp-alice").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");

        assert!(db.get_user_by_fingerprint("fp-none").await.unwrap().is_none());
    }

    // Test 3: duplicate username surfaces as Duplicate
    #[tokio::test]
    async fn test_duplicate_username() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();

        let mut dup = new_user("alice");
        dup.api_key_fingerprint = "different".to_string();
        let result = db.insert_user(&dup).await;
        assert!(matches!(result, Err(DbError::Duplicate)));
    }

    // Test 4: duplicate fingerprint surfaces as Duplicate
    #[tokio::test]
    async fn test_duplicate_fingerprint() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();

        let mut dup = new_user("bob");
        dup.api_key_fingerprint = "fp-alice".to_string();
        let result = db.insert_user(&dup).await;
        assert!(matches!(result, Err(DbError::Duplicate)));
    }

    // Test 5: user info joins owned paths, empty list for none
    #[tokio::test]
    async fn test_get_user_info() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();
        let alice = db.get_user("alice").await.unwrap().unwrap();

        let info = db.get_user_info("alice").await.unwrap().unwrap();
        assert_eq!(info.username, "alice");
        assert!(info.paths.is_empty());

        db.insert_path(&PathEntry {
            path: "gl".to_string(),
            target: "http://google.com".to_string(),
            user_id: alice.id,
        })
        .await
        .unwrap();

        let info = db.get_user_info("alice").await.unwrap().unwrap();
        assert_eq!(info.paths.len(), 1);
        assert_eq!(info.paths[0].path, "gl");

        assert!(db.get_user_info("bob").await.unwrap().is_none());
    }

    // Test 6: list users
    #[tokio::test]
    async fn test_list_users() {
        let db = test_db().await;
        db.insert_user(&new_user("bob")).await.unwrap();
        db.insert_user(&new_user("alice")).await.unwrap();

        let users = db.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "alice");
        assert_eq!(users[1].username, "bob");
    }

    // Test 7: password and API-key updates are independent
    #[tokio::test]
    async fn test_credential_updates_independent() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();

        db.update_password("alice", "new-ph").await.unwrap();
        let user = db.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-ph");
        assert_eq!(user.api_key_secret_hash, "kh-alice");

        db.update_api_key("alice", "new-fp", "new-kh").await.unwrap();
        let user = db.get_user("alice").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-ph");
        assert_eq!(user.api_key_fingerprint, "new-fp");
        assert_eq!(user.api_key_secret_hash, "new-kh");
    }

    // Test 8: path insert, lookup and duplicate detection
    #[tokio::test]
    async fn test_path_crud() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();
        let alice = db.get_user("alice").await.unwrap().unwrap();

        let entry = PathEntry {
            path: "gl".to_string(),
            target: "http://google.com".to_string(),
            user_id: alice.id,
        };
        db.insert_path(&entry).await.unwrap();

        let target = db.get_target("gl").await.unwrap();
        assert_eq!(target, Some("http://google.com".to_string()));
        assert!(db.get_target("missing").await.unwrap().is_none());

        let result = db.insert_path(&entry).await;
        assert!(matches!(result, Err(DbError::Duplicate)));
    }

    // Test 9: owner-scoped delete only removes the owner's row
    #[tokio::test]
    async fn test_delete_path_owner_scoped() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();
        let alice = db.get_user("alice").await.unwrap().unwrap();

        db.insert_path(&PathEntry {
            path: "gl".to_string(),
            target: "http://google.com".to_string(),
            user_id: alice.id,
        })
        .await
        .unwrap();

        // Wrong owner: row stays
        db.delete_path("gl", Some(alice.id + 1)).await.unwrap();
        assert!(db.get_target("gl").await.unwrap().is_some());

        // Right owner: row goes
        db.delete_path("gl", Some(alice.id)).await.unwrap();
        assert!(db.get_target("gl").await.unwrap().is_none());

        // Deleting an absent row is not an error
        db.delete_path("gl", None).await.unwrap();
    }

    // Test 10: unscoped delete removes any owner's row
    #[tokio::test]
    async fn test_delete_path_admin() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();
        let alice = db.get_user("alice").await.unwrap().unwrap();

        db.insert_path(&PathEntry {
            path: "gl".to_string(),
            target: "http://google.com".to_string(),
            user_id: alice.id,
        })
        .await
        .unwrap();

        db.delete_path("gl", None).await.unwrap();
        assert!(db.get_target("gl").await.unwrap().is_none());
    }

    // Test 11: session token round-trip and one-per-user constraint
    #[tokio::test]
    async fn test_session_token_crud() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();

        let token = SessionToken::new("tok-1", "alice", 1_000);
        db.insert_token(&token).await.unwrap();

        let fetched = db.get_token("tok-1").await.unwrap().unwrap();
        assert_eq!(fetched, token);

        let by_user = db.get_token_for_user("alice").await.unwrap().unwrap();
        assert_eq!(by_user.token, "tok-1");

        // Second live token for the same user violates the constraint
        let second = SessionToken::new("tok-2", "alice", 2_000);
        assert!(matches!(
            db.insert_token(&second).await,
            Err(DbError::Duplicate)
        ));

        db.delete_token_for_user("alice").await.unwrap();
        assert!(db.get_token("tok-1").await.unwrap().is_none());
    }

    // Test 12: expiry update touches only the expiration
    #[tokio::test]
    async fn test_update_token_expiry() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();
        db.insert_token(&SessionToken::new("tok-1", "alice", 1_000))
            .await
            .unwrap();

        db.update_token_expiry("tok-1", 5_000).await.unwrap();

        let fetched = db.get_token("tok-1").await.unwrap().unwrap();
        assert_eq!(fetched.token, "tok-1");
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.expires_at, 5_000);
    }

    // Test 13: deleting a user cascades to paths and session tokens
    #[tokio::test]
    async fn test_user_deletion_cascades() {
        let db = test_db().await;
        db.insert_user(&new_user("alice")).await.unwrap();
        let alice = db.get_user("alice").await.unwrap().unwrap();

        db.insert_path(&PathEntry {
            path: "gl".to_string(),
            target: "http://google.com".to_string(),
            user_id: alice.id,
        })
        .await
        .unwrap();
        db.insert_token(&SessionToken::new("tok-1", "alice", 1_000))
            .await
            .unwrap();

        db.delete_user("alice").await.unwrap();

        assert!(db.get_user("alice").await.unwrap().is_none());
        assert!(db.get_target("gl").await.unwrap().is_none());
        assert!(db.get_token("tok-1").await.unwrap().is_none());
    }
}
