//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewUser, User};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  Fails with [`StoreError::AlreadyExists`] when the
    /// username is taken.
    pub fn create_user(&self, new: &NewUser) -> Result<User> {
        let now = Utc::now();
        let result = self.conn().execute(
            "INSERT INTO users (username, first_name, last_name, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.username,
                new.first_name,
                new.last_name,
                new.email,
                new.password_hash,
                now.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(User {
                id: self.conn().last_insert_rowid(),
                username: new.username.clone(),
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                email: new.email.clone(),
                thumbnail_url: None,
                created_at: now,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists(new.username.clone()))
            }
            Err(other) => Err(other.into()),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, first_name, last_name, email, thumbnail_url, created_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Fetch a single user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, first_name, last_name, email, thumbnail_url, created_at
                 FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Case-insensitive substring search over username / first name / last
    /// name, excluding the caller.  Results are ordered by username for a
    /// stable reply.
    pub fn search_users(&self, query: &str, exclude_id: i64) -> Result<Vec<User>> {
        let pattern = format!("%{}%", escape_like(query));
        let mut stmt = self.conn().prepare(
            "SELECT id, username, first_name, last_name, email, thumbnail_url, created_at
             FROM users
             WHERE id != ?1
               AND (username LIKE ?2 ESCAPE '\\'
                    OR first_name LIKE ?2 ESCAPE '\\'
                    OR last_name LIKE ?2 ESCAPE '\\')
             ORDER BY username",
        )?;

        let rows = stmt.query_map(params![exclude_id, pattern], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Persist a new thumbnail URL on a user.
    pub fn set_thumbnail_url(&self, user_id: i64, url: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET thumbnail_url = ?2 WHERE id = ?1",
            params![user_id, url],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Escape SQL LIKE wildcards so user input matches literally.
fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub(crate) fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let ts_str: String = row.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        thumbnail_url: row.get(5)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(username: &str, first: &str, last: &str) -> NewUser {
        NewUser {
            username: username.into(),
            first_name: first.into(),
            last_name: last.into(),
            email: format!("{username}@example.com"),
            password_hash: "x".into(),
        }
    }

    #[test]
    fn create_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_user(&fixture("alice", "Alice", "Liddell")).unwrap();

        let by_id = db.get_user(created.id).unwrap();
        assert_eq!(by_id.username, "alice");

        let by_name = db.get_user_by_username("alice").unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&fixture("alice", "", "")).unwrap();
        let err = db.create_user(&fixture("alice", "", "")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.get_user(42), Err(StoreError::NotFound)));
        assert!(matches!(
            db.get_user_by_username("ghost"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn search_is_case_insensitive_and_excludes_caller() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(&fixture("alice", "Alice", "Liddell")).unwrap();
        db.create_user(&fixture("malice", "Mal", "Ice")).unwrap();
        db.create_user(&fixture("bob", "Robert", "Liddell")).unwrap();

        let hits = db.search_users("LID", alice.id).unwrap();
        // Matches bob by last name; alice herself is excluded.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "bob");

        let hits = db.search_users("ice", alice.id).unwrap();
        assert_eq!(hits.len(), 1); // malice, via username and last name
        assert_eq!(hits[0].username, "malice");
    }

    #[test]
    fn search_with_no_hits_is_empty_not_error() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(&fixture("alice", "", "")).unwrap();
        assert!(db.search_users("zzz", alice.id).unwrap().is_empty());
    }

    #[test]
    fn like_wildcards_are_literal() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(&fixture("alice", "", "")).unwrap();
        db.create_user(&fixture("bob", "", "")).unwrap();
        // A bare "%" must not match everything.
        assert!(db.search_users("%", alice.id).unwrap().is_empty());
    }

    #[test]
    fn thumbnail_update() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user(&fixture("alice", "", "")).unwrap();
        db.set_thumbnail_url(alice.id, "http://cdn/alice.jpg").unwrap();
        assert_eq!(
            db.get_user(alice.id).unwrap().thumbnail_url.as_deref(),
            Some("http://cdn/alice.jpg")
        );

        assert!(matches!(
            db.set_thumbnail_url(999, "x"),
            Err(StoreError::NotFound)
        ));
    }
}
