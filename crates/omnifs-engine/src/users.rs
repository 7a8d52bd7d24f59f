//! User management.
//!
//! Creation and deletion go through the container's user table; passwords
//! are stored in the `salt:digest` form. Deletion deactivates the slot so
//! the record survives for audits.

use crate::auth;
use crate::error::{EngineError, Result};
use crate::unix_now;
use omnifs_container::{OmniStore, UserRecord};
use omnifs_protocol::{Role, UserSummary};

/// Creates a user with a freshly salted password hash.
pub fn create_user(store: &mut OmniStore, username: &str, password: &str, role: Role) -> Result<()> {
    if username.is_empty() || username.len() > 31 {
        return Err(EngineError::InvalidOperation(
            "username must be 1-31 characters".to_string(),
        ));
    }
    if password.len() < 4 {
        return Err(EngineError::InvalidOperation(
            "password must be at least 4 characters".to_string(),
        ));
    }

    let record = UserRecord {
        username: username.to_string(),
        password_hash: auth::hash_password(password),
        role: role.as_u32(),
        created_time: unix_now(),
        last_login: 0,
        is_active: true,
    };
    store.users_mut().add(record)?;
    store.persist_users()?;
    tracing::info!(user = username, %role, "user created");
    Ok(())
}

/// Deactivates a user. The slot keeps its record.
pub fn delete_user(store: &mut OmniStore, username: &str) -> Result<()> {
    let mut record = store
        .users()
        .get(username)
        .ok_or_else(|| EngineError::NotFound(username.to_string()))?
        .clone();
    record.is_active = false;
    store.users_mut().update(record)?;
    store.persist_users()?;
    tracing::info!(user = username, "user deactivated");
    Ok(())
}

/// Lists active users, without credentials.
pub fn list_users(store: &OmniStore) -> Vec<UserSummary> {
    store
        .users()
        .list_active()
        .into_iter()
        .map(|record| UserSummary {
            username: record.username.clone(),
            role: Role::from_u32(record.role),
            created_time: record.created_time,
            last_login: record.last_login,
        })
        .collect()
}

/// Seeds the configured admin account when no active admin exists.
pub fn ensure_admin(store: &mut OmniStore, username: &str, password: &str) -> Result<()> {
    let has_admin = store
        .users()
        .list_active()
        .iter()
        .any(|u| Role::from_u32(u.role) == Role::Admin);
    if has_admin {
        return Ok(());
    }
    create_user(store, username, password, Role::Admin)?;
    tracing::info!(user = username, "seeded admin account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use omnifs_container::FormatOptions;
    use tempfile::tempdir;

    fn scratch() -> (tempfile::TempDir, OmniStore) {
        let dir = tempdir().unwrap();
        let store = OmniStore::format(
            dir.path().join("t.omni"),
            &FormatOptions {
                total_size: 1 << 20,
                block_size: 512,
                max_users: 8,
                max_files: 32,
                student_id: String::new(),
                submission_date: String::new(),
            },
        )
        .unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_user_hashes_password() {
        let (_dir, mut store) = scratch();
        create_user(&mut store, "alice", "secret99", Role::Normal).unwrap();

        let record = store.users().get("alice").unwrap();
        assert_ne!(record.password_hash, "secret99");
        assert!(verify_password("secret99", &record.password_hash));
        assert!(!verify_password("wrong", &record.password_hash));
    }

    #[test]
    fn test_validation_rules() {
        let (_dir, mut store) = scratch();
        assert!(create_user(&mut store, "", "secret99", Role::Normal).is_err());
        assert!(create_user(&mut store, &"x".repeat(32), "secret99", Role::Normal).is_err());
        assert!(create_user(&mut store, "bob", "abc", Role::Normal).is_err());
    }

    #[test]
    fn test_delete_then_list() {
        let (_dir, mut store) = scratch();
        create_user(&mut store, "alice", "secret99", Role::Normal).unwrap();
        create_user(&mut store, "bob", "secret99", Role::Admin).unwrap();

        delete_user(&mut store, "alice").unwrap();
        let users = list_users(&store);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");
        assert_eq!(users[0].role, Role::Admin);

        assert!(matches!(
            delete_user(&mut store, "alice"),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_ensure_admin_is_idempotent() {
        let (_dir, mut store) = scratch();
        ensure_admin(&mut store, "admin", "admin123").unwrap();
        ensure_admin(&mut store, "admin", "admin123").unwrap();
        assert_eq!(list_users(&store).len(), 1);

        // A different admin already active: nothing is seeded.
        let (_dir2, mut store2) = scratch();
        create_user(&mut store2, "root", "toor1234", Role::Admin).unwrap();
        ensure_admin(&mut store2, "admin", "admin123").unwrap();
        assert_eq!(list_users(&store2).len(), 1);
    }

    #[test]
    fn test_users_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.omni");
        let mut store = OmniStore::format(
            &path,
            &FormatOptions {
                total_size: 1 << 20,
                block_size: 512,
                max_users: 8,
                max_files: 32,
                student_id: String::new(),
                submission_date: String::new(),
            },
        )
        .unwrap();
        create_user(&mut store, "alice", "secret99", Role::Normal).unwrap();
        store.close().unwrap();

        let store = OmniStore::open(&path).unwrap();
        let record = store.users().get("alice").unwrap();
        assert!(verify_password("secret99", &record.password_hash));
    }
}
