use std::sync::Arc;

use futures_util::Stream;
use ta_db::Database;
use ta_types::models::{DEFAULT_AVATAR_COLOR, DEFAULT_USER_NAME};
use ta_types::{Table, User};
use tracing::info;

use crate::error::{Error, Result};
use crate::observe::{blocking, observe};

/// Sender personas.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// All users, oldest first.
    pub async fn all_users(&self) -> Result<Vec<User>> {
        let db = self.db.clone();
        blocking(move || db.all_users()).await
    }

    pub fn observe_users(&self) -> impl Stream<Item = Result<Vec<User>>> + Send + 'static {
        observe(self.db.clone(), &[Table::Users], |db| db.all_users())
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let db = self.db.clone();
        blocking(move || db.get_user(id)).await
    }

    pub async fn default_user(&self) -> Result<Option<User>> {
        let db = self.db.clone();
        blocking(move || db.default_user()).await
    }

    /// Creates a regular (non-default) user.
    pub async fn create_user(&self, name: &str, avatar_color: &str) -> Result<i64> {
        let db = self.db.clone();
        let (owned_name, owned_color) = (name.to_string(), avatar_color.to_string());
        let id = blocking(move || db.insert_user(&owned_name, &owned_color, false)).await?;
        info!("Created user {} ({})", id, name);
        Ok(id)
    }

    /// Saves name and avatar color.
    pub async fn update_user(&self, user: &User) -> Result<()> {
        let db = self.db.clone();
        let owned = user.clone();
        if !blocking(move || db.update_user(&owned)).await? {
            return Err(Error::NotFound { kind: "user", id: user.id });
        }
        Ok(())
    }

    /// Deletes a user. The stored default flag is checked, not the one on
    /// the passed value.
    pub async fn delete_user(&self, user: &User) -> Result<()> {
        let db = self.db.clone();
        let id = user.id;
        let deleted = blocking(move || match db.get_user(id)? {
            Some(stored) if stored.is_default => Ok(None),
            Some(_) => db.delete_user(id).map(Some),
            None => Ok(Some(false)),
        })
        .await?;

        match deleted {
            None => Err(Error::DefaultUserProtected),
            Some(true) => {
                info!("Deleted user {} ({})", id, user.name);
                Ok(())
            }
            Some(false) => Ok(()),
        }
    }

    /// Returns the default user, creating it first if the store has none.
    pub async fn ensure_default_user(&self) -> Result<User> {
        let db = self.db.clone();
        let (user, created) = blocking(move || {
            if let Some(user) = db.default_user()? {
                return Ok((Some(user), false));
            }
            let id = db.insert_user(DEFAULT_USER_NAME, DEFAULT_AVATAR_COLOR, true)?;
            Ok((db.get_user(id)?, true))
        })
        .await?;

        let user = user.ok_or(Error::NotFound { kind: "default user", id: 0 })?;
        if created {
            info!("Created default user {} ({})", user.id, user.name);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ta_types::models::DEFAULT_USER_ID;

    fn repo() -> (Arc<Database>, UserRepository) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (db.clone(), UserRepository::new(db))
    }

    #[tokio::test]
    async fn test_ensure_default_user_is_idempotent() {
        let (_db, repo) = repo();

        let first = repo.ensure_default_user().await.unwrap();
        let second = repo.ensure_default_user().await.unwrap();
        assert_eq!(first, second);
        assert!(first.is_default);

        let defaults = repo
            .all_users()
            .await
            .unwrap()
            .into_iter()
            .filter(|u| u.is_default)
            .count();
        assert_eq!(defaults, 1);
    }

    #[tokio::test]
    async fn test_ensure_default_user_recreates_missing() {
        let (db, repo) = repo();
        db.with_conn_mut(&[Table::Users], |conn| {
            conn.execute("DELETE FROM users", [])?;
            Ok(())
        })
        .unwrap();

        let user = repo.ensure_default_user().await.unwrap();
        assert!(user.is_default);
        assert_eq!(user.name, DEFAULT_USER_NAME);
        assert_eq!(repo.all_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_created_users_are_not_default() {
        let (_db, repo) = repo();
        let id = repo.create_user("Work", "#FF2196F3").await.unwrap();

        let user = repo.get_user(id).await.unwrap().unwrap();
        assert!(!user.is_default);
        assert_eq!(user.avatar_color, "#FF2196F3");
        assert_eq!(repo.default_user().await.unwrap().unwrap().id, DEFAULT_USER_ID);
    }

    #[tokio::test]
    async fn test_default_user_cannot_be_deleted() {
        let (_db, repo) = repo();
        let mut default = repo.ensure_default_user().await.unwrap();

        // a stale copy claiming not to be default is still refused
        default.is_default = false;
        let err = repo.delete_user(&default).await.unwrap_err();
        assert!(matches!(err, Error::DefaultUserProtected));
        assert!(repo.get_user(default.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_and_delete_user() {
        let (_db, repo) = repo();
        let id = repo.create_user("Temp", "#FF795548").await.unwrap();
        let mut user = repo.get_user(id).await.unwrap().unwrap();

        user.name = "Renamed".into();
        repo.update_user(&user).await.unwrap();
        assert_eq!(repo.get_user(id).await.unwrap().unwrap().name, "Renamed");

        repo.delete_user(&user).await.unwrap();
        assert!(repo.get_user(id).await.unwrap().is_none());

        let err = repo.update_user(&user).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "user", .. }));
    }
}
