//! User repository.

use std::sync::Arc;

use crate::entities::{User, user, user::UserRole};
use civicdesk_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::OnConflict,
};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a user by email (case-insensitive; emails are stored lowercase).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a user unless one with the same email exists.
    ///
    /// Returns the number of rows inserted (0 when the email was taken).
    pub async fn insert_if_email_absent(&self, model: user::ActiveModel) -> AppResult<u64> {
        User::insert(model)
            .on_conflict(
                OnConflict::column(user::Column::Email)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active users holding `role` in `ward`.
    pub async fn find_active_by_role_in_ward(
        &self,
        role: UserRole,
        ward: &str,
    ) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(user::Column::Role.eq(role))
            .filter(user::Column::Ward.eq(ward))
            .filter(user::Column::IsActive.eq(true))
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All active administrators.
    pub async fn find_active_admins(&self) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(user::Column::Role.eq(UserRole::Admin))
            .filter(user::Column::IsActive.eq(true))
            .order_by_asc(user::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_user(id: &str, email: &str, role: UserRole) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: email.to_string(),
            name: Some("Test User".to_string()),
            phone: None,
            role,
            ward: Some("W1".to_string()),
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let user = create_test_user("user1", "officer@test.com", UserRole::WardOfficer);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.find_by_id("user1").await.unwrap();

        assert!(result.is_some());
        let found = result.unwrap();
        assert_eq!(found.id, "user1");
        assert_eq!(found.role, UserRole::WardOfficer);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("nonexistent").await;

        match result {
            Err(AppError::UserNotFound(id)) => assert_eq!(id, "nonexistent"),
            _ => panic!("Expected UserNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_find_by_email_lowercases() {
        let user = create_test_user("user1", "citizen@test.com", UserRole::Citizen);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let found = repo.find_by_email("Citizen@Test.COM").await.unwrap();
        assert_eq!(found.unwrap().email, "citizen@test.com");
    }

    #[tokio::test]
    async fn test_insert_if_email_absent_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let model = user::ActiveModel {
            id: sea_orm::Set("user2".to_string()),
            email: sea_orm::Set("citizen@test.com".to_string()),
            name: sea_orm::Set(None),
            phone: sea_orm::Set(None),
            role: sea_orm::Set(UserRole::Citizen),
            ward: sea_orm::Set(None),
            is_active: sea_orm::Set(true),
            created_at: sea_orm::Set(Utc::now().into()),
            updated_at: sea_orm::Set(None),
        };

        let inserted = repo.insert_if_email_absent(model).await.unwrap();
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn test_find_active_admins() {
        let admin = create_test_user("admin1", "admin@test.com", UserRole::Admin);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[admin]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let admins = repo.find_active_admins().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].role, UserRole::Admin);
    }
}
