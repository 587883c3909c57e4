use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    auth::PasswordHasher,
    db::DbPool,
    entities::user::{self, Column as UserColumn, Entity as User, ROLE_ADMIN},
    errors::ServiceError,
};

/// Account projection; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<user::Model> for UserDto {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            is_active: model.is_active,
            created_at: model.created_at,
            last_login_at: model.last_login_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub password: String,
    pub role: String,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateUserInput {
    pub username: String,
    pub role: String,
    pub is_active: bool,
}

/// User administration, keeping at least one active admin at all times
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    hasher: Arc<dyn PasswordHasher>,
    logger: Logger,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, hasher: Arc<dyn PasswordHasher>, logger: Logger) -> Self {
        Self {
            db_pool,
            hasher,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<UserDto>, ServiceError> {
        let users = User::find()
            .order_by_asc(UserColumn::Username)
            .all(&*self.db_pool)
            .await?;
        Ok(users.into_iter().map(UserDto::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<UserDto>, ServiceError> {
        Ok(User::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .map(UserDto::from))
    }

    #[instrument(skip(self, input), fields(username = %input.username, role = %input.role))]
    pub async fn create(&self, input: CreateUserInput) -> Result<UserDto, ServiceError> {
        let password_hash = self.hasher.hash(&input.password)?;
        let txn = self.db_pool.begin().await?;

        self.ensure_username_free(&txn, &input.username, None).await?;

        let created = user::ActiveModel {
            username: Set(input.username.clone()),
            password_hash: Set(password_hash),
            role: Set(input.role),
            is_active: Set(input.is_active),
            created_at: Set(Utc::now()),
            last_login_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| ServiceError::from_write_error(e, username_taken(&input.username)))?;

        txn.commit().await?;

        slog::info!(self.logger, "User created"; "user_id" => created.id, "role" => &created.role);
        Ok(created.into())
    }

    /// `Ok(None)` when the user does not exist. Demoting or deactivating the
    /// last active admin is refused.
    #[instrument(skip(self, input), fields(username = %input.username, role = %input.role))]
    pub async fn update(
        &self,
        id: i32,
        input: UpdateUserInput,
    ) -> Result<Option<UserDto>, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let Some(existing) = User::find_by_id(id).one(&txn).await? else {
            slog::warn!(self.logger, "User not found for update"; "user_id" => id);
            return Ok(None);
        };

        self.ensure_username_free(&txn, &input.username, Some(id))
            .await?;

        let loses_admin = existing.is_admin()
            && existing.is_active
            && (input.role != ROLE_ADMIN || !input.is_active);
        if loses_admin {
            self.ensure_another_active_admin(&txn, "demote or deactivate")
                .await?;
        }

        let mut active: user::ActiveModel = existing.into();
        active.username = Set(input.username.clone());
        active.role = Set(input.role);
        active.is_active = Set(input.is_active);
        let updated = active
            .update(&txn)
            .await
            .map_err(|e| ServiceError::from_write_error(e, username_taken(&input.username)))?;

        txn.commit().await?;

        slog::info!(self.logger, "User updated"; "user_id" => id);
        Ok(Some(updated.into()))
    }

    /// `Ok(false)` when the user does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<bool, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let Some(existing) = User::find_by_id(id).one(&txn).await? else {
            slog::warn!(self.logger, "User not found for deletion"; "user_id" => id);
            return Ok(false);
        };

        if existing.is_admin() {
            self.ensure_another_active_admin(&txn, "delete").await?;
        }

        User::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        slog::info!(self.logger, "User deleted"; "user_id" => id);
        Ok(true)
    }

    /// `Ok(false)` when the user does not exist.
    #[instrument(skip(self))]
    pub async fn toggle_active(&self, id: i32, is_active: bool) -> Result<bool, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let Some(existing) = User::find_by_id(id).one(&txn).await? else {
            slog::warn!(self.logger, "User not found for status change"; "user_id" => id);
            return Ok(false);
        };

        if existing.is_admin() && !is_active {
            self.ensure_another_active_admin(&txn, "deactivate").await?;
        }

        let mut active: user::ActiveModel = existing.into();
        active.is_active = Set(is_active);
        active.update(&txn).await?;
        txn.commit().await?;

        slog::info!(self.logger, "User status changed"; "user_id" => id, "is_active" => is_active);
        Ok(true)
    }

    /// Creates an active admin when none exists yet. Returns the new account.
    #[instrument(skip(self, password))]
    pub async fn ensure_bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserDto>, ServiceError> {
        if self.count_active_admins(&*self.db_pool).await? > 0 {
            return Ok(None);
        }

        slog::warn!(self.logger, "No active admin found; creating bootstrap admin"; "username" => username);
        self.create(CreateUserInput {
            username: username.to_string(),
            password: password.to_string(),
            role: ROLE_ADMIN.to_string(),
            is_active: true,
        })
        .await
        .map(Some)
    }

    async fn count_active_admins<C: ConnectionTrait>(&self, conn: &C) -> Result<u64, ServiceError> {
        Ok(User::find()
            .filter(UserColumn::Role.eq(ROLE_ADMIN))
            .filter(UserColumn::IsActive.eq(true))
            .count(conn)
            .await?)
    }

    async fn ensure_another_active_admin<C: ConnectionTrait>(
        &self,
        conn: &C,
        action: &str,
    ) -> Result<(), ServiceError> {
        let admins = self.count_active_admins(conn).await?;
        if admins <= 1 {
            slog::warn!(self.logger, "Refusing to remove the last active admin"; "action" => action);
            return Err(ServiceError::ValidationError(format!(
                "Cannot {} the last active admin user",
                action
            )));
        }
        Ok(())
    }

    async fn ensure_username_free<C: ConnectionTrait>(
        &self,
        conn: &C,
        username: &str,
        exclude_id: Option<i32>,
    ) -> Result<(), ServiceError> {
        let mut query = User::find().filter(UserColumn::Username.eq(username));
        if let Some(id) = exclude_id {
            query = query.filter(UserColumn::Id.ne(id));
        }
        if query.one(conn).await?.is_some() {
            slog::warn!(self.logger, "Username already exists"; "username" => username);
            return Err(ServiceError::ValidationError(username_taken(username)));
        }
        Ok(())
    }
}

fn username_taken(username: &str) -> String {
    format!("Username '{}' already exists", username)
}
