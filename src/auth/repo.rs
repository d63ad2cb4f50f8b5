use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{
    NewUser, RepoError, Role, UniqueField, User, UserCredentials,
};

const USER_COLUMNS: &str = "id, email, name, phone, education, role, \
     photo_external_id, photo_url, created_at";

/// Persistent user records, unique on email and phone.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Same lookup as [`UserRepo::find_by_email`] but re-including the hash.
    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;

    async fn create(&self, new: NewUser) -> Result<User, RepoError>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, RepoError> {
        let creds = sqlx::query_as::<_, UserCredentials>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(creds)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> Result<User, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, phone, education, role,
                               password_hash, photo_external_id, photo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.phone)
        .bind(&new.education)
        .bind(new.role)
        .bind(&new.password_hash)
        .bind(&new.photo.external_id)
        .bind(&new.photo.url)
        .fetch_one(&self.db)
        .await
        .map_err(map_unique_violation)?;
        Ok(user)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, RepoError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at ASC"
        ))
        .bind(role)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}

const UNIQUE_VIOLATION: &str = "23505";

fn map_unique_violation(e: sqlx::Error) -> RepoError {
    let field = match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Some(unique_field_for(db.constraint()))
        }
        _ => None,
    };
    match field {
        Some(field) => RepoError::Duplicate(field),
        None => RepoError::Database(e),
    }
}

fn unique_field_for(constraint: Option<&str>) -> UniqueField {
    match constraint {
        Some("users_email_key") => UniqueField::Email,
        Some("users_phone_key") => UniqueField::Phone,
        _ => UniqueField::Unknown,
    }
}
