use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use lazy_static::lazy_static;
use sqlx::PgPool;

use self::models::{User, UserCredentials};

pub mod models;
pub mod routes;

pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_uc_email";

lazy_static! {
    /// Checked against when the email is unknown, so a failed login costs one
    /// argon2 verification either way.
    static ref DUMMY_HASH: Option<String> = hash_password("snippetbox-dummy-password").ok();
}

/// Spends the time of a real password check and always fails.
fn reject_unknown_email(password: &str) -> UsersError {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    UsersError::InvalidCredentials
}

#[derive(thiserror::Error, Debug)]
pub enum UsersError {
    #[error("no matching record found")]
    NoRecord,

    #[error("duplicate email")]
    DuplicateEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("something went wrong")]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Argon2(#[from] argon2::password_hash::Error),
}

#[async_trait]
pub trait UserModel: Send + Sync {
    /// Creates a user, storing only the hash of `password`.
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), UsersError>;

    /// Returns the id of the user with these credentials. Unknown email and
    /// wrong password both yield [`UsersError::InvalidCredentials`].
    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, UsersError>;

    async fn exists(&self, id: i64) -> Result<bool, UsersError>;

    async fn get(&self, id: i64) -> Result<User, UsersError>;
}

pub fn hash_password(password: &str) -> Result<String, UsersError> {
    let salt = SaltString::generate(rand::thread_rng());

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, UsersError> {
    let parsed_password = PasswordHash::new(hashed_password)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_password)
        .is_ok())
}

pub struct PgUserModel {
    db_pool: PgPool,
}

impl PgUserModel {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserModel for PgUserModel {
    async fn insert(&self, name: &str, email: &str, password: &str) -> Result<(), UsersError> {
        let hashed_password = hash_password(password)?;

        let result = sqlx::query(
            r#"
INSERT INTO users (name, email, hashed_password, created)
VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .execute(&self.db_pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_error))
                if db_error.is_unique_violation()
                    && db_error.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) =>
            {
                Err(UsersError::DuplicateEmail)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<i64, UsersError> {
        let Some(user): Option<UserCredentials> = sqlx::query_as(
            r#"
SELECT id, hashed_password FROM users
WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?
        else {
            return Err(reject_unknown_email(password));
        };

        if !verify_password(password, &user.hashed_password)? {
            return Err(UsersError::InvalidCredentials);
        }

        Ok(user.id)
    }

    async fn exists(&self, id: i64) -> Result<bool, UsersError> {
        let (exists,): (bool,) = sqlx::query_as(r#"SELECT EXISTS(SELECT true FROM users WHERE id = $1)"#)
            .bind(id)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(exists)
    }

    async fn get(&self, id: i64) -> Result<User, UsersError> {
        sqlx::query_as(
            r#"
SELECT id, name, email, created FROM users
WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(UsersError::NoRecord)
    }
}
