use chrono::DateTime;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::validator::{self, Validator, EMAIL_RX, NUL_MESSAGE};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created: DateTime<chrono::Utc>,
}

#[derive(FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub hashed_password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UserSignupForm {
    #[garde(custom(check_text))]
    pub name: String,
    #[garde(custom(check_email))]
    pub email: String,
    #[garde(custom(check_new_password))]
    pub password: String,
}

impl UserSignupForm {
    pub fn check(&self) -> Validator {
        match self.validate() {
            Ok(()) => Validator::new(),
            Err(report) => report.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UserLoginForm {
    #[garde(custom(check_email))]
    pub email: String,
    #[garde(custom(check_not_blank))]
    pub password: String,
}

impl UserLoginForm {
    pub fn check(&self) -> Validator {
        match self.validate() {
            Ok(()) => Validator::new(),
            Err(report) => report.into(),
        }
    }
}

fn check_not_blank(value: &str, _ctx: &()) -> garde::Result {
    if !validator::not_blank(value) {
        return Err(garde::Error::new("This field cannot be blank"));
    }
    Ok(())
}

fn check_text(value: &str, ctx: &()) -> garde::Result {
    check_not_blank(value, ctx)?;
    if !validator::no_nul(value) {
        return Err(garde::Error::new(NUL_MESSAGE));
    }
    Ok(())
}

fn check_email(value: &str, ctx: &()) -> garde::Result {
    check_text(value, ctx)?;
    if !validator::matches(value, &EMAIL_RX) {
        return Err(garde::Error::new("This field must be a valid email address"));
    }
    Ok(())
}

fn check_new_password(value: &str, ctx: &()) -> garde::Result {
    check_not_blank(value, ctx)?;
    if !validator::min_chars(value, 8) {
        return Err(garde::Error::new(
            "This field must be at least 8 characters long",
        ));
    }
    Ok(())
}
