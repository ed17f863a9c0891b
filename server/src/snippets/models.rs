use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::validator::{self, Validator, NUL_MESSAGE};

pub const PERMITTED_EXPIRES: [i32; 3] = [1, 7, 365];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SnippetCreateForm {
    #[garde(custom(check_title))]
    pub title: String,
    #[garde(custom(check_content))]
    pub content: String,
    /// Days until the snippet expires
    #[garde(custom(check_expires))]
    pub expires: i32,
}

impl SnippetCreateForm {
    /// What the create page shows before anything was submitted.
    pub fn blank() -> Self {
        Self {
            expires: 365,
            ..Default::default()
        }
    }

    pub fn check(&self) -> Validator {
        match self.validate() {
            Ok(()) => Validator::new(),
            Err(report) => report.into(),
        }
    }
}

fn check_title(value: &str, _ctx: &()) -> garde::Result {
    if !validator::not_blank(value) {
        return Err(garde::Error::new("This field cannot be blank"));
    }
    if !validator::no_nul(value) {
        return Err(garde::Error::new(NUL_MESSAGE));
    }
    if !validator::max_chars(value, 100) {
        return Err(garde::Error::new(
            "This field cannot be more than 100 characters long",
        ));
    }
    Ok(())
}

fn check_content(value: &str, _ctx: &()) -> garde::Result {
    if !validator::not_blank(value) {
        return Err(garde::Error::new("This field cannot be blank"));
    }
    if !validator::no_nul(value) {
        return Err(garde::Error::new(NUL_MESSAGE));
    }
    Ok(())
}

fn check_expires(value: &i32, _ctx: &()) -> garde::Result {
    if !validator::permitted_value(value, &PERMITTED_EXPIRES) {
        return Err(garde::Error::new("This field must equal 1, 7 or 365"));
    }
    Ok(())
}
