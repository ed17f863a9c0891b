use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::types::Json;

/// Key/value bag kept server side for one session token.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(BTreeMap<String, serde_json::Value>);

impl SessionData {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.0
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), serde_json::Error> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.0.remove(key)
    }
}

#[derive(sqlx::FromRow)]
pub struct SessionRow {
    pub data: Json<SessionData>,
    pub expiry: DateTime<chrono::Utc>,
}

pub struct SessionRecord {
    pub data: SessionData,
    pub expiry: DateTime<chrono::Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            data: row.data.0,
            expiry: row.expiry,
        }
    }
}
