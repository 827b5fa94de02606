use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Secondary hostname routed to an existing tenant (`tenant_domains` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Domain {
    pub id: i64,
    pub tenant_id: i64,
    pub domain: String,

    #[sqlx(json)]
    pub meta: serde_json::Value,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create domain alias request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewDomain {
    pub tenant_id: i64,

    #[validate(length(min = 1, max = 255))]
    pub domain: String,

    #[serde(default)]
    pub meta: serde_json::Value,
}
