use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Working-memory entry recorded by the assistant for a profile
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct MemoryItem {
    pub id: i64,
    pub user_id: Uuid,
    pub session_id: String,
    pub memory_type: String,
    pub category: String,
    pub content: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewMemoryItem {
    pub session_id: Option<String>,
    /// Defaults to "working"
    pub memory_type: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MemoryItemsQuery {
    pub session_id: Option<String>,
    pub memory_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct AgentSession {
    pub id: i64,
    pub session_id: String,
    pub user_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub status: String,
    pub summary: String,
    #[schema(value_type = Object)]
    pub capabilities_used: Value,
    #[schema(value_type = Object)]
    pub activities_created: Value,
    #[schema(value_type = Object)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewSession {
    pub session_id: Option<String>,
    /// Defaults to "active"
    pub status: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub capabilities_used: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub activities_created: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Value>,
}

/// Partial session update; `last_activity` is refreshed regardless
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SessionChanges {
    pub summary: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub capabilities_used: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub activities_created: Option<Value>,
    pub status: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionsQuery {
    pub limit: Option<i64>,
}
