use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    db::{DbError, DbResult, QueryExecutor, Rows, Statement},
    models::agent_memory::{
        AgentSession, MemoryItem, MemoryItemsQuery, NewMemoryItem, NewSession, SessionChanges,
    },
    repository::capped_limit,
};

pub const DEFAULT_ITEM_LIMIT: i64 = 50;
pub const DEFAULT_SESSION_LIMIT: i64 = 10;

const ITEM_COLUMNS: &str = "id, user_id, session_id, memory_type, category, content, metadata, \
     created_at, updated_at, expires_at";

const SESSION_COLUMNS: &str = "id, session_id, user_id, started_at, last_activity, status, \
     summary, capabilities_used, activities_created, metadata";

pub fn insert_item_statement(user_id: Uuid, item: &NewMemoryItem) -> DbResult<Statement> {
    let content = item
        .content
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| DbError::Validation("content is required".to_string()))?;

    Ok(Statement::with_params(
        format!(
            "INSERT INTO agent_memory \
             (user_id, session_id, memory_type, category, content, metadata, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {ITEM_COLUMNS}"
        ),
        vec![
            user_id.into(),
            item.session_id.as_deref().unwrap_or("").into(),
            item.memory_type.as_deref().unwrap_or("working").into(),
            item.category.as_deref().unwrap_or("").into(),
            content.into(),
            item.metadata.clone().unwrap_or_else(|| json!({})).into(),
            item.expires_at.into(),
        ],
    ))
}

/// Unexpired items, newest first
pub fn list_items_statement(user_id: Uuid, query: &MemoryItemsQuery) -> Statement {
    let mut statement = Statement::new(format!("SELECT {ITEM_COLUMNS} FROM agent_memory WHERE user_id = "));
    let p = statement.bind(user_id);
    statement.push(&p);

    if let Some(session_id) = &query.session_id {
        let p = statement.bind(session_id.as_str());
        statement.push(&format!(" AND session_id = {p}"));
    }
    if let Some(memory_type) = &query.memory_type {
        let p = statement.bind(memory_type.as_str());
        statement.push(&format!(" AND memory_type = {p}"));
    }

    let limit = statement.bind(capped_limit(query.limit, DEFAULT_ITEM_LIMIT));
    statement.push(&format!(
        " AND (expires_at IS NULL OR expires_at > NOW()) ORDER BY created_at DESC LIMIT {limit}"
    ));
    statement
}

/// Insert a session, or touch it when the caller already owns that id.
/// A session id held by another profile yields no row.
pub fn upsert_session_statement(user_id: Uuid, session: &NewSession) -> DbResult<Statement> {
    let session_id = session
        .session_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DbError::Validation("session_id is required".to_string()))?;

    let json_or = |value: &Option<Value>, default: Value| value.clone().unwrap_or(default);

    Ok(Statement::with_params(
        format!(
            "INSERT INTO agent_sessions \
             (session_id, user_id, status, capabilities_used, activities_created, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (session_id) DO UPDATE SET \
             last_activity = NOW(), status = EXCLUDED.status \
             WHERE agent_sessions.user_id = EXCLUDED.user_id \
             RETURNING {SESSION_COLUMNS}"
        ),
        vec![
            session_id.into(),
            user_id.into(),
            session.status.as_deref().unwrap_or("active").into(),
            json_or(&session.capabilities_used, json!([])).into(),
            json_or(&session.activities_created, json!([])).into(),
            json_or(&session.metadata, json!({})).into(),
        ],
    ))
}

/// Always refreshes `last_activity`, to the given time or `NOW()`
pub fn update_session_statement(user_id: Uuid, session_id: &str, changes: &SessionChanges) -> Statement {
    let mut statement = Statement::new("UPDATE agent_sessions SET ");
    let mut assignments = Vec::new();

    if let Some(summary) = &changes.summary {
        let p = statement.bind(summary.as_str());
        assignments.push(format!("summary = {p}"));
    }
    if let Some(capabilities) = &changes.capabilities_used {
        let p = statement.bind(capabilities.clone());
        assignments.push(format!("capabilities_used = {p}"));
    }
    if let Some(activities) = &changes.activities_created {
        let p = statement.bind(activities.clone());
        assignments.push(format!("activities_created = {p}"));
    }
    if let Some(status) = &changes.status {
        let p = statement.bind(status.as_str());
        assignments.push(format!("status = {p}"));
    }
    match changes.last_activity {
        Some(at) => {
            let p = statement.bind(Some(at));
            assignments.push(format!("last_activity = {p}"));
        }
        None => assignments.push("last_activity = NOW()".to_string()),
    }

    statement.push(&assignments.join(", "));
    let session = statement.bind(session_id);
    let user = statement.bind(user_id);
    statement.push(&format!(
        " WHERE session_id = {session} AND user_id = {user} RETURNING {SESSION_COLUMNS}"
    ));
    statement
}

/// Assistant working memory and session bookkeeping, scoped per profile
#[derive(Debug, Clone)]
pub struct AgentMemoryRepository {
    executor: QueryExecutor,
}

impl AgentMemoryRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    pub async fn save_item(&self, user_id: Uuid, item: &NewMemoryItem) -> DbResult<MemoryItem> {
        self.executor
            .fetch::<MemoryItem>(&insert_item_statement(user_id, item)?)
            .await?
            .single_or_not_found("Memory insert returned no row")
    }

    pub async fn list_items(&self, user_id: Uuid, query: &MemoryItemsQuery) -> DbResult<Rows<MemoryItem>> {
        self.executor
            .fetch(&list_items_statement(user_id, query))
            .await
    }

    pub async fn upsert_session(&self, user_id: Uuid, session: &NewSession) -> DbResult<AgentSession> {
        self.executor
            .fetch::<AgentSession>(&upsert_session_statement(user_id, session)?)
            .await?
            .into_first()
            .ok_or_else(|| DbError::Conflict("session id belongs to another profile".to_string()))
    }

    pub async fn list_sessions(&self, user_id: Uuid, limit: Option<i64>) -> DbResult<Rows<AgentSession>> {
        let limit = capped_limit(limit, DEFAULT_SESSION_LIMIT);
        self.executor
            .fetch(&Statement::with_params(
                format!(
                    "SELECT {SESSION_COLUMNS} FROM agent_sessions WHERE user_id = $1 \
                     ORDER BY last_activity DESC LIMIT $2"
                ),
                vec![user_id.into(), limit.into()],
            ))
            .await
    }

    pub async fn update_session(
        &self,
        user_id: Uuid,
        session_id: &str,
        changes: &SessionChanges,
    ) -> DbResult<AgentSession> {
        self.executor
            .fetch::<AgentSession>(&update_session_statement(user_id, session_id, changes))
            .await?
            .single_or_not_found("Session not found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Param, RetryPolicy};
    use crate::repository::MAX_PAGE_SIZE;
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    #[test]
    fn item_content_is_required() {
        let item = NewMemoryItem::default();
        assert!(matches!(
            insert_item_statement(Uuid::new_v4(), &item),
            Err(DbError::Validation(msg)) if msg == "content is required"
        ));
    }

    #[test]
    fn item_defaults_are_applied() {
        let item = NewMemoryItem {
            content: Some("prefers visual examples".into()),
            ..Default::default()
        };
        let statement = insert_item_statement(Uuid::new_v4(), &item).unwrap();
        let params = statement.params();
        assert_eq!(params[1], Param::Text(String::new()));
        assert_eq!(params[2], Param::Text("working".into()));
        assert_eq!(params[5], Param::Json(json!({})));
        assert_eq!(params[6], Param::Timestamp(None));
    }

    #[test]
    fn item_listing_applies_optional_filters() {
        let query = MemoryItemsQuery {
            memory_type: Some("long_term".into()),
            ..Default::default()
        };
        let statement = list_items_statement(Uuid::new_v4(), &query);
        assert!(statement.sql().contains("WHERE user_id = $1 AND memory_type = $2 AND (expires_at IS NULL"));
        assert!(statement.sql().ends_with("ORDER BY created_at DESC LIMIT $3"));
        assert_eq!(statement.params()[2], Param::BigInt(DEFAULT_ITEM_LIMIT));
    }

    #[test]
    fn session_id_is_required() {
        assert!(matches!(
            upsert_session_statement(Uuid::new_v4(), &NewSession::default()),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn conflicting_upsert_only_touches_own_sessions() {
        let session = NewSession {
            session_id: Some("s-1".into()),
            ..Default::default()
        };
        let statement = upsert_session_statement(Uuid::new_v4(), &session).unwrap();
        assert!(statement.sql().contains(
            "status = EXCLUDED.status WHERE agent_sessions.user_id = EXCLUDED.user_id RETURNING"
        ));
    }

    #[test]
    fn oversized_limits_are_capped() {
        let query = MemoryItemsQuery {
            limit: Some(i64::MAX),
            ..Default::default()
        };
        let statement = list_items_statement(Uuid::new_v4(), &query);
        assert_eq!(statement.params()[1], Param::BigInt(MAX_PAGE_SIZE));
    }

    #[test]
    fn session_update_always_touches_last_activity_once() {
        let statement = update_session_statement(Uuid::new_v4(), "s-1", &SessionChanges::default());
        assert!(statement.sql().starts_with(
            "UPDATE agent_sessions SET last_activity = NOW() WHERE session_id = $1 AND user_id = $2"
        ));

        let changes = SessionChanges {
            status: Some("closed".into()),
            last_activity: Some(Utc::now()),
            ..Default::default()
        };
        let statement = update_session_statement(Uuid::new_v4(), "s-1", &changes);
        assert_eq!(statement.sql().matches("last_activity =").count(), 1);
        assert!(!statement.sql().contains("NOW()"));
    }

    fn repo(pool: PgPool) -> AgentMemoryRepository {
        AgentMemoryRepository::new(QueryExecutor::new(pool, RetryPolicy::default()))
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn expired_items_are_hidden(pool: PgPool) {
        let repo = repo(pool);
        let user = Uuid::new_v4();
        for (content, expires_at) in [
            ("kept", None),
            ("stale", Some(Utc::now() - Duration::hours(1))),
        ] {
            repo.save_item(
                user,
                &NewMemoryItem {
                    content: Some(content.into()),
                    expires_at,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        let items = repo.list_items(user, &MemoryItemsQuery::default()).await.unwrap();
        assert_eq!(items.row_count, 1);
        assert_eq!(items.data[0].content, "kept");
        assert!(repo
            .list_items(Uuid::new_v4(), &MemoryItemsQuery::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn upsert_keeps_the_first_payload(pool: PgPool) {
        let repo = repo(pool);
        let user = Uuid::new_v4();
        let first = repo
            .upsert_session(
                user,
                &NewSession {
                    session_id: Some("s-1".into()),
                    capabilities_used: Some(json!(["quiz"])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = repo
            .upsert_session(
                user,
                &NewSession {
                    session_id: Some("s-1".into()),
                    status: Some("paused".into()),
                    capabilities_used: Some(json!(["other"])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.status, "paused");
        assert_eq!(second.capabilities_used, json!(["quiz"]));
        assert!(second.last_activity >= first.last_activity);

        assert!(matches!(
            repo.update_session(Uuid::new_v4(), "s-1", &SessionChanges::default()).await,
            Err(DbError::NotFound(_))
        ));
        assert_eq!(repo.list_sessions(user, None).await.unwrap().row_count, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn another_profile_cannot_take_over_a_session(pool: PgPool) {
        let repo = repo(pool);
        let owner = Uuid::new_v4();
        let session = NewSession {
            session_id: Some("s-shared".into()),
            metadata: Some(json!({"topic": "frações"})),
            ..Default::default()
        };
        repo.upsert_session(owner, &session).await.unwrap();

        let intruder = NewSession {
            session_id: Some("s-shared".into()),
            status: Some("closed".into()),
            ..Default::default()
        };
        assert!(matches!(
            repo.upsert_session(Uuid::new_v4(), &intruder).await,
            Err(DbError::Conflict(_))
        ));

        let sessions = repo.list_sessions(owner, None).await.unwrap();
        assert_eq!(sessions.data[0].status, "active");
        assert_eq!(sessions.data[0].metadata, json!({"topic": "frações"}));
    }
}
