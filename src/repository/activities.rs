use tracing::info;
use uuid::Uuid;

use crate::{
    db::{DbError, DbResult, QueryExecutor, Rows, Statement},
    models::activity::{Activity, ActivityChanges, ActivityRow, NewActivity, encode_content},
    repository::PageRequest,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;

const ACTIVITY_COLUMNS: &str =
    "codigo_unico, id_usuario, tipo, titulo, conteudo, created_at, updated_at";

pub fn insert_statement(activity: &NewActivity) -> DbResult<Statement> {
    Ok(Statement::with_params(
        format!(
            "INSERT INTO atividades (codigo_unico, id_usuario, tipo, titulo, conteudo) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ACTIVITY_COLUMNS}"
        ),
        vec![
            activity.code.as_str().into(),
            activity.owner_id.into(),
            activity.kind.as_str().into(),
            activity.title.as_str().into(),
            encode_content(&activity.content)?.into(),
        ],
    ))
}

pub fn update_statement(code: &str, changes: &ActivityChanges) -> DbResult<Statement> {
    if changes.is_empty() {
        return Err(DbError::Validation("no fields to update".to_string()));
    }

    let mut statement = Statement::new("UPDATE atividades SET ");
    let mut assignments = Vec::new();

    if let Some(kind) = &changes.kind {
        let p = statement.bind(kind.as_str());
        assignments.push(format!("tipo = {p}"));
    }
    if let Some(title) = &changes.title {
        let p = statement.bind(title.as_str());
        assignments.push(format!("titulo = {p}"));
    }
    if let Some(content) = &changes.content {
        let p = statement.bind(encode_content(content)?);
        assignments.push(format!("conteudo = {p}"));
    }
    assignments.push("updated_at = NOW()".to_string());

    statement.push(&assignments.join(", "));
    let code = statement.bind(code);
    statement.push(&format!(
        " WHERE codigo_unico = {code} RETURNING {ACTIVITY_COLUMNS}"
    ));
    Ok(statement)
}

/// Delete by code, optionally only when `owner` matches
pub fn delete_statement(code: &str, owner: Option<Uuid>) -> Statement {
    let mut statement = Statement::new("DELETE FROM atividades WHERE codigo_unico = ");
    let p = statement.bind(code);
    statement.push(&p);
    if let Some(owner) = owner {
        let p = statement.bind(owner);
        statement.push(&format!(" AND id_usuario = {p}"));
    }
    statement.push(" RETURNING codigo_unico");
    statement
}

/// Activity persistence over the `atividades` table, keyed by `codigo_unico`
#[derive(Debug, Clone)]
pub struct ActivityRepository {
    executor: QueryExecutor,
}

impl ActivityRepository {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Check the code is free, then insert
    pub async fn create(&self, activity: &NewActivity) -> DbResult<Activity> {
        let existing = self
            .executor
            .fetch::<(String,)>(&Statement::with_params(
                "SELECT codigo_unico FROM atividades WHERE codigo_unico = $1",
                vec![activity.code.as_str().into()],
            ))
            .await?;

        if !existing.is_empty() {
            return Err(DbError::Conflict(format!(
                "activity code '{}' is already in use",
                activity.code
            )));
        }

        let row = self
            .executor
            .fetch::<ActivityRow>(&insert_statement(activity)?)
            .await?
            .single_or_not_found("Activity insert returned no row")?;

        info!(code = %row.code, owner_id = %row.owner_id, "Activity created");
        Activity::try_from(row)
    }

    pub async fn update(&self, code: &str, changes: &ActivityChanges) -> DbResult<Activity> {
        let row = self
            .executor
            .fetch::<ActivityRow>(&update_statement(code, changes)?)
            .await?
            .single_or_not_found("Activity not found")?;
        Activity::try_from(row)
    }

    pub async fn delete(&self, code: &str, owner: Option<Uuid>) -> DbResult<Rows<(String,)>> {
        let rows = self
            .executor
            .fetch(&delete_statement(code, owner))
            .await?
            .or_not_found("Activity not found")?;

        info!(code, "Activity deleted");
        Ok(rows)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Activity> {
        let row = self
            .executor
            .fetch::<ActivityRow>(&Statement::with_params(
                format!("SELECT {ACTIVITY_COLUMNS} FROM atividades WHERE codigo_unico = $1"),
                vec![code.into()],
            ))
            .await?
            .single_or_not_found("Activity not found")?;
        Activity::try_from(row)
    }

    pub async fn list_by_owner(&self, owner: Uuid, page: PageRequest) -> DbResult<Rows<Activity>> {
        let rows = self
            .executor
            .fetch::<ActivityRow>(&Statement::with_params(
                format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM atividades WHERE id_usuario = $1 \
                     ORDER BY created_at DESC LIMIT $2 OFFSET $3"
                ),
                vec![owner.into(), page.limit.into(), page.offset.into()],
            ))
            .await?;

        let activities = rows
            .data
            .into_iter()
            .map(Activity::try_from)
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Rows::new(activities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Param, RetryPolicy};
    use serde_json::json;
    use sqlx::PgPool;

    #[test]
    fn content_is_stored_as_a_json_string() {
        let activity = NewActivity {
            code: "quiz-01".into(),
            owner_id: Uuid::new_v4(),
            kind: "quiz".into(),
            title: "Quiz".into(),
            content: json!({"title": "X", "questions": [1, 2]}),
        };
        let statement = insert_statement(&activity).unwrap();
        match &statement.params()[4] {
            Param::Text(stored) => {
                let parsed: serde_json::Value = serde_json::from_str(stored).unwrap();
                assert_eq!(parsed, activity.content);
            }
            other => panic!("expected serialized text, got {other:?}"),
        }
    }

    #[test]
    fn partial_update_only_sets_given_fields() {
        let changes = ActivityChanges {
            title: Some("Novo".into()),
            ..Default::default()
        };
        let statement = update_statement("quiz-01", &changes).unwrap();
        assert!(statement.sql().starts_with(
            "UPDATE atividades SET titulo = $1, updated_at = NOW() WHERE codigo_unico = $2"
        ));
    }

    #[test]
    fn empty_update_is_a_validation_error() {
        assert!(matches!(
            update_statement("quiz-01", &ActivityChanges::default()),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn delete_checks_owner_only_when_given() {
        let owner = Uuid::new_v4();
        assert_eq!(
            delete_statement("quiz-01", None).sql(),
            "DELETE FROM atividades WHERE codigo_unico = $1 RETURNING codigo_unico"
        );
        let statement = delete_statement("quiz-01", Some(owner));
        assert_eq!(
            statement.sql(),
            "DELETE FROM atividades WHERE codigo_unico = $1 AND id_usuario = $2 RETURNING codigo_unico"
        );
        assert_eq!(statement.params()[1], Param::Uuid(owner));
    }

    fn repo(pool: PgPool) -> ActivityRepository {
        ActivityRepository::new(QueryExecutor::new(pool, RetryPolicy::default()))
    }

    fn quiz(owner_id: Uuid) -> NewActivity {
        NewActivity {
            code: "quiz-01".into(),
            owner_id,
            kind: "quiz".into(),
            title: "Quiz".into(),
            content: json!({"title": "X", "questions": [1, 2]}),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn content_round_trips_through_get_by_code(pool: PgPool) {
        let repo = repo(pool);
        repo.create(&quiz(Uuid::new_v4())).await.unwrap();

        let activity = repo.get_by_code("quiz-01").await.unwrap();
        assert_eq!(activity.content, json!({"title": "X", "questions": [1, 2]}));
        assert_eq!(activity.display_title, "X");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn code_collision_is_a_conflict(pool: PgPool) {
        let repo = repo(pool);
        repo.create(&quiz(Uuid::new_v4())).await.unwrap();
        assert!(matches!(
            repo.create(&quiz(Uuid::new_v4())).await,
            Err(DbError::Conflict(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn deleting_a_missing_code_is_not_found(pool: PgPool) {
        let repo = repo(pool);
        let owner = Uuid::new_v4();
        repo.create(&quiz(owner)).await.unwrap();

        assert!(matches!(
            repo.delete("does-not-exist", None).await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete("quiz-01", Some(Uuid::new_v4())).await,
            Err(DbError::NotFound(_))
        ));
        assert_eq!(repo.delete("quiz-01", Some(owner)).await.unwrap().row_count, 1);
    }
}
