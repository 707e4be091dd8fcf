use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbError;

pub const FALLBACK_TITLE: &str = "Atividade";
pub const FALLBACK_DESCRIPTION: &str = "";

/// Raw activity row; `conteudo` holds serialized JSON
#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    #[sqlx(rename = "codigo_unico")]
    pub code: String,
    #[sqlx(rename = "id_usuario")]
    pub owner_id: Uuid,
    #[sqlx(rename = "tipo")]
    pub kind: String,
    #[sqlx(rename = "titulo")]
    pub title: String,
    #[sqlx(rename = "conteudo")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Activity with parsed content and derived display fields
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Activity {
    pub code: String,
    pub owner_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[schema(value_type = Object)]
    pub content: Value,
    pub display_title: String,
    pub display_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for Activity {
    type Error = DbError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let content = decode_content(&row.content)?;
        Ok(Self {
            display_title: display_title(&content),
            display_description: display_description(&content),
            code: row.code,
            owner_id: row.owner_id,
            kind: row.kind,
            title: row.title,
            content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub fn encode_content(content: &Value) -> Result<String, DbError> {
    serde_json::to_string(content)
        .map_err(|e| DbError::Validation(format!("content is not serializable: {e}")))
}

pub fn decode_content(raw: &str) -> Result<Value, DbError> {
    serde_json::from_str(raw).map_err(|e| DbError::Decode(e.to_string()))
}

/// First non-empty string among `keys`, in order
fn first_text(content: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| content.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
}

/// `title`, then `titulo`, then the fallback
pub fn display_title(content: &Value) -> String {
    first_text(content, &["title", "titulo"]).unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// `description`, then `descricao`, then empty
pub fn display_description(content: &Value) -> String {
    first_text(content, &["description", "descricao"])
        .unwrap_or_else(|| FALLBACK_DESCRIPTION.to_string())
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub code: String,
    pub owner_id: Uuid,
    pub kind: String,
    pub title: String,
    pub content: Value,
}

/// Partial replacement; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ActivityChanges {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub content: Option<Value>,
}

impl ActivityChanges {
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.title.is_none() && self.content.is_none()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateActivityRequest {
    /// Caller-chosen unique code
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "plano-aula-7b-fracoes")]
    pub code: String,

    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64))]
    #[schema(example = "plano-aula")]
    pub kind: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[schema(value_type = Object)]
    pub content: Value,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListActivitiesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(content: &str) -> ActivityRow {
        ActivityRow {
            code: "quiz-01".into(),
            owner_id: Uuid::new_v4(),
            kind: "quiz".into(),
            title: "Quiz".into(),
            content: content.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn english_title_wins_over_portuguese() {
        let content = json!({"title": "Fractions", "titulo": "Frações"});
        assert_eq!(display_title(&content), "Fractions");
    }

    #[test]
    fn portuguese_title_is_second_choice() {
        let content = json!({"titulo": "Frações"});
        assert_eq!(display_title(&content), "Frações");
    }

    #[test]
    fn missing_title_uses_fallback() {
        assert_eq!(display_title(&json!({"questions": []})), "Atividade");
        assert_eq!(display_title(&json!({"title": 42})), "Atividade");
        assert_eq!(display_title(&json!("plain string")), "Atividade");
    }

    #[test]
    fn description_follows_the_same_precedence() {
        let content = json!({"description": "Intro", "descricao": "Introdução"});
        assert_eq!(display_description(&content), "Intro");
        assert_eq!(display_description(&json!({"descricao": "Introdução"})), "Introdução");
        assert_eq!(display_description(&json!({})), "");
    }

    #[test]
    fn stored_content_parses_back_to_the_same_value() {
        let content = json!({"title": "X", "questions": [1, 2]});
        let stored = encode_content(&content).unwrap();
        let activity = Activity::try_from(row(&stored)).unwrap();

        assert_eq!(activity.content, content);
        assert_eq!(activity.display_title, "X");
    }

    #[test]
    fn corrupt_content_is_a_decode_error() {
        let err = Activity::try_from(row("{not json")).unwrap_err();
        assert!(matches!(err, DbError::Decode(_)));
    }

    #[test]
    fn changes_report_emptiness() {
        assert!(ActivityChanges::default().is_empty());
        let changes: ActivityChanges = serde_json::from_value(json!({"type": "quiz"})).unwrap();
        assert!(!changes.is_empty());
    }
}
