use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::{
    db::{DbError, DbResult, Param, QueryExecutor, Rows, Statement},
    models::profile::{AccountType, NewProfile, Profile, ProfileFilter},
    repository::PageRequest,
};

pub const DEFAULT_COUNTRY: &str = "Brasil";
pub const DEFAULT_PAGE_SIZE: i64 = 50;

const PROFILE_COLUMNS: &str = "id, nome_completo, nome_usuario, email, senha_hash, tipo_conta, \
     pais, estado, instituicao_ensino, avatar, powers, stars, created_at, updated_at";

/// Keys silently dropped from update maps. The wallet only moves through
/// dedicated grant flows, never through a profile edit.
const PROTECTED_FIELDS: &[&str] = &[
    "id",
    "password_hash",
    "created_at",
    "updated_at",
    "powers",
    "stars",
];

#[derive(Debug, Clone, Copy)]
enum ColumnKind {
    Text,
    NullableText,
    AccountType,
}

/// Public field name -> column for partial updates
const UPDATABLE_FIELDS: &[(&str, &str, ColumnKind)] = &[
    ("full_name", "nome_completo", ColumnKind::Text),
    ("username", "nome_usuario", ColumnKind::Text),
    ("email", "email", ColumnKind::Text),
    ("account_type", "tipo_conta", ColumnKind::AccountType),
    ("country", "pais", ColumnKind::Text),
    ("state", "estado", ColumnKind::Text),
    ("institution", "instituicao_ensino", ColumnKind::Text),
    ("avatar", "avatar", ColumnKind::NullableText),
];

impl ColumnKind {
    fn param(self, field: &str, value: &Value) -> DbResult<Param> {
        match (self, value) {
            (ColumnKind::Text, Value::String(s)) => Ok(Param::Text(s.clone())),
            (ColumnKind::NullableText, Value::String(s)) => Ok(Param::NullableText(Some(s.clone()))),
            (ColumnKind::NullableText, Value::Null) => Ok(Param::NullableText(None)),
            (ColumnKind::AccountType, Value::String(s)) => s
                .parse::<AccountType>()
                .map(|t| Param::Text(t.as_str().to_string()))
                .map_err(DbError::Validation),
            _ => Err(DbError::Validation(format!("{field} must be a string"))),
        }
    }
}

pub fn insert_statement(profile: &NewProfile, initial_powers: i32) -> Statement {
    Statement::with_params(
        format!(
            "INSERT INTO usuarios (nome_completo, nome_usuario, email, senha_hash, tipo_conta, \
             pais, estado, instituicao_ensino, powers, stars) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0) \
             RETURNING {PROFILE_COLUMNS}"
        ),
        vec![
            profile.full_name.as_str().into(),
            profile.username.as_str().into(),
            profile.email.as_str().into(),
            profile.password_hash.as_str().into(),
            profile.account_type.as_str().into(),
            profile
                .country
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(DEFAULT_COUNTRY)
                .into(),
            profile.state.as_str().into(),
            profile.institution.as_str().into(),
            initial_powers.into(),
        ],
    )
}

fn lookup_statement(column: &str, value: Param) -> Statement {
    Statement::with_params(
        format!("SELECT {PROFILE_COLUMNS} FROM usuarios WHERE {column} = $1"),
        vec![value],
    )
}

/// Build `UPDATE usuarios SET ...` from a partial field map.
///
/// Protected keys are dropped, unknown keys and ill-typed values are
/// rejected, and an empty set is rejected before any SQL exists.
pub fn update_statement(id: Uuid, fields: &Map<String, Value>) -> DbResult<Statement> {
    let mut statement = Statement::new("UPDATE usuarios SET ");
    let mut assignments = Vec::new();

    for (field, value) in fields {
        if PROTECTED_FIELDS.contains(&field.as_str()) {
            continue;
        }

        let (_, column, kind) = UPDATABLE_FIELDS
            .iter()
            .find(|(name, _, _)| *name == field.as_str())
            .ok_or_else(|| DbError::Validation(format!("unknown profile field '{field}'")))?;

        let placeholder = statement.bind(kind.param(field, value)?);
        assignments.push(format!("{column} = {placeholder}"));
    }

    if assignments.is_empty() {
        return Err(DbError::Validation("no fields to update".to_string()));
    }

    assignments.push("updated_at = NOW()".to_string());
    statement.push(&assignments.join(", "));
    let id_placeholder = statement.bind(id);
    statement.push(&format!(
        " WHERE id = {id_placeholder} RETURNING {PROFILE_COLUMNS}"
    ));

    Ok(statement)
}

fn push_filter(statement: &mut Statement, filter: &ProfileFilter) {
    let mut conditions = Vec::new();

    if let Some(account_type) = filter.account_type {
        let p = statement.bind(account_type.as_str());
        conditions.push(format!("tipo_conta = {p}"));
    }
    if let Some(state) = &filter.state {
        let p = statement.bind(state.as_str());
        conditions.push(format!("estado = {p}"));
    }
    if let Some(country) = &filter.country {
        let p = statement.bind(country.as_str());
        conditions.push(format!("pais = {p}"));
    }

    if !conditions.is_empty() {
        statement.push(" WHERE ");
        statement.push(&conditions.join(" AND "));
    }
}

/// Newest first. Rows sharing a `created_at` have no defined order.
pub fn list_statement(filter: &ProfileFilter, page: PageRequest) -> Statement {
    let mut statement = Statement::new(format!("SELECT {PROFILE_COLUMNS} FROM usuarios"));
    push_filter(&mut statement, filter);

    let limit = statement.bind(page.limit);
    let offset = statement.bind(page.offset);
    statement.push(&format!(
        " ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
    ));
    statement
}

pub fn count_statement(filter: &ProfileFilter) -> Statement {
    let mut statement = Statement::new("SELECT COUNT(*) FROM usuarios");
    push_filter(&mut statement, filter);
    statement
}

/// Profile persistence over the `usuarios` table
#[derive(Debug, Clone)]
pub struct ProfileRepository {
    executor: QueryExecutor,
    initial_powers: i32,
}

impl ProfileRepository {
    pub fn new(executor: QueryExecutor, initial_powers: i32) -> Self {
        Self {
            executor,
            initial_powers,
        }
    }

    /// Insert a profile with the configured starting wallet. Uniqueness is
    /// left to the table constraints.
    pub async fn create(&self, profile: &NewProfile) -> DbResult<Profile> {
        let created = self
            .executor
            .fetch::<Profile>(&insert_statement(profile, self.initial_powers))
            .await?
            .single_or_not_found("Profile insert returned no row")?;

        info!(profile_id = %created.id, username = %created.username, "Profile created");
        Ok(created)
    }

    pub async fn find_by_email(&self, email: &str) -> DbResult<Rows<Profile>> {
        self.executor
            .fetch(&lookup_statement("email", email.into()))
            .await
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Rows<Profile>> {
        self.executor
            .fetch(&lookup_statement("nome_usuario", username.into()))
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> DbResult<Rows<Profile>> {
        self.executor
            .fetch(&lookup_statement("id", id.into()))
            .await
    }

    pub async fn update(&self, id: Uuid, fields: &Map<String, Value>) -> DbResult<Profile> {
        let statement = update_statement(id, fields)?;
        self.executor
            .fetch::<Profile>(&statement)
            .await?
            .single_or_not_found("Profile not found")
    }

    pub async fn update_avatar(&self, id: Uuid, avatar: &str) -> DbResult<Profile> {
        let statement = Statement::with_params(
            format!(
                "UPDATE usuarios SET avatar = $1, updated_at = NOW() WHERE id = $2 \
                 RETURNING {PROFILE_COLUMNS}"
            ),
            vec![avatar.into(), id.into()],
        );
        self.executor
            .fetch::<Profile>(&statement)
            .await?
            .single_or_not_found("Profile not found")
    }

    pub async fn delete(&self, id: Uuid) -> DbResult<Rows<(Uuid,)>> {
        let statement = Statement::with_params(
            "DELETE FROM usuarios WHERE id = $1 RETURNING id",
            vec![id.into()],
        );
        self.executor
            .fetch(&statement)
            .await?
            .or_not_found("Profile not found")
    }

    pub async fn list(&self, filter: &ProfileFilter, page: PageRequest) -> DbResult<Rows<Profile>> {
        self.executor.fetch(&list_statement(filter, page)).await
    }

    pub async fn count(&self, filter: &ProfileFilter) -> DbResult<i64> {
        let rows = self
            .executor
            .fetch::<(i64,)>(&count_statement(filter))
            .await?;
        Ok(rows.into_first().map(|(n,)| n).unwrap_or(0))
    }
}
