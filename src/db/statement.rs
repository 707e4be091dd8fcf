use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    FromRow, Postgres,
    postgres::{PgArguments, PgRow},
    query::QueryAs,
};
use uuid::Uuid;

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    NullableText(Option<String>),
    Int(i32),
    BigInt(i64),
    Uuid(Uuid),
    Json(Value),
    Timestamp(Option<DateTime<Utc>>),
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<Option<String>> for Param {
    fn from(value: Option<String>) -> Self {
        Param::NullableText(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::BigInt(value)
    }
}

impl From<Uuid> for Param {
    fn from(value: Uuid) -> Self {
        Param::Uuid(value)
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::Json(value)
    }
}

impl From<Option<DateTime<Utc>>> for Param {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        Param::Timestamp(value)
    }
}

/// SQL text with `$n` placeholders plus the values bound to them.
///
/// A statement is kept as plain data so the executor can rebuild the sqlx
/// query on every retry attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Append raw SQL text
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Record a bound value and return its placeholder
    pub fn bind(&mut self, value: impl Into<Param>) -> String {
        self.params.push(value.into());
        format!("${}", self.params.len())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub(crate) fn query_as<T>(&self) -> QueryAs<'_, Postgres, T, PgArguments>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        self.params
            .iter()
            .fold(sqlx::query_as::<Postgres, T>(&self.sql), |query, param| {
                match param {
                    Param::Text(v) => query.bind(v.as_str()),
                    Param::NullableText(v) => query.bind(v.as_deref()),
                    Param::Int(v) => query.bind(*v),
                    Param::BigInt(v) => query.bind(*v),
                    Param::Uuid(v) => query.bind(*v),
                    Param::Json(v) => query.bind(v),
                    Param::Timestamp(v) => query.bind(*v),
                }
            })
    }
}
