use serde::Serialize;
use utoipa::ToSchema;

use crate::db::{
    error::{DbError, DbResult},
    executor::Rows,
};

/// Pagination metadata for list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        let pages = if limit > 0 && total > 0 {
            total / limit + i64::from(total % limit != 0)
        } else {
            0
        };
        Self {
            total,
            limit,
            offset,
            pages,
        }
    }
}

/// Uniform `{success, data | error}` response body.
///
/// Only the constructors can build one, so a success never carries an
/// error and a failure never carries data.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl<T> Envelope<T> {
    /// Success carrying one reshaped entity
    pub fn single(data: T) -> Self {
        Self::success(data, 1)
    }

    pub fn success(data: T, row_count: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            row_count: Some(row_count),
            message: None,
            pagination: None,
            error: None,
            code: None,
        }
    }

    pub fn failure(error: impl Into<String>, code: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            row_count: None,
            message: None,
            pagination: None,
            error: Some(error.into()),
            code,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        if self.success {
            self.message = Some(message.into());
        }
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        if self.success {
            self.pagination = Some(pagination);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn rows(rows: Rows<T>) -> Self {
        Self::success(rows.data, rows.row_count)
    }
}

impl<T> From<DbResult<Rows<T>>> for Envelope<Vec<T>> {
    fn from(result: DbResult<Rows<T>>) -> Self {
        match result {
            Ok(rows) => Envelope::rows(rows),
            Err(err) => Envelope::from_error(&err),
        }
    }
}

impl<T> Envelope<T> {
    pub fn from_error(err: &DbError) -> Self {
        Envelope::failure(err.to_string(), err.code().map(str::to_string))
    }
}
