use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Account type, stored as its Portuguese label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum AccountType {
    #[serde(rename = "Professor")]
    Teacher,
    #[serde(rename = "Aluno")]
    Student,
    #[serde(rename = "Coordenador")]
    Coordinator,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Teacher => "Professor",
            AccountType::Student => "Aluno",
            AccountType::Coordinator => "Coordenador",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Professor" => Ok(AccountType::Teacher),
            "Aluno" => Ok(AccountType::Student),
            "Coordenador" => Ok(AccountType::Coordinator),
            other => Err(format!(
                "invalid account type '{other}' (expected Professor, Aluno or Coordenador)"
            )),
        }
    }
}

/// Platform account from database
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    #[sqlx(rename = "nome_completo")]
    pub full_name: String,
    #[sqlx(rename = "nome_usuario")]
    pub username: String,
    pub email: String,
    #[sqlx(rename = "senha_hash")]
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(rename = "tipo_conta")]
    pub account_type: String,
    #[sqlx(rename = "pais")]
    pub country: String,
    #[sqlx(rename = "estado")]
    pub state: String,
    #[sqlx(rename = "instituicao_ensino")]
    pub institution: String,
    /// URL or base64-encoded image
    pub avatar: Option<String>,
    pub powers: i32,
    pub stars: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a profile; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub account_type: AccountType,
    pub country: Option<String>,
    pub state: String,
    pub institution: String,
}

/// Conjunctive filter for profile listings
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub account_type: Option<AccountType>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Look up a profile by exactly one of id, username or email
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProfileLookupQuery {
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Register a new profile
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProfileRequest {
    #[validate(length(min = 1, max = 150))]
    #[schema(example = "Ana Souza")]
    pub full_name: String,

    #[validate(length(min = 3, max = 50))]
    #[schema(example = "anasouza")]
    pub username: String,

    #[validate(email)]
    #[schema(example = "ana@escola.br")]
    pub email: String,

    #[validate(length(min = 8))]
    #[schema(example = "SenhaForte123!")]
    pub password: String,

    pub account_type: AccountType,

    /// Defaults to Brasil
    #[validate(length(min = 1, max = 80))]
    pub country: Option<String>,

    #[validate(length(min = 1, max = 80))]
    #[schema(example = "SP")]
    pub state: String,

    #[validate(length(min = 1, max = 200))]
    #[schema(example = "Escola Estadual Central")]
    pub institution: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    #[schema(example = "ana@escola.br")]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Successful login: bearer token plus the profile
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub profile: Profile,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAvatarRequest {
    /// Image URL or base64 data URI
    #[validate(length(min = 1))]
    pub avatar: String,
}

/// Username candidate, held to the registration length rule
#[derive(Debug, Validate)]
pub struct UsernameCandidate {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
}

#[derive(Debug, Validate)]
pub struct EmailCandidate {
    #[validate(email)]
    pub email: String,
}

/// Whether a username or email can still be registered
#[derive(Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Availability {
    pub available: bool,
    /// Set when the value is malformed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Availability {
    pub fn from_taken(taken: bool) -> Self {
        Self {
            available: !taken,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProfilesQuery {
    pub account_type: Option<AccountType>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListProfilesQuery {
    pub fn filter(&self) -> ProfileFilter {
        ProfileFilter {
            account_type: self.account_type,
            state: self.state.clone(),
            country: self.country.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_uses_portuguese_labels() {
        assert_eq!(
            serde_json::to_string(&AccountType::Teacher).unwrap(),
            "\"Professor\""
        );
        assert_eq!("Aluno".parse::<AccountType>(), Ok(AccountType::Student));
        assert!("Diretor".parse::<AccountType>().is_err());
    }

    #[test]
    fn create_request_validation() {
        let request: CreateProfileRequest = serde_json::from_value(serde_json::json!({
            "full_name": "Ana Souza",
            "username": "an",
            "email": "not-an-email",
            "password": "short",
            "account_type": "Coordenador",
            "state": "SP",
            "institution": "Escola Central"
        }))
        .unwrap();

        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("state"));
    }

    #[test]
    fn availability_candidates_follow_registration_rules() {
        let username = |s: &str| UsernameCandidate { username: s.to_string() }.validate();
        let email = |s: &str| EmailCandidate { email: s.to_string() }.validate();

        assert!(username("ana").is_ok());
        assert!(username("an").is_err());
        assert!(username(&"a".repeat(51)).is_err());
        assert!(email("ana@escola.br").is_ok());
        assert!(email("ana.escola.br").is_err());
    }
}
