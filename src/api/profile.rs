use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{Envelope, Pagination},
    errors::AppError,
    middleware::auth::CurrentProfile,
    models::{
        app_state::AppState,
        profile::{
            Availability, CreateProfileRequest, EmailCandidate, ListProfilesQuery, LoginRequest,
            LoginResponse, NewProfile, Profile, ProfileLookupQuery, UpdateAvatarRequest,
            UsernameCandidate,
        },
    },
    repository::{PageRequest, profiles::DEFAULT_PAGE_SIZE},
    utils::password::{hash_password, verify_password},
};

/// Find a profile by id, username or email (first one given wins, in that order)
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    params(ProfileLookupQuery),
    responses(
        (status = 200, description = "Profile found", body = Envelope<Profile>),
        (status = 400, description = "No lookup key given"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profiles"
)]
pub async fn lookup_profile(
    State(state): State<AppState>,
    Query(query): Query<ProfileLookupQuery>,
) -> Result<Json<Envelope<Profile>>, AppError> {
    let rows = match (query.id, query.username.as_deref(), query.email.as_deref()) {
        (Some(id), _, _) => state.profiles.find_by_id(id).await?,
        (None, Some(username), _) => state.profiles.find_by_username(username).await?,
        (None, None, Some(email)) => state.profiles.find_by_email(email).await?,
        (None, None, None) => {
            return Err(AppError::ValidationError(
                "email, username or id is required".to_string(),
            ));
        }
    };

    let profile = rows
        .into_first()
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(Envelope::single(profile)))
}

/// Register a new profile
#[utoipa::path(
    post,
    path = "/api/v1/profiles",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = Envelope<Profile>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or username already in use")
    ),
    tag = "Profiles"
)]
pub async fn create_profile(
    State(state): State<AppState>,
    Json(payload): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<Envelope<Profile>>), AppError> {
    payload.validate()?;

    if !state.profiles.find_by_email(&payload.email).await?.is_empty() {
        return Err(AppError::Conflict("Email is already in use".to_string()));
    }
    if !state
        .profiles
        .find_by_username(&payload.username)
        .await?
        .is_empty()
    {
        return Err(AppError::Conflict("Username is already in use".to_string()));
    }

    let password_hash = hash_password(&payload.password)?;

    let profile = state
        .profiles
        .create(&NewProfile {
            full_name: payload.full_name,
            username: payload.username,
            email: payload.email,
            password_hash,
            account_type: payload.account_type,
            country: payload.country,
            state: payload.state,
            institution: payload.institution,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::single(profile).with_message("Profile created")),
    ))
}

/// Whether a username is still free. Malformed names are reported as
/// unavailable with a reason instead of failing the request.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/check-username/{username}",
    params(("username" = String, Path, description = "Candidate username")),
    responses(
        (status = 200, description = "Availability of the username", body = Envelope<Availability>)
    ),
    tag = "Profiles"
)]
pub async fn check_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Envelope<Availability>>, AppError> {
    let candidate = UsernameCandidate {
        username: username.trim().to_string(),
    };
    if candidate.validate().is_err() {
        return Ok(Json(Envelope::single(Availability::rejected(
            "username must be between 3 and 50 characters",
        ))));
    }

    let taken = !state.profiles.find_by_username(&candidate.username).await?.is_empty();

    Ok(Json(Envelope::single(Availability::from_taken(taken))))
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/check-email/{email}",
    params(("email" = String, Path, description = "Candidate email")),
    responses(
        (status = 200, description = "Availability of the email", body = Envelope<Availability>)
    ),
    tag = "Profiles"
)]
pub async fn check_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Envelope<Availability>>, AppError> {
    let candidate = EmailCandidate {
        email: email.trim().to_string(),
    };
    if candidate.validate().is_err() {
        return Ok(Json(Envelope::single(Availability::rejected(
            "invalid email format",
        ))));
    }

    let taken = !state.profiles.find_by_email(&candidate.email).await?.is_empty();

    Ok(Json(Envelope::single(Availability::from_taken(taken))))
}

/// Exchange email and password for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/profiles/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = Envelope<LoginResponse>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "Profiles"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, AppError> {
    payload.validate()?;

    let profile = state
        .profiles
        .find_by_email(&payload.email)
        .await?
        .into_first()
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&payload.password, &profile.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let access_token = state.tokens.issue(profile.id)?;

    tracing::info!(profile_id = %profile.id, "Profile logged in");

    Ok(Json(Envelope::single(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl_secs(),
        profile,
    })))
}

/// List profiles with optional filters
#[utoipa::path(
    get,
    path = "/api/v1/profiles/list",
    params(ListProfilesQuery),
    responses(
        (status = 200, description = "One page of profiles", body = Envelope<Vec<Profile>>)
    ),
    tag = "Profiles"
)]
pub async fn list_profiles(
    State(state): State<AppState>,
    Query(query): Query<ListProfilesQuery>,
) -> Result<Json<Envelope<Vec<Profile>>>, AppError> {
    let filter = query.filter();
    let page = PageRequest::new(query.limit, query.offset, DEFAULT_PAGE_SIZE);

    let rows = state.profiles.list(&filter, page).await?;
    let total = state.profiles.count(&filter).await?;

    Ok(Json(
        Envelope::rows(rows).with_pagination(Pagination::new(total, page.limit, page.offset)),
    ))
}

/// Update the caller's own profile. Protected fields are dropped, unknown
/// fields are rejected.
#[utoipa::path(
    put,
    path = "/api/v1/profiles/{id}",
    params(("id" = Uuid, Path, description = "Profile id")),
    request_body = Object,
    responses(
        (status = 200, description = "Profile updated", body = Envelope<Profile>),
        (status = 400, description = "No updatable fields"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profiles",
    security(("bearer" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentProfile>,
    Path(id): Path<Uuid>,
    Json(fields): Json<Map<String, Value>>,
) -> Result<Json<Envelope<Profile>>, AppError> {
    caller.ensure(id)?;

    let profile = state.profiles.update(id, &fields).await?;

    Ok(Json(Envelope::single(profile).with_message("Profile updated")))
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/{id}/avatar",
    params(("id" = Uuid, Path, description = "Profile id")),
    request_body = UpdateAvatarRequest,
    responses(
        (status = 200, description = "Avatar updated", body = Envelope<Profile>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profiles",
    security(("bearer" = []))
)]
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentProfile>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvatarRequest>,
) -> Result<Json<Envelope<Profile>>, AppError> {
    caller.ensure(id)?;
    payload.validate()?;

    let profile = state.profiles.update_avatar(id, &payload.avatar).await?;

    Ok(Json(Envelope::single(profile)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/profiles/{id}",
    params(("id" = Uuid, Path, description = "Profile id")),
    responses(
        (status = 200, description = "Profile deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Profile not found")
    ),
    tag = "Profiles",
    security(("bearer" = []))
)]
pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentProfile>,
    Path(id): Path<Uuid>,
) -> Result<Json<Envelope<Vec<Uuid>>>, AppError> {
    caller.ensure(id)?;

    let deleted = state.profiles.delete(id).await?;
    tracing::info!(profile_id = %id, "Profile deleted");

    let ids = deleted.data.into_iter().map(|(id,)| id).collect();
    Ok(Json(
        Envelope::success(ids, deleted.row_count).with_message("Profile deleted"),
    ))
}
