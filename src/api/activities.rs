use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    db::Envelope,
    errors::AppError,
    middleware::auth::CurrentProfile,
    models::{
        activity::{Activity, ActivityChanges, CreateActivityRequest, ListActivitiesQuery, NewActivity},
        app_state::AppState,
    },
    repository::{PageRequest, activities::DEFAULT_PAGE_SIZE},
};

/// Store a generated activity under a caller-chosen code
#[utoipa::path(
    post,
    path = "/api/v1/activities",
    request_body = CreateActivityRequest,
    responses(
        (status = 201, description = "Activity created", body = Envelope<Activity>),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Code already in use")
    ),
    tag = "Activities",
    security(("bearer" = []))
)]
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(CurrentProfile(owner_id)): Extension<CurrentProfile>,
    Json(payload): Json<CreateActivityRequest>,
) -> Result<(StatusCode, Json<Envelope<Activity>>), AppError> {
    payload.validate()?;

    let activity = state
        .activities
        .create(&NewActivity {
            code: payload.code,
            owner_id,
            kind: payload.kind,
            title: payload.title,
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(Envelope::single(activity))))
}

#[utoipa::path(
    get,
    path = "/api/v1/activities/{code}",
    params(("code" = String, Path, description = "Activity code")),
    responses(
        (status = 200, description = "Activity", body = Envelope<Activity>),
        (status = 404, description = "Activity not found")
    ),
    tag = "Activities"
)]
pub async fn get_activity(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Envelope<Activity>>, AppError> {
    let activity = state.activities.get_by_code(&code).await?;
    Ok(Json(Envelope::single(activity)))
}

/// Partially replace an activity the caller owns
#[utoipa::path(
    put,
    path = "/api/v1/activities/{code}",
    params(("code" = String, Path, description = "Activity code")),
    request_body = ActivityChanges,
    responses(
        (status = 200, description = "Activity updated", body = Envelope<Activity>),
        (status = 400, description = "No fields to update"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Activity not found")
    ),
    tag = "Activities",
    security(("bearer" = []))
)]
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(caller): Extension<CurrentProfile>,
    Path(code): Path<String>,
    Json(changes): Json<ActivityChanges>,
) -> Result<Json<Envelope<Activity>>, AppError> {
    if changes.is_empty() {
        return Err(AppError::ValidationError("no fields to update".to_string()));
    }

    let existing = state.activities.get_by_code(&code).await?;
    caller.ensure(existing.owner_id)?;

    let activity = state.activities.update(&code, &changes).await?;
    Ok(Json(Envelope::single(activity)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/activities/{code}",
    params(("code" = String, Path, description = "Activity code")),
    responses(
        (status = 200, description = "Activity deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No activity with this code owned by the caller")
    ),
    tag = "Activities",
    security(("bearer" = []))
)]
pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(CurrentProfile(owner_id)): Extension<CurrentProfile>,
    Path(code): Path<String>,
) -> Result<Json<Envelope<Vec<String>>>, AppError> {
    let deleted = state.activities.delete(&code, Some(owner_id)).await?;

    let codes = deleted.data.into_iter().map(|(code,)| code).collect();
    Ok(Json(
        Envelope::success(codes, deleted.row_count).with_message("Activity deleted"),
    ))
}

/// Activities owned by the caller, newest first
#[utoipa::path(
    get,
    path = "/api/v1/activities/mine",
    params(ListActivitiesQuery),
    responses(
        (status = 200, description = "Caller's activities", body = Envelope<Vec<Activity>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Activities",
    security(("bearer" = []))
)]
pub async fn list_my_activities(
    State(state): State<AppState>,
    Extension(CurrentProfile(owner_id)): Extension<CurrentProfile>,
    Query(query): Query<ListActivitiesQuery>,
) -> Result<Json<Envelope<Vec<Activity>>>, AppError> {
    let page = PageRequest::new(query.limit, query.offset, DEFAULT_PAGE_SIZE);
    let rows = state.activities.list_by_owner(owner_id, page).await?;
    Ok(Json(Envelope::rows(rows)))
}
