mod api;
mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod repository;
mod utils;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use shuttle_axum::ShuttleAxum;
use shuttle_runtime::SecretStore;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    api::{activities, agent_memory, profile},
    config::Settings,
    db::{Envelope, Statement},
    middleware::auth::auth_middleware,
    models::app_state::AppState,
};

/// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        profile::lookup_profile,
        profile::create_profile,
        profile::login,
        profile::check_username,
        profile::check_email,
        profile::list_profiles,
        profile::update_profile,
        profile::update_avatar,
        profile::delete_profile,
        activities::create_activity,
        activities::get_activity,
        activities::update_activity,
        activities::delete_activity,
        activities::list_my_activities,
        agent_memory::save_item,
        agent_memory::list_items,
        agent_memory::upsert_session,
        agent_memory::list_sessions,
        agent_memory::update_session,
    ),
    components(
        schemas(
            crate::models::profile::AccountType,
            crate::models::profile::Profile,
            crate::models::profile::CreateProfileRequest,
            crate::models::profile::LoginRequest,
            crate::models::profile::LoginResponse,
            crate::models::profile::UpdateAvatarRequest,
            crate::models::profile::Availability,
            crate::models::activity::Activity,
            crate::models::activity::CreateActivityRequest,
            crate::models::activity::ActivityChanges,
            crate::models::agent_memory::MemoryItem,
            crate::models::agent_memory::NewMemoryItem,
            crate::models::agent_memory::AgentSession,
            crate::models::agent_memory::NewSession,
            crate::models::agent_memory::SessionChanges,
            crate::db::Pagination,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Profiles", description = "Accounts, login and wallet"),
        (name = "Activities", description = "Generated classroom activities"),
        (name = "Agent memory", description = "Assistant working memory and sessions")
    ),
    info(
        title = "Ponto.School API",
        version = "0.1.0",
        description = "Persistence API for the Ponto.School education platform"
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn hello_world() -> &'static str {
    "Hello from Ponto.School!"
}

/// Single-attempt `SELECT 1` through the executor
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Envelope<Vec<(i32,)>>>) {
    let result = state
        .executor
        .fetch_with_budget::<(i32,)>(&Statement::new("SELECT 1"), 1)
        .await;

    let envelope = Envelope::from(result);
    if envelope.is_success() {
        (StatusCode::OK, Json(envelope.with_message("database connected")))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(envelope))
    }
}

fn app(state: AppState) -> Router {
    let auth = from_fn_with_state(state.clone(), auth_middleware);

    let public = Router::new()
        .route("/", get(hello_world))
        .route("/api/health", get(health_check))
        .route(
            "/api/v1/profiles",
            get(profile::lookup_profile).post(profile::create_profile),
        )
        .route("/api/v1/profiles/login", post(profile::login))
        .route("/api/v1/profiles/list", get(profile::list_profiles))
        .route(
            "/api/v1/profiles/check-username/{username}",
            get(profile::check_username),
        )
        .route(
            "/api/v1/profiles/check-email/{email}",
            get(profile::check_email),
        )
        // GET is public, writes need a token
        .route(
            "/api/v1/activities/{code}",
            put(activities::update_activity)
                .delete(activities::delete_activity)
                .route_layer(auth.clone())
                .get(activities::get_activity),
        );

    let protected = Router::new()
        .route(
            "/api/v1/profiles/{id}",
            put(profile::update_profile).delete(profile::delete_profile),
        )
        .route("/api/v1/profiles/{id}/avatar", put(profile::update_avatar))
        .route("/api/v1/activities", post(activities::create_activity))
        .route("/api/v1/activities/mine", get(activities::list_my_activities))
        .route(
            "/api/v1/agent-memory/items",
            post(agent_memory::save_item).get(agent_memory::list_items),
        )
        .route(
            "/api/v1/agent-memory/sessions",
            post(agent_memory::upsert_session).get(agent_memory::list_sessions),
        )
        .route(
            "/api/v1/agent-memory/sessions/{session_id}",
            patch(agent_memory::update_session),
        )
        .route_layer(auth);

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] conn_str: String,
    #[shuttle_runtime::Secrets] secrets: SecretStore,
) -> ShuttleAxum {
    let settings = Settings::from_secrets(&secrets)
        .map_err(|e| shuttle_runtime::Error::Custom(shuttle_runtime::CustomError::new(e)))?;

    let pool = settings
        .database
        .pool_options()
        .connect(&conn_str)
        .await
        .map_err(|e| shuttle_runtime::Error::Database(e.to_string()))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| shuttle_runtime::Error::Database(e.to_string()))?;

    tracing::info!(
        max_connections = settings.database.max_connections,
        retry_attempts = settings.database.retry_attempts,
        "Database ready"
    );

    Ok(app(AppState::new(pool, settings)).into())
}
