use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::header::HeaderName;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::auth::{hash_password, verify_password, AuthError};
use crate::models::{Favorite, FavoriteTarget, Person, Planet, User};

use super::auth::CurrentUser;
use super::error::ApiError;
use super::responses::{
    Credentials, HealthResponse, IndexResponse, MessageResponse, TokenResponse, ENDPOINTS,
};
use super::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[allow(clippy::expect_used)]
pub fn router(state: AppState) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("static governor config is valid"),
    );

    let api = Router::new()
        .route("/people", get(list_people))
        .route("/people/{id}", get(get_person))
        .route("/planets", get(list_planets))
        .route("/planets/{id}", get(get_planet))
        .route("/users", get(list_users))
        .route("/users/favorites", get(list_favorites))
        .route(
            "/favorite/planet/{id}",
            post(add_favorite_planet).delete(remove_favorite_planet),
        )
        .route(
            "/favorite/people/{id}",
            post(add_favorite_person).delete(remove_favorite_person),
        );

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/user", get(user_placeholder))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .nest("/api", api)
        .layer(GovernorLayer::new(governor_conf))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        endpoints: ENDPOINTS,
    })
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    if let Err(err) = state.store.ping().await {
        warn!(error = %err, "health check failed");
        return Err(ApiError::Unavailable);
    }
    Ok(Json(HealthResponse { status: "ok" }))
}

async fn user_placeholder() -> Json<MessageResponse> {
    Json(MessageResponse {
        msg: "Hello, this is your GET /user response",
    })
}

async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(credentials) =
        payload.map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))?;
    let (email, password) = credentials
        .into_required()
        .ok_or(ApiError::MissingCredentials)?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        debug!("signup rejected: email already registered");
        return Err(ApiError::EmailTaken);
    }

    let hash = run_blocking(move || hash_password(&password)).await?;

    // A concurrent signup may have claimed the email since the lookup above.
    let Some(user) = state.store.create_user(&email, &hash).await? else {
        debug!("signup rejected: email already registered");
        return Err(ApiError::EmailTaken);
    };

    info!(user_id = user.id, "user created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            msg: "User created",
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Ok(Json(credentials)) = payload else {
        return Err(ApiError::InvalidCredentials);
    };
    let (email, password) = credentials
        .into_required()
        .ok_or(ApiError::InvalidCredentials)?;

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!("login failed: unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    if !user.is_active {
        warn!(user_id = user.id, "login failed: account inactive");
        return Err(ApiError::InvalidCredentials);
    }

    let stored = user.password;
    let valid = run_blocking(move || verify_password(&password, &stored)).await?;
    if !valid {
        warn!(user_id = user.id, "login failed: wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.tokens.issue(user.id)?;
    debug!(user_id = user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

async fn list_people(State(state): State<AppState>) -> Result<Json<Vec<Person>>, ApiError> {
    let people = state.store.list_people().await?;
    debug!(people = people.len(), "people requested");
    Ok(Json(people))
}

async fn get_person(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Person>, ApiError> {
    let id = path_id(id, "Person")?;
    let person = state
        .store
        .get_person(id)
        .await?
        .ok_or(ApiError::NotFound("Person"))?;
    Ok(Json(person))
}

async fn list_planets(State(state): State<AppState>) -> Result<Json<Vec<Planet>>, ApiError> {
    let planets = state.store.list_planets().await?;
    debug!(planets = planets.len(), "planets requested");
    Ok(Json(planets))
}

async fn get_planet(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Planet>, ApiError> {
    let id = path_id(id, "Planet")?;
    let planet = state
        .store
        .get_planet(id)
        .await?
        .ok_or(ApiError::NotFound("Planet"))?;
    Ok(Json(planet))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.store.list_users().await?;
    debug!(users = users.len(), "users requested");
    Ok(Json(users))
}

async fn list_favorites(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let favorites = state.store.list_favorites(user.id).await?;
    debug!(user_id = user.id, favorites = favorites.len(), "favorites requested");
    Ok(Json(favorites))
}

async fn add_favorite_planet(
    State(state): State<AppState>,
    user: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let id = path_id(id, "Planet")?;
    add_favorite(&state, user, FavoriteTarget::Planet(id)).await
}

async fn add_favorite_person(
    State(state): State<AppState>,
    user: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let id = path_id(id, "Person")?;
    add_favorite(&state, user, FavoriteTarget::Person(id)).await
}

async fn remove_favorite_planet(
    State(state): State<AppState>,
    user: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let id = path_id(id, "Favorite planet")?;
    remove_favorite(&state, user, FavoriteTarget::Planet(id)).await
}

async fn remove_favorite_person(
    State(state): State<AppState>,
    user: CurrentUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    let id = path_id(id, "Favorite person")?;
    remove_favorite(&state, user, FavoriteTarget::Person(id)).await
}

async fn add_favorite(
    state: &AppState,
    user: CurrentUser,
    target: FavoriteTarget,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    if !state.store.target_exists(target).await? {
        return Err(ApiError::NotFound(target.label()));
    }

    if !state.store.add_favorite(user.id, target).await? {
        debug!(user_id = user.id, ?target, "favorite already present");
        return Err(ApiError::AlreadyFavorite(target.label()));
    }

    info!(user_id = user.id, ?target, "favorite added");
    let favorites = state.store.list_favorites(user.id).await?;
    Ok(Json(favorites))
}

async fn remove_favorite(
    state: &AppState,
    user: CurrentUser,
    target: FavoriteTarget,
) -> Result<Json<Vec<Favorite>>, ApiError> {
    if !state.store.remove_favorite(user.id, target).await? {
        return Err(ApiError::NotFound(target.favorite_label()));
    }

    info!(user_id = user.id, ?target, "favorite removed");
    let favorites = state.store.list_favorites(user.id).await?;
    Ok(Json(favorites))
}

/// Ids that are not integers name no row, so they answer like a missing one.
fn path_id(id: Result<Path<i64>, PathRejection>, missing: &'static str) -> Result<i64, ApiError> {
    match id {
        Ok(Path(id)) => Ok(id),
        Err(rejection) => {
            debug!(error = %rejection, "non-numeric id in path");
            Err(ApiError::NotFound(missing))
        }
    }
}

/// Run CPU-heavy credential work off the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_err) => {
            error!(error = %join_err, "credential task failed");
            Err(ApiError::Internal)
        }
    }
}
