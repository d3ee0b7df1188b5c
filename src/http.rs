use crate::backend::SlotBackend;
use crate::configuration::Configuration;
use crate::error::BookingError;
use crate::identity_provider::IdentityProvider;
use crate::types::{Identity, Session, SlotId, SlotStatus, SlotSummary, TimeSlot};
use crate::AppState;
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::{request::Parts, HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{extract::State, Json};
use axum::{
    routing::{get, post},
    Router,
};
use futures::{Stream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

pub const SESSION_HEADER: &str = "x-session-token";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
struct BookingRequest {
    #[validate(
        required(message = "Name and time are required"),
        length(min = 1, message = "Name and time are required")
    )]
    name: Option<String>,
    #[validate(
        required(message = "Name and time are required"),
        length(min = 1, message = "Name and time are required")
    )]
    time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
struct CancelRequest {
    #[validate(
        required(message = "Time is required"),
        length(min = 1, message = "Time is required")
    )]
    time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SlotFilter {
    status: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[validate(email(message = "A valid email is required"))]
    email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
    #[validate(length(min = 1, message = "Security question is required"))]
    security_question: String,
    #[validate(length(min = 1, message = "Security answer is required"))]
    security_answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
struct SecurityQuestionRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    email: String,
    #[validate(length(min = 1, message = "Security answer is required"))]
    security_answer: String,
    #[validate(length(min = 1, message = "New password is required"))]
    new_password: String,
}

/// JSON body that has been deserialized and validated. Malformed bodies and
/// failed validations both reject with a 400 and a JSON error body.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = BookingError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| BookingError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Identity behind the session header, if the header names a live session.
pub struct MaybeIdentity(pub Option<Identity>);

/// Like [`MaybeIdentity`], but rejects requests without a live session.
pub struct CurrentIdentity(pub Identity);

fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(SESSION_HEADER)?
        .to_str()
        .ok()
        .and_then(|token| Uuid::parse_str(token.trim()).ok())
}

fn session_identity(identities: &IdentityProvider, headers: &HeaderMap) -> Option<Identity> {
    session_token(headers).and_then(|token| identities.identity(token))
}

#[async_trait]
impl<T: SlotBackend> FromRequestParts<AppState<T>> for MaybeIdentity {
    type Rejection = BookingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<T>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeIdentity(session_identity(
            &state.identities,
            &parts.headers,
        )))
    }
}

#[async_trait]
impl<T: SlotBackend> FromRequestParts<AppState<T>> for CurrentIdentity {
    type Rejection = BookingError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<T>,
    ) -> Result<Self, Self::Rejection> {
        session_identity(&state.identities, &parts.headers)
            .map(CurrentIdentity)
            .ok_or(BookingError::Unauthenticated)
    }
}

pub fn create_app<T: SlotBackend, C: Configuration>(
    backend: T,
    identities: IdentityProvider,
    configuration: &C,
) -> Router {
    let state = AppState {
        slot_backend: backend,
        identities,
        simulated_latency: configuration.simulated_latency(),
    };

    let public = Router::new()
        .route("/slots", get(get_slots::<T>))
        .route("/slots/stream", get(stream_slots::<T>))
        .route("/book", post(book_slot::<T>))
        .route("/cancel", post(cancel_slot::<T>))
        .route("/bookings/mine", get(get_my_bookings::<T>))
        .route("/auth/login", post(login::<T>))
        .route("/auth/register", post(register::<T>))
        .route("/auth/security-question", post(get_security_question::<T>))
        .route("/auth/reset-password", post(reset_password::<T>))
        .route("/auth/logout", post(logout::<T>))
        .route("/auth/me", get(get_me));

    let admin = Router::new()
        .route("/admin/reset", post(reset_all::<T>))
        .route("/admin/summary", get(get_summary::<T>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth::<T>,
        ));

    Router::new()
        .merge(public)
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            simulate_latency::<T>,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(configuration.allowed_origin()))
        .with_state(state)
}

fn cors_layer(allowed_origin: Option<String>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match allowed_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => cors.allow_origin(origin),
            Err(err) => {
                warn!(?err, %origin, "Invalid CORS origin, allowing any origin");
                cors.allow_origin(Any)
            }
        },
        None => cors.allow_origin(Any),
    }
}

async fn admin_auth<T: SlotBackend>(
    State(state): State<AppState<T>>,
    request: Request,
    next: Next,
) -> Result<Response, BookingError> {
    let identity = session_identity(&state.identities, request.headers())
        .ok_or(BookingError::Unauthenticated)?;
    if !identity.is_admin {
        return Err(BookingError::Forbidden("Admin access required".into()));
    }
    Ok(next.run(request).await)
}

async fn simulate_latency<T: SlotBackend>(
    State(state): State<AppState<T>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.simulated_latency.is_zero() {
        tokio::time::sleep(state.simulated_latency).await;
    }
    next.run(request).await
}

async fn get_slots<T: SlotBackend>(
    State(state): State<AppState<T>>,
    Query(filter): Query<SlotFilter>,
) -> Result<Json<Vec<TimeSlot>>, BookingError> {
    let status = filter
        .status
        .as_deref()
        .filter(|status| *status != "all")
        .map(str::parse::<SlotStatus>)
        .transpose()?;
    let search = filter
        .search
        .map(|search| search.trim().to_lowercase())
        .filter(|search| !search.is_empty());

    let slots = state
        .slot_backend
        .slots()
        .into_iter()
        .filter(|slot| status.map_or(true, |status| slot.status == status))
        // Search only narrows down booked slots; open slots stay listed.
        .filter(|slot| match (&search, slot.booked_by_name.as_deref()) {
            (Some(search), Some(name)) => name.to_lowercase().contains(search.as_str()),
            _ => true,
        })
        .collect();
    Ok(Json(slots))
}

async fn stream_slots<T: SlotBackend>(
    State(state): State<AppState<T>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state
        .slot_backend
        .slot_stream()
        .map(|slots| Event::default().json_data(slots));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn book_slot<T: SlotBackend>(
    State(state): State<AppState<T>>,
    MaybeIdentity(identity): MaybeIdentity,
    ValidatedJson(booking): ValidatedJson<BookingRequest>,
) -> Result<Json<TimeSlot>, BookingError> {
    let id: SlotId = booking.time.as_deref().unwrap_or_default().parse()?;
    let name = booking.name.as_deref().unwrap_or_default();
    let slot = state
        .slot_backend
        .book_slot(id, identity.as_ref(), name)?;
    Ok(Json(slot))
}

async fn cancel_slot<T: SlotBackend>(
    State(state): State<AppState<T>>,
    MaybeIdentity(identity): MaybeIdentity,
    ValidatedJson(cancellation): ValidatedJson<CancelRequest>,
) -> Result<Json<TimeSlot>, BookingError> {
    let id: SlotId = cancellation.time.as_deref().unwrap_or_default().parse()?;
    let slot = state.slot_backend.cancel_slot(id, identity.as_ref())?;
    Ok(Json(slot))
}

async fn get_my_bookings<T: SlotBackend>(
    State(state): State<AppState<T>>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Json<Vec<TimeSlot>> {
    Json(state.slot_backend.slots_booked_by(&identity.id))
}

async fn login<T: SlotBackend>(
    State(state): State<AppState<T>>,
    ValidatedJson(credentials): ValidatedJson<LoginRequest>,
) -> Result<Json<Session>, BookingError> {
    let session = state
        .identities
        .login(&credentials.email, &credentials.password)?;
    Ok(Json(session))
}

async fn register<T: SlotBackend>(
    State(state): State<AppState<T>>,
    ValidatedJson(registration): ValidatedJson<RegisterRequest>,
) -> Result<Json<Session>, BookingError> {
    let session = state.identities.register(
        &registration.name,
        &registration.email,
        &registration.password,
        &registration.security_question,
        &registration.security_answer,
    )?;
    Ok(Json(session))
}

async fn get_security_question<T: SlotBackend>(
    State(state): State<AppState<T>>,
    ValidatedJson(request): ValidatedJson<SecurityQuestionRequest>,
) -> Result<Json<Value>, BookingError> {
    let question = state.identities.security_question(&request.email)?;
    Ok(Json(json!({ "question": question })))
}

async fn reset_password<T: SlotBackend>(
    State(state): State<AppState<T>>,
    ValidatedJson(reset): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<Value>, BookingError> {
    state
        .identities
        .reset_password(&reset.email, &reset.security_answer, &reset.new_password)?;
    Ok(Json(json!({ "message": "Password reset successfully" })))
}

async fn logout<T: SlotBackend>(
    State(state): State<AppState<T>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.identities.logout(token);
    }
    Json(json!({ "message": "Logged out" }))
}

async fn get_me(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity)
}

async fn reset_all<T: SlotBackend>(State(state): State<AppState<T>>) -> Json<Vec<TimeSlot>> {
    state.slot_backend.reset_all();
    Json(state.slot_backend.slots())
}

async fn get_summary<T: SlotBackend>(State(state): State<AppState<T>>) -> Json<SlotSummary> {
    Json(SlotSummary::from_slots(&state.slot_backend.slots()))
}
