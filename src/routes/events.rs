use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::auth::{AuthError, Authenticator};
use crate::error::MatchingError;
use crate::models::{
    AttemptResponse, CommitRequest, ErrorResponse, HealthResponse, HistoryResponse, MyGroupResponse,
    ResultsResponse,
};
use crate::services::MatchingService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchingService>,
    pub auth: Arc<Authenticator>,
}

/// Configure all event matching routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/events/{event_id}/match", web::post().to(commit_match))
        .route("/events/{event_id}/preview", web::post().to(preview_match))
        .route("/events/{event_id}/results", web::get().to(get_results))
        .route("/events/{event_id}/history", web::get().to(get_history))
        .route("/events/{event_id}/my-group", web::get().to(get_my_group));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = if state.service.ledger_healthy().await {
        "healthy"
    } else {
        "degraded"
    };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Commit a new matching attempt
///
/// POST /api/v1/events/{eventId}/match
///
/// Optional request body:
/// ```json
/// { "triggeredBy": "string" }
/// ```
///
/// An empty body records the token subject; a body that is present must
/// parse, otherwise nothing is committed.
async fn commit_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match state.auth.require_admin(&http_req) {
        Ok(caller) => caller,
        Err(e) => return auth_error_response(&e),
    };

    let request = match parse_commit_request(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::info!("Rejecting commit body on {}: {}", http_req.path(), e);
            return error_response(StatusCode::BAD_REQUEST, "invalid_json", format!("Invalid JSON: {}", e));
        }
    };
    if let Err(errors) = request.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let event_id = path.into_inner();
    let actor = request.triggered_by.unwrap_or(caller.subject);

    tracing::info!("Commit requested for event {} by {}", event_id, actor);

    match state.service.commit(&event_id, &actor).await {
        Ok(attempt) => HttpResponse::Ok().json(AttemptResponse::from(attempt)),
        Err(e) => matching_error_response(&e),
    }
}

fn parse_commit_request(body: &[u8]) -> Result<CommitRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CommitRequest::default());
    }
    serde_json::from_slice(body)
}

/// Compute a preview without committing
///
/// POST /api/v1/events/{eventId}/preview
async fn preview_match(
    state: web::Data<AppState>,
    path: web::Path<String>,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match state.auth.require_admin(&http_req) {
        Ok(caller) => caller,
        Err(e) => return auth_error_response(&e),
    };

    let event_id = path.into_inner();

    match state.service.preview(&event_id, &caller.subject).await {
        Ok(attempt) => HttpResponse::Ok().json(AttemptResponse::from(attempt)),
        Err(e) => matching_error_response(&e),
    }
}

/// Current committed attempt of the event
///
/// GET /api/v1/events/{eventId}/results
async fn get_results(
    state: web::Data<AppState>,
    path: web::Path<String>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(e) = state.auth.authenticate(&http_req) {
        return auth_error_response(&e);
    }

    let event_id = path.into_inner();

    match state.service.results(&event_id).await {
        Ok(attempt) => HttpResponse::Ok().json(ResultsResponse {
            event_id,
            matched: attempt.is_some(),
            attempt: attempt.map(AttemptResponse::from),
        }),
        Err(e) => matching_error_response(&e),
    }
}

/// Attempt history of the event, newest first
///
/// GET /api/v1/events/{eventId}/history
async fn get_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Err(e) = state.auth.require_admin(&http_req) {
        return auth_error_response(&e);
    }

    let event_id = path.into_inner();

    match state.service.history(&event_id).await {
        Ok(attempts) => HttpResponse::Ok().json(HistoryResponse { event_id, attempts }),
        Err(e) => matching_error_response(&e),
    }
}

/// The caller's table in the committed attempt
///
/// GET /api/v1/events/{eventId}/my-group
///
/// A caller without a table gets `matched: false`, not an error.
async fn get_my_group(
    state: web::Data<AppState>,
    path: web::Path<String>,
    http_req: HttpRequest,
) -> impl Responder {
    let caller = match state.auth.authenticate(&http_req) {
        Ok(caller) => caller,
        Err(e) => return auth_error_response(&e),
    };

    let event_id = path.into_inner();

    match state.service.my_group(&event_id, &caller.subject).await {
        Ok((attempt_id, group)) => HttpResponse::Ok().json(MyGroupResponse {
            event_id,
            participant_id: caller.subject,
            matched: true,
            attempt_id: Some(attempt_id),
            group: Some(group),
        }),
        Err(MatchingError::NotMatched { .. }) => HttpResponse::Ok().json(MyGroupResponse {
            event_id,
            participant_id: caller.subject,
            matched: false,
            attempt_id: None,
            group: None,
        }),
        Err(e) => matching_error_response(&e),
    }
}

/// Map a matching error to its HTTP response
pub fn matching_error_response(err: &MatchingError) -> HttpResponse {
    let status = match err {
        MatchingError::NotFound(_) | MatchingError::NotMatched { .. } => StatusCode::NOT_FOUND,
        MatchingError::InsufficientParticipants { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MatchingError::ConcurrentCommit(_) => StatusCode::CONFLICT,
        MatchingError::Roster(_) => StatusCode::BAD_GATEWAY,
        MatchingError::InvalidPolicy(_)
        | MatchingError::InvariantViolation(_)
        | MatchingError::Ledger(_)
        | MatchingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed with {}: {}", status, err);
    }

    error_response(status, err.kind(), err.to_string())
}

/// Map an authentication error to its HTTP response
pub fn auth_error_response(err: &AuthError) -> HttpResponse {
    match err {
        AuthError::MissingToken | AuthError::InvalidToken(_) => {
            error_response(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string())
        }
        AuthError::Forbidden => error_response(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

fn error_response(status: StatusCode, error: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        error: error.to_string(),
        message,
        status_code: status.as_u16(),
    })
}
