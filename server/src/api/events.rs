//! Event API endpoints.
//!
//! - POST /api/events - Create a new event (requires auth)
//! - GET /api/events - List events with filters and sorting
//! - GET /api/events/:id - Get event details
//! - PUT /api/events/:id - Update event (requires ownership)
//! - DELETE /api/events/:id - Delete event (requires ownership)
//! - POST /api/events/:id/join - Attend an event (requires auth)
//! - POST /api/events/:id/leave - Stop attending an event (requires auth)

use crate::server::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use rally_core::{Event, EventId, EventPatch, EventQuery, JoinOutcome, LeaveOutcome, NewEvent};
use rally_web::{Authenticated, WebResult};
use serde::Serialize;

// ============================================================================
// Response Types
// ============================================================================

/// Membership status reported by join and leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    /// The caller was added
    Joined,
    /// The caller was already attending
    AlreadyJoined,
    /// The caller was removed
    Left,
    /// The caller was not attending
    NotAttending,
}

/// Response for join and leave.
#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    /// What happened
    pub status: AttendanceStatus,
    /// Human-readable message
    pub message: String,
    /// The event after the request
    pub event: Event,
}

impl From<JoinOutcome> for AttendanceResponse {
    fn from(outcome: JoinOutcome) -> Self {
        let (status, message) = match outcome {
            JoinOutcome::Joined(_) => (AttendanceStatus::Joined, "Joined the event successfully"),
            JoinOutcome::AlreadyJoined(_) => (
                AttendanceStatus::AlreadyJoined,
                "You are already attending this event",
            ),
        };
        Self {
            status,
            message: message.to_string(),
            event: outcome.into_event(),
        }
    }
}

impl From<LeaveOutcome> for AttendanceResponse {
    fn from(outcome: LeaveOutcome) -> Self {
        let (status, message) = match outcome {
            LeaveOutcome::Left(_) => (AttendanceStatus::Left, "Left the event successfully"),
            LeaveOutcome::NotAttending(_) => (
                AttendanceStatus::NotAttending,
                "You are not attending this event",
            ),
        };
        Self {
            status,
            message: message.to_string(),
            event: outcome.into_event(),
        }
    }
}

/// Response after deleting an event.
#[derive(Debug, Serialize)]
pub struct DeleteEventResponse {
    /// Deleted event ID
    pub event_id: EventId,
    /// Success message
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new event.
///
/// Requires authentication. The authenticated user becomes the owner.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events \
///   -H "Authorization: Bearer <session_token>" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "name": "Launch Party",
///     "description": "Celebrating the release",
///     "date": "2025-02-01T18:00:00Z",
///     "location": "Main Hall",
///     "category": "meetup"
///   }'
/// ```
pub async fn create_event(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> WebResult<(StatusCode, Json<Event>)> {
    let Json(input) = body?;
    let event = state.service.create(&identity, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// List events.
///
/// Public endpoint. Supports `category`, `when`, `search` and `sort`.
///
/// # Example
///
/// ```bash
/// curl "http://localhost:8080/api/events?category=meetup&when=upcoming&sort=popular"
/// ```
pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> WebResult<Json<Vec<Event>>> {
    let Query(query) = query?;
    let events = state.service.list(query).await?;
    Ok(Json(events))
}

/// Get event details by ID.
///
/// Public endpoint.
pub async fn get_event(
    State(state): State<AppState>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> WebResult<Json<Event>> {
    let Path(event_id) = event_id?;
    let event = state.service.get(event_id).await?;
    Ok(Json(event))
}

/// Update an event.
///
/// Requires authentication and ownership. Only the supplied fields change.
pub async fn update_event(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    event_id: Result<Path<EventId>, PathRejection>,
    body: Result<Json<EventPatch>, JsonRejection>,
) -> WebResult<Json<Event>> {
    let Path(event_id) = event_id?;
    let Json(patch) = body?;
    let event = state.service.mutate(event_id, &identity, patch).await?;
    Ok(Json(event))
}

/// Delete an event.
///
/// Requires authentication and ownership.
pub async fn delete_event(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> WebResult<Json<DeleteEventResponse>> {
    let Path(event_id) = event_id?;
    state.service.remove(event_id, &identity).await?;
    Ok(Json(DeleteEventResponse {
        event_id,
        message: "Event deleted successfully".to_string(),
    }))
}

/// Join an event.
///
/// Joining twice is not an error: the second call reports `already_joined`.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events/<id>/join \
///   -H "Authorization: Bearer <session_token>"
/// # {"status":"joined","message":"Joined the event successfully","event":{...}}
/// ```
pub async fn join_event(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> WebResult<Json<AttendanceResponse>> {
    let Path(event_id) = event_id?;
    let outcome = state.service.join(event_id, &identity).await?;
    Ok(Json(outcome.into()))
}

/// Leave an event.
///
/// Leaving an event the caller does not attend reports `not_attending`.
pub async fn leave_event(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    event_id: Result<Path<EventId>, PathRejection>,
) -> WebResult<Json<AttendanceResponse>> {
    let Path(event_id) = event_id?;
    let outcome = state.service.leave(event_id, &identity).await?;
    Ok(Json(outcome.into()))
}
