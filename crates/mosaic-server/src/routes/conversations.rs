use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt, stream};
use mosaic_core::{GenerationRequest, InputImage, ProviderId, UserId};
use mosaic_fanout::{
    BranchView, ConversationId, Draft, FanoutError, FanoutEvent, FanoutServer, Turn, TurnId, Vote, render,
    render_branch,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Serialize)]
pub(super) struct Created {
    id: ConversationId,
}

/// A turn together with how each of its branches renders
#[derive(Serialize)]
pub(super) struct TurnView {
    #[serde(flatten)]
    turn: Turn,
    views: Vec<BranchView>,
}

impl TurnView {
    fn new(turn: Turn) -> Self {
        Self {
            views: render(&turn),
            turn,
        }
    }
}

#[derive(Serialize)]
pub(super) struct ConversationView {
    id: ConversationId,
    turns: Vec<TurnView>,
    draft: Draft,
}

fn conversation_id(raw: &str) -> Result<ConversationId, FanoutError> {
    raw.parse()
        .map_err(|_| FanoutError::ConversationNotFound(raw.to_string()))
}

fn turn_id(raw: &str) -> Result<TurnId, FanoutError> {
    raw.parse().map_err(|_| FanoutError::TurnNotFound(raw.to_string()))
}

/// `POST /v1/conversations`
pub(super) async fn create(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let id = server.conversations().create(user.clone());
    tracing::debug!(user = %user, conversation = %id, "conversation created");

    Ok((StatusCode::CREATED, Json(Created { id })))
}

/// `GET /v1/conversations/{id}`
pub(super) async fn show(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
) -> Result<Json<ConversationView>, ApiError> {
    let conversation = server.conversations().snapshot(conversation_id(&id)?, &user)?;

    Ok(Json(ConversationView {
        id: conversation.id,
        turns: conversation.turns.into_iter().map(TurnView::new).collect(),
        draft: conversation.draft,
    }))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SubmitBody {
    prompt: String,
    #[serde(default, alias = "input_image")]
    image: Option<InputImage>,
    #[serde(default)]
    providers: Vec<ProviderId>,
    #[serde(default)]
    enhance: bool,
}

/// `POST /v1/conversations/{id}/generations`
///
/// Streams `turn` events for the new user and assistant turns, one
/// `branch` event per settled provider, then `done`.
pub(super) async fn submit(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
    Path(id): Path<String>,
    Json(body): Json<SubmitBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let request = GenerationRequest {
        prompt: body.prompt,
        input_image: body.image,
        providers: body.providers,
        enhance: body.enhance,
    };

    let started = server.submit(&user, conversation_id(&id)?, request).await?;

    let head = [started.user_turn, started.assistant_turn]
        .map(|turn| Event::default().event("turn").json_data(TurnView::new(turn)));

    let tail = stream::unfold(started.events, |mut events| async move {
        events.recv().await.map(|event| (event, events))
    })
    .map(|event| {
        let name = match event {
            FanoutEvent::Branch { .. } => "branch",
            FanoutEvent::Done { .. } => "done",
        };
        Event::default().event(name).json_data(event)
    });

    Ok(Sse::new(stream::iter(head).chain(tail)).keep_alive(KeepAlive::default()))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct VoteBody {
    vote: Vote,
}

/// `POST /v1/conversations/{id}/turns/{turn_id}/branches/{label}/vote`
pub(super) async fn vote(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
    Path((id, turn, label)): Path<(String, String, String)>,
    Json(body): Json<VoteBody>,
) -> Result<Json<BranchView>, ApiError> {
    let label = ProviderId::new(label);

    let turn = server
        .conversations()
        .vote(conversation_id(&id)?, &user, turn_id(&turn)?, &label, body.vote)?;

    let branch = turn.branch(&label).ok_or_else(|| FanoutError::BranchNotFound(label.clone()))?;
    Ok(Json(render_branch(branch)))
}

/// `POST /v1/conversations/{id}/turns/{turn_id}/branches/{label}/reuse`
pub(super) async fn reuse(
    State(server): State<Arc<FanoutServer>>,
    Extension(user): Extension<UserId>,
    Path((id, turn, label)): Path<(String, String, String)>,
) -> Result<Json<Draft>, ApiError> {
    let draft = server
        .conversations()
        .reuse(conversation_id(&id)?, &user, turn_id(&turn)?, &ProviderId::new(label))?;

    Ok(Json(draft))
}
