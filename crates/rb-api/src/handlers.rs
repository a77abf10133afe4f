//! # rb-api Handlers
//!
//! Thin adapters between HTTP and the `ThreadingEngine`. No rule is
//! checked here; the engine owns every invariant.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use rb_core::pagination::PageRequest;
use rb_core::search::ListQuery;
use rb_services::{CommentCounters, ThreadingEngine};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub engine: Arc<ThreadingEngine>,
    /// Present when an in-process consumer keeps the counters fed.
    pub counters: Option<Arc<CommentCounters>>,
}

type HandlerResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    /// Absent is treated like an unknown author and rejected by validation.
    #[serde(default)]
    pub author_id: Option<i64>,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: i64,
}

/// `?cached=true` answers from the event-fed counters instead of the store.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CountQuery {
    pub cached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgedResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HasRepliesResponse {
    pub has_replies: bool,
}

pub async fn create_comment(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<CreateCommentRequest>,
) -> HandlerResult {
    let thread_id = path.into_inner();
    let body = body.into_inner();
    let id = data
        .engine
        .create(thread_id, body.author_id.unwrap_or(0), &body.content, body.parent_id)
        .await?;

    Ok(HttpResponse::Created()
        .insert_header(("Location", format!("/comments/{id}")))
        .json(CreatedResponse { id }))
}

pub async fn get_comment(data: web::Data<AppState>, path: web::Path<Uuid>) -> HandlerResult {
    let comment = data.engine.read(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comment))
}

pub async fn update_comment(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCommentRequest>,
) -> HandlerResult {
    data.engine.update(path.into_inner(), &body.content).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn delete_comment(data: web::Data<AppState>, path: web::Path<Uuid>) -> HandlerResult {
    data.engine.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// `GET /threads/{thread_id}/comments?page=&size=&type=&keyword=&depth=`
pub async fn list_comments(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<ListQuery>,
) -> HandlerResult {
    let page = data
        .engine
        .search_flat(path.into_inner(), &query.filter(), query.page_request())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// `DELETE /threads/{thread_id}/comments`
pub async fn purge_thread(data: web::Data<AppState>, path: web::Path<i64>) -> HandlerResult {
    let removed = data.engine.purge_thread(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PurgedResponse { removed }))
}

/// `GET /threads/{thread_id}/comments/tree?page=&size=`; pages over roots.
pub async fn list_comment_tree(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<PageRequest>,
) -> HandlerResult {
    let page = data
        .engine
        .list_hierarchical(path.into_inner(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn count_comments(
    data: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<CountQuery>,
) -> HandlerResult {
    let thread_id = path.into_inner();
    let counters = data.counters.as_ref().filter(|_| query.cached);
    let count = match counters.and_then(|c| c.thread_count(thread_id)) {
        Some(count) => count,
        None => {
            let count = data.engine.count_in_thread(thread_id).await?;
            if let Some(counters) = counters {
                counters.reset_thread(thread_id, count);
            }
            count
        }
    };
    Ok(HttpResponse::Ok().json(CountResponse { count }))
}

pub async fn list_replies(data: web::Data<AppState>, path: web::Path<Uuid>) -> HandlerResult {
    let replies = data.engine.get_children(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(replies))
}

pub async fn count_replies(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<CountQuery>,
) -> HandlerResult {
    let parent_id = path.into_inner();
    let counters = data.counters.as_ref().filter(|_| query.cached);
    let count = match counters.and_then(|c| c.reply_count(parent_id)) {
        Some(count) => count,
        None => {
            let count = data.engine.count_under_parent(parent_id).await?;
            if let Some(counters) = counters {
                counters.reset_replies(parent_id, count);
            }
            count
        }
    };
    Ok(HttpResponse::Ok().json(CountResponse { count }))
}

pub async fn has_replies(data: web::Data<AppState>, path: web::Path<Uuid>) -> HandlerResult {
    let has_replies = data.engine.has_children(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(HasRepliesResponse { has_replies }))
}

/// Liveness check.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}
