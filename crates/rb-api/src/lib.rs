//! # rb-api
//!
//! The HTTP routing layer for Reply-Board.

pub mod error;
pub mod handlers;
pub mod middleware;

use actix_web::web;

pub use error::ApiError;
pub use handlers::AppState;

/// Configures the comment routes.
///
/// # Developer Note
/// Routes are registered on a `ServiceConfig` so the binary can mount the
/// API under a prefix (e.g., `/api/v1/`) if needed.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/threads/{thread_id}/comments")
                .route("", web::post().to(handlers::create_comment))
                .route("", web::get().to(handlers::list_comments))
                .route("", web::delete().to(handlers::purge_thread))
                .route("/tree", web::get().to(handlers::list_comment_tree))
                .route("/count", web::get().to(handlers::count_comments)),
        )
        .service(
            web::scope("/comments/{id}")
                .route("", web::get().to(handlers::get_comment))
                .route("", web::put().to(handlers::update_comment))
                .route("", web::delete().to(handlers::delete_comment))
                .route("/replies", web::get().to(handlers::list_replies))
                .route("/replies/count", web::get().to(handlers::count_replies))
                .route("/has-replies", web::get().to(handlers::has_replies)),
        );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use rb_core::models::{Comment, CommentNode};
    use rb_core::pagination::Page;
    use rb_core::traits::MockEventTransport;
    use rb_db_memory::MemoryCommentStore;
    use rb_services::{CommentCounters, EventPublisher, ThreadingEngine};
    use serde_json::json;

    use super::*;
    use crate::handlers::{CountResponse, CreatedResponse, HasRepliesResponse, PurgedResponse};

    fn state() -> web::Data<AppState> {
        let mut transport = MockEventTransport::new();
        transport.expect_publish().returning(|_, _, _| Ok(()));
        let (events, _worker) = EventPublisher::spawn(Arc::new(transport), "comment.exchange", 64);
        let engine = ThreadingEngine::new(Arc::new(MemoryCommentStore::new()), events);
        web::Data::new(AppState {
            engine: Arc::new(engine),
            counters: None,
        })
    }

    fn state_with_counters() -> (web::Data<AppState>, Arc<CommentCounters>) {
        let counters = Arc::new(CommentCounters::new());
        let state = state();
        let state = web::Data::new(AppState {
            engine: state.engine.clone(),
            counters: Some(counters.clone()),
        });
        (state, counters)
    }

    #[derive(serde::Deserialize)]
    struct ErrorReply {
        error: String,
    }

    #[actix_web::test]
    async fn test_reply_lifecycle() {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;

        let req = test::TestRequest::post()
            .uri("/threads/7/comments")
            .set_json(json!({ "author_id": 1, "content": "first" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let root: CreatedResponse = test::read_body_json(resp).await;

        let req = test::TestRequest::post()
            .uri("/threads/7/comments")
            .set_json(json!({ "author_id": 2, "content": "reply", "parent_id": root.id }))
            .to_request();
        let reply: CreatedResponse = test::call_and_read_body_json(&app, req).await;

        // replies to replies are refused
        let req = test::TestRequest::post()
            .uri("/threads/7/comments")
            .set_json(json!({ "author_id": 3, "content": "nested", "parent_id": reply.id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: ErrorReply = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_depth");

        let req = test::TestRequest::get().uri("/threads/7/comments/tree").to_request();
        let tree: Page<CommentNode> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(tree.total, 1);
        assert_eq!(tree.items[0].comment.id, root.id);
        assert_eq!(tree.items[0].children.len(), 1);

        let req = test::TestRequest::get()
            .uri(&format!("/comments/{}/has-replies", root.id))
            .to_request();
        let has: HasRepliesResponse = test::call_and_read_body_json(&app, req).await;
        assert!(has.has_replies);

        let req = test::TestRequest::delete().uri(&format!("/comments/{}", root.id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::delete().uri(&format!("/comments/{}", reply.id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
        let req = test::TestRequest::delete().uri(&format!("/comments/{}", root.id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&format!("/comments/{}", root.id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_update_replaces_content() {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/threads/1/comments")
            .set_json(json!({ "author_id": 1, "content": "draft" }))
            .to_request();
        let created: CreatedResponse = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::put()
            .uri(&format!("/comments/{}", created.id))
            .set_json(json!({ "content": "final" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&format!("/comments/{}", created.id)).to_request();
        let comment: Comment = test::call_and_read_body_json(&app, req).await;
        assert_eq!(comment.content, "final");

        let req = test::TestRequest::put()
            .uri(&format!("/comments/{}", created.id))
            .set_json(json!({ "content": "   " }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_validation_errors_are_bad_requests() {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;

        for body in [
            json!({ "author_id": 1, "content": "" }),
            json!({ "content": "no author" }),
            json!({ "author_id": 1, "content": "x".repeat(256) }),
        ] {
            let req = test::TestRequest::post()
                .uri("/threads/1/comments")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: ErrorReply = test::read_body_json(resp).await;
            assert_eq!(body.error, "validation_error");
        }

        let req = test::TestRequest::post()
            .uri("/threads/1/comments")
            .set_json(json!({ "author_id": 1, "content": "orphan", "parent_id": uuid::Uuid::now_v7() }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_flat_listing_pages_and_counts() {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;
        for i in 0..12 {
            let req = test::TestRequest::post()
                .uri("/threads/3/comments")
                .set_json(json!({ "author_id": 1, "content": format!("c{i}") }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get()
            .uri("/threads/3/comments?page=2&size=5")
            .to_request();
        let page: Page<Comment> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 12);
        assert_eq!(page.window.page, 2);
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].content, "c5");
        assert_eq!((page.window.start, page.window.end), (1, 3));
        assert!(!page.window.has_next);

        let req = test::TestRequest::get().uri("/threads/3/comments/count").to_request();
        let count: CountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.count, 12);

        // unknown thread: empty page, not an error
        let req = test::TestRequest::get().uri("/threads/99/comments").to_request();
        let page: Page<Comment> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[actix_web::test]
    async fn test_keyword_and_depth_filters() {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/threads/4/comments")
            .set_json(json!({ "author_id": 15, "content": "Rust ownership" }))
            .to_request();
        let root: CreatedResponse = test::call_and_read_body_json(&app, req).await;
        for (author, content) in [(27, "borrowing in rust"), (31, "something else")] {
            let req = test::TestRequest::post()
                .uri("/threads/4/comments")
                .set_json(json!({ "author_id": author, "content": content, "parent_id": root.id }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        }

        let req = test::TestRequest::get()
            .uri("/threads/4/comments?type=c&keyword=rust")
            .to_request();
        let page: Page<Comment> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 2);

        let req = test::TestRequest::get()
            .uri("/threads/4/comments?type=cw&keyword=31")
            .to_request();
        let page: Page<Comment> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].content, "something else");

        let req = test::TestRequest::get()
            .uri("/threads/4/comments?depth=1&size=1")
            .to_request();
        let page: Page<Comment> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.window.end, 2);

        // a blank keyword falls back to the depth filter
        let req = test::TestRequest::get()
            .uri("/threads/4/comments?type=c&keyword=%20&depth=0")
            .to_request();
        let page: Page<Comment> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, root.id);
    }

    #[actix_web::test]
    async fn test_purge_thread() {
        let app = test::init_service(App::new().app_data(state()).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/threads/5/comments")
            .set_json(json!({ "author_id": 1, "content": "root" }))
            .to_request();
        let root: CreatedResponse = test::call_and_read_body_json(&app, req).await;
        let req = test::TestRequest::post()
            .uri("/threads/5/comments")
            .set_json(json!({ "author_id": 2, "content": "reply", "parent_id": root.id }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let req = test::TestRequest::delete().uri("/threads/5/comments").to_request();
        let purged: PurgedResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(purged.removed, 2);

        let req = test::TestRequest::get().uri("/threads/5/comments/count").to_request();
        let count: CountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.count, 0);

        let req = test::TestRequest::delete().uri("/threads/0/comments").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_cached_counts_come_from_counters() {
        let (state, counters) = state_with_counters();
        let app = test::init_service(App::new().app_data(state).configure(configure_routes)).await;
        let req = test::TestRequest::post()
            .uri("/threads/6/comments")
            .set_json(json!({ "author_id": 1, "content": "root" }))
            .to_request();
        let root: CreatedResponse = test::call_and_read_body_json(&app, req).await;

        // first cached read seeds from the store
        assert_eq!(counters.thread_count(6), None);
        let req = test::TestRequest::get().uri("/threads/6/comments/count?cached=true").to_request();
        let count: CountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.count, 1);
        assert_eq!(counters.thread_count(6), Some(1));

        // later cached reads never touch the store
        counters.reset_thread(6, 40);
        counters.reset_replies(root.id, 7);
        let req = test::TestRequest::get().uri("/threads/6/comments/count?cached=true").to_request();
        let count: CountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.count, 40);
        let req = test::TestRequest::get()
            .uri(&format!("/comments/{}/replies/count?cached=true", root.id))
            .to_request();
        let count: CountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.count, 7);

        // without the flag the store answers
        let req = test::TestRequest::get().uri("/threads/6/comments/count").to_request();
        let count: CountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(count.count, 1);
    }
}
