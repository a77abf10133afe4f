//! Middleware for access logging and cross-origin access.

use actix_cors::Cors;
use actix_web::middleware::Logger;

/// Access log in the shape `remote-ip "request-line" status size duration`.
/// Records go through the `log` facade and reach the tracing subscriber.
pub fn access_log() -> Logger {
    Logger::new(r#"%a "%r" %s %b %Dms"#)
}

/// Lets a browser front end on another origin drive the comment API.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_header(actix_web::http::header::CONTENT_TYPE)
        .max_age(3600)
}
