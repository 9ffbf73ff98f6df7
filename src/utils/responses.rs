//! HTTP response helpers
//!
//! Every callback page carries tokens-derived state, so all HTML responses
//! are marked `no-store`.

use actix_web::{cookie::Cookie, http::header, HttpResponse};
use serde::Serialize;

/// Unified response builder
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Create an HTML page response (200)
    #[must_use]
    pub fn page(body: String) -> PageResponseBuilder {
        PageResponseBuilder::new(body)
    }

    /// Create an OK response (200) with JSON content
    #[must_use]
    pub fn json<T: Serialize>(body: &T) -> HttpResponse {
        HttpResponse::Ok().json(body)
    }
}

/// Builder for HTML page responses
pub struct PageResponseBuilder {
    body: String,
    cookies: Vec<Cookie<'static>>,
}

impl PageResponseBuilder {
    fn new(body: String) -> Self {
        Self {
            body,
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn build(self) -> HttpResponse {
        let mut builder = HttpResponse::Ok();
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .insert_header((header::REFERRER_POLICY, "no-referrer"))
            .content_type("text/html; charset=utf-8")
            .body(self.body)
    }
}
