use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const HX_REQUEST_HEADER: &str = "hx-request";

/// Per-request data handed to a widget's fetch.
///
/// Dropping the handler future (client went away, request deadline hit)
/// cancels the token through the guard the handler holds, so anything that
/// was spawned on behalf of the request can bail out.
#[derive(Debug, Clone)]
pub struct WidgetRequestContext {
    pub request_id: String,
    /// `true` for htmx partial refreshes, `false` for full page loads.
    pub partial: bool,
    pub path: String,
    cancel: CancellationToken,
}

impl WidgetRequestContext {
    #[must_use]
    pub fn new(request_id: impl Into<String>, partial: bool, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            partial,
            path: path.into(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<S> FromRequestParts<S> for WidgetRequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        // The request-id middleware normally sets this; fall back to our own
        // id so log lines can still be correlated.
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map_or_else(|| uuid::Uuid::now_v7().to_string(), ToString::to_string);

        let partial = parts
            .headers
            .get(HX_REQUEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Self::new(request_id, partial, parts.uri.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> WidgetRequestContext {
        let (mut parts, ()) = request.into_parts();
        WidgetRequestContext::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_extracts_request_id_and_hx_flag() {
        let request = Request::builder()
            .uri("/widgets/weather?x=1")
            .header(REQUEST_ID_HEADER, "req-123")
            .header("HX-Request", "true")
            .body(())
            .unwrap();

        let ctx = extract(request).await;

        assert_eq!(ctx.request_id, "req-123");
        assert!(ctx.partial);
        assert_eq!(ctx.path, "/widgets/weather");
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_generates_request_id_when_missing() {
        let request =
            Request::builder().uri("/widgets/hn").body(()).unwrap();

        let ctx = extract(request).await;

        assert!(!ctx.request_id.is_empty());
        assert!(!ctx.partial);
    }
}
