//! The per-widget fetch -> cache -> render pipeline.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get};
use chrono::{DateTime, TimeDelta, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::cache::{CacheLookup, TtlCache};
use crate::clock::{Clock, SystemClock};
use crate::context::WidgetRequestContext;
use crate::error::{FetchError, RenderError};
use crate::markup::{Markup, format_stale_by};

pub const STALE_HEADER: &str = "x-widget-stale";
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// The capabilities a widget plugs into [`WidgetHandler`].
pub trait Widget: Send + Sync + 'static {
    /// Render-ready data; this is what gets cached.
    type ViewModel: Clone + Send + Sync + 'static;

    /// Pull fresh data from upstream.
    fn fetch(
        &self,
        ctx: &WidgetRequestContext,
    ) -> impl Future<Output = Result<Self::ViewModel, FetchError>> + Send;

    /// # Errors
    ///
    /// Returns [`RenderError`] when the view model cannot be turned into
    /// markup.
    fn render(&self, view: &Self::ViewModel) -> Result<Markup, RenderError>;

    /// Fragment shown when fetching failed and nothing is cached.
    fn render_error(&self, err: &FetchError) -> Markup;

    /// Annotate a cached view model that is being served past its TTL.
    ///
    /// The default leaves the value untouched.
    fn mark_stale(
        &self,
        view: Self::ViewModel,
        _stale_by: Duration,
    ) -> Self::ViewModel {
        view
    }
}

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Cached value was still fresh, no fetch happened.
    FreshHit,
    /// Fetched and (if caching is on) stored a new value.
    Refreshed,
    /// Fetch failed, the expired cached value was served instead.
    ServedStale,
    /// Fetch failed and there was nothing to fall back to.
    FetchFailed,
    /// A view model was available but could not be rendered.
    RenderFailed,
}

#[derive(Debug)]
pub struct WidgetResponse {
    pub status: StatusCode,
    pub outcome: Outcome,
    pub body: String,
}

impl WidgetResponse {
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.outcome == Outcome::ServedStale
    }

    fn rendered(markup: Markup, outcome: Outcome) -> Self {
        Self {
            status: StatusCode::OK,
            outcome,
            body: markup.into_string(),
        }
    }

    fn render_failed() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            outcome: Outcome::RenderFailed,
            body: "render error".to_string(),
        }
    }

    fn fetch_failed(markup: Markup) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            outcome: Outcome::FetchFailed,
            body: markup.into_string(),
        }
    }
}

impl IntoResponse for WidgetResponse {
    fn into_response(self) -> Response {
        let content_type = if self.outcome == Outcome::RenderFailed {
            "text/plain; charset=utf-8"
        } else {
            HTML_CONTENT_TYPE
        };
        let stale = self.is_stale();

        let mut response =
            (self.status, [(header::CONTENT_TYPE, content_type)], self.body)
                .into_response();

        if stale {
            response
                .headers_mut()
                .insert(STALE_HEADER, HeaderValue::from_static("true"));
        }

        response
    }
}

/// Serves one widget: checks its cache, refreshes on miss or expiry, and
/// falls back to stale data when a refresh fails.
pub struct WidgetHandler<W: Widget> {
    name: String,
    ttl: Duration,
    cache: Option<TtlCache<W::ViewModel>>,
    fetch_timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
    widget: W,
}

impl<W: Widget> WidgetHandler<W> {
    /// A handler with caching enabled, [`DEFAULT_TTL`] and the system clock.
    pub fn new(name: impl Into<String>, widget: W) -> Self {
        Self {
            name: name.into(),
            ttl: DEFAULT_TTL,
            cache: Some(TtlCache::new()),
            fetch_timeout: None,
            clock: Arc::new(SystemClock),
            widget,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Every request goes upstream and failures have no fallback.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Give up on a fetch after `timeout`; the timeout counts as a failed
    /// fetch.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn widget(&self) -> &W {
        &self.widget
    }

    /// Serve `GET` for this widget.
    pub fn into_route(self) -> MethodRouter {
        let handler = Arc::new(self);

        get(move |ctx: WidgetRequestContext| {
            let handler = Arc::clone(&handler);
            async move {
                // cancel sub-fetches if the request future is dropped
                let _guard = ctx.cancellation().clone().drop_guard();
                handler.handle(ctx).await
            }
        })
    }

    pub async fn handle(&self, ctx: WidgetRequestContext) -> WidgetResponse {
        let span = tracing::info_span!(
            "widget",
            widget = %self.name,
            req_id = %ctx.request_id,
            hx = ctx.partial,
            path = %ctx.path,
        );

        self.refresh(&ctx).instrument(span).await
    }

    async fn refresh(&self, ctx: &WidgetRequestContext) -> WidgetResponse {
        let now = self.clock.now();

        let lookup = self
            .cache
            .as_ref()
            .map_or(CacheLookup::Miss, |cache| cache.get(now));

        if let CacheLookup::Fresh { value, .. } = lookup {
            return self.render(&value, Outcome::FreshHit);
        }

        match self.fetch(ctx).await {
            Ok(value) => {
                if let Some(cache) =
                    self.cache.as_ref().filter(|_| !self.ttl.is_zero())
                {
                    cache.set(value.clone(), expiry(now, self.ttl));
                }
                self.render(&value, Outcome::Refreshed)
            }
            Err(err) => match lookup {
                CacheLookup::Stale { value, expires_at } => {
                    let stale_by = (now - expires_at).to_std().unwrap_or_default();
                    tracing::warn!(
                        stale_by = %format_stale_by(stale_by),
                        error = %err,
                        "widget_fetch_failed_serving_stale"
                    );

                    let value = self.widget.mark_stale(value, stale_by);
                    self.render(&value, Outcome::ServedStale)
                }
                CacheLookup::Miss | CacheLookup::Fresh { .. } => {
                    tracing::error!(error = %err, "widget_fetch_failed");
                    WidgetResponse::fetch_failed(self.widget.render_error(&err))
                }
            },
        }
    }

    async fn fetch(
        &self,
        ctx: &WidgetRequestContext,
    ) -> Result<W::ViewModel, FetchError> {
        let cancel = ctx.cancellation();
        let deadline = async {
            match self.fetch_timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = self.widget.fetch(ctx) => result,
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            () = deadline => {
                // let fan-out sub-fetches know they can stop
                cancel.cancel();
                Err(FetchError::TimedOut)
            }
        }
    }

    fn render(&self, value: &W::ViewModel, outcome: Outcome) -> WidgetResponse {
        match self.widget.render(value) {
            Ok(markup) => WidgetResponse::rendered(markup, outcome),
            Err(err) => {
                tracing::error!(error = %err, "widget_render_failed");
                WidgetResponse::render_failed()
            }
        }
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
