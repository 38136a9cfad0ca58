//! Top stories from the Hacker News Firebase API.

use chrono::{DateTime, Local, TimeZone};
use dash_http::{HttpError, JsonClient};
use reqwest::Url;
use std::fmt::{self, Write};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use types::HackerNewsItem;
use widgetkit::markup::{escape, format_stale_by, widget_error};
use widgetkit::{
    BoundedFetcher, FetchError, Markup, RenderError, Widget,
    WidgetRequestContext,
};

use super::stale_note;

pub const HN_API_URL: &str = "https://hacker-news.firebaseio.com/v0";
pub const HN_ITEM_PAGE: &str = "https://news.ycombinator.com/item?id=";

const JUST_NOW: &str = "just now";

#[derive(Debug, Clone)]
pub struct HackerNewsClient {
    http: JsonClient,
    base_url: String,
}

impl HackerNewsClient {
    #[must_use]
    pub fn new(http: JsonClient) -> Self {
        Self {
            http,
            base_url: HN_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Story ids in rank order.
    ///
    /// # Errors
    ///
    /// Propagates the [`HttpError`] of the final attempt.
    pub async fn top_stories(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<i64>, HttpError> {
        self.http
            .get_json(&format!("{}/topstories.json", self.base_url), cancel)
            .await
    }

    /// `None` when the item has been deleted.
    ///
    /// # Errors
    ///
    /// Propagates the [`HttpError`] of the final attempt.
    pub async fn item(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<HackerNewsItem>, HttpError> {
        self.http
            .get_json(&format!("{}/item/{id}.json", self.base_url), cancel)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub rank: usize,
    pub title: String,
    pub url: String,
    pub discussion_url: String,
    /// Empty for text posts.
    pub domain: String,
    pub score: i64,
    pub by: String,
    pub age: String,
    pub comments: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HackerNewsView {
    pub updated_at: String,
    pub entries: Vec<Entry>,

    pub is_stale: bool,
    pub stale_by: Option<String>,
}

/// Items are in rank order; deleted (`None`) items are skipped without
/// shifting the ranks of the ones after them.
pub fn build_view_model<Tz>(
    now: &DateTime<Tz>,
    items: &[Option<HackerNewsItem>],
) -> HackerNewsView
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let entries = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| item.as_ref().map(|item| (index + 1, item)))
        .map(|(rank, item)| Entry {
            rank,
            title: item.title.clone(),
            url: item_url(item),
            discussion_url: discussion_url(item.id),
            domain: domain_from_url(&item.url),
            score: item.score,
            by: item.by.clone(),
            age: relative_age(now, item.time),
            comments: item.descendants,
        })
        .collect();

    HackerNewsView {
        updated_at: now.format("%-I:%M %p").to_string(),
        entries,
        is_stale: false,
        stale_by: None,
    }
}

/// The story link, or the discussion page for text posts and links that
/// are not http(s).
fn item_url(item: &HackerNewsItem) -> String {
    match Url::parse(&item.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => item.url.clone(),
        _ => discussion_url(item.id),
    }
}

fn discussion_url(id: i64) -> String {
    format!("{HN_ITEM_PAGE}{id}")
}

fn domain_from_url(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|url| {
            url.host_str()
                .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
        })
        .unwrap_or_default()
}

fn relative_age<Tz: TimeZone>(now: &DateTime<Tz>, unix_seconds: i64) -> String {
    let Some(posted) = DateTime::from_timestamp(unix_seconds, 0) else {
        return JUST_NOW.to_string();
    };

    let age = now.clone().signed_duration_since(posted);
    if age.num_minutes() < 1 {
        // also covers timestamps in the future
        return JUST_NOW.to_string();
    }

    if age.num_hours() < 1 {
        short(age.num_minutes(), "m")
    } else if age.num_days() < 1 {
        short(age.num_hours(), "h")
    } else {
        short(age.num_days(), "d")
    }
}

fn short(n: i64, suffix: &str) -> String {
    format!("{}{suffix}", n.max(1))
}

pub struct HackerNewsWidget {
    client: HackerNewsClient,
    fetcher: BoundedFetcher,
    count: usize,
}

impl HackerNewsWidget {
    #[must_use]
    pub const fn new(
        client: HackerNewsClient,
        fetcher: BoundedFetcher,
        count: usize,
    ) -> Self {
        Self {
            client,
            fetcher,
            count,
        }
    }
}

impl Widget for HackerNewsWidget {
    type ViewModel = HackerNewsView;

    async fn fetch(
        &self,
        ctx: &WidgetRequestContext,
    ) -> Result<HackerNewsView, FetchError> {
        let cancel = ctx.cancellation();

        let mut ids = self
            .client
            .top_stories(cancel)
            .await
            .map_err(FetchError::upstream)?;
        ids.truncate(self.count);

        let client = self.client.clone();
        let items = self
            .fetcher
            .fetch_all(ids, cancel, move |id, cancel| {
                let client = client.clone();
                async move {
                    client.item(id, &cancel).await.map_err(FetchError::upstream)
                }
            })
            .await?;

        tracing::debug!(stories = items.len(), "fetched top stories");

        Ok(build_view_model(&Local::now(), &items))
    }

    fn render(&self, view: &HackerNewsView) -> Result<Markup, RenderError> {
        let mut html = String::from(r#"<div class="widget hn"><ol>"#);

        for entry in &view.entries {
            let age = if entry.age == JUST_NOW {
                entry.age.clone()
            } else {
                format!("{} ago", entry.age)
            };
            write!(
                html,
                r#"<li value="{rank}"><a href="{url}" target="_blank" rel="noopener noreferrer">{title}</a>"#,
                rank = entry.rank,
                url = escape(&entry.url),
                title = escape(&entry.title),
            )?;
            if !entry.domain.is_empty() {
                write!(html, r#" <span class="domain">({})</span>"#, escape(&entry.domain))?;
            }
            write!(
                html,
                r#"<div class="meta">{score} points by {by} {age} | <a href="{discussion}" target="_blank" rel="noopener noreferrer">{comments} comments</a></div></li>"#,
                score = entry.score,
                by = escape(&entry.by),
                age = escape(&age),
                discussion = escape(&entry.discussion_url),
                comments = entry.comments,
            )?;
        }

        write!(
            html,
            r#"</ol><p class="meta">updated {}{}</p></div>"#,
            escape(&view.updated_at),
            stale_note(view.is_stale, view.stale_by.as_deref()),
        )?;

        Ok(Markup::new(html))
    }

    fn render_error(&self, _err: &FetchError) -> Markup {
        widget_error("Hacker News", "/widgets/hn")
    }

    fn mark_stale(
        &self,
        mut view: HackerNewsView,
        stale_by: Duration,
    ) -> HackerNewsView {
        view.is_stale = true;
        view.stale_by = Some(format_stale_by(stale_by));
        view
    }
}
