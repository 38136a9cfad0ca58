//! Small helpers for producing HTML fragments.

use std::time::Duration;

/// A rendered HTML fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    #[must_use]
    pub const fn new(html: String) -> Self {
        Self(html)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Markup {
    fn from(html: String) -> Self {
        Self(html)
    }
}

/// Escape text for use in element content and double-quoted attributes.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Format a duration rounded to whole seconds, e.g. `1h2m3s`, `5m0s`, `42s`.
#[must_use]
pub fn format_stale_by(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if duration.subsec_millis() >= 500 {
        secs += 1;
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// The fragment shown when a widget has nothing to display.
///
/// Includes a retry button that re-requests the widget endpoint via htmx.
#[must_use]
pub fn widget_error(title: &str, endpoint: &str) -> Markup {
    let title = escape(title);
    let endpoint = escape(endpoint);

    Markup(format!(
        r#"<div class="widget widget-error" role="alert"><p>{title} is unavailable right now.</p><button type="button" hx-get="{endpoint}" hx-target="closest .widget-body" hx-swap="innerHTML">Retry</button></div>"#
    ))
}
