use widgetkit::WidgetSpec;
use widgetkit::markup::escape;

pub const DEFAULT_TRIGGER: &str = "load, every 60s";

const HTMX_SRC: &str = "https://unpkg.com/htmx.org@2.0.4";

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;margin:0;padding:1.5rem;background:#f4f4f5;color:#18181b}\
h1{margin:0 0 1rem}\
.grid{display:grid;gap:1rem;grid-template-columns:repeat(auto-fill,minmax(20rem,1fr))}\
.card{background:#fff;border-radius:.5rem;padding:1rem;box-shadow:0 1px 2px rgba(0,0,0,.08)}\
.card h2{margin:0 0 .5rem;font-size:1.1rem}\
.stale{color:#a16207}\
.widget-error{color:#b91c1c}";

/// One card per widget, in registration order. Each card loads its body
/// from the widget endpoint and refreshes it on the widget's trigger.
#[must_use]
pub fn dashboard_page(title: &str, specs: &[WidgetSpec]) -> String {
    let title = escape(title);
    let cards: String = specs.iter().map(card).collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<script src="{HTMX_SRC}"></script>
<style>{STYLE}</style>
</head>
<body>
<h1>{title}</h1>
<main class="grid">
{cards}</main>
</body>
</html>
"#
    )
}

fn card(spec: &WidgetSpec) -> String {
    let class = spec
        .class
        .as_deref()
        .map(|class| format!(" {}", escape(class)))
        .unwrap_or_default();
    let trigger = escape(spec.trigger.as_deref().unwrap_or(DEFAULT_TRIGGER));

    format!(
        r#"<section class="card{class}">
<h2>{title}</h2>
<div class="widget-body" hx-get="{endpoint}" hx-trigger="{trigger}" hx-swap="innerHTML"><p class="loading">Loading...</p></div>
</section>
"#,
        title = escape(&spec.title),
        endpoint = escape(&spec.endpoint()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn spec(key: &str, title: &str) -> WidgetSpec {
        WidgetSpec::new(key, title, get(|| async { "ok" }))
    }

    #[test]
    fn test_cards_in_order_with_default_trigger() {
        let page = dashboard_page(
            "Home",
            &[spec("weather", "Weather"), spec("hn", "Hacker News")],
        );

        let weather = page.find(r#"hx-get="/widgets/weather""#).unwrap();
        let hn = page.find(r#"hx-get="/widgets/hn""#).unwrap();
        assert!(weather < hn);
        assert_eq!(page.matches(r#"hx-trigger="load, every 60s""#).count(), 2);
        assert!(page.contains("<title>Home</title>"));
    }

    #[test]
    fn test_card_trigger_and_class_overrides() {
        let page = dashboard_page(
            "Home",
            &[spec("hn", "<HN>")
                .with_trigger("load, every 5m")
                .with_class("wide")],
        );

        assert!(page.contains(r#"<section class="card wide">"#));
        assert!(page.contains(r#"hx-trigger="load, every 5m""#));
        assert!(page.contains("<h2>&lt;HN&gt;</h2>"));
    }
}
