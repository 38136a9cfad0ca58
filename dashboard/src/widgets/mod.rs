pub mod hacker_news;
pub mod weather;

use dash_app::Config;
use dash_http::JsonClient;
use widgetkit::markup::escape;
use widgetkit::{BoundedFetcher, RegistryError, WidgetHandler, WidgetRegistry, WidgetSpec};

use hacker_news::{HackerNewsClient, HackerNewsWidget};
use weather::{WeatherClient, WeatherOptions, WeatherWidget};

/// Register every dashboard widget, in display order.
///
/// # Errors
///
/// Fails if a widget spec is rejected by the registry.
pub fn build_registry(
    config: &Config,
    http: &JsonClient,
) -> Result<WidgetRegistry, RegistryError> {
    let mut registry = WidgetRegistry::new();

    let weather = WidgetHandler::new(
        "weather",
        WeatherWidget::new(
            WeatherClient::new(http.clone()),
            WeatherOptions::from(config),
        ),
    )
    .with_ttl(config.widget_ttl())
    .with_fetch_timeout(config.fetch_timeout());
    registry.add(WidgetSpec::new("weather", "Weather", weather.into_route()))?;

    let hacker_news = WidgetHandler::new(
        "hn",
        HackerNewsWidget::new(
            HackerNewsClient::new(http.clone()),
            BoundedFetcher::new(config.fetch_concurrency),
            config.hn_count(),
        ),
    )
    .with_ttl(config.widget_ttl())
    .with_fetch_timeout(config.fetch_timeout());
    registry.add(
        WidgetSpec::new("hn", "Hacker News", hacker_news.into_route())
            .with_class("wide"),
    )?;

    Ok(registry)
}

/// Trailing note for widgets served past their TTL.
fn stale_note(is_stale: bool, stale_by: Option<&str>) -> String {
    match (is_stale, stale_by) {
        (false, _) => String::new(),
        (true, Some(by)) => {
            format!(r#" <span class="stale">(stale {})</span>"#, escape(by))
        }
        (true, None) => r#" <span class="stale">(stale)</span>"#.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let http = JsonClient::new("dashboard-test/0.1").unwrap();
        let registry = build_registry(&Config::default(), &http).unwrap();

        let keys: Vec<&str> =
            registry.list().iter().map(|spec| spec.key.as_str()).collect();
        assert_eq!(keys, ["weather", "hn"]);
        assert_eq!(registry.list()[1].title, "Hacker News");
    }

    #[test]
    fn test_stale_note() {
        assert_eq!(stale_note(false, Some("1m5s")), "");
        assert_eq!(
            stale_note(true, Some("1m5s")),
            r#" <span class="stale">(stale 1m5s)</span>"#
        );
        assert_eq!(stale_note(true, None), r#" <span class="stale">(stale)</span>"#);
    }
}
