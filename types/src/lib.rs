// Wire formats of the third-party APIs the dashboard widgets read from.
//
// Only the fields the widgets use are modelled; everything is optional or
// defaulted because the upstream APIs omit fields freely.

use serde::{Deserialize, Serialize};

/// A Hacker News "item" (story, job, comment, poll...).
///
/// See <https://github.com/HackerNews/API>.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackerNewsItem {
    pub id: i64,

    /// "story", "job", "comment", ...
    #[serde(rename = "type")]
    pub kind: String,

    pub by: String,

    /// Unix time in seconds.
    pub time: i64,

    pub title: String,

    /// Empty for Ask HN and other text posts.
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Points.
    pub score: i64,

    /// Comment count (stories only).
    pub descendants: i64,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kids: Vec<i64>,
}

/// Response of the Open-Meteo `/v1/forecast` endpoint for the current and
/// hourly variables the weather widget requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoForecast {
    pub latitude: f64,

    pub longitude: f64,

    pub timezone: String,

    pub timezone_abbreviation: String,

    pub current: OpenMeteoCurrent,

    pub hourly: OpenMeteoHourly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoCurrent {
    /// Local ISO 8601 time without offset, e.g. `2024-05-01T14:15`.
    pub time: String,

    pub temperature_2m: f64,

    pub apparent_temperature: f64,

    pub wind_speed_10m: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoHourly {
    pub time: Vec<String>,

    /// Parallel to `time`; `null` where the model has no value for that hour.
    pub temperature_2m: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hacker_news_item_tolerates_missing_fields() {
        let item: HackerNewsItem = serde_json::from_str(
            r#"{"id": 8863, "type": "story", "by": "dhouston", "time": 1175714200,
                "title": "My YC app: Dropbox", "score": 111, "descendants": 71}"#,
        )
        .unwrap();

        assert_eq!(item.id, 8863);
        assert_eq!(item.kind, "story");
        assert!(item.url.is_empty());
        assert!(item.kids.is_empty());
        assert_eq!(item.descendants, 71);
    }

    #[test]
    fn test_deleted_item_is_null() {
        let item: Option<HackerNewsItem> = serde_json::from_str("null").unwrap();
        assert!(item.is_none());
    }

    #[test]
    fn test_open_meteo_forecast() {
        let forecast: OpenMeteoForecast = serde_json::from_str(
            r#"{
                "latitude": 38.95, "longitude": -76.48,
                "timezone": "America/New_York", "timezone_abbreviation": "EDT",
                "current": {"time": "2024-05-01T14:15", "temperature_2m": 71.2,
                            "apparent_temperature": 70.0, "wind_speed_10m": 8.4},
                "hourly": {"time": ["2024-05-01T14:00", "2024-05-01T15:00"],
                           "temperature_2m": [71.0, 72.5]}
            }"#,
        )
        .unwrap();

        assert_eq!(forecast.timezone_abbreviation, "EDT");
        assert!((forecast.current.temperature_2m - 71.2).abs() < f64::EPSILON);
        assert_eq!(forecast.hourly.time.len(), 2);
        assert_eq!(forecast.hourly.temperature_2m, vec![Some(71.0), Some(72.5)]);
    }

    #[test]
    fn test_open_meteo_hourly_with_gaps() {
        let hourly: OpenMeteoHourly = serde_json::from_str(
            r#"{"time": ["2024-05-01T14:00", "2024-05-01T15:00", "2024-05-01T16:00"],
                "temperature_2m": [71.0, null, 69.5]}"#,
        )
        .unwrap();

        assert_eq!(hourly.temperature_2m, vec![Some(71.0), None, Some(69.5)]);
    }
}
