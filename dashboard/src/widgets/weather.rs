//! Current conditions and the next few hours from Open-Meteo.

use chrono::{DateTime, NaiveDateTime};
use dash_app::Config;
use dash_http::{HttpError, JsonClient};
use std::fmt::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use types::OpenMeteoForecast;
use widgetkit::markup::{escape, format_stale_by, widget_error};
use widgetkit::{FetchError, Markup, RenderError, Widget, WidgetRequestContext};

use super::stale_note;

pub const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

const MAX_NEXT_HOURS: usize = 6;

#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: JsonClient,
    base_url: String,
}

impl WeatherClient {
    #[must_use]
    pub fn new(http: JsonClient) -> Self {
        Self {
            http,
            base_url: OPEN_METEO_URL.to_string(),
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn forecast_url(&self, lat: f64, lon: f64, hours: u32) -> String {
        format!(
            "{}?latitude={lat:.4}&longitude={lon:.4}&hourly=temperature_2m&current=temperature_2m,apparent_temperature,wind_speed_10m&timezone=auto&forecast_hours={hours}&temperature_unit=fahrenheit",
            self.base_url
        )
    }

    /// # Errors
    ///
    /// Propagates the [`HttpError`] of the final attempt.
    pub async fn current_and_hourly(
        &self,
        lat: f64,
        lon: f64,
        hours: u32,
        cancel: &CancellationToken,
    ) -> Result<OpenMeteoForecast, HttpError> {
        self.http
            .get_json(&self.forecast_url(lat, lon, hours), cancel)
            .await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherOptions {
    pub lat: f64,
    pub lon: f64,
    pub hours: u32,
    pub location: String,
}

impl From<&Config> for WeatherOptions {
    fn from(config: &Config) -> Self {
        Self {
            lat: config.weather_lat,
            lon: config.weather_lon,
            hours: config.weather_hours,
            location: config.weather_location.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourForecast {
    /// `HH:MM` when the timestamp parses, the raw timestamp otherwise.
    pub label: String,
    pub temp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub location: String,
    pub updated_at: String,
    pub current_temp: f64,
    pub feels_like: f64,
    /// km/h
    pub wind_speed: f64,
    pub next_hours: Vec<HourForecast>,

    pub is_stale: bool,
    pub stale_by: Option<String>,
}

#[must_use]
pub fn to_view_model(forecast: &OpenMeteoForecast, location: &str) -> WeatherView {
    let next_hours = forecast
        .hourly
        .time
        .iter()
        .zip(&forecast.hourly.temperature_2m)
        .filter_map(|(time, temp)| {
            temp.map(|temp| HourForecast {
                label: hour_label(time),
                temp,
            })
        })
        .take(MAX_NEXT_HOURS)
        .collect();

    WeatherView {
        location: location.to_string(),
        updated_at: hour_label(&forecast.current.time),
        current_temp: forecast.current.temperature_2m,
        feels_like: forecast.current.apparent_temperature,
        wind_speed: forecast.current.wind_speed_10m,
        next_hours,
        is_stale: false,
        stale_by: None,
    }
}

fn hour_label(raw: &str) -> String {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return time.format("%H:%M").to_string();
    }
    // Open-Meteo reports local times without an offset
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").map_or_else(
        |_| raw.to_string(),
        |time| time.format("%H:%M").to_string(),
    )
}

pub struct WeatherWidget {
    client: WeatherClient,
    options: WeatherOptions,
}

impl WeatherWidget {
    #[must_use]
    pub const fn new(client: WeatherClient, options: WeatherOptions) -> Self {
        Self { client, options }
    }
}

impl Widget for WeatherWidget {
    type ViewModel = WeatherView;

    async fn fetch(
        &self,
        ctx: &WidgetRequestContext,
    ) -> Result<WeatherView, FetchError> {
        let options = &self.options;

        let forecast = self
            .client
            .current_and_hourly(
                options.lat,
                options.lon,
                options.hours,
                ctx.cancellation(),
            )
            .await
            .map_err(FetchError::upstream)?;

        Ok(to_view_model(&forecast, &options.location))
    }

    fn render(&self, view: &WeatherView) -> Result<Markup, RenderError> {
        let mut html = String::from(r#"<div class="widget weather">"#);

        write!(
            html,
            r#"<div class="weather-now"><span class="temp">{:.0}&deg;F</span> <span>feels like {:.0}&deg;F</span> <span>wind {:.0} km/h</span></div>"#,
            view.current_temp, view.feels_like, view.wind_speed
        )?;

        if !view.next_hours.is_empty() {
            html.push_str(r#"<ul class="weather-hours">"#);
            for hour in &view.next_hours {
                write!(
                    html,
                    "<li><span>{}</span> <span>{:.0}&deg;</span></li>",
                    escape(&hour.label),
                    hour.temp
                )?;
            }
            html.push_str("</ul>");
        }

        write!(
            html,
            r#"<p class="meta">{} &middot; updated {}{}</p></div>"#,
            escape(&view.location),
            escape(&view.updated_at),
            stale_note(view.is_stale, view.stale_by.as_deref()),
        )?;

        Ok(Markup::new(html))
    }

    fn render_error(&self, _err: &FetchError) -> Markup {
        widget_error("Weather", "/widgets/weather")
    }

    fn mark_stale(&self, mut view: WeatherView, stale_by: Duration) -> WeatherView {
        view.is_stale = true;
        view.stale_by = Some(format_stale_by(stale_by));
        view
    }
}
