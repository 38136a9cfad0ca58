use axum::routing::MethodRouter;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::RegistryError;

const KEY_PATTERN: &str = r"^[a-z][a-z0-9_-]*$";

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KEY_PATTERN).expect("valid key pattern"));

/// A widget as it appears on the dashboard.
#[derive(Debug, Clone)]
pub struct WidgetSpec {
    /// URL-safe key; the widget is served at `/widgets/{key}`.
    pub key: String,
    pub title: String,
    pub route: MethodRouter,
    /// htmx trigger for the dashboard card, e.g. `load, every 60s`.
    pub trigger: Option<String>,
    /// Extra CSS class for the dashboard card.
    pub class: Option<String>,
}

impl WidgetSpec {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        route: MethodRouter,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            route,
            trigger: None,
            class: None,
        }
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("/widgets/{}", self.key)
    }
}

/// Widgets in registration order. Built once at startup.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    specs: Vec<WidgetSpec>,
    keys: HashSet<String>,
}

impl WidgetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Fails if the key is malformed or taken, or the title is empty.
    pub fn add(&mut self, spec: WidgetSpec) -> Result<(), RegistryError> {
        if !KEY_RE.is_match(&spec.key) {
            return Err(RegistryError::InvalidKey {
                key: spec.key,
                pattern: KEY_PATTERN,
            });
        }
        if spec.title.trim().is_empty() {
            return Err(RegistryError::MissingTitle(spec.key));
        }
        if self.keys.contains(&spec.key) {
            return Err(RegistryError::Duplicate(spec.key));
        }

        self.keys.insert(spec.key.clone());
        self.specs.push(spec);
        Ok(())
    }

    #[must_use]
    pub fn list(&self) -> &[WidgetSpec] {
        &self.specs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
