use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a widget could not produce a fresh view model.
///
/// The handler treats every variant the same way: if there is stale data it
/// is served, otherwise the widget's error fragment is.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),

    #[error("sub-fetch {index} failed: {source}")]
    SubFetch {
        index: usize,
        #[source]
        source: Box<FetchError>,
    },

    #[error("fetch cancelled")]
    Cancelled,

    #[error("fetch timed out")]
    TimedOut,

    #[error("fetch task did not complete: {0}")]
    Task(String),
}

impl FetchError {
    pub fn upstream<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Upstream(err.into())
    }
}

/// A view model could not be turned into markup.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write markup: {0}")]
    Write(#[from] std::fmt::Error),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("widget key {key:?} is invalid (must match {pattern})")]
    InvalidKey { key: String, pattern: &'static str },

    #[error("widget {0:?}: title is required")]
    MissingTitle(String),

    #[error("widget {0:?} already registered")]
    Duplicate(String),
}
