//! Widget refresh engine: a generic fetch -> cache -> render pipeline with
//! TTL caching, stale-while-error fallback and bounded fan-out.

pub mod cache;
pub mod clock;
pub mod context;
pub mod error;
pub mod fanout;
pub mod handler;
pub mod markup;
pub mod registry;

pub use cache::{CacheLookup, CacheState, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::WidgetRequestContext;
pub use error::{BoxError, FetchError, RegistryError, RenderError};
pub use fanout::BoundedFetcher;
pub use handler::{Outcome, Widget, WidgetHandler, WidgetResponse};
pub use markup::Markup;
pub use registry::{WidgetRegistry, WidgetSpec};
