//! Core types: events, formatting, tracing

pub mod event;
pub mod format;
pub mod tracing;

pub use event::{BusinessEvent, BusinessKind, ConnectionStatus};
pub use format::{
    EventFormatter, FormatOptions, FormattedEvent, OutputFormat, ellipsis, guard_tier_name,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
