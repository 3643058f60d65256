//! Domain logic kept free of transport concerns.
//!
//! - [`normalize`]: backend plans and tasks into timeline events
//! - [`timeline`]: week windows and aggregation into day buckets and statistics

pub mod normalize;
pub mod timeline;

pub use normalize::{NormalizeOptions, Normalized, normalize_lists, normalize_pet};
pub use timeline::{TimelineQuery, WeekWindow, aggregate};
