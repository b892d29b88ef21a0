//! Domain module - lecture records and the title-driven age range rules
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod age_limit;
pub mod lecture;

pub use age_limit::{AgeLimitRange, AgeLimitType, AgeRangeError, AgeRangeExtractor};
pub use lecture::{DAY_OF_WEEK_SUFFIX, Lecture, ReceptionStatus, WEEKDAYS};
