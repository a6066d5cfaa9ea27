pub mod movie;
pub mod usage;

pub use movie::{Movie, MovieSnapshot};
pub use usage::{UsageRecord, normalize_query};
