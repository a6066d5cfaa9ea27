mod search;
mod trending;

pub use search::cmd_search;
pub use trending::cmd_trending;
