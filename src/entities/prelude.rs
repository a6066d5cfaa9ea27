pub use super::search_metrics::Entity as SearchMetrics;
