pub mod aggregator;
pub mod content_sync;
pub mod context;
pub mod correlation;
pub mod dataset_loader;
pub mod heatmap;
pub mod joiner;
pub mod playback;
pub mod posts;
pub mod success_factors;

pub use aggregator::*;
pub use context::AppContext;
pub use heatmap::heatmap_panels;
pub use joiner::join_classifications;
pub use success_factors::success_factors;
