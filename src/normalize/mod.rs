pub mod cache;
pub mod config;
pub mod filter;
pub mod merge;

pub use cache::SeenCache;
pub use config::NormalizeConfig;
pub use filter::filter_new_questions;
pub use merge::{merge_fragments, normalize_fragment_text, MergedMessage};
