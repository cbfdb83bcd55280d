pub mod builder;
pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod scheduler;
pub mod search;
pub mod shared;
pub mod tokenizer;

pub use error::{Error, Result};
pub use index::{InvertedIndex, Position, SearchResult};
pub use scheduler::{SchedulerHandle, TaskScheduler};
pub use search::{Query, SearchBuilder};
pub use shared::SharedIndex;
pub use tokenizer::{Normalizer, SnowballNormalizer};
