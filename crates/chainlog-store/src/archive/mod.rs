//! Archive writing: the chained cache, naming and the grouping-aware driver.

pub mod cache;
pub mod naming;
pub mod sink;
pub mod writer;

pub use cache::{CacheState, LogArchiveCache, LINKING_INFO_ENTRY};
pub use writer::{commit_archive, LogArchiveWriter};
