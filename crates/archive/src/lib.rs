pub mod backend;
pub mod error;

pub use crate::backend::ArchiveStore;
use std::sync::Arc;

pub type ArchiveHandle = Arc<dyn ArchiveStore + Send + Sync>;
