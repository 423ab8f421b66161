pub mod backend;
pub mod error;
mod models;

pub use crate::backend::ObjectStore;
pub use crate::models::{Cursor, ListPage, ObjectMetadata, ObjectRecord, PreservedHeaders};
use std::sync::Arc;

pub type StoreHandle = Arc<dyn ObjectStore + Send + Sync>;
