mod config;
mod error;
mod models;
mod store;

pub use config::FileConfig;
pub use error::FileDaoError;
pub use store::FileSessionStore;

use crate::dao::storage::StorageError;

impl From<FileDaoError> for StorageError {
    fn from(err: FileDaoError) -> Self {
        let message = err.to_string();
        match err {
            FileDaoError::Parse { .. } => StorageError::corrupted(message, err),
            _ => StorageError::unavailable(message, err),
        }
    }
}
