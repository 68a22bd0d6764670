use std::path::PathBuf;

/// Directory used when `EXAM_TIMER_BACK_DATA_DIR` is not set.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Runtime configuration for the file-backed session store.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub data_dir: PathBuf,
}

impl FileConfig {
    /// Construct a configuration pointing at an explicit directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Build a configuration from the environment. Unlike the remote store
    /// this never fails; the fallback must always be constructible.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("EXAM_TIMER_BACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        Self { data_dir }
    }
}
