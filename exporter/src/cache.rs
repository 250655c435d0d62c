use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// On-disk transaction detail cache: one JSON file per txid, no expiry.
/// Entries survive across runs.
pub struct TxCache {
    dir: PathBuf,
}

impl TxCache {
    /// Open the cache directory, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn get(&self, txid: &str) -> Option<Value> {
        fs::read_to_string(self.path(txid))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    pub fn set(&self, txid: &str, value: &Value) -> Result<(), Box<dyn Error>> {
        fs::write(self.path(txid), serde_json::to_string(value)?)?;
        Ok(())
    }

    fn path(&self, txid: &str) -> PathBuf {
        self.dir.join(format!("{txid}.json"))
    }
}
