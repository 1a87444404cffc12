// # File State Store
//
// File-based IP cache.
//
// ## Layout
//
// One file per (record name, record type) pair inside a cache directory,
// holding the bare IP followed by a newline:
//
// ```text
// ~/.cloudflare-ddns/cache/
//   home.example.com_A.ip      "203.0.113.7\n"
//   home.example.com_AAAA.ip   "2001:db8::7\n"
// ```
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename, so a reader never sees half a value
// - Garbage detection: a file that doesn't parse as an IP of the right
//   family is treated as absent, which forces an update on the next run

use async_trait::async_trait;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::Error;
use crate::atomic;
use crate::config::RecordType;
use crate::traits::state_store::StateStore;

/// Cache files are private to the operator
const CACHE_FILE_MODE: u32 = 0o600;

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use cfddns_core::state::FileStateStore;
/// use cfddns_core::traits::StateStore;
/// use cfddns_core::RecordType;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/cache/cfddns");
///
///     store.set_last_ip("example.com", RecordType::A, "1.2.3.4".parse()?).await?;
///
///     let ip = store.get_last_ip("example.com", RecordType::A).await?;
///     assert_eq!(ip, Some("1.2.3.4".parse()?));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created lazily on the first write.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the cache files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for a pair
    pub fn path_for(&self, record_name: &str, record_type: RecordType) -> PathBuf {
        let name: String = record_name
            .to_ascii_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}_{}.ip", name, record_type))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_last_ip(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Option<IpAddr>, Error> {
        let path = self.path_for(record_name, record_type);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cached IP for {} ({})", record_name, record_type);
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::state_store(format!(
                    "Failed to read cache file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let value = content.trim();
        match value.parse::<IpAddr>() {
            Ok(ip) if record_type.matches(&ip) => Ok(Some(ip)),
            Ok(ip) => {
                tracing::warn!(
                    "Cache file {} holds {} which is not a {} address, ignoring it",
                    path.display(),
                    ip,
                    record_type
                );
                Ok(None)
            }
            Err(_) => {
                tracing::warn!(
                    "Cache file {} is corrupted ({:?}), ignoring it",
                    path.display(),
                    value
                );
                Ok(None)
            }
        }
    }

    async fn set_last_ip(
        &self,
        record_name: &str,
        record_type: RecordType,
        ip: IpAddr,
    ) -> Result<(), Error> {
        atomic::ensure_dir(&self.dir).await?;

        let path = self.path_for(record_name, record_type);
        atomic::write_atomic(&path, format!("{}\n", ip).as_bytes(), CACHE_FILE_MODE).await?;

        tracing::debug!("Cached {} for {} ({})", ip, record_name, record_type);
        Ok(())
    }
}
