// ticketgate/src/store/file_store.rs
//! Durable ticket store backed by a single encrypted file.
//!
//! The whole ticket namespace is held in memory and written out after every
//! mutation. Writes go to a temporary file under an exclusive `fs2` lock and are
//! then renamed over the real file. The file is AES-256-GCM encrypted with a
//! 32-byte key kept next to it, because ticket snapshots carry action previews.
//!
//! One store instance owns a ticket file at a time: `open` takes an exclusive
//! lock on a `.lock` sidecar and holds it until the store is dropped.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

use ticketgate_core::tickets::{claim_in_map, sweep_map};
use ticketgate_core::{GatewayError, TicketRecord, TicketStore};

const FORMAT_VERSION: u32 = 1;
const BLOB_HEADER: &str = "v1";
const KEY_LEN: usize = 32;
const AES_NONCE_LEN: usize = 12;
const KEY_FILE_SUFFIX: &str = "key";
const LOCK_SUFFIX: &str = "lock";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Ticket file {} is already in use by another ticketgate process", path.display())]
    Locked { path: PathBuf },

    #[error("Ticket key error: {0}")]
    Key(String),

    #[error("Ticket file is corrupt or was encrypted with a different key: {0}")]
    Crypto(String),

    #[error("Ticket file has an invalid layout: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Ticket file version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("Secure random source unavailable: {0}")]
    Random(String),

    #[error("Background write task failed: {0}")]
    Task(String),
}

impl From<FileStoreError> for GatewayError {
    fn from(err: FileStoreError) -> Self {
        GatewayError::StorageUnavailable(err.to_string())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> FileStoreError + '_ {
    move |source| FileStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// On-disk layout before encryption: one namespace keyed by token.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedTickets {
    version: u32,
    tickets: HashMap<String, TicketRecord>,
}

#[derive(Debug)]
pub struct FileTicketStore {
    path: PathBuf,
    key: [u8; KEY_LEN],
    tickets: Mutex<HashMap<String, TicketRecord>>,
    // Held for the lifetime of the store; closing it releases the lock.
    _owner: File,
}

impl FileTicketStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// Records that are already expired or past their replay window are dropped.
    /// A file that cannot be decrypted is an error, not an empty store, and a
    /// file already owned by another store is [`FileStoreError::Locked`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let owner = acquire_owner_lock(&path)?;
        let key = load_or_create_key(&key_path(&path))?;

        let mut tickets = match read_locked(&path)? {
            Some(raw) if !raw.is_empty() => decrypt_tickets(&raw, &key)?,
            _ => HashMap::new(),
        };
        let dropped = sweep_map(&mut tickets, Utc::now());
        info!(
            "Opened ticket file {} with {} live tickets ({} stale dropped).",
            path.display(),
            tickets.len(),
            dropped
        );

        Ok(Self {
            path,
            key,
            tickets: Mutex::new(tickets),
            _owner: owner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypts and writes `tickets`. The caller keeps holding the map lock, so
    /// writes land in the same order as the mutations they reflect.
    async fn persist(&self, tickets: &HashMap<String, TicketRecord>) -> Result<(), FileStoreError> {
        let blob = encrypt_tickets(tickets, &self.key)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &blob))
            .await
            .map_err(|e| FileStoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl TicketStore for FileTicketStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn is_durable(&self) -> bool {
        true
    }

    async fn insert(&self, token: &str, record: TicketRecord) -> Result<(), GatewayError> {
        let mut tickets = self.tickets.lock().await;
        if tickets.contains_key(token) {
            return Err(GatewayError::DuplicateToken);
        }
        tickets.insert(token.to_string(), record);
        if let Err(e) = self.persist(&tickets).await {
            // The ticket was never durably issued, so it must not be redeemable either.
            tickets.remove(token);
            error!("Failed to persist new ticket: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    async fn consume(
        &self,
        token: &str,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<TicketRecord, GatewayError> {
        let mut tickets = self.tickets.lock().await;
        let before = tickets.len();
        let outcome = claim_in_map(&mut tickets, token, now, retention);
        let changed = outcome.is_ok() || tickets.len() != before;
        if changed {
            if let Err(e) = self.persist(&tickets).await {
                // The claim stays in memory: the ticket remains used even though the
                // caller is told storage failed.
                error!("Failed to persist consumed ticket: {}", e);
                return Err(e.into());
            }
        }
        outcome
    }

    async fn get(&self, token: &str) -> Result<Option<TicketRecord>, GatewayError> {
        Ok(self.tickets.lock().await.get(token).cloned())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, GatewayError> {
        let mut tickets = self.tickets.lock().await;
        let removed = sweep_map(&mut tickets, now);
        if removed > 0 {
            self.persist(&tickets).await?;
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, GatewayError> {
        Ok(self.tickets.lock().await.len())
    }
}

fn key_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(KEY_FILE_SUFFIX);
    path.with_file_name(name)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(LOCK_SUFFIX);
    path.with_file_name(name)
}

fn acquire_owner_lock(path: &Path) -> Result<File, FileStoreError> {
    let lock_file = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_file)
        .map_err(io_err(&lock_file))?;
    match fs2::FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
            debug!("Acquired ownership lock {}.", lock_file.display());
            Ok(file)
        }
        Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => {
            Err(FileStoreError::Locked { path: path.to_path_buf() })
        }
        Err(e) => Err(FileStoreError::Io { path: lock_file, source: e }),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

fn fill_random(buf: &mut [u8]) -> Result<(), FileStoreError> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| FileStoreError::Random(e.to_string()))
}

fn load_or_create_key(key_file: &Path) -> Result<[u8; KEY_LEN], FileStoreError> {
    if key_file.exists() {
        let encoded = fs::read_to_string(key_file).map_err(io_err(key_file))?;
        let decoded = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| FileStoreError::Key(format!("{} is not valid base64: {}", key_file.display(), e)))?;
        return <[u8; KEY_LEN]>::try_from(decoded.as_slice()).map_err(|_| {
            FileStoreError::Key(format!("{} does not hold a {}-byte key", key_file.display(), KEY_LEN))
        });
    }

    let mut key = [0u8; KEY_LEN];
    fill_random(&mut key)?;
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(key_file).map_err(io_err(key_file))?;
    file.write_all(general_purpose::STANDARD.encode(key).as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(io_err(key_file))?;
    debug!("Created ticket key at {}.", key_file.display());
    Ok(key)
}

fn read_locked(path: &Path) -> Result<Option<Vec<u8>>, FileStoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = OpenOptions::new().read(true).open(path).map_err(io_err(path))?;
    fs2::FileExt::lock_shared(&file).map_err(io_err(path))?;
    let mut raw = Vec::new();
    let read = file.read_to_end(&mut raw).map_err(io_err(path));
    if let Err(e) = fs2::FileExt::unlock(&file) {
        warn!("Failed to unlock {}: {}", path.display(), e);
    }
    read?;
    Ok(Some(raw))
}

fn write_atomically(path: &Path, blob: &[u8]) -> Result<(), FileStoreError> {
    let tmp = tmp_path(path);
    {
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp).map_err(io_err(&tmp))?;
        fs2::FileExt::lock_exclusive(&file).map_err(io_err(&tmp))?;
        let written = file
            .write_all(blob)
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_all())
            .map_err(io_err(&tmp));
        if let Err(e) = fs2::FileExt::unlock(&file) {
            warn!("Failed to unlock {}: {}", tmp.display(), e);
        }
        written?;
    }
    fs::rename(&tmp, path).map_err(io_err(path))
}

fn encrypt_tickets(tickets: &HashMap<String, TicketRecord>, key: &[u8; KEY_LEN]) -> Result<Vec<u8>, FileStoreError> {
    let persisted = PersistedTickets {
        version: FORMAT_VERSION,
        tickets: tickets.clone(),
    };
    let plaintext = serde_json::to_vec(&persisted)?;
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| FileStoreError::Key(e.to_string()))?;

    let mut nonce_bytes = [0u8; AES_NONCE_LEN];
    fill_random(&mut nonce_bytes)?;
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|e| FileStoreError::Crypto(format!("encryption failed: {e:?}")))?;

    Ok(format!(
        "{}.{}.{}",
        BLOB_HEADER,
        general_purpose::STANDARD.encode(nonce_bytes),
        general_purpose::STANDARD.encode(ciphertext)
    )
    .into_bytes())
}

fn decrypt_tickets(blob: &[u8], key: &[u8; KEY_LEN]) -> Result<HashMap<String, TicketRecord>, FileStoreError> {
    let text = std::str::from_utf8(blob).map_err(|e| FileStoreError::Crypto(e.to_string()))?;
    let parts: Vec<&str> = text.trim().splitn(3, '.').collect();
    let [header, nonce_b64, ct_b64] = parts.as_slice() else {
        return Err(FileStoreError::Crypto("unexpected layout".to_string()));
    };
    if *header != BLOB_HEADER {
        return Err(FileStoreError::Crypto("version header missing".to_string()));
    }
    let nonce_bytes = general_purpose::STANDARD
        .decode(nonce_b64)
        .map_err(|e| FileStoreError::Crypto(e.to_string()))?;
    if nonce_bytes.len() != AES_NONCE_LEN {
        return Err(FileStoreError::Crypto("bad nonce length".to_string()));
    }
    let ciphertext = general_purpose::STANDARD
        .decode(ct_b64)
        .map_err(|e| FileStoreError::Crypto(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| FileStoreError::Key(e.to_string()))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|e| FileStoreError::Crypto(format!("decryption failed: {e:?}")))?;

    let persisted: PersistedTickets = serde_json::from_slice(&plaintext)?;
    if persisted.version != FORMAT_VERSION {
        return Err(FileStoreError::UnsupportedVersion(persisted.version));
    }
    Ok(persisted.tickets)
}
