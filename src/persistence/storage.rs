// Save storage
//
// Layout under the storage root, one directory per game:
//
//   <root>/<game_id>/save-<slot>.sav
//   <root>/<game_id>/thumbnail.png
//   <root>/<game_id>/metadata.json
//
// `BackgroundStorage` runs writes on a worker thread so the frame loop
// never waits on disk.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

const METADATA_FILE: &str = "metadata.json";
const THUMBNAIL_FILE: &str = "thumbnail.png";

/// Errors that can occur during storage operations
#[derive(Debug)]
pub enum StorageError {
    /// I/O error
    Io(io::Error),
    /// Metadata (de)serialization error
    Serialization(serde_json::Error),
    /// The storage worker has stopped
    Closed,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StorageError::Closed => write!(f, "Storage worker has stopped"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e)
    }
}

/// Persistent save storage, keyed by game
pub trait SaveStorage: Send {
    /// Save bytes of the game's active slot, if any
    fn read_save(&mut self, game_id: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store save bytes in a slot
    fn write_save(&mut self, game_id: &str, slot: u32, bytes: &[u8]) -> Result<(), StorageError>;

    /// Store the game's thumbnail image
    fn write_thumbnail(&mut self, game_id: &str, image: &[u8]) -> Result<(), StorageError>;
}

/// One known save slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub index: u32,
    pub size: usize,
    /// RFC 3339 timestamp of the last write
    pub updated_at: String,
}

/// Per-game record kept next to the save files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub game_id: String,
    pub active_slot: Option<u32>,
    pub slots: Vec<SlotInfo>,
    pub has_thumbnail: bool,
    pub updated_at: Option<String>,
}

/// Directory-per-game file storage
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a game's files
    pub fn game_dir(&self, game_id: &str) -> PathBuf {
        self.root.join(sanitize_game_id(game_id))
    }

    fn slot_path(&self, game_id: &str, slot: u32) -> PathBuf {
        self.game_dir(game_id).join(format!("save-{}.sav", slot))
    }

    /// Load a game's metadata, or an empty record if it has none
    pub fn metadata(&self, game_id: &str) -> Result<GameMetadata, StorageError> {
        let path = self.game_dir(game_id).join(METADATA_FILE);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(GameMetadata {
                game_id: game_id.to_string(),
                ..Default::default()
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn store_metadata(&self, metadata: &GameMetadata) -> Result<(), StorageError> {
        let dir = self.game_dir(&metadata.game_id);
        fs::create_dir_all(&dir)?;
        let contents = serde_json::to_string_pretty(metadata)?;
        fs::write(dir.join(METADATA_FILE), contents)?;
        Ok(())
    }

    /// Read a specific slot
    pub fn read_slot(&self, game_id: &str, slot: u32) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.slot_path(game_id, slot)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Make `slot` the slot `read_save` returns
    pub fn set_active_slot(&self, game_id: &str, slot: u32) -> Result<(), StorageError> {
        let mut metadata = self.metadata(game_id)?;
        metadata.active_slot = Some(slot);
        self.store_metadata(&metadata)
    }

    /// Pick the slot a session loads from and saves to
    ///
    /// An explicit `requested` slot becomes the active one. Otherwise the
    /// stored active slot wins, then `fallback`.
    pub fn select_slot(
        &self,
        game_id: &str,
        requested: Option<u32>,
        fallback: Option<u32>,
    ) -> Result<Option<u32>, StorageError> {
        if let Some(slot) = requested {
            self.set_active_slot(game_id, slot)?;
            return Ok(Some(slot));
        }
        Ok(self.metadata(game_id)?.active_slot.or(fallback))
    }
}

impl SaveStorage for FileStorage {
    fn read_save(&mut self, game_id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.metadata(game_id)?.active_slot {
            Some(slot) => self.read_slot(game_id, slot),
            None => Ok(None),
        }
    }

    fn write_save(&mut self, game_id: &str, slot: u32, bytes: &[u8]) -> Result<(), StorageError> {
        fs::create_dir_all(self.game_dir(game_id))?;

        // write-then-rename so a crash never leaves a torn save
        let path = self.slot_path(game_id, slot);
        let tmp = path.with_extension("sav.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        let now = chrono::Local::now().to_rfc3339();
        let mut metadata = self.metadata(game_id)?;
        metadata.slots.retain(|s| s.index != slot);
        metadata.slots.push(SlotInfo {
            index: slot,
            size: bytes.len(),
            updated_at: now.clone(),
        });
        metadata.slots.sort_by_key(|s| s.index);
        if metadata.active_slot.is_none() {
            metadata.active_slot = Some(slot);
        }
        metadata.updated_at = Some(now);
        self.store_metadata(&metadata)
    }

    fn write_thumbnail(&mut self, game_id: &str, image: &[u8]) -> Result<(), StorageError> {
        let dir = self.game_dir(game_id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(THUMBNAIL_FILE), image)?;

        let mut metadata = self.metadata(game_id)?;
        metadata.has_thumbnail = true;
        metadata.updated_at = Some(chrono::Local::now().to_rfc3339());
        self.store_metadata(&metadata)
    }
}

/// Map a game id to a directory name
///
/// Bytes outside `[A-Za-z0-9_-]` are percent-encoded, so distinct ids never
/// share a directory and none can escape the storage root.
fn sanitize_game_id(game_id: &str) -> String {
    if game_id.is_empty() {
        return "%".to_string();
    }
    let mut encoded = String::with_capacity(game_id.len());
    for byte in game_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

/// Write queued for the storage worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRequest {
    Save {
        game_id: String,
        slot: u32,
        bytes: Vec<u8>,
    },
    Thumbnail {
        game_id: String,
        image: Vec<u8>,
    },
}

impl StorageRequest {
    fn describe(&self) -> String {
        match self {
            StorageRequest::Save { game_id, slot, bytes } => {
                format!("save of {} bytes to {} slot {}", bytes.len(), game_id, slot)
            }
            StorageRequest::Thumbnail { game_id, .. } => format!("thumbnail for {}", game_id),
        }
    }
}

/// Outcome of one background write
#[derive(Debug)]
pub struct StorageReport {
    /// What was written
    pub description: String,
    pub result: Result<(), StorageError>,
}

/// Fire-and-forget sink for persistence writes
pub trait StorageSink {
    fn submit(&mut self, request: StorageRequest);

    /// Results of writes that finished since the last call
    fn drain_reports(&mut self) -> Vec<StorageReport> {
        Vec::new()
    }
}

/// Sink that discards every request
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardStorage;

impl StorageSink for DiscardStorage {
    fn submit(&mut self, _request: StorageRequest) {}
}

/// Runs a `SaveStorage` on a worker thread
///
/// Requests are executed in submission order. Results come back through
/// `StorageSink::drain_reports`. Dropping the handle lets queued writes finish, then
/// joins the worker.
pub struct BackgroundStorage {
    sender: Option<Sender<StorageRequest>>,
    reports: Receiver<StorageReport>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundStorage {
    pub fn spawn(mut storage: Box<dyn SaveStorage>) -> Self {
        let (sender, requests) = mpsc::channel::<StorageRequest>();
        let (report_tx, reports) = mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("save-storage".to_string())
            .spawn(move || {
                for request in requests {
                    let result = match &request {
                        StorageRequest::Save { game_id, slot, bytes } => {
                            storage.write_save(game_id, *slot, bytes)
                        }
                        StorageRequest::Thumbnail { game_id, image } => {
                            storage.write_thumbnail(game_id, image)
                        }
                    };
                    let report = StorageReport {
                        description: request.describe(),
                        result,
                    };
                    if report_tx.send(report).is_err() {
                        break;
                    }
                }
            });

        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("Failed to start storage worker: {}", e);
                None
            }
        };

        Self {
            sender: worker.as_ref().map(|_| sender),
            reports,
            worker,
        }
    }

    /// Stop accepting writes and wait for queued ones to finish
    pub fn close(&mut self) -> Vec<StorageReport> {
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.reports.try_iter().collect()
    }
}

impl StorageSink for BackgroundStorage {
    fn submit(&mut self, request: StorageRequest) {
        let Some(sender) = &self.sender else {
            eprintln!("Dropped {}: storage worker is not running", request.describe());
            return;
        };
        if let Err(mpsc::SendError(request)) = sender.send(request) {
            eprintln!("Dropped {}: storage worker has stopped", request.describe());
        }
    }

    fn drain_reports(&mut self) -> Vec<StorageReport> {
        self.reports.try_iter().collect()
    }
}

impl Drop for BackgroundStorage {
    fn drop(&mut self) {
        self.close();
    }
}
