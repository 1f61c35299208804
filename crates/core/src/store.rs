use crate::error::SnapshotError;
use crate::index::FlatL2Index;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const INDEX_FILE_NAME: &str = "passages.index";
pub const PASSAGES_FILE_NAME: &str = "passages.json";
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// passages.index, little endian:
// magic "RAGFLAT1" | dimension: u32 | count: u64 | count * dimension f32
const INDEX_MAGIC: &[u8; 8] = b"RAGFLAT1";
const HEADER_LEN: usize = 8 + 4 + 8;
const LOAD_ATTEMPTS: usize = 3;
const LOAD_RETRY_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: u32,
    pub embedder: String,
    pub dimension: usize,
    pub vector_count: usize,
    pub index_sha256: String,
    pub built_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PassageFileRef<'a> {
    #[serde(flatten)]
    manifest: &'a SnapshotManifest,
    passages: &'a [String],
}

#[derive(Deserialize)]
struct PassageFile {
    #[serde(flatten)]
    manifest: SnapshotManifest,
    passages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub index: FlatL2Index,
    pub passages: Vec<String>,
    pub manifest: SnapshotManifest,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passage(&self, position: usize) -> Option<&str> {
        self.passages.get(position).map(String::as_str)
    }
}

#[derive(Debug)]
pub enum SnapshotState {
    Ready(Snapshot),
    Absent,
    /// One file is missing, or the pair is unreadable or inconsistent.
    Corrupt(String),
}

#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    pub fn passages_path(&self) -> PathBuf {
        self.dir.join(PASSAGES_FILE_NAME)
    }

    /// Writes both files under temporary names, then renames them into place,
    /// passage file last. If any step fails the previous snapshot is left in
    /// place.
    pub fn save(
        &self,
        index: &FlatL2Index,
        passages: &[String],
        embedder_id: &str,
    ) -> Result<SnapshotManifest, SnapshotError> {
        self.save_with(index, passages, embedder_id, |from, to| fs::rename(from, to))
    }

    fn save_with<R>(
        &self,
        index: &FlatL2Index,
        passages: &[String],
        embedder_id: &str,
        rename: R,
    ) -> Result<SnapshotManifest, SnapshotError>
    where
        R: FnMut(&Path, &Path) -> io::Result<()>,
    {
        if index.len() != passages.len() {
            return Err(SnapshotError::Inconsistent {
                vectors: index.len(),
                passages: passages.len(),
            });
        }

        fs::create_dir_all(&self.dir)?;

        let index_bytes = encode_index(index)?;
        let manifest = SnapshotManifest {
            format_version: SNAPSHOT_FORMAT_VERSION,
            embedder: embedder_id.to_string(),
            dimension: index.dimension(),
            vector_count: index.len(),
            index_sha256: sha256_hex(&index_bytes),
            built_at: Utc::now(),
        };
        let passage_bytes = serde_json::to_vec(&PassageFileRef {
            manifest: &manifest,
            passages,
        })?;

        let index_tmp = sibling_path(&self.index_path(), "tmp");
        let passages_tmp = sibling_path(&self.passages_path(), "tmp");

        let committed = write_synced(&index_tmp, &index_bytes)
            .and_then(|_| write_synced(&passages_tmp, &passage_bytes))
            .and_then(|_| self.commit(&index_tmp, &passages_tmp, rename));

        if let Err(error) = committed {
            for leftover in [&index_tmp, &passages_tmp] {
                if leftover.is_file() {
                    let _ = fs::remove_file(leftover);
                }
            }
            return Err(error.into());
        }

        info!(
            dir = %self.dir.display(),
            vectors = manifest.vector_count,
            dimension = manifest.dimension,
            embedder = %manifest.embedder,
            "snapshot saved"
        );
        Ok(manifest)
    }

    /// Renames the staged pair into place. The live index is hard-linked to a
    /// backup first so it can be put back if the passage rename fails.
    fn commit<R>(&self, index_tmp: &Path, passages_tmp: &Path, mut rename: R) -> io::Result<()>
    where
        R: FnMut(&Path, &Path) -> io::Result<()>,
    {
        let index_path = self.index_path();
        let backup = sibling_path(&index_path, "bak");
        let had_index = index_path.is_file();

        if had_index {
            if backup.is_file() {
                fs::remove_file(&backup)?;
            }
            fs::hard_link(&index_path, &backup)
                .or_else(|_| fs::copy(&index_path, &backup).map(|_| ()))?;
        }

        rename(index_tmp, &index_path)?;

        if let Err(error) = rename(passages_tmp, &self.passages_path()) {
            let restored = if had_index {
                fs::rename(&backup, &index_path)
            } else {
                fs::remove_file(&index_path)
            };
            if let Err(restore_error) = restored {
                warn!(
                    path = %index_path.display(),
                    error = %restore_error,
                    "could not restore previous index"
                );
            }
            return Err(error);
        }

        if had_index {
            let _ = fs::remove_file(&backup);
        }
        Ok(())
    }

    /// Reads both files. Never fails: problems are reported as `Absent` or `Corrupt`.
    pub fn load(&self) -> SnapshotState {
        let mut attempt = 1;
        loop {
            match self.read_pair() {
                Ok(state) => return state,
                Err(SnapshotError::ChecksumMismatch) if attempt < LOAD_ATTEMPTS => {
                    debug!(attempt, "snapshot checksum mismatch, retrying");
                    attempt += 1;
                    std::thread::sleep(LOAD_RETRY_DELAY);
                }
                Err(error) => {
                    warn!(dir = %self.dir.display(), error = %error, "snapshot unreadable");
                    return SnapshotState::Corrupt(error.to_string());
                }
            }
        }
    }

    fn read_pair(&self) -> Result<SnapshotState, SnapshotError> {
        let index_path = self.index_path();
        let passages_path = self.passages_path();

        match (index_path.is_file(), passages_path.is_file()) {
            (false, false) => return Ok(SnapshotState::Absent),
            (true, false) => {
                return Ok(SnapshotState::Corrupt(format!(
                    "{} exists without {}",
                    index_path.display(),
                    passages_path.display()
                )))
            }
            (false, true) => {
                return Ok(SnapshotState::Corrupt(format!(
                    "{} exists without {}",
                    passages_path.display(),
                    index_path.display()
                )))
            }
            (true, true) => {}
        }

        let passage_file: PassageFile = serde_json::from_slice(&fs::read(&passages_path)?)?;
        let index_bytes = fs::read(&index_path)?;
        let manifest = passage_file.manifest;

        if manifest.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::Corrupt(format!(
                "unsupported snapshot format version {}",
                manifest.format_version
            )));
        }
        if sha256_hex(&index_bytes) != manifest.index_sha256 {
            return Err(SnapshotError::ChecksumMismatch);
        }

        let index = decode_index(&index_bytes)?;
        if index.dimension() != manifest.dimension || index.len() != manifest.vector_count {
            return Err(SnapshotError::Corrupt(format!(
                "index holds {} vectors of dimension {}, manifest says {} of {}",
                index.len(),
                index.dimension(),
                manifest.vector_count,
                manifest.dimension
            )));
        }
        if passage_file.passages.len() != index.len() {
            return Err(SnapshotError::Inconsistent {
                vectors: index.len(),
                passages: passage_file.passages.len(),
            });
        }

        Ok(SnapshotState::Ready(Snapshot {
            index,
            passages: passage_file.passages,
            manifest,
        }))
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn encode_index(index: &FlatL2Index) -> Result<Vec<u8>, SnapshotError> {
    let dimension = u32::try_from(index.dimension()).map_err(|_| {
        SnapshotError::Corrupt(format!("dimension {} does not fit in u32", index.dimension()))
    })?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + index.as_slice().len() * 4);
    bytes.extend_from_slice(INDEX_MAGIC);
    bytes.extend_from_slice(&dimension.to_le_bytes());
    bytes.extend_from_slice(&(index.len() as u64).to_le_bytes());
    for value in index.as_slice() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    Ok(bytes)
}

pub fn decode_index(bytes: &[u8]) -> Result<FlatL2Index, SnapshotError> {
    let magic: [u8; 8] = read_array(bytes, 0)?;
    if &magic != INDEX_MAGIC {
        return Err(SnapshotError::Corrupt("index file has wrong magic".to_string()));
    }

    let dimension = u32::from_le_bytes(read_array(bytes, 8)?) as usize;
    let count = u64::from_le_bytes(read_array(bytes, 12)?);
    let expected_len = usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(dimension))
        .and_then(|values| values.checked_mul(4))
        .and_then(|body| body.checked_add(HEADER_LEN))
        .ok_or_else(|| SnapshotError::Corrupt("index header overflows".to_string()))?;

    if bytes.len() != expected_len {
        return Err(SnapshotError::Corrupt(format!(
            "index file is {} bytes, header implies {}",
            bytes.len(),
            expected_len
        )));
    }

    let data = bytes[HEADER_LEN..]
        .chunks_exact(4)
        .map(|raw| f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .collect::<Vec<_>>();

    FlatL2Index::from_raw(dimension, data).map_err(|error| SnapshotError::Corrupt(error.to_string()))
}

fn read_array<const N: usize>(bytes: &[u8], at: usize) -> Result<[u8; N], SnapshotError> {
    bytes
        .get(at..at + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| SnapshotError::Corrupt("index file is truncated".to_string()))
}
