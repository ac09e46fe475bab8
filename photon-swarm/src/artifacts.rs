//! Checkpoint persistence.
//!
//! The optimizer only hands [`Checkpoint`]s to a [`CheckpointSink`]; this
//! module provides the on-disk sink. A checkpoint directory holds the
//! checkpoint file(s), any extra JSON documents written next to them, and a
//! SHA-256 `manifest.json` covering exactly those files.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use photon_swarm_geometry::Checkpoint;

const MANIFEST: &str = "manifest.json";
const HASH_ALGORITHM: &str = "sha256";

/// Error raised by a checkpoint sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("checkpoint i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("checkpoint encoding failed: {0}")]
    Encoding(String),
}

/// Receives snapshots of the best design
pub trait CheckpointSink {
    /// Store `checkpoint` durably
    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<(), SinkError>;
}

/// Keeps every checkpoint in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub checkpoints: Vec<Checkpoint>,
}

impl CheckpointSink for MemorySink {
    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<(), SinkError> {
        self.checkpoints.push(checkpoint.clone());
        Ok(())
    }
}

impl<S: CheckpointSink + ?Sized> CheckpointSink for &mut S {
    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<(), SinkError> {
        (**self).persist(checkpoint)
    }
}

/// Encoding of checkpoint files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointFormat {
    /// Pretty-printed JSON (`.json`)
    #[default]
    Json,
    /// Compact postcard bytes (`.bin`)
    Postcard,
}

impl CheckpointFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CheckpointFormat::Json => "json",
            CheckpointFormat::Postcard => "bin",
        }
    }
}

/// File naming across snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointNaming {
    /// One `checkpoint.<ext>`, replaced by every snapshot
    #[default]
    Overwrite,
    /// `checkpoint_iter_0005.<ext>` per snapshot
    PerIteration,
}

/// On-disk shape of `manifest.json`
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    algorithm: String,
    /// File name (relative to the directory) to digest
    files: BTreeMap<String, FileDigest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FileDigest {
    sha256: String,
    bytes: u64,
}

impl FileDigest {
    fn of(bytes: &[u8]) -> Self {
        Self {
            sha256: format!("{:x}", Sha256::digest(bytes)),
            bytes: bytes.len() as u64,
        }
    }
}

/// A directory of checkpoints with an integrity manifest.
///
/// The manifest lists only the files this sink wrote. Each write hashes the
/// bytes it just produced and rewrites the manifest from the in-memory
/// ledger; nothing else in the directory is read back.
#[derive(Debug, Clone)]
pub struct CheckpointDirectory {
    dir: PathBuf,
    format: CheckpointFormat,
    naming: CheckpointNaming,
    ledger: BTreeMap<String, FileDigest>,
}

impl CheckpointDirectory {
    /// Create (or reuse) `dir` and start an empty manifest
    pub fn create(
        dir: impl AsRef<Path>,
        format: CheckpointFormat,
        naming: CheckpointNaming,
    ) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let sink = Self {
            dir,
            format,
            naming,
            ledger: BTreeMap::new(),
        };
        sink.write_manifest()?;
        Ok(sink)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the snapshot of `iteration` is written to
    pub fn checkpoint_path(&self, iteration: usize) -> PathBuf {
        self.dir.join(self.file_name(iteration))
    }

    fn file_name(&self, iteration: usize) -> String {
        let ext = self.format.extension();
        match self.naming {
            CheckpointNaming::Overwrite => format!("checkpoint.{ext}"),
            CheckpointNaming::PerIteration => format!("checkpoint_iter_{iteration:04}.{ext}"),
        }
    }

    /// Write an extra JSON document (e.g. a run summary) and record it
    pub fn write_json<T: Serialize>(&mut self, name: &str, value: &T) -> io::Result<PathBuf> {
        let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
        self.record(name, &bytes)
    }

    /// Atomically write `bytes` as `name` and update its manifest entry
    fn record(&mut self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        if name == MANIFEST {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "manifest.json is reserved",
            ));
        }
        let path = self.dir.join(name);
        atomic_write(&path, bytes)?;
        self.ledger.insert(name.to_string(), FileDigest::of(bytes));
        self.write_manifest()?;
        Ok(path)
    }

    fn write_manifest(&self) -> io::Result<()> {
        let manifest = Manifest {
            algorithm: HASH_ALGORITHM.to_string(),
            files: self.ledger.clone(),
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(io::Error::other)?;
        atomic_write(&self.dir.join(MANIFEST), &json)
    }

    /// Check every file listed in `manifest.json` against its recorded digest
    pub fn validate_manifest(&self) -> io::Result<()> {
        let text = fs::read(self.dir.join(MANIFEST))?;
        let manifest: Manifest = serde_json::from_slice(&text).map_err(io::Error::other)?;
        if manifest.algorithm != HASH_ALGORITHM {
            return Err(invalid_data(format!(
                "unsupported manifest algorithm {}",
                manifest.algorithm
            )));
        }
        for (name, expected) in &manifest.files {
            let bytes = fs::read(self.dir.join(name)).map_err(|e| {
                io::Error::new(e.kind(), format!("{name} listed in manifest: {e}"))
            })?;
            if FileDigest::of(&bytes) != *expected {
                return Err(invalid_data(format!("{name} does not match its manifest entry")));
            }
        }
        Ok(())
    }
}

impl CheckpointSink for CheckpointDirectory {
    fn persist(&mut self, checkpoint: &Checkpoint) -> Result<(), SinkError> {
        let bytes = match self.format {
            CheckpointFormat::Json => checkpoint
                .to_json()
                .map_err(|e| SinkError::Encoding(e.to_string()))?
                .into_bytes(),
            CheckpointFormat::Postcard => checkpoint
                .to_bytes()
                .map_err(|e| SinkError::Encoding(e.to_string()))?,
        };
        let name = self.file_name(checkpoint.iteration);
        let path = self.record(&name, &bytes)?;
        tracing::debug!(path = %path.display(), iteration = checkpoint.iteration, "checkpoint written");
        Ok(())
    }
}

/// Read a checkpoint back; `.bin` files are postcard, anything else JSON
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint, SinkError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let decoded = match path.extension().and_then(|e| e.to_str()) {
        Some("bin") => Checkpoint::from_bytes(&bytes),
        _ => {
            let text = String::from_utf8(bytes).map_err(|e| SinkError::Encoding(e.to_string()))?;
            Checkpoint::from_json(&text)
        }
    };
    decoded.map_err(|e| SinkError::Encoding(e.to_string()))
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Write through a `.tmp` sibling and rename, so readers never see a torn file
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use photon_swarm_geometry::{AnchorSet, LayerStack, Topology};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("photon_swarm_{prefix}_{pid}_{nanos}"))
    }

    fn checkpoint(iteration: usize) -> Checkpoint {
        Checkpoint {
            iteration,
            topology: Topology::Disk,
            anchors: AnchorSet::from_polar([(3e-7, 0.0), (3e-7, 3.0), (3e-7, 6.0)]),
            layers: LayerStack {
                top_thickness: 5e-8,
                bottom_thickness: 5e-8,
                height: 4e-7,
                period: 7e-7,
            },
            best_cost: 1.5 / iteration as f64,
            cost_history: Vec::new(),
        }
    }

    #[test]
    fn per_iteration_postcard_checkpoints_round_trip() {
        let dir = temp_dir("per_iteration");
        let mut sink =
            CheckpointDirectory::create(&dir, CheckpointFormat::Postcard, CheckpointNaming::PerIteration)
                .unwrap();
        sink.persist(&checkpoint(5)).unwrap();
        sink.persist(&checkpoint(10)).unwrap();

        let path = sink.checkpoint_path(5);
        assert!(path.ends_with("checkpoint_iter_0005.bin"));
        assert_eq!(load_checkpoint(&path).unwrap(), checkpoint(5));
        assert!(sink.checkpoint_path(10).exists());
        sink.validate_manifest().unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn overwrite_keeps_latest_and_detects_tampering() {
        let dir = temp_dir("overwrite");
        let mut sink =
            CheckpointDirectory::create(&dir, CheckpointFormat::Json, CheckpointNaming::Overwrite)
                .unwrap();
        sink.persist(&checkpoint(5)).unwrap();
        sink.persist(&checkpoint(7)).unwrap();
        let path = sink.checkpoint_path(0);
        assert_eq!(load_checkpoint(&path).unwrap().iteration, 7);
        sink.validate_manifest().unwrap();

        fs::write(&path, b"{}").unwrap();
        assert!(sink.validate_manifest().is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn summaries_are_covered_by_the_manifest() {
        let dir = temp_dir("summary");
        let mut sink = CheckpointDirectory::create(&dir, CheckpointFormat::Json, CheckpointNaming::Overwrite)
            .unwrap();
        let path = sink.write_json("result.json", &serde_json::json!({"best": 1.0})).unwrap();
        assert!(path.exists());
        let manifest: Manifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST)).unwrap()).unwrap();
        let entry = &manifest.files["result.json"];
        assert_eq!(entry.bytes, fs::metadata(&path).unwrap().len());
        assert_eq!(entry.sha256.len(), 64);
        assert!(sink.write_json(MANIFEST, &1).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn manifest_ignores_files_the_sink_did_not_write() {
        let dir = temp_dir("foreign");
        fs::create_dir_all(dir.join("older_run")).unwrap();
        fs::write(dir.join("older_run").join("checkpoint.json"), b"stale").unwrap();
        fs::write(dir.join("notes.txt"), b"hand written").unwrap();

        let mut sink =
            CheckpointDirectory::create(&dir, CheckpointFormat::Json, CheckpointNaming::PerIteration)
                .unwrap();
        sink.persist(&checkpoint(5)).unwrap();
        let manifest: Manifest = serde_json::from_slice(&fs::read(dir.join(MANIFEST)).unwrap()).unwrap();
        let names: Vec<&str> = manifest.files.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["checkpoint_iter_0005.json"]);

        // Unrelated files can change without invalidating the run.
        fs::write(dir.join("notes.txt"), b"edited").unwrap();
        sink.validate_manifest().unwrap();

        let _ = fs::remove_dir_all(&dir);
    }
}
