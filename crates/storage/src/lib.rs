use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use takeoff_core::{CaptureConfig, StoreError, TakeoffId, TakeoffRecord, TakeoffStore};

const CONFIG_SCHEMA_VERSION: u32 = 1;
const TAKEOFF_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported config version {found}, expected at most {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TakeoffEnvelope {
    version: u32,
    takeoff: TakeoffRecord,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "Takeoff", "Takeoff").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_config(&self) -> Result<CaptureConfig, StorageError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(CaptureConfig::default());
        }

        let bytes = fs::read(path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > CONFIG_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                supported: CONFIG_SCHEMA_VERSION,
            });
        }

        Ok(envelope.config)
    }

    pub fn save_config(&self, config: &CaptureConfig) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config: config.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.config_path(), bytes)?;
        Ok(())
    }

    /// File-backed take-off store under this root
    pub fn takeoff_store(&self) -> JsonTakeoffStore {
        JsonTakeoffStore::new(self.root.join("takeoffs"))
    }

    fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }
}

/// One JSON file per take-off, `<dir>/<id>.json`
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-save leaves the previous version intact.
#[derive(Debug, Clone)]
pub struct JsonTakeoffStore {
    dir: PathBuf,
}

impl JsonTakeoffStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: TakeoffId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read(path: &Path) -> Result<TakeoffRecord, StoreError> {
        let bytes = fs::read(path)?;
        let envelope: TakeoffEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > TAKEOFF_SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: envelope.version,
                supported: TAKEOFF_SCHEMA_VERSION,
            });
        }
        Ok(envelope.takeoff)
    }
}

impl TakeoffStore for JsonTakeoffStore {
    fn save(&mut self, record: &TakeoffRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let envelope = TakeoffEnvelope { version: TAKEOFF_SCHEMA_VERSION, takeoff: record.clone() };
        let bytes = serde_json::to_vec_pretty(&envelope)?;

        let path = self.path_for(record.id);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &path)?;

        debug!(
            "event=takeoff_save module=storage status=ok takeoff={} path={}",
            record.id,
            path.display()
        );
        Ok(())
    }

    fn load(&self, id: TakeoffId) -> Result<Option<TakeoffRecord>, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    fn load_all(&self) -> Result<Vec<TakeoffRecord>, StoreError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            } else {
                debug!(
                    "event=takeoff_load module=storage status=skipped path={}",
                    path.display()
                );
            }
        }
        paths.sort();

        paths.iter().map(|path| Self::read(path)).collect()
    }

    fn delete(&mut self, id: TakeoffId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("event=takeoff_delete module=storage status=missing takeoff={}", id);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use takeoff_core::{
        CaptureOutcome, DocumentContext, MeasurementKind, SurfacePoint, TakeoffSession,
        TakeoffStatus, Tool,
    };

    fn session_with_measurements() -> (TakeoffSession, TakeoffId) {
        let mut session = TakeoffSession::new(&CaptureConfig::default());
        session.set_scale("100").expect("valid scale");
        session.open_page(DocumentContext::new(0));
        let id = session.create_takeoff("Cable tray", MeasurementKind::Linear).expect("created");
        session.select_tool(Tool::Linear);

        session.pointer_down(SurfacePoint::new(0.0, 0.0));
        let outcome = session.pointer_up(SurfacePoint::new(350.0, 0.0));
        assert_eq!(outcome, CaptureOutcome::Pending);
        session.confirm_pending("Riser").expect("confirmed");
        (session, id)
    }

    #[test]
    fn config_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = Storage::with_root(temp.path());

        let config = CaptureConfig {
            hit_tolerance: 8.0,
            min_point_spacing: 2.5,
            ..CaptureConfig::default()
        };

        storage.save_config(&config).expect("save should succeed");
        let loaded = storage.load_config().expect("load should succeed");

        assert_eq!(loaded, config);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = Storage::with_root(temp.path());

        let loaded = storage.load_config().expect("load should succeed");
        assert_eq!(loaded, CaptureConfig::default());
    }

    #[test]
    fn future_config_version_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = Storage::with_root(temp.path());
        fs::write(temp.path().join("config.json"), r#"{"version": 9, "config": {}}"#)
            .expect("write should succeed");

        assert!(matches!(
            storage.load_config(),
            Err(StorageError::UnsupportedVersion { found: 9, supported: 1 })
        ));
    }

    #[test]
    fn takeoffs_survive_reload() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let storage = Storage::with_root(temp.path());
        let mut store = storage.takeoff_store();

        let (mut session, id) = session_with_measurements();
        assert!(session.flush(&mut store).is_empty());
        assert!(store.dir().join(format!("{id}.json")).exists());
        assert!(!store.dir().join(format!("{id}.json.tmp")).exists());

        let mut reloaded = TakeoffSession::new(&CaptureConfig::default());
        assert_eq!(reloaded.load(&storage.takeoff_store()).expect("load should succeed"), 1);

        let takeoff = reloaded.ledger().get(id).expect("takeoff restored");
        assert_eq!(takeoff.name(), "Cable tray");
        assert_eq!(takeoff.quantity(), 3.5);
        assert_eq!(takeoff.status(), TakeoffStatus::Complete);
        assert_eq!(takeoff.measurements()[0].label(), "Riser");
    }

    #[test]
    fn delete_removes_file_and_tolerates_missing() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = JsonTakeoffStore::new(temp.path().join("takeoffs"));

        let (mut session, id) = session_with_measurements();
        session.flush(&mut store);
        assert_eq!(store.load_all().expect("load should succeed").len(), 1);

        store.delete(id).expect("delete should succeed");
        assert!(store.load(id).expect("load should succeed").is_none());
        store.delete(id).expect("deleting twice should succeed");
    }

    #[test]
    fn load_all_on_missing_directory_is_empty() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = JsonTakeoffStore::new(temp.path().join("absent"));
        assert!(store.load_all().expect("load should succeed").is_empty());
    }

    #[test]
    fn future_takeoff_version_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let mut store = JsonTakeoffStore::new(temp.path());
        let (session, id) = session_with_measurements();
        let record = TakeoffRecord::from(session.ledger().get(id).expect("takeoff exists"));
        store.save(&record).expect("save should succeed");

        let path = temp.path().join(format!("{id}.json"));
        let text = fs::read_to_string(&path).expect("read should succeed");
        fs::write(&path, text.replacen("\"version\": 1", "\"version\": 2", 1))
            .expect("write should succeed");

        assert!(matches!(
            store.load(id),
            Err(StoreError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }
}
