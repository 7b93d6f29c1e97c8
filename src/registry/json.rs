use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::validate::validate_camera;
use super::CameraRegistry;
use crate::camera::{CameraConfig, CameraPatch};
use crate::error::{CamvisorError, Result};

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Serialize)]
struct RegistryDocument<'a> {
    version: u32,
    cameras: Vec<&'a CameraConfig>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    cameras: Vec<serde_json::Value>,
}

fn default_version() -> u32 {
    REGISTRY_VERSION
}

#[derive(Debug)]
struct RegistryState {
    version: u32,
    cameras: BTreeMap<String, CameraConfig>,
}

impl RegistryState {
    fn empty() -> Self {
        Self {
            version: REGISTRY_VERSION,
            cameras: BTreeMap::new(),
        }
    }
}

/// Camera registry persisted as a JSON document.
///
/// The document looks like `{"version": 1, "cameras": [...]}` with cameras
/// sorted by id. Every mutation is validated and written through to disk.
/// An in-memory registry behaves the same without the file.
#[derive(Debug)]
pub struct JsonRegistry {
    path: Option<PathBuf>,
    state: RwLock<RegistryState>,
}

impl JsonRegistry {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(RegistryState::empty()),
        }
    }

    /// Open a file-backed registry, creating an empty document if missing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let registry = Self {
            path: Some(path.as_ref().to_path_buf()),
            state: RwLock::new(RegistryState::empty()),
        };
        registry.load()?;
        Ok(registry)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn version(&self) -> u32 {
        self.state.read().version
    }

    /// Re-read the backing file. Invalid entries are skipped with a warning.
    pub fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let mut state = self.state.write();
            *state = RegistryState::empty();
            write_document(path, &state)?;
            info!("Created empty camera registry at {}", path.display());
            return Ok(());
        }

        let text = fs::read_to_string(path).map_err(|e| {
            CamvisorError::registry(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let raw: RawDocument = serde_json::from_str(&text).map_err(|e| {
            CamvisorError::registry(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let mut cameras = BTreeMap::new();
        for (index, entry) in raw.cameras.into_iter().enumerate() {
            match parse_entry(entry) {
                Ok(camera) => {
                    cameras.insert(camera.id.clone(), camera);
                }
                Err(e) => {
                    warn!("Skipping camera entry {} in {}: {}", index, path.display(), e);
                }
            }
        }

        let mut state = self.state.write();
        state.version = raw.version;
        state.cameras = cameras;
        debug!(
            "Loaded {} cameras from {}",
            state.cameras.len(),
            path.display()
        );
        Ok(())
    }

    /// Write the registry to its backing file; a no-op in memory
    pub fn save(&self) -> Result<()> {
        let state = self.state.read();
        self.persist(&state)
    }

    pub fn add(&self, mut camera: CameraConfig) -> Result<CameraConfig> {
        let mut state = self.state.write();
        if state.cameras.contains_key(&camera.id) {
            return Err(CamvisorError::registry(format!(
                "Camera id already exists: {}",
                camera.id
            )));
        }
        validate_camera(&camera)?;

        let now = Utc::now();
        camera.created_at = now;
        camera.updated_at = now;
        state.cameras.insert(camera.id.clone(), camera.clone());
        self.persist(&state)?;

        info!("Added camera {} ({} {})", camera.id, camera.kind, camera.source);
        Ok(camera)
    }

    pub fn update(&self, camera_id: &str, patch: &CameraPatch) -> Result<CameraConfig> {
        let mut state = self.state.write();
        let current = state
            .cameras
            .get(camera_id)
            .ok_or_else(|| CamvisorError::camera_not_found(camera_id))?;

        let mut updated = patch.apply(current);
        updated.updated_at = Utc::now();
        validate_camera(&updated)?;

        state
            .cameras
            .insert(camera_id.to_string(), updated.clone());
        self.persist(&state)?;

        debug!("Updated camera {}", camera_id);
        Ok(updated)
    }

    pub fn enable(&self, camera_id: &str) -> Result<CameraConfig> {
        self.update(camera_id, &CameraPatch::enabled(true))
    }

    pub fn disable(&self, camera_id: &str) -> Result<CameraConfig> {
        self.update(camera_id, &CameraPatch::enabled(false))
    }

    /// Remove a camera. Returns false if it was not present.
    pub fn delete(&self, camera_id: &str) -> Result<bool> {
        let mut state = self.state.write();
        if state.cameras.remove(camera_id).is_none() {
            return Ok(false);
        }
        self.persist(&state)?;
        info!("Deleted camera {}", camera_id);
        Ok(true)
    }

    /// First free id of the form `cam_N`
    pub fn generate_id(&self) -> String {
        let state = self.state.read();
        (1u32..)
            .map(|n| format!("cam_{}", n))
            .find(|id| !state.cameras.contains_key(id))
            .unwrap_or_else(|| format!("cam_{}", state.cameras.len() + 1))
    }

    fn persist(&self, state: &RegistryState) -> Result<()> {
        match &self.path {
            Some(path) => write_document(path, state),
            None => Ok(()),
        }
    }
}

impl CameraRegistry for JsonRegistry {
    fn get(&self, camera_id: &str) -> Option<CameraConfig> {
        self.state.read().cameras.get(camera_id).cloned()
    }

    fn list(&self, include_disabled: bool) -> Vec<CameraConfig> {
        self.state
            .read()
            .cameras
            .values()
            .filter(|camera| include_disabled || camera.enabled)
            .cloned()
            .collect()
    }

    fn reload(&self) -> Result<()> {
        self.load()
    }
}

fn parse_entry(entry: serde_json::Value) -> Result<CameraConfig> {
    let mut camera: CameraConfig = serde_json::from_value(entry)?;
    if camera.name.trim().is_empty() {
        camera.name = camera.id.clone();
    }
    validate_camera(&camera)?;
    Ok(camera)
}

/// Write via a temporary sibling and rename, so readers never see a partial file
fn write_document(path: &Path, state: &RegistryState) -> Result<()> {
    let document = RegistryDocument {
        version: state.version,
        cameras: state.cameras.values().collect(),
    };
    let json = serde_json::to_string_pretty(&document)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
