//! Model import boundary and lifecycle.
//!
//! Format parsing sits behind [`ModelImporter`]. [`ImportManager`] owns the
//! lifecycle around it: the size ceiling (checked before any parsing), one
//! in-flight import at a time with newer requests superseding older ones,
//! and disposal of whatever a superseded import managed to build.

pub mod gltf;

pub use gltf::GltfImporter;

use crate::engine::{Aabb, Engine, EngineError, NodeId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read model at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} is {size} bytes, above the {limit} byte import limit")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("unsupported model format: {name}")]
    UnsupportedFormat { name: String },
    #[error("failed to parse {name}: {reason}")]
    Parse { name: String, reason: String },
    #[error("import of {name} was aborted")]
    Aborted { name: String },
    #[error("{name} contains no nodes")]
    EmptyModel { name: String },
    #[error("scene graph rejected the imported model: {0}")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    Gltf,
    Glb,
    Fbx,
}

impl ModelFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "gltf" => Some(Self::Gltf),
            "glb" => Some(Self::Glb),
            "fbx" => Some(Self::Fbx),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Remove and dispose the current model before adding the new one.
    #[default]
    Replace,
    /// Keep existing models.
    Add,
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub name: String,
    pub format: ModelFormat,
    pub bytes: Vec<u8>,
}

impl ImportRequest {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, AssetError> {
        let name = name.into();
        let format = ModelFormat::from_name(&name).ok_or_else(|| AssetError::UnsupportedFormat { name: name.clone() })?;
        Ok(Self { name, format, bytes })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Detached subtree produced by an importer. Nothing is in the scene yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportedModel {
    pub root: NodeId,
    pub bounds: Aabb,
}

/// Shared cancellation flag, checked by importers between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub trait ModelImporter {
    /// Builds the model as a detached subtree. On error (cancellation
    /// included) nothing the importer created may remain in the engine.
    fn import(
        &mut self,
        engine: &mut Engine,
        request: &ImportRequest,
        cancel: &CancelToken,
    ) -> Result<ImportedModel, AssetError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ImportTicket(pub u64);

/// A started import waiting to be run.
#[derive(Debug)]
pub struct ImportJob {
    pub ticket: ImportTicket,
    pub mode: ImportMode,
    pub request: ImportRequest,
    pub cancel: CancelToken,
}

impl ImportJob {
    pub fn run(&self, engine: &mut Engine, importer: &mut dyn ModelImporter) -> Result<ImportedModel, AssetError> {
        if self.cancel.is_cancelled() {
            return Err(AssetError::Aborted {
                name: self.request.name.clone(),
            });
        }
        importer.import(engine, &self.request, &self.cancel)
    }
}

#[derive(Debug)]
pub enum ImportOutcome {
    Ready {
        ticket: ImportTicket,
        name: String,
        size: u64,
        mode: ImportMode,
        model: ImportedModel,
    },
    Failed {
        ticket: ImportTicket,
        name: String,
        error: AssetError,
    },
    /// A newer import started first; the result was discarded.
    Superseded { ticket: ImportTicket, name: String },
}

struct Latest {
    ticket: ImportTicket,
    cancel: CancelToken,
}

pub struct ImportManager {
    max_bytes: u64,
    next_ticket: u64,
    queued: Option<ImportJob>,
    latest: Option<Latest>,
}

impl ImportManager {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            next_ticket: 1,
            queued: None,
            latest: None,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// An import has been started and its outcome not yet delivered.
    pub fn is_busy(&self) -> bool {
        self.latest.is_some()
    }

    fn check_size(&self, name: &str, size: u64) -> Result<(), AssetError> {
        if size > self.max_bytes {
            return Err(AssetError::TooLarge {
                name: name.to_string(),
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    /// Starts an import, superseding any import still in flight. Oversized
    /// requests are rejected here, before any parsing, and leave the
    /// in-flight import untouched.
    pub fn begin(&mut self, request: ImportRequest, mode: ImportMode) -> Result<ImportTicket, AssetError> {
        self.check_size(&request.name, request.size())?;

        if let Some(previous) = self.latest.take() {
            previous.cancel.cancel();
            log::warn!("Import {:?} superseded by a newer request", previous.ticket);
        }
        let ticket = ImportTicket(self.next_ticket);
        self.next_ticket += 1;
        let cancel = CancelToken::new();
        log::info!("Import {:?} started: {} ({} bytes)", ticket, request.name, request.size());
        self.latest = Some(Latest {
            ticket,
            cancel: cancel.clone(),
        });
        self.queued = Some(ImportJob {
            ticket,
            mode,
            request,
            cancel,
        });
        Ok(ticket)
    }

    /// Like [`begin`](Self::begin) but checks the file size on disk before
    /// reading it.
    pub fn begin_from_path(&mut self, path: &Path, mode: ImportMode) -> Result<ImportTicket, AssetError> {
        let display = path.display().to_string();
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("model")
            .to_string();
        let read_error = |source| AssetError::Io {
            path: display.clone(),
            source,
        };
        let size = std::fs::metadata(path).map_err(read_error)?.len();
        self.check_size(&name, size)?;
        let bytes = std::fs::read(path).map_err(read_error)?;
        self.begin(ImportRequest::new(name, bytes)?, mode)
    }

    /// Hands the started import to whoever runs it.
    pub fn take_job(&mut self) -> Option<ImportJob> {
        self.queued.take()
    }

    /// Delivers a job's result. Anything but the newest, uncancelled import
    /// is superseded and its subtree disposed.
    pub fn complete(
        &mut self,
        engine: &mut Engine,
        job: ImportJob,
        result: Result<ImportedModel, AssetError>,
    ) -> ImportOutcome {
        let current = self
            .latest
            .as_ref()
            .is_some_and(|latest| latest.ticket == job.ticket && !latest.cancel.is_cancelled());
        let name = job.request.name;

        if !current {
            if let Ok(model) = result {
                if let Err(err) = engine.dispose_subtree(model.root) {
                    log::warn!("Failed to dispose superseded import {}: {err}", name);
                }
            }
            log::warn!("Discarding result of superseded import {:?} ({})", job.ticket, name);
            return ImportOutcome::Superseded {
                ticket: job.ticket,
                name,
            };
        }

        self.latest = None;
        match result {
            Ok(model) => ImportOutcome::Ready {
                ticket: job.ticket,
                size: job.request.bytes.len() as u64,
                name,
                mode: job.mode,
                model,
            },
            Err(error) => {
                log::warn!("Import {:?} failed: {error}", job.ticket);
                ImportOutcome::Failed {
                    ticket: job.ticket,
                    name,
                    error,
                }
            }
        }
    }

    /// Cancels everything; later completions are superseded.
    pub fn cancel_all(&mut self) {
        self.queued = None;
        if let Some(latest) = self.latest.take() {
            latest.cancel.cancel();
        }
    }
}
