use anyhow::{Context, Result};
use bytes::Bytes;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use crate::error::{RemoteError, WorkflowError};
use crate::models::{AnalysisResult, ArtifactRef};

pub const ARTIFACT_EXTENSION: &str = "pdf";

static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s/\\]+").expect("valid separator pattern"));

/// Host-side save primitive. Takes ownership of the bytes; nothing is kept
/// after the call returns.
pub trait ArtifactSink: Send + Sync {
    fn save(&self, contents: Bytes, filename: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DownloadDir {
    fn save(&self, contents: Bytes, filename: &str) -> Result<PathBuf> {
        let path = self.dir.join(filename);
        blocking_io(|| {
            std::fs::create_dir_all(&self.dir).with_context(|| {
                format!("Failed to create download directory: {}", self.dir.display())
            })?;
            std::fs::write(&path, &contents)
                .with_context(|| format!("Failed to write {}", path.display()))
        })?;
        Ok(path)
    }
}

// Sinks are called from the event handler on a runtime worker. On the
// multi-threaded runtime the worker is handed off for the duration of the write.
fn blocking_io<T>(work: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// `AI-Resume-<company>-<role>.<ext>` with whitespace runs collapsed to `_`.
pub fn artifact_filename(company: &str, role: &str, extension: &str) -> String {
    labelled_filename("AI-Resume", company, role, extension)
}

pub fn offer_letter_filename(company: &str, role: &str) -> String {
    labelled_filename("Offer-Letter", company, role, ARTIFACT_EXTENSION)
}

fn labelled_filename(label: &str, company: &str, role: &str, extension: &str) -> String {
    format!(
        "{}-{}-{}.{}",
        label,
        filename_token(company, "company"),
        filename_token(role, "role"),
        extension
    )
}

fn filename_token(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        SEPARATOR_RUNS.replace_all(trimmed, "_").into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactDownloadState {
    Absent,
    Ready(ArtifactRef),
    Fetching(ArtifactRef),
    Fetched {
        reference: ArtifactRef,
        saved_to: PathBuf,
    },
    Failed {
        reference: ArtifactRef,
        message: String,
    },
}

impl ArtifactDownloadState {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactDownloadState::Absent => "absent",
            ArtifactDownloadState::Ready(_) => "ready",
            ArtifactDownloadState::Fetching(_) => "fetching",
            ArtifactDownloadState::Fetched { .. } => "fetched",
            ArtifactDownloadState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactUpdate {
    Saved(PathBuf),
    Failed(String),
    Stale,
}

#[derive(Debug)]
pub struct ArtifactManager {
    state: ArtifactDownloadState,
    generation: u64,
}

impl Default for ArtifactManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactManager {
    pub fn new() -> Self {
        Self {
            state: ArtifactDownloadState::Absent,
            generation: 0,
        }
    }

    pub fn state(&self) -> &ArtifactDownloadState {
        &self.state
    }

    /// Re-derives availability from a freshly cached analysis. Any download
    /// still in flight becomes stale.
    pub fn reset(&mut self, result: &AnalysisResult) {
        self.generation += 1;
        self.state = match &result.artifact_ref {
            Some(reference) => ArtifactDownloadState::Ready(reference.clone()),
            None => ArtifactDownloadState::Absent,
        };
    }

    pub fn submitted_reference(&self) -> Option<&ArtifactRef> {
        match &self.state {
            ArtifactDownloadState::Fetched { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// Accepts a download from `Ready` or `Failed`. Returns `Ok(None)` while a
    /// download is already running so that repeated triggers are dropped.
    pub fn begin_download(&mut self) -> Result<Option<DownloadTicket>, WorkflowError> {
        let reference = match &self.state {
            ArtifactDownloadState::Ready(reference)
            | ArtifactDownloadState::Failed { reference, .. } => reference.clone(),
            ArtifactDownloadState::Fetching(_) => {
                debug!("artifact download already in flight; dropping trigger");
                return Ok(None);
            }
            ArtifactDownloadState::Absent => {
                return Err(WorkflowError::Precondition(
                    "the personalized resume is still being generated",
                ));
            }
            ArtifactDownloadState::Fetched { .. } => {
                return Err(WorkflowError::Precondition(
                    "the personalized resume was already downloaded",
                ));
            }
        };
        self.state = ArtifactDownloadState::Fetching(reference);
        Ok(Some(DownloadTicket {
            generation: self.generation,
        }))
    }

    /// Applies a finished download. On success the bytes go straight to the
    /// sink and are dropped afterwards.
    pub fn complete(
        &mut self,
        ticket: DownloadTicket,
        outcome: Result<Bytes, RemoteError>,
        filename: &str,
        sink: &dyn ArtifactSink,
    ) -> ArtifactUpdate {
        if ticket.generation != self.generation {
            debug!("discarding artifact result from a replaced analysis");
            return ArtifactUpdate::Stale;
        }
        let reference = match &self.state {
            ArtifactDownloadState::Fetching(reference) => reference.clone(),
            _ => return ArtifactUpdate::Stale,
        };

        let failure = match outcome {
            Ok(contents) => {
                let size = contents.len();
                match sink.save(contents, filename) {
                    Ok(saved_to) => {
                        info!(path = %saved_to.display(), size, "saved personalized resume");
                        self.state = ArtifactDownloadState::Fetched {
                            reference,
                            saved_to: saved_to.clone(),
                        };
                        return ArtifactUpdate::Saved(saved_to);
                    }
                    Err(err) => {
                        warn!(error = %err, "could not save personalized resume");
                        format!("Could not save the personalized resume: {}", err)
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "personalized resume download failed");
                format!(
                    "Could not download the personalized resume. {}",
                    err.user_message()
                )
            }
        };
        self.state = ArtifactDownloadState::Failed {
            reference,
            message: failure.clone(),
        };
        ArtifactUpdate::Failed(failure)
    }
}
