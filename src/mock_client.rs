//! Scripted collaborators for exercising the workflow without a portal.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::artifact::ArtifactSink;
use crate::client::AnalysisClient;
use crate::error::RemoteError;
use crate::models::{Acknowledgement, AnalysisResult, ApplicationSubmission};
use crate::submit::ListingRefresh;

/// Replays queued outcomes in order. An exhausted analysis or artifact queue
/// answers `NotFound`; an exhausted submission queue acknowledges.
#[derive(Default)]
pub struct MockClient {
    analyses: Mutex<HashMap<i64, VecDeque<Result<AnalysisResult, RemoteError>>>>,
    artifacts: Mutex<VecDeque<Result<Bytes, RemoteError>>>,
    submissions: Mutex<VecDeque<Result<Acknowledgement, RemoteError>>>,
    submitted: Mutex<Vec<ApplicationSubmission>>,
    analysis_calls: AtomicUsize,
    artifact_calls: AtomicUsize,
    submit_calls: AtomicUsize,
}

impl MockClient {
    pub fn with_analysis(self, opening_id: i64, outcome: Result<AnalysisResult, RemoteError>) -> Self {
        self.analyses
            .lock()
            .unwrap()
            .entry(opening_id)
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn with_artifact(self, outcome: Result<Bytes, RemoteError>) -> Self {
        self.artifacts.lock().unwrap().push_back(outcome);
        self
    }

    pub fn with_submission(self, outcome: Result<Acknowledgement, RemoteError>) -> Self {
        self.submissions.lock().unwrap().push_back(outcome);
        self
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    pub fn artifact_calls(&self) -> usize {
        self.artifact_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<ApplicationSubmission> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisClient for MockClient {
    async fn fetch_analysis(&self, opening_id: i64) -> Result<AnalysisResult, RemoteError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.analyses
            .lock()
            .unwrap()
            .get_mut(&opening_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(RemoteError::NotFound("Job drive not found".into())))
    }

    async fn fetch_artifact(&self, _opening_id: i64) -> Result<Bytes, RemoteError> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        self.artifacts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::NotFound("Personalized resume not found".into())))
    }

    async fn submit_application(
        &self,
        _opening_id: i64,
        submission: &ApplicationSubmission,
    ) -> Result<Acknowledgement, RemoteError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(submission.clone());
        self.submissions.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(Acknowledgement {
                message: "Application submitted successfully".into(),
                application_id: Some(1),
                used_personalized_resume: submission.personalized_resume_path.is_some(),
            })
        })
    }
}

#[derive(Default)]
pub struct MemorySink {
    saved: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

impl ArtifactSink for MemorySink {
    fn save(&self, _contents: Bytes, filename: &str) -> anyhow::Result<PathBuf> {
        self.saved.lock().unwrap().push(filename.to_string());
        Ok(PathBuf::from("/downloads").join(filename))
    }
}

#[derive(Default)]
pub struct CountingListing(AtomicUsize);

impl CountingListing {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ListingRefresh for CountingListing {
    fn refresh(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}
