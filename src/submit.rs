use tracing::{info, warn};

use crate::artifact::ArtifactManager;
use crate::cache::AnalysisCache;
use crate::error::{RemoteError, WorkflowError};
use crate::models::{Acknowledgement, AnalysisResult, ApplicationSubmission, SkillsGap};

pub trait ListingRefresh: Send + Sync {
    fn refresh(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Submitted(Acknowledgement),
    Failed(String),
    Ignored,
}

/// Copies the submitted fields out of the cached analysis. The artifact
/// reference is included only once the resume was actually downloaded.
pub fn build_submission(
    opening_id: i64,
    result: &AnalysisResult,
    artifact: &ArtifactManager,
) -> ApplicationSubmission {
    ApplicationSubmission {
        opening_id,
        match_score: result.match_score(),
        ats_score: result.ats_score(),
        skills_gap: result.skills_gap.as_ref().map(SkillsGap::to_wire),
        personalized_resume_path: artifact.submitted_reference().cloned(),
    }
}

#[derive(Debug, Default)]
pub struct ApplicationSubmitter {
    state: SubmitState,
}

impl ApplicationSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SubmitState {
        &self.state
    }

    pub fn dismiss_error(&mut self) {
        if matches!(self.state, SubmitState::Failed(_)) {
            self.state = SubmitState::Idle;
        }
    }

    /// Builds the submission when the analysis is ready. `Ok(None)` means a
    /// submission is already outstanding and this trigger is dropped.
    pub fn prepare(
        &mut self,
        opening_id: i64,
        cache: &AnalysisCache,
        artifact: &ArtifactManager,
    ) -> Result<Option<ApplicationSubmission>, WorkflowError> {
        if self.state == SubmitState::Submitting {
            return Ok(None);
        }
        let result = cache
            .result()
            .ok_or(WorkflowError::Precondition("the analysis has not finished loading"))?;
        let submission = build_submission(opening_id, result, artifact);
        self.state = SubmitState::Submitting;
        Ok(Some(submission))
    }

    pub fn complete(
        &mut self,
        outcome: Result<Acknowledgement, RemoteError>,
        listing: &dyn ListingRefresh,
    ) -> SubmitOutcome {
        if self.state != SubmitState::Submitting {
            return SubmitOutcome::Ignored;
        }
        match outcome {
            Ok(ack) => {
                info!(application_id = ?ack.application_id, "application submitted");
                self.state = SubmitState::Idle;
                listing.refresh();
                SubmitOutcome::Submitted(ack)
            }
            Err(err) => {
                warn!(error = %err, "application submission failed");
                let message = format!("Failed to submit application: {}", err.user_message());
                self.state = SubmitState::Failed(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::DownloadTicket;
    use crate::mock_client::{CountingListing, MemorySink};
    use crate::models::{ArtifactRef, AtsAnalysis, MatchAnalysis, Score};
    use bytes::Bytes;
    use serde_json::json;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            match_analysis: Some(MatchAnalysis {
                overall_match_score: Some(Score::new(82)),
                ..Default::default()
            }),
            ats_analysis: Some(AtsAnalysis {
                ats_score: Some(Score::new(74)),
                ..Default::default()
            }),
            skills_gap: Some(SkillsGap {
                overall_readiness: Some("Ready to apply".into()),
                quick_wins: vec!["Docker".into()],
                ..Default::default()
            }),
            artifact_ref: Some(ArtifactRef::new("uploads/personalized/3-acme.pdf")),
            ..Default::default()
        }
    }

    fn ready_cache() -> AnalysisCache {
        let mut cache = AnalysisCache::new();
        cache.begin_fetch();
        cache.complete(Ok(analysis()));
        cache
    }

    fn download(artifact: &mut ArtifactManager) {
        let ticket: DownloadTicket = artifact.begin_download().unwrap().unwrap();
        artifact.complete(ticket, Ok(Bytes::from_static(b"pdf")), "r.pdf", &MemorySink::default());
    }

    #[test]
    fn test_reference_omitted_unless_fetched() {
        let cache = ready_cache();
        let mut artifact = ArtifactManager::new();
        artifact.reset(cache.result().unwrap());
        assert_eq!(artifact.state().label(), "ready");

        let submission = build_submission(3, cache.result().unwrap(), &artifact);
        assert_eq!(submission.match_score, Some(Score::new(82)));
        assert_eq!(submission.ats_score, Some(Score::new(74)));
        assert_eq!(
            submission.skills_gap,
            Some(json!({ "overall_readiness": "Ready to apply", "critical_gaps": [],
                         "quick_wins": ["Docker"], "existing_strengths": [],
                         "long_term_development": [] }))
        );
        assert!(submission.personalized_resume_path.is_none());

        download(&mut artifact);
        let submission = build_submission(3, cache.result().unwrap(), &artifact);
        assert_eq!(
            submission.personalized_resume_path.as_ref().map(ArtifactRef::as_str),
            Some("uploads/personalized/3-acme.pdf")
        );
    }

    #[test]
    fn test_prepare_requires_ready_analysis() {
        let mut submitter = ApplicationSubmitter::new();
        let cache = AnalysisCache::new();
        let artifact = ArtifactManager::new();
        assert!(matches!(
            submitter.prepare(1, &cache, &artifact),
            Err(WorkflowError::Precondition(_))
        ));
        assert_eq!(submitter.state(), &SubmitState::Idle);
    }

    #[test]
    fn test_duplicate_submit_is_dropped() {
        let mut submitter = ApplicationSubmitter::new();
        let cache = ready_cache();
        let artifact = ArtifactManager::new();
        assert!(submitter.prepare(1, &cache, &artifact).unwrap().is_some());
        assert!(submitter.prepare(1, &cache, &artifact).unwrap().is_none());
    }

    #[test]
    fn test_success_refreshes_listing_once() {
        let listing = CountingListing::default();
        let mut submitter = ApplicationSubmitter::new();
        let cache = ready_cache();
        let artifact = ArtifactManager::new();
        submitter.prepare(1, &cache, &artifact).unwrap();

        let outcome = submitter.complete(
            Ok(Acknowledgement {
                message: "Application submitted successfully".into(),
                application_id: Some(12),
                used_personalized_resume: false,
            }),
            &listing,
        );
        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert_eq!(listing.count(), 1);

        // a late duplicate completion does not refresh again
        let outcome = submitter.complete(Ok(Acknowledgement::default()), &listing);
        assert!(matches!(outcome, SubmitOutcome::Ignored));
        assert_eq!(listing.count(), 1);
    }

    #[test]
    fn test_failure_is_dismissable_and_retryable() {
        let listing = CountingListing::default();
        let mut submitter = ApplicationSubmitter::new();
        let cache = ready_cache();
        let artifact = ArtifactManager::new();
        submitter.prepare(1, &cache, &artifact).unwrap();

        let outcome = submitter.complete(
            Err(RemoteError::Validation("Already applied to this drive".into())),
            &listing,
        );
        assert!(matches!(outcome, SubmitOutcome::Failed(msg) if msg.contains("Already applied")));
        assert_eq!(listing.count(), 0);
        assert!(cache.is_ready());

        submitter.dismiss_error();
        assert_eq!(submitter.state(), &SubmitState::Idle);
        assert!(submitter.prepare(1, &cache, &artifact).unwrap().is_some());
    }

    #[test]
    fn test_skills_gap_sent_as_received() {
        let raw = json!({
            "critical_gaps": [{
                "skill": "Kubernetes",
                "importance": "Critical",
                "learning_resources": ["CKAD"],
                "estimated_time": null,
                "priority_rank": 1
            }],
            "overall_readiness": "Need 1-2 skills",
            "quick_wins": ["Docker"]
        });
        let result: AnalysisResult = serde_json::from_value(json!({
            "match_analysis": { "overall_match_score": 70 },
            "skills_gap": raw.clone()
        }))
        .unwrap();
        let submission = build_submission(4, &result, &ArtifactManager::new());
        let body = serde_json::to_value(&submission).unwrap();
        assert_eq!(body["skills_gap"], raw);
        assert_eq!(body["match_score"], 70);
    }
}
