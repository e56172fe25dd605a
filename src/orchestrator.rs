use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::artifact::{
    artifact_filename, ArtifactManager, ArtifactSink, ArtifactUpdate, DownloadTicket,
    ARTIFACT_EXTENSION,
};
use crate::cache::{AnalysisCache, CacheUpdate};
use crate::client::AnalysisClient;
use crate::error::{RemoteError, WorkflowError};
use crate::models::{Acknowledgement, AnalysisResult, JobOpening};
use crate::submit::{ApplicationSubmitter, ListingRefresh, SubmitOutcome};
use crate::tabs::TabbedAnalysisView;

/// Identifies one open/close lifecycle of the analysis view. Bumped on every
/// open and every close; results carrying an older token are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewToken(u64);

#[derive(Debug)]
pub enum ViewEvent {
    AnalysisLoaded {
        token: ViewToken,
        outcome: Result<AnalysisResult, RemoteError>,
    },
    ArtifactFetched {
        token: ViewToken,
        ticket: DownloadTicket,
        outcome: Result<Bytes, RemoteError>,
    },
    ApplicationSubmitted {
        token: ViewToken,
        outcome: Result<Acknowledgement, RemoteError>,
    },
}

impl ViewEvent {
    pub fn token(&self) -> ViewToken {
        match self {
            ViewEvent::AnalysisLoaded { token, .. }
            | ViewEvent::ArtifactFetched { token, .. }
            | ViewEvent::ApplicationSubmitted { token, .. } => *token,
        }
    }
}

#[derive(Debug, Clone)]
pub enum EventOutcome {
    Stale,
    Analysis(CacheUpdate),
    Artifact(ArtifactUpdate),
    Submitted(Acknowledgement),
    SubmitFailed(String),
    Ignored,
}

#[derive(Debug)]
pub struct AnalysisView {
    token: ViewToken,
    opening: JobOpening,
    cache: AnalysisCache,
    tabs: TabbedAnalysisView,
    artifact: ArtifactManager,
    submitter: ApplicationSubmitter,
}

impl AnalysisView {
    fn new(token: ViewToken, opening: JobOpening) -> Self {
        Self {
            token,
            opening,
            cache: AnalysisCache::new(),
            tabs: TabbedAnalysisView::default(),
            artifact: ArtifactManager::new(),
            submitter: ApplicationSubmitter::new(),
        }
    }

    pub fn opening(&self) -> &JobOpening {
        &self.opening
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn tabs(&self) -> &TabbedAnalysisView {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabbedAnalysisView {
        &mut self.tabs
    }

    pub fn artifact(&self) -> &ArtifactManager {
        &self.artifact
    }

    pub fn submitter(&self) -> &ApplicationSubmitter {
        &self.submitter
    }

    pub fn dismiss_errors(&mut self) {
        self.cache.dismiss_refresh_error();
        self.submitter.dismiss_error();
    }
}

/// At most one open view. Remote calls report back through the receiver
/// returned by `new`, and the owner feeds each event to `handle`.
pub struct Orchestrator {
    client: Arc<dyn AnalysisClient>,
    sink: Arc<dyn ArtifactSink>,
    listing: Arc<dyn ListingRefresh>,
    events: UnboundedSender<ViewEvent>,
    last_token: u64,
    view: Option<AnalysisView>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn AnalysisClient>,
        sink: Arc<dyn ArtifactSink>,
        listing: Arc<dyn ListingRefresh>,
    ) -> (Self, UnboundedReceiver<ViewEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let orchestrator = Self {
            client,
            sink,
            listing,
            events,
            last_token: 0,
            view: None,
        };
        (orchestrator, receiver)
    }

    pub fn view(&self) -> Option<&AnalysisView> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut AnalysisView> {
        self.view.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.view.is_some()
    }

    fn next_token(&mut self) -> ViewToken {
        self.last_token += 1;
        ViewToken(self.last_token)
    }

    pub fn open(&mut self, opening: JobOpening) -> ViewToken {
        self.close();
        let token = self.next_token();
        info!(opening_id = opening.id, ?token, "opening analysis view");
        self.view = Some(AnalysisView::new(token, opening));
        self.refresh();
        token
    }

    /// Discards the view. Requests still in flight keep running but their
    /// results will no longer match the current token.
    pub fn close(&mut self) {
        if let Some(view) = self.view.take() {
            info!(opening_id = view.opening.id, token = ?view.token, "closing analysis view");
            self.next_token();
        }
    }

    /// Fetches (or re-fetches) the analysis. Returns `false` when no view is
    /// open or a fetch is already outstanding.
    pub fn refresh(&mut self) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        if !view.cache.begin_fetch() {
            debug!("analysis fetch already in flight; dropping trigger");
            return false;
        }
        let token = view.token;
        let opening_id = view.opening.id;
        let client = Arc::clone(&self.client);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.fetch_analysis(opening_id).await;
            let _ = events.send(ViewEvent::AnalysisLoaded { token, outcome });
        });
        true
    }

    /// Starts the personalized resume download. `Ok(false)` means one is
    /// already running.
    pub fn download(&mut self) -> Result<bool, WorkflowError> {
        let view = self
            .view
            .as_mut()
            .ok_or(WorkflowError::Precondition("no analysis view is open"))?;
        let Some(ticket) = view.artifact.begin_download()? else {
            return Ok(false);
        };
        let token = view.token;
        let opening_id = view.opening.id;
        let client = Arc::clone(&self.client);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.fetch_artifact(opening_id).await;
            let _ = events.send(ViewEvent::ArtifactFetched {
                token,
                ticket,
                outcome,
            });
        });
        Ok(true)
    }

    /// Submits the application built from the cached analysis. `Ok(false)`
    /// means a submission is already outstanding.
    pub fn submit(&mut self) -> Result<bool, WorkflowError> {
        let view = self
            .view
            .as_mut()
            .ok_or(WorkflowError::Precondition("no analysis view is open"))?;
        let Some(submission) = view
            .submitter
            .prepare(view.opening.id, &view.cache, &view.artifact)?
        else {
            return Ok(false);
        };
        info!(
            opening_id = submission.opening_id,
            with_resume = submission.personalized_resume_path.is_some(),
            "submitting application"
        );
        let token = view.token;
        let client = Arc::clone(&self.client);
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client
                .submit_application(submission.opening_id, &submission)
                .await;
            let _ = events.send(ViewEvent::ApplicationSubmitted { token, outcome });
        });
        Ok(true)
    }

    pub fn handle(&mut self, event: ViewEvent) -> EventOutcome {
        let token = event.token();
        let Some(view) = self.view.as_mut().filter(|v| v.token == token) else {
            debug!(?token, "discarding result for a closed view");
            return EventOutcome::Stale;
        };

        match event {
            ViewEvent::AnalysisLoaded { outcome, .. } => {
                let update = view.cache.complete(outcome);
                if update == CacheUpdate::Fresh {
                    view.tabs.reset();
                }
                if matches!(update, CacheUpdate::Fresh | CacheUpdate::Replaced) {
                    if let Some(result) = view.cache.result() {
                        view.artifact.reset(result);
                    }
                }
                EventOutcome::Analysis(update)
            }
            ViewEvent::ArtifactFetched {
                ticket, outcome, ..
            } => {
                let filename = artifact_filename(
                    &view.opening.company_name,
                    &view.opening.job_title,
                    ARTIFACT_EXTENSION,
                );
                EventOutcome::Artifact(view.artifact.complete(
                    ticket,
                    outcome,
                    &filename,
                    self.sink.as_ref(),
                ))
            }
            ViewEvent::ApplicationSubmitted { outcome, .. } => {
                match view.submitter.complete(outcome, self.listing.as_ref()) {
                    SubmitOutcome::Submitted(ack) => {
                        self.close();
                        EventOutcome::Submitted(ack)
                    }
                    SubmitOutcome::Failed(message) => EventOutcome::SubmitFailed(message),
                    SubmitOutcome::Ignored => EventOutcome::Ignored,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDownloadState;
    use crate::cache::AnalysisState;
    use crate::mock_client::{CountingListing, MemorySink, MockClient};
    use crate::models::{ArtifactRef, MatchAnalysis, PersonalizedContent, Score};
    use crate::tabs::{AnalysisTab, ResumeSlice, TabContent};

    fn opening(id: i64) -> JobOpening {
        JobOpening {
            id,
            job_title: "Data  Scientist".into(),
            company_name: "Acme Corp".into(),
            ..Default::default()
        }
    }

    fn scored(score: i64) -> AnalysisResult {
        AnalysisResult {
            match_analysis: Some(MatchAnalysis {
                overall_match_score: Some(Score::new(score)),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn with_artifact(score: i64) -> AnalysisResult {
        AnalysisResult {
            artifact_ref: Some(ArtifactRef::new("uploads/personalized/1-acme.pdf")),
            ..scored(score)
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        events: UnboundedReceiver<ViewEvent>,
        client: Arc<MockClient>,
        sink: Arc<MemorySink>,
        listing: Arc<CountingListing>,
    }

    impl Harness {
        fn new(client: MockClient) -> Self {
            let client = Arc::new(client);
            let sink = Arc::new(MemorySink::default());
            let listing = Arc::new(CountingListing::default());
            let (orchestrator, events) = Orchestrator::new(
                client.clone(),
                sink.clone(),
                listing.clone(),
            );
            Self {
                orchestrator,
                events,
                client,
                sink,
                listing,
            }
        }

        async fn pump(&mut self) -> EventOutcome {
            let event = self.events.recv().await.expect("event channel open");
            self.orchestrator.handle(event)
        }

        fn view(&self) -> &AnalysisView {
            self.orchestrator.view().expect("view open")
        }
    }

    #[tokio::test]
    async fn test_open_loads_analysis() {
        let mut h = Harness::new(MockClient::default().with_analysis(1, Ok(scored(77))));
        h.orchestrator.open(opening(1));
        assert!(matches!(h.view().cache().state(), AnalysisState::Loading));

        let outcome = h.pump().await;
        assert!(matches!(outcome, EventOutcome::Analysis(CacheUpdate::Fresh)));
        assert_eq!(
            h.view().cache().result().unwrap().match_score(),
            Some(Score::new(77))
        );
        assert_eq!(h.view().tabs().active(), AnalysisTab::Overview);
        assert_eq!(h.view().artifact().state(), &ArtifactDownloadState::Absent);
    }

    #[tokio::test]
    async fn test_stale_fetch_never_reaches_reopened_view() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(scored(11)))
                .with_analysis(2, Ok(scored(22))),
        );
        let first = h.orchestrator.open(opening(1));
        h.orchestrator.close();
        let second = h.orchestrator.open(opening(2));
        assert_ne!(first, second);

        let mut stale = 0;
        for _ in 0..2 {
            if matches!(h.pump().await, EventOutcome::Stale) {
                stale += 1;
            }
        }
        assert_eq!(stale, 1);
        assert_eq!(h.view().opening().id, 2);
        assert_eq!(
            h.view().cache().result().unwrap().match_score(),
            Some(Score::new(22))
        );
    }

    #[tokio::test]
    async fn test_reopening_same_opening_ignores_old_result() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(scored(10)))
                .with_analysis(1, Err(RemoteError::Network("timeout".into()))),
        );
        h.orchestrator.open(opening(1));
        h.orchestrator.close();
        assert!(matches!(h.pump().await, EventOutcome::Stale));

        h.orchestrator.open(opening(1));
        assert!(matches!(h.pump().await, EventOutcome::Analysis(CacheUpdate::Failed)));
        assert!(h.view().cache().result().is_none());
        assert!(h.view().cache().error().is_some());
    }

    #[tokio::test]
    async fn test_result_after_close_is_discarded() {
        let mut h = Harness::new(MockClient::default().with_analysis(1, Ok(scored(50))));
        h.orchestrator.open(opening(1));
        h.orchestrator.close();
        assert!(matches!(h.pump().await, EventOutcome::Stale));
        assert!(!h.orchestrator.is_open());
    }

    #[tokio::test]
    async fn test_failed_fetch_can_be_retried() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Err(RemoteError::Server {
                    status: 500,
                    message: "Could not parse resume".into(),
                }))
                .with_analysis(1, Ok(scored(64))),
        );
        h.orchestrator.open(opening(1));
        assert!(!h.orchestrator.refresh());
        h.pump().await;
        assert!(h.view().cache().error().is_some());

        assert!(h.orchestrator.refresh());
        assert!(matches!(h.pump().await, EventOutcome::Analysis(CacheUpdate::Fresh)));
        assert_eq!(h.client.analysis_calls(), 2);
    }

    #[tokio::test]
    async fn test_double_download_issues_one_call() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(with_artifact(80)))
                .with_artifact(Ok(Bytes::from_static(b"%PDF-1.7"))),
        );
        h.orchestrator.open(opening(1));
        h.pump().await;

        assert!(h.orchestrator.download().unwrap());
        assert!(!h.orchestrator.download().unwrap());
        let outcome = h.pump().await;

        assert!(matches!(outcome, EventOutcome::Artifact(ArtifactUpdate::Saved(_))));
        assert_eq!(h.client.artifact_calls(), 1);
        assert_eq!(
            h.sink.saved(),
            vec!["AI-Resume-Acme_Corp-Data_Scientist.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn test_download_before_ready_is_rejected() {
        let mut h = Harness::new(MockClient::default().with_analysis(1, Ok(scored(1))));
        h.orchestrator.open(opening(1));
        assert!(matches!(
            h.orchestrator.download(),
            Err(WorkflowError::Precondition(_))
        ));
        h.pump().await;
        // ready, but the payload carried no artifact reference
        assert!(matches!(
            h.orchestrator.download(),
            Err(WorkflowError::Precondition(_))
        ));
        assert_eq!(h.client.artifact_calls(), 0);
    }

    #[tokio::test]
    async fn test_artifact_failure_then_retry() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(with_artifact(80)))
                .with_artifact(Err(RemoteError::Network("connection reset".into())))
                .with_artifact(Ok(Bytes::from_static(b"%PDF"))),
        );
        h.orchestrator.open(opening(1));
        h.pump().await;

        h.orchestrator.download().unwrap();
        assert!(matches!(h.pump().await, EventOutcome::Artifact(ArtifactUpdate::Failed(_))));
        assert_eq!(h.view().artifact().state().label(), "failed");
        // the rest of the view is untouched
        assert!(h.view().cache().is_ready());

        assert!(h.orchestrator.download().unwrap());
        assert!(matches!(h.pump().await, EventOutcome::Artifact(ArtifactUpdate::Saved(_))));
        assert_eq!(h.view().artifact().state().label(), "fetched");
    }

    #[tokio::test]
    async fn test_resume_tab_fills_in_after_refresh() {
        let populated = AnalysisResult {
            personalized_content: Some(PersonalizedContent {
                branding_headline: Some("Data scientist who ships".into()),
                ..Default::default()
            }),
            ..with_artifact(80)
        };
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(scored(80)))
                .with_analysis(1, Ok(populated)),
        );
        h.orchestrator.open(opening(1));
        h.pump().await;

        h.orchestrator
            .view_mut()
            .unwrap()
            .tabs_mut()
            .select(AnalysisTab::Resume);
        {
            let view = h.view();
            let content = view.tabs().content(view.cache().result().unwrap());
            assert!(matches!(content, TabContent::Resume(ResumeSlice::Generating)));
        }

        assert!(h.orchestrator.refresh());
        assert!(matches!(h.pump().await, EventOutcome::Analysis(CacheUpdate::Replaced)));

        let view = h.view();
        assert_eq!(view.tabs().active(), AnalysisTab::Resume);
        let content = view.tabs().content(view.cache().result().unwrap());
        assert!(matches!(content, TabContent::Resume(ResumeSlice::Ready(c))
            if c.branding_headline.as_deref() == Some("Data scientist who ships")));
        assert_eq!(view.artifact().state().label(), "ready");
    }

    #[tokio::test]
    async fn test_submit_success_closes_and_refreshes_once() {
        let mut h = Harness::new(MockClient::default().with_analysis(1, Ok(with_artifact(88))));
        h.orchestrator.open(opening(1));
        h.pump().await;

        assert!(h.orchestrator.submit().unwrap());
        assert!(!h.orchestrator.submit().unwrap());
        let outcome = h.pump().await;

        assert!(matches!(outcome, EventOutcome::Submitted(_)));
        assert!(!h.orchestrator.is_open());
        assert_eq!(h.listing.count(), 1);
        assert_eq!(h.client.submit_calls(), 1);

        let submitted = h.client.submitted();
        assert_eq!(submitted[0].match_score, Some(Score::new(88)));
        // reference existed but was never downloaded
        assert!(submitted[0].personalized_resume_path.is_none());
    }

    #[tokio::test]
    async fn test_submit_after_download_carries_reference() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(with_artifact(88)))
                .with_artifact(Ok(Bytes::from_static(b"%PDF"))),
        );
        h.orchestrator.open(opening(1));
        h.pump().await;
        h.orchestrator.download().unwrap();
        h.pump().await;

        h.orchestrator.submit().unwrap();
        h.pump().await;
        assert_eq!(
            h.client.submitted()[0]
                .personalized_resume_path
                .as_ref()
                .map(ArtifactRef::as_str),
            Some("uploads/personalized/1-acme.pdf")
        );
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_view_and_analysis() {
        let mut h = Harness::new(
            MockClient::default()
                .with_analysis(1, Ok(scored(70)))
                .with_submission(Err(RemoteError::Validation(
                    "Already applied to this drive".into(),
                ))),
        );
        h.orchestrator.open(opening(1));
        h.pump().await;
        h.orchestrator.submit().unwrap();

        assert!(matches!(h.pump().await, EventOutcome::SubmitFailed(_)));
        assert!(h.orchestrator.is_open());
        assert!(h.view().cache().is_ready());
        assert_eq!(h.listing.count(), 0);
        assert_eq!(h.client.analysis_calls(), 1);
    }

    #[tokio::test]
    async fn test_submit_before_ready_is_rejected() {
        let mut h = Harness::new(MockClient::default().with_analysis(1, Ok(scored(70))));
        h.orchestrator.open(opening(1));
        assert!(matches!(
            h.orchestrator.submit(),
            Err(WorkflowError::Precondition(_))
        ));
        h.pump().await;
        assert_eq!(h.client.submit_calls(), 0);
    }
}
