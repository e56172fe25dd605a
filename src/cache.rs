use crate::error::RemoteError;
use crate::models::AnalysisResult;

#[derive(Debug, Clone, Default)]
pub enum AnalysisState {
    #[default]
    Idle,
    Loading,
    Ready {
        result: Box<AnalysisResult>,
        /// A manual refresh is outstanding; `result` stays visible until it lands.
        refreshing: bool,
    },
    Failed(RemoteError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheUpdate {
    Fresh,
    Replaced,
    Failed,
    RefreshFailed,
    Ignored,
}

#[derive(Debug, Default)]
pub struct AnalysisCache {
    state: AnalysisState,
    refresh_error: Option<RemoteError>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            AnalysisState::Ready { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, AnalysisState::Ready { .. })
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            AnalysisState::Loading | AnalysisState::Ready { refreshing: true, .. }
        )
    }

    pub fn error(&self) -> Option<&RemoteError> {
        match &self.state {
            AnalysisState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn refresh_error(&self) -> Option<&RemoteError> {
        self.refresh_error.as_ref()
    }

    pub fn dismiss_refresh_error(&mut self) {
        self.refresh_error = None;
    }

    /// Marks a fetch as outstanding. Returns `false` when one already is,
    /// in which case the caller must not issue another request.
    pub fn begin_fetch(&mut self) -> bool {
        if matches!(self.state, AnalysisState::Idle | AnalysisState::Failed(_)) {
            self.state = AnalysisState::Loading;
            return true;
        }
        if let AnalysisState::Ready { refreshing, .. } = &mut self.state {
            if !*refreshing {
                *refreshing = true;
                self.refresh_error = None;
                return true;
            }
        }
        false
    }

    pub fn complete(&mut self, outcome: Result<AnalysisResult, RemoteError>) -> CacheUpdate {
        let state = std::mem::take(&mut self.state);
        let (next, update) = match (state, outcome) {
            (AnalysisState::Loading, Ok(result)) => (
                AnalysisState::Ready {
                    result: Box::new(result),
                    refreshing: false,
                },
                CacheUpdate::Fresh,
            ),
            (AnalysisState::Loading, Err(err)) => (AnalysisState::Failed(err), CacheUpdate::Failed),
            (AnalysisState::Ready { refreshing: true, .. }, Ok(result)) => (
                AnalysisState::Ready {
                    result: Box::new(result),
                    refreshing: false,
                },
                CacheUpdate::Replaced,
            ),
            (AnalysisState::Ready { result, refreshing: true }, Err(err)) => {
                self.refresh_error = Some(err);
                (
                    AnalysisState::Ready {
                        result,
                        refreshing: false,
                    },
                    CacheUpdate::RefreshFailed,
                )
            }
            (other, _) => (other, CacheUpdate::Ignored),
        };
        self.state = next;
        update
    }
}
