use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use crate::models::{HelpeeFilter, HelperFilter, MatchRecord, RawHelpee, RawHelper, Side, Viable};
use crate::services::repository::{CandidateRepository, CommitError, MatchCreator, RepositoryError};

#[derive(Debug, Default)]
struct Store {
    helpers: Vec<RawHelper>,
    helpees: Vec<RawHelpee>,
    matches: Vec<MatchRecord>,
}

/// Candidate storage held in process memory
///
/// Evaluates pool filters with the same semantics as the PostgreSQL adapter
/// and creates matches the same way: unique per pair, decrementing the open
/// request count on both sides.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new(helpers: Vec<RawHelper>, helpees: Vec<RawHelpee>) -> Self {
        Self {
            store: Mutex::new(Store {
                helpers,
                helpees,
                matches: Vec::new(),
            }),
        }
    }

    /// Register a prior pairing, e.g. one that has since been dissolved
    pub fn insert_match(&self, helper_id: i64, helpee_id: i64, dissolved: bool) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        let id = store.matches.len() as i64 + 1;
        store.matches.push(MatchRecord {
            id,
            uuid: uuid::Uuid::new_v4(),
            helper_id,
            helpee_id,
            dissolved,
            dissolved_at: dissolved.then(Utc::now),
            created_at: Utc::now(),
        });
        Ok(())
    }

    pub fn matches(&self) -> Result<Vec<MatchRecord>, RepositoryError> {
        Ok(self.lock()?.matches.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Backend("in-memory store poisoned".to_string()))
    }
}

/// Apply offset and limit the way SQL does
fn page<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let skip = offset.unwrap_or(0).max(0) as usize;
    let take = limit.map_or(usize::MAX, |l| l.max(0) as usize);
    items.into_iter().skip(skip).take(take).collect()
}

#[async_trait]
impl CandidateRepository for InMemoryRepository {
    async fn fetch_helpers(
        &self,
        filter: &HelperFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelper>, RepositoryError> {
        let store = self.lock()?;
        let mut helpers: Vec<RawHelper> = store
            .helpers
            .iter()
            .filter(|h| h.is_viable() && filter.matches(h))
            .cloned()
            .collect();
        helpers.sort_by_key(|h| h.id);
        Ok(page(helpers, limit, offset))
    }

    async fn fetch_helpees(
        &self,
        filter: &HelpeeFilter,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<RawHelpee>, RepositoryError> {
        let store = self.lock()?;
        let mut helpees: Vec<RawHelpee> = store
            .helpees
            .iter()
            .filter(|h| h.is_viable() && filter.matches(h))
            .cloned()
            .collect();
        helpees.sort_by_key(|h| h.id);
        Ok(page(helpees, limit, offset))
    }

    async fn count_helpers(&self, filter: &HelperFilter) -> Result<u64, RepositoryError> {
        let store = self.lock()?;
        Ok(store.helpers.iter().filter(|h| h.is_viable() && filter.matches(h)).count() as u64)
    }

    async fn count_helpees(&self, filter: &HelpeeFilter) -> Result<u64, RepositoryError> {
        let store = self.lock()?;
        Ok(store.helpees.iter().filter(|h| h.is_viable() && filter.matches(h)).count() as u64)
    }

    async fn pairing_history(&self, side: Side, candidate_id: i64) -> Result<Vec<String>, RepositoryError> {
        let store = self.lock()?;
        let refs = store
            .matches
            .iter()
            .filter_map(|m| match side {
                Side::Helper if m.helper_id == candidate_id => store
                    .helpees
                    .iter()
                    .find(|p| p.id == m.helpee_id)
                    .map(|p| p.external_ref.clone()),
                Side::Helpee if m.helpee_id == candidate_id => store
                    .helpers
                    .iter()
                    .find(|s| s.id == m.helper_id)
                    .map(|s| s.external_ref.clone()),
                _ => None,
            })
            .collect();
        Ok(refs)
    }
}

#[async_trait]
impl MatchCreator for InMemoryRepository {
    async fn create_match(&self, helpee: &RawHelpee, helper: &RawHelper) -> Result<(), CommitError> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| CommitError::Rejected("in-memory store poisoned".to_string()))?;

        if store
            .matches
            .iter()
            .any(|m| m.helper_id == helper.id && m.helpee_id == helpee.id)
        {
            return Err(CommitError::Duplicate {
                helper_ref: helper.external_ref.clone(),
                helpee_ref: helpee.external_ref.clone(),
            });
        }

        let id = store.matches.len() as i64 + 1;
        store.matches.push(MatchRecord {
            id,
            uuid: uuid::Uuid::new_v4(),
            helper_id: helper.id,
            helpee_id: helpee.id,
            dissolved: false,
            dissolved_at: None,
            created_at: Utc::now(),
        });

        if let Some(h) = store.helpers.iter_mut().find(|h| h.id == helper.id) {
            h.open_match_request_count = (h.open_match_request_count - 1).max(0);
        }
        if let Some(p) = store.helpees.iter_mut().find(|p| p.id == helpee.id) {
            p.open_match_request_count = (p.open_match_request_count - 1).max(0);
        }

        tracing::debug!("Created match {} -> {}", helper.external_ref, helpee.external_ref);
        Ok(())
    }
}
