use serde::{Deserialize, Serialize};
use crate::models::records::{RawHelper, RawHelpee};

/// Eligibility criteria a pool applies to the helper population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperFilter {
    #[serde(default = "default_true")]
    pub is_student: bool,
    #[serde(default = "default_min_open_requests")]
    pub min_open_requests: i32,
    #[serde(default = "default_true")]
    pub require_subjects: bool,
    #[serde(default)]
    pub require_successful_screening: bool,
    /// `None` accepts both
    #[serde(default)]
    pub is_codu: Option<bool>,
    /// Empty accepts every state
    #[serde(default)]
    pub states: Vec<String>,
}

/// Eligibility criteria a pool applies to the helpee population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpeeFilter {
    #[serde(default = "default_true")]
    pub is_pupil: bool,
    #[serde(default = "default_min_open_requests")]
    pub min_open_requests: i32,
    #[serde(default = "default_true")]
    pub require_subjects: bool,
    #[serde(default)]
    pub excluded_registration_sources: Vec<String>,
    #[serde(default)]
    pub require_confirmed_interest: bool,
    /// Registration sources that count as confirmed interest
    #[serde(default = "default_exempt_sources")]
    pub confirmation_exempt_sources: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
}

fn default_true() -> bool { true }
fn default_min_open_requests() -> i32 { 1 }
fn default_exempt_sources() -> Vec<String> { vec!["cooperation".to_string()] }

impl Default for HelperFilter {
    fn default() -> Self {
        Self {
            is_student: true,
            min_open_requests: default_min_open_requests(),
            require_subjects: true,
            require_successful_screening: false,
            is_codu: None,
            states: Vec::new(),
        }
    }
}

impl Default for HelpeeFilter {
    fn default() -> Self {
        Self {
            is_pupil: true,
            min_open_requests: default_min_open_requests(),
            require_subjects: true,
            excluded_registration_sources: Vec::new(),
            require_confirmed_interest: false,
            confirmation_exempt_sources: default_exempt_sources(),
            states: Vec::new(),
        }
    }
}

/// True when a stored subject list holds at least one entry
#[inline]
pub fn has_subjects(subjects: &str) -> bool {
    let trimmed = subjects.trim();
    !trimmed.is_empty() && trimmed != "[]"
}

#[inline]
fn state_allowed(states: &[String], state: Option<&str>) -> bool {
    states.is_empty() || state.map_or(false, |s| states.iter().any(|allowed| allowed == s))
}

impl HelperFilter {
    /// In-memory evaluation, kept equivalent to the SQL built by the PostgreSQL adapter
    pub fn matches(&self, helper: &RawHelper) -> bool {
        if helper.is_student != self.is_student {
            return false;
        }

        if helper.open_match_request_count < self.min_open_requests {
            return false;
        }

        if self.require_subjects && !has_subjects(&helper.subjects) {
            return false;
        }

        if self.require_successful_screening && helper.screening_success != Some(true) {
            return false;
        }

        if let Some(is_codu) = self.is_codu {
            if helper.is_codu != is_codu {
                return false;
            }
        }

        state_allowed(&self.states, helper.state.as_deref())
    }
}

impl HelpeeFilter {
    pub fn matches(&self, helpee: &RawHelpee) -> bool {
        if helpee.is_pupil != self.is_pupil {
            return false;
        }

        if helpee.open_match_request_count < self.min_open_requests {
            return false;
        }

        if self.require_subjects && !has_subjects(&helpee.subjects) {
            return false;
        }

        if self
            .excluded_registration_sources
            .contains(&helpee.registration_source)
        {
            return false;
        }

        if self.require_confirmed_interest
            && !helpee.tutoring_interest_confirmed
            && !self
                .confirmation_exempt_sources
                .contains(&helpee.registration_source)
        {
            return false;
        }

        state_allowed(&self.states, helpee.state.as_deref())
    }
}
