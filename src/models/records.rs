use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email fragment identifying internal test accounts
pub const TEST_ACCOUNT_MARKER: &str = "test@lern-fair.de";

/// Stored tutor record as read from persistence
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawHelper {
    pub id: i64,
    #[serde(rename = "externalRef")]
    pub external_ref: String,
    pub email: String,
    pub active: bool,
    #[serde(default)]
    pub verification: Option<String>,
    #[serde(rename = "isStudent")]
    pub is_student: bool,
    #[serde(rename = "isCodu", default)]
    pub is_codu: bool,
    #[serde(rename = "screeningSuccess", default)]
    pub screening_success: Option<bool>,
    #[serde(rename = "openMatchRequestCount")]
    pub open_match_request_count: i32,
    /// JSON encoded subject list
    pub subjects: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "firstMatchRequestAt", default)]
    pub first_match_request_at: Option<DateTime<Utc>>,
}

/// Stored learner record as read from persistence
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RawHelpee {
    pub id: i64,
    #[serde(rename = "externalRef")]
    pub external_ref: String,
    pub email: String,
    pub active: bool,
    #[serde(default)]
    pub verification: Option<String>,
    #[serde(rename = "isPupil")]
    pub is_pupil: bool,
    #[serde(rename = "openMatchRequestCount")]
    pub open_match_request_count: i32,
    pub subjects: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(rename = "matchingPriority", default)]
    pub matching_priority: i32,
    #[serde(rename = "registrationSource")]
    pub registration_source: String,
    #[serde(rename = "tutoringInterestConfirmed", default)]
    pub tutoring_interest_confirmed: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "firstMatchRequestAt", default)]
    pub first_match_request_at: Option<DateTime<Utc>>,
}

/// Fields the global viability check needs from either side
pub trait Viable {
    fn is_active(&self) -> bool;
    fn verification(&self) -> Option<&str>;
    fn email(&self) -> &str;

    /// Active, verified and not an internal test account.
    ///
    /// Applied to every pool on top of its own filters.
    fn is_viable(&self) -> bool {
        self.is_active() && self.verification().is_none() && !self.email().contains(TEST_ACCOUNT_MARKER)
    }
}

impl Viable for RawHelper {
    fn is_active(&self) -> bool {
        self.active
    }

    fn verification(&self) -> Option<&str> {
        self.verification.as_deref()
    }

    fn email(&self) -> &str {
        &self.email
    }
}

impl Viable for RawHelpee {
    fn is_active(&self) -> bool {
        self.active
    }

    fn verification(&self) -> Option<&str> {
        self.verification.as_deref()
    }

    fn email(&self) -> &str {
        &self.email
    }
}

/// Persisted pairing between a helper and a helpee
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchRecord {
    pub id: i64,
    pub uuid: uuid::Uuid,
    #[serde(rename = "helperId")]
    pub helper_id: i64,
    #[serde(rename = "helpeeId")]
    pub helpee_id: i64,
    pub dissolved: bool,
    #[serde(rename = "dissolvedAt")]
    pub dissolved_at: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}
