use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::{IntoParams, ToSchema};

use crate::attendance::duration::format_hms;
use crate::attendance::lateness::LatenessStatus;

/// A check-in that has not been checked out yet ("temporary" store row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OpenSession {
    #[schema(example = 41)]
    pub id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "P")]
    pub shift_code: String,

    /// Calendar day the shift occurrence starts on.
    #[schema(example = "2024-03-01", value_type = String, format = "date")]
    pub shift_date: NaiveDate,

    #[schema(example = "2024-03-01T08:03:00", value_type = String, format = "date-time")]
    pub arrival: NaiveDateTime,

    /// Only set inside the close transaction.
    #[schema(value_type = Option<String>, format = "date-time", nullable = true)]
    pub departure: Option<NaiveDateTime>,

    pub status: LatenessStatus,

    #[schema(example = 0)]
    pub lateness_minutes: i64,

    #[schema(example = "uploads/1001/20240301-0803.jpg", nullable = true)]
    pub photo_ref: Option<String>,
}

/// Row to be written at check-in; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOpenSession {
    pub employee_id: u64,
    pub shift_code: String,
    pub shift_date: NaiveDate,
    pub arrival: NaiveDateTime,
    pub status: LatenessStatus,
    pub lateness_minutes: i64,
    pub photo_ref: Option<String>,
}

impl NewOpenSession {
    pub fn into_open(self, id: u64) -> OpenSession {
        OpenSession {
            id,
            employee_id: self.employee_id,
            shift_code: self.shift_code,
            shift_date: self.shift_date,
            arrival: self.arrival,
            departure: None,
            status: self.status,
            lateness_minutes: self.lateness_minutes,
            photo_ref: self.photo_ref,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum CheckoutRemark {
    #[serde(rename = "manual")]
    #[strum(serialize = "manual")]
    Manual,

    #[serde(rename = "auto-checkout")]
    #[strum(serialize = "auto-checkout")]
    AutoCheckout,
}

/// What the lifecycle decided when closing; the store turns it into a recap row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClosing {
    pub departure: NaiveDateTime,
    pub remark: CheckoutRemark,
}

/// A completed session ("rekap" store row). Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ClosedSession {
    #[schema(example = 7)]
    pub id: u64,

    /// Id the session had while it was open.
    #[schema(example = 41)]
    pub open_id: u64,

    #[schema(example = 1001)]
    pub employee_id: u64,

    #[schema(example = "P")]
    pub shift_code: String,

    #[schema(example = "2024-03-01", value_type = String, format = "date")]
    pub shift_date: NaiveDate,

    #[schema(example = "2024-03-01T08:03:00", value_type = String, format = "date-time")]
    pub arrival: NaiveDateTime,

    #[schema(example = "2024-03-01T16:05:00", value_type = String, format = "date-time")]
    pub departure: NaiveDateTime,

    #[schema(example = 28920)]
    pub duration_seconds: i64,

    #[schema(example = "08:02:00")]
    pub duration: String,

    pub status: LatenessStatus,

    #[schema(example = 0)]
    pub lateness_minutes: i64,

    #[schema(nullable = true)]
    pub photo_ref: Option<String>,

    pub remark: CheckoutRemark,
}

impl ClosedSession {
    pub fn from_open(id: u64, open: &OpenSession, closing: SessionClosing) -> Self {
        let worked = closing.departure - open.arrival;
        Self {
            id,
            open_id: open.id,
            employee_id: open.employee_id,
            shift_code: open.shift_code.clone(),
            shift_date: open.shift_date,
            arrival: open.arrival,
            departure: closing.departure,
            duration_seconds: worked.num_seconds(),
            duration: format_hms(worked),
            status: open.status,
            lateness_minutes: open.lateness_minutes,
            photo_ref: open.photo_ref.clone(),
            remark: closing.remark,
        }
    }
}

/// Open session as polled by clients, with the shift math already done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OpenSessionView {
    pub session: OpenSession,

    #[schema(example = "2024-03-01T16:00:00", value_type = String, format = "date-time")]
    pub expected_end: NaiveDateTime,

    #[schema(example = "2024-03-01T18:00:00", value_type = String, format = "date-time")]
    pub auto_checkout_eligible_at: NaiveDateTime,

    pub is_overdue: bool,

    /// `expected_end - now`; negative once the shift end has passed.
    #[schema(example = 5400)]
    pub remaining_seconds: i64,

    #[schema(example = "1h 30m remaining")]
    pub remaining: String,

    #[schema(example = 23400)]
    pub elapsed_seconds: i64,

    #[schema(example = "06:30:00")]
    pub elapsed: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct RecapFilter {
    /// Restrict to one employee (HR/Admin only; employees always see their own)
    #[schema(example = 1001)]
    pub employee_id: Option<u64>,
    /// First shift date to include
    #[schema(example = "2024-03-01", value_type = Option<String>, format = "date")]
    pub from: Option<NaiveDate>,
    /// Last shift date to include
    #[schema(example = "2024-03-31", value_type = Option<String>, format = "date")]
    pub to: Option<NaiveDate>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>,
    /// Pagination per page number
    #[schema(example = 20)]
    pub per_page: Option<u64>,
}

impl RecapFilter {
    pub fn per_page(&self) -> u64 {
        self.per_page.unwrap_or(20).clamp(1, 100)
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> u64 {
        (self.page() - 1) * self.per_page()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecapPage {
    pub data: Vec<ClosedSession>,
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 20)]
    pub per_page: u64,
    #[schema(example = 1)]
    pub total: i64,
}
