use async_trait::async_trait;
use chrono::NaiveDate;
use strum_macros::{AsRefStr, Display};

use super::error::StoreError;
use crate::model::session::{
    ClosedSession, NewOpenSession, OpenSession, RecapFilter, RecapPage, SessionClosing,
};
use crate::model::shift::ShiftDefinition;

/// Read-only view of the scheduling module.
#[async_trait]
pub trait ShiftCalendar: Send + Sync {
    async fn shift_assignment(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<String>, StoreError>;

    async fn shift_definition(&self, code: &str) -> Result<Option<ShiftDefinition>, StoreError>;
}

/// Open ("temporary") and closed ("rekap") session stores. The lifecycle is the only writer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with `DuplicateOpenSession` if the employee already has an open row.
    async fn insert_open(&self, session: NewOpenSession) -> Result<OpenSession, StoreError>;

    /// Most recent open session with no departure.
    async fn latest_open(&self, employee_id: u64) -> Result<Option<OpenSession>, StoreError>;

    async fn list_open(&self) -> Result<Vec<OpenSession>, StoreError>;

    /// Records the session in the closed store and removes the open row as one unit.
    /// On any error neither store has changed.
    async fn close(
        &self,
        open: &OpenSession,
        closing: SessionClosing,
    ) -> Result<ClosedSession, StoreError>;

    async fn list_closed(&self, filter: &RecapFilter) -> Result<RecapPage, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum EvidenceKind {
    Photo,
    Geolocation,
}

/// Photo/geolocation persistence owned by other modules.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    async fn record(
        &self,
        employee_id: u64,
        session_id: u64,
        kind: EvidenceKind,
        reference: &str,
    ) -> Result<(), StoreError>;
}
