//! In-memory stores used by the test suites. `MemorySessionStore` stages both writes
//! of a close and only publishes them together, so an injected failure between the
//! rekap insert and the open delete leaves the previous state untouched.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::error::StoreError;
use super::store::{EvidenceKind, EvidenceSink, SessionStore, ShiftCalendar};
use crate::model::session::{
    ClosedSession, NewOpenSession, OpenSession, RecapFilter, RecapPage, SessionClosing,
};
use crate::model::shift::ShiftDefinition;

#[derive(Default)]
pub struct MemoryShiftCalendar {
    assignments: Mutex<HashMap<(u64, NaiveDate), String>>,
    definitions: Mutex<HashMap<String, ShiftDefinition>>,
}

impl MemoryShiftCalendar {
    pub fn define(&self, shift: ShiftDefinition) {
        self.definitions
            .lock()
            .expect("calendar poisoned")
            .insert(shift.code.clone(), shift);
    }

    pub fn assign(&self, employee_id: u64, date: NaiveDate, code: &str) {
        self.assignments
            .lock()
            .expect("calendar poisoned")
            .insert((employee_id, date), code.to_string());
    }
}

#[async_trait]
impl ShiftCalendar for MemoryShiftCalendar {
    async fn shift_assignment(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<String>, StoreError> {
        Ok(self
            .assignments
            .lock()
            .expect("calendar poisoned")
            .get(&(employee_id, date))
            .cloned())
    }

    async fn shift_definition(&self, code: &str) -> Result<Option<ShiftDefinition>, StoreError> {
        Ok(self
            .definitions
            .lock()
            .expect("calendar poisoned")
            .get(code)
            .cloned())
    }
}

/// Where `MemorySessionStore::close` should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    /// After the rekap row is staged, before the open row is removed.
    AfterClosedInsert,
    /// Before anything is touched.
    Unavailable,
}

#[derive(Default)]
struct State {
    next_open_id: u64,
    next_closed_id: u64,
    open: Vec<OpenSession>,
    closed: Vec<ClosedSession>,
}

#[derive(Default)]
pub struct MemorySessionStore {
    state: Mutex<State>,
    fail_point: Mutex<Option<FailPoint>>,
    close_latency: Mutex<Option<Duration>>,
    /// Skips the single-open-session check, to model legacy data.
    allow_duplicates: bool,
}

impl MemorySessionStore {
    pub fn allowing_duplicates() -> Self {
        Self {
            allow_duplicates: true,
            ..Default::default()
        }
    }

    pub fn fail_next_close(&self, point: FailPoint) {
        *self.fail_point.lock().expect("store poisoned") = Some(point);
    }

    pub fn set_close_latency(&self, latency: Duration) {
        *self.close_latency.lock().expect("store poisoned") = Some(latency);
    }

    pub fn open_sessions(&self) -> Vec<OpenSession> {
        self.state.lock().expect("store poisoned").open.clone()
    }

    pub fn closed_sessions(&self) -> Vec<ClosedSession> {
        self.state.lock().expect("store poisoned").closed.clone()
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert_open(&self, session: NewOpenSession) -> Result<OpenSession, StoreError> {
        let mut state = self.lock_state()?;
        if !self.allow_duplicates
            && state.open.iter().any(|o| o.employee_id == session.employee_id)
        {
            return Err(StoreError::DuplicateOpenSession);
        }

        state.next_open_id += 1;
        let open = session.into_open(state.next_open_id);
        state.open.push(open.clone());
        Ok(open)
    }

    async fn latest_open(&self, employee_id: u64) -> Result<Option<OpenSession>, StoreError> {
        let state = self.lock_state()?;
        Ok(state
            .open
            .iter()
            .filter(|o| o.employee_id == employee_id && o.departure.is_none())
            .max_by_key(|o| (o.arrival, o.id))
            .cloned())
    }

    async fn list_open(&self) -> Result<Vec<OpenSession>, StoreError> {
        let state = self.lock_state()?;
        let mut open: Vec<_> = state
            .open
            .iter()
            .filter(|o| o.departure.is_none())
            .cloned()
            .collect();
        open.sort_by_key(|o| o.arrival);
        Ok(open)
    }

    async fn close(
        &self,
        open: &OpenSession,
        closing: SessionClosing,
    ) -> Result<ClosedSession, StoreError> {
        let latency = *self.close_latency.lock().expect("store poisoned");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let fail_point = self.fail_point.lock().expect("store poisoned").take();
        if fail_point == Some(FailPoint::Unavailable) {
            return Err(StoreError::Unavailable("injected outage".into()));
        }

        let mut state = self.lock_state()?;
        if !state.open.iter().any(|o| o.id == open.id) {
            return Err(StoreError::Vanished(open.id));
        }

        let mut closed = state.closed.clone();
        let closed_id = state.next_closed_id + 1;
        let session = ClosedSession::from_open(closed_id, open, closing);
        closed.push(session.clone());

        if fail_point == Some(FailPoint::AfterClosedInsert) {
            return Err(StoreError::Transaction("injected failure before open delete".into()));
        }

        let mut remaining = state.open.clone();
        remaining.retain(|o| o.id != open.id);

        state.closed = closed;
        state.open = remaining;
        state.next_closed_id = closed_id;
        Ok(session)
    }

    async fn list_closed(&self, filter: &RecapFilter) -> Result<RecapPage, StoreError> {
        let state = self.lock_state()?;
        let mut matching: Vec<_> = state
            .closed
            .iter()
            .filter(|c| recap_matches(filter, c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.arrival, b.id).cmp(&(a.arrival, a.id)));

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .collect();

        Ok(RecapPage {
            data,
            page: filter.page(),
            per_page: filter.per_page(),
            total,
        })
    }
}

fn recap_matches(filter: &RecapFilter, closed: &ClosedSession) -> bool {
    filter.employee_id.is_none_or(|id| id == closed.employee_id)
        && filter.from.is_none_or(|from| closed.shift_date >= from)
        && filter.to.is_none_or(|to| closed.shift_date <= to)
}

#[derive(Default)]
pub struct MemoryEvidenceSink {
    records: Mutex<Vec<(u64, u64, EvidenceKind, String)>>,
    failing: Mutex<Option<EvidenceKind>>,
}

impl MemoryEvidenceSink {
    pub fn fail_on(&self, kind: EvidenceKind) {
        *self.failing.lock().expect("sink poisoned") = Some(kind);
    }

    pub fn records(&self) -> Vec<(u64, u64, EvidenceKind, String)> {
        self.records.lock().expect("sink poisoned").clone()
    }
}

#[async_trait]
impl EvidenceSink for MemoryEvidenceSink {
    async fn record(
        &self,
        employee_id: u64,
        session_id: u64,
        kind: EvidenceKind,
        reference: &str,
    ) -> Result<(), StoreError> {
        if *self.failing.lock().expect("sink poisoned") == Some(kind) {
            return Err(StoreError::Unavailable(format!("{kind} storage offline")));
        }
        self.records.lock().expect("sink poisoned").push((
            employee_id,
            session_id,
            kind,
            reference.to_string(),
        ));
        Ok(())
    }
}
