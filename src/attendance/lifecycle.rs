use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use super::clock::Clock;
use super::duration::{format_hms, format_remaining};
use super::error::{AttendanceError, AttendanceResult, StoreError};
use super::lateness::LatenessPolicy;
use super::locks::EmployeeLocks;
use super::overdue::{OverdueCheck, detect_overdue};
use super::shift_span::ShiftSpan;
use super::store::{EvidenceKind, EvidenceSink, SessionStore, ShiftCalendar};
use crate::model::session::{
    CheckoutRemark, ClosedSession, NewOpenSession, OpenSession, OpenSessionView, RecapFilter,
    RecapPage, SessionClosing,
};
use crate::model::shift::ShiftDefinition;

/// Tunables for the lifecycle, loaded from configuration.
#[derive(Debug, Clone)]
pub struct AttendancePolicy {
    pub lateness: LatenessPolicy,
    /// How long past the scheduled end a session may stay open before auto-checkout.
    pub auto_checkout_grace: Duration,
    /// Deadline for the open→closed transaction.
    pub transition_timeout: StdDuration,
}

impl Default for AttendancePolicy {
    fn default() -> Self {
        Self {
            lateness: LatenessPolicy::default(),
            auto_checkout_grace: Duration::hours(2),
            transition_timeout: StdDuration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckIn {
    pub employee_id: u64,
    pub arrival: NaiveDateTime,
    pub photo_ref: Option<String>,
    pub geo_ref: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckInOutcome {
    pub session: OpenSession,
    /// Evidence that could not be stored. The session itself was recorded.
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepFailure {
    pub employee_id: u64,
    pub session_id: u64,
    pub error: String,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SweepReport {
    pub closed: Vec<ClosedSession>,
    pub failures: Vec<SweepFailure>,
    /// Open sessions left alone because they are not overdue yet.
    pub still_open: usize,
}

/// Owns every transition of an attendance session. Holds no session state itself:
/// the open and closed stores are the only truth.
pub struct SessionLifecycle {
    calendar: Arc<dyn ShiftCalendar>,
    store: Arc<dyn SessionStore>,
    evidence: Arc<dyn EvidenceSink>,
    clock: Arc<dyn Clock>,
    locks: EmployeeLocks,
    policy: AttendancePolicy,
}

impl SessionLifecycle {
    pub fn new(
        calendar: Arc<dyn ShiftCalendar>,
        store: Arc<dyn SessionStore>,
        evidence: Arc<dyn EvidenceSink>,
        clock: Arc<dyn Clock>,
        locks: EmployeeLocks,
        policy: AttendancePolicy,
    ) -> Self {
        Self {
            calendar,
            store,
            evidence,
            clock,
            locks,
            policy,
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Opens a session for the shift occurrence the arrival belongs to.
    #[instrument(name = "attendance_check_in", skip(self, request), fields(employee_id = request.employee_id))]
    pub async fn check_in(&self, request: CheckIn) -> AttendanceResult<CheckInOutcome> {
        let employee_id = request.employee_id;
        let _guard = self.locks.acquire(employee_id).await;

        if let Some(existing) = self.latest_open(employee_id).await? {
            warn!(
                employee_id,
                session_id = existing.id,
                open_since = %existing.arrival,
                "Duplicate open session detected, refusing check-in"
            );
            return Err(AttendanceError::DuplicateOpenSession {
                employee_id,
                arrival: Some(existing.arrival),
            });
        }

        let (shift_date, shift) = self.shift_for_arrival(employee_id, request.arrival).await?;
        let span = ShiftSpan::resolve(&shift, shift_date);
        let lateness = self.policy.lateness.classify_span(&span, request.arrival);

        debug!(
            shift_code = %shift.code,
            %shift_date,
            status = %lateness.status,
            lateness_minutes = lateness.minutes,
            "Shift occurrence resolved"
        );

        let session = self
            .store
            .insert_open(NewOpenSession {
                employee_id,
                shift_code: shift.code.clone(),
                shift_date,
                arrival: request.arrival,
                status: lateness.status,
                lateness_minutes: lateness.minutes,
                photo_ref: request.photo_ref.clone(),
            })
            .await
            .map_err(|e| {
                if matches!(e, StoreError::DuplicateOpenSession) {
                    warn!(employee_id, "Duplicate open session rejected by storage");
                } else {
                    error!(error = %e, employee_id, "Check-in failed");
                }
                AttendanceError::from_store(e, employee_id)
            })?;

        let mut warnings = Vec::new();
        let evidence = [
            (EvidenceKind::Photo, request.photo_ref.as_deref()),
            (EvidenceKind::Geolocation, request.geo_ref.as_deref()),
        ];
        for (kind, reference) in evidence {
            let Some(reference) = reference else { continue };
            if let Err(e) = self
                .evidence
                .record(employee_id, session.id, kind, reference)
                .await
            {
                error!(error = %e, employee_id, session_id = session.id, %kind, "Evidence not stored");
                warnings.push(format!("{kind} could not be stored: {e}"));
            }
        }

        info!(
            employee_id,
            session_id = session.id,
            status = %session.status,
            "Checked in"
        );

        Ok(CheckInOutcome { session, warnings })
    }

    /// Closes the employee's most recent open session at `departure` (now if absent).
    #[instrument(name = "attendance_checkout", skip(self))]
    pub async fn checkout(
        &self,
        employee_id: u64,
        departure: Option<NaiveDateTime>,
    ) -> AttendanceResult<ClosedSession> {
        let now = self.clock.now();
        let departure = departure.unwrap_or(now);
        let _guard = self.locks.acquire(employee_id).await;

        let open = self
            .latest_open(employee_id)
            .await?
            .ok_or(AttendanceError::NoOpenSession { employee_id })?;

        if departure < open.arrival {
            return Err(AttendanceError::InvalidDeparture(format!(
                "departure {departure} is before arrival {}",
                open.arrival
            )));
        }
        if departure > now {
            return Err(AttendanceError::InvalidDeparture(format!(
                "departure {departure} is in the future"
            )));
        }

        self.close_session(
            &open,
            SessionClosing {
                departure,
                remark: CheckoutRemark::Manual,
            },
        )
        .await
    }

    /// Overdue classification of an open session at `now`.
    pub async fn detect_overdue(
        &self,
        session: &OpenSession,
        now: NaiveDateTime,
    ) -> AttendanceResult<OverdueCheck> {
        let shift = self.definition(&session.shift_code, session.employee_id).await?;
        Ok(detect_overdue(
            &shift,
            session,
            now,
            self.policy.auto_checkout_grace,
        ))
    }

    /// Auto-checkout using the lifecycle's own clock.
    pub async fn auto_checkout_now(&self, employee_id: u64) -> AttendanceResult<ClosedSession> {
        self.auto_checkout(employee_id, self.clock.now()).await
    }

    /// Closes an overdue session at its scheduled end, not at `now`.
    #[instrument(name = "attendance_auto_checkout", skip(self))]
    pub async fn auto_checkout(
        &self,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> AttendanceResult<ClosedSession> {
        let _guard = self.locks.acquire(employee_id).await;

        let open = self
            .latest_open(employee_id)
            .await?
            .ok_or(AttendanceError::NoOpenSession { employee_id })?;

        self.auto_close(&open, now).await
    }

    /// Auto-checks-out every open session that is overdue at `now`.
    #[instrument(name = "attendance_sweep", skip(self))]
    pub async fn sweep_overdue(&self, now: NaiveDateTime) -> AttendanceResult<SweepReport> {
        let open = self
            .store
            .list_open()
            .await
            .map_err(|e| AttendanceError::from_store(e, 0))?;

        let mut report = SweepReport::default();
        for session in open {
            let _guard = self.locks.acquire(session.employee_id).await;
            match self.auto_close(&session, now).await {
                Ok(closed) => report.closed.push(closed),
                Err(AttendanceError::NotOverdue { .. }) => report.still_open += 1,
                // Closed by someone else since the listing.
                Err(AttendanceError::NoOpenSession { .. }) => {}
                Err(e) => report.failures.push(SweepFailure {
                    employee_id: session.employee_id,
                    session_id: session.id,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            closed = report.closed.len(),
            failed = report.failures.len(),
            still_open = report.still_open,
            "Overdue sweep finished"
        );
        Ok(report)
    }

    /// The employee's open session, if any, with shift math resolved against `now`.
    pub async fn unfinished(
        &self,
        employee_id: u64,
        now: NaiveDateTime,
    ) -> AttendanceResult<Option<OpenSessionView>> {
        let Some(session) = self.latest_open(employee_id).await? else {
            return Ok(None);
        };

        let check = self.detect_overdue(&session, now).await?;
        let elapsed = now - session.arrival;

        Ok(Some(OpenSessionView {
            expected_end: check.expected_end,
            auto_checkout_eligible_at: check.eligible_at,
            is_overdue: check.is_overdue,
            remaining_seconds: check.remaining.num_seconds(),
            remaining: format_remaining(check.remaining),
            elapsed_seconds: elapsed.num_seconds().max(0),
            elapsed: format_hms(elapsed),
            session,
        }))
    }

    pub async fn recap(&self, filter: &RecapFilter) -> AttendanceResult<RecapPage> {
        self.store
            .list_closed(filter)
            .await
            .map_err(|e| AttendanceError::from_store(e, filter.employee_id.unwrap_or_default()))
    }

    /// Caller must hold the employee lock.
    async fn auto_close(
        &self,
        open: &OpenSession,
        now: NaiveDateTime,
    ) -> AttendanceResult<ClosedSession> {
        let check = self.detect_overdue(open, now).await?;
        if !check.is_overdue {
            debug!(
                employee_id = open.employee_id,
                session_id = open.id,
                remaining = %check.remaining_label(),
                "Auto-checkout refused, session not overdue"
            );
            return Err(AttendanceError::NotOverdue {
                until_eligible: check.until_eligible_label(now),
                remaining: check.remaining_label(),
                expected_end: check.expected_end,
                eligible_at: check.eligible_at,
            });
        }

        self.close_session(
            open,
            SessionClosing {
                departure: check.expected_end,
                remark: CheckoutRemark::AutoCheckout,
            },
        )
        .await
    }

    /// The single open→closed transition. The store runs it as one transaction; this
    /// bounds how long that transaction may take.
    async fn close_session(
        &self,
        open: &OpenSession,
        closing: SessionClosing,
    ) -> AttendanceResult<ClosedSession> {
        let employee_id = open.employee_id;
        let closed = with_deadline(self.policy.transition_timeout, self.store.close(open, closing))
            .await
            .inspect_err(|e| {
                error!(error = %e, employee_id, session_id = open.id, "Session close failed")
            })?
            .map_err(|e| {
                error!(error = %e, employee_id, session_id = open.id, "Session close failed");
                AttendanceError::from_store(e, employee_id)
            })?;

        info!(
            employee_id,
            session_id = open.id,
            recap_id = closed.id,
            remark = %closed.remark,
            duration = %closed.duration,
            "Session closed"
        );
        Ok(closed)
    }

    async fn latest_open(&self, employee_id: u64) -> AttendanceResult<Option<OpenSession>> {
        self.store.latest_open(employee_id).await.map_err(|e| {
            error!(error = %e, employee_id, "Open session lookup failed");
            AttendanceError::from_store(e, employee_id)
        })
    }

    async fn definition(&self, code: &str, employee_id: u64) -> AttendanceResult<ShiftDefinition> {
        self.calendar
            .shift_definition(code)
            .await
            .map_err(|e| AttendanceError::from_store(e, employee_id))?
            .ok_or_else(|| AttendanceError::UnknownShiftCode(code.to_string()))
    }

    /// Yesterday's overnight shift wins while the arrival is still inside it;
    /// otherwise today's assignment applies.
    async fn shift_for_arrival(
        &self,
        employee_id: u64,
        arrival: NaiveDateTime,
    ) -> AttendanceResult<(NaiveDate, ShiftDefinition)> {
        let today = arrival.date();

        if let Some(yesterday) = today.checked_sub_days(Days::new(1)) {
            if let Some(code) = self.assignment(employee_id, yesterday).await? {
                // An unconfigured code yesterday (day off, retired shift) is not overnight.
                let shift = self
                    .calendar
                    .shift_definition(&code)
                    .await
                    .map_err(|e| AttendanceError::from_store(e, employee_id))?;
                if let Some(shift) = shift {
                    if shift.is_overnight()
                        && ShiftSpan::resolve(&shift, yesterday).contains(arrival)
                    {
                        return Ok((yesterday, shift));
                    }
                }
            }
        }

        let code = self
            .assignment(employee_id, today)
            .await?
            .ok_or(AttendanceError::NoScheduledShift {
                employee_id,
                date: today,
            })?;
        let shift = self.definition(&code, employee_id).await?;
        Ok((today, shift))
    }

    async fn assignment(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> AttendanceResult<Option<String>> {
        self.calendar
            .shift_assignment(employee_id, date)
            .await
            .map_err(|e| AttendanceError::from_store(e, employee_id))
    }
}

async fn with_deadline<T>(
    deadline: StdDuration,
    fut: impl Future<Output = T>,
) -> AttendanceResult<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| AttendanceError::StorageTimeout(deadline.as_millis() as u64))
}
