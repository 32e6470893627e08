use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, error};

use super::error::{StoreError, violates_unique_key};
use super::lateness::LatenessStatus;
use super::store::{EvidenceKind, EvidenceSink, SessionStore, ShiftCalendar};
use crate::model::session::{
    CheckoutRemark, ClosedSession, NewOpenSession, OpenSession, RecapFilter, RecapPage,
    SessionClosing,
};
use crate::model::shift::{ShiftAssignment, ShiftDefinition};

const OPEN_COLUMNS: &str = "id, employee_id, shift_code, shift_date, arrival, departure, \
                            status, lateness_minutes, photo_ref";

const CLOSED_COLUMNS: &str = "id, open_id, employee_id, shift_code, shift_date, arrival, \
                              departure, duration_seconds, duration, status, lateness_minutes, \
                              photo_ref, remark";

#[derive(FromRow)]
struct OpenRow {
    id: u64,
    employee_id: u64,
    shift_code: String,
    shift_date: NaiveDate,
    arrival: NaiveDateTime,
    departure: Option<NaiveDateTime>,
    status: String,
    lateness_minutes: i64,
    photo_ref: Option<String>,
}

impl TryFrom<OpenRow> for OpenSession {
    type Error = StoreError;

    fn try_from(row: OpenRow) -> Result<Self, Self::Error> {
        Ok(OpenSession {
            id: row.id,
            employee_id: row.employee_id,
            shift_code: row.shift_code,
            shift_date: row.shift_date,
            arrival: row.arrival,
            departure: row.departure,
            status: parse_status(&row.status)?,
            lateness_minutes: row.lateness_minutes,
            photo_ref: row.photo_ref,
        })
    }
}

#[derive(FromRow)]
struct ClosedRow {
    id: u64,
    open_id: u64,
    employee_id: u64,
    shift_code: String,
    shift_date: NaiveDate,
    arrival: NaiveDateTime,
    departure: NaiveDateTime,
    duration_seconds: i64,
    duration: String,
    status: String,
    lateness_minutes: i64,
    photo_ref: Option<String>,
    remark: String,
}

impl TryFrom<ClosedRow> for ClosedSession {
    type Error = StoreError;

    fn try_from(row: ClosedRow) -> Result<Self, Self::Error> {
        Ok(ClosedSession {
            id: row.id,
            open_id: row.open_id,
            employee_id: row.employee_id,
            shift_code: row.shift_code,
            shift_date: row.shift_date,
            arrival: row.arrival,
            departure: row.departure,
            duration_seconds: row.duration_seconds,
            duration: row.duration,
            status: parse_status(&row.status)?,
            lateness_minutes: row.lateness_minutes,
            photo_ref: row.photo_ref,
            remark: CheckoutRemark::from_str(&row.remark)
                .map_err(|_| StoreError::Transaction(format!("unknown remark '{}'", row.remark)))?,
        })
    }
}

fn parse_status(value: &str) -> Result<LatenessStatus, StoreError> {
    LatenessStatus::from_str(value)
        .map_err(|_| StoreError::Transaction(format!("unknown lateness status '{value}'")))
}

/// Scheduling tables, read only.
pub struct MySqlShiftCalendar {
    pool: MySqlPool,
}

impl MySqlShiftCalendar {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShiftCalendar for MySqlShiftCalendar {
    async fn shift_assignment(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<String>, StoreError> {
        let assignment = sqlx::query_as::<_, ShiftAssignment>(
            r#"
            SELECT employee_id, date, shift_code
            FROM shift_schedule
            WHERE employee_id = ? AND date = ?
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(assignment.map(|a| a.shift_code))
    }

    async fn shift_definition(&self, code: &str) -> Result<Option<ShiftDefinition>, StoreError> {
        let def = sqlx::query_as::<_, ShiftDefinition>(
            r#"
            SELECT code, start_time, end_time
            FROM shift_definitions
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(def)
    }
}

/// `presensi_open` / `presensi_rekap` tables.
pub struct MySqlSessionStore {
    pool: MySqlPool,
}

impl MySqlSessionStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for MySqlSessionStore {
    async fn insert_open(&self, session: NewOpenSession) -> Result<OpenSession, StoreError> {
        // UNIQUE(employee_id) rejects a concurrent second check-in.
        let result = sqlx::query(
            r#"
            INSERT INTO presensi_open
                (employee_id, shift_code, shift_date, arrival, status, lateness_minutes, photo_ref)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.employee_id)
        .bind(&session.shift_code)
        .bind(session.shift_date)
        .bind(session.arrival)
        .bind(session.status.as_ref())
        .bind(session.lateness_minutes)
        .bind(&session.photo_ref)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violates_unique_key(&e, "uq_presensi_open_employee") {
                StoreError::DuplicateOpenSession
            } else {
                StoreError::from(e)
            }
        })?;

        Ok(session.into_open(result.last_insert_id()))
    }

    async fn latest_open(&self, employee_id: u64) -> Result<Option<OpenSession>, StoreError> {
        let sql = format!(
            "SELECT {OPEN_COLUMNS} FROM presensi_open \
             WHERE employee_id = ? AND departure IS NULL \
             ORDER BY arrival DESC, id DESC LIMIT 1"
        );

        sqlx::query_as::<_, OpenRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?
            .map(OpenSession::try_from)
            .transpose()
    }

    async fn list_open(&self) -> Result<Vec<OpenSession>, StoreError> {
        let sql = format!(
            "SELECT {OPEN_COLUMNS} FROM presensi_open \
             WHERE departure IS NULL ORDER BY arrival ASC"
        );

        sqlx::query_as::<_, OpenRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(OpenSession::try_from)
            .collect()
    }

    async fn close(
        &self,
        open: &OpenSession,
        closing: SessionClosing,
    ) -> Result<ClosedSession, StoreError> {
        // Every early return drops `tx`, which rolls back.
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, u64>(
            "SELECT id FROM presensi_open WHERE id = ? FOR UPDATE",
        )
        .bind(open.id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            debug!(session_id = open.id, "Open session vanished before close");
            return Err(StoreError::Vanished(open.id));
        }

        sqlx::query("UPDATE presensi_open SET departure = ? WHERE id = ?")
            .bind(closing.departure)
            .bind(open.id)
            .execute(&mut *tx)
            .await?;

        let draft = ClosedSession::from_open(0, open, closing);

        let inserted = sqlx::query(
            r#"
            INSERT INTO presensi_rekap
                (open_id, employee_id, shift_code, shift_date, arrival, departure,
                 duration_seconds, duration, status, lateness_minutes, photo_ref, remark)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.open_id)
        .bind(draft.employee_id)
        .bind(&draft.shift_code)
        .bind(draft.shift_date)
        .bind(draft.arrival)
        .bind(draft.departure)
        .bind(draft.duration_seconds)
        .bind(&draft.duration)
        .bind(draft.status.as_ref())
        .bind(draft.lateness_minutes)
        .bind(&draft.photo_ref)
        .bind(draft.remark.as_ref())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, session_id = open.id, "Rekap insert failed");
            // UNIQUE(open_id) collision is a double close, not a second check-in.
            if violates_unique_key(&e, "uq_presensi_rekap_open") {
                StoreError::Vanished(open.id)
            } else {
                StoreError::from(e)
            }
        })?;

        let deleted = sqlx::query("DELETE FROM presensi_open WHERE id = ?")
            .bind(open.id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() != 1 {
            return Err(StoreError::Transaction(format!(
                "expected to delete open session {}, deleted {}",
                open.id,
                deleted.rows_affected()
            )));
        }

        tx.commit().await?;

        Ok(ClosedSession {
            id: inserted.last_insert_id(),
            ..draft
        })
    }

    async fn list_closed(&self, filter: &RecapFilter) -> Result<RecapPage, StoreError> {
        let mut where_sql = String::from(" WHERE 1=1");
        if filter.employee_id.is_some() {
            where_sql.push_str(" AND employee_id = ?");
        }
        if filter.from.is_some() {
            where_sql.push_str(" AND shift_date >= ?");
        }
        if filter.to.is_some() {
            where_sql.push_str(" AND shift_date <= ?");
        }

        let count_sql = format!("SELECT COUNT(*) FROM presensi_rekap{where_sql}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(id) = filter.employee_id {
            count_q = count_q.bind(id);
        }
        if let Some(from) = filter.from {
            count_q = count_q.bind(from);
        }
        if let Some(to) = filter.to {
            count_q = count_q.bind(to);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let data_sql = format!(
            "SELECT {CLOSED_COLUMNS} FROM presensi_rekap{where_sql} \
             ORDER BY arrival DESC, id DESC LIMIT ? OFFSET ?"
        );
        let mut data_q = sqlx::query_as::<_, ClosedRow>(&data_sql);
        if let Some(id) = filter.employee_id {
            data_q = data_q.bind(id);
        }
        if let Some(from) = filter.from {
            data_q = data_q.bind(from);
        }
        if let Some(to) = filter.to {
            data_q = data_q.bind(to);
        }

        let data = data_q
            .bind(filter.per_page())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(ClosedSession::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RecapPage {
            data,
            page: filter.page(),
            per_page: filter.per_page(),
            total,
        })
    }
}

/// `presensi_evidence` table.
pub struct MySqlEvidenceSink {
    pool: MySqlPool,
}

impl MySqlEvidenceSink {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceSink for MySqlEvidenceSink {
    async fn record(
        &self,
        employee_id: u64,
        session_id: u64,
        kind: EvidenceKind,
        reference: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO presensi_evidence (employee_id, open_session_id, kind, reference)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(session_id)
        .bind(kind.as_ref())
        .bind(reference)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// These run against a real server when `DATABASE_URL` is set and are skipped otherwise.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use chrono::Utc;

    async fn pool() -> Option<MySqlPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        Some(init_db(&url, true).await.unwrap())
    }

    fn employee_id() -> u64 {
        900_000_000 + u64::from(Utc::now().timestamp_subsec_nanos() % 100_000_000)
    }

    fn new_open(employee_id: u64) -> NewOpenSession {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        NewOpenSession {
            employee_id,
            shift_code: "P".into(),
            shift_date: day,
            arrival: day.and_hms_opt(8, 3, 0).unwrap(),
            status: LatenessStatus::OnTime,
            lateness_minutes: 0,
            photo_ref: Some("uploads/in.jpg".into()),
        }
    }

    fn closing() -> SessionClosing {
        SessionClosing {
            departure: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(16, 3, 0)
                .unwrap(),
            remark: CheckoutRemark::Manual,
        }
    }

    async fn cleanup(pool: &MySqlPool, employee_id: u64) {
        for table in ["presensi_open", "presensi_rekap"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE employee_id = ?"))
                .bind(employee_id)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    async fn rekap_count(pool: &MySqlPool, employee_id: u64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM presensi_rekap WHERE employee_id = ?")
            .bind(employee_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn close_moves_the_row_in_one_transaction() {
        let Some(pool) = pool().await else { return };
        let store = MySqlSessionStore::new(pool.clone());
        let employee = employee_id();

        let open = store.insert_open(new_open(employee)).await.unwrap();
        let second = store.insert_open(new_open(employee)).await.unwrap_err();
        assert!(matches!(second, StoreError::DuplicateOpenSession));

        let closed = store.close(&open, closing()).await.unwrap();
        assert_eq!(closed.open_id, open.id);
        assert_eq!(closed.duration, "08:00:00");
        assert!(store.latest_open(employee).await.unwrap().is_none());
        assert_eq!(rekap_count(&pool, employee).await, 1);

        let again = store.close(&open, closing()).await.unwrap_err();
        assert!(matches!(again, StoreError::Vanished(id) if id == open.id));
        assert_eq!(rekap_count(&pool, employee).await, 1);

        cleanup(&pool, employee).await;
    }

    #[tokio::test]
    async fn failed_rekap_insert_rolls_back_the_departure() {
        let Some(pool) = pool().await else { return };
        let store = MySqlSessionStore::new(pool.clone());
        let employee = employee_id();

        let open = store.insert_open(new_open(employee)).await.unwrap();

        // A rekap row already claiming this open id makes the insert collide mid-transaction.
        sqlx::query(
            r#"
            INSERT INTO presensi_rekap
                (open_id, employee_id, shift_code, shift_date, arrival, departure,
                 duration_seconds, duration, status, lateness_minutes, remark)
            VALUES (?, ?, 'P', '2024-03-01', '2024-03-01 08:03:00', '2024-03-01 09:00:00',
                    3420, '00:57:00', 'On Time', 0, 'manual')
            "#,
        )
        .bind(open.id)
        .bind(employee)
        .execute(&pool)
        .await
        .unwrap();

        let err = store.close(&open, closing()).await.unwrap_err();
        assert!(matches!(err, StoreError::Vanished(id) if id == open.id));

        let still_open = store.latest_open(employee).await.unwrap().unwrap();
        assert_eq!(still_open.id, open.id);
        assert_eq!(still_open.departure, None);
        assert_eq!(rekap_count(&pool, employee).await, 1);

        cleanup(&pool, employee).await;
    }
}
