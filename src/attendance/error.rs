use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use thiserror::Error;

/// Failures raised by the storage contracts.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Single-open-session constraint rejected the write.
    #[error("employee already has an open session")]
    DuplicateOpenSession,

    /// The open row disappeared before it could be closed.
    #[error("open session {0} no longer exists")]
    Vanished(u64),

    #[error("transaction failed: {0}")]
    Transaction(String),
}

/// MySQL reports every integrity failure as SQLSTATE 23000, so a duplicate is only
/// recognised by its error kind together with the key named in the message.
pub(crate) fn violates_unique_key(e: &sqlx::Error, key: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation() && db_err.message().contains(key),
        _ => false,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Transaction(e.to_string()),
        }
    }
}

/// Everything the session lifecycle can report back to a caller.
#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("No shift is scheduled for employee {employee_id} on {date}")]
    NoScheduledShift { employee_id: u64, date: NaiveDate },

    #[error("Shift code '{0}' is not configured")]
    UnknownShiftCode(String),

    #[error("You already have an open attendance session; check out first")]
    DuplicateOpenSession { employee_id: u64, arrival: Option<NaiveDateTime> },

    #[error("You have no open attendance session to check out")]
    NoOpenSession { employee_id: u64 },

    #[error("Your shift has not ended yet: {until_eligible} until auto-checkout is allowed")]
    NotOverdue {
        until_eligible: String,
        remaining: String,
        expected_end: NaiveDateTime,
        eligible_at: NaiveDateTime,
    },

    #[error("Invalid departure time: {0}")]
    InvalidDeparture(String),

    #[error("The attendance system is temporarily unavailable, please retry")]
    StorageUnavailable(String),

    #[error("The attendance record could not be saved, please retry")]
    TransactionFailed(String),

    #[error("The attendance system took too long to respond ({0} ms), please retry")]
    StorageTimeout(u64),
}

impl AttendanceError {
    /// Stable machine-readable kind for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AttendanceError::NoScheduledShift { .. } => "no_scheduled_shift",
            AttendanceError::UnknownShiftCode(_) => "unknown_shift_code",
            AttendanceError::DuplicateOpenSession { .. } => "duplicate_open_session",
            AttendanceError::NoOpenSession { .. } => "no_open_session",
            AttendanceError::NotOverdue { .. } => "not_overdue",
            AttendanceError::InvalidDeparture(_) => "invalid_departure",
            AttendanceError::StorageUnavailable(_) => "storage_unavailable",
            AttendanceError::TransactionFailed(_) => "transaction_failed",
            AttendanceError::StorageTimeout(_) => "storage_timeout",
        }
    }

    pub(crate) fn from_store(e: StoreError, employee_id: u64) -> Self {
        match e {
            StoreError::Unavailable(msg) => AttendanceError::StorageUnavailable(msg),
            StoreError::DuplicateOpenSession => AttendanceError::DuplicateOpenSession {
                employee_id,
                arrival: None,
            },
            StoreError::Vanished(_) => AttendanceError::NoOpenSession { employee_id },
            StoreError::Transaction(msg) => AttendanceError::TransactionFailed(msg),
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::NoScheduledShift { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::UnknownShiftCode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::DuplicateOpenSession { .. } => StatusCode::CONFLICT,
            AttendanceError::NoOpenSession { .. } => StatusCode::BAD_REQUEST,
            AttendanceError::NotOverdue { .. } => StatusCode::CONFLICT,
            AttendanceError::InvalidDeparture(_) => StatusCode::BAD_REQUEST,
            AttendanceError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AttendanceError::StorageTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        match self {
            AttendanceError::NotOverdue {
                until_eligible,
                remaining,
                expected_end,
                eligible_at,
            } => {
                body["until_eligible"] = json!(until_eligible);
                body["remaining"] = json!(remaining);
                body["expected_end"] = json!(expected_end);
                body["eligible_at"] = json!(eligible_at);
            }
            AttendanceError::DuplicateOpenSession {
                arrival: Some(arrival),
                ..
            } => {
                body["open_since"] = json!(arrival);
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::collections::HashSet;

    #[derive(Debug)]
    struct FakeDbError {
        message: &'static str,
        kind: ErrorKind,
    }

    impl std::fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.message)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some("23000".into())
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                ErrorKind::NotNullViolation => ErrorKind::NotNullViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    fn integrity_error(message: &'static str, kind: ErrorKind) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError { message, kind }))
    }

    #[test]
    fn only_the_named_unique_key_counts_as_duplicate() {
        let open_dup = integrity_error(
            "Duplicate entry '1001' for key 'presensi_open.uq_presensi_open_employee'",
            ErrorKind::UniqueViolation,
        );
        assert!(violates_unique_key(&open_dup, "uq_presensi_open_employee"));
        assert!(!violates_unique_key(&open_dup, "uq_presensi_rekap_open"));

        let not_null = integrity_error(
            "Column 'reference' cannot be null",
            ErrorKind::NotNullViolation,
        );
        assert!(!violates_unique_key(&not_null, "uq_presensi_open_employee"));
    }

    #[test]
    fn integrity_errors_do_not_become_duplicate_sessions() {
        let err = StoreError::from(integrity_error(
            "Column 'reference' cannot be null",
            ErrorKind::NotNullViolation,
        ));
        assert!(matches!(err, StoreError::Transaction(_)));

        let err = StoreError::from(integrity_error(
            "Duplicate entry '9' for key 'presensi_evidence.PRIMARY'",
            ErrorKind::UniqueViolation,
        ));
        assert!(matches!(err, StoreError::Transaction(_)));
    }

    fn every_kind() -> Vec<AttendanceError> {
        let day = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        vec![
            AttendanceError::NoScheduledShift { employee_id: 1, date: day },
            AttendanceError::UnknownShiftCode("Q".into()),
            AttendanceError::DuplicateOpenSession { employee_id: 1, arrival: None },
            AttendanceError::NoOpenSession { employee_id: 1 },
            AttendanceError::NotOverdue {
                until_eligible: "1h 0m".into(),
                remaining: "1h 0m overdue".into(),
                expected_end: day.and_hms_opt(6, 0, 0).unwrap(),
                eligible_at: day.and_hms_opt(8, 0, 0).unwrap(),
            },
            AttendanceError::InvalidDeparture("before arrival".into()),
            AttendanceError::StorageUnavailable("down".into()),
            AttendanceError::TransactionFailed("deadlock".into()),
            AttendanceError::StorageTimeout(3000),
        ]
    }

    #[test]
    fn every_kind_has_its_own_code_and_message() {
        let errors = every_kind();
        let codes: HashSet<_> = errors.iter().map(|e| e.code()).collect();
        let messages: HashSet<_> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn not_overdue_message_names_time_until_eligible() {
        let err = &every_kind()[4];
        assert!(err.to_string().contains("1h 0m until auto-checkout"));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn store_errors_map_to_caller_kinds() {
        assert!(matches!(
            AttendanceError::from_store(StoreError::Vanished(3), 9),
            AttendanceError::NoOpenSession { employee_id: 9 }
        ));
        assert!(matches!(
            AttendanceError::from_store(StoreError::Unavailable("x".into()), 9),
            AttendanceError::StorageUnavailable(_)
        ));
        assert!(matches!(
            AttendanceError::from_store(StoreError::DuplicateOpenSession, 9),
            AttendanceError::DuplicateOpenSession { employee_id: 9, .. }
        ));
    }

    #[test]
    fn pool_timeout_is_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Transaction(_)
        ));
    }
}
