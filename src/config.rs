use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

use crate::attendance::lateness::LatenessPolicy;
use crate::attendance::lifecycle::AttendancePolicy;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,
    pub log_dir: String,
    pub run_migrations: bool,

    // Rate limiting
    pub rate_attendance_per_min: u32,
    pub rate_protected_per_min: u32,

    pub attendance: AttendanceSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttendanceSettings {
    pub late_on_time_max_minutes: i64,
    pub late_grace_max_minutes: i64,
    pub late_i_max_minutes: i64,
    pub auto_checkout_grace_minutes: i64,
    pub transition_timeout_ms: u64,
    /// Hospital local time relative to UTC; shift times are local clock times.
    pub utc_offset_minutes: i32,
    pub employee_lock_idle_secs: u64,
}

impl AttendanceSettings {
    pub fn policy(&self) -> AttendancePolicy {
        AttendancePolicy {
            lateness: LatenessPolicy {
                on_time_max: self.late_on_time_max_minutes,
                grace_max: self.late_grace_max_minutes,
                late_one_max: self.late_i_max_minutes,
            },
            auto_checkout_grace: chrono::Duration::minutes(self.auto_checkout_grace_minutes),
            transition_timeout: StdDuration::from_millis(self.transition_timeout_ms),
        }
    }

    pub fn employee_lock_idle(&self) -> StdDuration {
        StdDuration::from_secs(self.employee_lock_idle_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let attendance = AttendanceSettings {
            late_on_time_max_minutes: parse_or(&lookup, "LATE_ON_TIME_MAX_MINUTES", 5)?,
            late_grace_max_minutes: parse_or(&lookup, "LATE_GRACE_MAX_MINUTES", 15)?,
            late_i_max_minutes: parse_or(&lookup, "LATE_I_MAX_MINUTES", 30)?,
            auto_checkout_grace_minutes: parse_or(&lookup, "AUTO_CHECKOUT_GRACE_MINUTES", 120)?,
            transition_timeout_ms: parse_or(&lookup, "TRANSITION_TIMEOUT_MS", 3000)?,
            utc_offset_minutes: parse_or(&lookup, "ATTENDANCE_UTC_OFFSET_MINUTES", 420)?, // WIB
            employee_lock_idle_secs: parse_or(&lookup, "EMPLOYEE_LOCK_IDLE_SECS", 600)?,
        };

        if !(attendance.late_on_time_max_minutes <= attendance.late_grace_max_minutes
            && attendance.late_grace_max_minutes <= attendance.late_i_max_minutes)
        {
            return Err(anyhow!(
                "lateness thresholds must be ascending: LATE_ON_TIME_MAX_MINUTES <= \
                 LATE_GRACE_MAX_MINUTES <= LATE_I_MAX_MINUTES"
            ));
        }

        if attendance.employee_lock_idle_secs.saturating_mul(1000) <= attendance.transition_timeout_ms {
            return Err(anyhow!(
                "EMPLOYEE_LOCK_IDLE_SECS must exceed TRANSITION_TIMEOUT_MS so a held lock never expires"
            ));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,

            rate_attendance_per_min: parse_or(&lookup, "RATE_ATTENDANCE_PER_MIN", 120)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            attendance,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
