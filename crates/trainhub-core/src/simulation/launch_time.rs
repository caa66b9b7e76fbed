//! Launch instant normalization

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use trainhub_common::Error;
use trainhub_storage::models::LaunchStatus;

/// Errors while turning a wall-clock launch time into an instant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchTimeError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("{date} {time} does not exist in {timezone}")]
    NonexistentLocalTime {
        date: NaiveDate,
        time: NaiveTime,
        timezone: String,
    },

    #[error("Launch status {0} cannot be requested")]
    NotALaunchIntent(LaunchStatus),
}

impl From<LaunchTimeError> for Error {
    fn from(e: LaunchTimeError) -> Self {
        Error::Validation(e.to_string())
    }
}

/// Instant at which a simulation becomes due.
///
/// "Deliver Immediately" is due at `now`; "Schedule Later" is due at the
/// wall-clock date and time in the given IANA timezone.
pub fn resolve_launch_at(
    intent: LaunchStatus,
    date: NaiveDate,
    time: NaiveTime,
    timezone: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, LaunchTimeError> {
    let tz = parse_timezone(timezone)?;

    match intent {
        LaunchStatus::DeliverImmediately => Ok(now),
        LaunchStatus::ScheduleLater => local_instant(tz, date, time),
        other => Err(LaunchTimeError::NotALaunchIntent(other)),
    }
}

fn parse_timezone(timezone: &str) -> Result<Tz, LaunchTimeError> {
    timezone
        .parse::<Tz>()
        .map_err(|_| LaunchTimeError::UnknownTimezone(timezone.to_string()))
}

/// Local times skipped by a DST transition are rejected; repeated local
/// times resolve to the earlier instant.
fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>, LaunchTimeError> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(LaunchTimeError::NonexistentLocalTime {
            date,
            time,
            timezone: tz.name().to_string(),
        }),
    }
}
