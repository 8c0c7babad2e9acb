use chrono::{Local, NaiveDateTime, TimeDelta};

/// Converts a naive local log timestamp into Unix seconds.
///
/// The local/UTC offset is taken at call time, not at `timestamp`, so results
/// drift by the DST shift for timestamps recorded on the other side of a
/// transition.
pub fn log_time_to_unix_seconds(timestamp: NaiveDateTime) -> i64 {
    log_time_to_unix_seconds_with_offset(timestamp, current_utc_offset_seconds())
}

pub fn current_utc_offset_seconds() -> i32 {
    Local::now().offset().local_minus_utc()
}

pub fn log_time_to_unix_seconds_with_offset(timestamp: NaiveDateTime, offset_seconds: i32) -> i64 {
    let utc_timestamp = timestamp - TimeDelta::seconds(i64::from(offset_seconds));
    utc_timestamp.and_utc().timestamp()
}
