use rusqlite::Connection;
use serde_json::{Map, Value};

use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::timetable::policy::{StandardDaySpec, TimetablePolicy};
use crate::timetable::{is_valid_period, is_valid_weekday, PeriodNumber, Weekday};

pub const SETUP_TIMETABLE_KEY: &str = "setup.timetable";
pub const SETUP_TIMING_KEY: &str = "setup.timing";

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_weekday(req: &Request, key: &str) -> Result<Weekday, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|n| is_valid_weekday(*n))
        .map(|n| n as Weekday)
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be 1..7", key), None))
}

pub fn required_period(req: &Request, key: &str) -> Result<PeriodNumber, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .filter(|n| is_valid_period(*n))
        .map(|n| n as PeriodNumber)
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a period number >= 1", key), None))
}

fn saved_object(conn: &Connection, key: &str) -> Map<String, Value> {
    db::settings_get_json(conn, key)
        .ok()
        .flatten()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
}

/// Stored rules; anything missing or unreadable falls back to defaults.
pub fn load_policy(conn: &Connection) -> TimetablePolicy {
    TimetablePolicy::from_settings(&saved_object(conn, SETUP_TIMETABLE_KEY))
}

pub fn load_standard_day(conn: &Connection) -> StandardDaySpec {
    StandardDaySpec::from_settings(&saved_object(conn, SETUP_TIMING_KEY))
}
