use crate::db::{self, SqliteRepository};
use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::helpers::{db_conn, load_policy, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::catalog::TeacherCatalog;
use crate::timetable::TeacherRecord;
use serde_json::json;

/// `subjects` may be one comma-joined string or a list of them.
fn parse_subjects(v: Option<&serde_json::Value>) -> Result<Vec<String>, String> {
    match v {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::String(s)) => Ok(vec![s.clone()]),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|i| {
                i.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| "subjects entries must be strings".to_string())
            })
            .collect(),
        Some(_) => Err("subjects must be a string or an array of strings".to_string()),
    }
}

fn handle_teachers_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subjects = match parse_subjects(req.params.get("subjects")) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let max_periods_per_week = match req.params.get("maxPeriodsPerWeek") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "maxPeriodsPerWeek must be a non-negative integer",
                    None,
                )
            }
        },
    };

    let record = TeacherRecord {
        id,
        name,
        subjects,
        max_periods_per_week,
    };
    if let Err(e) = db::upsert_teacher(conn, &school_id, &record) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "teacherId": record.id }))
}

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let policy = load_policy(conn);
    match TeacherCatalog::load(&SqliteRepository::new(conn), &school_id, &policy) {
        Ok(catalog) => ok(&req.id, json!({ "teachers": catalog.teachers() })),
        Err(e) => timetable_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.upsert" => Some(handle_teachers_upsert(state, req)),
        "teachers.list" => Some(handle_teachers_list(state, req)),
        _ => None,
    }
}
