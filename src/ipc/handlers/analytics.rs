use crate::db::SqliteRepository;
use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::helpers::{db_conn, load_policy, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::conflicts::ConflictSummary;
use crate::timetable::load::LoadFilter;
use crate::timetable::service::TimetableService;
use crate::timetable::GradeKey;
use serde_json::{json, Value};

fn handle_conflicts(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.conflicts(&school_id) {
        Ok(conflicts) => {
            let summary = ConflictSummary::of(&conflicts);
            ok(&req.id, json!({ "conflicts": conflicts, "summary": summary }))
        }
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_teacher_load(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match req.params.get("grade") {
        None | Some(Value::Null) => None,
        Some(v) => match GradeKey::from_json(v) {
            Some(g) => Some(g),
            None => return err(&req.id, "bad_params", "grade must be a number or a label", None),
        },
    };
    let filter = LoadFilter {
        grade,
        subject: optional_str(req, "subject"),
    };
    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.teacher_load(&school_id, &filter) {
        Ok(report) => ok(&req.id, json!(report)),
        Err(e) => timetable_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "analytics.conflicts" => Some(handle_conflicts(state, req)),
        "analytics.teacherLoad" => Some(handle_teacher_load(state, req)),
        _ => None,
    }
}
