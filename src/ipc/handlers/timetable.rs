use crate::db::SqliteRepository;
use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::helpers::{db_conn, load_policy, optional_str, required_period, required_str, required_weekday};
use crate::ipc::types::{AppState, Request};
use crate::timetable::autofill::{FillMode, SubjectRequirement, MAX_WEEKLY_PERIODS};
use crate::timetable::service::TimetableService;
use crate::timetable::{is_valid_period, is_valid_weekday, Assignment, Weekday};
use serde_json::{json, Value};

fn parse_requirement(v: &Value) -> Result<SubjectRequirement, String> {
    let subject = v
        .get("subject")
        .and_then(|x| x.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| "requirement subject is required".to_string())?;
    if let Some(n) = v.get("periodsPerWeek") {
        let periods_per_week = n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n <= MAX_WEEKLY_PERIODS)
            .ok_or_else(|| format!("periodsPerWeek must be an integer in 0..={MAX_WEEKLY_PERIODS}"))?;
        return Ok(SubjectRequirement::Weekly {
            subject,
            periods_per_week,
        });
    }
    let weekday = v
        .get("weekday")
        .and_then(|x| x.as_i64())
        .filter(|n| is_valid_weekday(*n))
        .ok_or_else(|| "requirement needs weekday 1..7 or periodsPerWeek".to_string())?;
    let period = v
        .get("periodNumber")
        .and_then(|x| x.as_i64())
        .filter(|n| is_valid_period(*n))
        .ok_or_else(|| "requirement periodNumber must be >= 1".to_string())?;
    Ok(SubjectRequirement::At {
        subject,
        weekday: weekday as Weekday,
        period: period as u8,
    })
}

fn parse_assignment(v: &Value, section_id: &str) -> Result<Assignment, String> {
    let weekday = v
        .get("weekday")
        .and_then(|x| x.as_i64())
        .filter(|n| is_valid_weekday(*n))
        .ok_or("assignment weekday must be 1..7")?;
    let period = v
        .get("periodNumber")
        .and_then(|x| x.as_i64())
        .filter(|n| is_valid_period(*n))
        .ok_or("assignment periodNumber must be >= 1")?;
    let subject = v
        .get("subject")
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string();
    let mut a = Assignment::new(section_id, weekday as Weekday, period as u8, subject);
    a.teacher_id = v
        .get("teacherId")
        .and_then(|x| x.as_str())
        .map(|s| s.to_string());
    Ok(a)
}

fn handle_timetable_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.grid_view(&section_id) {
        Ok(view) => ok(&req.id, json!(view)),
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_timetable_set_cell(state: &mut AppState, req: &Request, clear: bool) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weekday = match required_weekday(req, "weekday") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let period = match required_period(req, "periodNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = if clear {
        String::new()
    } else {
        optional_str(req, "subject").unwrap_or_default()
    };
    let teacher_id = optional_str(req, "teacherId");

    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.set_cell(&section_id, weekday, period, &subject, teacher_id) {
        Ok(cell) => ok(&req.id, json!({ "assignment": cell })),
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_timetable_save(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("assignments").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "assignments must be an array", None);
    };
    let rows = match raw
        .iter()
        .map(|v| parse_assignment(v, &section_id))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.save_all(&section_id, rows) {
        Ok(saved) => ok(&req.id, json!({ "saved": saved })),
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_timetable_auto_fill(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mode = match req.params.get("mode").and_then(|v| v.as_str()) {
        None => FillMode::FillEmpty,
        Some(raw) => match FillMode::parse(raw) {
            Some(m) => m,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "mode must be one of: fillEmpty, replaceAll",
                    None,
                )
            }
        },
    };
    let Some(raw) = req.params.get("requirements").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "requirements must be an array", None);
    };
    let requirements = match raw
        .iter()
        .map(parse_requirement)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.auto_fill(&section_id, &requirements, mode) {
        Ok(outcome) => ok(&req.id, json!(outcome)),
        Err(e) => timetable_err(&req.id, &e),
    }
}

fn handle_timetable_copy(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let from = match required_str(req, "fromSectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let to = match required_str(req, "toSectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let copy_teachers = req
        .params
        .get("copyTeachers")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let repo = SqliteRepository::new(conn);
    let svc = TimetableService::new(&repo, load_policy(conn));
    match svc.copy(&from, &to, copy_teachers) {
        Ok(result) => ok(&req.id, json!(result)),
        Err(e) => timetable_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "timetable.get" => Some(handle_timetable_get(state, req)),
        "timetable.setCell" => Some(handle_timetable_set_cell(state, req, false)),
        "timetable.clearCell" => Some(handle_timetable_set_cell(state, req, true)),
        "timetable.save" => Some(handle_timetable_save(state, req)),
        "timetable.autoFill" => Some(handle_timetable_auto_fill(state, req)),
        "timetable.copy" => Some(handle_timetable_copy(state, req)),
        _ => None,
    }
}
