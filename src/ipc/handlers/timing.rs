use crate::db::{self, SqliteRepository};
use crate::ipc::error::{err, ok, timetable_err};
use crate::ipc::helpers::{db_conn, load_policy, load_standard_day, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::grid::{candidate_keys, normalize_group_key, resolve_grid, standard_day, validate_template_rows};
use crate::timetable::repository::TimetableRepository;
use crate::timetable::{is_valid_period, is_valid_weekday, GradeKey, PeriodSlotTemplate, Weekday};
use log::info;
use serde_json::{json, Value};

const DEFAULT_SCHOOL_WEEK: [Weekday; 5] = [1, 2, 3, 4, 5];

fn required_group(req: &Request) -> Result<String, Value> {
    let raw = required_str(req, "gradeGroup")?;
    normalize_group_key(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "gradeGroup must be a grade, a range like \"6-10\", or \"all\"",
            None,
        )
    })
}

fn parse_template_row(v: &Value, grade_group: &str) -> Result<PeriodSlotTemplate, String> {
    let weekday = v
        .get("weekday")
        .and_then(|x| x.as_i64())
        .filter(|n| is_valid_weekday(*n))
        .ok_or("row weekday must be 1..7")?;
    let period = v
        .get("periodNumber")
        .and_then(|x| x.as_i64())
        .filter(|n| is_valid_period(*n))
        .ok_or("row periodNumber must be >= 1")?;
    let time = |key: &str| -> Result<String, String> {
        v.get(key)
            .and_then(|x| x.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| format!("row {key} is required"))
    };
    Ok(PeriodSlotTemplate {
        grade_group: grade_group.to_string(),
        weekday: weekday as Weekday,
        period_number: period as u8,
        name: v
            .get("name")
            .and_then(|x| x.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        start_time: time("startTime")?,
        end_time: time("endTime")?,
        is_break: v.get("isBreak").and_then(|x| x.as_bool()).unwrap_or(false),
        is_active: v.get("isActive").and_then(|x| x.as_bool()).unwrap_or(true),
    })
}

fn handle_timing_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let group = match required_group(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match SqliteRepository::new(conn).load_period_templates(&school_id, &group) {
        Ok(rows) => ok(&req.id, json!({ "gradeGroup": group, "rows": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_timing_replace(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let group = match required_group(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "rows must be an array", None);
    };
    let rows = match raw_rows
        .iter()
        .map(|r| parse_template_row(r, &group))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    if let Err(e) = validate_template_rows(&rows) {
        return timetable_err(&req.id, &e);
    }
    if let Err(e) = db::replace_period_templates(conn, &school_id, &group, None, &rows) {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }
    info!("timing group {group} replaced with {} rows", rows.len());
    ok(&req.id, json!({ "gradeGroup": group, "rowCount": rows.len() }))
}

fn handle_timing_create_standard_day(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let group = match required_group(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let weekdays: Vec<Weekday> = match req.params.get("weekdays").and_then(|v| v.as_array()) {
        None => DEFAULT_SCHOOL_WEEK.to_vec(),
        Some(arr) => {
            let parsed: Option<Vec<Weekday>> = arr
                .iter()
                .map(|v| v.as_i64().filter(|n| is_valid_weekday(*n)).map(|n| n as Weekday))
                .collect();
            match parsed {
                Some(v) if !v.is_empty() => v,
                _ => return err(&req.id, "bad_params", "weekdays must be a non-empty list of 1..7", None),
            }
        }
    };

    let spec = load_standard_day(conn);
    let repo = SqliteRepository::new(conn);
    let mut rows = match repo.load_period_templates(&school_id, &group) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    rows.retain(|r| !weekdays.contains(&r.weekday));
    for day in &weekdays {
        match standard_day(&group, *day, &spec) {
            Ok(generated) => rows.extend(generated),
            Err(e) => return timetable_err(&req.id, &e),
        }
    }
    rows.sort_by_key(|r| (r.weekday, r.period_number));
    rows.dedup_by_key(|r| (r.weekday, r.period_number));
    if let Err(e) = db::replace_period_templates(conn, &school_id, &group, None, &rows) {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }
    info!(
        "standard day ({} periods) written to group {group} for weekdays {:?}",
        spec.periods_per_day, weekdays
    );
    ok(&req.id, json!({ "gradeGroup": group, "rows": rows }))
}

fn handle_timing_resolve(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let repo = SqliteRepository::new(conn);
    let (school_id, grade) = match optional_str(req, "sectionId") {
        Some(section_id) => match repo.load_section(&section_id) {
            Ok(Some(s)) => (s.school_id, s.grade),
            Ok(None) => return err(&req.id, "not_found", format!("section {section_id} not found"), None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => {
            let school_id = match required_str(req, "schoolId") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let Some(grade) = req.params.get("grade").and_then(GradeKey::from_json) else {
                return err(&req.id, "bad_params", "missing sectionId or grade", None);
            };
            (school_id, grade)
        }
    };
    let policy = load_policy(conn);
    match resolve_grid(&repo, &school_id, &grade, &policy) {
        Ok(grid) => ok(
            &req.id,
            json!({
                "grade": grade,
                "candidates": candidate_keys(&grade, &policy),
                "gradeGroup": grid.grade_group,
                "days": grid.days,
            }),
        ),
        Err(e) => timetable_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "timing.get" => Some(handle_timing_get(state, req)),
        "timing.replace" => Some(handle_timing_replace(state, req)),
        "timing.createStandardDay" => Some(handle_timing_create_standard_day(state, req)),
        "timing.resolve" => Some(handle_timing_resolve(state, req)),
        _ => None,
    }
}
