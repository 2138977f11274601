use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, SETUP_TIMETABLE_KEY, SETUP_TIMING_KEY};
use crate::ipc::types::{AppState, Request};
use crate::timetable::grid::GradeGroupKey;
use log::info;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Timetable,
    Timing,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "timetable" => Some(Self::Timetable),
            "timing" => Some(Self::Timing),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Timetable => SETUP_TIMETABLE_KEY,
            Self::Timing => SETUP_TIMING_KEY,
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Timetable => json!({
            "gradeRanges": ["1-5", "6-10", "11-12"],
            "defaultMaxPeriodsPerWeek": 30,
            "underutilizedBelowPct": 40,
            "optimalMaxPct": 100,
            "overloadErrorPct": 150,
            "requireTeacher": false,
            "seedRunningLoad": false
        }),
        SetupSection::Timing => json!({
            "periodsPerDay": 8,
            "periodMinutes": 45,
            "dayStart": "08:00",
            "breakPeriod": 4,
            "breakName": "Lunch Break"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_grade_ranges(v: &Value, key: &str) -> Result<Value, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array", key))?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        let raw = parse_string_max(item, key, 16)?;
        match GradeGroupKey::parse(&raw) {
            Some(range @ GradeGroupKey::Range(..)) => out.push(Value::String(range.to_string())),
            _ => return Err(format!("{} entries must look like \"6-10\", got {:?}", key, raw)),
        }
    }
    Ok(Value::Array(out))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Timetable => match k.as_str() {
                "gradeRanges" => {
                    obj.insert(k.clone(), parse_grade_ranges(v, k)?);
                }
                "defaultMaxPeriodsPerWeek" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 80)?));
                }
                "underutilizedBelowPct" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
                }
                "optimalMaxPct" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 500)?));
                }
                "overloadErrorPct" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 1000)?));
                }
                "requireTeacher" | "seedRunningLoad" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown timetable field: {}", k)),
            },
            SetupSection::Timing => match k.as_str() {
                "periodsPerDay" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 16)?));
                }
                "periodMinutes" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 5, 240)?));
                }
                "dayStart" => {
                    let s = parse_string_max(v, k, 5)?;
                    if chrono::NaiveTime::parse_from_str(&s, "%H:%M").is_err() {
                        return Err(format!("{} must be HH:MM", k));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "breakPeriod" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 16)?));
                }
                "breakName" => {
                    let s = parse_string_max(v, k, 40)?;
                    if s.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown timing field: {}", k)),
            },
        }
    }
    if let SetupSection::Timetable = section {
        let pct = |key: &str| obj.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
        if pct("underutilizedBelowPct") > pct("optimalMaxPct")
            || pct("optimalMaxPct") > pct("overloadErrorPct")
        {
            return Err(
                "thresholds must satisfy underutilizedBelowPct <= optimalMaxPct <= overloadErrorPct"
                    .into(),
            );
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not block setup UI.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let timetable = match load_section(conn, SetupSection::Timetable) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let timing = match load_section(conn, SetupSection::Timing) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "timetable": timetable, "timing": timing }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    info!("updated {}", section.key());
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
