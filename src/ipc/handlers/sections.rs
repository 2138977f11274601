use crate::db::{self, SqliteRepository};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::timetable::repository::TimetableRepository;
use crate::timetable::{GradeKey, Section};
use serde_json::json;

fn handle_sections_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(grade) = req.params.get("grade").and_then(GradeKey::from_json) else {
        return err(&req.id, "bad_params", "grade must be a number or a label", None);
    };
    let label = req
        .params
        .get("label")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| id.clone());

    let section = Section {
        id,
        school_id,
        grade,
        label,
    };
    if let Err(e) = db::upsert_section(conn, &section) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "section": section }))
}

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let school_id = match required_str(req, "schoolId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match SqliteRepository::new(conn).load_sections(&school_id) {
        Ok(sections) => ok(&req.id, json!({ "sections": sections })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_sections_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let section_id = match required_str(req, "sectionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::delete_section(conn, &section_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", format!("section {section_id} not found"), None),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.upsert" => Some(handle_sections_upsert(state, req)),
        "sections.list" => Some(handle_sections_list(state, req)),
        "sections.delete" => Some(handle_sections_delete(state, req)),
        _ => None,
    }
}
