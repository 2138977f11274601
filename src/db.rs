use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

use crate::timetable::repository::{RepositoryError, RepositoryResult, TimetableRepository};
use crate::timetable::{Assignment, GradeKey, PeriodSlotTemplate, Section, TeacherRecord, Weekday};

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("timetable.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            grade TEXT NOT NULL,
            label TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_school ON sections(school_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            name TEXT NOT NULL,
            subjects_json TEXT NOT NULL,
            max_periods_per_week INTEGER,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_school ON teachers(school_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS period_templates(
            id TEXT PRIMARY KEY,
            school_id TEXT NOT NULL,
            grade_group TEXT NOT NULL,
            weekday INTEGER NOT NULL,
            period_number INTEGER NOT NULL,
            name TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            is_break INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            UNIQUE(school_id, grade_group, weekday, period_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS timetable_assignments(
            id TEXT PRIMARY KEY,
            section_id TEXT NOT NULL,
            weekday INTEGER NOT NULL,
            period_number INTEGER NOT NULL,
            subject TEXT NOT NULL,
            teacher_id TEXT,
            updated_at TEXT,
            FOREIGN KEY(section_id) REFERENCES sections(id),
            UNIQUE(section_id, weekday, period_number)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_teacher
         ON timetable_assignments(teacher_id, weekday, period_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Row counts reported by `health` for the open workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStats {
    pub schools: i64,
    pub sections: i64,
    pub teachers: i64,
    pub assignments: i64,
}

pub fn workspace_stats(conn: &Connection) -> anyhow::Result<WorkspaceStats> {
    let count = |sql: &str| -> rusqlite::Result<i64> { conn.query_row(sql, [], |r| r.get(0)) };
    Ok(WorkspaceStats {
        schools: count(
            "SELECT COUNT(*) FROM (
                SELECT school_id FROM sections
                UNION SELECT school_id FROM teachers
                UNION SELECT school_id FROM period_templates
            )",
        )?,
        sections: count("SELECT COUNT(*) FROM sections")?,
        teachers: count("SELECT COUNT(*) FROM teachers")?,
        assignments: count("SELECT COUNT(*) FROM timetable_assignments")?,
    })
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn next_sort_order(conn: &Connection, table: &str, school_id: &str) -> rusqlite::Result<i64> {
    let sql = format!(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM {} WHERE school_id = ?",
        table
    );
    conn.query_row(&sql, [school_id], |r| r.get(0))
}

/// Inserts or updates a section; new sections go to the end of the school.
pub fn upsert_section(conn: &Connection, section: &Section) -> anyhow::Result<()> {
    let sort_order = next_sort_order(conn, "sections", &section.school_id)?;
    conn.execute(
        "INSERT INTO sections(id, school_id, grade, label, sort_order) VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           school_id = excluded.school_id,
           grade = excluded.grade,
           label = excluded.label",
        params![
            section.id,
            section.school_id,
            section.grade.to_string(),
            section.label,
            sort_order
        ],
    )?;
    Ok(())
}

/// Removes a section and its assignments. Returns false if it did not exist.
pub fn delete_section(conn: &Connection, section_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM timetable_assignments WHERE section_id = ?",
        [section_id],
    )?;
    let n = tx.execute("DELETE FROM sections WHERE id = ?", [section_id])?;
    tx.commit()?;
    Ok(n > 0)
}

pub fn upsert_teacher(conn: &Connection, school_id: &str, teacher: &TeacherRecord) -> anyhow::Result<()> {
    let sort_order = next_sort_order(conn, "teachers", school_id)?;
    conn.execute(
        "INSERT INTO teachers(id, school_id, name, subjects_json, max_periods_per_week, sort_order)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           school_id = excluded.school_id,
           name = excluded.name,
           subjects_json = excluded.subjects_json,
           max_periods_per_week = excluded.max_periods_per_week",
        params![
            teacher.id,
            school_id,
            teacher.name,
            serde_json::to_string(&teacher.subjects)?,
            teacher.max_periods_per_week.map(i64::from),
            sort_order
        ],
    )?;
    Ok(())
}

/// Replaces a group's template rows. With `weekday` set, only that day's rows
/// are swapped.
pub fn replace_period_templates(
    conn: &Connection,
    school_id: &str,
    grade_group: &str,
    weekday: Option<Weekday>,
    rows: &[PeriodSlotTemplate],
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    match weekday {
        Some(day) => tx.execute(
            "DELETE FROM period_templates WHERE school_id = ? AND grade_group = ? AND weekday = ?",
            params![school_id, grade_group, i64::from(day)],
        )?,
        None => tx.execute(
            "DELETE FROM period_templates WHERE school_id = ? AND grade_group = ?",
            params![school_id, grade_group],
        )?,
    };
    {
        let mut stmt = tx.prepare(
            "INSERT INTO period_templates(
               id, school_id, grade_group, weekday, period_number, name,
               start_time, end_time, is_break, is_active
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for row in rows {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                school_id,
                grade_group,
                i64::from(row.weekday),
                i64::from(row.period_number),
                row.name,
                row.start_time,
                row.end_time,
                row.is_break as i64,
                row.is_active as i64
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn query_err(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn write_err(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Write(e.to_string())
}

fn small_int(v: i64, what: &str) -> RepositoryResult<u8> {
    u8::try_from(v).map_err(|_| RepositoryError::InvalidData(format!("{what} out of range: {v}")))
}

fn section_from_parts(id: String, school_id: String, grade: String, label: String) -> RepositoryResult<Section> {
    let grade = GradeKey::parse(&grade)
        .ok_or_else(|| RepositoryError::InvalidData(format!("section {id} has no grade")))?;
    Ok(Section {
        id,
        school_id,
        grade,
        label,
    })
}

/// `TimetableRepository` over the workspace connection.
pub struct SqliteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn assignments_where(&self, sql: &str, key: &str) -> RepositoryResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(sql).map_err(query_err)?;
        let raw = stmt
            .query_map([key], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, Option<String>>(4)?,
                ))
            })
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;
        raw.into_iter()
            .map(|(section_id, weekday, period, subject, teacher_id)| {
                Ok(Assignment {
                    section_id,
                    weekday: small_int(weekday, "weekday")?,
                    period_number: small_int(period, "period")?,
                    subject,
                    teacher_id,
                })
            })
            .collect()
    }
}

impl TimetableRepository for SqliteRepository<'_> {
    fn load_assignments(&self, section_id: &str) -> RepositoryResult<Vec<Assignment>> {
        self.assignments_where(
            "SELECT section_id, weekday, period_number, subject, teacher_id
             FROM timetable_assignments
             WHERE section_id = ?
             ORDER BY weekday, period_number",
            section_id,
        )
    }

    fn replace_assignments(&self, section_id: &str, assignments: &[Assignment]) -> RepositoryResult<()> {
        let tx = self.conn.unchecked_transaction().map_err(write_err)?;
        tx.execute(
            "DELETE FROM timetable_assignments WHERE section_id = ?",
            [section_id],
        )
        .map_err(write_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO timetable_assignments(
                       id, section_id, weekday, period_number, subject, teacher_id, updated_at
                     ) VALUES(?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(write_err)?;
            let ts = now_ts();
            for a in assignments {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    section_id,
                    i64::from(a.weekday),
                    i64::from(a.period_number),
                    a.subject,
                    a.teacher_id,
                    ts
                ])
                .map_err(write_err)?;
            }
        }
        // Dropping an uncommitted transaction rolls it back.
        tx.commit().map_err(write_err)
    }

    fn load_all_assignments(&self, school_id: &str) -> RepositoryResult<Vec<Assignment>> {
        self.assignments_where(
            "SELECT a.section_id, a.weekday, a.period_number, a.subject, a.teacher_id
             FROM timetable_assignments a
             JOIN sections s ON s.id = a.section_id
             WHERE s.school_id = ?
             ORDER BY s.sort_order, a.weekday, a.period_number",
            school_id,
        )
    }

    fn load_teacher_catalog(&self, school_id: &str) -> RepositoryResult<Vec<TeacherRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, subjects_json, max_periods_per_week
                 FROM teachers
                 WHERE school_id = ?
                 ORDER BY sort_order, id",
            )
            .map_err(query_err)?;
        let raw = stmt
            .query_map([school_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<i64>>(3)?,
                ))
            })
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;
        raw.into_iter()
            .map(|(id, name, subjects_json, max)| {
                let subjects: Vec<String> = serde_json::from_str(&subjects_json).map_err(|e| {
                    RepositoryError::InvalidData(format!("teacher {id} subjects: {e}"))
                })?;
                Ok(TeacherRecord {
                    max_periods_per_week: max.and_then(|m| u32::try_from(m).ok()),
                    id,
                    name,
                    subjects,
                })
            })
            .collect()
    }

    fn load_period_templates(&self, school_id: &str, grade_group: &str) -> RepositoryResult<Vec<PeriodSlotTemplate>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT weekday, period_number, name, start_time, end_time, is_break, is_active
                 FROM period_templates
                 WHERE school_id = ? AND grade_group = ?
                 ORDER BY weekday, period_number",
            )
            .map_err(query_err)?;
        let raw = stmt
            .query_map([school_id, grade_group], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, Option<String>>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, i64>(5)?,
                    r.get::<_, i64>(6)?,
                ))
            })
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;
        raw.into_iter()
            .map(|(weekday, period, name, start_time, end_time, is_break, is_active)| {
                Ok(PeriodSlotTemplate {
                    grade_group: grade_group.to_string(),
                    weekday: small_int(weekday, "weekday")?,
                    period_number: small_int(period, "period")?,
                    name,
                    start_time,
                    end_time,
                    is_break: is_break != 0,
                    is_active: is_active != 0,
                })
            })
            .collect()
    }

    fn load_section(&self, section_id: &str) -> RepositoryResult<Option<Section>> {
        let raw: Option<(String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, school_id, grade, label FROM sections WHERE id = ?",
                [section_id],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()
            .map_err(query_err)?;
        raw.map(|(id, school_id, grade, label)| section_from_parts(id, school_id, grade, label))
            .transpose()
    }

    fn load_sections(&self, school_id: &str) -> RepositoryResult<Vec<Section>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, school_id, grade, label
                 FROM sections
                 WHERE school_id = ?
                 ORDER BY sort_order, id",
            )
            .map_err(query_err)?;
        let raw = stmt
            .query_map([school_id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .map_err(query_err)?
            .collect::<Result<Vec<(String, String, String, String)>, _>>()
            .map_err(query_err)?;
        raw.into_iter()
            .map(|(id, school_id, grade, label)| section_from_parts(id, school_id, grade, label))
            .collect()
    }
}
