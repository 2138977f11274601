//! Timetable core: period grids, the teacher catalog, per-section assignment
//! sets and the school-wide analyses that read them.
//!
//! Nothing in here touches SQLite. Persistence comes in through
//! [`repository::TimetableRepository`], so every component can be driven from
//! the in-memory repository in tests.

pub mod autofill;
pub mod catalog;
pub mod conflicts;
pub mod copy;
pub mod error;
pub mod grid;
pub mod load;
#[cfg(test)]
pub mod memory;
pub mod policy;
pub mod repository;
pub mod service;
pub mod store;

use serde::Serialize;
use std::fmt;

/// 1 = Monday ... 7 = Sunday.
pub type Weekday = u8;
pub type PeriodNumber = u8;

/// (weekday, periodNumber) of one grid cell.
pub type SlotKey = (Weekday, PeriodNumber);

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        1..=7 => WEEKDAY_NAMES[(weekday - 1) as usize],
        _ => "Unknown",
    }
}

pub fn is_valid_weekday(weekday: i64) -> bool {
    (1..=7).contains(&weekday)
}

pub fn is_valid_period(period: i64) -> bool {
    (1..=i64::from(PeriodNumber::MAX)).contains(&period)
}

/// `round(part / whole * 100)`, half-up, on integers.
pub(crate) fn rounded_percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    let (part, whole) = (u64::from(part), u64::from(whole));
    ((part * 200 + whole) / (whole * 2)) as u32
}

/// Grade of a section. Numeric grades take part in range groups ("6-10");
/// textual ones ("NURSERY") only ever match exactly or fall back to "all".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum GradeKey {
    Numeric(u32),
    Text(String),
}

impl GradeKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.is_empty() {
            return None;
        }
        if let Ok(n) = t.parse::<u32>() {
            return Some(Self::Numeric(n));
        }
        Some(Self::Text(t.to_ascii_uppercase()))
    }

    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        if let Some(n) = v.as_u64() {
            return u32::try_from(n).ok().map(Self::Numeric);
        }
        v.as_str().and_then(Self::parse)
    }

    pub fn as_number(&self) -> Option<u32> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for GradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A class section. Owned by the school records; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub school_id: String,
    pub grade: GradeKey,
    pub label: String,
}

/// One authored row of a timing template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSlotTemplate {
    pub grade_group: String,
    pub weekday: Weekday,
    pub period_number: PeriodNumber,
    pub name: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub is_break: bool,
    pub is_active: bool,
}

/// Teacher profile as stored. `subjects` holds the raw comma-joined subject
/// groups; [`catalog::TeacherCatalog`] normalizes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherRecord {
    pub id: String,
    pub name: String,
    pub subjects: Vec<String>,
    pub max_periods_per_week: Option<u32>,
}

/// A subject (and optionally a teacher) bound to one slot of one section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub section_id: String,
    pub weekday: Weekday,
    pub period_number: PeriodNumber,
    pub subject: String,
    pub teacher_id: Option<String>,
}

impl Assignment {
    pub fn new(
        section_id: impl Into<String>,
        weekday: Weekday,
        period_number: PeriodNumber,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            section_id: section_id.into(),
            weekday,
            period_number,
            subject: subject.into(),
            teacher_id: None,
        }
    }

    pub fn with_teacher(mut self, teacher_id: impl Into<String>) -> Self {
        self.teacher_id = Some(teacher_id.into());
        self
    }

    pub fn slot(&self) -> SlotKey {
        (self.weekday, self.period_number)
    }
}
