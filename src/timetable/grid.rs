//! Period grid resolution.
//!
//! A grade's timing comes from exactly one grade group: the exact grade if it
//! has rows, else the first configured range group containing it, else "all".
//! Rows are never merged across groups.

use chrono::{Duration, NaiveTime};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::error::{TimetableError, TimetableResult};
use super::policy::{StandardDaySpec, TimetablePolicy};
use super::repository::TimetableRepository;
use super::{is_valid_period, is_valid_weekday, GradeKey, PeriodNumber, PeriodSlotTemplate, SlotKey, Weekday};

pub const ALL_GRADES: &str = "all";
const TIME_FORMAT: &str = "%H:%M";

/// Which timing template a row belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeGroupKey {
    Exact(GradeKey),
    Range(u32, u32),
    All,
}

impl GradeGroupKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        if t.eq_ignore_ascii_case(ALL_GRADES) {
            return Some(Self::All);
        }
        if let Some((lo, hi)) = t.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<u32>(), hi.trim().parse::<u32>()) {
                return (lo <= hi).then_some(Self::Range(lo, hi));
            }
        }
        GradeKey::parse(t).map(Self::Exact)
    }

    pub fn contains(&self, grade: &GradeKey) -> bool {
        match self {
            Self::All => true,
            Self::Exact(g) => g == grade,
            Self::Range(lo, hi) => grade.as_number().is_some_and(|n| (*lo..=*hi).contains(&n)),
        }
    }
}

impl fmt::Display for GradeGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(g) => write!(f, "{g}"),
            Self::Range(lo, hi) => write!(f, "{lo}-{hi}"),
            Self::All => f.write_str(ALL_GRADES),
        }
    }
}

/// Canonical spelling of a grade group key, or `None` if it cannot be parsed.
pub fn normalize_group_key(raw: &str) -> Option<String> {
    GradeGroupKey::parse(raw).map(|k| k.to_string())
}

/// Group keys to try for `grade`, highest priority first.
pub fn candidate_keys(grade: &GradeKey, policy: &TimetablePolicy) -> Vec<String> {
    let mut out = vec![grade.to_string()];
    for raw in &policy.grade_ranges {
        let Some(key @ GradeGroupKey::Range(..)) = GradeGroupKey::parse(raw) else {
            continue;
        };
        if key.contains(grade) {
            out.push(key.to_string());
        }
    }
    out.push(ALL_GRADES.to_string());
    let mut seen = HashSet::new();
    out.retain(|k| seen.insert(k.clone()));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSlot {
    pub period_number: PeriodNumber,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub is_break: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDay {
    pub weekday: Weekday,
    pub slots: Vec<PeriodSlot>,
}

/// The effective day/period template of one grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGrid {
    pub grade_group: String,
    pub days: Vec<GridDay>,
}

impl ResolvedGrid {
    /// Builds the grid from one group's rows. Inactive rows are ignored;
    /// `None` when no active row remains.
    pub fn from_rows(grade_group: &str, rows: &[PeriodSlotTemplate]) -> Option<Self> {
        let mut by_day: BTreeMap<Weekday, BTreeMap<PeriodNumber, PeriodSlot>> = BTreeMap::new();
        for row in rows.iter().filter(|r| r.is_active) {
            let name = row
                .name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    if row.is_break {
                        "Break".to_string()
                    } else {
                        format!("Period {}", row.period_number)
                    }
                });
            by_day
                .entry(row.weekday)
                .or_default()
                .entry(row.period_number)
                .or_insert(PeriodSlot {
                    period_number: row.period_number,
                    name,
                    start_time: row.start_time.clone(),
                    end_time: row.end_time.clone(),
                    is_break: row.is_break,
                });
        }
        if by_day.is_empty() {
            return None;
        }
        Some(Self {
            grade_group: grade_group.to_string(),
            days: by_day
                .into_iter()
                .map(|(weekday, slots)| GridDay {
                    weekday,
                    slots: slots.into_values().collect(),
                })
                .collect(),
        })
    }

    pub fn slot(&self, weekday: Weekday, period: PeriodNumber) -> Option<&PeriodSlot> {
        self.days
            .iter()
            .find(|d| d.weekday == weekday)
            .and_then(|d| d.slots.iter().find(|s| s.period_number == period))
    }

    /// Non-break slots in (weekday, period) order.
    pub fn teaching_slots(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.days.iter().flat_map(|d| {
            d.slots
                .iter()
                .filter(|s| !s.is_break)
                .map(move |s| (d.weekday, s.period_number))
        })
    }
}

/// Resolves the grid for `grade`, or `ConfigMissing` when no candidate group
/// has active rows.
pub fn resolve_grid<R: TimetableRepository + ?Sized>(
    repo: &R,
    school_id: &str,
    grade: &GradeKey,
    policy: &TimetablePolicy,
) -> TimetableResult<ResolvedGrid> {
    let candidates = candidate_keys(grade, policy);
    for key in &candidates {
        let rows = repo.load_period_templates(school_id, key)?;
        if let Some(grid) = ResolvedGrid::from_rows(key, &rows) {
            debug!("grade {grade} resolved to timing group {key}");
            return Ok(grid);
        }
    }
    Err(TimetableError::ConfigMissing {
        grade: grade.to_string(),
        candidates,
    })
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT).ok()
}

/// Checks a full replacement set of rows for one group.
pub fn validate_template_rows(rows: &[PeriodSlotTemplate]) -> TimetableResult<()> {
    let mut seen = HashSet::new();
    for row in rows {
        let at = format!("weekday {} period {}", row.weekday, row.period_number);
        if !is_valid_weekday(i64::from(row.weekday)) {
            return Err(TimetableError::validation(format!("{at}: weekday must be 1..7")));
        }
        if !is_valid_period(i64::from(row.period_number)) {
            return Err(TimetableError::validation(format!("{at}: period must be >= 1")));
        }
        if !seen.insert((row.weekday, row.period_number)) {
            return Err(TimetableError::validation(format!("{at}: duplicate slot")));
        }
        let (Some(start), Some(end)) = (parse_time(&row.start_time), parse_time(&row.end_time)) else {
            return Err(TimetableError::validation(format!(
                "{at}: times must be HH:MM"
            )));
        };
        if start >= end {
            return Err(TimetableError::validation(format!(
                "{at}: start time must be before end time"
            )));
        }
    }
    Ok(())
}

/// Generates consecutive periods for one weekday of `grade_group`.
pub fn standard_day(
    grade_group: &str,
    weekday: Weekday,
    spec: &StandardDaySpec,
) -> TimetableResult<Vec<PeriodSlotTemplate>> {
    if !is_valid_weekday(i64::from(weekday)) {
        return Err(TimetableError::validation("weekday must be 1..7"));
    }
    let mut start = parse_time(&spec.day_start)
        .ok_or_else(|| TimetableError::validation("dayStart must be HH:MM"))?;
    let step = Duration::minutes(i64::from(spec.period_minutes));
    let mut rows = Vec::with_capacity(spec.periods_per_day as usize);
    for period in 1..=spec.periods_per_day {
        let (end, wrapped) = start.overflowing_add_signed(step);
        if wrapped != 0 {
            return Err(TimetableError::validation("standard day runs past midnight"));
        }
        let is_break = period == spec.break_period;
        rows.push(PeriodSlotTemplate {
            grade_group: grade_group.to_string(),
            weekday,
            period_number: period,
            name: Some(if is_break {
                spec.break_name.clone()
            } else {
                format!("Period {period}")
            }),
            start_time: start.format(TIME_FORMAT).to_string(),
            end_time: end.format(TIME_FORMAT).to_string(),
            is_break,
            is_active: true,
        });
        start = end;
    }
    Ok(rows)
}
