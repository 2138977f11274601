//! School-wide conflict scan. Read-only; results describe the snapshot they
//! were computed from.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::catalog::TeacherCatalog;
use super::policy::TimetablePolicy;
use super::{weekday_name, Assignment, PeriodNumber, Section, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConflictType {
    DoubleBooking,
    Overload,
    IncompleteTimetable,
}

/// Declared most severe first; sorting uses this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedPeriod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<Weekday>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_number: Option<PeriodNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub conflict_description: String,
    pub affected_periods: Vec<AffectedPeriod>,
}

/// Per-severity counts shown beside the conflict list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSummary {
    pub errors: u32,
    pub warnings: u32,
    pub infos: u32,
}

impl ConflictSummary {
    pub fn of(conflicts: &[Conflict]) -> Self {
        conflicts.iter().fold(Self::default(), |mut acc, c| {
            match c.severity {
                Severity::Error => acc.errors += 1,
                Severity::Warning => acc.warnings += 1,
                Severity::Info => acc.infos += 1,
            }
            acc
        })
    }
}

pub struct ConflictDetector<'a> {
    catalog: &'a TeacherCatalog,
    policy: &'a TimetablePolicy,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(catalog: &'a TeacherCatalog, policy: &'a TimetablePolicy) -> Self {
        Self { catalog, policy }
    }

    /// `gridded_sections` are the sections whose grade resolves to a timing
    /// template, in display order. Only they can be reported incomplete.
    pub fn detect(&self, assignments: &[Assignment], gridded_sections: &[Section]) -> Vec<Conflict> {
        let mut out = self.double_bookings(assignments);
        out.extend(self.overloads(assignments));
        out.extend(incomplete_sections(assignments, gridded_sections));
        // Stable: each scan's own order survives within a severity.
        out.sort_by_key(|c| c.severity);
        debug!("conflict scan found {} conflicts", out.len());
        out
    }

    fn double_bookings(&self, assignments: &[Assignment]) -> Vec<Conflict> {
        let mut by_slot: BTreeMap<(Weekday, PeriodNumber, &str), Vec<&str>> = BTreeMap::new();
        for a in assignments {
            if let Some(teacher) = a.teacher_id.as_deref() {
                by_slot
                    .entry((a.weekday, a.period_number, teacher))
                    .or_default()
                    .push(a.section_id.as_str());
            }
        }
        by_slot
            .into_iter()
            .filter(|(_, sections)| sections.len() > 1)
            .map(|((weekday, period, teacher), mut sections)| {
                sections.sort_unstable();
                Conflict {
                    conflict_type: ConflictType::DoubleBooking,
                    severity: Severity::Error,
                    conflict_description: format!(
                        "{} is booked in {} sections ({}) on {} period {}",
                        self.catalog.display_name(teacher),
                        sections.len(),
                        sections.join(", "),
                        weekday_name(weekday),
                        period
                    ),
                    affected_periods: sections
                        .into_iter()
                        .map(|s| AffectedPeriod {
                            teacher_id: Some(teacher.to_string()),
                            section_id: Some(s.to_string()),
                            weekday: Some(weekday),
                            period_number: Some(period),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn overloads(&self, assignments: &[Assignment]) -> Vec<Conflict> {
        let mut totals: HashMap<&str, u32> = HashMap::new();
        for teacher in assignments.iter().filter_map(|a| a.teacher_id.as_deref()) {
            *totals.entry(teacher).or_default() += 1;
        }
        self.catalog
            .teachers()
            .iter()
            .filter_map(|t| {
                let total = totals.get(t.id.as_str()).copied().unwrap_or(0);
                let max = t.max_periods_per_week;
                if total <= max {
                    return None;
                }
                let severe = u64::from(total) * 100
                    > u64::from(max) * u64::from(self.policy.overload_error_pct);
                Some(Conflict {
                    conflict_type: ConflictType::Overload,
                    severity: if severe { Severity::Error } else { Severity::Warning },
                    conflict_description: format!(
                        "{} has {total} periods against a maximum of {max}",
                        self.catalog.display_name(&t.id)
                    ),
                    affected_periods: vec![AffectedPeriod {
                        teacher_id: Some(t.id.clone()),
                        section_id: None,
                        weekday: None,
                        period_number: None,
                    }],
                })
            })
            .collect()
    }
}

fn incomplete_sections(assignments: &[Assignment], gridded_sections: &[Section]) -> Vec<Conflict> {
    gridded_sections
        .iter()
        .filter(|s| !assignments.iter().any(|a| a.section_id == s.id))
        .map(|s| Conflict {
            conflict_type: ConflictType::IncompleteTimetable,
            severity: Severity::Info,
            conflict_description: format!("section {} has no timetable entries", s.label),
            affected_periods: vec![AffectedPeriod {
                teacher_id: None,
                section_id: Some(s.id.clone()),
                weekday: None,
                period_number: None,
            }],
        })
        .collect()
}
