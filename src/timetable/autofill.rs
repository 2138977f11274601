//! Greedy auto-fill of one section's grid.
//!
//! The curriculum is first turned into a slot plan: pinned requirements take
//! their slot, weekly counts are dealt round-robin over the remaining teaching
//! slots in (weekday, period) order. The plan depends only on the grid and the
//! requirements, so re-running over a partly filled grid targets the same
//! subjects at the same slots.
//!
//! Each planned slot is then staffed in (weekday, period) order:
//! 1. `ReplaceAll` starts from an empty section; `FillEmpty` skips filled slots.
//! 2. Candidates are teachers qualified for the slot's subject.
//! 3. Teachers holding any other section's assignment at that slot are dropped.
//! 4. The candidate with the lowest running tally wins; ties go to catalog order.
//! 5. The winner's tally is bumped for the rest of the run.
//! 6. With no candidate left the slot stays empty and the subject is reported.
//!
//! This is a heuristic, not an optimizer. Identical inputs give identical
//! output; the tally lives only for one run.

use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::catalog::TeacherCatalog;
use super::error::{TimetableError, TimetableResult};
use super::grid::ResolvedGrid;
use super::{rounded_percent, Assignment, PeriodNumber, SlotKey, Weekday};

/// Upper bound on one subject's weekly demand: every slot of a full week.
pub const MAX_WEEKLY_PERIODS: u32 = 7 * PeriodNumber::MAX as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FillMode {
    FillEmpty,
    ReplaceAll,
}

impl FillMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "fillEmpty" | "fill_empty" => Some(Self::FillEmpty),
            "replaceAll" | "replace_all" => Some(Self::ReplaceAll),
            _ => None,
        }
    }
}

/// One line of a section's curriculum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectRequirement {
    /// `subject` must be taught at exactly this slot.
    At {
        subject: String,
        weekday: Weekday,
        period: PeriodNumber,
    },
    /// `subject` needs this many periods somewhere in the week.
    Weekly { subject: String, periods_per_week: u32 },
}

impl SubjectRequirement {
    pub fn subject(&self) -> &str {
        match self {
            Self::At { subject, .. } | Self::Weekly { subject, .. } => subject,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnfilledReason {
    NoQualifiedTeacher,
    TeacherUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnfilledSlot {
    pub weekday: Weekday,
    pub period_number: PeriodNumber,
    pub subject: String,
    pub reason: UnfilledReason,
}

/// Weekly demand that did not fit in the grid's teaching slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectShortfall {
    pub subject: String,
    pub periods: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillSummary {
    pub periods_filled: u32,
    pub total_periods: u32,
    pub success_rate: u32,
}

impl FillSummary {
    fn new(periods_filled: u32, total_periods: u32) -> Self {
        let success_rate = if total_periods == 0 {
            100
        } else {
            rounded_percent(periods_filled, total_periods)
        };
        Self {
            periods_filled,
            total_periods,
            success_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFillOutcome {
    /// The section's complete assignment set after the run.
    pub assignments: Vec<Assignment>,
    pub unassigned_subjects: Vec<String>,
    pub unfilled_slots: Vec<UnfilledSlot>,
    pub unplaced: Vec<SubjectShortfall>,
    pub summary: FillSummary,
}

pub struct FillRequest<'r> {
    pub section_id: &'r str,
    pub requirements: &'r [SubjectRequirement],
    /// Every assignment in the school, this section's included.
    pub school_assignments: &'r [Assignment],
    pub mode: FillMode,
}

/// Rejects requirements that can never be planned against `grid`.
pub fn validate_requirements(
    grid: &ResolvedGrid,
    requirements: &[SubjectRequirement],
) -> TimetableResult<()> {
    let mut pinned = HashSet::new();
    let mut weekly: HashMap<&str, u32> = HashMap::new();
    for req in requirements {
        if req.subject().trim().is_empty() {
            return Err(TimetableError::validation("requirement subject is required"));
        }
        if let SubjectRequirement::Weekly {
            subject,
            periods_per_week,
        } = req
        {
            let total = weekly.entry(subject.trim()).or_insert(0);
            *total = total.saturating_add(*periods_per_week);
            if *total > MAX_WEEKLY_PERIODS {
                return Err(TimetableError::validation(format!(
                    "{} needs {} periods per week, more than {MAX_WEEKLY_PERIODS}",
                    subject.trim(),
                    total
                )));
            }
        }
        if let SubjectRequirement::At { weekday, period, .. } = req {
            let Some(slot) = grid.slot(*weekday, *period) else {
                return Err(TimetableError::validation(format!(
                    "weekday {weekday} period {period} is not part of the {} timing",
                    grid.grade_group
                )));
            };
            if slot.is_break {
                return Err(TimetableError::validation(format!(
                    "weekday {weekday} period {period} is a break ({})",
                    slot.name
                )));
            }
            if !pinned.insert((*weekday, *period)) {
                return Err(TimetableError::validation(format!(
                    "weekday {weekday} period {period} is pinned twice"
                )));
            }
        }
    }
    Ok(())
}

pub struct AutoFillEngine<'a> {
    grid: &'a ResolvedGrid,
    catalog: &'a TeacherCatalog,
    seed_running_load: bool,
}

impl<'a> AutoFillEngine<'a> {
    pub fn new(grid: &'a ResolvedGrid, catalog: &'a TeacherCatalog) -> Self {
        Self {
            grid,
            catalog,
            seed_running_load: false,
        }
    }

    /// Start tallies from each teacher's existing load instead of zero.
    pub fn seed_running_load(mut self, on: bool) -> Self {
        self.seed_running_load = on;
        self
    }

    /// Target subject per teaching slot, plus weekly demand that did not fit.
    pub fn plan(
        &self,
        requirements: &[SubjectRequirement],
    ) -> (BTreeMap<SlotKey, String>, Vec<SubjectShortfall>) {
        let mut targets: BTreeMap<SlotKey, String> = BTreeMap::new();
        for req in requirements {
            if let SubjectRequirement::At {
                subject,
                weekday,
                period,
            } = req
            {
                let teaching = self
                    .grid
                    .slot(*weekday, *period)
                    .is_some_and(|s| !s.is_break);
                if teaching {
                    targets
                        .entry((*weekday, *period))
                        .or_insert_with(|| subject.trim().to_string());
                }
            }
        }

        let mut demand: Vec<(String, u32)> = Vec::new();
        for req in requirements {
            if let SubjectRequirement::Weekly {
                subject,
                periods_per_week,
            } = req
            {
                let subject = subject.trim();
                match demand.iter_mut().find(|(s, _)| s == subject) {
                    Some((_, n)) => *n = n.saturating_add(*periods_per_week),
                    None => demand.push((subject.to_string(), *periods_per_week)),
                }
            }
        }
        demand.retain(|(_, n)| *n > 0);

        let free: Vec<SlotKey> = self
            .grid
            .teaching_slots()
            .filter(|k| !targets.contains_key(k))
            .collect();
        let mut cursor = 0usize;
        for slot in free {
            if demand.iter().all(|(_, n)| *n == 0) {
                break;
            }
            let mut idx = cursor % demand.len();
            while demand[idx].1 == 0 {
                cursor += 1;
                idx = cursor % demand.len();
            }
            let entry = &mut demand[idx];
            entry.1 -= 1;
            targets.insert(slot, entry.0.clone());
            cursor += 1;
        }

        let shortfall = demand
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(subject, periods)| SubjectShortfall { subject, periods })
            .collect();
        (targets, shortfall)
    }

    pub fn run(&self, request: &FillRequest<'_>) -> AutoFillOutcome {
        let section_id = request.section_id;
        let (targets, unplaced) = self.plan(request.requirements);

        let mut cells: BTreeMap<SlotKey, Assignment> = match request.mode {
            FillMode::ReplaceAll => BTreeMap::new(),
            FillMode::FillEmpty => request
                .school_assignments
                .iter()
                .filter(|a| a.section_id == section_id)
                .map(|a| (a.slot(), a.clone()))
                .collect(),
        };

        let mut busy: HashSet<(&str, SlotKey)> = HashSet::new();
        let mut tally: HashMap<String, u32> = HashMap::new();
        for a in request.school_assignments {
            let Some(teacher) = a.teacher_id.as_deref() else {
                continue;
            };
            if a.section_id != section_id {
                busy.insert((teacher, a.slot()));
                if self.seed_running_load {
                    *tally.entry(teacher.to_string()).or_default() += 1;
                }
            }
        }
        if self.seed_running_load {
            for teacher in cells.values().filter_map(|a| a.teacher_id.as_deref()) {
                *tally.entry(teacher.to_string()).or_default() += 1;
            }
        }

        let mut total = 0u32;
        let mut filled = 0u32;
        let mut unfilled_slots = Vec::new();
        for (slot, subject) in &targets {
            if cells.contains_key(slot) {
                continue;
            }
            total += 1;

            let mut qualified = self.catalog.qualified_for(subject).peekable();
            if qualified.peek().is_none() {
                unfilled_slots.push(UnfilledSlot {
                    weekday: slot.0,
                    period_number: slot.1,
                    subject: subject.clone(),
                    reason: UnfilledReason::NoQualifiedTeacher,
                });
                continue;
            }
            let chosen = qualified
                .filter(|t| !busy.contains(&(t.id.as_str(), *slot)))
                .min_by_key(|t| tally.get(&t.id).copied().unwrap_or(0));
            let Some(teacher) = chosen else {
                unfilled_slots.push(UnfilledSlot {
                    weekday: slot.0,
                    period_number: slot.1,
                    subject: subject.clone(),
                    reason: UnfilledReason::TeacherUnavailable,
                });
                continue;
            };

            *tally.entry(teacher.id.clone()).or_default() += 1;
            busy.insert((teacher.id.as_str(), *slot));
            cells.insert(
                *slot,
                Assignment::new(section_id, slot.0, slot.1, subject.clone())
                    .with_teacher(teacher.id.clone()),
            );
            filled += 1;
        }

        let mut unassigned_subjects: Vec<String> = Vec::new();
        for u in &unfilled_slots {
            if !unassigned_subjects.contains(&u.subject) {
                unassigned_subjects.push(u.subject.clone());
            }
        }

        let summary = FillSummary::new(filled, total);
        info!(
            "auto-fill {:?} section {section_id}: {}/{} periods ({}%)",
            request.mode, summary.periods_filled, summary.total_periods, summary.success_rate
        );
        AutoFillOutcome {
            assignments: cells.into_values().collect(),
            unassigned_subjects,
            unfilled_slots,
            unplaced,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::{PeriodSlotTemplate, TeacherRecord};

    /// Monday periods 1..=6 with period 4 as a break, plus Tuesday 1..=3.
    fn grid() -> ResolvedGrid {
        let mut rows = Vec::new();
        for p in 1..=6u8 {
            rows.push(slot_row(1, p, p == 4));
        }
        for p in 1..=3u8 {
            rows.push(slot_row(2, p, false));
        }
        ResolvedGrid::from_rows("all", &rows).expect("grid")
    }

    fn slot_row(weekday: Weekday, period: PeriodNumber, is_break: bool) -> PeriodSlotTemplate {
        PeriodSlotTemplate {
            grade_group: "all".to_string(),
            weekday,
            period_number: period,
            name: None,
            start_time: "08:00".to_string(),
            end_time: "08:45".to_string(),
            is_break,
            is_active: true,
        }
    }

    fn teacher(id: &str, subjects: &str, max: u32) -> TeacherRecord {
        TeacherRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            subjects: vec![subjects.to_string()],
            max_periods_per_week: Some(max),
        }
    }

    fn at(subject: &str, weekday: Weekday, period: PeriodNumber) -> SubjectRequirement {
        SubjectRequirement::At {
            subject: subject.to_string(),
            weekday,
            period,
        }
    }

    fn weekly(subject: &str, n: u32) -> SubjectRequirement {
        SubjectRequirement::Weekly {
            subject: subject.to_string(),
            periods_per_week: n,
        }
    }

    fn run(
        catalog: &TeacherCatalog,
        reqs: &[SubjectRequirement],
        school: &[Assignment],
        mode: FillMode,
    ) -> AutoFillOutcome {
        let grid = grid();
        AutoFillEngine::new(&grid, catalog).run(&FillRequest {
            section_id: "7A",
            requirements: reqs,
            school_assignments: school,
            mode,
        })
    }

    #[test]
    fn running_tally_alternates_between_equal_teachers() {
        let catalog = TeacherCatalog::from_records(
            vec![teacher("t1", "Math", 20), teacher("t2", "Math", 20)],
            30,
        );
        let out = run(
            &catalog,
            &[at("Math", 1, 1), at("Math", 1, 2)],
            &[],
            FillMode::FillEmpty,
        );
        assert_eq!(out.assignments.len(), 2);
        assert_eq!(out.assignments[0].teacher_id.as_deref(), Some("t1"));
        assert_eq!(out.assignments[1].teacher_id.as_deref(), Some("t2"));
        assert_eq!(
            out.summary,
            FillSummary {
                periods_filled: 2,
                total_periods: 2,
                success_rate: 100
            }
        );
        assert!(out.unassigned_subjects.is_empty());
    }

    #[test]
    fn teacher_busy_elsewhere_is_skipped() {
        let catalog = TeacherCatalog::from_records(
            vec![teacher("t1", "Math", 20), teacher("t2", "Math", 20)],
            30,
        );
        let school = vec![Assignment::new("7B", 1, 1, "Math").with_teacher("t1")];
        let out = run(&catalog, &[at("Math", 1, 1)], &school, FillMode::FillEmpty);
        assert_eq!(out.assignments[0].teacher_id.as_deref(), Some("t2"));
    }

    #[test]
    fn unavailable_and_unqualified_subjects_are_reported_not_raised() {
        let catalog = TeacherCatalog::from_records(vec![teacher("t1", "Math", 20)], 30);
        let school = vec![Assignment::new("7B", 1, 1, "Math").with_teacher("t1")];
        let out = run(
            &catalog,
            &[at("Math", 1, 1), at("Art", 1, 2), at("Math", 1, 3)],
            &school,
            FillMode::FillEmpty,
        );
        assert_eq!(out.assignments.len(), 1);
        assert_eq!(out.unassigned_subjects, vec!["Math", "Art"]);
        assert_eq!(out.unfilled_slots[0].reason, UnfilledReason::TeacherUnavailable);
        assert_eq!(out.unfilled_slots[1].reason, UnfilledReason::NoQualifiedTeacher);
        assert_eq!(out.summary.success_rate, 33);
    }

    #[test]
    fn fill_empty_keeps_existing_and_replace_all_clears() {
        let catalog = TeacherCatalog::from_records(vec![teacher("t1", "Math, Art", 20)], 30);
        let school = vec![
            Assignment::new("7A", 1, 1, "History"),
            Assignment::new("7A", 2, 3, "Music"),
        ];
        let reqs = [at("Math", 1, 1), at("Art", 1, 2)];

        let keep = run(&catalog, &reqs, &school, FillMode::FillEmpty);
        assert_eq!(keep.assignments.len(), 3);
        assert_eq!(keep.assignments[0].subject, "History");
        assert_eq!(keep.summary.total_periods, 1);

        let replace = run(&catalog, &reqs, &school, FillMode::ReplaceAll);
        let subjects: Vec<_> = replace.assignments.iter().map(|a| a.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Math", "Art"]);
        assert_eq!(replace.summary.total_periods, 2);
    }

    #[test]
    fn weekly_demand_is_dealt_round_robin_and_overflow_reported() {
        let catalog = TeacherCatalog::from_records(
            vec![teacher("t1", "Math", 20), teacher("t2", "English", 20)],
            30,
        );
        let grid = grid();
        let engine = AutoFillEngine::new(&grid, &catalog);
        let (plan, short) = engine.plan(&[at("Art", 1, 1), weekly("Math", 5), weekly("English", 5)]);
        // 8 teaching slots, one pinned: seven left for ten weekly periods.
        assert_eq!(plan.len(), 8);
        assert_eq!(plan[&(1, 1)], "Art");
        assert_eq!(plan[&(1, 2)], "Math");
        assert_eq!(plan[&(1, 3)], "English");
        assert_eq!(plan[&(1, 5)], "Math");
        assert!(!plan.contains_key(&(1, 4)));
        assert_eq!(
            short,
            vec![
                SubjectShortfall {
                    subject: "Math".to_string(),
                    periods: 1
                },
                SubjectShortfall {
                    subject: "English".to_string(),
                    periods: 2
                }
            ]
        );
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let catalog = TeacherCatalog::from_records(
            vec![
                teacher("t1", "Math", 20),
                teacher("t2", "Math, English", 20),
                teacher("t3", "English", 20),
            ],
            30,
        );
        let school = vec![
            Assignment::new("7B", 1, 2, "Math").with_teacher("t2"),
            Assignment::new("7B", 2, 1, "English").with_teacher("t3"),
        ];
        let reqs = [weekly("Math", 4), weekly("English", 4)];
        let a = run(&catalog, &reqs, &school, FillMode::ReplaceAll);
        let b = run(&catalog, &reqs, &school, FillMode::ReplaceAll);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).expect("json"),
            serde_json::to_string(&b).expect("json")
        );
    }

    #[test]
    fn fill_empty_twice_is_idempotent() {
        let catalog = TeacherCatalog::from_records(
            vec![teacher("t1", "Math", 20), teacher("t2", "English", 20)],
            30,
        );
        let mut school = vec![
            Assignment::new("7B", 1, 3, "English").with_teacher("t2"),
            Assignment::new("7B", 2, 2, "Math").with_teacher("t1"),
        ];
        let reqs = [weekly("Math", 4), weekly("English", 4), weekly("Art", 1)];
        let first = run(&catalog, &reqs, &school, FillMode::FillEmpty);

        school.retain(|a| a.section_id != "7A");
        school.extend(first.assignments.iter().cloned());
        let second = run(&catalog, &reqs, &school, FillMode::FillEmpty);
        assert_eq!(first.assignments, second.assignments);
        assert_eq!(second.summary.periods_filled, 0);
    }

    #[test]
    fn seeded_tally_prefers_lighter_teacher() {
        let catalog = TeacherCatalog::from_records(
            vec![teacher("t1", "Math", 20), teacher("t2", "Math", 20)],
            30,
        );
        let school = vec![Assignment::new("7B", 2, 1, "Math").with_teacher("t1")];
        let grid = grid();
        let out = AutoFillEngine::new(&grid, &catalog)
            .seed_running_load(true)
            .run(&FillRequest {
                section_id: "7A",
                requirements: &[at("Math", 1, 1)],
                school_assignments: &school,
                mode: FillMode::FillEmpty,
            });
        assert_eq!(out.assignments[0].teacher_id.as_deref(), Some("t2"));
    }

    #[test]
    fn huge_repeated_weekly_demand_saturates_instead_of_overflowing() {
        let catalog = TeacherCatalog::from_records(vec![teacher("t1", "Math", 20)], 30);
        let grid = grid();
        let (targets, unplaced) = AutoFillEngine::new(&grid, &catalog)
            .plan(&[weekly("Math", u32::MAX), weekly("Math", 2)]);
        assert_eq!(targets.len(), 8);
        assert!(targets.values().all(|s| s == "Math"));
        assert_eq!(
            unplaced,
            vec![SubjectShortfall {
                subject: "Math".to_string(),
                periods: u32::MAX - 8,
            }]
        );

        let err = validate_requirements(&grid, &[weekly("Math", u32::MAX), weekly("Math", 2)])
            .expect_err("too much demand");
        assert_eq!(err.code(), "validation_failed");
        assert!(validate_requirements(
            &grid,
            &[weekly("Math", MAX_WEEKLY_PERIODS), weekly("Math", 1)]
        )
        .is_err());
        assert!(validate_requirements(&grid, &[weekly("Math", MAX_WEEKLY_PERIODS)]).is_ok());
    }

    #[test]
    fn requirement_validation_rejects_breaks_and_duplicates() {
        let grid = grid();
        assert!(validate_requirements(&grid, &[at("Math", 1, 4)]).is_err());
        assert!(validate_requirements(&grid, &[at("Math", 3, 1)]).is_err());
        assert!(validate_requirements(&grid, &[at("Math", 1, 1), at("Art", 1, 1)]).is_err());
        assert!(validate_requirements(&grid, &[weekly(" ", 2)]).is_err());
        assert!(validate_requirements(&grid, &[at("Math", 1, 1), weekly("Art", 2)]).is_ok());
        assert_eq!(FillMode::parse("replaceAll"), Some(FillMode::ReplaceAll));
        assert_eq!(FillMode::parse("sometimes"), None);
    }
}
