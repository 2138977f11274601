//! Repository-driven entry points: each call loads what it needs, runs one
//! core component and, for writers, hands the result back in a single
//! replace.

use log::info;
use serde::Serialize;

use super::autofill::{validate_requirements, AutoFillEngine, AutoFillOutcome, FillMode, FillRequest, SubjectRequirement};
use super::catalog::TeacherCatalog;
use super::conflicts::{Conflict, ConflictDetector};
use super::copy::{copy_timetable, CopyResult};
use super::error::{TimetableError, TimetableResult};
use super::grid::{resolve_grid, ResolvedGrid};
use super::load::{LoadAnalyzer, LoadFilter, LoadReport};
use super::policy::TimetablePolicy;
use super::repository::TimetableRepository;
use super::store::TimetableStore;
use super::{weekday_name, Assignment, PeriodNumber, Section, Weekday};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    pub period_number: PeriodNumber,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub is_break: bool,
    pub subject: Option<String>,
    pub teacher_id: Option<String>,
    pub teacher_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridViewDay {
    pub weekday: Weekday,
    pub weekday_name: &'static str,
    pub periods: Vec<GridCell>,
}

/// Weekday x period matrix for one section, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridView {
    pub section: Section,
    pub grade_group: String,
    pub days: Vec<GridViewDay>,
    /// Stored rows with no slot in the current timing, e.g. after a copy.
    pub off_grid: Vec<Assignment>,
}

pub struct TimetableService<'r, R: TimetableRepository + ?Sized> {
    repo: &'r R,
    policy: TimetablePolicy,
}

impl<'r, R: TimetableRepository + ?Sized> TimetableService<'r, R> {
    pub fn new(repo: &'r R, policy: TimetablePolicy) -> Self {
        Self { repo, policy }
    }

    pub fn section(&self, section_id: &str) -> TimetableResult<Section> {
        self.repo
            .load_section(section_id)?
            .ok_or_else(|| TimetableError::NotFound(format!("section {section_id}")))
    }

    pub fn resolve(&self, section: &Section) -> TimetableResult<ResolvedGrid> {
        resolve_grid(self.repo, &section.school_id, &section.grade, &self.policy)
    }

    pub fn catalog(&self, school_id: &str) -> TimetableResult<TeacherCatalog> {
        TeacherCatalog::load(self.repo, school_id, &self.policy)
    }

    fn open_store(&self, section_id: &str) -> TimetableResult<(Section, TimetableStore)> {
        let section = self.section(section_id)?;
        let grid = self.resolve(&section)?;
        let store = TimetableStore::load(self.repo, section_id, grid)?
            .with_teacher_required(self.policy.require_teacher);
        Ok((section, store))
    }

    pub fn grid_view(&self, section_id: &str) -> TimetableResult<GridView> {
        let (section, store) = self.open_store(section_id)?;
        let catalog = self.catalog(&section.school_id)?;
        let grid = store.grid();
        let days = grid
            .days
            .iter()
            .map(|day| GridViewDay {
                weekday: day.weekday,
                weekday_name: weekday_name(day.weekday),
                periods: day
                    .slots
                    .iter()
                    .map(|slot| {
                        let cell = store.get(day.weekday, slot.period_number);
                        let teacher_id = cell.and_then(|a| a.teacher_id.clone());
                        GridCell {
                            period_number: slot.period_number,
                            name: slot.name.clone(),
                            start_time: slot.start_time.clone(),
                            end_time: slot.end_time.clone(),
                            is_break: slot.is_break,
                            subject: cell.map(|a| a.subject.clone()),
                            teacher_name: teacher_id.as_deref().map(|t| catalog.display_name(t)),
                            teacher_id,
                        }
                    })
                    .collect(),
            })
            .collect();
        let off_grid = store
            .list()
            .into_iter()
            .filter(|a| grid.slot(a.weekday, a.period_number).is_none())
            .collect();
        Ok(GridView {
            grade_group: grid.grade_group.clone(),
            section,
            days,
            off_grid,
        })
    }

    /// Sets or, with a blank subject, clears one cell and saves the section.
    pub fn set_cell(
        &self,
        section_id: &str,
        weekday: Weekday,
        period: PeriodNumber,
        subject: &str,
        teacher_id: Option<String>,
    ) -> TimetableResult<Option<Assignment>> {
        let (_, mut store) = self.open_store(section_id)?;
        if subject.trim().is_empty() {
            store.clear(weekday, period);
        } else {
            let mut a = Assignment::new(section_id, weekday, period, subject);
            a.teacher_id = teacher_id;
            store.upsert(a)?;
        }
        store.save(self.repo)?;
        Ok(store.get(weekday, period).cloned())
    }

    /// Replaces the section with a client-side set. Rows with a blank
    /// subject are dropped; anything else must pass cell validation.
    pub fn save_all(&self, section_id: &str, rows: Vec<Assignment>) -> TimetableResult<usize> {
        let section = self.section(section_id)?;
        let grid = self.resolve(&section)?;
        let mut store = TimetableStore::new(section_id, grid)
            .with_teacher_required(self.policy.require_teacher);
        for a in rows.into_iter().filter(|a| !a.subject.trim().is_empty()) {
            store.upsert(a)?;
        }
        store.save(self.repo)?;
        Ok(store.len())
    }

    pub fn auto_fill(
        &self,
        section_id: &str,
        requirements: &[SubjectRequirement],
        mode: FillMode,
    ) -> TimetableResult<AutoFillOutcome> {
        let section = self.section(section_id)?;
        let grid = self.resolve(&section)?;
        validate_requirements(&grid, requirements)?;
        let catalog = self.catalog(&section.school_id)?;
        let school_assignments = self.repo.load_all_assignments(&section.school_id)?;

        let outcome = AutoFillEngine::new(&grid, &catalog)
            .seed_running_load(self.policy.seed_running_load)
            .run(&FillRequest {
                section_id,
                requirements,
                school_assignments: &school_assignments,
                mode,
            });

        let mut current: Vec<&Assignment> = school_assignments
            .iter()
            .filter(|a| a.section_id == section_id)
            .collect();
        current.sort_by_key(|a| a.slot());
        let unchanged = current.len() == outcome.assignments.len()
            && current.iter().zip(&outcome.assignments).all(|(a, b)| *a == b);
        if unchanged {
            info!("auto-fill left section {section_id} unchanged");
        } else {
            self.repo
                .replace_assignments(section_id, &outcome.assignments)
                .map_err(|e| TimetableError::TransactionFailure(e.to_string()))?;
        }
        Ok(outcome)
    }

    pub fn copy(&self, from_section: &str, to_section: &str, copy_teachers: bool) -> TimetableResult<CopyResult> {
        if from_section != to_section {
            self.section(from_section)?;
            self.section(to_section)?;
        }
        copy_timetable(self.repo, from_section, to_section, copy_teachers)
    }

    pub fn conflicts(&self, school_id: &str) -> TimetableResult<Vec<Conflict>> {
        let catalog = self.catalog(school_id)?;
        let assignments = self.repo.load_all_assignments(school_id)?;
        let mut gridded = Vec::new();
        for section in self.repo.load_sections(school_id)? {
            match self.resolve(&section) {
                Ok(_) => gridded.push(section),
                Err(TimetableError::ConfigMissing { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(ConflictDetector::new(&catalog, &self.policy).detect(&assignments, &gridded))
    }

    pub fn teacher_load(&self, school_id: &str, filter: &LoadFilter) -> TimetableResult<LoadReport> {
        let catalog = self.catalog(school_id)?;
        let assignments = self.repo.load_all_assignments(school_id)?;
        let sections = self.repo.load_sections(school_id)?;
        Ok(LoadAnalyzer::new(&catalog, &self.policy).analyze(&assignments, &sections, filter))
    }
}
