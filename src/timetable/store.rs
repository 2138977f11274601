//! One section's assignment set.
//!
//! Edits happen in memory; `save` hands the whole set to the repository as a
//! single replace. A failed save leaves the in-memory set as it was so the
//! caller can retry.

use log::{info, warn};
use std::collections::BTreeMap;

use super::error::{TimetableError, TimetableResult};
use super::grid::ResolvedGrid;
use super::repository::TimetableRepository;
use super::{Assignment, PeriodNumber, SlotKey, Weekday};

#[derive(Debug, Clone)]
pub struct TimetableStore {
    section_id: String,
    grid: ResolvedGrid,
    cells: BTreeMap<SlotKey, Assignment>,
    require_teacher: bool,
}

impl TimetableStore {
    pub fn new(section_id: impl Into<String>, grid: ResolvedGrid) -> Self {
        Self {
            section_id: section_id.into(),
            grid,
            cells: BTreeMap::new(),
            require_teacher: false,
        }
    }

    /// Loads the stored set as-is. Rows outside the current grid (for example
    /// after a copy from a differently shaped grade) are kept, not validated.
    pub fn load<R: TimetableRepository + ?Sized>(
        repo: &R,
        section_id: &str,
        grid: ResolvedGrid,
    ) -> TimetableResult<Self> {
        let mut store = Self::new(section_id, grid);
        for a in repo.load_assignments(section_id)? {
            store.cells.insert(a.slot(), a);
        }
        Ok(store)
    }

    pub fn with_teacher_required(mut self, required: bool) -> Self {
        self.require_teacher = required;
        self
    }

    pub fn grid(&self) -> &ResolvedGrid {
        &self.grid
    }

    pub fn get(&self, weekday: Weekday, period: PeriodNumber) -> Option<&Assignment> {
        self.cells.get(&(weekday, period))
    }

    pub fn upsert(&mut self, mut assignment: Assignment) -> TimetableResult<()> {
        let (weekday, period) = assignment.slot();
        let Some(slot) = self.grid.slot(weekday, period) else {
            return Err(TimetableError::validation(format!(
                "weekday {weekday} period {period} is not part of the {} timing",
                self.grid.grade_group
            )));
        };
        if slot.is_break {
            warn!(
                "rejected write to break slot {weekday}/{period} in section {}",
                self.section_id
            );
            return Err(TimetableError::validation(format!(
                "weekday {weekday} period {period} is a break ({})",
                slot.name
            )));
        }
        let subject = assignment.subject.trim().to_string();
        if subject.is_empty() {
            return Err(TimetableError::validation("subject is required"));
        }
        let teacher_id = assignment
            .teacher_id
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if self.require_teacher && teacher_id.is_none() {
            return Err(TimetableError::validation(format!(
                "weekday {weekday} period {period} needs a teacher"
            )));
        }
        assignment.section_id = self.section_id.clone();
        assignment.subject = subject;
        assignment.teacher_id = teacher_id;
        self.cells.insert((weekday, period), assignment);
        Ok(())
    }

    pub fn clear(&mut self, weekday: Weekday, period: PeriodNumber) -> Option<Assignment> {
        self.cells.remove(&(weekday, period))
    }

    /// Assignments in (weekday, period) order.
    pub fn list(&self) -> Vec<Assignment> {
        self.cells.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn save<R: TimetableRepository + ?Sized>(&self, repo: &R) -> TimetableResult<()> {
        let rows = self.list();
        repo.replace_assignments(&self.section_id, &rows)
            .map_err(|e| TimetableError::TransactionFailure(e.to_string()))?;
        info!(
            "saved {} assignments for section {}",
            rows.len(),
            self.section_id
        );
        Ok(())
    }
}
