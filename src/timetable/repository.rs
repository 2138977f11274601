//! Persistence boundary for the timetable core.
//!
//! Implementations are synchronous. `replace_assignments` must be atomic:
//! either the section's whole assignment set is swapped, or nothing changes.

use super::{Assignment, PeriodSlotTemplate, Section, TeacherRecord};

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

pub trait TimetableRepository {
    fn load_assignments(&self, section_id: &str) -> RepositoryResult<Vec<Assignment>>;

    /// Delete-then-insert of one section's assignments in a single transaction.
    fn replace_assignments(
        &self,
        section_id: &str,
        assignments: &[Assignment],
    ) -> RepositoryResult<()>;

    fn load_all_assignments(&self, school_id: &str) -> RepositoryResult<Vec<Assignment>>;

    /// Teachers in catalog order.
    fn load_teacher_catalog(&self, school_id: &str) -> RepositoryResult<Vec<TeacherRecord>>;

    fn load_period_templates(
        &self,
        school_id: &str,
        grade_group: &str,
    ) -> RepositoryResult<Vec<PeriodSlotTemplate>>;

    fn load_section(&self, section_id: &str) -> RepositoryResult<Option<Section>>;

    /// Sections of a school in display order.
    fn load_sections(&self, school_id: &str) -> RepositoryResult<Vec<Section>>;
}
