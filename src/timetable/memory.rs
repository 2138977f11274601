//! In-memory repository for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use super::repository::{RepositoryError, RepositoryResult, TimetableRepository};
use super::{Assignment, GradeKey, PeriodSlotTemplate, Section, TeacherRecord};

#[derive(Default)]
struct MemoryData {
    sections: Vec<Section>,
    teachers: BTreeMap<String, Vec<TeacherRecord>>,
    templates: Vec<(String, PeriodSlotTemplate)>,
    assignments: BTreeMap<String, Vec<Assignment>>,
}

#[derive(Default)]
pub struct MemoryRepository {
    data: RefCell<MemoryData>,
    fail_writes: Cell<bool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_section(&self, school_id: &str, id: &str, grade: GradeKey, label: &str) {
        self.data.borrow_mut().sections.push(Section {
            id: id.to_string(),
            school_id: school_id.to_string(),
            grade,
            label: label.to_string(),
        });
    }

    pub fn put_teacher(&self, school_id: &str, id: &str, subjects: &[&str], max: Option<u32>) {
        self.data
            .borrow_mut()
            .teachers
            .entry(school_id.to_string())
            .or_default()
            .push(TeacherRecord {
                id: id.to_string(),
                name: format!("Teacher {id}"),
                subjects: subjects.iter().map(|s| s.to_string()).collect(),
                max_periods_per_week: max,
            });
    }

    pub fn put_templates(&self, school_id: &str, rows: Vec<PeriodSlotTemplate>) {
        let mut data = self.data.borrow_mut();
        data.templates
            .extend(rows.into_iter().map(|r| (school_id.to_string(), r)));
    }

    pub fn put_assignments(&self, section_id: &str, rows: Vec<Assignment>) {
        self.data
            .borrow_mut()
            .assignments
            .insert(section_id.to_string(), rows);
    }

    pub fn assignments_of(&self, section_id: &str) -> Vec<Assignment> {
        self.data
            .borrow()
            .assignments
            .get(section_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl TimetableRepository for MemoryRepository {
    fn load_assignments(&self, section_id: &str) -> RepositoryResult<Vec<Assignment>> {
        Ok(self.assignments_of(section_id))
    }

    fn replace_assignments(
        &self,
        section_id: &str,
        assignments: &[Assignment],
    ) -> RepositoryResult<()> {
        if self.fail_writes.get() {
            return Err(RepositoryError::Write("simulated write failure".to_string()));
        }
        self.put_assignments(section_id, assignments.to_vec());
        Ok(())
    }

    fn load_all_assignments(&self, school_id: &str) -> RepositoryResult<Vec<Assignment>> {
        let data = self.data.borrow();
        Ok(data
            .sections
            .iter()
            .filter(|s| s.school_id == school_id)
            .flat_map(|s| data.assignments.get(&s.id).cloned().unwrap_or_default())
            .collect())
    }

    fn load_teacher_catalog(&self, school_id: &str) -> RepositoryResult<Vec<TeacherRecord>> {
        Ok(self
            .data
            .borrow()
            .teachers
            .get(school_id)
            .cloned()
            .unwrap_or_default())
    }

    fn load_period_templates(
        &self,
        school_id: &str,
        grade_group: &str,
    ) -> RepositoryResult<Vec<PeriodSlotTemplate>> {
        Ok(self
            .data
            .borrow()
            .templates
            .iter()
            .filter(|(school, row)| school == school_id && row.grade_group == grade_group)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn load_section(&self, section_id: &str) -> RepositoryResult<Option<Section>> {
        Ok(self
            .data
            .borrow()
            .sections
            .iter()
            .find(|s| s.id == section_id)
            .cloned())
    }

    fn load_sections(&self, school_id: &str) -> RepositoryResult<Vec<Section>> {
        Ok(self
            .data
            .borrow()
            .sections
            .iter()
            .filter(|s| s.school_id == school_id)
            .cloned()
            .collect())
    }
}
