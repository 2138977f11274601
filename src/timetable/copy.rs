//! Copies one section's timetable onto another.
//!
//! The destination set is replaced wholesale in one repository call. Grid
//! shape is not checked here; rows that fall outside the destination's timing
//! show up as off-grid cells when the destination is next rendered.

use log::info;
use serde::Serialize;

use super::error::{TimetableError, TimetableResult};
use super::repository::TimetableRepository;
use super::Assignment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyResult {
    pub success: bool,
    pub periods_copied: u32,
    pub message: String,
}

pub fn copy_timetable<R: TimetableRepository + ?Sized>(
    repo: &R,
    from_section: &str,
    to_section: &str,
    copy_teachers: bool,
) -> TimetableResult<CopyResult> {
    if from_section == to_section {
        return Err(TimetableError::SameSection(from_section.to_string()));
    }
    let rows: Vec<Assignment> = repo
        .load_assignments(from_section)?
        .into_iter()
        .map(|a| Assignment {
            section_id: to_section.to_string(),
            teacher_id: if copy_teachers { a.teacher_id } else { None },
            ..a
        })
        .collect();

    repo.replace_assignments(to_section, &rows)
        .map_err(|e| TimetableError::TransactionFailure(e.to_string()))?;

    let periods_copied = rows.len() as u32;
    info!("copied {periods_copied} periods from section {from_section} to {to_section}");
    Ok(CopyResult {
        success: true,
        periods_copied,
        message: format!(
            "Copied {periods_copied} periods{}",
            if copy_teachers { " with teachers" } else { "" }
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::memory::MemoryRepository;

    fn seed(repo: &MemoryRepository) {
        repo.put_assignments(
            "A",
            (1..=5)
                .map(|p| Assignment::new("A", 1, p, "Math").with_teacher("t1"))
                .collect(),
        );
        repo.put_assignments(
            "B",
            vec![
                Assignment::new("B", 2, 1, "Art").with_teacher("t2"),
                Assignment::new("B", 2, 2, "Art"),
            ],
        );
    }

    #[test]
    fn copy_without_teachers_replaces_destination() {
        let repo = MemoryRepository::new();
        seed(&repo);
        let result = copy_timetable(&repo, "A", "B", false).expect("copy");
        assert_eq!(result.periods_copied, 5);
        let b = repo.assignments_of("B");
        assert_eq!(b.len(), 5);
        assert!(b.iter().all(|a| a.teacher_id.is_none() && a.section_id == "B"));
        assert_eq!(repo.assignments_of("A").len(), 5);
    }

    #[test]
    fn copy_with_teachers_keeps_them() {
        let repo = MemoryRepository::new();
        seed(&repo);
        copy_timetable(&repo, "A", "B", true).expect("copy");
        assert!(repo
            .assignments_of("B")
            .iter()
            .all(|a| a.teacher_id.as_deref() == Some("t1")));
    }

    #[test]
    fn same_section_is_refused_and_failed_write_leaves_destination() {
        let repo = MemoryRepository::new();
        seed(&repo);
        let e = copy_timetable(&repo, "A", "A", false).unwrap_err();
        assert_eq!(e.code(), "same_section");

        repo.set_fail_writes(true);
        let e = copy_timetable(&repo, "A", "B", false).unwrap_err();
        assert_eq!(e.code(), "transaction_failed");
        assert_eq!(repo.assignments_of("B").len(), 2);
    }
}
