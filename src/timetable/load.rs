//! Per-teacher workload report.

use log::debug;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use super::catalog::TeacherCatalog;
use super::policy::TimetablePolicy;
use super::{rounded_percent, Assignment, GradeKey, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Unassigned,
    Underutilized,
    Optimal,
    Overloaded,
}

impl LoadStatus {
    fn classify(total: u32, max: u32, load_percentage: u32, policy: &TimetablePolicy) -> Self {
        if total == 0 {
            Self::Unassigned
        } else if max == 0 || load_percentage > policy.optimal_max_pct {
            Self::Overloaded
        } else if load_percentage < policy.underutilized_below_pct {
            Self::Underutilized
        } else {
            Self::Optimal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLoad {
    pub teacher_id: String,
    pub teacher_name: String,
    pub total_periods: u32,
    pub max_periods: u32,
    pub load_percentage: u32,
    pub subjects_taught: Vec<String>,
    pub status: LoadStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub teacher_count: u32,
    /// Mean of the rows' percentages, to one decimal place.
    pub average_load_percentage: f64,
    pub overloaded_count: u32,
    pub unassigned_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub teachers: Vec<TeacherLoad>,
    pub summary: LoadSummary,
}

/// Narrows the assignment set before counting. `None` means no filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadFilter {
    pub grade: Option<GradeKey>,
    pub subject: Option<String>,
}

impl LoadFilter {
    fn keeps(&self, a: &Assignment, grades: &HashMap<&str, &GradeKey>) -> bool {
        if let Some(subject) = &self.subject {
            if a.subject.trim() != subject.trim() {
                return false;
            }
        }
        match &self.grade {
            Some(grade) => grades.get(a.section_id.as_str()).is_some_and(|g| *g == grade),
            None => true,
        }
    }
}

pub struct LoadAnalyzer<'a> {
    catalog: &'a TeacherCatalog,
    policy: &'a TimetablePolicy,
}

impl<'a> LoadAnalyzer<'a> {
    pub fn new(catalog: &'a TeacherCatalog, policy: &'a TimetablePolicy) -> Self {
        Self { catalog, policy }
    }

    /// One row per catalog teacher, in catalog order. Assignments naming a
    /// teacher outside the catalog are not reported.
    pub fn analyze(
        &self,
        assignments: &[Assignment],
        sections: &[Section],
        filter: &LoadFilter,
    ) -> LoadReport {
        let grades: HashMap<&str, &GradeKey> =
            sections.iter().map(|s| (s.id.as_str(), &s.grade)).collect();

        let mut per_teacher: HashMap<&str, (u32, BTreeSet<&str>)> = HashMap::new();
        for a in assignments.iter().filter(|a| filter.keeps(a, &grades)) {
            if let Some(teacher) = a.teacher_id.as_deref() {
                let entry = per_teacher.entry(teacher).or_default();
                entry.0 += 1;
                entry.1.insert(a.subject.trim());
            }
        }

        let teachers: Vec<TeacherLoad> = self
            .catalog
            .teachers()
            .iter()
            .map(|t| {
                let (total, subjects) = per_teacher
                    .remove(t.id.as_str())
                    .unwrap_or_default();
                let max = t.max_periods_per_week;
                let load_percentage = rounded_percent(total, max.max(1));
                TeacherLoad {
                    teacher_id: t.id.clone(),
                    teacher_name: self.catalog.display_name(&t.id),
                    total_periods: total,
                    max_periods: max,
                    load_percentage,
                    subjects_taught: subjects.into_iter().map(str::to_string).collect(),
                    status: LoadStatus::classify(total, max, load_percentage, self.policy),
                }
            })
            .collect();

        let summary = summarize(&teachers);
        debug!(
            "load report: {} teachers, average {}%",
            summary.teacher_count, summary.average_load_percentage
        );
        LoadReport { teachers, summary }
    }
}

fn summarize(rows: &[TeacherLoad]) -> LoadSummary {
    let count = rows.len() as u32;
    let sum: u64 = rows.iter().map(|r| u64::from(r.load_percentage)).sum();
    let average_load_percentage = if count == 0 {
        0.0
    } else {
        (sum as f64 * 10.0 / f64::from(count)).round() / 10.0
    };
    LoadSummary {
        teacher_count: count,
        average_load_percentage,
        overloaded_count: rows
            .iter()
            .filter(|r| r.status == LoadStatus::Overloaded)
            .count() as u32,
        unassigned_count: rows
            .iter()
            .filter(|r| r.status == LoadStatus::Unassigned)
            .count() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timetable::TeacherRecord;

    fn catalog(entries: &[(&str, u32)]) -> TeacherCatalog {
        TeacherCatalog::from_records(
            entries
                .iter()
                .map(|(id, max)| TeacherRecord {
                    id: id.to_string(),
                    name: format!("Teacher {id}"),
                    subjects: vec!["Math, Art".to_string()],
                    max_periods_per_week: Some(*max),
                })
                .collect(),
            30,
        )
    }

    fn periods(section: &str, teacher: &str, subject: &str, n: u32) -> Vec<Assignment> {
        (0..n)
            .map(|i| {
                Assignment::new(section, (i / 10 + 1) as u8, (i % 10 + 1) as u8, subject)
                    .with_teacher(teacher)
            })
            .collect()
    }

    fn section(id: &str, grade: u32) -> Section {
        Section {
            id: id.to_string(),
            school_id: "s1".to_string(),
            grade: GradeKey::Numeric(grade),
            label: id.to_string(),
        }
    }

    #[test]
    fn thirty_three_of_thirty_is_overloaded_at_110() {
        let catalog = catalog(&[("t1", 30)]);
        let policy = TimetablePolicy::default();
        let rows = periods("7A", "t1", "Math", 33);
        let report = LoadAnalyzer::new(&catalog, &policy).analyze(&rows, &[], &LoadFilter::default());
        let t = &report.teachers[0];
        assert_eq!(t.total_periods, 33);
        assert_eq!(t.load_percentage, 110);
        assert_eq!(t.status, LoadStatus::Overloaded);
        assert_eq!(report.summary.overloaded_count, 1);
    }

    #[test]
    fn status_buckets_follow_thresholds() {
        let catalog = catalog(&[("a", 10), ("b", 10), ("c", 10), ("d", 10), ("e", 0)]);
        let policy = TimetablePolicy::default();
        let mut rows = periods("7A", "a", "Math", 3);
        rows.extend(periods("7B", "b", "Math", 4));
        rows.extend(periods("7C", "c", "Math", 10));
        rows.extend(periods("7D", "e", "Art", 1));
        let report = LoadAnalyzer::new(&catalog, &policy).analyze(&rows, &[], &LoadFilter::default());
        let statuses: Vec<_> = report.teachers.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                LoadStatus::Underutilized,
                LoadStatus::Optimal,
                LoadStatus::Optimal,
                LoadStatus::Unassigned,
                LoadStatus::Overloaded,
            ]
        );
        assert_eq!(report.teachers[4].load_percentage, 100);
        assert_eq!(report.summary.unassigned_count, 1);
        assert_eq!(report.summary.overloaded_count, 1);
        // (30 + 40 + 100 + 0 + 100) / 5
        assert_eq!(report.summary.average_load_percentage, 54.0);
    }

    #[test]
    fn average_keeps_one_decimal() {
        let row = |pct: u32| TeacherLoad {
            teacher_id: format!("t{pct}"),
            teacher_name: String::new(),
            total_periods: pct,
            max_periods: 100,
            load_percentage: pct,
            subjects_taught: Vec::new(),
            status: LoadStatus::Optimal,
        };
        assert_eq!(summarize(&[row(33), row(34), row(34)]).average_load_percentage, 33.7);
        assert_eq!(summarize(&[row(50), row(55)]).average_load_percentage, 52.5);
        assert_eq!(summarize(&[]).average_load_percentage, 0.0);
    }

    #[test]
    fn filters_intersect_before_counting() {
        let catalog = catalog(&[("t1", 20)]);
        let policy = TimetablePolicy::default();
        let mut rows = periods("7A", "t1", "Math", 4);
        rows.extend(periods("9A", "t1", "Art", 6));
        let sections = [section("7A", 7), section("9A", 9)];
        let analyzer = LoadAnalyzer::new(&catalog, &policy);

        let all = analyzer.analyze(&rows, &sections, &LoadFilter::default());
        assert_eq!(all.teachers[0].total_periods, 10);
        assert_eq!(all.teachers[0].subjects_taught, vec!["Art", "Math"]);

        let grade7 = analyzer.analyze(
            &rows,
            &sections,
            &LoadFilter {
                grade: Some(GradeKey::Numeric(7)),
                subject: None,
            },
        );
        assert_eq!(grade7.teachers[0].total_periods, 4);

        let art = analyzer.analyze(
            &rows,
            &sections,
            &LoadFilter {
                grade: Some(GradeKey::Numeric(7)),
                subject: Some("Art".to_string()),
            },
        );
        assert_eq!(art.teachers[0].status, LoadStatus::Unassigned);
    }
}
