//! Teacher catalog: qualified subjects and weekly capacity per teacher.
//!
//! Profiles store subjects as a list of comma-joined groups
//! (`["Math, Physics", "Chemistry"]`). They are split, trimmed and flattened
//! once here; nothing downstream re-splits.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use super::error::TimetableResult;
use super::policy::TimetablePolicy;
use super::repository::TimetableRepository;
use super::TeacherRecord;

pub fn normalize_subjects<I, S>(groups: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    groups
        .into_iter()
        .flat_map(|g| {
            g.as_ref()
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTeacher {
    pub id: String,
    pub name: String,
    pub qualified_subjects: BTreeSet<String>,
    pub max_periods_per_week: u32,
}

impl CatalogTeacher {
    pub fn is_qualified(&self, subject: &str) -> bool {
        self.qualified_subjects.contains(subject.trim())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TeacherCatalog {
    teachers: Vec<CatalogTeacher>,
    index: HashMap<String, usize>,
}

impl TeacherCatalog {
    /// Keeps record order. A repeated id keeps its first record.
    pub fn from_records(records: Vec<TeacherRecord>, default_max_periods: u32) -> Self {
        let mut catalog = Self::default();
        for r in records {
            if catalog.index.contains_key(&r.id) {
                continue;
            }
            catalog.index.insert(r.id.clone(), catalog.teachers.len());
            catalog.teachers.push(CatalogTeacher {
                qualified_subjects: normalize_subjects(&r.subjects),
                max_periods_per_week: r.max_periods_per_week.unwrap_or(default_max_periods),
                id: r.id,
                name: r.name,
            });
        }
        catalog
    }

    pub fn load<R: TimetableRepository + ?Sized>(
        repo: &R,
        school_id: &str,
        policy: &TimetablePolicy,
    ) -> TimetableResult<Self> {
        let records = repo.load_teacher_catalog(school_id)?;
        Ok(Self::from_records(records, policy.default_max_periods_per_week))
    }

    pub fn teachers(&self) -> &[CatalogTeacher] {
        &self.teachers
    }

    pub fn get(&self, id: &str) -> Option<&CatalogTeacher> {
        self.index.get(id).map(|i| &self.teachers[*i])
    }

    /// Teachers qualified for `subject`, in catalog order.
    pub fn qualified_for<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a CatalogTeacher> + 'a {
        self.teachers.iter().filter(move |t| t.is_qualified(subject))
    }

    pub fn display_name(&self, id: &str) -> String {
        self.get(id)
            .map(|t| t.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, subjects: &[&str], max: Option<u32>) -> TeacherRecord {
        TeacherRecord {
            id: id.to_string(),
            name: format!("Name {id}"),
            subjects: subjects.iter().map(|s| s.to_string()).collect(),
            max_periods_per_week: max,
        }
    }

    #[test]
    fn subjects_are_split_trimmed_and_flattened() {
        let s = normalize_subjects(["Math, Physics", " Chemistry ,", "Math"]);
        assert_eq!(
            s.into_iter().collect::<Vec<_>>(),
            vec!["Chemistry", "Math", "Physics"]
        );
    }

    #[test]
    fn catalog_keeps_order_and_applies_default_capacity() {
        let c = TeacherCatalog::from_records(
            vec![
                record("t2", &["Math"], Some(20)),
                record("t1", &["English, Math"], None),
                record("t2", &["Art"], Some(5)),
            ],
            30,
        );
        assert_eq!(c.teachers().len(), 2);
        assert_eq!(c.teachers()[0].id, "t2");
        assert_eq!(c.get("t1").map(|t| t.max_periods_per_week), Some(30));
        assert!(!c.get("t2").expect("t2").is_qualified("Art"));
        let math: Vec<_> = c.qualified_for("Math").map(|t| t.id.as_str()).collect();
        assert_eq!(math, vec!["t2", "t1"]);
        assert_eq!(c.display_name("t1"), "Name t1");
        assert_eq!(c.display_name("ghost"), "ghost");
    }
}
