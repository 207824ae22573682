//! Merging a division roster with the stored grade rows of one assignment
//! and period.

use crate::grading::{DerivedGrade, SupportTrack, Tier, PARTIAL_COUNT};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Enrolled student as returned by the roster resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub dni: Option<String>,
}

/// Editable and derived values of one grade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeValues {
    pub partials: [Option<f64>; PARTIAL_COUNT],
    pub attendance: f64,
    pub observations: String,
    pub intensification: Option<f64>,
    pub support_notes: Option<String>,
    pub support_track_tier: Option<Tier>,
    pub average: Option<f64>,
    pub tier: Option<Tier>,
    pub support_track: Option<SupportTrack>,
}

impl Default for GradeValues {
    fn default() -> Self {
        Self {
            partials: [None; PARTIAL_COUNT],
            attendance: 100.0,
            observations: String::new(),
            intensification: None,
            support_notes: None,
            support_track_tier: None,
            average: None,
            tier: None,
            support_track: None,
        }
    }
}

impl GradeValues {
    /// Recompute average, tier and support track from the partials
    pub fn recompute(&mut self) {
        let derived = DerivedGrade::compute(&self.partials);
        self.average = derived.average;
        self.tier = derived.tier;
        self.support_track = derived.support_track;
    }
}

/// One complete row of a grade sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub student: Student,
    pub values: GradeValues,
    /// False for the in-memory default of a student without a stored row
    pub persisted: bool,
}

/// Sort key for names: case and common Spanish diacritics folded
pub fn name_sort_key(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Alphabetical order by name, ties broken by id for a stable output
pub fn compare_students(a: &Student, b: &Student) -> Ordering {
    name_sort_key(&a.name)
        .cmp(&name_sort_key(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Merge the roster with stored rows.
///
/// The output has one entry per distinct roster student, sorted by name.
/// Students without a stored row get the default values. Stored rows for
/// students that are not on the roster are dropped.
pub fn merge_grades<I>(roster: &[Student], stored: I) -> Vec<GradeEntry>
where
    I: IntoIterator<Item = (Uuid, GradeValues)>,
{
    let mut by_student: HashMap<Uuid, GradeValues> = stored.into_iter().collect();
    let mut seen = HashSet::with_capacity(roster.len());
    let mut entries = Vec::with_capacity(roster.len());

    for student in roster {
        if !seen.insert(student.id) {
            continue;
        }

        let entry = match by_student.remove(&student.id) {
            Some(values) => GradeEntry {
                student: student.clone(),
                values,
                persisted: true,
            },
            None => GradeEntry {
                student: student.clone(),
                values: GradeValues::default(),
                persisted: false,
            },
        };
        entries.push(entry);
    }

    if !by_student.is_empty() {
        tracing::debug!(
            dropped = by_student.len(),
            "Ignoring grade rows for students not on the roster"
        );
    }

    entries.sort_by(|a, b| compare_students(&a.student, &b.student));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            dni: None,
        }
    }

    fn graded(partials: [Option<f64>; 4]) -> GradeValues {
        let mut values = GradeValues {
            partials,
            ..GradeValues::default()
        };
        values.recompute();
        values
    }

    #[test]
    fn test_merge_scenario_three_students() {
        let roster = vec![student("Gómez, Ana"), student("Pérez, Luis"), student("Ruiz, Sol")];
        let stored = vec![
            (roster[0].id, graded([Some(8.0), Some(7.0), Some(9.0), Some(6.0)])),
            (roster[1].id, graded([Some(5.0), Some(4.0), None, None])),
        ];

        let merged = merge_grades(&roster, stored);
        assert_eq!(merged.len(), 3);

        assert_eq!(merged[0].values.average, Some(7.5));
        assert_eq!(merged[0].values.tier, Some(Tier::Satisfactory));
        assert!(merged[0].persisted);

        assert_eq!(merged[1].values.average, Some(4.5));
        assert_eq!(merged[1].values.tier, Some(Tier::IncompleteExtendedSupport));

        assert_eq!(merged[2].values.average, None);
        assert_eq!(merged[2].values.tier, None);
        assert_eq!(merged[2].values.attendance, 100.0);
        assert!(merged[2].values.observations.is_empty());
        assert!(!merged[2].persisted);
    }

    #[test]
    fn test_merge_has_one_entry_per_roster_student() {
        let roster: Vec<Student> = ["Zapata", "Acosta", "Medina", "Benítez", "Luna"]
            .iter()
            .map(|n| student(n))
            .collect();

        for graded_count in 0..=roster.len() {
            let stored: Vec<_> = roster
                .iter()
                .take(graded_count)
                .map(|s| (s.id, graded([Some(7.0), None, None, None])))
                .collect();

            let merged = merge_grades(&roster, stored);
            assert_eq!(merged.len(), roster.len());

            let ids: HashSet<Uuid> = merged.iter().map(|e| e.student.id).collect();
            assert_eq!(ids.len(), roster.len());
            assert_eq!(merged.iter().filter(|e| e.persisted).count(), graded_count);

            let names: Vec<&str> = merged.iter().map(|e| e.student.name.as_str()).collect();
            assert_eq!(names, vec!["Acosta", "Benítez", "Luna", "Medina", "Zapata"]);
        }
    }

    #[test]
    fn test_merge_drops_rows_outside_roster() {
        let roster = vec![student("Acosta")];
        let stranger = Uuid::new_v4();
        let merged = merge_grades(&roster, vec![(stranger, graded([Some(9.0), None, None, None]))]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].student.id, roster[0].id);
        assert!(!merged[0].persisted);
    }

    #[test]
    fn test_merge_collapses_duplicate_roster_entries() {
        let acosta = student("Acosta");
        let roster = vec![acosta.clone(), student("Luna"), acosta];
        let merged = merge_grades(&roster, Vec::new());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_name_sort_folds_accents_and_case() {
        assert_eq!(name_sort_key("Álvarez"), "alvarez");
        assert_eq!(name_sort_key("  Muñoz "), "munoz");
        assert!(name_sort_key("Álvarez") < name_sort_key("benítez"));
    }

    #[test]
    fn test_recompute_keeps_derived_in_sync() {
        let mut values = GradeValues::default();
        values.partials[0] = Some(9.0);
        values.recompute();
        assert_eq!(values.tier, Some(Tier::Distinguished));

        values.partials[1] = Some(3.0);
        values.recompute();
        assert_eq!(values.average, Some(6.0));
        assert_eq!(values.tier, Some(Tier::Basic));
        assert_eq!(values.support_track, Some(SupportTrack::Strengthening));
    }
}
