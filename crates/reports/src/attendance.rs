//! Attendance aggregation
//!
//! Division level records (taken by the preceptor) carry no subject; subject
//! teachers record their own rows for the same student and date. Counts and
//! alerts are computed from division level records only, discrepancies
//! compare both kinds.

use crate::grading::round2;
use crate::merge::{compare_students, Student};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Absence count from which a student is critical
pub const CRITICAL_ABSENCES: u32 = 25;

/// Absence count from which a student is on alert
pub const ALERT_ABSENCES: u32 = 15;

/// Absence count from which a student needs caution
pub const CAUTION_ABSENCES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "presente", alias = "present")]
    Present,
    #[serde(rename = "ausente", alias = "absent")]
    Absent,
    #[serde(rename = "tarde", alias = "late")]
    Late,
    #[serde(rename = "justificado", alias = "justified")]
    Justified,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "presente",
            AttendanceStatus::Absent => "ausente",
            AttendanceStatus::Late => "tarde",
            AttendanceStatus::Justified => "justificado",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "presente" | "present" => Ok(AttendanceStatus::Present),
            "ausente" | "absent" => Ok(AttendanceStatus::Absent),
            "tarde" | "late" => Ok(AttendanceStatus::Late),
            "justificado" | "justified" => Ok(AttendanceStatus::Justified),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

/// Absence risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Normal,
    Caution,
    Alert,
    Critical,
}

impl RiskTier {
    pub fn from_absences(absences: u32) -> Self {
        if absences >= CRITICAL_ABSENCES {
            RiskTier::Critical
        } else if absences >= ALERT_ABSENCES {
            RiskTier::Alert
        } else if absences >= CAUTION_ABSENCES {
            RiskTier::Caution
        } else {
            RiskTier::Normal
        }
    }
}

/// Status counts over a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCounts {
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    pub justified: u32,
}

impl AttendanceCounts {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Justified => self.justified += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.present + self.absent + self.late + self.justified
    }

    /// `(present + late) / total` as a percentage, 0 for an empty set
    pub fn percentage(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        round2((self.present + self.late) as f64 / total as f64 * 100.0)
    }
}

impl FromIterator<AttendanceStatus> for AttendanceCounts {
    fn from_iter<T: IntoIterator<Item = AttendanceStatus>>(iter: T) -> Self {
        let mut counts = AttendanceCounts::default();
        for status in iter {
            counts.record(status);
        }
        counts
    }
}

/// Division overview over a date range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendanceOverview {
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    pub total: u32,
    pub percentage: f64,
}

pub fn overview<I>(statuses: I) -> AttendanceOverview
where
    I: IntoIterator<Item = AttendanceStatus>,
{
    let counts: AttendanceCounts = statuses.into_iter().collect();
    AttendanceOverview {
        counts,
        total: counts.total(),
        percentage: counts.percentage(),
    }
}

/// A roster student with their absence count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAlert {
    #[serde(flatten)]
    pub student: Student,
    pub faltas: u32,
    pub nivel: RiskTier,
}

/// Count absences per roster student and assign a risk tier.
///
/// Sorted by absences, highest first, then by name. Records of students
/// outside the roster are ignored.
pub fn absence_alerts<I>(roster: &[Student], records: I) -> Vec<StudentAlert>
where
    I: IntoIterator<Item = (Uuid, AttendanceStatus)>,
{
    let mut absences: HashMap<Uuid, u32> = HashMap::new();
    for (student_id, status) in records {
        if status == AttendanceStatus::Absent {
            *absences.entry(student_id).or_default() += 1;
        }
    }

    let mut alerts: Vec<StudentAlert> = dedup_roster(roster)
        .into_iter()
        .map(|student| {
            let faltas = absences.get(&student.id).copied().unwrap_or(0);
            StudentAlert {
                student: student.clone(),
                faltas,
                nivel: RiskTier::from_absences(faltas),
            }
        })
        .collect();

    alerts.sort_by(|a, b| {
        b.faltas
            .cmp(&a.faltas)
            .then_with(|| compare_students(&a.student, &b.student))
    });
    alerts
}

/// Per-student counts for the division attendance report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAttendanceSummary {
    #[serde(flatten)]
    pub student: Student,
    #[serde(flatten)]
    pub counts: AttendanceCounts,
    pub percentage: f64,
}

pub fn student_summaries<I>(roster: &[Student], records: I) -> Vec<StudentAttendanceSummary>
where
    I: IntoIterator<Item = (Uuid, AttendanceStatus)>,
{
    let mut counts: HashMap<Uuid, AttendanceCounts> = HashMap::new();
    for (student_id, status) in records {
        counts.entry(student_id).or_default().record(status);
    }

    let mut students = dedup_roster(roster);
    students.sort_by(|a, b| compare_students(a, b));

    students
        .into_iter()
        .map(|student| {
            let c = counts.get(&student.id).copied().unwrap_or_default();
            StudentAttendanceSummary {
                student: student.clone(),
                counts: c,
                percentage: c.percentage(),
            }
        })
        .collect()
}

/// One subject in a discrepancy entry; `estado` is null when the subject
/// teacher has not recorded the student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectStatus {
    pub materia: String,
    pub estado: Option<AttendanceStatus>,
}

/// A student whose subject records do not match the preceptor record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub estudiante_id: Uuid,
    pub nombre: String,
    pub preceptor: Option<AttendanceStatus>,
    pub materias: Vec<SubjectStatus>,
}

/// Compare division level and subject level records of a single date.
///
/// A student is reported when any subject record differs from the preceptor
/// record, when subject records exist but the preceptor record is missing,
/// or when the preceptor recorded the student and one of the
/// `assigned_subjects` has no record. Every subject record of a reported
/// student is listed along with the missing subjects, sorted by name.
pub fn discrepancies<D, S>(
    roster: &[Student],
    assigned_subjects: &[String],
    division_records: D,
    subject_records: S,
) -> Vec<Discrepancy>
where
    D: IntoIterator<Item = (Uuid, AttendanceStatus)>,
    S: IntoIterator<Item = (Uuid, String, AttendanceStatus)>,
{
    let preceptor: HashMap<Uuid, AttendanceStatus> = division_records.into_iter().collect();

    let mut by_student: HashMap<Uuid, BTreeMap<String, AttendanceStatus>> = HashMap::new();
    for (student_id, subject, status) in subject_records {
        by_student.entry(student_id).or_default().insert(subject, status);
    }

    let no_records = BTreeMap::new();
    let mut students = dedup_roster(roster);
    students.sort_by(|a, b| compare_students(a, b));

    students
        .into_iter()
        .filter_map(|student| {
            let recorded = by_student.get(&student.id).unwrap_or(&no_records);
            let division_status = preceptor.get(&student.id).copied();

            let mut materias: BTreeMap<String, Option<AttendanceStatus>> =
                recorded.iter().map(|(name, status)| (name.clone(), Some(*status))).collect();

            let disagrees = match division_status {
                None => !recorded.is_empty(),
                Some(expected) => {
                    for subject in assigned_subjects {
                        materias.entry(subject.clone()).or_insert(None);
                    }
                    materias.values().any(|s| *s != Some(expected))
                }
            };
            if !disagrees {
                return None;
            }

            Some(Discrepancy {
                estudiante_id: student.id,
                nombre: student.name.clone(),
                preceptor: division_status,
                materias: materias
                    .into_iter()
                    .map(|(materia, estado)| SubjectStatus { materia, estado })
                    .collect(),
            })
        })
        .collect()
}

/// Weekdays between `start` and `end`, both inclusive
pub fn school_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn dedup_roster(roster: &[Student]) -> Vec<&Student> {
    let mut seen = std::collections::HashSet::with_capacity(roster.len());
    roster.iter().filter(|s| seen.insert(s.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.to_string(),
            dni: Some("40111222".to_string()),
        }
    }

    fn repeat(status: AttendanceStatus, n: usize) -> impl Iterator<Item = AttendanceStatus> {
        std::iter::repeat(status).take(n)
    }

    #[test]
    fn test_risk_tier_thresholds() {
        let expected = [
            (0, RiskTier::Normal),
            (9, RiskTier::Normal),
            (10, RiskTier::Caution),
            (14, RiskTier::Caution),
            (15, RiskTier::Alert),
            (24, RiskTier::Alert),
            (25, RiskTier::Critical),
            (30, RiskTier::Critical),
        ];
        for (absences, tier) in expected {
            assert_eq!(RiskTier::from_absences(absences), tier, "absences {}", absences);
        }
    }

    #[test]
    fn test_overview_percentage() {
        let statuses = repeat(AttendanceStatus::Present, 40)
            .chain(repeat(AttendanceStatus::Absent, 5))
            .chain(repeat(AttendanceStatus::Late, 5));

        let result = overview(statuses);
        assert_eq!(result.total, 50);
        assert_eq!(result.counts.present, 40);
        assert_eq!(result.counts.absent, 5);
        assert_eq!(result.counts.late, 5);
        assert_eq!(result.counts.justified, 0);
        assert_eq!(result.percentage, 90.0);
    }

    #[test]
    fn test_overview_empty_range() {
        let result = overview(Vec::new());
        assert_eq!(result.total, 0);
        assert_eq!(result.percentage, 0.0);
    }

    #[test]
    fn test_justified_counts_against_percentage() {
        let counts: AttendanceCounts = [AttendanceStatus::Present, AttendanceStatus::Justified]
            .into_iter()
            .collect();
        assert_eq!(counts.percentage(), 50.0);
    }

    #[test]
    fn test_absence_alerts_sorted_by_absences() {
        let roster = vec![student("Acosta"), student("Luna"), student("Medina")];
        let mut records = Vec::new();
        records.extend(repeat(AttendanceStatus::Absent, 12).map(|s| (roster[1].id, s)));
        records.extend(repeat(AttendanceStatus::Absent, 26).map(|s| (roster[2].id, s)));
        records.extend(repeat(AttendanceStatus::Late, 30).map(|s| (roster[0].id, s)));
        records.push((Uuid::new_v4(), AttendanceStatus::Absent));

        let alerts = absence_alerts(&roster, records);
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].student.name, "Medina");
        assert_eq!(alerts[0].faltas, 26);
        assert_eq!(alerts[0].nivel, RiskTier::Critical);
        assert_eq!(alerts[1].nivel, RiskTier::Caution);
        assert_eq!(alerts[2].faltas, 0);
        assert_eq!(alerts[2].nivel, RiskTier::Normal);
    }

    #[test]
    fn test_alert_serializes_flat() {
        let alert = StudentAlert {
            student: student("Acosta"),
            faltas: 3,
            nivel: RiskTier::Normal,
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["nombre"], "Acosta");
        assert_eq!(json["faltas"], 3);
        assert_eq!(json["nivel"], "normal");
    }

    #[test]
    fn test_discrepancies() {
        let roster = vec![student("Acosta"), student("Luna"), student("Medina"), student("Zapata")];
        let division = vec![
            (roster[0].id, AttendanceStatus::Present),
            (roster[1].id, AttendanceStatus::Absent),
            (roster[3].id, AttendanceStatus::Present),
        ];
        let subjects = vec![
            // agrees with preceptor
            (roster[0].id, "Matemática".to_string(), AttendanceStatus::Present),
            // disagrees
            (roster[1].id, "Lengua".to_string(), AttendanceStatus::Absent),
            (roster[1].id, "Historia".to_string(), AttendanceStatus::Present),
            // no preceptor record
            (roster[2].id, "Lengua".to_string(), AttendanceStatus::Late),
        ];

        let result = discrepancies(&roster, &[], division, subjects);
        assert_eq!(result.len(), 2);

        assert_eq!(result[0].nombre, "Luna");
        assert_eq!(result[0].preceptor, Some(AttendanceStatus::Absent));
        let materias: Vec<&str> = result[0].materias.iter().map(|m| m.materia.as_str()).collect();
        assert_eq!(materias, vec!["Historia", "Lengua"]);

        assert_eq!(result[1].nombre, "Medina");
        assert_eq!(result[1].preceptor, None);
        assert_eq!(result[1].materias[0].estado, Some(AttendanceStatus::Late));
    }

    #[test]
    fn test_discrepancies_report_missing_subject_records() {
        let roster = vec![student("Acosta"), student("Luna"), student("Medina")];
        let assigned = vec!["Lengua".to_string(), "Matemática".to_string()];
        let division = vec![
            (roster[0].id, AttendanceStatus::Absent),
            (roster[1].id, AttendanceStatus::Absent),
        ];
        let subjects = vec![
            (roster[1].id, "Lengua".to_string(), AttendanceStatus::Absent),
            (roster[1].id, "Matemática".to_string(), AttendanceStatus::Absent),
        ];

        let result = discrepancies(&roster, &assigned, division, subjects);

        // Luna matches on every subject, Medina has no records at all
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].nombre, "Acosta");
        assert_eq!(result[0].preceptor, Some(AttendanceStatus::Absent));
        assert_eq!(
            result[0].materias,
            vec![
                SubjectStatus { materia: "Lengua".to_string(), estado: None },
                SubjectStatus { materia: "Matemática".to_string(), estado: None },
            ]
        );

        let json = serde_json::to_value(&result[0]).unwrap();
        assert!(json["materias"][0]["estado"].is_null());
    }

    #[test]
    fn test_discrepancies_partial_subject_records() {
        let roster = vec![student("Luna")];
        let assigned = vec!["Historia".to_string(), "Lengua".to_string()];
        let division = vec![(roster[0].id, AttendanceStatus::Present)];
        let subjects = vec![(roster[0].id, "Lengua".to_string(), AttendanceStatus::Present)];

        let result = discrepancies(&roster, &assigned, division, subjects);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].materias[0].materia, "Historia");
        assert_eq!(result[0].materias[0].estado, None);
        assert_eq!(result[0].materias[1].estado, Some(AttendanceStatus::Present));
    }

    #[test]
    fn test_student_summaries() {
        let roster = vec![student("Luna"), student("Acosta")];
        let records = vec![
            (roster[0].id, AttendanceStatus::Present),
            (roster[0].id, AttendanceStatus::Absent),
            (roster[1].id, AttendanceStatus::Late),
        ];
        let summaries = student_summaries(&roster, records);
        assert_eq!(summaries[0].student.name, "Acosta");
        assert_eq!(summaries[0].percentage, 100.0);
        assert_eq!(summaries[1].counts.total(), 2);
        assert_eq!(summaries[1].percentage, 50.0);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Presente".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Present));
        assert_eq!("absent".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Absent));
        assert!("perhaps".parse::<AttendanceStatus>().is_err());

        let parsed: AttendanceStatus = serde_json::from_str("\"justified\"").unwrap();
        assert_eq!(parsed, AttendanceStatus::Justified);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"justificado\"");
    }

    #[test]
    fn test_school_days_skip_weekends() {
        // 2026-03-06 is a Friday
        let start = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let days = school_days(start, end);
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], start);
        assert_eq!(days[1], NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());

        assert!(school_days(end, start).is_empty());
    }
}
