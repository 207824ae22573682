//! Grade report rows and the wire types shared by the gateway and the
//! exporter.

use crate::grading::{average, SupportTrack, Tier, PARTIAL_COUNT};
use crate::merge::GradeEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Assignment metadata (subject taught to a division) sent with reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentInfo {
    pub id: Uuid,
    pub materia_id: Uuid,
    pub materia: String,
    pub division_id: Uuid,
    pub anio: String,
    pub seccion: String,
    pub ciclo_lectivo: i32,
    #[serde(default)]
    pub docente: Option<String>,
}

impl AssignmentInfo {
    /// Human readable division, e.g. `3° A`
    pub fn division_label(&self) -> String {
        division_label(&self.anio, &self.seccion)
    }

    /// `<subject>_<year><section>_Notas.csv`
    pub fn csv_file_name(&self) -> String {
        csv_file_name(&self.materia, &self.anio, &self.seccion)
    }

    pub fn pdf_file_name(&self) -> String {
        format!(
            "Notas_{}_{}{}.pdf",
            sanitize_file_component(&self.materia),
            sanitize_file_component(&self.anio),
            sanitize_file_component(&self.seccion)
        )
    }
}

pub fn division_label(year: &str, section: &str) -> String {
    format!("{}° {}", year.trim().trim_end_matches('°'), section.trim())
}

pub fn csv_file_name(subject: &str, year: &str, section: &str) -> String {
    format!(
        "{}_{}{}_Notas.csv",
        sanitize_file_component(subject),
        sanitize_file_component(year),
        sanitize_file_component(section)
    )
}

/// Replace characters that cannot appear in a download file name
pub fn sanitize_file_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// One fully populated row of a grade report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReportRow {
    pub ordinal: usize,
    pub student_id: Uuid,
    pub name: String,
    pub dni: Option<String>,
    pub intensification: Option<f64>,
    pub intensification_tier: Option<Tier>,
    pub partials: [Option<f64>; PARTIAL_COUNT],
    pub average: Option<f64>,
    pub tier: Option<Tier>,
    pub attendance: f64,
    pub support_track: Option<SupportTrack>,
    pub support_notes: Option<String>,
    pub support_track_tier: Option<Tier>,
    pub observations: String,
    pub final_average: Option<f64>,
}

/// `GET /reports/json` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub report: Vec<GradeReportRow>,
    pub asignacion: AssignmentInfo,
}

/// Build report rows from a merged sheet.
///
/// `first_period` is given for second period reports; the final average is
/// then the mean of the period averages that exist. Without it the final
/// average stays empty.
pub fn build_report_rows(entries: &[GradeEntry], first_period: Option<&[GradeEntry]>) -> Vec<GradeReportRow> {
    let first_averages: Option<HashMap<Uuid, Option<f64>>> = first_period.map(|rows| {
        rows.iter()
            .map(|e| (e.student.id, e.values.average))
            .collect()
    });

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let values = &entry.values;
            let final_average = first_averages.as_ref().and_then(|firsts| {
                let first = firsts.get(&entry.student.id).copied().flatten();
                average(&[first, values.average])
            });

            GradeReportRow {
                ordinal: index + 1,
                student_id: entry.student.id,
                name: entry.student.name.clone(),
                dni: entry.student.dni.clone(),
                intensification: values.intensification,
                intensification_tier: Tier::from_average(values.intensification),
                partials: values.partials,
                average: values.average,
                tier: values.tier,
                attendance: values.attendance,
                support_track: values.support_track,
                support_notes: values.support_notes.clone(),
                support_track_tier: values.support_track_tier,
                observations: values.observations.clone(),
                final_average,
            }
        })
        .collect()
}

/// Score with 2 decimals, empty when absent
pub fn format_score(score: Option<f64>) -> String {
    score.map(|s| format!("{:.2}", s)).unwrap_or_default()
}

/// Average for display, `-` when undefined
pub fn format_average(average: Option<f64>) -> String {
    average.map(|a| format!("{:.2}", a)).unwrap_or_else(|| "-".to_string())
}

/// Attendance percentage without trailing decimals when integral
pub fn format_percentage(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

pub fn format_tier(tier: Option<Tier>) -> String {
    tier.map(|t| t.code().to_string()).unwrap_or_default()
}
