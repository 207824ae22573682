//! Grade report PDF (A4 landscape)

use super::canvas::{Orientation, PdfBuilder};
use super::table::{draw_page_numbers, draw_table, Column, TableStyle};
use super::{draw_header_band, DATE_FORMAT};
use crate::error::Result;
use crate::report::{format_average, format_percentage, format_score, format_tier, GradeReportRow};
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct GradeReportHeader {
    pub institution: String,
    pub generated_on: NaiveDate,
    pub division: String,
    pub subject: String,
    pub period: u8,
    pub teacher: Option<String>,
}

fn columns() -> Vec<Column> {
    vec![
        Column::center("N°"),
        Column::left("Estudiante"),
        Column::center("Int."),
        Column::center("Logro Int."),
        Column::center("P1"),
        Column::center("P2"),
        Column::center("P3"),
        Column::center("P4"),
        Column::center("Prom."),
        Column::center("Logro"),
        Column::center("Asist. %"),
        Column::left("Trayecto"),
        Column::left("Detalle"),
        Column::center("Logro Tray."),
        Column::left("Observaciones"),
        Column::center("Final"),
    ]
}

fn cells(row: &GradeReportRow) -> Vec<String> {
    let mut cells = vec![
        row.ordinal.to_string(),
        row.name.clone(),
        format_score(row.intensification),
        format_tier(row.intensification_tier),
    ];
    cells.extend(row.partials.iter().map(|p| format_score(*p)));
    cells.extend([
        format_average(row.average),
        format_tier(row.tier),
        format_percentage(row.attendance),
        row.support_track.map(|t| t.label().to_string()).unwrap_or_default(),
        row.support_notes.clone().unwrap_or_default(),
        format_tier(row.support_track_tier),
        row.observations.clone(),
        format_score(row.final_average),
    ]);
    cells
}

/// Render the grade table of one assignment and period
pub fn grades_pdf(header: &GradeReportHeader, rows: &[GradeReportRow]) -> Result<Vec<u8>> {
    let style = TableStyle::default();
    let mut builder = PdfBuilder::a4(Orientation::Landscape);

    let mut lines = vec![
        ("Fecha", header.generated_on.format(DATE_FORMAT).to_string()),
        ("División", header.division.clone()),
        ("Materia", header.subject.clone()),
        ("Cuatrimestre", header.period.to_string()),
    ];
    if let Some(teacher) = &header.teacher {
        lines.push(("Docente", teacher.clone()));
    }

    let top = draw_header_band(&mut builder, style.margin_mm, &header.institution, "Planilla de Calificaciones", &lines);

    let body: Vec<Vec<String>> = rows.iter().map(cells).collect();
    draw_table(&mut builder, top, &columns(), &body, &style);
    draw_page_numbers(&mut builder, &style);

    let title = format!("Calificaciones {} {}", header.subject, header.division);
    builder.finish(&title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{SupportTrack, Tier};
    use uuid::Uuid;

    fn header() -> GradeReportHeader {
        GradeReportHeader {
            institution: "Escuela Secundaria N° 1".to_string(),
            generated_on: NaiveDate::from_ymd_opt(2026, 7, 10).unwrap(),
            division: "3° A".to_string(),
            subject: "Matemática".to_string(),
            period: 1,
            teacher: Some("Prof. Díaz".to_string()),
        }
    }

    fn row(ordinal: usize) -> GradeReportRow {
        GradeReportRow {
            ordinal,
            student_id: Uuid::new_v4(),
            name: format!("Estudiante {}", ordinal),
            dni: None,
            intensification: None,
            intensification_tier: None,
            partials: [Some(8.0), Some(7.0), None, None],
            average: Some(7.5),
            tier: Some(Tier::Satisfactory),
            attendance: 95.0,
            support_track: Some(SupportTrack::Deepening),
            support_notes: None,
            support_track_tier: None,
            observations: String::new(),
            final_average: None,
        }
    }

    #[test]
    fn test_cells_match_columns() {
        assert_eq!(cells(&row(1)).len(), columns().len());
        let mut empty = row(2);
        empty.average = None;
        assert_eq!(cells(&empty)[8], "-");
    }

    #[test]
    fn test_grades_pdf_single_page() {
        let rows: Vec<GradeReportRow> = (1..=10).map(row).collect();
        let bytes = grades_pdf(&header(), &rows).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_grades_pdf_paginates_large_divisions() {
        let rows: Vec<GradeReportRow> = (1..=60).map(row).collect();
        let bytes = grades_pdf(&header(), &rows).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 2);
    }

    #[test]
    fn test_grades_pdf_without_rows() {
        let bytes = grades_pdf(&header(), &[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
