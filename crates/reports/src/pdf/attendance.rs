//! Division attendance report PDF (A4 portrait)

use super::canvas::{Font, Orientation, PdfBuilder, BLACK};
use super::table::{draw_page_numbers, draw_table, Column, TableStyle};
use super::{draw_header_band, DATE_FORMAT};
use crate::attendance::{AttendanceOverview, StudentAttendanceSummary};
use crate::error::Result;
use crate::report::format_percentage;
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct AttendanceReportHeader {
    pub institution: String,
    pub generated_on: NaiveDate,
    pub division: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn columns() -> Vec<Column> {
    vec![
        Column::center("N°"),
        Column::left("Estudiante"),
        Column::left("DNI"),
        Column::center("Presentes"),
        Column::center("Ausentes"),
        Column::center("Tardes"),
        Column::center("Justificadas"),
        Column::center("Asistencia %"),
    ]
}

fn cells(ordinal: usize, summary: &StudentAttendanceSummary) -> Vec<String> {
    vec![
        ordinal.to_string(),
        summary.student.name.clone(),
        summary.student.dni.clone().unwrap_or_default(),
        summary.counts.present.to_string(),
        summary.counts.absent.to_string(),
        summary.counts.late.to_string(),
        summary.counts.justified.to_string(),
        format_percentage(summary.percentage),
    ]
}

fn totals_line(totals: &AttendanceOverview) -> String {
    format!(
        "Totales: {} registros | Presentes {} | Ausentes {} | Tardes {} | Justificadas {} | Asistencia {}%",
        totals.total,
        totals.counts.present,
        totals.counts.absent,
        totals.counts.late,
        totals.counts.justified,
        format_percentage(totals.percentage),
    )
}

/// Per-student attendance of a division over a date range, with a totals line
pub fn attendance_pdf(
    header: &AttendanceReportHeader,
    students: &[StudentAttendanceSummary],
    totals: &AttendanceOverview,
) -> Result<Vec<u8>> {
    let style = TableStyle::default();
    let mut builder = PdfBuilder::a4(Orientation::Portrait);

    let lines = [
        ("Fecha", header.generated_on.format(DATE_FORMAT).to_string()),
        ("División", header.division.clone()),
        (
            "Período",
            format!(
                "{} al {}",
                header.start_date.format(DATE_FORMAT),
                header.end_date.format(DATE_FORMAT)
            ),
        ),
    ];
    let top = draw_header_band(&mut builder, style.margin_mm, &header.institution, "Reporte de Asistencia", &lines);

    let body: Vec<Vec<String>> = students
        .iter()
        .enumerate()
        .map(|(i, s)| cells(i + 1, s))
        .collect();
    let mut y = draw_table(&mut builder, top, &columns(), &body, &style);

    if y + 10.0 > builder.height_mm() - style.bottom_reserve_mm {
        builder.add_page();
        y = style.margin_mm;
    }
    builder
        .current()
        .text(style.margin_mm, y + 7.0, 9.0, Font::Bold, BLACK, &totals_line(totals));

    draw_page_numbers(&mut builder, &style);

    let title = format!("Asistencia {}", header.division);
    builder.finish(&title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::{overview, student_summaries, AttendanceStatus};
    use crate::merge::Student;
    use uuid::Uuid;

    fn header() -> AttendanceReportHeader {
        AttendanceReportHeader {
            institution: "Escuela Secundaria N° 1".to_string(),
            generated_on: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
            division: "2° B".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 6, 30).unwrap(),
        }
    }

    #[test]
    fn test_totals_line() {
        let totals = overview(
            std::iter::repeat(AttendanceStatus::Present)
                .take(40)
                .chain(std::iter::repeat(AttendanceStatus::Absent).take(5))
                .chain(std::iter::repeat(AttendanceStatus::Late).take(5)),
        );
        let line = totals_line(&totals);
        assert!(line.contains("50 registros"));
        assert!(line.contains("Asistencia 90%"));
    }

    #[test]
    fn test_attendance_pdf_loads() {
        let roster: Vec<Student> = (0..5)
            .map(|i| Student {
                id: Uuid::new_v4(),
                name: format!("Alumno {}", i),
                dni: Some(format!("4000000{}", i)),
            })
            .collect();
        let records: Vec<(Uuid, AttendanceStatus)> = roster
            .iter()
            .flat_map(|s| [(s.id, AttendanceStatus::Present), (s.id, AttendanceStatus::Absent)])
            .collect();

        let summaries = student_summaries(&roster, records.clone());
        let totals = overview(records.into_iter().map(|(_, status)| status));
        assert_eq!(cells(1, &summaries[0]).len(), columns().len());

        let bytes = attendance_pdf(&header(), &summaries, &totals).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
