//! CSV rendering of grade reports

use crate::error::{ReportError, Result};
use crate::report::{format_percentage, format_score, format_tier, GradeReportRow};

/// Column order of the grade CSV
pub const GRADE_CSV_HEADERS: [&str; 16] = [
    "N°",
    "Estudiante",
    "Intensificación",
    "Logro Intensificación",
    "P1",
    "P2",
    "P3",
    "P4",
    "Promedio",
    "Logro",
    "Asistencia %",
    "Trayecto",
    "Detalle Trayecto",
    "Logro Trayecto",
    "Observaciones",
    "Promedio Final",
];

/// Fields of one row in `GRADE_CSV_HEADERS` order; absent values are empty
pub fn grade_csv_fields(row: &GradeReportRow) -> Vec<String> {
    let mut fields = Vec::with_capacity(GRADE_CSV_HEADERS.len());
    fields.push(row.ordinal.to_string());
    fields.push(row.name.clone());
    fields.push(format_score(row.intensification));
    fields.push(format_tier(row.intensification_tier));
    fields.extend(row.partials.iter().map(|p| format_score(*p)));
    fields.push(format_score(row.average));
    fields.push(format_tier(row.tier));
    fields.push(format_percentage(row.attendance));
    fields.push(row.support_track.map(|t| t.label().to_string()).unwrap_or_default());
    fields.push(row.support_notes.clone().unwrap_or_default());
    fields.push(format_tier(row.support_track_tier));
    fields.push(row.observations.clone());
    fields.push(format_score(row.final_average));
    fields
}

/// Render the full CSV document, header included.
///
/// Fields containing a comma, a quote or a line break are quoted.
pub fn grades_csv(rows: &[GradeReportRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(GRADE_CSV_HEADERS)?;
    for row in rows {
        writer.write_record(grade_csv_fields(row))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))?;

    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{SupportTrack, Tier};
    use uuid::Uuid;

    fn row(name: &str, observations: &str) -> GradeReportRow {
        GradeReportRow {
            ordinal: 1,
            student_id: Uuid::new_v4(),
            name: name.to_string(),
            dni: None,
            intensification: None,
            intensification_tier: None,
            partials: [Some(8.0), Some(7.0), Some(9.0), Some(6.0)],
            average: Some(7.5),
            tier: Some(Tier::Satisfactory),
            attendance: 100.0,
            support_track: Some(SupportTrack::Deepening),
            support_notes: None,
            support_track_tier: None,
            observations: observations.to_string(),
            final_average: None,
        }
    }

    #[test]
    fn test_field_layout() {
        let fields = grade_csv_fields(&row("Acosta", ""));
        assert_eq!(fields.len(), GRADE_CSV_HEADERS.len());
        assert_eq!(fields[1], "Acosta");
        assert_eq!(fields[2], "");
        assert_eq!(fields[4], "8.00");
        assert_eq!(fields[8], "7.50");
        assert_eq!(fields[9], "LS");
        assert_eq!(fields[10], "100");
        assert_eq!(fields[11], "Profundización");
        assert_eq!(fields[15], "");
    }

    #[test]
    fn test_commas_are_quoted() {
        let csv = grades_csv(&[row("Acosta, Ana", "Entrega tarde, recupera")]).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert!(line.contains("\"Acosta, Ana\""));
        assert!(line.contains("\"Entrega tarde, recupera\""));
        assert!(!line.contains("\"LS\""));
    }

    #[test]
    fn test_resplit_recovers_field_count() {
        let rows = vec![
            row("Acosta, Ana", "Muy bien, sigue así"),
            row("Luna", "Dijo \"presente\""),
        ];
        let csv = grades_csv(&rows).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(csv.as_bytes());

        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), GRADE_CSV_HEADERS.len());

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.len(), GRADE_CSV_HEADERS.len());
        }
        assert_eq!(&records[0][1], "Acosta, Ana");
        assert_eq!(&records[1][14], "Dijo \"presente\"");
    }

    #[test]
    fn test_header_only_for_empty_report() {
        let csv = grades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("N°,Estudiante,"));
    }
}
