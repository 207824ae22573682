//! Absence citation letter addressed to a student's family

use super::canvas::{wrap_text, Align, Font, Orientation, PdfBuilder, BLACK};
use super::DATE_FORMAT;
use crate::error::{ReportError, Result};
use crate::report::sanitize_file_component;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const MARGIN_MM: f32 = 25.0;
const BODY_SIZE: f32 = 11.0;
const LINE_HEIGHT_MM: f32 = 6.0;

/// Vertical position of both signature lines
pub const SIGNATURE_Y_MM: f32 = 220.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub institution: String,
    pub student_name: String,
    pub dni: Option<String>,
    pub division: String,
    pub total_absences: u32,
    pub issued_on: NaiveDate,
}

impl Citation {
    fn body(&self) -> String {
        let dni = self
            .dni
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| format!(", DNI {}", d))
            .unwrap_or_default();

        format!(
            "Por medio de la presente se cita al padre, madre o tutor del/la estudiante {}{}, \
             de la división {}, a presentarse en la institución a fin de tratar su situación \
             de asistencia. A la fecha, el/la estudiante registra un total de {} inasistencias.",
            self.student_name, dni, self.division, self.total_absences
        )
    }
}

pub fn citation_file_name(student_name: &str) -> String {
    format!("citacion_{}.pdf", sanitize_file_component(student_name))
}

pub fn citation_pdf(citation: &Citation) -> Result<Vec<u8>> {
    if citation.student_name.trim().is_empty() {
        return Err(ReportError::InvalidInput("student name is required".to_string()));
    }

    let mut builder = PdfBuilder::a4(Orientation::Portrait);
    let width = builder.width_mm() - 2.0 * MARGIN_MM;
    let page = builder.current();

    page.text_in(MARGIN_MM, width, 30.0, 14.0, Font::Bold, BLACK, Align::Center, &citation.institution);
    page.text_in(MARGIN_MM, width, 42.0, 16.0, Font::Bold, BLACK, Align::Center, "CITACIÓN");
    page.text_in(
        MARGIN_MM,
        width,
        55.0,
        10.0,
        Font::Regular,
        BLACK,
        Align::Right,
        &format!("Fecha: {}", citation.issued_on.format(DATE_FORMAT)),
    );

    let mut y = 70.0;
    for line in wrap_text(&citation.body(), width, BODY_SIZE, Font::Regular) {
        page.text(MARGIN_MM, y, BODY_SIZE, Font::Regular, BLACK, &line);
        y += LINE_HEIGHT_MM;
    }
    page.text(MARGIN_MM, y + LINE_HEIGHT_MM, BODY_SIZE, Font::Regular, BLACK, "Atentamente.");

    page.line(25.0, SIGNATURE_Y_MM, 85.0, SIGNATURE_Y_MM, 0.7, BLACK);
    page.line(125.0, SIGNATURE_Y_MM, 185.0, SIGNATURE_Y_MM, 0.7, BLACK);
    page.text_in(25.0, 60.0, SIGNATURE_Y_MM + 5.0, 9.0, Font::Regular, BLACK, Align::Center, "Firma Preceptor/a");
    page.text_in(125.0, 60.0, SIGNATURE_Y_MM + 5.0, 9.0, Font::Regular, BLACK, Align::Center, "Firma Padre/Madre/Tutor");

    builder.finish(&format!("Citación {}", citation.student_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation() -> Citation {
        Citation {
            institution: "Escuela Secundaria N° 1".to_string(),
            student_name: "Pérez, Juan".to_string(),
            dni: Some("45123456".to_string()),
            division: "1° A".to_string(),
            total_absences: 18,
            issued_on: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
        }
    }

    #[test]
    fn test_body_mentions_student_and_absences() {
        let body = citation().body();
        assert!(body.contains("Pérez, Juan"));
        assert!(body.contains("DNI 45123456"));
        assert!(body.contains("1° A"));
        assert!(body.contains("18 inasistencias"));
    }

    #[test]
    fn test_body_without_dni() {
        let mut c = citation();
        c.dni = None;
        assert!(!c.body().contains("DNI"));
    }

    #[test]
    fn test_citation_pdf_is_single_page() {
        let bytes = citation_pdf(&citation()).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_citation_requires_name() {
        let mut c = citation();
        c.student_name = "  ".to_string();
        assert!(matches!(citation_pdf(&c), Err(ReportError::InvalidInput(_))));
    }

    #[test]
    fn test_file_name() {
        assert!(citation_file_name("Juan").starts_with("citacion_Juan"));
        assert!(citation_file_name("Juan").ends_with(".pdf"));
    }
}
