//! PDF documents: grade report, division attendance report and absence
//! citation.

pub mod attendance;
pub mod canvas;
pub mod citation;
pub mod grades;
pub mod table;

use canvas::{Font, PdfBuilder, BLACK};
use table::HEADER_FILL;

pub use attendance::{attendance_pdf, AttendanceReportHeader};
pub use citation::{citation_file_name, citation_pdf, Citation};
pub use grades::{grades_pdf, GradeReportHeader};

/// Date format printed on every document
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Institution title followed by `label: value` lines, separated from the
/// body by a rule. Returns the y position where the body starts.
fn draw_header_band(builder: &mut PdfBuilder, margin_mm: f32, institution: &str, title: &str, lines: &[(&str, String)]) -> f32 {
    let width = builder.width_mm();
    let page = builder.current();

    page.text(margin_mm, margin_mm + 4.0, 14.0, Font::Bold, BLACK, institution);
    page.text(margin_mm, margin_mm + 11.0, 11.0, Font::Bold, HEADER_FILL, title);

    let mut y = margin_mm + 18.0;
    for (label, value) in lines {
        page.text(margin_mm, y, 9.0, Font::Bold, BLACK, &format!("{}:", label));
        page.text(margin_mm + 32.0, y, 9.0, Font::Regular, BLACK, value);
        y += 5.0;
    }

    page.line(margin_mm, y - 1.0, width - margin_mm, y - 1.0, 0.8, HEADER_FILL);
    y + 4.0
}
