//! Aula Reports Library
//!
//! Pure computation and formatting shared by the gateway and the exporter:
//! - Average, achievement tier and support track classification
//! - Merging a division roster with sparse grade records
//! - Attendance aggregation (alerts, discrepancies, overview)
//! - CSV and PDF rendering of grade and attendance reports

pub mod attendance;
pub mod csv_report;
pub mod error;
pub mod grading;
pub mod merge;
pub mod pdf;
pub mod report;

pub use error::{ReportError, Result};
pub use grading::{DerivedGrade, SupportTrack, Tier};
pub use merge::{GradeEntry, GradeValues, Student};
pub use report::{AssignmentInfo, GradeReportRow, ReportResponse};
