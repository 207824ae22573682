//! API handlers module

pub mod assignments;
pub mod attendance;
pub mod grades;
pub mod health;
pub mod reports;
pub mod students;

use aula_common::errors::{AppError, Result};
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

/// Academic period from a query parameter
pub fn parse_period(value: Option<u8>, field: &str) -> Result<i16> {
    match value {
        Some(p @ (1 | 2)) => Ok(p as i16),
        Some(other) => Err(AppError::validation(
            format!("period must be 1 or 2, got {}", other),
            Some(field),
        )),
        None => Err(AppError::MissingField { field: field.to_string() }),
    }
}

pub fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AppError::MissingField { field: field.to_string() })
}

/// Reject the first student that is not on the division roster
pub fn ensure_enrolled<I>(enrolled: &HashSet<Uuid>, students: I, field: &str) -> Result<()>
where
    I: IntoIterator<Item = Uuid>,
{
    match students.into_iter().find(|id| !enrolled.contains(id)) {
        Some(stranger) => Err(AppError::validation(
            format!("student {} is not enrolled in this division", stranger),
            Some(field),
        )),
        None => Ok(()),
    }
}

/// Optional `start_date` / `end_date` filter
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DateRangeQuery {
    /// Both bounds are optional, but when both are set the end cannot
    /// come before the start
    pub fn checked(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            check_range(start, end)?;
        }
        Ok((self.start_date, self.end_date))
    }

    pub fn required(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = require(self.start_date, "start_date")?;
        let end = require(self.end_date, "end_date")?;
        check_range(start, end)?;
        Ok((start, end))
    }
}

pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(AppError::validation(
            format!("end date {} is before start date {}", end, start),
            Some("end_date"),
        ));
    }
    Ok(())
}

/// `Content-Disposition` with an ASCII fallback and the UTF-8 name
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|c| *c != '"' && *c != '\\')
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}

/// Downloadable file response
pub fn attachment(bytes: Vec<u8>, content_type: &'static str, file_name: &str) -> Result<Response> {
    let disposition = HeaderValue::from_str(&content_disposition(file_name)).map_err(|e| AppError::Internal {
        message: format!("invalid file name header: {}", e),
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
