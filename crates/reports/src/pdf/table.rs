//! Auto-sized table with a styled header row and pagination.

use super::canvas::{fit_text, text_width_mm, Align, Font, PdfBuilder, Rgb, BLACK, MM_TO_PT, WHITE};

/// Header fill used by every report table
pub const HEADER_FILL: Rgb = [41.0 / 255.0, 128.0 / 255.0, 185.0 / 255.0];

/// Fill of every other body row
pub const STRIPE_FILL: Rgb = [245.0 / 255.0, 245.0 / 255.0, 245.0 / 255.0];

const GRID: Rgb = [0.78, 0.78, 0.78];

#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub align: Align,
}

impl Column {
    pub fn left(header: &str) -> Self {
        Self {
            header: header.to_string(),
            align: Align::Left,
        }
    }

    pub fn center(header: &str) -> Self {
        Self {
            header: header.to_string(),
            align: Align::Center,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub font_size: f32,
    pub row_height_mm: f32,
    pub padding_mm: f32,
    pub margin_mm: f32,
    /// Space kept free at the bottom of each page for the footer
    pub bottom_reserve_mm: f32,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            font_size: 8.0,
            row_height_mm: 6.5,
            padding_mm: 1.5,
            margin_mm: 14.0,
            bottom_reserve_mm: 16.0,
        }
    }
}

/// Column widths that fill `available_mm`, proportional to the widest
/// content of each column (header in bold included).
pub fn column_widths(columns: &[Column], rows: &[Vec<String>], available_mm: f32, style: &TableStyle) -> Vec<f32> {
    let natural: Vec<f32> = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let header = text_width_mm(&column.header, style.font_size, Font::Bold);
            let body = rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|cell| text_width_mm(cell, style.font_size, Font::Regular))
                .fold(0.0_f32, f32::max);
            header.max(body) + 2.0 * style.padding_mm
        })
        .collect();

    let total: f32 = natural.iter().sum();
    if total <= 0.0 {
        let even = available_mm / columns.len().max(1) as f32;
        return vec![even; columns.len()];
    }

    natural.iter().map(|w| w / total * available_mm).collect()
}

/// Draw `rows` under `columns` starting at `top_mm` on the current page.
///
/// Rows that do not fit move to a new page where the header row is
/// repeated at the top margin. Returns the y position below the last row.
pub fn draw_table(builder: &mut PdfBuilder, top_mm: f32, columns: &[Column], rows: &[Vec<String>], style: &TableStyle) -> f32 {
    let available = builder.width_mm() - 2.0 * style.margin_mm;
    let widths = column_widths(columns, rows, available, style);
    let bottom_limit = builder.height_mm() - style.bottom_reserve_mm;

    let mut y = draw_header_row(builder, top_mm, columns, &widths, style);

    for (index, row) in rows.iter().enumerate() {
        if y + style.row_height_mm > bottom_limit {
            builder.add_page();
            y = draw_header_row(builder, style.margin_mm, columns, &widths, style);
        }

        let page = builder.current();
        if index % 2 == 1 {
            page.fill_rect(style.margin_mm, y, available, style.row_height_mm, STRIPE_FILL);
        }

        let mut x = style.margin_mm;
        for (i, column) in columns.iter().enumerate() {
            let width = widths[i];
            let cell = row.get(i).map(String::as_str).unwrap_or("");
            let text = fit_text(cell, width - 2.0 * style.padding_mm, style.font_size, Font::Regular);
            page.text_in(
                x + style.padding_mm,
                width - 2.0 * style.padding_mm,
                baseline(y, style),
                style.font_size,
                Font::Regular,
                BLACK,
                column.align,
                &text,
            );
            x += width;
        }
        page.line(style.margin_mm, y + style.row_height_mm, style.margin_mm + available, y + style.row_height_mm, 0.3, GRID);

        y += style.row_height_mm;
    }

    y
}

fn baseline(row_top_mm: f32, style: &TableStyle) -> f32 {
    row_top_mm + style.row_height_mm / 2.0 + 0.35 * style.font_size / MM_TO_PT
}

fn draw_header_row(builder: &mut PdfBuilder, top_mm: f32, columns: &[Column], widths: &[f32], style: &TableStyle) -> f32 {
    let available: f32 = widths.iter().sum();
    let page = builder.current();
    page.fill_rect(style.margin_mm, top_mm, available, style.row_height_mm, HEADER_FILL);

    let mut x = style.margin_mm;
    for (column, width) in columns.iter().zip(widths) {
        let text = fit_text(&column.header, width - 2.0 * style.padding_mm, style.font_size, Font::Bold);
        page.text_in(
            x + style.padding_mm,
            width - 2.0 * style.padding_mm,
            baseline(top_mm, style),
            style.font_size,
            Font::Bold,
            WHITE,
            column.align,
            &text,
        );
        x += width;
    }

    top_mm + style.row_height_mm
}

/// Write `Página i de N` at the bottom of every page
pub fn draw_page_numbers(builder: &mut PdfBuilder, style: &TableStyle) {
    let total = builder.page_count();
    for (index, page) in builder.pages_mut().enumerate() {
        let label = format!("Página {} de {}", index + 1, total);
        let y = page.height_mm() - style.margin_mm / 2.0;
        let width = page.width_mm() - 2.0 * style.margin_mm;
        page.text_in(style.margin_mm, width, y, 8.0, Font::Regular, BLACK, Align::Right, &label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::canvas::Orientation;

    fn columns() -> Vec<Column> {
        vec![Column::center("N°"), Column::left("Estudiante"), Column::center("Promedio")]
    }

    #[test]
    fn test_widths_fill_available_space() {
        let rows = vec![vec!["1".to_string(), "Acosta, Ana María".to_string(), "7.50".to_string()]];
        let style = TableStyle::default();
        let widths = column_widths(&columns(), &rows, 180.0, &style);

        assert_eq!(widths.len(), 3);
        assert!((widths.iter().sum::<f32>() - 180.0).abs() < 0.01);
        // the name column is the widest
        assert!(widths[1] > widths[0]);
        assert!(widths[1] > widths[2]);
    }

    #[test]
    fn test_long_tables_paginate() {
        let rows: Vec<Vec<String>> = (1..=120)
            .map(|i| vec![i.to_string(), format!("Estudiante {}", i), "7.00".to_string()])
            .collect();

        let mut builder = PdfBuilder::a4(Orientation::Portrait);
        let style = TableStyle::default();
        let end = draw_table(&mut builder, 40.0, &columns(), &rows, &style);

        assert!(builder.page_count() > 1);
        assert!(end <= builder.height_mm() - style.bottom_reserve_mm);
    }

    #[test]
    fn test_empty_table_renders_header_only() {
        let mut builder = PdfBuilder::a4(Orientation::Portrait);
        let style = TableStyle::default();
        let end = draw_table(&mut builder, 40.0, &columns(), &[], &style);
        assert_eq!(builder.page_count(), 1);
        assert_eq!(end, 40.0 + style.row_height_mm);
    }
}
