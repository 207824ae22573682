//! Minimal PDF drawing surface on top of lopdf.
//!
//! Coordinates are in millimetres measured from the top-left corner of the
//! page; they are flipped to PDF user space when operations are emitted.
//! Text uses the standard Helvetica faces with WinAnsi encoding, so no font
//! embedding is needed.

use crate::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Points per millimetre
pub const MM_TO_PT: f32 = 72.0 / 25.4;

pub const A4_SHORT_MM: f32 = 210.0;
pub const A4_LONG_MM: f32 = 297.0;

pub type Rgb = [f32; 3];

pub const BLACK: Rgb = [0.0, 0.0, 0.0];
pub const WHITE: Rgb = [1.0, 1.0, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Approximate Helvetica advance width of one character, in 1/1000 em
fn glyph_width(c: char) -> f32 {
    match c {
        'i' | 'j' | 'l' | '\'' | '|' => 222.0,
        ' ' | '.' | ',' | ':' | ';' | '!' | 'f' | 't' | 'I' | '/' | '\\' | '[' | ']' | '(' | ')' => 278.0,
        'r' | '-' => 333.0,
        '"' | '*' => 355.0,
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' | 'J' => 500.0,
        'm' => 833.0,
        'w' => 722.0,
        'M' => 833.0,
        'W' => 944.0,
        '%' => 889.0,
        '@' => 1015.0,
        '0'..='9' | 'a'..='z' | '#' | '$' | '_' | '?' | '°' => 556.0,
        'A'..='Z' => 667.0,
        c if c.is_alphabetic() && c.is_uppercase() => 667.0,
        c if c.is_alphabetic() => 556.0,
        _ => 556.0,
    }
}

/// Estimated width of `text` in millimetres
pub fn text_width_mm(text: &str, size: f32, font: Font) -> f32 {
    let em: f32 = text.chars().map(glyph_width).sum();
    let factor = match font {
        Font::Regular => 1.0,
        Font::Bold => 1.06,
    };
    em / 1000.0 * size * factor / MM_TO_PT
}

/// Shorten `text` with an ellipsis until it fits `max_width_mm`
pub fn fit_text(text: &str, max_width_mm: f32, size: f32, font: Font) -> String {
    if text_width_mm(text, size, font) <= max_width_mm {
        return text.to_string();
    }

    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate: String = chars.iter().collect::<String>() + "...";
        if text_width_mm(&candidate, size, font) <= max_width_mm {
            return candidate;
        }
    }
    String::new()
}

/// Greedy word wrap to `max_width_mm`
pub fn wrap_text(text: &str, max_width_mm: f32, size: f32, font: Font) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if text_width_mm(&candidate, size, font) <= max_width_mm || current.is_empty() {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Encode text for a WinAnsi encoded standard font
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{0}'..='\u{7f}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Drawing operations of one page
pub struct Page {
    width_mm: f32,
    height_mm: f32,
    operations: Vec<Operation>,
}

impl Page {
    fn new(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width_mm,
            height_mm,
            operations: Vec::new(),
        }
    }

    pub fn width_mm(&self) -> f32 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f32 {
        self.height_mm
    }

    fn x(&self, mm: f32) -> Object {
        real(mm * MM_TO_PT)
    }

    fn y(&self, mm: f32) -> Object {
        real((self.height_mm - mm) * MM_TO_PT)
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    /// Draw text with its baseline at `y_mm`
    pub fn text(&mut self, x_mm: f32, y_mm: f32, size: f32, font: Font, color: Rgb, text: &str) {
        let (x, y) = (self.x(x_mm), self.y(y_mm));
        self.push("q", vec![]);
        self.push("rg", color.iter().map(|c| real(*c)).collect());
        self.push("BT", vec![]);
        self.push("Tf", vec![font.resource_name().into(), real(size)]);
        self.push("Td", vec![x, y]);
        self.push("Tj", vec![Object::string_literal(win_ansi(text))]);
        self.push("ET", vec![]);
        self.push("Q", vec![]);
    }

    /// Draw text aligned inside the horizontal span `[x_mm, x_mm + width_mm]`
    #[allow(clippy::too_many_arguments)]
    pub fn text_in(
        &mut self,
        x_mm: f32,
        width_mm: f32,
        y_mm: f32,
        size: f32,
        font: Font,
        color: Rgb,
        align: Align,
        text: &str,
    ) {
        let w = text_width_mm(text, size, font);
        let x = match align {
            Align::Left => x_mm,
            Align::Center => x_mm + (width_mm - w) / 2.0,
            Align::Right => x_mm + width_mm - w,
        };
        self.text(x, y_mm, size, font, color, text);
    }

    pub fn line(&mut self, x1_mm: f32, y1_mm: f32, x2_mm: f32, y2_mm: f32, width_pt: f32, color: Rgb) {
        let (x1, y1, x2, y2) = (self.x(x1_mm), self.y(y1_mm), self.x(x2_mm), self.y(y2_mm));
        self.push("q", vec![]);
        self.push("w", vec![real(width_pt)]);
        self.push("RG", color.iter().map(|c| real(*c)).collect());
        self.push("m", vec![x1, y1]);
        self.push("l", vec![x2, y2]);
        self.push("S", vec![]);
        self.push("Q", vec![]);
    }

    /// Filled rectangle whose top-left corner is at `(x_mm, y_mm)`
    pub fn fill_rect(&mut self, x_mm: f32, y_mm: f32, width_mm: f32, height_mm: f32, color: Rgb) {
        let (x, y) = (self.x(x_mm), self.y(y_mm + height_mm));
        self.push("q", vec![]);
        self.push("rg", color.iter().map(|c| real(*c)).collect());
        self.push("re", vec![x, y, real(width_mm * MM_TO_PT), real(height_mm * MM_TO_PT)]);
        self.push("f", vec![]);
        self.push("Q", vec![]);
    }
}

/// Multi-page document under construction
pub struct PdfBuilder {
    width_mm: f32,
    height_mm: f32,
    pages: Vec<Page>,
}

impl PdfBuilder {
    /// A4 document in the given orientation, with one blank page
    pub fn a4(orientation: Orientation) -> Self {
        let (width_mm, height_mm) = match orientation {
            Orientation::Portrait => (A4_SHORT_MM, A4_LONG_MM),
            Orientation::Landscape => (A4_LONG_MM, A4_SHORT_MM),
        };
        Self {
            width_mm,
            height_mm,
            pages: vec![Page::new(width_mm, height_mm)],
        }
    }

    pub fn width_mm(&self) -> f32 {
        self.width_mm
    }

    pub fn height_mm(&self) -> f32 {
        self.height_mm
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page currently being drawn
    pub fn current(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn add_page(&mut self) -> &mut Page {
        self.pages.push(Page::new(self.width_mm, self.height_mm));
        self.current()
    }

    pub fn pages_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.pages.iter_mut()
    }

    /// Serialize the document to bytes
    pub fn finish(self, title: &str) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                Font::Regular.resource_name() => regular_id,
                Font::Bold.resource_name() => bold_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for page in self.pages {
            let content = Content {
                operations: page.operations,
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                real(0.0),
                real(0.0),
                real(self.width_mm * MM_TO_PT),
                real(self.height_mm * MM_TO_PT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(win_ansi(title)),
            "Producer" => Object::string_literal("Aula"),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_keeps_latin_characters() {
        assert_eq!(win_ansi("Año"), vec![b'A', 0xF1, b'o']);
        assert_eq!(win_ansi("N°"), vec![b'N', 0xB0]);
        assert_eq!(win_ansi("–"), vec![0x96]);
        assert_eq!(win_ansi("漢"), vec![b'?']);
    }

    #[test]
    fn test_text_width_grows_with_length() {
        let short = text_width_mm("Ana", 10.0, Font::Regular);
        let long = text_width_mm("Ana María", 10.0, Font::Regular);
        assert!(long > short);
        assert!(text_width_mm("Ana", 10.0, Font::Bold) > short);
        assert_eq!(text_width_mm("", 10.0, Font::Regular), 0.0);
    }

    #[test]
    fn test_fit_text_truncates() {
        let fitted = fit_text("Observaciones muy extensas del docente", 20.0, 8.0, Font::Regular);
        assert!(fitted.ends_with("..."));
        assert!(text_width_mm(&fitted, 8.0, Font::Regular) <= 20.0);
        assert_eq!(fit_text("LB", 20.0, 8.0, Font::Regular), "LB");
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("uno dos tres cuatro cinco seis siete", 20.0, 10.0, Font::Regular);
        assert!(lines.len() > 1);
        assert_eq!(lines.join(" "), "uno dos tres cuatro cinco seis siete");
    }

    #[test]
    fn test_finish_produces_loadable_pdf() {
        let mut builder = PdfBuilder::a4(Orientation::Portrait);
        builder.current().text(20.0, 20.0, 12.0, Font::Bold, BLACK, "Página (1)");
        builder.add_page().line(20.0, 30.0, 100.0, 30.0, 0.5, BLACK);
        assert_eq!(builder.page_count(), 2);

        let bytes = builder.finish("Prueba").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }
}
