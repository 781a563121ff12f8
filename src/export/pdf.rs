//! PDF rendering of the readings report

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use super::{Report, ReportRenderer, COLUMNS};
use crate::errors::RescueRadarError;

// US Letter, landscape
const PAGE_WIDTH: f32 = 279.4;
const PAGE_HEIGHT: f32 = 215.9;
const MARGIN: f32 = 12.0;
const LINE_HEIGHT: f32 = 4.2;
const TABLE_FONT_SIZE: f32 = 7.5;
/// Courier advance width as a fraction of the font size
const COURIER_ADVANCE: f32 = 0.6;
const MM_PER_POINT: f32 = 25.4 / 72.0;
/// Blank characters between columns
const COLUMN_GAP: usize = 2;

/// Lays the report out as a fixed-width table in the built-in Courier face
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer;

struct Fonts {
    title: IndirectFontRef,
    body: IndirectFontRef,
    table: IndirectFontRef,
    table_header: IndirectFontRef,
}

/// Column widths and type size for one report. Columns grow to their widest
/// cell and the type shrinks until the table fits across the page.
#[derive(Debug, Clone, PartialEq)]
struct TableLayout {
    widths: [usize; 8],
    font_size: f32,
    line_height: f32,
}

impl TableLayout {
    fn for_report(report: &Report) -> Self {
        let mut widths = COLUMNS.map(|header| header.chars().count());
        for row in &report.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        let widths = widths.map(|width| width + COLUMN_GAP);

        let line_chars: usize = widths.iter().sum();
        let fitting_size =
            (PAGE_WIDTH - 2.0 * MARGIN) / (line_chars as f32 * COURIER_ADVANCE * MM_PER_POINT);
        let font_size = TABLE_FONT_SIZE.min(fitting_size);

        Self {
            widths,
            font_size,
            line_height: LINE_HEIGHT * (font_size / TABLE_FONT_SIZE),
        }
    }

    /// Pad each cell to its column
    fn line(&self, cells: &[String; 8]) -> String {
        let mut line = String::new();
        for (cell, width) in cells.iter().zip(self.widths) {
            line.push_str(&format!("{cell:<width$}"));
        }
        line.trim_end().to_string()
    }
}

impl ReportRenderer for PdfRenderer {
    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn file_name(&self) -> &'static str {
        "rescue_radar_report.pdf"
    }

    fn render(&self, report: &Report) -> Result<Vec<u8>, RescueRadarError> {
        let (doc, page, layer) = PdfDocument::new(
            report.title.as_str(),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );

        let fonts = Fonts {
            title: doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_error)?,
            body: doc.add_builtin_font(BuiltinFont::Helvetica).map_err(render_error)?,
            table: doc.add_builtin_font(BuiltinFont::Courier).map_err(render_error)?,
            table_header: doc.add_builtin_font(BuiltinFont::CourierBold).map_err(render_error)?,
        };

        let table = TableLayout::for_report(report);
        let mut layer = doc.get_page(page).get_layer(layer);
        let mut page_number = 1;
        let mut y = PAGE_HEIGHT - MARGIN - 8.0;

        layer.use_text(report.title.as_str(), 18.0, Mm(MARGIN), Mm(y), &fonts.title);
        y -= 7.0;
        let summary = format!(
            "Generated {} - {} readings",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.rows.len()
        );
        layer.use_text(summary, 9.0, Mm(MARGIN), Mm(y), &fonts.body);
        y -= 2.0 * LINE_HEIGHT;
        draw_header(&layer, &fonts, &table, y, page_number);
        y -= table.line_height * 1.5;

        for row in &report.rows {
            if y < MARGIN + table.line_height {
                let (next_page, next_layer) =
                    doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                layer = doc.get_page(next_page).get_layer(next_layer);
                page_number += 1;
                y = PAGE_HEIGHT - MARGIN - 4.0;
                draw_header(&layer, &fonts, &table, y, page_number);
                y -= table.line_height * 1.5;
            }
            layer.use_text(table.line(row), table.font_size, Mm(MARGIN), Mm(y), &fonts.table);
            y -= table.line_height;
        }

        doc.save_to_bytes().map_err(render_error)
    }
}

fn draw_header(
    layer: &PdfLayerReference,
    fonts: &Fonts,
    table: &TableLayout,
    y: f32,
    page_number: usize,
) {
    let header = COLUMNS.map(str::to_string);
    layer.use_text(
        table.line(&header),
        table.font_size,
        Mm(MARGIN),
        Mm(y),
        &fonts.table_header,
    );
    layer.use_text(
        format!("Page {page_number}"),
        7.0,
        Mm(PAGE_WIDTH - MARGIN - 14.0),
        Mm(MARGIN / 2.0),
        &fonts.body,
    );
}

fn render_error(e: printpdf::Error) -> RescueRadarError {
    RescueRadarError::RenderError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn report(rows: usize) -> Report {
        let row = [
            "1", "vic-0001", "10.0", "N/A", "N/A", "N/A", "N/A", "2024-03-01 12:30:05 UTC",
        ]
        .map(str::to_string);
        Report {
            title: crate::export::REPORT_TITLE.to_string(),
            generated_at: Utc::now(),
            rows: vec![row; rows],
        }
    }

    #[test]
    fn renders_pdf_document() {
        let bytes = PdfRenderer.render(&report(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_empty_and_multi_page_reports() {
        assert!(PdfRenderer.render(&report(0)).unwrap().starts_with(b"%PDF"));
        assert!(PdfRenderer.render(&report(500)).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn long_cells_are_printed_whole() {
        let mut report = report(2);
        report.rows[0][1] = "field-team-7-rubble-north-0042".to_string();
        report.rows[0][2] = "1234567890123.5".to_string();
        let table = TableLayout::for_report(&report);

        let line = table.line(&report.rows[0]);
        assert!(line.contains("field-team-7-rubble-north-0042 "));
        assert!(line.contains(" 1234567890123.5 "));
        assert!(line.ends_with("2024-03-01 12:30:05 UTC"));

        // Short rows line up under the same columns
        let short = table.line(&report.rows[1]);
        assert_eq!(short.find("10.0"), line.find("1234567890123.5"));

        assert!(PdfRenderer.render(&report).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn wide_tables_shrink_to_fit_the_page() {
        let narrow = TableLayout::for_report(&report(1));
        assert_eq!(narrow.font_size, TABLE_FONT_SIZE);
        assert_eq!(narrow.line_height, LINE_HEIGHT);

        let mut wide = report(1);
        wide.rows[0][1] = "x".repeat(200);
        let table = TableLayout::for_report(&wide);
        let line_chars: usize = table.widths.iter().sum();
        let line_mm = line_chars as f32 * COURIER_ADVANCE * MM_PER_POINT * table.font_size;

        assert!(table.font_size < TABLE_FONT_SIZE);
        assert!(line_mm <= PAGE_WIDTH - 2.0 * MARGIN + 0.01);
        assert!(table.line(&wide.rows[0]).contains(&"x".repeat(200)));
    }
}
