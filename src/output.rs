//! Output writers for the driver's result table: CSV (primary) and a
//! best-effort styled spreadsheet, matching the `write_to_csv` /
//! `write_to_excel` pair in the distillation source.

use std::fs;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::config::OutputType;
use crate::error::Result;

/// A driver's output: a header row plus string cells, all cells already
/// rendered to their final textual form (`"N/A"` literal for unreachable
/// slots, not an empty field).
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    /// Index of the `chr` column, used by the spreadsheet writer's
    /// chromosome autofilter.
    fn chr_column(&self) -> Option<usize> {
        self.headers.iter().position(|h| h == "chr")
    }
}

/// Writes `<out_dir>/<output_name>.<ext>` per `output_type`, creating
/// `out_dir` if needed.
pub fn write_result(table: &ResultTable, out_dir: &Path, output_name: &str, output_type: OutputType) -> Result<()> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{output_name}.{}", output_type.extension()));
    match output_type {
        OutputType::Csv => write_csv(table, &path),
        OutputType::Xlsx => write_xlsx(table, &path),
    }
}

fn write_csv(table: &ResultTable, path: &Path) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One worksheet, header row, alternating banded row fill, autosized
/// columns, and an autofilter scoped to the `chr` column — matching the
/// source's `write_to_excel` / `gen_output` styling.
fn write_xlsx(table: &ResultTable, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    let band_fill = Format::new().set_background_color("#E6E6E6");

    for (col, header) in table.headers.iter().enumerate() {
        sheet.write_string(0, col as u16, header)?;
    }

    let mut max_widths: Vec<usize> = table.headers.iter().map(|h| h.len()).collect();

    for (row_idx, row) in table.rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        let banded = row_idx % 2 == 1;
        for (col, value) in row.iter().enumerate() {
            max_widths[col] = max_widths[col].max(value.len());
            if banded {
                sheet.write_string_with_format(excel_row, col as u16, value, &band_fill)?;
            } else {
                sheet.write_string(excel_row, col as u16, value)?;
            }
        }
    }

    for (col, width) in max_widths.iter().enumerate() {
        sheet.set_column_width(col as u16, (*width + 2) as f64)?;
    }

    if let Some(chr_col) = table.chr_column() {
        let last_row = table.rows.len() as u32;
        if last_row > 0 {
            sheet.autofilter(0, chr_col as u16, last_row, chr_col as u16)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}
