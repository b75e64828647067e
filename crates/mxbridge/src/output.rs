use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mxbridge_codec::{LocalArray, MatrixHandle, ValueType};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// A decoded matrix plus where it came from.
pub struct MatrixReport<'a> {
    pub operation: &'static str,
    pub handle: MatrixHandle,
    /// Wire type the input was sent as.
    pub sent_as: ValueType,
    pub matrix: &'a LocalArray,
}

#[derive(Serialize)]
struct MatrixOutput<'a> {
    operation: &'a str,
    handle: u64,
    sent_as: &'a str,
    rows: usize,
    cols: usize,
    values: Vec<Vec<f64>>,
}

pub fn print_matrix(report: &MatrixReport<'_>, format: OutputFormat) {
    let rows = matrix_rows(report.matrix);
    let cols = rows.first().map_or(dims(report.matrix).1, Vec::len);

    match format {
        OutputFormat::Json => {
            let out = MatrixOutput {
                operation: report.operation,
                handle: report.handle.raw(),
                sent_as: report.sent_as.name(),
                rows: rows.len(),
                cols,
                values: rows,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut header = vec![String::new()];
            header.extend((1..=cols).map(|c| format!("[,{c}]")));

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header);
            for (r, row) in rows.iter().enumerate() {
                let mut cells = vec![format!("[{},]", r + 1)];
                cells.extend(row.iter().map(|v| format_value(*v)));
                table.add_row(cells);
            }
            println!(
                "{} {} sent as {} ({}x{})",
                report.operation,
                report.handle,
                report.sent_as,
                rows.len(),
                cols
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            print!("{}", render_pretty(&rows, cols));
        }
        OutputFormat::Raw => {
            for row in &rows {
                let line: Vec<String> = row.iter().map(f64::to_string).collect();
                println!("{}", line.join(" "));
            }
        }
    }
}

/// Fixed three-decimal rendering used by the table and pretty formats.
pub fn format_value(value: f64) -> String {
    format!("{value:.3}")
}

/// Column-aligned text with `[,j]` / `[i,]` labels.
pub fn render_pretty(rows: &[Vec<f64>], cols: usize) -> String {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| format_value(*v)).collect())
        .collect();
    let label_width = format!("[{},]", rows.len()).len();
    let widths: Vec<usize> = (0..cols)
        .map(|c| {
            cells
                .iter()
                .map(|row| row[c].len())
                .chain(std::iter::once(format!("[,{}]", c + 1).len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = format!("{:label_width$}", "");
    for (c, width) in widths.iter().enumerate() {
        out.push_str(&format!(" {:>width$}", format!("[,{}]", c + 1)));
    }
    out.push('\n');
    for (r, row) in cells.iter().enumerate() {
        out.push_str(&format!("{:<label_width$}", format!("[{},]", r + 1)));
        for (cell, width) in row.iter().zip(&widths) {
            out.push_str(&format!(" {cell:>width$}"));
        }
        out.push('\n');
    }
    out
}

/// Split a decoded matrix into rows.
pub fn matrix_rows(matrix: &LocalArray) -> Vec<Vec<f64>> {
    let (rows, cols) = dims(matrix);
    if cols == 0 {
        return vec![Vec::new(); rows];
    }
    matrix
        .to_f64_vec()
        .chunks(cols)
        .map(<[f64]>::to_vec)
        .collect()
}

fn dims(matrix: &LocalArray) -> (usize, usize) {
    matrix.matrix_dims().unwrap_or((0, 0))
}
