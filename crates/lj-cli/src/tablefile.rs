//! Whitespace-delimited sample tables with a header row.
//!
//! The on-disk format matches the plain-text tables the inference pipelines
//! exchange: a header naming the columns (optionally `#`-prefixed), then one
//! whitespace-separated row per draw.

use lj_core::{Error, ParameterSet, Result, SampleTable};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Read a sample table, taking the parameter set from the header row.
pub fn read_table(path: &Path) -> Result<SampleTable> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().enumerate();

    let header = loop {
        match lines.next() {
            None => {
                return Err(Error::Validation(format!("{}: empty table", path.display())));
            }
            Some((_, line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    break line.trim_start_matches('#').trim().to_string();
                }
            }
        }
    };
    let params = ParameterSet::new(header.split_whitespace().map(str::to_string))?;

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); params.len()];
    for (lineno, line) in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() != params.len() {
            return Err(Error::Validation(format!(
                "{}: line {}: expected {} values, got {}",
                path.display(),
                lineno + 1,
                params.len(),
                values.len()
            )));
        }
        for (col, raw) in columns.iter_mut().zip(&values) {
            let v: f64 = raw.parse().map_err(|e| {
                Error::Validation(format!("{}: line {}: {e}", path.display(), lineno + 1))
            })?;
            col.push(v);
        }
    }

    SampleTable::from_columns(params, columns)
}

/// Write a sample table with a `#`-prefixed header row.
pub fn write_table(path: &Path, table: &SampleTable) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# {}", table.params().names().join(" "))?;
    let mut row = vec![0.0f64; table.params().len()];
    for i in 0..table.n_rows() {
        table.read_row(i, &mut row);
        let line: Vec<String> = row.iter().map(|v| format!("{v:.17e}")).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

/// Write one value per line under a single-name header. `-inf` entries are
/// written as-is; the file is a diagnostic artifact, not a round-trip format.
pub fn write_column(path: &Path, name: &str, values: &[f64]) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# {name}")?;
    for v in values {
        if v.is_finite() {
            writeln!(out, "{v:.17e}")?;
        } else {
            writeln!(out, "{v}")?;
        }
    }
    out.flush()?;
    Ok(())
}
