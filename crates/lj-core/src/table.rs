//! Columnar sample storage.
//!
//! A [`SampleTable`] holds independent posterior draws over a fixed
//! [`ParameterSet`]: one f64 column per parameter, all of equal length, every
//! value finite. Optionally a table carries one non-negative weight per row
//! (no weights = uniform). Column identity is enforced at construction so that
//! downstream code never passes samples around keyed by ad-hoc strings.

use crate::{Error, ParameterSet, Result};

/// Columnar table of posterior draws over a [`ParameterSet`] (SoA layout).
#[derive(Debug, Clone)]
pub struct SampleTable {
    params: ParameterSet,
    columns: Vec<Vec<f64>>,
    n_rows: usize,
    weights: Option<Vec<f64>>,
}

impl SampleTable {
    /// Create a table from one column per parameter, in parameter order.
    pub fn from_columns(params: ParameterSet, columns: Vec<Vec<f64>>) -> Result<Self> {
        if columns.len() != params.len() {
            return Err(Error::DimensionMismatch {
                expected: params.joined(),
                got: format!("{} columns", columns.len()),
            });
        }
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        for (i, col) in columns.iter().enumerate() {
            if col.len() != n_rows {
                return Err(Error::RowCountMismatch {
                    expected: n_rows,
                    got: col.len(),
                    context: format!("column '{}'", params.name(i)),
                });
            }
            if col.iter().any(|x| !x.is_finite()) {
                return Err(Error::Validation(format!(
                    "column '{}' contains non-finite values",
                    params.name(i)
                )));
            }
        }
        Ok(Self { params, columns, n_rows, weights: None })
    }

    /// Create a table from rows (`rows[i][d]` = value of parameter `d` in row `i`).
    pub fn from_rows(params: ParameterSet, rows: &[Vec<f64>]) -> Result<Self> {
        let d = params.len();
        let mut columns: Vec<Vec<f64>> = (0..d).map(|_| Vec::with_capacity(rows.len())).collect();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: params.joined(),
                    got: format!("row {i} with {} values", row.len()),
                });
            }
            for (col, &v) in columns.iter_mut().zip(row.iter()) {
                col.push(v);
            }
        }
        Self::from_columns(params, columns)
    }

    /// Attach per-row weights. Weights must be finite, non-negative and
    /// one per row; rows with zero weight are retained.
    pub fn with_weights(mut self, weights: Vec<f64>) -> Result<Self> {
        if weights.len() != self.n_rows {
            return Err(Error::RowCountMismatch {
                expected: self.n_rows,
                got: weights.len(),
                context: "weights".into(),
            });
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::Validation("weights must be finite".into()));
        }
        if weights.iter().any(|&w| w < 0.0) {
            return Err(Error::Validation("weights must be >= 0".into()));
        }
        self.weights = Some(weights);
        Ok(self)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// The parameter set the columns are defined over.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// Column by parameter name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.params.index_of(name).map(|i| self.columns[i].as_slice())
    }

    /// Column by position (parameter order).
    pub fn column_at(&self, i: usize) -> &[f64] {
        &self.columns[i]
    }

    /// All columns in parameter order.
    pub fn columns(&self) -> Vec<&[f64]> {
        self.columns.iter().map(|c| c.as_slice()).collect()
    }

    /// Optional per-row weights.
    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    /// Copy row `i` into `buf` (length must equal the parameter count).
    pub fn read_row(&self, i: usize, buf: &mut [f64]) {
        debug_assert_eq!(buf.len(), self.params.len());
        for (d, col) in self.columns.iter().enumerate() {
            buf[d] = col[i];
        }
    }

    /// Restrict to a subset of parameters, in the subset's order.
    ///
    /// Fails with [`Error::DimensionMismatch`] if a requested name is absent.
    /// Weights are not carried over.
    pub fn select(&self, subset: &ParameterSet) -> Result<SampleTable> {
        let mut columns = Vec::with_capacity(subset.len());
        for name in subset.names() {
            let col = self.column(name).ok_or_else(|| Error::DimensionMismatch {
                expected: subset.joined(),
                got: self.params.joined(),
            })?;
            columns.push(col.to_vec());
        }
        SampleTable::from_columns(subset.clone(), columns)
    }

    /// Return a copy with extra named columns appended.
    ///
    /// Used to add derived coordinates ahead of prior evaluation. Fails if a
    /// name already exists or a column length differs from the row count.
    pub fn with_appended_columns(
        &self,
        extra: impl IntoIterator<Item = (String, Vec<f64>)>,
    ) -> Result<SampleTable> {
        let mut names: Vec<String> = self.params.names().to_vec();
        let mut columns = self.columns.clone();
        for (name, col) in extra {
            if col.len() != self.n_rows {
                return Err(Error::RowCountMismatch {
                    expected: self.n_rows,
                    got: col.len(),
                    context: format!("appended column '{name}'"),
                });
            }
            names.push(name);
            columns.push(col);
        }
        let params = ParameterSet::new(names)?;
        let mut out = SampleTable::from_columns(params, columns)?;
        out.weights = self.weights.clone();
        Ok(out)
    }

    /// Concatenate tables over an identical parameter set into one pool.
    ///
    /// Row order follows the input order. Weights are not pooled; pooled
    /// weighting is the caller's concern (importance weights are carried
    /// separately from the tables they weight).
    pub fn concat(tables: &[&SampleTable]) -> Result<SampleTable> {
        let first = tables
            .first()
            .ok_or_else(|| Error::Validation("cannot concatenate zero tables".into()))?;
        let params = first.params.clone();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); params.len()];
        for table in tables {
            if table.params != params {
                return Err(Error::DimensionMismatch {
                    expected: params.joined(),
                    got: table.params.joined(),
                });
            }
            for (d, col) in table.columns.iter().enumerate() {
                columns[d].extend_from_slice(col);
            }
        }
        SampleTable::from_columns(params, columns)
    }
}
