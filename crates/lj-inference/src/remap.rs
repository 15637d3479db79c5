//! Composite multi-image samples.
//!
//! A joint sample of `n` lensed images carries one full parameter block (the
//! anchor image's draw) plus one effective-parameter block per other image.
//! Effective columns are suffixed with their source image index so the same
//! physical parameter name can appear once per image without collision.

use lj_core::{Error, ParameterSet, Result, SampleTable};

/// Column name of effective parameter `param` sourced from image `image_index`.
pub fn effective_column_name(param: &str, image_index: usize) -> String {
    format!("{param}_img{image_index}")
}

/// One batch of composite rows: the anchor's full block and `n_images - 1`
/// substituted effective blocks, all row-aligned.
#[derive(Debug)]
pub struct CompositeSample {
    anchor_index: usize,
    n_images: usize,
    full_params: ParameterSet,
    effective_params: ParameterSet,
    table: SampleTable,
}

impl CompositeSample {
    /// Index of the anchor image whose full block the rows carry.
    pub fn anchor_index(&self) -> usize {
        self.anchor_index
    }

    /// Total number of images in the analysis.
    pub fn n_images(&self) -> usize {
        self.n_images
    }

    /// Number of composite rows.
    pub fn n_rows(&self) -> usize {
        self.table.n_rows()
    }

    /// The underlying table: full columns first, then suffixed effective
    /// columns grouped by source image in ascending index order.
    pub fn table(&self) -> &SampleTable {
        &self.table
    }

    /// The effective block substituted from `image_index`, re-keyed to the
    /// plain effective parameter names (for scoring under that image's
    /// models).
    pub fn effective_block(&self, image_index: usize) -> Result<SampleTable> {
        self.check_other(image_index)?;
        let mut columns = Vec::with_capacity(self.effective_params.len());
        for param in self.effective_params.names() {
            let name = effective_column_name(param, image_index);
            let col = self
                .table
                .column(&name)
                .ok_or_else(|| Error::Validation(format!("missing composite column '{name}'")))?;
            columns.push(col.to_vec());
        }
        SampleTable::from_columns(self.effective_params.clone(), columns)
    }

    /// The full parameter vector seen by `image_index`: the anchor's
    /// intrinsic values with the effective columns replaced by that image's
    /// substituted draws. For the anchor itself this is the plain full block.
    pub fn full_block_for(&self, image_index: usize) -> Result<SampleTable> {
        if image_index == self.anchor_index {
            return self.table.select(&self.full_params);
        }
        self.check_other(image_index)?;
        let mut columns = Vec::with_capacity(self.full_params.len());
        for param in self.full_params.names() {
            let name = if self.effective_params.contains(param) {
                effective_column_name(param, image_index)
            } else {
                param.clone()
            };
            let col = self
                .table
                .column(&name)
                .ok_or_else(|| Error::Validation(format!("missing composite column '{name}'")))?;
            columns.push(col.to_vec());
        }
        SampleTable::from_columns(self.full_params.clone(), columns)
    }

    fn check_other(&self, image_index: usize) -> Result<()> {
        if image_index >= self.n_images || image_index == self.anchor_index {
            return Err(Error::IndexOutOfRange {
                index: image_index,
                n_images: self.n_images,
            });
        }
        Ok(())
    }
}

/// Builds [`CompositeSample`]s by substituting independently drawn effective
/// parameters from every other image into full anchor draws.
pub struct EffectiveParameterRemapper {
    full_params: ParameterSet,
    effective_params: ParameterSet,
}

impl EffectiveParameterRemapper {
    /// Create a remapper for the given parameter split.
    pub fn new(full_params: ParameterSet, effective_params: ParameterSet) -> Result<Self> {
        if !effective_params.is_subset_of(&full_params) {
            return Err(Error::Validation(format!(
                "effective parameters [{}] must be a subset of full parameters [{}]",
                effective_params.joined(),
                full_params.joined()
            )));
        }
        Ok(Self { full_params, effective_params })
    }

    /// Assemble composite rows from the anchor's full draws and one
    /// effective-parameter batch per other image (ascending image order,
    /// skipping the anchor).
    ///
    /// Every batch must have exactly as many rows as `anchor_samples`;
    /// misalignment fails with [`Error::RowCountMismatch`].
    pub fn remap(
        &self,
        anchor_samples: &SampleTable,
        other_effective_samples: &[SampleTable],
        anchor_index: usize,
        n_images: usize,
    ) -> Result<CompositeSample> {
        if anchor_index >= n_images {
            return Err(Error::IndexOutOfRange { index: anchor_index, n_images });
        }
        if n_images < 2 {
            return Err(Error::Validation(format!(
                "composite samples need at least 2 images, got {n_images}"
            )));
        }
        if other_effective_samples.len() != n_images - 1 {
            return Err(Error::Validation(format!(
                "expected {} effective batches for {} images, got {}",
                n_images - 1,
                n_images,
                other_effective_samples.len()
            )));
        }
        if anchor_samples.params() != &self.full_params {
            return Err(Error::DimensionMismatch {
                expected: self.full_params.joined(),
                got: anchor_samples.params().joined(),
            });
        }

        let n_rows = anchor_samples.n_rows();
        let other_indices: Vec<usize> = (0..n_images).filter(|&j| j != anchor_index).collect();

        let mut names: Vec<String> = self.full_params.names().to_vec();
        let mut columns: Vec<Vec<f64>> = (0..self.full_params.len())
            .map(|d| anchor_samples.column_at(d).to_vec())
            .collect();

        for (batch, &j) in other_effective_samples.iter().zip(&other_indices) {
            if batch.params() != &self.effective_params {
                return Err(Error::DimensionMismatch {
                    expected: self.effective_params.joined(),
                    got: batch.params().joined(),
                });
            }
            if batch.n_rows() != n_rows {
                return Err(Error::RowCountMismatch {
                    expected: n_rows,
                    got: batch.n_rows(),
                    context: format!("effective samples of image {j}"),
                });
            }
            for (d, param) in self.effective_params.names().iter().enumerate() {
                let name = effective_column_name(param, j);
                if self.full_params.contains(&name) {
                    return Err(Error::Validation(format!(
                        "composite column '{name}' collides with a full parameter"
                    )));
                }
                names.push(name);
                columns.push(batch.column_at(d).to_vec());
            }
        }

        let params = ParameterSet::new(names)?;
        let table = SampleTable::from_columns(params, columns)?;
        Ok(CompositeSample {
            anchor_index,
            n_images,
            full_params: self.full_params.clone(),
            effective_params: self.effective_params.clone(),
            table,
        })
    }
}
