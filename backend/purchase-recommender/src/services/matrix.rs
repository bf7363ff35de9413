//! Sparse user x item interaction matrix, stored as a `sprs` CSR matrix.
//!
//! Rows and columns are labelled with external ids sorted ascending. The labels
//! live in a shared `Axes` value: layout-preserving transforms hand the same
//! `Arc<Axes>` to their output, so anything indexed against the original matrix
//! (the id index, trained models) stays valid for the transformed one.

use crate::error::{RecommenderError, Result};
use crate::models::Interaction;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Record field addressable by a [`PivotSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    UserId,
    ItemId,
    BasketId,
    Quantity,
    SalesValue,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::UserId => "user_id",
            Field::ItemId => "item_id",
            Field::BasketId => "basket_id",
            Field::Quantity => "quantity",
            Field::SalesValue => "sales_value",
        }
    }

    fn is_key(&self) -> bool {
        matches!(self, Field::UserId | Field::ItemId | Field::BasketId)
    }

    fn key(&self, record: &Interaction, position: usize) -> Result<u64> {
        match self {
            Field::UserId => Ok(record.user_id),
            Field::ItemId => Ok(record.item_id),
            Field::BasketId => record.basket_id.ok_or_else(|| missing(*self, position)),
            Field::Quantity | Field::SalesValue => Err(RecommenderError::Schema(format!(
                "field '{}' cannot be used as a matrix axis",
                self.name()
            ))),
        }
    }

    fn value(&self, record: &Interaction, position: usize) -> Result<f64> {
        let value = match self {
            Field::UserId => record.user_id as f64,
            Field::ItemId => record.item_id as f64,
            Field::BasketId => record.basket_id.ok_or_else(|| missing(*self, position))? as f64,
            Field::Quantity => f64::from(record.quantity),
            Field::SalesValue => record.sales_value.ok_or_else(|| missing(*self, position))?,
        };

        if !value.is_finite() {
            return Err(RecommenderError::Schema(format!(
                "record {} has non-finite '{}'",
                position,
                self.name()
            )));
        }

        Ok(value)
    }
}

fn missing(field: Field, position: usize) -> RecommenderError {
    RecommenderError::Schema(format!("record {} is missing '{}'", position, field.name()))
}

impl FromStr for Field {
    type Err = RecommenderError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "user_id" => Ok(Field::UserId),
            "item_id" => Ok(Field::ItemId),
            "basket_id" => Ok(Field::BasketId),
            "quantity" => Ok(Field::Quantity),
            "sales_value" => Ok(Field::SalesValue),
            other => Err(RecommenderError::Schema(format!("unknown field '{}'", other))),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How records sharing a (row, column) cell are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    /// Number of records
    Count,
    Sum,
    Max,
    Mean,
}

impl FromStr for Aggregate {
    type Err = RecommenderError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "count" => Ok(Aggregate::Count),
            "sum" => Ok(Aggregate::Sum),
            "max" => Ok(Aggregate::Max),
            "mean" => Ok(Aggregate::Mean),
            other => Err(RecommenderError::Schema(format!(
                "unknown aggregate function '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotSpec {
    pub index: Field,
    pub columns: Field,
    pub values: Field,
    pub aggregate: Aggregate,
}

impl Default for PivotSpec {
    fn default() -> Self {
        Self {
            index: Field::UserId,
            columns: Field::ItemId,
            values: Field::Quantity,
            aggregate: Aggregate::Count,
        }
    }
}

impl PivotSpec {
    pub fn parse(index: &str, columns: &str, values: &str, aggregate: &str) -> Result<Self> {
        Ok(Self {
            index: index.parse()?,
            columns: columns.parse()?,
            values: values.parse()?,
            aggregate: aggregate.parse()?,
        })
    }

    fn validate(&self) -> Result<()> {
        for field in [self.index, self.columns] {
            if !field.is_key() {
                return Err(RecommenderError::Schema(format!(
                    "field '{}' cannot be used as a matrix axis",
                    field
                )));
            }
        }
        if self.index == self.columns {
            return Err(RecommenderError::Schema(format!(
                "index and columns must differ, both are '{}'",
                self.index
            )));
        }
        Ok(())
    }
}

/// Row and column labels of a matrix, frozen at construction
#[derive(Debug, PartialEq, Eq)]
struct Axes {
    rows: Vec<u64>,
    cols: Vec<u64>,
}

#[derive(Default)]
struct Cell {
    count: usize,
    sum: f64,
    max: f64,
}

impl Cell {
    fn push(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
    }

    fn finish(&self, aggregate: Aggregate) -> f64 {
        match aggregate {
            Aggregate::Count => self.count as f64,
            Aggregate::Sum => self.sum,
            Aggregate::Max => self.max,
            Aggregate::Mean => self.sum / self.count as f64,
        }
    }
}

/// CSR matrix with labelled axes
#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    axes: Arc<Axes>,
    csr: CsMat<f32>,
}

impl InteractionMatrix {
    /// Pivots records into a matrix. Cells with no records, or whose aggregate
    /// is exactly zero, are not stored.
    pub fn pivot(records: &[Interaction], spec: &PivotSpec) -> Result<Self> {
        spec.validate()?;

        let mut cells: BTreeMap<(u64, u64), Cell> = BTreeMap::new();
        let mut row_labels = BTreeSet::new();
        let mut col_labels = BTreeSet::new();

        for (position, record) in records.iter().enumerate() {
            let row = spec.index.key(record, position)?;
            let col = spec.columns.key(record, position)?;
            let value = spec.values.value(record, position)?;

            row_labels.insert(row);
            col_labels.insert(col);
            cells.entry((row, col)).or_default().push(value);
        }

        let rows: Vec<u64> = row_labels.into_iter().collect();
        let cols: Vec<u64> = col_labels.into_iter().collect();
        let row_pos: HashMap<u64, usize> = rows.iter().enumerate().map(|(i, &l)| (l, i)).collect();
        let col_pos: HashMap<u64, usize> = cols.iter().enumerate().map(|(i, &l)| (l, i)).collect();

        // row-major label order is also position order
        let mut triplets = TriMat::new((rows.len(), cols.len()));
        for ((row, col), cell) in &cells {
            let value = cell.finish(spec.aggregate) as f32;
            if value != 0.0 {
                triplets.add_triplet(row_pos[row], col_pos[col], value);
            }
        }
        let csr: CsMat<f32> = triplets.to_csr();

        debug!(
            records = records.len(),
            rows = rows.len(),
            cols = cols.len(),
            nnz = csr.nnz(),
            index = %spec.index,
            columns = %spec.columns,
            "Pivoted interaction matrix"
        );

        Ok(Self {
            axes: Arc::new(Axes { rows, cols }),
            csr,
        })
    }

    pub fn row_labels(&self) -> &[u64] {
        &self.axes.rows
    }

    pub fn col_labels(&self) -> &[u64] {
        &self.axes.cols
    }

    /// Underlying row-major storage
    pub fn csr(&self) -> &CsMat<f32> {
        &self.csr
    }

    /// True when both matrices were derived from the same axes without reordering
    pub fn shares_axes(&self, other: &InteractionMatrix) -> bool {
        Arc::ptr_eq(&self.axes, &other.axes)
            && self.csr.shape() == other.csr.shape()
            && self.csr.indices() == other.csr.indices()
            && (0..self.n_rows()).all(|row| self.row_nnz(row) == other.row_nnz(row))
    }

    pub fn n_rows(&self) -> usize {
        self.axes.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.axes.cols.len()
    }

    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    pub fn is_empty(&self) -> bool {
        self.csr.nnz() == 0
    }

    fn slots(&self, row: usize) -> Range<usize> {
        if row < self.csr.rows() {
            self.csr.indptr().outer_inds_sz(row)
        } else {
            0..0
        }
    }

    /// Stored (column, value) pairs of a row, ascending by column
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        let indices = self.csr.indices();
        let data = self.csr.data();
        self.slots(row).map(move |slot| (indices[slot], data[slot]))
    }

    pub fn row_nnz(&self, row: usize) -> usize {
        self.slots(row).len()
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        if row >= self.csr.rows() || col >= self.csr.cols() {
            return 0.0;
        }
        self.csr.get(row, col).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.csr.data().iter().map(|&v| f64::from(v)).sum()
    }

    pub fn values(&self) -> &[f32] {
        self.csr.data()
    }

    pub fn col_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.n_cols()];
        for (&col, &value) in self.csr.indices().iter().zip(self.csr.data()) {
            sums[col] += f64::from(value);
        }
        sums
    }

    /// Item-major view; the transposed matrix gets its own (swapped) axes
    pub fn transpose(&self) -> InteractionMatrix {
        InteractionMatrix {
            axes: Arc::new(Axes {
                rows: self.axes.cols.clone(),
                cols: self.axes.rows.clone(),
            }),
            csr: self.csr.to_csc().transpose_into(),
        }
    }

    /// Rewrites every stored value, keeping axes and sparsity pattern
    pub fn map_values<F>(&self, mut f: F) -> InteractionMatrix
    where
        F: FnMut(usize, usize, f32) -> f32,
    {
        let mut csr = self.csr.clone();
        let indices = self.csr.indices();
        let data = csr.data_mut();
        for row in 0..self.n_rows() {
            for slot in self.slots(row) {
                data[slot] = f(row, indices[slot], data[slot]);
            }
        }

        InteractionMatrix {
            axes: Arc::clone(&self.axes),
            csr,
        }
    }
}
