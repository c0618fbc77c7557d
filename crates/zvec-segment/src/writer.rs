//! Forward (row-major columnar) segment writers (SPEC_FULL.md §4.5),
//! grounded on `forward_writer.{h,cc}` / `arrow_ipc_writer.{h,cc}` /
//! `parquet_writer.h`.
//!
//! The `filter` parameter on [`ForwardWriter::insert_batch`] is an
//! [`IndexFilter`], but here it is read as a *keep* mask: a row is
//! written when `!filter.is_filtered(row_id)`. This is the opposite
//! sense from [`crate::kernels::CheckNotFilteredKernel`], which also
//! inverts the same trait's polarity at its own output boundary — the
//! original keeps one `IndexFilter` type for both call sites rather than
//! two differently-named traits, and this workspace preserves that
//! asymmetry rather than "fixing" it (DESIGN.md, Open Question).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::Schema;
use arrow::ipc::writer::FileWriter as IpcFileWriter;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter as ParquetArrowWriter;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use crate::error::SegmentError;
use crate::filter::IndexFilter;

/// Common surface for the two on-disk formats a segment can be flushed
/// to. `max_rows_per_batch`/`max_rows_per_row_group` of `0` (the
/// constructor default) means "one write call, one batch/row-group".
pub trait ForwardWriter {
    fn insert_batch(
        &mut self,
        batch: &RecordBatch,
        filter: Option<&dyn IndexFilter>,
    ) -> Result<(), SegmentError>;

    /// Flushes and closes the underlying file. A second call is a no-op
    /// (§4.5); only [`Self::insert_batch`] rejects further writes once
    /// finalized.
    fn finalize(&mut self) -> Result<(), SegmentError>;
}

/// Row ids are assumed to live in the batch's `row_id` column; this is
/// the same column every kernel in [`crate::kernels`] expects in
/// position 0 (§4.4's convention, and the row-id-keyed filter convention
/// shared by both call sites above).
fn row_id_column<'a>(batch: &'a RecordBatch, schema: &Schema) -> Result<&'a UInt64Array, SegmentError> {
    let idx = schema
        .index_of("row_id")
        .map_err(|_| SegmentError::MissingOption("row_id column"))?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or(SegmentError::MissingOption("row_id column (UInt64)"))
}

/// Applies `filter` as a keep mask via `arrow::compute::take`, returning
/// the batch unchanged when there is no filter.
fn apply_keep_filter(
    batch: &RecordBatch,
    filter: Option<&dyn IndexFilter>,
) -> Result<RecordBatch, SegmentError> {
    let Some(filter) = filter else {
        return Ok(batch.clone());
    };
    let rows = row_id_column(batch, batch.schema_ref())?;
    let keep_indices: UInt64Array = UInt64Array::from_iter_values(
        (0..rows.len() as u64).filter(|&i| !filter.is_filtered(rows.value(i as usize))),
    );

    let columns = batch
        .columns()
        .iter()
        .map(|col| take(col.as_ref(), &keep_indices, None).map_err(SegmentError::from))
        .collect::<Result<Vec<_>, _>>()?;
    RecordBatch::try_new(batch.schema(), columns).map_err(SegmentError::from)
}

fn slice_batches(batch: &RecordBatch, max_rows: usize) -> Vec<RecordBatch> {
    if max_rows == 0 || batch.num_rows() <= max_rows {
        return vec![batch.clone()];
    }
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < batch.num_rows() {
        let len = max_rows.min(batch.num_rows() - offset);
        out.push(batch.slice(offset, len));
        offset += len;
    }
    out
}

/// Writes batches to an Arrow IPC (`.arrows`) file stream.
pub struct IpcForwardWriter {
    max_rows_per_batch: usize,
    schema: Option<Arc<Schema>>,
    writer: Option<IpcFileWriter<File>>,
    path: PathBuf,
    finalized: bool,
}

impl IpcForwardWriter {
    pub fn create(path: impl AsRef<Path>, max_rows_per_batch: usize) -> Result<Self, SegmentError> {
        Ok(Self {
            max_rows_per_batch,
            schema: None,
            writer: None,
            path: path.as_ref().to_path_buf(),
            finalized: false,
        })
    }

    fn writer_for(&mut self, schema: &Arc<Schema>) -> Result<&mut IpcFileWriter<File>, SegmentError> {
        if let Some(established) = &self.schema {
            if established.as_ref() != schema.as_ref() {
                return Err(SegmentError::SchemaMismatch);
            }
        } else {
            let file = File::create(&self.path)?;
            self.writer = Some(IpcFileWriter::try_new(file, schema)?);
            self.schema = Some(schema.clone());
        }
        Ok(self.writer.as_mut().expect("writer initialized above"))
    }
}

impl ForwardWriter for IpcForwardWriter {
    fn insert_batch(
        &mut self,
        batch: &RecordBatch,
        filter: Option<&dyn IndexFilter>,
    ) -> Result<(), SegmentError> {
        if self.finalized {
            return Err(SegmentError::AlreadyFinalized);
        }
        let kept = apply_keep_filter(batch, filter)?;
        let schema = kept.schema();
        for chunk in slice_batches(&kept, self.max_rows_per_batch) {
            self.writer_for(&schema)?.write(&chunk)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SegmentError> {
        if self.finalized {
            return Ok(());
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.finish()?;
        }
        self.finalized = true;
        debug!(path = %self.path.display(), "ipc forward writer finalized");
        Ok(())
    }
}

impl Drop for IpcForwardWriter {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = self.finalize();
        }
    }
}

/// Writes batches to a Parquet file, one row group per `insert_batch`
/// call (subject to `max_rows_per_row_group` slicing).
pub struct ParquetForwardWriter {
    max_rows_per_row_group: usize,
    schema: Option<Arc<Schema>>,
    writer: Option<ParquetArrowWriter<File>>,
    path: PathBuf,
    finalized: bool,
}

impl ParquetForwardWriter {
    pub fn create(
        path: impl AsRef<Path>,
        max_rows_per_row_group: usize,
    ) -> Result<Self, SegmentError> {
        Ok(Self {
            max_rows_per_row_group,
            schema: None,
            writer: None,
            path: path.as_ref().to_path_buf(),
            finalized: false,
        })
    }

    fn writer_for(&mut self, schema: &Arc<Schema>) -> Result<&mut ParquetArrowWriter<File>, SegmentError> {
        if let Some(established) = &self.schema {
            if established.as_ref() != schema.as_ref() {
                return Err(SegmentError::SchemaMismatch);
            }
        } else {
            let file = File::create(&self.path)?;
            let mut props = WriterProperties::builder();
            if self.max_rows_per_row_group > 0 {
                props = props.set_max_row_group_size(self.max_rows_per_row_group);
            }
            self.writer = Some(ParquetArrowWriter::try_new(file, schema.clone(), Some(props.build()))?);
            self.schema = Some(schema.clone());
        }
        Ok(self.writer.as_mut().expect("writer initialized above"))
    }
}

impl ForwardWriter for ParquetForwardWriter {
    fn insert_batch(
        &mut self,
        batch: &RecordBatch,
        filter: Option<&dyn IndexFilter>,
    ) -> Result<(), SegmentError> {
        if self.finalized {
            return Err(SegmentError::AlreadyFinalized);
        }
        let kept = apply_keep_filter(batch, filter)?;
        let schema = kept.schema();
        for chunk in slice_batches(&kept, self.max_rows_per_row_group) {
            self.writer_for(&schema)?.write(&chunk)?;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SegmentError> {
        if self.finalized {
            return Ok(());
        }
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        self.finalized = true;
        debug!(path = %self.path.display(), "parquet forward writer finalized");
        Ok(())
    }
}

impl Drop for ParquetForwardWriter {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = self.finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::EasyIndexFilter;
    use arrow::array::{ArrayRef, Float32Array};
    use arrow::datatypes::{DataType, Field};
    use arrow::ipc::reader::FileReader as IpcFileReader;
    use tempfile::tempdir;

    fn sample_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("row_id", DataType::UInt64, false),
            Field::new("score", DataType::Float32, false),
        ]));
        let row_id: ArrayRef = Arc::new(UInt64Array::from(vec![0u64, 1, 2, 3]));
        let score: ArrayRef = Arc::new(Float32Array::from(vec![1.0f32, 2.0, 3.0, 4.0]));
        RecordBatch::try_new(schema, vec![row_id, score]).unwrap()
    }

    #[test]
    fn ipc_writer_roundtrip_with_filter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.arrows");
        let mut writer = IpcForwardWriter::create(&path, 0).unwrap();
        let filter = EasyIndexFilter::new(|row_id| row_id == 1);
        writer.insert_batch(&sample_batch(), Some(&filter)).unwrap();
        writer.finalize().unwrap();

        let file = File::open(&path).unwrap();
        let reader = IpcFileReader::try_new(file, None).unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total_rows, 3);
    }

    #[test]
    fn finalize_twice_is_a_noop() {
        // §4.5: a second `finalize()` call succeeds without error; only
        // `insert_batch` after finalization is rejected.
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.arrows");
        let mut writer = IpcForwardWriter::create(&path, 0).unwrap();
        writer.insert_batch(&sample_batch(), None).unwrap();
        writer.finalize().unwrap();
        writer.finalize().unwrap();
        assert!(writer.insert_batch(&sample_batch(), None).is_err());
    }

    #[test]
    fn row_group_slicing_splits_batches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut writer = ParquetForwardWriter::create(&path, 2).unwrap();
        writer.insert_batch(&sample_batch(), None).unwrap();
        writer.finalize().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.arrows");
        let mut writer = IpcForwardWriter::create(&path, 0).unwrap();
        writer.insert_batch(&sample_batch(), None).unwrap();

        let other_schema = Arc::new(Schema::new(vec![Field::new(
            "row_id",
            DataType::UInt64,
            false,
        )]));
        let other: ArrayRef = Arc::new(UInt64Array::from(vec![0u64]));
        let other_batch = RecordBatch::try_new(other_schema, vec![other]).unwrap();
        assert!(writer.insert_batch(&other_batch, None).is_err());
        writer.finalize().unwrap();
    }
}
