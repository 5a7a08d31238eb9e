//! Persisting shard output and reading it back.
//!
//! Each shard produces two artifacts:
//!
//! - a **record table** (`<prefix>_sparse_features[_<i>].csv`) with columns
//!   `user_id, item_id, rating`, the passthrough attribute columns and
//!   `label`, one row per event in row order;
//! - an **array bundle** (`<prefix>_context_features[_<i>].npz`) with the
//!   eight arrays `<polarity>_<relation>_context` (`[rows, feature_length]`)
//!   and `<polarity>_<relation>_context_length` (`[rows]`), all `int64`.
//!
//! The shard suffix is omitted when the partition has a single shard. Both
//! artifacts are written to temporary siblings and renamed into place once
//! complete; a pre-existing artifact for the same shard is removed first.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ctxgen_core::{label_for, ContextKind, CtxgenError, Shard, SENTINEL};
use glob::glob;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpzError, WriteNpzError};
use thiserror::Error;

use crate::attributes::PassthroughAttributes;
use crate::event_log::EventLogStore;
use crate::processor::ShardBuffers;

const RECORD_STEM: &str = "sparse_features";
const BUNDLE_STEM: &str = "context_features";
const TEMP_SUFFIX: &str = "partial";

/// Errors raised while writing or reading shard artifacts.
#[derive(Error, Debug)]
pub enum WriteError {
    /// An I/O error on a specific path.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A CSV encoding or decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Writing the array bundle failed.
    #[error("NPZ write error: {0}")]
    NpzWrite(#[from] WriteNpzError),

    /// Reading the array bundle failed.
    #[error("NPZ read error: {0}")]
    NpzRead(#[from] ReadNpzError),

    /// An array could not be shaped from its buffer.
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Shape, schema or padding problems.
    #[error(transparent)]
    Core(#[from] CtxgenError),

    /// A glob pattern error.
    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

impl WriteError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for writer operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Paths of the two artifacts of one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// The record table.
    pub records: PathBuf,
    /// The array bundle.
    pub bundle: PathBuf,
}

/// Naming scheme for shard artifacts in an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
    prefix: String,
}

impl OutputLayout {
    /// Creates a layout writing `<prefix>_*` files into `dir`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// The output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file name prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn file_name(&self, stem: &str, index: Option<usize>, extension: &str) -> String {
        match index {
            Some(index) => format!("{}_{stem}_{index}.{extension}", self.prefix),
            None => format!("{}_{stem}.{extension}", self.prefix),
        }
    }

    fn paths_for(&self, index: Option<usize>) -> ArtifactPaths {
        ArtifactPaths {
            records: self.dir.join(self.file_name(RECORD_STEM, index, "csv")),
            bundle: self.dir.join(self.file_name(BUNDLE_STEM, index, "npz")),
        }
    }

    /// Artifact paths of `shard`.
    pub fn paths(&self, shard: &Shard) -> ArtifactPaths {
        self.paths_for((!shard.is_sole()).then_some(shard.index))
    }

    /// Finds every artifact pair in the directory, sorted by shard index.
    ///
    /// A bundle without its record table is still returned; reading it
    /// reports the missing file.
    pub fn discover(&self) -> Result<Vec<ArtifactPaths>> {
        let pattern = self
            .dir
            .join(format!("{}_{BUNDLE_STEM}*.npz", glob::Pattern::escape(&self.prefix)));
        let mut found = Vec::new();
        for entry in glob(&pattern.to_string_lossy())? {
            let bundle = entry.map_err(|e| {
                let path = e.path().to_path_buf();
                WriteError::io(&path, std::io::Error::from(e))
            })?;
            let Some(name) = bundle.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let records_name = name
                .replacen(BUNDLE_STEM, RECORD_STEM, 1)
                .replace(".npz", ".csv");
            let index = shard_index_of(name);
            found.push((
                index,
                ArtifactPaths {
                    records: bundle.with_file_name(records_name),
                    bundle,
                },
            ));
        }
        found.sort_by_key(|(index, _)| *index);
        Ok(found.into_iter().map(|(_, paths)| paths).collect())
    }

    /// Every file under this prefix that a run may have produced: record
    /// tables, bundles and leftover temp files, with or without an index.
    pub fn existing_artifacts(&self) -> Result<Vec<PathBuf>> {
        let prefix = glob::Pattern::escape(&self.prefix);
        let mut found = Vec::new();
        for (stem, extension) in [(RECORD_STEM, "csv"), (BUNDLE_STEM, "npz")] {
            for suffix in [String::new(), format!(".{TEMP_SUFFIX}")] {
                let pattern = self
                    .dir
                    .join(format!("{prefix}_{stem}*.{extension}{suffix}"));
                for entry in glob(&pattern.to_string_lossy())? {
                    let path = entry.map_err(|e| {
                        let path = e.path().to_path_buf();
                        WriteError::io(&path, std::io::Error::from(e))
                    })?;
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }
}

fn shard_index_of(file_name: &str) -> usize {
    file_name
        .trim_end_matches(".npz")
        .rsplit('_')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Destination of completed shard buffers.
///
/// Implementations must be safe to call from several worker threads at once
/// for different shards.
pub trait ShardSink: Send + Sync {
    /// Called once, before dispatch, with the full partition.
    fn prepare(&self, _shards: &[Shard]) -> Result<()> {
        Ok(())
    }

    /// Persists one shard and returns the files it produced, if any.
    fn write(&self, buffers: &ShardBuffers) -> Result<Vec<PathBuf>>;
}

/// Writes record tables and array bundles to an [`OutputLayout`].
#[derive(Debug, Clone)]
pub struct FeatureWriter {
    layout: OutputLayout,
    store: Arc<EventLogStore>,
    attributes: Arc<PassthroughAttributes>,
}

impl FeatureWriter {
    /// Creates a writer, checking passthrough attributes against the log.
    ///
    /// # Errors
    ///
    /// Returns a schema mismatch if a user or item of the log has no
    /// attribute row.
    pub fn new(
        layout: OutputLayout,
        store: Arc<EventLogStore>,
        attributes: Arc<PassthroughAttributes>,
    ) -> Result<Self> {
        attributes.validate(store.log())?;
        Ok(Self {
            layout,
            store,
            attributes,
        })
    }

    /// The layout this writer writes to.
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    fn write_records(&self, buffers: &ShardBuffers, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["user_id", "item_id", "rating"];
        header.extend(self.attributes.columns());
        header.push("label");
        writer.write_record(&header)?;

        let log = self.store.log();
        let mut passthrough: Vec<&str> = Vec::with_capacity(self.attributes.width());
        for (offset, row) in buffers.shard().rows().enumerate() {
            let Some(event) = log.event(row) else {
                return Err(CtxgenError::schema(format!(
                    "row {row} of {} is outside the event log",
                    buffers.shard()
                ))
                .into());
            };
            passthrough.clear();
            self.attributes.extend_values(&event, &mut passthrough);

            let user = event.user_id.to_string();
            let item = event.item_id.to_string();
            let rating = event.rating.to_string();
            let label = buffers.labels()[offset].to_string();
            writer.write_record(
                [user.as_str(), item.as_str(), rating.as_str()]
                    .into_iter()
                    .chain(passthrough.iter().copied())
                    .chain(std::iter::once(label.as_str())),
            )?;
        }

        writer.flush().map_err(|e| WriteError::io(path, e))
    }

    fn write_bundle(buffers: &ShardBuffers, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| WriteError::io(path, e))?;
        let mut npz = NpzWriter::new(BufWriter::new(file));
        let rows = buffers.rows();
        for kind in ContextKind::ALL {
            let values =
                ArrayView2::from_shape((rows, buffers.feature_length()), buffers.context(kind))?;
            npz.add_array(kind.name(), &values)?;
            npz.add_array(kind.length_name(), &ArrayView1::from(buffers.lengths(kind)))?;
        }
        npz.finish()?;
        Ok(())
    }
}

impl ShardSink for FeatureWriter {
    /// Creates the output directory and clears every artifact of an earlier
    /// run under the same prefix, whatever its shard count was.
    fn prepare(&self, _shards: &[Shard]) -> Result<()> {
        let dir = self.layout.dir();
        fs::create_dir_all(dir).map_err(|e| WriteError::io(dir, e))?;
        for path in self.layout.existing_artifacts()? {
            fs::remove_file(&path).map_err(|e| WriteError::io(&path, e))?;
            tracing::info!(path = %path.display(), "Removed previously generated artifact");
        }
        Ok(())
    }

    fn write(&self, buffers: &ShardBuffers) -> Result<Vec<PathBuf>> {
        buffers.check_shape()?;
        let paths = self.layout.paths(buffers.shard());

        for path in [&paths.records, &paths.bundle] {
            if path.exists() {
                fs::remove_file(path).map_err(|e| WriteError::io(path, e))?;
                tracing::info!(path = %path.display(), "Removed previously generated artifact");
            }
        }

        let records_tmp = temp_path(&paths.records);
        let bundle_tmp = temp_path(&paths.bundle);
        let written = self
            .write_records(buffers, &records_tmp)
            .and_then(|()| Self::write_bundle(buffers, &bundle_tmp));
        if let Err(e) = written {
            let _ = fs::remove_file(&records_tmp);
            let _ = fs::remove_file(&bundle_tmp);
            return Err(e);
        }

        fs::rename(&records_tmp, &paths.records).map_err(|e| WriteError::io(&paths.records, e))?;
        fs::rename(&bundle_tmp, &paths.bundle).map_err(|e| WriteError::io(&paths.bundle, e))?;

        tracing::info!(
            shard = %buffers.shard(),
            records = %paths.records.display(),
            bundle = %paths.bundle.display(),
            "Shard features saved"
        );
        Ok(vec![paths.records, paths.bundle])
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// One row of a record table.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    /// The acting user.
    pub user_id: i64,
    /// The acted-upon item.
    pub item_id: i64,
    /// The rating.
    pub rating: f32,
    /// Passthrough attribute values, in column order.
    pub passthrough: Vec<String>,
    /// The binary label.
    pub label: u8,
}

/// The artifacts of one shard, loaded into memory.
#[derive(Debug, Clone)]
pub struct ShardArtifacts {
    /// Passthrough column names.
    pub passthrough_columns: Vec<String>,
    /// Record table rows.
    pub records: Vec<RecordRow>,
    /// `[rows, feature_length]` arrays, indexed like [`ContextKind::ALL`].
    pub contexts: [Array2<i64>; 4],
    /// `[rows]` arrays, indexed like [`ContextKind::ALL`].
    pub lengths: [Array1<i64>; 4],
}

impl ShardArtifacts {
    /// Reads both artifacts of a shard.
    pub fn read(paths: &ArtifactPaths) -> Result<Self> {
        let (passthrough_columns, records) = read_records(&paths.records)?;

        let file = File::open(&paths.bundle).map_err(|e| WriteError::io(&paths.bundle, e))?;
        let mut npz = NpzReader::new(BufReader::new(file))?;
        let names = npz.names()?;
        let lookup = |name: String| -> Result<String> {
            names
                .iter()
                .find(|n| n.trim_end_matches(".npy") == name)
                .cloned()
                .ok_or_else(|| {
                    CtxgenError::schema(format!(
                        "array {name} missing from {}",
                        paths.bundle.display()
                    ))
                    .into()
                })
        };

        let mut contexts: Vec<Array2<i64>> = Vec::with_capacity(4);
        let mut lengths: Vec<Array1<i64>> = Vec::with_capacity(4);
        for kind in ContextKind::ALL {
            let values_name = lookup(kind.name())?;
            let lengths_name = lookup(kind.length_name())?;
            let values: Array2<i64> = npz.by_name(&values_name)?;
            let row_lengths: Array1<i64> = npz.by_name(&lengths_name)?;
            contexts.push(values);
            lengths.push(row_lengths);
        }

        Ok(Self {
            passthrough_columns,
            records,
            contexts: four(contexts)?,
            lengths: four(lengths)?,
        })
    }

    /// Number of rows in the record table.
    pub fn rows(&self) -> usize {
        self.records.len()
    }

    /// Capacity of the sequences in this bundle.
    pub fn feature_length(&self) -> usize {
        self.contexts[0].ncols()
    }

    /// Checks the invariants of a shard's output.
    ///
    /// Verifies that every array has one row per record, every length lies in
    /// `[0, feature_length]`, slots past the length hold the sentinel, and
    /// each label equals `rating >= threshold`.
    pub fn verify(&self, threshold: f32) -> std::result::Result<(), CtxgenError> {
        let rows = self.rows();
        let capacity = self.feature_length();
        for kind in ContextKind::ALL {
            let values = &self.contexts[kind.index()];
            let lengths = &self.lengths[kind.index()];
            if values.nrows() != rows || lengths.len() != rows || values.ncols() != capacity {
                return Err(CtxgenError::schema(format!(
                    "{kind}: values {:?} and lengths [{}] do not match {rows} records of width {capacity}",
                    values.shape(),
                    lengths.len()
                )));
            }
            for (&raw, slots) in lengths.iter().zip(values.rows()) {
                let length = usize::try_from(raw).map_err(|_| {
                    CtxgenError::schema(format!("{kind}: negative length {raw}"))
                })?;
                if length > capacity {
                    return Err(CtxgenError::CapacityExceeded { length, capacity });
                }
                if let Some(offset) = slots.iter().skip(length).position(|&v| v != SENTINEL) {
                    return Err(CtxgenError::PaddingViolation {
                        slot: length + offset,
                        value: slots[length + offset],
                        length,
                    });
                }
            }
        }
        for (row, record) in self.records.iter().enumerate() {
            let expected = label_for(record.rating, threshold);
            if record.label != expected {
                return Err(CtxgenError::schema(format!(
                    "record {row}: label {} but rating {} implies {expected}",
                    record.label, record.rating
                )));
            }
        }
        Ok(())
    }
}

/// Reads shard `index` written under `prefix` in `dir`.
///
/// Shard 0 of a single-shard run carries no index suffix; it is found either
/// way.
pub fn read_shard(dir: &Path, prefix: &str, index: usize) -> Result<ShardArtifacts> {
    let layout = OutputLayout::new(dir, prefix);
    let suffixed = layout.paths_for(Some(index));
    if index == 0 && !suffixed.bundle.exists() {
        let sole = layout.paths_for(None);
        if sole.bundle.exists() {
            return ShardArtifacts::read(&sole);
        }
    }
    ShardArtifacts::read(&suffixed)
}

fn four<T>(arrays: Vec<T>) -> Result<[T; 4]> {
    arrays
        .try_into()
        .map_err(|_| CtxgenError::schema("expected four context arrays").into())
}

fn read_records(path: &Path) -> Result<(Vec<String>, Vec<RecordRow>)> {
    let file = File::open(path).map_err(|e| WriteError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(BufReader::new(file));
    let headers = reader.headers()?.clone();

    let position = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            CtxgenError::schema(format!(
                "column {name} missing from {}",
                path.display()
            ))
            .into()
        })
    };
    let user_col = position("user_id")?;
    let item_col = position("item_id")?;
    let rating_col = position("rating")?;
    let label_col = position("label")?;
    let fixed = [user_col, item_col, rating_col, label_col];
    let passthrough_cols: Vec<usize> = (0..headers.len()).filter(|i| !fixed.contains(i)).collect();
    let passthrough_columns = passthrough_cols
        .iter()
        .map(|&i| headers[i].to_string())
        .collect();

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let parse_err = |column: &str| {
            WriteError::from(CtxgenError::schema(format!(
                "{}: record {line} has an invalid {column}",
                path.display()
            )))
        };
        records.push(RecordRow {
            user_id: record[user_col].parse().map_err(|_| parse_err("user_id"))?,
            item_id: record[item_col].parse().map_err(|_| parse_err("item_id"))?,
            rating: record[rating_col].parse().map_err(|_| parse_err("rating"))?,
            label: record[label_col].parse().map_err(|_| parse_err("label"))?,
            passthrough: passthrough_cols
                .iter()
                .map(|&i| record[i].to_string())
                .collect(),
        });
    }
    Ok((passthrough_columns, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctxgen_core::{partition, Event, FeatureParams};
    use tempfile::tempdir;

    use crate::attributes::AttributeTable;
    use crate::event_log::EventLog;
    use crate::history::HistoryExtractor;
    use crate::processor::ShardProcessor;

    fn fixture() -> (Arc<EventLogStore>, Arc<PassthroughAttributes>) {
        let log: EventLog = vec![
            Event::new(1, 10, 5.0, 1),
            Event::new(1, 11, 2.0, 2),
            Event::new(2, 10, 4.0, 3),
        ]
        .into_iter()
        .collect();
        let mut item = AttributeTable::new(["movie_name", "genre"]);
        item.insert(10, vec!["Heat, The (1995)".into(), "Action|Crime".into()])
            .unwrap();
        item.insert(11, vec!["Toy Story (1995)".into(), "Animation".into()])
            .unwrap();
        let attrs = PassthroughAttributes {
            user: AttributeTable::default(),
            item,
        };
        (Arc::new(EventLogStore::build(log)), Arc::new(attrs))
    }

    fn buffers(store: &EventLogStore, width: usize) -> Vec<ShardBuffers> {
        let params = FeatureParams::builder()
            .feature_length(2)
            .shard_width(width)
            .build()
            .unwrap();
        let processor = ShardProcessor::new(HistoryExtractor::new(store, &params, 3).unwrap());
        partition(store.len(), width)
            .unwrap()
            .iter()
            .map(|s| processor.process(s).unwrap())
            .collect()
    }

    #[test]
    fn test_layout_names() {
        let layout = OutputLayout::new("/out", "movie_lens_1M");
        let sole = partition(5, 10).unwrap()[0];
        assert_eq!(
            layout.paths(&sole).records,
            PathBuf::from("/out/movie_lens_1M_sparse_features.csv")
        );
        let second = partition(25, 10).unwrap()[1];
        assert_eq!(
            layout.paths(&second).bundle,
            PathBuf::from("/out/movie_lens_1M_context_features_1.npz")
        );
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let (store, attrs) = fixture();
        let writer = FeatureWriter::new(OutputLayout::new(dir.path(), "t"), store.clone(), attrs)
            .unwrap();
        let all = buffers(&store, 10);
        writer.prepare(&[*all[0].shard()]).unwrap();
        writer.write(&all[0]).unwrap();

        let paths = writer.layout().paths(all[0].shard());
        let artifacts = ShardArtifacts::read(&paths).unwrap();
        assert_eq!(artifacts.rows(), 3);
        assert_eq!(artifacts.feature_length(), 2);
        assert_eq!(artifacts.passthrough_columns, vec!["movie_name", "genre"]);
        assert_eq!(artifacts.records[0].passthrough[0], "Heat, The (1995)");
        assert_eq!(artifacts.records[1].label, 0);
        assert_eq!(artifacts.records[2].user_id, 2);

        let pos_user = &artifacts.contexts[ContextKind::POSITIVE_USER.index()];
        // Row 0 (user 1, item 10): item 10 was also rated positively by user 2.
        assert_eq!(pos_user.row(0).to_vec(), vec![2, 0]);
        assert_eq!(artifacts.lengths[ContextKind::POSITIVE_USER.index()][0], 1);

        artifacts.verify(4.0).unwrap();
        assert_eq!(read_shard(dir.path(), "t", 0).unwrap().rows(), 3);
        assert!(!temp_path(&paths.records).exists());
        assert!(!temp_path(&paths.bundle).exists());
    }

    #[test]
    fn test_rewrite_overwrites_deterministically() {
        let dir = tempdir().unwrap();
        let (store, attrs) = fixture();
        let writer = FeatureWriter::new(OutputLayout::new(dir.path(), "t"), store.clone(), attrs)
            .unwrap();
        let all = buffers(&store, 2);
        writer.prepare(&[]).unwrap();
        writer.write(&all[1]).unwrap();
        let paths = writer.layout().paths(all[1].shard());
        let first_records = fs::read(&paths.records).unwrap();
        let first = ShardArtifacts::read(&paths).unwrap();

        writer.write(&all[1]).unwrap();
        assert_eq!(fs::read(&paths.records).unwrap(), first_records);
        let second = ShardArtifacts::read(&paths).unwrap();
        assert_eq!(first.contexts, second.contexts);
        assert_eq!(first.lengths, second.lengths);
    }

    #[test]
    fn test_discover_orders_by_shard_index() {
        let dir = tempdir().unwrap();
        let (store, attrs) = fixture();
        let writer = FeatureWriter::new(OutputLayout::new(dir.path(), "t"), store.clone(), attrs)
            .unwrap();
        let all = buffers(&store, 1);
        writer.prepare(&[]).unwrap();
        for b in all.iter().rev() {
            writer.write(b).unwrap();
        }
        let found = writer.layout().discover().unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(read_shard(dir.path(), "t", 2).unwrap().rows(), 1);
        for (i, paths) in found.iter().enumerate() {
            assert_eq!(paths, &writer.layout().paths(all[i].shard()));
            ShardArtifacts::read(paths).unwrap().verify(4.0).unwrap();
        }
    }

    #[test]
    fn test_prepare_clears_earlier_run_of_any_width() {
        let dir = tempdir().unwrap();
        let (store, attrs) = fixture();
        let writer = FeatureWriter::new(OutputLayout::new(dir.path(), "t"), store.clone(), attrs)
            .unwrap();
        writer.prepare(&[]).unwrap();
        for b in &buffers(&store, 1) {
            writer.write(b).unwrap();
        }
        let leftover = dir.path().join("t_context_features_7.npz.partial");
        fs::write(&leftover, b"junk").unwrap();
        let unrelated = dir.path().join("other_context_features_0.npz");
        fs::write(&unrelated, b"keep").unwrap();
        assert_eq!(writer.layout().existing_artifacts().unwrap().len(), 7);

        let sole = buffers(&store, 10);
        writer.prepare(&[*sole[0].shard()]).unwrap();
        assert!(writer.layout().existing_artifacts().unwrap().is_empty());
        assert!(unrelated.exists());

        writer.write(&sole[0]).unwrap();
        let found = writer.layout().discover().unwrap();
        assert_eq!(found, vec![writer.layout().paths(sole[0].shard())]);
        assert_eq!(read_shard(dir.path(), "t", 0).unwrap().rows(), 3);
    }

    #[test]
    fn test_missing_attributes_rejected_up_front() {
        let (store, _) = fixture();
        let mut user = AttributeTable::new(["gender"]);
        user.insert(1, vec!["0".into()]).unwrap();
        let attrs = PassthroughAttributes {
            user,
            item: AttributeTable::default(),
        };
        let result = FeatureWriter::new(OutputLayout::new("/unused", "t"), store, Arc::new(attrs));
        assert!(matches!(
            result,
            Err(WriteError::Core(CtxgenError::SchemaMismatch { .. }))
        ));
    }

    #[test]
    fn test_verify_detects_bad_label() {
        let dir = tempdir().unwrap();
        let (store, attrs) = fixture();
        let writer = FeatureWriter::new(OutputLayout::new(dir.path(), "t"), store.clone(), attrs)
            .unwrap();
        let all = buffers(&store, 10);
        writer.prepare(&[]).unwrap();
        writer.write(&all[0]).unwrap();
        let mut artifacts = ShardArtifacts::read(&writer.layout().paths(all[0].shard())).unwrap();
        artifacts.records[1].label = 1;
        assert!(artifacts.verify(4.0).is_err());
    }
}
