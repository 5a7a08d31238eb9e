//! MovieLens dataset loaders.
//!
//! | Variant | Ratings       | Users       | Movies                  |
//! |---------|---------------|-------------|-------------------------|
//! | 1M      | `ratings.dat` | `users.dat` | `movies.dat` (Latin-1)  |
//! | 10M     | `ratings.dat` |             | `movies.dat` (Latin-1)  |
//! | 20M/25M | `ratings.csv` |             | `movies.csv` (UTF-8)    |
//!
//! `.dat` files are `::`-separated without a header; `.csv` files have a
//! header row and quoted titles. Ratings keep their file order, which becomes
//! the row order of the event log.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ctxgen_core::{CtxgenError, Event, DEFAULT_FEATURE_LENGTH};
use serde::Deserialize;
use thiserror::Error;

use crate::attributes::{AttributeTable, PassthroughAttributes};
use crate::event_log::EventLog;

/// Errors raised while loading a dataset.
#[derive(Error, Debug)]
pub enum LoadError {
    /// A file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed.
    #[error("{path}:{line}: {message}")]
    Parse {
        /// The file.
        path: PathBuf,
        /// 1-based line number.
        line: u64,
        /// What went wrong.
        message: String,
    },

    /// The variant name is not one of `1M`, `10M`, `20M`, `25M`.
    #[error("Unknown MovieLens variant '{0}' (expected 1M, 10M, 20M or 25M)")]
    UnknownVariant(String),

    /// The loaded tables are inconsistent.
    #[error(transparent)]
    Core(#[from] CtxgenError),
}

impl LoadError {
    fn parse(path: &Path, line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// Result type for dataset loading.
pub type Result<T> = std::result::Result<T, LoadError>;

/// A MovieLens release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetVariant {
    /// MovieLens 1M.
    Ml1M,
    /// MovieLens 10M.
    Ml10M,
    /// MovieLens 20M.
    Ml20M,
    /// MovieLens 25M.
    Ml25M,
}

impl DatasetVariant {
    /// Every supported variant.
    pub const ALL: [DatasetVariant; 4] = [Self::Ml1M, Self::Ml10M, Self::Ml20M, Self::Ml25M];

    /// Short name, e.g. `"1M"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ml1M => "1M",
            Self::Ml10M => "10M",
            Self::Ml20M => "20M",
            Self::Ml25M => "25M",
        }
    }

    /// Sequence capacity used when none is configured.
    pub fn default_feature_length(self) -> usize {
        match self {
            Self::Ml1M => DEFAULT_FEATURE_LENGTH,
            _ => 2 * DEFAULT_FEATURE_LENGTH,
        }
    }

    /// Output file prefix, e.g. `"movie_lens_1M"`.
    pub fn output_prefix(self) -> String {
        format!("movie_lens_{}", self.as_str())
    }

    fn uses_csv(self) -> bool {
        matches!(self, Self::Ml20M | Self::Ml25M)
    }
}

impl fmt::Display for DatasetVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetVariant {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LoadError::UnknownVariant(s.to_string()))
    }
}

/// A loaded dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Which release this is.
    pub variant: DatasetVariant,
    /// Ratings in file order.
    pub log: EventLog,
    /// User and movie attributes copied into the record table.
    pub attributes: PassthroughAttributes,
}

/// Optional loader behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Replace 1M occupation codes with the names listed in the release's
    /// `README`. Ignored by the other variants.
    pub real_occupation: bool,
}

/// Loads the MovieLens `variant` stored in `dir`.
pub fn load(dir: &Path, variant: DatasetVariant) -> Result<Dataset> {
    load_with(dir, variant, LoadOptions::default())
}

/// Loads the MovieLens `variant` stored in `dir` with `options`.
pub fn load_with(dir: &Path, variant: DatasetVariant, options: LoadOptions) -> Result<Dataset> {
    let (log, item) = if variant.uses_csv() {
        (
            load_ratings_csv(&dir.join("ratings.csv"))?,
            load_movies_csv(&dir.join("movies.csv"))?,
        )
    } else {
        (
            load_ratings_dat(&dir.join("ratings.dat"))?,
            load_movies_dat(&dir.join("movies.dat"))?,
        )
    };
    let user = match variant {
        DatasetVariant::Ml1M => {
            let occupations = if options.real_occupation {
                Some(load_occupations(&dir.join("README"))?)
            } else {
                None
            };
            load_users_dat(&dir.join("users.dat"), occupations.as_ref())?
        }
        _ => AttributeTable::default(),
    };

    tracing::info!(
        dir = %dir.display(),
        variant = %variant,
        ratings = log.len(),
        users = user.len(),
        movies = item.len(),
        "Loaded MovieLens dataset"
    );

    Ok(Dataset {
        variant,
        log,
        attributes: PassthroughAttributes { user, item },
    })
}

/// Reads a file as ISO-8859-1. Every byte maps to the code point of the same
/// value, so this never fails on content.
fn read_latin1(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Non-blank `::` lines of a file with their 1-based line numbers.
fn dat_lines(text: &str) -> impl Iterator<Item = (u64, &str)> + '_ {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i as u64 + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
}

fn split_fields<'a>(path: &Path, line: u64, text: &'a str, n: usize) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = text.splitn(n, "::").collect();
    if fields.len() != n {
        return Err(LoadError::parse(
            path,
            line,
            format!("expected {n} '::'-separated fields, found {}", fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_field<T: FromStr>(path: &Path, line: u64, name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LoadError::parse(path, line, format!("invalid {name} '{value}'")))
}

fn load_ratings_dat(path: &Path) -> Result<EventLog> {
    let text = read_latin1(path)?;
    let mut log = EventLog::new();
    for (line, row) in dat_lines(&text) {
        let f = split_fields(path, line, row, 4)?;
        log.push(Event::new(
            parse_field(path, line, "user id", f[0])?,
            parse_field(path, line, "movie id", f[1])?,
            parse_field(path, line, "rating", f[2])?,
            parse_field(path, line, "timestamp", f[3])?,
        ));
    }
    Ok(log)
}

/// Occupation names from the "Occupation is chosen from the following
/// choices" list of the 1M `README`, keyed by code.
fn load_occupations(path: &Path) -> Result<HashMap<i64, String>> {
    let text = read_latin1(path)?;
    let mut names = HashMap::new();
    let mut in_list = false;
    for (line, row) in dat_lines(&text) {
        if row.contains("Occupation is chosen") {
            in_list = true;
            continue;
        }
        if !in_list {
            continue;
        }
        if row.contains("MOVIES FILE DESCRIPTION") {
            break;
        }
        // *  4:  "college/grad student"
        let Some((code, rest)) = row.trim().trim_start_matches('*').split_once(':') else {
            continue;
        };
        let Some(name) = rest.split('"').nth(1) else {
            continue;
        };
        let code: i64 = parse_field(path, line, "occupation code", code)?;
        names.insert(code, name.to_string());
    }
    if names.is_empty() {
        return Err(LoadError::parse(path, 0, "no occupation list found"));
    }
    Ok(names)
}

fn load_users_dat(
    path: &Path,
    occupations: Option<&HashMap<i64, String>>,
) -> Result<AttributeTable> {
    let text = read_latin1(path)?;
    let mut table = AttributeTable::new(["gender", "age", "occupation"]);
    for (line, row) in dat_lines(&text) {
        let f = split_fields(path, line, row, 5)?;
        let user_id: i64 = parse_field(path, line, "user id", f[0])?;
        let gender = if f[1].trim() == "M" { "0" } else { "1" };
        let age: i64 = parse_field(path, line, "age", f[2])?;
        let occupation: i64 = parse_field(path, line, "occupation", f[3])?;
        let occupation = occupations
            .and_then(|names| names.get(&occupation).cloned())
            .unwrap_or_else(|| occupation.to_string());
        table.insert(user_id, vec![gender.to_string(), age.to_string(), occupation])?;
    }
    Ok(table)
}

fn load_movies_dat(path: &Path) -> Result<AttributeTable> {
    let text = read_latin1(path)?;
    let mut table = AttributeTable::new(["movie_name", "genre"]);
    for (line, row) in dat_lines(&text) {
        let f = split_fields(path, line, row, 3)?;
        let movie_id: i64 = parse_field(path, line, "movie id", f[0])?;
        table.insert(movie_id, vec![f[1].to_string(), f[2].to_string()])?;
    }
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    #[serde(rename = "userId")]
    user_id: i64,
    #[serde(rename = "movieId")]
    movie_id: i64,
    rating: f32,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct MovieRow {
    #[serde(rename = "movieId")]
    movie_id: i64,
    title: String,
    genres: String,
}

fn csv_reader(path: &Path) -> Result<csv::Reader<fs::File>> {
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::Reader::from_reader(file))
}

fn csv_error(path: &Path, err: &csv::Error) -> LoadError {
    let line = err.position().map_or(0, csv::Position::line);
    LoadError::parse(path, line, err.to_string())
}

fn load_ratings_csv(path: &Path) -> Result<EventLog> {
    let mut reader = csv_reader(path)?;
    let mut log = EventLog::new();
    for row in reader.deserialize::<RatingRow>() {
        let row = row.map_err(|e| csv_error(path, &e))?;
        log.push(Event::new(row.user_id, row.movie_id, row.rating, row.timestamp));
    }
    Ok(log)
}

fn load_movies_csv(path: &Path) -> Result<AttributeTable> {
    let mut reader = csv_reader(path)?;
    let mut table = AttributeTable::new(["movie_name", "genre"]);
    for row in reader.deserialize::<MovieRow>() {
        let row = row.map_err(|e| csv_error(path, &e))?;
        table.insert(row.movie_id, vec![row.title, row.genres])?;
    }
    Ok(table)
}
