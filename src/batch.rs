//! File-level conversion and directory batches.
//!
//! One file failing never stops its siblings; failures are collected into a
//! [`BatchSummary`].

use crate::config::PipelineConfig;
use crate::convert::{map_to_room, room_to_map};
use crate::error::MapError;
use crate::migrate::{cleanup_tilesets, rescale_room};
use crate::room::RoomDocument;
use crate::tmx::MapDocument;
use crate::validate::{validate_map, validate_room_with, ValidationReport, ValidatorOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Conversion direction for a directory batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `tiles_dir/*.tmx` to `rooms_dir/*.json`
    Export,
    /// `rooms_dir/*.json` to `tiles_dir/*.tmx`
    Import,
}

/// One failed file.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    /// Source file
    pub path: PathBuf,
    /// Human-readable cause
    pub reason: String,
}

/// Outcome counts for a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Files attempted
    pub total: usize,
    /// Files that converted or validated cleanly
    pub succeeded: usize,
    /// Everything else, in processing order
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    /// True when no file failed.
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &Path, outcome: Result<(), String>) {
        self.total += 1;
        match outcome {
            Ok(()) => self.succeeded += 1,
            Err(reason) => {
                error!(path = %path.display(), %reason, "failed");
                self.failures.push(BatchFailure {
                    path: path.to_path_buf(),
                    reason,
                });
            }
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn read(path: &Path) -> Result<String, MapError> {
    fs::read_to_string(path).map_err(|source| MapError::io(path, source))
}

/// Write through a sibling temporary file so a failed write never leaves a
/// partial destination behind.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), MapError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let written = fs::write(&tmp, contents)
        .map_err(|source| MapError::io(&tmp, source))
        .and_then(|()| fs::rename(&tmp, path).map_err(|source| MapError::io(path, source)));
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

/// Read and parse a `.tmx` file.
pub fn load_map(path: &Path) -> Result<MapDocument, MapError> {
    MapDocument::from_xml_str(&read(path)?)
}

/// Read and parse a room `.json` file.
pub fn load_room(path: &Path) -> Result<RoomDocument, MapError> {
    RoomDocument::from_json_str(&read(path)?)
}

/// Convert `src` into the opposite format at `dst`.
///
/// The direction follows the source extension. Nothing is written unless the
/// whole conversion succeeds.
pub fn convert_file(src: &Path, dst: &Path) -> Result<(), MapError> {
    let out = match extension(src).as_deref() {
        Some("tmx") => map_to_room(&load_map(src)?)?.to_json_string()?,
        Some("json") => room_to_map(&load_room(src)?)?.to_xml_string()?,
        _ => return Err(MapError::UnsupportedFormat(src.display().to_string())),
    };
    write_atomic(dst, &out)?;
    info!(src = %src.display(), dst = %dst.display(), "converted");
    Ok(())
}

/// Files in `dir` with extension `ext`, minus skipped names, sorted.
pub fn list_documents(
    dir: &Path,
    ext: &str,
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>, MapError> {
    let entries = fs::read_dir(dir).map_err(|source| MapError::io(dir, source))?;
    let mut out = Vec::new();
    for entry in entries {
        let path = entry.map_err(|source| MapError::io(dir, source))?.path();
        if !path.is_file() || extension(&path).as_deref() != Some(ext) {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if config.is_skipped(name) {
            warn!(file = name, "skipped");
            continue;
        }
        out.push(path);
    }
    out.sort();
    Ok(out)
}

/// Convert every document in one directory into the other.
pub fn convert_dir(config: &PipelineConfig, direction: Direction) -> Result<BatchSummary, MapError> {
    let (src_dir, src_ext, dst_dir, dst_ext) = match direction {
        Direction::Export => (&config.tiles_dir, "tmx", &config.rooms_dir, "json"),
        Direction::Import => (&config.rooms_dir, "json", &config.tiles_dir, "tmx"),
    };
    if !dst_dir.is_dir() {
        return Err(MapError::io(
            dst_dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "directory not found"),
        ));
    }

    let mut summary = BatchSummary::default();
    for src in list_documents(src_dir, src_ext, config)? {
        let stem = src.file_stem().unwrap_or_default().to_string_lossy();
        let dst = dst_dir.join(format!("{stem}.{dst_ext}"));
        summary.record(&src, convert_file(&src, &dst).map_err(|e| e.to_string()));
    }
    info!(succeeded = summary.succeeded, total = summary.total, "conversion complete");
    Ok(summary)
}

/// Per-file validation reports plus the batch summary.
#[derive(Debug, Default)]
pub struct ValidationRun {
    /// Reports for every file that could be parsed
    pub reports: Vec<(PathBuf, ValidationReport)>,
    /// Pass/fail counts; unparsable files count as failures
    pub summary: BatchSummary,
}

fn validate_each<D>(
    paths: &[PathBuf],
    load: impl Fn(&Path) -> Result<D, MapError>,
    check: impl Fn(&D) -> ValidationReport,
) -> ValidationRun {
    let mut run = ValidationRun::default();
    for path in paths {
        let report = match load(path.as_path()) {
            Ok(doc) => check(&doc),
            Err(e) => {
                run.summary.record(path, Err(e.to_string()));
                continue;
            }
        };
        for w in &report.warnings {
            warn!(path = %path.display(), "{w}");
        }
        let outcome = if report.passed() {
            Ok(())
        } else {
            let reasons: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
            Err(reasons.join("; "))
        };
        run.summary.record(path, outcome);
        run.reports.push((path.clone(), report));
    }
    run
}

/// Validate the given room files.
pub fn validate_rooms(paths: &[PathBuf], opts: ValidatorOptions) -> ValidationRun {
    validate_each(paths, load_room, |room| validate_room_with(room, opts))
}

/// Validate every room in the configured rooms directory.
pub fn validate_dir(config: &PipelineConfig) -> Result<ValidationRun, MapError> {
    let paths = list_documents(&config.rooms_dir, "json", config)?;
    Ok(validate_rooms(&paths, config.validator_options()))
}

/// Check the given authoring maps.
pub fn check_maps(paths: &[PathBuf]) -> ValidationRun {
    validate_each(paths, load_map, validate_map)
}

/// Move every room in the rooms directory to `tile_size`, rewriting in place.
pub fn migrate_dir(config: &PipelineConfig, tile_size: u32) -> Result<BatchSummary, MapError> {
    let mut summary = BatchSummary::default();
    for path in list_documents(&config.rooms_dir, "json", config)? {
        let outcome = load_room(&path).and_then(|mut room| {
            rescale_room(&mut room, tile_size)?;
            write_atomic(&path, &room.to_json_string()?)
        });
        summary.record(&path, outcome.map_err(|e| e.to_string()));
    }
    Ok(summary)
}

/// Run [`cleanup_tilesets`] over every map in the tiles directory.
///
/// Maps are edited as text, so content the map model does not cover is kept.
/// Files that need no change are not rewritten.
pub fn cleanup_dir(config: &PipelineConfig) -> Result<BatchSummary, MapError> {
    let mut summary = BatchSummary::default();
    for path in list_documents(&config.tiles_dir, "tmx", config)? {
        let outcome = read(&path).and_then(|xml| {
            let cleaned = cleanup_tilesets(&xml)?;
            for source in &cleaned.removed {
                info!(path = %path.display(), %source, "removed tileset");
            }
            if cleaned.added_canonical {
                info!(path = %path.display(), "added canonical tileset");
            }
            if cleaned.xml == xml {
                return Ok(());
            }
            write_atomic(&path, &cleaned.xml)
        });
        summary.record(&path, outcome.map_err(|e| e.to_string()));
    }
    Ok(summary)
}
