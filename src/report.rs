//! Report output: CSV tables, the timestamped report directory and the
//! optional zip bundle.
//!
//! Every analysis command builds a list of named [`CsvTable`]s. A single
//! command either prints them to stdout or writes them under an output
//! directory; `akr report` runs all sections into one
//! `report_YYYY-MM-DD_HH-MM-SS` directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::progress::{ProgressMode, ReportProgressEvent};
use crate::sqlite_dataset::SqliteDataset;
use crate::{characteristics, overview, patterns, precision};

/// An in-memory CSV table.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.headers).chain(&self.rows) {
            let fields: Vec<String> = line.iter().map(|f| escape_field(f)).collect();
            let _ = writeln!(out, "{}", fields.join(","));
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// A table and the file name it is written under.
#[derive(Debug, Clone)]
pub struct NamedTable {
    pub file_name: String,
    pub table: CsvTable,
}

impl NamedTable {
    pub fn new(file_name: impl Into<String>, table: CsvTable) -> Self {
        Self {
            file_name: file_name.into(),
            table,
        }
    }
}

/// Quote a field when it holds a separator, a quote or a line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn format_float(value: f64) -> String {
    format!("{:.6}", value)
}

/// Write every table under `dir` (created if needed) and return the paths.
pub fn write_tables(dir: &Path, tables: &[NamedTable]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let mut written = Vec::with_capacity(tables.len());
    for t in tables {
        let path = dir.join(&t.file_name);
        t.table.write_to(&path)?;
        written.push(path);
    }
    Ok(written)
}

/// Write tables to `output` if given, otherwise print them to stdout with
/// a `# file_name` line before each.
pub fn emit_tables(tables: &[NamedTable], output: Option<&Path>) -> Result<()> {
    match output {
        Some(dir) => {
            let written = write_tables(dir, tables)?;
            for path in written {
                eprintln!("wrote {}", path.display());
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            for t in tables {
                writeln!(stdout, "# {}", t.file_name)?;
                write!(stdout, "{}", t.table.render())?;
            }
        }
    }
    Ok(())
}

pub fn report_dir_name(now: DateTime<Local>) -> String {
    now.format("report_%Y-%m-%d_%H-%M-%S").to_string()
}

/// Zip the contents of `dir` into `archive`, paths relative to `dir`.
/// Returns the number of files added.
pub fn zip_dir(dir: &Path, archive: &Path) -> Result<usize> {
    let file = std::fs::File::create(archive)
        .with_context(|| format!("Failed to create archive: {}", archive.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut files = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            zip.start_file(name, options)?;
            zip.write_all(&bytes)?;
            files += 1;
        }
    }
    zip.finish()?;
    Ok(files)
}

/// Where a finished report landed.
#[derive(Debug, Clone)]
pub struct ReportOutput {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub archive: Option<PathBuf>,
}

/// Run every report section against `dataset` into a fresh timestamped
/// directory under `base`.
pub async fn build_report(
    dataset: &SqliteDataset,
    config: &Config,
    base: &Path,
    zip: bool,
    progress: ProgressMode,
) -> Result<ReportOutput> {
    let reporter = progress.reporter();
    let dir = base.join(report_dir_name(Local::now()));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;

    let mut files = Vec::new();
    let sections = ["overview", "precision", "patterns", "characteristics"];
    for (i, section) in sections.iter().enumerate() {
        reporter.report(ReportProgressEvent::Started {
            section: section.to_string(),
            n: i as u64 + 1,
            total: sections.len() as u64,
        });
        let tables = match *section {
            "overview" => overview::overview_tables(dataset, config).await?,
            "precision" => precision::precision_tables(dataset, config).await?,
            "patterns" => patterns::pattern_tables(dataset, config).await?,
            _ => characteristics::characteristics_tables(dataset, config).await?,
        };
        let written = write_tables(&dir.join(section), &tables)?;
        reporter.report(ReportProgressEvent::Finished {
            section: section.to_string(),
            files: written.len() as u64,
        });
        files.extend(written);
    }

    let archive = if zip {
        let archive = dir.with_extension("zip");
        let added = zip_dir(&dir, &archive)?;
        info!(files = added, archive = %archive.display(), "zipped report");
        Some(archive)
    } else {
        None
    };

    Ok(ReportOutput {
        dir,
        files,
        archive,
    })
}

pub async fn run_report(
    config: &Config,
    output_dir: Option<&Path>,
    zip: bool,
    progress: ProgressMode,
) -> Result<()> {
    let dataset = SqliteDataset::new(db::connect(config).await?);
    let base = output_dir.unwrap_or(&config.report.output_dir);
    let out = build_report(&dataset, config, base, zip || config.report.zip, progress).await?;
    dataset.close().await;

    println!("report {}", out.dir.display());
    println!("  files: {}", out.files.len());
    if let Some(archive) = &out.archive {
        println!("  archive: {}", archive.display());
    }
    println!("ok");
    Ok(())
}
