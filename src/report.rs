use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::clients::RemoteStore;
use crate::domain::ReportResult;
use crate::error::GtdbtkError;

pub const REPORT_DIR: &str = "report";
pub const REPORT_INDEX: &str = "index.html";
pub const WARNINGS_LOG: &str = "gtdbtk.warnings.log";

const SUMMARY_PREFIX: &str = "gtdbtk.";
const SUMMARY_SUFFIX: &str = ".summary.tsv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileLink {
    pub path: PathBuf,
    pub name: String,
    pub description: String,
}

/// What gets persisted as the report object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSpec {
    pub workspace_id: u64,
    pub object_name: String,
    pub message: String,
    pub html_dir: PathBuf,
    pub html_index: String,
    pub file_links: Vec<FileLink>,
}

/// One row of a `gtdbtk.<marker set>.summary.tsv` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub marker_set: String,
    pub user_genome: String,
    pub classification: String,
    pub method: Option<String>,
    pub aa_percent: Option<f64>,
    pub note: Option<String>,
    pub warnings: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationSummary {
    pub classifications: Vec<Classification>,
    pub warnings: Vec<String>,
    pub summary_files: Vec<PathBuf>,
}

impl ClassificationSummary {
    pub fn classified_count(&self) -> usize {
        self.classifications
            .iter()
            .filter(|row| !row.classification.starts_with("Unclassified"))
            .count()
    }

    /// Genome to assigned lineage, for comparing runs.
    pub fn assignments(&self) -> BTreeMap<String, String> {
        self.classifications
            .iter()
            .map(|row| (row.user_genome.clone(), row.classification.clone()))
            .collect()
    }
}

/// Turns classifier output in `output_dir` into a persisted report object.
pub fn build_report(
    store: &dyn RemoteStore,
    output_dir: &Path,
    workspace_id: u64,
) -> Result<ReportResult, GtdbtkError> {
    let summary = read_summary(output_dir)?;
    info!(
        genomes = summary.classifications.len(),
        classified = summary.classified_count(),
        warnings = summary.warnings.len(),
        "parsed classifier output"
    );

    let html_dir = output_dir.join(REPORT_DIR);
    write_atomic(&html_dir.join(REPORT_INDEX), render_html(&summary).as_bytes())?;

    let spec = ReportSpec {
        workspace_id,
        object_name: format!("gtdbtk_report_{}", uuid::Uuid::new_v4()),
        message: format!(
            "GTDB-Tk classified {} of {} genomes ({} warnings)",
            summary.classified_count(),
            summary.classifications.len(),
            summary.warnings.len()
        ),
        html_dir,
        html_index: REPORT_INDEX.to_string(),
        file_links: summary
            .summary_files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .unwrap_or_default();
                FileLink {
                    path: path.clone(),
                    description: format!("GTDB-Tk summary table {name}"),
                    name,
                }
            })
            .collect(),
    };

    let result = store
        .create_report(&spec)
        .map_err(GtdbtkError::into_remote_write)?;
    info!(name = %result.report_name, reference = %result.report_ref, "saved report");
    Ok(result)
}

/// Collects every summary table and warning GTDB-Tk left in `output_dir`.
pub fn read_summary(output_dir: &Path) -> Result<ClassificationSummary, GtdbtkError> {
    let files = find_summary_files(output_dir)?;
    if files.is_empty() {
        return Err(GtdbtkError::ReportConstruction(format!(
            "no GTDB-Tk summary files in {}",
            output_dir.display()
        )));
    }

    let mut summary = ClassificationSummary::default();
    for path in files {
        let marker_set = marker_set(&path).unwrap_or_default();
        let content = fs::read_to_string(&path)
            .map_err(|err| GtdbtkError::Filesystem(format!("read {}: {err}", path.display())))?;
        match parse_summary(&marker_set, &content) {
            Ok(rows) => {
                for row in &rows {
                    if let Some(warning) = &row.warnings {
                        summary.warnings.push(format!("{}: {warning}", row.user_genome));
                    }
                }
                summary.classifications.extend(rows);
                summary.summary_files.push(path);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "skipping summary file"),
        }
    }
    if summary.summary_files.is_empty() {
        return Err(GtdbtkError::ReportConstruction(format!(
            "no readable GTDB-Tk summary files in {}",
            output_dir.display()
        )));
    }

    let log = output_dir.join(WARNINGS_LOG);
    if let Ok(content) = fs::read_to_string(&log) {
        summary.warnings.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    Ok(summary)
}

/// Parses one summary TSV. Columns are located by header name so that
/// differences between GTDB-Tk releases do not matter.
pub fn parse_summary(marker_set: &str, content: &str) -> Result<Vec<Classification>, GtdbtkError> {
    let mut lines = content.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| GtdbtkError::ReportConstruction("empty summary file".to_string()))?
        .split('\t')
        .map(str::trim)
        .collect::<Vec<_>>();
    let column = |name: &str| header.iter().position(|value| *value == name);
    let (Some(genome_col), Some(class_col)) = (column("user_genome"), column("classification"))
    else {
        return Err(GtdbtkError::ReportConstruction(
            "summary file lacks user_genome/classification columns".to_string(),
        ));
    };
    let method_col = column("classification_method");
    let aa_col = column("aa_percent");
    let note_col = column("note");
    let warnings_col = column("warnings");

    let mut rows = Vec::new();
    for line in lines {
        let fields = line.split('\t').map(str::trim).collect::<Vec<_>>();
        let field = |idx: Option<usize>| {
            idx.and_then(|idx| fields.get(idx))
                .copied()
                .filter(|value| !value.is_empty() && *value != "N/A")
                .map(str::to_string)
        };
        let Some(user_genome) = field(Some(genome_col)) else {
            continue;
        };
        rows.push(Classification {
            marker_set: marker_set.to_string(),
            user_genome,
            classification: field(Some(class_col)).unwrap_or_else(|| "Unclassified".to_string()),
            method: field(method_col),
            aa_percent: field(aa_col).and_then(|value| value.parse().ok()),
            note: field(note_col),
            warnings: field(warnings_col),
        });
    }
    Ok(rows)
}

fn find_summary_files(output_dir: &Path) -> Result<Vec<PathBuf>, GtdbtkError> {
    if !output_dir.is_dir() {
        return Err(GtdbtkError::ReportConstruction(format!(
            "classifier output directory {} does not exist",
            output_dir.display()
        )));
    }
    // GTDB-Tk 2.x writes into classify/ and links the tables into the root.
    let mut by_name = BTreeMap::new();
    for dir in [output_dir.join("classify"), output_dir.to_path_buf()] {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && marker_set(&path).is_some() {
                by_name.insert(entry.file_name(), path);
            }
        }
    }
    Ok(by_name.into_values().collect())
}

fn marker_set(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(SUMMARY_PREFIX))
        .and_then(|name| name.strip_suffix(SUMMARY_SUFFIX))
        .filter(|marker| !marker.is_empty())
        .map(str::to_string)
}

pub fn render_html(summary: &ClassificationSummary) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>GTDB-Tk classification</title>\n");
    html.push_str(
        "<style>table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}</style>\n",
    );
    html.push_str("</head>\n<body>\n<h1>GTDB-Tk classification</h1>\n");
    html.push_str(&format!(
        "<p>{} of {} genomes classified. Generated {}.</p>\n",
        summary.classified_count(),
        summary.classifications.len(),
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    html.push_str("<table>\n<tr><th>Genome</th><th>Marker set</th><th>Classification</th>");
    html.push_str("<th>Method</th><th>AA %</th><th>Note</th></tr>\n");
    for row in &summary.classifications {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&row.user_genome),
            escape(&row.marker_set),
            escape(&row.classification),
            escape(row.method.as_deref().unwrap_or("")),
            row.aa_percent
                .map(|value| format!("{value:.2}"))
                .unwrap_or_default(),
            escape(row.note.as_deref().unwrap_or("")),
        ));
    }
    html.push_str("</table>\n");

    if !summary.warnings.is_empty() {
        html.push_str("<h2>Warnings</h2>\n<ul>\n");
        for warning in &summary.warnings {
            html.push_str(&format!("<li>{}</li>\n", escape(warning)));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), GtdbtkError> {
    let parent = path
        .parent()
        .ok_or_else(|| GtdbtkError::Filesystem("invalid report path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| GtdbtkError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kb-gtdbtk-report")
        .tempfile_in(parent)
        .map_err(|err| GtdbtkError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| GtdbtkError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| GtdbtkError::Filesystem(err.to_string()))?;
    Ok(())
}
