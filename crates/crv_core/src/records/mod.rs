//! Line-oriented JSON run files: one `{input_info, result}` record per claim, plus the
//! run-arguments file written next to the output.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::RevisionResult;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub input_info: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RevisionResult>,
    // Any other caller fields on the line are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RunRecord {
    /// The claim text stored under `claim_field` of `input_info`.
    pub fn claim(&self, claim_field: &str) -> Result<&str, AppError> {
        match self.input_info.get(claim_field) {
            Some(serde_json::Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(AppError::new(
                "RECORDS_CLAIM_INVALID",
                "Claim field is not a string",
            )
            .with_details(format!("field={claim_field}"))),
            None => Err(AppError::new("RECORDS_CLAIM_MISSING", "Claim field not found in input_info")
                .with_details(format!("field={claim_field}"))),
        }
    }
}

pub fn read_records(path: &Path) -> Result<Vec<RunRecord>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new("RECORDS_READ_FAILED", "Failed to open records file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;

    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            AppError::new("RECORDS_READ_FAILED", "Failed to read records file")
                .with_details(format!("path={}; line={}; err={}", path.display(), idx + 1, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: RunRecord = serde_json::from_str(&line).map_err(|e| {
            AppError::new("RECORDS_DECODE_FAILED", "Failed to decode record line")
                .with_details(format!("path={}; line={}; err={}", path.display(), idx + 1, e))
        })?;
        out.push(rec);
    }
    Ok(out)
}

/// Map claim text to its finished result, for resuming an interrupted run.
/// A missing file means nothing has finished yet.
pub fn load_finished_results(
    path: &Path,
    claim_field: &str,
) -> Result<BTreeMap<String, RevisionResult>, AppError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let mut out = BTreeMap::new();
    for rec in read_records(path)? {
        let claim = rec.claim(claim_field)?.to_string();
        if let Some(result) = rec.result {
            out.insert(claim, result);
        }
    }
    log::info!("found {} finished records in {}", out.len(), path.display());
    Ok(out)
}

/// Writes one record per line, flushing after each so an interrupted run can resume.
pub struct RecordWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl RecordWriter {
    /// Create (or truncate) the output file.
    pub fn create(path: &Path) -> Result<Self, AppError> {
        let file = File::create(path).map_err(|e| {
            AppError::new("RECORDS_WRITE_FAILED", "Failed to create records file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, rec: &RunRecord) -> Result<(), AppError> {
        let line = serde_json::to_string(rec).map_err(|e| {
            AppError::new("RECORDS_WRITE_FAILED", "Failed to encode record")
                .with_details(e.to_string())
        })?;
        writeln!(self.out, "{line}")
            .and_then(|_| self.out.flush())
            .map_err(|e| {
                AppError::new("RECORDS_WRITE_FAILED", "Failed to write record")
                    .with_details(format!("path={}; err={}", self.path.display(), e))
            })
    }
}

/// `<output>_args`, next to the output file.
pub fn run_args_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push("_args");
    PathBuf::from(name)
}

#[derive(Serialize)]
struct RunArgsFile<'a, T: Serialize> {
    written_at: String,
    #[serde(flatten)]
    args: &'a T,
}

/// Persist the invocation's arguments for reproducibility. Written via tmp + rename.
pub fn write_run_args<T: Serialize>(output: &Path, args: &T) -> Result<PathBuf, AppError> {
    let written_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("RECORDS_WRITE_FAILED", "Failed to format time").with_details(e.to_string())
    })?;
    let path = run_args_path(output);
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    let json = serde_json::to_string_pretty(&RunArgsFile { written_at, args }).map_err(|e| {
        AppError::new("RECORDS_WRITE_FAILED", "Failed to encode run arguments")
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("RECORDS_WRITE_FAILED", "Failed to write run arguments")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, &path).map_err(|e| {
        AppError::new("RECORDS_WRITE_FAILED", "Failed to finalize run arguments write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })?;
    Ok(path)
}
