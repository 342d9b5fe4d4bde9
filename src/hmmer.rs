//! Reader for HMMER3 per-sequence hit tables (`hmmsearch --tblout`).

use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

// target name, target accession, query name, query accession, then
// full-sequence E-value/score/bias, best-domain E-value/score/bias,
// nine domain-count columns; description of target is the rest.
const MIN_COLUMNS: usize = 18;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRecord {
    pub target_name: String,
    pub query_name: String,
    pub e_value: f64,
    pub score: f64,
}

pub fn parse_tblout(text: &str, path: &Path) -> PipelineResult<Vec<HitRecord>> {
    let mut hits = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fail = |reason: String| PipelineError::TableParse {
            path: path.to_path_buf(),
            line: Some(i + 1),
            reason,
        };

        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < MIN_COLUMNS {
            return Err(fail(format!(
                "expected at least {} columns, found {}",
                MIN_COLUMNS,
                cols.len()
            )));
        }
        let number = |idx: usize, what: &str| {
            cols[idx]
                .parse::<f64>()
                .map_err(|_| fail(format!("{} '{}' is not a number", what, cols[idx])))
        };
        hits.push(HitRecord {
            target_name: cols[0].to_string(),
            query_name: cols[2].to_string(),
            e_value: number(4, "E-value")?,
            score: number(5, "score")?,
        });
    }
    Ok(hits)
}

pub fn read_tblout(path: &Path) -> PipelineResult<Vec<HitRecord>> {
    if !path.exists() {
        return Err(PipelineError::OutputMissing {
            path: path.to_path_buf(),
        });
    }
    let text = fs::read_to_string(path)?;
    parse_tblout(&text, path)
}
