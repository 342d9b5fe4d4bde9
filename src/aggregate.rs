use crate::error::{PipelineError, PipelineResult};
use crate::hmmer::{read_tblout, HitRecord};
use crate::script::output_file_name;
use csv::WriterBuilder;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Reads every `{profile}_{set}.out` in `dir`, profile-major, and flattens
/// the hits in file order.
pub fn collect_hits(dir: &Path, profiles: &[String], sequence_sets: &[String]) -> PipelineResult<Vec<HitRecord>> {
    let mut table = Vec::new();
    for profile in profiles {
        for sequence_set in sequence_sets {
            let path = dir.join(output_file_name(profile, sequence_set));
            let hits = read_tblout(&path)?;
            info!("📊 {}: {} hits", path.display(), hits.len());
            table.extend(hits);
        }
    }
    info!("✅ Collected {} hits in total", table.len());
    Ok(table)
}

pub fn write_summary(path: &Path, table: &[HitRecord]) -> PipelineResult<()> {
    let to_err = |e: csv::Error| PipelineError::Io(e.into());
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)
        .map_err(to_err)?;
    writer
        .write_record(["target_name", "query_name", "e_value", "score"])
        .map_err(to_err)?;
    for hit in table {
        writer.serialize(hit).map_err(to_err)?;
    }
    writer.flush()?;
    info!("💾 Hit table saved: {}", path.display());
    Ok(())
}

/// Aligned plain-text rendering of the table for the terminal.
pub fn print_table<W: Write>(out: &mut W, table: &[HitRecord]) -> std::io::Result<()> {
    let target_w = table
        .iter()
        .map(|h| h.target_name.len())
        .max()
        .unwrap_or(0)
        .max("target_name".len());
    let query_w = table
        .iter()
        .map(|h| h.query_name.len())
        .max()
        .unwrap_or(0)
        .max("query_name".len());
    let index_w = table.len().to_string().len();

    writeln!(
        out,
        "{:>iw$}  {:<tw$}  {:<qw$}  {:>10}  {:>8}",
        "",
        "target_name",
        "query_name",
        "e_value",
        "score",
        iw = index_w,
        tw = target_w,
        qw = query_w
    )?;
    for (i, hit) in table.iter().enumerate() {
        writeln!(
            out,
            "{:>iw$}  {:<tw$}  {:<qw$}  {:>10.3e}  {:>8.1}",
            i,
            hit.target_name,
            hit.query_name,
            hit.e_value,
            hit.score,
            iw = index_w,
            tw = target_w,
            qw = query_w
        )?;
    }
    writeln!(out, "[{} rows x 4 columns]", table.len())
}

/// Scores laid out as targets (rows) by queries (columns), both sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    pub targets: Vec<String>,
    pub queries: Vec<String>,
    /// `cells[row][col]`, `None` where the pair never produced a hit.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl ScoreMatrix {
    /// Fails on the first (target, query) pair seen twice instead of picking
    /// one of the scores.
    pub fn from_hits(table: &[HitRecord]) -> PipelineResult<Self> {
        let targets: Vec<String> = table
            .iter()
            .map(|h| h.target_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let queries: Vec<String> = table
            .iter()
            .map(|h| h.query_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let row_of: HashMap<&str, usize> = targets.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();
        let col_of: HashMap<&str, usize> = queries.iter().enumerate().map(|(i, q)| (q.as_str(), i)).collect();

        let mut cells = vec![vec![None; queries.len()]; targets.len()];
        for hit in table {
            let cell = &mut cells[row_of[hit.target_name.as_str()]][col_of[hit.query_name.as_str()]];
            if cell.is_some() {
                return Err(PipelineError::ReshapeCollision {
                    target: hit.target_name.clone(),
                    query: hit.query_name.clone(),
                });
            }
            *cell = Some(hit.score);
        }

        Ok(Self { targets, queries, cells })
    }

    pub fn max_score(&self) -> Option<f64> {
        self.cells.iter().flatten().flatten().copied().reduce(f64::max)
    }

    pub fn min_score(&self) -> Option<f64> {
        self.cells.iter().flatten().flatten().copied().reduce(f64::min)
    }
}

/// The `n` best-scoring hits, highest first. Equal scores keep table order.
pub fn top_hits(table: &[HitRecord], n: usize) -> Vec<HitRecord> {
    let mut ranked: Vec<&HitRecord> = table.iter().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked.into_iter().take(n).cloned().collect()
}
