use crate::catalog::CatalogEntry;
use crate::console::Console;
use crate::error::{PipelineError, PipelineResult, SelectionError};
use std::collections::HashSet;
use std::io::{BufRead, Write};
use tracing::warn;

/// Parses one line of space separated catalog indices.
///
/// Exactly `count` tokens, each an index in `0..len`, no repeats.
pub fn parse_selection(line: &str, count: usize, len: usize) -> Result<Vec<usize>, SelectionError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != count {
        return Err(SelectionError::WrongCount {
            expected: count,
            got: tokens.len(),
        });
    }

    let mut seen = HashSet::new();
    let mut indices = Vec::with_capacity(count);
    for token in tokens {
        let index: usize = token
            .parse()
            .map_err(|_| SelectionError::NotAnIndex(token.to_string()))?;
        if index >= len {
            return Err(SelectionError::OutOfRange { index, len });
        }
        if !seen.insert(index) {
            return Err(SelectionError::Duplicate(index));
        }
        indices.push(index);
    }
    Ok(indices)
}

pub fn print_catalog<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    catalog: &[CatalogEntry],
) -> PipelineResult<()> {
    for (i, entry) in catalog.iter().enumerate() {
        console.say(&format!("{}\t\t{}\t\t{}", i, entry.label, entry.group))?;
    }
    Ok(())
}

/// Lists the catalog and asks until a valid selection arrives.
/// `max_attempts = None` keeps asking forever.
pub fn select_entries<'a, R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    catalog: &'a [CatalogEntry],
    count: usize,
    max_attempts: Option<u32>,
) -> PipelineResult<Vec<&'a CatalogEntry>> {
    let mut attempts = 0u32;
    loop {
        print_catalog(console, catalog)?;
        let answer = console.ask(&format!(
            "Enter {} index numbers (from the list) separated by space to download their corresponding FASTA files:",
            count
        ))?;
        match parse_selection(&answer, count, catalog.len()) {
            Ok(indices) => return Ok(indices.into_iter().map(|i| &catalog[i]).collect()),
            Err(e) => {
                attempts += 1;
                warn!("⚠️  Invalid selection '{}': {}", answer.trim(), e);
                console.say(&format!("Invalid input ({}). Please enter {} valid index numbers.", e, count))?;
                if max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(PipelineError::TooManyAttempts(attempts));
                }
            }
        }
    }
}
