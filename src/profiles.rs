use crate::download::{fetch_to_file, gunzip_in_place};
use crate::error::{PipelineError, PipelineResult};
use csv::ReaderBuilder;
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

// Only the Accession column matters; InterPro exports carry many more.
#[derive(Debug, Deserialize)]
struct SearchResultRow {
    #[serde(rename = "Accession")]
    accession: String,
}

pub fn read_accessions(tsv_path: &Path) -> PipelineResult<Vec<String>> {
    info!("📄 Reading TSV file: {}", tsv_path.display());
    let fail = |line: Option<usize>, reason: String| PipelineError::TableParse {
        path: tsv_path.to_path_buf(),
        line,
        reason,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .flexible(true)
        .from_path(tsv_path)
        .map_err(|e| fail(None, e.to_string()))?;

    let headers = reader.headers().map_err(|e| fail(Some(1), e.to_string()))?;
    if !headers.iter().any(|h| h == "Accession") {
        return Err(fail(Some(1), "no 'Accession' column".into()));
    }

    let mut accessions = Vec::new();
    for result in reader.deserialize() {
        let row: SearchResultRow = result.map_err(|e| {
            let line = e.position().map(|p| p.line() as usize);
            fail(line, e.to_string())
        })?;
        accessions.push(row.accession);
    }

    info!("✅ Read {} records from TSV", accessions.len());
    Ok(accessions)
}

/// Keeps identifiers starting with `prefix`, in table order.
pub fn filter_identifiers(accessions: &[String], prefix: &str) -> Vec<String> {
    accessions
        .iter()
        .map(|a| a.trim())
        .filter(|a| a.starts_with(prefix))
        .map(str::to_string)
        .collect()
}

pub fn profile_url(base_url: &str, identifier: &str) -> String {
    format!(
        "{}/entry/pfam/{}?annotation=hmm",
        base_url.trim_end_matches('/'),
        identifier
    )
}

/// Fetches `{identifier}.hmm.gz` and unpacks it to `{identifier}.hmm` in `dir`.
pub async fn fetch_profile(client: &Client, base_url: &str, identifier: &str, dir: &Path) -> PipelineResult<()> {
    let url = profile_url(base_url, identifier);
    let archive = dir.join(format!("{}.hmm.gz", identifier));
    info!("📥 Fetching HMM profile {}", identifier);

    if let Err(e) = fetch_to_file(client, &url, &archive).await {
        let _ = fs::remove_file(&archive);
        return Err(PipelineError::ProfileFetch {
            identifier: identifier.to_string(),
            reason: format!("{:#}", e),
        });
    }
    gunzip_in_place(&archive).map_err(|e| PipelineError::ProfileFetch {
        identifier: identifier.to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Reads the table, keeps matching identifiers and downloads one profile per
/// identifier. Returns the identifiers, which double as profile file stems.
pub async fn extract_profiles(
    client: &Client,
    base_url: &str,
    tsv_path: &Path,
    prefix: &str,
    dir: &Path,
) -> PipelineResult<Vec<String>> {
    let accessions = read_accessions(tsv_path)?;
    let identifiers = filter_identifiers(&accessions, prefix);
    if identifiers.is_empty() {
        warn!("⚠️  No '{}' identifiers in {}", prefix, tsv_path.display());
        return Err(PipelineError::NoProfiles {
            path: tsv_path.to_path_buf(),
            prefix: prefix.to_string(),
        });
    }
    info!("🔍 {} of {} accessions start with '{}'", identifiers.len(), accessions.len(), prefix);

    for identifier in &identifiers {
        fetch_profile(client, base_url, identifier, dir).await?;
    }
    info!("✅ Downloaded {} HMM profiles", identifiers.len());
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{gzip, serve};
    use tempfile::tempdir;

    const TABLE: &str = "Accession\tName\tSource Database\n\
PF00001\t7tm_1\tpfam\n\
XY123\tother\tcdd\n\
PF00045\tHemopexin\tpfam\n";

    #[test]
    fn filters_by_prefix_in_row_order() {
        let td = tempdir().unwrap();
        let path = td.path().join("search.tsv");
        fs::write(&path, TABLE).unwrap();

        let accessions = read_accessions(&path).unwrap();
        assert_eq!(accessions, vec!["PF00001", "XY123", "PF00045"]);
        assert_eq!(filter_identifiers(&accessions, "PF"), vec!["PF00001", "PF00045"]);
    }

    #[test]
    fn missing_accession_column_is_parse_error() {
        let td = tempdir().unwrap();
        let path = td.path().join("search.tsv");
        fs::write(&path, "Name\tType\nfoo\tbar\n").unwrap();
        assert!(matches!(
            read_accessions(&path),
            Err(PipelineError::TableParse { .. })
        ));
    }

    #[test]
    fn missing_file_is_parse_error() {
        let td = tempdir().unwrap();
        assert!(matches!(
            read_accessions(&td.path().join("absent.tsv")),
            Err(PipelineError::TableParse { .. })
        ));
    }

    #[test]
    fn profile_url_shape() {
        assert_eq!(
            profile_url("https://www.ebi.ac.uk/interpro/wwwapi/", "PF00890"),
            "https://www.ebi.ac.uk/interpro/wwwapi/entry/pfam/PF00890?annotation=hmm"
        );
    }

    #[tokio::test]
    async fn downloads_each_matching_profile() {
        let base = serve(vec![
            ("/entry/pfam/PF00001?annotation=hmm", gzip("HMMER3/f\nNAME  7tm_1\n//\n")),
            ("/entry/pfam/PF00045?annotation=hmm", gzip("HMMER3/f\nNAME  Hemopexin\n//\n")),
        ])
        .await;
        let td = tempdir().unwrap();
        let table = td.path().join("search.tsv");
        fs::write(&table, TABLE).unwrap();

        let ids = extract_profiles(&Client::new(), &base, &table, "PF", td.path())
            .await
            .unwrap();
        assert_eq!(ids, vec!["PF00001", "PF00045"]);
        let hmm = fs::read_to_string(td.path().join("PF00045.hmm")).unwrap();
        assert!(hmm.contains("Hemopexin"));
        assert!(!td.path().join("PF00045.hmm.gz").exists());
    }

    #[tokio::test]
    async fn no_matching_identifiers_is_refused() {
        let td = tempdir().unwrap();
        let table = td.path().join("search.tsv");
        fs::write(&table, "Accession\nIPR000001\ncd00001\n").unwrap();

        let err = extract_profiles(&Client::new(), "http://127.0.0.1:9", &table, "PF", td.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoProfiles { .. }));
    }

    #[tokio::test]
    async fn unknown_profile_is_fetch_error() {
        let base = serve(vec![]).await;
        let td = tempdir().unwrap();
        let err = fetch_profile(&Client::new(), &base, "PF99999", td.path())
            .await
            .unwrap_err();
        match err {
            PipelineError::ProfileFetch { identifier, reason } => {
                assert_eq!(identifier, "PF99999");
                assert!(reason.contains("404"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!td.path().join("PF99999.hmm.gz").exists());
    }
}
