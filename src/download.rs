use crate::error::{PipelineError, PipelineResult};
use anyhow::{anyhow, Context, Result};
use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Final path segment of `url`, ignoring any query string or fragment.
pub fn local_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Streams `url` into `destination`. Callers wrap the failure in their own
/// error variant.
pub async fn fetch_to_file(client: &Client, url: &str, destination: &Path) -> Result<()> {
    let response = client.get(url).send().await.context("request failed")?;
    if !response.status().is_success() {
        return Err(anyhow!("HTTP Status {}", response.status()));
    }

    let pb = match response.content_length() {
        Some(total) => {
            let p = ProgressBar::new(total);
            p.set_style(
                ProgressStyle::with_template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}) {msg}")?
                    .progress_chars("##-"),
            );
            p
        }
        None => {
            let p = ProgressBar::new_spinner();
            p.set_style(ProgressStyle::with_template("{prefix:.bold.dim} {spinner:.green} {bytes} {msg}")?);
            p
        }
    };
    pb.set_prefix(format!(
        "[{}]",
        destination.file_name().unwrap_or_default().to_string_lossy()
    ));

    let file = File::create(destination)
        .with_context(|| format!("cannot create {}", destination.display()))?;
    let mut file = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                pb.abandon_with_message("❌ Failed");
                return Err(anyhow!(e).context("connection dropped mid-transfer"));
            }
        };
        file.write_all(&bytes)?;
        pb.inc(bytes.len() as u64);
    }
    file.flush()?;
    pb.finish_with_message("✅ Done");
    Ok(())
}

/// Decompresses `path` (which must end in `.gz`) next to itself and removes
/// the archive, like `gunzip`. Returns the decompressed path.
pub fn gunzip_in_place(path: &Path) -> PipelineResult<PathBuf> {
    let fail = |reason: String| PipelineError::Decompress {
        path: path.to_path_buf(),
        reason,
    };

    let target = match path.to_str().and_then(|p| p.strip_suffix(".gz")) {
        Some(stripped) => PathBuf::from(stripped),
        None => return Err(fail("file name does not end in .gz".into())),
    };
    let mut tmp_os: OsString = target.as_os_str().to_os_string();
    tmp_os.push(".part");
    let tmp_path = PathBuf::from(tmp_os);

    let source = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(source));
    let mut writer = BufWriter::new(File::create(&tmp_path)?);

    let copied = io::copy(&mut decoder, &mut writer).and_then(|_| writer.flush());
    drop(writer);
    if let Err(e) = copied {
        let _ = fs::remove_file(&tmp_path);
        return Err(fail(e.to_string()));
    }

    fs::rename(&tmp_path, &target)?;
    fs::remove_file(path)?;
    Ok(target)
}

/// Downloads one compressed asset into `dir` and unpacks it.
/// Returns the decompressed file name, e.g. `foo.fa` for `.../foo.fa.gz`.
pub async fn download_and_decompress(client: &Client, url: &str, dir: &Path) -> PipelineResult<String> {
    let name = local_name(url);
    if name.is_empty() {
        return Err(PipelineError::AssetDownload {
            url: url.to_string(),
            reason: "URL has no file name".into(),
        });
    }
    let archive = dir.join(name);

    info!("📥 Downloading {}", url);
    if let Err(e) = fetch_to_file(client, url, &archive).await {
        let _ = fs::remove_file(&archive);
        return Err(PipelineError::AssetDownload {
            url: url.to_string(),
            reason: format!("{:#}", e),
        });
    }

    let unpacked = gunzip_in_place(&archive)?;
    let unpacked_name = unpacked
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    info!("📦 Unpacked {}", unpacked_name);
    Ok(unpacked_name)
}
