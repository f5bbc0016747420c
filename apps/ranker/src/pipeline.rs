//! Batch mode: the pipeline step that ranks the analysed postings for one
//! résumé and hands the result to the next step.
//!
//! Input, first match wins:
//! 1. a path passed as the first positional argument,
//! 2. stdin, when it is piped and its first bytes arrive within 100 ms,
//! 3. `output_file_requirements` from the pipeline config.
//!
//! A spawner that leaves stdin as an open but silent pipe therefore gets the
//! config file instead of a hang.
//!
//! The ranking is written pretty-printed to `output_file_score` and printed
//! compact on stdout.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::PipelineFiles;
use crate::ranking::posting::parse_postings;
use crate::ranking::ranker::{RankedPosting, SimilarityRanker};

const STDIN_WAIT: Duration = Duration::from_millis(100);
const STDIN_CHUNK: usize = 8192;

#[derive(Debug, PartialEq)]
enum InputSource {
    File(PathBuf),
    Stdin(String),
}

pub async fn run(
    ranker: &SimilarityRanker,
    files: &PipelineFiles,
    input_arg: Option<PathBuf>,
) -> Result<Vec<RankedPosting>> {
    let stdin = if input_arg.is_none() {
        read_piped_stdin().await?
    } else {
        None
    };

    let source = select_input(input_arg, stdin, &files.requirements_file);
    let ranking = rank_from(ranker, files, source).await?;

    println!("{}", serde_json::to_string(&ranking)?);
    Ok(ranking)
}

async fn rank_from(
    ranker: &SimilarityRanker,
    files: &PipelineFiles,
    source: InputSource,
) -> Result<Vec<RankedPosting>> {
    let raw = match source {
        InputSource::Stdin(raw) => {
            info!("Reading postings from stdin");
            raw
        }
        InputSource::File(path) => {
            info!("Reading postings from {}", path.display());
            read_text(&path).await?
        }
    };

    let payload: serde_json::Value =
        serde_json::from_str(&raw).context("Postings input is not valid JSON")?;
    let postings = parse_postings(&payload)?;

    let resume_text = read_text(&files.resume_file).await?;
    let report = ranker.rank(&resume_text, &postings).await?;

    write_ranking(&files.score_file, &report.ranking).await?;
    info!(
        "Wrote {} ranked postings to {}",
        report.ranking.len(),
        files.score_file.display()
    );

    Ok(report.ranking)
}

fn select_input(arg: Option<PathBuf>, stdin: Option<String>, fallback: &Path) -> InputSource {
    match (arg, stdin) {
        (Some(path), _) => InputSource::File(path),
        (None, Some(raw)) => InputSource::Stdin(raw),
        (None, None) => InputSource::File(fallback.to_path_buf()),
    }
}

/// Reads stdin only when it is not a terminal. Blank input counts as none.
async fn read_piped_stdin() -> Result<Option<String>> {
    if std::io::stdin().is_terminal() {
        return Ok(None);
    }
    read_piped(spawn_reader(std::io::stdin()), STDIN_WAIT).await
}

/// Streams `source` in chunks from a detached thread. A blocked read can't be
/// cancelled and must not hold up runtime shutdown.
fn spawn_reader<R: Read + Send + 'static>(
    mut source: R,
) -> mpsc::UnboundedReceiver<std::io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut buf = vec![0u8; STDIN_CHUNK];
        loop {
            match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

/// Waits up to `wait` for the first chunk, then reads to end of input.
async fn read_piped(
    mut chunks: mpsc::UnboundedReceiver<std::io::Result<Vec<u8>>>,
    wait: Duration,
) -> Result<Option<String>> {
    let mut raw = match tokio::time::timeout(wait, chunks.recv()).await {
        Ok(Some(chunk)) => chunk.context("Failed to read postings from stdin")?,
        Ok(None) => return Ok(None),
        Err(_) => {
            debug!("No data on stdin after {}ms", wait.as_millis());
            return Ok(None);
        }
    };

    while let Some(chunk) = chunks.recv().await {
        raw.extend(chunk.context("Failed to read postings from stdin")?);
    }

    let raw = String::from_utf8(raw).context("Postings on stdin are not valid UTF-8")?;
    Ok(if raw.trim().is_empty() { None } else { Some(raw) })
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))
}

async fn write_ranking(path: &Path, ranking: &[RankedPosting]) -> Result<()> {
    let json = serde_json::to_string_pretty(ranking)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write ranking to '{}'", path.display()))
}
