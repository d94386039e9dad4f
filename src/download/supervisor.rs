/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Supervisor: spawns one worker per mirror, drains the shared status
//! queue, maintains the block-assignment state machine, and assembles
//! the final file once every block has been materialised.

use std::collections::HashSet;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::atomic_file::AtomicFile;
use super::block::{plan_blocks, Block};
use super::events::StatusEvent;
use super::mirror::Mirror;
use super::worker;
use crate::config::Config;
use crate::error::{DownloadError, Result};
use crate::progress::ProgressReporter;
use tracing::{error, info};

const STATUS_POLL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(PartialEq, Eq, Hash)]
enum Todo {
    Mirror(String),
    Block(Block),
}

/// Run the download to completion: probe every mirror, fetch every
/// block, and assemble `destination`. Returns once the file exists at
/// `destination` or a fatal error has been reported to `reporter`.
pub async fn run(
    destination: &Path,
    mirrors: &[String],
    config: &Config,
    reporter: &mut dyn ProgressReporter,
) -> Result<()> {
    reporter.start();

    let suffix = destination
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            DownloadError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "destination has no file name",
            ))
        })?
        .to_string();

    let partial_dir = partial_dir_for(destination);

    let (work_tx, work_rx) = async_channel::unbounded::<Block>();
    let (status_tx, status_rx) = async_channel::unbounded::<StatusEvent>();

    let mut todo: HashSet<Todo> = HashSet::new();
    let mut alive: HashSet<String> = HashSet::new();

    for prefix in mirrors {
        let mirror = Mirror::new(prefix.clone(), config)?;
        todo.insert(Todo::Mirror(prefix.clone()));
        alive.insert(prefix.clone());

        tokio::spawn(worker::run(
            mirror,
            suffix.clone(),
            work_tx.clone(),
            work_rx.clone(),
            status_tx.clone(),
        ));
    }
    drop(work_rx);
    drop(status_tx);

    let mut size: Option<u64> = None;
    let mut all_blocks: Vec<Block> = Vec::new();

    loop {
        let event = match tokio::time::timeout(STATUS_POLL_TIMEOUT, status_rx.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => break, // every worker has exited; todo should already be empty
            Err(_elapsed) => {
                reporter.refresh();
                continue;
            }
        };

        match event {
            StatusEvent::Size { prefix, size: reported } => {
                reporter.report_size(&prefix, reported);

                match size {
                    None => {
                        size = Some(reported);
                        std::fs::create_dir_all(&partial_dir)?;
                        all_blocks = plan_blocks(&partial_dir, reported, config.block_size);
                        for block in all_blocks.iter().cloned() {
                            todo.insert(Todo::Block(block.clone()));
                            let _ = work_tx.send(block).await;
                        }
                    }
                    Some(existing) if existing != reported => {
                        error!(existing, reported, "mirrors disagree on artifact size");
                        reporter.fatal("inconsistent size");
                        return Err(DownloadError::InconsistentSize);
                    }
                    _ => {}
                }
                todo.remove(&Todo::Mirror(prefix));
            }

            StatusEvent::Error { prefix, error } => {
                reporter.report_error(&prefix, &error);
                alive.remove(&prefix);
                todo.remove(&Todo::Mirror(prefix));

                if alive.is_empty() {
                    error!("every mirror has died");
                    reporter.fatal("unable to download file from any host");
                    return Err(DownloadError::AllMirrorsDead);
                }
            }

            StatusEvent::Progress { prefix, n } => {
                reporter.report_progress(prefix.as_deref(), n);
            }

            StatusEvent::Block { prefix, block } => {
                reporter.report_block(&prefix, &block);
                todo.remove(&Todo::Block(block));
            }
        }

        reporter.refresh();

        if todo.is_empty() && size.is_some() {
            break;
        }
    }

    gather_blocks(destination, &partial_dir, &all_blocks)?;
    info!(destination = %destination.display(), "download complete");
    reporter.finish();
    Ok(())
}

fn partial_dir_for(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Concatenate every block file into `destination` at its byte offset,
/// then remove the block files and the now-empty partial directory.
fn gather_blocks(destination: &Path, partial_dir: &Path, blocks: &[Block]) -> Result<()> {
    let mut atomic = AtomicFile::create(destination, None, 0o444)?;

    for block in blocks {
        let actual = std::fs::metadata(&block.path)?.len();
        let expected = block.len();
        if actual != expected {
            return Err(DownloadError::BlockSizeMismatch { index: block.index, expected, actual });
        }

        let contents = std::fs::read(&block.path)?;
        let file = atomic.file();
        file.seek(SeekFrom::Start(block.start))?;
        file.write_all(&contents)?;
    }

    atomic.finish()?;

    for block in blocks {
        let _ = std::fs::remove_file(&block.path);
    }
    let _ = std::fs::remove_dir(partial_dir);

    Ok(())
}
