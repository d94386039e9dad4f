/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Mirror Worker: owns one mirror's connection pool, probes it for the
//! artifact size, then pulls blocks from the shared work queue until the
//! queue is drained or the mirror dies.

use futures::StreamExt;
use http::StatusCode;
use http_body_util::BodyDataStream;
use tracing::{debug, info, warn};

use super::atomic_file::AtomicFile;
use super::block::Block;
use super::events::StatusEvent;
use super::mirror::Mirror;
use crate::error::MirrorError;

/// Run one mirror worker to completion. Returns once the mirror has died
/// or the work queue has closed (the run finished or failed elsewhere).
pub async fn run(
    mirror: Mirror,
    suffix: String,
    work_tx: async_channel::Sender<Block>,
    work_rx: async_channel::Receiver<Block>,
    status_tx: async_channel::Sender<StatusEvent>,
) {
    let prefix = mirror.prefix.clone();

    match probe(&mirror, &suffix).await {
        Ok(size) => {
            info!(mirror = %prefix, size, "mirror reported size");
            let _ = status_tx.send(StatusEvent::Size { prefix: prefix.clone(), size }).await;
        }
        Err(error) => {
            warn!(mirror = %prefix, %error, "mirror failed probe");
            let _ = status_tx.send(StatusEvent::Error { prefix, error }).await;
            return;
        }
    }

    loop {
        let block = match work_rx.recv().await {
            Ok(block) => block,
            Err(_) => return, // work queue closed: nothing left to do
        };

        match fetch_block(&mirror, &suffix, &block, &prefix, &status_tx).await {
            Ok(Outcome::Done) => {}
            Ok(Outcome::Requeue) => {
                // A recoverable failure (read timeout); nobody else holds
                // this block while it sits back in the queue.
                if work_tx.send(block).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                // This worker is giving up; surrender the block it was
                // holding before reporting the mirror dead.
                warn!(mirror = %prefix, block = block.index, %error, "mirror died mid-block");
                let _ = work_tx.send(block).await;
                let _ = status_tx.send(StatusEvent::Error { prefix: prefix.clone(), error }).await;
                return;
            }
        }
    }
}

enum Outcome {
    Done,
    Requeue,
}

async fn probe(mirror: &Mirror, suffix: &str) -> Result<u64, MirrorError> {
    let response = mirror.head(suffix).await?;

    if response.status() != StatusCode::OK {
        return Err(MirrorError::HeadStatus { status: response.status().as_u16() });
    }

    response
        .headers()
        .get(http::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .ok_or(MirrorError::MissingContentLength)
}

async fn fetch_block(
    mirror: &Mirror,
    suffix: &str,
    block: &Block,
    prefix: &str,
    status_tx: &async_channel::Sender<StatusEvent>,
) -> Result<Outcome, MirrorError> {
    if block.path.exists() {
        // Another worker (this run or a prior one) already finished this
        // block. The bytes are accounted but unattributed to this mirror.
        let _ = status_tx.send(StatusEvent::Progress { prefix: None, n: block.len() }).await;
        let _ = status_tx
            .send(StatusEvent::Block { prefix: prefix.to_string(), block: block.clone() })
            .await;
        return Ok(Outcome::Done);
    }

    let response = mirror.get_range(suffix, &block.range_header()).await?;
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(MirrorError::GetStatus { status: response.status().as_u16() });
    }

    let mut atomic = AtomicFile::create(&block.path, Some(block.len()), 0o444)?;
    let mut body = BodyDataStream::new(response.into_body());
    let mut written = 0u64;

    loop {
        let next = match tokio::time::timeout(mirror.timeout(), body.next()).await {
            Ok(next) => next,
            Err(_elapsed) => return Ok(Outcome::Requeue),
        };

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| MirrorError::RetriesExhausted(e.to_string()))?;

        use std::io::Write;
        atomic.file().write_all(&chunk)?;
        written += chunk.len() as u64;

        let _ = status_tx
            .send(StatusEvent::Progress { prefix: Some(prefix.to_string()), n: chunk.len() as u64 })
            .await;
    }

    if written != block.len() {
        return Err(MirrorError::ShortRead { expected: block.len(), actual: written });
    }

    atomic.finish()?;
    debug!(mirror = %prefix, block = block.index, "block complete");
    let _ = status_tx
        .send(StatusEvent::Block { prefix: prefix.to_string(), block: block.clone() })
        .await;
    Ok(Outcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn probe_reports_size_on_200_with_content_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/artifact"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "1048576"))
            .mount(&server)
            .await;

        let mirror = Mirror::new(format!("{}/", server.uri()), &Config::default()).unwrap();
        let size = probe(&mirror, "artifact").await.unwrap();
        assert_eq!(size, 1_048_576);
    }

    #[tokio::test]
    async fn probe_fails_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/artifact"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mirror = Mirror::new(format!("{}/", server.uri()), &Config::default()).unwrap();
        let error = probe(&mirror, "artifact").await.unwrap_err();
        assert!(matches!(error, MirrorError::HeadStatus { status: 500 }));
    }

    #[tokio::test]
    async fn probe_fails_without_content_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/artifact"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mirror = Mirror::new(format!("{}/", server.uri()), &Config::default()).unwrap();
        let error = probe(&mirror, "artifact").await.unwrap_err();
        assert!(matches!(error, MirrorError::MissingContentLength));
    }

    #[tokio::test]
    async fn fetch_block_skips_an_already_materialised_file() {
        let dir = tempfile::tempdir().unwrap();
        let path_ = dir.path().join("1 of 1");
        std::fs::write(&path_, b"x").unwrap();

        let server = MockServer::start().await;
        let mirror = Mirror::new(format!("{}/", server.uri()), &Config::default()).unwrap();
        let block = Block { index: 1, start: 0, end: 1, path: path_ };
        let (status_tx, status_rx) = async_channel::unbounded();

        let outcome = fetch_block(&mirror, "artifact", &block, "m1", &status_tx).await.unwrap();
        assert!(matches!(outcome, Outcome::Done));

        let first = status_rx.recv().await.unwrap();
        assert!(matches!(first, StatusEvent::Progress { prefix: None, n: 1 }));
        let second = status_rx.recv().await.unwrap();
        assert!(matches!(second, StatusEvent::Block { .. }));
    }

    #[tokio::test]
    async fn fetch_block_downloads_a_ranged_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifact"))
            .respond_with(
                ResponseTemplate::new(206)
                    .set_body_bytes(b"hello".to_vec())
                    .insert_header("Content-Range", "bytes 0-4/5"),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(format!("{}/", server.uri()), &Config::default()).unwrap();
        let block = Block { index: 1, start: 0, end: 5, path: dir.path().join("1 of 1") };
        let (status_tx, status_rx) = async_channel::unbounded();

        let outcome = fetch_block(&mirror, "artifact", &block, "m1", &status_tx).await.unwrap();
        assert!(matches!(outcome, Outcome::Done));
        assert_eq!(std::fs::read(&block.path).unwrap(), b"hello");

        let progress = status_rx.recv().await.unwrap();
        assert!(matches!(progress, StatusEvent::Progress { prefix: Some(_), n: 5 }));
        let done = status_rx.recv().await.unwrap();
        assert!(matches!(done, StatusEvent::Block { .. }));
    }

    #[tokio::test]
    async fn fetch_block_rejects_a_short_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifact"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(b"hi".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(format!("{}/", server.uri()), &Config::default()).unwrap();
        let block = Block { index: 1, start: 0, end: 5, path: dir.path().join("1 of 1") };
        let (status_tx, _status_rx) = async_channel::unbounded();

        let error = fetch_block(&mirror, "artifact", &block, "m1", &status_tx).await.unwrap_err();
        assert!(matches!(error, MirrorError::ShortRead { expected: 5, actual: 2 }));
    }
}
