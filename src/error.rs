/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Error taxonomy for the download engine.
//!
//! Transport failures are broken out by concrete cause (connect timeout,
//! TLS handshake failure, connection refused) purely so the progress
//! reporter can show a friendly message. None of that classification
//! feeds back into mirror lifecycle: every transport-fatal variant below
//! ends the mirror that produced it, full stop. A read stalling
//! mid-stream is handled separately and never reaches this type: it is
//! recoverable by construction, so the worker re-queues the block
//! directly instead of reporting an error (see `download::worker`).

use thiserror::Error;

/// Errors raised while probing or fetching from a single mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// `HEAD` returned a status other than 200.
    #[error("HEAD returned {status}")]
    HeadStatus { status: u16 },

    /// `HEAD` succeeded but `Content-Length` was absent or unparsable.
    #[error("Content-Length not reported")]
    MissingContentLength,

    /// `GET` with a `Range` header returned a status other than 206.
    #[error("GET returned {status}")]
    GetStatus { status: u16 },

    /// TCP connect did not complete within the per-request timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// The TLS handshake failed (certificate, protocol, or name mismatch).
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    /// The underlying connection attempt failed (refused, unreachable, DNS).
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// A streamed block was shorter or longer than its declared range.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    /// Local disk I/O failed while materialising a block.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request-level retry budget was exhausted.
    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),
}

/// Errors that terminate the whole run.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Every mirror died before the transfer finished.
    #[error("unable to download file from any host")]
    AllMirrorsDead,

    /// Two mirrors reported different total sizes for the same artifact.
    #[error("inconsistent size")]
    InconsistentSize,

    /// A block file's on-disk size didn't match its declared range at
    /// assembly time.
    #[error("block {index} has size {actual}, expected {expected}")]
    BlockSizeMismatch {
        index: usize,
        expected: u64,
        actual: u64,
    },

    /// Local disk I/O failed outside of a single block transfer (creating
    /// the partial directory, assembling the destination file, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_have_stable_display_text() {
        assert_eq!(
            DownloadError::AllMirrorsDead.to_string(),
            "unable to download file from any host"
        );
        assert_eq!(
            DownloadError::InconsistentSize.to_string(),
            "inconsistent size"
        );
    }
}
