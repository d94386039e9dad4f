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

//! Engine configuration and defaults.
//!
//! The core never reads environment variables itself (that's an external
//! collaborator's job); this struct is built once by `main` and threaded
//! down to every mirror.

use std::path::PathBuf;
use std::time::Duration;

/// Fixed block size: 1 MiB, per the block-planner contract.
pub const BLOCK_SIZE: u64 = 1024 * 1024;

/// Configuration for the download engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of each block, in bytes. Always [`BLOCK_SIZE`] in practice;
    /// kept adjustable for tests.
    pub block_size: u64,

    /// Per-request connect+read timeout.
    pub request_timeout: Duration,

    /// Per-request retry budget at the HTTP client level.
    pub request_retries: u32,

    /// Path to the bundled CA bundle used to validate every mirror's
    /// server certificate.
    pub ca_bundle_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            request_timeout: Duration::from_secs_f64(2.0),
            request_retries: 1,
            ca_bundle_path: default_ca_bundle_path(),
        }
    }
}

/// Resolve the CA bundle relative to the running executable rather than
/// reading it from process-wide state.
fn default_ca_bundle_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("ca.pem")))
        .unwrap_or_else(|| PathBuf::from("ca.pem"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_one_mebibyte_blocks_two_second_timeout_one_retry() {
        let config = Config::default();
        assert_eq!(config.block_size, 1_048_576);
        assert_eq!(config.request_timeout, Duration::from_secs_f64(2.0));
        assert_eq!(config.request_retries, 1);
    }
}
