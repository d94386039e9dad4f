/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Messages passed between mirror workers and the supervisor.

use super::block::Block;
use crate::error::MirrorError;

/// One event a worker emits onto the shared status channel.
#[derive(Debug)]
pub enum StatusEvent {
    /// The mirror identified by `prefix` reports the artifact is `size`
    /// bytes long.
    Size { prefix: String, size: u64 },

    /// The mirror identified by `prefix` has died; `error` explains why.
    Error { prefix: String, error: MirrorError },

    /// `n` bytes were written for the block currently owned by `prefix`.
    /// `prefix` is `None` when the bytes are "accounted but unattributed"
    /// (the block already existed on disk and was skipped).
    Progress { prefix: Option<String>, n: u64 },

    /// `block` was successfully materialised by the mirror identified by
    /// `prefix`.
    Block { prefix: String, block: Block },
}
