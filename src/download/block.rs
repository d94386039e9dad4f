/*
 * blockmirror - multi-mirror, block-parallel downloader.
 * Copyright (C) 2025  blockmirror contributors
 */

//! Block planning: splitting a known total size into fixed-size byte
//! ranges and their deterministic partial-file paths.

use std::path::{Path, PathBuf};

/// A single block: a byte range of the final file and the path it is
/// materialised to under the partial directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    /// 1-based index, stable across the run.
    pub index: usize,
    /// Start offset, inclusive.
    pub start: u64,
    /// End offset, exclusive.
    pub end: u64,
    /// Deterministic path this block is written to.
    pub path: PathBuf,
}

impl Block {
    /// Size of this block in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Range` header value for a GET of this block.
    pub fn range_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end - 1)
    }
}

/// Plan the ordered list of blocks for a file of `size` bytes, to be
/// materialised under `directory`. Deterministic and pure.
///
/// `parts = ceil(size / block_size)`; filenames are zero-padded to the
/// decimal width of `parts`, one-based.
pub fn plan_blocks(directory: &Path, size: u64, block_size: u64) -> Vec<Block> {
    assert!(block_size > 0, "block_size must be positive");

    if size == 0 {
        return Vec::new();
    }

    let parts = size.div_ceil(block_size);
    let width = parts.to_string().len();

    let mut blocks = Vec::with_capacity(parts as usize);
    let mut start = 0u64;
    let mut index = 1usize;

    while start < size {
        let end = (start + block_size).min(size);
        let filename = format!("{:0width$} of {parts}", index, width = width);
        blocks.push(Block {
            index,
            start,
            end,
            path: directory.join(filename),
        });
        start = end;
        index += 1;
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn partitions_contiguously_with_no_gaps_or_overlaps() {
        let blocks = plan_blocks(Path::new("/tmp/x.partial"), 2_621_440, 1_048_576);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks.last().unwrap().end, 2_621_440);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(blocks[0].len(), 1_048_576);
        assert_eq!(blocks[1].len(), 1_048_576);
        assert_eq!(blocks[2].len(), 524_288);
    }

    #[test]
    fn zero_pads_to_width_of_parts() {
        let blocks = plan_blocks(Path::new("/tmp/x.partial"), 2_621_440, 1_048_576);
        assert_eq!(blocks[0].path.file_name().unwrap(), "1 of 3");
        assert_eq!(blocks[2].path.file_name().unwrap(), "3 of 3");

        // 10 parts needs 2-digit zero padding.
        let blocks = plan_blocks(Path::new("/tmp/x.partial"), 1_048_576 * 10, 1_048_576);
        assert_eq!(blocks[0].path.file_name().unwrap(), "01 of 10");
        assert_eq!(blocks[9].path.file_name().unwrap(), "10 of 10");
    }

    #[test]
    fn single_byte_file_is_one_block() {
        let blocks = plan_blocks(Path::new("/tmp/x.partial"), 1, 1_048_576);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[0].end, 1);
    }

    #[test]
    fn exact_multiple_of_block_size_has_no_trailing_remainder_block() {
        let blocks = plan_blocks(Path::new("/tmp/x.partial"), 1_048_576 * 2, 1_048_576);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].len(), 1_048_576);
    }

    #[test]
    fn range_header_is_half_open_on_the_wire_as_inclusive_last_byte() {
        let blocks = plan_blocks(Path::new("/tmp/x.partial"), 2_621_440, 1_048_576);
        assert_eq!(blocks[0].range_header(), "bytes=0-1048575");
        assert_eq!(blocks[2].range_header(), "bytes=2097152-2621439");
    }
}
