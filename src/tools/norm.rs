//! Normalize a TAF alignment by merging runs of short adjacent blocks.

use crate::align::block::Block;
use crate::align::merge::merge_adjacent;
use crate::errors::TafError;
use crate::parser::common::{remove_tag, RUN_LENGTH_ENCODE_TAG_KEY};
use crate::parser::lines::LineSource;
use crate::parser::taf::TafWriteConfig;
use crate::parser::{maf, taf};
use std::collections::VecDeque;
use std::io::Write;

#[derive(Debug, Clone, Copy)]
pub struct NormConfig {
    /// Merge two adjacent blocks only if one or both is at most this many
    /// columns long
    pub maximum_block_length_to_merge: u64,
    /// Merge only if the unaligned bases between the blocks do not exceed
    /// this
    pub maximum_gap_length: u64,
    /// Emit MAF instead of TAF
    pub output_maf: bool,
    /// Coordinate repetition for TAF output; run-length encoding follows
    /// the input header
    pub repeat_coordinates_every_n_columns: u64,
}

impl Default for NormConfig {
    fn default() -> Self {
        NormConfig {
            maximum_block_length_to_merge: 10,
            maximum_gap_length: 10,
            output_maf: false,
            repeat_coordinates_every_n_columns: 10_000,
        }
    }
}

/// Read-ahead queue of parsed blocks. Parsing a TAF block needs the block
/// as it appeared in the file, so a few blocks are buffered before the
/// merger is allowed to consume (and rewrite) them.
struct BlockQueue<'a> {
    src: &'a mut LineSource,
    run_length_encode_bases: bool,
    queue: VecDeque<Block>,
}

impl BlockQueue<'_> {
    const READ_AHEAD: usize = 3;

    fn next(&mut self) -> Result<Option<Block>, TafError> {
        while self.queue.len() < Self::READ_AHEAD {
            match taf::read_block(self.queue.back(), self.run_length_encode_bases, self.src)? {
                Some(block) => self.queue.push_back(block),
                None => break,
            }
        }
        Ok(self.queue.pop_front())
    }
}

/// Stream a TAF alignment, merging small adjacent blocks, and emit the
/// result as TAF or MAF
pub fn normalize<W: Write>(
    src: &mut LineSource,
    config: &NormConfig,
    out: &mut W,
) -> Result<(), TafError> {
    let (mut tags, run_length_encode_bases) = taf::read_header_rle(src)?;
    if config.output_maf {
        remove_tag(&mut tags, RUN_LENGTH_ENCODE_TAG_KEY);
        maf::write_header(&tags, out)?;
    } else {
        taf::write_header(&tags, out)?;
    }
    let write_config = TafWriteConfig {
        run_length_encode_bases,
        repeat_coordinates_every_n_columns: config.repeat_coordinates_every_n_columns,
    };

    let mut blocks = BlockQueue {
        src,
        run_length_encode_bases,
        queue: VecDeque::new(),
    };
    let mut current: Option<Block> = None;
    let mut previous_written: Option<Block> = None;
    while let Some(block) = blocks.next()? {
        let held = match current.take() {
            None => block,
            Some(held) => {
                Block::link_adjacent(&held, &block, false);
                let mergeable = (held.column_number as u64
                    <= config.maximum_block_length_to_merge
                    || block.column_number as u64 <= config.maximum_block_length_to_merge)
                    && Block::max_interstitial_gap(&held) <= config.maximum_gap_length;
                if mergeable {
                    merge_adjacent(held, block)
                } else {
                    write_block(previous_written.as_ref(), &held, config, &write_config, out)?;
                    previous_written = Some(held);
                    block
                }
            }
        };
        current = Some(held);
    }
    if let Some(held) = current {
        write_block(previous_written.as_ref(), &held, config, &write_config, out)?;
    }
    Ok(())
}

fn write_block<W: Write>(
    previous: Option<&Block>,
    block: &Block,
    config: &NormConfig,
    write_config: &TafWriteConfig,
    out: &mut W,
) -> Result<(), TafError> {
    if config.output_maf {
        maf::write_block(block, out)
    } else {
        taf::write_block(previous, block, write_config, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source_over(text: &str) -> LineSource {
        LineSource::from_reader(Box::new(Cursor::new(text.as_bytes().to_vec()))).unwrap()
    }

    // one reference row split into three blocks: two contiguous short
    // blocks, then one 46 bases downstream
    const SPLIT_TAF: &str = "\
#taf
A ; i 0 hg.chr1 0 + 100
C
G ;
T
A ; g 0 46
A
";

    fn norm_config() -> NormConfig {
        NormConfig {
            repeat_coordinates_every_n_columns: 0,
            ..Default::default()
        }
    }

    #[test]
    fn contiguous_short_blocks_merge() {
        let mut src = source_over(SPLIT_TAF);
        let mut out = Vec::new();
        normalize(&mut src, &norm_config(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "#taf",
                "A ; i 0 hg.chr1 0 + 100",
                "C",
                "G",
                "T",
                "A ; g 0 46",
                "A",
            ]
        );
    }

    #[test]
    fn gap_limit_blocks_a_merge() {
        let mut src = source_over(SPLIT_TAF);
        let mut out = Vec::new();
        let config = NormConfig {
            maximum_gap_length: 100,
            ..norm_config()
        };
        normalize(&mut src, &config, &mut out).unwrap();
        // with the gap limit raised everything merges into one block whose
        // interstitial bases are unknown
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 4 + 46 + 2); // header + 52 columns
        assert_eq!(lines[1], "A ; i 0 hg.chr1 0 + 100");
        assert_eq!(lines[5], "N");
        assert_eq!(lines[51], "A");
        assert_eq!(lines[52], "A");
    }

    #[test]
    fn block_length_limit_blocks_a_merge() {
        let mut src = source_over(SPLIT_TAF);
        let mut out = Vec::new();
        let config = NormConfig {
            maximum_block_length_to_merge: 1,
            ..norm_config()
        };
        normalize(&mut src, &config, &mut out).unwrap();
        // nothing merges: both neighbours of every boundary are 2 columns
        let text = String::from_utf8(out).unwrap();
        let descriptor_lines = text.lines().filter(|l| l.contains(';')).count();
        assert_eq!(descriptor_lines, 3);
    }

    #[test]
    fn maf_output_after_merging() {
        let mut src = source_over(SPLIT_TAF);
        let mut out = Vec::new();
        let config = NormConfig {
            output_maf: true,
            ..norm_config()
        };
        normalize(&mut src, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("##maf\n\n"));
        assert!(text.contains("s hg.chr1 0 4 + 100 ACGT\n"));
        assert!(text.contains("s hg.chr1 50 2 + 100 AA\n"));
    }
}
