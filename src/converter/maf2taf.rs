use crate::align::block::Block;
use crate::errors::TafError;
use crate::parser::common::{Tag, RUN_LENGTH_ENCODE_TAG_KEY};
use crate::parser::lines::LineSource;
use crate::parser::taf::TafWriteConfig;
use crate::parser::{maf, taf};
use std::io::Write;

/// Convert a MAF stream into TAF.
///
/// Adjacent blocks are linked with row substitutions tolerated, so a reused
/// row slot costs one `s` op rather than a delete/insert pair.
pub fn maf2taf<W: Write>(
    src: &mut LineSource,
    config: &TafWriteConfig,
    out: &mut W,
) -> Result<(), TafError> {
    let mut tags = maf::read_header(src)?;
    if config.run_length_encode_bases {
        tags.push(Tag::new(RUN_LENGTH_ENCODE_TAG_KEY, "1"));
    }
    taf::write_header(&tags, out)?;

    let mut previous: Option<Block> = None;
    while let Some(block) = maf::read_block(src)? {
        if let Some(previous) = &previous {
            Block::link_adjacent(previous, &block, true);
        }
        taf::write_block(previous.as_ref(), &block, config, out)?;
        previous = Some(block);
    }
    Ok(())
}
