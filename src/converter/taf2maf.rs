use crate::align::block::Block;
use crate::errors::TafError;
use crate::parser::common::{remove_tag, RUN_LENGTH_ENCODE_TAG_KEY};
use crate::parser::lines::LineSource;
use crate::parser::{maf, taf};
use std::io::Write;

/// Convert a TAF stream into MAF. The run-length-encoding header key is not
/// meaningful in MAF and is dropped.
pub fn taf2maf<W: Write>(src: &mut LineSource, out: &mut W) -> Result<(), TafError> {
    let (mut tags, run_length_encode_bases) = taf::read_header_rle(src)?;
    remove_tag(&mut tags, RUN_LENGTH_ENCODE_TAG_KEY);
    maf::write_header(&tags, out)?;

    let mut previous: Option<Block> = None;
    while let Some(block) = taf::read_block(previous.as_ref(), run_length_encode_bases, src)? {
        maf::write_block(&block, out)?;
        previous = Some(block);
    }
    Ok(())
}
