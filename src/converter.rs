//! Streaming conversions between the MAF and TAF renderings of an
//! alignment. Each driver rotates a (previous, current) block pair so the
//! whole file is never held in memory.

pub mod maf2taf;
pub mod taf2maf;

pub use maf2taf::maf2taf;
pub use taf2maf::taf2maf;

use crate::align::block::Block;
use crate::errors::TafError;
use crate::parser::common::{remove_tag, Tag, RUN_LENGTH_ENCODE_TAG_KEY};
use crate::parser::lines::LineSource;
use crate::parser::taf::TafWriteConfig;
use crate::parser::{maf, taf};
use std::io::Write;

/// Re-emit a MAF stream through the block model (used to normalize
/// whitespace and strip unconsumed line types)
pub fn maf2maf<W: Write>(src: &mut LineSource, out: &mut W) -> Result<(), TafError> {
    let tags = maf::read_header(src)?;
    maf::write_header(&tags, out)?;
    while let Some(block) = maf::read_block(src)? {
        maf::write_block(&block, out)?;
    }
    Ok(())
}

/// Re-emit a TAF stream, possibly changing its run-length encoding or
/// coordinate-repetition settings
pub fn taf2taf<W: Write>(
    src: &mut LineSource,
    config: &TafWriteConfig,
    out: &mut W,
) -> Result<(), TafError> {
    let (mut tags, run_length_encode_bases) = taf::read_header_rle(src)?;
    remove_tag(&mut tags, RUN_LENGTH_ENCODE_TAG_KEY);
    if config.run_length_encode_bases {
        tags.push(Tag::new(RUN_LENGTH_ENCODE_TAG_KEY, "1"));
    }
    taf::write_header(&tags, out)?;

    let mut previous: Option<Block> = None;
    while let Some(block) = taf::read_block(previous.as_ref(), run_length_encode_bases, src)? {
        taf::write_block(previous.as_ref(), &block, config, out)?;
        previous = Some(block);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn source_over(text: &str) -> LineSource {
        LineSource::from_reader(Box::new(Cursor::new(text.as_bytes().to_vec()))).unwrap()
    }

    #[test]
    fn taf_re_emission_can_toggle_rle() {
        let taf = "#taf\nAA ; i 0 hg.chr1 10 + 100 i 1 mm.chr1 20 + 50\nCC\nG-\nTT\nAA\n";
        let mut src = source_over(taf);
        let config = TafWriteConfig {
            run_length_encode_bases: true,
            repeat_coordinates_every_n_columns: 0,
        };
        let mut out = Vec::new();
        taf2taf(&mut src, &config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("#taf run_length_encode_bases:1\n"));
        assert!(text.contains("A 2 ; i 0 hg.chr1 10 + 100 i 1 mm.chr1 20 + 50"));
        assert!(text.contains("G 1 - 1"));

        // and back again, dropping the header flag
        let mut src = source_over(&text);
        let config = TafWriteConfig {
            run_length_encode_bases: false,
            repeat_coordinates_every_n_columns: 0,
        };
        let mut out = Vec::new();
        taf2taf(&mut src, &config, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), taf);
    }

    #[test]
    fn maf_re_emission_round_trips() {
        let maf = "##maf version=1\n\na\ns hg.chr1 10 5 + 100 ACGTA\ns mm.chr1 20 4 + 50 AC-TA\n\n";
        let mut src = source_over(maf);
        let mut out = Vec::new();
        maf2maf(&mut src, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), maf);
    }
}
