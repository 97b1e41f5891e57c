//! The `.tai` sparse positional index over a TAF or MAF file, and the range
//! iterator answering contig-interval queries against it.
//!
//! The index is a text table of `(contig, reference_position, file_offset)`
//! records, one per `block_size` reference bases, pointing at restart
//! anchors in the underlying file. Offsets are plain byte offsets for
//! uncompressed input and bgzip virtual offsets for bgzipped input.

use crate::align::block::{base_count, Block};
use crate::errors::TafError;
use crate::parser::common::{check_input_format, str2u64, FileFormat, Strand};
use crate::parser::lines::LineSource;
use crate::parser::{maf, taf};
use log::{info, warn};
use nom::bytes::complete::tag;
use nom::character::complete::digit1;
use nom::combinator::{all_consuming, map_res, opt};
use nom::sequence::{pair, preceded};
use nom::IResult;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::ops::Bound;
use std::rc::Weak;

/// The index path formed by appending `.tai` to the input path
pub fn tai_path(input_path: &str) -> String {
    format!("{}.tai", input_path)
}

/// A query interval on one contig, 0-based half-open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub contig: String,
    pub start: u64,
    pub length: u64,
}

fn span(input: &str) -> IResult<&str, (u64, Option<u64>)> {
    pair(
        map_res(digit1, str::parse::<u64>),
        opt(preceded(tag("-"), map_res(digit1, str::parse::<u64>))),
    )(input)
}

impl Region {
    /// Parse `contig`, `contig:start` (one base) or `contig:start-end`
    pub fn parse(region: &str) -> Result<Region, TafError> {
        match region.rsplit_once(':') {
            Some((contig, suffix)) => {
                if contig.is_empty() {
                    return Err(TafError::ParseRegion(region.to_string()));
                }
                let (_, (start, end)) = all_consuming(span)(suffix)
                    .map_err(|_| TafError::ParseRegion(region.to_string()))?;
                let length = match end {
                    Some(end) if end >= start => end - start,
                    Some(_) => return Err(TafError::ParseRegion(region.to_string())),
                    None => 1,
                };
                Ok(Region {
                    contig: contig.to_string(),
                    start,
                    length,
                })
            }
            None if !region.is_empty() => Ok(Region {
                contig: region.to_string(),
                start: 0,
                length: u64::MAX,
            }),
            None => Err(TafError::ParseRegion(region.to_string())),
        }
    }

    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }
}

/// Tracks the last emitted record so continuation lines can be relative
struct EntryWriter {
    block_size: u64,
    prev: Option<(String, u64, u64)>,
}

impl EntryWriter {
    fn new(block_size: u64) -> Self {
        EntryWriter {
            block_size,
            prev: None,
        }
    }

    fn push<W: Write>(
        &mut self,
        out: &mut W,
        contig: &str,
        position: u64,
        file_offset: u64,
    ) -> Result<(), TafError> {
        let same_contig = match &self.prev {
            Some((prev_contig, _, _)) => prev_contig == contig,
            None => false,
        };
        let far_enough = match &self.prev {
            Some((_, prev_position, _)) => position
                .checked_sub(*prev_position)
                .map(|distance| distance >= self.block_size)
                .unwrap_or(false),
            None => true,
        };
        if !same_contig || far_enough {
            if same_contig {
                let (_, prev_position, prev_offset) = self.prev.as_ref().unwrap();
                writeln!(
                    out,
                    "*\t{}\t{}",
                    position - prev_position,
                    file_offset - prev_offset
                )?;
            } else {
                writeln!(out, "{}\t{}\t{}", contig, position, file_offset)?;
            }
            self.prev = Some((contig.to_string(), position, file_offset));
        }
        Ok(())
    }
}

/// Reference (row 0) coordinates of a TAF line, but only when every row on
/// the line carries coordinates, i.e. the line is a restart anchor
fn parse_coordinates_line(
    tokens: &[&str],
    run_length_encode_bases: bool,
) -> Result<Option<(String, u64, Strand)>, TafError> {
    let Some(semicolon) = taf::coordinates_token(tokens) else {
        return Ok(None);
    };

    let mut row_count: u64 = 0;
    if run_length_encode_bases {
        for token in &tokens[..semicolon] {
            if token.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                row_count += str2u64(token)?;
            }
        }
    } else if semicolon >= 1 {
        row_count = tokens[0].len() as u64;
    }

    let mut coordinate_count: u64 = 0;
    let mut reference: Option<(String, u64, Strand)> = None;
    let mut j = semicolon + 1;
    while j < tokens.len() && tokens[j] != "@" {
        let op = tokens[j];
        j += 1;
        if j >= tokens.len() {
            return Err(TafError::MalformedRecord(
                "row operation is missing its row index".to_string(),
            ));
        }
        let row_index = str2u64(tokens[j])?;
        j += 1;
        match op {
            "i" | "s" => {
                coordinate_count += 1;
                let (name, start, strand, _) = taf::parse_coordinates(tokens, &mut j)?;
                if row_index == 0 {
                    reference = Some((name, start, strand));
                }
            }
            "d" => {}
            "g" | "G" => {
                j += 1;
            }
            other => return Err(TafError::UnknownOp(other.to_string())),
        }
    }

    if coordinate_count == row_count {
        Ok(reference)
    } else {
        Ok(None)
    }
}

fn create_taf<W: Write>(
    src: &mut LineSource,
    out: &mut W,
    block_size: u64,
    run_length_encode_bases: bool,
) -> Result<(), TafError> {
    let mut writer = EntryWriter::new(block_size);
    loop {
        let file_offset = src.tell();
        let line = match src.next_line()? {
            Some(line) => line,
            None => break,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().map(|t| t.starts_with('#')).unwrap_or(true) {
            continue;
        }
        if let Some((contig, position, strand)) =
            parse_coordinates_line(&tokens, run_length_encode_bases)?
        {
            if strand != Strand::Positive {
                return Err(TafError::IndexConflict(
                    "reference (row 0) sequence found on negative strand".to_string(),
                ));
            }
            writer.push(out, &contig, position, file_offset)?;
        }
    }
    Ok(())
}

fn create_maf<W: Write>(
    src: &mut LineSource,
    out: &mut W,
    block_size: u64,
) -> Result<(), TafError> {
    let mut writer = EntryWriter::new(block_size);
    loop {
        // land on the block's `a` line so its offset is the one recorded
        let opens_block = match src.peek() {
            Some(line) => line.split_whitespace().next() == Some("a"),
            None => break,
        };
        if !opens_block {
            src.next_line()?;
            continue;
        }
        let file_offset = src.tell();
        let block = match maf::read_block(src)? {
            Some(block) => block,
            None => break,
        };
        let row0 = block.rows[0].borrow();
        if row0.strand != Strand::Positive {
            return Err(TafError::IndexConflict(
                "reference (row 0) sequence found on negative strand".to_string(),
            ));
        }
        writer.push(out, &row0.sequence_name, row0.start, file_offset)?;
    }
    Ok(())
}

/// Scan a TAF or MAF stream and write its `.tai` index.
///
/// One record is emitted per contig start and then per `block_size`
/// reference bases; for TAF only self-describing restart anchor lines are
/// eligible.
pub fn create<W: Write>(
    src: &mut LineSource,
    out: &mut W,
    block_size: u64,
) -> Result<(), TafError> {
    if !src.indexable() {
        return Err(TafError::UnsupportedCompression);
    }
    let header = src
        .peek()
        .ok_or_else(|| TafError::Empty("no header line to index".to_string()))?;
    match check_input_format(header) {
        FileFormat::Taf => {
            let (_, run_length_encode_bases) = taf::read_header_rle(src)?;
            create_taf(src, out, block_size, run_length_encode_bases)
        }
        FileFormat::Maf => {
            maf::read_header(src)?;
            create_maf(src, out, block_size)
        }
        FileFormat::Unknown => Err(TafError::MalformedHeader(
            "unable to detect ##maf or #taf header".to_string(),
        )),
    }
}

/// The loaded index: per-contig sorted position tables plus the format flag
#[derive(Debug)]
pub struct Tai {
    contigs: BTreeMap<String, BTreeMap<u64, u64>>,
    maf: bool,
}

impl Tai {
    /// Parse a `.tai`, expanding `*` continuation rows into absolute values
    pub fn load<R: BufRead>(reader: R, maf: bool) -> Result<Tai, TafError> {
        let mut contigs: BTreeMap<String, BTreeMap<u64, u64>> = BTreeMap::new();
        let mut prev: Option<(String, u64, u64)> = None;
        for line in reader.lines() {
            let line = line?;
            let tokens: Vec<&str> = line.split('\t').collect();
            if tokens.len() != 3 {
                warn!("skipping tai line that does not have 3 columns: {}", line);
                continue;
            }
            let position = str2u64(tokens[1])?;
            let file_offset = str2u64(tokens[2])?;
            let (contig, position, file_offset) = if tokens[0] == "*" {
                match &prev {
                    Some((contig, prev_position, prev_offset)) => (
                        contig.clone(),
                        prev_position + position,
                        prev_offset + file_offset,
                    ),
                    None => {
                        return Err(TafError::MalformedRecord(format!(
                            "unable to deduce contig from tai line: {}",
                            line
                        )))
                    }
                }
            } else {
                (tokens[0].to_string(), position, file_offset)
            };
            contigs
                .entry(contig.clone())
                .or_default()
                .insert(position, file_offset);
            prev = Some((contig, position, file_offset));
        }
        info!("loaded .tai index over {} contigs", contigs.len());
        Ok(Tai { contigs, maf })
    }

    /// True when the indexed file is MAF rather than TAF
    pub fn is_maf(&self) -> bool {
        self.maf
    }

    /// The distinct contig names in the index, in order
    pub fn contig_names(&self) -> impl Iterator<Item = &str> {
        self.contigs.keys().map(|name| name.as_str())
    }

    /// First index entry at or after `(contig, end)` in global order; used
    /// to bound the forward scan
    fn upper_bound(&self, contig: &str, end: u64) -> Option<u64> {
        if let Some(entries) = self.contigs.get(contig) {
            if let Some((_, &offset)) = entries.range(end..).next() {
                return Some(offset);
            }
        }
        self.contigs
            .range::<str, _>((Bound::Excluded(contig), Bound::Unbounded))
            .next()
            .and_then(|(_, entries)| entries.values().next().copied())
    }

    /// Open a range query. A region outside the index yields an iterator
    /// that returns no blocks.
    pub fn iterator<'a>(
        &self,
        src: &'a mut LineSource,
        run_length_encode_bases: bool,
        region: &Region,
    ) -> Result<TaiIterator<'a>, TafError> {
        let end = region.end();
        let mut iterator = TaiIterator {
            src,
            contig: region.contig.clone(),
            start: region.start,
            end,
            run_length_encode_bases,
            maf: self.maf,
            alignment: None,
            p_alignment: None,
        };

        // the greatest entry at or below the region start anchors the scan
        let anchor = self
            .contigs
            .get(&region.contig)
            .and_then(|entries| entries.range(..=region.start).next_back())
            .map(|(_, &offset)| offset);
        let Some(anchor_offset) = anchor else {
            return Ok(iterator);
        };
        let upper_offset = self.upper_bound(&region.contig, end);

        iterator.src.seek(anchor_offset)?;
        if !self.maf {
            // force the anchor line to start a fresh alignment: express all
            // of its coordinates as insertions
            let line = iterator
                .src
                .peek()
                .ok_or_else(|| {
                    TafError::MalformedRecord("indexed offset points past end of file".to_string())
                })?
                .to_string();
            let rewritten = rewrite_anchor_line(&line)?;
            iterator.src.replace_peeked(rewritten);
        }

        // scan forward until a block intersects the region
        let mut p_alignment: Option<Block> = None;
        let mut scanned = 0usize;
        loop {
            let file_offset = iterator.src.tell();
            if let Some(upper) = upper_offset {
                if file_offset >= upper {
                    break; // past the query region: there is no hope
                }
            }
            let block = match read_next(
                self.maf,
                p_alignment.as_ref(),
                run_length_encode_bases,
                iterator.src,
            )? {
                Some(block) => block,
                None => break,
            };
            scanned += 1;
            let intersects = match block.rows.first() {
                Some(row0) => {
                    let row0 = row0.borrow();
                    row0.sequence_name == iterator.contig
                        && row0.start < iterator.end
                        && row0.end() > iterator.start
                }
                None => false,
            };
            if intersects {
                // cut the block loose so its absolute coordinates stand
                for row in &block.rows {
                    row.borrow_mut().left = Weak::new();
                }
                iterator.alignment = Some(block);
                break;
            }
            p_alignment = Some(block);
        }
        info!(
            "scanned {} blocks to {} the region start",
            scanned,
            if iterator.alignment.is_some() {
                "find"
            } else {
                "not find"
            }
        );
        Ok(iterator)
    }

    /// Length of every indexed reference contig, read by seeking to each
    /// contig's first entry
    pub fn sequence_lengths(
        &self,
        src: &mut LineSource,
    ) -> Result<BTreeMap<String, u64>, TafError> {
        src.seek(0)?;
        let header = src
            .peek()
            .ok_or_else(|| TafError::Empty("no header line".to_string()))?;
        let format = check_input_format(header);
        let run_length_encode_bases = match format {
            FileFormat::Taf => taf::read_header_rle(src)?.1,
            FileFormat::Maf => {
                maf::read_header(src)?;
                false
            }
            FileFormat::Unknown => {
                return Err(TafError::MalformedHeader(
                    "unable to detect ##maf or #taf header".to_string(),
                ))
            }
        };

        let mut lengths = BTreeMap::new();
        for (contig, entries) in &self.contigs {
            let Some(&offset) = entries.values().next() else {
                continue;
            };
            src.seek(offset)?;
            if !self.maf {
                let line = src
                    .peek()
                    .ok_or_else(|| {
                        TafError::MalformedRecord(
                            "indexed offset points past end of file".to_string(),
                        )
                    })?
                    .to_string();
                src.replace_peeked(rewrite_anchor_line(&line)?);
            }
            let block = read_next(self.maf, None, run_length_encode_bases, src)?
                .ok_or_else(|| TafError::IndexMiss(contig.clone()))?;
            if let Some(row0) = block.rows.first() {
                let row0 = row0.borrow();
                lengths.insert(row0.sequence_name.clone(), row0.sequence_length);
            }
        }
        Ok(lengths)
    }
}

/// Read the next block in whichever format the index covers; MAF blocks are
/// linked to their predecessor to mirror the TAF reader's behavior
fn read_next(
    maf_format: bool,
    p_block: Option<&Block>,
    run_length_encode_bases: bool,
    src: &mut LineSource,
) -> Result<Option<Block>, TafError> {
    if maf_format {
        let block = maf::read_block(src)?;
        if let (Some(p_block), Some(block)) = (p_block, &block) {
            Block::link_adjacent(p_block, block, true);
        }
        Ok(block)
    } else {
        taf::read_block(p_block, run_length_encode_bases, src)
    }
}

/// Rewrite an indexed anchor line so it can start a new alignment: `s` ops
/// become `i`, and `d`/`g`/`G` ops (which reference a previous block that a
/// cold start does not have) are dropped
fn rewrite_anchor_line(line: &str) -> Result<String, TafError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(semicolon) = taf::coordinates_token(&tokens) else {
        return Err(TafError::MalformedRecord(format!(
            "indexed taf line carries no coordinates: {}",
            line
        )));
    };

    let mut kept: Vec<&str> = tokens[..=semicolon].to_vec();
    let mut j = semicolon + 1;
    while j < tokens.len() && tokens[j] != "@" {
        let op = tokens[j];
        match op {
            "i" | "s" => {
                if j + 1 >= tokens.len() {
                    return Err(TafError::MalformedRecord(format!(
                        "row operation `{}` is missing its row index",
                        op
                    )));
                }
                kept.push("i");
                kept.push(tokens[j + 1]); // row index
                j += 2;
                let mut coordinate_end = j;
                taf::parse_coordinates(&tokens, &mut coordinate_end)?;
                kept.extend(&tokens[j..coordinate_end]);
                j = coordinate_end;
            }
            "d" => {
                j += 2;
            }
            "g" | "G" => {
                j += 3;
            }
            other => return Err(TafError::UnknownOp(other.to_string())),
        }
    }
    kept.extend(tokens.get(j..).unwrap_or(&[]));
    Ok(kept.join(" "))
}

/// Bit flags reporting which sides of a block were cut
const CLIPPED_RIGHT: u8 = 1;
const CLIPPED_LEFT: u8 = 2;

/// Clip a block in place to `[start, end)` on its reference (row 0),
/// counting trim distances in non-gap reference bases. Rows left with no
/// aligned bases are removed; row 0 always survives.
fn clip_block(block: &mut Block, start: u64, end: u64) -> u8 {
    let mut clipped = 0u8;

    let (row0_start, row0_end) = {
        let row0 = block.rows[0].borrow();
        (row0.start, row0.end())
    };

    if start > row0_start {
        let left_trim = start - row0_start;
        clipped |= CLIPPED_LEFT;
        let row0_bases = block.rows[0].borrow().bases.clone();
        let bytes = row0_bases.as_bytes();
        let mut cut_point = 0usize;
        let mut cut_count = 0u64;
        while cut_count < left_trim && cut_point < bytes.len() {
            if bytes[cut_point] != b'-' {
                cut_count += 1;
            }
            cut_point += 1;
        }
        for row_ref in &block.rows {
            let mut row = row_ref.borrow_mut();
            let removed = base_count(&row.bases[..cut_point]);
            row.start += removed;
            row.length -= removed;
            row.bases.drain(..cut_point);
        }
        block.column_number -= cut_point;
        block.column_tags.drain(..cut_point);
    }

    if row0_end > end {
        let right_trim = row0_end - end;
        clipped |= CLIPPED_RIGHT;
        let row0_bases = block.rows[0].borrow().bases.clone();
        let bytes = row0_bases.as_bytes();
        let mut cut_point = bytes.len() as i64 - 1;
        let mut cut_count = 0u64;
        while cut_count < right_trim && cut_point >= 0 {
            if bytes[cut_point as usize] != b'-' {
                cut_count += 1;
            }
            cut_point -= 1;
        }
        let keep = (cut_point + 1) as usize;
        for row_ref in &block.rows {
            let mut row = row_ref.borrow_mut();
            let removed = base_count(&row.bases[keep..]);
            row.length -= removed;
            row.bases.truncate(keep);
        }
        block.column_number = keep;
        block.column_tags.truncate(keep);
    }

    debug_assert!(block.rows[0].borrow().length > 0);
    block.rows.retain(|row| row.borrow().length > 0);
    debug_assert!(block.column_number > 0);

    clipped
}

/// One-shot forward cursor over the blocks intersecting a queried region.
/// Each block is returned clipped to the region.
pub struct TaiIterator<'a> {
    src: &'a mut LineSource,
    contig: String,
    start: u64,
    end: u64,
    run_length_encode_bases: bool,
    maf: bool,
    alignment: Option<Block>,
    p_alignment: Option<Block>,
}

impl TaiIterator<'_> {
    /// The next intersecting block, clipped to the region, or `None` when
    /// the region is exhausted
    pub fn next_block(&mut self) -> Result<Option<Block>, TafError> {
        let mut alignment = match self.alignment.take() {
            Some(alignment) => alignment,
            None => return Ok(None),
        };

        let clipped = clip_block(&mut alignment, self.start, self.end);

        // keep a row-sharing shell so the next block can be parsed against
        // this one after ownership passes to the caller
        let shell = Block {
            rows: alignment.rows.clone(),
            column_number: alignment.column_number,
            column_tags: Vec::new(),
        };

        if clipped & CLIPPED_RIGHT == 0 {
            let next = read_next(
                self.maf,
                Some(&shell),
                self.run_length_encode_bases,
                self.src,
            )?;
            self.alignment = next.filter(|block| match block.rows.first() {
                Some(row0) => {
                    let row0 = row0.borrow();
                    row0.sequence_name == self.contig && row0.start < self.end
                }
                None => false,
            });
        }
        self.p_alignment = Some(shell);

        Ok(Some(alignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::common::Tag;
    use crate::parser::taf::TafWriteConfig;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    #[test]
    fn region_strings_parse() {
        assert_eq!(
            Region::parse("chr1:10-13").unwrap(),
            Region {
                contig: "chr1".to_string(),
                start: 10,
                length: 3
            }
        );
        assert_eq!(
            Region::parse("chr1:10").unwrap(),
            Region {
                contig: "chr1".to_string(),
                start: 10,
                length: 1
            }
        );
        let whole = Region::parse("chr1").unwrap();
        assert_eq!(whole.contig, "chr1");
        assert_eq!(whole.start, 0);
        assert_eq!(whole.length, u64::MAX);
        // contig names may themselves contain colons
        assert_eq!(Region::parse("hg.chr1:5:10-20").unwrap().contig, "hg.chr1:5");
        assert!(Region::parse("chr1:20-10").is_err());
        assert!(Region::parse("chr1:").is_err());
        assert!(Region::parse("chr1:x-y").is_err());
    }

    #[test]
    fn anchor_line_rewrite() {
        let line = "ACG ; s 0 hg.chr1 2000 + 4000 g 1 5 s 2 mm.chr1 7 + 50 d 3 @ k:v";
        let rewritten = rewrite_anchor_line(line).unwrap();
        assert_eq!(rewritten, "ACG ; i 0 hg.chr1 2000 + 4000 i 2 mm.chr1 7 + 50 @ k:v");
    }

    /// A TAF file with one reference row split over blocks of 1000 bases at
    /// starts 0, 1000, 2000 and 3000; repeat-coordinates makes every block
    /// boundary a restart anchor
    fn write_test_taf() -> tempfile::NamedTempFile {
        let mut rows = Vec::new();
        for block_index in 0..4u64 {
            rows.push(Rc::new(RefCell::new(crate::align::block::Row {
                sequence_name: "hg.chr1".to_string(),
                start: block_index * 1000,
                length: 1000,
                sequence_length: 4000,
                strand: Strand::Positive,
                bases: "A".repeat(1000),
                ..Default::default()
            })));
        }
        let blocks: Vec<Block> = rows
            .into_iter()
            .map(|row| Block {
                rows: vec![row],
                column_number: 1000,
                column_tags: vec![Vec::new(); 1000],
            })
            .collect();
        for window in 0..blocks.len() - 1 {
            Block::link_adjacent(&blocks[window], &blocks[window + 1], true);
        }

        let config = TafWriteConfig {
            run_length_encode_bases: true,
            repeat_coordinates_every_n_columns: 500,
        };
        let mut out = Vec::new();
        taf::write_header(&[Tag::new("run_length_encode_bases", "1")], &mut out).unwrap();
        let mut prev: Option<&Block> = None;
        for block in &blocks {
            taf::write_block(prev, block, &config, &mut out).unwrap();
            prev = Some(block);
        }

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&out).unwrap();
        tmp
    }

    fn index_of(tmp: &tempfile::NamedTempFile, block_size: u64) -> (Vec<u8>, Tai) {
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let mut index_bytes = Vec::new();
        create(&mut src, &mut index_bytes, block_size).unwrap();
        let tai = Tai::load(Cursor::new(index_bytes.clone()), false).unwrap();
        (index_bytes, tai)
    }

    #[test]
    fn index_records_sparse_anchors() {
        let tmp = write_test_taf();
        let (index_bytes, tai) = index_of(&tmp, 1500);
        let text = String::from_utf8(index_bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("hg.chr1\t0\t"));
        assert!(lines[1].starts_with("*\t2000\t"));
        assert_eq!(tai.contig_names().collect::<Vec<_>>(), vec!["hg.chr1"]);
    }

    #[test]
    fn range_query_seeks_and_clips() {
        let tmp = write_test_taf();
        let (_, tai) = index_of(&tmp, 1500);
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let region = Region {
            contig: "hg.chr1".to_string(),
            start: 2500,
            length: 100,
        };
        let mut iterator = tai.iterator(&mut src, true, &region).unwrap();
        let block = iterator.next_block().unwrap().unwrap();
        let row0 = block.rows[0].borrow();
        assert_eq!(row0.start, 2500);
        assert_eq!(row0.length, 100);
        assert_eq!(row0.bases.len(), 100);
        drop(row0);
        block.validate().unwrap();
        assert!(iterator.next_block().unwrap().is_none());
    }

    #[test]
    fn range_query_spans_adjacent_blocks() {
        let tmp = write_test_taf();
        let (_, tai) = index_of(&tmp, 1500);
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let region = Region {
            contig: "hg.chr1".to_string(),
            start: 2900,
            length: 200,
        };
        let mut iterator = tai.iterator(&mut src, true, &region).unwrap();
        let first = iterator.next_block().unwrap().unwrap();
        {
            let row0 = first.rows[0].borrow();
            assert_eq!((row0.start, row0.length), (2900, 100));
        }
        let second = iterator.next_block().unwrap().unwrap();
        {
            let row0 = second.rows[0].borrow();
            assert_eq!((row0.start, row0.length), (3000, 100));
        }
        assert!(iterator.next_block().unwrap().is_none());
        // together the clipped blocks cover the region exactly once
    }

    #[test]
    fn out_of_range_query_is_empty() {
        let tmp = write_test_taf();
        let (_, tai) = index_of(&tmp, 1500);
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let region = Region {
            contig: "mm.chr1".to_string(),
            start: 0,
            length: 100,
        };
        let mut iterator = tai.iterator(&mut src, true, &region).unwrap();
        assert!(iterator.next_block().unwrap().is_none());
    }

    #[test]
    fn sequence_lengths_reads_one_block_per_contig() {
        let tmp = write_test_taf();
        let (_, tai) = index_of(&tmp, 1500);
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let lengths = tai.sequence_lengths(&mut src).unwrap();
        assert_eq!(lengths.len(), 1);
        assert_eq!(lengths.get("hg.chr1"), Some(&4000));
    }

    #[test]
    fn maf_files_index_and_query_too() {
        let maf = "##maf version=1\n\n\
a\ns hg.chr1 0 4 + 20 ACGT\ns mm.chr1 0 3 + 20 AC-T\n\n\
a\ns hg.chr1 4 4 + 20 TTTT\ns mm.chr1 3 4 + 20 TTTT\n\n\
a\ns hg.chr2 0 4 + 30 GGGG\n\n";
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(maf.as_bytes()).unwrap();

        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let mut index_bytes = Vec::new();
        create(&mut src, &mut index_bytes, 1).unwrap();
        let tai = Tai::load(Cursor::new(index_bytes), true).unwrap();
        assert_eq!(
            tai.contig_names().collect::<Vec<_>>(),
            vec!["hg.chr1", "hg.chr2"]
        );

        let mut src = LineSource::from_path(tmp.path()).unwrap();
        let region = Region::parse("hg.chr1:2-6").unwrap();
        let mut iterator = tai.iterator(&mut src, false, &region).unwrap();
        let first = iterator.next_block().unwrap().unwrap();
        {
            let row0 = first.rows[0].borrow();
            assert_eq!((row0.start, row0.length), (2, 2));
        }
        let second = iterator.next_block().unwrap().unwrap();
        {
            let row0 = second.rows[0].borrow();
            assert_eq!((row0.start, row0.length), (4, 2));
            assert_eq!(row0.bases, "TT");
        }
        assert!(iterator.next_block().unwrap().is_none());
    }

    #[test]
    fn relative_entries_expand_on_load() {
        let tai_text = "hg.chr1\t0\t100\n*\t2000\t350\nmm.chr1\t5\t900\n";
        let tai = Tai::load(Cursor::new(tai_text.as_bytes().to_vec()), false).unwrap();
        assert_eq!(
            tai.contig_names().collect::<Vec<_>>(),
            vec!["hg.chr1", "mm.chr1"]
        );
        assert_eq!(tai.upper_bound("hg.chr1", 1000), Some(450));
        assert_eq!(tai.upper_bound("hg.chr1", 3000), Some(900));
        assert_eq!(tai.upper_bound("mm.chr1", 100), None);
    }
}
