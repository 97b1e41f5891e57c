//! Reader and writer for the legacy row-oriented MAF block format.
//! Recognised lines: `##maf`, `a`, `s`, `q`, `i`, `e` and blank.

use crate::align::block::{base_count, Block, Row, RowRef};
use crate::errors::TafError;
use crate::parser::common::{self, Strand, Tag, BASE_QUALITY_TAG_KEY};
use crate::parser::lines::LineSource;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Read the `##maf` header line, returning its tags in order
pub fn read_header(src: &mut LineSource) -> Result<Vec<Tag>, TafError> {
    let line = src
        .next_line()?
        .ok_or_else(|| TafError::Empty("no maf header line".to_string()))?;
    common::parse_header_line(&line, "##maf", "=")
}

/// Write a `##maf` header line followed by the separating blank line
pub fn write_header<W: Write>(tags: &[Tag], out: &mut W) -> Result<(), TafError> {
    writeln!(out, "##maf{}", common::write_tags(tags, "="))?;
    writeln!(out)?;
    Ok(())
}

fn parse_s_line(tokens: &[&str], offset: u64) -> Result<RowRef, TafError> {
    if tokens.len() != 7 {
        return Err(TafError::MalformedRecord(format!(
            "s line has {} fields, expected 7",
            tokens.len()
        ))
        .at_offset(offset));
    }
    let row = Row {
        sequence_name: tokens[1].to_string(),
        start: common::str2u64(tokens[2])?,
        length: common::str2u64(tokens[3])?,
        strand: tokens[4].parse::<Strand>()?,
        sequence_length: common::str2u64(tokens[5])?,
        bases: tokens[6].to_string(),
        ..Default::default()
    };
    if base_count(&row.bases) != row.length {
        return Err(TafError::MalformedRecord(format!(
            "s line for {} declares {} aligned bases but its alignment has {}",
            row.sequence_name,
            row.length,
            base_count(&row.bases)
        ))
        .at_offset(offset));
    }
    Ok(Rc::new(RefCell::new(row)))
}

/// Convert a MAF quality character (0-9, F for irregular) into the ascii
/// phred alphabet used by the per-column quality tag
fn maf_quality_to_phred(q: u8) -> u8 {
    match q {
        b'0'..=b'9' => b'!' + 5 * (q - b'0'),
        _ => b'~', // no data
    }
}

/// Transpose per-row quality strings into per-column `q` tags
fn set_qualities(block: &mut Block, row_qualities: &[String]) {
    for column_index in 0..block.column_number {
        let column_quality: String = row_qualities
            .iter()
            .map(|quals| maf_quality_to_phred(quals.as_bytes()[column_index]) as char)
            .collect();
        block.column_tags[column_index].push(Tag::new(BASE_QUALITY_TAG_KEY, &column_quality));
    }
}

/// Read the next alignment block, or `None` at end of file.
///
/// `q` lines are transposed column-wise into the reserved `q` tag; `i` and
/// `e` lines are ignored. If the file ends mid-block, the block is returned
/// as long as at least one `s` line was consumed.
pub fn read_block(src: &mut LineSource) -> Result<Option<Block>, TafError> {
    loop {
        let line = match src.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens[0] != "a" {
            // anything outside a block that does not open one is ignored
            continue;
        }

        let mut block = Block::default();
        let mut row_qualities: Vec<String> = Vec::new();
        let mut at_eof = false;
        loop {
            let offset = src.tell();
            let line = match src.next_line()? {
                Some(line) => line,
                None => {
                    at_eof = true;
                    break;
                }
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                break; // blank line ends the block
            }
            match tokens[0] {
                "s" => {
                    let row = parse_s_line(&tokens, offset)?;
                    let width = row.borrow().bases.len();
                    if block.rows.is_empty() {
                        block.column_number = width;
                        block.column_tags = vec![Vec::new(); width];
                    } else if width != block.column_number {
                        return Err(TafError::MalformedRecord(format!(
                            "s line has {} columns, block has {}",
                            width, block.column_number
                        ))
                        .at_offset(offset));
                    }
                    block.rows.push(row);
                }
                "q" => {
                    if tokens.len() != 3 {
                        return Err(TafError::MalformedRecord(format!(
                            "q line has {} fields, expected 3",
                            tokens.len()
                        ))
                        .at_offset(offset));
                    }
                    let matches_last_row = block
                        .rows
                        .last()
                        .map(|row| row.borrow().sequence_name == tokens[1])
                        .unwrap_or(false);
                    if !matches_last_row || row_qualities.len() != block.rows.len() - 1 {
                        return Err(TafError::MalformedRecord(format!(
                            "q line for {} does not follow its s line",
                            tokens[1]
                        ))
                        .at_offset(offset));
                    }
                    if tokens[2].len() != block.column_number {
                        return Err(TafError::MalformedRecord(format!(
                            "q line for {} has {} columns, block has {}",
                            tokens[1],
                            tokens[2].len(),
                            block.column_number
                        ))
                        .at_offset(offset));
                    }
                    row_qualities.push(tokens[2].to_string());
                }
                "i" | "e" => {}
                _ => {
                    return Err(TafError::MalformedRecord(format!(
                        "unexpected line type `{}` inside block",
                        tokens[0]
                    ))
                    .at_offset(offset));
                }
            }
        }

        if block.rows.is_empty() {
            if at_eof {
                return Ok(None);
            }
            continue; // an empty paragraph; keep scanning
        }
        if !row_qualities.is_empty() {
            if row_qualities.len() != block.rows.len() {
                return Err(TafError::MalformedRecord(format!(
                    "block has base qualities for {} of {} rows",
                    row_qualities.len(),
                    block.rows.len()
                )));
            }
            set_qualities(&mut block, &row_qualities);
        }
        return Ok(Some(block));
    }
}

/// Phred character back to the MAF quality alphabet
fn phred_to_maf_quality(phred: u8) -> u8 {
    let q = phred.saturating_sub(b'!');
    if q >= 99 {
        b'F'
    } else if q >= 45 {
        b'9'
    } else {
        b'0' + q / 5
    }
}

/// Write one block: `a`, the `s` rows in order, `q` rows when the columns
/// carry base qualities, and the terminating blank line
pub fn write_block<W: Write>(block: &Block, out: &mut W) -> Result<(), TafError> {
    writeln!(out, "a")?;

    // either every column carries a quality or none does
    let has_qualities = block
        .column_tags
        .first()
        .map(|tags| common::find_tag(tags, BASE_QUALITY_TAG_KEY).is_some())
        .unwrap_or(false);
    let mut column_qualities: Vec<&str> = Vec::new();
    if has_qualities {
        for (column_index, tags) in block.column_tags.iter().enumerate() {
            match common::find_tag(tags, BASE_QUALITY_TAG_KEY) {
                Some(tag) => column_qualities.push(&tag.value),
                None => {
                    return Err(TafError::MalformedRecord(format!(
                        "missing base quality at column {} in block with base qualities",
                        column_index
                    )))
                }
            }
        }
    }

    for (row_index, row_ref) in block.rows.iter().enumerate() {
        let row = row_ref.borrow();
        writeln!(
            out,
            "s {} {} {} {} {} {}",
            row.sequence_name, row.start, row.length, row.strand, row.sequence_length, row.bases
        )?;
        if has_qualities && row.length > 0 {
            let quality_line: String = row
                .bases
                .bytes()
                .enumerate()
                .map(|(column_index, base)| {
                    if base == b'-' {
                        '-'
                    } else {
                        phred_to_maf_quality(column_qualities[column_index].as_bytes()[row_index])
                            as char
                    }
                })
                .collect();
            writeln!(out, "q {} {}", row.sequence_name, quality_line)?;
        }
    }
    writeln!(out)?;
    Ok(())
}
