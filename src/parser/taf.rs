//! Reader and writer for the column-oriented TAF block format.
//!
//! A block is one or more text lines, one per column. The first line of a
//! block carries a `;`-introduced descriptor expressing how the row list
//! differs from the previous block's; subsequent coordinate-less lines are
//! further columns of the same block. Column tags follow a standalone `@`.

use crate::align::block::{base_count, Block, Row, RowRef};
use crate::errors::TafError;
use crate::parser::common::{self, Strand, Tag, RUN_LENGTH_ENCODE_TAG_KEY};
use crate::parser::lines::LineSource;
use itertools::Itertools;
use std::cell::RefCell;
use std::io::Write;
use std::rc::{Rc, Weak};

/// Formatter knobs for TAF emission
#[derive(Debug, Clone, Copy)]
pub struct TafWriteConfig {
    /// Run-length encode the base stacks (`char count` pairs)
    pub run_length_encode_bases: bool,
    /// Re-emit a row's coordinates once this many bases have passed since
    /// they were last reported; 0 disables repetition
    pub repeat_coordinates_every_n_columns: u64,
}

impl Default for TafWriteConfig {
    fn default() -> Self {
        TafWriteConfig {
            run_length_encode_bases: false,
            repeat_coordinates_every_n_columns: 10_000,
        }
    }
}

/// Position of the standalone `;` token, if the line carries coordinates
pub fn coordinates_token(tokens: &[&str]) -> Option<usize> {
    tokens.iter().position(|t| *t == ";")
}

/// Parse the `<name> <start> <+|-> <sequence_length>` fields following an
/// `i` or `s` op, advancing `j` past them
pub fn parse_coordinates(
    tokens: &[&str],
    j: &mut usize,
) -> Result<(String, u64, Strand, u64), TafError> {
    if *j + 4 > tokens.len() {
        return Err(TafError::MalformedRecord(
            "truncated coordinate fields in row operation".to_string(),
        ));
    }
    let name = tokens[*j].to_string();
    let start = common::str2u64(tokens[*j + 1])?;
    let strand = tokens[*j + 2].parse::<Strand>()?;
    let sequence_length = common::str2u64(tokens[*j + 3])?;
    *j += 4;
    Ok((name, start, strand, sequence_length))
}

fn op_token(tokens: &[&str], j: &mut usize) -> Result<String, TafError> {
    let token = tokens[*j];
    *j += 1;
    if token.len() != 1 {
        return Err(TafError::UnknownOp(token.to_string()));
    }
    Ok(token.to_string())
}

fn row_at(rows: &[RowRef], row_index: usize) -> Result<&RowRef, TafError> {
    rows.get(row_index).ok_or_else(|| {
        TafError::MalformedRecord(format!("row index {} out of range", row_index))
    })
}

/// Make the block being parsed by copying the previous block's rows and then
/// editing the copy with the descriptor's list of coordinate changes
fn establish_block(p_block: Option<&Block>, tokens: &[&str]) -> Result<Block, TafError> {
    let mut block = Block::default();

    // copy the rows of the previous block, weakly linking old to new
    if let Some(p_block) = p_block {
        for l_ref in &p_block.rows {
            let l_row = l_ref.borrow();
            let row = Rc::new(RefCell::new(Row {
                sequence_name: l_row.sequence_name.clone(),
                start: l_row.end(),
                length: 0,
                sequence_length: l_row.sequence_length,
                strand: l_row.strand,
                left: Rc::downgrade(l_ref),
                ..Default::default()
            }));
            drop(l_row);
            l_ref.borrow_mut().right = Rc::downgrade(&row);
            block.rows.push(row);
        }
    }

    // now walk the descriptor to edit the row list
    let mut j = match coordinates_token(tokens) {
        Some(j) => j + 1,
        None => {
            return Err(TafError::MalformedRecord(
                "block's first line carries no `;` descriptor".to_string(),
            ))
        }
    };
    while j < tokens.len() && tokens[j] != "@" {
        let op = op_token(tokens, &mut j)?;
        if j >= tokens.len() {
            return Err(TafError::MalformedRecord(format!(
                "row operation `{}` is missing its row index",
                op
            )));
        }
        let row_index = common::str2u64(tokens[j])? as usize;
        j += 1;
        match op.as_str() {
            "i" => {
                if row_index > block.rows.len() {
                    return Err(TafError::MalformedRecord(format!(
                        "row index {} out of range",
                        row_index
                    )));
                }
                let (name, start, strand, sequence_length) = parse_coordinates(tokens, &mut j)?;
                let row = Rc::new(RefCell::new(Row {
                    sequence_name: name,
                    start,
                    strand,
                    sequence_length,
                    ..Default::default()
                }));
                block.rows.insert(row_index, row);
            }
            "s" => {
                let (name, start, strand, sequence_length) = parse_coordinates(tokens, &mut j)?;
                let row_ref = row_at(&block.rows, row_index)?;
                let mut row = row_ref.borrow_mut();
                // the outgoing previous-block row is terminated here
                if let Some(l_ref) = row.left.upgrade() {
                    l_ref.borrow_mut().right = Weak::new();
                }
                row.left = Weak::new();
                row.sequence_name = name;
                row.start = start;
                row.strand = strand;
                row.sequence_length = sequence_length;
            }
            "d" => {
                row_at(&block.rows, row_index)?;
                let row = block.rows.remove(row_index);
                let left_upgrade = row.borrow().left.upgrade();
                if let Some(l_ref) = left_upgrade {
                    l_ref.borrow_mut().right = Weak::new();
                }
            }
            "g" => {
                if j >= tokens.len() {
                    return Err(TafError::MalformedRecord(
                        "g operation is missing its gap length".to_string(),
                    ));
                }
                let gap_length = common::str2u64(tokens[j])?;
                j += 1;
                row_at(&block.rows, row_index)?.borrow_mut().start += gap_length;
            }
            "G" => {
                if j >= tokens.len() {
                    return Err(TafError::MalformedRecord(
                        "G operation is missing its gap bases".to_string(),
                    ));
                }
                let gap_bases = tokens[j].to_string();
                j += 1;
                let row_ref = row_at(&block.rows, row_index)?;
                let mut row = row_ref.borrow_mut();
                row.start += gap_bases.len() as u64;
                row.left_gap_sequence = Some(gap_bases);
            }
            other => return Err(TafError::UnknownOp(other.to_string())),
        }
    }

    Ok(block)
}

/// Decode one column's base stack into exactly `column_length` characters
pub fn decode_bases(
    column_length: usize,
    tokens: &[&str],
    run_length_encode_bases: bool,
) -> Result<String, TafError> {
    if run_length_encode_bases {
        let mut column = String::with_capacity(column_length);
        let mut i = 0;
        while column.len() < column_length {
            if i + 2 > tokens.len() || tokens[i] == ";" || tokens[i] == "@" {
                return Err(TafError::MalformedRecord(format!(
                    "run-length encoded column ran out of tokens at {} of {} bases",
                    column.len(),
                    column_length
                )));
            }
            let base_token = tokens[i];
            if base_token.len() != 1 {
                return Err(TafError::MalformedRecord(format!(
                    "run-length encoded base `{}` is not a single character",
                    base_token
                )));
            }
            let count = common::str2u64(tokens[i + 1])? as usize;
            if count == 0 || column.len() + count > column_length {
                return Err(TafError::MalformedRecord(format!(
                    "run length {} overflows a column of {} bases",
                    count, column_length
                )));
            }
            for _ in 0..count {
                column.push_str(base_token);
            }
            i += 2;
        }
        Ok(column)
    } else {
        let column = tokens
            .first()
            .copied()
            .unwrap_or_default();
        if column.len() != column_length {
            return Err(TafError::MalformedRecord(format!(
                "column has {} bases, block has {} rows",
                column.len(),
                column_length
            )));
        }
        Ok(column.to_string())
    }
}

/// Tags following the standalone `@` token, if any
fn parse_column_tags(tokens: &[&str]) -> Result<Vec<Tag>, TafError> {
    match tokens.iter().position(|t| *t == "@") {
        Some(i) => common::parse_tags(&tokens[i + 1..], ":"),
        None => Ok(Vec::new()),
    }
}

/// Read the `#taf` header line, skipping leading blank lines
pub fn read_header(src: &mut LineSource) -> Result<Vec<Tag>, TafError> {
    loop {
        let line = src
            .next_line()?
            .ok_or_else(|| TafError::Empty("no taf header line".to_string()))?;
        if line.split_whitespace().next().is_none() {
            continue;
        }
        return common::parse_header_line(&line, "#taf", ":");
    }
}

/// Read the header and report whether run-length encoding is enabled
pub fn read_header_rle(src: &mut LineSource) -> Result<(Vec<Tag>, bool), TafError> {
    let tags = read_header(src)?;
    let rle = common::find_tag(&tags, RUN_LENGTH_ENCODE_TAG_KEY)
        .map(|t| t.value == "1")
        .unwrap_or(false);
    Ok((tags, rle))
}

/// Write the `#taf` header line
pub fn write_header<W: Write>(tags: &[Tag], out: &mut W) -> Result<(), TafError> {
    writeln!(out, "#taf{}", common::write_tags(tags, ":"))?;
    Ok(())
}

/// Read a taf block: a column line with coordinates plus all subsequent
/// coordinate-less column lines. Returns `None` at end of file.
pub fn read_block(
    p_block: Option<&Block>,
    run_length_encode_bases: bool,
    src: &mut LineSource,
) -> Result<Option<Block>, TafError> {
    // first non-blank, non-comment line opens the block
    let first_line = loop {
        match src.next_line()? {
            None => return Ok(None),
            Some(line) => {
                let opens_block = match line.split_whitespace().next() {
                    None => false,
                    Some(token) => !token.starts_with('#'),
                };
                if opens_block {
                    break line;
                }
            }
        }
    };
    let tokens: Vec<&str> = first_line.split_whitespace().collect();

    let mut block = establish_block(p_block, &tokens)?;
    let row_number = block.row_number();

    let mut columns = vec![decode_bases(row_number, &tokens, run_length_encode_bases)?];
    let mut tag_lists = vec![parse_column_tags(&tokens)?];

    // subsequent columns belong to this block until the next line that
    // carries coordinates, which is pushed back
    loop {
        let line = match src.peek() {
            Some(line) => line.to_string(),
            None => break,
        };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.first() {
            None => {
                src.next_line()?;
                continue;
            }
            Some(token) if token.starts_with('#') => {
                src.next_line()?;
                continue;
            }
            Some(_) => {}
        }
        if coordinates_token(&tokens).is_some() {
            break;
        }
        columns.push(decode_bases(row_number, &tokens, run_length_encode_bases)?);
        tag_lists.push(parse_column_tags(&tokens)?);
        src.next_line()?;
    }

    block.column_number = columns.len();
    block.column_tags = tag_lists;

    // assemble each row's bases by reading down the column stacks
    for (row_index, row_ref) in block.rows.iter().enumerate() {
        let bases: String = columns
            .iter()
            .map(|column| column.as_bytes()[row_index] as char)
            .collect();
        let mut row = row_ref.borrow_mut();
        row.length = base_count(&bases);
        row.bases = bases;
    }

    Ok(Some(block))
}

/// Render one column's base stack, optionally run-length encoded
fn encode_column(block: &Block, column_index: usize, run_length_encode_bases: bool) -> String {
    let column = block.column(column_index);
    if run_length_encode_bases {
        column
            .bytes()
            .dedup_with_count()
            .map(|(count, base)| format!("{} {}", base as char, count))
            .join(" ")
    } else {
        column
    }
}

/// Build the `;` descriptor transforming the previous block's row list into
/// this block's, updating each row's coordinate-repetition counter
fn write_coordinates(p_block: Option<&Block>, block: &Block, repeat_every_n: u64) -> String {
    let mut out = String::from(" ;");

    // deletions, indexed by position among the surviving previous rows
    if let Some(p_block) = p_block {
        let mut i = 0;
        for p_ref in &p_block.rows {
            if p_ref.borrow().right.upgrade().is_none() {
                out.push_str(&format!(" d {}", i));
            } else {
                i += 1;
            }
        }
    }

    // to seek randomly we need anchor lines whose rows all carry
    // coordinates, at the start of every reference contig and evenly spaced
    // along it; when row 0 reports coordinates, every other row is forced to
    // report too so the line becomes a self-describing restart anchor
    let mut report_everything = false;
    for (i, row_ref) in block.rows.iter().enumerate() {
        let mut row = row_ref.borrow_mut();
        match row.left.upgrade() {
            None => {
                out.push_str(&format!(
                    " i {} {} {} {} {}",
                    i, row.sequence_name, row.start, row.strand, row.sequence_length
                ));
                row.bases_since_coordinates_reported = 0;
                if i == 0 {
                    report_everything = true;
                }
            }
            Some(l_ref) => {
                let l_row = l_ref.borrow();
                let is_predecessor = l_row.is_predecessor(&row);
                if !is_predecessor && i == 0 {
                    report_everything = true;
                }
                if is_predecessor {
                    row.bases_since_coordinates_reported =
                        l_row.bases_since_coordinates_reported + l_row.length;
                    if report_everything
                        || (repeat_every_n > 0
                            && row.bases_since_coordinates_reported > repeat_every_n)
                    {
                        row.bases_since_coordinates_reported = 0;
                        out.push_str(&format!(
                            " s {} {} {} {} {}",
                            i, row.sequence_name, row.start, row.strand, row.sequence_length
                        ));
                        if i == 0 {
                            report_everything = true;
                        }
                    } else {
                        let gap_length = row.start - l_row.end();
                        if gap_length > 0 {
                            if let Some(gap_sequence) = &row.left_gap_sequence {
                                debug_assert_eq!(gap_sequence.len() as u64, gap_length);
                                out.push_str(&format!(" G {} {}", i, gap_sequence));
                            } else {
                                out.push_str(&format!(" g {} {}", i, gap_length));
                            }
                        }
                    }
                } else {
                    // substitute one row for another
                    row.bases_since_coordinates_reported = 0;
                    out.push_str(&format!(
                        " s {} {} {} {} {}",
                        i, row.sequence_name, row.start, row.strand, row.sequence_length
                    ));
                }
            }
        }
    }
    out
}

/// Write a taf block: exactly `column_number` physical lines, the first
/// carrying the row-edit descriptor
pub fn write_block<W: Write>(
    p_block: Option<&Block>,
    block: &Block,
    config: &TafWriteConfig,
    out: &mut W,
) -> Result<(), TafError> {
    if block.rows.is_empty() {
        return Ok(());
    }
    debug_assert!(block.column_number > 0);
    for column_index in 0..block.column_number {
        let mut line = encode_column(block, column_index, config.run_length_encode_bases);
        if column_index == 0 {
            line.push_str(&write_coordinates(
                p_block,
                block,
                config.repeat_coordinates_every_n_columns,
            ));
        }
        if let Some(tags) = block.column_tags.get(column_index) {
            if !tags.is_empty() {
                line.push_str(" @");
                line.push_str(&common::write_tags(tags, ":"));
            }
        }
        writeln!(out, "{}", line)?;
    }
    Ok(())
}
