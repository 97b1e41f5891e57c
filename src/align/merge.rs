//! Merge two linked adjacent blocks into one, aligning any interstitial
//! unaligned sequences that lie between them.

use crate::align::block::{Block, Row};
use crate::align::ond;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

fn make_run(length: usize, c: char) -> String {
    std::iter::repeat(c).take(length).collect()
}

/// Convert the per-string pairings against the longest string into a
/// two-dimensional alignment, padding every string to a common width
fn make_msa(pairings: &[Vec<i64>], strings: &[&[u8]]) -> Vec<String> {
    let string_no = strings.len();
    let column_no = pairings.first().map(|p| p.len()).unwrap_or(0);
    let mut offsets = vec![-1i64; string_no];
    let mut msa_strings: Vec<Vec<u8>> = vec![Vec::new(); string_no];

    for j in 0..column_no {
        // the longest indel before position j across the strings
        let mut max_indel = 0i64;
        for i in 0..string_no {
            let k = pairings[i][j];
            if k != -1 {
                max_indel = max_indel.max(k - offsets[i] - 1);
            }
        }
        // now fill in the indels and column j, keeping the aligned
        // character of every string in the same output slot
        for i in 0..string_no {
            let k = pairings[i][j];
            if k != -1 {
                let run_length = k - offsets[i] - 1;
                for p in (offsets[i] + 1)..k {
                    msa_strings[i].push(strings[i][p as usize]);
                }
                for _ in run_length..max_indel {
                    msa_strings[i].push(b'-');
                }
                msa_strings[i].push(strings[i][k as usize]);
                offsets[i] = k;
            } else {
                for _ in 0..=max_indel {
                    msa_strings[i].push(b'-');
                }
            }
        }
    }

    // trailing unaligned suffixes
    let mut max_indel = 0i64;
    for i in 0..string_no {
        max_indel = max_indel.max(strings[i].len() as i64 - offsets[i] - 1);
    }
    for i in 0..string_no {
        let mut l = 0i64;
        for p in (offsets[i] + 1)..strings[i].len() as i64 {
            msa_strings[i].push(strings[i][p as usize]);
            l += 1;
        }
        while l < max_indel {
            msa_strings[i].push(b'-');
            l += 1;
        }
    }

    msa_strings
        .into_iter()
        .map(|s| String::from_utf8(s).expect("alignment strings are ascii"))
        .collect()
}

/// Align the sequences lying within the gaps before this block's rows and
/// pad each `left_gap_sequence` to the common alignment width, which is
/// returned.
///
/// Rows whose predecessor link is a strict predecessor but whose gap
/// sequence is unknown are filled with `N`s first. Each gap string is
/// aligned against the longest one with the wavefront engine (a star MSA).
pub fn align_interstitial_gaps(block: &Block) -> usize {
    for row_ref in &block.rows {
        let mut row = row_ref.borrow_mut();
        if row.left_gap_sequence.is_none() {
            if let Some(l_ref) = row.left.upgrade() {
                let l_row = l_ref.borrow();
                if l_row.is_predecessor(&row) {
                    let gap_length = (row.start - l_row.end()) as usize;
                    drop(l_row);
                    row.left_gap_sequence = Some(make_run(gap_length, 'N'));
                }
            }
        }
    }

    let participants: Vec<usize> = block
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.borrow().left_gap_sequence.is_some())
        .map(|(i, _)| i)
        .collect();
    if participants.is_empty() {
        return 0;
    }
    let strings: Vec<String> = participants
        .iter()
        .map(|&i| block.rows[i].borrow().left_gap_sequence.clone().unwrap())
        .collect();

    let mut longest = 0;
    for (i, s) in strings.iter().enumerate() {
        if s.len() > strings[longest].len() {
            longest = i;
        }
    }
    let longest = strings[longest].clone();

    let pairings: Vec<Vec<i64>> = strings
        .iter()
        .map(|s| ond::align_with(longest.as_bytes(), s.as_bytes(), |a, b| a == b, 1, 1).1)
        .collect();
    let string_bytes: Vec<&[u8]> = strings.iter().map(|s| s.as_bytes()).collect();
    let msa_strings = make_msa(&pairings, &string_bytes);
    let msa_length = msa_strings.first().map(|s| s.len()).unwrap_or(0);

    for (&row_index, padded) in participants.iter().zip(msa_strings) {
        block.rows[row_index].borrow_mut().left_gap_sequence = Some(padded);
    }
    msa_length
}

/// Merge `right` into `left` and return the combined block.
///
/// Requires the rows to be linked (`Block::link_adjacent`). Substitution
/// links are broken, new rows gain leading gaps, deleted rows gain trailing
/// gaps, and interstitial sequences are aligned between the two halves.
/// `right` is consumed; its rows are moved or dropped.
pub fn merge_adjacent(mut left: Block, right: Block) -> Block {
    // un-link any rows that are substitutions as these can't be merged
    for r_ref in &right.rows {
        let substitution_partner = {
            let r_row = r_ref.borrow();
            match r_row.left.upgrade() {
                Some(l_ref) if !l_ref.borrow().is_predecessor(&r_row) => Some(l_ref),
                _ => None,
            }
        };
        if let Some(l_ref) = substitution_partner {
            l_ref.borrow_mut().right = Weak::new();
            r_ref.borrow_mut().left = Weak::new();
        }
    }

    // give every unmatched right row a new, empty left row at the right spot
    let mut insert_position = 0;
    for r_ref in &right.rows {
        let linked = r_ref.borrow().left.upgrade();
        match linked {
            None => {
                let l_row = {
                    let r_row = r_ref.borrow();
                    Rc::new(RefCell::new(Row {
                        sequence_name: r_row.sequence_name.clone(),
                        start: r_row.start,
                        length: 0,
                        sequence_length: r_row.sequence_length,
                        strand: r_row.strand,
                        bases: make_run(left.column_number, '-'),
                        right: Rc::downgrade(r_ref),
                        ..Default::default()
                    }))
                };
                r_ref.borrow_mut().left = Rc::downgrade(&l_row);
                left.rows.insert(insert_position, l_row);
                insert_position += 1;
            }
            Some(l_ref) => {
                let index = left
                    .rows
                    .iter()
                    .position(|row| Rc::ptr_eq(row, &l_ref))
                    .expect("linked row belongs to the left block");
                insert_position = index + 1;
            }
        }
    }

    // align the interstitial insert sequences, padding the gap strings
    let interstitial_length = align_interstitial_gaps(&right);

    // extend the left rows across the right block
    let right_gap = make_run(right.column_number + interstitial_length, '-');
    for l_ref in &left.rows {
        let linked = l_ref.borrow().right.upgrade();
        match linked {
            None => {
                // a deletion: trailing gaps across the right block and any
                // interstitial columns
                l_ref.borrow_mut().bases.push_str(&right_gap);
            }
            Some(r_ref) => {
                let (gap_sequence, r_bases, r_length, r_start, r_right) = {
                    let r_row = r_ref.borrow();
                    debug_assert!(l_ref.borrow().is_predecessor(&r_row));
                    (
                        r_row
                            .left_gap_sequence
                            .clone()
                            .expect("interstitial alignment filled every linked row"),
                        r_row.bases.clone(),
                        r_row.length,
                        r_row.start,
                        r_row.right.clone(),
                    )
                };
                debug_assert_eq!(gap_sequence.len(), interstitial_length);
                {
                    let mut l_row = l_ref.borrow_mut();
                    let interstitial_bases = r_start - l_row.end();
                    let mut bases = String::with_capacity(
                        l_row.bases.len() + gap_sequence.len() + r_bases.len(),
                    );
                    bases.push_str(&l_row.bases);
                    bases.push_str(&gap_sequence);
                    bases.push_str(&r_bases);
                    l_row.bases = bases;
                    l_row.length += interstitial_bases + r_length;
                    l_row.right = r_right.clone();
                }
                if let Some(next_ref) = r_right.upgrade() {
                    next_ref.borrow_mut().left = Rc::downgrade(l_ref);
                }
                let mut r_row = r_ref.borrow_mut();
                r_row.left = Weak::new();
                r_row.right = Weak::new();
            }
        }
    }

    // concatenate the per-column tags with empty interstitial slots between
    left.column_tags
        .extend((0..interstitial_length).map(|_| Vec::new()));
    left.column_tags.extend(right.column_tags);
    left.column_number += interstitial_length + right.column_number;
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::block::tests::{test_block, test_row};

    #[test]
    fn merge_pads_an_interstitial_gap() {
        let left = test_block(vec![test_row("hg.chr1", 100, "ACG", 1000)]);
        let right = test_block(vec![test_row("hg.chr1", 105, "TT", 1000)]);
        Block::link_adjacent(&left, &right, false);
        let left_columns = left.column_number;
        let right_columns = right.column_number;

        let merged = merge_adjacent(left, right);
        assert_eq!(merged.row_number(), 1);
        let row = merged.rows[0].borrow();
        assert_eq!(row.start, 100);
        assert_eq!(row.length, 7); // 3 aligned + 2 gap + 2 aligned
        assert_eq!(row.bases, "ACGNNTT");
        drop(row);
        assert_eq!(merged.column_number, left_columns + right_columns + 2);
        assert_eq!(merged.column_tags.len(), merged.column_number);
        merged.validate().unwrap();
    }

    #[test]
    fn merge_handles_insertions_and_deletions() {
        let left = test_block(vec![
            test_row("hg.chr1", 10, "AC", 100),
            test_row("mm.chr1", 20, "AC", 50),
        ]);
        let right = test_block(vec![
            test_row("hg.chr1", 12, "GG", 100),
            test_row("rn.chr2", 0, "TT", 80),
        ]);
        Block::link_adjacent(&left, &right, false);

        let merged = merge_adjacent(left, right);
        assert_eq!(merged.row_number(), 3);
        assert_eq!(merged.column_number, 4);

        let hg = merged.rows[0].borrow();
        assert_eq!((hg.sequence_name.as_str(), hg.bases.as_str(), hg.length), ("hg.chr1", "ACGG", 4));
        let rn = merged.rows[1].borrow();
        assert_eq!((rn.sequence_name.as_str(), rn.bases.as_str(), rn.length), ("rn.chr2", "--TT", 2));
        assert_eq!(rn.start, 0);
        let mm = merged.rows[2].borrow();
        assert_eq!((mm.sequence_name.as_str(), mm.bases.as_str(), mm.length), ("mm.chr1", "AC--", 2));
        drop((hg, rn, mm));
        merged.validate().unwrap();
    }

    #[test]
    fn merge_breaks_substitution_links() {
        let left = test_block(vec![test_row("hg.chr1", 10, "AC", 100)]);
        let right = test_block(vec![test_row("mm.chr1", 0, "GG", 50)]);
        // substitutions allowed: the unrelated rows share a slot
        Block::link_adjacent(&left, &right, true);
        assert!(left.rows[0].borrow().right.upgrade().is_some());

        let merged = merge_adjacent(left, right);
        // the link was broken, so both a deletion and an insertion survive;
        // the new row lands ahead of the first linked position
        assert_eq!(merged.row_number(), 2);
        assert_eq!(merged.rows[0].borrow().bases, "--GG");
        assert_eq!(merged.rows[1].borrow().bases, "AC--");
        merged.validate().unwrap();
    }

    #[test]
    fn merge_transfers_onward_links() {
        let a = test_block(vec![test_row("hg.chr1", 0, "AA", 100)]);
        let b = test_block(vec![test_row("hg.chr1", 2, "CC", 100)]);
        let c = test_block(vec![test_row("hg.chr1", 4, "GG", 100)]);
        Block::link_adjacent(&a, &b, false);
        Block::link_adjacent(&b, &c, false);

        let merged = merge_adjacent(a, b);
        let onward = merged.rows[0].borrow().right.upgrade().unwrap();
        assert!(Rc::ptr_eq(&onward, &c.rows[0]));
        let back = c.rows[0].borrow().left.upgrade().unwrap();
        assert!(Rc::ptr_eq(&back, &merged.rows[0]));
    }

    #[test]
    fn differing_gap_sequences_are_aligned_together() {
        let left = test_block(vec![
            test_row("hg.chr1", 100, "ACG", 1000),
            test_row("mm.chr1", 200, "ACG", 1000),
        ]);
        let right = test_block(vec![
            test_row("hg.chr1", 107, "TT", 1000),
            test_row("mm.chr1", 203, "TT", 1000),
        ]);
        Block::link_adjacent(&left, &right, false);
        let merged = merge_adjacent(left, right);
        // gaps of 4 and 0 bases pad to a common width of 4
        assert_eq!(merged.column_number, 3 + 4 + 2);
        let hg = merged.rows[0].borrow();
        assert_eq!(hg.bases, "ACGNNNNTT");
        assert_eq!(hg.length, 9);
        let mm = merged.rows[1].borrow();
        assert_eq!(mm.bases, "ACG----TT");
        assert_eq!(mm.length, 5);
        drop((hg, mm));
        merged.validate().unwrap();
    }
}
