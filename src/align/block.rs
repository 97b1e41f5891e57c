use crate::align::ond;
use crate::errors::TafError;
use crate::parser::common::{Strand, Tag};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Mismatch cost that effectively forbids row substitutions in the linker
const FORBID_SUBSTITUTIONS_SCORE: i64 = 100_000_000;

/// Shared handle to a row; a block holds the owning handles in order
pub type RowRef = Rc<RefCell<Row>>;
/// Non-owning cross-block link; dies with the owning block
pub type RowLink = Weak<RefCell<Row>>;

/// One aligned sequence segment within a block.
///
/// Coordinates are zero-based half-open on the forward strand; `length` is
/// the number of non-gap bases in `bases`.
#[derive(Debug, Default)]
pub struct Row {
    pub sequence_name: String,
    pub start: u64,
    pub length: u64,
    pub sequence_length: u64,
    pub strand: Strand,
    /// `[A-Za-z*+-]*` string of bases and gaps, length == block column count
    pub bases: String,
    /// Unaligned substring between this row and the end of its predecessor
    /// in the previous block; `None` if unspecified or zero length
    pub left_gap_sequence: Option<String>,
    /// Continuation row in the previous block, if any
    pub left: RowLink,
    /// Continuation row in the next block, if any
    pub right: RowLink,
    /// How many bases ago the row's coordinates were last written; used by
    /// the TAF writer to decide when to repeat coordinates
    pub bases_since_coordinates_reported: u64,
}

impl Row {
    /// End of the row's segment on the forward strand
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// True iff `self` is a substring on the same contig and strand as
    /// `right`, ending no later than `right` begins
    pub fn is_predecessor(&self, right: &Row) -> bool {
        self.sequence_name == right.sequence_name
            && self.strand == right.strand
            && self.start + self.length <= right.start
    }
}

/// Count of non-gap characters in an alignment string
pub fn base_count(bases: &str) -> u64 {
    bases.bytes().filter(|&b| b != b'-').count() as u64
}

/// A contiguous chunk of alignment columns sharing one row set
#[derive(Debug, Default)]
pub struct Block {
    pub rows: Vec<RowRef>,
    pub column_number: usize,
    /// Per-column tag lists; `len == column_number`, entries may be empty
    pub column_tags: Vec<Vec<Tag>>,
}

impl Block {
    pub fn row_number(&self) -> usize {
        self.rows.len()
    }

    /// Read one column top to bottom
    pub fn column(&self, column_index: usize) -> String {
        assert!(column_index < self.column_number);
        self.rows
            .iter()
            .map(|row| row.borrow().bases.as_bytes()[column_index] as char)
            .collect()
    }

    /// Check the block invariants shared by both readers
    pub fn validate(&self) -> Result<(), TafError> {
        if self.column_tags.len() != self.column_number {
            return Err(TafError::MalformedRecord(format!(
                "column tag list length {} does not match column number {}",
                self.column_tags.len(),
                self.column_number
            )));
        }
        for row_ref in &self.rows {
            let row = row_ref.borrow();
            if row.bases.len() != self.column_number {
                return Err(TafError::MalformedRecord(format!(
                    "row {} has {} columns, block has {}",
                    row.sequence_name,
                    row.bases.len(),
                    self.column_number
                )));
            }
            if base_count(&row.bases) != row.length {
                return Err(TafError::MalformedRecord(format!(
                    "row {} length {} does not match its non-gap bases",
                    row.sequence_name, row.length
                )));
            }
            if row.start + row.length > row.sequence_length {
                return Err(TafError::MalformedRecord(format!(
                    "row {} interval {}-{} exceeds sequence length {}",
                    row.sequence_name,
                    row.start,
                    row.end(),
                    row.sequence_length
                )));
            }
        }
        Ok(())
    }

    /// Largest interstitial gap between `left` and the rows it links to
    pub fn max_interstitial_gap(left: &Block) -> u64 {
        let mut max_gap = 0;
        for l_ref in &left.rows {
            let l_row = l_ref.borrow();
            if let Some(r_ref) = l_row.right.upgrade() {
                let r_row = r_ref.borrow();
                if l_row.is_predecessor(&r_row) {
                    let gap = r_row.start - l_row.end();
                    if gap > max_gap {
                        max_gap = gap;
                    }
                }
            }
        }
        max_gap
    }

    /// Diff the row lists of two adjacent blocks and connect continuations.
    ///
    /// Linked pairs are strict predecessors where possible. With
    /// `allow_row_substitutions` the diff may also pair unrelated rows that
    /// reuse a slot (tolerated by the TAF writer); without it such pairs are
    /// priced out and left unlinked (required by normalization).
    pub fn link_adjacent(left: &Block, right: &Block, allow_row_substitutions: bool) {
        let mismatch_score = if allow_row_substitutions {
            1
        } else {
            FORBID_SUBSTITUTIONS_SCORE
        };
        let (_, pairing) = ond::align_with(
            &left.rows,
            &right.rows,
            |l: &RowRef, r: &RowRef| l.borrow().is_predecessor(&r.borrow()),
            1,
            mismatch_score,
        );
        for row in &left.rows {
            row.borrow_mut().right = Weak::new();
        }
        for row in &right.rows {
            row.borrow_mut().left = Weak::new();
        }
        for (i, &j) in pairing.iter().enumerate() {
            if j != -1 {
                let l_row = &left.rows[i];
                let r_row = &right.rows[j as usize];
                l_row.borrow_mut().right = Rc::downgrade(r_row);
                r_row.borrow_mut().left = Rc::downgrade(l_row);
                if !allow_row_substitutions {
                    debug_assert!(l_row.borrow().is_predecessor(&r_row.borrow()));
                }
            }
        }
    }
}
