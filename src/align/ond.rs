//! O(ND)/wavefront diff over arbitrary element slices.
//!
//! Terminology follows S. Marco-Sola et al., "Fast gap-affine pairwise
//! alignment using the wavefront algorithm". Useful for quickly computing
//! the diff between two similar lists; the elements and their equality are
//! opaque, so the same engine diffs alignment rows and gap-sequence bytes.

/// Furthest point for a diagonal outside the wavefront bounds
const UNREACHABLE_FP: i64 = -1_000_000;
/// Furthest point when no wavefront exists for a score
const MISSING_WF_FP: i64 = -100_000;
const MISSING_MIN_DIAG: i64 = 1_000_000_000;
const MISSING_MAX_DIAG: i64 = -1_000_000_000;

/// A series of furthest-reaching points along the k = x - y antidiagonals
struct Wavefront {
    min_diag: i64,
    max_diag: i64,
    // first min_diag value, kept so points stay addressable in fpa even if
    // the bounds are later trimmed
    original_min_diag: i64,
    fpa: Vec<i64>,
}

impl Wavefront {
    fn new(min_diag: i64, max_diag: i64) -> Self {
        assert!(max_diag >= min_diag);
        Wavefront {
            min_diag,
            max_diag,
            original_min_diag: min_diag,
            fpa: vec![0; (1 + max_diag - min_diag) as usize],
        }
    }

    /// Furthest point (an x coordinate) on the x - y = k antidiagonal
    fn get_fp(&self, k: i64) -> i64 {
        if k < self.min_diag || k > self.max_diag {
            return UNREACHABLE_FP;
        }
        self.fpa[(k - self.original_min_diag) as usize]
    }

    fn set_fp(&mut self, k: i64, h: i64) {
        assert!(self.min_diag <= k && k <= self.max_diag);
        self.fpa[(k - self.original_min_diag) as usize] = h;
    }
}

/// One wavefront per score, indexed by score
struct WavefrontSet {
    wfl: Vec<Option<Wavefront>>,
}

impl WavefrontSet {
    fn new() -> Self {
        WavefrontSet {
            wfl: vec![Some(Wavefront::new(0, 0))],
        }
    }

    fn get(&self, s: i64) -> Option<&Wavefront> {
        if s >= 0 && (s as usize) < self.wfl.len() {
            self.wfl[s as usize].as_ref()
        } else {
            None
        }
    }

    fn get_fp(&self, s: i64, k: i64) -> i64 {
        match self.get(s) {
            Some(wf) => wf.get_fp(k),
            None => MISSING_WF_FP,
        }
    }

    fn set_fp(&mut self, s: i64, k: i64, h: i64) {
        self.wfl[s as usize]
            .as_mut()
            .expect("wavefront must exist for score")
            .set_fp(k, h);
    }

    fn add(&mut self, min_diag: i64, max_diag: i64, s: i64) {
        assert!(s as usize >= self.wfl.len());
        while (s as usize) > self.wfl.len() {
            self.wfl.push(None);
        }
        self.wfl.push(Some(Wavefront::new(min_diag, max_diag)));
    }

    fn min_diag(&self, s: i64) -> i64 {
        match self.get(s) {
            Some(wf) => wf.min_diag,
            None => MISSING_MIN_DIAG,
        }
    }

    fn max_diag(&self, s: i64) -> i64 {
        match self.get(s) {
            Some(wf) => wf.max_diag,
            None => MISSING_MAX_DIAG,
        }
    }
}

/// Global alignment of two element sequences under unit-configurable gap and
/// mismatch costs.
///
/// In the dp matrix the rows (x) follow the first sequence and the columns
/// (y) the second; the antidiagonal is k = x - y and furthest points are x
/// coordinates along it.
pub struct WavefrontAligner<'a, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    seq1: &'a [T],
    seq2: &'a [T],
    elements_equal: F,
    gap_score: i64,
    mismatch_score: i64,
    score: i64,
    wfs: WavefrontSet,
}

impl<'a, T, F> WavefrontAligner<'a, T, F>
where
    F: Fn(&T, &T) -> bool,
{
    /// Run the wavefront dynamic program to completion
    pub fn new(
        seq1: &'a [T],
        seq2: &'a [T],
        elements_equal: F,
        gap_score: i64,
        mismatch_score: i64,
    ) -> Self {
        let mut aligner = WavefrontAligner {
            seq1,
            seq2,
            elements_equal,
            gap_score,
            mismatch_score,
            score: 0,
            wfs: WavefrontSet::new(),
        };
        loop {
            aligner.extend();
            if aligner.done() {
                break;
            }
            aligner.next();
        }
        aligner
    }

    /// The optimal alignment score
    pub fn score(&self) -> i64 {
        self.score
    }

    /// Extend each point on the current wavefront by runs of matches
    fn extend(&mut self) {
        let (min_diag, max_diag) = {
            let wf = self.wfs.get(self.score).expect("current wavefront exists");
            (wf.min_diag, wf.max_diag)
        };
        for k in min_diag..=max_diag {
            let mut h = self.wfs.get_fp(self.score, k);
            if h >= 0 && h - k >= 0 {
                let mut extended = false;
                while (h as usize) < self.seq1.len()
                    && ((h - k) as usize) < self.seq2.len()
                    && (self.elements_equal)(&self.seq1[h as usize], &self.seq2[(h - k) as usize])
                {
                    h += 1;
                    extended = true;
                }
                if extended {
                    self.wfs.set_fp(self.score, k, h);
                }
            }
        }
    }

    /// Have we reached the bottom-right cell of the dp matrix?
    fn done(&self) -> bool {
        let k = self.seq1.len() as i64 - self.seq2.len() as i64;
        self.wfs.get_fp(self.score, k) == self.seq1.len() as i64
    }

    /// Raise the score until a prior wavefront exists at score minus a gap
    /// or mismatch cost, then compute the new furthest points
    fn next(&mut self) {
        loop {
            self.score += 1;
            if self.wfs.get(self.score - self.gap_score).is_some()
                || self.wfs.get(self.score - self.mismatch_score).is_some()
            {
                break;
            }
        }

        let s = self.score;
        let min_diag = self
            .wfs
            .min_diag(s - self.gap_score)
            .min(self.wfs.min_diag(s - self.mismatch_score))
            - 1;
        let max_diag = self
            .wfs
            .max_diag(s - self.gap_score)
            .max(self.wfs.max_diag(s - self.mismatch_score))
            + 1;
        self.wfs.add(min_diag, max_diag, s);

        for k in min_diag..=max_diag {
            let insert_in_seq1 = self.wfs.get_fp(s - self.gap_score, k - 1) + 1;
            let insert_in_seq2 = self.wfs.get_fp(s - self.gap_score, k + 1);
            let mismatch = self.wfs.get_fp(s - self.mismatch_score, k) + 1;
            self.wfs
                .set_fp(s, k, insert_in_seq1.max(insert_in_seq2).max(mismatch));
        }
    }

    /// Traceback: for every index of the first sequence, the index of the
    /// second sequence it is aligned to, or -1 for a gap
    pub fn alignment(&self) -> Vec<i64> {
        let mut aligned_to = vec![-1i64; self.seq1.len()];
        let mut t = self.score;
        let mut k = self.seq1.len() as i64 - self.seq2.len() as i64;
        let mut f = self.seq1.len() as i64;
        assert_eq!(self.wfs.get_fp(t, k), f);
        while k != 0 || f != 0 {
            let mismatch = self.wfs.get_fp(t - self.mismatch_score, k);
            let insert_in_seq1 = self.wfs.get_fp(t - self.gap_score, k - 1);
            let insert_in_seq2 = self.wfs.get_fp(t - self.gap_score, k + 1);

            // the plus one for an insert in seq1 is necessary
            while f > mismatch.max(insert_in_seq1 + 1).max(insert_in_seq2).max(0) {
                // k = x - y, f = x
                let x = f;
                let y = f - k;
                aligned_to[(x - 1) as usize] = y - 1;
                f -= 1;
            }

            if mismatch >= insert_in_seq1 && mismatch >= insert_in_seq2 {
                t -= self.mismatch_score;
            } else if insert_in_seq1 >= insert_in_seq2 {
                k -= 1;
                f -= 1;
                t -= self.gap_score;
            } else {
                k += 1;
                t -= self.gap_score;
            }
        }
        aligned_to
    }
}

/// One-shot helper: returns the score and the per-element pairing
pub fn align_with<T, F>(
    seq1: &[T],
    seq2: &[T],
    elements_equal: F,
    gap_score: i64,
    mismatch_score: i64,
) -> (i64, Vec<i64>)
where
    F: Fn(&T, &T) -> bool,
{
    let aligner = WavefrontAligner::new(seq1, seq2, elements_equal, gap_score, mismatch_score);
    let pairing = aligner.alignment();
    (aligner.score(), pairing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_bytes(a: &str, b: &str, gap: i64, mismatch: i64) -> (i64, Vec<i64>) {
        align_with(a.as_bytes(), b.as_bytes(), |x, y| x == y, gap, mismatch)
    }

    #[test]
    fn empty_vs_empty() {
        let (score, pairing) = diff_bytes("", "", 1, 1);
        assert_eq!(score, 0);
        assert!(pairing.is_empty());
    }

    #[test]
    fn identical_sequences_align_identity() {
        let (score, pairing) = diff_bytes("ACGTACGT", "ACGTACGT", 1, 1);
        assert_eq!(score, 0);
        assert_eq!(pairing, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn single_insertion_costs_one_gap() {
        // the X in the first sequence has no partner
        let (score, pairing) = diff_bytes("AXBC", "ABC", 1, 1);
        assert_eq!(score, 1);
        assert_eq!(pairing.iter().filter(|&&p| p == -1).count(), 1);
        assert_eq!(pairing, vec![0, -1, 1, 2]);
    }

    #[test]
    fn insertion_in_second_sequence() {
        let (score, pairing) = diff_bytes("ABC", "AXBC", 1, 1);
        assert_eq!(score, 1);
        assert_eq!(pairing, vec![0, 2, 3]);
    }

    #[test]
    fn mismatch_is_a_substitution_pair() {
        let (score, pairing) = diff_bytes("AXC", "AYC", 1, 1);
        assert_eq!(score, 1);
        assert_eq!(pairing, vec![0, 1, 2]);
    }

    #[test]
    fn huge_mismatch_cost_forces_gaps() {
        let (score, pairing) = diff_bytes("AXC", "AYC", 1, 100_000_000);
        assert_eq!(score, 2);
        assert_eq!(pairing, vec![0, -1, 2]);
    }

    #[test]
    fn empty_against_non_empty() {
        let (score, pairing) = diff_bytes("", "ABC", 1, 1);
        assert_eq!(score, 3);
        assert!(pairing.is_empty());
        let (score, pairing) = diff_bytes("ABC", "", 1, 1);
        assert_eq!(score, 3);
        assert_eq!(pairing, vec![-1, -1, -1]);
    }
}
