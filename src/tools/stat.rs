//! Statistics over an indexed alignment, Serialize for output

use crate::errors::TafError;
use crate::parser::lines::LineSource;
use crate::tools::index::Tai;
use serde::Serialize;
use std::io::Write;

/// One indexed reference sequence
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: u64,
}

/// Report over the reference (indexed) sequences of an alignment
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct IndexStats {
    pub sequences: Vec<ReferenceSequence>,
}

/// Collect the name and length of every reference sequence in the index
pub fn reference_sequences(tai: &Tai, src: &mut LineSource) -> Result<IndexStats, TafError> {
    let sequences = tai
        .sequence_lengths(src)?
        .into_iter()
        .map(|(name, length)| ReferenceSequence { name, length })
        .collect();
    Ok(IndexStats { sequences })
}

/// Write the report as JSON
pub fn write_stats<W: Write>(stats: &IndexStats, out: &mut W) -> Result<(), TafError> {
    serde_json::to_writer_pretty(&mut *out, stats)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serialize_to_json() {
        let stats = IndexStats {
            sequences: vec![
                ReferenceSequence {
                    name: "hg.chr1".to_string(),
                    length: 4000,
                },
                ReferenceSequence {
                    name: "mm.chr1".to_string(),
                    length: 50,
                },
            ],
        };
        let mut out = Vec::new();
        write_stats(&stats, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["sequences"][0]["name"], "hg.chr1");
        assert_eq!(parsed["sequences"][1]["length"], 50);
    }
}
