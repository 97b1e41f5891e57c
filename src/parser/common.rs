use crate::errors::TafError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enum the file types
#[derive(Debug, PartialEq, Eq, Clone, Copy, ValueEnum)]
pub enum FileFormat {
    Maf,
    Taf,
    #[value(skip)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Copy, Serialize, Deserialize, Eq, Default)]
pub enum Strand {
    #[serde(rename = "+")]
    #[default]
    Positive,
    #[serde(rename = "-")]
    Negative,
}

impl FromStr for Strand {
    type Err = TafError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Positive),
            "-" => Ok(Strand::Negative),
            _ => Err(TafError::ParseStrand(s.to_string())),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Strand::Positive => write!(f, "+"),
            Strand::Negative => write!(f, "-"),
        }
    }
}

/// Reserved column-tag key carrying transposed MAF base qualities
pub const BASE_QUALITY_TAG_KEY: &str = "q";

/// TAF header key toggling run-length encoding of base stacks
pub const RUN_LENGTH_ENCODE_TAG_KEY: &str = "run_length_encode_bases";

/// A key/value annotation. Tag lists are ordered and may repeat keys,
/// so they are kept as plain `Vec<Tag>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Tag {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Parse a single `key<delimiter>value` token
pub fn parse_tag(token: &str, delimiter: &str) -> Result<Tag, TafError> {
    let mut iter = token.splitn(2, delimiter);
    let key = iter.next().unwrap_or("");
    let value = iter.next();
    match value {
        Some(value) if !key.is_empty() && !value.is_empty() => Ok(Tag::new(key, value)),
        _ => Err(TafError::MalformedHeader(format!(
            "tag not separated by `{}`: {}",
            delimiter, token
        ))),
    }
}

/// Parse a run of `key<delimiter>value` tokens in order
pub fn parse_tags(tokens: &[&str], delimiter: &str) -> Result<Vec<Tag>, TafError> {
    tokens.iter().map(|t| parse_tag(t, delimiter)).collect()
}

/// Find the first tag with the given key
pub fn find_tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a Tag> {
    tags.iter().find(|t| t.key == key)
}

/// Remove every tag with the given key, keeping the order of the rest
pub fn remove_tag(tags: &mut Vec<Tag>, key: &str) {
    tags.retain(|t| t.key != key);
}

/// Render tags as ` key<delimiter>value ...`, with a leading space per tag
pub fn write_tags(tags: &[Tag], delimiter: &str) -> String {
    let mut out = String::new();
    for tag in tags {
        out.push(' ');
        out.push_str(&tag.key);
        out.push_str(delimiter);
        out.push_str(&tag.value);
    }
    out
}

/// Parse a header line that must start with `prefix`, returning its tags
pub fn parse_header_line(line: &str, prefix: &str, delimiter: &str) -> Result<Vec<Tag>, TafError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() || tokens[0] != prefix {
        return Err(TafError::MalformedHeader(format!(
            "header line does not start with {}",
            prefix
        )));
    }
    parse_tags(&tokens[1..], delimiter)
}

/// Sniff file format from the header line
pub fn check_input_format(header_line: &str) -> FileFormat {
    match header_line.split_whitespace().next() {
        Some("#taf") => FileFormat::Taf,
        Some("##maf") => FileFormat::Maf,
        _ => FileFormat::Unknown,
    }
}

pub fn str2u64(s: &str) -> Result<u64, TafError> {
    s.parse::<u64>().map_err(|_| TafError::ParseInt(s.to_string()))
}
