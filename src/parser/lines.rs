use crate::errors::TafError;
use flate2::read::MultiGzDecoder;
use noodles::bgzf;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const BUFFER_SIZE: usize = 32 * 1024;

/// Compression of the underlying byte stream, sniffed from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Plain,
    Gzip,
    Bgzf,
}

/// gzip members carrying the two-byte "BC" extra subfield are BGZF
fn sniff_compression(file: &mut File) -> std::io::Result<Compression> {
    let mut magic = [0u8; 18];
    let mut n = 0;
    while n < magic.len() {
        let m = file.read(&mut magic[n..])?;
        if m == 0 {
            break;
        }
        n += m;
    }
    file.seek(SeekFrom::Start(0))?;
    if n >= 2 && magic[0] == 0x1f && magic[1] == 0x8b {
        if n >= 14 && magic[3] & 0x04 != 0 && magic[12] == b'B' && magic[13] == b'C' {
            Ok(Compression::Bgzf)
        } else {
            Ok(Compression::Gzip)
        }
    } else {
        Ok(Compression::Plain)
    }
}

enum LineStream {
    Plain(BufReader<File>),
    Bgzf(Box<bgzf::Reader<File>>),
    Gzip(BufReader<MultiGzDecoder<File>>),
    Stream(Box<dyn BufRead + Send>),
}

/// Buffered single-line-lookahead iterator over a text stream that may be
/// plain, bgzip or gzip compressed.
///
/// `tell` reports the offset at which the currently buffered (peeked) line
/// begins: a byte offset for plain input, a virtual offset for bgzip.
/// Random `seek` is only supported on plain and bgzip input.
pub struct LineSource {
    stream: LineStream,
    buf: Option<String>,
    line_start: u64,
    offset: u64,
}

impl LineSource {
    /// Open a file, sniffing its compression
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<LineSource, TafError> {
        let mut file = File::open(path)?;
        let stream = match sniff_compression(&mut file)? {
            Compression::Plain => LineStream::Plain(BufReader::with_capacity(BUFFER_SIZE, file)),
            Compression::Bgzf => LineStream::Bgzf(Box::new(bgzf::Reader::new(file))),
            Compression::Gzip => {
                LineStream::Gzip(BufReader::with_capacity(BUFFER_SIZE, MultiGzDecoder::new(file)))
            }
        };
        LineSource::new(stream)
    }

    /// Wrap an arbitrary reader (e.g. stdin). The result is not indexable.
    pub fn from_reader(reader: Box<dyn BufRead + Send>) -> Result<LineSource, TafError> {
        LineSource::new(LineStream::Stream(reader))
    }

    fn new(stream: LineStream) -> Result<LineSource, TafError> {
        let mut src = LineSource {
            stream,
            buf: None,
            line_start: 0,
            offset: 0,
        };
        src.fill()?;
        Ok(src)
    }

    /// True iff the stream supports `seek`
    pub fn indexable(&self) -> bool {
        matches!(self.stream, LineStream::Plain(_) | LineStream::Bgzf(_))
    }

    fn position(&self) -> u64 {
        match &self.stream {
            LineStream::Bgzf(reader) => u64::from(reader.virtual_position()),
            _ => self.offset,
        }
    }

    fn fill(&mut self) -> Result<(), TafError> {
        self.line_start = self.position();
        let mut line = String::new();
        let n = match &mut self.stream {
            LineStream::Plain(reader) => reader.read_line(&mut line)?,
            LineStream::Bgzf(reader) => reader.read_line(&mut line)?,
            LineStream::Gzip(reader) => reader.read_line(&mut line)?,
            LineStream::Stream(reader) => reader.read_line(&mut line)?,
        };
        if n == 0 {
            self.buf = None;
            return Ok(());
        }
        self.offset += n as u64;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        self.buf = Some(line);
        Ok(())
    }

    /// Look at the buffered line without consuming it; `None` at EOF
    pub fn peek(&self) -> Option<&str> {
        self.buf.as_deref()
    }

    /// Consume and return the buffered line, refilling with the next one
    pub fn next_line(&mut self) -> Result<Option<String>, TafError> {
        let line = self.buf.take();
        if line.is_some() {
            self.fill()?;
        }
        Ok(line)
    }

    /// Offset at which the buffered line began
    pub fn tell(&self) -> u64 {
        self.line_start
    }

    /// Reposition so the next `peek`/`next_line` returns the line starting
    /// at `offset`
    pub fn seek(&mut self, offset: u64) -> Result<(), TafError> {
        match &mut self.stream {
            LineStream::Plain(reader) => {
                reader.seek(SeekFrom::Start(offset))?;
                self.offset = offset;
            }
            LineStream::Bgzf(reader) => {
                reader.seek(bgzf::VirtualPosition::from(offset))?;
            }
            _ => return Err(TafError::UnsupportedCompression),
        }
        self.buf = None;
        self.fill()?;
        Ok(())
    }

    /// Swap the buffered line for an edited copy, leaving offsets alone.
    /// Used to rewrite an index anchor line into a cold-start form.
    pub fn replace_peeked(&mut self, line: String) {
        if self.buf.is_some() {
            self.buf = Some(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn stream_over(text: &str) -> LineSource {
        LineSource::from_reader(Box::new(Cursor::new(text.as_bytes().to_vec()))).unwrap()
    }

    #[test]
    fn peek_then_next() {
        let mut src = stream_over("first\nsecond\n");
        assert_eq!(src.peek(), Some("first"));
        assert_eq!(src.peek(), Some("first"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("first"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("second"));
        assert_eq!(src.next_line().unwrap(), None);
        assert_eq!(src.peek(), None);
    }

    #[test]
    fn blank_lines_are_preserved() {
        let mut src = stream_over("a\n\nb\n");
        assert_eq!(src.next_line().unwrap().as_deref(), Some("a"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("b"));
    }

    #[test]
    fn stream_input_is_not_indexable() {
        let mut src = stream_over("a\n");
        assert!(!src.indexable());
        assert!(matches!(src.seek(0), Err(TafError::UnsupportedCompression)));
    }

    #[test]
    fn tell_and_seek_on_plain_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"alpha\nbeta\ngamma\n").unwrap();
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        assert!(src.indexable());
        assert_eq!(src.tell(), 0);
        src.next_line().unwrap();
        assert_eq!(src.tell(), 6); // start of "beta"
        let beta_offset = src.tell();
        src.next_line().unwrap();
        src.next_line().unwrap();
        assert_eq!(src.peek(), None);
        src.seek(beta_offset).unwrap();
        assert_eq!(src.peek(), Some("beta"));
        assert_eq!(src.tell(), beta_offset);
    }

    #[test]
    fn gzip_input_reads_but_refuses_seek() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"one\ntwo\n").unwrap();
        tmp.write_all(&encoder.finish().unwrap()).unwrap();
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        assert!(!src.indexable());
        assert_eq!(src.next_line().unwrap().as_deref(), Some("one"));
        assert!(matches!(src.seek(0), Err(TafError::UnsupportedCompression)));
    }

    #[test]
    fn bgzf_virtual_offsets_round_trip() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let mut writer = bgzf::Writer::new(Vec::new());
        writer.write_all(b"alpha\nbeta\n").unwrap();
        tmp.write_all(&writer.finish().unwrap()).unwrap();
        let mut src = LineSource::from_path(tmp.path()).unwrap();
        assert!(src.indexable());
        src.next_line().unwrap();
        let beta_offset = src.tell();
        assert_eq!(src.peek(), Some("beta"));
        src.next_line().unwrap();
        assert_eq!(src.peek(), None);
        src.seek(beta_offset).unwrap();
        assert_eq!(src.peek(), Some("beta"));
    }

    #[test]
    fn replace_peeked_feeds_parsers() {
        let mut src = stream_over("old line\nnext\n");
        src.replace_peeked("new line".to_string());
        assert_eq!(src.next_line().unwrap().as_deref(), Some("new line"));
        assert_eq!(src.next_line().unwrap().as_deref(), Some("next"));
    }
}
