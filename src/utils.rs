use crate::align::block::Block;
use crate::converter::{maf2maf, maf2taf, taf2maf, taf2taf};
use crate::errors::TafError;
use crate::parser::common::{check_input_format, FileFormat};
use crate::parser::lines::LineSource;
use crate::parser::taf::TafWriteConfig;
use crate::parser::{maf, taf};
use crate::tools::index::{self, Region, Tai};
use crate::tools::norm::{normalize, NormConfig};
use crate::tools::stat;
use log::{info, warn};
use noodles::bgzf;
use std::fs::File;
use std::io::{self, stdin, stdout, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const BUFFER_SIZE: usize = 32 * 1024;

/// Get a line source from a file path, or from stdin for `-`/None
pub fn input_source(input: &Option<String>) -> Result<LineSource, TafError> {
    match input {
        Some(path) if path != "-" => LineSource::from_path(path),
        _ => LineSource::from_reader(Box::new(BufReader::with_capacity(BUFFER_SIZE, stdin()))),
    }
}

/// Get an output writer including stdout and file writer, optionally
/// bgzip-compressed
pub fn output_writer(outputpath: &str, bgzip: bool) -> Result<Box<dyn Write>, TafError> {
    let raw: Box<dyn Write> = if outputpath == "-" {
        Box::new(stdout())
    } else {
        Box::new(BufWriter::new(File::create(outputpath)?))
    };
    Ok(if bgzip {
        Box::new(bgzf::Writer::new(raw))
    } else {
        raw
    })
}

/// Check if the output file exists and whether it may be rewritten
pub fn outfile_exist(output_file: &str, rewrite: bool) -> Result<(), TafError> {
    if output_file != "-" && Path::new(output_file).exists() {
        if rewrite {
            warn!("file {} exist, will rewrite it", output_file);
        } else {
            return Err(TafError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file {} exist, use -r to rewrite it", output_file),
            )));
        }
    }
    Ok(())
}

fn sniff_format(src: &LineSource) -> Result<FileFormat, TafError> {
    match check_input_format(src.peek().unwrap_or_default()) {
        FileFormat::Unknown => Err(TafError::MalformedHeader(
            "unable to detect ##maf or #taf header".to_string(),
        )),
        format => Ok(format),
    }
}

fn load_index(input: &str, maf_format: bool) -> Result<Tai, TafError> {
    let index_path = index::tai_path(input);
    let file = File::open(&index_path).map_err(|err| {
        TafError::IndexMiss(format!(
            "{} ({}); create it with `taftools index`",
            index_path, err
        ))
    })?;
    Tai::load(BufReader::new(file), maf_format)
}

/// Command: view (convert between MAF and TAF renderings)
pub fn wrap_view(
    input: &Option<String>,
    output: &str,
    to: FileFormat,
    config: &TafWriteConfig,
    bgzip: bool,
    rewrite: bool,
) -> Result<(), TafError> {
    outfile_exist(output, rewrite)?;
    let mut src = input_source(input)?;
    let from = sniff_format(&src)?;
    info!("start convert {:?} into {:?}: {}", from, to, output);
    let mut out = output_writer(output, bgzip)?;
    match (from, to) {
        (FileFormat::Maf, FileFormat::Taf) => maf2taf(&mut src, config, &mut out),
        (FileFormat::Taf, FileFormat::Maf) => taf2maf(&mut src, &mut out),
        (FileFormat::Taf, FileFormat::Taf) => taf2taf(&mut src, config, &mut out),
        (FileFormat::Maf, FileFormat::Maf) => maf2maf(&mut src, &mut out),
        _ => unreachable!("formats are sniffed before dispatch"),
    }
}

/// Command: build the .tai index
pub fn wrap_index(input: &str, outputpath: &str, block_size: u64) -> Result<(), TafError> {
    let outputpath = if outputpath == "-" {
        index::tai_path(input)
    } else {
        outputpath.to_string()
    };
    let mut src = LineSource::from_path(input)?;
    let mut out = output_writer(&outputpath, false)?;
    index::create(&mut src, &mut out, block_size)?;
    info!("wrote index {}", outputpath);
    Ok(())
}

/// Command: extract regions through the .tai index
pub fn wrap_extract(
    input: &str,
    regions: &Option<Vec<String>>,
    region_file: &Option<String>,
    output: &str,
    rewrite: bool,
) -> Result<(), TafError> {
    let mut region_strings: Vec<String> = Vec::new();
    if let Some(regions) = regions {
        region_strings.extend(regions.iter().cloned());
    }
    if let Some(path) = region_file {
        for line in BufReader::new(File::open(path)?).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                region_strings.push(line.trim().to_string());
            }
        }
    }
    if region_strings.is_empty() {
        return Err(TafError::ParseRegion(
            "regions or region file must be specified".to_string(),
        ));
    }
    outfile_exist(output, rewrite)?;

    let mut src = LineSource::from_path(input)?;
    let format = sniff_format(&src)?;
    let maf_format = format == FileFormat::Maf;
    let tai = load_index(input, maf_format)?;

    // replay the input's header on the output
    let (tags, run_length_encode_bases) = if maf_format {
        (maf::read_header(&mut src)?, false)
    } else {
        taf::read_header_rle(&mut src)?
    };
    let mut out = output_writer(output, false)?;
    if maf_format {
        maf::write_header(&tags, &mut out)?;
    } else {
        taf::write_header(&tags, &mut out)?;
    }

    let config = TafWriteConfig {
        run_length_encode_bases,
        ..Default::default()
    };
    for region_string in &region_strings {
        let region = Region::parse(region_string)?;
        let mut iterator = tai.iterator(&mut src, run_length_encode_bases, &region)?;
        let mut previous: Option<Block> = None;
        let mut block_count = 0usize;
        while let Some(block) = iterator.next_block()? {
            if maf_format {
                maf::write_block(&block, &mut out)?;
            } else {
                taf::write_block(previous.as_ref(), &block, &config, &mut out)?;
            }
            previous = Some(block);
            block_count += 1;
        }
        if block_count == 0 {
            warn!("region `{}` has no alignment blocks", region_string);
        } else {
            info!("region `{}`: {} blocks", region_string, block_count);
        }
    }
    Ok(())
}

/// Command: merge short adjacent blocks
pub fn wrap_norm(
    input: &Option<String>,
    output: &str,
    config: &NormConfig,
    bgzip: bool,
    rewrite: bool,
) -> Result<(), TafError> {
    outfile_exist(output, rewrite)?;
    let mut src = input_source(input)?;
    let mut out = output_writer(output, bgzip)?;
    normalize(&mut src, config, &mut out)
}

/// Command: report reference sequence lengths from the index
pub fn wrap_stats(input: &str, output: &str, rewrite: bool) -> Result<(), TafError> {
    outfile_exist(output, rewrite)?;
    let mut src = LineSource::from_path(input)?;
    let format = sniff_format(&src)?;
    let tai = load_index(input, format == FileFormat::Maf)?;
    let stats = stat::reference_sequences(&tai, &mut src)?;
    let mut out = output_writer(output, false)?;
    stat::write_stats(&stats, &mut out)
}
