use crate::parser::common::FileFormat;
use clap::ArgAction;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taftools")]
#[command(about = "a toolkit for compact TAF/MAF whole-genome multiple sequence alignments")]
#[command(author, version)]
#[command(
help_template =
"{name} -- {about}\n\nVersion: {version}\
    \n\n{usage-heading} {usage}\n\n{all-args}"
)]
pub struct Cli {
    /// Output file ("-" for stdout)
    #[arg(long, short, global = true, default_value = "-", help_heading = Some("GLOBAL"))]
    pub outfile: String,
    /// Bool, if rewrite output file [default: false]
    #[arg(long, short, global = true, default_value = "false", help_heading = Some("GLOBAL"))]
    pub rewrite: bool,
    /// Logging level [-v: Info, -vv: Debug, -vvv: Trace]
    #[arg(short, long, global = true, action = ArgAction::Count, help_heading = "GLOBAL")]
    pub verbose: u8,
    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert between the MAF and TAF renderings of an alignment
    #[command(visible_alias = "v", name = "view")]
    View {
        /// Input MAF/TAF File, None for STDIN
        #[arg(required = false)]
        input: Option<String>,
        /// Output format
        #[arg(long, short, value_enum)]
        format: FileFormat,
        /// Run-length encode the TAF base columns
        #[arg(long, short = 'u')]
        rle: bool,
        /// Repeat row coordinates every N bases, 0 to disable
        #[arg(long, short = 'n', default_value = "10000")]
        repeat_coordinates: u64,
        /// Write bgzip-compressed output
        #[arg(long, short = 'z')]
        bgzip: bool,
    },
    /// Build the .tai index of a MAF/TAF file
    #[command(visible_alias = "i", name = "index")]
    Index {
        /// Input MAF/TAF File, must be a seekable file
        #[arg(required = true)]
        input: String,
        /// Reference bases per index record
        #[arg(long, short, default_value = "10000")]
        block_size: u64,
    },
    /// Extract regions of the alignment using the .tai index
    #[command(visible_alias = "e", name = "extract")]
    Extract {
        /// Input MAF/TAF File, must be indexed
        #[arg(required = true)]
        input: String,
        /// Input regions like chr1:100-200
        #[arg(required = false, long, short = 'g', value_delimiter = ',')]
        regions: Option<Vec<String>>,
        /// Input regions file, one region per line
        #[arg(required = false, long, short)]
        file: Option<String>,
    },
    /// Merge short adjacent blocks of a TAF alignment
    #[command(visible_alias = "n", name = "norm")]
    Norm {
        /// Input TAF File, None for STDIN
        #[arg(required = false)]
        input: Option<String>,
        /// Merge only if one neighbour has at most this many columns
        #[arg(long, short = 'm', default_value = "10")]
        max_block_length: u64,
        /// Merge only if at most this many unaligned bases lie between
        #[arg(long, short = 'g', default_value = "10")]
        max_gap_length: u64,
        /// Print maf output instead of taf
        #[arg(long, short = 'k')]
        maf: bool,
        /// Repeat row coordinates every N bases, 0 to disable
        #[arg(long, short = 'n', default_value = "10000")]
        repeat_coordinates: u64,
        /// Write bgzip-compressed output
        #[arg(long, short = 'z')]
        bgzip: bool,
    },
    /// Report reference sequence statistics from the index
    #[command(visible_alias = "s", name = "stats")]
    Stats {
        /// Input MAF/TAF File, must be indexed
        #[arg(required = true)]
        input: String,
    },
}

pub fn make_cli_parse() -> Cli {
    Cli::parse()
}
