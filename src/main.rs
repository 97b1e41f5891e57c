use log::error;
use taflib::cli::{make_cli_parse, Commands};
use taflib::log::init_logger;
use taflib::parser::taf::TafWriteConfig;
use taflib::tools::norm::NormConfig;
use taflib::utils::{wrap_extract, wrap_index, wrap_norm, wrap_stats, wrap_view};

fn main() {
    let cli = make_cli_parse();
    init_logger(cli.verbose);
    let outfile = &cli.outfile;

    let result = match &cli.command {
        Commands::View {
            input,
            format,
            rle,
            repeat_coordinates,
            bgzip,
        } => {
            let config = TafWriteConfig {
                run_length_encode_bases: *rle,
                repeat_coordinates_every_n_columns: *repeat_coordinates,
            };
            wrap_view(input, outfile, *format, &config, *bgzip, cli.rewrite)
        }
        Commands::Index { input, block_size } => wrap_index(input, outfile, *block_size),
        Commands::Extract {
            input,
            regions,
            file,
        } => wrap_extract(input, regions, file, outfile, cli.rewrite),
        Commands::Norm {
            input,
            max_block_length,
            max_gap_length,
            maf,
            repeat_coordinates,
            bgzip,
        } => {
            let config = NormConfig {
                maximum_block_length_to_merge: *max_block_length,
                maximum_gap_length: *max_gap_length,
                output_maf: *maf,
                repeat_coordinates_every_n_columns: *repeat_coordinates,
            };
            wrap_norm(input, outfile, &config, *bgzip, cli.rewrite)
        }
        Commands::Stats { input } => wrap_stats(input, outfile, cli.rewrite),
    };

    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(1);
    }
}
