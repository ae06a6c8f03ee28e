// CLI front-end for the struct-instrumentation and store-purging passes.

use clap::Parser;

use lir_instrument::commons::Valid;
use lir_instrument::middle_end::instrument::{self, InstrumentConfig};
use lir_instrument::middle_end::lir::Program;
use lir_instrument::middle_end::store_purge::{self, DEFAULT_PURGE_TYPES};

/// Rewrites a LIR module so indirect calls through function-pointer fields
/// are resolvable by a field-sensitive pointer analysis.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    input_file: String,
    output_file: String,

    /// Run the struct-instrumentation pass.
    #[arg(long = "instr")]
    instr: bool,

    /// Run the store-purging pass (before instrumentation, if both are given).
    #[arg(long = "remove-store")]
    remove_store: bool,

    /// Prefix for synthesized symbols (singletons, stubs, the global
    /// initializer, the caller).
    #[arg(long, default_value = "mypass")]
    prefix: String,

    /// Record type name whose pointer-to-record stores the store-purger
    /// removes. Repeatable; defaults to the three kernel intrusive-list
    /// types if none are given.
    #[arg(long = "purge-type")]
    purge_type: Vec<String>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        log::LevelFilter::Off
    } else {
        match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        }
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn read_program(path: &str) -> Valid<Program> {
    let text = String::from_utf8(
        std::fs::read(path).unwrap_or_else(|e| panic!("could not read {path}: {e}")),
    )
    .unwrap_or_else(|_| panic!("{path} is not valid utf-8"));

    text.parse::<Program>()
        .unwrap_or_else(|e| panic!("failed to parse {path}: {e}"))
        .validate()
        .unwrap_or_else(|e| panic!("{path} failed validation: {e}"))
}

pub fn main() {
    let args = Args::parse();
    init_logging(&args);

    let mut program = read_program(&args.input_file);

    if args.remove_store {
        let purge_types = if args.purge_type.is_empty() {
            DEFAULT_PURGE_TYPES.iter().map(|s| s.to_string()).collect()
        } else {
            args.purge_type.clone()
        };
        program = store_purge::purge_stores(program, &purge_types);
    }

    if args.instr {
        let config = InstrumentConfig {
            prefix: args.prefix.clone(),
        };
        program = instrument::instrument(program, &config)
            .unwrap_or_else(|e| panic!("instrumentation failed: {e}"));
    }

    std::fs::write(&args.output_file, program.to_string())
        .unwrap_or_else(|e| panic!("failed to write {}: {e}", args.output_file));
}
