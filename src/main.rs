//! Punto de entrada ("driver").
//!
//! Este módulo lee el archivo fuente, invoca al compilador y
//! expone una CLI.

use anyhow::Context;
use clap::{crate_version, value_parser, Arg, Command};
use log::LevelFilter;
use mipsc::{error::Diagnostic, parse::Limits, Options};

use std::{
    fs::{self, File},
    io::{self, Write},
    process,
};

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let command = Command::new("mipsc")
        .version(crate_version!())
        .about("Compiles a C subset to MIPS assembly")
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .required(true)
                .help("Source file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("max-identifier-length")
                .long("max-identifier-length")
                .takes_value(true)
                .value_name("N")
                .default_value("31")
                .value_parser(value_parser!(usize))
                .help("Significant characters in identifiers"),
        )
        .arg(
            Arg::new("max-arguments")
                .long("max-arguments")
                .takes_value(true)
                .value_name("N")
                .default_value("32")
                .value_parser(value_parser!(usize))
                .help("Maximum number of named function parameters"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Increase log verbosity"),
        );

    // Errores de uso terminan con estado 1, --help y --version con 0
    let args = match command.try_get_matches() {
        Ok(args) => args,
        Err(error) => {
            let status = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            process::exit(status);
        }
    };

    let level = match args.occurrences_of("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    // Se extraen argumentos necesarios
    let input = args.value_of("input").unwrap();
    let output = args.value_of("output").unwrap();

    let limits = Limits {
        identifier_length: *args.get_one::<usize>("max-identifier-length").unwrap(),
        max_arguments: *args.get_one::<usize>("max-arguments").unwrap(),
    };

    let source =
        fs::read_to_string(input).with_context(|| format!("Could not open file '{}'", input))?;

    let options = Options { limits };
    let mut stderr = io::stderr();

    let result = match output {
        "-" => {
            let mut stdout = io::stdout().lock();
            mipsc::compile(&source, &options, &mut stdout, &mut stderr)
        }

        path => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to open for writing: {}", path))?;

            mipsc::compile(&source, &options, &mut file, &mut stderr)
        }
    };

    if let Err(error) = result {
        let _ = write!(stderr, "{}", Diagnostic::from(error));
        process::exit(1);
    }

    Ok(())
}
