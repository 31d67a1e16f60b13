use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{arg, crate_version, Arg, ArgAction, Command};
use log::LevelFilter;

use huffc::container::{self, Algorithm};
use huffc::{Error, Options, STD_OPTIONS};

const RCH: &str = "unreachable was reached";

fn main() {
    env_logger::init();

    let long_help =
"Examples:
---------
Compress:      `huffc compress -m adaptive -f report.txt`
Expand:        `huffc expand -f report.huf`";

    let mut main_cmd = Command::new("huffc")
        .about("Static and adaptive Huffman file compression")
        .after_long_help(long_help)
        .version(crate_version!());

    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(["basic","adaptive"]).required(true))
        .arg(Arg::new("files").short('f').long("files").help("one or more input files")
            .required(true).num_args(1..).action(ArgAction::Append))
        .arg(Arg::new("destinations").short('d').long("destinations")
            .help("output paths, paired positionally with --files; trailing files with no \
                   destination are written alongside the original")
            .num_args(1..).action(ArgAction::Append))
        .arg(arg!(-s --"symbol-size" <N> "symbol size in bytes (basic method only; default 1)")
            .value_parser(clap::value_parser!(usize)))
        .arg(arg!(-v --verbose "print a diagnostic line for every skipped or failed file").action(ArgAction::SetTrue))
        .about("compress one or more files"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(Arg::new("files").short('f').long("files").help("one or more input files")
            .required(true).num_args(1..).action(ArgAction::Append))
        .arg(Arg::new("destinations").short('d').long("destinations")
            .help("output paths, paired positionally with --files")
            .num_args(1..).action(ArgAction::Append))
        .arg(arg!(-v --verbose "print a diagnostic line for every skipped or failed file").action(ArgAction::SetTrue))
        .about("expand one or more files"));

    let matches = main_cmd.get_matches();
    let mut any_failed = false;

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let verbose = cmd.get_flag("verbose");
        if verbose {
            log::set_max_level(LevelFilter::Trace);
        }
        let method = cmd.get_one::<String>("method").expect(RCH);
        let algorithm = match method.as_str() {
            "basic" => Algorithm::Static,
            "adaptive" => Algorithm::Adaptive,
            _ => panic!("{}", RCH),
        };
        let symbol_size = cmd.get_one::<usize>("symbol-size").copied();
        if algorithm == Algorithm::Adaptive && symbol_size.is_some_and(|s| s != 1) {
            any_failed = true;
            let err = Error::InvalidConfig(
                "--symbol-size is not accepted with -m adaptive, which is always byte-granular".to_string(),
            );
            if verbose {
                eprintln!("{}", err);
            }
        } else {
            let opts = Options { symbol_size: symbol_size.unwrap_or(1), ..STD_OPTIONS };
            let files = string_values(cmd, "files").expect(RCH);
            let destinations = string_values(cmd, "destinations").unwrap_or_default();

            for (i, file) in files.iter().enumerate() {
                let dest = destinations.get(i).map(String::as_str);
                if let Err(e) = compress_one(file, dest, algorithm, &opts) {
                    any_failed = true;
                    if verbose {
                        eprintln!("{}: {}", file, e);
                    }
                }
            }
        }
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let verbose = cmd.get_flag("verbose");
        if verbose {
            log::set_max_level(LevelFilter::Trace);
        }
        let files = string_values(cmd, "files").expect(RCH);
        let destinations = string_values(cmd, "destinations").unwrap_or_default();

        for (i, file) in files.iter().enumerate() {
            let dest = destinations.get(i).map(String::as_str);
            if let Err(e) = expand_one(file, dest) {
                any_failed = true;
                if verbose {
                    eprintln!("{}: {}", file, e);
                }
            }
        }
    }

    if any_failed {
        std::process::exit(1);
    }
}

fn string_values(cmd: &clap::ArgMatches, id: &str) -> Option<Vec<String>> {
    cmd.get_many::<String>(id).map(|v| v.cloned().collect())
}

/// The file's extension, leading dot included (e.g. `.txt`), or empty if
/// there is none.
fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    }
}

/// `huf.py`'s destination rule: a missing parent directory is reported and
/// the file falls back to its sibling-of-input path rather than aborting.
fn resolve_destination(input: &Path, dest: Option<&str>, forced_ext: &str) -> PathBuf {
    let ext = forced_ext.trim_start_matches('.');
    let candidate = match dest {
        Some(d) => PathBuf::from(d),
        None => return input.with_extension(ext),
    };
    match candidate.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            let err = Error::InvalidConfig(format!("destination parent {} does not exist", parent.display()));
            log::error!("{}; writing alongside {} instead", err, input.display());
            input.with_extension(ext)
        }
        _ => candidate.with_extension(ext),
    }
}

fn compress_one(input: &str, dest: Option<&str>, algorithm: Algorithm, opts: &Options) -> Result<(), Error> {
    let in_path = Path::new(input);
    let extension = extension_of(in_path);
    let out_path = resolve_destination(in_path, dest, "huf");
    let mut in_file = File::open(in_path)?;
    let mut out_file = BufWriter::new(File::create(&out_path)?);
    container::compress(&mut in_file, &extension, &mut out_file, algorithm, opts)
}

fn expand_one(input: &str, dest: Option<&str>) -> Result<(), Error> {
    let in_path = Path::new(input);
    let mut in_file = File::open(in_path)?;
    // the destination's final extension is only known once the header is
    // read, so decode into memory first and name the file afterward.
    let mut decoded = Vec::new();
    let extension = container::expand(&mut in_file, &mut decoded, &STD_OPTIONS)?;
    let out_path = resolve_destination(in_path, dest, &extension);
    std::fs::write(&out_path, &decoded)?;
    Ok(())
}
