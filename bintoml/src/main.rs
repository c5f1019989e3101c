//! Command-line tool for replaying TOML construction event scripts.
//!
//! Usage: toml-events [OPTIONS] [FILE|DIR]
//!
//! Options:
//!   --symbolic-keys        Intern keys as shared symbols
//!   --check                Check if the script builds (exit 0 if valid, 1 if invalid)
//!   --events               Print the parsed events instead of building
//!   -o, --output <FILE>    Write output to specified file
//!   -h, --help             Print help
//!   -V, --version          Print version

use libtoml::script::parse_script;
use libtoml::{replay_script_with_options, Options};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Build,
    Check,
    Events,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut options = Options::new();
    let mut mode = Mode::Build;
    let mut output_file: Option<&str> = None;
    let mut input_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-V" | "--version" => {
                println!("toml-events {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--symbolic-keys" => {
                options = options.symbolic_keys();
            }
            "--check" => {
                mode = Mode::Check;
            }
            "--events" => {
                mode = Mode::Events;
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires an argument");
                    process::exit(1);
                }
                output_file = Some(&args[i]);
            }
            "-" => {
                // input_path stays None, which means stdin
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                process::exit(1);
            }
            _ => {
                if input_path.is_some() {
                    eprintln!("Error: Multiple input paths not supported");
                    process::exit(1);
                }
                input_path = Some(&args[i]);
            }
        }
        i += 1;
    }

    if let Some(path) = input_path {
        if Path::new(path).is_dir() {
            if output_file.is_some() {
                eprintln!("Error: --output cannot be used with directory input");
                process::exit(1);
            }
            process_directory(path, &options, mode);
        }
    }

    let input = match input_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path, e);
                process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Error reading stdin: {}", e);
                process::exit(1);
            }
            buffer
        }
    };

    let exit_code = process_input(&input, input_path, &options, mode, output_file);
    process::exit(exit_code);
}

fn process_directory(dir_path: &str, options: &Options, mode: Mode) -> ! {
    let entries = match fs::read_dir(dir_path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error reading directory {}: {}", dir_path, e);
            process::exit(1);
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|e| e == "events").unwrap_or(false))
        .collect();
    paths.sort();
    debug!(dir = dir_path, scripts = paths.len(), "processing directory");

    let mut had_errors = false;
    for path in paths {
        let path_str = path.to_string_lossy();
        let input = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path_str, e);
                had_errors = true;
                continue;
            }
        };
        if process_input(&input, Some(&path_str), options, mode, None) != 0 {
            had_errors = true;
        }
    }

    process::exit(if had_errors { 1 } else { 0 });
}

fn process_input(
    input: &str,
    input_file: Option<&str>,
    options: &Options,
    mode: Mode,
    output_file: Option<&str>,
) -> i32 {
    let filename = input_file.map(|p| {
        Path::new(p)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| p.to_string())
    });
    let options = match filename {
        Some(name) => options.clone().with_filename(name),
        None => options.clone(),
    };

    let output = if mode == Mode::Events {
        match parse_script(input, options.filename.as_deref()) {
            Ok(events) => events
                .iter()
                .map(|event| format!("{:?}\n", event))
                .collect::<String>(),
            Err(e) => return report_error(input_file, &e),
        }
    } else {
        match replay_script_with_options(input, &options) {
            Ok(_) if mode == Mode::Check => {
                if let Some(path) = input_file {
                    println!("{}: ok", path);
                }
                return 0;
            }
            Ok(value) => format!("{:#?}\n", value),
            Err(e) => return report_error(input_file, &e),
        }
    };

    match output_file {
        Some(path) => {
            if let Err(e) = fs::write(path, &output) {
                eprintln!("Error writing {}: {}", path, e);
                return 1;
            }
        }
        None => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = stdout.write_all(output.as_bytes()) {
                eprintln!("Error writing output: {}", e);
                return 1;
            }
        }
    }
    0
}

fn report_error(input_file: Option<&str>, error: &dyn std::fmt::Display) -> i32 {
    match input_file {
        Some(path) => eprintln!("{}: {}", path, error),
        None => eprintln!("Error: {}", error),
    }
    1
}

fn print_help() {
    println!(
        "toml-events - replay TOML construction event scripts

USAGE:
    toml-events [OPTIONS] [FILE|DIR]

ARGS:
    [FILE|DIR]    Input script or directory (reads from stdin if not provided)
                  When a directory is given, processes all .events files in it

OPTIONS:
    --symbolic-keys        Intern keys as shared symbols instead of strings

    --check                Check if the script builds (exit 0 if valid, 1 if invalid)

    --events               Print the parsed events without building the document

    -o, --output <FILE>    Write output to specified file (not valid with directory input)

    -h, --help             Print help

    -V, --version          Print version

SCRIPT LINES:
    table <path>           [path]
    array <path>           [[path]]
    pair <path>            path = <value on top of the stack>
    key <path>             key of the next inline table entry
    push <literal>         \"string\", true, false, integer, float, datetime
    open array|inline      start an inline array or inline table
    close array|inline     finish the innermost composite

EXAMPLES:
    # Build a document and print its tree
    toml-events fruit.events

    # Check every script in a directory
    toml-events --check test/events

    # Read a script from stdin
    cat fruit.events | toml-events -

LOGGING:
    Set RUST_LOG (for example RUST_LOG=libtoml=trace) to trace each event."
    );
}
