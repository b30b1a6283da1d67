//! # mkbcfnt CLI
//!
//! Usage:
//!   mkbcfnt -o output.bcfnt input.ttf
//!   mkbcfnt -o merged.bcfnt -s 24 base.bcfnt extra.ttf
//!
//! Inputs may be outline fonts or existing containers (detected by their
//! CFNT magic); lower-numbered inputs win ties when glyphs overlap.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use bcfnt::{Bcfnt, RasterFont};

const DEFAULT_SIZE: u32 = 22;

struct Options {
    output: PathBuf,
    inputs: Vec<PathBuf>,
    size: u32,
    list: Vec<u16>,
    is_blacklist: bool,
}

fn print_usage(prog: &str) {
    println!("Usage: {} [OPTIONS...] <input1> [input2...]", prog);
    println!();
    println!("  Options:");
    println!("    -h, --help              Show this help message");
    println!("    -o, --output <output>   Output file");
    println!("    -s, --size <size>       Set font size in points (default {})", DEFAULT_SIZE);
    println!("    -b, --blacklist <file>  Excludes the whitespace-separated list of codepoints");
    println!("    -w, --whitelist <file>  Includes only the whitespace-separated list of codepoints");
    println!("    -v, --version           Show version information");
    println!("    <inputN>                Input file(s). Lower numbers get priority");
}

fn print_version() {
    println!("mkbcfnt {}", env!("CARGO_PKG_VERSION"));
}

/// Parse one integer with C-style radix prefixes: 0x/0X hex, leading 0
/// octal, decimal otherwise.
fn parse_code_point(token: &str) -> Option<u16> {
    let value = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()?
    } else if token.len() > 1 && token.starts_with('0') {
        u32::from_str_radix(&token[1..], 8).ok()?
    } else {
        token.parse::<u32>().ok()?
    };
    u16::try_from(value).ok()
}

/// Read a whitespace-separated code point list, sorted for binary search.
fn parse_list(path: &str) -> Result<Vec<u16>, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("failed to read list file {}: {}", path, e))?;

    let mut list = Vec::new();
    for token in text.split_whitespace() {
        match parse_code_point(token) {
            Some(code) => list.push(code),
            None => return Err(format!("invalid code point {:?} in {}", token, path)),
        }
    }
    list.sort_unstable();
    Ok(list)
}

fn parse_options(args: &[String]) -> Result<Options, String> {
    let mut output = None;
    let mut inputs = Vec::new();
    let mut size = DEFAULT_SIZE;
    let mut list = Vec::new();
    let mut is_blacklist = true;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value_for = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires an argument", flag))
        };
        match arg.as_str() {
            "-o" | "--output" => output = Some(PathBuf::from(value_for(arg)?)),
            "-s" | "--size" => {
                // A size that fails to parse falls back to the default.
                size = value_for(arg)?.parse().unwrap_or(0);
                if size == 0 {
                    size = DEFAULT_SIZE;
                }
            }
            "-b" | "--blacklist" => {
                list = parse_list(&value_for(arg)?)?;
                is_blacklist = true;
            }
            "-w" | "--whitelist" => {
                list = parse_list(&value_for(arg)?)?;
                is_blacklist = false;
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option {}", other));
            }
            input => inputs.push(PathBuf::from(input)),
        }
    }

    let output = output.ok_or_else(|| "no output file provided".to_string())?;
    if inputs.is_empty() {
        return Err("no input file provided".to_string());
    }

    Ok(Options { output, inputs, size, list, is_blacklist })
}

fn run(options: &Options) -> Result<usize, String> {
    let mut font = Bcfnt::new();

    for input in &options.inputs {
        let data = fs::read(input)
            .map_err(|e| format!("failed to read {}: {}", input.display(), e))?;

        if data.starts_with(b"CFNT") {
            let other = Bcfnt::decode(&data)
                .map_err(|e| format!("{}: {}", input.display(), e))?;
            font.merge_font(other, &options.list, options.is_blacklist);
        } else {
            let face = RasterFont::from_data(data, options.size)
                .map_err(|e| format!("{}: {}", input.display(), e))?;
            font.add_font(&face, &options.list, options.is_blacklist);
        }
    }

    font.write_to_file(&options.output)
        .map_err(|e| format!("{}: {}", options.output.display(), e))?;
    Ok(font.glyph_count())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("mkbcfnt");

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(prog);
        return;
    }
    if args.iter().any(|a| a == "-v" || a == "--version") {
        print_version();
        return;
    }

    let options = match parse_options(&args[1..]) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("✗ {}", e);
            print_usage(prog);
            process::exit(1);
        }
    };

    match run(&options) {
        Ok(count) => {
            eprintln!("✓ Generated font with {} glyphs to {}", count, options.output.display());
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            process::exit(1);
        }
    }
}
