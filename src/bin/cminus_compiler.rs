// cminus-compiler - One-pass C-minus compiler
// Compiles a C-minus source file to a three-address code listing

use std::env;
use std::fs;
use std::process;

use cminus::compiler::{CminusCompiler, CompilerConfig};

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }

    let mut input_file = "";
    let mut output_file = String::from("output.txt");
    let mut errors_file = String::from("semantic_errors.txt");
    let mut config_file: Option<String> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" | "--output" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -o requires a filename");
                    process::exit(1);
                }
                output_file = args[i + 1].clone();
                i += 2;
            }
            "-e" | "--errors" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: -e requires a filename");
                    process::exit(1);
                }
                errors_file = args[i + 1].clone();
                i += 2;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: --config requires a filename");
                    process::exit(1);
                }
                config_file = Some(args[i + 1].clone());
                i += 2;
            }
            "-v" | "--verbose" => {
                verbose = true;
                i += 1;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option '{}'", arg);
                print_usage(&args[0]);
                process::exit(1);
            }
            _ => {
                if input_file.is_empty() {
                    input_file = &args[i];
                } else {
                    eprintln!("Error: Multiple input files specified");
                    process::exit(1);
                }
                i += 1;
            }
        }
    }

    if input_file.is_empty() {
        eprintln!("Error: No input file specified");
        print_usage(&args[0]);
        process::exit(1);
    }

    let config = match &config_file {
        Some(path) => match CompilerConfig::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("Error loading '{}': {}", path, err);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    };

    if verbose {
        println!(
            "Compiling {} -> {} (diagnostics: {})",
            input_file, output_file, errors_file
        );
    }

    // Read source file
    let source = match fs::read_to_string(input_file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading '{}': {}", input_file, err);
            process::exit(1);
        }
    };

    let compiler = match CminusCompiler::with_config(config) {
        Ok(compiler) => compiler,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    };

    match compiler.compile(&source) {
        Ok(output) => {
            if let Err(err) = fs::write(&output_file, output.listing()) {
                eprintln!("Error writing '{}': {}", output_file, err);
                process::exit(1);
            }
            if let Err(err) = fs::write(&errors_file, output.diagnostics()) {
                eprintln!("Error writing '{}': {}", errors_file, err);
                process::exit(1);
            }

            if verbose {
                for frame in &output.frames {
                    println!("  {}", frame);
                }
                println!(
                    "{} instructions, {} semantic error(s)",
                    output.instructions.len(),
                    output.errors.len()
                );
            }

            if !output.is_semantically_correct() {
                process::exit(2);
            }
        }
        Err(err) => {
            eprintln!("Compilation error: {}", err);
            process::exit(1);
        }
    }
}

fn print_usage(program_name: &str) {
    println!("Usage: {} [options] <input.c>", program_name);
    println!();
    println!("Options:");
    println!("  -o, --output <file>    Code listing (default: output.txt)");
    println!("  -e, --errors <file>    Semantic diagnostics (default: semantic_errors.txt)");
    println!("  --config <file>        Memory layout in TOML");
    println!("  -v, --verbose          Verbose output, including frame layouts");
    println!("  -h, --help             Show this help message");
}
