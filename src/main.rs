use std::io::{self, BufRead, Write};
use std::{env, fs, path::Path, process};

use clox::bytecode::disasm::print_chunk;
use clox::bytecode::{Chunk, Compiler, CompilerConfig};
use clox::frontend::Scanner;
use clox::frontend::token_dumper::TokenDumper;
use clox::runtime::{InterpretResult, Vm, VmConfig};

const EXIT_USAGE: i32 = 64;
const EXIT_COMPILE: i32 = 65;
const EXIT_RUNTIME: i32 = 70;
const EXIT_IO: i32 = 74;

struct Options {
    tokens_only: bool,
    no_color: bool,
    bytecode: bool,
    trace: bool,
    emit: Option<String>,
    path: Option<String>,
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage();
        return;
    }

    let options = match parse_args(&args) {
        Some(options) => options,
        None => {
            print_usage();
            process::exit(EXIT_USAGE);
        }
    };

    let compiler_config = CompilerConfig {
        print_code: options.bytecode,
    };
    let vm_config = VmConfig {
        trace_execution: options.trace,
        ..VmConfig::default()
    };

    match &options.path {
        Some(path) if path.ends_with(".loxc") => run_image(path, vm_config),
        Some(path) => run_file(path, &options, compiler_config, vm_config),
        None => repl(compiler_config, vm_config),
    }
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut options = Options {
        tokens_only: false,
        no_color: false,
        bytecode: false,
        trace: false,
        emit: None,
        path: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--tokens" => options.tokens_only = true,
            "--no-color" => options.no_color = true,
            "--bc" | "--bytecode" => options.bytecode = true,
            "--trace" => options.trace = true,
            "--emit" => options.emit = Some(iter.next()?.clone()),
            flag if flag.starts_with('-') => {
                eprintln!("Unknown option: {}", flag);
                return None;
            }
            path => {
                if options.path.is_some() {
                    return None;
                }
                options.path = Some(path.to_string());
            }
        }
    }

    if options.emit.is_some() && options.path.is_none() {
        return None;
    }
    Some(options)
}

fn print_usage() {
    println!("clox - Lox expression compiler and bytecode VM");
    println!();
    println!("Usage:");
    println!("  clox                        Start interactive REPL");
    println!("  clox <file>                 Compile and run an expression file");
    println!("  clox <file.loxc>            Run a compiled chunk image");
    println!("  clox --tokens <file>        Show tokens only");
    println!("  clox --bc <file>            Print bytecode before running");
    println!("  clox --trace <file>         Trace every executed instruction");
    println!("  clox --emit <out> <file>    Write the compiled chunk image to <out>");
    println!("  clox --no-color             Disable colored token output");
    println!("  clox --help, -h             Show this help");
}

fn read_source(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Could not read file \"{}\": {}", path, e);
            process::exit(EXIT_IO);
        }
    }
}

fn run_file(path: &str, options: &Options, compiler_config: CompilerConfig, vm_config: VmConfig) {
    let source = read_source(path);

    if options.tokens_only {
        dump_tokens(&source, options.no_color);
        return;
    }

    let chunks = match Compiler::with_config(&source, compiler_config).compile() {
        Ok(chunks) => chunks,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_COMPILE);
        }
    };

    if let Some(out) = &options.emit {
        emit_image(&chunks, out);
        return;
    }

    exit_with(Vm::with_config(chunks, vm_config).interpret());
}

fn dump_tokens(source: &str, no_color: bool) {
    let tokens = Scanner::new(source).tokenize();

    let mut dumper = TokenDumper::new();
    if no_color {
        dumper = dumper.no_color();
    }
    dumper.dump(&tokens);
}

fn emit_image(chunks: &[Chunk], out: &str) {
    let Some(chunk) = chunks.first() else {
        eprintln!("Nothing to emit.");
        process::exit(EXIT_COMPILE);
    };

    let image = match chunk.to_image() {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Could not encode chunk: {}", e);
            process::exit(EXIT_RUNTIME);
        }
    };

    if let Err(e) = fs::write(Path::new(out), image) {
        eprintln!("Could not write file \"{}\": {}", out, e);
        process::exit(EXIT_IO);
    }
}

fn run_image(path: &str, vm_config: VmConfig) {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Could not read file \"{}\": {}", path, e);
            process::exit(EXIT_IO);
        }
    };

    let chunk = match Chunk::from_image(&bytes) {
        Ok(chunk) => chunk,
        Err(e) => {
            eprintln!("Could not load \"{}\": {}", path, e);
            process::exit(EXIT_RUNTIME);
        }
    };

    if vm_config.trace_execution {
        print_chunk(&chunk, path);
    }
    exit_with(Vm::with_config(vec![chunk], vm_config).interpret());
}

fn exit_with(result: InterpretResult) {
    match result {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => process::exit(EXIT_COMPILE),
        InterpretResult::RuntimeError | InterpretResult::InternalError => {
            process::exit(EXIT_RUNTIME)
        }
    }
}

fn repl(compiler_config: CompilerConfig, vm_config: VmConfig) {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("read error: {}", e);
                process::exit(EXIT_IO);
            }
            None => {
                println!();
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        clox::interpret_with_config(&line, compiler_config.clone(), vm_config.clone());
    }
}
