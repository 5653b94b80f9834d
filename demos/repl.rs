use polaris::ast::Value;
use polaris::environment::Environment;
use polaris::interpreter::{Config, Interpreter};
use polaris::{Error, Severity};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use std::{fs, panic, process};

/// Usage: `repl [-I DIR]... [SCRIPT]...`
///
/// With scripts the files are run in order and the first error stops the run.
/// Without scripts an interactive session starts.
fn main() {
    init_tracing();

    let mut config = Config::default();
    let mut scripts = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-I" => match args.next() {
                Some(dir) => config = config.with_include_dir(dir),
                None => {
                    eprintln!("-I needs a directory");
                    process::exit(2);
                }
            },
            _ => scripts.push(PathBuf::from(arg)),
        }
    }

    let result = panic::catch_unwind(move || {
        if scripts.is_empty() {
            run_repl(config)
        } else {
            run_scripts(config, &scripts)
        }
    });

    match result {
        Ok(code) => process::exit(code),
        Err(panic_info) => {
            eprintln!("The interpreter encountered an unexpected error and must exit.");
            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            }
            process::exit(1);
        }
    }
}

/// Log output is only wanted when RUST_LOG asks for it
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn report(severity: Severity, message: &str) {
    eprintln!("[{severity}] {message}");
}

fn run_scripts(config: Config, scripts: &[PathBuf]) -> i32 {
    let mut interp = Interpreter::with_config(config);
    interp.set_error_callback(Box::new(report));

    for script in scripts {
        let source = match fs::read_to_string(script) {
            Ok(source) => source,
            Err(e) => {
                report(Severity::Failure, &format!("Unable to read {}: {e}", script.display()));
                return 1;
            }
        };
        for line in source.lines() {
            match interp.feed(line, false) {
                Ok(_) => {}
                Err(Error::Exit(code)) => return code,
                Err(_) => return 1,
            }
        }
        if !interp.is_idle() {
            report(
                Severity::Fatal,
                &format!("{} ends inside an unfinished statement", script.display()),
            );
            return 1;
        }
    }
    0
}

fn run_repl(config: Config) -> i32 {
    println!("Polaris Lisp");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut interp = Interpreter::with_config(config);
    interp.set_error_callback(Box::new(report));

    let mut prompt = "polaris> ";
    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }

                if interp.is_idle() {
                    match line.trim() {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(interp.environment());
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            return 0;
                        }
                        _ => {}
                    }
                }

                prompt = match interp.feed(&line, true) {
                    Ok(true) => "polaris> ",
                    Ok(false) => "    ...> ",
                    Err(Error::Exit(code)) => return code,
                    // Already reported; the session goes on
                    Err(_) => "polaris> ",
                };
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C abandons the statement being typed
                interp.reset();
                prompt = "polaris> ";
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                return 0;
            }
            Err(err) => {
                println!("Error: {err:?}");
                return 1;
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  Ctrl+C     - Discard the statement being typed");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Special forms: quote if set! define lambda begin");
    println!("Procedures:    + - * / > < <= >= eq neq car cdr cons append list");
    println!("               length null? print ref import exit");
    println!();
    println!("Examples:");
    println!("  (define twice (lambda (x) (* 2 x)))");
    println!("  (twice 5)");
    println!("  (import \"lib.pol\")");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.bindings();

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();
    for (name, value) in bindings {
        match value {
            Value::NativeProcedure(_) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Procedures ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<10}");
            col += 1;
            if col % 6 == 0 {
                println!();
            }
        }
        if col % 6 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("Values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
