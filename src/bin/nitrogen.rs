use nitrogen::environment::Environment;
use nitrogen::evaluator::{Config, Evaluator};
use nitrogen::value::{Function, IntegerType, Value};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    init_logging();

    let result = panic::catch_unwind(run);
    match result {
        Ok(code) => process::exit(code),
        Err(panic_info) => {
            eprintln!("The interpreter encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }

            process::exit(1);
        }
    }
}

/// Log level comes from NITROGEN_LOG (`debug`, `nitrogen=trace`, ...);
/// warnings only by default
fn init_logging() {
    let filter = EnvFilter::try_from_env("NITROGEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn env_usize(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring invalid setting");
            None
        }
    }
}

fn config_from_env() -> Config {
    let mut config = Config::default();
    if let Some(max_pools) = env_usize("NITROGEN_MAX_POOLS") {
        config.pool.max_pools = max_pools;
    }
    if let Some(max_depth) = env_usize("NITROGEN_MAX_DEPTH") {
        config.max_eval_depth = max_depth;
    }
    config
}

fn exit_code(code: IntegerType) -> i32 {
    i32::try_from(code).unwrap_or(1)
}

fn run() -> i32 {
    let files: Vec<String> = std::env::args().skip(1).collect();
    if files.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        return 0;
    }

    let mut ev = Evaluator::with_config(config_from_env());
    if files.is_empty() {
        run_repl(&mut ev)
    } else {
        run_files(&mut ev, &files)
    }
}

fn print_usage() {
    println!("Usage: nitrogen [FILE]...");
    println!();
    println!("Evaluates each FILE in order, or starts an interactive prompt when none");
    println!("is given.");
    println!();
    println!("Environment variables:");
    println!("  NITROGEN_LOG        Log filter (e.g. debug, nitrogen=trace); default warn");
    println!("  NITROGEN_MAX_POOLS  Maximum number of memory pools");
    println!("  NITROGEN_MAX_DEPTH  Maximum evaluation depth");
}

/// Load every file in order. A failing file is reported and skipped.
fn run_files(ev: &mut Evaluator, files: &[String]) -> i32 {
    for path in files {
        match ev.load_file(path) {
            Ok(Value::Quit(code)) => return exit_code(code),
            Ok(_) => {}
            Err(e) if e.is_fatal() => {
                eprintln!("Fatal: {e}");
                return 1;
            }
            Err(e) => println!("{}", Value::error(e.to_string())),
        }
    }
    0
}

fn run_repl(ev: &mut Evaluator) -> i32 {
    println!("Nitrogen Version {}", env!("CARGO_PKG_VERSION"));
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize REPL: {e}");
            return 1;
        }
    };

    loop {
        match rl.readline("nitrogen> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(ev.environment());
                        continue;
                    }
                    ":stats" => {
                        print_stats(ev);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        return 0;
                    }
                    _ => {}
                }

                match ev.eval_str(line) {
                    Ok(Value::Quit(code)) => return exit_code(code),
                    Ok(value) if value.suppresses_newline() => {}
                    Ok(value) => println!("{value}"),
                    Err(e) if e.is_fatal() => {
                        eprintln!("Fatal: {e}");
                        return 1;
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                return 0;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                return 1;
            }
        }
    }
}

fn print_help() {
    println!("Nitrogen interactive prompt:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :stats     - Show memory pool statistics");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Language:");
    println!("  Numbers: 42, -5, 2.5      Strings: \"text\"      Comments: ; ...");
    println!("  S-expressions are evaluated: (+ 1 2)");
    println!("  Q-expressions are data: {{1 2 3}}");
    println!();
    println!("Examples:");
    println!("  (def {{x y}} 1 2)");
    println!("  (def {{add}} (\\ {{a b}} {{+ a b}}))");
    println!("  ((add 1) 2)");
    println!("  ((\\ {{first & rest}} {{rest}}) 1 2 3)");
    println!("  (if (> x 0) {{print \"positive\"}} {{print \"not positive\"}})");
    println!("  (load \"library.nitrogen\")");
    println!();
}

fn print_stats(ev: &Evaluator) {
    let stats = ev.pool_stats();
    let config = ev.config();
    println!(
        "Pools created:      {} (max {}, {} chunks each)",
        stats.pools_created, config.pool.max_pools, config.pool.chunks_per_pool
    );
    println!("Chunks in use:      {}", stats.chunks_allocated);
    println!("Chunks (lifetime):  {}", stats.chunks_allocated_lifetime);
    println!("High watermark:     {}", stats.high_watermark);
}

fn print_environment(env: &Environment) {
    let bindings = env.bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate built-in functions from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Function(Function::Builtin(_) | Function::Macro(_)) => builtins.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            let protected = if env.root().is_protected(&name) {
                " (protected)"
            } else {
                ""
            };
            println!("  {name} = {value}{protected}");
        }
    }
}
