use clap::Parser;
use owo_colors::OwoColorize;
use parseflow::cli::{generate_completions, Args, Commands};
use parseflow::config::AppConfig;
use parseflow::interpreter::{self, Interpreter};
use parseflow::value::value_to_display;
use parseflow::{Node, Value};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn main() {
    let args = Args::parse();

    if let Some(Commands::Complete { shell }) = args.command {
        generate_completions(shell);
        return;
    }

    let config = AppConfig::from_args(&args);
    verbose_log(&config, "Starting parseflow");

    let mut interpreter = Interpreter::new();

    if let Some(script) = &args.script {
        let label = script.display().to_string();
        let text = match read_file(script) {
            Ok(text) => text,
            Err(e) => {
                error_message(&config, &e);
                std::process::exit(1);
            }
        };
        verbose_log(
            &config,
            &format!("Read {} bytes from {}", text.len(), label),
        );

        if let Err(rendered) = run_source(&mut interpreter, &label, &text, &args.emit_ast, &config)
        {
            eprint!("{}", rendered);
            std::process::exit(1);
        }
    } else if let Some(source) = &args.eval {
        verbose_log(&config, "Evaluating command-line source");
        match run_source(&mut interpreter, "<command>", source, &args.emit_ast, &config) {
            Ok(value) => print_result(&value),
            Err(rendered) => {
                eprint!("{}", rendered);
                std::process::exit(1);
            }
        }
    } else {
        run_repl(&mut interpreter, &args.emit_ast, &config);
    }
}

/// Parse, optionally dump the tree, then evaluate. Errors come back
/// already rendered for the terminal.
fn run_source(
    interpreter: &mut Interpreter,
    label: &str,
    text: &str,
    emit_ast: &Option<PathBuf>,
    config: &AppConfig,
) -> Result<Value, String> {
    let ast = interpreter::parse(label, text).map_err(|d| d.render(config.color_enabled))?;

    if let Some(path) = emit_ast {
        match write_ast_dump(&ast, path) {
            Ok(()) => println!("Intermediate code saved to '{}'.", path.display()),
            Err(e) => error_message(config, &format!("Error writing AST dump: {}", e)),
        }
    }

    interpreter
        .execute(&ast)
        .map_err(|d| d.render(config.color_enabled))
}

fn run_repl(interpreter: &mut Interpreter, emit_ast: &Option<PathBuf>, config: &AppConfig) {
    if config.verbose {
        verbose_log(config, "Entering interactive mode");
    } else {
        println!("parseflow {} (type 'exit' to quit)", env!("CARGO_PKG_VERSION"));
    }

    loop {
        print!("parseflow > ");
        io::stdout().flush().ok();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                error_message(config, &format!("Error reading input: {}", e));
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("exit") {
            break;
        }

        match run_source(interpreter, "<stdin>", &line, emit_ast, config) {
            Ok(value) => print_result(&value),
            Err(rendered) => eprint!("{}", rendered),
        }
    }
}

/// A program evaluates to the list of its statement values; a lone
/// statement prints as its own value.
fn print_result(value: &Value) {
    match value {
        Value::List(items) if items.borrow().len() == 1 => {
            println!("{}", value_to_display(&items.borrow()[0]));
        }
        other => println!("{}", value_to_display(other)),
    }
}

fn write_ast_dump(ast: &Node, path: &Path) -> io::Result<()> {
    use std::fs::OpenOptions;

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    interpreter::dump_ast(ast, &mut file)
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))
}

fn verbose_log(config: &AppConfig, message: &str) {
    if config.verbose {
        eprintln!("[parseflow:debug] {}", message);
    }
}

fn error_message(config: &AppConfig, message: &str) {
    if config.color_enabled {
        eprintln!("{}", message.red().bold());
    } else {
        eprintln!("{}", message);
    }
}
