use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::eyre;
use datecalc::{
    format_tokens, format_tree, parse, tokenize, CalcError, Calculator, Code, DateStyle, Settings,
    Unit,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Cli {
    /// JSON settings file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// How dates are displayed; overrides the settings file
    #[clap(long, value_enum, global = true)]
    date_style: Option<DateStyle>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate an expression
    Eval {
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        expr: Vec<String>,
        /// Print tokens, tree and result as JSON
        #[clap(long)]
        json: bool,
    },
    /// Print the tokens of an expression
    Tokens {
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        expr: Vec<String>,
    },
    /// Print the syntax tree of an expression
    Tree {
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        expr: Vec<String>,
    },
    /// Evaluate every non-empty line of a file
    Batch { file: PathBuf },
    /// List unit names and the abbreviations they accept
    Units,
    /// Run the REPL
    Repl {
        /// History file; defaults to ~/.datecalc_history
        #[clap(long)]
        history: Option<PathBuf>,
    },
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path).map_err(|e| eyre!("{e:#}"))?,
        None => Settings::default(),
    };
    if let Some(style) = cli.date_style {
        settings.date_style = style;
    }
    info!(?settings, "loaded settings");

    let calc = Calculator::new().with_style(settings.date_style);
    let command = cli.command.unwrap_or(Commands::Repl { history: None });

    match command {
        Commands::Eval { expr, json } => {
            let input = expr.join(" ");
            match calc.calculate(&input) {
                Ok(calculation) if json => {
                    println!("{}", serde_json::to_string_pretty(&calculation)?)
                }
                Ok(calculation) => println!("{}", calculation.output),
                Err(e) => fail(&input, &e),
            }
        }
        Commands::Tokens { expr } => {
            let input = expr.join(" ");
            match tokenize(&input) {
                Ok(tokens) => println!("{}", format_tokens(&tokens)),
                Err(e) => fail(&input, &e.into()),
            }
        }
        Commands::Tree { expr } => {
            let input = expr.join(" ");
            match tokenize(&input).map_err(CalcError::from).and_then(|tokens| {
                parse(&tokens).map_err(CalcError::from)
            }) {
                Ok(tree) => println!("{}", format_tree(&tree)),
                Err(e) => fail(&input, &e),
            }
        }
        Commands::Batch { file } => batch(&calc, file)?,
        Commands::Units => print_units(),
        Commands::Repl { history } => {
            if history.is_some() {
                settings.history_file = history;
            }
            repl(&calc, &mut settings)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let directive = match verbose {
        0 => "datecalc=warn",
        1 => "datecalc=debug",
        _ => "datecalc=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// The error message, plus the input with a caret under the offending part.
fn diagnostic(input: &str, err: &CalcError) -> String {
    match err.span() {
        Some(span) => format!("error: {err}\n{}", Code::from_snippet(input).caret(&span)),
        None => format!("error: {err}"),
    }
}

fn fail(input: &str, err: &CalcError) -> ! {
    eprintln!("{}", diagnostic(input, err));
    std::process::exit(1);
}

fn batch(calc: &Calculator, file: PathBuf) -> color_eyre::Result<()> {
    let code = Code::from_file(&file)?;
    let mut failed = 0;
    let mut total = 0;

    for (line_no, line) in code.lines() {
        total += 1;
        match calc.calculate(line) {
            Ok(calculation) => println!("{line} = {}", calculation.output),
            Err(e) => {
                failed += 1;
                warn!(line = line_no, error = %e, "expression failed");
                eprintln!("{}: {}", code.location(line_no), diagnostic(line, &e));
            }
        }
    }

    if failed > 0 {
        return Err(eyre!("{failed} of {total} expressions failed"));
    }
    Ok(())
}

fn print_units() {
    for unit in Unit::ALL {
        let aliases: Vec<&str> = Unit::aliases()
            .filter(|(_, u)| *u == unit)
            .map(|(alias, _)| alias)
            .collect();
        println!("{:<12} {}", unit.name(), aliases.join(", "));
    }
}

const HELP: &str = "\
Enter an expression, for example:
  today + 30 days
  12/25/2020 - 12/25/2021
  1 week as hours
Commands:
  :tokens   toggle the token listing
  :tree     toggle the syntax tree
  :units    list units and abbreviations
  :help     show this message
  exit      leave (also :quit, Ctrl-D)";

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Runs one REPL line, showing whichever debug views are enabled for the
/// stages that succeeded.
fn run_line(calc: &Calculator, settings: &Settings, line: &str) {
    let tokens = match tokenize(line) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("{}", diagnostic(line, &e.into()));
            return;
        }
    };
    if settings.show_tokens {
        println!("{}", format_tokens(&tokens));
    }

    let tree = match parse(&tokens) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("{}", diagnostic(line, &e.into()));
            return;
        }
    };
    if settings.show_tree {
        println!("{}", format_tree(&tree));
    }

    match calc.eval(&tree) {
        Ok(value) => println!("{}", value.render(calc.style())),
        Err(e) => eprintln!("{}", diagnostic(line, &e.into())),
    }
}

fn repl(calc: &Calculator, settings: &mut Settings) -> color_eyre::Result<()> {
    let history = settings.history_path();
    let mut rl = DefaultEditor::new()?;
    if rl.load_history(&history).is_err() {
        info!(path = %history.display(), "no history loaded");
    }

    println!("datecalc {} (type :help for commands)", env!("CARGO_PKG_VERSION"));
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    "exit" | ":exit" | ":quit" | ":q" => break,
                    ":help" | ":h" => println!("{HELP}"),
                    ":units" => print_units(),
                    ":tokens" => {
                        settings.show_tokens = !settings.show_tokens;
                        println!("tokens {}", on_off(settings.show_tokens));
                    }
                    ":tree" => {
                        settings.show_tree = !settings.show_tree;
                        println!("tree {}", on_off(settings.show_tree));
                    }
                    _ => run_line(calc, settings, line),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Err(e) = rl.save_history(&history) {
        warn!(path = %history.display(), error = %e, "failed to save history");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_examples_evaluate() {
        let anchor = chrono::NaiveDate::from_ymd_opt(2021, 12, 20)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let calc = Calculator::anchored(anchor);
        let examples: Vec<&str> = HELP
            .lines()
            .skip(1)
            .take_while(|line| !line.starts_with("Commands"))
            .map(str::trim)
            .collect();

        assert_eq!(
            examples,
            vec!["today + 30 days", "12/25/2020 - 12/25/2021", "1 week as hours"]
        );
        for example in examples {
            assert!(calc.calculate(example).is_ok(), "{example}");
        }
    }
}
