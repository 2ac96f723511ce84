use anyhow::{Context, Result};
use bpaf::Bpaf;
use releasecheck::analysis::Search;
use releasecheck::output::{render_json, render_report};
use releasecheck::{Analyzer, CancelToken, Config, SemanticModel};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version, fallback_to_usage)]
/// Disposal-ownership checker: verifies that every owned disposable
/// value is released exactly once on every path
enum Cmd {
    /// Check a semantic model for disposal violations
    #[bpaf(command)]
    Check {
        /// Limit release-method lookup to the declaring type and its
        /// immediate base
        #[bpaf(long)]
        top_level: bool,

        /// Treat explicitly interface-qualified release methods as
        /// discoverable
        #[bpaf(long)]
        include_explicit: bool,

        /// Callee signature that takes ownership of its arguments
        /// (repeatable)
        #[bpaf(long, argument("CALLEE"))]
        sink: Vec<String>,

        /// Emit the report as JSON
        #[bpaf(long)]
        json: bool,

        /// Input model file (JSON; reads from stdin if not provided)
        #[bpaf(positional("MODEL"))]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    use bpaf::Args;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cmd = match cmd().run_inner(Args::current_args()) {
        Ok(cmd) => cmd,
        Err(bpaf::ParseFailure::Stdout(msg, _)) => {
            print!("{}", msg);
            std::process::exit(0);
        }
        Err(bpaf::ParseFailure::Completion(c)) => {
            print!("{}", c);
            std::process::exit(0);
        }
        Err(bpaf::ParseFailure::Stderr(_)) => {
            // Show help on any parse error
            if let Err(bpaf::ParseFailure::Stdout(help, _)) =
                cmd().run_inner(Args::from(&["--help"]))
            {
                print!("{}", help);
            }
            std::process::exit(1);
        }
    };

    match cmd {
        Cmd::Check {
            top_level,
            include_explicit,
            sink,
            json,
            file,
        } => {
            let source = match &file {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("reading model from stdin")?;
                    buf
                }
            };
            let model: SemanticModel =
                serde_json::from_str(&source).context("parsing semantic model")?;

            let mut config = Config::default().with_explicit_contracts(include_explicit);
            if top_level {
                config = config.with_search(Search::TopLevel);
            }
            for callee in sink {
                config = config.with_ownership_sink(callee);
            }

            let analyzer = Analyzer::new(config);
            let violations = analyzer.analyze_all(&model, &CancelToken::new())?;

            if json {
                println!("{}", render_json(&violations)?);
            } else {
                print!("{}", render_report(&model, &violations));
            }

            if !violations.is_empty() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
