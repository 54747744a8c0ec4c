mod error;
mod test_runner;

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use blockdoc::Template;
use blockdoc_render::{Mode, Style, highlight};

use crate::error::CliError;

const SUBCOMMANDS: &[&str] = &["doc", "test", "help"];

#[derive(Parser)]
#[command(
    name = "blockdoc",
    version,
    about = "Document the block structure of Django/Jinja templates"
)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log pipeline details to stderr (otherwise RUST_LOG, default warn)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Document the blocks declared by a template
    Doc(DocArgs),

    /// Run .test.html fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct DocArgs {
    /// Template source file
    file: String,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Regenerate an annotated template skeleton instead of the flat report
    #[arg(long)]
    skeleton: bool,

    /// Emit the skeleton as highlighted HTML using this style
    /// (default, monokai, solarized-light, solarized-dark)
    #[arg(long, requires = "skeleton")]
    style: Option<Style>,

    /// Parse only, don't render (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the parsed block tree
    #[arg(long)]
    ast: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.html file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `blockdoc page.html` is shorthand for `blockdoc doc page.html`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_pos = args.iter().skip(1).position(|a| !a.starts_with('-')).map(|i| i + 1);
    if let Some(pos) = first_pos {
        if !SUBCOMMANDS.contains(&args[pos].as_str()) {
            args.insert(pos, "doc".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_tracing(cli.verbose);

    match cli.command {
        Command::Doc(doc_args) => {
            if let Err(err) = do_doc(&doc_args, cli.no_color) {
                if !matches!(err, CliError::Parse(_)) {
                    eprintln!("error: {}", err);
                }
                process::exit(1);
            }
        }
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            let color = color_choice(cli.no_color, io::stderr().is_terminal());
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn color_choice(no_color: bool, is_terminal: bool) -> ColorChoice {
    if no_color || !is_terminal {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

fn do_doc(args: &DocArgs, no_color: bool) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&args.file).map_err(|source| CliError::Read {
        path: args.file.clone(),
        source,
    })?;

    // Set up codespan file database
    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), source.clone());

    let parser = blockdoc::parser::Parser::new(source, file_id);
    let template = match parser.parse() {
        Ok(t) => t,
        Err(error) => {
            let writer = StandardStream::stderr(color_choice(no_color, io::stderr().is_terminal()));
            let config = term::Config::default();
            let _ = term::emit_to_write_style(
                &mut writer.lock(),
                &config,
                &files,
                &error.to_diagnostic(),
            );
            return Err(CliError::Parse(error));
        }
    };

    tracing::debug!(
        file = args.file.as_str(),
        blocks = template.walk().count(),
        "parsed template"
    );

    // --check: parse succeeded, exit
    if args.check {
        eprintln!(
            "ok: {} parsed successfully ({} blocks)",
            args.file,
            template.walk().count()
        );
        return Ok(());
    }

    let mode = if args.skeleton { Mode::Skeleton } else { Mode::Dump };

    match &args.output {
        Some(path) => {
            let display = path.display().to_string();
            let mut file = File::create(path).map_err(CliError::write(display.clone()))?;
            file.write_all(render(&template, mode, args).as_bytes())
                .map_err(CliError::write(display))
        }
        None => {
            let is_terminal = io::stdout().is_terminal();
            // Plain skeletons on a terminal are colorized in place.
            if mode == Mode::Skeleton && args.style.is_none() && !args.ast && is_terminal && !no_color {
                let mut stdout = StandardStream::stdout(ColorChoice::Auto);
                let text = mode.render(&template);
                return highlight::write_colored(&text, Style::Default, &mut stdout)
                    .map_err(CliError::write("<stdout>"));
            }
            io::stdout()
                .lock()
                .write_all(render(&template, mode, args).as_bytes())
                .map_err(CliError::write("<stdout>"))
        }
    }
}

fn render(template: &Template, mode: Mode, args: &DocArgs) -> String {
    if args.ast {
        return format!("{:#?}\n", template.blocks);
    }
    let text = mode.render(template);
    match args.style {
        Some(style) => highlight::html(&text, style).to_fragment(),
        None => text,
    }
}
