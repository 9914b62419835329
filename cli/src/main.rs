mod test_runner;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use blockwork::codec::{self, LoadError};
use blockwork::{Graph, Program};
use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use interpreter::{BlockFailure, BlockRegistry, GraphOutputs, RunError, standard_registry};

const SUBCOMMANDS: &[&str] = &["run", "kinds", "test", "help"];

#[derive(Parser)]
#[command(name = "blockwork", version, about = "Block program interpreter")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log interpreter activity to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a block program or dataflow graph
    Run(RunArgs),

    /// List the block kinds of the standard registry
    Kinds,

    /// Run .test.json fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// JSON file holding the program (or graph with --graph)
    file: String,

    /// Treat the file as a dataflow graph
    #[arg(short, long)]
    graph: bool,

    /// Load and validate only, don't execute (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the loaded program
    #[arg(long)]
    dump: bool,

    /// List the blocks of the program, nested by slot
    #[arg(long)]
    list_blocks: bool,

    /// Suppress runtime output (just check for errors)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.json file or directory containing them
    path: String,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `blockwork file.json` is shorthand for `blockwork run file.json`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_pos = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !a.starts_with('-'))
        .map(|(pos, a)| (pos, a.clone()));
    if let Some((pos, first)) = first_pos {
        if !SUBCOMMANDS.contains(&first.as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color),
        Command::Kinds => list_kinds(&standard_registry()),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

enum Loaded {
    Program(Program),
    Graph(Graph),
}

struct Reporter {
    writer: StandardStream,
    config: term::Config,
    files: SimpleFiles<String, String>,
    file_id: usize,
}

impl Reporter {
    fn new(name: &str, source: &str, no_color: bool) -> Self {
        let color_choice = if no_color {
            ColorChoice::Never
        } else {
            ColorChoice::Auto
        };
        let mut files = SimpleFiles::new();
        let file_id = files.add(name.to_string(), source.to_string());
        Reporter {
            writer: StandardStream::stderr(color_choice),
            config: term::Config::default(),
            files,
            file_id,
        }
    }

    fn emit(&self, diagnostic: &Diagnostic<usize>) {
        let _ = term::emit_to_write_style(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            diagnostic,
        );
    }

    fn source(&self) -> &str {
        self.files
            .get(self.file_id)
            .map(|f| f.source().as_str())
            .unwrap_or_default()
    }

    fn load_error(&self, error: &LoadError) {
        for diagnostic in error.to_diagnostics(self.file_id, self.source()) {
            self.emit(&diagnostic);
        }
    }

    /// An isolated statement failure, labelled at the block it started in.
    fn failure(&self, failure: &BlockFailure) {
        let diagnostic = Diagnostic::new(Severity::Warning).with_message(failure.to_string());
        let diagnostic = match codec::locate_key(self.source(), failure.origin().as_str()) {
            Some(span) => diagnostic.with_labels(vec![
                Label::primary(self.file_id, span).with_message("failed here"),
            ]),
            None => diagnostic,
        };
        self.emit(&diagnostic);
    }

    fn run_error(&self, error: &RunError, graph: bool) {
        if let RunError::MalformedProgram(violations) = error {
            self.load_error(&LoadError::MalformedProgram(violations.clone()));
            return;
        }
        if let RunError::MalformedGraph(violations) = error {
            self.load_error(&LoadError::MalformedGraph(violations.clone()));
            return;
        }
        let diagnostic = Diagnostic::new(Severity::Error).with_message(error.to_string());
        let span = error.element_id().and_then(|id| {
            if graph {
                codec::locate_value(self.source(), id)
            } else {
                codec::locate_key(self.source(), id)
            }
        });
        let diagnostic = match span {
            Some(span) => diagnostic.with_labels(vec![Label::primary(self.file_id, span)]),
            None => diagnostic,
        };
        self.emit(&diagnostic);
    }
}

fn do_run(args: RunArgs, no_color: bool) {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };
    let reporter = Reporter::new(&args.file, &source, no_color);

    let loaded = if args.graph {
        codec::decode_graph(&source).map(Loaded::Graph)
    } else {
        codec::decode(&source).map(Loaded::Program)
    };
    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(error) => {
            reporter.load_error(&error);
            process::exit(1);
        }
    };

    let registry = standard_registry();

    if args.check {
        if let Loaded::Program(program) = &loaded {
            if let Err(violations) = program.validate_with(&registry) {
                reporter.load_error(&LoadError::MalformedProgram(violations));
                process::exit(1);
            }
        }
        eprintln!("ok: {} is valid", args.file);
        return;
    }

    if args.dump {
        match &loaded {
            Loaded::Program(program) => println!("{:#?}", program),
            Loaded::Graph(graph) => println!("{:#?}", graph),
        }
        return;
    }

    if args.list_blocks {
        match &loaded {
            Loaded::Program(program) => print_blocks(program),
            Loaded::Graph(graph) => {
                for node in &graph.nodes {
                    println!("{} {}", node.id, node.kind);
                }
            }
        }
        return;
    }

    let mut stdout = io::stdout();
    let mut sink = io::sink();
    let output: &mut dyn Write = if args.quiet { &mut sink } else { &mut stdout };

    match &loaded {
        Loaded::Program(program) => {
            match interpreter::execute_program(program, &registry, output) {
                Ok(report) => {
                    for failure in &report.failures {
                        reporter.failure(failure);
                    }
                }
                Err(error) => {
                    reporter.run_error(&error, false);
                    process::exit(1);
                }
            }
        }
        Loaded::Graph(graph) => match interpreter::run_graph(graph, &registry) {
            Ok(outputs) => {
                if let Err(e) = write_graph_outputs(output, &outputs) {
                    eprintln!("error: cannot write output: {}", e);
                    process::exit(1);
                }
            }
            Err(error) => {
                reporter.run_error(&error, true);
                process::exit(1);
            }
        },
    }
}

/// One `node.port = value` line per output, in node-id order.
pub(crate) fn write_graph_outputs(out: &mut dyn Write, outputs: &GraphOutputs) -> io::Result<()> {
    for (node, record) in outputs {
        for (port, value) in record {
            writeln!(out, "{}.{} = {}", node, port, value)?;
        }
    }
    Ok(())
}

fn print_blocks(program: &Program) {
    fn print_chain(program: &Program, start: Option<&blockwork::BlockId>, indent: usize) {
        for block in program.chain(start) {
            let pad = "  ".repeat(indent);
            println!("{}{} {} ({})", pad, block.id, block.kind, block.form);
            for (slot, head) in &block.slot_heads {
                println!("{}  {}:", pad, slot);
                print_chain(program, head.as_ref(), indent + 2);
            }
        }
    }

    for head in &program.heads {
        print_chain(program, Some(head), 0);
    }

    let sequenced = program.sequenced();
    let values: Vec<_> = program
        .nodes
        .values()
        .filter(|b| !sequenced.contains(&b.id))
        .collect();
    if !values.is_empty() {
        println!("(values)");
        for block in values {
            println!("  {} {} ({})", block.id, block.kind, block.form);
        }
    }
}

fn list_kinds(registry: &BlockRegistry) {
    for kind in registry.kinds() {
        let Some(spec) = registry.get(kind) else {
            continue;
        };
        let mut shape = Vec::new();
        if !spec.inputs.is_empty() {
            shape.push(format!("inputs: {}", spec.inputs.join(", ")));
        }
        if !spec.slots.is_empty() {
            shape.push(format!("slots: {}", spec.slots.join(", ")));
        }
        println!("{:<14} {:<10} {}", kind, spec.form.name(), spec.description);
        if !shape.is_empty() {
            println!("{:<25} {}", "", shape.join("; "));
        }
    }
}
