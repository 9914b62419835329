use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blockwork::codec;
use serde::Deserialize;

use interpreter::{BlockFailure, standard_registry};

const SUFFIX: &str = ".test.json";

#[derive(Debug, Deserialize)]
pub struct ExpectedFailure {
    /// Substring that must appear in the failure message.
    pub contains: String,

    /// If set, the failing statement must have this id.
    #[serde(default)]
    pub block: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// The body is a dataflow graph rather than a block program.
    #[serde(default)]
    pub graph: bool,

    /// Expected exact output (trimmed comparison). Graph runs print one
    /// `node.port = value` line per output.
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected run error; its Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, the test expects loading to fail.
    #[serde(default)]
    pub expect_load_error: bool,

    /// Expected isolated failures. If present (even empty), their count and
    /// content are checked.
    #[serde(default)]
    pub expect_failures: Option<Vec<ExpectedFailure>>,
}

/// Split a fixture into its TOML frontmatter and JSON body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let body = &after_open[close_pos + 4..];

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, body))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.trim_end_matches(SUFFIX))
                .unwrap_or("?")
        })
    }
}

/// What a fixture run produced, whichever interpreter ran it.
struct Observed {
    output: String,
    error: Option<String>,
    failures: Vec<BlockFailure>,
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, outcome) = match std::fs::read_to_string(path) {
        Ok(content) => match parse_test_file(&content) {
            Ok((config, body)) => (config.description.clone(), evaluate(&config, body)),
            Err(e) => (None, Err(format!("frontmatter error: {}", e))),
        },
        Err(e) => (None, Err(format!("cannot read file: {}", e))),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match outcome {
            Ok(()) => TestOutcome::Pass,
            Err(reason) => TestOutcome::Fail(reason),
        },
    }
}

fn evaluate(config: &TestConfig, body: &str) -> Result<(), String> {
    let registry = standard_registry();
    let mut output = Vec::new();

    let observed = if config.graph {
        let graph = match (codec::decode_graph(body), config.expect_load_error) {
            (Ok(_), true) => return Err("expected load error, but loading succeeded".into()),
            (Err(_), true) => return Ok(()),
            (Err(e), false) => return Err(format!("unexpected load error: {}", e)),
            (Ok(graph), false) => graph,
        };
        match interpreter::run_graph(&graph, &registry) {
            Ok(outputs) => {
                crate::write_graph_outputs(&mut output, &outputs)
                    .map_err(|e| format!("cannot render outputs: {}", e))?;
                Observed {
                    output: String::from_utf8_lossy(&output).into_owned(),
                    error: None,
                    failures: Vec::new(),
                }
            }
            Err(e) => Observed {
                output: String::new(),
                error: Some(e.to_string()),
                failures: Vec::new(),
            },
        }
    } else {
        let program = match (codec::decode(body), config.expect_load_error) {
            (Ok(_), true) => return Err("expected load error, but loading succeeded".into()),
            (Err(_), true) => return Ok(()),
            (Err(e), false) => return Err(format!("unexpected load error: {}", e)),
            (Ok(program), false) => program,
        };
        let result = interpreter::execute_program(&program, &registry, &mut output);
        let (error, failures) = match result {
            Ok(report) => (None, report.failures),
            Err(e) => (Some(e.to_string()), Vec::new()),
        };
        Observed {
            output: String::from_utf8_lossy(&output).into_owned(),
            error,
            failures,
        }
    };

    check_outcome(config, &observed)?;
    if let Some(expected) = &config.expect_failures {
        check_failures(&observed.failures, expected)?;
    }
    Ok(())
}

fn check_outcome(config: &TestConfig, observed: &Observed) -> Result<(), String> {
    match (&config.expect_error, &observed.error) {
        (Some(expected), Some(actual)) if actual.contains(expected.as_str()) => {}
        (Some(expected), Some(actual)) => {
            return Err(format!(
                "expected error containing \"{}\", got: {}",
                expected, actual
            ));
        }
        (Some(expected), None) => {
            return Err(format!(
                "expected error containing \"{}\", but execution succeeded",
                expected
            ));
        }
        (None, Some(actual)) => return Err(format!("unexpected run error: {}", actual)),
        (None, None) => {}
    }

    if let Some(expected) = &config.expect_output {
        let actual = observed.output.trim();
        let expected = expected.trim();
        if actual != expected {
            return Err(format!(
                "output mismatch\n  expected: {}\n  actual:   {}",
                expected, actual
            ));
        }
    }
    Ok(())
}

fn check_failures(actual: &[BlockFailure], expected: &[ExpectedFailure]) -> Result<(), String> {
    if actual.len() != expected.len() {
        let listed: Vec<String> = actual.iter().map(|f| format!("  - {}", f)).collect();
        return Err(format!(
            "expected {} failure(s), got {}\n  actual failures:\n{}",
            expected.len(),
            actual.len(),
            if listed.is_empty() {
                "    (none)".to_string()
            } else {
                listed.join("\n")
            }
        ));
    }

    for (i, (failure, expected)) in actual.iter().zip(expected).enumerate() {
        let msg = failure.to_string();
        if !msg.contains(&expected.contains) {
            return Err(format!(
                "failure[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, msg
            ));
        }
        if let Some(block) = &expected.block {
            if failure.id.as_str() != block.as_str() {
                return Err(format!(
                    "failure[{}]: expected in block '{}', but it was in '{}'",
                    i, block, failure.id
                ));
            }
        }
    }
    Ok(())
}

/// Fixtures grouped by category (directory relative to `root`, "" for the
/// root itself), each group sorted.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(SUFFIX));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

struct Palette {
    no_color: bool,
}

impl Palette {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.no_color {
            s.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, s)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }
}

/// Run every fixture under `path` (or the single file `path`). A non-empty
/// `categories` restricts the run to those categories and their
/// sub-categories. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { no_color };

    let selected: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", SUFFIX, path.display());
            return 1;
        }
        select_categories(all, categories)
    };

    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();
    let single = path.is_file();

    for (category, files) in &selected {
        if !single {
            eprintln!();
            eprintln!("{}", palette.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", palette.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", palette.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            palette.paint("32", "ok"),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            palette.paint("31", "FAILED"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

fn select_categories(
    all: BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<String, Vec<PathBuf>> {
    if requested.is_empty() {
        return all;
    }
    let available: Vec<String> = all.keys().map(|k| category_label(k).to_string()).collect();
    let mut selected = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let prefix = format!("{}/", req);
        let matching: Vec<&String> = all
            .keys()
            .filter(|cat| cat.as_str() == req || cat.starts_with(&prefix))
            .collect();
        if matching.is_empty() {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                available.join(", ")
            );
        }
        for cat in matching {
            selected.insert(cat.clone(), all[cat].clone());
        }
    }
    selected
}
