use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use codespan_reporting::term::termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use serde::Deserialize;

use blockdoc::Template;
use blockdoc_render::Mode;

const FIXTURE_SUFFIX: &str = ".test.html";

#[derive(Debug, Default, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Rendering compared against `expect_output`: "dump" (default) or "skeleton".
    #[serde(default)]
    pub mode: Option<String>,

    /// Expected rendered output (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// If true, the test expects parsing to fail.
    #[serde(default)]
    pub expect_parse_error: bool,

    /// Expected parse error — the error message must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Every block as a dotted path, parents before children.
    #[serde(default)]
    pub expect_blocks: Option<Vec<String>>,
}

/// Split a fixture file into its TOML config and template source.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

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
    let rest = &after_open[close_pos + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
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
                .map(|s| s.trim_end_matches(FIXTURE_SUFFIX))
                .unwrap_or("?")
        })
    }
}

/// Dotted paths of every block, parents before children.
fn block_paths(template: &Template) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut prefix: Vec<&str> = Vec::new();
    for (depth, block) in template.walk() {
        // walk() depths are relative to each top-level block
        prefix.truncate(depth);
        prefix.push(&block.name);
        paths.push(prefix.join("."));
    }
    paths
}

fn check_source(config: &TestConfig, source: &str) -> Result<(), String> {
    let mode = match config.mode.as_deref() {
        Some(mode) => mode.parse::<Mode>()?,
        None => Mode::default(),
    };

    let expects_error = config.expect_parse_error || config.expect_error.is_some();
    let template = match (blockdoc::parser::parse(source), expects_error) {
        (Err(err), true) => {
            return match &config.expect_error {
                Some(expected) if !err.message.contains(expected.as_str()) => Err(format!(
                    "expected parse error containing \"{}\", got: {}",
                    expected, err.message
                )),
                _ => Ok(()),
            };
        }
        (Err(err), false) => return Err(format!("unexpected parse error: {}", err)),
        (Ok(_), true) => return Err("expected parse error, but parsing succeeded".into()),
        (Ok(template), false) => template,
    };

    if let Some(expected) = &config.expect_blocks {
        let actual = block_paths(&template);
        if &actual != expected {
            return Err(format!(
                "block mismatch\n  expected: {}\n  actual:   {}",
                expected.join(", "),
                actual.join(", ")
            ));
        }
    }

    if let Some(expected) = &config.expect_output {
        let actual = mode.render(&template);
        if actual.trim() != expected.trim() {
            return Err(format!(
                "{} output mismatch\n--- expected\n{}\n--- actual\n{}",
                mode,
                expected.trim(),
                actual.trim()
            ));
        }
    }

    Ok(())
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();
    match check_source(&config, source) {
        Ok(()) => TestResult {
            path: path.to_path_buf(),
            description,
            outcome: TestOutcome::Pass,
        },
        Err(reason) => fail(description, reason),
    }
}

/// Discover fixture files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
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
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(FIXTURE_SUFFIX))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

/// Colored status output on stderr.
struct Report {
    out: StandardStream,
}

impl Report {
    fn new(color: ColorChoice) -> Self {
        Report {
            out: StandardStream::stderr(color),
        }
    }

    fn styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.out.set_color(&spec);
        let _ = write!(self.out, "{}", text);
        let _ = self.out.reset();
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }

    fn result(&mut self, result: &TestResult) {
        let (label, color) = match result.outcome {
            TestOutcome::Pass => ("PASS", Color::Green),
            TestOutcome::Fail(_) => ("FAIL", Color::Red),
        };
        let _ = write!(self.out, "  ");
        self.styled(label, Some(color), false);
        self.line(&format!("  {}", result.label()));
    }

    fn failures(&mut self, failures: &[TestResult]) {
        if failures.is_empty() {
            return;
        }
        self.line("");
        self.line("failures:");
        for f in failures {
            self.line("");
            self.line(&format!("  --- {} ---", f.path.display()));
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    self.line(&format!("  {}", line));
                }
            }
        }
    }

    fn summary(&mut self, passed: usize, failed: usize) {
        self.line("");
        let _ = write!(self.out, "test result: ");
        if failed == 0 {
            self.styled("ok", Some(Color::Green), false);
            self.line(&format!(". {} passed, 0 failed", passed));
        } else {
            self.styled("FAILED", Some(Color::Red), false);
            self.line(&format!(
                ". {} passed, {} failed (of {})",
                passed,
                failed,
                passed + failed
            ));
        }
    }
}

/// Keep the categories matching `requested` (a category or any of its subfolders).
/// Also returns the requests that matched nothing.
fn filter_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> (BTreeMap<&'a str, &'a Vec<PathBuf>>, Vec<String>) {
    if requested.is_empty() {
        return (all.iter().map(|(k, v)| (k.as_str(), v)).collect(), Vec::new());
    }

    let mut filtered = BTreeMap::new();
    let mut missing = Vec::new();
    for req in requested {
        let req = req.trim_matches('/');
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                filtered.insert(cat.as_str(), files);
                found = true;
            }
        }
        if !found {
            missing.push(req.to_string());
        }
    }
    (filtered, missing)
}

/// Run all fixture files under `path` (or a single file).
/// If `categories` is non-empty, only run tests in those categories.
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, color: ColorChoice, categories: &[String]) -> i32 {
    let mut report = Report::new(color);

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        // Single file mode — ignore categories
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", FIXTURE_SUFFIX, path.display());
            return 1;
        }
        let (selected, missing) = filter_categories(&all, categories);
        if !missing.is_empty() {
            let available: Vec<&str> = all
                .keys()
                .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                .collect();
            for req in &missing {
                eprintln!(
                    "warning: category '{}' not found (available: {})",
                    req,
                    available.join(", ")
                );
            }
        }
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(cat, files)| (cat.to_string(), files.clone()))
            .collect()
    };

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &groups {
        if !path.is_file() {
            report.line("");
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            report.styled(header, None, true);
            report.line("");
        }

        for file in files {
            let result = run_single_test(file);
            report.result(&result);
            match result.outcome {
                TestOutcome::Pass => passed += 1,
                TestOutcome::Fail(_) => failures.push(result),
            }
        }
    }

    report.failures(&failures);
    report.summary(passed, failures.len());

    if failures.is_empty() { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[test]
    fn frontmatter_split() {
        let (config, source) =
            parse_test_file("---\ndescription = \"x\"\nmode = \"skeleton\"\n---\n{% block a %}{% endblock %}\n")
                .unwrap();
        assert_eq!(config.description.as_deref(), Some("x"));
        assert_eq!(config.mode.as_deref(), Some("skeleton"));
        assert_eq!(source, "{% block a %}{% endblock %}\n");
    }

    #[test]
    fn frontmatter_required() {
        assert!(parse_test_file("{% block a %}{% endblock %}").is_err());
        assert!(parse_test_file("---\ndescription = \"x\"\n").is_err());
    }

    #[test]
    fn block_paths_are_preorder() {
        let template = blockdoc::parser::parse(
            "{% block a %}{% block b %}{% block c %}{% endblock %}{% endblock %}{% block d %}{% endblock %}{% endblock %}{% block e %}{% endblock %}",
        )
        .unwrap();
        assert_eq!(block_paths(&template), vec!["a", "a.b", "a.b.c", "a.d", "e"]);
    }

    #[test]
    fn check_reports_mismatches() {
        let config = TestConfig {
            expect_blocks: Some(vec!["a".into(), "b".into()]),
            ..TestConfig::default()
        };
        let err = check_source(&config, "{% block a %}{% endblock %}").unwrap_err();
        assert!(err.contains("block mismatch"));

        let config = TestConfig {
            expect_error: Some("unclosed".into()),
            ..TestConfig::default()
        };
        assert!(check_source(&config, "{% block a %}").is_ok());
        assert!(check_source(&config, "{% block a %}{% endblock %}").is_err());
    }

    #[test]
    fn bundled_fixtures_pass() {
        let categories = discover_categorized(&fixtures());
        assert!(!categories.is_empty());
        for file in categories.values().flatten() {
            let result = run_single_test(file);
            if let TestOutcome::Fail(reason) = &result.outcome {
                panic!("{} failed:\n{}", file.display(), reason);
            }
        }
    }

    #[test]
    fn category_filter() {
        let categories = discover_categorized(&fixtures());
        let (picked, missing) = filter_categories(&categories, &["errors".to_string()]);
        assert_eq!(picked.keys().copied().collect::<Vec<_>>(), vec!["errors"]);
        assert!(missing.is_empty());
    }

    #[test]
    fn repeated_category_is_not_reported_missing() {
        let categories = discover_categorized(&fixtures());
        let requested = ["errors".to_string(), "errors/".to_string(), "nowhere".to_string()];
        let (picked, missing) = filter_categories(&categories, &requested);
        assert_eq!(picked.keys().copied().collect::<Vec<_>>(), vec!["errors"]);
        assert_eq!(missing, vec!["nowhere".to_string()]);
    }

    #[test]
    fn failing_fixture_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.test.html"),
            "---\nexpect_blocks = [\"nope\"]\n---\n{% block a %}{% endblock %}\n",
        )
        .unwrap();
        assert_eq!(run_tests(dir.path(), ColorChoice::Never, &[]), 1);

        std::fs::write(
            dir.path().join("bad.test.html"),
            "---\nexpect_blocks = [\"a\"]\n---\n{% block a %}{% endblock %}\n",
        )
        .unwrap();
        assert_eq!(run_tests(dir.path(), ColorChoice::Never, &[]), 0);
    }
}
