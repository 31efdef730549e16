//! Mocha test log parsing
//!
//! `anchor test` runs the TypeScript suite through mocha, whose spec reporter
//! prints suite names indented by two spaces, one line per test case indented
//! by four, and `N passing (Tms)` / `N failing` totals. [`parse_test_log`]
//! scans that text once and rebuilds a [`TestReport`] from it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    // "  12 passing (340ms)"
    static ref PASSING_RE: Regex = Regex::new(r"([0-9]+) passing \(([0-9]+ms)\)")
        .expect("Failed to compile PASSING_RE regex");

    // "  3 failing"
    static ref FAILING_RE: Regex = Regex::new(r"([0-9]+) failing")
        .expect("Failed to compile FAILING_RE regex");

    // "  token_vault"
    static ref SUITE_RE: Regex = Regex::new(r"^[ \t]{2}([0-9A-Za-z_]+)$")
        .expect("Failed to compile SUITE_RE regex");

    // "    ✔ initializes (120ms)" or "    1) rejects bad input"
    static ref TEST_CASE_RE: Regex =
        Regex::new(r"^[ \t]{4}(✔|[0-9]+\))[ \t]+(.+?)(?:[ \t]+\(([0-9]+ms)\))?$")
            .expect("Failed to compile TEST_CASE_RE regex");
}

/// Aggregate counts reported by mocha at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Sum of every passing and failing count seen in the log
    pub total: u64,
    /// Count from the last `N passing` line
    pub passed: u64,
    /// Count from the last `N failing` line
    pub failed: u64,
    /// Run duration from the passing line, e.g. `"340ms"`
    pub duration: String,
}

/// A single test outcome line, together with the diagnostics printed under it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Enclosing suite, empty when no suite header preceded the test
    pub suite: String,
    pub name: String,
    pub passed: bool,
    /// Lines captured under a failing test, joined with `\n`
    pub error: String,
    /// Duration printed by mocha for slow tests, empty otherwise
    pub duration: String,
}

/// Structured view of one `anchor test` run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub summary: RunSummary,
    /// Test cases in the order they appear in the log
    pub tests: Vec<TestCase>,
    /// The log split on `\n`, untouched
    pub execution_logs: Vec<String>,
    /// Captured `anchor test` output: all of stdout followed by all of
    /// stderr, so lines from the two streams are not interleaved
    pub raw_output: String,
}

impl TestReport {
    /// Test cases marked as failed
    pub fn failures(&self) -> impl Iterator<Item = &TestCase> {
        self.tests.iter().filter(|test| !test.passed)
    }
}

/// Classification of a single log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLine<'a> {
    /// A `N passing (Tms)` and/or `N failing` line
    Summary {
        passing: Option<(u64, &'a str)>,
        failing: Option<u64>,
    },
    /// Two-space indented bare word
    SuiteHeader(&'a str),
    /// Four-space indented `✔` or `N)` line
    TestCase {
        passed: bool,
        name: &'a str,
        duration: Option<&'a str>,
    },
    /// Anything else
    Content(&'a str),
}

/// Classifies a line, checking summaries first, then suite headers, then test cases
pub fn classify(line: &str) -> LogLine<'_> {
    let passing = PASSING_RE.captures(line).map(|caps| {
        let duration = caps.get(2).map_or("", |m| m.as_str());
        (parse_count(&caps[1]), duration)
    });
    let failing = FAILING_RE.captures(line).map(|caps| parse_count(&caps[1]));

    if passing.is_some() || failing.is_some() {
        return LogLine::Summary { passing, failing };
    }

    if let Some(caps) = SUITE_RE.captures(line) {
        if let Some(name) = caps.get(1) {
            return LogLine::SuiteHeader(name.as_str());
        }
    }

    if let Some(caps) = TEST_CASE_RE.captures(line) {
        if let (Some(marker), Some(name)) = (caps.get(1), caps.get(2)) {
            return LogLine::TestCase {
                passed: marker.as_str() == "✔",
                name: name.as_str(),
                duration: caps.get(3).map(|m| m.as_str()),
            };
        }
    }

    LogLine::Content(line)
}

/// Parses the console output of `anchor test` into a [`TestReport`]
///
/// Never fails: text without any mocha markers yields an empty report that
/// still carries the raw lines.
pub fn parse_test_log(log: &str) -> TestReport {
    let lines: Vec<&str> = log.split('\n').collect();

    let mut builder = ReportBuilder::default();
    let mut previous = None;
    for &line in &lines {
        builder.feed(line, previous);
        previous = Some(line);
    }
    let (summary, tests) = builder.finish();

    TestReport {
        summary,
        tests,
        execution_logs: lines.into_iter().map(str::to_string).collect(),
        raw_output: log.to_string(),
    }
}

/// Scan state for one call to [`parse_test_log`]
#[derive(Default)]
struct ReportBuilder<'a> {
    summary: RunSummary,
    tests: Vec<TestCase>,
    current_suite: String,
    current_test: Option<TestCase>,
    error_lines: Vec<&'a str>,
    /// Only ever set while the current test is a failure
    collecting_error: bool,
}

impl<'a> ReportBuilder<'a> {
    fn feed(&mut self, line: &'a str, previous: Option<&str>) {
        match classify(line) {
            LogLine::Summary { passing, failing } => {
                if let Some((count, duration)) = passing {
                    self.summary.passed = count;
                    self.summary.duration = duration.to_string();
                    self.summary.total = self.summary.total.saturating_add(count);
                }
                if let Some(count) = failing {
                    self.summary.failed = count;
                    self.summary.total = self.summary.total.saturating_add(count);
                }
                self.collecting_error = false;
            }
            LogLine::SuiteHeader(name) => self.current_suite = name.to_string(),
            LogLine::TestCase {
                passed,
                name,
                duration,
            } => self.start_test(passed, name, duration),
            LogLine::Content(text) => self.collect(text, previous),
        }
    }

    fn start_test(&mut self, passed: bool, name: &str, duration: Option<&str>) {
        self.finalize_current();
        self.current_test = Some(TestCase {
            suite: self.current_suite.clone(),
            name: name.trim().to_string(),
            passed,
            error: String::new(),
            duration: duration.unwrap_or_default().to_string(),
        });
        self.collecting_error = !passed;
    }

    fn collect(&mut self, line: &'a str, previous: Option<&str>) {
        if !self.collecting_error || self.current_test.is_none() {
            return;
        }

        if line.trim().is_empty() {
            if previous.is_some_and(|p| p.trim().is_empty()) {
                self.collecting_error = false;
            }
            return;
        }

        self.error_lines.push(line);
    }

    fn finalize_current(&mut self) {
        if let Some(mut test) = self.current_test.take() {
            test.error = self.error_lines.join("\n");
            self.tests.push(test);
        }
        self.error_lines.clear();
    }

    fn finish(mut self) -> (RunSummary, Vec<TestCase>) {
        self.finalize_current();
        (self.summary, self.tests)
    }
}

fn parse_count(digits: &str) -> u64 {
    digits.parse().unwrap_or(0)
}
