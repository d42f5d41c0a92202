//! Validation report types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one named validation test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test identifier, e.g. `historical_event:2012_us_drought`.
    pub test_name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Supporting metric; `None` when it could not be computed.
    pub metric_value: Option<f64>,
    /// Threshold the metric was compared against.
    pub threshold: f64,
    /// Human-readable explanation.
    pub detail: String,
}

impl TestResult {
    /// A result with a computed metric.
    pub fn measured(
        test_name: impl Into<String>,
        passed: bool,
        metric_value: f64,
        threshold: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            passed,
            metric_value: Some(metric_value),
            threshold,
            detail: detail.into(),
        }
    }

    /// A failed result whose metric could not be computed.
    pub fn inconclusive(
        test_name: impl Into<String>,
        threshold: f64,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            passed: false,
            metric_value: None,
            threshold,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASS" } else { "FAIL" };
        let metric = self
            .metric_value
            .map_or_else(|| "n/a".to_string(), |m| format!("{m:.4}"));
        write!(
            f,
            "[{status}] {}: metric={metric} threshold={:.4} ({})",
            self.test_name, self.threshold, self.detail
        )
    }
}

/// Read-only set of test results for one scored dataset.
///
/// Failures are data, never errors: a report with failing tests is a normal
/// return value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Results in execution order.
    pub tests: Vec<TestResult>,
}

impl ValidationReport {
    /// Number of passing tests.
    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.passed).count()
    }

    /// Number of failing tests.
    pub fn failed(&self) -> usize {
        self.tests.len() - self.passed()
    }

    /// Whether every test passed (true for an empty report).
    pub fn all_passed(&self) -> bool {
        self.tests.iter().all(|t| t.passed)
    }

    /// Fraction of tests passing, `None` for an empty report.
    pub fn pass_rate(&self) -> Option<f64> {
        (!self.tests.is_empty()).then(|| self.passed() as f64 / self.tests.len() as f64)
    }

    /// Look up a result by name.
    pub fn get(&self, test_name: &str) -> Option<&TestResult> {
        self.tests.iter().find(|t| t.test_name == test_name)
    }

    /// Results whose name starts with `prefix`.
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a TestResult> + 'a {
        self.tests.iter().filter(move |t| t.test_name.starts_with(prefix))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Validation: {}/{} tests passed",
            self.passed(),
            self.tests.len()
        )?;
        for test in &self.tests {
            writeln!(f, "  {test}")?;
        }
        Ok(())
    }
}
