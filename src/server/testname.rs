use std::fmt;

/// Tester used when a test name carries no usable suffix.
pub const DEFAULT_TESTER: &str = "TEST";

/// Tester a test name is addressed to: its last `-` separated segment.
pub fn tester_from_testname(testname: &str) -> String {
    testname
        .rsplit('-')
        .next()
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_TESTER)
        .to_string()
}

/// `B01`..`B09`, then `B10`, `B11`...
pub fn batch_label(batch: u32) -> String {
    numbered('B', batch)
}

/// `I01`..`I09`, then `I10`, `I11`...
pub fn iteration_label(iteration: u32) -> String {
    numbered('I', iteration)
}

fn numbered(prefix: char, n: u32) -> String {
    if (1..10).contains(&n) {
        format!("{prefix}0{n}")
    } else {
        format!("{prefix}{n}")
    }
}

/// Structured test name, rendered as
/// `VENDOR-CATEGORY-Bnn-Inn[-TYPE]-TESTER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestName {
    pub vendor: String,
    pub category: String,
    pub batch: u32,
    pub iteration: u32,
    pub test_type: Option<String>,
    pub tester: String,
}

impl TestName {
    pub fn compose(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.vendor,
            self.category,
            batch_label(self.batch),
            iteration_label(self.iteration)
        )?;
        if let Some(test_type) = self.test_type.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "-{test_type}")?;
        }
        write!(f, "-{}", self.tester)
    }
}
