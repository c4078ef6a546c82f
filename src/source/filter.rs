/// True iff `line` ends with any of `suffixes`, checked in order.
///
/// Matching is on exact bytes: no patterns, no case folding.
pub fn should_exclude<S: AsRef<str>>(line: &str, suffixes: &[S]) -> bool {
    suffixes.iter().any(|suffix| line.ends_with(suffix.as_ref()))
}

/// Suffix-based exclusion list for shipped lines.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    suffixes: Vec<String>,
}

impl LineFilter {
    pub fn new(suffixes: Vec<String>) -> Self {
        Self { suffixes }
    }

    pub fn excludes(&self, line: &str) -> bool {
        should_exclude(line, &self.suffixes)
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }
}
