use regex::Regex;

use podtail_types::LogRecord;

/// Compiled line filter for log records
#[derive(Clone)]
pub struct CompiledFilter {
    /// Regex pattern (if any)
    regex: Option<Regex>,

    /// Original pattern string
    pattern: String,

    /// Whether to invert match
    invert: bool,

    /// Case sensitivity
    case_insensitive: bool,
}

impl CompiledFilter {
    /// Create a new filter from a pattern string
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::build(pattern, false)
    }

    /// Create a case-insensitive filter
    pub fn new_case_insensitive(pattern: &str) -> Result<Self, regex::Error> {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = match (pattern.is_empty(), case_insensitive) {
            (true, _) => None,
            (false, false) => Some(Regex::new(pattern)?),
            // Prepend (?i) for case insensitive matching
            (false, true) => Some(Regex::new(&format!("(?i){}", pattern))?),
        };

        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            invert: false,
            case_insensitive,
        })
    }

    /// Invert the match
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Check if a record matches this filter
    pub fn matches(&self, record: &LogRecord) -> bool {
        let text_match = match &self.regex {
            Some(re) => re.is_match(&record.line),
            None => true,
        };

        if self.invert { !text_match } else { text_match }
    }

    /// Get the original pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Check if filter is empty (lets every record through)
    pub fn is_empty(&self) -> bool {
        self.regex.is_none() && !self.invert
    }

    /// Check if filter is case insensitive
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("pattern", &self.pattern)
            .field("invert", &self.invert)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}
