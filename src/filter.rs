// Status and free-text filtering for task queries

use crate::task::{Task, TaskStatus};
use eyre::Result;
use std::str::FromStr;

/// Default tolerance for fuzzy search: up to 30% of the pattern may differ
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.3;

/// Which statuses a query keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl From<TaskStatus> for StatusFilter {
    fn from(status: TaskStatus) -> Self {
        StatusFilter::Only(status)
    }
}

impl FromStr for StatusFilter {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "all" => Ok(StatusFilter::All),
            other => Ok(StatusFilter::Only(other.parse()?)),
        }
    }
}

/// How the search string is compared against title and description
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchMode {
    /// Case-insensitive substring
    Substring,
    /// Case-insensitive approximate substring, see [`fuzzy_score`]
    Fuzzy { threshold: f64 },
}

impl SearchMode {
    /// Fuzzy mode with the threshold clamped to `[0.0, 1.0]`
    pub fn fuzzy(threshold: f64) -> Self {
        let threshold = if threshold.is_nan() { DEFAULT_FUZZY_THRESHOLD } else { threshold.clamp(0.0, 1.0) };
        SearchMode::Fuzzy { threshold }
    }

    // Variants built by hand skip the clamp in `fuzzy`
    fn normalized(self) -> Self {
        match self {
            SearchMode::Fuzzy { threshold } => SearchMode::fuzzy(threshold),
            SearchMode::Substring => SearchMode::Substring,
        }
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Fuzzy {
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// Query parameters: status selector plus free-text search
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub search: String,
    pub mode: SearchMode,
}

impl TaskFilter {
    /// Matches every task
    pub fn all() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: impl Into<StatusFilter>) -> Self {
        self.status = status.into();
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Prepare the filter for repeated matching
    pub fn matcher(&self) -> TaskMatcher {
        let pattern = self.search.trim().to_lowercase();
        let pattern = if pattern.is_empty() {
            None
        } else {
            let chars = pattern.chars().collect();
            Some((pattern, chars))
        };

        TaskMatcher {
            status: self.status,
            mode: self.mode.normalized(),
            pattern,
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.matcher().matches(task)
    }
}

/// A `TaskFilter` with its search pattern normalized once
#[derive(Debug, Clone)]
pub struct TaskMatcher {
    status: StatusFilter,
    mode: SearchMode,
    pattern: Option<(String, Vec<char>)>,
}

impl TaskMatcher {
    pub fn matches(&self, task: &Task) -> bool {
        if !self.status.matches(task.status) {
            return false;
        }

        let Some((pattern, chars)) = &self.pattern else {
            return true;
        };

        let field_matches = |text: &str| match self.mode {
            SearchMode::Substring => text.to_lowercase().contains(pattern.as_str()),
            SearchMode::Fuzzy { threshold } => score(chars, text) <= threshold,
        };

        field_matches(&task.title) || task.description.as_deref().is_some_and(field_matches)
    }
}

/// Fuzzy score of `pattern` against `text`, from 0.0 (exact substring) to 1.0
///
/// The score is the fewest single-character edits turning `pattern` into some
/// substring of `text`, divided by the pattern length. Comparison ignores case.
/// Returns `None` for an empty pattern.
pub fn fuzzy_score(pattern: &str, text: &str) -> Option<f64> {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    if pattern.is_empty() {
        return None;
    }
    Some(score(&pattern, text))
}

// `pattern` is already lowercase and non-empty
fn score(pattern: &[char], text: &str) -> f64 {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    approximate_substring_distance(pattern, &text) as f64 / pattern.len() as f64
}

// Sellers' algorithm: edit distance where skipping text before and after the
// match is free. `column[i]` is the cost of matching pattern[..i] ending at the
// current text position.
fn approximate_substring_distance(pattern: &[char], text: &[char]) -> usize {
    let m = pattern.len();
    let mut column: Vec<usize> = (0..=m).collect();
    let mut best = column[m];

    for &tc in text {
        let mut diagonal = column[0];
        column[0] = 0;
        for i in 1..=m {
            let substitution = diagonal + usize::from(pattern[i - 1] != tc);
            diagonal = column[i];
            column[i] = substitution.min(column[i] + 1).min(column[i - 1] + 1);
        }
        best = best.min(column[m]);
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, description: Option<&str>, status: TaskStatus) -> Task {
        Task {
            id: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            description: description.map(str::to_string),
            due_date: None,
            status,
            created_at: 1000,
            updated_at: 1000,
            order: 0,
        }
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "in_progress".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(TaskStatus::InProgress)
        );
        assert!("review".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_status_filter_matches() {
        assert!(StatusFilter::All.matches(TaskStatus::Completed));
        assert!(StatusFilter::Only(TaskStatus::Active).matches(TaskStatus::Active));
        assert!(!StatusFilter::Only(TaskStatus::Active).matches(TaskStatus::Completed));
    }

    #[test]
    fn test_empty_search_matches_everything() {
        let filter = TaskFilter::all().search("   ");
        assert!(filter.matches(&task("Buy milk", None, TaskStatus::Active)));
        assert!(filter.matches(&task("Write report", Some("quarterly"), TaskStatus::Completed)));
    }

    #[test]
    fn test_substring_search_is_case_insensitive() {
        let filter = TaskFilter::all().search("MILK").mode(SearchMode::Substring);
        assert!(filter.matches(&task("Buy milk", None, TaskStatus::Active)));
        assert!(!filter.matches(&task("Buy bread", None, TaskStatus::Active)));
    }

    #[test]
    fn test_search_checks_description() {
        let filter = TaskFilter::all().search("quarterly").mode(SearchMode::Substring);
        assert!(filter.matches(&task("Write report", Some("The Quarterly numbers"), TaskStatus::Active)));
        assert!(!filter.matches(&task("Write report", None, TaskStatus::Active)));
    }

    #[test]
    fn test_substring_mode_rejects_typos() {
        let filter = TaskFilter::all().search("raport").mode(SearchMode::Substring);
        assert!(!filter.matches(&task("Write report", None, TaskStatus::Active)));
    }

    #[test]
    fn test_fuzzy_search_tolerates_typos() {
        let filter = TaskFilter::all().search("raport");
        assert!(filter.matches(&task("Write report", None, TaskStatus::Active)));

        let filter = TaskFilter::all().search("xyzzy");
        assert!(!filter.matches(&task("Write report", None, TaskStatus::Active)));
    }

    #[test]
    fn test_status_and_search_combine() {
        let filter = TaskFilter::all().status(TaskStatus::Completed).search("milk");
        assert!(!filter.matches(&task("Buy milk", None, TaskStatus::Active)));
        assert!(filter.matches(&task("Buy milk", None, TaskStatus::Completed)));
    }

    #[test]
    fn test_fuzzy_score() {
        assert_eq!(fuzzy_score("milk", "Buy MILK today"), Some(0.0));
        assert_eq!(fuzzy_score("", "anything"), None);
        assert_eq!(fuzzy_score("milkk", "buy milk"), Some(0.2));
        assert_eq!(fuzzy_score("abc", ""), Some(1.0));
    }

    #[test]
    fn test_approximate_substring_distance() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        assert_eq!(approximate_substring_distance(&chars("report"), &chars("write report")), 0);
        assert_eq!(approximate_substring_distance(&chars("raport"), &chars("write report")), 1);
        assert_eq!(approximate_substring_distance(&chars("mlk"), &chars("buy milk")), 1);
        assert_eq!(approximate_substring_distance(&chars("abc"), &chars("xyz")), 3);
    }

    #[test]
    fn test_fuzzy_threshold_is_clamped() {
        assert_eq!(SearchMode::fuzzy(2.5), SearchMode::Fuzzy { threshold: 1.0 });
        assert_eq!(SearchMode::fuzzy(-1.0), SearchMode::Fuzzy { threshold: 0.0 });
        assert_eq!(SearchMode::fuzzy(f64::NAN), SearchMode::default());
    }

    #[test]
    fn test_zero_threshold_behaves_like_substring() {
        let filter = TaskFilter::all().search("raport").mode(SearchMode::fuzzy(0.0));
        assert!(!filter.matches(&task("Write report", None, TaskStatus::Active)));

        let filter = TaskFilter::all().search("report").mode(SearchMode::fuzzy(0.0));
        assert!(filter.matches(&task("Write report", None, TaskStatus::Active)));
    }

    #[test]
    fn test_hand_built_threshold_is_clamped_when_matching() {
        let report = task("Write report", None, TaskStatus::Active);

        let negative = TaskFilter::all().search("report").mode(SearchMode::Fuzzy { threshold: -1.0 });
        assert!(negative.matches(&report));
        assert!(!negative.clone().search("raport").matches(&report));

        let unbounded = TaskFilter::all().search("xyzzy").mode(SearchMode::Fuzzy { threshold: 7.0 });
        assert!(unbounded.matches(&report));

        let nan = TaskFilter::all().search("raport").mode(SearchMode::Fuzzy { threshold: f64::NAN });
        assert!(nan.matches(&report));
    }

    #[test]
    fn test_matcher_agrees_with_fuzzy_score() {
        let report = task("Write report", Some("Quarterly numbers"), TaskStatus::Active);

        for (pattern, threshold) in [("raport", 0.2), ("raport", 0.1), ("QUARTRLY", 0.15), ("xyz", 0.9)] {
            let expected = [report.title.as_str(), "Quarterly numbers"]
                .iter()
                .any(|text| fuzzy_score(pattern, text).is_some_and(|score| score <= threshold));
            let filter = TaskFilter::all().search(pattern).mode(SearchMode::fuzzy(threshold));
            assert_eq!(filter.matches(&report), expected, "pattern {} at {}", pattern, threshold);
        }
    }
}
