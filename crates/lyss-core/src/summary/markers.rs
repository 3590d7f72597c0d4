use serde::{Deserialize, Serialize};

/// Literal markers delimiting the summary region.
///
/// Models stream the opening marker `BEGIN_SUMM` as the fragments `BEGIN`
/// and `_SUM`; the filter matches those two fragments exactly. The closing
/// marker is matched against the summary text seen so far, whatever the
/// fragment boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryMarkers {
    pub opening_first: String,
    pub opening_second: String,
    pub closing: String,
}

impl Default for SummaryMarkers {
    fn default() -> Self {
        Self {
            opening_first: "BEGIN".to_string(),
            opening_second: "_SUM".to_string(),
            closing: "END_SUMM".to_string(),
        }
    }
}

impl SummaryMarkers {
    pub fn starts_opening(&self, fragment: &str) -> bool {
        fragment == self.opening_first
    }

    pub fn completes_opening(&self, fragment: &str) -> bool {
        fragment == self.opening_second
    }

    /// Whether `summary` ends with the closing marker
    pub fn closes(&self, summary: &str) -> bool {
        !self.closing.is_empty() && summary.trim_end().ends_with(&self.closing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_fragment_match() {
        let markers = SummaryMarkers::default();
        assert!(markers.starts_opening("BEGIN"));
        assert!(!markers.starts_opening(" BEGIN"));
        assert!(!markers.starts_opening("begin"));
        assert!(markers.completes_opening("_SUM"));
        assert!(!markers.completes_opening("_SUMM"));
    }

    #[test]
    fn test_closing_across_fragments() {
        let markers = SummaryMarkers::default();
        assert!(markers.closes("key facts END_SUMM"));
        assert!(markers.closes("key facts END_SUMM\n"));
        assert!(!markers.closes("key facts END_SU"));
    }
}
