//! Streaming summary filter
//!
//! The chat instructions ask the model to end every reply with a summary of
//! the conversation wrapped in `BEGIN_SUMM ... END_SUMM`. The summary is kept
//! in the stored reply so later turns carry the context, but it is hidden
//! from the terminal unless the user asks for it.
//!
//! The filter works on the fragments of a live response. It never waits for
//! the whole reply: each fragment is classified as it arrives and, when
//! visible, handed back for immediate display. The only fragment ever held
//! back is a lone opening-marker candidate, until the next fragment tells
//! whether the summary really starts.

mod markers;

pub use markers::SummaryMarkers;

use tracing::debug;

/// Position of the filter within a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Ordinary reply text
    Normal,
    /// The first half of the opening marker was the last fragment
    MarkerSeen,
    /// Inside the trailing summary region
    InSummary,
}

/// Result of running a whole response through the filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutput {
    /// Every fragment, in arrival order
    pub full: String,
    /// What was shown to the user
    pub visible: String,
    /// Number of fragments received
    pub fragments: usize,
    /// Whether the closing marker was seen inside the summary
    pub summary_closed: bool,
}

impl FilterOutput {
    /// True when the response produced no fragments at all
    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }
}

/// State machine separating the visible reply from its hidden summary
#[derive(Debug, Clone)]
pub struct SummaryFilter {
    markers: SummaryMarkers,
    with_summary: bool,
    resume_after_close: bool,
    state: FilterState,
    pending: Option<String>,
    summary: String,
    output: FilterOutput,
}

impl SummaryFilter {
    /// Create a filter; `with_summary` shows the summary region as well
    pub fn new(markers: SummaryMarkers, with_summary: bool) -> Self {
        Self {
            markers,
            with_summary,
            resume_after_close: false,
            state: FilterState::Normal,
            pending: None,
            summary: String::new(),
            output: FilterOutput::default(),
        }
    }

    /// Return to normal display once the closing marker has been seen.
    ///
    /// Off by default: the summary is always the tail of a reply.
    pub fn resume_after_close(mut self, resume: bool) -> Self {
        self.resume_after_close = resume;
        self
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Whether the closing marker has been recognised in the summary region
    pub fn summary_closed(&self) -> bool {
        self.output.summary_closed
    }

    /// Text accumulated so far for storage
    pub fn full(&self) -> &str {
        &self.output.full
    }

    /// Text shown so far
    pub fn visible(&self) -> &str {
        &self.output.visible
    }

    /// Classify one fragment.
    ///
    /// Returns the text to display right now, if any. This can include an
    /// opening-marker candidate released because the next fragment did not
    /// complete the marker.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.output.fragments += 1;
        self.output.full.push_str(fragment);

        match self.state {
            FilterState::Normal => self.push_normal(fragment, String::new()),
            FilterState::MarkerSeen => {
                if self.markers.completes_opening(fragment) {
                    debug!("Summary region started");
                    self.state = FilterState::InSummary;
                    self.pending = None;
                    self.show_if_summary_visible(fragment)
                } else {
                    self.state = FilterState::Normal;
                    let released = self.pending.take().unwrap_or_default();
                    self.output.visible.push_str(&released);
                    self.push_normal(fragment, released)
                }
            }
            FilterState::InSummary => {
                self.summary.push_str(fragment);
                let shown = self.show_if_summary_visible(fragment);
                self.check_closing();
                shown
            }
        }
    }

    /// End of the response; releases a dangling marker candidate.
    ///
    /// Returns the final text to display, if any, together with the
    /// accumulated output.
    pub fn finish(mut self) -> (Option<String>, FilterOutput) {
        let released = self.pending.take();
        if let Some(text) = &released {
            self.output.visible.push_str(text);
        }
        (released, self.output)
    }

    fn push_normal(&mut self, fragment: &str, mut shown: String) -> Option<String> {
        if self.markers.starts_opening(fragment) {
            self.state = FilterState::MarkerSeen;
            if self.with_summary {
                self.output.visible.push_str(fragment);
                shown.push_str(fragment);
            } else {
                self.pending = Some(fragment.to_string());
            }
        } else {
            self.output.visible.push_str(fragment);
            shown.push_str(fragment);
        }

        if shown.is_empty() { None } else { Some(shown) }
    }

    fn show_if_summary_visible(&mut self, fragment: &str) -> Option<String> {
        if self.with_summary {
            self.output.visible.push_str(fragment);
            Some(fragment.to_string())
        } else {
            None
        }
    }

    fn check_closing(&mut self) {
        if !self.markers.closes(&self.summary) {
            return;
        }

        if !self.output.summary_closed {
            debug!(resume = self.resume_after_close, "Summary region closed");
        }
        self.output.summary_closed = true;
        if self.resume_after_close {
            self.state = FilterState::Normal;
            self.summary.clear();
        }
    }
}
