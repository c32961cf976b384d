use std::ops::Range;

use tracing::debug;

use crate::models::{EditorialFeedback, FeedbackItem};

/// Outcome of sanitizing one block's feedback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    /// Items dropped because their span overlapped an earlier item of the same editor
    pub overlapping: usize,
    /// Items kept whose `issue` does not occur in the block text
    pub unanchored: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.overlapping == 0 && self.unanchored == 0
    }
}

/// Enforce the non-overlapping edit region rule per editor
///
/// Each item is anchored at the first occurrence of its `issue` in `text` that
/// does not overlap an already-kept span. Items that can only overlap are
/// dropped. Items whose `issue` is absent are kept but reported.
pub fn sanitize_feedback(text: &str, feedback: &mut EditorialFeedback) -> SanitizeReport {
    let mut report = SanitizeReport::default();

    for (stage, items) in feedback.iter_mut() {
        let mut spans: Vec<Range<usize>> = Vec::new();
        let before = items.len();

        items.retain(|item| match anchor(text, item, &spans) {
            Anchor::Free(span) => {
                spans.push(span);
                true
            }
            Anchor::Missing => {
                report.unanchored += 1;
                true
            }
            Anchor::Overlapping => false,
        });

        let dropped = before - items.len();
        if dropped > 0 {
            debug!("Dropped {} overlapping {} feedback items", dropped, stage);
            report.overlapping += dropped;
        }
    }

    report
}

enum Anchor {
    Free(Range<usize>),
    Missing,
    Overlapping,
}

/// Tries every start position, including ones inside an earlier occurrence
fn anchor(text: &str, item: &FeedbackItem, taken: &[Range<usize>]) -> Anchor {
    let issue = item.issue.as_str();
    if issue.is_empty() {
        return Anchor::Missing;
    }

    let mut found = false;
    let mut pos = 0;
    while let Some(offset) = text[pos..].find(issue) {
        found = true;
        let start = pos + offset;
        let span = start..start + issue.len();
        if !taken.iter().any(|t| overlaps(t, &span)) {
            return Anchor::Free(span);
        }
        let step = text[start..].chars().next().map_or(1, char::len_utf8);
        pos = start + step;
    }
    if found {
        Anchor::Overlapping
    } else {
        Anchor::Missing
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
