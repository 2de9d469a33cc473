//! Splits free-text eligibility criteria into inclusion and exclusion items.

use std::sync::LazyLock;

use regex::Regex;

/// Text following the inclusion (or generic eligibility) heading, up to the
/// exclusion heading or the end of the text.
static INCLUSION_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(?:INCLUSION\s+CRITERIA|ELIGIBILITY\s+CRITERIA)[:.\-]?\s*(.*?)(?:EXCLUSION\s+CRITERIA|$)",
    )
    .expect("valid regex")
});

/// Text following the exclusion heading to the end of the text.
static EXCLUSION_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)EXCLUSION\s+CRITERIA[:.\-]?\s*(.*)$").expect("valid regex")
});

/// A list marker at the start of a line: `1.`, `-`, `*` or `•`. A numbered
/// marker must be followed by whitespace or the line end, so `2.5 mg/dL` is
/// not one.
static ITEM_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+\.(?:\s+|$)|[-*•]\s*)(.*)$").expect("valid regex")
});

/// Heading-only lines skipped by the line fallback.
static HEADING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:INCLUSION|EXCLUSION|CRITERIA|NOTE):").expect("valid regex")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Lines must be longer than this to survive the line fallback.
const MIN_FALLBACK_LINE_CHARS: usize = 10;

/// Inclusion and exclusion items, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentedCriteria {
    pub inclusion: Vec<String>,
    pub exclusion: Vec<String>,
}

impl SegmentedCriteria {
    pub fn is_empty(&self) -> bool {
        self.inclusion.is_empty() && self.exclusion.is_empty()
    }
}

/// Segment a registry criteria text block.
///
/// Both spans are located by their headings; text without an inclusion or
/// eligibility heading yields no inclusion items. Each span is split on list
/// markers, falling back to one item per substantial line when no marker is
/// present. Never fails; empty input gives two empty lists.
pub fn segment_criteria(text: &str) -> SegmentedCriteria {
    if text.trim().is_empty() {
        return SegmentedCriteria::default();
    }

    let inclusion = INCLUSION_SPAN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| split_items(m.as_str()))
        .unwrap_or_default();

    let exclusion = EXCLUSION_SPAN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| split_items(m.as_str()))
        .unwrap_or_default();

    SegmentedCriteria { inclusion, exclusion }
}

/// Split a span into items, preferring list markers over lines.
pub fn split_items(span: &str) -> Vec<String> {
    let items = marker_items(span);
    if !items.is_empty() {
        return items;
    }
    fallback_lines(span)
}

/// Items introduced by list markers. A marker line's text is the item; when a
/// marker stands alone the next non-blank line is taken as its text.
fn marker_items(span: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut lines = span.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(caps) = ITEM_MARKER.captures(line) else {
            continue;
        };
        let rest = caps.get(1).map_or("", |m| m.as_str());

        let text = if rest.trim().is_empty() {
            let mut next = None;
            while let Some(candidate) = lines.peek() {
                if candidate.trim().is_empty() {
                    lines.next();
                    continue;
                }
                if ITEM_MARKER.is_match(candidate) {
                    break;
                }
                next = lines.next();
                break;
            }
            match next {
                Some(n) => n,
                None => continue,
            }
        } else {
            rest
        };

        let normalized = normalize_whitespace(text);
        if !normalized.is_empty() {
            items.push(normalized);
        }
    }

    items
}

fn fallback_lines(span: &str) -> Vec<String> {
    span.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_FALLBACK_LINE_CHARS)
        .filter(|line| !HEADING_LINE.is_match(line))
        .map(normalize_whitespace)
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_items_in_order() {
        let text = "Inclusion Criteria:\n1. Age 18 or older\n2. Confirmed diagnosis\n3. Signed consent\n\nExclusion Criteria:\n1. Pregnancy";
        let seg = segment_criteria(text);
        assert_eq!(
            seg.inclusion,
            vec!["Age 18 or older", "Confirmed diagnosis", "Signed consent"]
        );
        assert_eq!(seg.exclusion, vec!["Pregnancy"]);
    }

    #[test]
    fn bullet_markers() {
        let text = "Inclusion Criteria:\n\n* Adults aged 18-65\n- BMI under 30\n• Able to swallow tablets\n\nExclusion Criteria:\n\n* Active infection";
        let seg = segment_criteria(text);
        assert_eq!(seg.inclusion.len(), 3);
        assert_eq!(seg.inclusion[2], "Able to swallow tablets");
        assert_eq!(seg.exclusion, vec!["Active infection"]);
    }

    #[test]
    fn exclusion_items_never_leak_into_inclusion() {
        let text = "Inclusion Criteria:\n- Healthy adult\nExclusion Criteria:\n- Smoker\n- Diabetes";
        let seg = segment_criteria(text);
        assert_eq!(seg.inclusion, vec!["Healthy adult"]);
        assert!(seg.inclusion.iter().all(|i| !seg.exclusion.contains(i)));
    }

    #[test]
    fn eligibility_heading_counts_as_inclusion() {
        let seg = segment_criteria("Eligibility Criteria: \n- Women over 50 years");
        assert_eq!(seg.inclusion, vec!["Women over 50 years"]);
        assert!(seg.exclusion.is_empty());
    }

    #[test]
    fn headings_are_case_insensitive() {
        let seg = segment_criteria("INCLUSION CRITERIA\n1. Something relevant\nexclusion criteria:\n1. Other thing");
        assert_eq!(seg.inclusion, vec!["Something relevant"]);
        assert_eq!(seg.exclusion, vec!["Other thing"]);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let seg = segment_criteria("Inclusion Criteria:\n-   Age   over\t18   years  ");
        assert_eq!(seg.inclusion, vec!["Age over 18 years"]);
    }

    #[test]
    fn decimals_are_not_item_markers() {
        let seg = segment_criteria("Inclusion Criteria:\n1. Creatinine normal\n2.5 mg/dL threshold text\n2. Adequate function");
        assert_eq!(seg.inclusion, vec!["Creatinine normal", "Adequate function"]);
    }

    #[test]
    fn numbered_items_may_start_with_digits() {
        let text = "Inclusion Criteria:\n1. 18 years of age or older\n2. Signed consent\n3. 2 prior lines of therapy\n\nExclusion Criteria:\n1. 3 or more prior regimens";
        let seg = segment_criteria(text);
        assert_eq!(
            seg.inclusion,
            vec!["18 years of age or older", "Signed consent", "2 prior lines of therapy"]
        );
        assert_eq!(seg.exclusion, vec!["3 or more prior regimens"]);
    }

    #[test]
    fn span_of_only_digit_leading_items_keeps_every_item() {
        let seg = segment_criteria("Exclusion Criteria:\n1. 3 or more prior regimens\n2. 2nd primary malignancy");
        assert!(seg.inclusion.is_empty());
        assert_eq!(seg.exclusion, vec!["3 or more prior regimens", "2nd primary malignancy"]);
    }

    #[test]
    fn lone_marker_takes_next_line() {
        let seg = segment_criteria("Inclusion Criteria:\n1.\nPatients with stable disease\n2. Another item");
        assert_eq!(seg.inclusion, vec!["Patients with stable disease", "Another item"]);
    }

    #[test]
    fn unmarked_text_falls_back_to_lines() {
        let text = "Inclusion Criteria:\nPatients with confirmed disease\nshort\nNOTE: see protocol appendix\nAble to give informed consent";
        let seg = segment_criteria(text);
        assert_eq!(
            seg.inclusion,
            vec!["Patients with confirmed disease", "Able to give informed consent"]
        );
    }

    #[test]
    fn short_unmarked_lines_yield_nothing() {
        let seg = segment_criteria("Inclusion Criteria:\nadults\nno smokers\nExclusion Criteria:\nnone");
        assert!(seg.is_empty());
    }

    #[test]
    fn empty_or_headingless_input() {
        assert!(segment_criteria("").is_empty());
        assert!(segment_criteria("   \n ").is_empty());
        assert!(segment_criteria("- just a list without headings").inclusion.is_empty());
    }
}
