//! Bot prompt option extraction
//!
//! Classifies the text of a bot turn into a structured [`Presentation`]:
//! confirm/edit pairs, employee-match candidate lists, numbered menus, or a
//! plain prompt. Also maps a selected option back to the raw token that the
//! next turn must carry. Never fails: anything unrecognised is a plain prompt.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Token sent when the visitor accepts a summary
pub const CONFIRM_TOKEN: &str = "confirm";
/// Token sent when the visitor wants to change a summary
pub const EDIT_TOKEN: &str = "edit";
/// Token sent when none of the employee matches is the right host
pub const NO_MATCH_TOKEN: &str = "0";
/// Label for the synthetic "no match" option
pub const NO_MATCH_LABEL: &str = "None of these / enter a different name";

struct CuePatterns {
    review: Regex,
    confirm: Regex,
    found: Regex,
    matches: Regex,
    none_of_these: Regex,
    numbered: Regex,
}

static CUES: LazyLock<CuePatterns> = LazyLock::new(|| {
    let mk = |pat: &str| Regex::new(pat).expect("Invalid cue regex");
    CuePatterns {
        review: mk(r"(?i)\breview"),
        confirm: mk(r"(?i)\bconfirm"),
        found: mk(r"(?i)\bfound\b"),
        matches: mk(r"(?i)\bmatch(es|ing)?\b"),
        none_of_these: mk(r"(?i)\bnone\s+of\s+(these|the\s+above)\b"),
        numbered: mk(r"^\s*(\d+)\.\s+(\S.*?)\s*$"),
    }
});

/// Which rule classified the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Confirmation,
    EmployeeMatch,
    NumberedList,
    Plain,
}

/// One selectable option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptOption {
    /// Raw token submitted as the next turn when this option is picked
    pub value: String,
    pub label: String,
}

impl PromptOption {
    fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Structured view of a bot prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub kind: PromptKind,
    /// Text shown above the options (the full text for plain prompts)
    pub heading: String,
    pub options: Vec<PromptOption>,
}

impl Presentation {
    fn plain(text: &str) -> Self {
        Self {
            kind: PromptKind::Plain,
            heading: text.to_string(),
            options: Vec::new(),
        }
    }

    /// Map a picked option value back to the token to submit.
    ///
    /// Returns `None` when `value` is not one of this prompt's options.
    pub fn resolve_selection(&self, value: &str) -> Option<&str> {
        let value = value.trim();
        self.options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.value.as_str())
    }
}

/// Classify a bot prompt. Rules are tried in priority order.
pub fn classify(text: &str) -> Presentation {
    if is_confirmation_prompt(text) {
        return confirmation_presentation(text);
    }
    if let Some(presentation) = employee_match_presentation(text) {
        return presentation;
    }
    if let Some(presentation) = numbered_list_presentation(text) {
        return presentation;
    }
    Presentation::plain(text)
}

/// Presentation of the prompt being answered. While the controller awaits a
/// confirmation only confirm/edit are accepted, so that is all it offers.
pub fn present(text: &str, awaiting_confirmation: bool) -> Presentation {
    if awaiting_confirmation {
        confirmation_presentation(text)
    } else {
        classify(text)
    }
}

/// Whether the text asks the visitor to review and confirm a summary
pub fn is_confirmation_prompt(text: &str) -> bool {
    CUES.review.is_match(text) && CUES.confirm.is_match(text)
}

/// Canonical confirmation-mode token for typed input, if it is one
pub fn parse_confirmation_token(input: &str) -> Option<&'static str> {
    let input = input.trim();
    [CONFIRM_TOKEN, EDIT_TOKEN]
        .into_iter()
        .find(|token| input.eq_ignore_ascii_case(token))
}

/// The token submitted for a confirm/edit decision
pub fn confirmation_token(accepted: bool) -> &'static str {
    if accepted {
        CONFIRM_TOKEN
    } else {
        EDIT_TOKEN
    }
}

fn confirmation_presentation(text: &str) -> Presentation {
    Presentation {
        kind: PromptKind::Confirmation,
        heading: text.trim().to_string(),
        options: vec![
            PromptOption::new(CONFIRM_TOKEN, "Confirm"),
            PromptOption::new(EDIT_TOKEN, "Edit"),
        ],
    }
}

fn employee_match_presentation(text: &str) -> Option<Presentation> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next()?;
    if !(CUES.found.is_match(first) && CUES.matches.is_match(first)) {
        return None;
    }

    let mut options: Vec<PromptOption> = lines
        .filter(|line| !CUES.none_of_these.is_match(line))
        .enumerate()
        .map(|(index, line)| PromptOption::new((index + 1).to_string(), candidate_label(line)))
        .collect();

    if options.is_empty() {
        return None;
    }
    options.push(PromptOption::new(NO_MATCH_TOKEN, NO_MATCH_LABEL));

    Some(Presentation {
        kind: PromptKind::EmployeeMatch,
        heading: first.to_string(),
        options,
    })
}

/// Candidate lines may already carry a "1." marker; the label drops it.
fn candidate_label(line: &str) -> String {
    CUES.numbered
        .captures(line)
        .map_or_else(|| line.to_string(), |caps| caps[2].to_string())
}

fn numbered_list_presentation(text: &str) -> Option<Presentation> {
    let mut options = Vec::new();
    let mut heading = Vec::new();

    for line in text.lines() {
        if let Some(caps) = CUES.numbered.captures(line) {
            options.push(PromptOption::new(&caps[1], &caps[2]));
        } else if !line.trim().is_empty() {
            heading.push(line.trim());
        }
    }

    if options.is_empty() {
        return None;
    }

    Some(Presentation {
        kind: PromptKind::NumberedList,
        heading: heading.join(" "),
        options,
    })
}
