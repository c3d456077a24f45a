use serde::Serialize;

const DELIMITER: &str = "---";

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub leading_newlines: usize,
    pub closing_delimiter_fixed: bool,
}

impl RepairReport {
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.leading_newlines > 0 {
            parts.push(format!("removed {} leading blank line(s)", self.leading_newlines));
        }
        if self.closing_delimiter_fixed {
            parts.push("cleaned closing front matter delimiter".to_string());
        }
        if parts.is_empty() {
            "no change".to_string()
        } else {
            parts.join(", ")
        }
    }
}

pub struct RepairOutcome {
    pub report: RepairReport,
    pub repaired: Option<String>,
}

/// Fixes the two header malformations the front matter parser cannot cope
/// with: blank lines before the opening delimiter and trailing whitespace on
/// the closing delimiter.
pub fn repair_note_text(text: &str) -> RepairOutcome {
    let trimmed = text.trim_start_matches(['\n', '\r']);
    let leading_newlines = text[..text.len() - trimmed.len()]
        .chars()
        .filter(|ch| *ch == '\n')
        .count();

    let mut report = RepairReport {
        leading_newlines,
        closing_delimiter_fixed: false,
    };

    let mut cleaned = trimmed.to_string();
    if let Some(fixed) = clean_closing_delimiter(trimmed) {
        cleaned = fixed;
        report.closing_delimiter_fixed = true;
    }

    if cleaned == text {
        RepairOutcome {
            report,
            repaired: None,
        }
    } else {
        RepairOutcome {
            report,
            repaired: Some(cleaned),
        }
    }
}

fn opens_front_matter(text: &str) -> bool {
    text.starts_with("---\n") || text.starts_with("---\r\n")
}

fn clean_closing_delimiter(text: &str) -> Option<String> {
    if !opens_front_matter(text) {
        return None;
    }

    let mut lines = text.split_inclusive('\n');
    let opening = lines.next()?;
    let mut rebuilt = String::with_capacity(text.len());
    rebuilt.push_str(opening);

    let mut fixed = false;
    let mut closed = false;
    for line in lines {
        if closed {
            rebuilt.push_str(line);
            continue;
        }
        let content = line.trim_end_matches(['\n', '\r']);
        if content.trim_end() == DELIMITER {
            closed = true;
            if content != DELIMITER {
                fixed = true;
                rebuilt.push_str(DELIMITER);
                rebuilt.push_str(&line[content.len()..]);
                continue;
            }
        }
        rebuilt.push_str(line);
    }

    fixed.then_some(rebuilt)
}
