//! Screenplay formatting cleanup.

use crate::error::Result;
use regex::Regex;

/// Removes screenplay formatting artifacts from raw script text.
#[derive(Debug, Clone)]
pub struct ScriptCleaner {
    page_number: Regex,
    page_label: Regex,
    annotations: Regex,
    parenthetical_line: Regex,
    blank_runs: Regex,
}

impl ScriptCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            page_number: Regex::new(r"(?m)^\s*\d+\.\s*$")?,
            page_label: Regex::new(r"(?mi)^\s*Page\s+\d+\s*$")?,
            annotations: Regex::new(r"(?i)\((?:CONT'D|V\.O\.?|O\.S\.?|O\.C\.?)\)")?,
            parenthetical_line: Regex::new(r"(?m)^\s*\(.*?\)\s*$")?,
            blank_runs: Regex::new(r"\n{3,}")?,
        })
    }

    /// Clean one script: drop page numbers, voice annotations and stage-direction
    /// lines, collapse blank runs and strip every line.
    pub fn clean(&self, raw: &str) -> String {
        let text = self.page_number.replace_all(raw, "");
        let text = self.page_label.replace_all(&text, "");
        let text = self.annotations.replace_all(&text, "");
        let text = self.parenthetical_line.replace_all(&text, "");
        let text = self.blank_runs.replace_all(&text, "\n\n");

        text.lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_page_markers() {
        let cleaner = ScriptCleaner::new().unwrap();
        let raw = "INT. CANTINA\n  12.  \nPage 4\nHan sits.";
        let cleaned = cleaner.clean(raw);
        assert!(!cleaned.contains("12."));
        assert!(!cleaned.contains("Page 4"));
        assert!(cleaned.starts_with("INT. CANTINA"));
        assert!(cleaned.ends_with("Han sits."));
    }

    #[test]
    fn test_removes_voice_annotations() {
        let cleaner = ScriptCleaner::new().unwrap();
        let cleaned = cleaner.clean("VADER (V.O.)\nOBI-WAN (cont'd)\nLUKE (O.S)\nHAN (O.C.)");
        assert_eq!(cleaned, "VADER\nOBI-WAN\nLUKE\nHAN");
    }

    #[test]
    fn test_removes_parenthetical_lines_and_collapses_blanks() {
        let cleaner = ScriptCleaner::new().unwrap();
        let raw = "LEIA\n    (quietly)\nHelp me.\n\n\n\n\nEXT. SPACE";
        let cleaned = cleaner.clean(raw);
        assert!(!cleaned.contains("quietly"));
        assert!(!cleaned.contains("\n\n\n"));
        assert!(cleaned.contains("Help me.\n\nEXT. SPACE"));
    }

    #[test]
    fn test_strips_line_indentation() {
        let cleaner = ScriptCleaner::new().unwrap();
        let cleaned = cleaner.clean("      THREEPIO   \n   Sir, I think...   ");
        assert_eq!(cleaned, "THREEPIO\nSir, I think...");
    }
}
