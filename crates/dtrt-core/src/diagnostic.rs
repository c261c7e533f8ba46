//! Fatal diagnostic rendering: one [`Diagnostic`] per [`ErrorCategory`], each
//! with its own source-position heuristic.
//!
//! Rendering follows the four-line shape of the original implementation
//! (`original_source/src/dataroute/errors.py`): a localized `Error in line
//! N:` header, the offending source line, a caret line, the localized
//! message, and an optional localized hint — rather than the teacher's
//! rustc-style gutter-and-arrow layout. Color is applied through the same
//! `>TAG<` markup [`crate::localization::colorize`] resolves, so a plain and
//! a colored render differ only in whether escapes survive.

use crate::error::{ErrorCategory, SourceLocation};
use crate::localization::{self, Lang};
use std::fmt;

/// A fully-rendered fatal diagnostic: category, source anchor, and the
/// localized text produced from it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub category: ErrorCategory,
    pub location: SourceLocation,
    pub line_text: String,
    pub file: Option<String>,
    pub lang: Lang,
    pub color: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Build a diagnostic for `category` anchored at `location` on
    /// `line_text`, rendering its message/hint in `lang` with `params`.
    pub fn new(
        category: ErrorCategory,
        location: SourceLocation,
        line_text: impl Into<String>,
        lang: Lang,
        color: bool,
        params: &[(&str, &str)],
    ) -> Self {
        let message = localization::error_message(category, lang, params);
        let hint = localization::error_hint(category, lang, params);
        Self {
            category,
            location,
            line_text: line_text.into(),
            file: None,
            lang,
            color,
            message,
            hint,
        }
    }

    /// Override the standard hint with a custom, already-localized one
    /// (mirrors `ConditionInvalidError`'s custom message and
    /// `VoidTypeError`'s replaced suggestion in the original).
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn paint(&self, text: &str) -> String {
        localization::colorize(text, self.color)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            writeln!(f, "{file}:")?;
        }
        writeln!(f, "{}", self.paint(&format!(">BOLD<{}>RS<", localization::line_prefix(self.lang, self.location.line))))?;
        writeln!(f, "{}", self.line_text)?;
        writeln!(f, "{}{}", " ".repeat(self.location.column), self.paint(">R<^>RS<"))?;
        writeln!(f, "{}", self.paint(&format!(">R<{}>RS<", self.message)))?;
        if let Some(hint) = &self.hint {
            write!(
                f,
                "{} {}",
                self.paint(&format!(">Y<{}>RS<", localization::hint_label(self.lang))),
                hint
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Position-guessing helpers, one per category, grounded in
/// `errors.py`'s per-class `_guess_error_position` overrides.
pub mod position {
    /// `PipelineClosingBarError`: position after the last `|`, else at the
    /// first `[`.
    pub fn pipeline_closing_bar(line: &str) -> usize {
        if let Some(pos) = line.rfind('|') {
            return pos + 1;
        }
        line.find('[').unwrap_or(0)
    }

    /// `BracketMissingError`: the unmatched bracket's position.
    pub fn bracket_missing(line: &str) -> usize {
        let open = line.matches('[').count();
        let close = line.matches(']').count();
        if open > close {
            for (pos, ch) in line.char_indices().rev() {
                if ch == '[' && line[pos + 1..].find(']').is_none() {
                    return pos;
                }
            }
        } else if close > open {
            let mut seen_open = 0usize;
            let mut seen_close = 0usize;
            for (pos, ch) in line.char_indices() {
                match ch {
                    '[' => seen_open += 1,
                    ']' => {
                        if seen_open <= seen_close {
                            return pos;
                        }
                        seen_close += 1;
                    }
                    _ => {}
                }
            }
        }
        line.find('[').unwrap_or(0)
    }

    /// `FlowDirectionError`: position right after the first `]`.
    pub fn flow_direction(line: &str) -> usize {
        line.find(']').map(|p| p + 1).unwrap_or(0)
    }

    /// `FinalTypeError`: position right after the last `]`.
    pub fn final_type(line: &str) -> usize {
        match line.rfind(']') {
            Some(p) => p + 1,
            None => line.len().saturating_sub(1),
        }
    }

    /// `InvalidTypeError`: position of `data_type` inside its `(...)`.
    pub fn invalid_type(line: &str, data_type: &str) -> usize {
        let needle = format!("({data_type})");
        line.find(&needle).map(|p| p + 1).unwrap_or(0)
    }

    /// `PipelineEmptyError`: position of the second `|` in `||`.
    pub fn pipeline_empty(line: &str) -> usize {
        line.find("||").map(|p| p + 1).unwrap_or(0)
    }

    /// `VoidTypeError`: position of the `(` right after an empty `[]`.
    pub fn void_type(line: &str) -> usize {
        if let Some(p) = line.find("[](") {
            return p + 2;
        }
        match line.rfind(']') {
            Some(p) => p + 1,
            None => line.len().saturating_sub(1),
        }
    }

    /// `UndefinedVarError`/`InvalidVarUsageError`/`SrcFieldAsVarError`:
    /// position of `$var_name`, else the start of the second pipe segment.
    pub fn var_reference(line: &str, var_name: &str) -> usize {
        let needle = format!("${var_name}");
        if let Some(p) = line.find(&needle) {
            return p;
        }
        second_pipe_segment_start(line)
    }

    fn second_pipe_segment_start(line: &str) -> usize {
        if let Some(first) = line.find('|') {
            if line[first + 1..].find('|').is_some() {
                return first + 1;
            }
        }
        0
    }

    /// `ConditionMissingIfError`: position of `else` (case-insensitive).
    pub fn condition_missing_if(line: &str) -> usize {
        line.to_lowercase().find("else").unwrap_or(0)
    }

    /// `ConditionMissingColonError`: position right after `)`, else right
    /// after `if`/`elif`.
    pub fn condition_missing_colon(line: &str) -> usize {
        if let Some(p) = line.find(')') {
            return p + 1;
        }
        after_if_or_elif(line)
    }

    /// `ConditionMissingParenthesisError`: position right after
    /// `if`/`elif`.
    pub fn condition_missing_parenthesis(line: &str) -> usize {
        after_if_or_elif(line)
    }

    fn after_if_or_elif(line: &str) -> usize {
        let lower = line.to_lowercase();
        for keyword in ["if", "elif"] {
            if let Some(p) = lower.find(keyword) {
                return p + keyword.len();
            }
        }
        0
    }

    /// `ConditionEmptyExpressionError`: position just inside the `(`.
    pub fn condition_empty_expression(line: &str) -> usize {
        if let (Some(open), Some(close)) = (line.find('('), line.find(')')) {
            if open < close {
                return open + 1;
            }
        }
        0
    }

    /// `ConditionInvalidError`: position of `if` (case-insensitive).
    pub fn condition_invalid(line: &str) -> usize {
        line.to_lowercase().find("if").unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceLocation;

    fn diag(category: ErrorCategory, col: usize, text: &str) -> Diagnostic {
        Diagnostic::new(category, SourceLocation::new(3, col), text, Lang::En, false, &[])
    }

    #[test]
    fn pipeline_closing_bar_position_after_last_bar() {
        assert_eq!(position::pipeline_closing_bar("a -> |*f(a)| b"), 12);
    }

    #[test]
    fn bracket_missing_extra_open() {
        assert_eq!(position::bracket_missing("a -> [foo -> [bar] -> (str)"), 5);
    }

    #[test]
    fn void_type_position_at_open_paren() {
        assert_eq!(position::void_type("a -> [](str)"), 7);
    }

    #[test]
    fn var_reference_finds_dollar_name() {
        assert_eq!(position::var_reference("a -> |*f($foo)| -> b(str)", "foo"), 10);
    }

    #[test]
    fn display_renders_four_lines_without_color() {
        let d = diag(ErrorCategory::PipelineEmpty, 5, "a -> || -> b(str)");
        let rendered = d.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "a -> || -> b(str)");
        assert_eq!(lines[2], "     ^");
        assert!(!rendered.contains('\u{1b}'));
    }

    #[test]
    fn display_with_color_emits_ansi() {
        let d = Diagnostic::new(
            ErrorCategory::PipelineEmpty,
            SourceLocation::new(1, 5),
            "a -> || -> b(str)",
            Lang::En,
            true,
            &[],
        );
        assert!(d.to_string().contains('\u{1b}'));
    }

    #[test]
    fn with_hint_overrides_standard_hint() {
        let d = diag(ErrorCategory::Unknown, 0, "x").with_hint("custom");
        assert_eq!(d.hint.as_deref(), Some("custom"));
    }
}
