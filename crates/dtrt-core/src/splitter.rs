//! Depth-aware, string-aware splitters shared by the parser: one for
//! function-call argument lists, one for pipeline segments (spec.md §9).
//! Both run a three-state automaton (outside / in-single-quote /
//! in-double-quote) with a paren-depth counter and a one-shot `\` escape.
//! Grounded in `parser.py`'s `_split_args`.

#[derive(Clone, Copy, PartialEq)]
enum QuoteState {
    None,
    Single,
    Double,
}

/// Split `s` on commas at paren-depth 0 outside quoted strings, trimming
/// each resulting argument. Mirrors `_split_args` exactly.
pub fn split_args(s: &str) -> Vec<String> {
    split_on(s, ',')
}

/// Split `s` on `|` at paren-depth 0 outside quoted strings (spec.md §9's
/// "pipeline segment splitter").
pub fn split_pipeline_segments(s: &str) -> Vec<String> {
    split_on(s, '|')
}

fn split_on(s: &str, separator: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut depth = 0i32;
    let mut quote = QuoteState::None;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            QuoteState::Single | QuoteState::Double => {
                let quote_char = if quote == QuoteState::Single { '\'' } else { '"' };
                buf.push(c);
                if c == quote_char {
                    quote = QuoteState::None;
                } else if c == '\\' {
                    if let Some(next) = chars.next() {
                        buf.push(next);
                    }
                }
            }
            QuoteState::None => match c {
                '\'' => {
                    quote = QuoteState::Single;
                    buf.push(c);
                }
                '"' => {
                    quote = QuoteState::Double;
                    buf.push(c);
                }
                '(' => {
                    depth += 1;
                    buf.push(c);
                }
                ')' => {
                    depth -= 1;
                    buf.push(c);
                }
                c if c == separator && depth == 0 => {
                    out.push(buf.trim().to_string());
                    buf.clear();
                }
                c => buf.push(c),
            },
        }
    }
    if !buf.trim().is_empty() {
        out.push(buf.trim().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_args() {
        assert_eq!(split_args("$a, $b, 1"), vec!["$a", "$b", "1"]);
    }

    #[test]
    fn keeps_commas_inside_parens() {
        assert_eq!(split_args("f(1, 2), $b"), vec!["f(1, 2)", "$b"]);
    }

    #[test]
    fn keeps_commas_inside_quoted_strings() {
        assert_eq!(split_args(r#""a, b", $c"#), vec![r#""a, b""#, "$c"]);
    }

    #[test]
    fn handles_escaped_quote_inside_string() {
        let args = split_args(r#""a\"b", c"#);
        assert_eq!(args, vec![r#""a\"b""#, "c"]);
    }

    #[test]
    fn pipeline_segments_ignore_pipes_inside_parens() {
        assert_eq!(
            split_pipeline_segments("*f(a|b)|$x"),
            vec!["*f(a|b)", "$x"]
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any input, however malformed (unbalanced parens/quotes), must not
        /// panic the automaton — it runs on raw pipeline text before the
        /// parser has validated anything.
        #[test]
        fn split_on_never_panics(s in ".{0,200}") {
            let _ = split_args(&s);
            let _ = split_pipeline_segments(&s);
        }

        /// No produced segment is empty or whitespace-only: the trailing
        /// `buf.trim().is_empty()` guard and the per-segment trim both apply
        /// uniformly.
        #[test]
        fn segments_are_never_blank(s in "[a-zA-Z0-9_, |()]{0,80}") {
            for seg in split_args(&s) {
                prop_assert!(!seg.trim().is_empty());
            }
            for seg in split_pipeline_segments(&s) {
                prop_assert!(!seg.trim().is_empty());
            }
        }

        /// A separator-free, paren-free, quote-free string is returned as a
        /// single trimmed segment (depth stays at 0, no quote state is ever
        /// entered).
        #[test]
        fn plain_text_is_a_single_segment(s in "[a-zA-Z0-9_]{1,40}") {
            prop_assert_eq!(split_args(&s), vec![s.clone()]);
            prop_assert_eq!(split_pipeline_segments(&s), vec![s]);
        }
    }
}
