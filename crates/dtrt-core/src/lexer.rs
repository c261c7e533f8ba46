//! Line-oriented lexer: classifies each non-blank source line into exactly
//! one [`Token`], in the fixed pattern order of spec.md §4.1. Grounded in
//! `dsl_compiler/lexer.py`'s `Lexer.tokenize` and
//! `dataroute/errors.py`'s `SyntaxErrorHandler.analyze` heuristic fallback.

use crate::diagnostic::{position, Diagnostic};
use crate::error::{CompileResult, ErrorCategory, SourceLocation};
use crate::localization::Lang;
use crate::token::{
    GlobalVarPayload, GlobalVarUsagePayload, GlobalVarValue, RouteHeaderPayload, RouteLinePayload,
    SourcePayload, TargetPayload, Token, TokenKind, ALLOWED_TYPES, SUPPORTED_TARGET_LANGUAGES,
};
use once_cell::sync::Lazy;
use regex::Regex;

static LANG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^lang\s*=\s*(\w+)$").unwrap());
static SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^source\s*=\s*(\w+)/(\S+)$").unwrap());
static TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*=\s*(\w+)/(.+)$").unwrap());
static TARGET_LOOKALIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*\s*=.*$").unwrap());
static GLOBAL_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$([A-Za-z_]\w*)\s*=\s*(.+)$").unwrap());
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#(.*)$").unwrap());
static ROUTE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*):$").unwrap());
static ROUTE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s+\[([^\]]*)\]\s*(?:->|=>|>>|-|>)\s*(?:\|(.*)\|\s*(?:->|=>|>>|-|>)\s*)?\[([^\]]*)\](?:\(([^)]*)\))?\s*$",
    )
    .unwrap()
});
static GLOBAL_VAR_USAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\$([A-Za-z_]\w*)\s*$").unwrap());
static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());
static FLOAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+\.\d+$").unwrap());

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if s.len() >= 2 && bytes[0] == bytes[s.len() - 1] && (bytes[0] == b'\'' || bytes[0] == b'"') {
        return s[1..s.len() - 1].to_string();
    }
    s.to_string()
}

fn infer_global_value(raw: &str) -> GlobalVarValue {
    let trimmed = raw.trim();
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        GlobalVarValue::Str(strip_quotes(trimmed))
    } else if DIGITS.is_match(trimmed) {
        GlobalVarValue::Int(trimmed.parse().unwrap_or(0))
    } else if FLOAT.is_match(trimmed) {
        GlobalVarValue::Float(trimmed.parse().unwrap_or(0.0))
    } else if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        GlobalVarValue::Bool(trimmed.eq_ignore_ascii_case("true"))
    } else {
        GlobalVarValue::Str(trimmed.to_string())
    }
}

fn diag(
    category: ErrorCategory,
    line_num: usize,
    col: usize,
    text: &str,
    lang: Lang,
    color: bool,
    params: &[(&str, &str)],
) -> Diagnostic {
    Diagnostic::new(category, SourceLocation::new(line_num, col), text, lang, color, params)
}

/// Tokenize `text` under the given diagnostics configuration. Mirrors
/// `Lexer.tokenize`'s pre-validation-then-dispatch structure exactly,
/// including the "source seen at all" check after the main loop.
pub fn tokenize(text: &str, lang: Lang, color: bool) -> CompileResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let trimmed = text.trim();
    let lines: Vec<&str> = trimmed.split('\n').collect();

    let lang_found = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .any(|l| LANG.is_match(l));
    if !lang_found {
        return Err(diag(ErrorCategory::MissingTargetLang, 1, 0, "", lang, color, &[]).into());
    }

    let mut source_found = false;

    for (idx, raw_line) in lines.iter().enumerate() {
        let line_num = idx + 1;
        let original_line = *raw_line;
        let line = original_line.trim();
        if line.is_empty() {
            continue;
        }

        if original_line.contains("||") {
            let pos = position::pipeline_empty(original_line);
            return Err(diag(
                ErrorCategory::PipelineEmpty,
                line_num,
                pos,
                original_line,
                lang,
                color,
                &[],
            )
            .into());
        }

        let mut matched = false;

        if let Some(caps) = LANG.captures(line) {
            let lang_value = caps.get(1).unwrap().as_str().to_string();
            if !SUPPORTED_TARGET_LANGUAGES.contains(&lang_value.as_str()) {
                return Err(diag(
                    ErrorCategory::UnsupportedTargetLang,
                    line_num,
                    line.find("lang").unwrap_or(0),
                    original_line,
                    lang,
                    color,
                    &[("lang", &lang_value)],
                )
                .into());
            }
            tokens.push(Token::new(TokenKind::Lang(lang_value), line_num));
            matched = true;
        }

        if !matched {
            if let Some(caps) = SOURCE.captures(line) {
                source_found = true;
                tokens.push(Token::new(
                    TokenKind::Source(SourcePayload {
                        source_type: caps[1].to_string(),
                        name: caps[2].to_string(),
                    }),
                    line_num,
                ));
                matched = true;
            }
        }
        if !matched && line.starts_with("source=") {
            return Err(diag(
                ErrorCategory::SyntaxSource,
                line_num,
                line.find("source").unwrap_or(0),
                original_line,
                lang,
                color,
                &[],
            )
            .into());
        }

        if !matched {
            if let Some(caps) = TARGET.captures(line) {
                tokens.push(Token::new(
                    TokenKind::Target(TargetPayload {
                        local_name: caps[1].to_string(),
                        target_type: caps[2].to_string(),
                        value: caps[3].to_string(),
                        original_line: original_line.to_string(),
                    }),
                    line_num,
                ));
                matched = true;
            }
        }
        if !matched && TARGET_LOOKALIKE.is_match(line) {
            return Err(diag(
                ErrorCategory::SyntaxTarget,
                line_num,
                line.find('=').unwrap_or(0),
                original_line,
                lang,
                color,
                &[],
            )
            .into());
        }

        if !matched {
            if let Some(caps) = GLOBAL_VAR.captures(line) {
                let name = caps[1].to_string();
                let value = infer_global_value(&caps[2]);
                tokens.push(Token::new(
                    TokenKind::GlobalVar(GlobalVarPayload {
                        name,
                        value,
                        original_line: original_line.to_string(),
                    }),
                    line_num,
                ));
                matched = true;
            }
        }

        if !matched && COMMENT.is_match(line) {
            matched = true;
        }

        if !matched {
            if let Some(caps) = ROUTE_HEADER.captures(line) {
                tokens.push(Token::new(
                    TokenKind::RouteHeader(RouteHeaderPayload {
                        target_local_name: caps[1].to_string(),
                        original_line: original_line.to_string(),
                    }),
                    line_num,
                ));
                matched = true;
            }
        }

        if !matched {
            if let Some(caps) = ROUTE_LINE.captures(original_line) {
                let target_field_type = caps.get(4).map(|m| m.as_str().to_string());
                if let Some(ty) = &target_field_type {
                    if !ALLOWED_TYPES.contains(&ty.as_str()) {
                        let pos = position::invalid_type(original_line, ty);
                        return Err(diag(
                            ErrorCategory::InvalidType,
                            line_num,
                            pos,
                            original_line,
                            lang,
                            color,
                            &[("data_type", ty)],
                        )
                        .into());
                    }
                }
                tokens.push(Token::new(
                    TokenKind::RouteLine(RouteLinePayload {
                        src_field: caps[1].to_string(),
                        pipeline_text: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                        target_field: caps[3].trim().to_string(),
                        target_field_type,
                        original_line: original_line.to_string(),
                    }),
                    line_num,
                ));
                matched = true;
            }
        }

        if !matched {
            if let Some(caps) = GLOBAL_VAR_USAGE.captures(original_line) {
                tokens.push(Token::new(
                    TokenKind::GlobalVarUsage(GlobalVarUsagePayload {
                        var_name: caps[1].to_string(),
                        original_line: original_line.to_string(),
                    }),
                    line_num,
                ));
                matched = true;
            }
        }

        if !matched {
            return Err(analyze_unclassified(line, original_line, line_num, lang, color).into());
        }
    }

    if !source_found {
        return Err(diag(ErrorCategory::SyntaxSource, 1, 0, "", lang, color, &[]).into());
    }

    Ok(tokens)
}

/// Heuristic fallback for lines matching none of the fixed patterns.
/// Ported from `SyntaxErrorHandler.analyze`: tries the most specific
/// diagnosis first, falls back to `unknown`.
fn analyze_unclassified(
    line: &str,
    original_line: &str,
    line_num: usize,
    lang: Lang,
    color: bool,
) -> Diagnostic {
    static SEQUENTIAL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\|[^|]*\|\s*(?:->|=>|-|>)\s*\|").unwrap());
    static SOURCE_NO_EQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"^source\s+\w+").unwrap());
    static TARGET_QUOTED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"=\s*\w+\s*\[\s*["'](.*?)["']"#).unwrap());
    static FIELD_NO_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\s*([a-zA-Z0-9_]+)\s*\]").unwrap());
    static TYPE_IN_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([a-zA-Z0-9_]+)\)").unwrap());
    static OPENING_BRACKET_MISSING: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?:^|[^\[])(\w+)\]").unwrap());

    if let Some(m) = SEQUENTIAL.find(line) {
        let pos = m.end().saturating_sub(1);
        return diag(ErrorCategory::PipelineEmpty, line_num, pos, original_line, lang, color, &[])
            .with_hint(crate::localization::error_message(ErrorCategory::PipelineEmpty, lang, &[]));
    }

    if SOURCE_NO_EQ.is_match(line) {
        let pos = line.find("source").unwrap_or(0);
        return diag(ErrorCategory::SyntaxSource, line_num, pos, original_line, lang, color, &[]);
    }

    if TARGET_QUOTED.is_match(line) {
        let pos = line.find('[').unwrap_or(0);
        return diag(ErrorCategory::SyntaxTarget, line_num, pos, original_line, lang, color, &[]);
    }

    if line.contains("->") && line.contains(']') {
        if let Some(field_match) = FIELD_NO_TYPE.captures(line) {
            let field_pos = field_match.get(0).unwrap().end();
            if line[field_pos..].find('(').is_none() && !field_match[1].is_empty() {
                if let Some(arrow_pos) = line.rfind("->") {
                    if field_pos > arrow_pos {
                        return diag(ErrorCategory::FinalType, line_num, field_pos, original_line, lang, color, &[]);
                    }
                }
            }
        }
        if let Some(last_bracket) = line.rfind(']') {
            let after_bracket = &line[last_bracket..];
            if let Some(m) = TYPE_IN_PARENS.find(after_bracket) {
                let data_type = &m.as_str()[1..m.as_str().len() - 1];
                if !ALLOWED_TYPES.contains(&data_type) {
                    let pos = last_bracket + after_bracket.find('(').unwrap_or(0) + 1;
                    return diag(
                        ErrorCategory::InvalidType,
                        line_num,
                        pos,
                        original_line,
                        lang,
                        color,
                        &[("data_type", data_type)],
                    );
                }
            }
            if let (Some(open), Some(close)) = (after_bracket.find('('), after_bracket.find(')')) {
                if open < close && after_bracket[open + 1..close].trim().is_empty() {
                    let bracket_content = line[..last_bracket]
                        .rfind('[')
                        .map(|p| line[p + 1..last_bracket].trim())
                        .unwrap_or("");
                    if bracket_content.is_empty() {
                        return diag(
                            ErrorCategory::VoidType,
                            line_num,
                            last_bracket + 1,
                            original_line,
                            lang,
                            color,
                            &[],
                        );
                    }
                    return diag(
                        ErrorCategory::FinalType,
                        line_num,
                        last_bracket + open + 1,
                        original_line,
                        lang,
                        color,
                        &[],
                    );
                }
            }
        }
    }

    if line.contains(']') && line.contains('[') {
        let mut pos = None;
        for (end_pos, _) in line.match_indices(']') {
            let end_pos = end_pos + 1;
            if end_pos < line.len() - 1 {
                let rest = &line[end_pos..];
                let starts_arrow = rest.trim_start().starts_with("->")
                    || rest.trim_start().starts_with("=>")
                    || rest.trim_start().starts_with('-')
                    || rest.trim_start().starts_with('>')
                    || rest.trim_start().starts_with('(');
                if !starts_arrow && rest.contains('[') {
                    pos = Some(end_pos);
                    break;
                }
            }
        }
        if let Some(pos) = pos {
            return diag(ErrorCategory::FlowDirection, line_num, pos, original_line, lang, color, &[]);
        }
    }

    let pipe_count = line.matches('|').count();
    if pipe_count > 0 && pipe_count % 2 != 0 {
        let pos = line.rfind('|').unwrap();
        return diag(ErrorCategory::PipelineClosingBar, line_num, pos, original_line, lang, color, &[]);
    }

    let open = line.matches('[').count();
    let close = line.matches(']').count();
    if open != close {
        return diag(
            ErrorCategory::BracketMissing,
            line_num,
            position::bracket_missing(line),
            original_line,
            lang,
            color,
            &[],
        );
    }

    if let Some(caps) = OPENING_BRACKET_MISSING.captures(line) {
        let pos = caps.get(1).unwrap().start();
        return diag(ErrorCategory::BracketMissing, line_num, pos, original_line, lang, color, &[]);
    }

    diag(ErrorCategory::Unknown, line_num, 0, original_line, lang, color, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(src: &str) -> CompileResult<Vec<Token>> {
        tokenize(src, Lang::En, false)
    }

    #[test]
    fn minimal_program_produces_five_tokens() {
        let src = "lang=py\nsource=dict/my_dict\ntarget1=dict/my_new_dict\ntarget1:\n    [pointA] -> [pointB](str)\n";
        let tokens = tok(src).unwrap();
        assert_eq!(tokens.len(), 5);
        assert!(matches!(tokens[0].kind, TokenKind::Lang(_)));
        assert!(matches!(tokens[1].kind, TokenKind::Source(_)));
        assert!(matches!(tokens[2].kind, TokenKind::Target(_)));
        assert!(matches!(tokens[3].kind, TokenKind::RouteHeader(_)));
        assert!(matches!(tokens[4].kind, TokenKind::RouteLine(_)));
    }

    #[test]
    fn missing_lang_is_fatal() {
        let src = "source=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n";
        let err = tok(src).unwrap_err();
        assert!(err.to_string().contains("lang"));
    }

    #[test]
    fn double_pipe_is_fatal() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> || -> [b](str)\n";
        assert!(tok(src).is_err());
    }

    #[test]
    fn invalid_type_is_fatal() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](frobnicate)\n";
        assert!(tok(src).is_err());
    }

    #[test]
    fn comments_are_discarded() {
        let src = "lang=py\n# a note\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n";
        let tokens = tok(src).unwrap();
        assert_eq!(tokens.len(), 5);
    }

    #[test]
    fn global_var_infers_types() {
        let src = "lang=py\nsource=dict/x\n$n=42\n$f=4.5\n$b=true\n$s=\"hi\"\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n";
        let tokens = tok(src).unwrap();
        let globals: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::GlobalVar(g) => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(globals.len(), 4);
        assert_eq!(globals[0].value, GlobalVarValue::Int(42));
        assert_eq!(globals[1].value, GlobalVarValue::Float(4.5));
        assert_eq!(globals[2].value, GlobalVarValue::Bool(true));
        assert_eq!(globals[3].value, GlobalVarValue::Str("hi".to_string()));
    }

    #[test]
    fn route_line_with_pipeline_captures_segments() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> |*f(1)| -> [b](str)\n";
        let tokens = tok(src).unwrap();
        match &tokens[4].kind {
            TokenKind::RouteLine(r) => assert_eq!(r.pipeline_text, "*f(1)"),
            other => panic!("expected RouteLine, got {other:?}"),
        }
    }
}
