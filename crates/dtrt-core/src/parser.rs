//! Token-stream-to-AST parser: builds the [`ast::Program`] and performs
//! every scope-local semantic check (spec.md §4.2, §4.3). Grounded in
//! `dataroute/parser.py`'s `Parser.parse`, `_parse_route_line`,
//! `_parse_pipeline_items`, `_check_condition_vars` and
//! `_parse_conditional_expression`.

use crate::ast::{
    self, ConditionNode, ConditionSubType, DirectMapNode, EventKind, EventNode, FieldDst,
    FieldSrc, FuncCallNode, GlobalVarNode, GlobalVarUsageNode, PipelineItem, PipelineNode,
    Program, ProgramItem, RouteBlockNode, RouteLineNode, SourceNode, TargetNode,
};
use crate::diagnostic::{position, Diagnostic};
use crate::error::{CompileResult, ErrorCategory, SourceLocation};
use crate::localization::Lang;
use crate::splitter::{split_args, split_pipeline_segments};
use crate::token::{GlobalVarValue, Token, TokenKind};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static VAR_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$[A-Za-z0-9_.]+|\$\^([A-Za-z_]\w*)|\$([A-Za-z_]\w*)").unwrap());
static BRANCH_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(IF|ELIF|ELSE)\b").unwrap());
static EVENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(SKIP|ROLLBACK|NOTIFY)\((.*)\)$").unwrap());
static BARE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());
static FUNC_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*([A-Za-z_]\w*)\s*(?:\((.*)\))?$").unwrap());

/// A local variable registered by an earlier route line: its declared type
/// and the src field of the route that introduced it. Used to tell a
/// forward reference within the same src field apart from a legitimate
/// reference to an earlier route's output.
struct LocalVarInfo {
    origin_src_field: String,
}

struct ValidationCtx<'a> {
    lang: Lang,
    color: bool,
    current_src_field: &'a str,
    all_src_fields: &'a HashSet<String>,
    global_vars: &'a IndexMap<String, GlobalVarNode>,
    local_vars: &'a HashMap<String, LocalVarInfo>,
    available_funcs: Option<&'a HashSet<String>>,
}

fn diag(
    category: ErrorCategory,
    line_num: usize,
    col: usize,
    text: &str,
    ctx_lang: Lang,
    ctx_color: bool,
    params: &[(&str, &str)],
) -> Diagnostic {
    Diagnostic::new(category, SourceLocation::new(line_num, col), text, ctx_lang, ctx_color, params)
}

/// Parse a lexed token stream into a [`Program`], running every check
/// spec.md §4.2/§4.3 describes. `available_funcs`, when present, is the
/// closed set of resolvable function names (spec.md §4.6); `None` skips
/// function-existence checks entirely.
pub fn parse(
    tokens: &[Token],
    lang: Lang,
    color: bool,
    available_funcs: Option<&HashSet<String>>,
) -> CompileResult<Program> {
    let all_src_fields = collect_src_fields(tokens);

    let mut program = Program::default();
    let mut composite_keys: HashSet<String> = HashSet::new();
    let mut local_vars: HashMap<String, LocalVarInfo> = HashMap::new();
    let mut route_block_count = 0usize;

    let mut i = 0usize;
    while i < tokens.len() {
        let token = &tokens[i];
        match &token.kind {
            TokenKind::Lang(_) => {}

            TokenKind::Source(payload) => {
                program.children.push(ProgramItem::Source(SourceNode {
                    source_type: payload.source_type.clone(),
                    name: payload.name.clone(),
                    line: token.line,
                }));
            }

            TokenKind::Target(payload) => {
                let composite = format!("{}/{}", payload.target_type, payload.value);
                if composite_keys.contains(&composite) {
                    return Err(diag(
                        ErrorCategory::DuplicateTargetNameType,
                        token.line,
                        0,
                        &payload.original_line,
                        lang,
                        color,
                        &[("key", &composite)],
                    )
                    .into());
                }
                composite_keys.insert(composite);
                let node = TargetNode {
                    local_name: payload.local_name.clone(),
                    target_type: payload.target_type.clone(),
                    value: payload.value.clone(),
                    line: token.line,
                };
                program.targets.insert(payload.local_name.clone(), node.clone());
                program.children.push(ProgramItem::Target(node));
            }

            TokenKind::GlobalVar(payload) => {
                if program.global_vars.contains_key(&payload.name) {
                    return Err(diag(
                        ErrorCategory::DuplicateVar,
                        token.line,
                        0,
                        &payload.original_line,
                        lang,
                        color,
                        &[("name", &payload.name)],
                    )
                    .into());
                }
                let node = GlobalVarNode {
                    name: payload.name.clone(),
                    value: payload.value.clone(),
                    line: token.line,
                };
                program.global_vars.insert(payload.name.clone(), node.clone());
                program.children.push(ProgramItem::GlobalVar(node));
            }

            TokenKind::GlobalVarUsage(payload) => {
                program
                    .children
                    .push(ProgramItem::GlobalVarUsage(GlobalVarUsageNode {
                        var_name: payload.var_name.clone(),
                        line: token.line,
                    }));
            }

            TokenKind::RouteHeader(payload) => {
                if !program.targets.contains_key(&payload.target_local_name) {
                    return Err(diag(
                        ErrorCategory::SemanticTarget,
                        token.line,
                        0,
                        &payload.original_line,
                        lang,
                        color,
                        &[("name", &payload.target_local_name)],
                    )
                    .into());
                }

                let mut routes = Vec::new();
                let mut seen_finals: HashSet<String> = HashSet::new();
                i += 1;
                while let Some(Token { kind: TokenKind::RouteLine(rl), line }) = tokens.get(i) {
                    let route = parse_route_line(
                        rl,
                        *line,
                        lang,
                        color,
                        &all_src_fields,
                        &program.global_vars,
                        &mut local_vars,
                        available_funcs,
                    )?;

                    if let Some(dst) = &route.dst {
                        let normalized = dst.name.trim_start_matches('$').to_string();
                        if !seen_finals.insert(normalized.clone()) {
                            return Err(diag(
                                ErrorCategory::DuplicateFinalName,
                                route.line,
                                dst.column,
                                &rl.original_line,
                                lang,
                                color,
                                &[("name", &normalized)],
                            )
                            .into());
                        }
                    }

                    routes.push(route);
                    i += 1;
                }

                route_block_count += 1;
                program.children.push(ProgramItem::RouteBlock(RouteBlockNode {
                    target_local_name: payload.target_local_name.clone(),
                    routes,
                    line: token.line,
                }));
                continue;
            }

            TokenKind::RouteLine(_) => {
                // Orphaned route line with no preceding header; the lexer never
                // produces this on its own since a ROUTE_LINE only appears
                // inside a block, but guard anyway for a well-formed program.
            }
        }
        i += 1;
    }

    if route_block_count == 0 {
        return Err(diag(ErrorCategory::SemanticRoutes, 1, 0, "", lang, color, &[]).into());
    }

    Ok(program)
}

fn collect_src_fields(tokens: &[Token]) -> HashSet<String> {
    tokens
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::RouteLine(rl) => {
                let name = rl.src_field.trim();
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                }
            }
            _ => None,
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn parse_route_line(
    payload: &crate::token::RouteLinePayload,
    line: usize,
    lang: Lang,
    color: bool,
    all_src_fields: &HashSet<String>,
    global_vars: &IndexMap<String, GlobalVarNode>,
    local_vars: &mut HashMap<String, LocalVarInfo>,
    available_funcs: Option<&HashSet<String>>,
) -> CompileResult<RouteLineNode> {
    let original_line = &payload.original_line;
    let src_name = payload.src_field.trim().to_string();
    let src_column = original_line.find('[').map(|p| p + 1).unwrap_or(0);
    let src = FieldSrc { name: src_name.clone(), line, column: src_column };

    let dst_name = payload.target_field.trim().to_string();
    let ty = payload.target_field_type.clone();

    if dst_name.is_empty() && ty.is_some() {
        return Err(diag(
            ErrorCategory::VoidType,
            line,
            position::void_type(original_line),
            original_line,
            lang,
            color,
            &[],
        )
        .into());
    }
    if dst_name.starts_with("$$") {
        return Err(diag(
            ErrorCategory::ExternalVarWrite,
            line,
            position::final_type(original_line),
            original_line,
            lang,
            color,
            &[("name", &dst_name)],
        )
        .into());
    }
    if let Some(name) = dst_name.strip_prefix('$') {
        if global_vars.contains_key(name) {
            return Err(diag(
                ErrorCategory::GlobalVarWrite,
                line,
                position::final_type(original_line),
                original_line,
                lang,
                color,
                &[("name", name)],
            )
            .into());
        }
    }
    if !dst_name.is_empty() && ty.is_none() {
        return Err(diag(
            ErrorCategory::FinalType,
            line,
            position::final_type(original_line),
            original_line,
            lang,
            color,
            &[],
        )
        .into());
    }

    // The dst field's local variable is registered before the pipeline is
    // parsed (mirrors `parser.py::_parse_route_line`, which inserts into
    // `_local_vars` ahead of building the pipeline) so a route that both
    // declares `$s` as its dst and references `$s` in its own pipeline is
    // caught as a same-route forward reference (invalid-var-usage), not
    // reported as an undefined variable.
    let dst = if dst_name.is_empty() {
        None
    } else {
        let dst_column = original_line.rfind('[').map(|p| p + 1).unwrap_or(0);
        let key = dst_name.trim_start_matches('$').to_string();
        local_vars.insert(key, LocalVarInfo { origin_src_field: src_name.clone() });
        Some(FieldDst {
            name: dst_name,
            declared_type: ty,
            line,
            column: dst_column,
        })
    };

    let ctx = ValidationCtx {
        lang,
        color,
        current_src_field: &src_name,
        all_src_fields,
        global_vars,
        local_vars,
        available_funcs,
    };
    let pipeline = parse_pipeline(&payload.pipeline_text, line, original_line, &ctx)?;

    Ok(RouteLineNode { src, pipeline, dst, line, original_line: original_line.clone() })
}

fn parse_pipeline(
    text: &str,
    line: usize,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<PipelineNode> {
    let mut items = Vec::new();
    for segment in split_pipeline_segments(text) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        items.push(parse_pipeline_item(segment, line, original_line, ctx)?);
    }
    Ok(PipelineNode { items, line })
}

fn parse_pipeline_item(
    segment: &str,
    line: usize,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<PipelineItem> {
    if segment.starts_with('*') {
        return Ok(PipelineItem::FuncCall(parse_func_call(segment, line, original_line, ctx)?));
    }

    if BRANCH_KEYWORD.find(segment).map(|m| m.start()).unwrap_or(usize::MAX) == 0 {
        return Ok(PipelineItem::Condition(parse_condition(segment, line, original_line, ctx)?));
    }

    if let Some(caps) = EVENT.captures(segment) {
        let kind = match caps[1].to_uppercase().as_str() {
            "SKIP" => EventKind::Skip,
            "ROLLBACK" => EventKind::Rollback,
            _ => EventKind::Notify,
        };
        let message = caps[2].to_string();
        validate_var_refs(&message, line, original_line, ctx)?;
        return Ok(PipelineItem::Event(EventNode {
            kind,
            message,
            full_str: segment.to_string(),
            line,
        }));
    }

    if segment == "$this" || segment.starts_with("$$") {
        return Ok(PipelineItem::DirectMap(DirectMapNode {
            value: segment.to_string(),
            full_str: segment.to_string(),
            line,
            heuristic_warning: None,
        }));
    }

    validate_var_refs(segment, line, original_line, ctx)?;
    let heuristic_warning = if BARE_IDENTIFIER.is_match(segment) {
        Some(crate::localization::direct_mapping_without_star_warning(
            ctx.lang,
            segment,
            ctx.current_src_field,
        ))
    } else {
        None
    };
    Ok(PipelineItem::DirectMap(DirectMapNode {
        value: segment.to_string(),
        full_str: segment.to_string(),
        line,
        heuristic_warning,
    }))
}

fn parse_func_call(
    segment: &str,
    line: usize,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<FuncCallNode> {
    let caps = FUNC_CALL.captures(segment).ok_or_else(|| {
        diag(
            ErrorCategory::Unknown,
            line,
            original_line.find(segment).unwrap_or(0),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
    })?;
    let func_name = caps[1].to_string();
    let raw_args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let this_ref = format!("${}", ctx.current_src_field);
    let args: Vec<String> = split_args(raw_args)
        .into_iter()
        .map(|a| if a == this_ref { "$this".to_string() } else { a })
        .collect();

    if let Some(funcs) = ctx.available_funcs {
        if !funcs.contains(&func_name) {
            return Err(diag(
                ErrorCategory::FunctionNotFound,
                line,
                original_line.find(segment).unwrap_or(0),
                original_line,
                ctx.lang,
                ctx.color,
                &[("name", &func_name)],
            )
            .into());
        }
    }

    for arg in &args {
        validate_var_refs(arg, line, original_line, ctx)?;
    }

    Ok(FuncCallNode { func_name, args, full_str: segment.to_string(), line })
}

/// One `IF`/`ELIF`/`ELSE` branch, located within the raw segment text.
struct RawBranch<'a> {
    keyword: &'a str,
    body: &'a str,
    start: usize,
}

fn split_branches(segment: &str) -> Vec<RawBranch<'_>> {
    let matches: Vec<_> = BRANCH_KEYWORD.find_iter(segment).collect();
    let mut branches = Vec::with_capacity(matches.len());
    for (idx, m) in matches.iter().enumerate() {
        let end = matches.get(idx + 1).map(|n| n.start()).unwrap_or(segment.len());
        branches.push(RawBranch {
            keyword: m.as_str(),
            body: &segment[m.end()..end],
            start: m.start(),
        });
    }
    branches
}

fn parse_condition(
    segment: &str,
    line: usize,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<ConditionNode> {
    let branches = split_branches(segment);
    let first_keyword = branches.first().map(|b| b.keyword.to_uppercase());

    if first_keyword.as_deref() != Some("IF") {
        return Err(diag(
            ErrorCategory::ConditionMissingIf,
            line,
            position::condition_missing_if(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }

    let mut has_elif = false;
    let mut has_else = false;

    for branch in &branches {
        let keyword = branch.keyword.to_uppercase();
        match keyword.as_str() {
            "IF" | "ELIF" => {
                if keyword == "ELIF" {
                    has_elif = true;
                }
                validate_if_branch(branch, original_line, ctx)?;
            }
            "ELSE" => {
                has_else = true;
                validate_else_branch(branch, original_line, ctx)?;
            }
            _ => unreachable!("branch keyword regex only matches IF/ELIF/ELSE"),
        }
    }

    let sub_type = if has_elif {
        ConditionSubType::IfElifsElse
    } else if has_else {
        ConditionSubType::IfElse
    } else {
        ConditionSubType::If
    };

    Ok(ConditionNode { sub_type, full_str: segment.to_string(), line })
}

fn validate_if_branch(
    branch: &RawBranch,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<()> {
    let body = branch.body.trim_start();
    if !body.starts_with('(') {
        return Err(diag(
            ErrorCategory::ConditionMissingParenthesis,
            0,
            position::condition_missing_parenthesis(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }

    let close = find_matching_paren(body).ok_or_else(|| {
        diag(
            ErrorCategory::ConditionMissingParenthesis,
            0,
            position::condition_missing_parenthesis(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
    })?;
    let expr = &body[1..close];
    if expr.trim().is_empty() {
        return Err(diag(
            ErrorCategory::ConditionEmptyExpression,
            0,
            position::condition_empty_expression(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }

    let after_paren = body[close + 1..].trim_start();
    if !after_paren.starts_with(':') {
        return Err(diag(
            ErrorCategory::ConditionMissingColon,
            0,
            position::condition_missing_colon(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }
    let action = after_paren[1..].trim();
    if action.is_empty() {
        return Err(diag(
            ErrorCategory::ConditionInvalid,
            0,
            position::condition_invalid(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }

    validate_var_refs(expr, branch.start, original_line, ctx)?;
    validate_action(action, branch.start, original_line, ctx)?;
    Ok(())
}

fn validate_else_branch(
    branch: &RawBranch,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<()> {
    let body = branch.body.trim_start();
    if !body.starts_with(':') {
        let pos = original_line.to_lowercase().find("else").map(|p| p + 4).unwrap_or(0);
        return Err(diag(
            ErrorCategory::ConditionMissingColon,
            0,
            pos,
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }
    let action = body[1..].trim();
    if action.is_empty() {
        return Err(diag(
            ErrorCategory::ConditionInvalid,
            0,
            position::condition_invalid(original_line),
            original_line,
            ctx.lang,
            ctx.color,
            &[],
        )
        .into());
    }
    validate_action(action, branch.start, original_line, ctx)?;
    Ok(())
}

fn find_matching_paren(body: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (idx, ch) in body.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Validate a condition branch's action text: `*func` becomes a function
/// call (name resolution + arg checks), an event form is left unvalidated
/// beyond its variable references, everything else is a DirectMap-like
/// expression checked the same way pipeline args are.
fn validate_action(
    action: &str,
    line: usize,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<()> {
    if action.starts_with('*') {
        parse_func_call(action, line, original_line, ctx)?;
        return Ok(());
    }
    if EVENT.is_match(action) {
        if let Some(caps) = EVENT.captures(action) {
            validate_var_refs(&caps[2], line, original_line, ctx)?;
        }
        return Ok(());
    }
    validate_var_refs(action, line, original_line, ctx)
}

fn validate_var_refs(
    text: &str,
    line: usize,
    original_line: &str,
    ctx: &ValidationCtx,
) -> CompileResult<()> {
    for caps in VAR_REF.captures_iter(text) {
        let whole = caps.get(0).unwrap().as_str();
        if whole.starts_with("$$") {
            continue;
        }
        if let Some(pre_ref) = caps.get(1) {
            let name = pre_ref.as_str();
            if ctx.all_src_fields.contains(name) || ctx.local_vars.contains_key(name) {
                continue;
            }
            return Err(diag(
                ErrorCategory::UndefinedVar,
                line,
                position::var_reference(original_line, name),
                original_line,
                ctx.lang,
                ctx.color,
                &[("name", name)],
            )
            .into());
        }
        if let Some(named) = caps.get(2) {
            let name = named.as_str();
            if name == "this" || name == ctx.current_src_field {
                continue;
            }
            if ctx.all_src_fields.contains(name) && !ctx.local_vars.contains_key(name) {
                return Err(diag(
                    ErrorCategory::SrcFieldAsVar,
                    line,
                    position::var_reference(original_line, name),
                    original_line,
                    ctx.lang,
                    ctx.color,
                    &[("name", name)],
                )
                .into());
            }
            if ctx.global_vars.contains_key(name) {
                continue;
            }
            if let Some(info) = ctx.local_vars.get(name) {
                if info.origin_src_field == ctx.current_src_field {
                    return Err(diag(
                        ErrorCategory::InvalidVarUsage,
                        line,
                        position::var_reference(original_line, name),
                        original_line,
                        ctx.lang,
                        ctx.color,
                        &[("name", name)],
                    )
                    .into());
                }
                continue;
            }
            return Err(diag(
                ErrorCategory::UndefinedVar,
                line,
                position::var_reference(original_line, name),
                original_line,
                ctx.lang,
                ctx.color,
                &[("name", name)],
            )
            .into());
        }
    }
    Ok(())
}
