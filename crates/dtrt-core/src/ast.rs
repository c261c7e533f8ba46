//! Typed AST produced by the parser. Every node carries its originating
//! line so diagnostics raised later (by the IR generator or external-var
//! resolver) can still point at source. Grounded in
//! `dataroute/ast_nodes.py` for the node shapes and spec.md §9's "closed sum
//! type, pattern-matched visitor" design note: there is no `dyn` trait
//! object here, [`Visitor`] is dispatched by matching on [`ProgramItem`] and
//! [`PipelineItem`] in [`walk_program`].

use crate::token::GlobalVarValue;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceNode {
    pub source_type: String,
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetNode {
    pub local_name: String,
    pub target_type: String,
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVarNode {
    pub name: String,
    pub value: GlobalVarValue,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSrc {
    pub name: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDst {
    pub name: String,
    pub declared_type: Option<String>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Skip,
    Rollback,
    Notify,
}

impl EventKind {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Skip => "SKIP",
            Self::Rollback => "ROLLBACK",
            Self::Notify => "NOTIFY",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncCallNode {
    pub func_name: String,
    pub args: Vec<String>,
    pub full_str: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectMapNode {
    pub value: String,
    pub full_str: String,
    pub line: usize,
    /// Set when the parser could not tell this apart from a missing `*`
    /// function call — carries the heuristic warning text (spec.md §4.2).
    pub heuristic_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventNode {
    pub kind: EventKind,
    pub message: String,
    pub full_str: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConditionSubType {
    If,
    IfElse,
    IfElifsElse,
}

impl ConditionSubType {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::If => "if",
            Self::IfElse => "if_else",
            Self::IfElifsElse => "if_elifs_else",
        }
    }
}

/// A validated conditional pipeline item. Parsing only checks well-formedness
/// (branch keywords, parentheses, colons, variable references); the raw text
/// is re-parsed independently by the IR generator to build the nested
/// `if`/`elif_N`/`else` structure, mirroring `json_generator.py`'s
/// `visit_condition` which never consults the parser's intermediate state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    pub sub_type: ConditionSubType,
    pub full_str: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineItem {
    FuncCall(FuncCallNode),
    DirectMap(DirectMapNode),
    Condition(ConditionNode),
    Event(EventNode),
}

impl PipelineItem {
    pub fn line(&self) -> usize {
        match self {
            Self::FuncCall(n) => n.line,
            Self::DirectMap(n) => n.line,
            Self::Condition(n) => n.line,
            Self::Event(n) => n.line,
        }
    }

    pub fn full_str(&self) -> &str {
        match self {
            Self::FuncCall(n) => &n.full_str,
            Self::DirectMap(n) => &n.full_str,
            Self::Condition(n) => &n.full_str,
            Self::Event(n) => &n.full_str,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineNode {
    pub items: Vec<PipelineItem>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteLineNode {
    pub src: FieldSrc,
    pub pipeline: PipelineNode,
    pub dst: Option<FieldDst>,
    pub line: usize,
    pub original_line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteBlockNode {
    pub target_local_name: String,
    pub routes: Vec<RouteLineNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVarUsageNode {
    pub var_name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgramItem {
    Source(SourceNode),
    Target(TargetNode),
    RouteBlock(RouteBlockNode),
    GlobalVar(GlobalVarNode),
    GlobalVarUsage(GlobalVarUsageNode),
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub children: Vec<ProgramItem>,
    pub targets: IndexMap<String, TargetNode>,
    pub global_vars: IndexMap<String, GlobalVarNode>,
}

/// Pattern-matched visitor over the closed [`ProgramItem`]/[`PipelineItem`]
/// sum types. Every method has a no-op default so a consumer (e.g. the IR
/// generator) only overrides what it needs.
pub trait Visitor {
    fn visit_source(&mut self, _node: &SourceNode) {}
    fn visit_target(&mut self, _node: &TargetNode) {}
    fn visit_global_var(&mut self, _node: &GlobalVarNode) {}
    fn visit_global_var_usage(&mut self, _node: &GlobalVarUsageNode) {}
    fn visit_route_block(&mut self, _node: &RouteBlockNode) {}
    fn visit_route_line(&mut self, _node: &RouteLineNode) {}
}

/// Walk `program`'s top-level items in source order, dispatching to `visitor`
/// by pattern match. Route blocks recurse into their route lines; pipeline
/// traversal (func calls, conditions, events) is the IR generator's own
/// concern since it needs stateful substitution, not a generic callback.
pub fn walk_program(program: &Program, visitor: &mut impl Visitor) {
    for item in &program.children {
        match item {
            ProgramItem::Source(n) => visitor.visit_source(n),
            ProgramItem::Target(n) => visitor.visit_target(n),
            ProgramItem::GlobalVar(n) => visitor.visit_global_var(n),
            ProgramItem::GlobalVarUsage(n) => visitor.visit_global_var_usage(n),
            ProgramItem::RouteBlock(block) => {
                visitor.visit_route_block(block);
                for route in &block.routes {
                    visitor.visit_route_line(route);
                }
            }
        }
    }
}
