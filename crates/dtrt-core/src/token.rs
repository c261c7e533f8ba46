//! Token kinds and payloads produced by the lexer. Grounded in
//! `dsl_compiler/lexer.py`'s `Token` dataclass and `TokenType` enum.

use serde::Serialize;

/// The set of destination field types the DSL accepts. Any other identifier
/// inside a `(type)` annotation is rejected.
pub const ALLOWED_TYPES: &[&str] = &[
    "str", "int", "float", "bool", "dict", "list", "tuple", "set", "datetime", "date", "time",
    "Decimal", "uuid", "bytes", "any",
];

/// Target languages the function registry's standard library is organized
/// by. Only `py` is shipped; an unrecognized `lang=` value is fatal.
pub const SUPPORTED_TARGET_LANGUAGES: &[&str] = &["py"];

/// Arrow tokens accepted between pipeline segments, longest-match order
/// matters for `->`/`-` and `>>`/`>`.
pub const ARROWS: &[&str] = &["->", "=>", ">>", "-", ">"];

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePayload {
    pub source_type: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetPayload {
    pub local_name: String,
    pub target_type: String,
    pub value: String,
    pub original_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value")]
pub enum GlobalVarValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl GlobalVarValue {
    pub fn inferred_type(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
        }
    }

    /// JSON-serialized spelling, used by the IR generator's substitution
    /// rule (spec.md §9 "External-var values in IR").
    pub fn json_spelling(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVarPayload {
    pub name: String,
    pub value: GlobalVarValue,
    pub original_line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteLinePayload {
    pub src_field: String,
    pub pipeline_text: String,
    pub target_field: String,
    pub target_field_type: Option<String>,
    pub original_line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVarUsagePayload {
    pub var_name: String,
    pub original_line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteHeaderPayload {
    pub target_local_name: String,
    pub original_line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Lang(String),
    Source(SourcePayload),
    Target(TargetPayload),
    RouteHeader(RouteHeaderPayload),
    RouteLine(RouteLinePayload),
    GlobalVar(GlobalVarPayload),
    GlobalVarUsage(GlobalVarUsagePayload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}
