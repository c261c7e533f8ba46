//! Compilation orchestrator: source-kind detection, stage sequencing, and
//! IR rendering. Grounded in spec.md §4.9's control-flow note ("Function
//! Registry populated before the Parser runs... External-var Resolver
//! consulted by the IR Generator") and in `depyler-core`'s `DepylerPipeline`
//! builder — a `with_*`-configured struct holding no global state, so a
//! single process can run several independent compilations with different
//! settings (spec.md §5).

use crate::error::{CompileResult, ErrorCategory};
use crate::external_vars::ExternalVars;
use crate::localization::Lang;
use crate::{function_registry, ir, lexer, parser, token::TokenKind};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Per-compilation settings: diagnostics language and color, and the DSL's
/// own `debug` gate (spec.md §4.7's `Debug`-class messages). Never stored
/// behind a `static`/`once_cell` — threaded explicitly through every stage.
#[derive(Debug, Clone, Copy)]
pub struct CompilationConfig {
    pub lang: Lang,
    pub color: bool,
    pub debug: bool,
}

impl Default for CompilationConfig {
    fn default() -> Self {
        Self { lang: Lang::En, color: false, debug: false }
    }
}

/// Where a `source` argument's text actually lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SourceKind {
    Path(PathBuf),
    Inline(String),
}

static ARROW_TOKENS: [&str; 5] = ["->", "=>", ">>", "-", ">"];

/// Classify `source` the way spec.md §4.9 describes: a `.txt`/`.dtrt`
/// extension or actual filesystem presence means "this is a path"; the
/// presence of an arrow token (route-line syntax can't appear in a bare
/// filename) means "this is inline DSL text". Extension/arrow checks run
/// before the filesystem probe so a relative path that happens not to exist
/// yet still gets a clear "file not found" instead of being silently
/// swallowed as inline text.
fn classify_source(source: &str) -> SourceKind {
    let path = Path::new(source);
    let has_dsl_extension = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("dtrt")
    );
    if has_dsl_extension {
        return SourceKind::Path(path.to_path_buf());
    }
    if ARROW_TOKENS.iter().any(|a| source.contains(a)) {
        return SourceKind::Inline(source.to_string());
    }
    if path.exists() {
        return SourceKind::Path(path.to_path_buf());
    }
    SourceKind::Inline(source.to_string())
}

/// The compiler's entry point, built up via `with_*` before a `compile`
/// call. Mirrors `DepylerPipeline`'s shape: immutable once constructed,
/// cheap to clone, no interior mutability.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: CompilationConfig,
    std_func_root: Option<PathBuf>,
    user_func_dir: Option<PathBuf>,
    vars_dir: Option<PathBuf>,
}

impl Engine {
    pub fn new(config: CompilationConfig) -> Self {
        Self { config, std_func_root: None, user_func_dir: None, vars_dir: None }
    }

    /// Root directory containing one subdirectory per target language
    /// (e.g. `python/`) of standard-library functions. Omitting this
    /// disables function-existence checking entirely (spec.md §4.6).
    pub fn with_std_func_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.std_func_root = Some(dir.into());
        self
    }

    pub fn with_user_func_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_func_dir = Some(dir.into());
        self
    }

    pub fn with_vars_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vars_dir = Some(dir.into());
        self
    }

    /// Run the full pipeline against `source` — a file path or inline DSL
    /// text (spec.md §4.9) — and return the generated IR.
    pub fn compile(&self, source: &str) -> CompileResult<Value> {
        let text = match classify_source(source) {
            SourceKind::Path(path) => {
                tracing::debug!(path = %path.display(), "loading source file");
                std::fs::read_to_string(&path)?
            }
            SourceKind::Inline(text) => text,
        };
        self.compile_text(&text)
    }

    /// Run the full pipeline against DSL text that has already been
    /// resolved (no source-kind detection). Exposed so a caller that
    /// already has the text in hand (a test, an editor integration) doesn't
    /// pay for a filesystem probe.
    pub fn compile_text(&self, text: &str) -> CompileResult<Value> {
        let CompilationConfig { lang, color, .. } = self.config;

        tracing::debug!("tokenizing");
        let tokens = lexer::tokenize(text, lang, color)?;

        let available_funcs = match &self.std_func_root {
            Some(root) => {
                let dsl_lang = dsl_lang_of(&tokens, lang, color)?;
                tracing::debug!(%dsl_lang, "building function registry");
                Some(function_registry::collect_functions(
                    root,
                    &dsl_lang,
                    self.user_func_dir.as_deref(),
                    lang,
                    color,
                )?)
            }
            None => None,
        };

        tracing::debug!("parsing");
        let program = parser::parse(&tokens, lang, color, available_funcs.as_ref())?;

        let external_vars = match &self.vars_dir {
            Some(dir) => {
                tracing::debug!(dir = %dir.display(), "loading external variables");
                ExternalVars::load(dir, lang, color)?
            }
            None => ExternalVars::default(),
        };

        tracing::debug!("generating IR");
        ir::generate(&program, &external_vars, lang, color)
    }
}

/// Pull the DSL's own `lang=` value out of an already-lexed token stream.
/// The lexer has already rejected an unsupported value, so this only needs
/// to find the one `Lang` token the lexer guarantees exists.
fn dsl_lang_of(tokens: &[crate::token::Token], lang: Lang, color: bool) -> CompileResult<String> {
    tokens
        .iter()
        .find_map(|t| match &t.kind {
            TokenKind::Lang(value) => Some(value.clone()),
            _ => None,
        })
        .ok_or_else(|| {
            crate::diagnostic::Diagnostic::new(
                ErrorCategory::MissingTargetLang,
                crate::error::SourceLocation::new(1, 0),
                "",
                lang,
                color,
                &[],
            )
            .into()
        })
}

/// Render `ir` as indented JSON, the way spec.md §6.4 describes ("optional
/// rendering as indented JSON").
pub fn render_ir(ir: &Value) -> String {
    serde_json::to_string_pretty(ir).unwrap_or_default()
}
