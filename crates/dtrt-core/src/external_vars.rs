//! External variable resolver: loads every `*.json` file in a directory at
//! startup, then answers dotted-path lookups of the form `$$<stem>.<p1>…`.
//! Grounded in `json_generator.py`'s `_load_external_vars` and
//! `get_external_var_value`.

use crate::diagnostic::Diagnostic;
use crate::error::{CompileResult, ErrorCategory, SourceLocation};
use crate::localization::Lang;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// The loaded tree of every external-var JSON file, keyed by filename stem.
#[derive(Debug, Clone, Default)]
pub struct ExternalVars {
    files: HashMap<String, Value>,
}

fn fatal(category: ErrorCategory, line: usize, col: usize, params: &[(&str, &str)], lang: Lang, color: bool) -> Diagnostic {
    Diagnostic::new(category, SourceLocation::new(line, col), "", lang, color, params)
}

impl ExternalVars {
    /// Load every `*.json` file directly under `dir`. A missing directory is
    /// fatal (spec.md §4.5); an unreadable individual file is skipped, not
    /// fatal, mirroring the original's best-effort load loop.
    pub fn load(dir: &Path, lang: Lang, color: bool) -> CompileResult<Self> {
        if !dir.is_dir() {
            return Err(fatal(
                ErrorCategory::VarsFolderNotFound,
                1,
                0,
                &[("folder", &dir.display().to_string())],
                lang,
                color,
            )
            .into());
        }
        let mut files = HashMap::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(text) = fs::read_to_string(&path) else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            files.insert(stem.to_string(), value);
        }
        Ok(Self { files })
    }

    /// Resolve `$$<stem>.<p1>.<p2>…` by traversing the cached tree: a dict
    /// key, or a numeric index into a list. Any miss is fatal, anchored at
    /// `line`/`col` from the referencing AST node.
    pub fn resolve(
        &self,
        var_path: &str,
        line: usize,
        col: usize,
        original_line: &str,
        lang: Lang,
        color: bool,
    ) -> CompileResult<Value> {
        let stripped = var_path.strip_prefix("$$").unwrap_or(var_path);
        let mut parts = stripped.split('.');
        let file_name = parts.next().unwrap_or("");

        let Some(mut current) = self.files.get(file_name) else {
            return Err(Diagnostic::new(
                ErrorCategory::ExternalVarFileNotFound,
                SourceLocation::new(line, col),
                original_line,
                lang,
                color,
                &[("file", file_name)],
            )
            .into());
        };

        let mut so_far = file_name.to_string();
        for part in parts {
            so_far.push('.');
            so_far.push_str(part);
            current = match current {
                Value::Object(map) => match map.get(part) {
                    Some(v) => v,
                    None => {
                        return Err(Diagnostic::new(
                            ErrorCategory::ExternalVarPathNotFound,
                            SourceLocation::new(line, col),
                            original_line,
                            lang,
                            color,
                            &[("path", &so_far)],
                        )
                        .into())
                    }
                },
                Value::Array(list) => match part.parse::<usize>().ok().and_then(|i| list.get(i)) {
                    Some(v) => v,
                    None => {
                        return Err(Diagnostic::new(
                            ErrorCategory::ExternalVarPathNotFound,
                            SourceLocation::new(line, col),
                            original_line,
                            lang,
                            color,
                            &[("path", &so_far)],
                        )
                        .into())
                    }
                },
                _ => {
                    return Err(Diagnostic::new(
                        ErrorCategory::ExternalVarPathNotFound,
                        SourceLocation::new(line, col),
                        original_line,
                        lang,
                        color,
                        &[("path", &so_far)],
                    )
                    .into())
                }
            };
        }
        Ok(current.clone())
    }
}

/// Render a resolved JSON value the way substitution inlines it into a
/// pipeline parameter string: structured values are spelled out with
/// `json.dumps`'s default separators (`", "` / `": "`, the Python original
/// never passes `separators=`), strings pass through raw, everything else
/// gets its JSON spelling.
pub fn spelling(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => python_style_json(value),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// `serde_json::to_string` has no item/key separators; Python's `json.dumps`
/// defaults to `", "` and `": "`. Reproduce that spacing so substituted
/// structured values read the way the original's output did.
fn python_style_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(python_style_json).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", serde_json::to_string(k).unwrap_or_default(), python_style_json(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::String(s) => serde_json::to_string(s).unwrap_or_default(),
        other => other.to_string(),
    }
}
