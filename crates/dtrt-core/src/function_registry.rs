//! Function registry: the closed set of `*func` names a program may call.
//! Enumerates a standard-library directory keyed by target language plus an
//! optional user directory, and rejects any name that appears in both.
//! Grounded in `dsl_compiler/_impl.py`'s `_collect_functions`.

use crate::diagnostic::Diagnostic;
use crate::error::{CompileResult, ErrorCategory, SourceLocation};
use crate::localization::Lang;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn fatal(category: ErrorCategory, params: &[(&str, &str)], lang: Lang, color: bool) -> Diagnostic {
    Diagnostic::new(category, SourceLocation::new(1, 0), "", lang, color, params)
}

/// Every source file directly under `dir` whose basename doesn't start with
/// `_` contributes its stem as a function name. A missing `dir` yields an
/// empty set rather than an error — callers that require the directory to
/// exist check that themselves (the standard-library directory always
/// exists; the user directory's presence is validated by its caller).
fn collect_stems(dir: &Path, extension: &str) -> HashSet<String> {
    let mut names = HashSet::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return names;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with('_') {
            continue;
        }
        names.insert(stem.to_string());
    }
    names
}

/// Resolve the target language to its standard-library subdirectory name.
/// Unknown languages are rejected by the lexer before this ever runs
/// (`UnsupportedTargetLang`), so this only needs to cover the supported set.
fn lang_folder(dsl_lang: &str) -> Option<&'static str> {
    match dsl_lang.to_lowercase().as_str() {
        "py" | "python" => Some("python"),
        _ => None,
    }
}

/// Build the available-function set for `dsl_lang`, combining the standard
/// library (rooted at `std_func_root`, one subdirectory per language) with
/// an optional user directory. A user directory that is specified but
/// absent, or any name shared between the two sources, is fatal.
pub fn collect_functions(
    std_func_root: &Path,
    dsl_lang: &str,
    user_dir: Option<&Path>,
    lang: Lang,
    color: bool,
) -> CompileResult<HashSet<String>> {
    let folder = lang_folder(dsl_lang).ok_or_else(|| {
        fatal(ErrorCategory::UnsupportedTargetLang, &[("lang", dsl_lang)], lang, color)
    })?;

    let std_dir = std_func_root.join(folder);
    let std_funcs = collect_stems(&std_dir, "py");

    let user_funcs = match user_dir {
        Some(dir) => {
            if !dir.is_dir() {
                return Err(fatal(
                    ErrorCategory::FunctionFolderNotFound,
                    &[("folder", &dir.display().to_string())],
                    lang,
                    color,
                )
                .into());
            }
            collect_stems(dir, "py")
        }
        None => HashSet::new(),
    };

    let conflicts: Vec<&String> = std_funcs.intersection(&user_funcs).collect();
    if let Some(first) = conflicts.first() {
        return Err(fatal(ErrorCategory::FunctionConflict, &[("name", first)], lang, color).into());
    }

    Ok(std_funcs.into_iter().chain(user_funcs).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn collects_std_and_user_functions() {
        let root = tempfile::tempdir().unwrap();
        let std_dir = root.path().join("python");
        fs::create_dir_all(&std_dir).unwrap();
        touch(&std_dir, "uppercase.py");
        touch(&std_dir, "_helper.py");

        let user = tempfile::tempdir().unwrap();
        touch(user.path(), "custom.py");

        let funcs =
            collect_functions(root.path(), "py", Some(user.path()), Lang::En, false).unwrap();
        assert!(funcs.contains("uppercase"));
        assert!(funcs.contains("custom"));
        assert!(!funcs.contains("_helper"));
    }

    #[test]
    fn conflicting_names_are_fatal() {
        let root = tempfile::tempdir().unwrap();
        let std_dir = root.path().join("python");
        fs::create_dir_all(&std_dir).unwrap();
        touch(&std_dir, "shared.py");

        let user = tempfile::tempdir().unwrap();
        touch(user.path(), "shared.py");

        assert!(collect_functions(root.path(), "py", Some(user.path()), Lang::En, false).is_err());
    }

    #[test]
    fn missing_user_directory_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("python")).unwrap();
        let missing = root.path().join("does-not-exist");
        assert!(collect_functions(root.path(), "py", Some(&missing), Lang::En, false).is_err());
    }

    #[test]
    fn unsupported_language_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        assert!(collect_functions(root.path(), "rs", None, Lang::En, false).is_err());
    }

    #[test]
    fn absent_user_directory_argument_is_fine() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("python")).unwrap();
        assert!(collect_functions(root.path(), "py", None, Lang::En, false).is_ok());
    }
}
