//! Two-language message catalog and markup-aware color rendering.
//!
//! Every diagnostic message and hint is authored once per language and
//! looked up by [`ErrorCategory`](crate::error::ErrorCategory). Messages may
//! contain `{param}` placeholders, substituted by [`render`], and inline
//! color markup of the form `>TAG<` (`R`, `G`, `Y`, `O`, `BOLD`, `RS`),
//! resolved to ANSI escapes when color is enabled or stripped otherwise.
//! Grounded in `original_source/src/dataroute/localization.py` and
//! `mess_core.py`.

use crate::error::ErrorCategory;
use once_cell::sync::Lazy;
use regex::Regex;

/// The language a diagnostic is rendered in. Distinct from the DSL's own
/// `lang=` directive, which names the *target* language for transformation
/// functions (see [`crate::function_registry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    Ru,
    En,
}

impl Lang {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ru" => Some(Self::Ru),
            "en" => Some(Self::En),
            _ => None,
        }
    }
}

impl Default for Lang {
    fn default() -> Self {
        Self::En
    }
}

/// A single named substitution for a message template, e.g. `("var_name",
/// "foo")`.
pub type Params<'a> = &'a [(&'a str, &'a str)];

fn substitute(template: &str, params: Params) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Returns the (ru, en) error-message templates for a category.
fn error_templates(category: ErrorCategory) -> (&'static str, &'static str) {
    use ErrorCategory::*;
    match category {
        PipelineClosingBar => (
            "Не закрыта вертикальная черта пайплайна",
            "Pipeline's closing `|` is missing",
        ),
        BracketMissing => (
            "Отсутствует или неверно расставлена квадратная скобка",
            "A square bracket is missing or mismatched",
        ),
        FlowDirection => (
            "Отсутствует символ направления потока после `]`",
            "A flow-direction arrow is missing after `]`",
        ),
        FinalType => (
            "Для целевого поля не указан тип в круглых скобках",
            "The destination field is missing its `(type)` annotation",
        ),
        VoidType => (
            "Пустому полю `[]` нельзя указывать тип",
            "An empty `[]` field must not carry a type",
        ),
        SyntaxSource => (
            "Некорректный синтаксис директивы source=",
            "Malformed `source=` directive",
        ),
        SyntaxTarget => (
            "Некорректный синтаксис объявления цели",
            "Malformed target declaration",
        ),
        SemanticTarget => (
            "Маршрут ссылается на необъявленную цель `{target}`",
            "Route block references undeclared target `{target}`",
        ),
        SemanticRoutes => (
            "Программа не содержит ни одного блока маршрутов",
            "Program declares no route blocks",
        ),
        PipelineEmpty => (
            "Пустой пайплайн `||`",
            "Empty pipeline `||`",
        ),
        InvalidType => (
            "Недопустимый тип данных `{data_type}`",
            "`{data_type}` is not an allowed destination type",
        ),
        UndefinedVar => (
            "Переменная `${var_name}` не определена",
            "Variable `${var_name}` is undefined",
        ),
        InvalidVarUsage => (
            "Переменная `${var_name}` используется до своего определения",
            "Variable `${var_name}` is used before it is defined on this route",
        ),
        SrcFieldAsVar => (
            "`{var_name}` — это поле источника другого маршрута, а не переменная",
            "`{var_name}` is another route's source field, not a variable",
        ),
        DuplicateFinalName => (
            "Дублирующееся конечное имя `{final_name}` в блоке маршрутов",
            "Duplicate destination name `{final_name}` within this route block",
        ),
        DuplicateTargetNameType => (
            "Дублирующийся составной ключ цели `{target_type}`",
            "Duplicate target composite key `{target_type}`",
        ),
        DuplicateVar => (
            "Глобальная переменная `${var_name}` уже объявлена",
            "Global variable `${var_name}` is already declared",
        ),
        ConditionMissingIf => (
            "`ELSE` без предшествующего `IF`",
            "`ELSE` with no preceding `IF`",
        ),
        ConditionMissingParenthesis => (
            "После `IF`/`ELIF` ожидаются круглые скобки с условием",
            "`IF`/`ELIF` must be followed by a parenthesized condition",
        ),
        ConditionEmptyExpression => (
            "Пустое условное выражение в скобках",
            "Empty condition expression inside the parentheses",
        ),
        ConditionMissingColon => (
            "Отсутствует `:` после условия",
            "Missing `:` after the condition",
        ),
        ConditionInvalid => (
            "Некорректное условное выражение",
            "Malformed conditional expression",
        ),
        FunctionNotFound => (
            "Функция `*{func_name}` не найдена в реестре функций",
            "Function `*{func_name}` was not found in the function registry",
        ),
        FunctionConflict => (
            "Функция `{func_name}` определена и в стандартной, и в пользовательской папке",
            "Function `{func_name}` is defined in both the standard and user directories",
        ),
        FunctionFolderNotFound => (
            "Папка с пользовательскими функциями `{folder}` не найдена",
            "User function directory `{folder}` was not found",
        ),
        VarsFolderNotFound => (
            "Папка с внешними переменными `{folder}` не найдена",
            "External-variable directory `{folder}` was not found",
        ),
        ExternalVarFileNotFound => (
            "Файл внешних переменных `{file}` не найден",
            "External-variable file `{file}` was not found",
        ),
        ExternalVarPathNotFound => (
            "Путь `{path}` не найден во внешних переменных",
            "Path `{path}` does not resolve in the external variables",
        ),
        ExternalVarWrite => (
            "Нельзя записывать во внешнюю переменную `{field}`",
            "Cannot write to an external variable `{field}`",
        ),
        GlobalVarWrite => (
            "Нельзя записывать в глобальную переменную `{field}`",
            "Cannot write to a global variable `{field}`",
        ),
        UndefinedGlobalVar => (
            "Глобальная переменная `${var_name}` не определена",
            "Global variable `${var_name}` is undefined",
        ),
        MissingTargetLang => (
            "Отсутствует обязательная директива `lang=`",
            "Required `lang=` directive is missing",
        ),
        UnsupportedTargetLang => (
            "Неподдерживаемый целевой язык `{lang}`",
            "Unsupported target language `{lang}`",
        ),
        Unknown => (
            "Не удалось классифицировать строку",
            "Could not classify this line",
        ),
    }
}

/// Returns the (ru, en) hint templates for a category, or `None` when the
/// category has no standard hint (mirrors categories the original raises
/// with `suggestion=None`).
fn hint_templates(category: ErrorCategory) -> Option<(&'static str, &'static str)> {
    use ErrorCategory::*;
    Some(match category {
        PipelineClosingBar => ("Добавьте закрывающую `|` в конце пайплайна", "Add a closing `|` to terminate the pipeline"),
        BracketMissing => ("Проверьте парность `[` и `]`", "Check that every `[` has a matching `]`"),
        FlowDirection => ("Используйте один из символов направления: ->, =>, -, >, >>", "Use one of the flow arrows: ->, =>, -, >, >>"),
        FinalType => ("Укажите тип в скобках, например `(str)`", "Add a `(type)` annotation, e.g. `(str)`"),
        VoidType => ("Уберите тип у пустого поля `[]`", "Remove the type annotation from the empty `[]` field"),
        SyntaxSource => ("Используйте форму `source=<type>/<name>`", "Use the form `source=<type>/<name>`"),
        SyntaxTarget => ("Используйте форму `<local>=<type>/<value>`", "Use the form `<local>=<type>/<value>`"),
        SemanticTarget => ("Объявите `{target}=<type>/<value>` перед блоком маршрутов", "Declare `{target}=<type>/<value>` before this route block"),
        SemanticRoutes => ("Добавьте хотя бы один блок `<local>:` с маршрутами", "Add at least one `<local>:` route block"),
        PipelineEmpty => ("Уберите лишнюю вертикальную черту", "Remove the stray `|`"),
        InvalidType => ("Допустимые типы: {allowed_types}", "Allowed types: {allowed_types}"),
        UndefinedVar => ("Объявите переменную как глобальную или как конечное поле более раннего маршрута", "Declare the variable as a global, or as an earlier route's destination field"),
        InvalidVarUsage => ("Сошлитесь на переменную в более позднем маршруте", "Reference the variable from a later route instead"),
        SrcFieldAsVar => ("Чтобы сослаться на значение поля, объявите его конечным именем в каком-либо маршруте", "To reference a field's value, give it a destination name in some route first"),
        DuplicateFinalName => ("Используйте уникальное конечное имя в пределах блока маршрутов", "Use a destination name unique within this route block"),
        DuplicateTargetNameType => ("Каждая пара {{type}}/{{name}} должна объявляться только один раз", "Each {{type}}/{{name}} pair must be declared only once"),
        DuplicateVar => ("Переименуйте одну из переменных", "Rename one of the variables"),
        ConditionMissingIf => ("Добавьте ветку `IF(...):` перед `ELSE`", "Add an `IF(...):` branch before `ELSE`"),
        ConditionMissingParenthesis => ("Оберните условие в скобки: `IF(условие):`", "Wrap the condition in parentheses: `IF(condition):`"),
        ConditionEmptyExpression => ("Добавьте условное выражение внутри скобок", "Add a condition expression inside the parentheses"),
        ConditionMissingColon => ("Добавьте `:` после условия", "Add a `:` after the condition"),
        ConditionInvalid => ("Проверьте синтаксис ветки `{key}`", "Check the syntax of the `{key}` branch"),
        FunctionNotFound => ("Проверьте имя функции в папке {func_folder}", "Check the function name against {func_folder}"),
        FunctionConflict => ("Переименуйте пользовательскую функцию", "Rename the user-provided function"),
        FunctionFolderNotFound => ("Укажите существующую папку с функциями", "Point to an existing function directory"),
        VarsFolderNotFound => ("Укажите существующую папку с JSON-файлами", "Point to an existing directory of JSON files"),
        ExternalVarFileNotFound => ("Проверьте имя файла без расширения `.json`", "Check the filename without its `.json` extension"),
        ExternalVarPathNotFound => ("Проверьте путь внутри JSON-файла", "Check the path inside the JSON file"),
        ExternalVarWrite => ("Запись возможна только в обычные или глобальные переменные", "Only plain or global variables can be written to"),
        GlobalVarWrite => ("Используйте локальное конечное имя без `$`", "Use a plain destination name without `$`"),
        UndefinedGlobalVar => ("Объявите `${var_name}=<значение>` перед использованием", "Declare `${var_name}=<value>` before use"),
        MissingTargetLang => ("Добавьте строку `lang=py`", "Add a `lang=py` line"),
        UnsupportedTargetLang => ("Поддерживаемые языки: py", "Supported languages: py"),
        Unknown => return None,
    })
}

/// Render an error message for `category` in `lang`, substituting `params`.
pub fn error_message(category: ErrorCategory, lang: Lang, params: Params) -> String {
    let (ru, en) = error_templates(category);
    substitute(if lang == Lang::Ru { ru } else { en }, params)
}

/// Render the standard hint for `category` in `lang`, if one exists.
pub fn error_hint(category: ErrorCategory, lang: Lang, params: Params) -> Option<String> {
    hint_templates(category).map(|(ru, en)| substitute(if lang == Lang::Ru { ru } else { en }, params))
}

/// Localized label prefixing a hint line, e.g. "Possible solution:".
pub fn hint_label(lang: Lang) -> &'static str {
    match lang {
        Lang::Ru => "Возможное решение:",
        Lang::En => "Possible solution:",
    }
}

/// Localized "Error in line N:" header.
pub fn line_prefix(lang: Lang, line_num: usize) -> String {
    match lang {
        Lang::Ru => format!("Ошибка в строке {line_num}:"),
        Lang::En => format!("Error in line {line_num}:"),
    }
}

/// Localized "Warning in line N:" header, for non-fatal diagnostics such as
/// the bare-identifier-as-direct-map heuristic (spec.md §4.2).
pub fn warning_prefix(lang: Lang, line_num: usize) -> String {
    match lang {
        Lang::Ru => format!("Предупреждение в строке {line_num}:"),
        Lang::En => format!("Warning in line {line_num}:"),
    }
}

/// Non-fatal warning emitted when a pipeline segment looks like a bare
/// identifier rather than a `*function` call; the parser still lowers it as
/// a `DirectMap`. Grounded in `_impl.py`'s `Messages.Warning.DIRECT_MAPPING_WITHOUT_STAR`.
pub fn direct_mapping_without_star_warning(lang: Lang, value: &str, src_field: &str) -> String {
    let params: &[(&str, &str)] = &[("value", value), ("src_field", src_field)];
    let (ru, en) = (
        "Сегмент `{value}` выглядит как поле `${src_field}` без вызова функции `*`; обработан как прямое отображение",
        "Segment `{value}` looks like field `${src_field}` without a `*` function call; treated as a direct map",
    );
    substitute(if lang == Lang::Ru { ru } else { en }, params)
}

static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r">([A-Z]+)<").unwrap());

fn ansi_for(tag: &str) -> &'static str {
    match tag {
        "RS" => "\u{1b}[0m",
        "G" => "\u{1b}[32m",
        "R" => "\u{1b}[31m",
        "Y" => "\u{1b}[33m",
        "O" => "\u{1b}[38;5;208m",
        "BOLD" => "\u{1b}[1m",
        _ => "",
    }
}

/// Resolve or strip `>TAG<` markup in `text` depending on `color`.
pub fn colorize(text: &str, color: bool) -> String {
    if !color {
        return MARKUP.replace_all(text, "").into_owned();
    }
    MARKUP
        .replace_all(text, |caps: &regex::Captures| ansi_for(&caps[1]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_named_params() {
        let msg = error_message(ErrorCategory::InvalidType, Lang::En, &[("data_type", "frobnicate")]);
        assert!(msg.contains("frobnicate"));
    }

    #[test]
    fn strips_markup_when_color_disabled() {
        assert_eq!(colorize(">R<bad>RS<", false), "bad");
    }

    #[test]
    fn resolves_markup_when_color_enabled() {
        let rendered = colorize(">R<bad>RS<", true);
        assert!(rendered.starts_with("\u{1b}[31m"));
        assert!(rendered.ends_with("\u{1b}[0m"));
    }

    #[test]
    fn every_category_has_a_message_in_both_languages() {
        use ErrorCategory::*;
        let all = [
            PipelineClosingBar, BracketMissing, FlowDirection, FinalType, VoidType,
            SyntaxSource, SyntaxTarget, SemanticTarget, SemanticRoutes, PipelineEmpty,
            InvalidType, UndefinedVar, InvalidVarUsage, SrcFieldAsVar, DuplicateFinalName,
            DuplicateTargetNameType, DuplicateVar, ConditionMissingIf, ConditionMissingParenthesis,
            ConditionEmptyExpression, ConditionMissingColon, ConditionInvalid,
            FunctionNotFound, FunctionConflict, FunctionFolderNotFound,
            VarsFolderNotFound, ExternalVarFileNotFound, ExternalVarPathNotFound,
            ExternalVarWrite, GlobalVarWrite, UndefinedGlobalVar, MissingTargetLang,
            UnsupportedTargetLang, Unknown,
        ];
        for cat in all {
            assert!(!error_message(cat, Lang::Ru, &[]).is_empty());
            assert!(!error_message(cat, Lang::En, &[]).is_empty());
        }
    }
}
