//! IR generator: walks the AST and produces the JSON IR described in
//! spec.md §3, performing the final external-var and global-var
//! substitutions along the way. Grounded in `json_generator.py`'s
//! `visit_*` methods — `visit_route_line`'s void-key/list-coercion
//! behavior, `visit_func_call`/`visit_direct_map`'s substitution order,
//! `visit_condition`'s from-raw-text re-parse, and `visit_event`'s
//! deliberate lack of substitution.

use crate::ast::{self, GlobalVarNode, PipelineItem, Program, RouteLineNode};
use crate::error::CompileResult;
use crate::external_vars::{self, ExternalVars};
use crate::localization::Lang;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

static EXTERNAL_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\$[A-Za-z0-9_.]+").unwrap());
static GLOBAL_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([A-Za-z_]\w*)").unwrap());
static BRANCH_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(IF|ELIF|ELSE)\b").unwrap());
static IF_ELIF_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^(?:IF|ELIF)\s*\(([^)]*)\)\s*:\s*(.*)$").unwrap());
static ELSE_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^ELSE\s*:\s*(.*)$").unwrap());
static EVENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(SKIP|ROLLBACK|NOTIFY)\((.*)\)$").unwrap());

struct IrGenerator<'a> {
    result: Map<String, Value>,
    source: Option<(String, String)>,
    target_name_map: HashMap<String, String>,
    void_counters: HashMap<String, usize>,
    current_target: Option<String>,
    global_vars: &'a IndexMap<String, GlobalVarNode>,
    external_vars: &'a ExternalVars,
    lang: Lang,
    color: bool,
}

impl<'a> IrGenerator<'a> {
    fn resolve_param(&self, text: &str, line: usize, original_line: &str) -> CompileResult<String> {
        let after_external = self.resolve_external(text, line, original_line)?;
        Ok(self.resolve_global(&after_external))
    }

    fn resolve_external(&self, text: &str, line: usize, original_line: &str) -> CompileResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for m in EXTERNAL_REF.find_iter(text) {
            out.push_str(&text[last..m.start()]);
            let value = self.external_vars.resolve(m.as_str(), line, m.start(), original_line, self.lang, self.color)?;
            out.push_str(&external_vars::spelling(&value));
            last = m.end();
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    fn resolve_global(&self, text: &str) -> String {
        GLOBAL_REF
            .replace_all(text, |caps: &regex::Captures| {
                let name = &caps[1];
                if name == "this" {
                    return "$this".to_string();
                }
                match self.global_vars.get(name) {
                    Some(node) => node.value.json_spelling(),
                    None => format!("${name}"),
                }
            })
            .into_owned()
    }

    fn next_void_key(&mut self) -> String {
        let target = self.current_target.clone().unwrap_or_default();
        let counter = self.void_counters.entry(target).or_insert(0);
        *counter += 1;
        format!("__void{}", counter)
    }

    fn visit_source(&mut self, node: &ast::SourceNode) {
        self.source = Some((node.source_type.clone(), node.name.clone()));
    }

    fn visit_target(&mut self, node: &ast::TargetNode) {
        let key = format!("{}/{}", node.target_type, node.value);
        self.target_name_map.insert(node.local_name.clone(), key);
    }

    fn visit_route_block(&mut self, node: &ast::RouteBlockNode, program: &Program) -> CompileResult<()> {
        let key = self
            .target_name_map
            .get(&node.target_local_name)
            .cloned()
            .unwrap_or_else(|| node.target_local_name.clone());

        if !self.result.contains_key(&key) {
            let target = program.targets.get(&node.target_local_name);
            let target_type_obj = match target {
                Some(t) => type_name_obj(&t.target_type, &t.value),
                None => Value::Null,
            };
            let sourse_type_obj = match &self.source {
                Some((ty, name)) => type_name_obj(ty, name),
                None => Value::Null,
            };
            self.result.insert(
                key.clone(),
                Value::Object(Map::from_iter([
                    ("sourse_type".to_string(), sourse_type_obj),
                    ("target_type".to_string(), target_type_obj),
                    ("routes".to_string(), Value::Object(Map::new())),
                ])),
            );
        }
        self.current_target = Some(key);

        for route in &node.routes {
            self.visit_route_line(route)?;
        }
        Ok(())
    }

    fn visit_route_line(&mut self, node: &RouteLineNode) -> CompileResult<()> {
        let pipeline = self.visit_pipeline(node, &node.pipeline)?;

        let (final_name, final_type) = match &node.dst {
            Some(dst) if !dst.name.is_empty() => {
                (Value::String(dst.name.clone()), json_opt_string(dst.declared_type.as_deref()))
            }
            _ => (Value::Null, Value::Null),
        };

        let route_key = if node.src.name.is_empty() {
            self.next_void_key()
        } else {
            node.src.name.clone()
        };

        let descriptor = Value::Object(Map::from_iter([
            ("pipeline".to_string(), pipeline),
            ("final_type".to_string(), final_type),
            ("final_name".to_string(), final_name),
        ]));

        let Some(target_key) = self.current_target.clone() else {
            return Ok(());
        };
        let Some(Value::Object(bucket)) = self.result.get_mut(&target_key) else {
            return Ok(());
        };
        let Some(Value::Object(routes)) = bucket.get_mut("routes") else {
            return Ok(());
        };

        match routes.get_mut(&route_key) {
            Some(Value::Array(list)) => list.push(descriptor),
            Some(existing) => {
                let prior = existing.take();
                *existing = Value::Array(vec![prior, descriptor]);
            }
            None => {
                routes.insert(route_key, descriptor);
            }
        }
        Ok(())
    }

    fn visit_pipeline(&self, route: &RouteLineNode, pipeline: &ast::PipelineNode) -> CompileResult<Value> {
        if pipeline.items.is_empty() {
            return Ok(Value::Null);
        }
        let mut map = Map::new();
        for (idx, item) in pipeline.items.iter().enumerate() {
            let json = self.visit_pipeline_item(route, item)?;
            map.insert((idx + 1).to_string(), json);
        }
        Ok(Value::Object(map))
    }

    fn visit_pipeline_item(&self, route: &RouteLineNode, item: &PipelineItem) -> CompileResult<Value> {
        match item {
            PipelineItem::FuncCall(f) => {
                let param = self.resolve_args(&f.args, f.line, &route.original_line)?;
                Ok(Value::Object(Map::from_iter([
                    ("type".to_string(), Value::String("py_func".to_string())),
                    ("param".to_string(), Value::String(param)),
                    ("full_str".to_string(), Value::String(f.full_str.clone())),
                ])))
            }
            PipelineItem::DirectMap(d) => {
                let param = self.resolve_param(&d.value, d.line, &route.original_line)?;
                Ok(Value::Object(Map::from_iter([
                    ("type".to_string(), Value::String("direct".to_string())),
                    ("param".to_string(), Value::String(param)),
                    ("full_str".to_string(), Value::String(d.full_str.clone())),
                ])))
            }
            PipelineItem::Event(e) => Ok(Value::Object(Map::from_iter([
                ("type".to_string(), Value::String("event".to_string())),
                ("sub_type".to_string(), Value::String(e.kind.tag().to_string())),
                ("param".to_string(), Value::String(e.message.clone())),
                ("full_str".to_string(), Value::String(e.full_str.clone())),
            ]))),
            PipelineItem::Condition(c) => self.visit_condition(c, route),
        }
    }

    fn resolve_args(&self, args: &[String], line: usize, original_line: &str) -> CompileResult<String> {
        if args.is_empty() {
            return self.resolve_param("$this", line, original_line);
        }
        let resolved: CompileResult<Vec<String>> =
            args.iter().map(|a| self.resolve_param(a, line, original_line)).collect();
        Ok(resolved?.join(", "))
    }

    fn visit_condition(&self, node: &ast::ConditionNode, route: &RouteLineNode) -> CompileResult<Value> {
        let cond = node.full_str.trim();
        let original_line = route.original_line.as_str();
        let matches: Vec<_> = BRANCH_KEYWORD.find_iter(cond).collect();
        if matches.is_empty() {
            return Ok(Value::Object(Map::from_iter([
                ("type".to_string(), Value::String("condition".to_string())),
                ("full_str".to_string(), Value::String(cond.to_string())),
            ])));
        }

        let mut result = Map::new();
        result.insert("type".to_string(), Value::String("condition".to_string()));
        result.insert("sub_type".to_string(), Value::String(node.sub_type.tag().to_string()));
        result.insert("full_str".to_string(), Value::String(cond.to_string()));

        let mut elif_counter = 0usize;
        for (idx, m) in matches.iter().enumerate() {
            let keyword = m.as_str().to_uppercase();
            let end = matches.get(idx + 1).map(|n| n.start()).unwrap_or(cond.len());
            let branch_text = cond[m.start()..end].trim();

            if keyword == "ELSE" {
                if let Some(caps) = ELSE_BODY.captures(branch_text) {
                    let do_json = self.build_do_json(caps[1].trim(), node.line, &original_line)?;
                    result.insert(
                        "else".to_string(),
                        Value::Object(Map::from_iter([("do".to_string(), do_json)])),
                    );
                }
                continue;
            }

            let Some(caps) = IF_ELIF_BODY.captures(branch_text) else {
                continue;
            };
            let exp_str = caps[1].trim();
            let do_str = caps[2].trim();
            let exp_resolved = self.resolve_param(exp_str, node.line, &original_line)?;
            let exp_json = if exp_str.starts_with('*') {
                Value::Object(Map::from_iter([
                    ("type".to_string(), Value::String("py_func".to_string())),
                    ("param".to_string(), Value::String("$this".to_string())),
                    ("full_str".to_string(), Value::String(exp_resolved)),
                ]))
            } else {
                Value::Object(Map::from_iter([
                    ("type".to_string(), Value::String("cond_exp".to_string())),
                    ("full_str".to_string(), Value::String(exp_resolved)),
                ]))
            };
            let do_json = self.build_do_json(do_str, node.line, &original_line)?;
            let branch = Value::Object(Map::from_iter([
                ("exp".to_string(), exp_json),
                ("do".to_string(), do_json),
            ]));

            if keyword == "IF" {
                result.insert("if".to_string(), branch);
            } else {
                elif_counter += 1;
                result.insert(format!("elif_{elif_counter}"), branch);
            }
        }

        Ok(Value::Object(result))
    }

    fn build_do_json(&self, text: &str, line: usize, original_line: &str) -> CompileResult<Value> {
        if let Some(rest) = text.strip_prefix('*') {
            let param = if let Some(open) = rest.find('(') {
                if rest.ends_with(')') {
                    let inner = &rest[open + 1..rest.len() - 1];
                    self.resolve_args(&crate::splitter::split_args(inner), line, original_line)?
                } else {
                    self.resolve_param(rest.trim(), line, original_line)?
                }
            } else {
                self.resolve_param(rest.trim(), line, original_line)?
            };
            return Ok(Value::Object(Map::from_iter([
                ("type".to_string(), Value::String("py_func".to_string())),
                ("param".to_string(), Value::String(param)),
                ("full_str".to_string(), Value::String(text.to_string())),
            ])));
        }

        if let Some(caps) = EVENT.captures(text) {
            return Ok(Value::Object(Map::from_iter([
                ("type".to_string(), Value::String("event".to_string())),
                ("sub_type".to_string(), Value::String(caps[1].to_uppercase())),
                ("param".to_string(), Value::String(caps[2].to_string())),
                ("full_str".to_string(), Value::String(text.to_string())),
            ])));
        }

        let resolved = self.resolve_param(text, line, original_line)?;
        Ok(Value::Object(Map::from_iter([
            ("type".to_string(), Value::String("direct".to_string())),
            ("param".to_string(), Value::String(resolved)),
            ("full_str".to_string(), Value::String(text.to_string())),
        ])))
    }
}

fn json_opt_string(value: Option<&str>) -> Value {
    match value {
        Some(v) => Value::String(v.to_string()),
        None => Value::Null,
    }
}

fn type_name_obj(ty: &str, name: &str) -> Value {
    Value::Object(Map::from_iter([
        ("type".to_string(), Value::String(ty.to_string())),
        ("name".to_string(), Value::String(name.to_string())),
    ]))
}

/// Generate the JSON IR for `program`. `external_vars` supplies the values
/// for `$$…` substitution — pass [`ExternalVars::default`] when no external
/// directory was configured, matching the original's empty-cache default.
pub fn generate(
    program: &Program,
    external_vars: &ExternalVars,
    lang: Lang,
    color: bool,
) -> CompileResult<Value> {
    let mut gen = IrGenerator {
        result: Map::new(),
        source: None,
        target_name_map: HashMap::new(),
        void_counters: HashMap::new(),
        current_target: None,
        global_vars: &program.global_vars,
        external_vars,
        lang,
        color,
    };

    for item in &program.children {
        match item {
            ast::ProgramItem::Source(n) => gen.visit_source(n),
            ast::ProgramItem::Target(n) => gen.visit_target(n),
            ast::ProgramItem::GlobalVar(_) => {}
            ast::ProgramItem::GlobalVarUsage(n) => {
                gen.result.insert(
                    format!("__GLOBVAR__{}", n.var_name),
                    Value::Object(Map::from_iter([
                        ("pipeline".to_string(), Value::Null),
                        ("final_type".to_string(), Value::Null),
                        ("final_name".to_string(), Value::Null),
                    ])),
                );
            }
            ast::ProgramItem::RouteBlock(block) => gen.visit_route_block(block, program)?,
        }
    }

    if !program.global_vars.is_empty() {
        let mut gv = Map::new();
        for (name, node) in &program.global_vars {
            let value = match &node.value {
                crate::token::GlobalVarValue::Str(s) => Value::String(s.clone()),
                crate::token::GlobalVarValue::Int(i) => Value::Number((*i).into()),
                crate::token::GlobalVarValue::Float(f) => {
                    serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
                }
                crate::token::GlobalVarValue::Bool(b) => Value::Bool(*b),
            };
            gv.insert(
                name.clone(),
                Value::Object(Map::from_iter([
                    ("type".to_string(), Value::String(node.value.inferred_type().to_string())),
                    ("value".to_string(), value),
                ])),
            );
        }
        gen.result.insert("global_vars".to_string(), Value::Object(gv));
    }

    Ok(Value::Object(gen.result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    pub(super) fn ir_for(src: &str) -> Value {
        let tokens = tokenize(src, Lang::En, false).unwrap();
        let program = parse(&tokens, Lang::En, false, None).unwrap();
        generate(&program, &ExternalVars::default(), Lang::En, false).unwrap()
    }

    #[test]
    fn minimal_program_produces_expected_bucket() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n";
        let ir = ir_for(src);
        let bucket = &ir["dict/y"];
        assert_eq!(bucket["sourse_type"]["type"], Value::String("dict".to_string()));
        assert_eq!(bucket["sourse_type"]["name"], Value::String("x".to_string()));
        assert_eq!(bucket["target_type"]["type"], Value::String("dict".to_string()));
        assert_eq!(bucket["routes"]["a"]["final_name"], Value::String("b".to_string()));
    }

    #[test]
    fn void_src_field_gets_generated_key() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [] -> [b](str)\n";
        let ir = ir_for(src);
        assert!(ir["dict/y"]["routes"]["__void1"].is_object());
    }

    #[test]
    fn duplicate_route_key_becomes_a_list() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n    [a] -> |$this| -> [c](str)\n";
        let ir = ir_for(src);
        assert!(ir["dict/y"]["routes"]["a"].is_array());
    }

    #[test]
    fn global_var_section_and_substitution() {
        let src = "lang=py\nsource=dict/x\n$g=7\ntarget1=dict/y\ntarget1:\n    [a] -> |$g| -> [b](int)\n";
        let ir = ir_for(src);
        assert_eq!(ir["global_vars"]["g"]["value"], Value::Number(7.into()));
        let param = ir["dict/y"]["routes"]["a"]["final_name"].clone();
        assert_eq!(param, Value::String("b".to_string()));
        let pipeline_param = &ir["dict/y"]["routes"]["a"]["pipeline"]["1"]["param"];
        assert_eq!(pipeline_param, "7");
    }

    #[test]
    fn bare_global_var_usage_line_produces_top_level_entry() {
        let src = "lang=py\nsource=dict/x\n$g=1\n$g\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n";
        let ir = ir_for(src);
        assert!(ir.get("__GLOBVAR__g").is_some());
    }

    #[test]
    fn condition_lowers_to_nested_if_do() {
        let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> |IF($this):$this ELSE:$this| -> [b](str)\n";
        let ir = ir_for(src);
        let cond = &ir["dict/y"]["routes"]["a"]["pipeline"]["1"];
        assert_eq!(cond["type"], "condition");
        assert_eq!(cond["sub_type"], "if_else");
        assert!(cond["if"]["exp"].is_object());
        assert!(cond["else"]["do"].is_object());
    }

    #[test]
    fn event_param_is_not_substituted() {
        let src = "lang=py\nsource=dict/x\n$g=1\ntarget1=dict/y\ntarget1:\n    [a] -> |SKIP($g)| -> [b](str)\n";
        let ir = ir_for(src);
        let event = &ir["dict/y"]["routes"]["a"]["pipeline"]["1"];
        assert_eq!(event["type"], "event");
        assert_eq!(event["param"], "$g");
    }
}

#[cfg(test)]
mod proptests {
    use super::tests::ir_for;
    use proptest::prelude::*;

    proptest! {
        /// Void route-keys are monotonic (spec.md universal property 5): for
        /// a route block of N empty-src routes, the IR's `__void<n>` keys
        /// are exactly `__void1..__voidN`, in that order.
        #[test]
        fn void_keys_are_monotonic_for_n_empty_routes(n in 1usize..12) {
            let mut src = String::from("lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n");
            for i in 0..n {
                src.push_str(&format!("    [] -> [field{i}](str)\n"));
            }
            let ir = ir_for(&src);
            let routes = ir["dict/y"]["routes"].as_object().unwrap();
            for i in 1..=n {
                let key = format!("__void{i}");
                prop_assert!(routes.contains_key(&key), "missing {key}");
            }
            prop_assert_eq!(routes.len(), n);
        }
    }
}
