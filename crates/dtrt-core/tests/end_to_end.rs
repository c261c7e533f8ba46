//! End-to-end scenarios S1-S6, exercising the full lex -> parse -> IR
//! pipeline through [`dtrt_core::Engine`] the way a real `.dtrt` file would
//! be compiled. Fixture directories use `tempfile`, mirroring the original's
//! `tests/conftest.py`.

use dtrt_core::{CompilationConfig, Engine, Lang};
use std::fs;

fn engine() -> Engine {
    Engine::new(CompilationConfig { lang: Lang::En, color: false, debug: false })
}

#[test]
fn s1_minimal_happy_path() {
    let src = "lang=py\nsource=dict/my_dict\ntarget1=dict/my_new_dict\ntarget1:\n    [pointA] -> [pointB](str)\n";
    let ir = engine().compile_text(src).unwrap();

    let bucket = &ir["dict/my_new_dict"];
    let routes = bucket["routes"].as_object().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes["pointA"]["pipeline"], serde_json::Value::Null);
    assert_eq!(routes["pointA"]["final_type"], "str");
    assert_eq!(routes["pointA"]["final_name"], "pointB");
}

#[test]
fn s2_empty_src_produces_void_keys_in_order() {
    let src = concat!(
        "lang=py\n",
        "source=dict/x\n",
        "target1=dict/y\n",
        "target1:\n",
        "    [] -> |*func1()| -> [$d](int)\n",
        "    [] -> [A](int)\n",
        "    [] -> [B](int)\n",
    );
    let ir = engine().compile_text(src).unwrap();
    let routes = &ir["dict/y"]["routes"];

    assert_eq!(routes["__void1"]["final_name"], "$d");
    assert_eq!(routes["__void2"]["final_name"], "A");
    assert_eq!(routes["__void3"]["final_name"], "B");
}

#[test]
fn s3_global_and_external_substitution() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("myvars.json"),
        r#"{"items": ["one", "two", "three"], "name": "test"}"#,
    )
    .unwrap();

    let src = concat!(
        "lang=py\n",
        "source=dict/x\n",
        "$myvar=1000\n",
        "target1=dict/y\n",
        "target1:\n",
        "    [A] -> |*func1($$myvars.items, $$myvars.name)| -> [B](str)\n",
    );
    let ir = engine().with_vars_dir(tmp.path()).compile_text(src).unwrap();

    let func = &ir["dict/y"]["routes"]["A"]["pipeline"]["1"];
    assert_eq!(func["type"], "py_func");
    assert_eq!(func["param"], r#"["one", "two", "three"], test"#);
    assert_eq!(func["full_str"], "*func1($$myvars.items, $$myvars.name)");
}

#[test]
fn s4_conditional_lowering() {
    let src = concat!(
        "lang=py\n",
        "source=dict/x\n",
        "$myvar=1000\n",
        "$myvar2=\"test\"\n",
        "target1=dict/y\n",
        "target1:\n",
        "    [A] -> |IF($myvar2 == \"test\"): *func1($myvar) ELSE: *s1($myvar2)| -> [B](str)\n",
    );
    let ir = engine().compile_text(src).unwrap();
    let cond = &ir["dict/y"]["routes"]["A"]["pipeline"]["1"];

    assert_eq!(cond["sub_type"], "if_else");
    assert_eq!(cond["if"]["exp"]["full_str"], r#"test == "test""#);
    assert_eq!(cond["if"]["do"]["type"], "py_func");
    assert_eq!(cond["if"]["do"]["param"], "1000");
    assert_eq!(cond["if"]["do"]["full_str"], "*func1($myvar)");
    assert_eq!(cond["else"]["do"]["type"], "py_func");
    assert_eq!(cond["else"]["do"]["param"], "test");
    assert_eq!(cond["else"]["do"]["full_str"], "*s1($myvar2)");
}

#[test]
fn s5_duplicate_composite_target_key_is_fatal() {
    let src = concat!(
        "lang=py\n",
        "source=dict/x\n",
        "target1=postgres/x\n",
        "target2=postgres/x\n",
        "target1:\n",
        "    [a] -> [b](str)\n",
    );
    let err = engine().compile_text(src).unwrap_err();
    match err {
        dtrt_core::CompileError::Fatal(d) => assert_eq!(d.category.tag(), "duplicate-target-name-type"),
        other => panic!("expected fatal diagnostic, got {other:?}"),
    }
}

#[test]
fn s6_forward_variable_reference_is_invalid_var_usage_not_undefined() {
    let src = concat!(
        "lang=py\n",
        "source=dict/x\n",
        "target1=dict/y\n",
        "target1:\n",
        "    [pointA] -> |*func1($s)| -> [$s](int)\n",
    );
    let err = engine().compile_text(src).unwrap_err();
    match err {
        dtrt_core::CompileError::Fatal(d) => assert_eq!(d.category.tag(), "invalid-var-usage"),
        other => panic!("expected fatal diagnostic, got {other:?}"),
    }
}

#[test]
fn missing_function_folder_is_fatal() {
    let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> [b](str)\n";
    let root = tempfile::tempdir().unwrap();
    let missing_user_dir = root.path().join("does-not-exist");
    let err = engine()
        .with_std_func_root(root.path())
        .with_user_func_dir(&missing_user_dir)
        .compile_text(src)
        .unwrap_err();
    match err {
        dtrt_core::CompileError::Fatal(d) => assert_eq!(d.category.tag(), "function-folder-not-found"),
        other => panic!("expected fatal diagnostic, got {other:?}"),
    }
}

#[test]
fn missing_vars_dir_is_fatal() {
    let src = "lang=py\nsource=dict/x\ntarget1=dict/y\ntarget1:\n    [a] -> |$$nope.x| -> [b](str)\n";
    let err = engine().with_vars_dir("/nonexistent/surely-not-there").compile_text(src).unwrap_err();
    match err {
        dtrt_core::CompileError::Fatal(d) => assert_eq!(d.category.tag(), "vars-folder-not-found"),
        other => panic!("expected fatal diagnostic, got {other:?}"),
    }
}
