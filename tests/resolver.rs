use loxide::error::LoxError;
use loxide::interpreter::Interpreter;
use loxide::parser::Parser;
use loxide::resolver::Resolver;
use loxide::scanner::Scanner;

fn resolve(source: &str) -> Result<(), LoxError> {
    let (tokens, errors) = Scanner::new(source.as_bytes()).scan_tokens();
    assert!(errors.is_empty(), "scan errors: {:?}", errors);

    let (statements, parse_errors) = Parser::new(tokens).parse();
    assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);

    let mut interpreter = Interpreter::new(Box::new(std::io::sink()));
    Resolver::new(&mut interpreter).resolve(&statements)
}

fn assert_resolve_error(source: &str, fragment: &str) {
    let err = resolve(source).expect_err("resolution should fail");
    assert!(
        err.to_string().contains(fragment),
        "expected error containing {:?}, got: {}",
        fragment,
        err
    );
}

#[test]
fn reading_a_local_in_its_own_initializer_fails() {
    assert_resolve_error(
        "var a = \"outer\";\n{ var a = a; }",
        "Can't read local variable in its own initializer",
    );
}

#[test]
fn global_initializer_may_reference_the_global_itself() {
    // The declare/define bracket only guards local scopes.
    assert!(resolve("var a = 1; var b = a;").is_ok());
}

#[test]
fn duplicate_declaration_in_one_scope_fails() {
    assert_resolve_error(
        "{ var a = 1; var a = 2; }",
        "already declared in this scope",
    );
}

#[test]
fn redeclaring_a_global_is_allowed() {
    assert!(resolve("var a = 1; var a = 2;").is_ok());
}

#[test]
fn duplicate_parameter_names_fail() {
    assert_resolve_error("fun f(a, a) {}", "already declared in this scope");
}

#[test]
fn top_level_return_fails() {
    assert_resolve_error("return \"x\";", "Can't return from top-level code");
}

#[test]
fn return_inside_a_function_is_fine() {
    assert!(resolve("fun f() { return 1; }").is_ok());
}

#[test]
fn returning_a_value_from_an_initializer_fails() {
    assert_resolve_error(
        "class C { init() { return 1; } }",
        "Can't return a value from an initializer",
    );
}

#[test]
fn bare_return_in_an_initializer_is_fine() {
    assert!(resolve("class C { init() { return; } }").is_ok());
}

#[test]
fn this_outside_a_class_fails() {
    assert_resolve_error("print this;", "Can't use 'this' outside of a class");
}

#[test]
fn this_in_a_plain_function_fails() {
    assert_resolve_error(
        "fun f() { print this; }",
        "Can't use 'this' outside of a class",
    );
}

#[test]
fn this_inside_a_method_is_fine() {
    assert!(resolve("class C { m() { return this; } }").is_ok());
}

#[test]
fn super_outside_a_class_fails() {
    assert_resolve_error("print super.m;", "Can't use 'super' outside of a class");
}

#[test]
fn super_without_a_superclass_fails() {
    assert_resolve_error(
        "class C { m() { super.m(); } }",
        "Can't use 'super' in a class with no superclass",
    );
}

#[test]
fn super_in_a_subclass_method_is_fine() {
    assert!(resolve("class A { m() {} } class B < A { m() { super.m(); } }").is_ok());
}

#[test]
fn class_inheriting_from_itself_fails() {
    assert_resolve_error("class C < C {}", "can't inherit from itself");
}

#[test]
fn functions_may_recurse() {
    assert!(resolve("fun f(n) { if (n > 0) f(n - 1); }").is_ok());
}

#[test]
fn resolution_is_deterministic() {
    // Resolving the same program against two interpreters must behave
    // identically; the side table depends only on the AST.
    let source = "\
        var a = 1;\n\
        {\n\
            var b = 2;\n\
            fun f() { print a + b; }\n\
            f();\n\
        }";

    for _ in 0..2 {
        assert!(resolve(source).is_ok());
    }
}
