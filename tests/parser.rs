use loxide::ast_printer::AstPrinter;
use loxide::error::LoxError;
use loxide::expr::Expr;
use loxide::parser::Parser;
use loxide::scanner::Scanner;
use loxide::stmt::Stmt;

fn parse(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
    let (statements, errors) = parse_with_recovery(source);

    if errors.is_empty() {
        Ok(statements)
    } else {
        Err(errors)
    }
}

fn parse_with_recovery(source: &str) -> (Vec<Stmt>, Vec<LoxError>) {
    let (tokens, errors) = Scanner::new(source.as_bytes()).scan_tokens();
    assert!(errors.is_empty(), "scan errors: {:?}", errors);

    Parser::new(tokens).parse()
}

fn parse_expr(source: &str) -> Expr {
    let (tokens, errors) = Scanner::new(source.as_bytes()).scan_tokens();
    assert!(errors.is_empty(), "scan errors: {:?}", errors);

    Parser::new(tokens)
        .parse_expression()
        .expect("expression should parse")
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let expr = parse_expr("1 + 2 * 3");

    match expr {
        Expr::Binary { left, right, .. } => {
            assert!(matches!(*left, Expr::Literal(_)));
            assert!(matches!(*right, Expr::Binary { .. }));
        }
        other => panic!("expected binary expression, got {:?}", other),
    }
}

#[test]
fn assignment_is_right_associative() {
    let expr = parse_expr("a = b = 1");

    match expr {
        Expr::Assign { name, value, .. } => {
            assert_eq!(name.lexeme, "a");
            assert!(matches!(*value, Expr::Assign { .. }));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn property_assignment_becomes_set() {
    let expr = parse_expr("obj.field = 1");
    assert!(matches!(expr, Expr::Set { .. }));
}

#[test]
fn invalid_assignment_target_is_rejected() {
    let errors = parse("1 + 2 = 3;").expect_err("should fail");

    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("Invalid assignment target")));
}

#[test]
fn for_loop_desugars_to_while_in_a_block() {
    let statements = parse("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();

    assert_eq!(statements.len(), 1);

    // Outer block: initializer then the while loop.
    let Stmt::Block(outer) = &statements[0] else {
        panic!("expected outer block, got {:?}", statements[0]);
    };
    assert_eq!(outer.len(), 2);
    assert!(matches!(outer[0], Stmt::Var { .. }));

    // Loop body: original body then the increment.
    let Stmt::While { body, .. } = &outer[1] else {
        panic!("expected while, got {:?}", outer[1]);
    };
    let Stmt::Block(inner) = body.as_ref() else {
        panic!("expected desugared body block");
    };
    assert_eq!(inner.len(), 2);
    assert!(matches!(inner[0], Stmt::Print(_)));
    assert!(matches!(inner[1], Stmt::Expression(_)));
}

#[test]
fn for_loop_without_condition_defaults_to_true() {
    let statements = parse("for (;;) print 1;").unwrap();

    let Stmt::While { condition, .. } = &statements[0] else {
        panic!("expected bare while, got {:?}", statements[0]);
    };
    assert!(matches!(condition, Expr::Literal(_)));
}

#[test]
fn class_with_superclass_parses() {
    let statements = parse("class B < A { method() { return 1; } }").unwrap();

    let Stmt::Class {
        name,
        superclass,
        methods,
    } = &statements[0]
    else {
        panic!("expected class, got {:?}", statements[0]);
    };

    assert_eq!(name.lexeme, "B");
    assert!(matches!(superclass, Some(Expr::Variable { .. })));
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].name.lexeme, "method");
}

#[test]
fn parser_recovers_at_statement_boundaries() {
    // Two bad statements, one good one in between; a single pass should
    // report both errors and still build the good statement.
    let (statements, errors) = parse_with_recovery("var = 1;\nprint 2;\nvar = 3;");

    assert_eq!(errors.len(), 2);
    for e in &errors {
        assert!(e.to_string().contains("Expected a variable name"));
    }

    assert_eq!(statements.len(), 1);
    assert!(matches!(statements[0], Stmt::Print(_)));
}

#[test]
fn error_carries_source_line() {
    let errors = parse("print 1;\nprint ;").expect_err("should fail");

    assert!(errors.iter().any(|e| e.to_string().contains("[line 2]")));
}

#[test]
fn too_many_arguments_is_an_error() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));

    let errors = parse(&source).expect_err("should fail");
    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("more than 255 arguments")));
}

#[test]
fn at_most_255_arguments_are_accepted() {
    let args: Vec<String> = (0..255).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));

    assert!(parse(&source).is_ok());
}

#[test]
fn too_many_parameters_is_an_error() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    let errors = parse(&source).expect_err("should fail");
    assert!(errors
        .iter()
        .any(|e| e.to_string().contains("more than 255 parameters")));
}

#[test]
fn missing_semicolon_is_reported() {
    let errors = parse("print 1").expect_err("should fail");
    assert!(errors.iter().any(|e| e.to_string().contains("';'")));
}

// The canonical printer emits valid Lox source: printing an expression
// and re-parsing the output yields a structurally equivalent tree.
#[test]
fn printer_output_reparses_to_an_equivalent_tree() {
    let sources = [
        "1 + 2 * 3",
        "-(1 + 2)",
        "!(a == b)",
        "a or b and c",
        "f(1, 2)(3)",
        "obj.field.inner",
        "obj.field = a + b",
        "a = b = c",
        "this.x + super.y",
        "\"concat\" + \"enation\"",
        "(1 + 2) * (3 - 4) / 5",
    ];

    let printer = AstPrinter;

    for source in sources {
        let original = parse_expr(source);
        let printed = printer.print(&original);
        let reparsed = parse_expr(&printed);

        assert!(
            Expr::structurally_eq(&original, &reparsed),
            "round trip failed for {:?}: printed as {:?}",
            source,
            printed
        );
    }
}
