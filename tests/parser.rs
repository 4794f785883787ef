mod common;

use lox_interpreter as lox;

use lox::ast::{Expr, Stmt};
use lox::ast_printer::AstPrinter;
use lox::parser::Parser;
use lox::scanner::Scanner;

fn parse(source: &str) -> (Vec<Stmt>, String, bool) {
    let (mut session, diagnostics) = common::session();
    let tokens = Scanner::new(source).scan_tokens(&mut session);
    let statements = Parser::new(tokens, &mut session).parse();
    let had_error = session.had_error();
    (statements, diagnostics.text(), had_error)
}

fn print(source: &str) -> String {
    let (statements, diagnostics, had_error) = parse(source);
    assert!(!had_error, "unexpected diagnostics: {}", diagnostics);
    AstPrinter::print_program(&statements)
}

#[test]
fn precedence_and_associativity() {
    assert_eq!(print("1 + 2 * 3;"), "(; (+ 1.0 (* 2.0 3.0)))");
    assert_eq!(print("1 - 2 - 3;"), "(; (- (- 1.0 2.0) 3.0))");
    assert_eq!(print("-a * (b + c);"), "(; (* (- a) (group (+ b c))))");
    assert_eq!(print("!!true == false;"), "(; (== (! (! true)) false))");
    assert_eq!(print("a < b == c >= d;"), "(; (== (< a b) (>= c d)))");
    assert_eq!(print("a or b and c;"), "(; (or a (and b c)))");
}

#[test]
fn assignment_is_right_associative() {
    assert_eq!(print("a = b = 1;"), "(; (= a (= b 1.0)))");
    assert_eq!(print("o.x = 2;"), "(; (= (. o x) 2.0))");
    assert_eq!(print("f(1)(2).y;"), "(; (. (call (call f 1.0) 2.0) y))");
}

#[test]
fn for_loop_desugars_to_while() {
    assert_eq!(
        print("for (var i = 0; i < 3; i = i + 1) print i;"),
        "(block (var i 0.0) (while (< i 3.0) (block (print i) (; (= i (+ i 1.0))))))"
    );
    assert_eq!(print("for (;;) print 1;"), "(while true (print 1.0))");
}

#[test]
fn declarations() {
    assert_eq!(
        print("fun add(a, b) { return a + b; }"),
        "(fun add (a b) (return (+ a b)))"
    );
    assert_eq!(
        print("class Point { init(x) { this.x = x; } norm() { return; } }"),
        "(class Point (method init) (method norm))"
    );
    assert_eq!(
        print("var s = \"hi\"; if (s) print s; else print nil;"),
        "(var s \"hi\")\n(if s (print s) (print nil))"
    );
}

#[test]
fn variable_nodes_get_distinct_ids() {
    let (statements, _, _) = parse("a; a;");

    let ids: Vec<_> = statements
        .iter()
        .filter_map(|stmt| match stmt {
            Stmt::Expression(Expr::Variable { id, .. }) => Some(*id),
            _ => None,
        })
        .collect();

    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn missing_semicolon_is_reported_at_the_next_token() {
    let (_, diagnostics, had_error) = parse("print 1\nprint 2;");

    assert!(had_error);
    assert_eq!(
        diagnostics,
        "[Line 2] Error at 'print': Expect ';' after value.\n"
    );
}

#[test]
fn error_at_end() {
    let (_, diagnostics, _) = parse("print");

    assert_eq!(diagnostics, "[Line 1] Error at end: Expected expression.\n");
}

#[test]
fn recovery_keeps_later_declarations() {
    let (statements, diagnostics, had_error) = parse("var = 1;\nprint 2;\nvar x 3;\nprint 4;");

    assert!(had_error);
    assert_eq!(diagnostics.lines().count(), 2);
    assert_eq!(
        AstPrinter::print_program(&statements),
        "(print 2.0)\n(print 4.0)"
    );
}

#[test]
fn invalid_assignment_target_does_not_unwind() {
    let (statements, diagnostics, had_error) = parse("1 + 2 = 3;\nprint 4;");

    assert!(had_error);
    assert_eq!(
        diagnostics,
        "[Line 1] Error at '=': Invalid assignment target.\n"
    );
    assert_eq!(statements.len(), 2);
}

#[test]
fn argument_limit() {
    let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
    let source = format!("f({});", args.join(", "));

    let (statements, diagnostics, had_error) = parse(&source);

    assert!(had_error);
    assert!(diagnostics.contains("Can't have more than 255 arguments."));
    assert_eq!(diagnostics.lines().count(), 1);
    // The call itself still parses.
    assert_eq!(statements.len(), 1);

    let args: Vec<String> = (0..255).map(|i| i.to_string()).collect();
    let (_, _, had_error) = parse(&format!("f({});", args.join(", ")));
    assert!(!had_error);
}

#[test]
fn parameter_limit() {
    let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
    let source = format!("fun f({}) {{}}", params.join(", "));

    let (_, diagnostics, had_error) = parse(&source);

    assert!(had_error);
    assert!(diagnostics.contains("Error at 'p255': Can't have more than 255 parameters."));
}

#[test]
fn unclosed_block() {
    let (_, diagnostics, had_error) = parse("{ print 1;");

    assert!(had_error);
    assert_eq!(diagnostics, "[Line 1] Error at end: Expect '}' after block.\n");
}
