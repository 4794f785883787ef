mod common;

use lox_interpreter as lox;

use lox::ast::{Expr, Stmt};
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;

/// Resolve `source` and return the interpreter, the tree and the diagnostics.
fn resolve(source: &str) -> (Interpreter, Vec<Stmt>, String) {
    let (mut session, diagnostics) = common::session();
    let mut interpreter = Interpreter::with_output(Box::new(std::io::sink()));

    let tokens = Scanner::new(source).scan_tokens(&mut session);
    let statements = Parser::new(tokens, &mut session).parse();
    assert!(!session.had_error(), "syntax error: {}", diagnostics.text());

    Resolver::new(&mut interpreter, &mut session).resolve(&statements);

    (interpreter, statements, diagnostics.text())
}

/// Depths of every `print <variable>;` in tree order.
fn printed_depths(interpreter: &Interpreter, statements: &[Stmt]) -> Vec<Option<usize>> {
    fn walk(interpreter: &Interpreter, stmt: &Stmt, out: &mut Vec<Option<usize>>) {
        match stmt {
            Stmt::Print(Expr::Variable { id, .. }) | Stmt::Print(Expr::This { id, .. }) => {
                out.push(interpreter.resolved_depth(*id))
            }
            Stmt::Block(inner) => inner.iter().for_each(|s| walk(interpreter, s, out)),
            Stmt::Function(decl) => decl.body.iter().for_each(|s| walk(interpreter, s, out)),
            Stmt::Class { methods, .. } => methods
                .iter()
                .flat_map(|m| m.body.iter())
                .for_each(|s| walk(interpreter, s, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    for stmt in statements {
        walk(interpreter, stmt, &mut out);
    }
    out
}

#[test]
fn globals_are_left_unresolved() {
    let (interpreter, statements, diagnostics) = resolve("var a = 1; print a;");

    assert_eq!(diagnostics, "");
    assert_eq!(printed_depths(&interpreter, &statements), vec![None]);
}

#[test]
fn block_distances() {
    let source = "{ var a = 1; print a; { var b = 2; print a; print b; { print a; } } }";
    let (interpreter, statements, diagnostics) = resolve(source);

    assert_eq!(diagnostics, "");
    assert_eq!(
        printed_depths(&interpreter, &statements),
        vec![Some(0), Some(1), Some(0), Some(2)]
    );
}

#[test]
fn function_parameters_and_closures() {
    let source = "fun outer(x) { print x; fun inner() { print x; } }";
    let (interpreter, statements, diagnostics) = resolve(source);

    assert_eq!(diagnostics, "");
    assert_eq!(
        printed_depths(&interpreter, &statements),
        vec![Some(0), Some(1)]
    );
}

#[test]
fn this_sits_one_scope_above_the_parameters() {
    let source = "class A { m() { print this; { print this; } } }";
    let (interpreter, statements, diagnostics) = resolve(source);

    assert_eq!(diagnostics, "");
    assert_eq!(
        printed_depths(&interpreter, &statements),
        vec![Some(1), Some(2)]
    );
}

#[test]
fn shadowing_in_a_nested_block_binds_statically() {
    let source = "var a = \"global\"; { fun show() { print a; } var a = \"local\"; }";
    let (interpreter, statements, diagnostics) = resolve(source);

    assert_eq!(diagnostics, "");
    // `a` inside show() resolves to the global, declared before the local.
    assert_eq!(printed_depths(&interpreter, &statements), vec![None]);
}

#[test]
fn redeclaration_in_local_scope() {
    let (_, _, diagnostics) = resolve("{ var a = 1; var a = 2; }");

    assert_eq!(
        diagnostics,
        "[Line 1] Error at 'a': Already a variable with this name in this scope\n"
    );
}

#[test]
fn redeclaration_at_global_scope_is_allowed() {
    let (_, _, diagnostics) = resolve("var a = 1; var a = 2;");

    assert_eq!(diagnostics, "");
}

#[test]
fn read_in_own_initializer() {
    let (_, _, diagnostics) = resolve("var a = 1; { var a = a; }");

    assert_eq!(
        diagnostics,
        "[Line 1] Error at 'a': Can't read local variable in its own initializer\n"
    );
}

#[test]
fn top_level_return() {
    let (_, _, diagnostics) = resolve("return 1;");

    assert_eq!(
        diagnostics,
        "[Line 1] Error at 'return': Can't return from top-level code\n"
    );
}

#[test]
fn value_returned_from_initializer() {
    let (_, _, diagnostics) = resolve("class A { init() { return 1; } }");

    assert_eq!(
        diagnostics,
        "[Line 1] Error at 'return': Can't return a value from an initializer\n"
    );

    let (_, _, diagnostics) = resolve("class A { init() { return; } }");
    assert_eq!(diagnostics, "");
}

#[test]
fn this_outside_class() {
    let (_, _, diagnostics) = resolve("print this;\nfun f() { print this; }");

    assert_eq!(
        diagnostics,
        "[Line 1] Error at 'this': Can't use 'this' outside of a class\n\
         [Line 2] Error at 'this': Can't use 'this' outside of a class\n"
    );
}

#[test]
fn resolution_continues_after_an_error() {
    let (_, _, diagnostics) = resolve("return;\n{ var b = 1; var b = 2; }");

    assert_eq!(diagnostics.lines().count(), 2);
}

#[test]
fn resolve_returns_only_uses_outside_functions() {
    let source = "{ var a = 1; print a; fun f(p) { print p; } a = 2; }";
    let (mut session, _) = common::session();
    let mut interpreter = Interpreter::with_output(Box::new(std::io::sink()));

    let tokens = Scanner::new(source).scan_tokens(&mut session);
    let statements = Parser::new(tokens, &mut session).parse();
    let top_level = Resolver::new(&mut interpreter, &mut session).resolve(&statements);

    // `print a` and `a = 2`; `print p` belongs to f.
    assert_eq!(top_level.len(), 2);
    assert_eq!(interpreter.resolved_count(), 3);

    interpreter.forget(&top_level);
    assert_eq!(interpreter.resolved_count(), 1);
    assert!(top_level
        .iter()
        .all(|id| interpreter.resolved_depth(*id).is_none()));
}
