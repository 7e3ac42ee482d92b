use std::{cell::RefCell, rc::Rc};

use doscript::tree_walk_interpreter::{
    ExecutionError, ExecutionErrorKind, Interpreter, SystemHandlers,
};

fn test_valid_program(source: &str, expected_output: &str) {
    let tokens = doscript::tokenizer::tokens(source).expect("Tokenize should work on valid program");
    let file = doscript::tree_builder::file(&tokens).expect("Build should work on valid program");
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter
        .interpret(&file)
        .expect("Interpret should work on valid program");
    let output = String::from_utf8(output.take()).expect("Output should be valid UTF-8");
    assert_eq!(output, expected_output);
}

fn test_failing_program(source: &str) -> ExecutionErrorKind {
    let tokens = doscript::tokenizer::tokens(source).expect("Tokenize should work on valid program");
    let file = doscript::tree_builder::file(&tokens).expect("Build should work on valid program");
    let mut interpreter = Interpreter::new(Rc::new(RefCell::new(Vec::new())));
    match interpreter.interpret(&file) {
        Err(ExecutionError::Execution { kind, .. }) => kind,
        Ok(()) => panic!("Interpret should fail"),
    }
}

#[derive(Debug, Default)]
struct RecordingHandlers {
    calls: Vec<String>,
}

impl SystemHandlers for RecordingHandlers {
    fn run(&mut self, name: &str) {
        self.calls.push(format!("run({name})"));
    }

    fn stop(&mut self, name: &str) {
        self.calls.push(format!("stop({name})"));
    }
}

#[test]
fn test_assign_and_put() {
    test_valid_program("int x; x = 5; put x;", "5\n");
}

#[test]
fn test_if_assigns_outer_variable() {
    test_valid_program("int x; int y; x = 1; if x do y = 2; done put y;", "2\n");
}

#[test]
fn test_if_else() {
    let source = r#"
    if 0 do
        put "then";
    done else do
        put "else";
    done
    if 7 do
        put "then";
    done else do
        put "else";
    done
    if 0 do
        put "skipped";
    done
    "#;
    test_valid_program(source, "else\nthen\n");
}

#[test]
fn test_while_initially_false() {
    test_valid_program("while 0 do put 1; done put 2;", "2\n");
}

#[test]
fn test_function_call() {
    let source = r#"
    int f(int a) do
        put a;
    done
    int x;
    x = 7;
    f(x);
    "#;
    test_valid_program(source, "7\n");
}

#[test]
fn test_function_argument_mismatch() {
    let source = r#"
    int f(int a) do
        put a;
    done
    string x;
    x = "seven";
    f(x);
    "#;
    assert!(matches!(
        test_failing_program(source),
        ExecutionErrorKind::ArgumentMismatch { .. }
    ));
}

#[test]
fn test_function_argument_count() {
    let source = r#"
    int f(int a, int b) do
        put a + b;
    done
    int x;
    x = 1;
    f(x);
    "#;
    assert!(matches!(
        test_failing_program(source),
        ExecutionErrorKind::ArgumentCount {
            given: 1,
            expected: 2,
            ..
        }
    ));
}

#[test]
fn test_function_return_value() {
    let source = r#"
    int add(int a, int b) do
        ret a + b;
    done
    int x;
    int y;
    int z;
    x = 2;
    y = 3;
    z = add(x, y) * 2;
    put z;
    "#;
    test_valid_program(source, "10\n");
}

#[test]
fn test_functions_are_late_bound() {
    let source = r#"
    int f() do
        put 1;
    done
    int g() do
        f();
    done
    int f() do
        put 2;
    done
    g();
    "#;
    test_valid_program(source, "2\n");
}

#[test]
fn test_type_mismatch_on_assignment() {
    for source in [
        "int x; x = 1.5;",
        "float x; x = \"text\";",
        "string x; x = 3;",
    ] {
        assert!(
            matches!(
                test_failing_program(source),
                ExecutionErrorKind::TypeMismatch { .. }
            ),
            "{source}"
        );
    }
}

#[test]
fn test_nested_loops() {
    let source = r#"
    int total;
    total = 0;
    for i in 3 do
        for j in i do
            total = total + 1;
        done
    done
    put total;
    "#;
    test_valid_program(source, "3\n");
}

#[test]
fn test_system_handler_start() {
    let tokens = doscript::tokenizer::tokens("system_handler h; h.start;").unwrap();
    let file = doscript::tree_builder::file(&tokens).unwrap();
    let output = Rc::new(RefCell::new(Vec::new()));
    let handlers = Rc::new(RefCell::new(RecordingHandlers::default()));
    let mut interpreter = Interpreter::with_handlers(output.clone(), handlers.clone());

    interpreter.interpret(&file).unwrap();

    assert_eq!(handlers.borrow().calls, ["run(h)"]);
    assert!(output.take().is_empty());
}

#[test]
fn test_system_handler_lifecycle() {
    let source = r#"
    system_handler worker;
    worker.start;
    worker.stop;
    put worker;
    "#;
    let tokens = doscript::tokenizer::tokens(source).unwrap();
    let file = doscript::tree_builder::file(&tokens).unwrap();
    let output = Rc::new(RefCell::new(Vec::new()));
    let handlers = Rc::new(RefCell::new(RecordingHandlers::default()));
    let mut interpreter = Interpreter::with_handlers(output.clone(), handlers.clone());

    interpreter.interpret(&file).unwrap();

    assert_eq!(handlers.borrow().calls, ["run(worker)", "stop(worker)"]);
    assert_eq!(
        String::from_utf8(output.take()).unwrap(),
        "worker is a system handler.\n"
    );
}

#[test]
fn test_build_errors_do_not_stop_other_statements() {
    let source = "int x; x = ; x = 3; put x;";
    let tokens = doscript::tokenizer::tokens(source).unwrap();
    let built = doscript::tree_builder::build(&tokens);
    assert_eq!(built.errors.0.len(), 1);

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter.interpret(&built.file).unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), "3\n");
}

#[test]
fn test_comments_are_ignored() {
    let source = r#"
    // counts down
    int n;
    n = 3;
    while n > 0 do // loop
        put n;
        n = n - 1;
    done
    "#;
    test_valid_program(source, "3\n2\n1\n");
}

#[test]
fn test_block_shadowing_keeps_outer_value() {
    let source = r#"
    int x;
    x = 1;
    if 1 do
        string x;
        x = "a";
    done
    put x;
    "#;
    test_valid_program(source, "1\n");
}

#[test]
fn test_standalone_blocks_between_statements() {
    let source = r#"
    int f() do
        put 1;
    done
    do
        put 2;
    done
    put 3;
    do
        put 4;
    done
    f();
    "#;
    test_valid_program(source, "2\n3\n4\n1\n");
}

#[test]
fn test_header_without_block_is_reported() {
    let tokens = doscript::tokenizer::tokens("int x; x = 1; if x; put x;").unwrap();
    let built = doscript::tree_builder::build(&tokens);
    assert_eq!(built.errors.0.len(), 1);
    assert!(doscript::tree_builder::file(&tokens).is_err());

    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter.interpret(&built.file).unwrap();
    assert_eq!(String::from_utf8(output.take()).unwrap(), "1\n");
}

#[test]
fn test_unbounded_recursion_fails() {
    assert!(matches!(
        test_failing_program("int f() do f(); done f();"),
        ExecutionErrorKind::CallDepthExceeded(_)
    ));
}
