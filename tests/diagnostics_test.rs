// Semantic diagnostics and output artifacts of the C-minus compiler

use cminus::compiler::{
    CminusCompiler, CompilerConfig, CompilerError, NO_CODE_MESSAGE, SEMANTICALLY_CORRECT_MESSAGE,
};
use test_log::test;

fn diagnostics(source: &str) -> Vec<String> {
    let output = CminusCompiler::new()
        .compile(source)
        .expect("compilation failed");
    output.errors.iter().map(|e| e.to_string()).collect()
}

#[test]
fn test_correct_program_artifacts() {
    let output = CminusCompiler::new()
        .compile("void main(void) { output(1); }")
        .unwrap();
    assert!(output.is_semantically_correct());
    assert_eq!(
        output.diagnostics(),
        format!("{}\n", SEMANTICALLY_CORRECT_MESSAGE)
    );
    let listing = output.listing();
    assert!(listing.starts_with("0\t(JP, "));
    assert_eq!(listing.lines().count(), output.instructions.len());
    assert!(listing.contains("(PRINT, #1, , )"));
}

#[test]
fn test_errors_suppress_code() {
    let output = CminusCompiler::new()
        .compile("void main(void) {\n x = 1;\n}")
        .unwrap();
    assert!(output.instructions.is_empty());
    assert_eq!(output.listing(), NO_CODE_MESSAGE);
    assert_eq!(output.diagnostics(), "#2: Semantic Error! 'x' is not defined.\n");
}

#[test]
fn test_duplicate_declarations() {
    let source = "int a;\nint a;\nvoid main(void) {\n int b;\n int b[2];\n}\nvoid main(void) { }";
    assert_eq!(
        diagnostics(source),
        vec![
            "#2: Semantic Error! 'a' is already defined in this scope.",
            "#5: Semantic Error! 'b' is already defined in this scope.",
            "#7: Semantic Error! 'main' is already defined in this scope.",
        ]
    );
}

#[test]
fn test_void_variables() {
    let source = "void v;\nvoid main(void) {\n void w[3];\n}";
    assert_eq!(
        diagnostics(source),
        vec![
            "#1: Semantic Error! Illegal type of void for 'v'.",
            "#3: Semantic Error! Illegal type of void for 'w'.",
        ]
    );
}

#[test]
fn test_operand_type_mismatches() {
    let source = r#"int arr[3];
void nothing(void) { }
int f(int n) { return n; }
void main(void) {
  int x;
  x = arr + 1;
  x = nothing() + 1;
  x = f * 2;
  arr = 3;
}"#;
    assert_eq!(
        diagnostics(source),
        vec![
            "#6: Semantic Error! Type mismatch in operands, Got array instead of int.",
            "#7: Semantic Error! Type mismatch in operands, Got void instead of int.",
            "#8: Semantic Error! Type mismatch in operands, Got function instead of int.",
            "#9: Semantic Error! Type mismatch in operands, Got array instead of int.",
        ]
    );
}

#[test]
fn test_argument_count_mismatch() {
    let source = "void f(int x) { }\nvoid main(void) {\n f(1, 2);\n f();\n output();\n}";
    assert_eq!(
        diagnostics(source),
        vec![
            "#3: Semantic Error! Mismatch in numbers of arguments of 'f'.",
            "#4: Semantic Error! Mismatch in numbers of arguments of 'f'.",
            "#5: Semantic Error! Mismatch in numbers of arguments of 'output'.",
        ]
    );
}

#[test]
fn test_argument_type_mismatch() {
    let source = r#"void f(int x) { }
void g(int a, int v[]) { }
void main(void) {
  int a[2];
  int n;
  f(a);
  g(n, n);
  g(a, a);
}"#;
    assert_eq!(
        diagnostics(source),
        vec![
            "#6: Semantic Error! Mismatch in type of argument 1 of 'f'. Expected int but got array instead.",
            "#7: Semantic Error! Mismatch in type of argument 2 of 'g'. Expected array but got int instead.",
            "#8: Semantic Error! Mismatch in type of argument 1 of 'g'. Expected int but got array instead.",
        ]
    );
}

#[test]
fn test_failed_call_value_does_not_cascade() {
    let source = "int f(int x) { return x; }\nvoid main(void) {\n int a[2];\n int r;\n r = f(a) + 1;\n}";
    assert_eq!(diagnostics(source).len(), 1);
}

#[test]
fn test_not_a_function_and_not_an_array() {
    let source = "int x;\nvoid main(void) {\n x(1);\n x[0] = 2;\n}";
    assert_eq!(
        diagnostics(source),
        vec![
            "#3: Semantic Error! 'x' is not a function.",
            "#4: Semantic Error! 'x' is not an array.",
        ]
    );
}

#[test]
fn test_break_outside_loop() {
    let source = "void main(void) {\n repeat { break; } until (1 == 1)\n break;\n}";
    assert_eq!(
        diagnostics(source),
        vec!["#3: Semantic Error! No 'repeat ... until' found for 'break'."]
    );
}

#[test]
fn test_missing_main() {
    let source = "int f(void) { return 1; }";
    assert_eq!(
        diagnostics(source),
        vec!["#1: Semantic Error! main function not found."]
    );
}

#[test]
fn test_main_must_be_void_without_parameters() {
    for source in [
        "int main(void) { return 0; }",
        "void main(int x) { output(x); }",
        "int main(int x) { return x; }",
    ] {
        assert_eq!(
            diagnostics(source),
            vec!["#1: Semantic Error! main function not found."],
            "{}",
            source
        );
    }
}

#[test]
fn test_oversized_arrays_are_diagnosed() {
    let global = "int big[2000000000];\nvoid main(void) {\n big[1] = 2;\n output(big[1]);\n}";
    assert_eq!(
        diagnostics(global),
        vec!["#1: Semantic Error! Storage for 'big' is too large."]
    );

    let local = "void main(void) {\n int big[2000000000];\n int i;\n i = 0;\n big[i] = i;\n}";
    assert_eq!(
        diagnostics(local),
        vec!["#2: Semantic Error! Storage for 'big' is too large."]
    );
}

#[test]
fn test_errors_are_reported_in_source_order() {
    let source = "void main(void) {\n a = 1;\n b = 2;\n break;\n c = 3;\n}";
    let lines: Vec<String> = diagnostics(source)
        .iter()
        .map(|d| d.split(':').next().unwrap_or_default().to_string())
        .collect();
    assert_eq!(lines, vec!["#2", "#3", "#4", "#5"]);
}

#[test]
fn test_fatal_errors() {
    let compiler = CminusCompiler::new();
    assert!(matches!(
        compiler.compile("void main(void) { int a; a = 1 $ 2; }"),
        Err(CompilerError::LexicalError(_, 1))
    ));
    assert!(matches!(
        compiler.compile("void main(void) {\n int a$;\n a = 1 @ 2;\n}"),
        Err(CompilerError::LexicalErrors(errors)) if errors.len() == 2
    ));
    assert!(matches!(
        compiler.compile("void main(void) { int a; a = ; }"),
        Err(CompilerError::SyntaxError(_, 1))
    ));
}

#[test]
fn test_invalid_layout_rejected() {
    let config = CompilerConfig {
        scratch_base: 220,
        ..CompilerConfig::default()
    };
    assert!(matches!(
        CminusCompiler::with_config(config),
        Err(CompilerError::ConfigError(_))
    ));
    assert!(CompilerConfig::from_toml_str("data_base = \"high\"").is_err());
}
