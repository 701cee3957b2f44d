use preprocessor::{extract_macro_names, preprocess};

#[test]
fn object_macro_substitutes() {
    let result = preprocess("#define PI 3.14159\nfloat c = 2.0 * PI;");
    assert!(result.code.contains("2.0 * 3.14159"));
    assert!(result.errors.is_empty());
}

#[test]
fn function_macro_substitutes_arguments() {
    let result = preprocess("#define MAX(a,b) ((a)>(b)?(a):(b))\nfloat r = MAX(x,y);");
    assert!(result.code.contains("((x)>(y)?(x):(y))"));
    assert!(result.errors.is_empty());
}

#[test]
fn undefined_ifdef_excludes_body() {
    let result = preprocess("#ifdef FOO\nfloat a=1.0;\n#endif\nfloat b=2.0;");
    assert!(!result.code.contains("a=1.0"));
    assert!(result.code.contains("b=2.0"));
    assert!(result.errors.is_empty());
}

#[test]
fn stray_endif_reports() {
    let result = preprocess("float v=1.0;\n#endif");
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].message.contains("#endif without matching"));
    assert!(result.code.contains("float v=1.0;"));
}

#[test]
fn if_expression_over_macro_value() {
    let result = preprocess("#define VERSION 2\n#if VERSION > 1\nfloat ok=1.0;\n#endif");
    assert!(result.code.contains("ok=1.0"));
    assert!(result.errors.is_empty());
}

#[test]
fn macro_name_extraction() {
    let names = extract_macro_names("#define A 1\n#define B(x) x\nfloat v=1.0;");
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn directive_phase_preserves_line_count() {
    let source = "#define X 1\n#ifdef NOPE\ngone\n#endif\nfloat a = X;\n#version 300 es";
    let result = preprocess(source);
    assert_eq!(
        result.code.split('\n').count(),
        source.split('\n').count()
    );
    // Blanked lines still map back to their original lines.
    for line in 1..=source.split('\n').count() {
        assert_eq!(result.line_mapping.get(&line), Some(&line));
    }
}

#[test]
fn word_boundaries_protect_longer_identifiers() {
    let result = preprocess("#define X 5\nfloat xValue = X;\nX;");
    assert!(result.code.contains("float xValue = 5;"));
    assert!(result.code.contains("5;"));
    assert!(!result.code.contains("5Value"));
    assert!(result.code.contains("xValue"));
}

#[test]
fn dead_outer_branch_suppresses_defined_inner() {
    let source = "#define INNER\n#ifdef OUTER\n#ifdef INNER\nfloat hidden;\n#endif\n#endif";
    let result = preprocess(source);
    assert!(!result.code.contains("hidden"));
    assert!(result.errors.is_empty());
}

#[test]
fn elif_chain_takes_exactly_one_branch() {
    let source = "#define V 2\n#if V==1\nbranch_one\n#elif V==2\nbranch_two\n#elif V==3\nbranch_three\n#else\nbranch_else\n#endif";
    let result = preprocess(source);
    assert!(result.code.contains("branch_two"));
    assert!(!result.code.contains("branch_one"));
    assert!(!result.code.contains("branch_three"));
    assert!(!result.code.contains("branch_else"));
}

#[test]
fn circular_macros_terminate_with_diagnostic() {
    let result = preprocess("#define A B\n#define B A\nfloat v = A;");
    assert!(result
        .errors
        .iter()
        .any(|e| e.message.contains("maximum recursion depth")));
}

#[test]
fn argument_count_mismatch_reports_site() {
    let result = preprocess("#define MAX(a,b) ((a)>(b)?(a):(b))\nfloat r = MAX(x);");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 2);
    assert!(result.errors[0].message.contains("expects 2 arguments, got 1"));
    assert!(result.code.contains("MAX(x)"));
}

#[test]
fn bad_invocation_reports_once_even_over_multiple_passes() {
    // Expanding X forces a second pass; the abandoned MAX(X) site must
    // still produce a single diagnostic.
    let source = "#define X 5\n#define MAX(a,b) ((a)>(b)?(a):(b))\nfloat r = MAX(X);";
    let result = preprocess(source);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 3);
    assert!(result.errors[0].message.contains("expects 2 arguments, got 1"));
    assert!(result.code.contains("MAX(5)"));
}

#[test]
fn multi_line_invocation_expands_across_output_lines() {
    let result = preprocess("#define MAX(a,b) ((a)>(b)?(a):(b))\nfloat r = MAX(x,\n    y);");
    assert!(result.code.contains("((x)>(y)?(x):(y))"));
    assert!(result.errors.is_empty());
}

#[test]
fn spliced_lines_map_back_to_first_original() {
    let source = "#define LONG 1.0 + \\\n2.0\nfloat v = LONG;";
    let result = preprocess(source);
    assert!(result.code.contains("1.0 + 2.0"));
    // Output line 2 came from original line 3.
    assert_eq!(result.line_mapping.get(&2), Some(&3));
}

#[test]
fn diagnostics_do_not_abort_the_run() {
    let source = "#define 1BAD nope\n#endif\n#define GOOD 7\nfloat v = GOOD;";
    let result = preprocess(source);
    assert_eq!(result.errors.len(), 2);
    assert!(result.code.contains("float v = 7;"));
}

#[test]
fn version_directive_survives_for_the_driver() {
    let result = preprocess("#version 300 es\nvoid main() {}");
    assert!(result.code.starts_with("#version 300 es"));
}

#[test]
fn defined_operator_in_conditions() {
    let source = "#define FEATURE\n#if defined(FEATURE) && !defined(MISSING)\nfloat on;\n#endif";
    let result = preprocess(source);
    assert!(result.code.contains("float on;"));
    assert!(result.errors.is_empty());
}

#[test]
fn unclosed_conditional_reports_opening_line() {
    let result = preprocess("float a;\n#ifdef FOO\nfloat b;");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 2);
    assert!(result.errors[0]
        .message
        .contains("Unclosed conditional directive"));
}
