use indoc::indoc;
use mipsc::{error::CompileError, parse::Limits, Options};
use pretty_assertions::assert_eq;

use std::{collections::BTreeSet, io};

fn compile_with(source: &str, options: &Options) -> (Result<String, CompileError>, String) {
    let mut output = Vec::new();
    let mut diagnostics = Vec::new();

    let result = mipsc::compile(source, options, &mut output, &mut diagnostics)
        .map(|()| String::from_utf8(output).unwrap())
        .map_err(|error| error.into_inner());

    (result, String::from_utf8(diagnostics).unwrap())
}

fn compile(source: &str) -> Result<String, CompileError> {
    compile_with(source, &Options::default()).0
}

fn error(source: &str) -> CompileError {
    compile(source).unwrap_err()
}

/// Las líneas con indentación adicional se toman como instrucciones.
fn listing(text: &str) -> String {
    text.lines()
        .map(|line| match line.strip_prefix("    ") {
            Some(instruction) => format!("\t{}\n", instruction),
            None => format!("{}\n", line),
        })
        .collect()
}

fn labels(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("__L")?.strip_suffix(':')?.parse().ok())
        .collect()
}

#[test]
fn small_program() {
    let source = indoc! {"
        int counter;

        int add(int a, int b) {
            int sum = a + b;
            return sum;
        }
    "};

    let expected = listing(indoc! {"
        .data
        .text

        .data
        .align 2
        counter:
        .space 4
        .text

        .globl add
        add:
            addi    $sp, $sp, -20
            lw      $s0, 12($sp)
            lw      $s1, 8($sp)
            add     $s0, $s0, $s1
            sw      $s0, 4($sp)
            lw      $s0, 4($sp)
            sw      $s0, 16($sp)
            addi    $sp, $sp, 20
            lw      $ra, 0($sp)
            jr      $ra
            addi    $sp, $sp, 20
            lw      $ra, 0($sp)
            jr      $ra
    "});

    assert_eq!(compile(source).unwrap(), expected);
}

#[test]
fn control_flow() {
    let source = indoc! {"
        int flag;

        void spin(void) {
            while (flag) {
                if (flag < 3) flag = 0;
            }
        }
    "};

    let output = compile(source).unwrap();
    let expected = listing(indoc! {"
        .globl spin
        spin:
            addi    $sp, $sp, -8

        __L0:
            la      $t0, flag
            lw      $s0, 0($t0)
            beq     $s0, $zero, __L1
            la      $t0, flag
            lw      $s0, 0($t0)
            li      $s1, 3
            slt     $s0, $s0, $s1
            beq     $s0, $zero, __L2
            li      $s0, 0
            la      $t0, flag
            sw      $s0, 0($t0)

        __L2:
            j       __L0

        __L1:
            addi    $sp, $sp, 8
            lw      $ra, 0($sp)
            jr      $ra
    "});

    assert!(output.ends_with(&expected), "{}", output);
}

#[test]
fn labels_are_unique_across_functions() {
    let source = indoc! {"
        int flag;

        void first(void) {
            if (flag) flag = 0;
            while (flag < 10) {
                flag = flag + 1;
            }
        }

        int second(int n) {
            if (n) {
                return second(n - 1);
            }

            return flag && n;
        }
    "};

    let output = compile(source).unwrap();
    let labels = labels(&output);
    let unique: BTreeSet<_> = labels.iter().copied().collect();

    assert_eq!(labels.len(), unique.len());
    assert_eq!(unique.into_iter().collect::<Vec<_>>(), (0..6).collect::<Vec<_>>());
    assert!(output.contains("\tj       __L1\n"));
}

#[test]
fn frame_is_extended_after_all_declarations() {
    let source = indoc! {"
        void locals(void) {
            int a;
            char b;
            int c[3];
            a = 1;
            b = 2;
            c[0] = a;
            c[1] = b;
        }
    "};

    let output = compile(source).unwrap();
    let body = output.split("locals:\n").nth(1).unwrap();

    assert!(body.starts_with("\taddi    $sp, $sp, -28\n"));
    assert_eq!(output.matches("$sp, -28\n").count(), 1);
}

#[test]
fn initializers_run_after_prologue() {
    let source = indoc! {r#"
        int main(void) {
            char *text = "a;b";
            int n = (1 + 2) * 3;
            return n;
        }
    "#};

    let output = compile(source).unwrap();
    let body = output.split("main:\n").nth(1).unwrap();

    assert!(body.starts_with(concat!(
        "\taddi    $sp, $sp, -16\n",
        "\tla      $s0, __str0\n",
        "\tsw      $s0, 8($sp)\n",
    )));

    assert!(output.contains("__str0:\t.asciiz \"a;b\"\n"));
}

#[test]
fn duplicate_declarations() {
    assert!(matches!(error("int x; int x;"), CompileError::DuplicateData));
    assert!(matches!(error("int x(void); int x;"), CompileError::DuplicateData));
    assert!(matches!(error("int x; int x(void);"), CompileError::IncompatibleDefinitions));
    assert!(matches!(
        error("int f(int); char f(int);"),
        CompileError::IncompatibleDefinitions
    ));
    assert!(matches!(
        error("int g(void) { return 1; } int g(void) { return 2; }"),
        CompileError::Redefinition(name) if name == "g"
    ));

    let output = compile("int f(int a); int f(int b) { return b; } int f(int);").unwrap();
    assert_eq!(output.matches(".globl f\n").count(), 1);
}

#[test]
fn prototypes_emit_nothing() {
    assert_eq!(compile("int f(char *s, int (*g)(void));").unwrap(), ".data\n.text\n\n");
}

#[test]
fn function_errors() {
    assert!(matches!(error("int (f(void))(int);"), CompileError::ReturnsFunction));
    assert!(matches!(error("int (f(void))[3];"), CompileError::ReturnsList));
    assert!(matches!(
        error("int f(int a, int) { return a; }"),
        CompileError::UnnamedParameter(2)
    ));
    assert!(matches!(error("void f(void) { return 1; }"), CompileError::VoidReturnValue));
    assert!(matches!(error("int f(void) { return; }"), CompileError::ExpectedExpression));
    assert!(matches!(error("void v;"), CompileError::VoidVariable(_)));
    assert!(matches!(
        error("int main(void) { int f(void); return 0; }"),
        CompileError::LocalFunction
    ));
    assert!(matches!(
        error("int main(void) { int l[2] = 3; return 0; }"),
        CompileError::ListInitializer
    ));
    assert!(matches!(
        error("int main(int a, int a) { return a; }"),
        CompileError::DuplicateLocal(name) if name == "a"
    ));
    assert!(matches!(error("int;"), CompileError::ExpectedIdentifier));
    assert!(matches!(error("int ()(int);"), CompileError::ExpectedFunctionName));
    assert!(matches!(error("int f(void) { return 0; "), CompileError::Expected('}')));
}

#[test]
fn parameters_follow_the_signature() {
    assert!(matches!(
        error("int f(void x) { return 0; }"),
        CompileError::VoidVariable(name) if name == "x"
    ));
    assert!(matches!(
        error("int f(void, int a) { return a; }"),
        CompileError::UnnamedParameter(1)
    ));
    assert!(matches!(
        error("int f(int a, void) { return a; }"),
        CompileError::UnnamedParameter(2)
    ));
    assert!(matches!(
        error("int f(int a, void b) { return a; }"),
        CompileError::VoidVariable(name) if name == "b"
    ));

    let output = compile("int f(int (*g)(int x), char l[4]) { return g(l[0]); }").unwrap();
    assert!(output.contains("\tlw      $s0, 8($sp)\n"));
    assert!(output.contains("\tlw      $s1, 4($sp)\n"));
}

#[test]
fn void_parameter_list_with_no_arguments_allowed() {
    let options = Options {
        limits: Limits {
            max_arguments: 0,
            ..Limits::default()
        },
    };

    let (result, _) = compile_with("int main(void) { return 0; }", &options);
    assert!(result.is_ok());

    let (result, _) = compile_with("int f(int a) { return a; }", &options);
    assert!(matches!(result, Err(CompileError::TooManyArguments)));
}

#[test]
fn frame_size_is_bounded() {
    for source in [
        "int main(void) { int a[1073741823]; return 0; }",
        "int main(void) { int a[65536][65536]; return 0; }",
        "int main(void) { int a[8190]; return 0; }",
        "void f(int a, int b) { char c[32752]; }",
    ] {
        assert!(
            matches!(error(source), CompileError::FrameTooLarge(32759)),
            "{}",
            source
        );
    }

    let output = compile("int main(void) { int a[8189]; return 0; }").unwrap();
    assert!(output.contains("\taddi    $sp, $sp, -32764\n"));
    assert!(output.contains("\tsw      $s0, 32760($sp)\n"));
    assert!(output.contains("\taddi    $sp, $sp, 32764\n"));
}

#[test]
fn locals_are_bound_in_declaration_order() {
    assert!(matches!(
        error("int main(void) { int a = b; int b; return a; }"),
        CompileError::Undefined(name) if name == "b"
    ));
    assert!(matches!(
        error("int main(void) { int a; char a; return 0; }"),
        CompileError::DuplicateLocal(name) if name == "a"
    ));
    assert!(matches!(
        error("int main(int a) { int a; return 0; }"),
        CompileError::DuplicateLocal(name) if name == "a"
    ));

    let source = indoc! {"
        int main(void) {
            int a = 2;
            int b = a * 3;
            return b;
        }
    "};

    let output = compile(source).unwrap();
    let body = output.split("main:\n").nth(1).unwrap();

    assert!(body.starts_with(&listing(concat!(
        "    addi    $sp, $sp, -16\n",
        "    li      $s0, 2\n",
        "    sw      $s0, 8($sp)\n",
        "    lw      $s0, 8($sp)\n",
        "    li      $s1, 3\n",
        "    mul     $s0, $s0, $s1\n",
        "    sw      $s0, 4($sp)\n",
    ))));
}

#[test]
fn recursion() {
    let source = indoc! {"
        int fact(int n) {
            if (n < 2)
                return 1;

            return n * fact(n - 1);
        }
    "};

    let output = compile(source).unwrap();
    assert!(output.contains("\tj       fact\n"));
    assert!(output.contains("\tmul     $s0, $s0, $s1\n"));
}

#[test]
fn function_pointers() {
    let source = indoc! {"
        int twice(int x) {
            return x + x;
        }

        int apply(int (*f)(int), int x) {
            return f(x);
        }

        int main(void) {
            return apply(twice, 21);
        }
    "};

    let output = compile(source).unwrap();
    assert!(output.contains("\tjr      $t2\n"));
    assert!(output.contains("\tla      $s0, twice\n"));
}

#[test]
fn escaped_string() {
    let source = r#"char *s(void) { return "a\"b"; }"#;
    let output = compile(source).unwrap();

    assert!(output.starts_with(".data\n__str0:\t.asciiz \"a\\\"b\"\n.text\n"));
    assert!(output.contains("\tla      $s0, __str0\n"));
    assert_eq!(output.matches(".asciiz").count(), 1);
}

#[test]
fn unterminated_string() {
    assert!(matches!(
        error("char *s(void) { return \"abc; }"),
        CompileError::UnterminatedString
    ));
}

#[test]
fn error_diagnostic() {
    let source = "int main(void) {\n    return 0\n}\n";
    let error = mipsc::compile(source, &Options::default(), &mut io::sink(), &mut io::sink())
        .unwrap_err();

    let diagnostic = mipsc::error::Diagnostic::from(error);
    assert_eq!(diagnostic.to_string(), "Line 3:\n}\n^\nError: Expected ';'\n");
}

#[test]
fn warnings_do_not_stop_compilation() {
    let source = "int *p;\nint main(void) {\n    p = 5;\n    return 0;\n}\n";
    let (result, diagnostics) = compile_with(source, &Options::default());

    assert!(result.is_ok());
    assert_eq!(
        diagnostics,
        "Line 3:\np = 5;\n     ^\nWarning: Implicit conversion from `int` to `pointer to int`\n"
    );
}

#[test]
fn identifier_limits() {
    let options = Options {
        limits: Limits {
            identifier_length: 4,
            max_arguments: 1,
        },
    };

    let source = "int counter;\nint main(void) {\n    count = 1;\n    return 0;\n}\n";
    let (result, diagnostics) = compile_with(source, &options);

    assert!(result.unwrap().contains("\ncoun:\n"));
    assert!(diagnostics.ends_with("Warning: Identifier truncated to 4 characters\n"));

    let (result, _) = compile_with("int f(int a, int b);", &options);
    assert!(matches!(result, Err(CompileError::TooManyArguments)));
}
