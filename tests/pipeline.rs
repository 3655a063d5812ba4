//! End-to-end pipeline tests: MiniC source in, LLVM IR text out.

use mccomp::compile;

#[test]
fn factorial_while_loop() {
    let ir = compile(
        "int factorial(int n) {\n\
         \x20 int result;\n\
         \x20 int i;\n\
         \x20 result = 1;\n\
         \x20 i = 1;\n\
         \x20 while (i <= n) {\n\
         \x20   result = result * i;\n\
         \x20   i = i + 1;\n\
         \x20 }\n\
         \x20 return result;\n\
         }\n\
         int main() { return factorial(5); }",
    )
    .unwrap();

    assert!(ir.starts_with("; ModuleID = 'mini-c'\nsource_filename = \"mini-c\"\n"));
    assert!(ir.contains("define i32 @factorial(i32 %n) {"), "{}", ir);
    assert!(ir.contains("%result = alloca i32"), "{}", ir);
    assert!(ir.contains("%i = alloca i32"), "{}", ir);
    assert!(ir.contains("%n1 = alloca i32"), "{}", ir);
    assert!(ir.contains("store i32 %n, ptr %n1"), "{}", ir);
    assert!(ir.contains("loop:"), "{}", ir);
    assert!(ir.contains("body:"), "{}", ir);
    assert!(ir.contains("afterloop:"), "{}", ir);
    assert!(ir.contains("%cmptmp = icmp sle i32 %i1, %n2"), "{}", ir);
    assert!(ir.contains("br i1 %cmptmp, label %body, label %afterloop"), "{}", ir);
    assert!(ir.contains("%multmp = mul i32 %result1, %i2"), "{}", ir);
    assert!(ir.contains("%calltmp = call i32 @factorial(i32 5)"), "{}", ir);
}

#[test]
fn mutual_recursion_through_forward_declaration() {
    let ir = compile(
        "int odd(int n);\n\
         int even(int n) {\n\
         \x20 if (n == 0) return 1;\n\
         \x20 return odd(n - 1);\n\
         }\n\
         int odd(int n) {\n\
         \x20 if (n == 0) return 0;\n\
         \x20 return even(n - 1);\n\
         }\n\
         int main() { return even(10); }",
    )
    .unwrap();

    // One definition per function; the forward declaration adds nothing.
    assert_eq!(ir.matches("define i32 @odd(i32 %n) {").count(), 1);
    assert_eq!(ir.matches("define i32 @even(i32 %n) {").count(), 1);
    assert!(!ir.contains("declare i32 @odd"), "{}", ir);
    assert!(ir.contains("%cmptmp = icmp eq i32 %n2, 0"), "{}", ir);
    assert!(ir.contains("%calltmp = call i32 @odd(i32 %subtmp)"), "{}", ir);
    assert!(ir.contains("%calltmp = call i32 @even(i32 10)"), "{}", ir);
}

#[test]
fn int_to_float_widening_in_return() {
    let ir = compile("float get_float() { int x; x = 42; return x; }").unwrap();
    assert!(ir.contains("%conv = sitofp i32 %x1 to float"), "{}", ir);
    assert!(ir.contains("ret float %conv"), "{}", ir);
}

#[test]
fn short_circuit_keeps_call_in_rhs_block() {
    let ir = compile(
        "extern int side_effect();\n\
         int main() {\n\
         \x20 int x;\n\
         \x20 int result;\n\
         \x20 x = 0;\n\
         \x20 result = x && side_effect();\n\
         \x20 return result;\n\
         }",
    )
    .unwrap();

    assert!(ir.contains("br i1 %tobool, label %andrhs, label %andcont"), "{}", ir);
    let after_label = ir.split("andrhs:").nth(1).expect("andrhs block missing");
    let rhs_block = after_label.split("andcont:").next().unwrap();
    assert!(rhs_block.contains("call i32 @side_effect()"), "{}", ir);
    // The left block never calls.
    let before_label = ir.split("andrhs:").next().unwrap();
    assert!(!before_label.contains("call i32 @side_effect()"), "{}", ir);
    assert!(ir.contains("phi i1 [ false, %entry ]"), "{}", ir);
}

#[test]
fn globals_externs_and_functions_in_order() {
    let ir = compile(
        "int counter;\n\
         extern void print_int(int v);\n\
         void bump() { counter = counter + 1; print_int(counter); }",
    )
    .unwrap();

    let global_pos = ir.find("@counter = global i32 zeroinitializer").unwrap();
    let declare_pos = ir.find("declare void @print_int(i32)").unwrap();
    let define_pos = ir.find("define void @bump() {").unwrap();
    assert!(global_pos < declare_pos && declare_pos < define_pos, "{}", ir);
    assert!(ir.contains("call void @print_int(i32 %counter1)"), "{}", ir);
}

#[test]
fn matrix_multiplication_shape() {
    let ir = compile(
        "void matmul(float a[2][2], float b[2][2], float c[2][2]) {\n\
         \x20 int i; int j; int k;\n\
         \x20 i = 0;\n\
         \x20 while (i < 2) {\n\
         \x20   j = 0;\n\
         \x20   while (j < 2) {\n\
         \x20     c[i][j] = 0.0;\n\
         \x20     k = 0;\n\
         \x20     while (k < 2) {\n\
         \x20       c[i][j] = c[i][j] + a[i][k] * b[k][j];\n\
         \x20       k = k + 1;\n\
         \x20     }\n\
         \x20     j = j + 1;\n\
         \x20   }\n\
         \x20   i = i + 1;\n\
         \x20 }\n\
         }",
    )
    .unwrap();

    assert!(ir.contains("define void @matmul(ptr %a, ptr %b, ptr %c) {"), "{}", ir);
    assert!(ir.contains("getelementptr inbounds [2 x float], ptr"), "{}", ir);
    assert!(ir.contains("%multmp = fmul float"), "{}", ir);
    assert!(ir.contains("loop2:"), "{}", ir);
}

#[test]
fn emitting_twice_is_byte_identical() {
    let source = "int g;\n\
                  int f(int n) {\n\
                  \x20 int i;\n\
                  \x20 i = 0;\n\
                  \x20 while (i < n) { g = g + i; i = i + 1; }\n\
                  \x20 return g;\n\
                  }";
    assert_eq!(compile(source).unwrap(), compile(source).unwrap());
}

#[test]
fn compile_file_reads_from_disk() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.c");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "int main() {{ return 0; }}").unwrap();

    let ir = mccomp::compile_file(&path).unwrap();
    assert!(ir.contains("define i32 @main() {"));
}

#[test]
fn compile_file_reports_missing_input() {
    let err = mccomp::compile_file(std::path::Path::new("no/such/file.c")).unwrap_err();
    assert!(matches!(err, mccomp::CompileError::Io(_)));
}
