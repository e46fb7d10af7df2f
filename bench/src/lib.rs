use std::fmt::Write;

/// Builds a source file with `functions` small functions that exercise
/// declarations, loops, conditionals and calls.
pub fn synthetic_source(functions: usize) -> String {
    let mut src = String::from("i64 total = 0;\n");
    for i in 0..functions {
        _ = write!(
            src,
            "
func step{i}(n: i64, scale: f64): f64 {{
    i64 k = 0;
    while k < n {{
        if k == 3 {{ total = total + 1; }} elif k > 10 {{ k = k + 2; }} else {{ k = k + 1; }}
    }}
    return scale * k / 2;
}}
"
        );
    }
    src.push_str("func main() {\n");
    for i in 0..functions {
        _ = writeln!(src, "    f64 r{i} = step{i}(100, 1.5);");
    }
    src.push_str("}\n");
    src
}
