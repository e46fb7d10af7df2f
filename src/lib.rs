//! A small compiler core: tokens are parsed into a shallow AST, folded into
//! statements and postfix expressions, and lowered to a basic-block IR.

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The fold pass gives the parser output its statement and expression
/// structure.
pub mod fold;

/// The code generator lowers a folded program into IR.
pub mod codegen;

pub mod ast;
pub mod ir;
pub mod program;
pub mod token;
pub mod types;
pub mod util;

use thiserror::Error;

use crate::token::TokenStream;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", join_errors(.0))]
    Parse(Vec<parser::Error>),
    #[error(transparent)]
    Fold(#[from] fold::Error),
    #[error(transparent)]
    Codegen(#[from] codegen::Error),
}

fn join_errors(errors: &[parser::Error]) -> String {
    let messages: Vec<_> = errors.iter().map(ToString::to_string).collect();
    messages.join("; ")
}

/// Runs the whole pipeline over `src`.
pub fn compile(src: &str, options: &codegen::Options) -> Result<ir::Module, Error> {
    let tokens = TokenStream::new(lexer::lex_in_new(src));
    let ast = parser::parse(tokens).map_err(|(_, errors)| Error::Parse(errors))?;
    let program = fold::fold(&ast)?;
    Ok(codegen::generate(&program, options)?)
}

#[cfg(test)]
mod tests {
    use crate::codegen::Options;

    #[test]
    fn test_compile_reports_first_failing_stage() {
        let error = super::compile("func f(", &Options::default()).unwrap_err();
        assert!(matches!(error, super::Error::Parse(_)));

        let error = super::compile("x = 1;", &Options::default()).unwrap_err();
        assert_eq!(error.to_string(), "unexpected `x` at top level");

        let error = super::compile("func f() { y = 1; }", &Options::default()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "assignment to undefined or constant binding `y`"
        );
    }

    #[test]
    fn test_compile_produces_module() {
        let module = super::compile("i32 x = 1; func main() { }", &Options::default()).unwrap();
        assert!(module.global("x").is_some());
        assert!(module.function("main").is_some());
    }
}
