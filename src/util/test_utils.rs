use crate::{
    codegen::{self, Options},
    fold,
    lexer::lex_in_new,
    parser,
    token::TokenStream,
    util::fmt::tree,
};

pub fn format_errors<E: ToString>(errors: &[E]) -> Vec<String> {
    errors.iter().map(ToString::to_string).collect()
}

/// Each variant contains the input.
pub enum Test {
    Parser(&'static str),
    Fold(&'static str),
    Codegen(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

fn parse(input: &str) -> parser::ParseResult<crate::ast::Ast> {
    parser::parse(TokenStream::new(lex_in_new(input)))
}

/// Runs the pipeline up to the stage under test, returning the printed
/// output of that stage and every error reported on the way.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    match test {
        Test::Parser(input) => {
            let (ast, errors) = match parse(input) {
                Ok(ast) => (ast, vec![]),
                Err((ast, errors)) => (ast, errors),
            };
            (tree::print_ast_string(&ast), format_errors(&errors))
        }
        Test::Fold(input) => {
            let ast = match parse(input) {
                Ok(ast) => ast,
                Err((_, errors)) => return (String::new(), format_errors(&errors)),
            };
            match fold::fold(&ast) {
                Ok(program) => (tree::print_program_string(&program), vec![]),
                Err(error) => (String::new(), vec![error.to_string()]),
            }
        }
        Test::Codegen(input) => {
            let ast = match parse(input) {
                Ok(ast) => ast,
                Err((_, errors)) => return (String::new(), format_errors(&errors)),
            };
            let generated = fold::fold(&ast)
                .map_err(|error| error.to_string())
                .and_then(|program| {
                    codegen::generate(&program, &Options::default())
                        .map_err(|error| error.to_string())
                });
            match generated {
                Ok(module) => (module.to_string(), vec![]),
                Err(error) => (String::new(), vec![error]),
            }
        }
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, source), $source:expr) => {
        crate::util::test_utils::Test::Parser($source)
    };
    (@@get_test(fold, source), $source:expr) => {
        crate::util::test_utils::Test::Fold($source)
    };
    (@@get_test(codegen, source), $source:expr) => {
        crate::util::test_utils::Test::Codegen($source)
    };
}
pub(crate) use tree_tests;
