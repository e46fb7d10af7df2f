use thiserror::Error;
use tracing::{trace, warn};

use crate::{
    ast::{Ast, Branch, LoopKind, Marker, Node, NodeKind, INFERRED},
    token::{Token, TokenKind, TokenSource},
    types::builtins,
};

/// On failure the partially built value is returned along with every error
/// the parser recovered from.
pub type ParseResult<T> = Result<T, (T, Vec<Error>)>;

/// Parses the whole token stream in a single forward pass.
pub fn parse(source: impl TokenSource) -> ParseResult<Ast> {
    let mut p = Parser::new(source);
    p.dispatch();

    let Parser { ast, errors, .. } = p;
    if errors.is_empty() {
        Ok(ast)
    } else {
        for error in &errors {
            warn!(%error, "parser recovered from error");
        }
        Err((ast, errors))
    }
}

/// Where newly observed tokens are routed to.
#[derive(Debug, Default)]
struct ParseState {
    in_parameter_list: bool,
    in_function_body: bool,
    /// Only the first close of a function counts: later parentheses belong to
    /// expressions.
    param_lists_closed: u8,
    brace_depth: u32,
    paren_depth: u32,
    /// One entry per call whose argument list is still open, counting the
    /// parentheses nested inside those arguments.
    open_calls: Vec<u32>,
    /// A type keyword observed by the previous iteration.
    pending_type: Option<Box<str>>,
}

impl ParseState {
    /// Whether the parentheses and braces of the function header are still
    /// being tracked.
    fn in_function_header(&self) -> bool {
        self.in_function_body && self.param_lists_closed == 0 && self.brace_depth == 0
    }
}

struct Parser<S> {
    source: S,
    current: Token,
    ast: Ast,
    state: ParseState,
    errors: Vec<Error>,
}

impl<S: TokenSource> Parser<S> {
    fn dispatch(&mut self) {
        while !self.current.is_null() {
            if self.current.kind != TokenKind::Identifier {
                self.flush_pending_type();
            }
            match self.current.kind {
                TokenKind::Punctuation | TokenKind::Parenthesis | TokenKind::Brace => {
                    self.punctuation();
                }
                TokenKind::Keyword => self.keyword(),
                TokenKind::Identifier => self.identifier(),
                TokenKind::Operator
                | TokenKind::Integer
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::Bool => self.literal(),
                TokenKind::Null => break,
            }
        }

        self.flush_pending_type();
        if self.state.in_function_body {
            let name = self.open_function_name();
            self.error(Error::UnterminatedFunction { name });
        }
    }

    fn punctuation(&mut self) {
        if self.state.in_function_body && self.function_punctuation() {
            return;
        }

        if let Some(nested) = self.state.open_calls.last_mut() {
            if self.current.is_punct("(") {
                *nested += 1;
            } else if self.current.is_punct(")") {
                if *nested == 0 {
                    self.state.open_calls.pop();
                    self.advance();
                    return;
                }
                *nested -= 1;
            }
        }

        match Marker::from_punct(&self.current.lexeme) {
            Some(marker) => self.append_node(Node::marker(marker)),
            None => trace!(lexeme = %self.current.lexeme, "skipping unrecognized punctuation"),
        }
        self.advance();
    }

    /// Handles the outermost parentheses (the parameter list) and braces (the
    /// body) of the current function. Returns true if the token was consumed.
    fn function_punctuation(&mut self) -> bool {
        if self.state.in_function_header() {
            if self.current.is_punct("(") {
                self.state.paren_depth += 1;
                if self.state.paren_depth == 1 {
                    self.state.in_parameter_list = true;
                    self.advance();
                    return true;
                }
            } else if self.current.is_punct(")") && self.state.paren_depth > 0 {
                self.state.paren_depth -= 1;
                if self.state.paren_depth == 0 {
                    self.close_parameter_list();
                    return true;
                }
            }
        }

        if self.current.is_punct("{") {
            self.state.brace_depth += 1;
            if self.state.brace_depth == 1 {
                if self.state.in_parameter_list {
                    self.error(Error::UnexpectedEnd {
                        construct: "parameter list",
                    });
                    self.state.in_parameter_list = false;
                    self.state.param_lists_closed = 1;
                }
                self.advance();
                return true;
            }
        } else if self.current.is_punct("}") && self.state.brace_depth > 0 {
            self.state.brace_depth -= 1;
            if self.state.brace_depth == 0 {
                self.close_function_body();
                return true;
            }
        }
        false
    }

    /// Emits the parameter-list-closed marker and consumes the optional
    /// `: <type>` return type clause.
    fn close_parameter_list(&mut self) {
        self.append_node(Node::marker(Marker::ParamsClosed));
        self.state.in_parameter_list = false;
        self.state.param_lists_closed = self.state.param_lists_closed.saturating_add(1);
        self.advance();

        if !self.current.is_punct(":") {
            return;
        }
        self.advance();
        if !matches!(
            self.current.kind,
            TokenKind::Keyword | TokenKind::Identifier
        ) {
            self.error(Error::MissingReturnType);
            return;
        }
        let ty = self.advance().lexeme;
        if let Some(function) = self.open_function() {
            function.ctx_type = Some(ty);
        }
    }

    fn close_function_body(&mut self) {
        self.state.open_calls.clear();
        self.append_node(Node::marker(Marker::BlockClosed));
        self.state = ParseState::default();
        self.advance();
    }

    fn keyword(&mut self) {
        let keyword = self.current.lexeme.clone();
        match &*keyword {
            "if" => self.parse_header(Node::new(NodeKind::Conditional(Branch::If)), "if header"),
            "elif" => self.parse_header(
                Node::new(NodeKind::Conditional(Branch::Elif)),
                "elif header",
            ),
            "else" => self.parse_header(
                Node::new(NodeKind::Conditional(Branch::Else)),
                "else header",
            ),
            "while" => self.parse_header(Node::new(NodeKind::Loop(LoopKind::While)), "loop header"),
            "for" => self.parse_header(Node::new(NodeKind::Loop(LoopKind::For)), "loop header"),
            "func" => self.parse_function(),
            name if builtins::is_type_name(name) => {
                self.state.pending_type = Some(keyword);
                self.advance();
            }
            _ => {
                self.advance();
                self.append_node(Node::new(NodeKind::Keyword).with_value(keyword));
            }
        }
    }

    fn identifier(&mut self) {
        let name = self.advance().lexeme;
        if let Some(ty) = self.state.pending_type.take() {
            self.parse_declaration(ty, name);
        } else if self.current.is_punct("(") {
            self.parse_call(name);
        } else {
            self.append_node(Node::new(NodeKind::Ident).with_ident(name));
        }
    }

    fn literal(&mut self) {
        let token = self.advance();
        if let Some(node) = leaf(token) {
            self.append_node(node);
        }
    }

    fn parse_function(&mut self) {
        if self.state.in_function_body {
            let name = self.open_function_name();
            self.error(Error::UnterminatedFunction { name });
            self.state = ParseState::default();
        }

        self.advance(); // `func`
        let mut function = Node::new(NodeKind::Function).with_ctx_type(INFERRED);
        match self.current.kind {
            TokenKind::Identifier => function.ident = Some(self.advance().lexeme),
            TokenKind::Null => self.error(Error::UnexpectedEnd {
                construct: "function header",
            }),
            _ => self.error(Error::MissingFunctionName),
        }
        self.append_node(function);
        self.state.in_function_body = true;
    }

    /// The current token is the look-ahead after the declared name.
    fn parse_declaration(&mut self, ty: Box<str>, name: Box<str>) {
        let mut decl = Node::new(NodeKind::VariableDecl)
            .with_ctx_type(ty)
            .with_ident(name);
        if self.current.is_operator("=") {
            decl.initialized = true;
            self.advance();
        }
        self.append_node(decl);
    }

    /// The current token is the opening parenthesis of the argument list.
    fn parse_call(&mut self, callee: Box<str>) {
        self.append_node(Node::new(NodeKind::Call).with_ident(callee));
        self.advance();
        self.state.open_calls.push(0);
    }

    /// Collects every token up to (not including) the `{` opening the body.
    fn parse_header(&mut self, mut node: Node, construct: &'static str) {
        self.advance(); // keyword
        let mut raw = Vec::new();
        while !self.current.is_punct("{") {
            if self.current.is_null() {
                self.error(Error::UnexpectedEnd { construct });
                break;
            }
            let token = self.advance();
            raw.push(token.lexeme.clone());
            node.header.extend(leaf(token));
        }
        if !raw.is_empty() {
            node.value = Some(raw.join(" ").into());
        }
        self.append_node(node);
    }

    /// Appends to the location the current state points at: the top level,
    /// the open function (parameters or body) and then any open call.
    fn append_node(&mut self, node: Node) {
        let state = &self.state;
        let mut target = &mut self.ast.chl;

        let in_function = matches!(target.last(), Some(last) if last.kind == NodeKind::Function);
        if state.in_function_body && in_function {
            let last = target.len() - 1;
            let function = &mut target[last];
            target = if state.in_parameter_list {
                &mut function.arg_nodes
            } else {
                &mut function.body
            };
        }
        for _ in &state.open_calls {
            let Some(last) = target.len().checked_sub(1) else {
                break;
            };
            target = &mut target[last].arg_nodes;
        }

        target.push(node);
    }

    fn flush_pending_type(&mut self) {
        if let Some(ty) = self.state.pending_type.take() {
            self.append_node(Node::new(NodeKind::Keyword).with_value(ty));
        }
    }
}

impl<S: TokenSource> Parser<S> {
    fn new(mut source: S) -> Parser<S> {
        let current = source.next_token();
        Parser {
            source,
            current,
            ast: Ast::default(),
            state: ParseState::default(),
            errors: Vec::with_capacity(8),
        }
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let next = self.source.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn open_function(&mut self) -> Option<&mut Node> {
        self.ast
            .chl
            .last_mut()
            .filter(|node| node.kind == NodeKind::Function)
    }

    fn open_function_name(&mut self) -> Box<str> {
        self.open_function()
            .and_then(|function| function.ident.clone())
            .unwrap_or_default()
    }

    fn error(&mut self, error: Error) {
        trace!(%error, "recording parse error");
        self.errors.push(error);
    }
}

/// Converts a token into the leaf node it stands for.
fn leaf(token: Token) -> Option<Node> {
    let kind = match token.kind {
        TokenKind::Identifier => return Some(Node::new(NodeKind::Ident).with_ident(token.lexeme)),
        TokenKind::Punctuation | TokenKind::Parenthesis | TokenKind::Brace => {
            return Marker::from_punct(&token.lexeme).map(Node::marker);
        }
        TokenKind::Null => return None,
        TokenKind::Keyword => NodeKind::Keyword,
        TokenKind::Operator => NodeKind::Operator,
        TokenKind::Integer => NodeKind::Int,
        TokenKind::Float => NodeKind::Float,
        TokenKind::String => NodeKind::Str,
        TokenKind::Bool => NodeKind::Bool,
    };
    Some(Node::new(kind).with_value(token.lexeme))
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("token stream ended inside {construct}")]
    UnexpectedEnd { construct: &'static str },
    #[error("expected a function name after `func`")]
    MissingFunctionName,
    #[error("expected a return type after `:`")]
    MissingReturnType,
    #[error("function `{name}` is missing its closing brace")]
    UnterminatedFunction { name: Box<str> },
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{Node, NodeKind},
        token::{Token, TokenKind},
        util::test_utils::tree_tests,
    };

    tree_tests!(
        use parser;

        fn test_function_with_parameters() {
            let source = "func add(a: i32, b: i32): i32 { return a + b; }";
            let tree_ok = "
                function add: i32
                  params
                    ident a
                    colon
                    keyword i32
                    comma
                    ident b
                    colon
                    keyword i32
                    params-closed
                  body
                    keyword return
                    ident a
                    operator +
                    ident b
                    semicolon
                    block-closed
            ";
        }

        fn test_function_without_return_type() {
            let source = "func main() { }";
            let tree_ok = "
                function main: inferred
                  params
                    params-closed
                  body
                    block-closed
            ";
        }

        fn test_global_declarations_and_calls() {
            let source = "i32 x = 5; f64 y; print(x, add(1, 2.5));";
            let tree_ok = r#"
                decl x: i32 (initialized)
                int 5
                semicolon
                decl y: f64
                semicolon
                call print
                  ident x
                  comma
                  call add
                    int 1
                    comma
                    float 2.5
                semicolon
            "#;
        }

        fn test_type_keyword_not_followed_by_identifier() {
            let source = "bool; i32* p;";
            let tree_ok = "
                keyword bool
                semicolon
                decl p: i32*
                semicolon
            ";
        }

        fn test_nested_parentheses_after_parameter_list() {
            let source = "func f(a: i32) { g((a) * 2); }";
            let tree_ok = "
                function f: inferred
                  params
                    ident a
                    colon
                    keyword i32
                    params-closed
                  body
                    call g
                      paren-open
                      ident a
                      paren-close
                      operator *
                      int 2
                    semicolon
                    block-closed
            ";
        }

        fn test_conditionals_and_loops_in_body() {
            let source = r#"
                func main() {
                    while n < 10 {
                        if n == 5 { return; } elif s == "a b" { n = 1; } else { }
                    }
                }
            "#;
            let tree_ok = r#"
                function main: inferred
                  params
                    params-closed
                  body
                    while (n < 10)
                      ident n
                      operator <
                      int 10
                    brace-open
                    if (n == 5)
                      ident n
                      operator ==
                      int 5
                    brace-open
                    keyword return
                    semicolon
                    brace-close
                    elif (s == a b)
                      ident s
                      operator ==
                      string "a b"
                    brace-open
                    ident n
                    operator =
                    int 1
                    semicolon
                    brace-close
                    else
                    brace-open
                    brace-close
                    brace-close
                    block-closed
            "#;
        }

        fn test_for_loop_header() {
            let source = "func f() { for i < 3 { i = i + 1; } }";
            let tree_ok = "
                function f: inferred
                  params
                    params-closed
                  body
                    for (i < 3)
                      ident i
                      operator <
                      int 3
                    brace-open
                    ident i
                    operator =
                    ident i
                    operator +
                    int 1
                    semicolon
                    brace-close
                    block-closed
            ";
        }

        fn test_unterminated_function_keeps_partial_node() {
            let source = "func broken(a: i32";
            let tree_error = "
                function broken: inferred
                  params
                    ident a
                    colon
                    keyword i32
            ";
            let expected_errors = &["function `broken` is missing its closing brace"];
        }

        fn test_unterminated_loop_header() {
            let source = "while x <";
            let tree_error = "
                while (x <)
                  ident x
                  operator <
            ";
            let expected_errors = &["token stream ended inside loop header"];
        }

        fn test_missing_return_type() {
            let source = "func f(): { }";
            let tree_error = "
                function f: inferred
                  params
                    params-closed
                  body
                    block-closed
            ";
            let expected_errors = &["expected a return type after `:`"];
        }

        fn test_function_opened_inside_function() {
            let source = "func a() { func b() { }";
            let tree_error = "
                function a: inferred
                  params
                    params-closed
                function b: inferred
                  params
                    params-closed
                  body
                    block-closed
            ";
            let expected_errors = &["function `a` is missing its closing brace"];
        }

        fn test_unrecognized_punctuation_is_skipped() {
            let source = "a # b . c";
            let tree_ok = "
                ident a
                ident b
                dot
                ident c
            ";
        }
    );

    #[test]
    fn test_parses_from_any_token_iterator() {
        let tokens = vec![
            Token::new(TokenKind::Identifier, "f"),
            Token::new(TokenKind::Parenthesis, "("),
            Token::new(TokenKind::Integer, "1"),
        ];
        let Ok(ast) = super::parse(tokens.into_iter()) else {
            panic!("expected a clean parse");
        };

        let mut call = Node::new(NodeKind::Call).with_ident("f");
        call.arg_nodes.push(Node::new(NodeKind::Int).with_value("1"));
        assert_eq!(ast.chl, [call]);
    }
}
