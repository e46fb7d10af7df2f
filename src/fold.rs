use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{Ast, Branch, Marker, Node, NodeKind, INFERRED},
    program::{
        Assignment, Call, Conditional, ElifBranch, Expr, ExprItem, Function, Item, Loop, Operand,
        Param, Program, Stmt, VarDecl,
    },
    token::KEYWORDS,
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Gives the flat parser output its statement structure and resolves
/// expression precedence. Fails on the first malformed construct.
pub fn fold(ast: &Ast) -> Result<Program> {
    let mut cursor = Cursor::new(&ast.chl);
    let mut items = Vec::new();

    while let Some(node) = cursor.peek() {
        match node.kind {
            NodeKind::Function => {
                cursor.advance();
                items.push(Item::Function(function(node)?));
            }
            NodeKind::Marker(Marker::Semicolon) => {
                cursor.advance();
            }
            _ => match cursor.declaration()? {
                Some(decl) => items.push(Item::Global(decl)),
                None => {
                    return Err(Error::UnexpectedTopLevel {
                        found: node.describe(),
                    })
                }
            },
        }
    }

    Ok(Program { items })
}

fn function(node: &Node) -> Result<Function> {
    let Some(name) = node.ident.clone() else {
        return Err(Error::UnexpectedTopLevel {
            found: node.describe(),
        });
    };
    let params = parameters(&name, &node.arg_nodes)?;
    let ret_type = node.ctx_type.clone().filter(|ty| &**ty != INFERRED);
    let body = Cursor::new(&node.body).statements(Marker::BlockClosed, "function body")?;

    debug!(%name, params = params.len(), statements = body.len(), "folded function");
    Ok(Function {
        name,
        params,
        ret_type,
        body,
    })
}

/// Accepts both `name: type` and `type name` parameters.
fn parameters(function: &str, nodes: &[Node]) -> Result<Vec<Param>> {
    let end = nodes
        .iter()
        .position(|node| node.is_marker(Marker::ParamsClosed))
        .unwrap_or(nodes.len());
    let nodes = &nodes[..end];
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    nodes
        .split(|node| node.is_marker(Marker::Comma))
        .map(|param| {
            let parsed = match param {
                [decl] if decl.kind == NodeKind::VariableDecl && !decl.initialized => {
                    decl.ident.clone().zip(decl.ctx_type.clone())
                }
                [name, colon, ty] if name.kind == NodeKind::Ident && colon.is_marker(Marker::Colon) => {
                    name.ident.clone().zip(type_name(ty).map(Box::from))
                }
                _ => None,
            };
            parsed
                .map(|(name, ty)| Param { name, ty })
                .ok_or_else(|| Error::InvalidParameter {
                    function: function.into(),
                })
        })
        .collect()
}

fn type_name(node: &Node) -> Option<&str> {
    match node.kind {
        NodeKind::Keyword => node.value.as_deref().filter(|v| !KEYWORDS.contains(v)),
        NodeKind::Ident => node.ident.as_deref(),
        _ => None,
    }
}

fn ident(node: &Node) -> Box<str> {
    node.ident.clone().unwrap_or_default()
}

fn literal<T: std::str::FromStr>(node: &Node) -> Result<T> {
    let text = node.value.as_deref().unwrap_or_default();
    text.parse().map_err(|_| Error::InvalidLiteral {
        literal: text.into(),
    })
}

/// Whether the node can't be part of an expression statement.
fn ends_expression(node: &Node) -> bool {
    matches!(
        node.kind,
        NodeKind::Marker(
            Marker::Semicolon | Marker::BraceOpen | Marker::BraceClose | Marker::BlockClosed
        ) | NodeKind::Conditional(_)
            | NodeKind::Loop(_)
            | NodeKind::VariableDecl
            | NodeKind::Function
    ) || node.is_keyword("return")
}

fn header(node: &Node) -> Result<Expr> {
    let context = match node.kind {
        NodeKind::Conditional(Branch::Elif) => "elif condition",
        NodeKind::Conditional(_) => "if condition",
        _ => "loop condition",
    };
    expression(&node.header, context)
}

fn expression(nodes: &[Node], context: &'static str) -> Result<Expr> {
    if nodes.is_empty() {
        return Err(Error::UnexpectedEnd { context });
    }
    let mut folder = ExprFolder::new(nodes, context);
    folder.expr_bp(0)?;
    folder.finish()?;
    Ok(Expr::new(folder.out))
}

fn arguments(nodes: &[Node], context: &'static str) -> Result<Vec<Expr>> {
    if nodes.is_empty() {
        return Ok(Vec::new());
    }
    let mut folder = ExprFolder::new(nodes, context);
    let args = folder.argument_list(None)?;
    folder.finish()?;
    Ok(args)
}

struct Cursor<'a> {
    nodes: &'a [Node],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Folds statements up to and including the `end` marker.
    fn statements(&mut self, end: Marker, context: &'static str) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            let Some(node) = self.peek() else {
                return Err(Error::UnexpectedEnd { context });
            };
            if node.is_marker(end) {
                self.advance();
                return Ok(stmts);
            }
            if node.is_marker(Marker::Semicolon) {
                self.advance();
                continue;
            }
            stmts.push(self.statement(node)?);
        }
    }

    fn statement(&mut self, node: &'a Node) -> Result<Stmt> {
        let stmt = match node.kind {
            NodeKind::Keyword if node.is_keyword("return") => {
                self.advance();
                Stmt::Return(self.expression_opt("return value")?)
            }
            NodeKind::Conditional(Branch::If) => {
                self.advance();
                Stmt::Cond(self.conditional(node)?)
            }
            NodeKind::Conditional(branch) => {
                return Err(Error::DanglingBranch {
                    branch: branch.keyword(),
                })
            }
            NodeKind::Loop(kind) => {
                self.advance();
                let cond = header(node)?;
                let body = self.block(kind.keyword())?;
                Stmt::Loop(Loop { kind, cond, body })
            }
            NodeKind::Ident if self.peek_nth(1).is_some_and(|n| n.is_operator("=")) => {
                self.pos += 2;
                let value = self.expression("assignment")?;
                Stmt::Assign(Assignment {
                    target: ident(node),
                    value,
                })
            }
            _ => match self.declaration()? {
                Some(decl) => Stmt::Decl(decl),
                None => Stmt::Expr(self.expression("expression statement")?),
            },
        };
        self.take_marker(Marker::Semicolon);
        Ok(stmt)
    }

    /// Folds `[const] <type> name [= expr]` or `[const] name: <type> [= expr]`.
    /// Consumes nothing if no declaration starts here.
    fn declaration(&mut self) -> Result<Option<VarDecl>> {
        let start = self.pos;
        let is_const = self.peek().is_some_and(|n| n.is_keyword("const"));
        if is_const {
            self.advance();
        }

        let node = self.peek();
        let (name, ty, initialized) = match node {
            Some(decl) if decl.kind == NodeKind::VariableDecl => {
                self.advance();
                let ty = decl.ctx_type.clone().unwrap_or_default();
                (ident(decl), ty, decl.initialized)
            }
            Some(name) if name.kind == NodeKind::Ident && self.peek_nth(1).is_some_and(|n| n.is_marker(Marker::Colon)) => {
                let ty_node = self.peek_nth(2);
                let Some(ty) = ty_node.and_then(type_name) else {
                    return Err(match ty_node {
                        Some(found) => Error::UnexpectedNode {
                            found: found.describe(),
                            context: "declaration",
                        },
                        None => Error::UnexpectedEnd {
                            context: "declaration",
                        },
                    });
                };
                self.pos += 3;
                let initialized = self.take_operator("=");
                (ident(name), ty.into(), initialized)
            }
            _ => {
                self.pos = start;
                return Ok(None);
            }
        };

        let init = if initialized {
            Some(self.expression("initializer")?)
        } else {
            None
        };
        Ok(Some(VarDecl {
            name,
            ty,
            is_const,
            init,
        }))
    }

    fn conditional(&mut self, head: &Node) -> Result<Conditional> {
        let cond = header(head)?;
        let if_body = self.block("if")?;
        let mut elifs = Vec::new();
        let mut else_body = Vec::new();

        while let Some(node) = self.peek() {
            match node.kind {
                NodeKind::Conditional(Branch::Elif) => {
                    self.advance();
                    let cond = header(node)?;
                    let body = self.block("elif")?;
                    elifs.push(ElifBranch { cond, body });
                }
                NodeKind::Conditional(Branch::Else) => {
                    self.advance();
                    if let Some(extra) = node.header.first() {
                        return Err(Error::UnexpectedNode {
                            found: extra.describe(),
                            context: "else header",
                        });
                    }
                    else_body = self.block("else")?;
                    break;
                }
                _ => break,
            }
        }

        Ok(Conditional {
            cond,
            if_body,
            elifs,
            else_body,
        })
    }

    fn block(&mut self, construct: &'static str) -> Result<Vec<Stmt>> {
        if !self.take_marker(Marker::BraceOpen) {
            return Err(Error::ExpectedBlock { construct });
        }
        self.statements(Marker::BraceClose, "block")
    }

    fn expression(&mut self, context: &'static str) -> Result<Expr> {
        self.expression_opt(context)?
            .ok_or(Error::UnexpectedEnd { context })
    }

    /// Folds the nodes up to the end of the current statement, if any.
    fn expression_opt(&mut self, context: &'static str) -> Result<Option<Expr>> {
        let start = self.pos;
        while self.peek().is_some_and(|node| !ends_expression(node)) {
            self.pos += 1;
        }
        let nodes = &self.nodes[start..self.pos];
        if nodes.is_empty() {
            return Ok(None);
        }
        expression(nodes, context).map(Some)
    }
}

impl<'a> Cursor<'a> {
    fn new(nodes: &'a [Node]) -> Cursor<'a> {
        Cursor { nodes, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Node> {
        self.nodes.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&'a Node> {
        self.nodes.get(self.pos + n)
    }

    /// Returns the current node and advances.
    fn advance(&mut self) -> Option<&'a Node> {
        let node = self.peek();
        if node.is_some() {
            self.pos += 1;
        }
        node
    }

    fn take_marker(&mut self, marker: Marker) -> bool {
        let matches = self.peek().is_some_and(|node| node.is_marker(marker));
        if matches {
            self.pos += 1;
        }
        matches
    }

    fn take_operator(&mut self, op: &str) -> bool {
        let matches = self.peek().is_some_and(|node| node.is_operator(op));
        if matches {
            self.pos += 1;
        }
        matches
    }
}

/// Pratt parser over a node sequence, writing its operands and operators
/// straight into postfix order.
struct ExprFolder<'a> {
    cursor: Cursor<'a>,
    out: Vec<ExprItem>,
    context: &'static str,
}

impl<'a> ExprFolder<'a> {
    fn new(nodes: &'a [Node], context: &'static str) -> ExprFolder<'a> {
        ExprFolder {
            cursor: Cursor::new(nodes),
            out: Vec::with_capacity(nodes.len()),
            context,
        }
    }

    fn expr_bp(&mut self, min_bp: u8) -> Result<()> {
        self.nud()?;

        while let Some(op) = self.cursor.peek() {
            if op.kind != NodeKind::Operator {
                break;
            }
            let symbol = op.value.as_deref().unwrap_or_default();
            let Some((lbp, rbp)) = infix_binding_power(symbol) else {
                return Err(self.unexpected(op));
            };
            if lbp < min_bp {
                break;
            }
            self.cursor.advance();
            self.expr_bp(rbp)?;
            self.out.push(ExprItem::Op(symbol.into()));
        }

        Ok(())
    }

    fn nud(&mut self) -> Result<()> {
        let Some(node) = self.cursor.advance() else {
            return Err(Error::UnexpectedEnd {
                context: self.context,
            });
        };
        let operand = match node.kind {
            NodeKind::Int => Operand::Int(literal(node)?),
            NodeKind::Float => Operand::Float(literal(node)?),
            NodeKind::Bool => Operand::Bool(literal(node)?),
            NodeKind::Str => Operand::Str(node.value.clone().unwrap_or_default()),
            NodeKind::Call => Operand::Call(Call {
                name: ident(node),
                args: arguments(&node.arg_nodes, self.context)?,
            }),
            // Calls inside conditional and loop headers are not call nodes.
            NodeKind::Ident if self.cursor.take_marker(Marker::ParenOpen) => {
                Operand::Call(Call {
                    name: ident(node),
                    args: self.argument_list(Some(Marker::ParenClose))?,
                })
            }
            NodeKind::Ident => Operand::Ident(ident(node)),
            NodeKind::Marker(Marker::ParenOpen) => {
                self.expr_bp(0)?;
                return self.expect(Marker::ParenClose);
            }
            NodeKind::Operator => self.prefix(node)?,
            _ => return Err(self.unexpected(node)),
        };
        self.out.push(ExprItem::Operand(operand));
        Ok(())
    }

    /// `&name`, `*name` and negative literals.
    fn prefix(&mut self, op: &Node) -> Result<Operand> {
        let Some(operand) = self.cursor.advance() else {
            return Err(Error::UnexpectedEnd {
                context: self.context,
            });
        };
        let operand = match (op.value.as_deref(), operand.kind) {
            (Some("&"), NodeKind::Ident) => Operand::AddressOf(ident(operand)),
            (Some("*"), NodeKind::Ident) => Operand::Deref(ident(operand)),
            (Some("-"), NodeKind::Int) => Operand::Int(-literal::<i128>(operand)?),
            (Some("-"), NodeKind::Float) => Operand::Float(-literal::<f64>(operand)?),
            _ => return Err(self.unexpected(op)),
        };
        Ok(operand)
    }

    /// Folds `expr (, expr)*` into one expression per argument, then consumes
    /// the `end` marker if one is given.
    fn argument_list(&mut self, end: Option<Marker>) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if end.is_some_and(|end| self.cursor.take_marker(end)) {
            return Ok(args);
        }
        loop {
            let outer = std::mem::take(&mut self.out);
            let folded = self.expr_bp(0);
            let items = std::mem::replace(&mut self.out, outer);
            folded?;
            args.push(Expr::new(items));

            if !self.cursor.take_marker(Marker::Comma) {
                break;
            }
        }
        if let Some(end) = end {
            self.expect(end)?;
        }
        Ok(args)
    }

    fn expect(&mut self, marker: Marker) -> Result<()> {
        if self.cursor.take_marker(marker) {
            return Ok(());
        }
        Err(match self.cursor.peek() {
            Some(node) => self.unexpected(node),
            None => Error::UnexpectedEnd {
                context: self.context,
            },
        })
    }

    /// Errors if any node was left unconsumed.
    fn finish(&self) -> Result<()> {
        match self.cursor.peek() {
            Some(node) => Err(self.unexpected(node)),
            None => Ok(()),
        }
    }

    fn unexpected(&self, node: &Node) -> Error {
        Error::UnexpectedNode {
            found: node.describe(),
            context: self.context,
        }
    }
}

fn infix_binding_power(op: &str) -> Option<(u8, u8)> {
    let bp = match op {
        "||" => (1, 2),
        "&&" => (3, 4),
        "==" | "!=" => (5, 6),
        "<" | "<=" | ">" | ">=" => (7, 8),
        "+" | "-" => (9, 10),
        "*" | "/" | "%" => (11, 12),
        _ => return None,
    };
    Some(bp)
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected {found} in {context}")]
    UnexpectedNode {
        found: Box<str>,
        context: &'static str,
    },
    #[error("unexpected end of input in {context}")]
    UnexpectedEnd { context: &'static str },
    #[error("expected a block after `{construct}`")]
    ExpectedBlock { construct: &'static str },
    #[error("`{branch}` without a preceding `if`")]
    DanglingBranch { branch: &'static str },
    #[error("invalid parameter list of function `{function}`")]
    InvalidParameter { function: Box<str> },
    #[error("invalid literal `{literal}`")]
    InvalidLiteral { literal: Box<str> },
    #[error("unexpected {found} at top level")]
    UnexpectedTopLevel { found: Box<str> },
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{Ast, LoopKind, Marker, Node, NodeKind, INFERRED},
        util::test_utils::tree_tests,
    };

    tree_tests!(
        use fold;

        fn test_function_round_trip() {
            let source = "func add(a: i32, b: i32): i32 { return a + b; }";
            let tree_ok = "
                function add(a: i32, b: i32): i32
                  return a b +
            ";
        }

        fn test_type_first_parameters() {
            let source = "func scale(f64 x, i32* by) { }";
            let tree_ok = "
                function scale(x: f64, by: i32*)
            ";
        }

        fn test_operator_precedence() {
            let source = "func f() { x = 1 + 2 * (3 - 4) == 5; y = a < b || c && d; }";
            let tree_ok = "
                function f()
                  assign x = 1 2 3 4 - * + 5 ==
                  assign y = a b < c d && ||
            ";
        }

        fn test_global_declarations() {
            let source = "i32 x = 5; y: f64 = -2.5; const bool t = true; u8 z;";
            let tree_ok = "
                global x: i32 = 5
                global y: f64 = -2.5
                const global t: bool = true
                global z: u8
            ";
        }

        fn test_statements_and_control_flow() {
            let source = r#"
                func main() {
                    i32 n = 0;
                    while n < 10 {
                        if n == 5 { return; } elif n == 6 { n = n + 2; } else { n = n + 1; }
                    }
                    print(&n, *p, "done");
                    return n
                }
            "#;
            let tree_ok = r#"
                function main()
                  decl n: i32 = 0
                  while n 10 <
                    if n 5 ==
                      return
                    elif n 6 ==
                      assign n = n 2 +
                    else
                      assign n = n 1 +
                  expr print(&n, *p, "done")
                  return n
            "#;
        }

        fn test_for_loop() {
            let source = "func f() { i32 i = 0; for i < 3 { i = i + 1; } }";
            let tree_ok = "
                function f()
                  decl i: i32 = 0
                  for i 3 <
                    assign i = i 1 +
            ";
        }

        fn test_call_in_header_and_nested_call_arguments() {
            let source = "func f() { if g(1, h(2)) > 0 { k((1 + 2) * 3, -4); } }";
            let tree_ok = "
                function f()
                  if g(1, h(2)) 0 >
                    expr k(1 2 + 3 *, -4)
            ";
        }

        fn test_dangling_else() {
            let source = "func f() { else { } }";
            let expected_errors = &["`else` without a preceding `if`"];
        }

        fn test_statement_at_top_level() {
            let source = "x = 1;";
            let expected_errors = &["unexpected `x` at top level"];
        }

        fn test_parameter_without_type() {
            let source = "func f(a) { }";
            let expected_errors = &["invalid parameter list of function `f`"];
        }

        fn test_empty_condition() {
            let source = "func f() { if { } }";
            let expected_errors = &["unexpected end of input in if condition"];
        }

        fn test_missing_operand() {
            let source = "func f() { x = 1 +; }";
            let expected_errors = &["unexpected end of input in assignment"];
        }

        fn test_adjacent_operands() {
            let source = "func f() { while x 1 { } }";
            let expected_errors = &["unexpected `1` in loop condition"];
        }

        fn test_loop_without_block() {
            let source = "func f() { while x; { } }";
            let expected_errors = &["unexpected `semicolon` in loop condition"];
        }

        fn test_integer_literal_out_of_range() {
            let source = "i64 big = 999999999999999999999999999999999999999999;";
            let expected_errors = &["invalid literal `999999999999999999999999999999999999999999`"];
        }
    );

    #[test]
    fn test_loop_header_without_block() {
        let mut while_loop = Node::new(NodeKind::Loop(LoopKind::While));
        while_loop.header.push(Node::new(NodeKind::Ident).with_ident("x"));

        let mut function = Node::new(NodeKind::Function)
            .with_ident("f")
            .with_ctx_type(INFERRED);
        function.arg_nodes.push(Node::marker(Marker::ParamsClosed));
        function.body.extend([
            while_loop,
            Node::new(NodeKind::Ident).with_ident("y"),
            Node::marker(Marker::BlockClosed),
        ]);

        let ast = Ast { chl: vec![function] };
        assert_eq!(
            super::fold(&ast),
            Err(super::Error::ExpectedBlock { construct: "while" })
        );
    }
}
