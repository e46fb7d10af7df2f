use std::io::{self, Write};

use crate::{
    ast::{Ast, Node, NodeKind},
    program::{Function, Item, Program, Stmt, VarDecl},
    util::fmt::{render, sp},
};

pub fn print_ast_string(ast: &Ast) -> String {
    render(|w| print_ast(w, ast))
}

pub fn print_program_string(program: &Program) -> String {
    render(|w| print_program(w, program))
}

pub fn print_ast(w: &mut impl Write, ast: &Ast) -> io::Result<()> {
    for node in &ast.chl {
        print_node(w, 0, node)?;
    }
    Ok(())
}

fn print_node(w: &mut impl Write, i: usize, node: &Node) -> io::Result<()> {
    sp(w, i)?;
    let ident = node.ident.as_deref().unwrap_or_default();
    let value = node.value.as_deref().unwrap_or_default();
    match node.kind {
        NodeKind::Function => {
            let ret = node.ctx_type.as_deref().unwrap_or_default();
            writeln!(w, "function {ident}: {ret}")?;
            print_section(w, i + 1, "params", &node.arg_nodes)?;
            print_section(w, i + 1, "body", &node.body)?;
        }
        NodeKind::VariableDecl => {
            let ty = node.ctx_type.as_deref().unwrap_or_default();
            write!(w, "decl {ident}: {ty}")?;
            if node.initialized {
                write!(w, " (initialized)")?;
            }
            writeln!(w)?;
        }
        NodeKind::Call => {
            writeln!(w, "call {ident}")?;
            for arg in &node.arg_nodes {
                print_node(w, i + 1, arg)?;
            }
        }
        NodeKind::Keyword => writeln!(w, "keyword {value}")?,
        NodeKind::Ident => writeln!(w, "ident {ident}")?,
        NodeKind::Operator => writeln!(w, "operator {value}")?,
        NodeKind::Int => writeln!(w, "int {value}")?,
        NodeKind::Float => writeln!(w, "float {value}")?,
        NodeKind::Str => writeln!(w, "string {value:?}")?,
        NodeKind::Bool => writeln!(w, "bool {value}")?,
        NodeKind::Conditional(branch) => print_header(w, i, branch.keyword(), node)?,
        NodeKind::Loop(kind) => print_header(w, i, kind.keyword(), node)?,
        NodeKind::Marker(marker) => writeln!(w, "{}", marker.name())?,
    }
    Ok(())
}

fn print_section(w: &mut impl Write, i: usize, name: &str, nodes: &[Node]) -> io::Result<()> {
    if nodes.is_empty() {
        return Ok(());
    }
    sp(w, i)?;
    writeln!(w, "{name}")?;
    for node in nodes {
        print_node(w, i + 1, node)?;
    }
    Ok(())
}

fn print_header(w: &mut impl Write, i: usize, keyword: &str, node: &Node) -> io::Result<()> {
    write!(w, "{keyword}")?;
    if let Some(raw) = &node.value {
        write!(w, " ({raw})")?;
    }
    writeln!(w)?;
    for leaf in &node.header {
        print_node(w, i + 1, leaf)?;
    }
    Ok(())
}

pub fn print_program(w: &mut impl Write, program: &Program) -> io::Result<()> {
    for item in &program.items {
        match item {
            Item::Function(function) => print_function(w, function)?,
            Item::Global(decl) => print_decl(w, "global", decl)?,
        }
    }
    Ok(())
}

fn print_function(w: &mut impl Write, function: &Function) -> io::Result<()> {
    write!(w, "function {}(", function.name)?;
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{}: {}", param.name, param.ty)?;
    }
    write!(w, ")")?;
    if let Some(ret) = &function.ret_type {
        write!(w, ": {ret}")?;
    }
    writeln!(w)?;
    print_block(w, 1, &function.body)
}

fn print_decl(w: &mut impl Write, kind: &str, decl: &VarDecl) -> io::Result<()> {
    if decl.is_const {
        write!(w, "const ")?;
    }
    write!(w, "{kind} {}: {}", decl.name, decl.ty)?;
    if let Some(init) = &decl.init {
        write!(w, " = {init}")?;
    }
    writeln!(w)
}

fn print_block(w: &mut impl Write, i: usize, stmts: &[Stmt]) -> io::Result<()> {
    for stmt in stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> io::Result<()> {
    sp(w, i)?;
    match stmt {
        Stmt::Decl(decl) => print_decl(w, "decl", decl)?,
        Stmt::Assign(assign) => writeln!(w, "assign {} = {}", assign.target, assign.value)?,
        Stmt::Return(None) => writeln!(w, "return")?,
        Stmt::Return(Some(value)) => writeln!(w, "return {value}")?,
        Stmt::Cond(cond) => {
            writeln!(w, "if {}", cond.cond)?;
            print_block(w, i + 1, &cond.if_body)?;
            for elif in &cond.elifs {
                sp(w, i)?;
                writeln!(w, "elif {}", elif.cond)?;
                print_block(w, i + 1, &elif.body)?;
            }
            if !cond.else_body.is_empty() {
                sp(w, i)?;
                writeln!(w, "else")?;
                print_block(w, i + 1, &cond.else_body)?;
            }
        }
        Stmt::Loop(l) => {
            writeln!(w, "{} {}", l.kind.keyword(), l.cond)?;
            print_block(w, i + 1, &l.body)?;
        }
        Stmt::Expr(expr) => writeln!(w, "expr {expr}")?,
    }
    Ok(())
}
