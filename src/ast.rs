// The parser emits a shallow tree: declarations, calls and headers get their
// own nodes, everything else is kept as leaf nodes and markers in source
// order. The fold pass (`crate::fold`) gives it its statement structure.
//
// ast ::= node*
// function ::= Function { arg_nodes: param-node* ParamsClosed, body: node* BlockClosed }
// call ::= Call { arg_nodes: node* }
// conditional ::= Conditional(If | Elif | Else) { header: leaf* }
// loop ::= Loop(While | For) { header: leaf* }

/// Return type of a function whose header has no `: <type>` clause.
pub const INFERRED: &str = "inferred";

/// The whole parser output: the ordered top-level nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ast {
    pub chl: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Declared type annotation.
    pub ctx_type: Option<Box<str>>,
    /// Declared or referenced name.
    pub ident: Option<Box<str>>,
    /// Raw lexeme of literals, operators and keywords, or the raw header text
    /// of conditionals and loops.
    pub value: Option<Box<str>>,
    /// Set on declarations followed by `=`.
    pub initialized: bool,
    /// Statements of a function.
    pub body: Vec<Node>,
    /// Parameters of a function or arguments of a call.
    pub arg_nodes: Vec<Node>,
    /// Condition of a conditional branch or loop, as leaf nodes.
    pub header: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            ctx_type: None,
            ident: None,
            value: None,
            initialized: false,
            body: Vec::new(),
            arg_nodes: Vec::new(),
            header: Vec::new(),
        }
    }

    pub fn marker(marker: Marker) -> Node {
        Node::new(NodeKind::Marker(marker))
    }

    pub fn with_ident(mut self, ident: impl Into<Box<str>>) -> Node {
        self.ident = Some(ident.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Box<str>>) -> Node {
        self.value = Some(value.into());
        self
    }

    pub fn with_ctx_type(mut self, ty: impl Into<Box<str>>) -> Node {
        self.ctx_type = Some(ty.into());
        self
    }

    pub fn is_marker(&self, marker: Marker) -> bool {
        self.kind == NodeKind::Marker(marker)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == NodeKind::Keyword && self.value.as_deref() == Some(keyword)
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == NodeKind::Operator && self.value.as_deref() == Some(op)
    }

    /// A short human readable description, used in diagnostics.
    pub fn describe(&self) -> Box<str> {
        let text = self.ident.as_deref().or(self.value.as_deref()).unwrap_or("");
        let described = match self.kind {
            NodeKind::Function => format!("function `{text}`"),
            NodeKind::VariableDecl => format!("declaration of `{text}`"),
            NodeKind::Call => format!("call to `{text}`"),
            NodeKind::Conditional(branch) => format!("`{}`", branch.keyword()),
            NodeKind::Loop(kind) => format!("`{}`", kind.keyword()),
            NodeKind::Marker(marker) => format!("`{}`", marker.name()),
            NodeKind::Str => format!("{text:?}"),
            _ => format!("`{text}`"),
        };
        described.into()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Function,
    VariableDecl,
    Call,
    Keyword,
    Ident,
    Operator,
    Int,
    Float,
    Str,
    Bool,
    Conditional(Branch),
    Loop(LoopKind),
    Marker(Marker),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Branch {
    If,
    Elif,
    Else,
}

impl Branch {
    pub fn keyword(self) -> &'static str {
        match self {
            Branch::If => "if",
            Branch::Elif => "elif",
            Branch::Else => "else",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopKind {
    While,
    /// Lowered exactly like `while`.
    For,
}

impl LoopKind {
    pub fn keyword(self) -> &'static str {
        match self {
            LoopKind::While => "while",
            LoopKind::For => "for",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    ParenOpen,
    ParenClose,
    Comma,
    BraceOpen,
    BraceClose,
    Colon,
    Dot,
    Semicolon,
    /// Closes a function parameter list.
    ParamsClosed,
    /// Closes a function body.
    BlockClosed,
}

impl Marker {
    /// Maps a punctuation lexeme to its generic marker.
    pub fn from_punct(punct: &str) -> Option<Marker> {
        let marker = match punct {
            "(" => Marker::ParenOpen,
            ")" => Marker::ParenClose,
            "," => Marker::Comma,
            "{" => Marker::BraceOpen,
            "}" => Marker::BraceClose,
            ":" => Marker::Colon,
            "." => Marker::Dot,
            ";" => Marker::Semicolon,
            _ => return None,
        };
        Some(marker)
    }

    pub fn name(self) -> &'static str {
        match self {
            Marker::ParenOpen => "paren-open",
            Marker::ParenClose => "paren-close",
            Marker::Comma => "comma",
            Marker::BraceOpen => "brace-open",
            Marker::BraceClose => "brace-close",
            Marker::Colon => "colon",
            Marker::Dot => "dot",
            Marker::Semicolon => "semicolon",
            Marker::ParamsClosed => "params-closed",
            Marker::BlockClosed => "block-closed",
        }
    }
}
