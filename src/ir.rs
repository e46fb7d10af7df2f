//! A small basic-block IR with explicit terminators, printed as LLVM-flavoured
//! text. Every block ends in at most one terminator and nothing may be
//! emitted into a block once it is terminated.

use std::rc::Rc;

use thiserror::Error;

pub mod builder;
mod print;

pub use builder::IrBuilder;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IrType {
    Void,
    Int(u32),
    Float(u32),
    Ptr,
    /// Opaque storage of the given size, in bytes.
    Bytes(u64),
}

impl IrType {
    pub fn is_int(&self) -> bool {
        matches!(self, IrType::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    ConstInt { bits: u32, value: i128 },
    ConstFloat { bits: u32, value: f64 },
    /// A named virtual register: an instruction result or a function
    /// parameter.
    Register { name: Rc<str>, ty: IrType },
    /// The address of a module-level symbol.
    Global { name: Rc<str> },
}

impl Value {
    pub fn ty(&self) -> IrType {
        match self {
            Value::ConstInt { bits, .. } => IrType::Int(*bits),
            Value::ConstFloat { bits, .. } => IrType::Float(*bits),
            Value::Register { ty, .. } => ty.clone(),
            Value::Global { .. } => IrType::Ptr,
        }
    }

    pub fn is_constant(&self) -> bool {
        !matches!(self, Value::Register { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    Alloca {
        dst: Rc<str>,
        ty: IrType,
    },
    Load {
        dst: Rc<str>,
        ty: IrType,
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    Binary {
        dst: Rc<str>,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        dst: Rc<str>,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        dst: Rc<str>,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    SiToFp {
        dst: Rc<str>,
        value: Value,
        ty: IrType,
    },
    Call {
        dst: Option<Rc<str>>,
        ret: IrType,
        callee: Rc<str>,
        args: Vec<Value>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Value,
        then: BlockId,
        otherwise: BlockId,
    },
    Ret(Option<Value>),
    Unreachable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub label: Rc<str>,
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: Rc<str>,
    pub params: Vec<Value>,
    pub ret: IrType,
    pub blocks: Vec<Block>,
    /// Per-function counter for unnamed registers and name disambiguation.
    next_id: u32,
}

impl Function {
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn param_types(&self) -> impl Iterator<Item = IrType> + '_ {
        self.params.iter().map(Value::ty)
    }

    /// Returns a register or label name not yet used in this function. An
    /// empty hint yields the next numbered name, others get a numeric suffix
    /// when already taken.
    fn fresh_name(&mut self, hint: &str) -> Rc<str> {
        if hint.is_empty() {
            loop {
                let name = self.next_id.to_string();
                self.next_id += 1;
                if !self.is_taken(&name) {
                    return name.into();
                }
            }
        }
        if !self.is_taken(hint) {
            return hint.into();
        }
        let mut suffix = 1;
        loop {
            let name = format!("{hint}{suffix}");
            if !self.is_taken(&name) {
                return name.into();
            }
            suffix += 1;
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p, Value::Register { name: n, .. } if &**n == name))
            || self.blocks.iter().any(|b| &*b.label == name)
            || self
                .blocks
                .iter()
                .flat_map(|b| &b.insts)
                .any(|i| i.dst() == Some(name))
    }
}

impl Inst {
    /// The register defined by this instruction, if any.
    pub fn dst(&self) -> Option<&str> {
        match self {
            Inst::Alloca { dst, .. }
            | Inst::Load { dst, .. }
            | Inst::Binary { dst, .. }
            | Inst::ICmp { dst, .. }
            | Inst::FCmp { dst, .. }
            | Inst::SiToFp { dst, .. } => Some(dst),
            Inst::Call { dst, .. } => dst.as_deref(),
            Inst::Store { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GlobalInit {
    Zero,
    Value(Value),
    /// A NUL terminated byte string.
    Bytes(Box<[u8]>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: Rc<str>,
    pub ty: IrType,
    pub init: GlobalInit,
    pub constant: bool,
    /// Module private data, such as string literals.
    pub private: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    pub name: Box<str>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<Box<str>>) -> Module {
        Module {
            name: name.into(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| &*f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| &*g.name == name)
    }

    fn has_symbol(&self, name: &str) -> bool {
        self.function(name).is_some() || self.global(name).is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("block `{label}` is already terminated")]
    AlreadyTerminated { label: Box<str> },
    #[error("no insertion block is set")]
    NoInsertPoint,
    #[error("symbol `{name}` is already defined in the module")]
    DuplicateSymbol { name: Box<str> },
}
