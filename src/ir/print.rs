use std::fmt::{self, Display, Formatter};

use crate::ir::{
    BinOp, BlockId, FloatPredicate, Function, Global, GlobalInit, Inst, IntPredicate, IrType, Module,
    Terminator, Value,
};

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        for global in &self.globals {
            writeln!(f, "{global}")?;
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

impl Display for Global {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let linkage = if self.private {
            "private unnamed_addr"
        } else {
            "internal"
        };
        let kind = if self.constant { "constant" } else { "global" };
        write!(f, "@{} = {linkage} {kind} {} ", self.name, self.ty)?;
        match &self.init {
            GlobalInit::Zero => f.write_str("zeroinitializer"),
            GlobalInit::Value(value) => write!(f, "{value}"),
            GlobalInit::Bytes(bytes) => {
                f.write_str("c\"")?;
                for &byte in bytes.iter() {
                    if byte == b' ' || (byte.is_ascii_graphic() && byte != b'"' && byte != b'\\') {
                        write!(f, "{}", char::from(byte))?;
                    } else {
                        write!(f, "\\{byte:02X}")?;
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "define internal {} @{}(", self.ret, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", Typed(param))?;
        }
        writeln!(f, ") {{")?;

        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for inst in &block.insts {
                writeln!(f, "  {inst}")?;
            }
            let Some(terminator) = &block.terminator else {
                continue;
            };
            let label = |id: &BlockId| &self.block(*id).label;
            match terminator {
                Terminator::Br(target) => writeln!(f, "  br label %{}", label(target))?,
                Terminator::CondBr {
                    cond,
                    then,
                    otherwise,
                } => writeln!(
                    f,
                    "  br {}, label %{}, label %{}",
                    Typed(cond),
                    label(then),
                    label(otherwise)
                )?,
                Terminator::Ret(Some(value)) => writeln!(f, "  ret {}", Typed(value))?,
                Terminator::Ret(None) => writeln!(f, "  ret void")?,
                Terminator::Unreachable => writeln!(f, "  unreachable")?,
            }
        }

        writeln!(f, "}}")
    }
}

impl Display for Inst {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Alloca { dst, ty } => write!(f, "%{dst} = alloca {ty}"),
            Inst::Load { dst, ty, ptr } => write!(f, "%{dst} = load {ty}, ptr {ptr}"),
            Inst::Store { value, ptr } => write!(f, "store {}, ptr {ptr}", Typed(value)),
            Inst::Binary { dst, op, lhs, rhs } => {
                write!(f, "%{dst} = {op} {}, {rhs}", Typed(lhs))
            }
            Inst::ICmp {
                dst,
                pred,
                lhs,
                rhs,
            } => write!(f, "%{dst} = icmp {pred} {}, {rhs}", Typed(lhs)),
            Inst::FCmp {
                dst,
                pred,
                lhs,
                rhs,
            } => write!(f, "%{dst} = fcmp {pred} {}, {rhs}", Typed(lhs)),
            Inst::SiToFp { dst, value, ty } => {
                write!(f, "%{dst} = sitofp {} to {ty}", Typed(value))
            }
            Inst::Call {
                dst,
                ret,
                callee,
                args,
            } => {
                if let Some(dst) = dst {
                    write!(f, "%{dst} = ")?;
                }
                write!(f, "call {ret} @{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Typed(arg))?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Display for IrType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => f.write_str("void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Float(16) => f.write_str("half"),
            IrType::Float(32) => f.write_str("float"),
            IrType::Float(64) => f.write_str("double"),
            IrType::Float(_) => f.write_str("fp128"),
            IrType::Ptr => f.write_str("ptr"),
            IrType::Bytes(len) => write!(f, "[{len} x i8]"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::ConstInt { bits: 1, value } => write!(f, "{}", *value != 0),
            Value::ConstInt { value, .. } => write!(f, "{value}"),
            Value::ConstFloat { value, .. } => write!(f, "{value:?}"),
            Value::Register { name, .. } => write!(f, "%{name}"),
            Value::Global { name } => write!(f, "@{name}"),
        }
    }
}

/// Prints a value prefixed by its type.
struct Typed<'a>(&'a Value);

impl Display for Typed<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0.ty(), self.0)
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::FAdd => "fadd",
            BinOp::FSub => "fsub",
            BinOp::FMul => "fmul",
            BinOp::FDiv => "fdiv",
        })
    }
}

impl Display for IntPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
        })
    }
}

impl Display for FloatPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FloatPredicate::Oeq => "oeq",
            FloatPredicate::One => "one",
            FloatPredicate::Olt => "olt",
            FloatPredicate::Ole => "ole",
            FloatPredicate::Ogt => "ogt",
            FloatPredicate::Oge => "oge",
        })
    }
}
