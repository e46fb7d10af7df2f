//! Postfix expression evaluation.
//!
//! Operands push a value, binary operators pop two and push one. A
//! well-formed expression leaves exactly one value on the stack.

use crate::{
    codegen::{lower_type, Error, Generator, Result, SymbolEntry},
    ir::{BinOp, FloatPredicate, IntPredicate, IrType, Value},
    program::{Call, Expr, ExprItem, Operand},
};

type BinaryLowering = fn(&mut Generator, Value, Value) -> Result<Value>;

static OPERATORS: phf::Map<&'static str, BinaryLowering> = phf::phf_map! {
    "+" => add as BinaryLowering,
    "-" => sub as BinaryLowering,
    "*" => mul as BinaryLowering,
    "/" => div as BinaryLowering,
    "==" => eq as BinaryLowering,
    "!=" => ne as BinaryLowering,
    "<" => lt as BinaryLowering,
    "<=" => le as BinaryLowering,
    ">" => gt as BinaryLowering,
    ">=" => ge as BinaryLowering,
};

impl Generator {
    /// Evaluates `expr`. Yields `None` only for a lone call to a `void`
    /// function.
    pub(super) fn eval(&mut self, expr: &Expr) -> Result<Option<Value>> {
        if let Some(call) = expr.as_call() {
            return self.lower_call(call);
        }

        let mut stack = Vec::with_capacity(expr.items.len());
        for item in &expr.items {
            match item {
                ExprItem::Operand(operand) => {
                    let value = self.lower_operand(operand)?;
                    stack.push(value);
                }
                ExprItem::Op(op) => {
                    let (Some(rhs), Some(lhs)) = (stack.pop(), stack.pop()) else {
                        return Err(Error::MalformedExpression);
                    };
                    let lower = OPERATORS
                        .get(&**op)
                        .ok_or_else(|| Error::UnsupportedOperator { op: op.clone() })?;
                    let value = lower(self, lhs, rhs)?;
                    stack.push(value);
                }
            }
        }

        match (stack.pop(), stack.is_empty()) {
            (Some(value), true) => Ok(Some(value)),
            _ => Err(Error::MalformedExpression),
        }
    }

    pub(super) fn lower_expr(&mut self, expr: &Expr) -> Result<Value> {
        self.eval(expr)?.ok_or(Error::VoidValue)
    }

    fn lower_operand(&mut self, operand: &Operand) -> Result<Value> {
        let value = match operand {
            Operand::Int(value) => Value::ConstInt {
                bits: self.state.int_width,
                value: *value,
            },
            Operand::Float(value) => Value::ConstFloat {
                bits: self.state.float_width,
                value: *value,
            },
            Operand::Bool(value) => Value::ConstInt {
                bits: 1,
                value: i128::from(*value),
            },
            Operand::Str(text) => self.builder.add_string(text),
            Operand::Ident(name) => {
                let entry = self.lookup(name)?;
                self.read(&entry)?
            }
            Operand::AddressOf(name) => {
                let entry = self.lookup(name)?;
                if entry.is_param {
                    return Err(Error::AddressOfParameter { name: name.clone() });
                }
                entry.storage
            }
            Operand::Deref(name) => self.deref(name)?,
            Operand::Call(call) => self.lower_call(call)?.ok_or(Error::VoidValue)?,
        };
        Ok(value)
    }

    fn lookup(&self, name: &str) -> Result<SymbolEntry> {
        self.scopes
            .lookup(name)
            .cloned()
            .ok_or_else(|| Error::UndefinedIdentifier { name: name.into() })
    }

    /// The current value of a binding: parameters are used directly, anything
    /// else is loaded from its storage.
    fn read(&mut self, entry: &SymbolEntry) -> Result<Value> {
        if entry.is_param {
            return Ok(entry.storage.clone());
        }
        let ty = lower_type(&entry.ty);
        Ok(self.builder.build_load(ty, entry.storage.clone(), "")?)
    }

    /// Parameters are values, so dereferencing one yields it unchanged;
    /// anything else is loaded once from its storage slot.
    fn deref(&mut self, name: &str) -> Result<Value> {
        let entry = self.lookup(name)?;
        self.read(&entry)
    }

    /// Lowers a call to a function already defined in the module. Arguments
    /// are lowered with the literal widths of the matching parameter.
    pub(super) fn lower_call(&mut self, call: &Call) -> Result<Option<Value>> {
        let Some(callee) = self.builder.module().function(&call.name) else {
            return Err(Error::UnresolvedCallee {
                name: call.name.clone(),
            });
        };
        let ret = callee.ret.clone();
        let params: Vec<IrType> = callee.param_types().collect();
        if params.len() != call.args.len() {
            return Err(Error::ArityMismatch {
                name: call.name.clone(),
                expected: params.len(),
                found: call.args.len(),
            });
        }

        let mut args = Vec::with_capacity(params.len());
        for (arg, ty) in call.args.iter().zip(&params) {
            let value = self.with_widths(ty, |this| {
                let value = this.lower_expr(arg)?;
                this.coerce(value, ty)
            })?;
            args.push(value);
        }
        Ok(self.builder.build_call(&call.name, ret, args)?)
    }

    fn arithmetic(
        &mut self,
        op: &'static str,
        int_op: BinOp,
        float_op: BinOp,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        let (lhs, rhs) = self.unify_operands(op, lhs, rhs)?;
        let op = if lhs.ty().is_float() { float_op } else { int_op };
        Ok(self.builder.build_binary(op, lhs, rhs)?)
    }

    /// Division always yields a float; integer operands are converted first.
    fn divide(&mut self, lhs: Value, rhs: Value) -> Result<Value> {
        let (lhs, rhs) = match (lhs.ty(), rhs.ty()) {
            (IrType::Int(_), IrType::Int(_)) => {
                let ty = IrType::Float(self.state.float_width);
                (self.coerce(lhs, &ty)?, self.coerce(rhs, &ty)?)
            }
            _ => self.unify_operands("/", lhs, rhs)?,
        };
        Ok(self.builder.build_binary(BinOp::FDiv, lhs, rhs)?)
    }

    /// Comparisons are defined between two integers or two floats of the
    /// same width only.
    fn compare(
        &mut self,
        int_pred: IntPredicate,
        float_pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value> {
        let (lhs, rhs) = match (lhs.ty(), rhs.ty()) {
            (IrType::Int(_), IrType::Int(_)) | (IrType::Float(_), IrType::Float(_)) => {
                unify_widths(lhs, rhs)
            }
            (lhs, rhs) => return Err(Error::NoEqualityForOperands { lhs, rhs }),
        };
        match (lhs.ty(), rhs.ty()) {
            (ty, other) if ty != other => Err(Error::NoEqualityForOperands {
                lhs: ty,
                rhs: other,
            }),
            (IrType::Float(_), _) => Ok(self.builder.build_fcmp(float_pred, lhs, rhs)?),
            _ => Ok(self.builder.build_icmp(int_pred, lhs, rhs)?),
        }
    }

    /// Brings two numeric operands to a single type. Constants take the width
    /// of the other operand and an integer meeting a float is converted to
    /// it. Two non-constant operands of different widths are rejected.
    fn unify_operands(
        &mut self,
        op: &'static str,
        lhs: Value,
        rhs: Value,
    ) -> Result<(Value, Value)> {
        let (lhs, rhs) = match (lhs.ty(), rhs.ty()) {
            (IrType::Int(_), IrType::Int(_)) | (IrType::Float(_), IrType::Float(_)) => {
                unify_widths(lhs, rhs)
            }
            (ty @ IrType::Float(_), IrType::Int(_)) => {
                let rhs = self.coerce(rhs, &ty)?;
                (lhs, rhs)
            }
            (IrType::Int(_), ty @ IrType::Float(_)) => {
                let lhs = self.coerce(lhs, &ty)?;
                (lhs, rhs)
            }
            (lhs, rhs) => return Err(Error::UnsupportedOperands { op, lhs, rhs }),
        };
        let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
        if lhs_ty != rhs_ty {
            return Err(Error::UnsupportedOperands {
                op,
                lhs: lhs_ty,
                rhs: rhs_ty,
            });
        }
        Ok((lhs, rhs))
    }
}

/// Gives a constant operand the width of the other operand when the two
/// differ.
fn unify_widths(lhs: Value, rhs: Value) -> (Value, Value) {
    let (lhs_ty, rhs_ty) = (lhs.ty(), rhs.ty());
    if lhs_ty == rhs_ty {
        return (lhs, rhs);
    }
    match (lhs, rhs) {
        (lhs, rhs) if is_literal(&lhs) && !is_literal(&rhs) => (with_width(lhs, &rhs_ty), rhs),
        (lhs, rhs) if is_literal(&rhs) => (lhs, with_width(rhs, &lhs_ty)),
        pair => pair,
    }
}

fn is_literal(value: &Value) -> bool {
    matches!(value, Value::ConstInt { .. } | Value::ConstFloat { .. })
}

fn with_width(value: Value, ty: &IrType) -> Value {
    match (value, ty) {
        (Value::ConstInt { value, .. }, &IrType::Int(bits)) => Value::ConstInt { bits, value },
        (Value::ConstFloat { value, .. }, &IrType::Float(bits)) => {
            Value::ConstFloat { bits, value }
        }
        (value, _) => value,
    }
}

fn add(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.arithmetic("+", BinOp::Add, BinOp::FAdd, lhs, rhs)
}

fn sub(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.arithmetic("-", BinOp::Sub, BinOp::FSub, lhs, rhs)
}

fn mul(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.arithmetic("*", BinOp::Mul, BinOp::FMul, lhs, rhs)
}

fn div(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.divide(lhs, rhs)
}

fn eq(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.compare(IntPredicate::Eq, FloatPredicate::Oeq, lhs, rhs)
}

fn ne(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.compare(IntPredicate::Ne, FloatPredicate::One, lhs, rhs)
}

fn lt(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.compare(IntPredicate::Slt, FloatPredicate::Olt, lhs, rhs)
}

fn le(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.compare(IntPredicate::Sle, FloatPredicate::Ole, lhs, rhs)
}

fn gt(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.compare(IntPredicate::Sgt, FloatPredicate::Ogt, lhs, rhs)
}

fn ge(g: &mut Generator, lhs: Value, rhs: Value) -> Result<Value> {
    g.compare(IntPredicate::Sge, FloatPredicate::Oge, lhs, rhs)
}
