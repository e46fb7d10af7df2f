use std::rc::Rc;

use crate::ir::{
    BinOp, Block, BlockId, Error, FloatPredicate, FuncId, Function, Global, GlobalInit, Inst,
    IntPredicate, IrType, Module, Terminator, Value,
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Appends instructions to the block at the current insertion point.
pub struct IrBuilder {
    module: Module,
    insert_point: Option<(FuncId, BlockId)>,
    string_count: usize,
}

impl IrBuilder {
    pub fn new(module_name: &str) -> IrBuilder {
        IrBuilder {
            module: Module::new(module_name),
            insert_point: None,
            string_count: 0,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn finish(self) -> Module {
        self.module
    }

    pub fn create_function(
        &mut self,
        name: &str,
        params: &[(&str, IrType)],
        ret: IrType,
    ) -> Result<FuncId> {
        if self.module.has_symbol(name) {
            return Err(Error::DuplicateSymbol { name: name.into() });
        }
        let mut function = Function {
            name: name.into(),
            params: Vec::with_capacity(params.len()),
            ret,
            blocks: Vec::new(),
            next_id: 0,
        };
        for (param, ty) in params {
            let name = function.fresh_name(param);
            function.params.push(Value::Register {
                name,
                ty: ty.clone(),
            });
        }
        self.module.functions.push(function);
        Ok(FuncId(self.module.functions.len() - 1))
    }

    /// Appends a new block to the function. The label is made unique within
    /// the function.
    pub fn append_block(&mut self, func: FuncId, hint: &str) -> BlockId {
        let function = &mut self.module.functions[func.0];
        let label = function.fresh_name(hint);
        function.blocks.push(Block {
            label,
            insts: Vec::new(),
            terminator: None,
        });
        BlockId(function.blocks.len() - 1)
    }

    pub fn set_insert_point(&mut self, func: FuncId, block: BlockId) {
        self.insert_point = Some((func, block));
    }

    pub fn clear_insert_point(&mut self) {
        self.insert_point = None;
    }

    pub fn insert_point(&self) -> Option<(FuncId, BlockId)> {
        self.insert_point
    }

    pub fn param(&self, func: FuncId, index: usize) -> Option<Value> {
        self.module.functions[func.0].params.get(index).cloned()
    }

    /// Whether the insertion block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.insert_point.is_some_and(|(func, block)| {
            self.module.functions[func.0].blocks[block.0]
                .terminator
                .is_some()
        })
    }

    /// Adds an internally linked module-level variable and returns its
    /// address.
    pub fn add_global(
        &mut self,
        name: &str,
        ty: IrType,
        init: Option<Value>,
        constant: bool,
    ) -> Result<Value> {
        if self.module.has_symbol(name) {
            return Err(Error::DuplicateSymbol { name: name.into() });
        }
        let name: Rc<str> = name.into();
        self.module.globals.push(Global {
            name: name.clone(),
            ty,
            init: init.map_or(GlobalInit::Zero, GlobalInit::Value),
            constant,
            private: false,
        });
        Ok(Value::Global { name })
    }

    /// Adds a private NUL terminated string constant and returns its address.
    pub fn add_string(&mut self, text: &str) -> Value {
        let name: Rc<str> = match self.string_count {
            0 => ".str".into(),
            n => format!(".str.{n}").into(),
        };
        self.string_count += 1;

        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        bytes.push(0);
        self.module.globals.push(Global {
            name: name.clone(),
            ty: IrType::Bytes(bytes.len() as u64),
            init: GlobalInit::Bytes(bytes.into()),
            constant: true,
            private: true,
        });
        Value::Global { name }
    }

    pub fn build_alloca(&mut self, ty: IrType, name: &str) -> Result<Value> {
        self.emit(name, IrType::Ptr, |dst| Inst::Alloca { dst, ty })
    }

    pub fn build_load(&mut self, ty: IrType, ptr: Value, hint: &str) -> Result<Value> {
        self.emit(hint, ty.clone(), |dst| Inst::Load { dst, ty, ptr })
    }

    pub fn build_store(&mut self, value: Value, ptr: Value) -> Result<()> {
        let (function, block) = self.open_block()?;
        function.blocks[block.0]
            .insts
            .push(Inst::Store { value, ptr });
        Ok(())
    }

    /// The result has the type of `lhs`.
    pub fn build_binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Result<Value> {
        self.emit("", lhs.ty(), |dst| Inst::Binary { dst, op, lhs, rhs })
    }

    pub fn build_icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Result<Value> {
        self.emit("", IrType::Int(1), |dst| Inst::ICmp {
            dst,
            pred,
            lhs,
            rhs,
        })
    }

    pub fn build_fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Result<Value> {
        self.emit("", IrType::Int(1), |dst| Inst::FCmp {
            dst,
            pred,
            lhs,
            rhs,
        })
    }

    pub fn build_si_to_fp(&mut self, value: Value, ty: IrType) -> Result<Value> {
        self.emit("", ty.clone(), |dst| Inst::SiToFp { dst, value, ty })
    }

    /// Calls to `void` functions produce no value. Other results are named
    /// after the callee.
    pub fn build_call(&mut self, callee: &str, ret: IrType, args: Vec<Value>) -> Result<Option<Value>> {
        let callee: Rc<str> = callee.into();
        if ret == IrType::Void {
            let (function, block) = self.open_block()?;
            function.blocks[block.0].insts.push(Inst::Call {
                dst: None,
                ret,
                callee,
                args,
            });
            return Ok(None);
        }
        let hint = callee.clone();
        self.emit(&hint, ret.clone(), |dst| Inst::Call {
            dst: Some(dst),
            ret,
            callee,
            args,
        })
        .map(Some)
    }

    pub fn build_br(&mut self, target: BlockId) -> Result<()> {
        self.terminate(Terminator::Br(target))
    }

    pub fn build_cond_br(&mut self, cond: Value, then: BlockId, otherwise: BlockId) -> Result<()> {
        self.terminate(Terminator::CondBr {
            cond,
            then,
            otherwise,
        })
    }

    pub fn build_ret(&mut self, value: Option<Value>) -> Result<()> {
        self.terminate(Terminator::Ret(value))
    }

    pub fn build_unreachable(&mut self) -> Result<()> {
        self.terminate(Terminator::Unreachable)
    }
}

impl IrBuilder {
    /// Returns the insertion block, which must still be open.
    fn open_block(&mut self) -> Result<(&mut Function, BlockId)> {
        let (func, block) = self.insert_point.ok_or(Error::NoInsertPoint)?;
        let function = &mut self.module.functions[func.0];
        let current = &function.blocks[block.0];
        if current.terminator.is_some() {
            return Err(Error::AlreadyTerminated {
                label: (*current.label).into(),
            });
        }
        Ok((function, block))
    }

    /// Appends an instruction that defines a fresh register.
    fn emit(&mut self, hint: &str, ty: IrType, inst: impl FnOnce(Rc<str>) -> Inst) -> Result<Value> {
        let (function, block) = self.open_block()?;
        let dst = function.fresh_name(hint);
        function.blocks[block.0].insts.push(inst(dst.clone()));
        Ok(Value::Register { name: dst, ty })
    }

    fn terminate(&mut self, terminator: Terminator) -> Result<()> {
        let (function, block) = self.open_block()?;
        function.blocks[block.0].terminator = Some(terminator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_builds_function_text() {
        let mut b = IrBuilder::new("main");
        let func = b
            .create_function("max", &[("a", IrType::Int(32)), ("b", IrType::Int(32))], IrType::Int(32))
            .unwrap();
        let entry = b.append_block(func, "entry");
        let then = b.append_block(func, "then");
        let otherwise = b.append_block(func, "then");
        b.set_insert_point(func, entry);

        let a = b.param(func, 0).unwrap();
        let bb = b.param(func, 1).unwrap();
        let cond = b.build_icmp(IntPredicate::Sgt, a.clone(), bb.clone()).unwrap();
        b.build_cond_br(cond, then, otherwise).unwrap();
        b.set_insert_point(func, then);
        b.build_ret(Some(a)).unwrap();
        b.set_insert_point(func, otherwise);
        b.build_ret(Some(bb)).unwrap();

        let expected = indoc! {"
            ; ModuleID = 'main'

            define internal i32 @max(i32 %a, i32 %b) {
            entry:
              %0 = icmp sgt i32 %a, %b
              br i1 %0, label %then, label %then1
            then:
              ret i32 %a
            then1:
              ret i32 %b
            }
        "};
        assert_eq!(b.finish().to_string(), expected);
    }

    #[test]
    fn test_globals_and_strings() {
        let mut b = IrBuilder::new("globals");
        b.add_global("x", IrType::Int(32), Some(Value::ConstInt { bits: 32, value: 5 }), false)
            .unwrap();
        b.add_global("pi", IrType::Float(64), Some(Value::ConstFloat { bits: 64, value: 3.5 }), true)
            .unwrap();
        b.add_global("p", IrType::Ptr, None, false).unwrap();
        let s = b.add_string("hi \"there\"\n");
        assert_eq!(s, Value::Global { name: ".str".into() });
        b.add_string("");

        let expected = indoc! {r#"
            ; ModuleID = 'globals'
            @x = internal global i32 5
            @pi = internal constant double 3.5
            @p = internal global ptr zeroinitializer
            @.str = private unnamed_addr constant [12 x i8] c"hi \22there\22\0A\00"
            @.str.1 = private unnamed_addr constant [1 x i8] c"\00"
        "#};
        assert_eq!(b.finish().to_string(), expected);
    }

    #[test]
    fn test_locals_calls_and_conversions() {
        let mut b = IrBuilder::new("main");
        let callee = b.create_function("log", &[("v", IrType::Float(32))], IrType::Void).unwrap();
        let entry = b.append_block(callee, "entry");
        b.set_insert_point(callee, entry);
        b.build_ret(None).unwrap();

        let func = b.create_function("main", &[], IrType::Int(32)).unwrap();
        let entry = b.append_block(func, "entry");
        b.set_insert_point(func, entry);
        let slot = b.build_alloca(IrType::Int(32), "n").unwrap();
        b.build_store(Value::ConstInt { bits: 32, value: 2 }, slot.clone())
            .unwrap();
        let n = b.build_load(IrType::Int(32), slot, "").unwrap();
        let sum = b
            .build_binary(BinOp::Add, n.clone(), Value::ConstInt { bits: 32, value: 1 })
            .unwrap();
        let f = b.build_si_to_fp(sum, IrType::Float(32)).unwrap();
        assert_eq!(b.build_call("log", IrType::Void, vec![f]).unwrap(), None);
        b.build_ret(Some(n)).unwrap();

        let expected = indoc! {"
            ; ModuleID = 'main'

            define internal void @log(float %v) {
            entry:
              ret void
            }

            define internal i32 @main() {
            entry:
              %n = alloca i32
              store i32 2, ptr %n
              %0 = load i32, ptr %n
              %1 = add i32 %0, 1
              %2 = sitofp i32 %1 to float
              call void @log(float %2)
              ret i32 %0
            }
        "};
        assert_eq!(b.finish().to_string(), expected);
    }

    #[test]
    fn test_rejects_emission_into_terminated_block() {
        let mut b = IrBuilder::new("main");
        let func = b.create_function("f", &[], IrType::Void).unwrap();
        let entry = b.append_block(func, "entry");
        b.set_insert_point(func, entry);
        b.build_ret(None).unwrap();

        assert!(b.is_terminated());
        let expected = Error::AlreadyTerminated {
            label: "entry".into(),
        };
        assert_eq!(b.build_ret(None), Err(expected.clone()));
        assert_eq!(b.build_br(entry), Err(expected.clone()));
        assert_eq!(b.build_alloca(IrType::Int(8), "x"), Err(expected));
    }

    #[test]
    fn test_requires_insert_point() {
        let mut b = IrBuilder::new("main");
        assert_eq!(b.build_unreachable(), Err(Error::NoInsertPoint));
        assert!(!b.is_terminated());
    }

    #[test]
    fn test_rejects_duplicate_symbols() {
        let mut b = IrBuilder::new("main");
        b.create_function("f", &[], IrType::Void).unwrap();
        let duplicate = Error::DuplicateSymbol { name: "f".into() };
        assert_eq!(b.add_global("f", IrType::Int(32), None, false), Err(duplicate.clone()));
        assert_eq!(b.create_function("f", &[], IrType::Void), Err(duplicate));
    }
}
