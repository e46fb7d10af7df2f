use tracing::trace;

use crate::{
    codegen::{Error, Generator, Result},
    ir::{self, BlockId, FloatPredicate, FuncId, IntPredicate, IrType, Value},
    program::{Conditional, Expr, Loop, Stmt},
};

impl Generator {
    /// Lowers an `if`/`elif`/`else` chain. Each test either enters its branch
    /// or falls to the next test; every branch that does not return jumps to
    /// a common merge block, where lowering continues.
    pub(super) fn lower_conditional(&mut self, cond: &Conditional) -> Result<()> {
        let func = self.current_function()?;
        let if_block = self.builder.append_block(func, "if");
        let elifs: Vec<(BlockId, BlockId)> = cond
            .elifs
            .iter()
            .map(|_| {
                let check = self.builder.append_block(func, "elif_check");
                let body = self.builder.append_block(func, "elif");
                (check, body)
            })
            .collect();
        let else_block = self.builder.append_block(func, "else");
        let merge = self.builder.append_block(func, "merge");
        trace!(elifs = elifs.len(), "lowering conditional");

        let next_test = |index: usize| elifs.get(index).map_or(else_block, |&(check, _)| check);

        let test = self.lower_condition(&cond.cond)?;
        self.builder.build_cond_br(test, if_block, next_test(0))?;
        self.lower_branch(func, if_block, &cond.if_body, merge)?;

        for (index, (branch, &(check, body))) in cond.elifs.iter().zip(&elifs).enumerate() {
            self.builder.set_insert_point(func, check);
            let test = self.lower_condition(&branch.cond)?;
            self.builder.build_cond_br(test, body, next_test(index + 1))?;
            self.lower_branch(func, body, &branch.body, merge)?;
        }

        self.lower_branch(func, else_block, &cond.else_body, merge)?;
        self.builder.set_insert_point(func, merge);
        Ok(())
    }

    /// Lowers a `while` (or `for`) loop: the condition is re-tested in its
    /// own block after every iteration.
    pub(super) fn lower_loop(&mut self, lp: &Loop) -> Result<()> {
        let func = self.current_function()?;
        let cond = self.builder.append_block(func, "cond");
        let body = self.builder.append_block(func, "body");
        let merge = self.builder.append_block(func, "merge");
        trace!(kind = lp.kind.keyword(), "lowering loop");

        if !self.builder.is_terminated() {
            self.builder.build_br(cond)?;
        }
        self.builder.set_insert_point(func, cond);
        let test = self.lower_condition(&lp.cond)?;
        self.builder.build_cond_br(test, body, merge)?;

        self.lower_branch(func, body, &lp.body, cond)?;
        self.builder.set_insert_point(func, merge);
        Ok(())
    }

    /// Lowers `body` into `block` inside a fresh scope, jumping to `next`
    /// afterwards unless the body returned.
    fn lower_branch(
        &mut self,
        func: FuncId,
        block: BlockId,
        body: &[Stmt],
        next: BlockId,
    ) -> Result<()> {
        self.builder.set_insert_point(func, block);
        self.scoped(|this| {
            this.lower_statements(body)?;
            if !this.state.child_has_returned {
                this.builder.build_br(next)?;
            }
            Ok(())
        })
    }

    /// Lowers a branch condition to an `i1`. Other numbers are compared
    /// against zero.
    fn lower_condition(&mut self, expr: &Expr) -> Result<Value> {
        let value = self.lower_expr(expr)?;
        match value.ty() {
            IrType::Int(1) => Ok(value),
            IrType::Int(bits) => {
                let zero = Value::ConstInt { bits, value: 0 };
                Ok(self.builder.build_icmp(IntPredicate::Ne, value, zero)?)
            }
            IrType::Float(bits) => {
                let zero = Value::ConstFloat { bits, value: 0.0 };
                Ok(self.builder.build_fcmp(FloatPredicate::One, value, zero)?)
            }
            ty => Err(Error::InvalidCondition { ty }),
        }
    }

    fn current_function(&self) -> Result<FuncId> {
        self.builder
            .insert_point()
            .map(|(func, _)| func)
            .ok_or(Error::Ir(ir::Error::NoInsertPoint))
    }
}
