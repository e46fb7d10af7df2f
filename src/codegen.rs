//! Lowers a folded [`Program`] into an [`ir::Module`].
//!
//! Lowering walks the program once, keeping a stack of scope frames for name
//! resolution and the widths that untyped literals take in the current
//! context. Expressions are evaluated by a stack machine over their postfix
//! form (see [`expr`]); conditionals and loops become basic blocks joined by
//! explicit branches (see [`control_flow`]).

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    ir::{self, IrBuilder, IrType, Value},
    program::{Assignment, Expr, Function, Item, Program, Stmt, VarDecl},
    types::{Declared, FunctionType, Type, TypeRef, TypeRegistry},
};

mod control_flow;
mod expr;
mod scope;

pub use scope::{ScopeStack, SymbolEntry};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug)]
pub struct Options {
    pub module_name: Box<str>,
    /// Width of integer literals outside of any typed context.
    pub default_int_width: u32,
    /// Width of float literals outside of any typed context.
    pub default_float_width: u32,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            module_name: "main".into(),
            default_int_width: 32,
            default_float_width: 32,
        }
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(module = %options.module_name))]
pub fn generate(program: &Program, options: &Options) -> Result<ir::Module> {
    let mut generator = Generator::new(options);
    generator.lower_program(program)?;
    Ok(generator.finish())
}

pub struct Generator {
    builder: IrBuilder,
    registry: TypeRegistry,
    scopes: ScopeStack,
    state: State,
}

struct State {
    /// Whether declarations produce stack slots rather than globals.
    is_local_scope: bool,
    /// Set when the statement list just lowered ended in a `return`.
    child_has_returned: bool,
    int_width: u32,
    float_width: u32,
    function: Option<FunctionContext>,
}

struct FunctionContext {
    name: Box<str>,
    /// `None` for `void` functions.
    ret: Option<TypeRef>,
}

impl Generator {
    pub fn new(options: &Options) -> Generator {
        Generator::with_registry(TypeRegistry::with_builtins(), options)
    }

    pub fn with_registry(registry: TypeRegistry, options: &Options) -> Generator {
        let mut scopes = ScopeStack::default();
        scopes.push();
        Generator {
            builder: IrBuilder::new(&options.module_name),
            registry,
            scopes,
            state: State {
                is_local_scope: false,
                child_has_returned: false,
                int_width: options.default_int_width,
                float_width: options.default_float_width,
                function: None,
            },
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub fn module(&self) -> &ir::Module {
        self.builder.module()
    }

    pub fn finish(self) -> ir::Module {
        self.builder.finish()
    }

    pub fn lower_program(&mut self, program: &Program) -> Result<()> {
        for item in &program.items {
            match item {
                Item::Function(function) => self.lower_function(function)?,
                Item::Global(decl) => self.lower_declaration(decl)?,
            }
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(name = %function.name))]
    fn lower_function(&mut self, function: &Function) -> Result<()> {
        let mut params = Vec::with_capacity(function.params.len());
        for param in &function.params {
            params.push(self.resolve_binding_type(&param.ty, &param.name)?);
        }
        let ret = match &function.ret_type {
            Some(name) => match self.registry.resolve(name) {
                Some(declared) => declared.as_type().cloned(),
                None => return Err(Error::UnknownType { name: name.clone() }),
            },
            None => None,
        };

        let ty = Type::Function(FunctionType {
            ident: function.name.clone(),
            ret: ret.clone(),
            params: params.clone(),
        });
        self.registry
            .define(&function.name, ty)
            .map_err(|()| Error::Redefinition {
                name: function.name.clone(),
            })?;

        let ir_params: Vec<_> = function
            .params
            .iter()
            .zip(&params)
            .map(|(param, ty)| (&*param.name, lower_type(ty)))
            .collect();
        let ret_ir = ret.as_ref().map_or(IrType::Void, |ty| lower_type(ty));
        let func = self
            .builder
            .create_function(&function.name, &ir_params, ret_ir)?;
        let entry = self.builder.append_block(func, "entry");
        self.builder.set_insert_point(func, entry);

        self.state.function = Some(FunctionContext {
            name: function.name.clone(),
            ret: ret.clone(),
        });
        let lowered = self.scoped(|this| {
            for (index, (param, ty)) in function.params.iter().zip(params).enumerate() {
                let Some(storage) = this.builder.param(func, index) else {
                    continue;
                };
                let entry = SymbolEntry {
                    storage,
                    ty,
                    is_const: false,
                    is_param: true,
                };
                this.scopes.bind(&param.name, entry);
            }
            this.lower_statements(&function.body)?;
            if !this.builder.is_terminated() {
                if ret.is_none() {
                    this.builder.build_ret(None)?;
                } else {
                    this.builder.build_unreachable()?;
                }
            }
            Ok(())
        });
        self.state.function = None;
        self.builder.clear_insert_point();
        lowered?;

        debug!(params = function.params.len(), "lowered function");
        Ok(())
    }

    /// Lowers a statement list. Statements following a `return` in the same
    /// list are unreachable and are skipped.
    fn lower_statements(&mut self, stmts: &[Stmt]) -> Result<()> {
        let live = stmts
            .iter()
            .position(|stmt| matches!(stmt, Stmt::Return(_)))
            .map_or(stmts, |ret| &stmts[..=ret]);
        if live.len() < stmts.len() {
            trace!(skipped = stmts.len() - live.len(), "dropping unreachable statements");
        }
        live.iter().try_for_each(|stmt| self.lower_statement(stmt))
    }

    fn lower_statement(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Decl(decl) => self.lower_declaration(decl),
            Stmt::Assign(assign) => self.lower_assignment(assign),
            Stmt::Return(value) => self.lower_return(value.as_ref()),
            Stmt::Cond(cond) => self.lower_conditional(cond),
            Stmt::Loop(l) => self.lower_loop(l),
            Stmt::Expr(expr) => self.eval(expr).map(drop),
        }
    }

    fn lower_declaration(&mut self, decl: &VarDecl) -> Result<()> {
        let ty = self.resolve_binding_type(&decl.ty, &decl.name)?;
        let ir_ty = lower_type(&ty);
        let init = match &decl.init {
            Some(expr) => Some(self.with_widths(&ir_ty, |this| {
                let value = this.lower_expr(expr)?;
                this.coerce(value, &ir_ty)
            })),
            None => None,
        };

        if self.state.is_local_scope {
            let storage = self.builder.build_alloca(ir_ty, &decl.name)?;
            if let Some(value) = init.transpose()? {
                self.builder.build_store(value, storage.clone())?;
            }
            trace!(name = %decl.name, %ty, "declared local");
            self.bind(decl, storage, ty);
            return Ok(());
        }

        let init = match init {
            // Anything that needs an instruction cannot initialize a global.
            Some(Err(Error::Ir(ir::Error::NoInsertPoint))) => {
                return Err(Error::NonConstantInitializer {
                    name: decl.name.clone(),
                })
            }
            Some(Ok(value)) if !value.is_constant() => {
                return Err(Error::NonConstantInitializer {
                    name: decl.name.clone(),
                })
            }
            init => init.transpose()?,
        };
        let storage = self
            .builder
            .add_global(&decl.name, ir_ty, init, decl.is_const)?;
        debug!(name = %decl.name, %ty, "declared global");
        self.bind(decl, storage, ty);
        Ok(())
    }

    fn bind(&mut self, decl: &VarDecl, storage: Value, ty: TypeRef) {
        let entry = SymbolEntry {
            storage,
            ty,
            is_const: decl.is_const,
            is_param: false,
        };
        self.scopes.bind(&decl.name, entry);
    }

    fn lower_assignment(&mut self, assign: &Assignment) -> Result<()> {
        let entry = match self.scopes.lookup(&assign.target) {
            Some(entry) if !entry.is_const => entry.clone(),
            _ => {
                return Err(Error::InvalidAssignmentTarget {
                    name: assign.target.clone(),
                })
            }
        };
        if entry.is_param {
            return Err(Error::AssignToParameter {
                name: assign.target.clone(),
            });
        }
        let ty = lower_type(&entry.ty);
        let value = self.with_widths(&ty, |this| {
            let value = this.lower_expr(&assign.value)?;
            this.coerce(value, &ty)
        })?;
        self.builder.build_store(value, entry.storage)?;
        Ok(())
    }

    fn lower_return(&mut self, value: Option<&Expr>) -> Result<()> {
        let ret = self.state.function.as_ref().and_then(|f| f.ret.clone());
        let value = match (value, ret) {
            (None, _) => None,
            (Some(expr), Some(ret)) => {
                let ty = lower_type(&ret);
                Some(self.with_widths(&ty, |this| {
                    let value = this.lower_expr(expr)?;
                    this.coerce(value, &ty)
                })?)
            }
            (Some(_), None) => {
                let function = self
                    .state
                    .function
                    .as_ref()
                    .map_or_else(Box::default, |f| f.name.clone());
                return Err(Error::UninferredReturnType { function });
            }
        };
        self.builder.build_ret(value)?;
        self.state.child_has_returned = true;
        Ok(())
    }

    fn resolve_binding_type(&mut self, ty: &str, binding: &str) -> Result<TypeRef> {
        match self.registry.resolve(ty) {
            Some(Declared::Type(ty)) => Ok(ty),
            Some(Declared::Void) => Err(Error::VoidBinding {
                name: binding.into(),
            }),
            None => Err(Error::UnknownType { name: ty.into() }),
        }
    }

    /// Runs `f` inside a new innermost scope frame. The frame is popped on
    /// every path, errors included.
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let was_local = std::mem::replace(&mut self.state.is_local_scope, true);
        self.scopes.push();
        let result = f(self);
        self.scopes.pop();
        self.state.is_local_scope = was_local;
        self.state.child_has_returned = false;
        result
    }

    /// Runs `f` with literal widths taken from `ty`, restoring the previous
    /// widths afterwards.
    fn with_widths<T>(
        &mut self,
        ty: &IrType,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = (self.state.int_width, self.state.float_width);
        match *ty {
            IrType::Int(bits) if bits > 1 => self.state.int_width = bits,
            IrType::Float(bits) => self.state.float_width = bits,
            _ => {}
        }
        let result = f(self);
        (self.state.int_width, self.state.float_width) = saved;
        result
    }

    /// Converts `value` to `ty`. Constants are retyped, integers convert to
    /// floats, and any other value must already have type `ty`.
    #[allow(clippy::cast_precision_loss)]
    fn coerce(&mut self, value: Value, ty: &IrType) -> Result<Value> {
        let value = match (value, ty) {
            (Value::ConstInt { value, .. }, &IrType::Int(bits)) => Value::ConstInt { bits, value },
            (Value::ConstInt { value, .. }, &IrType::Float(bits)) => Value::ConstFloat {
                bits,
                value: value as f64,
            },
            (Value::ConstFloat { value, .. }, &IrType::Float(bits)) => {
                Value::ConstFloat { bits, value }
            }
            (value, IrType::Float(_)) if value.ty().is_int() => {
                self.builder.build_si_to_fp(value, ty.clone())?
            }
            (value, _) if value.ty() == *ty => value,
            (value, _) => {
                return Err(Error::TypeMismatch {
                    expected: ty.clone(),
                    found: value.ty(),
                })
            }
        };
        Ok(value)
    }
}

/// The IR representation of values of a source type.
pub fn lower_type(ty: &Type) -> IrType {
    match ty {
        Type::Integer { width, .. } => IrType::Int(*width),
        Type::Float { width } => IrType::Float(*width),
        Type::Bool => IrType::Int(1),
        Type::Pointer { .. } | Type::Reference(_) | Type::Function(_) => IrType::Ptr,
        Type::Struct(_) => IrType::Bytes(ty.byte_size().unwrap_or_default()),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("undefined identifier `{name}`")]
    UndefinedIdentifier { name: Box<str> },
    #[error("assignment to undefined or constant binding `{name}`")]
    InvalidAssignmentTarget { name: Box<str> },
    #[error("cannot assign to parameter `{name}`")]
    AssignToParameter { name: Box<str> },
    #[error("cannot take the address of parameter `{name}`")]
    AddressOfParameter { name: Box<str> },
    #[error("unsupported operator `{op}`")]
    UnsupportedOperator { op: Box<str> },
    #[error("unsupported operand types for `{op}`: {lhs} and {rhs}")]
    UnsupportedOperands {
        op: &'static str,
        lhs: IrType,
        rhs: IrType,
    },
    #[error("no equality defined for operand types {lhs} and {rhs}")]
    NoEqualityForOperands { lhs: IrType, rhs: IrType },
    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: IrType, found: IrType },
    #[error("malformed expression")]
    MalformedExpression,
    #[error("expression has no value")]
    VoidValue,
    #[error("condition of type {ty} is not a number")]
    InvalidCondition { ty: IrType },
    #[error("unknown type `{name}`")]
    UnknownType { name: Box<str> },
    #[error("binding `{name}` cannot have type `void`")]
    VoidBinding { name: Box<str> },
    #[error("unresolved callee `{name}`")]
    UnresolvedCallee { name: Box<str> },
    #[error("`{name}` expects {expected} arguments, found {found}")]
    ArityMismatch {
        name: Box<str>,
        expected: usize,
        found: usize,
    },
    #[error("initializer of global `{name}` is not a constant")]
    NonConstantInitializer { name: Box<str> },
    #[error("function `{function}` has no declared return type but returns a value")]
    UninferredReturnType { function: Box<str> },
    #[error("type `{name}` is already defined")]
    Redefinition { name: Box<str> },
    #[error(transparent)]
    Ir(#[from] ir::Error),
}
