use std::collections::HashMap;

use tracing::trace;

use crate::{ir::Value, types::TypeRef};

/// What a name is bound to in some scope frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolEntry {
    /// The address of the variable's storage, or the incoming value for
    /// parameters.
    pub storage: Value,
    pub ty: TypeRef,
    pub is_const: bool,
    pub is_param: bool,
}

#[derive(Debug, Default)]
struct Frame {
    symbols: HashMap<Box<str>, SymbolEntry>,
}

/// A stack of lexical scope frames. The bottom frame holds module-level
/// bindings; lookups walk from the innermost frame outwards.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn push(&mut self) {
        self.frames.push(Frame::default());
        trace!(depth = self.frames.len(), "entered scope");
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        trace!(depth = self.frames.len(), "left scope");
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Binds `name` in the innermost frame, returning the entry it replaced
    /// in that same frame.
    pub fn bind(&mut self, name: &str, entry: SymbolEntry) -> Option<SymbolEntry> {
        if self.frames.is_empty() {
            self.push();
        }
        let frame = self.frames.last_mut()?;
        frame.symbols.insert(name.into(), entry)
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.resolve(name).map(|(_, entry)| entry)
    }

    /// Like [`ScopeStack::lookup`], also returning the index of the frame
    /// that holds the binding, the bottom frame being 0.
    pub fn resolve(&self, name: &str) -> Option<(usize, &SymbolEntry)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, frame)| Some((depth, frame.symbols.get(name)?)))
    }
}
