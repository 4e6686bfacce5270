use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::position::Span;
use crate::value::Value;

/// Identifier bindings with an optional parent. Reads walk the chain,
/// writes always land in the current table.
#[derive(Default)]
pub struct SymbolTable {
    symbols: RefCell<IndexMap<String, Value>>,
    parent: Option<Rc<SymbolTable>>,
}

impl SymbolTable {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn with_parent(parent: Rc<SymbolTable>) -> Rc<Self> {
        Rc::new(Self {
            symbols: RefCell::new(IndexMap::new()),
            parent: Some(parent),
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.symbols.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.symbols.borrow_mut().insert(name.into(), value);
    }

    pub fn remove(&self, name: &str) {
        self.symbols.borrow_mut().shift_remove(name);
    }

    /// Names bound directly in this table, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.symbols.borrow().keys().cloned().collect()
    }
}

impl fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymbolTable")
            .field("names", &self.names())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// A call frame: the name shown in tracebacks, the frame that invoked it,
/// the call-site span, and the frame's symbol table.
pub struct Context {
    pub display_name: String,
    pub parent: Option<Rc<Context>>,
    pub parent_entry_span: Option<Span>,
    pub symbols: Rc<SymbolTable>,
}

impl Context {
    /// The root frame, named `<program>`, with no parent.
    pub fn program(symbols: Rc<SymbolTable>) -> Rc<Self> {
        Rc::new(Self {
            display_name: "<program>".to_string(),
            parent: None,
            parent_entry_span: None,
            symbols,
        })
    }

    pub fn frame(
        display_name: impl Into<String>,
        parent: Rc<Context>,
        entry_span: Span,
        symbols: Rc<SymbolTable>,
    ) -> Rc<Self> {
        Rc::new(Self {
            display_name: display_name.into(),
            parent: Some(parent),
            parent_entry_span: Some(entry_span),
            symbols,
        })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_set_get() {
        let table = SymbolTable::new();
        table.set("x", Value::int(42.0));
        assert_eq!(table.get("x"), Some(Value::int(42.0)));
        assert_eq!(table.get("y"), None);
    }

    #[test]
    fn test_get_walks_parents() {
        let outer = SymbolTable::new();
        outer.set("x", Value::int(1.0));
        let inner = SymbolTable::with_parent(Rc::clone(&outer));
        assert_eq!(inner.get("x"), Some(Value::int(1.0)));
    }

    #[test]
    fn test_set_shadows_without_touching_parent() {
        let outer = SymbolTable::new();
        outer.set("x", Value::int(1.0));
        let inner = SymbolTable::with_parent(Rc::clone(&outer));
        inner.set("x", Value::int(2.0));
        assert_eq!(inner.get("x"), Some(Value::int(2.0)));
        assert_eq!(outer.get("x"), Some(Value::int(1.0)));
    }

    #[test]
    fn test_remove_is_local_only() {
        let outer = SymbolTable::new();
        outer.set("x", Value::int(1.0));
        let inner = SymbolTable::with_parent(Rc::clone(&outer));
        inner.set("x", Value::int(2.0));
        inner.remove("x");
        // The parent binding shows through again.
        assert_eq!(inner.get("x"), Some(Value::int(1.0)));
        inner.remove("x");
        assert_eq!(outer.get("x"), Some(Value::int(1.0)));
    }

    #[test]
    fn test_program_context_has_no_parent() {
        let ctx = Context::program(SymbolTable::new());
        assert_eq!(ctx.display_name, "<program>");
        assert!(ctx.parent.is_none());
        assert!(ctx.parent_entry_span.is_none());
    }
}
