use std::collections::HashMap;
use std::fmt::Display;

use crate::parser::prelude::{Definition, FormalKind};
use crate::utils::prelude::SrcSpan;

use super::prelude::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Scalar,
    Range,
    Sheet,
    Function,
    Subroutine,
}

impl From<FormalKind> for SymbolKind {
    fn from(kind: FormalKind) -> Self {
        match kind {
            FormalKind::Scalar => Self::Scalar,
            FormalKind::Range => Self::Range,
            FormalKind::Sheet => Self::Sheet,
        }
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Scalar => "scalar",
            Self::Range => "range",
            Self::Sheet => "sheet",
            Self::Function => "function",
            Self::Subroutine => "subroutine",
        };

        write!(f, "{kind}")
    }
}

/// One live binding: its kind, a non-owning back-reference to the
/// defining node, and the runtime value once execution has begun.
#[derive(Debug, Clone)]
pub struct SymbolData<'p> {
    pub kind: SymbolKind,
    pub definition: Option<&'p Definition>,
    pub value: Option<Value>,
    pub location: SrcSpan,
    pub used: bool,
}

impl<'p> SymbolData<'p> {
    pub fn new(kind: SymbolKind, location: SrcSpan) -> Self {
        Self {
            kind,
            definition: None,
            value: None,
            location,
            used: false,
        }
    }

    pub fn with_definition(mut self, definition: &'p Definition) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// The single global namespace plus the transient table that shadows it
/// during a call or a definition body walk.
///
/// Call bindings land in the global store and are only *recorded* here
/// so they can be deleted again; there is no activation-record stack,
/// so re-entrant calls that reuse a name clobber each other's bindings.
#[derive(Debug, Default, Clone)]
pub struct Environment<'p> {
    pub store: HashMap<String, SymbolData<'p>>,
    pub temp: HashMap<String, SymbolData<'p>>,
}

impl<'p> Environment<'p> {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
            temp: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SymbolData<'p>> {
        self.store.get(name).or_else(|| self.temp.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut SymbolData<'p>> {
        match self.store.get_mut(name) {
            Some(data) => Some(data),
            None => self.temp.get_mut(name),
        }
    }

    pub fn declare(&mut self, name: String, data: SymbolData<'p>) {
        self.store.insert(name, data);
    }

    pub fn declare_temp(&mut self, name: String, data: SymbolData<'p>) {
        self.temp.insert(name, data);
    }

    /// Records a global-store binding for deletion on call exit.
    pub fn track_temp(&mut self, name: String, kind: SymbolKind, location: SrcSpan) {
        let mut marker = SymbolData::new(kind, location);
        marker.used = true;

        self.temp.insert(name, marker);
    }

    pub fn remove(&mut self, name: &str) {
        self.store.remove(name);
    }

    pub fn clear_temp(&mut self) {
        self.temp.clear();
    }

    /// Deletes every tracked name from the global store and forgets the
    /// tracking table.
    pub fn release_temp(&mut self) {
        let names = self.temp.drain()
            .map(|(name, _)| name)
            .collect::<Vec<String>>();

        for name in names {
            self.store.remove(&name);
        }
    }

    pub fn mark_used(&mut self, name: &str) {
        if let Some(data) = self.get_mut(name) {
            data.used = true;
        }
    }
}
