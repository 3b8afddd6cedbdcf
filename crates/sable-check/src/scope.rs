//! Symbol scopes.
//!
//! Scopes form a parent-linked arena. The checker creates fresh scopes for
//! constraint sentinels and polymorph trial headers; full symbol resolution
//! is an external pass, but member/alias lookups during checking go through
//! these tables.

use std::collections::HashMap;

use sable_ast::{NodeId, ScopeId, Span};

use crate::types::find_similar_name;

#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub created_at: Span,
    symbols: HashMap<String, NodeId>,
}

#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        ScopeArena { scopes: Vec::new() }
    }

    pub fn create(&mut self, parent: Option<ScopeId>, created_at: Span) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            created_at,
            symbols: HashMap::new(),
        });
        id
    }

    /// Introduce a symbol; returns false if the name is already bound in
    /// this exact scope.
    pub fn introduce(&mut self, scope: ScopeId, name: impl Into<String>, node: NodeId) -> bool {
        let name = name.into();
        let symbols = &mut self.scopes[scope.0 as usize].symbols;
        if symbols.contains_key(&name) {
            return false;
        }
        symbols.insert(name, node);
        true
    }

    /// Resolve a name in this scope only.
    pub fn resolve_local(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        self.scopes[scope.0 as usize].symbols.get(name).copied()
    }

    /// Resolve a name walking the parent chain.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0 as usize];
            if let Some(&node) = s.symbols.get(name) {
                return Some(node);
            }
            current = s.parent;
        }
        None
    }

    /// The closest symbol name to `name` in this scope chain, for
    /// did-you-mean diagnostics.
    pub fn closest_symbol(&self, scope: ScopeId, name: &str) -> Option<String> {
        let mut candidates: Vec<&str> = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0 as usize];
            candidates.extend(s.symbols.keys().map(|k| k.as_str()));
            current = s.parent;
        }
        find_similar_name(name, candidates.into_iter())
    }

    pub fn symbol_nodes(&self, scope: ScopeId) -> impl Iterator<Item = NodeId> + '_ {
        self.scopes[scope.0 as usize].symbols.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_walks_parents() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None, Span::default());
        let child = scopes.create(Some(root), Span::default());

        assert!(scopes.introduce(root, "x", NodeId(1)));
        assert!(scopes.introduce(child, "y", NodeId(2)));

        assert_eq!(scopes.resolve(child, "x"), Some(NodeId(1)));
        assert_eq!(scopes.resolve(child, "y"), Some(NodeId(2)));
        assert_eq!(scopes.resolve(root, "y"), None);
        assert_eq!(scopes.resolve_local(child, "x"), None);
    }

    #[test]
    fn duplicate_introduction_is_rejected() {
        let mut scopes = ScopeArena::new();
        let root = scopes.create(None, Span::default());
        assert!(scopes.introduce(root, "x", NodeId(1)));
        assert!(!scopes.introduce(root, "x", NodeId(2)));
        assert_eq!(scopes.resolve(root, "x"), Some(NodeId(1)));
    }
}
