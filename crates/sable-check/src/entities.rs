//! Scheduler entities.
//!
//! An entity wraps one top-level construct and carries its pipeline state.
//! The checker never drives the schedule itself: it observes entity states
//! and returns a [`crate::CheckStatus`], and the pump in `lib.rs` maps that
//! onto a state transition.

use sable_ast::{EntityId, NodeId, ScopeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntityState {
    ResolveSymbols,
    CheckTypes,
    CodeGen,
    Finalized,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    FunctionHeader(NodeId),
    TempFunctionHeader(NodeId),
    Function(NodeId),
    OverloadedFunction(NodeId),
    Global(NodeId),
    StructType(NodeId),
    StructMemberDefaults(NodeId),
    MemresType(NodeId),
    Memres(NodeId),
    StaticIf(NodeId),
    Macro(NodeId),
    ConstraintCheck(NodeId),
    PolymorphQuery(NodeId),
    EnumValue(NodeId),
    ProcessDirective(NodeId),
    Expression(NodeId),
    TypeAlias(NodeId),
    FileContents(NodeId),
}

impl EntityKind {
    pub fn node(&self) -> NodeId {
        match *self {
            EntityKind::FunctionHeader(n)
            | EntityKind::TempFunctionHeader(n)
            | EntityKind::Function(n)
            | EntityKind::OverloadedFunction(n)
            | EntityKind::Global(n)
            | EntityKind::StructType(n)
            | EntityKind::StructMemberDefaults(n)
            | EntityKind::MemresType(n)
            | EntityKind::Memres(n)
            | EntityKind::StaticIf(n)
            | EntityKind::Macro(n)
            | EntityKind::ConstraintCheck(n)
            | EntityKind::PolymorphQuery(n)
            | EntityKind::EnumValue(n)
            | EntityKind::ProcessDirective(n)
            | EntityKind::Expression(n)
            | EntityKind::TypeAlias(n)
            | EntityKind::FileContents(n) => n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub kind: EntityKind,
    pub state: EntityState,
    pub scope: Option<ScopeId>,
    /// Parked entities sit out of the schedule until explicitly inserted
    /// (static-if branch entities).
    pub parked: bool,
    /// Consecutive yields since the last state change.
    pub attempts: u32,
}

#[derive(Debug, Default)]
pub struct EntityHeap {
    entities: Vec<Entity>,
}

impl EntityHeap {
    pub fn new() -> Self {
        EntityHeap {
            entities: Vec::new(),
        }
    }

    pub fn insert(&mut self, kind: EntityKind, scope: Option<ScopeId>) -> EntityId {
        self.insert_with_state(kind, scope, EntityState::ResolveSymbols)
    }

    pub fn insert_with_state(
        &mut self,
        kind: EntityKind,
        scope: Option<ScopeId>,
        state: EntityState,
    ) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(Entity {
            kind,
            state,
            scope,
            parked: false,
            attempts: 0,
        });
        id
    }

    /// Create an entity that does not participate in scheduling until
    /// [`EntityHeap::insert_existing`] is called for it.
    pub fn park(&mut self, kind: EntityKind, scope: Option<ScopeId>) -> EntityId {
        let id = self.insert(kind, scope);
        self.entities[id.0 as usize].parked = true;
        id
    }

    /// Put a parked entity (back) into the schedule.
    pub fn insert_existing(&mut self, id: EntityId) {
        self.entities[id.0 as usize].parked = false;
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0 as usize]
    }

    pub fn state(&self, id: EntityId) -> EntityState {
        self.entities[id.0 as usize].state
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities are out of the active pipeline.
    pub fn all_settled(&self) -> bool {
        self.entities.iter().all(|e| {
            e.parked
                || matches!(
                    e.state,
                    EntityState::CodeGen | EntityState::Finalized | EntityState::Failed
                )
        })
    }

    pub fn count_in_state(&self, state: EntityState) -> usize {
        self.entities
            .iter()
            .filter(|e| !e.parked && e.state == state)
            .count()
    }
}
