//! The semantic type store.
//!
//! Derived types (pointers, slices, arrays, dynamic arrays, var-args,
//! compounds) are interned so identical shapes share one `TypeId`. Struct,
//! enum and function types are unique: struct types accumulate members and
//! `use` expansions in place, and a function type's return slot is rewritten
//! when an auto-return resolves.

use std::collections::HashMap;

use bitflags::bitflags;
use sable_ast::{NodeId, ScopeId, TypeId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BasicFlags: u32 {
        const BOOLEAN  = 1 << 0;
        const INTEGER  = 1 << 1;
        const UNSIGNED = 1 << 2;
        const FLOAT    = 1 << 3;
        const POINTER  = 1 << 4;
        const SIMD     = 1 << 5;
        const NUMERIC  = 1 << 6;
        const ORDERED  = 1 << 7;
        const EQUALITY = 1 << 8;
        /// A literal type that has not committed to a size yet.
        const UNSIZED  = 1 << 9;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    IntUnsized,
    FloatUnsized,
    Rawptr,
    TypeIndex,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructStatus {
    Pending,
    UsesDone,
}

#[derive(Debug, Clone)]
pub struct StructMember {
    pub name: String,
    pub ty: TypeId,
    pub idx: usize,
    pub offset: u32,
    pub initial_value: Option<NodeId>,
    pub used: bool,
    /// Set when the member was pulled in through a `use x: ^T` member; holds
    /// the index of the containing pointer member.
    pub use_through_pointer_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StructType {
    pub name: String,
    pub status: StructStatus,
    pub members: Vec<StructMember>,
    /// Number of declared members, before any `use` expansion appended more.
    pub source_member_count: usize,
    /// The polymorphic struct declaration this type was instantiated from.
    pub polymorph_of: Option<NodeId>,
    pub poly_sln: Vec<TypeId>,
    pub ast_node: Option<NodeId>,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub backing: TypeId,
    pub is_flags: bool,
    pub values: Vec<(String, i64)>,
}

#[derive(Debug, Clone)]
pub struct FunctionType {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
}

#[derive(Debug, Clone)]
pub enum Type {
    Basic {
        kind: BasicKind,
        flags: BasicFlags,
        size: u32,
        align: u32,
        name: &'static str,
    },
    Pointer { elem: TypeId },
    Array { elem: TypeId, count: u32 },
    Slice { elem: TypeId },
    DynArray { elem: TypeId },
    VarArgs { elem: TypeId },
    Struct(StructType),
    Enum(EnumType),
    Function(FunctionType),
    Compound { types: Vec<TypeId> },
    /// Placeholder return type resolved by the first `return` statement.
    AutoReturn,
}

/// Handles to the always-present types.
#[derive(Debug, Clone, Copy)]
pub struct BasicTypes {
    pub void: TypeId,
    pub bool_: TypeId,
    pub i8_: TypeId,
    pub i16_: TypeId,
    pub i32_: TypeId,
    pub i64_: TypeId,
    pub u8_: TypeId,
    pub u16_: TypeId,
    pub u32_: TypeId,
    pub u64_: TypeId,
    pub f32_: TypeId,
    pub f64_: TypeId,
    pub int_unsized: TypeId,
    pub float_unsized: TypeId,
    pub rawptr: TypeId,
    pub type_index: TypeId,
    pub code: TypeId,
    pub auto_return: TypeId,
    pub str_: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DerivedKey {
    Pointer(TypeId),
    Array(TypeId, u32),
    Slice(TypeId),
    DynArray(TypeId),
    VarArgs(TypeId),
    Compound(Vec<TypeId>),
}

#[derive(Debug)]
pub struct TypeStore {
    types: Vec<Type>,
    derived: HashMap<DerivedKey, TypeId>,
    pub basic: BasicTypes,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut store = TypeStore {
            types: Vec::new(),
            derived: HashMap::new(),
            // Placeholder ids, fixed up immediately below.
            basic: BasicTypes {
                void: TypeId(0),
                bool_: TypeId(0),
                i8_: TypeId(0),
                i16_: TypeId(0),
                i32_: TypeId(0),
                i64_: TypeId(0),
                u8_: TypeId(0),
                u16_: TypeId(0),
                u32_: TypeId(0),
                u64_: TypeId(0),
                f32_: TypeId(0),
                f64_: TypeId(0),
                int_unsized: TypeId(0),
                float_unsized: TypeId(0),
                rawptr: TypeId(0),
                type_index: TypeId(0),
                code: TypeId(0),
                auto_return: TypeId(0),
                str_: TypeId(0),
            },
        };

        let int = BasicFlags::INTEGER
            | BasicFlags::NUMERIC
            | BasicFlags::ORDERED
            | BasicFlags::EQUALITY;
        let float = BasicFlags::FLOAT
            | BasicFlags::NUMERIC
            | BasicFlags::ORDERED
            | BasicFlags::EQUALITY;

        store.basic.void = store.push(Type::Basic {
            kind: BasicKind::Void,
            flags: BasicFlags::empty(),
            size: 0,
            align: 1,
            name: "void",
        });
        store.basic.bool_ = store.push(Type::Basic {
            kind: BasicKind::Bool,
            flags: BasicFlags::BOOLEAN | BasicFlags::EQUALITY,
            size: 1,
            align: 1,
            name: "bool",
        });
        store.basic.i8_ = store.push(Type::Basic { kind: BasicKind::I8, flags: int, size: 1, align: 1, name: "i8" });
        store.basic.i16_ = store.push(Type::Basic { kind: BasicKind::I16, flags: int, size: 2, align: 2, name: "i16" });
        store.basic.i32_ = store.push(Type::Basic { kind: BasicKind::I32, flags: int, size: 4, align: 4, name: "i32" });
        store.basic.i64_ = store.push(Type::Basic { kind: BasicKind::I64, flags: int, size: 8, align: 8, name: "i64" });
        store.basic.u8_ = store.push(Type::Basic { kind: BasicKind::U8, flags: int | BasicFlags::UNSIGNED, size: 1, align: 1, name: "u8" });
        store.basic.u16_ = store.push(Type::Basic { kind: BasicKind::U16, flags: int | BasicFlags::UNSIGNED, size: 2, align: 2, name: "u16" });
        store.basic.u32_ = store.push(Type::Basic { kind: BasicKind::U32, flags: int | BasicFlags::UNSIGNED, size: 4, align: 4, name: "u32" });
        store.basic.u64_ = store.push(Type::Basic { kind: BasicKind::U64, flags: int | BasicFlags::UNSIGNED, size: 8, align: 8, name: "u64" });
        store.basic.f32_ = store.push(Type::Basic { kind: BasicKind::F32, flags: float, size: 4, align: 4, name: "f32" });
        store.basic.f64_ = store.push(Type::Basic { kind: BasicKind::F64, flags: float, size: 8, align: 8, name: "f64" });
        store.basic.int_unsized = store.push(Type::Basic {
            kind: BasicKind::IntUnsized,
            flags: int | BasicFlags::UNSIZED,
            size: 8,
            align: 8,
            name: "unsized int",
        });
        store.basic.float_unsized = store.push(Type::Basic {
            kind: BasicKind::FloatUnsized,
            flags: float | BasicFlags::UNSIZED,
            size: 8,
            align: 8,
            name: "unsized float",
        });
        store.basic.rawptr = store.push(Type::Basic {
            kind: BasicKind::Rawptr,
            flags: BasicFlags::POINTER | BasicFlags::EQUALITY,
            size: 8,
            align: 8,
            name: "rawptr",
        });
        store.basic.type_index = store.push(Type::Basic {
            kind: BasicKind::TypeIndex,
            flags: BasicFlags::EQUALITY,
            size: 4,
            align: 4,
            name: "type_expr",
        });
        store.basic.code = store.push(Type::Basic {
            kind: BasicKind::Code,
            flags: BasicFlags::empty(),
            size: 0,
            align: 1,
            name: "Code",
        });
        store.basic.auto_return = store.push(Type::AutoReturn);
        store.basic.str_ = store.slice_of(store.basic.u8_);

        store
    }

    fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0 as usize]
    }

    fn derived(&mut self, key: DerivedKey, make: Type) -> TypeId {
        if let Some(&id) = self.derived.get(&key) {
            return id;
        }
        let id = self.push(make);
        self.derived.insert(key, id);
        id
    }

    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.derived(DerivedKey::Pointer(elem), Type::Pointer { elem })
    }

    pub fn array_of(&mut self, elem: TypeId, count: u32) -> TypeId {
        self.derived(DerivedKey::Array(elem, count), Type::Array { elem, count })
    }

    pub fn slice_of(&mut self, elem: TypeId) -> TypeId {
        self.derived(DerivedKey::Slice(elem), Type::Slice { elem })
    }

    pub fn dyn_array_of(&mut self, elem: TypeId) -> TypeId {
        self.derived(DerivedKey::DynArray(elem), Type::DynArray { elem })
    }

    pub fn varargs_of(&mut self, elem: TypeId) -> TypeId {
        self.derived(DerivedKey::VarArgs(elem), Type::VarArgs { elem })
    }

    pub fn compound_of(&mut self, types: Vec<TypeId>) -> TypeId {
        self.derived(
            DerivedKey::Compound(types.clone()),
            Type::Compound { types },
        )
    }

    /// Function types are unique so the return slot can be rewritten when an
    /// auto-return resolves.
    pub fn function(&mut self, params: Vec<TypeId>, return_type: TypeId) -> TypeId {
        self.push(Type::Function(FunctionType { params, return_type }))
    }

    pub fn new_struct(&mut self, st: StructType) -> TypeId {
        self.push(Type::Struct(st))
    }

    pub fn new_enum(&mut self, en: EnumType) -> TypeId {
        self.push(Type::Enum(en))
    }

    pub fn function_type(&self, id: TypeId) -> Option<&FunctionType> {
        match self.get(id) {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn set_function_return(&mut self, id: TypeId, ret: TypeId) {
        if let Type::Function(f) = self.get_mut(id) {
            f.return_type = ret;
        }
    }

    pub fn struct_type(&self, id: TypeId) -> Option<&StructType> {
        match self.get(id) {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn struct_type_mut(&mut self, id: TypeId) -> Option<&mut StructType> {
        match self.get_mut(id) {
            Type::Struct(s) => Some(s),
            _ => None,
        }
    }

    // ----- predicates ---------------------------------------------------

    pub fn is_void(&self, id: TypeId) -> bool {
        id == self.basic.void
    }

    pub fn is_auto_return(&self, id: TypeId) -> bool {
        id == self.basic.auto_return
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        self.basic_flags(id).contains(BasicFlags::BOOLEAN)
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic { flags, .. } if flags.contains(BasicFlags::INTEGER))
    }

    pub fn is_small_integer(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::Basic { flags, size, .. }
                if flags.contains(BasicFlags::INTEGER) && *size <= 4
        ) || matches!(self.get(id), Type::Basic { kind: BasicKind::IntUnsized, .. })
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic { flags, .. } if flags.contains(BasicFlags::NUMERIC))
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic { flags, .. } if flags.contains(BasicFlags::FLOAT))
    }

    pub fn is_unsized_literal(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Basic { flags, .. } if flags.contains(BasicFlags::UNSIZED))
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Pointer { .. }) || self.is_rawptr(id)
    }

    pub fn is_rawptr(&self, id: TypeId) -> bool {
        id == self.basic.rawptr
    }

    pub fn is_compound(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Compound { .. })
    }

    pub fn is_enum(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Enum(_))
    }

    pub fn is_array_accessible(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            Type::Array { .. }
                | Type::Slice { .. }
                | Type::DynArray { .. }
                | Type::VarArgs { .. }
                | Type::Pointer { .. }
        )
    }

    /// Types whose members can be accessed with `.`.
    pub fn is_structlike(&self, id: TypeId) -> bool {
        match self.get(id) {
            Type::Struct(_) | Type::Slice { .. } | Type::DynArray { .. } | Type::VarArgs { .. } => {
                true
            }
            Type::Pointer { elem } => matches!(self.get(*elem), Type::Struct(_)),
            Type::Enum(_) => true,
            _ => false,
        }
    }

    /// Types constructable with a struct literal.
    pub fn is_structlike_strict(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Struct(_))
    }

    fn basic_flags(&self, id: TypeId) -> BasicFlags {
        match self.get(id) {
            Type::Basic { flags, .. } => *flags,
            _ => BasicFlags::empty(),
        }
    }

    /// The flag set a binary operation is gated on for this type.
    pub fn effective_flags(&self, id: TypeId) -> BasicFlags {
        match self.get(id) {
            Type::Basic { flags, .. } => *flags,
            Type::Pointer { .. } => BasicFlags::POINTER | BasicFlags::EQUALITY,
            Type::Enum(_) => {
                BasicFlags::INTEGER | BasicFlags::ORDERED | BasicFlags::EQUALITY
            }
            Type::Function(_) => BasicFlags::EQUALITY,
            _ => BasicFlags::empty(),
        }
    }

    // ----- layout -------------------------------------------------------

    pub fn size_of(&self, id: TypeId) -> u32 {
        match self.get(id) {
            Type::Basic { size, .. } => *size,
            Type::Pointer { .. } => 8,
            Type::Array { elem, count } => self.size_of(*elem) * count,
            Type::Slice { .. } | Type::VarArgs { .. } => 16,
            Type::DynArray { .. } => 24,
            Type::Struct(s) => s
                .members
                .iter()
                .filter(|m| m.use_through_pointer_index.is_none())
                .map(|m| m.offset + self.size_of(m.ty))
                .max()
                .unwrap_or(0),
            Type::Enum(e) => self.size_of(e.backing),
            Type::Function(_) => 4,
            Type::Compound { types } => types.iter().map(|t| self.size_of(*t)).sum(),
            Type::AutoReturn => 0,
        }
    }

    pub fn alignment_of(&self, id: TypeId) -> u32 {
        match self.get(id) {
            Type::Basic { align, .. } => *align,
            Type::Pointer { .. } => 8,
            Type::Array { elem, .. } => self.alignment_of(*elem),
            Type::Slice { .. } | Type::VarArgs { .. } | Type::DynArray { .. } => 8,
            Type::Struct(s) => s
                .members
                .iter()
                .map(|m| self.alignment_of(m.ty))
                .max()
                .unwrap_or(1),
            Type::Enum(e) => self.alignment_of(e.backing),
            Type::Function(_) => 4,
            Type::Compound { types } => types
                .iter()
                .map(|t| self.alignment_of(*t))
                .max()
                .unwrap_or(1),
            Type::AutoReturn => 1,
        }
    }

    // ----- structural queries -------------------------------------------

    /// The element type reachable by subscripting.
    pub fn contained(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Pointer { elem }
            | Type::Array { elem, .. }
            | Type::Slice { elem }
            | Type::DynArray { elem }
            | Type::VarArgs { elem } => Some(*elem),
            _ => None,
        }
    }

    pub fn pointer_elem(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            Type::Pointer { elem } => Some(*elem),
            _ => None,
        }
    }

    /// The polymorphic struct declaration `id` was instantiated from.
    pub fn constructed_from(&self, id: TypeId) -> Option<NodeId> {
        match self.get(id) {
            Type::Struct(s) => s.polymorph_of,
            _ => None,
        }
    }

    pub fn poly_sln_of(&self, id: TypeId) -> &[TypeId] {
        match self.get(id) {
            Type::Struct(s) => &s.poly_sln,
            _ => &[],
        }
    }

    /// Member lookup on struct-like types, auto-dereferencing one pointer
    /// level. Slices, dynamic arrays and var-args expose `data`, `count`
    /// (and `capacity`).
    pub fn lookup_member(&mut self, id: TypeId, name: &str) -> Option<StructMember> {
        let id = match self.get(id) {
            Type::Pointer { elem } => *elem,
            _ => id,
        };
        match self.get(id) {
            Type::Struct(s) => s.members.iter().find(|m| m.name == name).cloned(),
            Type::Slice { elem } | Type::VarArgs { elem } => {
                let elem = *elem;
                self.view_member(name, elem, false)
            }
            Type::DynArray { elem } => {
                let elem = *elem;
                self.view_member(name, elem, true)
            }
            _ => None,
        }
    }

    fn view_member(&mut self, name: &str, elem: TypeId, has_capacity: bool) -> Option<StructMember> {
        let member = |name: &str, ty, idx, offset| StructMember {
            name: name.to_string(),
            ty,
            idx,
            offset,
            initial_value: None,
            used: false,
            use_through_pointer_index: None,
        };
        match name {
            "data" => {
                let ptr = self.pointer_to(elem);
                Some(member("data", ptr, 0, 0))
            }
            "count" => Some(member("count", self.basic.u32_, 1, 8)),
            "capacity" if has_capacity => Some(member("capacity", self.basic.u32_, 2, 12)),
            _ => None,
        }
    }

    pub fn member_by_idx(&self, id: TypeId, idx: usize) -> Option<StructMember> {
        self.struct_type(id)
            .and_then(|s| s.members.get(idx).cloned())
    }

    /// Number of members settable by a struct literal (declared members,
    /// excluding any `use` expansions).
    pub fn member_count(&self, id: TypeId) -> usize {
        match self.get(id) {
            Type::Struct(s) => s.source_member_count,
            _ => 0,
        }
    }

    /// Expand a `use` member: splice the inner type's members into the
    /// outer struct so they resolve directly. Returns false when the inner
    /// struct is not complete yet (caller yields).
    pub fn struct_member_apply_use(&mut self, id: TypeId, member_idx: usize) -> bool {
        let member = match self.member_by_idx(id, member_idx) {
            Some(m) => m,
            None => return false,
        };

        let (inner, through_pointer) = match self.get(member.ty) {
            Type::Pointer { elem } => (*elem, true),
            _ => (member.ty, false),
        };

        let inner_members = match self.get(inner) {
            Type::Struct(s) => {
                if s.status != StructStatus::UsesDone {
                    return false;
                }
                s.members.clone()
            }
            _ => return false,
        };

        let outer = match self.get_mut(id) {
            Type::Struct(s) => s,
            _ => return false,
        };

        for im in inner_members {
            if outer.members.iter().any(|m| m.name == im.name) {
                continue;
            }
            let idx = outer.members.len();
            outer.members.push(StructMember {
                name: im.name,
                ty: im.ty,
                idx,
                offset: if through_pointer { im.offset } else { member.offset + im.offset },
                initial_value: im.initial_value,
                used: false,
                use_through_pointer_index: if through_pointer {
                    Some(member_idx)
                } else {
                    None
                },
            });
        }

        true
    }

    // ----- compatibility ------------------------------------------------

    /// Structural compatibility without coercion side effects.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }

        match (self.get(a), self.get(b)) {
            // Unsized literals sit with every numeric type (and enums,
            // whose values are integers).
            (Type::Basic { flags, .. }, _)
                if flags.contains(BasicFlags::UNSIZED)
                    && (self.is_numeric(b) || self.is_enum(b)) =>
            {
                true
            }
            (_, Type::Basic { flags, .. })
                if flags.contains(BasicFlags::UNSIZED)
                    && (self.is_numeric(a) || self.is_enum(a)) =>
            {
                true
            }

            // Any pointer erases to rawptr.
            (Type::Pointer { .. }, Type::Basic { kind: BasicKind::Rawptr, .. }) => true,
            (Type::Basic { kind: BasicKind::Rawptr, .. }, Type::Pointer { .. }) => true,

            // Var-args are seen by the body as a slice of the same element.
            (Type::VarArgs { elem: a }, Type::Slice { elem: b }) => a == b,
            (Type::Slice { elem: a }, Type::VarArgs { elem: b }) => a == b,

            (Type::Function(fa), Type::Function(fb)) => {
                fa.params == fb.params && fa.return_type == fb.return_type
            }

            _ => false,
        }
    }

    /// A printable name for diagnostics.
    pub fn name(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Basic { name, .. } => (*name).to_string(),
            Type::Pointer { elem } => format!("^{}", self.name(*elem)),
            Type::Array { elem, count } => format!("[{}] {}", count, self.name(*elem)),
            Type::Slice { elem } => format!("[] {}", self.name(*elem)),
            Type::DynArray { elem } => format!("[..] {}", self.name(*elem)),
            Type::VarArgs { elem } => format!("..{}", self.name(*elem)),
            Type::Struct(s) => {
                if s.poly_sln.is_empty() {
                    s.name.clone()
                } else {
                    let args: Vec<String> =
                        s.poly_sln.iter().map(|t| self.name(*t)).collect();
                    format!("{}({})", s.name, args.join(", "))
                }
            }
            Type::Enum(e) => e.name.clone(),
            Type::Function(f) => {
                let params: Vec<String> = f.params.iter().map(|t| self.name(*t)).collect();
                format!("({}) -> {}", params.join(", "), self.name(f.return_type))
            }
            Type::Compound { types } => {
                let parts: Vec<String> = types.iter().map(|t| self.name(*t)).collect();
                format!("({})", parts.join(", "))
            }
            Type::AutoReturn => "#auto".to_string(),
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Edit distance (insertions, deletions, substitutions) between two
/// identifiers, ignoring ASCII case. Keeps only the previous DP row, so the
/// working set is O(len(b)).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let target: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=target.len()).collect();
    let mut row = vec![0usize; target.len() + 1];

    for (i, ac) in a.chars().enumerate() {
        row[0] = i + 1;
        for (j, bc) in target.iter().enumerate() {
            let substitute = prev[j] + usize::from(!ac.eq_ignore_ascii_case(bc));
            row[j + 1] = substitute.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[target.len()]
}

/// The closest candidate to `name`, for did-you-mean diagnostics. A match
/// may spend roughly one edit per three characters of the misspelled name;
/// anything farther is noise, not a suggestion.
pub fn find_similar_name<'a>(
    name: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> Option<String> {
    let budget = name.chars().count().div_ceil(3).max(1);

    candidates
        .map(|candidate| (candidate, edit_distance(name, candidate)))
        .filter(|&(_, distance)| distance <= budget)
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn derived_types_are_interned() {
        let mut store = TypeStore::new();
        let p1 = store.pointer_to(store.basic.i32_);
        let p2 = store.pointer_to(store.basic.i32_);
        assert_eq!(p1, p2);

        let a1 = store.array_of(store.basic.u8_, 4);
        let a2 = store.array_of(store.basic.u8_, 4);
        let a3 = store.array_of(store.basic.u8_, 5);
        assert_eq!(a1, a2);
        assert_ne!(a1, a3);
    }

    #[test]
    fn function_types_are_unique_and_mutable() {
        let mut store = TypeStore::new();
        let f1 = store.function(vec![store.basic.i32_], store.basic.auto_return);
        let f2 = store.function(vec![store.basic.i32_], store.basic.auto_return);
        assert_ne!(f1, f2);

        store.set_function_return(f1, store.basic.i32_);
        assert_eq!(store.function_type(f1).unwrap().return_type, store.basic.i32_);
        assert!(store.is_auto_return(store.function_type(f2).unwrap().return_type));
    }

    #[test]
    fn pointer_erases_to_rawptr() {
        let mut store = TypeStore::new();
        let p = store.pointer_to(store.basic.f64_);
        assert!(store.compatible(p, store.basic.rawptr));
        assert!(store.compatible(store.basic.rawptr, p));
        let q = store.pointer_to(store.basic.i8_);
        assert!(!store.compatible(p, q));
    }

    #[test]
    fn closest_name_suggestions() {
        assert_eq!(edit_distance("count", "cout"), 1);
        assert_eq!(edit_distance("Data", "data"), 0);
        assert_eq!(edit_distance("", "abc"), 3);

        let candidates = ["count", "data", "capacity"];
        assert_eq!(
            find_similar_name("cuont", candidates.iter().copied()),
            Some("count".to_string())
        );
        assert_eq!(find_similar_name("zzz", candidates.iter().copied()), None);
    }
}
