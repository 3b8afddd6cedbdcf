//! Node definitions: the kind-tagged node, its flag set, and the payload
//! structs for the larger constructs.

use std::collections::HashMap;

use bitflags::bitflags;

use crate::{EntityId, NodeId, ScopeId, Span, TypeId};

bitflags! {
    /// Per-node flag set. Mutations are monotonic: flags are only ever added.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u32 {
        const HAS_BEEN_CHECKED      = 1 << 0;
        const COMPTIME              = 1 << 1;
        const CANNOT_TAKE_ADDR      = 1 << 2;
        const ADDRESS_TAKEN         = 1 << 3;
        const FUNCTION_USED         = 1 << 4;
        const DECL_FOLLOWED_BY_INIT = 1 << 5;
        const EXPR_IGNORED          = 1 << 6;
        const ARRAY_LITERAL_TYPED   = 1 << 7;
        const STATIC_IF_RESOLVED    = 1 << 8;
        const HEADER_CHECK_NO_ERROR = 1 << 9;
        const CONST                 = 1 << 10;
    }
}

/// One AST node. Every node carries the same header; the payload lives in
/// [`NodeKind`].
#[derive(Debug, Clone)]
pub struct Node {
    pub span: Span,
    /// Resolved semantic type; `None` until inferred.
    pub ty: Option<TypeId>,
    /// Unresolved type AST, when the construct was written with one.
    pub type_node: Option<NodeId>,
    pub flags: NodeFlags,
    /// The scheduler entity wrapping this node, if it is a top-level item.
    pub entity: Option<EntityId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            span: Span::default(),
            ty: None,
            type_node: None,
            flags: NodeFlags::empty(),
            entity: None,
            kind,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn checked(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_BEEN_CHECKED)
    }

    pub fn comptime(&self) -> bool {
        self.flags.contains(NodeFlags::COMPTIME)
    }

    /// Whether this node is a type expression (the type-AST subset of kinds).
    pub fn is_type_ast(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::BasicTypeRef { .. }
                | NodeKind::PointerType { .. }
                | NodeKind::SliceType { .. }
                | NodeKind::DynArrType { .. }
                | NodeKind::VarArgType { .. }
                | NodeKind::ArrayType { .. }
                | NodeKind::FunctionType { .. }
                | NodeKind::CompoundType { .. }
                | NodeKind::TypeOf { .. }
                | NodeKind::PolyCallType { .. }
                | NodeKind::PolyVar { .. }
                | NodeKind::TypeAlias { .. }
                | NodeKind::StructDecl(_)
                | NodeKind::PolyStructDecl(_)
        )
    }

    /// Whether this node may appear on the left of an assignment.
    pub fn is_lval(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Local { .. }
                | NodeKind::Param { .. }
                | NodeKind::Global { .. }
                | NodeKind::Memres(_)
                | NodeKind::Dereference { .. }
                | NodeKind::Subscript(_)
                | NodeKind::FieldAccess(_)
                | NodeKind::Compound { .. }
                | NodeKind::ConstraintSentinel
        )
    }

    /// Struct and array literals may have their address taken even though
    /// they are rvalues; storage is materialized for them.
    pub fn is_addressable_literal(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::StructLiteral(_) | NodeKind::ArrayLiteral { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    And,
    Or,
    Xor,
    Shl,
    Shr,
    Sar,

    BoolAnd,
    BoolOr,

    Assign,
    AssignAdd,
    AssignSub,
    AssignMul,
    AssignDiv,
    AssignMod,
    AssignAnd,
    AssignOr,
    AssignXor,
    AssignShl,
    AssignShr,
    AssignSar,

    // Overload-only operations; never produced by the parser directly.
    Subscript,
    SubscriptEquals,
    PtrSubscript,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AssignAdd
                | BinaryOp::AssignSub
                | BinaryOp::AssignMul
                | BinaryOp::AssignDiv
                | BinaryOp::AssignMod
                | BinaryOp::AssignAnd
                | BinaryOp::AssignOr
                | BinaryOp::AssignXor
                | BinaryOp::AssignShl
                | BinaryOp::AssignShr
                | BinaryOp::AssignSar
        )
    }

    pub fn is_compare(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    /// The non-assigning operation a compound assignment desugars to.
    pub fn compound_base(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::AssignAdd => BinaryOp::Add,
            BinaryOp::AssignSub => BinaryOp::Sub,
            BinaryOp::AssignMul => BinaryOp::Mul,
            BinaryOp::AssignDiv => BinaryOp::Div,
            BinaryOp::AssignMod => BinaryOp::Mod,
            BinaryOp::AssignAnd => BinaryOp::And,
            BinaryOp::AssignOr => BinaryOp::Or,
            BinaryOp::AssignXor => BinaryOp::Xor,
            BinaryOp::AssignShl => BinaryOp::Shl,
            BinaryOp::AssignShr => BinaryOp::Shr,
            BinaryOp::AssignSar => BinaryOp::Sar,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Sar => ">>>",
            BinaryOp::BoolAnd => "&&",
            BinaryOp::BoolOr => "||",
            BinaryOp::Assign => "=",
            BinaryOp::AssignAdd => "+=",
            BinaryOp::AssignSub => "-=",
            BinaryOp::AssignMul => "*=",
            BinaryOp::AssignDiv => "/=",
            BinaryOp::AssignMod => "%=",
            BinaryOp::AssignAnd => "&=",
            BinaryOp::AssignOr => "|=",
            BinaryOp::AssignXor => "^=",
            BinaryOp::AssignShl => "<<=",
            BinaryOp::AssignShr => ">>=",
            BinaryOp::AssignSar => ">>>=",
            BinaryOp::Subscript => "[]",
            BinaryOp::SubscriptEquals => "[]=",
            BinaryOp::PtrSubscript => "^[]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    BitwiseNot,
    Cast,
    AutoCast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarArgKind {
    NotVA,
    Typed,
    Untyped,
}

/// Positional plus named argument lists, shared by calls and struct literals.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub values: Vec<Option<NodeId>>,
    pub named: Vec<NamedValue>,
}

#[derive(Debug, Clone)]
pub struct NamedValue {
    pub name: String,
    pub value: NodeId,
}

impl CallArgs {
    pub fn positional(values: Vec<NodeId>) -> Self {
        CallArgs {
            values: values.into_iter().map(Some).collect(),
            named: Vec::new(),
        }
    }

    /// Extend the positional list with empty slots up to `len`.
    pub fn ensure_length(&mut self, len: usize) {
        while self.values.len() < len {
            self.values.push(None);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallDef {
    pub callee: NodeId,
    pub args: CallArgs,
    pub va_kind: Option<VarArgKind>,
    /// Set when the call was re-kinded into an intrinsic call.
    pub intrinsic: Option<Intrinsic>,
}

/// The intrinsics the checker knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    MemoryCopy,
    MemoryFill,
    Abs,
    Sqrt,
    Min,
    Max,
    Clz,
    Ctz,
    Popcount,
}

impl Intrinsic {
    pub fn from_name(name: &str) -> Option<Intrinsic> {
        Some(match name {
            "memory_copy" => Intrinsic::MemoryCopy,
            "memory_fill" => Intrinsic::MemoryFill,
            "abs" => Intrinsic::Abs,
            "sqrt" => Intrinsic::Sqrt,
            "min" => Intrinsic::Min,
            "max" => Intrinsic::Max,
            "clz" => Intrinsic::Clz,
            "ctz" => Intrinsic::Ctz,
            "popcount" => Intrinsic::Popcount,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BinaryDef {
    pub op: BinaryOp,
    pub left: NodeId,
    pub right: NodeId,
    /// Argument tuple built for operator-overload lookup; cached so a yield
    /// and retry does not rebuild (and re-check) it.
    pub overload_args: Option<CallArgs>,
    /// Synthesized replacement operation (subscript-assign lowering).
    pub potential_substitute: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SubscriptDef {
    pub addr: NodeId,
    pub index: NodeId,
    pub elem_size: Option<u32>,
    /// Synthesized `[]` operation used for operator-overload lookup.
    pub overload_substitute: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct FieldAccessDef {
    pub expr: NodeId,
    pub field: String,
    pub offset: Option<u32>,
    pub idx: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StructLiteralDef {
    /// Type expression the literal constructs; absent for inferred literals.
    pub stnode: Option<NodeId>,
    pub args: CallArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRule {
    Normal,
    Macro,
    DoBlock,
}

#[derive(Debug, Clone)]
pub struct BlockDef {
    pub body: Vec<NodeId>,
    /// Count of statements already successfully checked; yields resume here.
    pub statement_idx: usize,
    pub rules: BlockRule,
}

impl BlockDef {
    pub fn new(body: Vec<NodeId>) -> Self {
        BlockDef {
            body,
            statement_idx: 0,
            rules: BlockRule::Normal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IfWhileDef {
    pub init: Vec<NodeId>,
    pub cond: NodeId,
    pub true_stmt: Option<NodeId>,
    pub false_stmt: Option<NodeId>,
    /// While only: condition tested after the body.
    pub bottom_test: bool,
}

#[derive(Debug, Clone)]
pub struct StaticIfDef {
    pub cond: NodeId,
    pub true_stmt: Option<NodeId>,
    pub false_stmt: Option<NodeId>,
    pub true_entities: Vec<EntityId>,
    pub false_entities: Vec<EntityId>,
    pub resolution: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForLoop {
    Range,
    Array,
    Slice,
    DynArr,
    Iterator,
}

#[derive(Debug, Clone)]
pub struct ForDef {
    pub var: NodeId,
    pub iter: NodeId,
    pub body: NodeId,
    pub by_pointer: bool,
    pub no_close: bool,
    pub loop_type: Option<ForLoop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Integer,
    UseEquals,
}

/// A `scrutinee == value` comparison synthesized for a non-integer case.
#[derive(Debug, Clone)]
pub struct CaseToBlock {
    pub block: NodeId,
    pub original_value: NodeId,
    pub comparison: NodeId,
}

#[derive(Debug, Clone)]
pub struct SwitchDef {
    pub init: Vec<NodeId>,
    pub scrutinee: NodeId,
    /// The raw block holding `SwitchCase` statements before hoisting.
    pub case_block: NodeId,
    /// Hoisted cases; `None` until the collection pass has run.
    pub cases: Option<Vec<NodeId>>,
    pub default_case: Option<NodeId>,
    pub switch_kind: Option<SwitchKind>,
    pub case_map: HashMap<i64, NodeId>,
    pub min_case: i64,
    pub max_case: i64,
    pub case_exprs: Vec<CaseToBlock>,
    /// Number of cases fully processed; yields resume here.
    pub yield_return_index: usize,
}

#[derive(Debug, Clone)]
pub struct SwitchCaseDef {
    pub values: Vec<NodeId>,
    pub block: NodeId,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct ParamDef {
    /// The `Param` node introduced into the function scope.
    pub local: NodeId,
    pub default_value: Option<NodeId>,
    pub vararg_kind: VarArgKind,
}

/// Constraint bookkeeping carried by functions and structs.
#[derive(Debug, Clone, Default)]
pub struct ConstraintContext {
    pub constraints: Vec<NodeId>,
    pub checks: Option<Vec<ConstraintCheckStatus>>,
    pub constraints_met: bool,
    pub produce_errors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintCheckStatus {
    Queued,
    Failed,
    Success,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    /// `None` means the return type is inferred from the first `return`.
    pub return_type_node: Option<NodeId>,
    pub body: Option<NodeId>,
    pub constraints: ConstraintContext,
    pub tags: Vec<NodeId>,
    /// Name in the intrinsic table, when the function is an intrinsic stub.
    pub intrinsic_name: Option<String>,
    pub entity_header: Option<EntityId>,
    pub entity_body: Option<EntityId>,
    /// Call site a polymorphic instantiation was generated from.
    pub generated_from: Option<Span>,
    pub scope: Option<ScopeId>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionDef {
            name: name.into(),
            params: Vec::new(),
            return_type_node: None,
            body: None,
            constraints: ConstraintContext::default(),
            tags: Vec::new(),
            intrinsic_name: None,
            entity_header: None,
            entity_body: None,
            generated_from: None,
            scope: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverloadedFunctionDef {
    pub name: String,
    pub overloads: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct MacroDef {
    /// A function node whose body is spliced at expansion sites.
    pub body: NodeId,
}

#[derive(Debug, Clone)]
pub enum PolyParamKind {
    /// `$T` appearing in the type of the indexed formal parameter.
    ByType { param_idx: usize, pattern: NodeId },
    /// A baked value parameter.
    ByValue { param_idx: usize },
}

#[derive(Debug, Clone)]
pub struct PolyParam {
    pub name: String,
    pub kind: PolyParamKind,
}

#[derive(Debug, Clone)]
pub enum PolySolution {
    Type { name: String, ty: TypeId },
    Value { name: String, value: NodeId },
}

impl PolySolution {
    pub fn name(&self) -> &str {
        match self {
            PolySolution::Type { name, .. } => name,
            PolySolution::Value { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolyProcDef {
    pub func: FunctionDef,
    pub poly_params: Vec<PolyParam>,
    pub known_slns: Vec<PolySolution>,
    /// Cache of solidified instances keyed by their type solutions.
    pub instances: Vec<(Vec<TypeId>, NodeId)>,
    pub parent_scope: Option<ScopeId>,
}

#[derive(Debug, Clone)]
pub struct PolyQueryDef {
    pub proc: NodeId,
    /// Cloned header used for trial checking.
    pub function_header: NodeId,
    pub slns: Vec<PolySolution>,
    /// Types of the call-site arguments driving inference.
    pub given: Vec<Option<TypeId>>,
    pub error_on_fail: bool,
    pub successful_symres: bool,
    pub error_loc: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct InterfaceParam {
    pub value_name: String,
    pub type_name: String,
}

#[derive(Debug, Clone)]
pub struct InterfaceClause {
    pub expr: NodeId,
    pub expected_type_expr: Option<NodeId>,
    pub invert_condition: bool,
}

#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: String,
    pub params: Vec<InterfaceParam>,
    pub clauses: Vec<InterfaceClause>,
    pub scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintPhase {
    CloningExpressions,
    CheckingExpressions,
}

#[derive(Debug, Clone)]
pub struct ConstraintDef {
    pub interface: NodeId,
    pub type_args: Vec<NodeId>,
    pub clauses: Vec<InterfaceClause>,
    pub clause_idx: usize,
    pub phase: ConstraintPhase,
    pub scope: Option<ScopeId>,
    /// Slot in the owning constraint context that receives the outcome.
    pub report: Option<(NodeId, usize)>,
}

#[derive(Debug, Clone)]
pub struct StructMemberDecl {
    pub name: String,
    pub type_node: Option<NodeId>,
    pub initial_value: Option<NodeId>,
    pub used: bool,
    pub ty: Option<TypeId>,
    pub meta_tags: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<StructMemberDecl>,
    pub poly_arg_types: Vec<NodeId>,
    pub poly_arg_values: Vec<Option<NodeId>>,
    pub constraints: ConstraintContext,
    pub meta_tags: Vec<NodeId>,
    pub scope: Option<ScopeId>,
    pub entity_defaults: Option<EntityId>,
    pub entity_type: Option<EntityId>,
    pub ready_to_build_type: bool,
    pub pending_type: Option<TypeId>,
    pub pending_type_is_valid: bool,
    /// The completed struct type, once uses are done.
    pub built: Option<TypeId>,
    pub poly_error_loc: Option<Span>,
}

impl StructDef {
    pub fn new(name: impl Into<String>) -> Self {
        StructDef {
            name: name.into(),
            members: Vec::new(),
            poly_arg_types: Vec::new(),
            poly_arg_values: Vec::new(),
            constraints: ConstraintContext::default(),
            meta_tags: Vec::new(),
            scope: None,
            entity_defaults: None,
            entity_type: None,
            ready_to_build_type: false,
            pending_type: None,
            pending_type_is_valid: false,
            built: None,
            poly_error_loc: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolyStructDef {
    pub name: String,
    pub poly_params: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MemresDef {
    pub name: String,
    pub initial_value: Option<NodeId>,
    pub threadlocal: bool,
    pub type_entity: Option<EntityId>,
}

#[derive(Debug, Clone)]
pub struct SolidifyDef {
    pub poly_proc: NodeId,
    /// `(poly variable name, value-or-type expression)` pairs.
    pub known: Vec<(String, NodeId)>,
}

#[derive(Debug, Clone)]
pub struct ExportDef {
    pub target: NodeId,
    pub name_expr: NodeId,
    pub resolved_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InitDef {
    pub proc: NodeId,
    pub dependencies: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct CallSiteDef {
    pub filename: Option<NodeId>,
    pub line: Option<NodeId>,
    pub column: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Error,

    // Leaves and references.
    Symbol { name: String },
    NumLit { value: NumValue },
    StrLit { value: String },
    Local { name: String },
    Param { name: String },
    Global { name: String },
    Memres(Box<MemresDef>),
    ZeroValue,
    EnumValue { name: String, value: Option<NodeId> },
    Package { name: String },
    Alias { of: NodeId },
    ConstraintSentinel,
    FileContents { path: String },

    // Operators and accesses.
    Binary(Box<BinaryDef>),
    Unary { op: UnaryOp, expr: NodeId },
    Call(Box<CallDef>),
    Argument { value: NodeId },
    MethodCall { left: NodeId, call: NodeId },
    FieldAccess(Box<FieldAccessDef>),
    UnaryFieldAccess { field: String },
    Subscript(Box<SubscriptDef>),
    Slice { addr: NodeId, range: NodeId, elem_size: Option<u32> },
    AddressOf { expr: NodeId, can_be_removed: bool, potential_substitute: Option<NodeId> },
    Dereference { expr: NodeId },
    SizeOf { type_expr: NodeId, size: Option<u64> },
    AlignOf { type_expr: NodeId, alignment: Option<u64> },

    // Literals and expression forms.
    StructLiteral(Box<StructLiteralDef>),
    ArrayLiteral { atnode: Option<NodeId>, values: Vec<NodeId> },
    RangeLiteral { low: NodeId, high: NodeId, step: Option<NodeId> },
    Compound { exprs: Vec<NodeId> },
    IfExpression { cond: NodeId, true_expr: NodeId, false_expr: NodeId },
    DoBlock { block: NodeId },
    CodeBlock { code: NodeId },
    CallSite(Box<CallSiteDef>),

    // Statements.
    Block(Box<BlockDef>),
    Return { expr: Option<NodeId> },
    If(Box<IfWhileDef>),
    StaticIf(Box<StaticIfDef>),
    While(Box<IfWhileDef>),
    For(Box<ForDef>),
    Switch(Box<SwitchDef>),
    SwitchCase(Box<SwitchCaseDef>),
    Defer { stmt: NodeId },
    Jump,
    Remove,

    // Declarations.
    Function(Box<FunctionDef>),
    OverloadedFunction(Box<OverloadedFunctionDef>),
    Macro(Box<MacroDef>),
    PolyProc(Box<PolyProcDef>),
    Interface(Box<InterfaceDef>),
    Constraint(Box<ConstraintDef>),
    PolyQuery(Box<PolyQueryDef>),

    // Type AST.
    BasicTypeRef { ty: TypeId },
    TypeAlias { to: NodeId },
    PointerType { elem: NodeId },
    SliceType { elem: NodeId },
    DynArrType { elem: NodeId },
    VarArgType { elem: NodeId },
    ArrayType { count_expr: Option<NodeId>, elem: NodeId },
    FunctionType { params: Vec<NodeId>, ret: NodeId },
    CompoundType { types: Vec<NodeId> },
    TypeOf { expr: NodeId, resolved: Option<TypeId> },
    PolyCallType { callee: NodeId, params: Vec<NodeId> },
    PolyVar { name: String },
    StructDecl(Box<StructDef>),
    PolyStructDecl(Box<PolyStructDef>),

    // Directives.
    DirectiveInsert { code_expr: NodeId },
    DirectiveSolidify(Box<SolidifyDef>),
    DirectiveDefined { is_defined: bool },
    DirectiveExport(Box<ExportDef>),
    DirectiveInit(Box<InitDef>),
    DirectiveLibrary { name_expr: NodeId, resolved_name: Option<String> },
}

impl NodeKind {
    /// A short human-readable name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Error => "error",
            NodeKind::Symbol { .. } => "symbol",
            NodeKind::NumLit { .. } => "numeric literal",
            NodeKind::StrLit { .. } => "string literal",
            NodeKind::Local { .. } => "local",
            NodeKind::Param { .. } => "parameter",
            NodeKind::Global { .. } => "global",
            NodeKind::Memres(_) => "memory reservation",
            NodeKind::ZeroValue => "zero value",
            NodeKind::EnumValue { .. } => "enum value",
            NodeKind::Package { .. } => "package",
            NodeKind::Alias { .. } => "alias",
            NodeKind::ConstraintSentinel => "constraint sentinel",
            NodeKind::FileContents { .. } => "#file_contents",
            NodeKind::Binary(_) => "binary operator",
            NodeKind::Unary { .. } => "unary operator",
            NodeKind::Call(_) => "call",
            NodeKind::Argument { .. } => "argument",
            NodeKind::MethodCall { .. } => "method call",
            NodeKind::FieldAccess(_) => "field access",
            NodeKind::UnaryFieldAccess { .. } => "unary field access",
            NodeKind::Subscript(_) => "subscript",
            NodeKind::Slice { .. } => "slice",
            NodeKind::AddressOf { .. } => "address-of",
            NodeKind::Dereference { .. } => "dereference",
            NodeKind::SizeOf { .. } => "size-of",
            NodeKind::AlignOf { .. } => "align-of",
            NodeKind::StructLiteral(_) => "struct literal",
            NodeKind::ArrayLiteral { .. } => "array literal",
            NodeKind::RangeLiteral { .. } => "range literal",
            NodeKind::Compound { .. } => "compound expression",
            NodeKind::IfExpression { .. } => "if expression",
            NodeKind::DoBlock { .. } => "do block",
            NodeKind::CodeBlock { .. } => "code block",
            NodeKind::CallSite(_) => "call site",
            NodeKind::Block(_) => "block",
            NodeKind::Return { .. } => "return",
            NodeKind::If(_) => "if",
            NodeKind::StaticIf(_) => "static if",
            NodeKind::While(_) => "while",
            NodeKind::For(_) => "for",
            NodeKind::Switch(_) => "switch",
            NodeKind::SwitchCase(_) => "switch case",
            NodeKind::Defer { .. } => "defer",
            NodeKind::Jump => "jump",
            NodeKind::Remove => "#remove",
            NodeKind::Function(_) => "function",
            NodeKind::OverloadedFunction(_) => "overloaded function",
            NodeKind::Macro(_) => "macro",
            NodeKind::PolyProc(_) => "polymorphic procedure",
            NodeKind::Interface(_) => "interface",
            NodeKind::Constraint(_) => "constraint",
            NodeKind::PolyQuery(_) => "polymorph query",
            NodeKind::BasicTypeRef { .. } => "type",
            NodeKind::TypeAlias { .. } => "type alias",
            NodeKind::PointerType { .. } => "pointer type",
            NodeKind::SliceType { .. } => "slice type",
            NodeKind::DynArrType { .. } => "dynamic array type",
            NodeKind::VarArgType { .. } => "var-args type",
            NodeKind::ArrayType { .. } => "array type",
            NodeKind::FunctionType { .. } => "function type",
            NodeKind::CompoundType { .. } => "compound type",
            NodeKind::TypeOf { .. } => "type-of",
            NodeKind::PolyCallType { .. } => "polymorphic call type",
            NodeKind::PolyVar { .. } => "polymorphic variable",
            NodeKind::StructDecl(_) => "struct",
            NodeKind::PolyStructDecl(_) => "polymorphic struct",
            NodeKind::DirectiveInsert { .. } => "#insert",
            NodeKind::DirectiveSolidify(_) => "#solidify",
            NodeKind::DirectiveDefined { .. } => "#defined",
            NodeKind::DirectiveExport(_) => "#export",
            NodeKind::DirectiveInit(_) => "#init",
            NodeKind::DirectiveLibrary { .. } => "#library",
        }
    }
}
