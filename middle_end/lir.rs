//! The low-level IR (LIR): a typed, basic-block-structured intermediate
//! representation loosely modeled on LLVM IR.
//!
//! A [`Program`] is a flat collection of record type declarations, global
//! variables and functions.  Types are hash-consed so that two structurally
//! identical [`LirType`]s are represented by the same interned handle, which
//! makes type equality (and therefore `Map<Type, _>`/`Set<Type>`) a cheap
//! comparison instead of a deep structural one.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::str::FromStr;

use hashconsing::{consign, HConsed, HashConsign};

pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

use crate::commons::ValidationError;

mod display_impl;
mod parse_impl;
mod validate_impl;

pub use parse_impl::ParseError;

// SECTION: types

consign! {
    /// The hash-consing table backing [`Type`].
    let TYPE_FACTORY = consign(1024) for LirType;
}

/// The shape of a [`Type`], before interning.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LirType {
    Int,
    Struct(StructId),
    Pointer(Type),
    Function {
        ret_ty: Option<Type>,
        param_ty: Vec<Type>,
    },
}

/// A hash-consed, cheaply-comparable handle to a [`LirType`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Type(pub HConsed<LirType>);

pub fn int_ty() -> Type {
    Type(TYPE_FACTORY.mk(LirType::Int))
}

pub fn struct_ty(id: StructId) -> Type {
    Type(TYPE_FACTORY.mk(LirType::Struct(id)))
}

pub fn ptr_ty(to: Type) -> Type {
    Type(TYPE_FACTORY.mk(LirType::Pointer(to)))
}

pub fn func_ty(ret_ty: Option<Type>, param_ty: Vec<Type>) -> Type {
    Type(TYPE_FACTORY.mk(LirType::Function { ret_ty, param_ty }))
}

impl Type {
    pub fn is_int(&self) -> bool {
        matches!(&*self.0, LirType::Int)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(&*self.0, LirType::Pointer(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(&*self.0, LirType::Struct(_))
    }

    pub fn is_func_ptr(&self) -> bool {
        match &*self.0 {
            LirType::Pointer(inner) => matches!(&*inner.0, LirType::Function { .. }),
            _ => false,
        }
    }

    /// The type pointed to, if this is a pointer; otherwise `self`.
    pub fn base_typ(&self) -> Type {
        match &*self.0 {
            LirType::Pointer(inner) => inner.clone(),
            _ => self.clone(),
        }
    }

    pub fn base_typ_is(&self, other: Type) -> bool {
        self.base_typ() == other
    }

    pub fn as_struct_id(&self) -> Option<&StructId> {
        match &*self.0 {
            LirType::Struct(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_pointee(&self) -> Option<&Type> {
        match &*self.0 {
            LirType::Pointer(inner) => Some(inner),
            _ => None,
        }
    }
}

// SECTION: identifiers

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub Rc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(FuncId);
string_id!(BbId);
string_id!(StructId);

pub fn func_id(name: &str) -> FuncId {
    FuncId(Rc::from(name))
}

pub fn bb_id(name: &str) -> BbId {
    BbId(Rc::from(name))
}

pub fn struct_id(name: &str) -> StructId {
    StructId(Rc::from(name))
}

/// A named, typed field of a record type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId {
    pub name: String,
    pub typ: Type,
}

pub fn field_id(name: &str, typ: Type) -> FieldId {
    FieldId {
        name: name.to_owned(),
        typ,
    }
}

#[derive(Clone, Debug)]
struct VarIdInner {
    name: String,
    typ: Type,
    scope: Option<FuncId>,
}

/// A variable reference: a local, a parameter, or a global (when `scope` is
/// `None`).  Compared and hashed by `(scope, name)`, matching LIR's textual
/// identity rather than the `Rc` pointer.
#[derive(Clone, Debug)]
pub struct VarId(pub Rc<VarIdInner>);

pub fn var_id(name: &str, typ: Type, scope: Option<FuncId>) -> VarId {
    VarId(Rc::new(VarIdInner {
        name: name.to_owned(),
        typ,
        scope,
    }))
}

impl VarId {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn typ(&self) -> Type {
        self.0.typ.clone()
    }

    pub fn scope(&self) -> Option<FuncId> {
        self.0.scope.clone()
    }

    pub fn is_global(&self) -> bool {
        self.0.scope.is_none()
    }

    /// Render as `func.name` when scoped, `name` otherwise.  Useful in
    /// diagnostics and anywhere two functions might otherwise share a local
    /// name.
    pub fn with_funcid(&self) -> String {
        match &self.0.scope {
            Some(f) => format!("{f}.{}", self.0.name),
            None => self.0.name.clone(),
        }
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

impl PartialEq for VarId {
    fn eq(&self, other: &Self) -> bool {
        self.0.scope == other.0.scope && self.0.name == other.0.name
    }
}
impl Eq for VarId {}

impl PartialOrd for VarId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for VarId {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.0.scope, &self.0.name).cmp(&(&other.0.scope, &other.0.name))
    }
}
impl Hash for VarId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.scope.hash(state);
        self.0.name.hash(state);
    }
}

// SECTION: instructions

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Var(VarId),
    CInt(i64),
}

impl Operand {
    pub fn typ(&self) -> Type {
        match self {
            Operand::Var(v) => v.typ(),
            Operand::CInt(_) => int_ty(),
        }
    }
}

/// An instruction occupies a fixed slot in a basic block; `(BbId, usize)`
/// identifies it uniquely within a function.
pub type InstId = (BbId, usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    AddrOf { lhs: VarId, op: Operand },
    Alloc { lhs: VarId, num: Operand, id: StructId },
    Arith { lhs: VarId, aop: ArithOp, op1: Operand, op2: Operand },
    Cmp { lhs: VarId, rop: CompareOp, op1: Operand, op2: Operand },
    CallExt { lhs: Option<VarId>, ext_callee: String, args: Vec<Operand> },
    Copy { lhs: VarId, op: Operand },
    /// Pointer arithmetic by a dynamic/constant integer offset (array
    /// indexing, and, when `idx` is a negative constant, the container-of
    /// idiom).
    Gep { lhs: VarId, src: VarId, idx: Operand },
    /// Get-field-pointer: address of a named field of a record pointer.
    Gfp { lhs: VarId, src: VarId, field: FieldId },
    Load { lhs: VarId, src: VarId },
    Store { dst: VarId, op: Operand },
    /// A bitcast of a pointer value to another pointer type.
    Cast { lhs: VarId, op: Operand, to: Type },
    Phi { lhs: VarId, preds: Map<BbId, Operand> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminal {
    Jump(BbId),
    Branch { cond: Operand, tt: BbId, ff: BbId },
    CallDirect { lhs: Option<VarId>, callee: FuncId, args: Vec<Operand>, next_bb: BbId },
    CallIndirect { lhs: Option<VarId>, callee: VarId, args: Vec<Operand>, next_bb: BbId },
    Ret(Option<Operand>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    pub id: BbId,
    pub insts: Vec<Instruction>,
    pub term: Terminal,
}

/// Visibility of a global or function, modeled after LLVM linkage: `Private`
/// symbols are not even externally nameable, `Internal` ones are visible
/// within the module only, `External` ones may be called or read from
/// outside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Linkage {
    Private,
    Internal,
    External,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub id: FuncId,
    pub linkage: Linkage,
    pub ret_ty: Option<Type>,
    pub params: Vec<VarId>,
    pub locals: Set<VarId>,
    /// `None` for a declared-only function (a prototype with no body).
    pub body: Option<Map<BbId, BasicBlock>>,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    pub fn param_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.typ()).collect()
    }

    pub fn signature_typ(&self) -> Type {
        func_ty(self.ret_ty.clone(), self.param_types())
    }
}

/// A structural constant, used as the initializer of a [`Global`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstInit {
    ZeroInt,
    NullPtr,
    /// The address of a function (an authored function or a synthesized
    /// field stub), used for function-pointer fields.
    FuncRef(FuncId),
    /// The address of another global, used for pointer-to-record fields that
    /// point at another type's singleton.
    GlobalRef(VarId),
    Struct(Vec<ConstInit>),
}

impl ConstInit {
    pub fn zero_for(typ: &Type) -> ConstInit {
        match &*typ.0 {
            LirType::Int => ConstInit::ZeroInt,
            LirType::Pointer(_) => ConstInit::NullPtr,
            LirType::Function { .. } => ConstInit::NullPtr,
            LirType::Struct(_) => ConstInit::ZeroInt,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    pub id: VarId,
    pub linkage: Linkage,
    pub init: ConstInit,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program {
    /// Record types, fields kept in declaration order (field index `i`
    /// matters: it's how field stubs and field-offset computations are
    /// named and addressed).
    pub structs: Map<StructId, Vec<FieldId>>,
    pub globals: Map<VarId, Global>,
    pub functions: Map<FuncId, Function>,
}

impl Program {
    pub fn fields(&self, id: &StructId) -> &[FieldId] {
        self.structs
            .get(id)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn field_index(&self, id: &StructId, field_name: &str) -> Option<usize> {
        self.fields(id).iter().position(|f| f.name == field_name)
    }

    pub fn validate(self) -> Result<crate::commons::Valid<Program>, ValidationError> {
        validate_impl::validate(&self)?;
        Ok(crate::commons::Valid(self))
    }
}

impl FromStr for Program {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_impl::parse_program(s)
    }
}
