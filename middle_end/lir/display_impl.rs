//! Pretty-printer for [`Program`] and friends.
//!
//! The textual format produced here is re-readable by [`super::parse_impl`];
//! `program.to_string().parse::<Program>()` round-trips.

use std::fmt;

use super::*;

impl fmt::Display for LirType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LirType::Int => write!(f, "int"),
            LirType::Struct(id) => write!(f, "{id}"),
            LirType::Pointer(inner) => write!(f, "*{inner}"),
            LirType::Function { ret_ty, param_ty } => {
                write!(f, "fn(")?;
                for (i, p) in param_ty.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> ")?;
                match ret_ty {
                    Some(t) => write!(f, "{t}"),
                    None => write!(f, "void"),
                }
            }
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self.0)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.typ)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) if v.is_global() => write!(f, "${v}"),
            Operand::Var(v) => write!(f, "{v}"),
            Operand::CInt(n) => write!(f, "{n}"),
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "eq",
            CompareOp::Neq => "neq",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
        };
        write!(f, "{s}")
    }
}

fn fmt_global_ref(v: &VarId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "${v}")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::AddrOf { lhs, op } => write!(f, "{lhs} = addrof {op}"),
            Instruction::Alloc { lhs, num, id } => write!(f, "{lhs} = alloc {num} : {id}"),
            Instruction::Arith { lhs, aop, op1, op2 } => {
                write!(f, "{lhs} = {aop} {op1}, {op2}")
            }
            Instruction::Cmp { lhs, rop, op1, op2 } => write!(f, "{lhs} = {rop} {op1}, {op2}"),
            Instruction::CallExt { lhs, ext_callee, args } => {
                if let Some(lhs) = lhs {
                    write!(f, "{lhs} = ")?;
                }
                write!(f, "callext \"{ext_callee}\"(")?;
                fmt_args(args, f)?;
                write!(f, ")")
            }
            Instruction::Copy { lhs, op } => write!(f, "{lhs} = copy {op}"),
            Instruction::Gep { lhs, src, idx } => write!(f, "{lhs} = gep {src}[{idx}]"),
            Instruction::Gfp { lhs, src, field } => write!(f, "{lhs} = gfp {src}.{}", field.name),
            Instruction::Load { lhs, src } => write!(f, "{lhs} = load {src}"),
            Instruction::Store { dst, op } => write!(f, "store {dst}, {op}"),
            Instruction::Cast { lhs, op, to } => write!(f, "{lhs} = cast {op} to {to}"),
            Instruction::Phi { lhs, preds } => {
                write!(f, "{lhs} = phi [")?;
                for (i, (bb, op)) in preds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{bb}: {op}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn fmt_args(args: &[Operand], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{a}")?;
    }
    Ok(())
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Jump(bb) => write!(f, "jump {bb}"),
            Terminal::Branch { cond, tt, ff } => write!(f, "branch {cond}, {tt}, {ff}"),
            Terminal::CallDirect { lhs, callee, args, next_bb } => {
                if let Some(lhs) = lhs {
                    write!(f, "{lhs} = ")?;
                }
                write!(f, "call @{callee}(")?;
                fmt_args(args, f)?;
                write!(f, ") -> {next_bb}")
            }
            Terminal::CallIndirect { lhs, callee, args, next_bb } => {
                if let Some(lhs) = lhs {
                    write!(f, "{lhs} = ")?;
                }
                write!(f, "callind {callee}(")?;
                fmt_args(args, f)?;
                write!(f, ") -> {next_bb}")
            }
            Terminal::Ret(None) => write!(f, "ret"),
            Terminal::Ret(Some(op)) => write!(f, "ret {op}"),
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.id)?;
        for inst in &self.insts {
            writeln!(f, "  {inst}")?;
        }
        writeln!(f, "  {}", self.term)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::Private => write!(f, "private "),
            Linkage::Internal => write!(f, "internal "),
            Linkage::External => Ok(()),
        }
    }
}

impl fmt::Display for ConstInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstInit::ZeroInt | ConstInit::NullPtr => write!(f, "zero"),
            ConstInit::FuncRef(fid) => write!(f, "@{fid}"),
            ConstInit::GlobalRef(v) => fmt_global_ref(v, f),
            ConstInit::Struct(fields) => {
                write!(f, "{{")?;
                for (i, init) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{init}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn fmt_ret(ty: &Option<Type>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match ty {
        Some(t) => write!(f, "{t}"),
        None => write!(f, "void"),
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.linkage)?;
        match &self.body {
            None => write!(f, "extern ")?,
            Some(_) => {}
        }
        write!(f, "fn @{}(", self.id)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}: {}", p.typ())?;
        }
        write!(f, ") -> ")?;
        fmt_ret(&self.ret_ty, f)?;

        match &self.body {
            None => writeln!(f, ";"),
            Some(body) => {
                writeln!(f, " {{")?;
                if let Some(entry) = body.get(&bb_id("entry")) {
                    write!(f, "{entry}")?;
                }
                for (id, bb) in body {
                    if id.as_str() != "entry" {
                        write!(f, "{bb}")?;
                    }
                }
                writeln!(f, "}}")
            }
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, fields) in &self.structs {
            writeln!(f, "struct {id} {{")?;
            for field in fields {
                writeln!(f, "  {field},")?;
            }
            writeln!(f, "}}")?;
            writeln!(f)?;
        }

        for g in self.globals.values() {
            writeln!(
                f,
                "{}global ${}: {} = {}",
                g.linkage,
                g.id,
                g.id.typ(),
                g.init
            )?;
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
        }

        for func in self.functions.values() {
            writeln!(f, "{func}")?;
        }

        Ok(())
    }
}
