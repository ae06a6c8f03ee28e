//! Hand-written lexer and recursive-descent parser for the textual LIR
//! format produced by [`super::display_impl`].
//!
//! Mirrors the shape of a conventional two-stage compiler front end (lex,
//! then parse) rather than pulling in a parser-combinator or grammar crate:
//! the grammar is small and fixed, so a table of keywords and a
//! `Parser { tokens, pos }` walk it directly.

use std::fmt;

use super::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

fn err<T>(msg: impl Into<String>) -> Result<T, ParseError> {
    Err(ParseError(msg.into()))
}

// SECTION: lexer

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Global(String),
    Func(String),
    Str(String),
    Int(i64),
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Arrow,
    Eq,
    Dot,
    Semicolon,
    Minus,
    Eof,
}

fn lex(src: &str) -> Result<Vec<Tok>, ParseError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut toks = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '{' => {
                toks.push(Tok::LBrace);
                i += 1;
            }
            '}' => {
                toks.push(Tok::RBrace);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                toks.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                toks.push(Tok::RBracket);
                i += 1;
            }
            ':' => {
                toks.push(Tok::Colon);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            ';' => {
                toks.push(Tok::Semicolon);
                i += 1;
            }
            '=' => {
                toks.push(Tok::Eq);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Ident("*".to_owned()));
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                toks.push(Tok::Arrow);
                i += 2;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '"' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '"' {
                    i += 1;
                }
                if i >= chars.len() {
                    return err("unterminated string literal");
                }
                toks.push(Tok::Str(chars[start..i].iter().collect()));
                i += 1;
            }
            '$' => {
                i += 1;
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if start == i {
                    return err("expected identifier after '$'");
                }
                toks.push(Tok::Global(chars[start..i].iter().collect()));
            }
            '@' => {
                i += 1;
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                if start == i {
                    return err("expected identifier after '@'");
                }
                toks.push(Tok::Func(chars[start..i].iter().collect()));
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                toks.push(Tok::Int(s.parse().map_err(|_| ParseError(format!("bad integer literal {s}")))?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => return err(format!("unexpected character '{other}'")),
        }
    }

    toks.push(Tok::Eof);
    Ok(toks)
}

// SECTION: parser

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn advance(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn at_ident(&self, name: &str) -> bool {
        matches!(self.peek(), Tok::Ident(s) if s == name)
    }

    fn eat_ident(&mut self, name: &str) -> Result<(), ParseError> {
        if self.at_ident(name) {
            self.advance();
            Ok(())
        } else {
            err(format!("expected '{name}', found {:?}", self.peek()))
        }
    }

    fn eat(&mut self, t: &Tok) -> Result<(), ParseError> {
        if self.peek() == t {
            self.advance();
            Ok(())
        } else {
            err(format!("expected {t:?}, found {:?}", self.peek()))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Tok::Ident(s) => Ok(s),
            t => err(format!("expected identifier, found {t:?}")),
        }
    }

    fn func_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Tok::Func(s) => Ok(s),
            t => err(format!("expected @name, found {t:?}")),
        }
    }

    fn global_name(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Tok::Global(s) => Ok(s),
            t => err(format!("expected $name, found {t:?}")),
        }
    }

    fn int_lit(&mut self) -> Result<i64, ParseError> {
        let neg = if self.peek() == &Tok::Minus {
            self.advance();
            true
        } else {
            false
        };
        match self.advance() {
            Tok::Int(n) => Ok(if neg { -n } else { n }),
            t => err(format!("expected integer, found {t:?}")),
        }
    }

    // ty := "int" | "fn" "(" ty,* ")" "->" ret_ty | ident
    //
    // Leading `*`s are stripped by `parse_type_with_star` before this is
    // called; this only ever sees the pointee.
    fn parse_type(&mut self) -> Result<Type, ParseError> {
        match self.peek().clone() {
            Tok::Ident(s) if s == "int" => {
                self.advance();
                Ok(int_ty())
            }
            Tok::Ident(s) if s == "fn" => {
                self.advance();
                self.eat(&Tok::LParen)?;
                let mut params = Vec::new();
                while self.peek() != &Tok::RParen {
                    params.push(self.parse_type()?);
                    if self.peek() == &Tok::Comma {
                        self.advance();
                    }
                }
                self.eat(&Tok::RParen)?;
                self.eat(&Tok::Arrow)?;
                let ret = self.parse_ret_type()?;
                Ok(func_ty(ret, params))
            }
            Tok::Ident(s) => {
                self.advance();
                Ok(struct_ty(struct_id(&s)))
            }
            _ => err(format!("expected type, found {:?}", self.peek())),
        }
    }

    fn parse_ret_type(&mut self) -> Result<Option<Type>, ParseError> {
        if self.at_ident("void") {
            self.advance();
            Ok(None)
        } else {
            Ok(Some(self.parse_type()?))
        }
    }
}

pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let toks = lex(src)?;
    let mut p = Parser { toks, pos: 0 };

    let mut program = Program::default();

    while p.peek() != &Tok::Eof {
        if p.at_ident("struct") {
            parse_struct(&mut p, &mut program)?;
        } else if peek_is_global_decl(&p) {
            let linkage = parse_linkage(&mut p)?;
            parse_global(&mut p, &mut program, linkage)?;
        } else if p.at_ident("private")
            || p.at_ident("internal")
            || p.at_ident("extern")
            || p.at_ident("fn")
        {
            let linkage = parse_linkage(&mut p)?;
            parse_function(&mut p, &mut program, linkage)?;
        } else {
            return err(format!("expected top-level item, found {:?}", p.peek()));
        }
    }

    resolve_global_refs(&mut program);
    Ok(program)
}

/// Both globals and functions may be prefixed with `private`/`internal`, so
/// telling the two top-level item kinds apart needs a peek past the
/// optional linkage keyword.
fn peek_is_global_decl(p: &Parser) -> bool {
    let mut i = p.pos;
    if matches!(&p.toks[i], Tok::Ident(s) if s == "private" || s == "internal") {
        i += 1;
    }
    matches!(p.toks.get(i), Some(Tok::Ident(s)) if s == "global")
}

fn parse_linkage(p: &mut Parser) -> Result<Linkage, ParseError> {
    if p.at_ident("private") {
        p.advance();
        Ok(Linkage::Private)
    } else if p.at_ident("internal") {
        p.advance();
        Ok(Linkage::Internal)
    } else {
        Ok(Linkage::External)
    }
}

fn parse_type_with_star(p: &mut Parser) -> Result<Type, ParseError> {
    let mut stars = 0;
    while matches!(p.peek(), Tok::Ident(s) if s == "*") {
        p.advance();
        stars += 1;
    }
    let mut ty = p.parse_type()?;
    for _ in 0..stars {
        ty = ptr_ty(ty);
    }
    Ok(ty)
}

fn parse_struct(p: &mut Parser, program: &mut Program) -> Result<(), ParseError> {
    p.eat_ident("struct")?;
    let name = struct_id(&p.ident()?);
    p.eat(&Tok::LBrace)?;
    let mut fields = Vec::new();
    while p.peek() != &Tok::RBrace {
        let fname = p.ident()?;
        p.eat(&Tok::Colon)?;
        let ty = parse_type_with_star(p)?;
        fields.push(field_id(&fname, ty));
        if p.peek() == &Tok::Comma {
            p.advance();
        }
    }
    p.eat(&Tok::RBrace)?;
    program.structs.insert(name, fields);
    Ok(())
}

fn parse_global(p: &mut Parser, program: &mut Program, linkage: Linkage) -> Result<(), ParseError> {
    p.eat_ident("global")?;
    let name = p.global_name()?;
    p.eat(&Tok::Colon)?;
    let ty = parse_type_with_star(p)?;
    p.eat(&Tok::Eq)?;
    let init = parse_const_init(p)?;

    let id = var_id(&name, ty, None);
    program.globals.insert(id.clone(), Global { id, linkage, init });
    Ok(())
}

fn parse_const_init(p: &mut Parser) -> Result<ConstInit, ParseError> {
    match p.peek().clone() {
        Tok::Ident(s) if s == "zero" => {
            p.advance();
            Ok(ConstInit::ZeroInt)
        }
        Tok::Func(name) => {
            p.advance();
            Ok(ConstInit::FuncRef(func_id(&name)))
        }
        Tok::Global(name) => {
            p.advance();
            // Type resolved after the whole module is parsed, so any
            // placeholder type works here.
            Ok(ConstInit::GlobalRef(var_id(&name, int_ty(), None)))
        }
        Tok::LBrace => {
            p.advance();
            let mut fields = Vec::new();
            while p.peek() != &Tok::RBrace {
                fields.push(parse_const_init(p)?);
                if p.peek() == &Tok::Comma {
                    p.advance();
                }
            }
            p.eat(&Tok::RBrace)?;
            Ok(ConstInit::Struct(fields))
        }
        t => err(format!("expected constant initializer, found {t:?}")),
    }
}

/// Per-function parsing state: which locals/params have been declared so
/// far and what type each was declared with, so that a later reference to
/// `x` (in an operand, a `gep`/`gfp` source, ...) gets `x`'s real type
/// instead of a placeholder.
struct FuncCtx {
    scope: FuncId,
    locals: Set<VarId>,
    types: Map<String, Type>,
}

impl FuncCtx {
    fn declare(&mut self, name: String, typ: Type) -> VarId {
        self.types.insert(name.clone(), typ.clone());
        let v = var_id(&name, typ, Some(self.scope.clone()));
        self.locals.insert(v.clone());
        v
    }

    /// A reference to an already-declared local/param. Falls back to `int`
    /// for a not-yet-seen name (a `phi` operand from a block later in
    /// source order, most commonly a loop back edge).
    fn reference(&self, name: &str) -> VarId {
        let ty = self.types.get(name).cloned().unwrap_or_else(int_ty);
        var_id(name, ty, Some(self.scope.clone()))
    }
}

fn parse_function(p: &mut Parser, program: &mut Program, linkage: Linkage) -> Result<(), ParseError> {
    let is_extern = if p.at_ident("extern") {
        p.advance();
        true
    } else {
        false
    };
    p.eat_ident("fn")?;
    let name = func_id(&p.func_name()?);
    p.eat(&Tok::LParen)?;

    let mut ctx = FuncCtx { scope: name.clone(), locals: Set::new(), types: Map::new() };
    let mut params = Vec::new();
    while p.peek() != &Tok::RParen {
        let pname = p.ident()?;
        p.eat(&Tok::Colon)?;
        let ty = parse_type_with_star(p)?;
        params.push(ctx.declare(pname, ty));
        if p.peek() == &Tok::Comma {
            p.advance();
        }
    }
    p.eat(&Tok::RParen)?;
    p.eat(&Tok::Arrow)?;
    let ret_ty = p.parse_ret_type()?;

    if is_extern {
        p.eat(&Tok::Semicolon)?;
        program.functions.insert(
            name.clone(),
            Function { id: name, linkage, ret_ty, params, locals: ctx.locals, body: None },
        );
        return Ok(());
    }

    p.eat(&Tok::LBrace)?;
    let mut body = Map::new();
    while p.peek() != &Tok::RBrace {
        let bb = parse_block(p, &mut ctx, program)?;
        body.insert(bb.id.clone(), bb);
    }
    p.eat(&Tok::RBrace)?;

    program.functions.insert(
        name.clone(),
        Function { id: name, linkage, ret_ty, params, locals: ctx.locals, body: Some(body) },
    );
    Ok(())
}

fn parse_operand(p: &mut Parser, ctx: &FuncCtx) -> Result<Operand, ParseError> {
    match p.peek().clone() {
        Tok::Minus => Ok(Operand::CInt(p.int_lit()?)),
        Tok::Int(_) => Ok(Operand::CInt(p.int_lit()?)),
        Tok::Global(name) => {
            p.advance();
            Ok(Operand::Var(var_id(&name, int_ty(), None)))
        }
        Tok::Ident(name) => {
            p.advance();
            Ok(Operand::Var(ctx.reference(&name)))
        }
        t => err(format!("expected operand, found {t:?}")),
    }
}

fn parse_args(p: &mut Parser, ctx: &FuncCtx) -> Result<Vec<Operand>, ParseError> {
    p.eat(&Tok::LParen)?;
    let mut args = Vec::new();
    while p.peek() != &Tok::RParen {
        args.push(parse_operand(p, ctx)?);
        if p.peek() == &Tok::Comma {
            p.advance();
        }
    }
    p.eat(&Tok::RParen)?;
    Ok(args)
}

fn parse_block(p: &mut Parser, ctx: &mut FuncCtx, program: &Program) -> Result<BasicBlock, ParseError> {
    let label = p.ident()?;
    p.eat(&Tok::Colon)?;

    let mut insts = Vec::new();
    loop {
        if is_terminal_start(p) {
            let term = parse_terminal(p, ctx)?;
            return Ok(BasicBlock { id: bb_id(&label), insts, term });
        }
        insts.push(parse_instruction(p, ctx, program)?);
    }
}

fn is_terminal_start(p: &Parser) -> bool {
    matches!(p.peek(), Tok::Ident(s) if matches!(s.as_str(), "jump" | "branch" | "ret"))
        || is_assign_terminal(p)
}

fn is_assign_terminal(p: &Parser) -> bool {
    // Lookahead past `ident '='` to see whether the RHS mnemonic is
    // `call`/`callind` (a terminal) rather than an instruction.
    if p.pos + 2 >= p.toks.len() {
        return false;
    }
    matches!(&p.toks[p.pos], Tok::Ident(_))
        && p.toks[p.pos + 1] == Tok::Eq
        && matches!(&p.toks[p.pos + 2], Tok::Ident(s) if s == "call" || s == "callind")
}

fn parse_terminal(p: &mut Parser, ctx: &mut FuncCtx) -> Result<Terminal, ParseError> {
    if p.at_ident("jump") {
        p.advance();
        return Ok(Terminal::Jump(bb_id(&p.ident()?)));
    }
    if p.at_ident("branch") {
        p.advance();
        let cond = parse_operand(p, ctx)?;
        p.eat(&Tok::Comma)?;
        let tt = bb_id(&p.ident()?);
        p.eat(&Tok::Comma)?;
        let ff = bb_id(&p.ident()?);
        return Ok(Terminal::Branch { cond, tt, ff });
    }
    if p.at_ident("ret") {
        p.advance();
        // A bare `ret` is followed either by the closing brace of the
        // function or by the next block's `label:` -- never by a token
        // that could itself start an operand -- so a one-token lookahead
        // (is the next identifier immediately followed by `:`?) tells
        // `ret` apart from `ret <operand>`.
        let next_is_label = matches!(p.peek(), Tok::Ident(_)) && p.toks.get(p.pos + 1) == Some(&Tok::Colon);
        if next_is_label || p.peek() == &Tok::RBrace {
            return Ok(Terminal::Ret(None));
        }
        return Ok(Terminal::Ret(Some(parse_operand(p, ctx)?)));
    }

    // assignment form: `lhs = call @f(args) -> next` / `lhs = callind f(args) -> next`
    let lhs_name = p.ident()?;
    p.eat(&Tok::Eq)?;
    if p.at_ident("call") {
        p.advance();
        let callee = func_id(&p.func_name()?);
        let args = parse_args(p, ctx)?;
        p.eat(&Tok::Arrow)?;
        let next_bb = bb_id(&p.ident()?);
        let lhs = ctx.declare(lhs_name, int_ty());
        return Ok(Terminal::CallDirect { lhs: Some(lhs), callee, args, next_bb });
    }
    if p.at_ident("callind") {
        p.advance();
        let callee_name = p.ident()?;
        let callee = ctx.reference(&callee_name);
        let args = parse_args(p, ctx)?;
        p.eat(&Tok::Arrow)?;
        let next_bb = bb_id(&p.ident()?);
        let lhs = ctx.declare(lhs_name, int_ty());
        return Ok(Terminal::CallIndirect { lhs: Some(lhs), callee, args, next_bb });
    }

    err(format!("expected terminal after '{lhs_name} =', found {:?}", p.peek()))
}

fn parse_arith_op(name: &str) -> Option<ArithOp> {
    Some(match name {
        "add" => ArithOp::Add,
        "sub" => ArithOp::Sub,
        "mul" => ArithOp::Mul,
        "div" => ArithOp::Div,
        _ => return None,
    })
}

fn parse_compare_op(name: &str) -> Option<CompareOp> {
    Some(match name {
        "eq" => CompareOp::Eq,
        "neq" => CompareOp::Neq,
        "lt" => CompareOp::Lt,
        "lte" => CompareOp::Lte,
        "gt" => CompareOp::Gt,
        "gte" => CompareOp::Gte,
        _ => return None,
    })
}

fn parse_instruction(p: &mut Parser, ctx: &mut FuncCtx, program: &Program) -> Result<Instruction, ParseError> {
    if p.at_ident("store") {
        p.advance();
        let dst_name = p.ident()?;
        let dst = ctx.reference(&dst_name);
        p.eat(&Tok::Comma)?;
        let op = parse_operand(p, ctx)?;
        return Ok(Instruction::Store { dst, op });
    }

    let lhs_name = p.ident()?;
    p.eat(&Tok::Eq)?;

    let mnemonic = p.ident()?;

    if let Some(aop) = parse_arith_op(&mnemonic) {
        let op1 = parse_operand(p, ctx)?;
        p.eat(&Tok::Comma)?;
        let op2 = parse_operand(p, ctx)?;
        let lhs = ctx.declare(lhs_name, int_ty());
        return Ok(Instruction::Arith { lhs, aop, op1, op2 });
    }
    if let Some(rop) = parse_compare_op(&mnemonic) {
        let op1 = parse_operand(p, ctx)?;
        p.eat(&Tok::Comma)?;
        let op2 = parse_operand(p, ctx)?;
        let lhs = ctx.declare(lhs_name, int_ty());
        return Ok(Instruction::Cmp { lhs, rop, op1, op2 });
    }

    match mnemonic.as_str() {
        "addrof" => {
            let op = parse_operand(p, ctx)?;
            let lhs = ctx.declare(lhs_name, ptr_ty(op.typ()));
            Ok(Instruction::AddrOf { lhs, op })
        }
        "alloc" => {
            let num = parse_operand(p, ctx)?;
            p.eat(&Tok::Colon)?;
            let id = struct_id(&p.ident()?);
            let lhs = ctx.declare(lhs_name, ptr_ty(struct_ty(id.clone())));
            Ok(Instruction::Alloc { lhs, num, id })
        }
        "callext" => {
            let ext_callee = match p.advance() {
                Tok::Str(s) => s,
                t => return err(format!("expected string literal, found {t:?}")),
            };
            let args = parse_args(p, ctx)?;
            let lhs = ctx.declare(lhs_name, int_ty());
            Ok(Instruction::CallExt { lhs: Some(lhs), ext_callee, args })
        }
        "copy" => {
            let op = parse_operand(p, ctx)?;
            let lhs = ctx.declare(lhs_name, op.typ());
            Ok(Instruction::Copy { lhs, op })
        }
        "gep" => {
            let src_name = p.ident()?;
            let src = ctx.reference(&src_name);
            p.eat(&Tok::LBracket)?;
            let idx = parse_operand(p, ctx)?;
            p.eat(&Tok::RBracket)?;
            let lhs = ctx.declare(lhs_name, src.typ());
            Ok(Instruction::Gep { lhs, src, idx })
        }
        "gfp" => {
            let src_name = p.ident()?;
            let src = ctx.reference(&src_name);
            p.eat(&Tok::Dot)?;
            let fname = p.ident()?;
            let field_ty = src
                .typ()
                .base_typ()
                .as_struct_id()
                .and_then(|sid| program.fields(sid).iter().find(|f| f.name == fname))
                .map(|f| f.typ.clone())
                .unwrap_or_else(int_ty);
            let field = field_id(&fname, field_ty);
            let lhs = ctx.declare(lhs_name, ptr_ty(field.typ.clone()));
            Ok(Instruction::Gfp { lhs, src, field })
        }
        "load" => {
            let src_name = p.ident()?;
            let src = ctx.reference(&src_name);
            let lhs = ctx.declare(lhs_name, src.typ().base_typ());
            Ok(Instruction::Load { lhs, src })
        }
        "cast" => {
            let op = parse_operand(p, ctx)?;
            p.eat_ident("to")?;
            let to = parse_type_with_star(p)?;
            let lhs = ctx.declare(lhs_name, to.clone());
            Ok(Instruction::Cast { lhs, op, to })
        }
        "phi" => {
            p.eat(&Tok::LBracket)?;
            let mut preds = Map::new();
            let mut any_ty = None;
            while p.peek() != &Tok::RBracket {
                let bb = bb_id(&p.ident()?);
                p.eat(&Tok::Colon)?;
                let op = parse_operand(p, ctx)?;
                any_ty.get_or_insert_with(|| op.typ());
                preds.insert(bb, op);
                if p.peek() == &Tok::Comma {
                    p.advance();
                }
            }
            p.eat(&Tok::RBracket)?;
            let lhs = ctx.declare(lhs_name, any_ty.unwrap_or_else(int_ty));
            Ok(Instruction::Phi { lhs, preds })
        }
        other => err(format!("unknown instruction mnemonic '{other}'")),
    }
}

/// Global references are parsed with a placeholder type (the parser may not
/// yet have seen the global's declaration).  Walk the finished program once
/// and rewrite every global `VarId` to the canonical, correctly-typed one.
fn resolve_global_refs(program: &mut Program) {
    let canon: Map<String, VarId> = program
        .globals
        .keys()
        .map(|v| (v.name().to_owned(), v.clone()))
        .collect();

    let fix = |v: &VarId| -> VarId {
        if v.is_global() {
            canon.get(v.name()).cloned().unwrap_or_else(|| v.clone())
        } else {
            v.clone()
        }
    };
    let fix_op = |op: &Operand| -> Operand {
        match op {
            Operand::Var(v) => Operand::Var(fix(v)),
            Operand::CInt(n) => Operand::CInt(*n),
        }
    };
    fn fix_init(init: &ConstInit, fix: &impl Fn(&VarId) -> VarId) -> ConstInit {
        match init {
            ConstInit::GlobalRef(v) => ConstInit::GlobalRef(fix(v)),
            ConstInit::Struct(fs) => ConstInit::Struct(fs.iter().map(|i| fix_init(i, fix)).collect()),
            other => other.clone(),
        }
    }

    for g in program.globals.values_mut() {
        g.init = fix_init(&g.init, &fix);
    }

    for f in program.functions.values_mut() {
        let Some(body) = &mut f.body else { continue };
        for bb in body.values_mut() {
            for inst in &mut bb.insts {
                *inst = match inst.clone() {
                    Instruction::AddrOf { lhs, op } => Instruction::AddrOf { lhs, op: fix_op(&op) },
                    Instruction::Store { dst, op } => Instruction::Store { dst, op: fix_op(&op) },
                    Instruction::Copy { lhs, op } => Instruction::Copy { lhs, op: fix_op(&op) },
                    Instruction::Cast { lhs, op, to } => Instruction::Cast { lhs, op: fix_op(&op), to },
                    Instruction::Arith { lhs, aop, op1, op2 } => Instruction::Arith {
                        lhs,
                        aop,
                        op1: fix_op(&op1),
                        op2: fix_op(&op2),
                    },
                    Instruction::Cmp { lhs, rop, op1, op2 } => Instruction::Cmp {
                        lhs,
                        rop,
                        op1: fix_op(&op1),
                        op2: fix_op(&op2),
                    },
                    Instruction::CallExt { lhs, ext_callee, args } => Instruction::CallExt {
                        lhs,
                        ext_callee,
                        args: args.iter().map(fix_op).collect(),
                    },
                    other => other,
                };
            }
            bb.term = match bb.term.clone() {
                Terminal::CallDirect { lhs, callee, args, next_bb } => Terminal::CallDirect {
                    lhs,
                    callee,
                    args: args.iter().map(fix_op).collect(),
                    next_bb,
                },
                Terminal::CallIndirect { lhs, callee, args, next_bb } => Terminal::CallIndirect {
                    lhs,
                    callee: fix(&callee),
                    args: args.iter().map(fix_op).collect(),
                    next_bb,
                },
                Terminal::Branch { cond, tt, ff } => Terminal::Branch { cond: fix_op(&cond), tt, ff },
                Terminal::Ret(op) => Terminal::Ret(op.as_ref().map(fix_op)),
                other => other,
            };
        }
    }
}
