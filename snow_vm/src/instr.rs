//! Textual `.water` line → decoded instruction (spec §4.8, §6 grammar).
//!
//! Width is read off the opcode mnemonic and resolved once here rather than
//! carried as a separate field everywhere: arithmetic/move/negate read the
//! two-letter code (`I8/I16/I32/I64/F32/F64`) `snow_backend::emitter` emits,
//! comparisons read the single-letter code (`B/S/I/L/F/D/R`) it emits for
//! `CMP_*`.

use snow_common::{SnowError, SnowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumWidth {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl NumWidth {
    fn parse(code: &str) -> Option<NumWidth> {
        Some(match code {
            "I8" => NumWidth::I8,
            "I16" => NumWidth::I16,
            "I32" => NumWidth::I32,
            "I64" => NumWidth::I64,
            "F32" => NumWidth::F32,
            "F64" => NumWidth::F64,
            _ => return None,
        })
    }

    pub fn is_float(self) -> bool {
        matches!(self, NumWidth::F32 | NumWidth::F64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpWidth {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference,
}

impl CmpWidth {
    fn parse(c: char) -> Option<CmpWidth> {
        Some(match c {
            'B' => CmpWidth::Byte,
            'S' => CmpWidth::Short,
            'I' => CmpWidth::Int,
            'L' => CmpWidth::Long,
            'F' => CmpWidth::Float,
            'D' => CmpWidth::Double,
            'R' => CmpWidth::Reference,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn parse(s: &str) -> Option<CmpOp> {
        Some(match s {
            "EQ" => CmpOp::Eq,
            "NE" => CmpOp::Ne,
            "LT" => CmpOp::Lt,
            "LE" => CmpOp::Le,
            "GT" => CmpOp::Gt,
            "GE" => CmpOp::Ge,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
}

/// A parsed `.water` line, slots already resolved to `u32` indices and
/// jump targets already resolved to instruction indices within the owning
/// function (labels themselves never become instructions — see
/// [`crate::parser`]).
#[derive(Debug, Clone)]
pub enum Instr {
    LoadConst { dest: u32, value: ConstLit },
    Arith { kind: ArithKind, width: NumWidth, dest: u32, left: u32, right: u32 },
    Neg { width: NumWidth, dest: u32, operand: u32 },
    RefAdd { dest: u32, left: u32, right: u32 },
    Bitwise { op: BitKind, dest: u32, left: u32, right: u32 },
    Cmp { width: CmpWidth, op: CmpOp, dest: u32, left: u32, right: u32 },
    CmpJump { width: CmpWidth, op: CmpOp, left: u32, right: u32, target: usize },
    Jump { target: usize },
    Call { target: String, argc: u32 },
    Push { slot: u32 },
    Pop { slot: u32 },
    Syscall { argc: u32 },
    Ret,
    RetV { slot: u32 },
    NewArray { dest: u32, count: u32 },
    NewStruct { dest: u32, name: String, field_count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitKind {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstLit {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Splits one line into whitespace-separated tokens, treating a `"..."`
/// run (with the emitter's `\n \r \t \" \\` escapes) as a single token.
pub fn tokenize(line: &str) -> SnowResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut s = String::new();
            loop {
                match chars.next() {
                    None => return Err(SnowError::build_error("unterminated quoted operand")),
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('r') => s.push('\r'),
                        Some('t') => s.push('\t'),
                        Some('"') => s.push('"'),
                        Some('\\') => s.push('\\'),
                        Some(other) => s.push(other),
                        None => return Err(SnowError::build_error("unterminated escape in quoted operand")),
                    },
                    Some(other) => s.push(other),
                }
            }
            tokens.push(format!("\"{}", s));
            continue;
        }
        let mut tok = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            tok.push(c);
            chars.next();
        }
        tokens.push(tok);
    }
    Ok(tokens)
}

fn parse_slot(tok: &str) -> SnowResult<u32> {
    tok.parse::<u32>().map_err(|_| SnowError::build_error(format!("expected a slot index, got `{}`", tok)))
}

fn parse_label(tok: &str) -> SnowResult<u32> {
    tok.strip_prefix('L')
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| SnowError::build_error(format!("expected a label L<n>, got `{}`", tok)))
}

fn unquote(tok: &str) -> SnowResult<String> {
    tok.strip_prefix('"').map(str::to_string).ok_or_else(|| SnowError::build_error(format!("expected a quoted string, got `{}`", tok)))
}

fn parse_const(tok: &str) -> ConstLit {
    if let Some(s) = tok.strip_prefix('"') {
        return ConstLit::Str(s.to_string());
    }
    if tok.contains('.') || tok.contains('e') || tok.contains('E') {
        if let Ok(f) = tok.parse::<f64>() {
            return ConstLit::Float(f);
        }
    }
    if let Ok(i) = tok.parse::<i64>() {
        return ConstLit::Int(i);
    }
    tok.parse::<f64>().map(ConstLit::Float).unwrap_or_else(|_| ConstLit::Str(tok.to_string()))
}

/// Parses one non-`FUNC`, non-`LABEL` line, given `resolve_label` to turn an
/// `L<n>` target into an instruction index (labels were pre-scanned by the
/// caller across the whole function body first).
pub fn parse_instruction(tokens: &[String], resolve_label: impl Fn(u32) -> SnowResult<usize>) -> SnowResult<Instr> {
    let op = tokens.first().map(String::as_str).unwrap_or("");
    let args = &tokens[1.min(tokens.len())..];

    let arith = |kind: ArithKind, width: NumWidth| -> SnowResult<Instr> {
        Ok(Instr::Arith { kind, width, dest: parse_slot(&args[0])?, left: parse_slot(&args[1])?, right: parse_slot(&args[2])? })
    };

    if let Some(rest) = op.strip_prefix("ADD_").filter(|_| op != "ADD_R") {
        if let Some(w) = NumWidth::parse(rest) {
            return arith(ArithKind::Add, w);
        }
    }
    if op == "ADD_R" {
        return Ok(Instr::RefAdd { dest: parse_slot(&args[0])?, left: parse_slot(&args[1])?, right: parse_slot(&args[2])? });
    }
    if let Some(rest) = op.strip_prefix("SUB_") {
        if let Some(w) = NumWidth::parse(rest) {
            return arith(ArithKind::Sub, w);
        }
    }
    if let Some(rest) = op.strip_prefix("MUL_") {
        if let Some(w) = NumWidth::parse(rest) {
            return arith(ArithKind::Mul, w);
        }
    }
    if let Some(rest) = op.strip_prefix("DIV_") {
        if let Some(w) = NumWidth::parse(rest) {
            return arith(ArithKind::Div, w);
        }
    }
    if let Some(rest) = op.strip_prefix("MOD_") {
        if let Some(w) = NumWidth::parse(rest) {
            return arith(ArithKind::Mod, w);
        }
    }
    if let Some(rest) = op.strip_prefix("NEG_") {
        if let Some(w) = NumWidth::parse(rest) {
            return Ok(Instr::Neg { width: w, dest: parse_slot(&args[0])?, operand: parse_slot(&args[1])? });
        }
    }
    match op {
        "AND" => return Ok(Instr::Bitwise { op: BitKind::And, dest: parse_slot(&args[0])?, left: parse_slot(&args[1])?, right: parse_slot(&args[2])? }),
        "OR" => return Ok(Instr::Bitwise { op: BitKind::Or, dest: parse_slot(&args[0])?, left: parse_slot(&args[1])?, right: parse_slot(&args[2])? }),
        "XOR" => return Ok(Instr::Bitwise { op: BitKind::Xor, dest: parse_slot(&args[0])?, left: parse_slot(&args[1])?, right: parse_slot(&args[2])? }),
        "LOAD_CONST" => return Ok(Instr::LoadConst { dest: parse_slot(&args[0])?, value: parse_const(&args[1]) }),
        "JUMP" => return Ok(Instr::Jump { target: resolve_label(parse_label(&args[0])?)? }),
        "CALL" => return Ok(Instr::Call { target: unquote(&args[0])?, argc: args[1].parse().map_err(|_| SnowError::build_error("bad CALL argc"))? }),
        "PUSH" => return Ok(Instr::Push { slot: parse_slot(&args[0])? }),
        "POP" => return Ok(Instr::Pop { slot: parse_slot(&args[0])? }),
        "SYSCALL" => return Ok(Instr::Syscall { argc: args[0].parse().map_err(|_| SnowError::build_error("bad SYSCALL argc"))? }),
        "RET" => return Ok(Instr::Ret),
        "RET_V" => return Ok(Instr::RetV { slot: parse_slot(&args[0])? }),
        "NEW_ARRAY" => return Ok(Instr::NewArray { dest: parse_slot(&args[0])?, count: args[1].parse().map_err(|_| SnowError::build_error("bad NEW_ARRAY count"))? }),
        "NEW_STRUCT" => {
            return Ok(Instr::NewStruct {
                dest: parse_slot(&args[0])?,
                name: unquote(&args[1])?,
                field_count: args[2].parse().map_err(|_| SnowError::build_error("bad NEW_STRUCT field count"))?,
            })
        }
        _ => {}
    }
    if let Some(rest) = op.strip_prefix("CMP_") {
        let (code, jump) = match rest.strip_suffix("_JUMP") {
            Some(code) => (code, true),
            None => (rest, false),
        };
        let mut chars = code.chars();
        let w = chars.next().and_then(CmpWidth::parse).ok_or_else(|| SnowError::build_error(format!("bad compare opcode `{}`", op)))?;
        let rest: String = chars.collect();
        let cmp_op = CmpOp::parse(&rest).ok_or_else(|| SnowError::build_error(format!("bad compare opcode `{}`", op)))?;
        return if jump {
            Ok(Instr::CmpJump { width: w, op: cmp_op, left: parse_slot(&args[0])?, right: parse_slot(&args[1])?, target: resolve_label(parse_label(&args[2])?)? })
        } else {
            Ok(Instr::Cmp { width: w, op: cmp_op, dest: parse_slot(&args[0])?, left: parse_slot(&args[1])?, right: parse_slot(&args[2])? })
        };
    }
    Err(SnowError::build_error(format!("unrecognized opcode `{}`", op)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_quoted_strings_as_one_token() {
        let toks = tokenize("CALL \"My.func\" 2").unwrap();
        assert_eq!(toks, vec!["CALL", "\"My.func", "2"]);
    }

    #[test]
    fn tokenize_unescapes_inside_quotes() {
        let toks = tokenize("LOAD_CONST 0 \"a\\nb\"").unwrap();
        assert_eq!(toks[2], "\"a\nb");
    }

    #[test]
    fn parse_cmp_jump_opcode() {
        let toks = tokenize("CMP_ILT_JUMP 0 1 L3").unwrap();
        let instr = parse_instruction(&toks, |n| Ok(n as usize)).unwrap();
        match instr {
            Instr::CmpJump { width: CmpWidth::Int, op: CmpOp::Lt, left: 0, right: 1, target: 3 } => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parse_reference_compare() {
        let toks = tokenize("CMP_REQ 2 0 1").unwrap();
        let instr = parse_instruction(&toks, |n| Ok(n as usize)).unwrap();
        assert!(matches!(instr, Instr::Cmp { width: CmpWidth::Reference, op: CmpOp::Eq, .. }));
    }
}
