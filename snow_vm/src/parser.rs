//! Loads a `.water` text program (spec §4.8 "loaded as a text file of one
//! instruction per line") into a name-indexed table of functions ready for
//! dispatch.

use crate::instr::{parse_instruction, tokenize, Instr};
use hashbrown::HashMap;
use snow_common::{SnowError, SnowResult};

#[derive(Debug, Clone)]
pub struct FunctionCode {
    pub name: String,
    pub param_count: u32,
    pub instructions: Vec<Instr>,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: HashMap<String, FunctionCode>,
    /// Declaration order, since `main`/`*.main` entry normalization already
    /// happened upstream in `snow_ir`; the VM just runs functions[0].
    pub order: Vec<String>,
}

impl Program {
    pub fn entry(&self) -> SnowResult<&FunctionCode> {
        let name = self.order.first().ok_or_else(|| SnowError::runtime_error("program has no functions"))?;
        Ok(&self.functions[name])
    }
}

/// One `FUNC` block worth of raw (non-blank, non-comment) lines, split
/// before opcode parsing so labels can be pre-scanned.
struct RawFunction {
    name: String,
    param_count: u32,
    lines: Vec<Vec<String>>,
}

pub fn parse_program(source: &str) -> SnowResult<Program> {
    let mut raw_functions = Vec::new();
    let mut current: Option<RawFunction> = None;

    for (lineno, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens = tokenize(line).map_err(|e| annotate(e, lineno))?;
        if tokens.is_empty() {
            continue;
        }
        if tokens[0] == "FUNC" {
            if let Some(f) = current.take() {
                raw_functions.push(f);
            }
            let name = tokens
                .get(1)
                .and_then(|t| t.strip_prefix('"'))
                .ok_or_else(|| SnowError::build_error(format!("line {}: FUNC missing a quoted name", lineno + 1)))?
                .to_string();
            let param_count = tokens
                .get(2)
                .and_then(|t| t.parse::<u32>().ok())
                .ok_or_else(|| SnowError::build_error(format!("line {}: FUNC missing a param count", lineno + 1)))?;
            current = Some(RawFunction { name, param_count, lines: Vec::new() });
            continue;
        }
        let f = current.as_mut().ok_or_else(|| SnowError::build_error(format!("line {}: instruction outside any FUNC block", lineno + 1)))?;
        f.lines.push(tokens);
    }
    if let Some(f) = current.take() {
        raw_functions.push(f);
    }

    let mut functions = HashMap::new();
    let mut order = Vec::new();
    for raw in raw_functions {
        let code = build_function(raw)?;
        order.push(code.name.clone());
        functions.insert(code.name.clone(), code);
    }
    Ok(Program { functions, order })
}

fn annotate(e: SnowError, lineno: usize) -> SnowError {
    SnowError::build_error(format!("line {}: {}", lineno + 1, e))
}

fn build_function(raw: RawFunction) -> SnowResult<FunctionCode> {
    // Pre-scan label positions: a LABEL line defines a target pointing at
    // the next instruction emitted, not at itself (LABEL never becomes an
    // Instr), so track how many real instructions precede each LABEL line.
    let mut labels: HashMap<u32, usize> = HashMap::new();
    let mut instr_count = 0usize;
    for tokens in &raw.lines {
        if tokens[0] == "LABEL" {
            let n: u32 = tokens[1]
                .strip_prefix('L')
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| SnowError::build_error("bad LABEL operand"))?;
            labels.insert(n, instr_count);
        } else {
            instr_count += 1;
        }
    }

    let mut instructions = Vec::with_capacity(instr_count);
    for tokens in &raw.lines {
        if tokens[0] == "LABEL" {
            continue;
        }
        let instr = parse_instruction(tokens, |n| {
            labels.get(&n).copied().ok_or_else(|| SnowError::build_error(format!("undefined label L{}", n)))
        })?;
        instructions.push(instr);
    }
    Ok(FunctionCode { name: raw.name, param_count: raw.param_count, instructions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_function_with_a_backward_jump() {
        let src = "FUNC \"Math.loop\" 1\nLABEL L0\nLOAD_CONST 1 1\nJUMP L0\nRET\n";
        let program = parse_program(src).unwrap();
        let f = &program.functions["Math.loop"];
        assert_eq!(f.param_count, 1);
        assert_eq!(f.instructions.len(), 3);
        match &f.instructions[1] {
            Instr::Jump { target } => assert_eq!(*target, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ignores_blank_and_comment_lines() {
        let src = "FUNC \"Math.main\" 0\n# a comment\n\nRET\n";
        let program = parse_program(src).unwrap();
        assert_eq!(program.functions["Math.main"].instructions.len(), 1);
    }
}
