//! Compile-time constant folding of expressions (spec §4.2: number/string/
//! boolean literals, array literals of constants, module-qualified constant
//! member access, and the arithmetic/unary operators applied to folded
//! operands).
//!
//! This is shared between the semantic analyzer (registering module-level
//! constants into [`ProgramTables`]) and the IR builder (folding
//! sub-expressions at lowering time), so both agree on exactly which
//! expressions are "compile-time constant".

use crate::literal::classify;
use crate::tables::ProgramTables;
use crate::value::ConstValue;
use snow_ast::{BinaryOp, Expr, ExprKind, UnaryOp};

/// Why a sub-expression that looked foldable could not actually be folded,
/// as distinct from simply not being a compile-time constant at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOutOfRange {
    pub len: usize,
    pub index: i64,
}

/// Attempt to evaluate `expr` to a constant, given the already-registered
/// global constant table (for `Module.NAME` folds) and the current module's
/// own name (so bare references resolve to `current_module.NAME` as well as
/// explicit `Module.NAME`).
///
/// Collapses an out-of-range constant-array index (see
/// [`fold_expr_checked`]) into `None`, i.e. "not foldable" — callers that
/// must raise spec §4.2's fold-time bounds-check error instead of silently
/// deferring to a runtime load should call [`fold_expr_checked`] directly.
pub fn fold_expr(expr: &Expr, tables: &ProgramTables, current_module: &str) -> Option<ConstValue> {
    fold_expr_checked(expr, tables, current_module).ok().flatten()
}

/// Like [`fold_expr`], but surfaces a definite out-of-range array-index
/// fold as `Err` rather than conflating it with "not a compile-time
/// constant" (spec §4.2: "Bounds checking at fold time raises a
/// compilation failure").
pub fn fold_expr_checked(
    expr: &Expr,
    tables: &ProgramTables,
    current_module: &str,
) -> Result<Option<ConstValue>, IndexOutOfRange> {
    match &*expr.kind {
        ExprKind::NumberLiteral(text) => Ok(Some(classify(text).to_const_value())),
        ExprKind::StringLiteral(s) => Ok(Some(ConstValue::Str(s.clone()))),
        ExprKind::BooleanLiteral(b) => Ok(Some(ConstValue::Bool(*b))),
        ExprKind::ArrayLiteral(items) => {
            let mut folded = Vec::with_capacity(items.len());
            for item in items {
                match fold_expr_checked(item, tables, current_module)? {
                    Some(v) => folded.push(v),
                    None => return Ok(None),
                }
            }
            Ok(Some(ConstValue::List(folded)))
        }
        ExprKind::Member { object, member } => {
            if let ExprKind::Identifier(module_name) = &*object.kind {
                if let Some(v) = tables.get_const(&format!("{}.{}", module_name, member.value)) {
                    return Ok(Some(v.clone()));
                }
                if let Some(v) = tables.get_const(&format!("{}.{}", current_module, member.value)) {
                    return Ok(Some(v.clone()));
                }
            }
            Ok(None)
        }
        ExprKind::Unary { op: UnaryOp::Neg, operand } => {
            match fold_expr_checked(operand, tables, current_module)? {
                Some(v) => Ok(negate(&v)),
                None => Ok(None),
            }
        }
        ExprKind::Unary { op: UnaryOp::Not, operand } => {
            match fold_expr_checked(operand, tables, current_module)? {
                Some(v) => Ok(v.as_bool().map(|b| ConstValue::Bool(!b))),
                None => Ok(None),
            }
        }
        ExprKind::Binary { op, left, right } => {
            let l = match fold_expr_checked(left, tables, current_module)? {
                Some(v) => v,
                None => return Ok(None),
            };
            let r = match fold_expr_checked(right, tables, current_module)? {
                Some(v) => v,
                None => return Ok(None),
            };
            Ok(fold_binary(*op, &l, &r))
        }
        ExprKind::Index { array, index } => {
            let arr = fold_expr_checked(array, tables, current_module)?;
            let idx = fold_expr_checked(index, tables, current_module)?;
            match (arr, idx.and_then(|v| v.as_i64())) {
                (Some(ConstValue::List(items)), Some(idx)) => {
                    if idx >= 0 && (idx as usize) < items.len() {
                        Ok(Some(items[idx as usize].clone()))
                    } else {
                        Err(IndexOutOfRange { len: items.len(), index: idx })
                    }
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

fn negate(v: &ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Byte(x) => Some(ConstValue::Byte(-x)),
        ConstValue::Short(x) => Some(ConstValue::Short(-x)),
        ConstValue::Int(x) => Some(ConstValue::Int(-x)),
        ConstValue::Long(x) => Some(ConstValue::Long(-x)),
        ConstValue::Float(x) => Some(ConstValue::Float(-x)),
        ConstValue::Double(x) => Some(ConstValue::Double(-x)),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, l: &ConstValue, r: &ConstValue) -> Option<ConstValue> {
    if op == BinaryOp::Add && (l.is_string() || r.is_string()) {
        return Some(ConstValue::Str(format!("{}{}", l.display(), r.display())));
    }
    let is_float = matches!(l, ConstValue::Float(_) | ConstValue::Double(_))
        || matches!(r, ConstValue::Float(_) | ConstValue::Double(_));

    if is_float {
        let lf = l.as_f64()?;
        let rf = r.as_f64()?;
        let as_double = matches!(l, ConstValue::Double(_)) || matches!(r, ConstValue::Double(_));
        let result = match op {
            BinaryOp::Add => lf + rf,
            BinaryOp::Sub => lf - rf,
            BinaryOp::Mul => lf * rf,
            BinaryOp::Div => lf / rf,
            BinaryOp::Mod => lf % rf,
            BinaryOp::Eq => return Some(ConstValue::Bool(lf == rf)),
            BinaryOp::Ne => return Some(ConstValue::Bool(lf != rf)),
            BinaryOp::Lt => return Some(ConstValue::Bool(lf < rf)),
            BinaryOp::Le => return Some(ConstValue::Bool(lf <= rf)),
            BinaryOp::Gt => return Some(ConstValue::Bool(lf > rf)),
            BinaryOp::Ge => return Some(ConstValue::Bool(lf >= rf)),
            _ => return None,
        };
        return Some(if as_double { ConstValue::Double(result) } else { ConstValue::Float(result as f32) });
    }

    if let (ConstValue::Bool(lb), ConstValue::Bool(rb)) = (l, r) {
        return match op {
            BinaryOp::And => Some(ConstValue::Bool(*lb && *rb)),
            BinaryOp::Or => Some(ConstValue::Bool(*lb || *rb)),
            BinaryOp::Eq => Some(ConstValue::Bool(lb == rb)),
            BinaryOp::Ne => Some(ConstValue::Bool(lb != rb)),
            _ => None,
        };
    }

    let li = l.as_i64()?;
    let ri = r.as_i64()?;
    let as_long = matches!(l, ConstValue::Long(_)) || matches!(r, ConstValue::Long(_));
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            if (op == BinaryOp::Div || op == BinaryOp::Mod) && ri == 0 {
                return None;
            }
            let result = match op {
                BinaryOp::Add => li + ri,
                BinaryOp::Sub => li - ri,
                BinaryOp::Mul => li * ri,
                BinaryOp::Div => li / ri,
                BinaryOp::Mod => li % ri,
                _ => unreachable!(),
            };
            Some(if as_long { ConstValue::Long(result) } else { ConstValue::Int(result as i32) })
        }
        BinaryOp::BitAnd => Some(ConstValue::Int((li & ri) as i32)),
        BinaryOp::BitOr => Some(ConstValue::Int((li | ri) as i32)),
        BinaryOp::BitXor => Some(ConstValue::Int((li ^ ri) as i32)),
        BinaryOp::Eq => Some(ConstValue::Bool(li == ri)),
        BinaryOp::Ne => Some(ConstValue::Bool(li != ri)),
        BinaryOp::Lt => Some(ConstValue::Bool(li < ri)),
        BinaryOp::Le => Some(ConstValue::Bool(li <= ri)),
        BinaryOp::Gt => Some(ConstValue::Bool(li > ri)),
        BinaryOp::Ge => Some(ConstValue::Bool(li >= ri)),
        _ => None,
    }
}
