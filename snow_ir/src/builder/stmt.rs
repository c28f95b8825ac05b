//! Statement lowering (spec §4.3): declarations, assignment,
//! if/else, the C-style `loop` (init; condition; step) form, break/continue,
//! and return.

use super::Builder;
use crate::instr::{width_of, widen_numeric, CompareOp, Instruction, Width};
use crate::value::{Label, Operand};
use snow_ast::{BinaryOp, Block, Expr, ExprKind, Stmt, StmtKind};
use snow_semantic::{struct_derives_from, ProgramTables, Type};

impl<'a> Builder<'a> {
    pub fn build_block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.build_stmt(stmt);
        }
    }

    pub fn build_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declaration { name, ty, is_const: _, initializer } => {
                let declared_ty = ty.as_ref().map(Type::from_type_expr);
                if let Some(init) = initializer {
                    let (op, inferred_ty) = self.build_expr(init);
                    let final_ty = match &declared_ty {
                        Some(declared) => narrow_declared_type(declared, &inferred_ty, self.tables),
                        None => inferred_ty,
                    };
                    let dest = self.fresh_register(final_ty.clone());
                    self.load_into(dest, op, &final_ty);
                    self.scope.declare(name.value.clone(), dest, final_ty);
                    if let Some(c) = fold_const(self, init) {
                        self.scope.set_const_value(&name.value, c);
                    }
                } else {
                    let ty = declared_ty.unwrap_or(Type::Any);
                    let dest = self.fresh_register(ty.clone());
                    self.scope.declare(name.value.clone(), dest, ty);
                }
            }
            StmtKind::Assignment { target, value } => {
                let (op, ty) = self.build_expr(value);
                if let Some(dest) = self.scope.lookup_register(&target.value) {
                    self.load_into(dest, op, &ty);
                    self.scope.clear_const_value(&target.value);
                } else if let Some((this_reg, struct_name)) = self.scope.this() {
                    let struct_name = struct_name.to_string();
                    if let Some(layout) = self.tables.struct_layout(&struct_name) {
                        if let Some(slot) = layout.slot_of(&target.value) {
                            self.emit(Instruction::StoreField {
                                object: Operand::Register(this_reg),
                                struct_name,
                                slot,
                                value: op,
                            });
                        }
                    }
                } else {
                    let dest = self.fresh_register(ty.clone());
                    self.load_into(dest, op, &ty);
                    self.scope.declare(target.value.clone(), dest, ty);
                }
            }
            StmtKind::IndexAssignment { target, index, value } => {
                let (array_op, _) = self.build_expr(target);
                let (index_op, _) = self.build_expr(index);
                let (value_op, _) = self.build_expr(value);
                self.emit(Instruction::StoreIndex { array: array_op, index: index_op, value: value_op });
            }
            StmtKind::ExprStmt(expr) => {
                self.build_expr(expr);
            }
            StmtKind::Return(expr) => {
                let value = expr.as_ref().map(|e| self.build_expr(e).0);
                self.emit(Instruction::Return(value));
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.build_if(condition, then_branch, else_branch.as_ref());
            }
            StmtKind::Loop { init, condition, step, body } => {
                self.build_loop(init.as_deref(), condition, step.as_deref(), body);
            }
            StmtKind::Break => {
                if let Some((_, break_label)) = self.current_loop_labels() {
                    self.emit(Instruction::Jump(break_label));
                } else {
                    self.diagnostics.error("'break' used outside a loop", stmt.span);
                }
            }
            StmtKind::Continue => {
                if let Some((continue_label, _)) = self.current_loop_labels() {
                    self.emit(Instruction::Jump(continue_label));
                } else {
                    self.diagnostics.error("'continue' used outside a loop", stmt.span);
                }
            }
        }
    }

    /// Writes `value` into `dest`, using `LoadConst` for a constant operand
    /// or the `Move`-as-`ADD`-zero pseudo-instruction for a register one
    /// (spec §3), so declarations/assignments always end up owning their
    /// own register rather than aliasing someone else's.
    fn load_into(&mut self, dest: crate::value::Register, value: Operand, ty: &Type) {
        match value {
            Operand::Const(c) => self.emit(Instruction::LoadConst { dest, value: c }),
            Operand::Register(src) => {
                self.emit(Instruction::Move { dest, src, width: width_of(ty) });
            }
        }
    }

    fn build_if(&mut self, condition: &Expr, then_branch: &Block, else_branch: Option<&Block>) {
        let else_label = self.fresh_label();
        self.jump_if_false(condition, else_label);
        self.build_block(then_branch);
        if let Some(else_branch) = else_branch {
            let end_label = self.fresh_label();
            self.emit(Instruction::Jump(end_label));
            self.emit(Instruction::Label(else_label));
            self.build_block(else_branch);
            self.emit(Instruction::Label(end_label));
        } else {
            self.emit(Instruction::Label(else_label));
        }
    }

    fn build_loop(&mut self, init: Option<&Stmt>, condition: &Expr, step: Option<&Stmt>, body: &Block) {
        if let Some(init) = init {
            self.build_stmt(init);
        }
        let top_label = self.fresh_label();
        let step_label = self.fresh_label();
        let end_label = self.fresh_label();
        self.emit(Instruction::Label(top_label));
        self.jump_if_false(condition, end_label);
        self.push_loop_labels(step_label, end_label);
        self.build_block(body);
        self.pop_loop_labels();
        self.emit(Instruction::Label(step_label));
        if let Some(step) = step {
            self.build_stmt(step);
        }
        self.emit(Instruction::Jump(top_label));
        self.emit(Instruction::Label(end_label));
    }

    /// Conditional-jump inversion contract (spec §4.3): when `cond` is
    /// itself a comparison, emit the *inverted* comparison directly rather
    /// than computing the true comparison and negating it, so the jump
    /// fires exactly when the original condition is false.
    fn jump_if_false(&mut self, cond: &Expr, target: Label) {
        if let ExprKind::Binary { op, left, right } = &*cond.kind {
            if let Some(cmp) = compare_op(*op) {
                let (left_op, left_ty) = self.build_expr(left);
                let (right_op, right_ty) = self.build_expr(right);
                let width = width_of(&widen_numeric(&left_ty, &right_ty));
                let dest = self.fresh_register(Type::bool());
                self.emit(Instruction::Compare { op: cmp.invert(), width, dest, left: left_op, right: right_op });
                self.emit(Instruction::JumpIfTrue { label: target, condition: Operand::Register(dest) });
                return;
            }
        }
        let (cond_op, _) = self.build_expr(cond);
        let cond_reg = self.materialize(cond_op, Type::bool());
        let not_reg = self.fresh_register(Type::bool());
        self.emit(Instruction::Unary {
            op: crate::instr::UnaryIrOp::Not,
            width: Width::Int,
            dest: not_reg,
            operand: Operand::Register(cond_reg),
        });
        self.emit(Instruction::JumpIfTrue { label: target, condition: Operand::Register(not_reg) });
    }
}

fn compare_op(op: BinaryOp) -> Option<CompareOp> {
    match op {
        BinaryOp::Eq => Some(CompareOp::Eq),
        BinaryOp::Ne => Some(CompareOp::Ne),
        BinaryOp::Lt => Some(CompareOp::Lt),
        BinaryOp::Le => Some(CompareOp::Le),
        BinaryOp::Gt => Some(CompareOp::Gt),
        BinaryOp::Ge => Some(CompareOp::Ge),
        _ => None,
    }
}

/// Mirrors the semantic checker's declaration-narrowing rule (spec §4.2):
/// `Base x = new Sub(...)` registers `x`'s register under `Sub`, not
/// `Base`, so a later `x.say()` dispatches against the narrower type.
fn narrow_declared_type(declared: &Type, inferred: &Type, tables: &ProgramTables) -> Type {
    if let (Type::Struct(base), Type::Struct(sub)) = (declared, inferred) {
        if base != sub && struct_derives_from(tables, sub, base) {
            return inferred.clone();
        }
    }
    declared.clone()
}

/// Best-effort re-fold of a declaration initializer for the scope's
/// constant-propagation slot (spec §4.2): only pure module-level folding
/// applies here since locals folded through `Scope::get_const_value`
/// already short-circuited inside `build_expr`.
fn fold_const(builder: &Builder<'_>, expr: &Expr) -> Option<snow_semantic::ConstValue> {
    snow_semantic::fold_expr(expr, builder.tables, &builder.module_name)
}
