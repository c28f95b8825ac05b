//! Expression lowering + constant folding (spec §4.2).
//!
//! Every expression lowers to an [`Operand`] plus its [`Type`] — returning
//! the type alongside the value (rather than a separate re-inference pass
//! over already-checked AST) is what lets call/binary/member/index lowering
//! pick opcode widths and struct-field slots without duplicating the
//! semantic analyzer's `infer_expr`.

use super::Builder;
use crate::instr::{width_of, widen_numeric, ArithOp, BitOp, CompareOp, Instruction, UnaryIrOp, Width};
use crate::value::{Operand, Register};
use snow_ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use snow_semantic::{
    apply_default_suffix, classify, ctor_name, fold_expr, fold_expr_checked, method_name, ConstValue, IndexOutOfRange,
    PrimitiveType, Type,
};

impl<'a> Builder<'a> {
    /// Turn any `Operand` into a concrete register, loading constants on
    /// demand. Needed whenever an instruction's destination-producing
    /// shape (e.g. `Move`) requires a register source rather than an
    /// arbitrary operand.
    pub(crate) fn materialize(&mut self, operand: Operand, ty: Type) -> Register {
        match operand {
            Operand::Register(r) => r,
            Operand::Const(c) => {
                let dest = self.fresh_register(ty);
                self.emit(Instruction::LoadConst { dest, value: c });
                dest
            }
        }
    }

    pub fn build_expr(&mut self, expr: &Expr) -> (Operand, Type) {
        match &*expr.kind {
            ExprKind::NumberLiteral(text) => {
                let class = apply_default_suffix(classify(text), self.default_suffix);
                (Operand::Const(class.to_const_value()), class.inferred_type())
            }
            ExprKind::StringLiteral(s) => (Operand::Const(ConstValue::Str(s.clone())), Type::string()),
            ExprKind::BooleanLiteral(b) => (Operand::Const(ConstValue::Bool(*b)), Type::bool()),
            ExprKind::ArrayLiteral(items) => self.build_array_literal(items),
            ExprKind::Identifier(name) => self.build_identifier(name),
            ExprKind::Member { object, member } => self.build_member(expr, object, &member.value),
            ExprKind::Index { array, index } => self.build_index(expr, array, index),
            ExprKind::Call { callee, args } => self.build_call(callee, args),
            ExprKind::New { type_name, args } => self.build_new(&type_name.value, args),
            ExprKind::Unary { op, operand } => self.build_unary(expr, *op, operand),
            ExprKind::Binary { op, left, right } => self.build_binary(expr, *op, left, right),
        }
    }

    fn build_array_literal(&mut self, items: &[Expr]) -> (Operand, Type) {
        if items.is_empty() {
            return (Operand::Const(ConstValue::List(vec![])), Type::Array(Box::new(Type::int())));
        }
        if let Some(all_const) = items
            .iter()
            .map(|i| fold_expr(i, self.tables, &self.module_name))
            .collect::<Option<Vec<_>>>()
        {
            let ty = all_const[0].type_of();
            return (Operand::Const(ConstValue::List(all_const)), Type::Array(Box::new(ty)));
        }
        let mut elements = Vec::with_capacity(items.len());
        let mut elem_ty = Type::Any;
        for item in items {
            let (op, ty) = self.build_expr(item);
            elem_ty = ty;
            elements.push(op);
        }
        let array_ty = Type::Array(Box::new(elem_ty));
        let dest = self.fresh_register(array_ty.clone());
        self.emit(Instruction::NewArray { dest, elements });
        (Operand::Register(dest), array_ty)
    }

    fn build_identifier(&mut self, name: &str) -> (Operand, Type) {
        if let Some(c) = self.scope.get_const_value(name) {
            return (Operand::Const(c.clone()), c.type_of());
        }
        if let Some(binding) = self.scope.lookup(name) {
            return (Operand::Register(binding.register), binding.ty.clone());
        }
        if let Some((this_reg, struct_name)) = self.scope.this() {
            let struct_name = struct_name.to_string();
            if let Some(layout) = self.tables.struct_layout(&struct_name) {
                if let Some(slot) = layout.slot_of(name) {
                    let field_ty = layout.field_types[slot].clone();
                    let dest = self.fresh_register(field_ty.clone());
                    self.emit(Instruction::LoadField {
                        dest,
                        object: Operand::Register(this_reg),
                        struct_name,
                        slot,
                    });
                    return (Operand::Register(dest), field_ty);
                }
            }
        }
        if let Some(c) = self.tables.get_const(&format!("{}.{}", self.module_name, name)) {
            return (Operand::Const(c.clone()), c.type_of());
        }
        // The semantic pass rejects undefined identifiers before this
        // builder ever runs; this is unreachable on a checked program but
        // kept total rather than panicking on a malformed one.
        (Operand::Const(ConstValue::Null), Type::Any)
    }

    fn build_member(&mut self, expr: &Expr, object: &Expr, member: &str) -> (Operand, Type) {
        if let Some(folded) = fold_expr(expr, self.tables, &self.module_name) {
            let ty = folded.type_of();
            return (Operand::Const(folded), ty);
        }
        let (object_op, object_ty) = self.build_expr(object);
        if let Type::Struct(struct_name) = object_ty {
            if let Some(layout) = self.tables.struct_layout(&struct_name) {
                if let Some(slot) = layout.slot_of(member) {
                    let field_ty = layout.field_types[slot].clone();
                    let dest = self.fresh_register(field_ty.clone());
                    self.emit(Instruction::LoadField { dest, object: object_op, struct_name, slot });
                    return (Operand::Register(dest), field_ty);
                }
            }
        }
        (Operand::Const(ConstValue::Null), Type::Any)
    }

    fn build_index(&mut self, expr: &Expr, array: &Expr, index: &Expr) -> (Operand, Type) {
        match fold_expr_checked(expr, self.tables, &self.module_name) {
            Ok(Some(folded)) => {
                let ty = folded.type_of();
                return (Operand::Const(folded), ty);
            }
            Ok(None) => {}
            Err(IndexOutOfRange { len, index }) => {
                self.diagnostics.error(
                    format!("array index {} out of bounds for constant array of length {}", index, len),
                    expr.span,
                );
                return (Operand::Const(ConstValue::Null), Type::Any);
            }
        }
        let (array_op, array_ty) = self.build_expr(array);
        let (index_op, _) = self.build_expr(index);
        let elem_ty = match array_ty {
            Type::Array(elem) => *elem,
            _ => Type::Any,
        };
        let dest = self.fresh_register(elem_ty.clone());
        self.emit(Instruction::LoadIndex { dest, array: array_op, index: index_op });
        (Operand::Register(dest), elem_ty)
    }

    fn build_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr) -> (Operand, Type) {
        if let Some(folded) = fold_expr(expr, self.tables, &self.module_name) {
            let ty = folded.type_of();
            return (Operand::Const(folded), ty);
        }
        let (operand_val, ty) = self.build_expr(operand);
        match op {
            UnaryOp::Neg => {
                let width = width_of(&ty);
                let dest = self.fresh_register(ty.clone());
                self.emit(Instruction::Unary { op: UnaryIrOp::Neg, width, dest, operand: operand_val });
                (Operand::Register(dest), ty)
            }
            UnaryOp::Not => {
                let dest = self.fresh_register(Type::bool());
                self.emit(Instruction::Unary {
                    op: UnaryIrOp::Not,
                    width: Width::Int,
                    dest,
                    operand: operand_val,
                });
                (Operand::Register(dest), Type::bool())
            }
        }
    }

    fn build_binary(&mut self, expr: &Expr, op: BinaryOp, left: &Expr, right: &Expr) -> (Operand, Type) {
        if let Some(folded) = fold_expr(expr, self.tables, &self.module_name) {
            let ty = folded.type_of();
            return (Operand::Const(folded), ty);
        }
        match op {
            BinaryOp::And => self.build_short_circuit(left, right, true),
            BinaryOp::Or => self.build_short_circuit(left, right, false),
            _ => self.build_binary_strict(op, left, right),
        }
    }

    /// `stop_on_true == true` for `&&` (short-circuit when the left side is
    /// false is handled by falling through to evaluate the right side
    /// unconditionally only when needed — see below); `false` for `||`.
    fn build_short_circuit(&mut self, left: &Expr, right: &Expr, is_and: bool) -> (Operand, Type) {
        let (left_op, _) = self.build_expr(left);
        let left_reg = self.materialize(left_op, Type::bool());
        let result = self.fresh_register(Type::bool());
        self.emit(Instruction::Move { dest: result, src: left_reg, width: Width::Int });
        let end_label = self.fresh_label();

        if is_and {
            let not_left = self.fresh_register(Type::bool());
            self.emit(Instruction::Unary {
                op: UnaryIrOp::Not,
                width: Width::Int,
                dest: not_left,
                operand: Operand::Register(left_reg),
            });
            self.emit(Instruction::JumpIfTrue { label: end_label, condition: Operand::Register(not_left) });
        } else {
            self.emit(Instruction::JumpIfTrue { label: end_label, condition: Operand::Register(left_reg) });
        }

        let (right_op, _) = self.build_expr(right);
        let right_reg = self.materialize(right_op, Type::bool());
        self.emit(Instruction::Move { dest: result, src: right_reg, width: Width::Int });
        self.emit(Instruction::Label(end_label));
        (Operand::Register(result), Type::bool())
    }

    fn build_binary_strict(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> (Operand, Type) {
        let (left_op, left_ty) = self.build_expr(left);
        let (right_op, right_ty) = self.build_expr(right);

        if matches!(op, BinaryOp::Add) && (left_ty == Type::string() || right_ty == Type::string()) {
            let dest = self.fresh_register(Type::string());
            self.emit(Instruction::RefAdd { dest, left: left_op, right: right_op });
            return (Operand::Register(dest), Type::string());
        }

        let result_ty = widen_numeric(&left_ty, &right_ty);
        let width = width_of(&result_ty);

        if let Some(arith) = arith_op(op) {
            let dest = self.fresh_register(result_ty.clone());
            self.emit(Instruction::Arith { op: arith, width, dest, left: left_op, right: right_op });
            return (Operand::Register(dest), result_ty);
        }
        if let Some(bit) = bit_op(op) {
            let dest = self.fresh_register(result_ty.clone());
            self.emit(Instruction::Bitwise { op: bit, dest, left: left_op, right: right_op });
            return (Operand::Register(dest), result_ty);
        }
        if let Some(cmp) = compare_op(op) {
            let dest = self.fresh_register(Type::bool());
            self.emit(Instruction::Compare { op: cmp, width, dest, left: left_op, right: right_op });
            return (Operand::Register(dest), Type::bool());
        }
        unreachable!("every BinaryOp other than And/Or is arithmetic, bitwise, or comparison")
    }

    pub(crate) fn build_call(&mut self, callee: &Expr, args: &[Expr]) -> (Operand, Type) {
        if let ExprKind::Identifier(name) = &*callee.kind {
            if name == "syscall" && !args.is_empty() {
                let (sub_op, _) = self.build_expr(&args[0]);
                let mut rest = Vec::with_capacity(args.len() - 1);
                for a in &args[1..] {
                    rest.push(self.build_expr(a).0);
                }
                let dest = self.fresh_register(Type::Any);
                self.emit(Instruction::Syscall { dest: Some(dest), subcommand: sub_op, args: rest });
                return (Operand::Register(dest), Type::Any);
            }
        }

        let (qualified, receiver) = self.resolve_callee(callee, args.len());
        let mut lowered_args = Vec::with_capacity(args.len() + receiver.is_some() as usize);
        if let Some(receiver_op) = receiver {
            lowered_args.push(receiver_op);
        }
        for a in args {
            lowered_args.push(self.build_expr(a).0);
        }

        let return_type = self.tables.get_function(&qualified).map(|s| s.return_type.clone()).unwrap_or(Type::Any);
        if matches!(return_type, Type::Primitive(PrimitiveType::Void)) {
            self.emit(Instruction::Call { dest: None, callee: qualified, args: lowered_args });
            (Operand::Const(ConstValue::Null), Type::void())
        } else {
            let dest = self.fresh_register(return_type.clone());
            self.emit(Instruction::Call { dest: Some(dest), callee: qualified, args: lowered_args });
            (Operand::Register(dest), return_type)
        }
    }

    /// Resolves a call's target per spec §4.2: `super(...)`/`super.m(...)`,
    /// `recv.m(...)` by the receiver's static type, a plain `Module.fn`
    /// reference, or a bare identifier resolved against the current
    /// module. Returns the qualified callee name and, for method/
    /// constructor dispatch, the already-lowered receiver operand to
    /// prepend as argument 0 (`this`).
    fn resolve_callee(&mut self, callee: &Expr, arg_count: usize) -> (String, Option<Operand>) {
        match &*callee.kind {
            ExprKind::Identifier(name) => {
                if let Some((this_reg, struct_name)) = self.scope.this() {
                    let qualified_self_call = format!("{}.{}", self.module_name, name);
                    if self.tables.get_function(&qualified_self_call).is_none() {
                        let struct_name = struct_name.to_string();
                        let method_qualified = method_name(&struct_name, name, arg_count);
                        if self.tables.get_function(&method_qualified).is_some() {
                            return (method_qualified, Some(Operand::Register(this_reg)));
                        }
                    }
                }
                (format!("{}.{}", self.module_name, name), None)
            }
            ExprKind::Member { object, member } => {
                if let ExprKind::Identifier(recv_name) = &*object.kind {
                    if recv_name == "super" {
                        if let Some((this_reg, struct_name)) = self.scope.this() {
                            if let Some(parent) = self.tables.parent_of(struct_name).cloned() {
                                return (method_name(&parent, &member.value, arg_count), Some(Operand::Register(this_reg)));
                            }
                        }
                        return (format!("<unknown-parent>.{}", member.value), None);
                    }
                    if let Some(binding) = self.scope.lookup(recv_name) {
                        if let Type::Struct(struct_name) = binding.ty.clone() {
                            let receiver = Operand::Register(binding.register);
                            return (method_name(&struct_name, &member.value, arg_count), Some(receiver));
                        }
                    }
                    if self.scope.lookup(recv_name).is_none() {
                        return (format!("{}.{}", recv_name, member.value), None);
                    }
                }
                let (object_op, object_ty) = self.build_expr(object);
                if let Type::Struct(struct_name) = object_ty {
                    return (method_name(&struct_name, &member.value, arg_count), Some(object_op));
                }
                (member.value.clone(), None)
            }
            _ => ("<non-callable>".to_string(), None),
        }
    }

    fn build_new(&mut self, type_name: &str, args: &[Expr]) -> (Operand, Type) {
        let ctor = ctor_name(type_name, args.len());
        let lowered_args: Vec<Operand> = args.iter().map(|a| self.build_expr(a).0).collect();
        let dest = self.fresh_register(Type::Struct(type_name.to_string()));
        self.emit(Instruction::NewStruct {
            dest,
            struct_name: type_name.to_string(),
            ctor,
            args: lowered_args,
        });
        (Operand::Register(dest), Type::Struct(type_name.to_string()))
    }
}

fn arith_op(op: BinaryOp) -> Option<ArithOp> {
    match op {
        BinaryOp::Add => Some(ArithOp::Add),
        BinaryOp::Sub => Some(ArithOp::Sub),
        BinaryOp::Mul => Some(ArithOp::Mul),
        BinaryOp::Div => Some(ArithOp::Div),
        BinaryOp::Mod => Some(ArithOp::Mod),
        _ => None,
    }
}

fn bit_op(op: BinaryOp) -> Option<BitOp> {
    match op {
        BinaryOp::BitAnd => Some(BitOp::And),
        BinaryOp::BitOr => Some(BitOp::Or),
        BinaryOp::BitXor => Some(BitOp::Xor),
        _ => None,
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
