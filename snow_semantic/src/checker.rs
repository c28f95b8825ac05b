//! Two-pass semantic analysis (spec §4.5).
//!
//! Pass 1 collects every module's globals (constants, struct layouts,
//! parent links) and function signatures (including struct constructors
//! and methods, lowered to their qualified names up front so call
//! resolution in pass 2 can treat them uniformly). Pass 2 walks every
//! function body, inferring and checking types; diagnostics accumulate in
//! a flat list so one run reports every defect (spec §4.5, §7.1).

use hashbrown::HashMap;

use crate::fold::fold_expr;
use crate::literal::classify;
use crate::tables::{FunctionSignature, ProgramTables, StructLayout};
use crate::types::{check_compatibility, integer_fits, struct_derives_from, Compatibility, PrimitiveType, Type};
use snow_ast::{
    BinaryOp, Block, ConstDef, Expr, ExprKind, Function, Item, ItemKind, Module, Param, Program, Stmt, StmtKind,
    StructDef, TypeExpr, UnaryOp,
};
use snow_common::{Diagnostics, Span};

/// Arity-qualified constructor/method name, per spec §3: `S.__init__N` for
/// constructors, `S.method_N` for methods (N counts `this`).
pub fn ctor_name(struct_name: &str, arity_without_this: usize) -> String {
    format!("{}.__init__{}", struct_name, arity_without_this + 1)
}

pub fn method_name(struct_name: &str, method: &str, arity_without_this: usize) -> String {
    format!("{}.{}_{}", struct_name, method, arity_without_this + 1)
}

struct LocalScope {
    bindings: HashMap<String, Type>,
    this_struct: Option<String>,
    /// Nesting depth of `loop` bodies the current statement is inside of —
    /// spec §4.3: `break`/`continue` outside a loop must fail the build.
    loop_depth: u32,
}

impl LocalScope {
    fn new() -> Self {
        Self { bindings: HashMap::new(), this_struct: None, loop_depth: 0 }
    }

    fn bind(&mut self, name: impl Into<String>, ty: Type) {
        self.bindings.insert(name.into(), ty);
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    fn exit_loop(&mut self) {
        self.loop_depth -= 1;
    }

    fn in_loop(&self) -> bool {
        self.loop_depth > 0
    }
}

pub struct Analyzer {
    pub tables: ProgramTables,
    diagnostics: Diagnostics,
}

impl Analyzer {
    pub fn new() -> Self {
        Self { tables: ProgramTables::new(), diagnostics: Diagnostics::new() }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_tables(self) -> ProgramTables {
        self.tables
    }

    /// Run both passes. Returns `Ok(())` if no errors were collected, or
    /// `Err` carrying the accumulated diagnostics — analysis itself never
    /// aborts early (spec §4.5, §7.1).
    pub fn check_program(&mut self, program: &Program) -> Result<(), ()> {
        self.pass1_collect(program);
        self.pass2_check_bodies(program);
        if self.diagnostics.has_errors() {
            Err(())
        } else {
            Ok(())
        }
    }

    // ---------------------------------------------------------------
    // Pass 1: collect globals
    // ---------------------------------------------------------------

    fn pass1_collect(&mut self, program: &Program) {
        // Constants may reference constants in other modules, so fold them
        // to a fixpoint instead of assuming declaration order across
        // modules (spec §1, "cross-module constant propagation").
        let mut pending: Vec<(&Module, &ConstDef)> = Vec::new();
        for module in &program.modules {
            for item in &module.items {
                if let ItemKind::Const(c) = &item.kind {
                    pending.push((module, c));
                }
            }
        }
        let mut made_progress = true;
        while made_progress && !pending.is_empty() {
            made_progress = false;
            pending.retain(|(module, c)| {
                if let Some(value) = fold_expr(&c.value, &self.tables, &module.name) {
                    self.tables.register_const(format!("{}.{}", module.name, c.name.value), value);
                    made_progress = true;
                    false
                } else {
                    true
                }
            });
        }
        for (module, c) in &pending {
            self.diagnostics.error(
                format!("constant '{}.{}' has a non-constant initializer", module.name, c.name.value),
                c.span,
            );
        }

        for module in &program.modules {
            for item in &module.items {
                if let ItemKind::Struct(s) = &item.kind {
                    self.register_struct(s);
                }
            }
        }

        for module in &program.modules {
            for item in &module.items {
                if let ItemKind::Struct(s) = &item.kind {
                    self.register_struct_callables(s);
                }
            }
        }

        for module in &program.modules {
            for item in &module.items {
                if let ItemKind::Function(f) = &item.kind {
                    if f.name.value.is_empty() {
                        self.diagnostics.error("function name cannot be empty", f.span);
                        continue;
                    }
                    let sig = self.signature_of(f);
                    self.tables.register_function(format!("{}.{}", module.name, f.name.value), sig);
                }
            }
        }
    }

    fn register_struct(&mut self, s: &StructDef) {
        let mut fields = Vec::with_capacity(s.fields.len());
        let mut field_types = Vec::with_capacity(s.fields.len());
        for f in &s.fields {
            fields.push(f.name.value.clone());
            field_types.push(Type::from_type_expr(&f.ty));
        }
        self.tables.register_struct_layout(s.name.value.clone(), StructLayout { fields, field_types });
        if let Some(parent) = &s.parent {
            self.tables.register_parent(s.name.value.clone(), parent.value.clone());
        }
    }

    fn register_struct_callables(&mut self, s: &StructDef) {
        let this_ty = Type::Struct(s.name.value.clone());
        if let Some(init) = &s.init {
            let mut params = vec![this_ty.clone()];
            params.extend(init.params.iter().map(|p| Type::from_type_expr(&p.ty)));
            let name = ctor_name(&s.name.value, init.params.len());
            self.tables.register_function(name, FunctionSignature { params, return_type: Type::void() });
        }
        for m in &s.methods {
            let mut params = vec![this_ty.clone()];
            params.extend(m.params.iter().map(|p| Type::from_type_expr(&p.ty)));
            let return_type = m.return_type.as_ref().map(Type::from_type_expr).unwrap_or_else(Type::void);
            let name = method_name(&s.name.value, &m.name.value, m.params.len());
            self.tables.register_function(name, FunctionSignature { params, return_type });
        }
    }

    fn signature_of(&self, f: &Function) -> FunctionSignature {
        let params = f.params.iter().map(|p: &Param| Type::from_type_expr(&p.ty)).collect();
        let return_type = f.return_type.as_ref().map(Type::from_type_expr).unwrap_or_else(Type::void);
        FunctionSignature { params, return_type }
    }

    // ---------------------------------------------------------------
    // Pass 2: check bodies
    // ---------------------------------------------------------------

    fn pass2_check_bodies(&mut self, program: &Program) {
        for module in &program.modules {
            for item in &module.items {
                match &item.kind {
                    ItemKind::Function(f) => self.check_function(module, f, None),
                    ItemKind::Struct(s) => self.check_struct_bodies(module, s),
                    ItemKind::TopLevelStmt(stmt) => {
                        let mut scope = LocalScope::new();
                        self.check_statement(module, &mut scope, stmt);
                    }
                    ItemKind::Const(_) => {}
                }
            }
        }
    }

    fn check_struct_bodies(&mut self, module: &Module, s: &StructDef) {
        if let Some(init) = &s.init {
            let mut scope = LocalScope::new();
            scope.this_struct = Some(s.name.value.clone());
            scope.bind("this", Type::Struct(s.name.value.clone()));
            for p in &init.params {
                scope.bind(p.name.value.clone(), Type::from_type_expr(&p.ty));
            }
            self.check_block(module, &mut scope, &init.body);
        }
        for m in &s.methods {
            self.check_function(module, m, Some(s.name.value.clone()));
        }
    }

    fn check_function(&mut self, module: &Module, f: &Function, this_struct: Option<String>) {
        let mut scope = LocalScope::new();
        if let Some(struct_name) = &this_struct {
            scope.this_struct = Some(struct_name.clone());
            scope.bind("this", Type::Struct(struct_name.clone()));
        }
        for p in &f.params {
            scope.bind(p.name.value.clone(), Type::from_type_expr(&p.ty));
        }
        self.check_block(module, &mut scope, &f.body);

        let return_type = f.return_type.as_ref().map(Type::from_type_expr).unwrap_or_else(Type::void);
        if !matches!(return_type, Type::Primitive(PrimitiveType::Void)) && !block_returns_on_all_paths(&f.body) {
            self.diagnostics.error(
                format!("function '{}' does not return a value on every control-flow path", f.name.value),
                f.span,
            );
        }
    }

    fn check_block(&mut self, module: &Module, scope: &mut LocalScope, block: &Block) {
        for stmt in &block.statements {
            self.check_statement(module, scope, stmt);
        }
    }

    fn check_statement(&mut self, module: &Module, scope: &mut LocalScope, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Declaration { name, ty, is_const: _, initializer } => {
                let declared = ty.as_ref().map(Type::from_type_expr);
                let inferred = initializer.as_ref().map(|e| self.infer_expr(module, scope, e));
                match (&declared, &inferred) {
                    (Some(declared_ty), Some(init_ty)) => {
                        self.check_assignable(declared_ty, init_ty, initializer.as_ref().unwrap());
                        scope.bind(name.value.clone(), self.narrow_declared_type(declared_ty, init_ty));
                    }
                    (Some(declared_ty), None) => scope.bind(name.value.clone(), declared_ty.clone()),
                    (None, Some(init_ty)) => scope.bind(name.value.clone(), init_ty),
                    (None, None) => {
                        self.diagnostics.error(
                            format!("declaration of '{}' has neither a type nor an initializer", name.value),
                            stmt.span,
                        );
                    }
                }
            }
            StmtKind::Assignment { target, value } => {
                let value_ty = self.infer_expr(module, scope, value);
                if let Some(target_ty) = scope.lookup(&target.value).cloned() {
                    self.check_assignable(&target_ty, &value_ty, value);
                } else if let Some(struct_name) = scope.this_struct.clone() {
                    if let Some(layout) = self.tables.struct_layout(&struct_name) {
                        if let Some(field_ty) = layout.field_type(&target.value).cloned() {
                            self.check_assignable(&field_ty, &value_ty, value);
                        } else {
                            self.diagnostics.error(format!("undefined identifier '{}'", target.value), target.span);
                        }
                    }
                } else {
                    scope.bind(target.value.clone(), value_ty);
                }
            }
            StmtKind::IndexAssignment { target, index, value } => {
                let target_ty = self.infer_expr(module, scope, target);
                let _index_ty = self.infer_expr(module, scope, index);
                let value_ty = self.infer_expr(module, scope, value);
                if let Type::Array(elem) = target_ty {
                    self.check_assignable(&elem, &value_ty, value);
                }
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                let cond_ty = self.infer_expr(module, scope, condition);
                if !matches!(cond_ty, Type::Primitive(PrimitiveType::Bool) | Type::Error) {
                    self.diagnostics.error(
                        format!("if condition must be bool, found {}", cond_ty),
                        condition.span,
                    );
                }
                self.check_block(module, scope, then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_block(module, scope, else_branch);
                }
            }
            StmtKind::Loop { init, condition, step, body } => {
                if let Some(init) = init {
                    self.check_statement(module, scope, init);
                }
                let cond_ty = self.infer_expr(module, scope, condition);
                if !matches!(cond_ty, Type::Primitive(PrimitiveType::Bool) | Type::Error) {
                    self.diagnostics.error(format!("loop condition must be bool, found {}", cond_ty), condition.span);
                }
                scope.enter_loop();
                self.check_block(module, scope, body);
                scope.exit_loop();
                if let Some(step) = step {
                    self.check_statement(module, scope, step);
                }
            }
            StmtKind::ExprStmt(expr) => {
                self.infer_expr(module, scope, expr);
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.infer_expr(module, scope, expr);
                }
            }
            StmtKind::Break => {
                if !scope.in_loop() {
                    self.diagnostics.error("'break' used outside a loop", stmt.span);
                }
            }
            StmtKind::Continue => {
                if !scope.in_loop() {
                    self.diagnostics.error("'continue' used outside a loop", stmt.span);
                }
            }
        }
    }

    /// `Base x = new Sub(...)` records `x` as `Sub`, not `Base`, provided
    /// `Sub` transitively derives from `Base` — static polymorphism for
    /// later method dispatch through `x` (spec §4.2 "Declaration").
    fn narrow_declared_type(&self, declared: &Type, initializer: &Type) -> Type {
        if let (Type::Struct(base), Type::Struct(sub)) = (declared, initializer) {
            if base != sub && struct_derives_from(&self.tables, sub, base) {
                return initializer.clone();
            }
        }
        declared.clone()
    }

    fn check_assignable(&mut self, target: &Type, value: &Type, value_expr: &Expr) {
        match check_compatibility(target, value, &self.tables) {
            Compatibility::Incompatible => {
                if let (Type::Primitive(t), _) = (target, value) {
                    if t.is_integral() {
                        if let Some(folded) = fold_expr(value_expr, &self.tables, "") {
                            if let Some(int_val) = folded.as_i64() {
                                if integer_fits(*t, int_val) {
                                    return;
                                }
                                self.diagnostics.error(
                                    format!("value {} does not fit in {}", int_val, t),
                                    value_expr.span,
                                );
                                return;
                            }
                        }
                        if matches!(value, Type::Primitive(PrimitiveType::Int))
                            && matches!(t, PrimitiveType::Byte | PrimitiveType::Short)
                        {
                            // Runtime narrow channel (spec §9 Open Question 2): allowed.
                            return;
                        }
                    }
                }
                self.diagnostics.error(
                    format!("type mismatch: expected {}, found {}", target, value),
                    value_expr.span,
                );
            }
            _ => {}
        }
    }

    fn infer_expr(&mut self, module: &Module, scope: &mut LocalScope, expr: &Expr) -> Type {
        match &*expr.kind {
            ExprKind::NumberLiteral(text) => {
                let class = classify(text);
                if let Some(msg) = class.range_error() {
                    self.diagnostics.error(msg, expr.span);
                }
                class.inferred_type()
            }
            ExprKind::StringLiteral(_) => Type::string(),
            ExprKind::BooleanLiteral(_) => Type::bool(),
            ExprKind::ArrayLiteral(items) => self.infer_array_literal(module, scope, items, expr.span),
            ExprKind::Identifier(name) => self.infer_identifier(module, scope, name, expr.span),
            ExprKind::Member { object, member } => self.infer_member(module, scope, object, member.value.as_str(), expr.span),
            ExprKind::Index { array, index } => self.infer_index(module, scope, array, index),
            ExprKind::Call { callee, args } => self.infer_call(module, scope, callee, args, expr.span),
            ExprKind::New { type_name, args } => self.infer_new(module, scope, type_name.value.as_str(), args, expr.span),
            ExprKind::Unary { op, operand } => self.infer_unary(module, scope, *op, operand),
            ExprKind::Binary { op, left, right } => self.infer_binary(module, scope, *op, left, right, expr.span),
        }
    }

    fn infer_array_literal(&mut self, module: &Module, scope: &mut LocalScope, items: &[Expr], span: Span) -> Type {
        if items.is_empty() {
            self.diagnostics.error("cannot infer type of empty array literal", span);
            return Type::Array(Box::new(Type::int()));
        }
        let first = self.infer_expr(module, scope, &items[0]);
        for item in &items[1..] {
            let ty = self.infer_expr(module, scope, item);
            if check_compatibility(&first, &ty, &self.tables) == Compatibility::Incompatible {
                self.diagnostics.error(
                    format!("array literal element type mismatch: expected {}, found {}", first, ty),
                    item.span,
                );
            }
        }
        Type::Array(Box::new(first))
    }

    fn infer_identifier(&mut self, module: &Module, scope: &mut LocalScope, name: &str, span: Span) -> Type {
        if let Some(ty) = scope.lookup(name) {
            return ty.clone();
        }
        if scope.this_struct.is_some() {
            return self.infer_member_of_this(scope, name, span);
        }
        if let Some(sig) = self.tables.get_function(&format!("{}.{}", module.name, name)) {
            return sig.return_type.clone();
        }
        self.diagnostics.error(format!("undefined identifier '{}'", name), span);
        Type::Error
    }

    fn infer_member_of_this(&mut self, scope: &LocalScope, field: &str, span: Span) -> Type {
        let struct_name = scope.this_struct.clone().unwrap();
        if let Some(layout) = self.tables.struct_layout(&struct_name) {
            if let Some(ty) = layout.field_type(field) {
                return ty.clone();
            }
        }
        self.diagnostics.error(format!("'{}' has no field '{}'", struct_name, field), span);
        Type::Error
    }

    fn infer_member(&mut self, module: &Module, scope: &mut LocalScope, object: &Expr, member: &str, span: Span) -> Type {
        if let ExprKind::Identifier(object_name) = &*object.kind {
            if scope.lookup(object_name).is_none() {
                if let Some(v) = self
                    .tables
                    .get_const(&format!("{}.{}", object_name, member))
                    .or_else(|| self.tables.get_const(&format!("{}.{}", module.name, member)))
                {
                    return v.type_of();
                }
                if let Some(sig) = self.tables.get_function(&format!("{}.{}", object_name, member)) {
                    return sig.return_type.clone();
                }
            }
        }
        let object_ty = self.infer_expr(module, scope, object);
        match object_ty {
            Type::Struct(name) => {
                if let Some(layout) = self.tables.struct_layout(&name) {
                    if let Some(ty) = layout.field_type(member) {
                        return ty.clone();
                    }
                }
                self.diagnostics.error(format!("'{}' has no field '{}'", name, member), span);
                Type::Error
            }
            Type::Error => Type::Error,
            other => {
                self.diagnostics.error(format!("'{}' has no member '{}'", other, member), span);
                Type::Error
            }
        }
    }

    fn infer_index(&mut self, module: &Module, scope: &mut LocalScope, array: &Expr, index: &Expr) -> Type {
        let array_ty = self.infer_expr(module, scope, array);
        let index_ty = self.infer_expr(module, scope, index);
        if !index_ty.is_numeric() && !index_ty.is_error() {
            self.diagnostics.error(format!("array index must be numeric, found {}", index_ty), index.span);
        }
        match array_ty {
            Type::Array(elem) => *elem,
            Type::Error => Type::Error,
            other => {
                self.diagnostics.error(format!("cannot index non-array type {}", other), array.span);
                Type::Error
            }
        }
    }

    fn infer_unary(&mut self, module: &Module, scope: &mut LocalScope, op: UnaryOp, operand: &Expr) -> Type {
        let ty = self.infer_expr(module, scope, operand);
        if ty.is_error() {
            return Type::Error;
        }
        match op {
            UnaryOp::Neg => {
                if ty.is_numeric() {
                    ty
                } else {
                    self.diagnostics.error(format!("unary '-' requires a numeric operand, found {}", ty), operand.span);
                    Type::Error
                }
            }
            UnaryOp::Not => {
                if matches!(ty, Type::Primitive(PrimitiveType::Bool)) {
                    Type::bool()
                } else {
                    self.diagnostics.error(format!("unary '!' requires a bool operand, found {}", ty), operand.span);
                    Type::Error
                }
            }
        }
    }

    fn infer_binary(
        &mut self,
        module: &Module,
        scope: &mut LocalScope,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Type {
        let left_ty = self.infer_expr(module, scope, left);
        let right_ty = self.infer_expr(module, scope, right);
        if left_ty.is_error() || right_ty.is_error() {
            return Type::Error;
        }
        match op {
            BinaryOp::Add if left_ty == Type::string() || right_ty == Type::string() => Type::string(),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if left_ty.is_numeric() && right_ty.is_numeric() {
                    widen_numeric(&left_ty, &right_ty)
                } else {
                    self.diagnostics.error(
                        format!("cannot apply {:?} to {} and {}", op, left_ty, right_ty),
                        span,
                    );
                    Type::Error
                }
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if left_ty.is_numeric() && right_ty.is_numeric() {
                    widen_numeric(&left_ty, &right_ty)
                } else {
                    self.diagnostics.error("bitwise op requires numeric operands", span);
                    Type::Error
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if left_ty == right_ty
                    || (left_ty.is_numeric() && right_ty.is_numeric())
                    || check_compatibility(&left_ty, &right_ty, &self.tables).is_compatible()
                {
                    Type::bool()
                } else {
                    self.diagnostics.error(
                        format!("cannot compare {} and {}", left_ty, right_ty),
                        span,
                    );
                    Type::Error
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if left_ty.is_numeric() && right_ty.is_numeric() {
                    Type::bool()
                } else {
                    self.diagnostics.error(
                        format!("comparison requires numeric operands, found {} and {}", left_ty, right_ty),
                        span,
                    );
                    Type::Error
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                if !matches!(left_ty, Type::Primitive(PrimitiveType::Bool)) {
                    self.diagnostics.error(format!("expected bool, found {}", left_ty), left.span);
                }
                if !matches!(right_ty, Type::Primitive(PrimitiveType::Bool)) {
                    self.diagnostics.error(format!("expected bool, found {}", right_ty), right.span);
                }
                Type::bool()
            }
        }
    }

    fn infer_call(&mut self, module: &Module, scope: &mut LocalScope, callee: &Expr, args: &[Expr], span: Span) -> Type {
        let (qualified, receiver_prepended) = self.resolve_call_target(module, scope, callee, args.len());

        if qualified == "syscall" {
            if args.is_empty() {
                self.diagnostics.error("syscall requires a subcommand argument", span);
                return Type::Error;
            }
            let sub_ty = self.infer_expr(module, scope, &args[0]);
            if sub_ty != Type::string() && !sub_ty.is_error() {
                self.diagnostics.error("syscall's first argument must be a string subcommand", args[0].span);
            }
            for a in &args[1..] {
                self.infer_expr(module, scope, a);
            }
            return Type::Any;
        }

        // Private-function visibility (spec §4.5) only governs plain
        // `Module.function` calls; struct method/constructor dispatch never
        // crosses a module boundary this way.
        if !receiver_prepended {
            if let Some(callee_module) = qualified.split('.').next() {
                if callee_module != module.name {
                    if let Some(last) = qualified.rsplit('.').next() {
                        if last.starts_with('_') {
                            self.diagnostics.error(
                                format!("cannot call private function '{}' from module '{}'", qualified, module.name),
                                span,
                            );
                            return Type::Error;
                        }
                    }
                }
            }
        }

        let sig = match self.tables.get_function(&qualified) {
            Some(sig) => sig.clone_for_check(),
            None => {
                self.diagnostics.error(format!("undefined function '{}'", qualified), span);
                return Type::Error;
            }
        };

        let expected_args = if receiver_prepended { sig.params.len().saturating_sub(1) } else { sig.params.len() };
        if args.len() != expected_args {
            self.diagnostics.error(
                format!("function '{}' expects {} arguments, got {}", qualified, expected_args, args.len()),
                span,
            );
        }
        let param_offset = if receiver_prepended { 1 } else { 0 };
        for (i, arg) in args.iter().enumerate() {
            let arg_ty = self.infer_expr(module, scope, arg);
            if let Some(expected) = sig.params.get(i + param_offset) {
                self.check_assignable(expected, &arg_ty, arg);
            }
        }
        sig.return_type
    }

    /// Mirrors the IR builder's callee-resolution rules (spec §4.2 "Call")
    /// so the semantic pass checks exactly what will be emitted. Returns
    /// the qualified callee name and whether the receiver contributes an
    /// extra (already-checked) argument slot. `arg_count` is the call's own
    /// argument list length (excluding any receiver), needed up front to
    /// build arity-qualified method/constructor names like `S.method_N`.
    fn resolve_call_target(
        &mut self,
        module: &Module,
        scope: &mut LocalScope,
        callee: &Expr,
        arg_count: usize,
    ) -> (String, bool) {
        match &*callee.kind {
            ExprKind::Identifier(name) if name == "syscall" => ("syscall".to_string(), false),
            ExprKind::Identifier(name) => (format!("{}.{}", module.name, name), false),
            ExprKind::Member { object, member } => {
                if let ExprKind::Identifier(recv_name) = &*object.kind {
                    if recv_name == "super" {
                        if let Some(struct_name) = &scope.this_struct {
                            if let Some(parent) = self.tables.parent_of(struct_name).cloned() {
                                return (method_name(&parent, &member.value, arg_count), true);
                            }
                        }
                        return (format!("<unknown-parent>.{}", member.value), true);
                    }
                    if let Some(Type::Struct(struct_name)) = scope.lookup(recv_name).cloned() {
                        return (method_name(&struct_name, &member.value, arg_count), true);
                    }
                    if scope.lookup(recv_name).is_none() {
                        return (format!("{}.{}", recv_name, member.value), false);
                    }
                }
                let object_ty = self.infer_expr(module, scope, object);
                if let Type::Struct(struct_name) = object_ty {
                    return (method_name(&struct_name, &member.value, arg_count), true);
                }
                (member.value.clone(), false)
            }
            _ => ("<non-callable>".to_string(), false),
        }
    }

    fn infer_new(&mut self, module: &Module, scope: &mut LocalScope, type_name: &str, args: &[Expr], span: Span) -> Type {
        if !self.tables.has_struct(type_name) {
            self.diagnostics.error(format!("unknown struct type '{}'", type_name), span);
            return Type::Error;
        }
        let ctor = ctor_name(type_name, args.len());
        match self.tables.get_function(&ctor) {
            Some(sig) => {
                let sig = sig.clone_for_check();
                for (i, arg) in args.iter().enumerate() {
                    let arg_ty = self.infer_expr(module, scope, arg);
                    if let Some(expected) = sig.params.get(i + 1) {
                        self.check_assignable(expected, &arg_ty, arg);
                    }
                }
            }
            None => {
                self.diagnostics.error(
                    format!("no constructor for '{}' with {} arguments", type_name, args.len()),
                    span,
                );
            }
        }
        Type::Struct(type_name.to_string())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionSignature {
    fn clone_for_check(&self) -> FunctionSignature {
        FunctionSignature { params: self.params.clone(), return_type: self.return_type.clone() }
    }
}

fn widen_numeric(a: &Type, b: &Type) -> Type {
    if let (Type::Primitive(pa), Type::Primitive(pb)) = (a, b) {
        if let (Some(ra), Some(rb)) = (pa.numeric_rank(), pb.numeric_rank()) {
            return if ra >= rb { a.clone() } else { b.clone() };
        }
    }
    a.clone()
}

/// Verifies that a non-void function's body returns on every control-flow
/// exit path (spec §3 invariant, §4.5, §8 "Return completeness"). This is a
/// syntactic check over a reducible CFG: an `if` with both branches
/// returning counts as returning; a `loop` never counts (it may not
/// execute), matching the spec's conservative wording.
pub fn block_returns_on_all_paths(block: &Block) -> bool {
    for stmt in &block.statements {
        if stmt_returns_on_all_paths(stmt) {
            return true;
        }
    }
    false
}

fn stmt_returns_on_all_paths(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If { then_branch, else_branch: Some(else_branch), .. } => {
            block_returns_on_all_paths(then_branch) && block_returns_on_all_paths(else_branch)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_ast::{Expr, ExprKind, Module, Program};
    use snow_common::Span as S;

    fn ident(name: &str) -> Expr {
        Expr { kind: Box::new(ExprKind::Identifier(name.to_string())), span: S::synthetic(), id: 0 }
    }

    fn simple_program_with_stmt(stmt: Stmt) -> Program {
        Program {
            modules: vec![Module {
                name: "M".to_string(),
                imports: vec![],
                items: vec![Item { kind: ItemKind::TopLevelStmt(stmt), span: S::synthetic(), id: 0 }],
                span: S::synthetic(),
            }],
        }
    }

    #[test]
    fn undefined_identifier_is_reported() {
        let stmt = Stmt { kind: StmtKind::ExprStmt(ident("nope")), span: S::synthetic(), id: 0 };
        let program = simple_program_with_stmt(stmt);
        let mut analyzer = Analyzer::new();
        let result = analyzer.check_program(&program);
        assert!(result.is_err());
        assert!(analyzer.diagnostics().errors().any(|d| d.message.contains("undefined identifier")));
    }

    #[test]
    fn byte_declaration_out_of_range_errors() {
        let decl = Stmt {
            kind: StmtKind::Declaration {
                name: snow_common::Spanned::new("x".to_string(), S::synthetic()),
                ty: Some(TypeExpr::Byte),
                is_const: false,
                initializer: Some(Expr {
                    kind: Box::new(ExprKind::NumberLiteral("200".to_string())),
                    span: S::synthetic(),
                    id: 0,
                }),
            },
            span: S::synthetic(),
            id: 0,
        };
        let program = simple_program_with_stmt(decl);
        let mut analyzer = Analyzer::new();
        assert!(analyzer.check_program(&program).is_err());
    }

    #[test]
    fn byte_declaration_in_range_succeeds() {
        let decl = Stmt {
            kind: StmtKind::Declaration {
                name: snow_common::Spanned::new("x".to_string(), S::synthetic()),
                ty: Some(TypeExpr::Byte),
                is_const: false,
                initializer: Some(Expr {
                    kind: Box::new(ExprKind::NumberLiteral("127".to_string())),
                    span: S::synthetic(),
                    id: 0,
                }),
            },
            span: S::synthetic(),
            id: 0,
        };
        let program = simple_program_with_stmt(decl);
        let mut analyzer = Analyzer::new();
        assert!(analyzer.check_program(&program).is_ok());
    }

    #[test]
    fn empty_array_literal_is_an_error() {
        let stmt = Stmt {
            kind: StmtKind::ExprStmt(Expr {
                kind: Box::new(ExprKind::ArrayLiteral(vec![])),
                span: S::synthetic(),
                id: 0,
            }),
            span: S::synthetic(),
            id: 0,
        };
        let program = simple_program_with_stmt(stmt);
        let mut analyzer = Analyzer::new();
        assert!(analyzer.check_program(&program).is_err());
    }

    fn num(text: &str) -> Expr {
        Expr { kind: Box::new(ExprKind::NumberLiteral(text.to_string())), span: S::synthetic(), id: 0 }
    }

    fn string_lit(text: &str) -> Expr {
        Expr { kind: Box::new(ExprKind::StringLiteral(text.to_string())), span: S::synthetic(), id: 0 }
    }

    fn call(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr { kind: Box::new(ExprKind::Call { callee, args }), span: S::synthetic(), id: 0 }
    }

    fn member(object: Expr, name: &str) -> Expr {
        Expr {
            kind: Box::new(ExprKind::Member { object, member: snow_common::Spanned::new(name.to_string(), S::synthetic()) }),
            span: S::synthetic(),
            id: 0,
        }
    }

    fn func(name: &str, params: Vec<Param>, return_type: Option<TypeExpr>, body: Vec<Stmt>) -> Function {
        Function {
            name: snow_common::Spanned::new(name.to_string(), S::synthetic()),
            params,
            return_type,
            body: Block { statements: body, span: S::synthetic() },
            span: S::synthetic(),
        }
    }

    fn module_with(name: &str, items: Vec<Item>) -> Module {
        Module { name: name.to_string(), imports: vec![], items, span: S::synthetic() }
    }

    #[test]
    fn cross_module_private_call_is_rejected() {
        let helper = func("_helper", vec![], Some(TypeExpr::Int), vec![Stmt { kind: StmtKind::Return(Some(num("1"))), span: S::synthetic(), id: 0 }]);
        let m = module_with("M", vec![Item { kind: ItemKind::Function(helper), span: S::synthetic(), id: 0 }]);
        let call_helper = call(member(ident("M"), "_helper"), vec![]);
        let stmt = Stmt { kind: StmtKind::ExprStmt(call_helper), span: S::synthetic(), id: 0 };
        let n = module_with("N", vec![Item { kind: ItemKind::TopLevelStmt(stmt), span: S::synthetic(), id: 0 }]);
        let program = Program { modules: vec![m, n] };
        let mut analyzer = Analyzer::new();
        let result = analyzer.check_program(&program);
        assert!(result.is_err());
        assert!(analyzer.diagnostics().errors().any(|d| d.message.contains("cannot call private function")));
    }

    #[test]
    fn call_arity_mismatch_is_reported() {
        let f = func(
            "f",
            vec![Param { name: snow_common::Spanned::new("x".to_string(), S::synthetic()), ty: TypeExpr::Int, span: S::synthetic() }],
            None,
            vec![],
        );
        let bad_call = call(ident("f"), vec![num("1"), num("2")]);
        let stmt = Stmt { kind: StmtKind::ExprStmt(bad_call), span: S::synthetic(), id: 0 };
        let m = module_with(
            "M",
            vec![
                Item { kind: ItemKind::Function(f), span: S::synthetic(), id: 0 },
                Item { kind: ItemKind::TopLevelStmt(stmt), span: S::synthetic(), id: 1 },
            ],
        );
        let program = Program { modules: vec![m] };
        let mut analyzer = Analyzer::new();
        let result = analyzer.check_program(&program);
        assert!(result.is_err());
        assert!(analyzer.diagnostics().errors().any(|d| d.message.contains("expects 1 arguments, got 2")));
    }

    #[test]
    fn syscall_ignores_arity_once_the_subcommand_type_checks() {
        let variadic = call(ident("syscall"), vec![string_lit("exit"), num("1"), num("2"), num("3")]);
        let stmt = Stmt { kind: StmtKind::ExprStmt(variadic), span: S::synthetic(), id: 0 };
        let program = simple_program_with_stmt(stmt);
        let mut analyzer = Analyzer::new();
        assert!(analyzer.check_program(&program).is_ok());
    }

    #[test]
    fn syscall_requires_a_string_subcommand() {
        let bad = call(ident("syscall"), vec![num("1")]);
        let stmt = Stmt { kind: StmtKind::ExprStmt(bad), span: S::synthetic(), id: 0 };
        let program = simple_program_with_stmt(stmt);
        let mut analyzer = Analyzer::new();
        let result = analyzer.check_program(&program);
        assert!(result.is_err());
        assert!(analyzer.diagnostics().errors().any(|d| d.message.contains("must be a string subcommand")));
    }

    #[test]
    fn non_void_function_missing_a_return_is_reported() {
        let f = func("f", vec![], Some(TypeExpr::Int), vec![]);
        let m = module_with("M", vec![Item { kind: ItemKind::Function(f), span: S::synthetic(), id: 0 }]);
        let program = Program { modules: vec![m] };
        let mut analyzer = Analyzer::new();
        let result = analyzer.check_program(&program);
        assert!(result.is_err());
        assert!(analyzer.diagnostics().errors().any(|d| d.message.contains("does not return a value on every control-flow path")));
    }

    #[test]
    fn if_else_both_returning_satisfies_return_completeness() {
        let body = vec![Stmt {
            kind: StmtKind::If {
                condition: Expr { kind: Box::new(ExprKind::BooleanLiteral(true)), span: S::synthetic(), id: 0 },
                then_branch: Block {
                    statements: vec![Stmt { kind: StmtKind::Return(Some(num("1"))), span: S::synthetic(), id: 0 }],
                    span: S::synthetic(),
                },
                else_branch: Some(Block {
                    statements: vec![Stmt { kind: StmtKind::Return(Some(num("2"))), span: S::synthetic(), id: 0 }],
                    span: S::synthetic(),
                }),
            },
            span: S::synthetic(),
            id: 0,
        }];
        let f = func("f", vec![], Some(TypeExpr::Int), body);
        let m = module_with("M", vec![Item { kind: ItemKind::Function(f), span: S::synthetic(), id: 0 }]);
        let program = Program { modules: vec![m] };
        let mut analyzer = Analyzer::new();
        assert!(analyzer.check_program(&program).is_ok());
    }
}
