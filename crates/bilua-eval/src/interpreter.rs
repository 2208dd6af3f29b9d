//! The tree-walking evaluator.
//!
//! Statements thread a [`Flow`] out of every construct: `Break` and
//! `Return` surface to the nearest loop or call boundary, `Goto` to the
//! block that owns the label. Errors travel on the `Err` channel and pick
//! up a trace frame at each call boundary they unwind through.

use std::rc::Rc;

use tracing::{debug, trace};

use bilua_common::{LuaError, Range, SourceChange};
use bilua_parse::ast::{
    BinOp, Block, Expr, ExprKind, Field, FunctionBody, SpannedName, Stat, StatKind,
};

use crate::env::Environment;
use crate::number::Number;
use crate::operators;
use crate::origin::Origin;
use crate::table::TableArena;
use crate::value::{Closure, FunctionValue, LuaString, RawValue, Value, Vallist};

pub const DEFAULT_VISIT_LIMIT: usize = 500;

/// Upper bound on `__index`/`__newindex` delegation before the chain is
/// assumed cyclic.
const MAX_META_CHAIN: usize = 100;

/// What a native function hands back: values, and optionally a source
/// change suggested as a side effect of the call.
pub struct CallResult {
    pub values: Vallist,
    pub source_change: Option<SourceChange>,
}

impl CallResult {
    pub fn empty() -> CallResult {
        CallResult {
            values: Vallist::new(),
            source_change: None,
        }
    }
}

impl From<Vallist> for CallResult {
    fn from(values: Vallist) -> CallResult {
        CallResult {
            values,
            source_change: None,
        }
    }
}

impl From<Value> for CallResult {
    fn from(value: Value) -> CallResult {
        CallResult {
            values: Vallist::of(value),
            source_change: None,
        }
    }
}

/// A function implemented by the host. Implementations are registered as
/// values in the environment; identity (not contents) defines equality of
/// the resulting function values.
pub trait NativeFunction {
    fn name(&self) -> &'static str;

    fn call(
        &self,
        eval: &mut Evaluator,
        args: &Vallist,
        range: Range,
    ) -> Result<CallResult, LuaError>;
}

/// Control flow leaving a statement.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Return(Vallist),
    Goto(String),
}

pub struct Evaluator {
    pub arena: TableArena,
    pub env: Environment,
    pub visit_limit: usize,
    visit_count: usize,
    suggestions: Vec<SourceChange>,
}

impl Evaluator {
    pub fn new() -> Evaluator {
        Evaluator {
            arena: TableArena::new(),
            env: Environment::new(),
            visit_limit: DEFAULT_VISIT_LIMIT,
            visit_count: 0,
            suggestions: Vec::new(),
        }
    }

    /// Run a parsed chunk. The result is the first value of a top-level
    /// `return` (or `nil`), plus any source change the built-ins suggested
    /// along the way.
    pub fn eval_chunk(&mut self, block: &Block) -> Result<(Value, Option<SourceChange>), LuaError> {
        self.visit_count = 0;
        self.suggestions.clear();
        debug!(stats = block.stats.len(), "evaluating chunk");

        let saved = self.env.current_frame();
        self.env.push_frame();
        let flow = self.eval_block(block);
        self.env.restore_frame(saved);

        let value = match flow? {
            Flow::Return(values) => values.first(),
            Flow::Normal => Value::nil(),
            Flow::Break => {
                return Err(LuaError::type_error("break outside a loop"));
            }
            Flow::Goto(label) => {
                return Err(LuaError::type_error(format!(
                    "no visible label '{label}' for goto"
                )));
            }
        };

        let suggestion = SourceChange::alternative(std::mem::take(&mut self.suggestions));
        Ok((value, suggestion))
    }

    /// One loop-body entry (or backward jump). The visit limit is the
    /// evaluator's only watchdog against unbounded programs.
    fn visit(&mut self) -> Result<(), LuaError> {
        self.visit_count += 1;
        if self.visit_count > self.visit_limit {
            debug!(limit = self.visit_limit, "visit limit exceeded");
            Err(LuaError::visit_limit(self.visit_limit))
        } else {
            Ok(())
        }
    }

    /* ═════════════════════ statements ═════════════════════ */

    /// Evaluate the statements of `block` in the current scope, resuming
    /// after a label when a `goto` inside the block names it.
    fn eval_block(&mut self, block: &Block) -> Result<Flow, LuaError> {
        let mut index = 0;
        while index < block.stats.len() {
            match self.eval_stat(&block.stats[index])? {
                Flow::Normal => index += 1,
                Flow::Goto(label) => match find_label(block, &label) {
                    Some(position) => {
                        // a backward jump is a loop; keep the watchdog fed
                        self.visit()?;
                        index = position + 1;
                    }
                    None => return Ok(Flow::Goto(label)),
                },
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// `eval_block` in a fresh child scope.
    fn eval_scoped_block(&mut self, block: &Block) -> Result<Flow, LuaError> {
        let saved = self.env.current_frame();
        self.env.push_frame();
        let flow = self.eval_block(block);
        self.env.restore_frame(saved);
        flow
    }

    fn eval_stat(&mut self, stat: &Stat) -> Result<Flow, LuaError> {
        trace!(range = %stat.range, "statement");
        match &stat.kind {
            StatKind::Assign { targets, values } => {
                // the whole right-hand side is evaluated before any store,
                // so `a, b = b, a` swaps
                let list = self.eval_explist(values)?;
                for (position, target) in targets.iter().enumerate() {
                    self.assign_target(target, list.get(position))?;
                }
                Ok(Flow::Normal)
            }

            StatKind::Local { names, values } => {
                let list = self.eval_explist(values)?;
                for (position, name) in names.iter().enumerate() {
                    self.env.declare_local(name.name.as_str(), list.get(position));
                }
                Ok(Flow::Normal)
            }

            StatKind::Call(expr) => {
                self.eval_call_expr(expr)?;
                Ok(Flow::Normal)
            }

            StatKind::Do(body) => self.eval_scoped_block(body),

            StatKind::While { cond, body } => {
                loop {
                    if !self.eval_expr(cond)?.truthy() {
                        break;
                    }
                    self.visit()?;
                    match self.eval_scoped_block(body)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }

            StatKind::Repeat { body, cond } => {
                loop {
                    self.visit()?;
                    // the until-condition sees the body's scope
                    let saved = self.env.current_frame();
                    self.env.push_frame();
                    let flow = self.eval_block(body);
                    let flow = match flow {
                        Ok(flow) => flow,
                        Err(e) => {
                            self.env.restore_frame(saved);
                            return Err(e);
                        }
                    };
                    match flow {
                        Flow::Normal => {
                            let done = self.eval_expr(cond);
                            self.env.restore_frame(saved);
                            if done?.truthy() {
                                break;
                            }
                        }
                        Flow::Break => {
                            self.env.restore_frame(saved);
                            break;
                        }
                        other => {
                            self.env.restore_frame(saved);
                            return Ok(other);
                        }
                    }
                }
                Ok(Flow::Normal)
            }

            StatKind::If { arms, else_block } => {
                for (cond, body) in arms {
                    if self.eval_expr(cond)?.truthy() {
                        return self.eval_scoped_block(body);
                    }
                }
                match else_block {
                    Some(body) => self.eval_scoped_block(body),
                    None => Ok(Flow::Normal),
                }
            }

            StatKind::NumericFor {
                var,
                start,
                end,
                step,
                body,
            } => self.eval_numeric_for(var, start, end, step.as_ref(), body),

            StatKind::GenericFor { names, exprs, body } => {
                self.eval_generic_for(names, exprs, body)
            }

            StatKind::Return { exprs } => Ok(Flow::Return(self.eval_explist(exprs)?)),

            StatKind::Break => Ok(Flow::Break),

            StatKind::Goto { label } => Ok(Flow::Goto(label.clone())),

            StatKind::Label { .. } => Ok(Flow::Normal),

            StatKind::FunctionDecl { target, body } => {
                let name = declared_name(target);
                let closure = self.make_closure(name, body);
                self.assign_target(target, closure)?;
                Ok(Flow::Normal)
            }

            StatKind::LocalFunction { name, body } => {
                // declare first so the body can call itself
                self.env.declare_local(name.name.as_str(), Value::nil());
                let closure = self.make_closure(Some(name.name.clone()), body);
                self.env.assign(&name.name, closure);
                Ok(Flow::Normal)
            }
        }
    }

    fn eval_numeric_for(
        &mut self,
        var: &SpannedName,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &Block,
    ) -> Result<Flow, LuaError> {
        let initial = self.for_number(start, "initial")?;
        let limit = self.for_number(end, "limit")?;
        let step = match step {
            Some(expr) => self.for_number(expr, "step")?,
            None => Number::Int(1),
        };
        if step.as_float() == 0.0 {
            return Err(LuaError::arithmetic("'for' step is zero"));
        }

        let ascending = step.as_float() > 0.0;
        let mut counter = initial;
        loop {
            let keep_going = match counter.num_cmp(limit) {
                Some(ordering) => {
                    if ascending {
                        ordering != std::cmp::Ordering::Greater
                    } else {
                        ordering != std::cmp::Ordering::Less
                    }
                }
                None => false,
            };
            if !keep_going {
                break;
            }

            self.visit()?;
            // the loop variable is a fresh local every iteration
            let saved = self.env.current_frame();
            self.env.push_frame();
            self.env.declare_local(var.name.as_str(), Value::from(counter));
            let flow = self.eval_block(body);
            self.env.restore_frame(saved);

            match flow? {
                Flow::Normal => {}
                Flow::Break => break,
                other => return Ok(other),
            }
            counter = counter.add(step);
        }
        Ok(Flow::Normal)
    }

    fn for_number(&mut self, expr: &Expr, role: &str) -> Result<Number, LuaError> {
        let value = self.eval_expr(expr)?;
        value.as_number().ok_or_else(|| {
            LuaError::type_error(format!(
                "'for' {role} value must be a number, got {}",
                value.type_name()
            ))
        })
    }

    fn eval_generic_for(
        &mut self,
        names: &[SpannedName],
        exprs: &[Expr],
        body: &Block,
    ) -> Result<Flow, LuaError> {
        let list = self.eval_explist(exprs)?;
        let iterator = list.get(0);
        let state = list.get(1);
        let mut control = list.get(2);

        loop {
            let mut args = Vallist::new();
            args.push(state.clone());
            args.push(control.clone());
            let step = self.call_value(&iterator, args, body.range, Some("for iterator"))?;
            if step.first().is_nil() {
                break;
            }
            control = step.first();

            self.visit()?;
            let saved = self.env.current_frame();
            self.env.push_frame();
            for (position, name) in names.iter().enumerate() {
                self.env.declare_local(name.name.as_str(), step.get(position));
            }
            let flow = self.eval_block(body);
            self.env.restore_frame(saved);

            match flow? {
                Flow::Normal => {}
                Flow::Break => break,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn assign_target(&mut self, target: &Expr, value: Value) -> Result<(), LuaError> {
        match &target.kind {
            ExprKind::Name(name) => {
                self.env.assign(name, value);
                Ok(())
            }
            ExprKind::Index { obj, key } => {
                let table = self.eval_expr(obj)?;
                let key = self.eval_expr(key)?;
                self.index_set(&table, key, value, target.range)
            }
            ExprKind::Field { obj, name } => {
                let table = self.eval_expr(obj)?;
                self.index_set(&table, Value::from(name.as_str()), value, target.range)
            }
            _ => Err(LuaError::type_error("cannot assign to this expression")),
        }
    }

    fn make_closure(&mut self, name: Option<String>, body: &FunctionBody) -> Value {
        Value::from(FunctionValue::Closure(Rc::new(Closure {
            name,
            body: Rc::new(body.clone()),
            captured: self.env.current_frame(),
        })))
    }

    /* ═════════════════════ expressions ═════════════════════ */

    /// Evaluate to a single value; multi-value expressions are truncated
    /// to their first result.
    pub fn eval_expr(&mut self, expr: &Expr) -> Result<Value, LuaError> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::nil().with_origin(Origin::Literal { range: expr.range })),
            ExprKind::True => {
                Ok(Value::from(true).with_origin(Origin::Literal { range: expr.range }))
            }
            ExprKind::False => {
                Ok(Value::from(false).with_origin(Origin::Literal { range: expr.range }))
            }
            ExprKind::Int(i) => {
                Ok(Value::from(*i).with_origin(Origin::Literal { range: expr.range }))
            }
            ExprKind::Float(f) => {
                Ok(Value::from(*f).with_origin(Origin::Literal { range: expr.range }))
            }
            ExprKind::Str(bytes) => {
                Ok(Value::new(RawValue::Str(LuaString::from_bytes(bytes.clone())))
                    .with_origin(Origin::Literal { range: expr.range }))
            }

            ExprKind::Vararg => Ok(self.env.varargs().first()),

            ExprKind::Name(name) => Ok(self.env.get(name)),

            ExprKind::Paren(inner) => self.eval_expr(inner),

            ExprKind::Function(body) => Ok(self.make_closure(None, body)),

            ExprKind::Binary { op, lhs, rhs } => match op {
                // short-circuit: the chosen operand's value flows through,
                // origin and all
                BinOp::And => {
                    let left = self.eval_expr(lhs)?;
                    if left.truthy() {
                        self.eval_expr(rhs)
                    } else {
                        Ok(left)
                    }
                }
                BinOp::Or => {
                    let left = self.eval_expr(lhs)?;
                    if left.truthy() {
                        Ok(left)
                    } else {
                        self.eval_expr(rhs)
                    }
                }
                _ => {
                    let left = self.eval_expr(lhs)?;
                    let right = self.eval_expr(rhs)?;
                    operators::apply_binary(*op, left, right, expr.range)
                }
            },

            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                operators::apply_unary(*op, value, expr.range, &self.arena)
            }

            ExprKind::Index { obj, key } => {
                let table = self.eval_expr(obj)?;
                let key = self.eval_expr(key)?;
                self.index_get(&table, &key, expr.range)
            }

            ExprKind::Field { obj, name } => {
                let table = self.eval_expr(obj)?;
                self.index_get(&table, &Value::from(name.as_str()), expr.range)
            }

            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => {
                Ok(self.eval_call_expr(expr)?.first())
            }

            ExprKind::TableCtor { fields } => self.eval_table_ctor(fields, expr.range),
        }
    }

    /// Evaluate preserving multiple results (calls and `...`).
    fn eval_expr_multi(&mut self, expr: &Expr) -> Result<Vallist, LuaError> {
        match &expr.kind {
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } => self.eval_call_expr(expr),
            ExprKind::Vararg => Ok(self.env.varargs()),
            _ => Ok(Vallist::of(self.eval_expr(expr)?)),
        }
    }

    /// An expression list: every expression yields one value except the
    /// last, which spreads its whole result.
    fn eval_explist(&mut self, exprs: &[Expr]) -> Result<Vallist, LuaError> {
        let mut list = Vallist::new();
        if let Some((last, init)) = exprs.split_last() {
            for expr in init {
                list.push(self.eval_expr(expr)?);
            }
            if last.is_multi_value() {
                list.extend(self.eval_expr_multi(last)?);
            } else {
                list.push(self.eval_expr(last)?);
            }
        }
        Ok(list)
    }

    fn eval_table_ctor(&mut self, fields: &[Field], range: Range) -> Result<Value, LuaError> {
        let handle = self.arena.allocate();
        let mut next_index: i64 = 1;

        for (position, field) in fields.iter().enumerate() {
            match field {
                Field::Positional(expr) => {
                    let is_last = position == fields.len() - 1;
                    if is_last && expr.is_multi_value() {
                        for value in self.eval_expr_multi(expr)? {
                            self.arena
                                .get_mut(handle)
                                .set(Value::from(next_index), value)?;
                            next_index += 1;
                        }
                    } else {
                        let value = self.eval_expr(expr)?;
                        self.arena
                            .get_mut(handle)
                            .set(Value::from(next_index), value)?;
                        next_index += 1;
                    }
                }
                Field::Named { name, value } => {
                    let value = self.eval_expr(value)?;
                    self.arena
                        .get_mut(handle)
                        .set(Value::from(name.as_str()), value)?;
                }
                Field::Keyed { key, value } => {
                    let key = self.eval_expr(key)?;
                    let value = self.eval_expr(value)?;
                    self.arena.get_mut(handle).set(key, value)?;
                }
            }
        }

        Ok(Value::from(handle).with_origin(Origin::Literal { range }))
    }

    /* ═════════════════════ calls ═════════════════════ */

    fn eval_call_expr(&mut self, expr: &Expr) -> Result<Vallist, LuaError> {
        match &expr.kind {
            ExprKind::Call { callee, args } => {
                let function = self.eval_expr(callee)?;
                let arguments = self.eval_explist(args)?;
                self.call_value(&function, arguments, expr.range, callee_hint(callee))
            }
            ExprKind::MethodCall { obj, method, args } => {
                // the receiver is evaluated exactly once
                let receiver = self.eval_expr(obj)?;
                let function = self.index_get(&receiver, &Value::from(method.as_str()), expr.range)?;
                let mut arguments = Vallist::of(receiver);
                arguments.extend(self.eval_explist(args)?);
                self.call_value(&function, arguments, expr.range, Some(method))
            }
            _ => unreachable!("eval_call_expr on a non-call expression"),
        }
    }

    /// Call any callable value with already-evaluated arguments.
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vallist,
        range: Range,
        name_hint: Option<&str>,
    ) -> Result<Vallist, LuaError> {
        match callee.raw() {
            RawValue::Function(FunctionValue::Native(native)) => {
                let native = Rc::clone(native);
                trace!(name = native.name(), "native call");
                let result = native
                    .call(self, &args, range)
                    .map_err(|e| e.with_frame(native.name(), range))?;
                if let Some(change) = result.source_change {
                    self.suggestions.push(change);
                }
                Ok(result.values)
            }

            RawValue::Function(FunctionValue::Closure(closure)) => {
                let closure = Rc::clone(closure);
                let trace_name = closure
                    .name
                    .clone()
                    .or_else(|| name_hint.map(str::to_string))
                    .unwrap_or_else(|| "?".to_string());
                trace!(name = %trace_name, "call");

                let params = &closure.body.params;
                let varargs = if closure.body.is_vararg {
                    Some(args.iter().skip(params.len()).cloned().collect())
                } else {
                    None
                };

                let saved = self.env.current_frame();
                self.env.push_call_frame(closure.captured, varargs);
                for (position, param) in params.iter().enumerate() {
                    self.env.declare_local(param.name.as_str(), args.get(position));
                }
                let flow = self.eval_block(&closure.body.block);
                self.env.restore_frame(saved);

                match flow.map_err(|e| e.with_frame(trace_name.clone(), range))? {
                    Flow::Return(values) => Ok(values),
                    Flow::Normal => Ok(Vallist::new()),
                    Flow::Break => Err(LuaError::type_error("break outside a loop")
                        .with_frame(trace_name, range)),
                    Flow::Goto(label) => Err(LuaError::type_error(format!(
                        "no visible label '{label}' for goto"
                    ))
                    .with_frame(trace_name, range)),
                }
            }

            RawValue::Nil => match name_hint {
                Some(name) => Err(LuaError::new(bilua_common::LuaErrorKind::UndefinedName)
                    .with_message(format!("attempt to call a nil value (name '{name}')"))),
                None => Err(LuaError::type_error("attempt to call a nil value")),
            },

            _ => Err(LuaError::type_error(format!(
                "attempt to call a {} value",
                callee.type_name()
            ))),
        }
    }

    /* ═════════════════════ indexing ═════════════════════ */

    /// Table read honouring `__index` chains (tables or functions).
    pub fn index_get(&mut self, obj: &Value, key: &Value, range: Range) -> Result<Value, LuaError> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            let handle = match current.raw() {
                RawValue::Table(handle) => *handle,
                _ => {
                    return Err(LuaError::type_error(format!(
                        "attempt to index a {} value",
                        current.type_name()
                    )));
                }
            };

            let value = self.arena.get(handle).get(key);
            if !value.is_nil() {
                return Ok(value);
            }

            let Some(meta) = self.arena.get(handle).metatable() else {
                return Ok(Value::nil());
            };
            let index_slot = self.arena.get(meta).get(&Value::from("__index"));
            if index_slot.is_nil() {
                return Ok(Value::nil());
            }
            if index_slot.is_function() {
                let mut args = Vallist::of(current);
                args.push(key.clone());
                return Ok(self
                    .call_value(&index_slot, args, range, Some("__index"))?
                    .first());
            }
            current = index_slot;
        }
        Err(LuaError::type_error("'__index' chain too long; possible loop"))
    }

    /// Table write honouring `__newindex` when the key is absent.
    pub fn index_set(
        &mut self,
        obj: &Value,
        key: Value,
        value: Value,
        range: Range,
    ) -> Result<(), LuaError> {
        let mut current = obj.clone();
        for _ in 0..MAX_META_CHAIN {
            let handle = match current.raw() {
                RawValue::Table(handle) => *handle,
                _ => {
                    return Err(LuaError::type_error(format!(
                        "attempt to index a {} value",
                        current.type_name()
                    )));
                }
            };

            let present = !self.arena.get(handle).get(&key).is_nil();
            let newindex_slot = if present {
                Value::nil()
            } else {
                match self.arena.get(handle).metatable() {
                    Some(meta) => self.arena.get(meta).get(&Value::from("__newindex")),
                    None => Value::nil(),
                }
            };

            if newindex_slot.is_nil() {
                return self.arena.get_mut(handle).set(key, value);
            }
            if newindex_slot.is_function() {
                let mut args = Vallist::of(current);
                args.push(key);
                args.push(value);
                self.call_value(&newindex_slot, args, range, Some("__newindex"))?;
                return Ok(());
            }
            current = newindex_slot;
        }
        Err(LuaError::type_error(
            "'__newindex' chain too long; possible loop",
        ))
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new()
    }
}

fn find_label(block: &Block, label: &str) -> Option<usize> {
    block.stats.iter().position(
        |stat| matches!(&stat.kind, StatKind::Label { name } if name == label),
    )
}

/// Trace-friendly name for a callee expression.
fn callee_hint(callee: &Expr) -> Option<&str> {
    match &callee.kind {
        ExprKind::Name(name) => Some(name),
        ExprKind::Field { name, .. } => Some(name),
        ExprKind::Paren(inner) => callee_hint(inner),
        _ => None,
    }
}

/// Name recorded on a closure declared through `function target() end`.
fn declared_name(target: &Expr) -> Option<String> {
    match &target.kind {
        ExprKind::Name(name) => Some(name.clone()),
        ExprKind::Field { name, .. } => Some(name.clone()),
        _ => None,
    }
}
