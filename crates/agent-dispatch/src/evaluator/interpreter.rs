//! Tree-walking interpreter over the parsed statements.

use super::{
    ScriptError,
    parser::{BinaryOp, Expr, LogicalOp, Stmt, UnaryOp, number_literal},
};
use crate::Map;
use serde_json::Value;
use std::{
    collections::HashMap,
    io,
    time::{Duration, Instant},
};

/// How often the wall clock is checked, in steps.
const CLOCK_INTERVAL: u64 = 256;

/// Deepest nesting of arrays and objects a value may reach.
const MAX_VALUE_DEPTH: usize = 128;

/// Approximate size of a value node, not counting its text.
const NODE_SIZE: usize = 16;

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum ScriptValue {
    Undefined,
    Json(Value),
    Namespace(Namespace),
    Function(GlobalFn),
}

/// Builtin namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Namespace {
    Math,
    Json,
    Console,
    Object,
    Array,
}

/// Builtin global functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum GlobalFn {
    String,
    Number,
    Boolean,
    Error,
    TypeError,
    ParseInt,
    ParseFloat,
    IsNaN,
}

/// How a script finished.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Completion {
    /// The script returned a value; `None` stands for `undefined`.
    Value(Option<Value>),
    /// The script threw; the payload is the rendered error message.
    Thrown(String),
}

enum Flow {
    Normal,
    Return(ScriptValue),
    Break,
    Continue,
}

enum Interrupt {
    Throw(ScriptValue),
    Fatal(ScriptError),
}

type Exec<T> = Result<T, Interrupt>;

/// Limits of a single run.
#[derive(Debug, Clone, Copy)]
pub(super) struct Limits {
    pub(super) max_steps: u64,
    pub(super) timeout: Duration,
    pub(super) max_value_size: usize,
}

impl Limits {
    /// Fails if a string of `len` bytes would exceed the value size limit.
    fn check_len(&self, len: usize) -> Exec<()> {
        if len.saturating_add(NODE_SIZE) > self.max_value_size {
            Err(self.exceeded())
        } else {
            Ok(())
        }
    }

    /// Fails if the value exceeds the size or nesting limits.
    fn check_value(&self, value: &Value) -> Exec<()> {
        match value_size(value, 0, self.max_value_size) {
            Some(_) => Ok(()),
            None => Err(self.exceeded()),
        }
    }

    fn exceeded(&self) -> Interrupt {
        Interrupt::Fatal(ScriptError::ResourceLimit(format!(
            "values are limited to {} bytes and {MAX_VALUE_DEPTH} levels of nesting",
            self.max_value_size
        )))
    }
}

/// Returns the approximate size of the value, or `None` if it exceeds the budget
/// or nests deeper than [`MAX_VALUE_DEPTH`].
fn value_size(value: &Value, depth: usize, budget: usize) -> Option<usize> {
    if depth > MAX_VALUE_DEPTH {
        return None;
    }
    let mut size = NODE_SIZE;
    match value {
        Value::String(s) => size += s.len(),
        Value::Array(items) => {
            for item in items {
                size += value_size(item, depth + 1, budget.checked_sub(size)?)?;
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                size += key.len();
                size += value_size(item, depth + 1, budget.checked_sub(size)?)?;
            }
        }
        _ => {}
    }
    (size <= budget).then_some(size)
}

/// Runs a program in a fresh scope seeded with the globals.
pub(super) fn run(program: &[Stmt], globals: Map, limits: Limits) -> Result<Completion, ScriptError> {
    let root = globals
        .into_iter()
        .map(|(name, value)| (name, ScriptValue::Json(value)))
        .collect();
    let mut interpreter = Interpreter {
        scopes: vec![root],
        steps: 0,
        limits,
        deadline: Instant::now() + limits.timeout,
        completion: ScriptValue::Undefined,
    };
    match interpreter.exec_stmts(program) {
        Ok(Flow::Return(value)) => Ok(Completion::Value(value.into_json())),
        Ok(_) => Ok(Completion::Value(interpreter.completion.into_json())),
        Err(Interrupt::Throw(value)) => Ok(Completion::Thrown(error_message(&value))),
        Err(Interrupt::Fatal(err)) => Err(err),
    }
}

struct Interpreter {
    scopes: Vec<HashMap<String, ScriptValue>>,
    steps: u64,
    limits: Limits,
    deadline: Instant,
    completion: ScriptValue,
}

impl Interpreter {
    fn tick(&mut self) -> Exec<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Interrupt::Fatal(ScriptError::StepLimit(self.limits.max_steps)));
        }
        if self.steps % CLOCK_INTERVAL == 0 && Instant::now() > self.deadline {
            return Err(Interrupt::Fatal(ScriptError::Timeout(self.limits.timeout)));
        }
        Ok(())
    }

    /// Checks the size of a freshly built value.
    fn guard(&self, value: ScriptValue) -> Exec<ScriptValue> {
        if let ScriptValue::Json(json) = &value {
            self.limits.check_value(json)?;
        }
        Ok(value)
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Exec<Flow> {
        for stmt in stmts {
            let flow = self.exec(stmt)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Exec<Flow> {
        self.scopes.push(HashMap::new());
        let flow = self.exec_stmts(stmts);
        self.scopes.pop();
        flow
    }

    fn exec(&mut self, stmt: &Stmt) -> Exec<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Declare(bindings) => {
                for (name, init) in bindings {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => ScriptValue::Undefined,
                    };
                    self.declare(name, value);
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.completion = self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::If(test, consequent, alternate) => {
                if self.eval(test)?.is_truthy() {
                    self.exec(consequent)
                } else if let Some(alternate) = alternate {
                    self.exec(alternate)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(test, body) => {
                while self.eval(test)?.is_truthy() {
                    match self.exec(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => self.tick()?,
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                self.scopes.push(HashMap::new());
                let flow = self.exec_for(init.as_deref(), test.as_ref(), update.as_ref(), body);
                self.scopes.pop();
                flow
            }
            Stmt::ForOf(name, iterable, body) => {
                let items = match self.eval(iterable)? {
                    ScriptValue::Json(Value::Array(items)) => {
                        items.into_iter().map(ScriptValue::Json).collect::<Vec<_>>()
                    }
                    ScriptValue::Json(Value::String(s)) => s
                        .chars()
                        .map(|ch| ScriptValue::Json(Value::String(ch.to_string())))
                        .collect(),
                    other => {
                        return Err(type_error(format!(
                            "{} is not iterable",
                            other.to_js_string()
                        )));
                    }
                };
                for item in items {
                    self.scopes.push(HashMap::from([(name.clone(), item)]));
                    let flow = self.exec(body);
                    self.scopes.pop();
                    match flow? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => self.tick()?,
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Block(stmts) => self.exec_block(stmts),
            Stmt::Return(argument) => {
                let value = match argument {
                    Some(expr) => self.eval(expr)?,
                    None => ScriptValue::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Throw(argument) => Err(Interrupt::Throw(self.eval(argument)?)),
            Stmt::Try {
                body,
                param,
                handler,
                finalizer,
            } => {
                let result = match (self.exec_block(body), handler) {
                    (Err(Interrupt::Throw(error)), Some(handler)) => {
                        let mut scope = HashMap::new();
                        if let Some(param) = param {
                            scope.insert(param.clone(), error);
                        }
                        self.scopes.push(scope);
                        let result = self.exec_stmts(handler);
                        self.scopes.pop();
                        result
                    }
                    (result, _) => result,
                };
                if let Some(finalizer) = finalizer {
                    let flow = self.exec_block(finalizer)?;
                    if !matches!(flow, Flow::Normal) {
                        return Ok(flow);
                    }
                }
                result
            }
            Stmt::Break => Ok(Flow::Break),
            Stmt::Continue => Ok(Flow::Continue),
            Stmt::Empty => Ok(Flow::Normal),
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Exec<Flow> {
        if let Some(init) = init {
            self.exec(init)?;
        }
        loop {
            if let Some(test) = test {
                if !self.eval(test)?.is_truthy() {
                    break;
                }
            }
            match self.exec(body)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(update) = update {
                self.eval(update)?;
            }
            self.tick()?;
        }
        Ok(Flow::Normal)
    }

    fn declare(&mut self, name: &str, value: ScriptValue) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), value);
        }
    }

    fn lookup(&self, name: &str) -> Option<ScriptValue> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .or_else(|| builtin(name))
    }

    fn eval(&mut self, expr: &Expr) -> Exec<ScriptValue> {
        self.tick()?;
        match expr {
            Expr::Literal(value) => Ok(ScriptValue::Json(value.clone())),
            Expr::Undefined => Ok(ScriptValue::Undefined),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| reference_error(format!("{name} is not defined"))),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?.into_json().unwrap_or(Value::Null));
                }
                self.guard(ScriptValue::Json(Value::Array(values)))
            }
            Expr::Object(properties) => {
                let mut map = Map::new();
                for (key, value) in properties {
                    if let Some(value) = self.eval(value)?.into_json() {
                        map.insert(key.clone(), value);
                    }
                }
                self.guard(ScriptValue::Json(Value::Object(map)))
            }
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let object = self.eval(object)?;
                if *optional && object.is_nullish() {
                    return Ok(ScriptValue::Undefined);
                }
                let key = self.eval(property)?.to_js_string();
                get_property(&object, &key)
            }
            Expr::Call(callee, args) => {
                let value = self.call(callee, args)?;
                self.guard(value)
            }
            Expr::Unary(op, argument) => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, argument.as_ref()) {
                    let value = self.lookup(name).unwrap_or(ScriptValue::Undefined);
                    return Ok(string(value.type_of()));
                }
                let value = self.eval(argument)?;
                Ok(match op {
                    UnaryOp::Not => ScriptValue::Json(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => number(-value.to_number()),
                    UnaryOp::Plus => number(value.to_number()),
                    UnaryOp::TypeOf => string(value.type_of()),
                })
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right, &self.limits)
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Coalesce => !left.is_nullish(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Assign(op, target, value) => {
                let value = match op {
                    Some(op) => {
                        let current = self.eval(target)?;
                        let rhs = self.eval(value)?;
                        binary(*op, &current, &rhs, &self.limits)?
                    }
                    None => self.eval(value)?,
                };
                self.assign(target, value.clone())?;
                Ok(value)
            }
            Expr::Update {
                target,
                delta,
                prefix,
            } => {
                let old = self.eval(target)?.to_number();
                let new = number(old + delta);
                self.assign(target, new.clone())?;
                Ok(if *prefix { new } else { number(old) })
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: ScriptValue) -> Exec<()> {
        let (root, keys) = self.place(target)?;
        let limits = self.limits;
        let Some(slot) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(&root))
        else {
            return Err(reference_error(format!("{root} is not defined")));
        };
        let Some((last, path)) = keys.split_last() else {
            *slot = value;
            return Ok(());
        };
        let ScriptValue::Json(current) = &mut *slot else {
            return Err(type_error(format!("cannot set properties of {root}")));
        };
        let mut current: &mut Value = current;
        for key in path {
            current = match current {
                Value::Object(map) => map.get_mut(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
                _ => None,
            }
            .ok_or_else(|| type_error(format!("cannot set properties of undefined (setting '{last}')")))?;
        }
        let value = value.into_json().unwrap_or(Value::Null);
        match current {
            Value::Object(map) => {
                map.insert(last.clone(), value);
            }
            Value::Array(items) => {
                let index = last
                    .parse::<usize>()
                    .map_err(|_| type_error(format!("invalid array index '{last}'")))?;
                if index >= items.len() {
                    limits.check_len(index.saturating_add(1).saturating_mul(NODE_SIZE))?;
                    items.resize(index + 1, Value::Null);
                }
                items[index] = value;
            }
            other => {
                return Err(type_error(format!(
                    "cannot set property '{last}' of {}",
                    ScriptValue::Json(other.clone()).type_of()
                )));
            }
        }
        match slot {
            ScriptValue::Json(value) => limits.check_value(value),
            _ => Ok(()),
        }
    }

    /// Resolves an assignment target into its root variable and property path.
    fn place(&mut self, target: &Expr) -> Exec<(String, Vec<String>)> {
        match target {
            Expr::Ident(name) => Ok((name.clone(), Vec::new())),
            Expr::Member {
                object, property, ..
            } => {
                let (root, mut keys) = self.place(object)?;
                keys.push(self.eval(property)?.to_js_string());
                Ok((root, keys))
            }
            _ => Err(reference_error("invalid assignment target".to_owned())),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Exec<Vec<ScriptValue>> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Exec<ScriptValue> {
        if let Expr::Member {
            object,
            property,
            optional,
        } = callee
        {
            let receiver = self.eval(object)?;
            if *optional && receiver.is_nullish() {
                return Ok(ScriptValue::Undefined);
            }
            let method = self.eval(property)?.to_js_string();
            let args = self.eval_args(args)?;
            return match (&receiver, method.as_str()) {
                (ScriptValue::Namespace(namespace), _) => {
                    call_namespace(*namespace, &method, &args, &self.limits)
                }
                (ScriptValue::Json(Value::Array(items)), "push" | "pop") => {
                    let mut items = items.clone();
                    let result = if method == "push" {
                        items.extend(args.into_iter().map(|arg| arg.into_json().unwrap_or(Value::Null)));
                        number(items.len() as f64)
                    } else {
                        items.pop().map(ScriptValue::Json).unwrap_or(ScriptValue::Undefined)
                    };
                    let items = self.guard(ScriptValue::Json(Value::Array(items)))?;
                    self.assign(object, items)?;
                    Ok(result)
                }
                _ => call_method(&receiver, &method, &args, &self.limits),
            };
        }
        let function = self.eval(callee)?;
        let args = self.eval_args(args)?;
        match function {
            ScriptValue::Function(function) => call_global(function, &args),
            other => Err(type_error(format!(
                "{} is not a function",
                other.to_js_string()
            ))),
        }
    }
}

impl ScriptValue {
    fn into_json(self) -> Option<Value> {
        match self {
            ScriptValue::Undefined => None,
            ScriptValue::Json(value) => Some(value),
            other => Some(Value::String(other.to_js_string())),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Json(Value::Null))
    }

    fn is_truthy(&self) -> bool {
        match self {
            ScriptValue::Undefined => false,
            ScriptValue::Json(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
                Value::String(s) => !s.is_empty(),
                Value::Array(_) | Value::Object(_) => true,
            },
            ScriptValue::Namespace(_) | ScriptValue::Function(_) => true,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            ScriptValue::Json(value) => match value {
                Value::Null => 0.0,
                Value::Bool(b) => f64::from(u8::from(*b)),
                Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
                Value::String(s) => {
                    let s = s.trim();
                    if s.is_empty() {
                        0.0
                    } else {
                        s.parse().unwrap_or(f64::NAN)
                    }
                }
                _ => f64::NAN,
            },
            _ => f64::NAN,
        }
    }

    fn to_js_string(&self) -> String {
        match self {
            ScriptValue::Undefined => "undefined".to_owned(),
            ScriptValue::Json(value) => match value {
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::Null => String::new(),
                        item => ScriptValue::Json(item.clone()).to_js_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                Value::Object(_) => "[object Object]".to_owned(),
                other => other.to_string(),
            },
            ScriptValue::Namespace(namespace) => format!("[object {namespace:?}]"),
            ScriptValue::Function(function) => format!("function {function:?}() {{ [native code] }}"),
        }
    }

    fn type_of(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Json(value) => match value {
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                _ => "object",
            },
            ScriptValue::Namespace(_) => "object",
            ScriptValue::Function(_) => "function",
        }
    }
}

fn builtin(name: &str) -> Option<ScriptValue> {
    let value = match name {
        "Math" => ScriptValue::Namespace(Namespace::Math),
        "JSON" => ScriptValue::Namespace(Namespace::Json),
        "console" => ScriptValue::Namespace(Namespace::Console),
        "Object" => ScriptValue::Namespace(Namespace::Object),
        "Array" => ScriptValue::Namespace(Namespace::Array),
        "String" => ScriptValue::Function(GlobalFn::String),
        "Number" => ScriptValue::Function(GlobalFn::Number),
        "Boolean" => ScriptValue::Function(GlobalFn::Boolean),
        "Error" => ScriptValue::Function(GlobalFn::Error),
        "TypeError" => ScriptValue::Function(GlobalFn::TypeError),
        "parseInt" => ScriptValue::Function(GlobalFn::ParseInt),
        "parseFloat" => ScriptValue::Function(GlobalFn::ParseFloat),
        "isNaN" => ScriptValue::Function(GlobalFn::IsNaN),
        _ => return None,
    };
    Some(value)
}

fn number(n: f64) -> ScriptValue {
    ScriptValue::Json(number_literal(n))
}

fn string(s: impl Into<String>) -> ScriptValue {
    ScriptValue::Json(Value::String(s.into()))
}

fn error_object(name: &str, message: String) -> ScriptValue {
    let mut map = Map::new();
    map.insert("name".to_owned(), Value::String(name.to_owned()));
    map.insert("message".to_owned(), Value::String(message));
    ScriptValue::Json(Value::Object(map))
}

fn type_error(message: String) -> Interrupt {
    Interrupt::Throw(error_object("TypeError", message))
}

fn reference_error(message: String) -> Interrupt {
    Interrupt::Throw(error_object("ReferenceError", message))
}

/// Renders a thrown value as an error message.
fn error_message(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Json(Value::String(s)) => s.clone(),
        ScriptValue::Json(Value::Object(map)) if map.contains_key("message") => {
            let name = map.get("name").and_then(Value::as_str).unwrap_or("Error");
            let message = ScriptValue::Json(map["message"].clone()).to_js_string();
            format!("{name}: {message}")
        }
        ScriptValue::Json(value) => value.to_string(),
        other => other.to_js_string(),
    }
}

fn arg(args: &[ScriptValue], index: usize) -> ScriptValue {
    args.get(index).cloned().unwrap_or(ScriptValue::Undefined)
}

fn strict_equals(left: &ScriptValue, right: &ScriptValue) -> bool {
    match (left, right) {
        (ScriptValue::Json(Value::Number(a)), ScriptValue::Json(Value::Number(b))) => {
            a.as_f64() == b.as_f64()
        }
        _ => left == right,
    }
}

fn loose_equals(left: &ScriptValue, right: &ScriptValue) -> bool {
    if left.is_nullish() || right.is_nullish() {
        return left.is_nullish() && right.is_nullish();
    }
    match (left, right) {
        (ScriptValue::Json(a), ScriptValue::Json(b))
            if matches!(a, Value::Number(_) | Value::Bool(_))
                || matches!(b, Value::Number(_) | Value::Bool(_)) =>
        {
            !a.is_object() && !b.is_object() && !a.is_array() && !b.is_array()
                && left.to_number() == right.to_number()
        }
        _ => strict_equals(left, right),
    }
}

fn binary(
    op: BinaryOp,
    left: &ScriptValue,
    right: &ScriptValue,
    limits: &Limits,
) -> Exec<ScriptValue> {
    let boolean = |b: bool| ScriptValue::Json(Value::Bool(b));
    let is_textual = |value: &ScriptValue| {
        matches!(
            value,
            ScriptValue::Json(Value::String(_) | Value::Array(_) | Value::Object(_))
        )
    };
    let value = match op {
        BinaryOp::Add if is_textual(left) || is_textual(right) => {
            let (left, right) = (left.to_js_string(), right.to_js_string());
            limits.check_len(left.len() + right.len())?;
            string(left + &right)
        }
        BinaryOp::Add => number(left.to_number() + right.to_number()),
        BinaryOp::Sub => number(left.to_number() - right.to_number()),
        BinaryOp::Mul => number(left.to_number() * right.to_number()),
        BinaryOp::Div => number(left.to_number() / right.to_number()),
        BinaryOp::Rem => number(left.to_number() % right.to_number()),
        BinaryOp::Pow => number(left.to_number().powf(right.to_number())),
        BinaryOp::Eq => boolean(loose_equals(left, right)),
        BinaryOp::NotEq => boolean(!loose_equals(left, right)),
        BinaryOp::StrictEq => boolean(strict_equals(left, right)),
        BinaryOp::StrictNotEq => boolean(!strict_equals(left, right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = match (left, right) {
                (ScriptValue::Json(Value::String(a)), ScriptValue::Json(Value::String(b))) => {
                    Some(a.cmp(b))
                }
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            boolean(ordering.is_some_and(|ordering| match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::LtEq => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
    };
    Ok(value)
}

fn get_property(object: &ScriptValue, key: &str) -> Exec<ScriptValue> {
    let value = match object {
        ScriptValue::Undefined | ScriptValue::Json(Value::Null) => {
            return Err(type_error(format!(
                "cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            )));
        }
        ScriptValue::Json(Value::String(s)) => match key {
            "length" => number(s.chars().count() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|index| s.chars().nth(index))
                .map(|ch| string(ch.to_string()))
                .unwrap_or(ScriptValue::Undefined),
        },
        ScriptValue::Json(Value::Array(items)) => match key {
            "length" => number(items.len() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .cloned()
                .map(ScriptValue::Json)
                .unwrap_or(ScriptValue::Undefined),
        },
        ScriptValue::Json(Value::Object(map)) => map
            .get(key)
            .cloned()
            .map(ScriptValue::Json)
            .unwrap_or(ScriptValue::Undefined),
        ScriptValue::Namespace(Namespace::Math) => match key {
            "PI" => number(std::f64::consts::PI),
            "E" => number(std::f64::consts::E),
            _ => ScriptValue::Undefined,
        },
        _ => ScriptValue::Undefined,
    };
    Ok(value)
}

fn call_global(function: GlobalFn, args: &[ScriptValue]) -> Exec<ScriptValue> {
    let first = arg(args, 0);
    let value = match function {
        GlobalFn::String => string(if args.is_empty() {
            String::new()
        } else {
            first.to_js_string()
        }),
        GlobalFn::Number => number(if args.is_empty() { 0.0 } else { first.to_number() }),
        GlobalFn::Boolean => ScriptValue::Json(Value::Bool(first.is_truthy())),
        GlobalFn::Error => error_object("Error", message_arg(&first)),
        GlobalFn::TypeError => error_object("TypeError", message_arg(&first)),
        GlobalFn::ParseInt => {
            let text = first.to_js_string();
            let text = text.trim();
            let digits = text
                .char_indices()
                .take_while(|(i, ch)| ch.is_ascii_digit() || (*i == 0 && matches!(ch, '-' | '+')))
                .map(|(_, ch)| ch)
                .collect::<String>();
            digits
                .parse::<i64>()
                .map(|n| number(n as f64))
                .unwrap_or(ScriptValue::Json(Value::Null))
        }
        GlobalFn::ParseFloat => {
            let text = first.to_js_string();
            let text = text.trim();
            let end = (1..=text.len())
                .rev()
                .find(|&end| text.is_char_boundary(end) && text[..end].parse::<f64>().is_ok());
            end.and_then(|end| text[..end].parse::<f64>().ok())
                .map(number)
                .unwrap_or(ScriptValue::Json(Value::Null))
        }
        GlobalFn::IsNaN => ScriptValue::Json(Value::Bool(first.to_number().is_nan())),
    };
    Ok(value)
}

fn message_arg(value: &ScriptValue) -> String {
    match value {
        ScriptValue::Undefined => String::new(),
        value => value.to_js_string(),
    }
}

fn call_namespace(
    namespace: Namespace,
    method: &str,
    args: &[ScriptValue],
    limits: &Limits,
) -> Exec<ScriptValue> {
    let first = arg(args, 0);
    let value = match (namespace, method) {
        (Namespace::Math, "max") => number(
            args.iter()
                .map(ScriptValue::to_number)
                .fold(f64::NEG_INFINITY, f64::max),
        ),
        (Namespace::Math, "min") => number(
            args.iter()
                .map(ScriptValue::to_number)
                .fold(f64::INFINITY, f64::min),
        ),
        (Namespace::Math, "pow") => number(first.to_number().powf(arg(args, 1).to_number())),
        (Namespace::Math, name) => {
            let n = first.to_number();
            let result = match name {
                "floor" => n.floor(),
                "ceil" => n.ceil(),
                "round" => (n + 0.5).floor(),
                "abs" => n.abs(),
                "sqrt" => n.sqrt(),
                "trunc" => n.trunc(),
                "sign" => {
                    if n == 0.0 {
                        0.0
                    } else {
                        n.signum()
                    }
                }
                _ => return Err(not_a_function("Math", name)),
            };
            number(result)
        }
        (Namespace::Json, "stringify") => match first.into_json() {
            Some(value) => {
                let mut writer = BoundedWriter {
                    buf: Vec::new(),
                    limit: limits.max_value_size,
                };
                let result = if arg(args, 2).to_number() > 0.0 {
                    serde_json::to_writer_pretty(&mut writer, &value)
                } else {
                    serde_json::to_writer(&mut writer, &value)
                };
                if let Err(err) = result {
                    return Err(if err.is_io() {
                        limits.exceeded()
                    } else {
                        type_error(err.to_string())
                    });
                }
                string(String::from_utf8_lossy(&writer.buf).into_owned())
            }
            None => ScriptValue::Undefined,
        },
        (Namespace::Json, "parse") => {
            let text = first.to_js_string();
            let value = serde_json::from_str::<Value>(&text).map_err(|err| {
                Interrupt::Throw(error_object("SyntaxError", err.to_string()))
            })?;
            ScriptValue::Json(value)
        }
        (Namespace::Console, "log" | "info" | "warn" | "error" | "debug") => {
            let line = args
                .iter()
                .map(|arg| match arg {
                    ScriptValue::Json(value @ (Value::Object(_) | Value::Array(_))) => {
                        value.to_string()
                    }
                    arg => arg.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(" ");
            tracing::debug!(target: "agent_dispatch::script", method, "{line}");
            ScriptValue::Undefined
        }
        (Namespace::Object, "keys" | "values" | "entries") => {
            let ScriptValue::Json(Value::Object(map)) = first else {
                return Ok(ScriptValue::Json(Value::Array(Vec::new())));
            };
            let items = map
                .into_iter()
                .map(|(key, value)| match method {
                    "keys" => Value::String(key),
                    "values" => value,
                    _ => Value::Array(vec![Value::String(key), value]),
                })
                .collect();
            ScriptValue::Json(Value::Array(items))
        }
        (Namespace::Array, "isArray") => {
            ScriptValue::Json(Value::Bool(matches!(first, ScriptValue::Json(Value::Array(_)))))
        }
        (namespace, method) => return Err(not_a_function(&format!("{namespace:?}"), method)),
    };
    Ok(value)
}

fn not_a_function(receiver: &str, method: &str) -> Interrupt {
    type_error(format!("{receiver}.{method} is not a function"))
}

/// Converts a possibly negative relative index into an absolute position.
fn relative_index(value: &ScriptValue, len: usize, default: usize) -> usize {
    if matches!(value, ScriptValue::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

/// Output buffer that refuses to grow past the value size limit.
struct BoundedWriter {
    buf: Vec<u8>,
    limit: usize,
}

impl io::Write for BoundedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.limit {
            return Err(io::Error::other("value size limit exceeded"));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Joins the parts while keeping the output within the value size limit.
fn join_bounded(
    parts: impl IntoIterator<Item = String>,
    separator: &str,
    limits: &Limits,
) -> Exec<String> {
    let mut output = String::new();
    for (index, part) in parts.into_iter().enumerate() {
        if index > 0 {
            limits.check_len(output.len() + separator.len())?;
            output.push_str(separator);
        }
        limits.check_len(output.len() + part.len())?;
        output.push_str(&part);
    }
    Ok(output)
}

fn call_method(
    receiver: &ScriptValue,
    method: &str,
    args: &[ScriptValue],
    limits: &Limits,
) -> Exec<ScriptValue> {
    let first = arg(args, 0);
    let value = match receiver {
        ScriptValue::Json(Value::String(s)) => {
            let needle = first.to_js_string();
            match method {
                "toUpperCase" => string(s.to_uppercase()),
                "toLowerCase" => string(s.to_lowercase()),
                "trim" => string(s.trim()),
                "trimStart" => string(s.trim_start()),
                "trimEnd" => string(s.trim_end()),
                "toString" => string(s.as_str()),
                "includes" => ScriptValue::Json(Value::Bool(s.contains(&needle))),
                "startsWith" => ScriptValue::Json(Value::Bool(s.starts_with(&needle))),
                "endsWith" => ScriptValue::Json(Value::Bool(s.ends_with(&needle))),
                "indexOf" => number(
                    s.find(&needle)
                        .map(|index| s[..index].chars().count() as f64)
                        .unwrap_or(-1.0),
                ),
                "split" => {
                    let parts = match first {
                        ScriptValue::Undefined => vec![Value::String(s.clone())],
                        _ if needle.is_empty() => {
                            s.chars().map(|ch| Value::String(ch.to_string())).collect()
                        }
                        _ => s
                            .split(needle.as_str())
                            .map(|part| Value::String(part.to_owned()))
                            .collect(),
                    };
                    ScriptValue::Json(Value::Array(parts))
                }
                "slice" | "substring" => {
                    let chars = s.chars().collect::<Vec<_>>();
                    let start = relative_index(&first, chars.len(), 0);
                    let end = relative_index(&arg(args, 1), chars.len(), chars.len());
                    string(chars[start..end.max(start)].iter().collect::<String>())
                }
                "charAt" => {
                    let index = relative_index(&first, usize::MAX, 0);
                    string(s.chars().nth(index).map(String::from).unwrap_or_default())
                }
                "replace" => {
                    let replacement = arg(args, 1).to_js_string();
                    limits.check_len(s.len() + replacement.len())?;
                    string(s.replacen(&needle, &replacement, 1))
                }
                "replaceAll" => {
                    let replacement = arg(args, 1).to_js_string();
                    let matches = if needle.is_empty() {
                        s.chars().count() + 1
                    } else {
                        s.matches(needle.as_str()).count()
                    };
                    let len = s.len().saturating_add(matches.saturating_mul(replacement.len()));
                    limits.check_len(len)?;
                    string(s.replace(&needle, &replacement))
                }
                "repeat" => {
                    let count = first.to_number();
                    if !(0.0..=10_000.0).contains(&count) {
                        return Err(Interrupt::Throw(error_object(
                            "RangeError",
                            format!("invalid count value: {}", first.to_js_string()),
                        )));
                    }
                    limits.check_len(s.len().saturating_mul(count as usize))?;
                    string(s.repeat(count as usize))
                }
                "concat" => string(join_bounded(
                    std::iter::once(s.clone()).chain(args.iter().map(ScriptValue::to_js_string)),
                    "",
                    limits,
                )?),
                _ => return Err(not_a_function("String", method)),
            }
        }
        ScriptValue::Json(Value::Array(items)) => match method {
            "join" => {
                let separator = match first {
                    ScriptValue::Undefined => ",".to_owned(),
                    separator => separator.to_js_string(),
                };
                let parts = items.iter().map(|item| match item {
                    Value::Null => String::new(),
                    item => ScriptValue::Json(item.clone()).to_js_string(),
                });
                string(join_bounded(parts, &separator, limits)?)
            }
            "includes" => ScriptValue::Json(Value::Bool(
                items
                    .iter()
                    .any(|item| strict_equals(&ScriptValue::Json(item.clone()), &first)),
            )),
            "indexOf" => number(
                items
                    .iter()
                    .position(|item| strict_equals(&ScriptValue::Json(item.clone()), &first))
                    .map(|index| index as f64)
                    .unwrap_or(-1.0),
            ),
            "slice" => {
                let start = relative_index(&first, items.len(), 0);
                let end = relative_index(&arg(args, 1), items.len(), items.len());
                ScriptValue::Json(Value::Array(items[start..end.max(start)].to_vec()))
            }
            "concat" => {
                let mut result = items.clone();
                for arg in args {
                    match arg.clone().into_json() {
                        Some(Value::Array(more)) => result.extend(more),
                        Some(value) => result.push(value),
                        None => result.push(Value::Null),
                    }
                }
                ScriptValue::Json(Value::Array(result))
            }
            "reverse" => ScriptValue::Json(Value::Array(items.iter().rev().cloned().collect())),
            "toString" => string(receiver.to_js_string()),
            _ => return Err(not_a_function("Array", method)),
        },
        ScriptValue::Json(Value::Number(n)) => match method {
            "toFixed" => {
                let digits = first.to_number();
                let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
                string(format!("{:.*}", digits, n.as_f64().unwrap_or(f64::NAN)))
            }
            "toString" => string(receiver.to_js_string()),
            _ => return Err(not_a_function("Number", method)),
        },
        ScriptValue::Json(Value::Object(map)) => match method {
            "hasOwnProperty" => {
                ScriptValue::Json(Value::Bool(map.contains_key(&first.to_js_string())))
            }
            "toString" => string(receiver.to_js_string()),
            _ => return Err(type_error(format!("{method} is not a function"))),
        },
        ScriptValue::Undefined | ScriptValue::Json(Value::Null) => {
            return Err(type_error(format!(
                "cannot read properties of {} (reading '{method}')",
                receiver.to_js_string()
            )));
        }
        _ => return Err(type_error(format!("{method} is not a function"))),
    };
    Ok(value)
}
