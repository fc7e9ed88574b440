//! Tree-walking evaluator over the four sandbox bindings

use std::collections::HashMap;

use thiserror::Error;

use crate::graph::{Component, Event, TopologyGraph};
use crate::sandbox::ast::*;
use crate::sandbox::Scope;
use crate::value::{Value, ValueMap};

/// Names that refer to the host bindings rather than locals
const BINDINGS: &[&str] = &["graph", "component", "event", "repeat_index"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),

    #[error("'{0}' is not available in this context")]
    Unbound(&'static str),

    #[error("cannot assign to '{0}'")]
    ReadOnly(String),

    #[error("'graph' can only be used through its methods")]
    GraphValue,

    #[error("unsupported operand types for {op}: {left} and {right}")]
    Operands {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("bad operand type for unary {op}: {found}")]
    Operand { op: &'static str, found: &'static str },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("{type_name} has no attribute '{attr}'")]
    NoAttribute { type_name: String, attr: String },

    #[error("{type_name} has no method '{method}'")]
    NoMethod { type_name: String, method: String },

    #[error("{function}() takes {expected} argument(s), {found} given")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("{function}() argument must be {expected}, not {found}")]
    ArgumentType {
        function: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("cannot index {container} with {index}")]
    BadIndex {
        container: &'static str,
        index: &'static str,
    },

    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("expression is not callable")]
    NotCallable,

    #[error("cannot convert '{value}' to {target}")]
    Conversion { value: String, target: &'static str },

    #[error("{0}")]
    Lookup(String),
}

pub(crate) struct Evaluator<'s, 'a> {
    scope: &'s mut Scope<'a>,
    locals: HashMap<String, Value>,
}

impl<'s, 'a> Evaluator<'s, 'a> {
    pub fn new(scope: &'s mut Scope<'a>) -> Self {
        Self {
            scope,
            locals: HashMap::new(),
        }
    }

    /// Run every statement; the value of the last expression statement is returned
    pub fn run(&mut self, block: &Block) -> Result<Value, EvalError> {
        let mut last = Value::Null;
        for statement in &block.statements {
            match statement {
                Stmt::Assign(name, expr) => {
                    if BINDINGS.contains(&name.as_str()) {
                        return Err(EvalError::ReadOnly(name.clone()));
                    }
                    let value = self.eval(expr)?;
                    self.locals.insert(name.clone(), value);
                    last = Value::Null;
                }
                Stmt::Expr(expr) => last = self.eval(expr)?,
            }
        }
        Ok(last)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Map(entries) => {
                let mut map = ValueMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                unary(*op, value)
            }
            Expr::Binary(left, BinaryOp::And, right) => {
                if !self.eval(left)?.truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right)?.truthy()))
            }
            Expr::Binary(left, BinaryOp::Or, right) => {
                if self.eval(left)?.truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right)?.truthy()))
            }
            Expr::Binary(left, op, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Attr(base, attr) => {
                let value = self.eval(base)?;
                attribute(&value, attr)
            }
            Expr::Index(base, index) => {
                let container = self.eval(base)?;
                let index = self.eval(index)?;
                subscript(&container, &index)
            }
            Expr::Call(callee, args) => self.call(callee, args),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        match name {
            "repeat_index" => Ok(Value::Int(self.scope.repeat_index)),
            "component" => Ok(self
                .scope
                .component
                .as_deref()
                .map(Component::to_value)
                .unwrap_or_default()),
            "event" => Ok(self
                .scope
                .event
                .as_deref()
                .map(Event::to_value)
                .unwrap_or_default()),
            "graph" => Err(EvalError::GraphValue),
            _ => Err(EvalError::UndefinedName(name.to_string())),
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, EvalError> {
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Result<Vec<_>, _>>()?;

        match callee {
            Expr::Attr(receiver, method) => {
                if let Expr::Name(binding) = receiver.as_ref() {
                    if !self.locals.contains_key(binding) {
                        match binding.as_str() {
                            "graph" => return graph_method(self.scope.graph, method, &args),
                            "component" => return self.component_method(method, args),
                            "event" => return self.event_method(method, args),
                            _ => {}
                        }
                    }
                }
                let value = self.eval(receiver)?;
                value_method(&value, method, &args)
            }
            Expr::Name(name) if !self.locals.contains_key(name) => builtin(name, &args),
            _ => Err(EvalError::NotCallable),
        }
    }

    fn component_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let component = self
            .scope
            .component
            .as_deref_mut()
            .ok_or(EvalError::Unbound("component"))?;

        match method {
            "add_label" => {
                let label = string_arg(method, &args, 0, 1)?;
                component.add_label(label);
            }
            "add_label_kv" => {
                let [key, value] = args_n::<2>(method, &args)?;
                let key = expect_str(method, key)?;
                component.add_label(format!("{}:{}", key, value));
            }
            "add_identifier" => {
                let identifier = string_arg(method, &args, 0, 1)?;
                component.add_identifier(identifier);
            }
            "set_property" => {
                let [key, value] = args_n::<2>(method, &args)?;
                let key = expect_str(method, key)?;
                component
                    .custom_properties
                    .insert(key.to_string(), value.clone());
            }
            "property" => {
                let key = string_arg(method, &args, 0, 1)?;
                return Ok(component
                    .custom_properties
                    .get(key)
                    .cloned()
                    .unwrap_or_default());
            }
            "has_label" => {
                let label = string_arg(method, &args, 0, 1)?;
                return Ok(Value::Bool(component.labels.iter().any(|l| l == label)));
            }
            "set_layer" => component.layer = string_arg(method, &args, 0, 1)?.to_string(),
            "set_domain" => component.domain = string_arg(method, &args, 0, 1)?.to_string(),
            "set_environment" => {
                component.environment = string_arg(method, &args, 0, 1)?.to_string()
            }
            _ => return Err(no_method("component", method)),
        }
        Ok(Value::Null)
    }

    fn event_method(&mut self, method: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let event = self
            .scope
            .event
            .as_deref_mut()
            .ok_or(EvalError::Unbound("event"))?;

        match method {
            "add_tag" => {
                let tag = string_arg(method, &args, 0, 1)?;
                event.tags.push(tag.to_string());
            }
            "add_identifier" => {
                let identifier = string_arg(method, &args, 0, 1)?.to_string();
                if !event.context.element_identifiers.contains(&identifier) {
                    event.context.element_identifiers.push(identifier);
                }
            }
            "set_data" => {
                let [key, value] = args_n::<2>(method, &args)?;
                let key = expect_str(method, key)?;
                event.context.data.insert(key.to_string(), value.clone());
            }
            _ => return Err(no_method("event", method)),
        }
        Ok(Value::Null)
    }
}

fn graph_method(graph: &TopologyGraph, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    match method {
        "component" => {
            let uid = string_arg(method, args, 0, 1)?;
            Ok(graph
                .component(uid)
                .map(Component::to_value)
                .unwrap_or_default())
        }
        "component_by_name" => {
            let name = string_arg(method, args, 0, 1)?;
            let found = graph
                .component_by_name(name)
                .map_err(|e| EvalError::Lookup(e.to_string()))?;
            Ok(found.map(Component::to_value).unwrap_or_default())
        }
        "component_by_name_and_type" => {
            let component_type = string_arg(method, args, 0, 2)?;
            let name = string_arg(method, args, 1, 2)?;
            let found = graph
                .component_by_name_and_type(component_type, name)
                .map_err(|e| EvalError::Lookup(e.to_string()))?;
            Ok(found.map(Component::to_value).unwrap_or_default())
        }
        "exists" => {
            let uid = string_arg(method, args, 0, 1)?;
            Ok(Value::Bool(graph.component_exists(uid)))
        }
        "component_count" => {
            args_n::<0>(method, args)?;
            Ok(Value::Int(graph.component_count() as i64))
        }
        "relation_count" => {
            args_n::<0>(method, args)?;
            Ok(Value::Int(graph.relation_count() as i64))
        }
        "uids" => {
            args_n::<0>(method, args)?;
            Ok(Value::List(
                graph.components().map(|c| Value::from(c.uid.as_str())).collect(),
            ))
        }
        _ => Err(no_method("graph", method)),
    }
}

fn value_method(value: &Value, method: &str, args: &[Value]) -> Result<Value, EvalError> {
    match (value, method) {
        (Value::String(s), "len") => {
            args_n::<0>(method, args)?;
            Ok(Value::Int(s.chars().count() as i64))
        }
        (Value::String(s), "to_upper") => {
            args_n::<0>(method, args)?;
            Ok(Value::String(s.to_uppercase()))
        }
        (Value::String(s), "to_lower") => {
            args_n::<0>(method, args)?;
            Ok(Value::String(s.to_lowercase()))
        }
        (Value::String(s), "trim") => {
            args_n::<0>(method, args)?;
            Ok(Value::String(s.trim().to_string()))
        }
        (Value::String(s), "starts_with") => {
            Ok(Value::Bool(s.starts_with(string_arg(method, args, 0, 1)?)))
        }
        (Value::String(s), "ends_with") => {
            Ok(Value::Bool(s.ends_with(string_arg(method, args, 0, 1)?)))
        }
        (Value::String(s), "contains") => {
            Ok(Value::Bool(s.contains(string_arg(method, args, 0, 1)?)))
        }
        (Value::String(s), "split") => {
            let separator = string_arg(method, args, 0, 1)?;
            Ok(Value::List(s.split(separator).map(Value::from).collect()))
        }
        (Value::String(s), "replace") => {
            let from = string_arg(method, args, 0, 2)?;
            let to = string_arg(method, args, 1, 2)?;
            Ok(Value::String(s.replace(from, to)))
        }
        (Value::List(items), "len") => {
            args_n::<0>(method, args)?;
            Ok(Value::Int(items.len() as i64))
        }
        (Value::List(items), "contains") => {
            let [needle] = args_n::<1>(method, args)?;
            Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
        }
        (Value::List(items), "join") => {
            let separator = string_arg(method, args, 0, 1)?;
            let parts: Vec<String> = items.iter().map(Value::to_string).collect();
            Ok(Value::String(parts.join(separator)))
        }
        (Value::Map(map), "len") => {
            args_n::<0>(method, args)?;
            Ok(Value::Int(map.len() as i64))
        }
        (Value::Map(map), "keys") => {
            args_n::<0>(method, args)?;
            Ok(Value::List(map.keys().map(|k| Value::from(k.as_str())).collect()))
        }
        (Value::Map(map), "contains_key") => {
            let key = string_arg(method, args, 0, 1)?;
            Ok(Value::Bool(map.contains_key(key)))
        }
        (Value::Map(map), "get") => {
            let fallback = match args.len() {
                1 => Value::Null,
                2 => args[1].clone(),
                found => {
                    return Err(EvalError::Arity {
                        function: method.to_string(),
                        expected: 1,
                        found,
                    })
                }
            };
            let key = expect_str(method, &args[0])?;
            Ok(map.get(key).cloned().unwrap_or(fallback))
        }
        _ => Err(no_method(value.type_name(), method)),
    }
}

fn builtin(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "str" => {
            let [value] = args_n::<1>(name, args)?;
            Ok(Value::String(value.to_string()))
        }
        "int" => {
            let [value] = args_n::<1>(name, args)?;
            match value {
                Value::Int(n) => Ok(Value::Int(*n)),
                Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::String(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    EvalError::Conversion {
                        value: s.clone(),
                        target: "int",
                    }
                }),
                other => Err(EvalError::Conversion {
                    value: other.to_string(),
                    target: "int",
                }),
            }
        }
        "float" => {
            let [value] = args_n::<1>(name, args)?;
            match value {
                Value::String(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    EvalError::Conversion {
                        value: s.clone(),
                        target: "float",
                    }
                }),
                other => other.as_f64().map(Value::Float).ok_or_else(|| {
                    EvalError::Conversion {
                        value: other.to_string(),
                        target: "float",
                    }
                }),
            }
        }
        "len" => {
            let [value] = args_n::<1>(name, args)?;
            match value {
                Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                Value::Map(map) => Ok(Value::Int(map.len() as i64)),
                other => Err(EvalError::ArgumentType {
                    function: name.to_string(),
                    expected: "string, list or map",
                    found: other.type_name(),
                }),
            }
        }
        _ => Err(EvalError::UndefinedName(name.to_string())),
    }
}

fn attribute(value: &Value, attr: &str) -> Result<Value, EvalError> {
    match value {
        Value::Map(map) => map.get(attr).cloned().ok_or_else(|| EvalError::NoAttribute {
            type_name: value.type_name().to_string(),
            attr: attr.to_string(),
        }),
        Value::Null => Err(EvalError::NoAttribute {
            type_name: "null".to_string(),
            attr: attr.to_string(),
        }),
        other => Err(EvalError::NoAttribute {
            type_name: other.type_name().to_string(),
            attr: attr.to_string(),
        }),
    }
}

fn subscript(container: &Value, index: &Value) -> Result<Value, EvalError> {
    match (container, index) {
        (Value::List(items), Value::Int(i)) => {
            let slot = position(*i, items.len())?;
            Ok(items[slot].clone())
        }
        (Value::String(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            let slot = position(*i, chars.len())?;
            Ok(Value::String(chars[slot].to_string()))
        }
        (Value::Map(map), Value::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::MissingKey(key.clone())),
        _ => Err(EvalError::BadIndex {
            container: container.type_name(),
            index: index.type_name(),
        }),
    }
}

/// Negative indices count from the end
fn position(index: i64, len: usize) -> Result<usize, EvalError> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index, len });
    }
    Ok(resolved as usize)
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(EvalError::Operand {
            op: "-",
            found: other.type_name(),
        }),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, &left, &right),
        _ => arithmetic(op, left, right),
    }
}

/// Structural equality; ints and floats compare numerically
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(operands(op, left, right)),
        },
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div | BinaryOp::Rem if b == 0 => return Err(EvalError::DivisionByZero),
                BinaryOp::Div => a.checked_div(b),
                BinaryOp::Rem => a.checked_rem(b),
                _ => return Err(operands(op, &left, &right)),
            };
            result.map(Value::Int).ok_or(EvalError::Overflow)
        }
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(operands(op, &left, &right)),
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(EvalError::DivisionByZero),
                BinaryOp::Div => a / b,
                BinaryOp::Rem => a % b,
                _ => return Err(operands(op, &left, &right)),
            };
            Ok(Value::Float(result))
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => Err(operands(op, &left, &right)),
    }
}

fn operands(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::Operands {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn no_method(type_name: &str, method: &str) -> EvalError {
    EvalError::NoMethod {
        type_name: type_name.to_string(),
        method: method.to_string(),
    }
}

/// Exactly `N` arguments
fn args_n<'v, const N: usize>(function: &str, args: &'v [Value]) -> Result<&'v [Value; N], EvalError> {
    args.try_into().map_err(|_| EvalError::Arity {
        function: function.to_string(),
        expected: N,
        found: args.len(),
    })
}

/// Argument `index` of exactly `count`, which must be a string
fn string_arg<'v>(
    function: &str,
    args: &'v [Value],
    index: usize,
    count: usize,
) -> Result<&'v str, EvalError> {
    if args.len() != count {
        return Err(EvalError::Arity {
            function: function.to_string(),
            expected: count,
            found: args.len(),
        });
    }
    expect_str(function, &args[index])
}

fn expect_str<'v>(function: &str, value: &'v Value) -> Result<&'v str, EvalError> {
    value.as_str().ok_or_else(|| EvalError::ArgumentType {
        function: function.to_string(),
        expected: "string",
        found: value.type_name(),
    })
}
