//! Runtime object model of the Mython interpreter.
//!
//! This module contains the tagged [`Value`] universe, the [`Closure`] scope
//! mapping, the [`Class`]/[`Instance`] metaobjects with their dispatch rules,
//! and the comparison primitives the evaluator builds `Comparison` nodes
//! from.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use thiserror::Error;

use crate::ast::Statement;

pub(crate) const INIT_METHOD: &str = "__init__";
pub(crate) const STR_METHOD: &str = "__str__";
pub(crate) const EQ_METHOD: &str = "__eq__";
pub(crate) const LT_METHOD: &str = "__lt__";
pub(crate) const ADD_METHOD: &str = "__add__";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("undefined field '{field}'")]
    UndefinedField { field: String },
    #[error("a value of type {type_name} is not a class instance")]
    NotAnInstance { type_name: String },
    #[error("method '{method}' accepting {arity} argument(s) was not found")]
    UnknownMethod { method: String, arity: usize },
    #[error("cannot apply '{operation}' to {lhs} and {rhs}")]
    InvalidOperands {
        operation: String,
        lhs: String,
        rhs: String,
    },
    #[error("'{operation}' expects a boolean, got {type_name}")]
    ExpectedBool {
        operation: String,
        type_name: String,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot compare {lhs} and {rhs}")]
    CannotCompare { lhs: String, rhs: String },
    #[error("'{method}' must return True or False")]
    ComparisonResultNotBool { method: String },
    #[error("'return' outside of a method body")]
    ReturnOutsideMethod,
    #[error("failed to write to the output stream")]
    OutputWrite(#[from] fmt::Error),
}

/// Name→value mapping for one scope: the top level, a method frame, or an
/// instance's field table.
pub type Closure = HashMap<String, Value>;

/// Ambient services available during evaluation. Currently only the output
/// sink written by `print`.
pub struct Context<'a> {
    output: &'a mut dyn fmt::Write,
}

impl<'a> Context<'a> {
    pub fn new(output: &'a mut dyn fmt::Write) -> Self {
        Self { output }
    }

    pub fn output_stream(&mut self) -> &mut dyn fmt::Write {
        &mut *self.output
    }
}

/// A runtime value. Scalars copy by value; classes and instances copy by
/// shared reference, so every holder of an instance observes its field
/// mutations.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Number(i32),
    String(String),
    Bool(bool),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Number(_) => "int",
            Value::String(_) => "str",
            Value::Bool(_) => "bool",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }

    /// Truthiness probe used by `and`/`or`. Total over the value universe.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None | Value::Class(_) | Value::Instance(_) => false,
            Value::Bool(value) => *value,
            Value::Number(value) => *value != 0,
            Value::String(value) => !value.is_empty(),
        }
    }

    /// Renders the value into `out`. Instances with a `__str__/0` method are
    /// rendered through it; other instances render as an object identifier.
    ///
    /// `out` is whatever sink the caller is assembling (a `print` line, a
    /// `str(..)` buffer); the `context` sink is only reached if a `__str__`
    /// body prints explicitly.
    pub fn print(
        &self,
        out: &mut dyn fmt::Write,
        context: &mut Context,
    ) -> Result<(), RuntimeError> {
        match self {
            Value::None => write!(out, "None")?,
            Value::Number(value) => write!(out, "{value}")?,
            Value::String(value) => out.write_str(value)?,
            Value::Bool(value) => out.write_str(if *value { "True" } else { "False" })?,
            Value::Class(class) => write!(out, "Class {}", class.name())?,
            Value::Instance(instance) => {
                let has_str = instance.borrow().has_method(STR_METHOD, 0);
                if has_str {
                    let rendered = call_method(instance, STR_METHOD, &[], context)?;
                    rendered.print(out, context)?;
                } else {
                    let class_name = instance.borrow().class().name().to_string();
                    write!(out, "<{} object at {:p}>", class_name, Rc::as_ptr(instance))?;
                }
            }
        }
        Ok(())
    }
}

/// A named method body with its formal parameter list.
#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Statement,
}

/// Class metaobject. Immutable after construction; the name→method table is
/// built once so local dispatch is O(1).
#[derive(Debug)]
pub struct Class {
    name: String,
    methods: Vec<Method>,
    method_table: HashMap<String, usize>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: String, methods: Vec<Method>, parent: Option<Rc<Class>>) -> Self {
        let method_table = methods
            .iter()
            .enumerate()
            .map(|(index, method)| (method.name.clone(), index))
            .collect();
        Self {
            name,
            methods,
            method_table,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves `name` on this class or, on a miss, along the parent chain.
    pub fn lookup_method(&self, name: &str) -> Option<&Method> {
        if let Some(&index) = self.method_table.get(name) {
            return Some(&self.methods[index]);
        }
        self.parent
            .as_deref()
            .and_then(|parent| parent.lookup_method(name))
    }
}

/// A runtime object bound to its class, owning a per-instance field table.
#[derive(Debug)]
pub struct Instance {
    class: Rc<Class>,
    fields: Closure,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: Closure::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    pub fn fields(&self) -> &Closure {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Closure {
        &mut self.fields
    }

    pub fn has_method(&self, method: &str, argument_count: usize) -> bool {
        self.class
            .lookup_method(method)
            .is_some_and(|method| method.formal_params.len() == argument_count)
    }
}

/// Calls `method` on `receiver` with positional `args`.
///
/// A fresh closure is seeded with `self` and the formal parameters; no borrow
/// of the receiver is held while the body runs, so the method may freely
/// mutate its own fields.
pub fn call_method(
    receiver: &Rc<RefCell<Instance>>,
    method: &str,
    args: &[Value],
    context: &mut Context,
) -> Result<Value, RuntimeError> {
    let class = receiver.borrow().class().clone();
    let found = class
        .lookup_method(method)
        .filter(|found| found.formal_params.len() == args.len())
        .ok_or_else(|| RuntimeError::UnknownMethod {
            method: method.to_string(),
            arity: args.len(),
        })?;

    let mut closure = Closure::new();
    closure.insert("self".to_string(), Value::Instance(receiver.clone()));
    for (param, value) in found.formal_params.iter().zip(args) {
        closure.insert(param.clone(), value.clone());
    }
    Ok(found.body.execute(&mut closure, context)?.into_value())
}

/// Signature shared by the comparison primitives, so the parser can select
/// one per comparison operator.
pub type Comparator = fn(&Value, &Value, &mut Context) -> Result<bool, RuntimeError>;

pub fn equal(lhs: &Value, rhs: &Value, context: &mut Context) -> Result<bool, RuntimeError> {
    match (lhs, rhs) {
        (Value::None, Value::None) => Ok(true),
        (Value::Bool(l), Value::Bool(r)) => Ok(l == r),
        (Value::Number(l), Value::Number(r)) => Ok(l == r),
        (Value::String(l), Value::String(r)) => Ok(l == r),
        (Value::Instance(instance), _) if instance.borrow().has_method(EQ_METHOD, 1) => {
            dunder_comparison(instance, EQ_METHOD, rhs, context)
        }
        _ => Err(cannot_compare(lhs, rhs)),
    }
}

pub fn less(lhs: &Value, rhs: &Value, context: &mut Context) -> Result<bool, RuntimeError> {
    match (lhs, rhs) {
        (Value::Bool(l), Value::Bool(r)) => Ok(l < r),
        (Value::Number(l), Value::Number(r)) => Ok(l < r),
        (Value::String(l), Value::String(r)) => Ok(l < r),
        (Value::Instance(instance), _) if instance.borrow().has_method(LT_METHOD, 1) => {
            dunder_comparison(instance, LT_METHOD, rhs, context)
        }
        _ => Err(cannot_compare(lhs, rhs)),
    }
}

pub fn not_equal(lhs: &Value, rhs: &Value, context: &mut Context) -> Result<bool, RuntimeError> {
    Ok(!equal(lhs, rhs, context)?)
}

pub fn greater(lhs: &Value, rhs: &Value, context: &mut Context) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)? && !equal(lhs, rhs, context)?)
}

pub fn less_or_equal(
    lhs: &Value,
    rhs: &Value,
    context: &mut Context,
) -> Result<bool, RuntimeError> {
    Ok(less(lhs, rhs, context)? || equal(lhs, rhs, context)?)
}

pub fn greater_or_equal(
    lhs: &Value,
    rhs: &Value,
    context: &mut Context,
) -> Result<bool, RuntimeError> {
    Ok(!less(lhs, rhs, context)?)
}

fn dunder_comparison(
    instance: &Rc<RefCell<Instance>>,
    method: &str,
    rhs: &Value,
    context: &mut Context,
) -> Result<bool, RuntimeError> {
    match call_method(instance, method, std::slice::from_ref(rhs), context)? {
        Value::Bool(value) => Ok(value),
        _ => Err(RuntimeError::ComparisonResultNotBool {
            method: method.to_string(),
        }),
    }
}

fn cannot_compare(lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::CannotCompare {
        lhs: lhs.type_name().to_string(),
        rhs: rhs.type_name().to_string(),
    }
}
