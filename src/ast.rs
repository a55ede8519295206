//! Syntax tree of the Mython language and its evaluation rules.
//!
//! The parser builds one [`Statement`] tree per program; evaluation walks it
//! directly. A `return` does not complete normally: it travels upward as
//! [`ExecResult::Returned`] until the nearest [`Statement::MethodBody`]
//! converts it back into a plain value.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use crate::runtime::{
    self, ADD_METHOD, Class, Closure, Comparator, Context, INIT_METHOD, Instance, RuntimeError,
    Value,
};

/// Result envelope distinguishing normal completion from an unwinding
/// `return`.
#[derive(Debug)]
pub enum ExecResult {
    Normal(Value),
    Returned(Value),
}

impl ExecResult {
    /// The carried value, whichever way the node completed.
    pub fn into_value(self) -> Value {
        match self {
            ExecResult::Normal(value) | ExecResult::Returned(value) => value,
        }
    }
}

#[derive(Debug)]
pub enum Statement {
    /// A literal number, string, or boolean.
    Constant(Value),
    /// The `None` literal.
    None,
    /// A name, or a dotted path of fields rooted at a name.
    VariableValue { dotted_ids: Vec<String> },
    Assignment {
        variable: String,
        value: Box<Statement>,
    },
    /// `object.field = value`. The write is visible through every holder of
    /// the instance; it does not touch the enclosing scope.
    FieldAssignment {
        object: Box<Statement>,
        field: String,
        value: Box<Statement>,
    },
    Print { args: Vec<Statement> },
    MethodCall {
        object: Box<Statement>,
        method: String,
        args: Vec<Statement>,
    },
    NewInstance {
        class: Rc<Class>,
        args: Vec<Statement>,
    },
    /// `str(argument)`: renders into a buffer, never the context sink.
    Stringify { argument: Box<Statement> },
    Add { lhs: Box<Statement>, rhs: Box<Statement> },
    Sub { lhs: Box<Statement>, rhs: Box<Statement> },
    Mult { lhs: Box<Statement>, rhs: Box<Statement> },
    Div { lhs: Box<Statement>, rhs: Box<Statement> },
    Or { lhs: Box<Statement>, rhs: Box<Statement> },
    And { lhs: Box<Statement>, rhs: Box<Statement> },
    Not { argument: Box<Statement> },
    Compound { statements: Vec<Statement> },
    /// Method-body boundary: catches an unwinding `return`.
    MethodBody { body: Box<Statement> },
    Return { statement: Box<Statement> },
    ClassDefinition { class: Rc<Class> },
    IfElse {
        condition: Box<Statement>,
        if_body: Box<Statement>,
        else_body: Option<Box<Statement>>,
    },
    Comparison {
        comparator: Comparator,
        lhs: Box<Statement>,
        rhs: Box<Statement>,
    },
}

impl Statement {
    /// Evaluates the node against `closure`. `Returned` propagates upward
    /// until a `MethodBody` converts it.
    pub fn execute(
        &self,
        closure: &mut Closure,
        context: &mut Context,
    ) -> Result<ExecResult, RuntimeError> {
        match self {
            Statement::Constant(value) => Ok(ExecResult::Normal(value.clone())),
            Statement::None => Ok(ExecResult::Normal(Value::None)),
            Statement::VariableValue { dotted_ids } => {
                let mut ids = dotted_ids.iter();
                let Some(first) = ids.next() else {
                    return Err(RuntimeError::UndefinedVariable {
                        name: String::new(),
                    });
                };
                let mut value = closure.get(first).cloned().ok_or_else(|| {
                    RuntimeError::UndefinedVariable {
                        name: first.clone(),
                    }
                })?;
                for field in ids {
                    let instance = match &value {
                        Value::Instance(instance) => instance.clone(),
                        other => {
                            return Err(RuntimeError::NotAnInstance {
                                type_name: other.type_name().to_string(),
                            });
                        }
                    };
                    value = instance.borrow().fields().get(field).cloned().ok_or_else(
                        || RuntimeError::UndefinedField {
                            field: field.clone(),
                        },
                    )?;
                }
                Ok(ExecResult::Normal(value))
            }
            Statement::Assignment { variable, value } => {
                let value = value.evaluate(closure, context)?;
                closure.insert(variable.clone(), value.clone());
                Ok(ExecResult::Normal(value))
            }
            Statement::FieldAssignment {
                object,
                field,
                value,
            } => {
                let instance = match object.evaluate(closure, context)? {
                    Value::Instance(instance) => instance,
                    other => {
                        return Err(RuntimeError::NotAnInstance {
                            type_name: other.type_name().to_string(),
                        });
                    }
                };
                let value = value.evaluate(closure, context)?;
                instance
                    .borrow_mut()
                    .fields_mut()
                    .insert(field.clone(), value.clone());
                Ok(ExecResult::Normal(value))
            }
            Statement::Print { args } => {
                let mut rendered = String::new();
                for (index, arg) in args.iter().enumerate() {
                    if index != 0 {
                        rendered.push(' ');
                    }
                    let value = arg.evaluate(closure, context)?;
                    value.print(&mut rendered, context)?;
                }
                writeln!(context.output_stream(), "{rendered}")?;
                Ok(ExecResult::Normal(Value::String(rendered)))
            }
            Statement::MethodCall {
                object,
                method,
                args,
            } => {
                let instance = match object.evaluate(closure, context)? {
                    Value::Instance(instance) => instance,
                    other => {
                        return Err(RuntimeError::NotAnInstance {
                            type_name: other.type_name().to_string(),
                        });
                    }
                };
                let callable = instance.borrow().has_method(method, args.len());
                if !callable {
                    return Err(RuntimeError::UnknownMethod {
                        method: method.clone(),
                        arity: args.len(),
                    });
                }
                let mut actual_args = Vec::with_capacity(args.len());
                for arg in args {
                    actual_args.push(arg.evaluate(closure, context)?);
                }
                let result = runtime::call_method(&instance, method, &actual_args, context)?;
                Ok(ExecResult::Normal(result))
            }
            Statement::NewInstance { class, args } => {
                let instance = Rc::new(RefCell::new(Instance::new(class.clone())));
                let has_init = instance.borrow().has_method(INIT_METHOD, args.len());
                if has_init {
                    let mut actual_args = Vec::with_capacity(args.len());
                    for arg in args {
                        actual_args.push(arg.evaluate(closure, context)?);
                    }
                    runtime::call_method(&instance, INIT_METHOD, &actual_args, context)?;
                }
                Ok(ExecResult::Normal(Value::Instance(instance)))
            }
            Statement::Stringify { argument } => {
                let value = argument.evaluate(closure, context)?;
                let mut rendered = String::new();
                value.print(&mut rendered, context)?;
                Ok(ExecResult::Normal(Value::String(rendered)))
            }
            Statement::Add { lhs, rhs } => {
                let lhs = lhs.evaluate(closure, context)?;
                let rhs = rhs.evaluate(closure, context)?;
                let result = match (&lhs, &rhs) {
                    (Value::Number(l), Value::Number(r)) => Value::Number(l.wrapping_add(*r)),
                    (Value::String(l), Value::String(r)) => Value::String(format!("{l}{r}")),
                    (Value::Instance(instance), _)
                        if instance.borrow().has_method(ADD_METHOD, 1) =>
                    {
                        runtime::call_method(
                            instance,
                            ADD_METHOD,
                            std::slice::from_ref(&rhs),
                            context,
                        )?
                    }
                    _ => return Err(invalid_operands("+", &lhs, &rhs)),
                };
                Ok(ExecResult::Normal(result))
            }
            Statement::Sub { lhs, rhs } => {
                let lhs = lhs.evaluate(closure, context)?;
                let rhs = rhs.evaluate(closure, context)?;
                integer_op("-", &lhs, &rhs, |l, r| Ok(l.wrapping_sub(r))).map(ExecResult::Normal)
            }
            Statement::Mult { lhs, rhs } => {
                let lhs = lhs.evaluate(closure, context)?;
                let rhs = rhs.evaluate(closure, context)?;
                integer_op("*", &lhs, &rhs, |l, r| Ok(l.wrapping_mul(r))).map(ExecResult::Normal)
            }
            Statement::Div { lhs, rhs } => {
                let lhs = lhs.evaluate(closure, context)?;
                let rhs = rhs.evaluate(closure, context)?;
                integer_op("/", &lhs, &rhs, |l, r| {
                    if r == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    Ok(l.wrapping_div(r))
                })
                .map(ExecResult::Normal)
            }
            Statement::Or { lhs, rhs } => {
                if lhs.evaluate(closure, context)?.is_truthy() {
                    return Ok(ExecResult::Normal(Value::Bool(true)));
                }
                let rhs = rhs.evaluate(closure, context)?;
                Ok(ExecResult::Normal(Value::Bool(rhs.is_truthy())))
            }
            Statement::And { lhs, rhs } => {
                if !lhs.evaluate(closure, context)?.is_truthy() {
                    return Ok(ExecResult::Normal(Value::Bool(false)));
                }
                let rhs = rhs.evaluate(closure, context)?;
                Ok(ExecResult::Normal(Value::Bool(rhs.is_truthy())))
            }
            Statement::Not { argument } => match argument.evaluate(closure, context)? {
                Value::Bool(value) => Ok(ExecResult::Normal(Value::Bool(!value))),
                other => Err(RuntimeError::ExpectedBool {
                    operation: "not".to_string(),
                    type_name: other.type_name().to_string(),
                }),
            },
            Statement::Compound { statements } => {
                for statement in statements {
                    if let ExecResult::Returned(value) = statement.execute(closure, context)? {
                        return Ok(ExecResult::Returned(value));
                    }
                }
                Ok(ExecResult::Normal(Value::None))
            }
            Statement::MethodBody { body } => {
                Ok(ExecResult::Normal(body.execute(closure, context)?.into_value()))
            }
            Statement::Return { statement } => {
                Ok(ExecResult::Returned(statement.evaluate(closure, context)?))
            }
            Statement::ClassDefinition { class } => {
                closure.insert(class.name().to_string(), Value::Class(class.clone()));
                Ok(ExecResult::Normal(Value::Class(class.clone())))
            }
            Statement::IfElse {
                condition,
                if_body,
                else_body,
            } => {
                let condition = match condition.evaluate(closure, context)? {
                    Value::Bool(value) => value,
                    other => {
                        return Err(RuntimeError::ExpectedBool {
                            operation: "if".to_string(),
                            type_name: other.type_name().to_string(),
                        });
                    }
                };
                if condition {
                    if_body.execute(closure, context)
                } else if let Some(else_body) = else_body {
                    else_body.execute(closure, context)
                } else {
                    Ok(ExecResult::Normal(Value::None))
                }
            }
            Statement::Comparison {
                comparator,
                lhs,
                rhs,
            } => {
                let lhs = lhs.evaluate(closure, context)?;
                let rhs = rhs.evaluate(closure, context)?;
                let result = comparator(&lhs, &rhs, context)?;
                Ok(ExecResult::Normal(Value::Bool(result)))
            }
        }
    }

    /// Evaluates a node in expression position, keeping only the value.
    fn evaluate(&self, closure: &mut Closure, context: &mut Context) -> Result<Value, RuntimeError> {
        Ok(self.execute(closure, context)?.into_value())
    }
}

/// Applies an integer-only operator. `apply` runs only once both operands
/// are confirmed numbers, so operand type errors take precedence over
/// anything it reports. Arithmetic wraps on overflow.
fn integer_op(
    operation: &str,
    lhs: &Value,
    rhs: &Value,
    apply: impl Fn(i32, i32) -> Result<i32, RuntimeError>,
) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(l), Value::Number(r)) => Ok(Value::Number(apply(*l, *r)?)),
        _ => Err(invalid_operands(operation, lhs, rhs)),
    }
}

fn invalid_operands(operation: &str, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::InvalidOperands {
        operation: operation.to_string(),
        lhs: lhs.type_name().to_string(),
        rhs: rhs.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Method;

    fn int(value: i32) -> Statement {
        Statement::Constant(Value::Number(value))
    }

    fn string(value: &str) -> Statement {
        Statement::Constant(Value::String(value.to_string()))
    }

    fn boolean(value: bool) -> Statement {
        Statement::Constant(Value::Bool(value))
    }

    fn variable(name: &str) -> Statement {
        Statement::VariableValue {
            dotted_ids: vec![name.to_string()],
        }
    }

    fn dotted(ids: &[&str]) -> Statement {
        Statement::VariableValue {
            dotted_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    fn assign(name: &str, value: Statement) -> Statement {
        Statement::Assignment {
            variable: name.to_string(),
            value: Box::new(value),
        }
    }

    fn compound(statements: Vec<Statement>) -> Statement {
        Statement::Compound { statements }
    }

    fn method(name: &str, formal_params: &[&str], statements: Vec<Statement>) -> Method {
        Method {
            name: name.to_string(),
            formal_params: formal_params.iter().map(|p| p.to_string()).collect(),
            body: Statement::MethodBody {
                body: Box::new(compound(statements)),
            },
        }
    }

    fn run(statement: &Statement) -> (Value, String) {
        let mut closure = Closure::new();
        let mut output = String::new();
        let result = {
            let mut context = Context::new(&mut output);
            statement
                .execute(&mut closure, &mut context)
                .expect("execution should succeed")
                .into_value()
        };
        (result, output)
    }

    fn run_err(statement: &Statement) -> RuntimeError {
        let mut closure = Closure::new();
        let mut output = String::new();
        let mut context = Context::new(&mut output);
        statement
            .execute(&mut closure, &mut context)
            .expect_err("execution should fail")
    }

    #[test]
    fn assignment_stores_and_returns_the_value() {
        let program = compound(vec![
            assign("x", int(7)),
            Statement::Print {
                args: vec![variable("x")],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "7\n");
    }

    #[test]
    fn reading_an_unbound_name_fails() {
        let err = run_err(&variable("missing"));
        assert_eq!(
            err,
            RuntimeError::UndefinedVariable {
                name: "missing".to_string(),
            }
        );
    }

    #[test]
    fn field_assignment_is_visible_through_every_alias() {
        // alias = box; box.value = 9; print alias.value
        let class = Rc::new(Class::new("Box".to_string(), Vec::new(), None));
        let program = compound(vec![
            Statement::Assignment {
                variable: "box".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: Vec::new(),
                }),
            },
            assign("alias", variable("box")),
            Statement::FieldAssignment {
                object: Box::new(variable("box")),
                field: "value".to_string(),
                value: Box::new(int(9)),
            },
            Statement::Print {
                args: vec![dotted(&["alias", "value"])],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "9\n");
    }

    #[test]
    fn field_assignment_does_not_leak_into_the_scope() {
        let class = Rc::new(Class::new("Box".to_string(), Vec::new(), None));
        let program = compound(vec![
            Statement::Assignment {
                variable: "box".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: Vec::new(),
                }),
            },
            Statement::FieldAssignment {
                object: Box::new(variable("box")),
                field: "value".to_string(),
                value: Box::new(int(9)),
            },
            Statement::Print {
                args: vec![variable("value")],
            },
        ]);
        let err = run_err(&program);
        assert_eq!(
            err,
            RuntimeError::UndefinedVariable {
                name: "value".to_string(),
            }
        );
    }

    #[test]
    fn dotted_access_through_a_scalar_fails() {
        let program = compound(vec![
            assign("x", int(1)),
            Statement::Print {
                args: vec![dotted(&["x", "field"])],
            },
        ]);
        let err = run_err(&program);
        assert_eq!(
            err,
            RuntimeError::NotAnInstance {
                type_name: "int".to_string(),
            }
        );
    }

    #[test]
    fn print_joins_arguments_and_returns_the_text() {
        let program = Statement::Print {
            args: vec![int(1), string("two"), boolean(false), Statement::None],
        };
        let (result, output) = run(&program);
        assert_eq!(output, "1 two False None\n");
        assert!(matches!(result, Value::String(text) if text == "1 two False None"));
    }

    #[test]
    fn print_without_arguments_emits_an_empty_line() {
        let (_, output) = run(&Statement::Print { args: Vec::new() });
        assert_eq!(output, "\n");
    }

    #[test]
    fn stringify_renders_without_touching_the_sink() {
        let program = Statement::Stringify {
            argument: Box::new(int(125)),
        };
        let mut closure = Closure::new();
        let mut output = String::new();
        let mut context = Context::new(&mut output);
        let result = program
            .execute(&mut closure, &mut context)
            .expect("execution should succeed")
            .into_value();
        assert!(matches!(result, Value::String(text) if text == "125"));
        assert!(output.is_empty());
    }

    #[test]
    fn add_handles_numbers_strings_and_dunder_dispatch() {
        let (result, _) = run(&Statement::Add {
            lhs: Box::new(int(2)),
            rhs: Box::new(int(3)),
        });
        assert!(matches!(result, Value::Number(5)));

        let (result, _) = run(&Statement::Add {
            lhs: Box::new(string("ab")),
            rhs: Box::new(string("cd")),
        });
        assert!(matches!(result, Value::String(text) if text == "abcd"));

        let class = Rc::new(Class::new(
            "Wrapper".to_string(),
            vec![method(
                "__add__",
                &["rhs"],
                vec![Statement::Return {
                    statement: Box::new(Statement::Add {
                        lhs: Box::new(variable("rhs")),
                        rhs: Box::new(int(100)),
                    }),
                }],
            )],
            None,
        ));
        let program = compound(vec![
            Statement::Assignment {
                variable: "w".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: Vec::new(),
                }),
            },
            Statement::Print {
                args: vec![Statement::Add {
                    lhs: Box::new(variable("w")),
                    rhs: Box::new(int(5)),
                }],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "105\n");
    }

    #[test]
    fn add_rejects_mixed_operands() {
        let err = run_err(&Statement::Add {
            lhs: Box::new(int(1)),
            rhs: Box::new(string("x")),
        });
        assert_eq!(
            err,
            RuntimeError::InvalidOperands {
                operation: "+".to_string(),
                lhs: "int".to_string(),
                rhs: "str".to_string(),
            }
        );
    }

    #[test]
    fn arithmetic_is_integer_only() {
        let (result, _) = run(&Statement::Sub {
            lhs: Box::new(int(7)),
            rhs: Box::new(int(3)),
        });
        assert!(matches!(result, Value::Number(4)));

        let (result, _) = run(&Statement::Mult {
            lhs: Box::new(int(6)),
            rhs: Box::new(int(7)),
        });
        assert!(matches!(result, Value::Number(42)));

        let (result, _) = run(&Statement::Div {
            lhs: Box::new(int(7)),
            rhs: Box::new(int(2)),
        });
        assert!(matches!(result, Value::Number(3)));

        let err = run_err(&Statement::Sub {
            lhs: Box::new(string("a")),
            rhs: Box::new(string("b")),
        });
        assert!(matches!(err, RuntimeError::InvalidOperands { .. }));
    }

    #[test]
    fn division_by_zero_fails() {
        let err = run_err(&Statement::Div {
            lhs: Box::new(int(1)),
            rhs: Box::new(int(0)),
        });
        assert_eq!(err, RuntimeError::DivisionByZero);
    }

    #[test]
    fn dividing_a_non_number_by_zero_is_a_type_error() {
        let err = run_err(&Statement::Div {
            lhs: Box::new(string("x")),
            rhs: Box::new(int(0)),
        });
        assert_eq!(
            err,
            RuntimeError::InvalidOperands {
                operation: "/".to_string(),
                lhs: "str".to_string(),
                rhs: "int".to_string(),
            }
        );
    }

    #[test]
    fn arithmetic_wraps_on_overflow() {
        let (result, _) = run(&Statement::Add {
            lhs: Box::new(int(2_000_000_000)),
            rhs: Box::new(int(2_000_000_000)),
        });
        assert!(matches!(result, Value::Number(-294_967_296)));

        let (result, _) = run(&Statement::Mult {
            lhs: Box::new(int(i32::MAX)),
            rhs: Box::new(int(2)),
        });
        assert!(matches!(result, Value::Number(-2)));

        let (result, _) = run(&Statement::Div {
            lhs: Box::new(int(i32::MIN)),
            rhs: Box::new(int(-1)),
        });
        assert!(matches!(result, Value::Number(i32::MIN)));
    }

    #[test]
    fn or_short_circuits_past_a_failing_operand() {
        let (result, _) = run(&Statement::Or {
            lhs: Box::new(boolean(true)),
            rhs: Box::new(Statement::Div {
                lhs: Box::new(int(1)),
                rhs: Box::new(int(0)),
            }),
        });
        assert!(matches!(result, Value::Bool(true)));
    }

    #[test]
    fn and_short_circuits_past_a_failing_operand() {
        let (result, _) = run(&Statement::And {
            lhs: Box::new(boolean(false)),
            rhs: Box::new(Statement::Div {
                lhs: Box::new(int(1)),
                rhs: Box::new(int(0)),
            }),
        });
        assert!(matches!(result, Value::Bool(false)));
    }

    #[test]
    fn or_and_apply_truthiness_to_any_value() {
        let (result, _) = run(&Statement::Or {
            lhs: Box::new(int(0)),
            rhs: Box::new(string("x")),
        });
        assert!(matches!(result, Value::Bool(true)));

        let (result, _) = run(&Statement::And {
            lhs: Box::new(int(5)),
            rhs: Box::new(string("")),
        });
        assert!(matches!(result, Value::Bool(false)));
    }

    #[test]
    fn not_requires_a_boolean() {
        let (result, _) = run(&Statement::Not {
            argument: Box::new(boolean(false)),
        });
        assert!(matches!(result, Value::Bool(true)));

        let err = run_err(&Statement::Not {
            argument: Box::new(int(5)),
        });
        assert_eq!(
            err,
            RuntimeError::ExpectedBool {
                operation: "not".to_string(),
                type_name: "int".to_string(),
            }
        );
    }

    #[test]
    fn if_condition_must_be_a_boolean() {
        let err = run_err(&Statement::IfElse {
            condition: Box::new(int(1)),
            if_body: Box::new(compound(Vec::new())),
            else_body: None,
        });
        assert_eq!(
            err,
            RuntimeError::ExpectedBool {
                operation: "if".to_string(),
                type_name: "int".to_string(),
            }
        );
    }

    #[test]
    fn if_without_else_yields_none_on_a_false_condition() {
        let (result, output) = run(&Statement::IfElse {
            condition: Box::new(boolean(false)),
            if_body: Box::new(Statement::Print { args: vec![int(1)] }),
            else_body: None,
        });
        assert!(matches!(result, Value::None));
        assert!(output.is_empty());
    }

    #[test]
    fn return_unwinds_to_the_enclosing_method_body() {
        // def f(): if True: return 1
        //          return 2
        let class = Rc::new(Class::new(
            "C".to_string(),
            vec![method(
                "f",
                &[],
                vec![
                    Statement::IfElse {
                        condition: Box::new(boolean(true)),
                        if_body: Box::new(compound(vec![Statement::Return {
                            statement: Box::new(int(1)),
                        }])),
                        else_body: None,
                    },
                    Statement::Return {
                        statement: Box::new(int(2)),
                    },
                ],
            )],
            None,
        ));
        let program = compound(vec![
            Statement::Assignment {
                variable: "c".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: Vec::new(),
                }),
            },
            Statement::Print {
                args: vec![Statement::MethodCall {
                    object: Box::new(variable("c")),
                    method: "f".to_string(),
                    args: Vec::new(),
                }],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn return_skips_the_rest_of_the_method() {
        let class = Rc::new(Class::new(
            "C".to_string(),
            vec![method(
                "f",
                &[],
                vec![
                    Statement::Return {
                        statement: Box::new(int(7)),
                    },
                    Statement::Print {
                        args: vec![string("unreachable")],
                    },
                ],
            )],
            None,
        ));
        let program = compound(vec![
            Statement::Assignment {
                variable: "c".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: Vec::new(),
                }),
            },
            Statement::Print {
                args: vec![Statement::MethodCall {
                    object: Box::new(variable("c")),
                    method: "f".to_string(),
                    args: Vec::new(),
                }],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "7\n");
    }

    #[test]
    fn return_escapes_a_bare_compound() {
        let program = compound(vec![Statement::Return {
            statement: Box::new(int(3)),
        }]);
        let mut closure = Closure::new();
        let mut output = String::new();
        let mut context = Context::new(&mut output);
        let result = program
            .execute(&mut closure, &mut context)
            .expect("execution should succeed");
        assert!(matches!(result, ExecResult::Returned(Value::Number(3))));
    }

    #[test]
    fn new_instance_runs_matching_init() {
        let class = Rc::new(Class::new(
            "Pair".to_string(),
            vec![method(
                "__init__",
                &["a", "b"],
                vec![
                    Statement::FieldAssignment {
                        object: Box::new(variable("self")),
                        field: "a".to_string(),
                        value: Box::new(variable("a")),
                    },
                    Statement::FieldAssignment {
                        object: Box::new(variable("self")),
                        field: "b".to_string(),
                        value: Box::new(variable("b")),
                    },
                ],
            )],
            None,
        ));
        let program = compound(vec![
            Statement::Assignment {
                variable: "p".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: vec![int(1), int(2)],
                }),
            },
            Statement::Print {
                args: vec![dotted(&["p", "a"]), dotted(&["p", "b"])],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "1 2\n");
    }

    #[test]
    fn new_instance_ignores_args_without_matching_init() {
        let class = Rc::new(Class::new("Plain".to_string(), Vec::new(), None));
        let (result, _) = run(&Statement::NewInstance {
            class,
            args: vec![int(1)],
        });
        assert!(matches!(result, Value::Instance(_)));
    }

    #[test]
    fn method_call_requires_an_instance_and_matching_arity() {
        let err = run_err(&Statement::MethodCall {
            object: Box::new(int(1)),
            method: "f".to_string(),
            args: Vec::new(),
        });
        assert_eq!(
            err,
            RuntimeError::NotAnInstance {
                type_name: "int".to_string(),
            }
        );

        let class = Rc::new(Class::new(
            "C".to_string(),
            vec![method("f", &["x"], Vec::new())],
            None,
        ));
        let program = compound(vec![
            Statement::Assignment {
                variable: "c".to_string(),
                value: Box::new(Statement::NewInstance {
                    class,
                    args: Vec::new(),
                }),
            },
            Statement::MethodCall {
                object: Box::new(variable("c")),
                method: "f".to_string(),
                args: Vec::new(),
            },
        ]);
        let err = run_err(&program);
        assert_eq!(
            err,
            RuntimeError::UnknownMethod {
                method: "f".to_string(),
                arity: 0,
            }
        );
    }

    #[test]
    fn class_definition_binds_the_class_name() {
        let class = Rc::new(Class::new("Widget".to_string(), Vec::new(), None));
        let program = compound(vec![
            Statement::ClassDefinition { class },
            Statement::Print {
                args: vec![variable("Widget")],
            },
        ]);
        let (_, output) = run(&program);
        assert_eq!(output, "Class Widget\n");
    }

    #[test]
    fn comparison_wraps_the_comparator_result() {
        let (result, _) = run(&Statement::Comparison {
            comparator: runtime::less,
            lhs: Box::new(int(1)),
            rhs: Box::new(int(2)),
        });
        assert!(matches!(result, Value::Bool(true)));

        let err = run_err(&Statement::Comparison {
            comparator: runtime::equal,
            lhs: Box::new(int(1)),
            rhs: Box::new(string("1")),
        });
        assert!(matches!(err, RuntimeError::CannotCompare { .. }));
    }

    #[test]
    fn compound_discards_child_results_and_yields_none() {
        let (result, output) = run(&compound(vec![
            assign("x", int(1)),
            assign("y", int(2)),
        ]));
        assert!(matches!(result, Value::None));
        assert!(output.is_empty());
    }
}
