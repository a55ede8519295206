//! Recursive-descent parser from the lexer's token cursor to the AST.
//!
//! Class names resolve at parse time against the registry of classes declared
//! so far; a parent must already be in the registry when its subclass is
//! declared, so parent chains cannot form cycles.

use std::collections::HashMap;
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::ast::Statement;
use crate::lexer::Lexer;
use crate::runtime::{self, Class, Comparator, Method, Value};
use crate::token::Token;

/// Parses a whole program into its root `Compound` node.
pub fn parse_program(lexer: &mut Lexer) -> Result<Statement> {
    Parser::new(lexer).parse_program()
}

struct Parser<'a> {
    lexer: &'a mut Lexer,
    classes: HashMap<String, Rc<Class>>,
}

impl<'a> Parser<'a> {
    fn new(lexer: &'a mut Lexer) -> Self {
        Self {
            lexer,
            classes: HashMap::new(),
        }
    }

    fn parse_program(mut self) -> Result<Statement> {
        let mut statements = Vec::new();
        while *self.lexer.current() != Token::Eof {
            statements.push(self.parse_statement()?);
        }
        Ok(Statement::Compound { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.lexer.current() {
            Token::Class => self.parse_class_definition(),
            Token::If => self.parse_if_else(),
            _ => {
                let statement = self.parse_simple_statement()?;
                self.lexer.expect(&Token::Newline)?;
                self.lexer.next_token();
                Ok(statement)
            }
        }
    }

    fn parse_class_definition(&mut self) -> Result<Statement> {
        let name = self.lexer.expect_next_id()?.to_string();
        let mut parent = None;
        if *self.lexer.next_token() == Token::Char(b'(') {
            let parent_name = self.lexer.expect_next_id()?.to_string();
            let Some(class) = self.classes.get(&parent_name) else {
                bail!("base class '{parent_name}' of '{name}' is not defined");
            };
            parent = Some(class.clone());
            self.lexer.expect_next(&Token::Char(b')'))?;
            self.lexer.next_token();
        }
        self.lexer.expect(&Token::Char(b':'))?;
        self.lexer.expect_next(&Token::Newline)?;
        self.lexer.expect_next(&Token::Indent)?;
        self.lexer.next_token();

        let mut methods = Vec::new();
        while *self.lexer.current() != Token::Dedent {
            methods.push(self.parse_method()?);
        }
        self.lexer.next_token();

        let class = Rc::new(Class::new(name.clone(), methods, parent));
        self.classes.insert(name, class.clone());
        Ok(Statement::ClassDefinition { class })
    }

    fn parse_method(&mut self) -> Result<Method> {
        self.lexer.expect(&Token::Def)?;
        let name = self.lexer.expect_next_id()?.to_string();
        self.lexer.expect_next(&Token::Char(b'('))?;

        let mut formal_params = Vec::new();
        if *self.lexer.next_token() != Token::Char(b')') {
            loop {
                formal_params.push(self.lexer.expect_id()?.to_string());
                if *self.lexer.next_token() != Token::Char(b',') {
                    break;
                }
                self.lexer.next_token();
            }
            self.lexer.expect(&Token::Char(b')'))?;
        }
        self.lexer.expect_next(&Token::Char(b':'))?;
        self.lexer.next_token();

        let body = self.parse_suite()?;
        Ok(Method {
            name,
            formal_params,
            body: Statement::MethodBody {
                body: Box::new(body),
            },
        })
    }

    /// Parses an indented block. The cursor must stand on the `Newline` that
    /// follows the introducing `:`.
    fn parse_suite(&mut self) -> Result<Statement> {
        self.lexer.expect(&Token::Newline)?;
        self.lexer.expect_next(&Token::Indent)?;
        self.lexer.next_token();

        let mut statements = Vec::new();
        while *self.lexer.current() != Token::Dedent {
            if *self.lexer.current() == Token::Eof {
                bail!("unexpected end of input inside an indented block");
            }
            statements.push(self.parse_statement()?);
        }
        self.lexer.next_token();
        Ok(Statement::Compound { statements })
    }

    fn parse_if_else(&mut self) -> Result<Statement> {
        self.lexer.next_token();
        let condition = self.parse_expression()?;
        self.lexer.expect(&Token::Char(b':'))?;
        self.lexer.next_token();
        let if_body = self.parse_suite()?;

        let mut else_body = None;
        if *self.lexer.current() == Token::Else {
            self.lexer.expect_next(&Token::Char(b':'))?;
            self.lexer.next_token();
            else_body = Some(Box::new(self.parse_suite()?));
        }
        Ok(Statement::IfElse {
            condition: Box::new(condition),
            if_body: Box::new(if_body),
            else_body,
        })
    }

    fn parse_simple_statement(&mut self) -> Result<Statement> {
        match self.lexer.current() {
            Token::Return => {
                self.lexer.next_token();
                let value = self.parse_expression()?;
                Ok(Statement::Return {
                    statement: Box::new(value),
                })
            }
            Token::Print => {
                self.lexer.next_token();
                let mut args = Vec::new();
                if *self.lexer.current() != Token::Newline {
                    loop {
                        args.push(self.parse_expression()?);
                        if *self.lexer.current() != Token::Char(b',') {
                            break;
                        }
                        self.lexer.next_token();
                    }
                }
                Ok(Statement::Print { args })
            }
            _ => self.parse_assignment_or_expression(),
        }
    }

    /// `x = e`, `a.b.c = e`, or a bare expression statement.
    fn parse_assignment_or_expression(&mut self) -> Result<Statement> {
        let target = self.parse_expression()?;
        if *self.lexer.current() != Token::Char(b'=') {
            return Ok(target);
        }
        self.lexer.next_token();
        let value = self.parse_expression()?;

        match target {
            Statement::VariableValue { mut dotted_ids } => {
                let Some(field) = dotted_ids.pop() else {
                    bail!("invalid assignment target");
                };
                if dotted_ids.is_empty() {
                    Ok(Statement::Assignment {
                        variable: field,
                        value: Box::new(value),
                    })
                } else {
                    Ok(Statement::FieldAssignment {
                        object: Box::new(Statement::VariableValue { dotted_ids }),
                        field,
                        value: Box::new(value),
                    })
                }
            }
            _ => bail!("only variables and fields can be assigned to"),
        }
    }

    fn parse_expression(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_and_expression()?;
        while *self.lexer.current() == Token::Or {
            self.lexer.next_token();
            let rhs = self.parse_and_expression()?;
            lhs = Statement::Or {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and_expression(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_not_expression()?;
        while *self.lexer.current() == Token::And {
            self.lexer.next_token();
            let rhs = self.parse_not_expression()?;
            lhs = Statement::And {
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_not_expression(&mut self) -> Result<Statement> {
        if *self.lexer.current() == Token::Not {
            self.lexer.next_token();
            let argument = self.parse_not_expression()?;
            return Ok(Statement::Not {
                argument: Box::new(argument),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Statement> {
        let lhs = self.parse_additive()?;
        let comparator: Comparator = match self.lexer.current() {
            Token::Eq => runtime::equal,
            Token::NotEq => runtime::not_equal,
            Token::Char(b'<') => runtime::less,
            Token::Char(b'>') => runtime::greater,
            Token::LessOrEq => runtime::less_or_equal,
            Token::GreaterOrEq => runtime::greater_or_equal,
            _ => return Ok(lhs),
        };
        self.lexer.next_token();
        let rhs = self.parse_additive()?;
        Ok(Statement::Comparison {
            comparator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_additive(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            match self.lexer.current() {
                Token::Char(b'+') => {
                    self.lexer.next_token();
                    let rhs = self.parse_multiplicative()?;
                    lhs = Statement::Add {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                Token::Char(b'-') => {
                    self.lexer.next_token();
                    let rhs = self.parse_multiplicative()?;
                    lhs = Statement::Sub {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Statement> {
        let mut lhs = self.parse_primary()?;
        loop {
            match self.lexer.current() {
                Token::Char(b'*') => {
                    self.lexer.next_token();
                    let rhs = self.parse_primary()?;
                    lhs = Statement::Mult {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                Token::Char(b'/') => {
                    self.lexer.next_token();
                    let rhs = self.parse_primary()?;
                    lhs = Statement::Div {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Statement> {
        let token = self.lexer.current().clone();
        match token {
            Token::Number(value) => {
                self.lexer.next_token();
                Ok(Statement::Constant(Value::Number(value)))
            }
            Token::String(value) => {
                self.lexer.next_token();
                Ok(Statement::Constant(Value::String(value)))
            }
            Token::True => {
                self.lexer.next_token();
                Ok(Statement::Constant(Value::Bool(true)))
            }
            Token::False => {
                self.lexer.next_token();
                Ok(Statement::Constant(Value::Bool(false)))
            }
            Token::None => {
                self.lexer.next_token();
                Ok(Statement::None)
            }
            Token::Char(b'(') => {
                self.lexer.next_token();
                let inner = self.parse_expression()?;
                self.lexer.expect(&Token::Char(b')'))?;
                self.lexer.next_token();
                Ok(inner)
            }
            Token::Id(_) => self.parse_dotted_expression(),
            other => bail!("unexpected {other} in an expression"),
        }
    }

    /// A dotted name, optionally followed by a call: a plain variable or
    /// field path, `str(..)`, a class instantiation, or a method call.
    fn parse_dotted_expression(&mut self) -> Result<Statement> {
        let mut dotted_ids = vec![self.lexer.expect_id()?.to_string()];
        self.lexer.next_token();
        while *self.lexer.current() == Token::Char(b'.') {
            dotted_ids.push(self.lexer.expect_next_id()?.to_string());
            self.lexer.next_token();
        }

        if *self.lexer.current() != Token::Char(b'(') {
            return Ok(Statement::VariableValue { dotted_ids });
        }

        let args = self.parse_arguments()?;
        let Some(last) = dotted_ids.pop() else {
            bail!("malformed call target");
        };
        let mut expr = if dotted_ids.is_empty() {
            if last == "str" {
                match <[Statement; 1]>::try_from(args) {
                    Ok([argument]) => Statement::Stringify {
                        argument: Box::new(argument),
                    },
                    Err(args) => bail!("str() takes exactly one argument, got {}", args.len()),
                }
            } else if let Some(class) = self.classes.get(&last) {
                Statement::NewInstance {
                    class: class.clone(),
                    args,
                }
            } else {
                bail!("'{last}' does not name a class");
            }
        } else {
            Statement::MethodCall {
                object: Box::new(Statement::VariableValue { dotted_ids }),
                method: last,
                args,
            }
        };

        // Method calls may chain on any call result: C().f().g()
        while *self.lexer.current() == Token::Char(b'.') {
            let method = self.lexer.expect_next_id()?.to_string();
            self.lexer.next_token();
            let args = self.parse_arguments()?;
            expr = Statement::MethodCall {
                object: Box::new(expr),
                method,
                args,
            };
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Statement>> {
        self.lexer.expect(&Token::Char(b'('))?;
        self.lexer.next_token();
        let mut args = Vec::new();
        if *self.lexer.current() != Token::Char(b')') {
            loop {
                args.push(self.parse_expression()?);
                if *self.lexer.current() != Token::Char(b',') {
                    break;
                }
                self.lexer.next_token();
            }
        }
        self.lexer.expect(&Token::Char(b')'))?;
        self.lexer.next_token();
        Ok(args)
    }
}
