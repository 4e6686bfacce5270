use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{BinOp, ElseCase, IfCase, Node, NodeKind, UnaryOp};
use crate::diagnostic::Diagnostic;
use crate::position::Span;
use crate::value::{resolve_index, values_equal, Function, Value};

use super::builtins;
use super::control_flow::ControlFlow;
use super::environment::{Context, SymbolTable};
use super::error::RuntimeError;

pub type Evaluated = Result<ControlFlow, RuntimeError>;

/// Tree-walking evaluator. Owns the global symbol table so a REPL can
/// keep state across inputs; each `execute` runs under a fresh
/// `<program>` frame on top of it.
pub struct Interpreter {
    globals: Rc<SymbolTable>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = SymbolTable::new();
        builtins::install(&globals);
        Self { globals }
    }

    pub fn globals(&self) -> &Rc<SymbolTable> {
        &self.globals
    }

    /// Full pipeline for one source buffer: lex, parse, evaluate.
    pub fn run(&mut self, label: &str, text: &str) -> Result<Value, Diagnostic> {
        let ast = super::parse(label, text)?;
        self.execute(&ast)
    }

    pub fn execute(&mut self, ast: &Node) -> Result<Value, Diagnostic> {
        let ctx = Context::program(Rc::clone(&self.globals));
        match self.visit(ast, &ctx) {
            Ok(ControlFlow::Value(value)) => Ok(value),
            Ok(ControlFlow::Return(value)) => Ok(value),
            Ok(ControlFlow::Break(span)) => {
                Err(RuntimeError::new("'BREAK' outside of a loop", span, ctx).to_diagnostic())
            }
            Ok(ControlFlow::Continue(span)) => {
                Err(RuntimeError::new("'CONTINUE' outside of a loop", span, ctx).to_diagnostic())
            }
            Err(error) => Err(error.to_diagnostic()),
        }
    }

    fn visit(&mut self, node: &Node, ctx: &Rc<Context>) -> Evaluated {
        match &node.kind {
            NodeKind::Number(n, float_origin) => {
                Ok(ControlFlow::Value(Value::Number(*n, *float_origin)))
            }
            NodeKind::Str(s) => Ok(ControlFlow::Value(Value::Str(Rc::from(s.as_str())))),
            NodeKind::List(elements) => self.visit_list(elements, ctx),
            NodeKind::VarAccess(name) => match ctx.symbols.get(name) {
                Some(value) => Ok(ControlFlow::Value(value)),
                None => Err(RuntimeError::undefined_variable(
                    name,
                    node.span.clone(),
                    Rc::clone(ctx),
                )),
            },
            NodeKind::VarAssign { name, value } => {
                let value = match self.visit(value, ctx)? {
                    ControlFlow::Value(v) => v,
                    flow => return Ok(flow),
                };
                ctx.symbols.set(name.clone(), value.clone());
                Ok(ControlFlow::Value(value))
            }
            NodeKind::BinOp { op, left, right } => {
                let left = match self.visit(left, ctx)? {
                    ControlFlow::Value(v) => v,
                    flow => return Ok(flow),
                };
                let right = match self.visit(right, ctx)? {
                    ControlFlow::Value(v) => v,
                    flow => return Ok(flow),
                };
                self.eval_binary_op(*op, &left, &right, &node.span, ctx)
                    .map(ControlFlow::Value)
            }
            NodeKind::UnaryOp { op, operand } => {
                let value = match self.visit(operand, ctx)? {
                    ControlFlow::Value(v) => v,
                    flow => return Ok(flow),
                };
                self.eval_unary_op(*op, value, &node.span, ctx)
                    .map(ControlFlow::Value)
            }
            NodeKind::If { cases, else_case } => {
                self.visit_if(cases, else_case.as_deref(), ctx)
            }
            NodeKind::For {
                var,
                start,
                end,
                step,
                body,
                block,
            } => self.visit_for(var, start, end, step.as_deref(), body, *block, ctx),
            NodeKind::While {
                condition,
                body,
                block,
            } => self.visit_while(condition, body, *block, ctx),
            NodeKind::FuncDef {
                name,
                params,
                body,
                auto_return,
            } => {
                let function = Value::Function(Rc::new(Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    auto_return: *auto_return,
                    context: Rc::clone(ctx),
                }));
                if let Some(name) = name {
                    ctx.symbols.set(name.clone(), function.clone());
                }
                Ok(ControlFlow::Value(function))
            }
            NodeKind::Call { callee, args } => self.visit_call(callee, args, &node.span, ctx),
            NodeKind::Return(value) => {
                let value = match value {
                    Some(node) => match self.visit(node, ctx)? {
                        ControlFlow::Value(v) => v,
                        flow => return Ok(flow),
                    },
                    None => Value::Null,
                };
                Ok(ControlFlow::Return(value))
            }
            NodeKind::Continue => Ok(ControlFlow::Continue(node.span.clone())),
            NodeKind::Break => Ok(ControlFlow::Break(node.span.clone())),
        }
    }

    fn visit_list(&mut self, elements: &[Node], ctx: &Rc<Context>) -> Evaluated {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            match self.visit(element, ctx)? {
                ControlFlow::Value(value) => values.push(value),
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Value(Value::List(Rc::new(RefCell::new(
            values,
        )))))
    }

    fn visit_if(
        &mut self,
        cases: &[IfCase],
        else_case: Option<&ElseCase>,
        ctx: &Rc<Context>,
    ) -> Evaluated {
        for case in cases {
            let condition = match self.visit(&case.condition, ctx)? {
                ControlFlow::Value(v) => v,
                flow => return Ok(flow),
            };
            if condition.is_truthy() {
                let value = match self.visit(&case.body, ctx)? {
                    ControlFlow::Value(v) => v,
                    flow => return Ok(flow),
                };
                let result = if case.block { Value::Null } else { value };
                return Ok(ControlFlow::Value(result));
            }
        }

        if let Some(else_case) = else_case {
            let value = match self.visit(&else_case.body, ctx)? {
                ControlFlow::Value(v) => v,
                flow => return Ok(flow),
            };
            let result = if else_case.block { Value::Null } else { value };
            return Ok(ControlFlow::Value(result));
        }

        Ok(ControlFlow::Value(Value::Null))
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_for(
        &mut self,
        var: &str,
        start: &Node,
        end: &Node,
        step: Option<&Node>,
        body: &Node,
        block: bool,
        ctx: &Rc<Context>,
    ) -> Evaluated {
        let (start_value, start_float) = match self.visit(start, ctx)? {
            ControlFlow::Value(v) => self.expect_number(v, &start.span, ctx)?,
            flow => return Ok(flow),
        };
        let (end_value, _) = match self.visit(end, ctx)? {
            ControlFlow::Value(v) => self.expect_number(v, &end.span, ctx)?,
            flow => return Ok(flow),
        };
        let (step_value, step_float) = match step {
            Some(step) => match self.visit(step, ctx)? {
                ControlFlow::Value(v) => self.expect_number(v, &step.span, ctx)?,
                flow => return Ok(flow),
            },
            None => (1.0, false),
        };

        let float_origin = start_float || step_float;
        let mut elements = Vec::new();
        let mut i = start_value;

        loop {
            let keep_going = if step_value >= 0.0 {
                i < end_value
            } else {
                i > end_value
            };
            if !keep_going {
                break;
            }

            ctx.symbols.set(var.to_string(), Value::Number(i, float_origin));
            i += step_value;

            match self.visit(body, ctx)? {
                ControlFlow::Value(value) => {
                    if !block {
                        elements.push(value);
                    }
                }
                ControlFlow::Continue(_) => continue,
                ControlFlow::Break(_) => break,
                ret @ ControlFlow::Return(_) => return Ok(ret),
            }
        }

        let result = if block {
            Value::Null
        } else {
            Value::List(Rc::new(RefCell::new(elements)))
        };
        Ok(ControlFlow::Value(result))
    }

    fn visit_while(
        &mut self,
        condition: &Node,
        body: &Node,
        block: bool,
        ctx: &Rc<Context>,
    ) -> Evaluated {
        let mut elements = Vec::new();

        loop {
            let keep_going = match self.visit(condition, ctx)? {
                ControlFlow::Value(v) => v.is_truthy(),
                flow => return Ok(flow),
            };
            if !keep_going {
                break;
            }

            match self.visit(body, ctx)? {
                ControlFlow::Value(value) => {
                    if !block {
                        elements.push(value);
                    }
                }
                ControlFlow::Continue(_) => continue,
                ControlFlow::Break(_) => break,
                ret @ ControlFlow::Return(_) => return Ok(ret),
            }
        }

        let result = if block {
            Value::Null
        } else {
            Value::List(Rc::new(RefCell::new(elements)))
        };
        Ok(ControlFlow::Value(result))
    }

    fn visit_call(
        &mut self,
        callee: &Node,
        args: &[Node],
        span: &Span,
        ctx: &Rc<Context>,
    ) -> Evaluated {
        let callee_value = match self.visit(callee, ctx)? {
            ControlFlow::Value(v) => v,
            flow => return Ok(flow),
        };

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            match self.visit(arg, ctx)? {
                ControlFlow::Value(value) => arg_values.push(value),
                flow => return Ok(flow),
            }
        }

        match callee_value {
            Value::Function(function) => self
                .call_function(&function, arg_values, span, ctx)
                .map(ControlFlow::Value),
            Value::BuiltIn(builtin) => {
                if arg_values.len() != builtin.arity() {
                    return Err(RuntimeError::arity_mismatch(
                        builtin.name(),
                        builtin.arity(),
                        arg_values.len(),
                        span.clone(),
                        Rc::clone(ctx),
                    ));
                }
                builtins::call(self, builtin, &arg_values, span, ctx).map(ControlFlow::Value)
            }
            other => Err(RuntimeError::not_callable(
                &other,
                span.clone(),
                Rc::clone(ctx),
            )),
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        call_span: &Span,
        ctx: &Rc<Context>,
    ) -> Result<Value, RuntimeError> {
        if args.len() != function.params.len() {
            return Err(RuntimeError::arity_mismatch(
                function.display_name(),
                function.params.len(),
                args.len(),
                call_span.clone(),
                Rc::clone(ctx),
            ));
        }

        let table = SymbolTable::with_parent(Rc::clone(&function.context.symbols));
        for (param, arg) in function.params.iter().zip(args) {
            table.set(param.clone(), arg);
        }
        let exec_ctx = Context::frame(
            function.display_name().to_string(),
            Rc::clone(&function.context),
            call_span.clone(),
            table,
        );

        // Return is absorbed here; a stray break/continue in the body
        // falls out as null.
        let result = match self.visit(&function.body, &exec_ctx)? {
            ControlFlow::Value(value) => {
                if function.auto_return {
                    value
                } else {
                    Value::Null
                }
            }
            ControlFlow::Return(value) => value,
            ControlFlow::Break(_) | ControlFlow::Continue(_) => Value::Null,
        };
        Ok(result)
    }

    fn expect_number(
        &self,
        value: Value,
        span: &Span,
        ctx: &Rc<Context>,
    ) -> Result<(f64, bool), RuntimeError> {
        match value {
            Value::Number(n, float_origin) => Ok((n, float_origin)),
            _ => Err(RuntimeError::illegal_operation(
                span.clone(),
                Rc::clone(ctx),
            )),
        }
    }

    fn eval_binary_op(
        &mut self,
        op: BinOp,
        left: &Value,
        right: &Value,
        span: &Span,
        ctx: &Rc<Context>,
    ) -> Result<Value, RuntimeError> {
        let illegal = || RuntimeError::illegal_operation(span.clone(), Rc::clone(ctx));

        match op {
            BinOp::And => Ok(Value::bool(left.is_truthy() && right.is_truthy())),
            BinOp::Or => Ok(Value::bool(left.is_truthy() || right.is_truthy())),
            BinOp::EqEq => Ok(Value::bool(values_equal(left, right))),
            BinOp::NotEq => Ok(Value::bool(!values_equal(left, right))),
            BinOp::Less | BinOp::Greater | BinOp::LessEq | BinOp::GreaterEq => {
                let (Value::Number(a, _), Value::Number(b, _)) = (left, right) else {
                    return Err(illegal());
                };
                let result = match op {
                    BinOp::Less => a < b,
                    BinOp::Greater => a > b,
                    BinOp::LessEq => a <= b,
                    _ => a >= b,
                };
                Ok(Value::bool(result))
            }
            BinOp::Add => match (left, right) {
                (Value::Number(a, af), Value::Number(b, bf)) => {
                    Ok(Value::Number(a + b, *af || *bf))
                }
                (Value::Str(a), Value::Str(b)) => {
                    let mut joined = String::with_capacity(a.len() + b.len());
                    joined.push_str(a);
                    joined.push_str(b);
                    Ok(Value::Str(Rc::from(joined)))
                }
                (Value::List(items), other) => {
                    let mut appended = items.borrow().clone();
                    appended.push(other.clone());
                    Ok(Value::List(Rc::new(RefCell::new(appended))))
                }
                _ => Err(illegal()),
            },
            BinOp::Sub => match (left, right) {
                (Value::Number(a, af), Value::Number(b, bf)) => {
                    Ok(Value::Number(a - b, *af || *bf))
                }
                (Value::List(items), Value::Number(n, _)) => {
                    let mut shortened = items.borrow().clone();
                    let Some(index) = resolve_index(*n, shortened.len()) else {
                        return Err(RuntimeError::new(
                            "Element at this index could not be removed from list because \
                             index is out of bounds",
                            span.clone(),
                            Rc::clone(ctx),
                        ));
                    };
                    shortened.remove(index);
                    Ok(Value::List(Rc::new(RefCell::new(shortened))))
                }
                _ => Err(illegal()),
            },
            BinOp::Mul => match (left, right) {
                (Value::Number(a, af), Value::Number(b, bf)) => {
                    Ok(Value::Number(a * b, *af || *bf))
                }
                (Value::Str(s), Value::Number(n, _)) => {
                    let count = n.floor().max(0.0) as usize;
                    Ok(Value::Str(Rc::from(s.repeat(count))))
                }
                (Value::List(a), Value::List(b)) => {
                    let mut extended = a.borrow().clone();
                    extended.extend(b.borrow().iter().cloned());
                    Ok(Value::List(Rc::new(RefCell::new(extended))))
                }
                _ => Err(illegal()),
            },
            BinOp::Div => match (left, right) {
                (Value::Number(a, af), Value::Number(b, bf)) => {
                    if *b == 0.0 {
                        return Err(RuntimeError::division_by_zero(
                            span.clone(),
                            Rc::clone(ctx),
                        ));
                    }
                    let quotient = a / b;
                    // Integer inputs stay integer-origin only when the
                    // division is exact.
                    let float_origin = *af || *bf || quotient.fract() != 0.0;
                    Ok(Value::Number(quotient, float_origin))
                }
                (Value::List(items), Value::Number(n, _)) => {
                    let items = items.borrow();
                    let Some(index) = resolve_index(*n, items.len()) else {
                        return Err(RuntimeError::new(
                            "Element at this index could not be retrieved from list because \
                             index is out of bounds",
                            span.clone(),
                            Rc::clone(ctx),
                        ));
                    };
                    Ok(items[index].clone())
                }
                _ => Err(illegal()),
            },
            BinOp::Pow => match (left, right) {
                (Value::Number(a, af), Value::Number(b, bf)) => {
                    let result = a.powf(*b);
                    let float_origin = *af || *bf || result.fract() != 0.0;
                    Ok(Value::Number(result, float_origin))
                }
                _ => Err(illegal()),
            },
        }
    }

    fn eval_unary_op(
        &mut self,
        op: UnaryOp,
        value: Value,
        span: &Span,
        ctx: &Rc<Context>,
    ) -> Result<Value, RuntimeError> {
        match op {
            UnaryOp::Pos => Ok(value),
            UnaryOp::Neg => match value {
                Value::Number(n, float_origin) => Ok(Value::Number(-n, float_origin)),
                _ => Err(RuntimeError::illegal_operation(
                    span.clone(),
                    Rc::clone(ctx),
                )),
            },
            UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
        }
    }
}
