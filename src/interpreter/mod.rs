pub mod builtins;
pub mod control_flow;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod parser;

pub use control_flow::ControlFlow;
pub use environment::{Context, SymbolTable};
pub use error::RuntimeError;
pub use evaluator::Interpreter;
pub use parser::{ParseResult, Parser, SyntaxError};

use std::io;

use crate::ast::{BinOp, Node, NodeKind, UnaryOp};
use crate::diagnostic::Diagnostic;
use crate::lexer::Lexer;
use crate::position::Source;
use crate::value::Value;

/// Lex and parse one source buffer into its root statement list.
pub fn parse(label: &str, text: &str) -> Result<Node, Diagnostic> {
    let source = Source::new(label, text);
    let tokens = Lexer::new(&source)
        .tokenize()
        .map_err(|e| e.to_diagnostic())?;
    Parser::new(tokens).parse().map_err(|e| e.to_diagnostic())
}

/// One-shot pipeline over a fresh global table. The result is the list of
/// top-level statement values.
pub fn parse_and_run(label: &str, text: &str) -> Result<Value, Diagnostic> {
    Interpreter::new().run(label, text)
}

/// Writes a linearized dump of a parsed tree, one s-expression line per
/// top-level statement.
pub fn dump_ast(node: &Node, out: &mut dyn io::Write) -> io::Result<()> {
    match &node.kind {
        NodeKind::List(statements) => {
            for statement in statements {
                writeln!(out, "{}", linearize(statement))?;
            }
        }
        _ => writeln!(out, "{}", linearize(node))?,
    }
    Ok(())
}

fn linearize(node: &Node) -> String {
    match &node.kind {
        NodeKind::Number(n, _) => format!("(number {})", n),
        NodeKind::Str(s) => format!("(string {:?})", s),
        NodeKind::List(elements) => {
            let parts: Vec<String> = elements.iter().map(linearize).collect();
            format!("(list {})", parts.join(" "))
        }
        NodeKind::VarAccess(name) => format!("(var {})", name),
        NodeKind::VarAssign { name, value } => {
            format!("(assign {} {})", name, linearize(value))
        }
        NodeKind::BinOp { op, left, right } => {
            format!(
                "({} {} {})",
                binop_name(*op),
                linearize(left),
                linearize(right)
            )
        }
        NodeKind::UnaryOp { op, operand } => {
            let name = match op {
                UnaryOp::Pos => "pos",
                UnaryOp::Neg => "neg",
                UnaryOp::Not => "not",
            };
            format!("({} {})", name, linearize(operand))
        }
        NodeKind::If { cases, else_case } => {
            let mut parts: Vec<String> = cases
                .iter()
                .map(|case| {
                    format!(
                        "(case {} {})",
                        linearize(&case.condition),
                        linearize(&case.body)
                    )
                })
                .collect();
            if let Some(else_case) = else_case {
                parts.push(format!("(else {})", linearize(&else_case.body)));
            }
            format!("(if {})", parts.join(" "))
        }
        NodeKind::For {
            var,
            start,
            end,
            step,
            body,
            ..
        } => {
            let step = match step {
                Some(step) => format!(" {}", linearize(step)),
                None => String::new(),
            };
            format!(
                "(for {} {} {}{} {})",
                var,
                linearize(start),
                linearize(end),
                step,
                linearize(body)
            )
        }
        NodeKind::While {
            condition, body, ..
        } => {
            format!("(while {} {})", linearize(condition), linearize(body))
        }
        NodeKind::FuncDef {
            name, params, body, ..
        } => {
            format!(
                "(fun {} ({}) {})",
                name.as_deref().unwrap_or("_"),
                params.join(" "),
                linearize(body)
            )
        }
        NodeKind::Call { callee, args } => {
            let mut parts = vec![linearize(callee)];
            parts.extend(args.iter().map(linearize));
            format!("(call {})", parts.join(" "))
        }
        NodeKind::Return(value) => match value {
            Some(value) => format!("(return {})", linearize(value)),
            None => "(return)".to_string(),
        },
        NodeKind::Continue => "(continue)".to_string(),
        NodeKind::Break => "(break)".to_string(),
    }
}

fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Pow => "pow",
        BinOp::EqEq => "eq",
        BinOp::NotEq => "ne",
        BinOp::Less => "lt",
        BinOp::Greater => "gt",
        BinOp::LessEq => "lte",
        BinOp::GreaterEq => "gte",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_ast_one_line_per_statement() {
        let ast = parse("<test>", "VAR a = 5\na + 3").expect("parse failed");
        let mut out = Vec::new();
        dump_ast(&ast, &mut out).expect("dump failed");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text, "(assign a (number 5))\n(add (var a) (number 3))\n");
    }

    #[test]
    fn test_dump_ast_function_and_call() {
        let ast = parse("<test>", "FUN sq(x) -> x * x; sq(4)").expect("parse failed");
        let mut out = Vec::new();
        dump_ast(&ast, &mut out).expect("dump failed");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "(fun sq (x) (mul (var x) (var x)))\n(call (var sq) (number 4))\n"
        );
    }
}
