//! Canonical expression printer.
//!
//! Renders an expression back into Lox source text. Compound operands
//! are parenthesised, so the output re-tokenizes and re-parses into a
//! structurally equivalent tree (grouping aside).

use crate::expr::Expr;

pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(token) => token.lexeme.clone(),

            Expr::Grouping(inner) => format!("({})", self.print(inner)),

            Expr::Unary { operator, right } => {
                format!("{}{}", operator.lexeme, self.print_operand(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                self.print_operand(left),
                operator.lexeme,
                self.print_operand(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(|arg| self.print(arg)).collect();
                format!("{}({})", self.print_operand(callee), args.join(", "))
            }

            Expr::Get { object, name } => {
                format!("{}.{}", self.print_operand(object), name.lexeme)
            }

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}.{} = {}",
                self.print_operand(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),
        }
    }

    // Wraps operands whose precedence would otherwise be lost.
    fn print_operand(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary { .. } | Expr::Logical { .. } | Expr::Assign { .. } => {
                format!("({})", self.print(expr))
            }
            _ => self.print(expr),
        }
    }
}
