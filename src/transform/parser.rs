//! PEST-backed parser for the function script language.
//!
//! Converts script source text into a [`FunctionScript`]. Parsing never
//! evaluates anything; capability checks happen afterwards in the compiler.

use super::ast::{Expression, FunctionScript, Operator, Statement, UnaryOperator, Value};
use crate::error::{MapError, MapResult};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

/// Parser for the function script language.
#[derive(Parser)]
#[grammar = "transform/transform.pest"]
pub struct ScriptParser;

fn invalid(message: impl Into<String>) -> MapError {
    MapError::Validation(message.into())
}

fn next_pair<'a>(pairs: &mut Pairs<'a, Rule>, context: &str) -> MapResult<Pair<'a, Rule>> {
    pairs
        .next()
        .ok_or_else(|| invalid(format!("Malformed {}: unexpected end of input", context)))
}

impl ScriptParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses a complete function body.
    pub fn parse_script(&self, input: &str) -> MapResult<FunctionScript> {
        let mut pairs = Self::parse(Rule::complete_script, input)
            .map_err(|e| invalid(format!("Parse error: {}", e)))?;
        let complete = next_pair(&mut pairs, "script")?;
        let script = next_pair(&mut complete.into_inner(), "script")?;

        let mut result = FunctionScript::default();
        for pair in script.into_inner() {
            match pair.as_rule() {
                Rule::params_decl => result.params = self.parse_params(pair)?,
                Rule::stmt => result.body.push(self.parse_stmt(pair)?),
                _ => {}
            }
        }
        Ok(result)
    }

    /// Parses a single standalone expression.
    pub fn parse_expression(&self, input: &str) -> MapResult<Expression> {
        let mut pairs = Self::parse(Rule::complete_expr, input)
            .map_err(|e| invalid(format!("Parse error: {}", e)))?;
        let complete = next_pair(&mut pairs, "expression")?;
        let expr = next_pair(&mut complete.into_inner(), "expression")?;
        self.build_expr(expr)
    }

    fn parse_params(&self, pair: Pair<Rule>) -> MapResult<Vec<String>> {
        let mut params = Vec::new();
        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::param_list {
                for ident in inner.into_inner() {
                    params.push(ident.as_str().to_string());
                }
            }
        }
        Ok(params)
    }

    fn parse_block(&self, pair: Pair<Rule>) -> MapResult<Vec<Statement>> {
        pair.into_inner().map(|stmt| self.parse_stmt(stmt)).collect()
    }

    fn parse_stmt(&self, pair: Pair<Rule>) -> MapResult<Statement> {
        let inner = next_pair(&mut pair.into_inner(), "statement")?;
        match inner.as_rule() {
            Rule::let_stmt => {
                let mut parts = inner.into_inner();
                next_pair(&mut parts, "let")?; // kw_let
                let name = next_pair(&mut parts, "let")?.as_str().to_string();
                let value = self.build_expr(next_pair(&mut parts, "let")?)?;
                Ok(Statement::Let { name, value })
            }
            Rule::return_stmt => {
                let mut parts = inner.into_inner();
                next_pair(&mut parts, "return")?; // kw_return
                Ok(Statement::Return(self.build_expr(next_pair(&mut parts, "return")?)?))
            }
            Rule::if_stmt => self.parse_if(inner),
            Rule::expr_stmt => {
                let expr = next_pair(&mut inner.into_inner(), "expression statement")?;
                Ok(Statement::Expr(self.build_expr(expr)?))
            }
            other => Err(invalid(format!("Unexpected statement rule: {:?}", other))),
        }
    }

    fn parse_if(&self, pair: Pair<Rule>) -> MapResult<Statement> {
        let mut parts = pair.into_inner();
        next_pair(&mut parts, "if")?; // kw_if
        let condition = self.build_expr(next_pair(&mut parts, "if condition")?)?;
        let then_branch = self.parse_block(next_pair(&mut parts, "if block")?)?;

        let else_branch = match parts.next() {
            Some(_kw_else) => {
                let branch = next_pair(&mut parts, "else")?;
                match branch.as_rule() {
                    Rule::if_stmt => Some(vec![self.parse_if(branch)?]),
                    _ => Some(self.parse_block(branch)?),
                }
            }
            None => None,
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn build_expr(&self, pair: Pair<Rule>) -> MapResult<Expression> {
        match pair.as_rule() {
            Rule::expr => self.build_expr(next_pair(&mut pair.into_inner(), "expression")?),
            Rule::logic_expr
            | Rule::comp_expr
            | Rule::add_expr
            | Rule::mul_expr
            | Rule::pow_expr => self.parse_binary_chain(pair),
            Rule::unary_expr => self.parse_unary_expr(pair),
            Rule::postfix_expr => self.parse_postfix_expr(pair),
            Rule::atom => self.parse_atom(pair),
            other => Err(invalid(format!("Unexpected rule: {:?}", other))),
        }
    }

    /// Folds `operand (op operand)*` left-associatively. `^` nests in the
    /// grammar instead, so its chains arrive here already right-associated.
    fn parse_binary_chain(&self, pair: Pair<Rule>) -> MapResult<Expression> {
        let mut pairs = pair.into_inner();
        let mut expr = self.build_expr(next_pair(&mut pairs, "operand")?)?;

        while let Some(op_pair) = pairs.next() {
            let operator = match op_pair.as_str() {
                "||" => Operator::Or,
                "&&" => Operator::And,
                "==" => Operator::Equal,
                "!=" => Operator::NotEqual,
                "<" => Operator::LessThan,
                "<=" => Operator::LessThanOrEqual,
                ">" => Operator::GreaterThan,
                ">=" => Operator::GreaterThanOrEqual,
                "+" => Operator::Add,
                "-" => Operator::Subtract,
                "*" => Operator::Multiply,
                "/" => Operator::Divide,
                "%" => Operator::Modulo,
                "^" => Operator::Power,
                other => return Err(invalid(format!("Unknown operator: {}", other))),
            };
            let right = self.build_expr(next_pair(&mut pairs, "operand")?)?;
            expr = Expression::BinaryOp {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_unary_expr(&self, pair: Pair<Rule>) -> MapResult<Expression> {
        let mut operators = Vec::new();
        let mut operand = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::unary_op => operators.push(match inner.as_str() {
                    "-" => UnaryOperator::Negate,
                    _ => UnaryOperator::Not,
                }),
                _ => operand = Some(self.build_expr(inner)?),
            }
        }

        let mut expr = operand.ok_or_else(|| invalid("Unary operator without operand"))?;
        for operator in operators.into_iter().rev() {
            expr = Expression::UnaryOp {
                operator,
                expr: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn parse_postfix_expr(&self, pair: Pair<Rule>) -> MapResult<Expression> {
        let mut pairs = pair.into_inner();
        let mut expr = self.build_expr(next_pair(&mut pairs, "postfix")?)?;

        for suffix in pairs {
            match suffix.as_rule() {
                Rule::field_suffix => {
                    let field = next_pair(&mut suffix.into_inner(), "field access")?;
                    expr = Expression::FieldAccess {
                        object: Box::new(expr),
                        field: field.as_str().to_string(),
                    };
                }
                Rule::index_suffix => {
                    let index = next_pair(&mut suffix.into_inner(), "index")?;
                    expr = Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(self.build_expr(index)?),
                    };
                }
                other => return Err(invalid(format!("Unexpected postfix rule: {:?}", other))),
            }
        }

        Ok(expr)
    }

    fn parse_atom(&self, pair: Pair<Rule>) -> MapResult<Expression> {
        let inner = next_pair(&mut pair.into_inner(), "atom")?;
        match inner.as_rule() {
            Rule::number => inner
                .as_str()
                .parse::<f64>()
                .map(|n| Expression::Literal(Value::Number(n)))
                .map_err(|e| invalid(format!("Invalid number '{}': {}", inner.as_str(), e))),
            Rule::string => {
                let raw = next_pair(&mut inner.into_inner(), "string")?;
                Ok(Expression::Literal(Value::String(unescape(raw.as_str()))))
            }
            Rule::boolean => Ok(Expression::Literal(Value::Boolean(inner.as_str() == "true"))),
            Rule::null => Ok(Expression::Literal(Value::Null)),
            Rule::identifier => Ok(Expression::Variable(inner.as_str().to_string())),
            Rule::function_call => {
                let mut parts = inner.into_inner();
                let name = next_pair(&mut parts, "function call")?.as_str().to_string();
                let args = parts
                    .map(|arg| self.build_expr(arg))
                    .collect::<MapResult<Vec<_>>>()?;
                Ok(Expression::FunctionCall { name, args })
            }
            _ => self.build_expr(inner),
        }
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> FunctionScript {
        ScriptParser::new().parse_script(input).unwrap()
    }

    #[test]
    fn parses_params_and_return() {
        let script = parse("params(x, digits); return round(x, digits);");
        assert_eq!(script.params, vec!["x", "digits"]);
        assert_eq!(script.body.len(), 1);
        match &script.body[0] {
            Statement::Return(Expression::FunctionCall { name, args }) => {
                assert_eq!(name, "round");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn respects_operator_precedence() {
        let expr = ScriptParser::new().parse_expression("1 + 2 * 3").unwrap();
        match expr {
            Expression::BinaryOp { operator, right, .. } => {
                assert_eq!(operator, Operator::Add);
                assert!(matches!(
                    *right,
                    Expression::BinaryOp { operator: Operator::Multiply, .. }
                ));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn power_is_right_associative() {
        let expr = ScriptParser::new().parse_expression("2 ^ 3 ^ 2").unwrap();
        match expr {
            Expression::BinaryOp { left, operator, right } => {
                assert_eq!(operator, Operator::Power);
                assert!(matches!(*left, Expression::Literal(Value::Number(n)) if n == 2.0));
                assert!(matches!(*right, Expression::BinaryOp { operator: Operator::Power, .. }));
            }
            other => panic!("unexpected expression: {:?}", other),
        }
    }

    #[test]
    fn keywords_do_not_swallow_identifier_prefixes() {
        let script = parse("let letter = 1; return_value;");
        assert!(matches!(&script.body[0], Statement::Let { name, .. } if name == "letter"));
        assert!(matches!(
            &script.body[1],
            Statement::Expr(Expression::Variable(name)) if name == "return_value"
        ));
    }

    #[test]
    fn parses_if_else_chains_and_postfix_access() {
        let script = parse(
            r#"
            if input.amount > 10 { return "big"; }
            else if args[1] == "x" { return "x"; }
            else { return "small"; }
            "#,
        );
        match &script.body[0] {
            Statement::If { else_branch: Some(branch), .. } => {
                assert!(matches!(branch[0], Statement::If { .. }));
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn unescapes_string_literals() {
        let expr = ScriptParser::new().parse_expression(r#""a\"b\n""#).unwrap();
        assert_eq!(expr, Expression::Literal(Value::String("a\"b\n".to_string())));
    }

    #[test]
    fn rejects_garbage() {
        assert!(ScriptParser::new().parse_script("return ;").is_err());
        assert!(ScriptParser::new().parse_script("let = 3;").is_err());
    }
}
