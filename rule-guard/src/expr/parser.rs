//! Recursive-descent parser.
//!
//! Precedence, lowest first: `||`, `&&`, comparisons, `+ -`, `* / %`,
//! unary `- + !`, primary. All binary levels are left-associative.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::lexer::{tokenize, Spanned, Token};
use super::{Dialect, EvalError};
use crate::aggregation::{AggregateFunction, AggregationConfig, AggregationFilter};
use crate::value::Value;

const MAX_DEPTH: usize = 64;
/// Upper bound on unary and binary operators in one expression. Keeps the
/// tree shallow enough to evaluate and drop recursively.
const MAX_OPERATORS: usize = 256;

/// Parses `source` into an expression tree.
pub fn parse(source: &str, dialect: Dialect) -> Result<Expr, EvalError> {
    let (body, base) = strip_body(source, dialect);
    let tokens = tokenize(body, base)?;
    if tokens.is_empty() {
        return Err(EvalError::syntax("empty expression", base));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        operators: 0,
        dialect,
        end: base + body.len(),
    };
    let expr = parser.expression()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(extra) => Err(EvalError::syntax(
            format!("unexpected {} after expression", describe(&extra.token)),
            extra.offset,
        )),
    }
}

/// Trims whitespace, a trailing `;` and, for row expressions, a leading
/// `return`. Returns the body and its byte offset in `source`.
fn strip_body(source: &str, dialect: Dialect) -> (&str, usize) {
    let mut base = source.len() - source.trim_start().len();
    let mut body = source.trim();
    if let Some(stripped) = body.strip_suffix(';') {
        body = stripped.trim_end();
    }
    if dialect == Dialect::Row {
        if let Some(rest) = body.strip_prefix("return") {
            if rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
                let trimmed = rest.trim_start();
                base += body.len() - trimmed.len();
                body = trimmed;
            }
        }
    }
    (body, base)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string '{s}'"),
        Token::Ident(name) => format!("identifier '{name}'"),
        other => format!("'{}'", symbol(other)),
    }
}

fn symbol(token: &Token) -> &'static str {
    match token {
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::Slash => "/",
        Token::Percent => "%",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::Comma => ",",
        Token::Dot => ".",
        Token::Eq => "==",
        Token::Ne => "!=",
        Token::Lt => "<",
        Token::Le => "<=",
        Token::Gt => ">",
        Token::Ge => ">=",
        Token::And => "&&",
        Token::Or => "||",
        Token::Not => "!",
        Token::Number(_) | Token::Str(_) | Token::Ident(_) => "literal",
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    operators: usize,
    dialect: Dialect,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.offset).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let spanned = self.tokens.get(self.pos).cloned();
        if spanned.is_some() {
            self.pos += 1;
        }
        spanned
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), EvalError> {
        if self.eat(token) {
            return Ok(());
        }
        let found = self
            .peek()
            .map(describe)
            .unwrap_or_else(|| "end of input".to_string());
        Err(EvalError::syntax(
            format!("expected '{}', found {found}", symbol(token)),
            self.offset(),
        ))
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(EvalError::syntax("expression nested too deeply", self.offset()));
        }
        Ok(())
    }

    /// Counts one operator node; `offset` is where the operator was read.
    fn operator(&mut self, offset: usize) -> Result<(), EvalError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(EvalError::syntax("expression too large", offset));
        }
        Ok(())
    }

    fn expression(&mut self) -> Result<Expr, EvalError> {
        self.enter()?;
        let expr = self.or();
        self.depth -= 1;
        expr
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.operator(self.offset())?;
            self.pos += 1;
            let right = self.and()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.comparison()?;
        while self.peek() == Some(&Token::And) {
            self.operator(self.offset())?;
            self.pos += 1;
            let right = self.comparison()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.operator(self.offset())?;
            self.pos += 1;
            let right = self.additive()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.operator(self.offset())?;
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.operator(self.offset())?;
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Plus) => None,
            _ => return self.primary(),
        };
        self.operator(self.offset())?;
        self.pos += 1;
        self.enter()?;
        let operand = self.unary();
        self.depth -= 1;
        let operand = operand?;
        Ok(match op {
            Some(op) => Expr::unary(op, operand),
            None => operand,
        })
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let offset = self.offset();
        let Some(spanned) = self.advance() else {
            return Err(EvalError::syntax("unexpected end of expression", offset));
        };
        match spanned.token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::LParen => {
                let inner = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => self.list(),
            Token::Ident(name) => self.identifier(name, offset),
            other => Err(EvalError::syntax(
                format!("unexpected {}", describe(&other)),
                offset,
            )),
        }
    }

    fn list(&mut self) -> Result<Expr, EvalError> {
        let mut items = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(Expr::List(items));
        }
        loop {
            items.push(self.expression()?);
            if self.eat(&Token::RBracket) {
                return Ok(Expr::List(items));
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn identifier(&mut self, name: String, offset: usize) -> Result<Expr, EvalError> {
        match name.as_str() {
            "true" | "TRUE" | "True" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" | "FALSE" | "False" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" | "NULL" | "undefined" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                self.call(name, offset)
            }
            Some(Token::Dot) if name == "row" => {
                self.pos += 1;
                let field_offset = self.offset();
                match self.advance().map(|s| s.token) {
                    Some(Token::Ident(field)) => Ok(Expr::Column(field)),
                    _ => Err(EvalError::syntax("expected field name after 'row.'", field_offset)),
                }
            }
            Some(Token::LBracket) if name == "row" => {
                self.pos += 1;
                let field_offset = self.offset();
                let field = match self.advance().map(|s| s.token) {
                    Some(Token::Str(field)) => field,
                    _ => {
                        return Err(EvalError::syntax(
                            "expected quoted field name in row[...]",
                            field_offset,
                        ))
                    }
                };
                self.expect(&Token::RBracket)?;
                Ok(Expr::Column(field))
            }
            _ => Ok(Expr::Column(name)),
        }
    }

    fn call(&mut self, name: String, offset: usize) -> Result<Expr, EvalError> {
        if self.dialect == Dialect::Row {
            return Err(EvalError::syntax(
                format!("function calls are not allowed here ('{name}')"),
                offset,
            ));
        }
        let function =
            AggregateFunction::from_name(&name).ok_or_else(|| EvalError::UnknownFunction(name))?;

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.expression()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        build_aggregation(function, args).map(Expr::Aggregate)
    }
}

/// Turns `FUNC("col"[, filter][, groupCols][, distinctCol])` into a config.
fn build_aggregation(
    function: AggregateFunction,
    args: Vec<Expr>,
) -> Result<AggregationConfig, EvalError> {
    if args.is_empty() || args.len() > 4 {
        return Err(EvalError::Arity {
            function: function.name().to_string(),
            expected: "1 to 4",
            found: args.len(),
        });
    }
    let mut args = args.into_iter();
    let column = match args.next() {
        Some(Expr::Literal(Value::String(col))) | Some(Expr::Column(col)) => col,
        _ => {
            return Err(EvalError::Type(format!(
                "first argument of {} must be a column name",
                function.name()
            )))
        }
    };
    let mut config = AggregationConfig::new(function, column);

    match args.next() {
        None | Some(Expr::Literal(Value::Null)) => {}
        Some(Expr::Literal(Value::String(filter))) if filter.trim().is_empty() => {}
        Some(Expr::Literal(Value::String(filter))) => {
            parse(&filter, Dialect::Row)?;
            config.filter = Some(AggregationFilter::Expression(filter));
        }
        Some(_) => {
            return Err(EvalError::Type(format!(
                "filter argument of {} must be a string",
                function.name()
            )))
        }
    }

    match args.next() {
        None | Some(Expr::Literal(Value::Null)) => {}
        Some(Expr::Literal(Value::String(cols))) => {
            config.group_columns = cols
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
        }
        Some(Expr::List(items)) => {
            for item in items {
                match item {
                    Expr::Literal(Value::String(col)) => config.group_columns.push(col),
                    _ => {
                        return Err(EvalError::Type(
                            "group columns must be string literals".to_string(),
                        ))
                    }
                }
            }
        }
        Some(_) => {
            return Err(EvalError::Type(
                "group columns must be a list of column names".to_string(),
            ))
        }
    }

    match args.next() {
        None | Some(Expr::Literal(Value::Null)) => {}
        Some(Expr::Literal(Value::String(col))) if !col.is_empty() => {
            config.distinct_column = Some(col);
        }
        Some(_) => {
            return Err(EvalError::Type(
                "distinct column must be a column name".to_string(),
            ))
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ResultHandling;

    fn col(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    fn num(n: f64) -> Expr {
        Expr::Literal(Value::Number(n))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2 > c", Dialect::Formula).unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Gt,
                Expr::binary(
                    BinaryOp::Add,
                    col("a"),
                    Expr::binary(BinaryOp::Mul, col("b"), num(2.0))
                ),
                col("c")
            )
        );
    }

    #[test]
    fn test_logical_precedence() {
        let expr = parse("a || b && c", Dialect::Row).unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Or,
                col("a"),
                Expr::binary(BinaryOp::And, col("b"), col("c"))
            )
        );
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse("amount - refundAmount - processingFee", Dialect::Row).unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Sub,
                Expr::binary(BinaryOp::Sub, col("amount"), col("refundAmount")),
                col("processingFee")
            )
        );
    }

    #[test]
    fn test_row_access_forms() {
        assert_eq!(parse("row.amount", Dialect::Row).unwrap(), col("amount"));
        assert_eq!(parse("row['unit price']", Dialect::Row).unwrap(), col("unit price"));
        assert_eq!(parse("row", Dialect::Row).unwrap(), col("row"));
    }

    #[test]
    fn test_return_and_semicolon_tolerated() {
        let plain = parse("value > 0", Dialect::Row).unwrap();
        assert_eq!(parse("return value > 0;", Dialect::Row).unwrap(), plain);
        assert_eq!(parse("  return (value > 0) ; ", Dialect::Row).unwrap(), plain);
        // A column that happens to start with "return" is left alone.
        assert_eq!(parse("returned", Dialect::Row).unwrap(), col("returned"));
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse("null", Dialect::Row).unwrap(),
            Expr::Literal(Value::Null)
        );
        assert_eq!(
            parse("undefined", Dialect::Row).unwrap(),
            Expr::Literal(Value::Null)
        );
        assert_eq!(
            parse("TRUE", Dialect::Row).unwrap(),
            Expr::Literal(Value::Bool(true))
        );
        assert_eq!(
            parse("[1, 'a']", Dialect::Row).unwrap(),
            Expr::List(vec![num(1.0), Expr::Literal(Value::from("a"))])
        );
    }

    #[test]
    fn test_aggregation_call() {
        let expr = parse(
            "SUM(\"amount\", \"status == 'paid'\", [\"region\", \"month\"], \"orderId\") > 100",
            Dialect::Formula,
        )
        .unwrap();
        let Expr::Binary { left, .. } = expr else {
            panic!("expected comparison");
        };
        let Expr::Aggregate(config) = *left else {
            panic!("expected aggregation");
        };
        assert_eq!(config.function, AggregateFunction::Sum);
        assert_eq!(config.column, "amount");
        assert_eq!(
            config.filter,
            Some(AggregationFilter::Expression("status == 'paid'".into()))
        );
        assert_eq!(config.group_columns, vec!["region", "month"]);
        assert_eq!(config.distinct_column.as_deref(), Some("orderId"));
        assert_eq!(config.result_handling, ResultHandling::All);
    }

    #[test]
    fn test_aggregation_name_is_case_insensitive() {
        let expr = parse("count(id)", Dialect::Formula).unwrap();
        assert!(matches!(expr, Expr::Aggregate(ref c) if c.function == AggregateFunction::Count));
    }

    #[test]
    fn test_aggregation_arity() {
        let err = parse("AVG()", Dialect::Formula).unwrap_err();
        assert_eq!(
            err,
            EvalError::Arity {
                function: "AVG".into(),
                expected: "1 to 4",
                found: 0
            }
        );
        assert!(matches!(
            parse("AVG('a', '', [], 'b', 'c')", Dialect::Formula),
            Err(EvalError::Arity { found: 5, .. })
        ));
    }

    #[test]
    fn test_bad_filter_is_reported_at_parse_time() {
        assert!(matches!(
            parse("SUM('a', 'status ==')", Dialect::Formula),
            Err(EvalError::Syntax { .. })
        ));
    }

    #[test]
    fn test_calls_rejected_in_row_dialect() {
        let err = parse("SUM('amount') > 0", Dialect::Row).unwrap_err();
        assert!(err.to_string().contains("function calls are not allowed"));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            parse("eval('1')", Dialect::Formula).unwrap_err(),
            EvalError::UnknownFunction("eval".into())
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("", Dialect::Row).is_err());
        assert!(parse("(a > 1", Dialect::Row).is_err());
        assert!(parse("a > 1 )", Dialect::Row).is_err());
        assert!(parse("a b", Dialect::Row).is_err());
        assert!(parse("row.", Dialect::Row).is_err());
        assert!(parse("x => x", Dialect::Row).is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(parse(&deep, Dialect::Row).is_err());
    }

    #[test]
    fn test_prefix_operator_chain_is_bounded() {
        let err = parse(&format!("{}row.x", "!".repeat(200_000)), Dialect::Row).unwrap_err();
        assert!(matches!(err, EvalError::Syntax { .. }), "{err}");

        let err = parse(&format!("{}1", "-".repeat(100)), Dialect::Formula).unwrap_err();
        assert!(matches!(err, EvalError::Syntax { .. }), "{err}");

        assert_eq!(
            parse("!!flag", Dialect::Row).unwrap(),
            Expr::unary(UnaryOp::Not, Expr::unary(UnaryOp::Not, col("flag")))
        );
        assert_eq!(parse("+-x", Dialect::Row).unwrap(), Expr::unary(UnaryOp::Neg, col("x")));
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let long = format!("row.x{} > 0", "+1".repeat(200_000));
        let err = parse(&long, Dialect::Row).unwrap_err();
        assert!(err.to_string().contains("expression too large"), "{err}");

        let mixed = format!("a{}", " && b || c".repeat(MAX_OPERATORS));
        assert!(parse(&mixed, Dialect::Row).is_err());

        let fits = format!("x{} > 0", "+1".repeat(MAX_OPERATORS - 1));
        assert!(parse(&fits, Dialect::Row).is_ok());
    }
}
