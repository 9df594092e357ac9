use netx_domain::{Error, Result, ToolCallFull, ToolDefinition, ToolName, ToolResult};
use serde_json::{Value, json};
use tracing::debug;

/// Arithmetic tool the models may call while answering.
pub struct Calculator;

impl Calculator {
    pub const NAME: &'static str = "calculator";

    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(Self::NAME)
            .description(
                "Evaluates an arithmetic expression and returns the numeric result. Supports + - * \
                 / % ^, parentheses, the constants pi and e, and the functions sqrt, abs, ln, log, \
                 log2, exp, sin, cos, tan, floor, ceil, round, min, max and pow. The result of % \
                 takes the sign of the divisor.",
            )
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "The expression to evaluate, for example (1514 + 60) / 2"
                    }
                },
                "required": ["expression"]
            }))
    }

    /// Runs a tool call. Failures become an error result the model can read.
    pub fn call(call: &ToolCallFull) -> ToolResult {
        let result = ToolResult::new(call.name.clone());
        let result = match &call.call_id {
            Some(id) => result.call_id(id.clone()),
            None => result,
        };

        if call.name.as_str() != Self::NAME {
            return result.failure(format!("unknown tool '{}'", call.name));
        }

        let expression = match &call.arguments {
            Value::String(raw) => Some(raw.as_str()),
            Value::Object(map) => map.get("expression").and_then(Value::as_str),
            _ => None,
        };

        match expression {
            Some(expression) => match calculate(expression) {
                Ok(value) => {
                    debug!(expression = %expression, result = %value, "Calculator call");
                    result.success(value)
                }
                Err(err) => result.failure(err),
            },
            None => result.failure("missing 'expression' argument"),
        }
    }

    pub fn name() -> ToolName {
        ToolName::new(Self::NAME)
    }
}

/// Evaluates `expression` and renders the result. Integral values print
/// without a fractional part.
pub fn calculate(expression: &str) -> Result<String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(Error::Evaluation("empty expression".to_string()));
    }
    let mut parser = Parser { tokens, position: 0, depth: 0 };
    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(Error::Evaluation(format!("unexpected {token}")));
    }
    if !value.is_finite() {
        return Err(Error::Evaluation(format!("'{expression}' has no finite value")));
    }
    Ok(format_number(value))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(value) => write!(f, "number {value}"),
            Token::Ident(name) => write!(f, "'{name}'"),
            Token::Plus => f.write_str("'+'"),
            Token::Minus => f.write_str("'-'"),
            Token::Star => f.write_str("'*'"),
            Token::Slash => f.write_str("'/'"),
            Token::Percent => f.write_str("'%'"),
            Token::Caret => f.write_str("'^'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars = input.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let c = chars[index];
        match c {
            c if c.is_whitespace() => index += 1,
            '0'..='9' | '.' => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
                    index += 1;
                }
                // Scientific notation: 1e3, 2.5E-4
                if index < chars.len() && matches!(chars[index], 'e' | 'E') {
                    let mut lookahead = index + 1;
                    if lookahead < chars.len() && matches!(chars[lookahead], '+' | '-') {
                        lookahead += 1;
                    }
                    if lookahead < chars.len() && chars[lookahead].is_ascii_digit() {
                        index = lookahead;
                        while index < chars.len() && chars[index].is_ascii_digit() {
                            index += 1;
                        }
                    }
                }
                let literal = chars[start..index].iter().collect::<String>();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| Error::Evaluation(format!("invalid number '{literal}'")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_alphanumeric() || chars[index] == '_')
                {
                    index += 1;
                }
                tokens.push(Token::Ident(chars[start..index].iter().collect()));
            }
            '*' if chars.get(index + 1) == Some(&'*') => {
                tokens.push(Token::Caret);
                index += 2;
            }
            _ => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '^' => Token::Caret,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => {
                        return Err(Error::Evaluation(format!("unexpected character '{other}'")));
                    }
                });
                index += 1;
            }
        }
    }

    Ok(tokens)
}

/// expression := term (('+' | '-') term)*
/// term       := unary (('*' | '/' | '%') unary)*
/// unary      := ('+' | '-') unary | power
/// power      := primary ('^' unary)?
/// primary    := number | constant | function '(' args ')' | '(' expression ')'
struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

/// Deepest nesting of signs, parentheses and calls the parser accepts.
const MAX_DEPTH: usize = 100;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(Error::Evaluation(format!("expected {expected}, found {token}"))),
            None => Err(Error::Evaluation(format!("expected {expected}, found end of input"))),
        }
    }

    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Plus => {
                    self.position += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.position += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        while let Some(token) = self.peek() {
            match token {
                Token::Star => {
                    self.position += 1;
                    value *= self.unary()?;
                }
                Token::Slash => {
                    self.position += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(Error::Evaluation("division by zero".to_string()));
                    }
                    value /= divisor;
                }
                Token::Percent => {
                    self.position += 1;
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(Error::Evaluation("modulo by zero".to_string()));
                    }
                    // The result takes the sign of the divisor.
                    value -= divisor * (value / divisor).floor();
                }
                _ => break,
            }
        }
        Ok(value)
    }

    /// Every recursive path of the grammar passes through here, so this is
    /// where nesting is bounded.
    fn unary(&mut self) -> Result<f64> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::Evaluation("expression nested too deeply".to_string()));
        }
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.position += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.position += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::Caret) {
            self.position += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.position += 1;
                    let args = self.arguments()?;
                    apply(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(token) => Err(Error::Evaluation(format!("unexpected {token}"))),
            None => Err(Error::Evaluation("unexpected end of input".to_string())),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.position += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(token) => {
                    return Err(Error::Evaluation(format!("expected ',' or ')', found {token}")));
                }
                None => return Err(Error::Evaluation("unclosed function call".to_string())),
            }
        }
    }
}

fn constant(name: &str) -> Result<f64> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        other => Err(Error::Evaluation(format!("unknown identifier '{other}'"))),
    }
}

fn apply(name: &str, args: &[f64]) -> Result<f64> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(Error::Evaluation(format!(
                "{name}() takes {expected} argument(s), {} given",
                args.len()
            )))
        }
    };
    let domain = |valid: bool| {
        if valid {
            Ok(())
        } else {
            Err(Error::Evaluation(format!("math domain error in {name}()")))
        }
    };

    match name {
        "sqrt" => {
            arity(1)?;
            domain(args[0] >= 0.0)?;
            Ok(args[0].sqrt())
        }
        "ln" | "log" | "log2" => {
            arity(1)?;
            domain(args[0] > 0.0)?;
            Ok(match name {
                "ln" => args[0].ln(),
                "log" => args[0].log10(),
                _ => args[0].log2(),
            })
        }
        "abs" | "exp" | "sin" | "cos" | "tan" | "floor" | "ceil" | "round" => {
            arity(1)?;
            let x = args[0];
            Ok(match name {
                "abs" => x.abs(),
                "exp" => x.exp(),
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "floor" => x.floor(),
                "ceil" => x.ceil(),
                _ => x.round(),
            })
        }
        "pow" => {
            arity(2)?;
            Ok(args[0].powf(args[1]))
        }
        "min" | "max" => {
            if args.is_empty() {
                return Err(Error::Evaluation(format!("{name}() needs at least one argument")));
            }
            let fold: fn(f64, f64) -> f64 = if name == "min" { f64::min } else { f64::max };
            Ok(args[1..].iter().copied().fold(args[0], fold))
        }
        other => Err(Error::Evaluation(format!("unknown function '{other}'"))),
    }
}
