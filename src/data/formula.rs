//! Formula parsing for model specification.

use crate::error::{DaaError, Result};
use serde::{Deserialize, Serialize};

/// A term in a formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// Main effect of a variable.
    Main(String),
    /// Interaction between two or more variables.
    Interaction(Vec<String>),
}

impl Term {
    fn from_variables(mut variables: Vec<String>) -> Self {
        if variables.len() == 1 {
            Term::Main(variables.remove(0))
        } else {
            Term::Interaction(variables)
        }
    }

    /// Get the variable names involved in this term.
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Term::Main(v) => vec![v.as_str()],
            Term::Interaction(vs) => vs.iter().map(|v| v.as_str()).collect(),
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Main(v) => write!(f, "{}", v),
            Term::Interaction(vs) => write!(f, "{}", vs.join(":")),
        }
    }
}

/// A parsed model formula.
///
/// Supports R-style formula syntax, with or without the leading `~`:
/// - `group` / `~ group` - intercept + group
/// - `group + age` - intercept + group + age
/// - `group * age` - group + age + group:age
/// - `(a + b) * c` - a + b + c + a:c + b:c
/// - `0 + group` / `group - 1` - no intercept
///
/// Column names containing operator characters can be quoted with backticks,
/// e.g. `` `body-site` + age ``.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Whether to include an intercept.
    pub intercept: bool,
    /// Terms in the formula (excluding intercept), in order of first appearance.
    pub terms: Vec<Term>,
    /// Original formula string.
    pub formula_str: String,
}

impl Formula {
    /// Parse a formula string.
    ///
    /// # Examples
    /// ```
    /// use composition_daa::data::Formula;
    /// let f = Formula::parse("bodysite * month").unwrap();
    /// assert_eq!(f.variables(), vec!["bodysite", "month"]);
    /// assert_eq!(f.terms.len(), 3);
    /// ```
    pub fn parse(formula: &str) -> Result<Self> {
        let rhs = match formula.split_once('~') {
            Some((lhs, rhs)) => {
                if !lhs.trim().is_empty() {
                    return Err(DaaError::FormulaParse(format!(
                        "Response variables are not supported (found \"{}\" before '~')",
                        lhs.trim()
                    )));
                }
                rhs
            }
            None => formula,
        };

        let tokens = tokenize(rhs)?;
        if tokens.is_empty() {
            return Err(DaaError::FormulaParse(
                "Formula right-hand side is empty".to_string(),
            ));
        }

        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            intercept: true,
        };
        let sets = parser.expression()?;
        if let Some(tok) = parser.peek() {
            return Err(DaaError::FormulaParse(format!(
                "Unexpected '{}' in formula \"{}\"",
                tok, formula
            )));
        }

        let terms: Vec<Term> = sets
            .into_iter()
            .filter(|vars| !vars.is_empty())
            .map(Term::from_variables)
            .collect();

        if terms.is_empty() {
            return Err(DaaError::FormulaParse(
                "Formula must have at least one term".to_string(),
            ));
        }

        Ok(Self {
            intercept: parser.intercept,
            terms,
            formula_str: formula.to_string(),
        })
    }

    /// Get all variable names used in the formula, in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = Vec::new();
        for var in self.terms.iter().flat_map(|t| t.variables()) {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        vars
    }

    /// Check if a variable is used in the formula.
    pub fn uses_variable(&self, name: &str) -> bool {
        self.terms.iter().any(|t| t.variables().contains(&name))
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.intercept {
            write!(f, "0 + ")?;
        }
        let term_strs: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", term_strs.join(" + "))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Number(String),
    Plus,
    Minus,
    Star,
    Colon,
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Name(s) | Token::Number(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Colon => write!(f, ":"),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | ':' | '(' | ')' | '~' | '`')
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' => tokens.push(Token::Star),
            ':' => tokens.push(Token::Colon),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '~' => {
                return Err(DaaError::FormulaParse(
                    "Formula may contain at most one '~'".to_string(),
                ))
            }
            '`' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(DaaError::FormulaParse(
                                "Unterminated backtick-quoted name".to_string(),
                            ))
                        }
                    }
                }
                if name.is_empty() {
                    return Err(DaaError::FormulaParse("Empty quoted name".to_string()));
                }
                tokens.push(Token::Name(name));
                continue;
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || is_operator(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                if word.parse::<f64>().is_ok() {
                    tokens.push(Token::Number(word));
                } else {
                    tokens.push(Token::Name(word));
                }
                continue;
            }
        }
        chars.next();
    }

    Ok(tokens)
}

/// Recursive-descent parser producing term sets; the empty set is the intercept.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    intercept: bool,
}

type TermSets = Vec<Vec<String>>;

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    // expression := ['-'] product (('+' | '-') product)*
    fn expression(&mut self) -> Result<TermSets> {
        let mut sets = if self.peek() == Some(&Token::Minus) {
            self.next();
            let removed = self.product()?;
            self.remove(Vec::new(), &removed)
        } else {
            self.product()?
        };

        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    let rhs = self.product()?;
                    sets = union(sets, rhs);
                }
                Some(Token::Minus) => {
                    self.next();
                    let rhs = self.product()?;
                    sets = self.remove(sets, &rhs);
                }
                _ => return Ok(sets),
            }
        }
    }

    // product := interaction ('*' interaction)*
    fn product(&mut self) -> Result<TermSets> {
        let mut sets = self.interaction()?;
        while self.peek() == Some(&Token::Star) {
            self.next();
            let rhs = self.interaction()?;
            let crossed = cross(&sets, &rhs);
            sets = union(union(sets, rhs), crossed);
        }
        Ok(sets)
    }

    // interaction := atom (':' atom)*
    fn interaction(&mut self) -> Result<TermSets> {
        let mut sets = self.atom()?;
        while self.peek() == Some(&Token::Colon) {
            self.next();
            let rhs = self.atom()?;
            sets = cross(&sets, &rhs);
        }
        Ok(sets)
    }

    fn atom(&mut self) -> Result<TermSets> {
        match self.next().cloned() {
            Some(Token::Name(name)) => Ok(vec![vec![name]]),
            Some(Token::Number(n)) => match n.as_str() {
                "1" => Ok(vec![Vec::new()]),
                "0" => {
                    self.intercept = false;
                    Ok(Vec::new())
                }
                other => Err(DaaError::FormulaParse(format!(
                    "Numeric literal '{}' is not a valid term",
                    other
                ))),
            },
            Some(Token::Open) => {
                let inner = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(DaaError::FormulaParse(
                        "Unbalanced parentheses in formula".to_string(),
                    )),
                }
            }
            Some(tok) => Err(DaaError::FormulaParse(format!(
                "Expected a term but found '{}'",
                tok
            ))),
            None => Err(DaaError::FormulaParse(
                "Formula ends with a dangling operator".to_string(),
            )),
        }
    }

    fn remove(&mut self, sets: TermSets, removed: &TermSets) -> TermSets {
        if removed.iter().any(|s| s.is_empty()) {
            self.intercept = false;
        }
        sets.into_iter()
            .filter(|s| !removed.iter().any(|r| same_set(s, r)))
            .collect()
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|v| b.contains(v))
}

fn union(mut lhs: TermSets, rhs: TermSets) -> TermSets {
    for set in rhs {
        if !lhs.iter().any(|s| same_set(s, &set)) {
            lhs.push(set);
        }
    }
    lhs
}

fn cross(lhs: &TermSets, rhs: &TermSets) -> TermSets {
    let mut out: TermSets = Vec::new();
    for a in lhs {
        for b in rhs {
            let mut merged = a.clone();
            for v in b {
                if !merged.contains(v) {
                    merged.push(v.clone());
                }
            }
            if !out.iter().any(|s| same_set(s, &merged)) {
                out.push(merged);
            }
        }
    }
    out
}
