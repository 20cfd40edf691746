//! Restricted evaluator for chart script fragments.
//!
//! Supports declarations (`const|let|var id = expr`), `new Chart(target,
//! config)`, `document.getElementById('id')`, `.getContext('2d')` and
//! `document.addEventListener(event, function)` (the handler body runs
//! immediately). Every other identifier or call is rejected.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use richview_extract::{config_from_literal, matching_delimiter};

use crate::engine::ChartEngine;
use crate::error::SandboxError;
use crate::tree::{ChartInstance, RenderTree};

lazy_static! {
    static ref TARGET_ID: Regex =
        Regex::new(r#"getElementById\(\s*['"`]([^'"`]+)['"`]\s*\)"#).unwrap();
    static ref STRING_TARGET: Regex =
        Regex::new(r#"\bnew\s+Chart\s*\(\s*['"`]([^'"`]+)['"`]"#).unwrap();
}

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Undefined,
    Str(String),
    Number(#[allow(dead_code)] f64),
    Literal(String),
    Element(String),
    Context(String),
    Chart(#[allow(dead_code)] String),
    Function(String),
}

/// Runs script fragments against a render tree with only the chart engine
/// entry point reachable.
pub struct ScriptSandbox<'a> {
    tree: &'a RenderTree,
    engine: &'a dyn ChartEngine,
}

impl<'a> ScriptSandbox<'a> {
    pub fn new(tree: &'a RenderTree, engine: &'a dyn ChartEngine) -> Self {
        Self { tree, engine }
    }

    /// Canvas ids the fragment looks up, in order of first appearance.
    pub fn target_ids(fragment: &str) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for caps in TARGET_ID.captures_iter(fragment).chain(STRING_TARGET.captures_iter(fragment)) {
            let id = caps[1].to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Executes the fragment and returns the ids of the canvases it drew
    /// into. Fails when nothing was drawn. On failure every chart the run
    /// already attached is destroyed again.
    pub fn run(&self, fragment: &str) -> Result<Vec<String>, SandboxError> {
        let mut interpreter =
            Interpreter { sandbox: self, src: fragment, pos: 0, scope: HashMap::new(), charted: Vec::new() };
        if let Err(error) = interpreter.statements() {
            for id in &interpreter.charted {
                self.tree.destroy_chart(id);
            }
            return Err(error);
        }
        if interpreter.charted.is_empty() {
            return Err(SandboxError::NoChart);
        }
        Ok(interpreter.charted)
    }

    fn create_chart(&self, target: &Value, config: &Value) -> Result<String, SandboxError> {
        let id = match target {
            Value::Element(id) | Value::Context(id) | Value::Str(id) => id,
            other => return Err(SandboxError::Forbidden(format!("new Chart({other:?})"))),
        };
        let Some((width, height)) = self.tree.size(id) else {
            return Err(SandboxError::MissingTarget(id.clone()));
        };
        let Value::Literal(literal) = config else {
            return Err(SandboxError::InvalidConfig);
        };
        let config = config_from_literal(literal).ok_or(SandboxError::InvalidConfig)?;
        let surface = self
            .engine
            .draw(&config, width, height)
            .map_err(|e| SandboxError::Draw(format!("{e:#}")))?;
        self.tree.attach(id, ChartInstance::new(*config.kind(), surface));
        Ok(id.clone())
    }
}

struct Interpreter<'s, 'a> {
    sandbox: &'s ScriptSandbox<'a>,
    src: &'s str,
    pos: usize,
    scope: HashMap<String, Value>,
    charted: Vec<String>,
}

impl<'s> Interpreter<'s, '_> {
    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn syntax(&self, message: impl Into<String>) -> SandboxError {
        SandboxError::Syntax { offset: self.pos, message: message.into() }
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if trimmed.starts_with("/*") {
                self.pos += trimmed.find("*/").map(|i| i + 2).unwrap_or(trimmed.len());
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_trivia();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), SandboxError> {
        if self.eat(token) { Ok(()) } else { Err(self.syntax(format!("expected '{token}'"))) }
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_trivia();
        let rest = self.rest();
        if !rest.starts_with(|c: char| c.is_alphabetic() || c == '_' || c == '$') {
            return None;
        }
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        self.pos += len;
        Some(rest[..len].to_string())
    }

    fn peek_ident(&mut self) -> Option<String> {
        let start = self.pos;
        let ident = self.ident();
        self.pos = start;
        ident
    }

    fn statements(&mut self) -> Result<(), SandboxError> {
        loop {
            self.skip_trivia();
            while self.eat(";") {}
            if self.rest().is_empty() {
                return Ok(());
            }
            self.statement()?;
        }
    }

    fn statement(&mut self) -> Result<(), SandboxError> {
        if self.peek_ident().is_some_and(|k| matches!(k.as_str(), "const" | "let" | "var")) {
            self.ident();
            let name = self.ident().ok_or_else(|| self.syntax("expected a name"))?;
            self.expect("=")?;
            let value = self.expression()?;
            self.scope.insert(name, value);
            return Ok(());
        }
        self.expression().map(|_| ())
    }

    fn expression(&mut self) -> Result<Value, SandboxError> {
        self.skip_trivia();
        let rest = self.rest();
        let mut value = match rest.chars().next() {
            None => return Err(self.syntax("unexpected end of script")),
            Some('{') | Some('[') => self.literal()?,
            Some(q @ ('\'' | '"' | '`')) => self.string(q)?,
            Some(c) if c.is_ascii_digit() || c == '-' || c == '.' => self.number()?,
            Some('(') => self.arrow_function()?,
            Some(_) => match self.ident() {
                Some(name) => self.named(name)?,
                None => return Err(self.syntax("unexpected character")),
            },
        };

        while self.eat(".") {
            let member = self.ident().ok_or_else(|| self.syntax("expected a member name"))?;
            value = match (member.as_str(), &value) {
                ("getContext", Value::Element(id)) => {
                    let id = id.clone();
                    self.arguments()?;
                    Value::Context(id)
                }
                _ => return Err(SandboxError::Forbidden(member.clone())),
            };
        }
        Ok(value)
    }

    fn named(&mut self, name: String) -> Result<Value, SandboxError> {
        match name.as_str() {
            "new" => {
                let class = self.ident().ok_or_else(|| self.syntax("expected a constructor"))?;
                if class != "Chart" {
                    return Err(SandboxError::Forbidden(format!("new {class}")));
                }
                let args = self.arguments()?;
                let (Some(target), Some(config)) = (args.first(), args.get(1)) else {
                    return Err(self.syntax("Chart expects a target and a configuration"));
                };
                let id = self.sandbox.create_chart(target, config)?;
                self.charted.push(id.clone());
                Ok(Value::Chart(id))
            }
            "document" => {
                self.expect(".")?;
                let method = self.ident().ok_or_else(|| self.syntax("expected a member name"))?;
                let args = self.arguments()?;
                match (method.as_str(), args.as_slice()) {
                    ("getElementById", [Value::Str(id)]) => {
                        if self.sandbox.tree.contains(id) {
                            Ok(Value::Element(id.clone()))
                        } else {
                            Err(SandboxError::MissingTarget(id.clone()))
                        }
                    }
                    ("addEventListener", [Value::Str(_), Value::Function(body)]) => {
                        self.call(body.clone())?;
                        Ok(Value::Undefined)
                    }
                    _ => Err(SandboxError::Forbidden(format!("document.{method}"))),
                }
            }
            "function" => {
                self.ident();
                self.parameters()?;
                self.block()
            }
            "true" | "false" | "null" | "undefined" => Ok(Value::Literal(name.clone())),
            _ => self.scope.get(&name).cloned().ok_or_else(|| SandboxError::Forbidden(name.clone())),
        }
    }

    fn call(&mut self, body: String) -> Result<(), SandboxError> {
        let mut inner = Interpreter {
            sandbox: self.sandbox,
            src: &body,
            pos: 0,
            scope: self.scope.clone(),
            charted: std::mem::take(&mut self.charted),
        };
        let result = inner.statements();
        self.charted = inner.charted;
        result
    }

    fn arguments(&mut self) -> Result<Vec<Value>, SandboxError> {
        self.expect("(")?;
        let mut args = Vec::new();
        if self.eat(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(")") {
                return Ok(args);
            }
            self.expect(",")?;
            if self.eat(")") {
                return Ok(args);
            }
        }
    }

    fn parameters(&mut self) -> Result<(), SandboxError> {
        self.skip_trivia();
        let close = matching_delimiter(self.src, self.pos).ok_or_else(|| self.syntax("unclosed parameter list"))?;
        self.pos = close + 1;
        Ok(())
    }

    fn block(&mut self) -> Result<Value, SandboxError> {
        self.skip_trivia();
        if !self.rest().starts_with('{') {
            return Err(self.syntax("expected a function body"));
        }
        let close = matching_delimiter(self.src, self.pos).ok_or_else(|| self.syntax("unclosed block"))?;
        let body = self.src[self.pos + 1..close].to_string();
        self.pos = close + 1;
        Ok(Value::Function(body))
    }

    fn arrow_function(&mut self) -> Result<Value, SandboxError> {
        self.parameters()?;
        self.expect("=>")?;
        self.block()
    }

    fn literal(&mut self) -> Result<Value, SandboxError> {
        let close = matching_delimiter(self.src, self.pos).ok_or_else(|| self.syntax("unclosed literal"))?;
        let literal = self.src[self.pos..=close].to_string();
        self.pos = close + 1;
        Ok(Value::Literal(literal))
    }

    fn string(&mut self, quote: char) -> Result<Value, SandboxError> {
        let body = &self.rest()[1..];
        let mut value = String::new();
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                }
                '$' if quote == '`' && body[i..].starts_with("${") => {
                    return Err(SandboxError::Forbidden("template interpolation".to_string()));
                }
                c if c == quote => {
                    self.pos += 1 + i + c.len_utf8();
                    return Ok(Value::Str(value));
                }
                c => value.push(c),
            }
        }
        Err(self.syntax("unterminated string"))
    }

    fn number(&mut self) -> Result<Value, SandboxError> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-'))
            .count();
        let text = &rest[..len];
        let value = text.parse::<f64>().map_err(|_| self.syntax("invalid number"))?;
        self.pos += len;
        Ok(Value::Number(value))
    }
}
