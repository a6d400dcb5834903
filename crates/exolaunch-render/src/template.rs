//! Template parsing and evaluation.
//!
//! Supported syntax:
//! - `{{ name }}`, `{{ item.field }}`
//! - `{% for x in seq %}...{% endfor %}` (binds `loop.index`, `loop.index0`,
//!   `loop.first`, `loop.last`)
//! - `{% if cond %}...{% else %}...{% endif %}` where `cond` is `name`,
//!   `not name`, `name == "lit"`, `name != "lit"`, `name is defined` or
//!   `name is not defined`
//! - `{# comment #}`
//!
//! Block tags swallow the newline that follows them and the indentation
//! that precedes them, so a tag on a line of its own leaves no blank line.

use crate::Params;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
    #[error("Template {template} requires parameter '{name}' which was not provided")]
    MissingParameter { template: String, name: String },
    #[error("Syntax error in template {template} line {line}: {message}")]
    Syntax {
        template: String,
        line: usize,
        message: String,
    },
    #[error("Parameter '{name}' in template {template} is not a sequence")]
    NotIterable { template: String, name: String },
    #[error("Parameter '{name}' in template {template} is a mapping and cannot be printed")]
    NotPrintable { template: String, name: String },
    #[error("Failed to read templates from {path}: {message}")]
    Read { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Expr { body: String, line: usize },
    Block { body: String, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Cond {
    Truthy(Vec<String>),
    Not(Vec<String>),
    Eq(Vec<String>, String),
    Ne(Vec<String>, String),
    Defined(Vec<String>),
    NotDefined(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(Vec<String>),
    For {
        var: String,
        seq: Vec<String>,
        body: Vec<Node>,
    },
    If {
        cond: Cond,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Open block while parsing.
enum Frame {
    Root(Vec<Node>),
    For {
        var: String,
        seq: Vec<String>,
        body: Vec<Node>,
        line: usize,
    },
    If {
        cond: Cond,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        in_else: bool,
        line: usize,
    },
}

impl Frame {
    fn nodes(&mut self) -> &mut Vec<Node> {
        match self {
            Frame::Root(nodes) => nodes,
            Frame::For { body, .. } => body,
            Frame::If {
                then,
                otherwise,
                in_else,
                ..
            } => {
                if *in_else {
                    otherwise
                } else {
                    then
                }
            }
        }
    }
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template source.
    pub fn parse(name: &str, source: &str) -> Result<Self, RenderError> {
        let tokens = tokenize(name, source)?;
        let nodes = build(name, tokens)?;
        Ok(Self {
            name: name.to_string(),
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with the given parameters.
    pub fn render(&self, params: &Params) -> Result<String, RenderError> {
        let mut scope = Scope {
            params,
            locals: Vec::new(),
        };
        let mut out = String::new();
        self.render_nodes(&self.nodes, &mut scope, &mut out)?;
        Ok(out)
    }

    /// Names of all top-level parameters the template reads.
    pub fn parameters(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_parameters(&self.nodes, &mut Vec::new(), &mut names);
        names
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        scope: &mut Scope<'_>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Var(path) => {
                    let value = self.require(scope, path)?;
                    let text = display(&value).ok_or_else(|| RenderError::NotPrintable {
                        template: self.name.clone(),
                        name: path.join("."),
                    })?;
                    out.push_str(&text);
                }
                Node::For { var, seq, body } => {
                    let value = self.require(scope, seq)?;
                    let items = match value {
                        Value::Sequence(items) => items,
                        Value::Null => Vec::new(),
                        _ => {
                            return Err(RenderError::NotIterable {
                                template: self.name.clone(),
                                name: seq.join("."),
                            });
                        }
                    };
                    let count = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        scope.locals.push((var.clone(), item));
                        scope.locals.push(("loop".to_string(), loop_info(i, count)));
                        let result = self.render_nodes(body, scope, out);
                        scope.locals.truncate(scope.locals.len() - 2);
                        result?;
                    }
                }
                Node::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    let branch = if self.eval(scope, cond)? {
                        then
                    } else {
                        otherwise
                    };
                    self.render_nodes(branch, scope, out)?;
                }
            }
        }
        Ok(())
    }

    fn eval(&self, scope: &Scope<'_>, cond: &Cond) -> Result<bool, RenderError> {
        Ok(match cond {
            Cond::Truthy(path) => truthy(&self.require(scope, path)?),
            Cond::Not(path) => !truthy(&self.require(scope, path)?),
            Cond::Eq(path, lit) => self.shown(scope, path)?.as_deref() == Some(lit.as_str()),
            Cond::Ne(path, lit) => self.shown(scope, path)?.as_deref() != Some(lit.as_str()),
            Cond::Defined(path) => scope.lookup(path).is_some(),
            Cond::NotDefined(path) => scope.lookup(path).is_none(),
        })
    }

    fn shown(&self, scope: &Scope<'_>, path: &[String]) -> Result<Option<String>, RenderError> {
        Ok(display(&self.require(scope, path)?))
    }

    fn require(&self, scope: &Scope<'_>, path: &[String]) -> Result<Value, RenderError> {
        scope
            .lookup(path)
            .ok_or_else(|| RenderError::MissingParameter {
                template: self.name.clone(),
                name: path.join("."),
            })
    }
}

struct Scope<'a> {
    params: &'a Params,
    locals: Vec<(String, Value)>,
}

impl Scope<'_> {
    fn lookup(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        let mut value = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| name == head)
            .map(|(_, v)| v)
            .or_else(|| self.params.get(head))?;
        for key in rest {
            value = value.get(key.as_str())?;
        }
        Some(value.clone())
    }
}

fn loop_info(index0: usize, count: usize) -> Value {
    let mut map = Mapping::new();
    map.insert("index0".into(), Value::from(index0 as u64));
    map.insert("index".into(), Value::from(index0 as u64 + 1));
    map.insert("first".into(), Value::Bool(index0 == 0));
    map.insert("last".into(), Value::Bool(index0 + 1 == count));
    Value::Mapping(map)
}

/// Text form of a value, or `None` for mappings.
pub fn display(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Sequence(items) => items
            .iter()
            .map(display)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(" ")),
        Value::Mapping(_) => None,
        Value::Tagged(tagged) => display(&tagged.value),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => truthy(&tagged.value),
    }
}

fn collect_parameters(nodes: &[Node], bound: &mut Vec<String>, names: &mut Vec<String>) {
    let note = |path: &[String], bound: &Vec<String>, names: &mut Vec<String>| {
        let free = path
            .first()
            .filter(|&head| !bound.contains(head) && head != "loop" && !names.contains(head));
        if let Some(head) = free {
            names.push(head.clone());
        }
    };
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Var(path) => note(path, bound, names),
            Node::For { var, seq, body } => {
                note(seq, bound, names);
                bound.push(var.clone());
                collect_parameters(body, bound, names);
                bound.pop();
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                match cond {
                    // Optional parameters are not required
                    Cond::Defined(_) | Cond::NotDefined(_) => {}
                    Cond::Truthy(p) | Cond::Not(p) | Cond::Eq(p, _) | Cond::Ne(p, _) => {
                        note(p, bound, names)
                    }
                }
                collect_parameters(then, bound, names);
                collect_parameters(otherwise, bound, names);
            }
        }
    }
}

fn syntax(template: &str, line: usize, message: impl Into<String>) -> RenderError {
    RenderError::Syntax {
        template: template.to_string(),
        line,
        message: message.into(),
    }
}

fn tokenize(name: &str, source: &str) -> Result<Vec<Token>, RenderError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1;
    let mut trim_next_newline = false;

    while !rest.is_empty() {
        let next = ["{{", "{%", "{#"]
            .iter()
            .filter_map(|open| rest.find(open).map(|pos| (pos, *open)))
            .min_by_key(|(pos, _)| *pos);

        let Some((pos, open)) = next else {
            push_text(&mut tokens, rest, &mut trim_next_newline);
            break;
        };

        let mut text = &rest[..pos];
        if open != "{{" {
            // Strip indentation before a block tag that starts its line
            let line_start = text.rfind('\n').map(|i| i + 1);
            let starts_line = line_start.is_some() || rest.len() == source.len();
            let line_start = line_start.unwrap_or(0);
            if starts_line && text[line_start..].chars().all(|c| c == ' ' || c == '\t') {
                text = &text[..line_start];
            }
        }
        push_text(&mut tokens, text, &mut trim_next_newline);
        line += rest[..pos].matches('\n').count();

        let close = match open {
            "{{" => "}}",
            "{%" => "%}",
            _ => "#}",
        };
        let after_open = &rest[pos + 2..];
        let end = after_open
            .find(close)
            .ok_or_else(|| syntax(name, line, format!("unclosed '{}'", open)))?;
        let body = after_open[..end].trim().to_string();

        match open {
            "{{" => tokens.push(Token::Expr { body, line }),
            "{%" => {
                tokens.push(Token::Block { body, line });
                trim_next_newline = true;
            }
            _ => trim_next_newline = true,
        }

        line += after_open[..end].matches('\n').count();
        rest = &after_open[end + 2..];
    }

    Ok(tokens)
}

fn push_text(tokens: &mut Vec<Token>, text: &str, trim_next_newline: &mut bool) {
    let mut text = text;
    if std::mem::take(trim_next_newline) {
        text = text
            .strip_prefix("\r\n")
            .or_else(|| text.strip_prefix('\n'))
            .unwrap_or(text);
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text.to_string()));
    }
}

fn parse_path(template: &str, line: usize, expr: &str) -> Result<Vec<String>, RenderError> {
    let expr = expr.trim();
    let parts: Vec<String> = expr.split('.').map(str::to_string).collect();
    let valid = parts.iter().all(|p| {
        let mut chars = p.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    });
    if valid {
        Ok(parts)
    } else {
        Err(syntax(template, line, format!("invalid name '{}'", expr)))
    }
}

fn parse_literal(raw: &str) -> String {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|r| r.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    raw.to_string()
}

fn parse_cond(template: &str, line: usize, expr: &str) -> Result<Cond, RenderError> {
    let expr = expr.trim();
    if let Some(name) = expr.strip_suffix(" is not defined") {
        return Ok(Cond::NotDefined(parse_path(template, line, name)?));
    }
    if let Some(name) = expr.strip_suffix(" is defined") {
        return Ok(Cond::Defined(parse_path(template, line, name)?));
    }
    // Operators are only looked for before the quoted literal
    let head = &expr[..expr.find(['"', '\'']).unwrap_or(expr.len())];
    if let Some(pos) = head.find("!=") {
        let lhs = parse_path(template, line, &expr[..pos])?;
        return Ok(Cond::Ne(lhs, parse_literal(&expr[pos + 2..])));
    }
    if let Some(pos) = head.find("==") {
        let lhs = parse_path(template, line, &expr[..pos])?;
        return Ok(Cond::Eq(lhs, parse_literal(&expr[pos + 2..])));
    }
    if let Some(name) = expr.strip_prefix("not ") {
        return Ok(Cond::Not(parse_path(template, line, name)?));
    }
    Ok(Cond::Truthy(parse_path(template, line, expr)?))
}

fn build(name: &str, tokens: Vec<Token>) -> Result<Vec<Node>, RenderError> {
    let mut stack = vec![Frame::Root(Vec::new())];

    for token in tokens {
        match token {
            Token::Text(text) => current(name, 0, &mut stack)?.push(Node::Text(text)),
            Token::Expr { body, line } => {
                let path = parse_path(name, line, &body)?;
                current(name, line, &mut stack)?.push(Node::Var(path));
            }
            Token::Block { body, line } => {
                let (keyword, args) = body
                    .split_once(char::is_whitespace)
                    .map(|(k, a)| (k, a.trim()))
                    .unwrap_or((body.as_str(), ""));
                match keyword {
                    "for" => {
                        let parts: Vec<&str> = args.split_whitespace().collect();
                        let [var, "in", seq] = parts.as_slice() else {
                            return Err(syntax(name, line, "expected 'for <name> in <sequence>'"));
                        };
                        let var = parse_path(name, line, var)?;
                        if var.len() != 1 {
                            return Err(syntax(name, line, "loop variable must be a plain name"));
                        }
                        stack.push(Frame::For {
                            var: var[0].clone(),
                            seq: parse_path(name, line, seq)?,
                            body: Vec::new(),
                            line,
                        });
                    }
                    "endfor" => match stack.pop() {
                        Some(Frame::For { var, seq, body, .. }) => {
                            current(name, line, &mut stack)?.push(Node::For { var, seq, body })
                        }
                        _ => return Err(syntax(name, line, "'endfor' without 'for'")),
                    },
                    "if" => stack.push(Frame::If {
                        cond: parse_cond(name, line, args)?,
                        then: Vec::new(),
                        otherwise: Vec::new(),
                        in_else: false,
                        line,
                    }),
                    "else" => match stack.last_mut() {
                        Some(Frame::If { in_else, .. }) if !*in_else => *in_else = true,
                        _ => return Err(syntax(name, line, "'else' without 'if'")),
                    },
                    "endif" => match stack.pop() {
                        Some(Frame::If {
                            cond,
                            then,
                            otherwise,
                            ..
                        }) => current(name, line, &mut stack)?.push(Node::If {
                            cond,
                            then,
                            otherwise,
                        }),
                        _ => return Err(syntax(name, line, "'endif' without 'if'")),
                    },
                    other => {
                        return Err(syntax(name, line, format!("unknown block tag '{}'", other)));
                    }
                }
            }
        }
    }

    match stack.pop() {
        Some(Frame::Root(nodes)) if stack.is_empty() => Ok(nodes),
        Some(Frame::For { line, .. }) => Err(syntax(name, line, "'for' is never closed")),
        Some(Frame::If { line, .. }) => Err(syntax(name, line, "'if' is never closed")),
        _ => Err(syntax(name, 0, "unbalanced blocks")),
    }
}

fn current<'a>(
    name: &str,
    line: usize,
    stack: &'a mut [Frame],
) -> Result<&'a mut Vec<Node>, RenderError> {
    stack
        .last_mut()
        .map(Frame::nodes)
        .ok_or_else(|| syntax(name, line, "unbalanced blocks"))
}
