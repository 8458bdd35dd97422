//! Mapping by the string value of an XPath expression over the payload.
//!
//! Only a subset of XPath 1.0 is supported: location paths made of child
//! (`/`), descendant (`//`), attribute (`@`) and self (`.`) steps with name,
//! `*` and `text()` tests, optionally wrapped in one of `string()`,
//! `normalize-space()`, `local-name()`, `name()` or `count()`.

use super::{EndpointMapping, EndpointRegistry, MappingSupport};
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInvocationChain};
use crate::error::SoapError;
use crate::qname::QName;
use crate::xml::{XmlAttribute, XmlElement, XmlNode};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    Attribute,
    SelfNode,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    /// `*`
    Principal,
    /// `prefix:*`
    AnyIn(String),
    Name(QName),
    Text,
    Node,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
}

#[derive(Debug, Clone, PartialEq)]
struct LocationPath {
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    String,
    NormalizeSpace,
    LocalName,
    Name,
    Count,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "normalize-space" => Self::NormalizeSpace,
            "local-name" => Self::LocalName,
            "name" => Self::Name,
            "count" => Self::Count,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Path(LocationPath),
    Call(Function, Option<LocationPath>),
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq)]
pub struct XPathExpression {
    source: String,
    expr: Expr,
}

impl XPathExpression {
    /// Compile `expression`, resolving prefixes through `namespaces`.
    /// Unprefixed names match elements and attributes without a namespace.
    pub fn compile(
        expression: &str,
        namespaces: &HashMap<String, String>,
    ) -> Result<Self, SoapError> {
        let mut parser = Parser {
            input: expression.trim(),
            pos: 0,
            namespaces,
        };
        let expr = parser.expression().map_err(|reason| {
            SoapError::Config(format!("invalid XPath expression [{expression}]: {reason}"))
        })?;
        Ok(Self {
            source: expression.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against a document whose root element is `payload`.
    pub fn evaluate(&self, payload: Option<&XmlElement>) -> String {
        let document = Node::Document(payload);
        match &self.expr {
            Expr::Path(path) => first_string(&select(path, document)),
            Expr::Call(function, argument) => {
                let nodes = match argument {
                    Some(path) => select(path, document),
                    None => vec![document],
                };
                match function {
                    Function::String => first_string(&nodes),
                    Function::NormalizeSpace => first_string(&nodes)
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" "),
                    Function::LocalName => nodes
                        .first()
                        .and_then(Node::name)
                        .map(|name| name.local_part().to_string())
                        .unwrap_or_default(),
                    Function::Name => nodes
                        .first()
                        .and_then(Node::name)
                        .map(QName::qualified)
                        .unwrap_or_default(),
                    Function::Count => nodes.len().to_string(),
                }
            }
        }
    }
}

impl fmt::Display for XPathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Clone, Copy)]
enum Node<'a> {
    Document(Option<&'a XmlElement>),
    Element(&'a XmlElement),
    Attribute(&'a XmlAttribute),
    Text(&'a str),
}

impl<'a> Node<'a> {
    fn children(self) -> Vec<Node<'a>> {
        match self {
            Node::Document(root) => root.map(Node::Element).into_iter().collect(),
            Node::Element(element) => element
                .children()
                .iter()
                .filter_map(|child| match child {
                    XmlNode::Element(e) => Some(Node::Element(e)),
                    XmlNode::Text(t) | XmlNode::CData(t) => Some(Node::Text(t)),
                    XmlNode::Comment(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn name(&self) -> Option<&'a QName> {
        match *self {
            Node::Element(e) => Some(e.name()),
            Node::Attribute(a) => Some(&a.name),
            _ => None,
        }
    }

    fn string_value(&self) -> String {
        match *self {
            Node::Document(root) => root.map(XmlElement::text_content).unwrap_or_default(),
            Node::Element(e) => e.text_content(),
            Node::Attribute(a) => a.value.clone(),
            Node::Text(t) => t.to_string(),
        }
    }

    /// Identity for de-duplicating node sets.
    fn key(&self) -> usize {
        match *self {
            Node::Document(_) => 0,
            Node::Element(e) => e as *const XmlElement as usize,
            Node::Attribute(a) => a as *const XmlAttribute as usize,
            Node::Text(t) => t.as_ptr() as usize,
        }
    }

    fn matches(&self, test: &NodeTest) -> bool {
        match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(self, Node::Text(_)),
            NodeTest::Principal => matches!(self, Node::Element(_) | Node::Attribute(_)),
            NodeTest::AnyIn(ns) => self.name().is_some_and(|n| n.namespace() == ns.as_str()),
            NodeTest::Name(name) => self.name().is_some_and(|n| n == name),
        }
    }
}

fn first_string(nodes: &[Node<'_>]) -> String {
    nodes.first().map(Node::string_value).unwrap_or_default()
}

fn select<'a>(path: &LocationPath, document: Node<'a>) -> Vec<Node<'a>> {
    let mut current = vec![document];
    for step in &path.steps {
        let mut seen = HashSet::new();
        let mut next = Vec::new();
        for node in current {
            let mut found = Vec::new();
            apply_step(step, node, &mut found);
            for candidate in found {
                if seen.insert(candidate.key()) {
                    next.push(candidate);
                }
            }
        }
        current = next;
    }
    current
}

fn apply_step<'a>(step: &Step, node: Node<'a>, out: &mut Vec<Node<'a>>) {
    match step.axis {
        Axis::SelfNode => {
            if node.matches(&step.test) {
                out.push(node);
            }
        }
        Axis::Child => out.extend(node.children().into_iter().filter(|c| c.matches(&step.test))),
        Axis::Descendant => {
            for child in node.children() {
                if child.matches(&step.test) {
                    out.push(child);
                }
                apply_step(step, child, out);
            }
        }
        Axis::Attribute => {
            if let Node::Element(element) = node {
                out.extend(
                    element
                        .attributes()
                        .iter()
                        .map(Node::Attribute)
                        .filter(|a| a.matches(&step.test)),
                );
            }
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    namespaces: &'a HashMap<String, String>,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.input.len()
    }

    fn expression(&mut self) -> Result<Expr, String> {
        if self.at_end() {
            return Err("empty expression".to_string());
        }
        let expr = match self.function_name() {
            Some(function) => {
                self.eat("(");
                let argument = if self.eat(")") {
                    None
                } else {
                    let path = self.location_path()?;
                    if !self.eat(")") {
                        return Err("expected ')'".to_string());
                    }
                    Some(path)
                };
                if function == Function::Count && argument.is_none() {
                    return Err("count() requires a node-set argument".to_string());
                }
                Expr::Call(function, argument)
            }
            None => Expr::Path(self.location_path()?),
        };
        if !self.at_end() {
            return Err(format!("unexpected input at offset {}", self.pos));
        }
        Ok(expr)
    }

    /// A known function name directly followed by `(`.
    fn function_name(&mut self) -> Option<Function> {
        self.skip_whitespace();
        let rest = self.rest();
        let end = rest.find('(')?;
        let function = Function::from_name(rest[..end].trim_end())?;
        self.pos += end;
        Some(function)
    }

    fn location_path(&mut self) -> Result<LocationPath, String> {
        let mut steps = Vec::new();
        let mut axis = if self.eat("//") {
            Some(Axis::Descendant)
        } else if self.eat("/") {
            Some(Axis::Child)
        } else {
            None
        };
        if axis == Some(Axis::Child) && self.at_end() {
            return Ok(LocationPath { steps });
        }
        loop {
            steps.push(self.step(axis.unwrap_or(Axis::Child))?);
            axis = if self.eat("//") {
                Some(Axis::Descendant)
            } else if self.eat("/") {
                Some(Axis::Child)
            } else {
                break;
            };
        }
        Ok(LocationPath { steps })
    }

    fn step(&mut self, axis: Axis) -> Result<Step, String> {
        if self.eat("..") {
            return Err("parent steps are not supported".to_string());
        }
        if self.eat(".") {
            if axis == Axis::Descendant {
                return Err("'//.' is not supported".to_string());
            }
            return Ok(Step {
                axis: Axis::SelfNode,
                test: NodeTest::Node,
            });
        }
        if self.eat("@") {
            if axis == Axis::Descendant {
                return Err("'//@' is not supported".to_string());
            }
            return Ok(Step {
                axis: Axis::Attribute,
                test: self.name_test()?,
            });
        }
        if self.eat("text()") {
            return Ok(Step {
                axis,
                test: NodeTest::Text,
            });
        }
        if self.eat("node()") {
            return Ok(Step {
                axis,
                test: NodeTest::Node,
            });
        }
        Ok(Step {
            axis,
            test: self.name_test()?,
        })
    }

    fn name_test(&mut self) -> Result<NodeTest, String> {
        if self.eat("*") {
            return Ok(NodeTest::Principal);
        }
        let first = self.ncname()?;
        if !self.rest().starts_with(':') {
            return Ok(NodeTest::Name(QName::local(first)));
        }
        self.pos += 1;
        let namespace = self
            .namespaces
            .get(&first)
            .cloned()
            .ok_or_else(|| format!("unbound prefix '{first}'"))?;
        if self.rest().starts_with('*') {
            self.pos += 1;
            return Ok(NodeTest::AnyIn(namespace));
        }
        let local = self.ncname()?;
        Ok(NodeTest::Name(QName::new(namespace, local).with_prefix(first)))
    }

    fn ncname(&mut self) -> Result<String, String> {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|&(i, c)| {
                !(c.is_alphanumeric() || c == '_' || (i > 0 && (c == '-' || c == '.')))
            })
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(format!("expected a name at offset {}", self.pos));
        }
        let name = rest[..len].to_string();
        self.pos += len;
        Ok(name)
    }
}

/// Routes on the value of an expression evaluated against the payload.
pub struct XPathMapping {
    support: MappingSupport,
    expression: XPathExpression,
    endpoints: EndpointRegistry<String>,
}

impl XPathMapping {
    pub fn new(expression: XPathExpression) -> Self {
        Self {
            support: MappingSupport::default(),
            expression,
            endpoints: EndpointRegistry::default(),
        }
    }

    pub fn expression(&self) -> &XPathExpression {
        &self.expression
    }

    pub fn register(&mut self, value: impl Into<String>, endpoint: Endpoint) -> Result<(), SoapError> {
        self.endpoints.register(value.into(), endpoint)
    }

    pub fn support_mut(&mut self) -> &mut MappingSupport {
        &mut self.support
    }
}

impl EndpointMapping for XPathMapping {
    fn endpoint(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError> {
        let found = context.request().payload_source().and_then(|payload| {
            let value = self.expression.evaluate(Some(payload));
            self.endpoints.lookup(&value)
        });
        Ok(self.support.resolve(found))
    }

    fn order(&self) -> i32 {
        self.support.order()
    }
}
