//! Locator evaluation over the scraper tree
//!
//! Follows XPath 1.0 value semantics: node-sets, strings, numbers and
//! booleans, with the standard conversions and existential comparisons.

use std::cmp::Ordering;
use std::collections::HashSet;

use ego_tree::NodeRef;
use scraper::Node;

use super::html::{HtmlDocument, HtmlNode};
use crate::error::QueryError;
use crate::locator::{Axis, CompareOp, Expr, Function, LocationPath, Locator, NodeTest, Step};

enum Value<'a> {
    Nodes(Vec<HtmlNode<'a>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

/// A non-node-set value used in comparisons.
enum Atom {
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Clone, Copy)]
struct Context<'a> {
    node: HtmlNode<'a>,
    position: usize,
    size: usize,
}

pub(super) struct Evaluator<'a> {
    document: &'a HtmlDocument,
}

impl<'a> Evaluator<'a> {
    pub(super) fn new(document: &'a HtmlDocument) -> Self {
        Self { document }
    }

    /// Evaluate a compiled top-level locator from the document root.
    pub(super) fn select(
        &self,
        expr: &Expr,
        locator: &Locator,
    ) -> Result<Vec<HtmlNode<'a>>, QueryError> {
        let root = Context {
            node: HtmlNode::Node(self.document.root()),
            position: 1,
            size: 1,
        };
        match self.eval(expr, &root)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(QueryError::NotANodeSet(locator.to_string())),
        }
    }

    fn eval(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Value<'a>, QueryError> {
        Ok(match expr {
            Expr::Or(left, right) => {
                Value::Bool(self.eval_bool(left, ctx)? || self.eval_bool(right, ctx)?)
            }
            Expr::And(left, right) => {
                Value::Bool(self.eval_bool(left, ctx)? && self.eval_bool(right, ctx)?)
            }
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                Value::Bool(compare(*op, left, right))
            }
            Expr::Union(left, right) => {
                let mut nodes = self.eval_nodes(left, ctx)?;
                nodes.extend(self.eval_nodes(right, ctx)?);
                Value::Nodes(self.dedup_sorted(nodes))
            }
            Expr::Literal(value) => Value::Str(value.clone()),
            Expr::Number(value) => Value::Num(*value),
            Expr::Call(function, args) => self.call(*function, args, ctx)?,
            Expr::Path(path) => Value::Nodes(self.eval_path(path, ctx)?),
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let nodes = self.eval_nodes(primary, ctx)?;
                let nodes = self.apply_predicates(nodes, predicates)?;
                Value::Nodes(self.apply_steps(nodes, steps)?)
            }
        })
    }

    fn eval_bool(&self, expr: &Expr, ctx: &Context<'a>) -> Result<bool, QueryError> {
        Ok(to_bool(&self.eval(expr, ctx)?))
    }

    fn eval_string(&self, expr: &Expr, ctx: &Context<'a>) -> Result<String, QueryError> {
        Ok(to_string(&self.eval(expr, ctx)?))
    }

    fn eval_nodes(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Vec<HtmlNode<'a>>, QueryError> {
        match self.eval(expr, ctx)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(QueryError::NotANodeSet(format!("{expr:?}"))),
        }
    }

    fn call(
        &self,
        function: Function,
        args: &[Expr],
        ctx: &Context<'a>,
    ) -> Result<Value<'a>, QueryError> {
        let string_arg = |index: usize| -> Result<String, QueryError> {
            match args.get(index) {
                Some(arg) => self.eval_string(arg, ctx),
                None => Ok(ctx.node.string_value()),
            }
        };

        Ok(match function {
            Function::Contains => Value::Bool(string_arg(0)?.contains(string_arg(1)?.as_str())),
            Function::StartsWith => {
                Value::Bool(string_arg(0)?.starts_with(string_arg(1)?.as_str()))
            }
            Function::NormalizeSpace => Value::Str(normalize_space(&string_arg(0)?)),
            Function::String => Value::Str(string_arg(0)?),
            Function::Concat => {
                let mut joined = String::new();
                for arg in args {
                    joined.push_str(&self.eval_string(arg, ctx)?);
                }
                Value::Str(joined)
            }
            Function::Not => {
                let arg = args.first().map(|arg| self.eval_bool(arg, ctx)).transpose()?;
                Value::Bool(!arg.unwrap_or(false))
            }
            Function::Count => {
                let count = match args.first() {
                    Some(arg) => self.eval_nodes(arg, ctx)?.len(),
                    None => 0,
                };
                Value::Num(count as f64)
            }
            Function::Position => Value::Num(ctx.position as f64),
            Function::Last => Value::Num(ctx.size as f64),
            Function::True => Value::Bool(true),
            Function::False => Value::Bool(false),
        })
    }

    fn eval_path(
        &self,
        path: &LocationPath,
        ctx: &Context<'a>,
    ) -> Result<Vec<HtmlNode<'a>>, QueryError> {
        let start = if path.absolute {
            HtmlNode::Node(self.document.root())
        } else {
            ctx.node
        };
        self.apply_steps(vec![start], &path.steps)
    }

    fn apply_steps(
        &self,
        mut nodes: Vec<HtmlNode<'a>>,
        steps: &[Step],
    ) -> Result<Vec<HtmlNode<'a>>, QueryError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let candidates = axis_nodes(step.axis, *node)
                    .into_iter()
                    .filter(|candidate| node_test(step, candidate))
                    .collect();
                next.extend(self.apply_predicates(candidates, &step.predicates)?);
            }
            nodes = self.dedup_sorted(next);
        }
        Ok(nodes)
    }

    /// Filter `nodes` (in axis order) through each predicate in turn.
    fn apply_predicates(
        &self,
        mut nodes: Vec<HtmlNode<'a>>,
        predicates: &[Expr],
    ) -> Result<Vec<HtmlNode<'a>>, QueryError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (index, node) in nodes.into_iter().enumerate() {
                let ctx = Context {
                    node,
                    position: index + 1,
                    size,
                };
                let keep = match self.eval(predicate, &ctx)? {
                    Value::Num(n) => n == ctx.position as f64,
                    other => to_bool(&other),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn order_key(&self, node: &HtmlNode<'a>) -> (usize, usize) {
        match node {
            HtmlNode::Node(n) => (self.document.order_of(n.id()), 0),
            HtmlNode::Attribute { owner, index, .. } => {
                (self.document.order_of(owner.id()), index + 1)
            }
        }
    }

    fn dedup_sorted(&self, nodes: Vec<HtmlNode<'a>>) -> Vec<HtmlNode<'a>> {
        let mut seen = HashSet::with_capacity(nodes.len());
        let mut keyed: Vec<_> = nodes
            .into_iter()
            .map(|node| (self.order_key(&node), node))
            .filter(|(key, _)| seen.insert(*key))
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, node)| node).collect()
    }
}

/// Nodes on `axis` from `node`, reverse axes nearest-first.
fn axis_nodes<'a>(axis: Axis, node: HtmlNode<'a>) -> Vec<HtmlNode<'a>> {
    let wrap = |n: NodeRef<'a, Node>| HtmlNode::Node(n);

    let Some(tree_node) = node.node() else {
        // Attribute nodes have no children or siblings.
        let HtmlNode::Attribute { owner, .. } = node else {
            return Vec::new();
        };
        return match axis {
            Axis::SelfAxis | Axis::DescendantOrSelf => vec![node],
            Axis::Parent => vec![wrap(owner)],
            Axis::Ancestor => std::iter::once(owner).chain(owner.ancestors()).map(wrap).collect(),
            Axis::AncestorOrSelf => std::iter::once(node)
                .chain(std::iter::once(owner).chain(owner.ancestors()).map(wrap))
                .collect(),
            _ => Vec::new(),
        };
    };

    match axis {
        Axis::Child => tree_node.children().map(wrap).collect(),
        Axis::Descendant => tree_node.descendants().skip(1).map(wrap).collect(),
        Axis::DescendantOrSelf => tree_node.descendants().map(wrap).collect(),
        Axis::Parent => tree_node.parent().map(wrap).into_iter().collect(),
        Axis::Ancestor => tree_node.ancestors().map(wrap).collect(),
        Axis::AncestorOrSelf => std::iter::once(tree_node)
            .chain(tree_node.ancestors())
            .map(wrap)
            .collect(),
        Axis::SelfAxis => vec![node],
        Axis::FollowingSibling => tree_node.next_siblings().map(wrap).collect(),
        Axis::PrecedingSibling => tree_node.prev_siblings().map(wrap).collect(),
        Axis::Attribute => match tree_node.value().as_element() {
            Some(element) => element
                .attrs()
                .enumerate()
                .map(|(index, (name, value))| HtmlNode::Attribute {
                    owner: tree_node,
                    index,
                    name,
                    value,
                })
                .collect(),
            None => Vec::new(),
        },
    }
}

fn node_test(step: &Step, node: &HtmlNode<'_>) -> bool {
    if step.axis == Axis::Attribute {
        let HtmlNode::Attribute { name, .. } = node else {
            return false;
        };
        return match &step.test {
            NodeTest::Name(wanted) => name.eq_ignore_ascii_case(wanted),
            NodeTest::Any | NodeTest::Node => true,
            NodeTest::Text => false,
        };
    }

    match (&step.test, node) {
        (NodeTest::Node, _) => true,
        (_, HtmlNode::Attribute { .. }) => false,
        (NodeTest::Text, HtmlNode::Node(n)) => n.value().is_text(),
        (NodeTest::Any, HtmlNode::Node(n)) => n.value().is_element(),
        (NodeTest::Name(wanted), HtmlNode::Node(n)) => n
            .value()
            .as_element()
            .is_some_and(|element| element.name().eq_ignore_ascii_case(wanted)),
    }
}

/// XPath `normalize-space`: collapse runs of XML whitespace and trim.
fn normalize_space(text: &str) -> String {
    text.split([' ', '\t', '\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_bool(value: &Value<'_>) -> bool {
    match value {
        Value::Nodes(nodes) => !nodes.is_empty(),
        Value::Str(s) => !s.is_empty(),
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Bool(b) => *b,
    }
}

fn to_string(value: &Value<'_>) -> String {
    match value {
        Value::Nodes(nodes) => nodes.first().map(HtmlNode::string_value).unwrap_or_default(),
        Value::Str(s) => s.clone(),
        Value::Num(n) => number_to_string(*n),
        Value::Bool(b) => b.to_string(),
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// XPath `number()` on a string: optional minus, digits, optional fraction.
/// Exponents, `inf` and `NaN` spellings are not numbers.
fn string_to_number(s: &str) -> f64 {
    let s = s.trim_matches([' ', '\t', '\r', '\n']);
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

impl Atom {
    fn to_bool(&self) -> bool {
        match self {
            Atom::Str(s) => !s.is_empty(),
            Atom::Num(n) => *n != 0.0 && !n.is_nan(),
            Atom::Bool(b) => *b,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Atom::Str(s) => string_to_number(s),
            Atom::Num(n) => *n,
            Atom::Bool(b) => f64::from(u8::from(*b)),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Atom::Str(s) => s.clone(),
            Atom::Num(n) => number_to_string(*n),
            Atom::Bool(b) => b.to_string(),
        }
    }
}

fn atom(value: Value<'_>) -> Atom {
    match value {
        Value::Nodes(nodes) => Atom::Bool(!nodes.is_empty()),
        Value::Str(s) => Atom::Str(s),
        Value::Num(n) => Atom::Num(n),
        Value::Bool(b) => Atom::Bool(b),
    }
}

/// Comparison with XPath's existential node-set semantics.
fn compare(op: CompareOp, left: Value<'_>, right: Value<'_>) -> bool {
    match (left, right) {
        (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|a| {
            let a = Atom::Str(a.string_value());
            r.iter()
                .any(|b| compare_atoms(op, &a, &Atom::Str(b.string_value())))
        }),
        (Value::Nodes(l), Value::Bool(b)) => {
            compare_atoms(op, &Atom::Bool(!l.is_empty()), &Atom::Bool(b))
        }
        (Value::Bool(b), Value::Nodes(r)) => {
            compare_atoms(op, &Atom::Bool(b), &Atom::Bool(!r.is_empty()))
        }
        (Value::Nodes(l), other) => {
            let other = atom(other);
            l.iter()
                .any(|a| compare_atoms(op, &Atom::Str(a.string_value()), &other))
        }
        (other, Value::Nodes(r)) => {
            let other = atom(other);
            r.iter()
                .any(|b| compare_atoms(op, &other, &Atom::Str(b.string_value())))
        }
        (left, right) => compare_atoms(op, &atom(left), &atom(right)),
    }
}

fn compare_atoms(op: CompareOp, left: &Atom, right: &Atom) -> bool {
    let ordering = |l: &Atom, r: &Atom| l.to_number().partial_cmp(&r.to_number());

    match op {
        CompareOp::Eq | CompareOp::Ne => {
            let equal = match (left, right) {
                (Atom::Bool(_), _) | (_, Atom::Bool(_)) => left.to_bool() == right.to_bool(),
                (Atom::Num(_), _) | (_, Atom::Num(_)) => left.to_number() == right.to_number(),
                _ => left.as_text() == right.as_text(),
            };
            equal == (op == CompareOp::Eq)
        }
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}
