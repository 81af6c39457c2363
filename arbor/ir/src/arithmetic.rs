use crate::{ArborResult, BasicOp, Error, Node, NodeKind};
use std::collections::HashMap;

/// The result of evaluating an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Int(i64),
    Bool(bool),
}

impl Scalar {
    pub fn as_int(self) -> ArborResult<i64> {
        match self {
            Scalar::Int(i) => Ok(i),
            Scalar::Bool(b) => {
                Err(Error::misc(format!("expected integer, found `{b}'")))
            }
        }
    }

    pub fn as_bool(self) -> ArborResult<bool> {
        match self {
            Scalar::Bool(b) => Ok(b),
            Scalar::Int(i) => {
                Err(Error::misc(format!("expected boolean, found `{i}'")))
            }
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Evaluates an integer or boolean expression built from the basic
/// operators. Variables and dereferences of variables take their value from
/// `env`.
pub fn evaluate(expr: &Node, env: &HashMap<Node, i64>) -> ArborResult<Scalar> {
    match expr.kind() {
        NodeKind::Literal => literal(expr),
        NodeKind::Variable => lookup(expr, env),
        NodeKind::CastExpr => evaluate(expr.child(1), env),
        NodeKind::CallExpr => {
            let (op, args) = BasicOp::of_call(expr).ok_or_else(|| {
                Error::unsupported(format!("cannot evaluate call {expr}"))
            })?;
            call(op, args, expr, env)
        }
        _ => Err(Error::unsupported(format!("cannot evaluate {expr}"))),
    }
}

fn literal(lit: &Node) -> ArborResult<Scalar> {
    let text = lit.name().map(|n| n.as_str()).unwrap_or_default();
    if let Ok(b) = text.parse::<bool>() {
        return Ok(Scalar::Bool(b));
    }
    text.parse::<i64>().map(Scalar::Int).map_err(|_| {
        Error::unsupported(format!("literal `{text}' is not a number"))
    })
}

fn lookup(var: &Node, env: &HashMap<Node, i64>) -> ArborResult<Scalar> {
    env.get(var)
        .map(|v| Scalar::Int(*v))
        .ok_or_else(|| Error::misc(format!("no value for variable {var}")))
}

fn call(
    op: BasicOp,
    args: &[Node],
    expr: &Node,
    env: &HashMap<Node, i64>,
) -> ArborResult<Scalar> {
    if op == BasicOp::RefDeref && args[0].is_variable() {
        // the dereference itself may be bound, as done by affine analyses
        return match env.get(expr) {
            Some(v) => Ok(Scalar::Int(*v)),
            None => lookup(&args[0], env),
        };
    }
    let int = |i: usize| evaluate(&args[i], env)?.as_int();
    let boolean = |i: usize| evaluate(&args[i], env)?.as_bool();
    let overflow = || Error::misc(format!("overflow evaluating {expr}"));
    Ok(match op {
        BasicOp::IntAdd => {
            Scalar::Int(int(0)?.checked_add(int(1)?).ok_or_else(overflow)?)
        }
        BasicOp::IntSub => {
            Scalar::Int(int(0)?.checked_sub(int(1)?).ok_or_else(overflow)?)
        }
        BasicOp::IntMul => {
            Scalar::Int(int(0)?.checked_mul(int(1)?).ok_or_else(overflow)?)
        }
        BasicOp::IntDiv | BasicOp::IntMod => {
            let (lhs, rhs) = (int(0)?, int(1)?);
            if rhs == 0 {
                return Err(Error::misc(format!("division by zero in {expr}")));
            }
            let res = if op == BasicOp::IntDiv {
                lhs.checked_div_euclid(rhs)
            } else {
                lhs.checked_rem_euclid(rhs)
            };
            Scalar::Int(res.ok_or_else(overflow)?)
        }
        BasicOp::IntEq => Scalar::Bool(int(0)? == int(1)?),
        BasicOp::IntNe => Scalar::Bool(int(0)? != int(1)?),
        BasicOp::IntLt => Scalar::Bool(int(0)? < int(1)?),
        BasicOp::IntLe => Scalar::Bool(int(0)? <= int(1)?),
        BasicOp::IntGt => Scalar::Bool(int(0)? > int(1)?),
        BasicOp::IntGe => Scalar::Bool(int(0)? >= int(1)?),
        // short circuit like the generated code would
        BasicOp::BoolAnd => Scalar::Bool(boolean(0)? && boolean(1)?),
        BasicOp::BoolOr => Scalar::Bool(boolean(0)? || boolean(1)?),
        BasicOp::BoolNot => Scalar::Bool(!boolean(0)?),
        _ => {
            return Err(Error::unsupported(format!(
                "cannot evaluate memory operation {expr}"
            )));
        }
    })
}
