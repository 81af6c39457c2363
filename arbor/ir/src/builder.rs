//! IR Builder. Provides a convinient way to construct nodes.
use crate::lang::{BasicOp, LangBasic};
use crate::node::{Node, NodeKind, Value};
use crate::store::NodeStore;
use crate::types;
use arbor_utils::{ArborResult, Error, Id};
use itertools::Itertools;
use std::rc::Rc;

/// IR builder.
/// Uses internal references to the node store and its basic language.
pub struct Builder<'a> {
    /// Store all nodes are interned in.
    store: &'a NodeStore,
    /// Basic language of the store.
    basic: Rc<LangBasic>,
}

impl<'a> Builder<'a> {
    /// Instantiate a new builder using for the given store.
    pub fn new(store: &'a NodeStore) -> Self {
        Self {
            basic: store.lang_basic(),
            store,
        }
    }

    pub fn store(&self) -> &'a NodeStore {
        self.store
    }

    pub fn basic(&self) -> &LangBasic {
        &self.basic
    }

    // ---------------------------------------------------------------------
    // Values
    pub fn string_value<S: Into<Id>>(&self, s: S) -> Node {
        self.store.get_value(Value::Str(s.into()))
    }

    pub fn int_value(&self, v: i64) -> Node {
        self.store.get_value(Value::Int(v))
    }

    pub fn uint_value(&self, v: u64) -> Node {
        self.store.get_value(Value::UInt(v))
    }

    pub fn bool_value(&self, v: bool) -> Node {
        self.store.get_value(Value::Bool(v))
    }

    // ---------------------------------------------------------------------
    // Types
    pub fn generic_type<S, I>(&self, name: S, params: I) -> Node
    where
        S: Into<Id>,
        I: IntoIterator<Item = Node>,
    {
        let params = self.types(params);
        self.store
            .get(NodeKind::GenericType, [self.string_value(name), params])
    }

    pub fn type_variable<S: Into<Id>>(&self, name: S) -> Node {
        self.store
            .get(NodeKind::TypeVariable, [self.string_value(name)])
    }

    pub fn function_type<I>(&self, params: I, ret: Node) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        self.store
            .get(NodeKind::FunctionType, [self.types(params), ret])
    }

    pub fn tuple_type<I>(&self, elements: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        self.store.get(NodeKind::TupleType, elements)
    }

    pub fn struct_type<S, I, F>(&self, name: S, fields: I) -> Node
    where
        S: Into<Id>,
        F: Into<Id>,
        I: IntoIterator<Item = (F, Node)>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, ty)| self.named_type(name, ty))
            .collect_vec();
        self.store.get(
            NodeKind::StructType,
            std::iter::once(self.string_value(name)).chain(fields),
        )
    }

    pub fn int_type(&self) -> Node {
        self.basic.int.clone()
    }

    pub fn uint_type(&self) -> Node {
        self.basic.uint.clone()
    }

    pub fn bool_type(&self) -> Node {
        self.basic.bool.clone()
    }

    pub fn unit_type(&self) -> Node {
        self.basic.unit.clone()
    }

    pub fn identifier_type(&self) -> Node {
        self.basic.identifier.clone()
    }

    pub fn ref_type(&self, element: Node) -> Node {
        self.generic_type("ref", [element])
    }

    pub fn array_type(&self, element: Node) -> Node {
        self.generic_type("array", [element])
    }

    // ---------------------------------------------------------------------
    // Support
    pub fn types<I: IntoIterator<Item = Node>>(&self, types: I) -> Node {
        self.store.get(NodeKind::Types, types)
    }

    pub fn expressions<I: IntoIterator<Item = Node>>(&self, exprs: I) -> Node {
        self.store.get(NodeKind::Expressions, exprs)
    }

    pub fn parameters<I: IntoIterator<Item = Node>>(&self, vars: I) -> Node {
        self.store.get(NodeKind::Parameters, vars)
    }

    pub fn named_type<S: Into<Id>>(&self, name: S, ty: Node) -> Node {
        self.store
            .get(NodeKind::NamedType, [self.string_value(name), ty])
    }

    pub fn named_value<S: Into<Id>>(&self, name: S, value: Node) -> Node {
        self.store
            .get(NodeKind::NamedValue, [self.string_value(name), value])
    }

    pub fn program<I: IntoIterator<Item = Node>>(&self, entries: I) -> Node {
        self.store.get(NodeKind::Program, entries)
    }

    // ---------------------------------------------------------------------
    // Literals and variables
    pub fn literal<S: Into<Id>>(&self, ty: Node, text: S) -> Node {
        self.store
            .get(NodeKind::Literal, [ty, self.string_value(text)])
    }

    pub fn int_lit(&self, v: i64) -> Node {
        self.literal(self.int_type(), v.to_string())
    }

    pub fn uint_lit(&self, v: u64) -> Node {
        self.literal(self.uint_type(), v.to_string())
    }

    pub fn bool_lit(&self, v: bool) -> Node {
        self.literal(self.bool_type(), v.to_string())
    }

    /// A member name, as used by [Builder::ref_member].
    pub fn identifier<S: Into<Id>>(&self, name: S) -> Node {
        self.literal(self.identifier_type(), name)
    }

    /// A variable with an identifier not used before in this store.
    pub fn variable(&self, ty: Node) -> Node {
        self.variable_with_id(ty, self.store.fresh_variable_id())
    }

    pub fn variable_with_id(&self, ty: Node, id: u64) -> Node {
        self.store.reserve_variable_id(id);
        self.store
            .get(NodeKind::Variable, [ty, self.uint_value(id)])
    }

    // ---------------------------------------------------------------------
    // Calls
    pub fn call<I>(&self, ret_ty: Node, function: Node, args: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        self.store.get(
            NodeKind::CallExpr,
            [ret_ty, function].into_iter().chain(args),
        )
    }

    /// Calls the basic operator `op`. The result type is obtained by
    /// instantiating the operator's type with the argument types.
    ///
    /// # Panics
    /// Panics if the arguments do not fit the operator.
    pub fn call_op<I>(&self, op: BasicOp, args: I) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        self.try_call_op(op, args).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Checked version of [Builder::call_op].
    pub fn try_call_op<I>(&self, op: BasicOp, args: I) -> ArborResult<Node>
    where
        I: IntoIterator<Item = Node>,
    {
        let args = args.into_iter().collect_vec();
        let fun = self.basic.op(op).clone();
        let arg_types = args
            .iter()
            .map(|a| {
                if a.is_expression() {
                    Ok(a.expr_type().clone())
                } else {
                    Err(Error::malformed_node(
                        NodeKind::CallExpr,
                        format!("argument of `{op}' is a `{}'", a.kind()),
                    ))
                }
            })
            .collect::<ArborResult<Vec<_>>>()?;
        let ret = types::return_type(self.store, fun.expr_type(), &arg_types)
            .ok_or_else(|| {
                Error::malformed_node(
                    NodeKind::CallExpr,
                    format!(
                        "`{op}' cannot be applied to ({})",
                        arg_types.iter().join(", ")
                    ),
                )
            })?;
        Ok(self.call(ret, fun, args))
    }

    pub fn add(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntAdd, [lhs, rhs])
    }

    pub fn sub(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntSub, [lhs, rhs])
    }

    pub fn mul(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntMul, [lhs, rhs])
    }

    pub fn div(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntDiv, [lhs, rhs])
    }

    pub fn modulo(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntMod, [lhs, rhs])
    }

    pub fn eq(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntEq, [lhs, rhs])
    }

    pub fn ne(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntNe, [lhs, rhs])
    }

    pub fn lt(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntLt, [lhs, rhs])
    }

    pub fn le(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntLe, [lhs, rhs])
    }

    pub fn gt(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntGt, [lhs, rhs])
    }

    pub fn ge(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::IntGe, [lhs, rhs])
    }

    pub fn and(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::BoolAnd, [lhs, rhs])
    }

    pub fn or(&self, lhs: Node, rhs: Node) -> Node {
        self.call_op(BasicOp::BoolOr, [lhs, rhs])
    }

    pub fn not(&self, e: Node) -> Node {
        self.call_op(BasicOp::BoolNot, [e])
    }

    // ---------------------------------------------------------------------
    // Memory
    /// Allocates a new memory location initialized to `init`.
    pub fn ref_var(&self, init: Node) -> Node {
        self.call_op(BasicOp::RefVar, [init])
    }

    pub fn deref(&self, e: Node) -> Node {
        self.call_op(BasicOp::RefDeref, [e])
    }

    pub fn assign(&self, target: Node, value: Node) -> Node {
        self.call_op(BasicOp::RefAssign, [target, value])
    }

    /// Reference to member `field` of type `ty` of the struct referenced by
    /// `e`.
    pub fn ref_member<S: Into<Id>>(&self, e: Node, field: S, ty: Node) -> Node {
        let fun = self.basic.op(BasicOp::RefMemberAccess).clone();
        self.call(self.ref_type(ty), fun, [e, self.identifier(field)])
    }

    /// Reference to component `idx` of type `ty` of the tuple referenced by
    /// `e`.
    pub fn ref_component(&self, e: Node, idx: u64, ty: Node) -> Node {
        let fun = self.basic.op(BasicOp::RefComponentAccess).clone();
        self.call(self.ref_type(ty), fun, [e, self.uint_lit(idx)])
    }

    pub fn ref_array_element(&self, e: Node, idx: Node) -> Node {
        self.call_op(BasicOp::RefArrayElement, [e, idx])
    }

    // ---------------------------------------------------------------------
    // Other expressions
    pub fn lambda<I>(&self, params: I, ret_ty: Node, body: Node) -> Node
    where
        I: IntoIterator<Item = Node>,
    {
        let params = self.parameters(params);
        let fun_ty = self.function_type(
            params.children().iter().map(|p| p.expr_type().clone()),
            ret_ty,
        );
        self.store
            .get(NodeKind::LambdaExpr, [fun_ty, params, self.wrap(body)])
    }

    pub fn cast(&self, ty: Node, e: Node) -> Node {
        self.store.get(NodeKind::CastExpr, [ty, e])
    }

    pub fn tuple_expr<I: IntoIterator<Item = Node>>(&self, elements: I) -> Node {
        let exprs = self.expressions(elements);
        let ty =
            self.tuple_type(exprs.children().iter().map(|e| e.expr_type().clone()));
        self.store.get(NodeKind::TupleExpr, [ty, exprs])
    }

    pub fn struct_expr<I, S>(&self, ty: Node, fields: I) -> Node
    where
        S: Into<Id>,
        I: IntoIterator<Item = (S, Node)>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, value)| self.named_value(name, value))
            .collect_vec();
        self.store
            .get(NodeKind::StructExpr, std::iter::once(ty).chain(fields))
    }

    // ---------------------------------------------------------------------
    // Statements
    pub fn compound<I: IntoIterator<Item = Node>>(&self, stmts: I) -> Node {
        self.store.get(NodeKind::CompoundStmt, stmts)
    }

    /// `decl <type of var> var = init`
    pub fn decl(&self, var: Node, init: Node) -> Node {
        self.store.get(NodeKind::DeclarationStmt, [var, init])
    }

    pub fn if_stmt(&self, cond: Node, then: Node, otherwise: Node) -> Node {
        self.store.get(
            NodeKind::IfStmt,
            [cond, self.wrap(then), self.wrap(otherwise)],
        )
    }

    pub fn while_stmt(&self, cond: Node, body: Node) -> Node {
        self.store.get(NodeKind::WhileStmt, [cond, self.wrap(body)])
    }

    /// `for (iter = start .. end : step) body`
    pub fn for_stmt(
        &self,
        iter: Node,
        start: Node,
        end: Node,
        step: Node,
        body: Node,
    ) -> Node {
        self.store.get(
            NodeKind::ForStmt,
            [iter, start, end, step, self.wrap(body)],
        )
    }

    pub fn return_stmt(&self, e: Node) -> Node {
        self.store.get(NodeKind::ReturnStmt, [e])
    }

    pub fn break_stmt(&self) -> Node {
        self.store.get(NodeKind::BreakStmt, [])
    }

    pub fn continue_stmt(&self) -> Node {
        self.store.get(NodeKind::ContinueStmt, [])
    }

    /// Bodies of control statements are always compounds.
    fn wrap(&self, stmt: Node) -> Node {
        if stmt.kind() == NodeKind::CompoundStmt {
            stmt
        } else {
            self.compound([stmt])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_result_types_are_inferred() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let sum = b.add(b.int_lit(1), b.int_lit(2));
        assert_eq!(sum.expr_type(), &b.int_type());
        let cmp = b.lt(sum.clone(), b.int_lit(3));
        assert_eq!(cmp.expr_type(), &b.bool_type());

        let cell = b.ref_var(b.int_lit(10));
        assert_eq!(cell.expr_type(), &b.ref_type(b.int_type()));
        assert_eq!(b.deref(cell.clone()).expr_type(), &b.int_type());
        assert_eq!(b.assign(cell, sum).expr_type(), &b.unit_type());
    }

    #[test]
    fn ill_typed_operator_calls_are_rejected() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let res = b.try_call_op(BasicOp::IntAdd, [b.int_lit(1), b.bool_lit(true)]);
        assert!(res.is_err());
        let res = b.try_call_op(BasicOp::BoolNot, [b.int_type()]);
        assert!(res.is_err());
    }

    #[test]
    fn fresh_variables_are_distinct() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let v1 = b.variable(b.int_type());
        let v2 = b.variable(b.int_type());
        assert_ne!(v1, v2);
        let v7 = b.variable_with_id(b.int_type(), 7);
        assert_eq!(v7.variable_id(), Some(7));
        assert!(b.variable(b.int_type()).variable_id().unwrap() > 7);
    }

    #[test]
    fn bodies_are_wrapped() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let w = b.while_stmt(b.bool_lit(true), b.break_stmt());
        assert_eq!(w.child(1).kind(), NodeKind::CompoundStmt);
        assert_eq!(w.child(1).statements().len(), 1);
    }
}
