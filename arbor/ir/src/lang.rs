//! The basic language vocabulary every store provides: primitive types and
//! the operator literals the rest of the middle-end builds expressions from.
use crate::node::{Node, NodeKind, Value};
use crate::store::NodeStore;
use arbor_utils::Id;

/// Operators of the basic language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicOp {
    IntAdd,
    IntSub,
    IntMul,
    IntDiv,
    IntMod,
    IntEq,
    IntNe,
    IntLt,
    IntLe,
    IntGt,
    IntGe,
    BoolAnd,
    BoolOr,
    BoolNot,
    RefVar,
    RefDeref,
    RefAssign,
    RefMemberAccess,
    RefComponentAccess,
    RefArrayElement,
}

impl BasicOp {
    pub const ALL: [BasicOp; 20] = [
        BasicOp::IntAdd,
        BasicOp::IntSub,
        BasicOp::IntMul,
        BasicOp::IntDiv,
        BasicOp::IntMod,
        BasicOp::IntEq,
        BasicOp::IntNe,
        BasicOp::IntLt,
        BasicOp::IntLe,
        BasicOp::IntGt,
        BasicOp::IntGe,
        BasicOp::BoolAnd,
        BasicOp::BoolOr,
        BasicOp::BoolNot,
        BasicOp::RefVar,
        BasicOp::RefDeref,
        BasicOp::RefAssign,
        BasicOp::RefMemberAccess,
        BasicOp::RefComponentAccess,
        BasicOp::RefArrayElement,
    ];

    /// The text of the literal representing this operator.
    pub fn name(self) -> &'static str {
        match self {
            BasicOp::IntAdd => "int_add",
            BasicOp::IntSub => "int_sub",
            BasicOp::IntMul => "int_mul",
            BasicOp::IntDiv => "int_div",
            BasicOp::IntMod => "int_mod",
            BasicOp::IntEq => "int_eq",
            BasicOp::IntNe => "int_ne",
            BasicOp::IntLt => "int_lt",
            BasicOp::IntLe => "int_le",
            BasicOp::IntGt => "int_gt",
            BasicOp::IntGe => "int_ge",
            BasicOp::BoolAnd => "bool_and",
            BasicOp::BoolOr => "bool_or",
            BasicOp::BoolNot => "bool_not",
            BasicOp::RefVar => "ref_var",
            BasicOp::RefDeref => "ref_deref",
            BasicOp::RefAssign => "ref_assign",
            BasicOp::RefMemberAccess => "ref_member_access",
            BasicOp::RefComponentAccess => "ref_component_access",
            BasicOp::RefArrayElement => "ref_array_element",
        }
    }

    pub fn from_name(name: &str) -> Option<BasicOp> {
        BasicOp::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Returns the operator denoted by an operator literal of any store.
    pub fn of_literal(node: &Node) -> Option<BasicOp> {
        if node.kind() != NodeKind::Literal
            || node.child(0).kind() != NodeKind::FunctionType
        {
            return None;
        }
        node.name().and_then(|n| BasicOp::from_name(n.as_str()))
    }

    /// Number of arguments a call of this operator takes.
    pub fn arity(self) -> usize {
        match self {
            BasicOp::BoolNot | BasicOp::RefVar | BasicOp::RefDeref => 1,
            _ => 2,
        }
    }

    /// The operator called by `call` and its arguments. `None` unless `call`
    /// calls an operator literal of any store with as many arguments as the
    /// operator takes.
    pub fn of_call(call: &Node) -> Option<(BasicOp, &[Node])> {
        let op = call.call_function().and_then(BasicOp::of_literal)?;
        let args = call.call_args();
        (args.len() == op.arity()).then_some((op, args))
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BasicOp::IntAdd
                | BasicOp::IntSub
                | BasicOp::IntMul
                | BasicOp::IntDiv
                | BasicOp::IntMod
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BasicOp::IntEq
                | BasicOp::IntNe
                | BasicOp::IntLt
                | BasicOp::IntLe
                | BasicOp::IntGt
                | BasicOp::IntGe
        )
    }

    pub fn is_logic(self) -> bool {
        matches!(self, BasicOp::BoolAnd | BasicOp::BoolOr | BasicOp::BoolNot)
    }

    /// Operators producing a reference to a part of their first argument.
    pub fn is_ref_navigation(self) -> bool {
        matches!(
            self,
            BasicOp::RefMemberAccess
                | BasicOp::RefComponentAccess
                | BasicOp::RefArrayElement
        )
    }
}

impl std::fmt::Display for BasicOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Primitive types and operators of one [NodeStore].
#[derive(Debug)]
pub struct LangBasic {
    pub int: Node,
    pub uint: Node,
    pub bool: Node,
    pub unit: Node,
    /// Type of member names used by member accesses.
    pub identifier: Node,
    /// The type variables `'a` and `'b`.
    pub alpha: Node,
    pub beta: Node,
    ops: Vec<Node>,
}

impl LangBasic {
    /// Builds the vocabulary directly through `store`. Must not call
    /// [NodeStore::lang_basic].
    pub(crate) fn new(store: &NodeStore) -> Self {
        let str_val = |s: &str| store.get_value(Value::Str(Id::from(s)));
        let generic = |name: &str, params: Vec<Node>| {
            let params = store.get(NodeKind::Types, params);
            store.get(NodeKind::GenericType, [str_val(name), params])
        };
        let type_var =
            |name: &str| store.get(NodeKind::TypeVariable, [str_val(name)]);
        let fun = |params: Vec<Node>, ret: Node| {
            let params = store.get(NodeKind::Types, params);
            store.get(NodeKind::FunctionType, [params, ret])
        };

        let int = generic("int", vec![]);
        let uint = generic("uint", vec![]);
        let bool = generic("bool", vec![]);
        let unit = generic("unit", vec![]);
        let identifier = generic("identifier", vec![]);
        let alpha = type_var("a");
        let beta = type_var("b");
        let ref_a = generic("ref", vec![alpha.clone()]);
        let ref_b = generic("ref", vec![beta.clone()]);
        let array_a = generic("array", vec![alpha.clone()]);
        let ref_array_a = generic("ref", vec![array_a]);

        let op_type = |op: BasicOp| -> Node {
            use BasicOp::*;
            let ii = || vec![int.clone(), int.clone()];
            match op {
                IntAdd | IntSub | IntMul | IntDiv | IntMod => {
                    fun(ii(), int.clone())
                }
                IntEq | IntNe | IntLt | IntLe | IntGt | IntGe => {
                    fun(ii(), bool.clone())
                }
                BoolAnd | BoolOr => {
                    fun(vec![bool.clone(), bool.clone()], bool.clone())
                }
                BoolNot => fun(vec![bool.clone()], bool.clone()),
                RefVar => fun(vec![alpha.clone()], ref_a.clone()),
                RefDeref => fun(vec![ref_a.clone()], alpha.clone()),
                RefAssign => {
                    fun(vec![ref_a.clone(), alpha.clone()], unit.clone())
                }
                RefMemberAccess => {
                    fun(vec![ref_a.clone(), identifier.clone()], ref_b.clone())
                }
                RefComponentAccess => {
                    fun(vec![ref_a.clone(), uint.clone()], ref_b.clone())
                }
                RefArrayElement => {
                    fun(vec![ref_array_a.clone(), int.clone()], ref_a.clone())
                }
            }
        };
        let ops = BasicOp::ALL
            .into_iter()
            .map(|op| {
                store.get(NodeKind::Literal, [op_type(op), str_val(op.name())])
            })
            .collect();
        log::debug!("built basic language for store {:?}", store.id());

        LangBasic {
            int,
            uint,
            bool,
            unit,
            identifier,
            alpha,
            beta,
            ops,
        }
    }

    /// The literal of operator `op`.
    pub fn op(&self, op: BasicOp) -> &Node {
        &self.ops[op as usize]
    }

    /// Returns the operator `node` denotes, if any.
    pub fn op_of(&self, node: &Node) -> Option<BasicOp> {
        BasicOp::of_literal(node).filter(|op| self.op(*op) == node)
    }

    /// Returns the comparison operator `node` denotes, if any.
    pub fn comparison_of(&self, node: &Node) -> Option<BasicOp> {
        self.op_of(node).filter(|op| op.is_comparison())
    }

    /// Returns the operator called by `call`, if `call` is a call of a basic
    /// operator of this store with the arguments it takes.
    pub fn called_op(&self, call: &Node) -> Option<BasicOp> {
        let op = call.call_function().and_then(|f| self.op_of(f))?;
        (call.call_args().len() == op.arity()).then_some(op)
    }

    pub fn is_int(&self, ty: &Node) -> bool {
        *ty == self.int || *ty == self.uint
    }

    pub fn is_bool(&self, ty: &Node) -> bool {
        *ty == self.bool
    }

    pub fn is_unit(&self, ty: &Node) -> bool {
        *ty == self.unit
    }

    pub fn is_identifier(&self, ty: &Node) -> bool {
        *ty == self.identifier
    }

    pub fn is_ref_type(&self, ty: &Node) -> bool {
        Self::generic_param(ty, "ref").is_some()
    }

    /// `T` for a type `ref<T>`.
    pub fn ref_element_type<'n>(&self, ty: &'n Node) -> Option<&'n Node> {
        Self::generic_param(ty, "ref")
    }

    pub fn is_array_type(&self, ty: &Node) -> bool {
        Self::generic_param(ty, "array").is_some()
    }

    /// `T` for a type `array<T>`.
    pub fn array_element_type<'n>(&self, ty: &'n Node) -> Option<&'n Node> {
        Self::generic_param(ty, "array")
    }

    fn generic_param<'n>(ty: &'n Node, name: &str) -> Option<&'n Node> {
        match (ty.kind(), ty.name(), ty.type_params()) {
            (NodeKind::GenericType, Some(n), [param]) if n == name => {
                Some(param)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_cached_per_store() {
        let store = NodeStore::new();
        let b1 = store.lang_basic();
        let b2 = store.lang_basic();
        assert!(std::rc::Rc::ptr_eq(&b1, &b2));
        assert!(b1.op(BasicOp::IntAdd).ptr_eq(b2.op(BasicOp::IntAdd)));
    }

    #[test]
    fn operators_are_found_by_literal() {
        let store = NodeStore::new();
        let basic = store.lang_basic();
        for op in BasicOp::ALL {
            assert_eq!(basic.op_of(basic.op(op)), Some(op));
            assert_eq!(BasicOp::from_name(op.name()), Some(op));
        }
        assert_eq!(basic.comparison_of(basic.op(BasicOp::IntLt)), Some(BasicOp::IntLt));
        assert_eq!(basic.comparison_of(basic.op(BasicOp::IntAdd)), None);
        assert_eq!(basic.op_of(&basic.int), None);
    }

    #[test]
    fn calls_must_match_the_arity() {
        let store = NodeStore::new();
        let basic = store.lang_basic();
        let lt = basic.op(BasicOp::IntLt).clone();
        let one = store.get(NodeKind::Literal, [
            basic.int.clone(),
            store.get_value(Value::Str(Id::from("1"))),
        ]);
        let short = store.get(NodeKind::CallExpr, [
            basic.bool.clone(),
            lt.clone(),
            one.clone(),
        ]);
        assert!(BasicOp::of_call(&short).is_none());
        assert_eq!(basic.called_op(&short), None);
        let full = store.get(NodeKind::CallExpr, [
            basic.bool.clone(),
            lt,
            one.clone(),
            one,
        ]);
        assert_eq!(BasicOp::of_call(&full).map(|(op, _)| op), Some(BasicOp::IntLt));
        assert_eq!(basic.called_op(&full), Some(BasicOp::IntLt));
    }

    #[test]
    fn type_predicates() {
        let store = NodeStore::new();
        let basic = store.lang_basic();
        assert!(basic.is_int(&basic.int));
        assert!(!basic.is_int(&basic.bool));
        let ref_ty = basic.op(BasicOp::RefVar).child(0).child(1).clone();
        assert!(basic.is_ref_type(&ref_ty));
        assert_eq!(basic.ref_element_type(&ref_ty), Some(&basic.alpha));
        assert!(!basic.is_array_type(&ref_ty));
    }
}
