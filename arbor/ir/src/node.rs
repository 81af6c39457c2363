//! Immutable IR nodes.
use arbor_utils::Id;
use smallvec::SmallVec;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

/// The broad class a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeCategory {
    Value,
    Type,
    Expression,
    Statement,
    Support,
    Program,
}

impl NodeCategory {
    /// Returns true if a node of this category may be placed in a slot
    /// expecting `slot`. Every expression is also a statement.
    pub fn fits(self, slot: NodeCategory) -> bool {
        self == slot
            || (self == NodeCategory::Expression
                && slot == NodeCategory::Statement)
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    // Values
    StringValue,
    IntValue,
    UIntValue,
    BoolValue,
    // Types
    GenericType,
    TypeVariable,
    FunctionType,
    TupleType,
    StructType,
    // Expressions
    Literal,
    Variable,
    CallExpr,
    LambdaExpr,
    CastExpr,
    TupleExpr,
    StructExpr,
    // Statements
    CompoundStmt,
    DeclarationStmt,
    IfStmt,
    WhileStmt,
    ForStmt,
    ReturnStmt,
    BreakStmt,
    ContinueStmt,
    // Support
    Types,
    Expressions,
    Parameters,
    NamedType,
    NamedValue,
    // Program
    Program,
}

/// Constraint on a single child position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Any node of the given category.
    Category(NodeCategory),
    /// Exactly the given kind.
    Kind(NodeKind),
}

impl Slot {
    pub fn accepts(self, kind: NodeKind) -> bool {
        match self {
            Slot::Category(cat) => kind.category().fits(cat),
            Slot::Kind(k) => k == kind,
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Category(c) => write!(f, "{c:?}"),
            Slot::Kind(k) => write!(f, "{k:?}"),
        }
    }
}

/// Child contract of a node kind: a fixed prefix of slots followed by an
/// optional variadic tail.
#[derive(Debug, Clone, Copy)]
pub struct ChildContract {
    pub fixed: &'static [Slot],
    pub rest: Option<Slot>,
}

use NodeCategory as C;
use Slot::{Category as Cat, Kind as K};

impl NodeKind {
    pub fn category(self) -> NodeCategory {
        use NodeKind::*;
        match self {
            StringValue | IntValue | UIntValue | BoolValue => C::Value,
            GenericType | TypeVariable | FunctionType | TupleType
            | StructType => C::Type,
            Literal | Variable | CallExpr | LambdaExpr | CastExpr
            | TupleExpr | StructExpr => C::Expression,
            CompoundStmt | DeclarationStmt | IfStmt | WhileStmt | ForStmt
            | ReturnStmt | BreakStmt | ContinueStmt => C::Statement,
            Types | Expressions | Parameters | NamedType | NamedValue => {
                C::Support
            }
            Program => C::Program,
        }
    }

    /// The child contract enforced by the [crate::NodeStore].
    pub fn contract(self) -> ChildContract {
        use NodeKind::*;
        const fn c(fixed: &'static [Slot], rest: Option<Slot>) -> ChildContract {
            ChildContract { fixed, rest }
        }
        match self {
            StringValue | IntValue | UIntValue | BoolValue => c(&[], None),
            GenericType => c(&[K(StringValue), K(Types)], None),
            TypeVariable => c(&[K(StringValue)], None),
            FunctionType => c(&[K(Types), Cat(C::Type)], None),
            TupleType => c(&[], Some(Cat(C::Type))),
            StructType => c(&[K(StringValue)], Some(K(NamedType))),
            Literal => c(&[Cat(C::Type), K(StringValue)], None),
            Variable => c(&[Cat(C::Type), K(UIntValue)], None),
            CallExpr => {
                c(&[Cat(C::Type), Cat(C::Expression)], Some(Cat(C::Expression)))
            }
            LambdaExpr => c(
                &[K(FunctionType), K(Parameters), K(CompoundStmt)],
                None,
            ),
            CastExpr => c(&[Cat(C::Type), Cat(C::Expression)], None),
            TupleExpr => c(&[K(TupleType), K(Expressions)], None),
            StructExpr => c(&[Cat(C::Type)], Some(K(NamedValue))),
            CompoundStmt => c(&[], Some(Cat(C::Statement))),
            DeclarationStmt => c(&[K(Variable), Cat(C::Expression)], None),
            IfStmt => c(
                &[Cat(C::Expression), K(CompoundStmt), K(CompoundStmt)],
                None,
            ),
            WhileStmt => c(&[Cat(C::Expression), K(CompoundStmt)], None),
            ForStmt => c(
                &[
                    K(Variable),
                    Cat(C::Expression),
                    Cat(C::Expression),
                    Cat(C::Expression),
                    K(CompoundStmt),
                ],
                None,
            ),
            ReturnStmt => c(&[Cat(C::Expression)], None),
            BreakStmt | ContinueStmt => c(&[], None),
            Types => c(&[], Some(Cat(C::Type))),
            Expressions => c(&[], Some(Cat(C::Expression))),
            Parameters => c(&[], Some(K(Variable))),
            NamedType => c(&[K(StringValue), Cat(C::Type)], None),
            NamedValue => c(&[K(StringValue), Cat(C::Expression)], None),
            Program => c(&[], Some(Cat(C::Expression))),
        }
    }

    pub fn is_value(self) -> bool {
        self.category() == C::Value
    }

    pub fn is_type(self) -> bool {
        self.category() == C::Type
    }

    pub fn is_expression(self) -> bool {
        self.category() == C::Expression
    }

    /// Returns true for statements, including expressions used as statements.
    pub fn is_statement(self) -> bool {
        self.category().fits(C::Statement)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Payload of value nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Str(Id),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

impl Value {
    /// The value node kind carrying this payload.
    pub fn kind(&self) -> NodeKind {
        match self {
            Value::Str(_) => NodeKind::StringValue,
            Value::Int(_) => NodeKind::IntValue,
            Value::UInt(_) => NodeKind::UIntValue,
            Value::Bool(_) => NodeKind::BoolValue,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Identifies the [crate::NodeStore] a node was created by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) u32);

/// Identifies one node instance. Unique across all stores of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    store: StoreId,
    index: u32,
}

impl NodeId {
    pub(crate) fn new(store: StoreId, index: u32) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> StoreId {
        self.store
    }

    /// Position of the node in its store's creation order.
    pub fn index(&self) -> u32 {
        self.index
    }
}

pub(crate) struct NodeData {
    kind: NodeKind,
    value: Option<Value>,
    children: SmallVec<[Node; 4]>,
    /// Structural hash, computed once at construction.
    hash: u64,
    id: NodeId,
    /// Type-keyed side table. Never part of the node's identity.
    attached: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

/// Shared handle to an immutable, hash-consed IR node.
///
/// Cloning a `Node` is cheap. Two nodes of the same store are structurally
/// equal iff they are the same instance; equality across stores falls back to
/// a structural comparison.
#[derive(Clone)]
pub struct Node(Rc<NodeData>);

impl Node {
    pub(crate) fn new(
        id: NodeId,
        kind: NodeKind,
        value: Option<Value>,
        children: SmallVec<[Node; 4]>,
    ) -> Self {
        let hash = Self::structural_hash(kind, value.as_ref(), &children);
        Node(Rc::new(NodeData {
            kind,
            value,
            children,
            hash,
            id,
            attached: RefCell::new(HashMap::new()),
        }))
    }

    pub(crate) fn structural_hash(
        kind: NodeKind,
        value: Option<&Value>,
        children: &[Node],
    ) -> u64 {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        value.hash(&mut hasher);
        for c in children {
            hasher.write_u64(c.0.hash);
        }
        hasher.finish()
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    pub fn category(&self) -> NodeCategory {
        self.0.kind.category()
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn store_id(&self) -> StoreId {
        self.0.id.store
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.value.as_ref()
    }

    pub fn children(&self) -> &[Node] {
        &self.0.children
    }

    pub fn num_children(&self) -> usize {
        self.0.children.len()
    }

    pub fn get_child(&self, idx: usize) -> Option<&Node> {
        self.0.children.get(idx)
    }

    /// Returns the child at position `idx`.
    ///
    /// # Panics
    /// Panics if the node has no such child.
    pub fn child(&self, idx: usize) -> &Node {
        self.0.children.get(idx).unwrap_or_else(|| {
            panic!(
                "`{}' node has {} children, requested child {idx}",
                self.kind(),
                self.num_children()
            )
        })
    }

    /// Instance identity.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn hash_code(&self) -> u64 {
        self.0.hash
    }

    pub fn is_value(&self) -> bool {
        self.kind().is_value()
    }

    pub fn is_type(&self) -> bool {
        self.kind().is_type()
    }

    pub fn is_expression(&self) -> bool {
        self.kind().is_expression()
    }

    pub fn is_statement(&self) -> bool {
        self.kind().is_statement()
    }
}

/// Convenience accessors for frequently inspected kinds.
impl Node {
    pub fn string_value(&self) -> Option<Id> {
        match self.value() {
            Some(Value::Str(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn int_value(&self) -> Option<i64> {
        match self.value() {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn uint_value(&self) -> Option<u64> {
        match self.value() {
            Some(Value::UInt(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn bool_value(&self) -> Option<bool> {
        match self.value() {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Type of an expression.
    ///
    /// # Panics
    /// Panics if this node is not an expression.
    pub fn expr_type(&self) -> &Node {
        assert!(self.is_expression(), "`{}' is not an expression", self.kind());
        self.child(0)
    }

    /// Name of a generic type, type variable, struct type or the text of a
    /// literal.
    pub fn name(&self) -> Option<Id> {
        match self.kind() {
            NodeKind::GenericType
            | NodeKind::TypeVariable
            | NodeKind::StructType
            | NodeKind::NamedType
            | NodeKind::NamedValue => self.child(0).string_value(),
            NodeKind::Literal => self.child(1).string_value(),
            _ => None,
        }
    }

    /// Type parameters of a generic type.
    pub fn type_params(&self) -> &[Node] {
        match self.kind() {
            NodeKind::GenericType => self.child(1).children(),
            _ => &[],
        }
    }

    /// Identifier of a variable.
    pub fn variable_id(&self) -> Option<u64> {
        match self.kind() {
            NodeKind::Variable => self.child(1).uint_value(),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        self.kind() == NodeKind::Variable
    }

    /// The function expression of a call.
    pub fn call_function(&self) -> Option<&Node> {
        match self.kind() {
            NodeKind::CallExpr => Some(self.child(1)),
            _ => None,
        }
    }

    /// The arguments of a call; empty for every other kind.
    pub fn call_args(&self) -> &[Node] {
        match self.kind() {
            NodeKind::CallExpr => &self.children()[2..],
            _ => &[],
        }
    }

    /// (variable, initialization) of a declaration.
    pub fn declaration(&self) -> Option<(&Node, &Node)> {
        match self.kind() {
            NodeKind::DeclarationStmt => Some((self.child(0), self.child(1))),
            _ => None,
        }
    }

    /// Body statements of a compound statement.
    pub fn statements(&self) -> &[Node] {
        match self.kind() {
            NodeKind::CompoundStmt => self.children(),
            _ => &[],
        }
    }
}

/// Attached values: a type-keyed side table used to memoize derived facts.
impl Node {
    /// Attach `value` to this node instance, replacing any value of the same
    /// type. Attaching a value equal to the present one is a no-op.
    pub fn attach_value<T: Any + PartialEq>(&self, value: T) {
        let key = TypeId::of::<T>();
        let mut table = self.0.attached.borrow_mut();
        if let Some(old) = table.get(&key) {
            if old.downcast_ref::<T>().is_some_and(|o| *o == value) {
                return;
            }
        }
        table.insert(key, Rc::new(value));
    }

    pub fn attached_value<T: Any>(&self) -> Option<Rc<T>> {
        self.0
            .attached
            .borrow()
            .get(&TypeId::of::<T>())
            .and_then(|v| Rc::clone(v).downcast::<T>().ok())
    }

    pub fn has_attached_value<T: Any>(&self) -> bool {
        self.0.attached.borrow().contains_key(&TypeId::of::<T>())
    }

    pub fn detach_value<T: Any>(&self) -> Option<Rc<T>> {
        self.0
            .attached
            .borrow_mut()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.ptr_eq(b) {
                continue;
            }
            // Within one store structural equality implies identity.
            if a.0.hash != b.0.hash
                || a.store_id() == b.store_id()
                || a.kind() != b.kind()
                || a.value() != b.value()
                || a.num_children() != b.num_children()
            {
                return false;
            }
            stack.extend(a.children().iter().zip(b.children()));
        }
        true
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{}({})",
            self.kind(),
            self.id().index(),
            crate::Printer::node_str(self)
        )
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::Printer::node_str(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_fit_statement_slots() {
        assert!(NodeCategory::Expression.fits(NodeCategory::Statement));
        assert!(!NodeCategory::Statement.fits(NodeCategory::Expression));
        assert!(Slot::Category(NodeCategory::Statement)
            .accepts(NodeKind::CallExpr));
        assert!(!Slot::Kind(NodeKind::CompoundStmt).accepts(NodeKind::IfStmt));
    }

    #[test]
    fn every_kind_has_a_consistent_contract() {
        use NodeKind::*;
        for kind in [
            StringValue, IntValue, UIntValue, BoolValue, GenericType,
            TypeVariable, FunctionType, TupleType, StructType, Literal,
            Variable, CallExpr, LambdaExpr, CastExpr, TupleExpr, StructExpr,
            CompoundStmt, DeclarationStmt, IfStmt, WhileStmt, ForStmt,
            ReturnStmt, BreakStmt, ContinueStmt, Types, Expressions,
            Parameters, NamedType, NamedValue, Program,
        ] {
            let contract = kind.contract();
            if kind.is_value() {
                assert!(contract.fixed.is_empty() && contract.rest.is_none());
            }
            if kind.is_expression() {
                // the first child of every expression is its type
                let first_is_type = match contract.fixed[0] {
                    Slot::Category(c) => c == NodeCategory::Type,
                    Slot::Kind(k) => k.is_type(),
                };
                assert!(first_is_type, "{kind}");
            }
        }
    }
}
