use arbor_ir::{ArborResult, Error, Node};
use itertools::Itertools;
use linked_hash_map::LinkedHashMap;

/// One dimension of an [IterationVector].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    /// A loop induction variable.
    Iter(Node),
    /// A value invariant within the analysed region.
    Param(Node),
    /// The constant term.
    Constant,
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Element::Iter(n) | Element::Param(n) => write!(f, "{n}"),
            Element::Constant => write!(f, "1"),
        }
    }
}

/// The ordered dimensions affine functions are expressed over: iterators,
/// then parameters, then the constant term.
///
/// Dimensions are integer valued IR expressions, usually variables or
/// dereferences of variables.
#[derive(Debug, Clone, Default)]
pub struct IterationVector {
    iters: LinkedHashMap<Node, ()>,
    params: LinkedHashMap<Node, ()>,
}

impl IterationVector {
    pub fn new<I, P>(iters: I, params: P) -> Self
    where
        I: IntoIterator<Item = Node>,
        P: IntoIterator<Item = Node>,
    {
        let mut iv = Self::default();
        for i in iters {
            iv.add_iter(i);
        }
        for p in params {
            iv.add_param(p);
        }
        iv
    }

    /// Adds an iterator and returns its index. Expressions already present as
    /// iterators or parameters are not added again.
    pub fn add_iter(&mut self, iter: Node) -> usize {
        if let Some(idx) = self.index_of_node(&iter) {
            return idx;
        }
        self.iters.insert(iter, ());
        self.iters.len() - 1
    }

    /// Adds a parameter and returns its index. Expressions already present as
    /// iterators or parameters are not added again.
    pub fn add_param(&mut self, param: Node) -> usize {
        if let Some(idx) = self.index_of_node(&param) {
            return idx;
        }
        self.params.insert(param, ());
        self.iters.len() + self.params.len() - 1
    }

    pub fn num_iters(&self) -> usize {
        self.iters.len()
    }

    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    /// Number of dimensions including the constant term.
    pub fn size(&self) -> usize {
        self.iters.len() + self.params.len() + 1
    }

    pub fn iters(&self) -> impl Iterator<Item = &Node> {
        self.iters.keys()
    }

    pub fn params(&self) -> impl Iterator<Item = &Node> {
        self.params.keys()
    }

    /// All dimensions in order.
    pub fn elements(&self) -> impl Iterator<Item = Element> + '_ {
        self.iters
            .keys()
            .cloned()
            .map(Element::Iter)
            .chain(self.params.keys().cloned().map(Element::Param))
            .chain(std::iter::once(Element::Constant))
    }

    pub fn element(&self, idx: usize) -> Option<Element> {
        self.elements().nth(idx)
    }

    pub fn constant_index(&self) -> usize {
        self.size() - 1
    }

    pub fn index_of(&self, elem: &Element) -> Option<usize> {
        match elem {
            Element::Iter(n) => self.iters.keys().position(|i| i == n),
            Element::Param(n) => self
                .params
                .keys()
                .position(|p| p == n)
                .map(|p| p + self.iters.len()),
            Element::Constant => Some(self.constant_index()),
        }
    }

    /// Index of the iterator or parameter `node`.
    pub fn index_of_node(&self, node: &Node) -> Option<usize> {
        self.index_of(&Element::Iter(node.clone()))
            .or_else(|| self.index_of(&Element::Param(node.clone())))
    }

    /// The element for iterator or parameter `node`.
    pub fn element_of(&self, node: &Node) -> Option<Element> {
        if self.iters.contains_key(node) {
            Some(Element::Iter(node.clone()))
        } else if self.params.contains_key(node) {
            Some(Element::Param(node.clone()))
        } else {
            None
        }
    }

    /// A vector holding the dimensions of `self` followed by the new
    /// dimensions of `other`.
    pub fn merge(&self, other: &IterationVector) -> IterationVector {
        let mut res = self.clone();
        for i in other.iters() {
            res.add_iter(i.clone());
        }
        for p in other.params() {
            res.add_param(p.clone());
        }
        res
    }

    /// For every dimension of `self`, its index within `target`, if present.
    pub fn translation_to(&self, target: &IterationVector) -> Vec<Option<usize>> {
        self.elements().map(|e| target.index_of(&e)).collect()
    }

    /// Like [IterationVector::translation_to] but fails unless every
    /// dimension is present in `target`.
    pub fn full_translation_to(
        &self,
        target: &IterationVector,
    ) -> ArborResult<Vec<usize>> {
        self.elements()
            .map(|e| {
                target.index_of(&e).ok_or_else(|| {
                    Error::iter_vec_mismatch(format!(
                        "`{e}' of {self} is not part of {target}"
                    ))
                })
            })
            .collect()
    }
}

impl PartialEq for IterationVector {
    fn eq(&self, other: &Self) -> bool {
        self.iters.keys().eq(other.iters.keys())
            && self.params.keys().eq(other.params.keys())
    }
}

impl Eq for IterationVector {}

impl std::fmt::Display for IterationVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}|{}|1)",
            self.iters().join(","),
            self.params().join(",")
        )
    }
}
