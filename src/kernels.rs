//! Small programs the driver can analyse.
use arbor_ir::{Builder, GetName, Id, Node};

/// A named program built on demand into a store.
pub struct Kernel {
    name: Id,
    description: &'static str,
    build: fn(&Builder) -> Node,
}

impl GetName for Kernel {
    fn name(&self) -> Id {
        self.name
    }
}

impl Kernel {
    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn build(&self, b: &Builder) -> Node {
        (self.build)(b)
    }
}

/// All built-in kernels.
pub fn all() -> Vec<Kernel> {
    vec![
        Kernel {
            name: "alias".into(),
            description: "a reference, an alias of it and an unrelated reference",
            build: alias,
        },
        Kernel {
            name: "tautology".into(),
            description: "a branch on `7 + n < 12 + n`",
            build: tautology,
        },
        Kernel {
            name: "stencil".into(),
            description: "array and struct accesses in several loop nests",
            build: stencil,
        },
    ]
}

pub fn find(name: &str) -> Option<Kernel> {
    all().into_iter().find(|k| k.name() == name)
}

/// `{ ref<int> a = var(10); ref<int> c = a; ref<int> b = var(5); a; c; b; }`
pub fn alias(b: &Builder) -> Node {
    let ref_int = b.ref_type(b.int_type());
    let a = b.variable(ref_int.clone());
    let c = b.variable(ref_int.clone());
    let r = b.variable(ref_int);
    b.compound([
        b.decl(a.clone(), b.ref_var(b.int_lit(10))),
        b.decl(c.clone(), a.clone()),
        b.decl(r.clone(), b.ref_var(b.int_lit(5))),
        a,
        c,
        r,
    ])
}

/// `{ ref<int> n = var(3); if (7 + *n < 12 + *n) { n = 1 } }`
pub fn tautology(b: &Builder) -> Node {
    let n = b.variable(b.ref_type(b.int_type()));
    let lhs = b.add(b.int_lit(7), b.deref(n.clone()));
    let rhs = b.add(b.int_lit(12), b.deref(n.clone()));
    b.compound([
        b.decl(n.clone(), b.ref_var(b.int_lit(3))),
        b.if_stmt(
            b.lt(lhs, rhs),
            b.assign(n, b.int_lit(1)),
            b.compound([]),
        ),
    ])
}

/// ```text
/// fun (a: ref<array<int>>, out: ref<array<int>>, p: ref<point>, n: int) {
///   for i = 1 .. n - 1 { out[i] = a[i - 1] + a[i + 1] }
///   for j = 0 .. 4 { a[j] = 0 }
///   for k = 8 .. 12 { a[k] = 1 }
///   p.x = p.y
/// }
/// ```
pub fn stencil(b: &Builder) -> Node {
    let int = b.int_type();
    let arr_ty = b.ref_type(b.array_type(int.clone()));
    let point = b.struct_type("point", [("x", int.clone()), ("y", int.clone())]);
    let a = b.variable(arr_ty.clone());
    let out = b.variable(arr_ty);
    let p = b.variable(b.ref_type(point));
    let n = b.variable(int.clone());
    let (i, j, k) = (
        b.variable(int.clone()),
        b.variable(int.clone()),
        b.variable(int.clone()),
    );
    let one = || b.int_lit(1);
    let load = |idx: Node| b.deref(b.ref_array_element(a.clone(), idx));

    let smooth = b.assign(
        b.ref_array_element(out.clone(), i.clone()),
        b.add(
            load(b.sub(i.clone(), one())),
            load(b.add(i.clone(), one())),
        ),
    );
    let body = b.compound([
        b.for_stmt(i, one(), b.sub(n.clone(), one()), one(), smooth),
        b.for_stmt(
            j.clone(),
            b.int_lit(0),
            b.int_lit(4),
            one(),
            b.assign(b.ref_array_element(a.clone(), j), b.int_lit(0)),
        ),
        b.for_stmt(
            k.clone(),
            b.int_lit(8),
            b.int_lit(12),
            one(),
            b.assign(b.ref_array_element(a.clone(), k), one()),
        ),
        b.assign(
            b.ref_member(p.clone(), "x", int.clone()),
            b.deref(b.ref_member(p.clone(), "y", int.clone())),
        ),
    ]);
    b.lambda([a, out, p, n], b.unit_type(), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_ir::NodeStore;

    #[test]
    fn kernels_are_found_by_name() {
        assert_eq!(all().len(), 3);
        for k in all() {
            let found = find(k.name().as_str()).unwrap();
            assert_eq!(found.description(), k.description());
        }
        assert!(find("nope").is_none());
    }

    #[test]
    fn kernels_build_in_any_store() {
        for k in all() {
            let store = NodeStore::new();
            let b = Builder::new(&store);
            let root = k.build(&b);
            assert!(root.is_statement() || root.is_expression());
            // building twice yields new variables, hence a new tree
            assert_ne!(k.build(&b), root);
        }
    }
}
