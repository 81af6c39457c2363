//! Implements a formatter for the in-memory representation of nodes.
//! The printing operation clones inner nodes and doesn't perform any
//! expensive operations.
use crate::lang::BasicOp;
use crate::node::{Node, NodeKind};
use itertools::Itertools;
use std::fmt::{self, Write};

/// Printer for the IR.
pub struct Printer;

impl Printer {
    /// Formats `node` in the textual syntax of the IR.
    pub fn node_str(node: &Node) -> String {
        let mut buf = String::new();
        // Writing into a String never fails.
        let _ = Self::write_node(node, 0, &mut buf);
        buf
    }

    /// Formats a list of nodes separated by `sep`.
    pub fn list_str<'a, I>(nodes: I, sep: &str) -> String
    where
        I: IntoIterator<Item = &'a Node>,
    {
        nodes.into_iter().map(Self::node_str).join(sep)
    }

    /// Formats `node` into `f` using `indent` spaces for nested statements.
    pub fn write_node<F: Write>(
        node: &Node,
        indent: usize,
        f: &mut F,
    ) -> fmt::Result {
        let ch = node.children();
        match node.kind() {
            NodeKind::StringValue
            | NodeKind::IntValue
            | NodeKind::UIntValue
            | NodeKind::BoolValue => match node.value() {
                Some(v) => write!(f, "{v}"),
                None => Ok(()),
            },

            NodeKind::GenericType => {
                write!(f, "{}", Self::node_str(&ch[0]))?;
                let params = ch[1].children();
                if !params.is_empty() {
                    write!(f, "<{}>", Self::list_str(params, ","))?;
                }
                Ok(())
            }
            NodeKind::TypeVariable => write!(f, "'{}", Self::node_str(&ch[0])),
            NodeKind::FunctionType => write!(
                f,
                "({}) -> {}",
                Self::list_str(ch[0].children(), ", "),
                Self::node_str(&ch[1])
            ),
            NodeKind::TupleType => write!(f, "({})", Self::list_str(ch, ", ")),
            NodeKind::StructType => write!(
                f,
                "struct {} {{{}}}",
                Self::node_str(&ch[0]),
                Self::list_str(&ch[1..], "; ")
            ),

            NodeKind::Literal => write!(f, "{}", Self::node_str(&ch[1])),
            NodeKind::Variable => write!(f, "v{}", Self::node_str(&ch[1])),
            NodeKind::CallExpr => {
                let fun = &ch[1];
                match BasicOp::of_literal(fun) {
                    Some(op) => write!(f, "{op}")?,
                    None if fun.kind() == NodeKind::Literal
                        || fun.is_variable() =>
                    {
                        write!(f, "{}", Self::node_str(fun))?
                    }
                    None => write!(f, "({})", Self::node_str(fun))?,
                }
                write!(f, "({})", Self::list_str(&ch[2..], ", "))
            }
            NodeKind::LambdaExpr => {
                let params = ch[1]
                    .children()
                    .iter()
                    .map(|p| {
                        format!("{} {}", Self::node_str(p.expr_type()), p)
                    })
                    .join(", ");
                write!(
                    f,
                    "fun ({params}) -> {} ",
                    Self::node_str(&ch[0].children()[1])
                )?;
                Self::write_node(&ch[2], indent, f)
            }
            NodeKind::CastExpr => write!(
                f,
                "cast<{}>({})",
                Self::node_str(&ch[0]),
                Self::node_str(&ch[1])
            ),
            NodeKind::TupleExpr => {
                write!(f, "({})", Self::list_str(ch[1].children(), ", "))
            }
            NodeKind::StructExpr => write!(
                f,
                "{}{{{}}}",
                Self::node_str(&ch[0]),
                Self::list_str(&ch[1..], ", ")
            ),

            NodeKind::CompoundStmt => {
                if ch.is_empty() {
                    return write!(f, "{{}}");
                }
                writeln!(f, "{{")?;
                for stmt in ch {
                    write!(f, "{:indent$}", "", indent = indent + 2)?;
                    Self::write_node(stmt, indent + 2, f)?;
                    writeln!(f, ";")?;
                }
                write!(f, "{:indent$}}}", "", indent = indent)
            }
            NodeKind::DeclarationStmt => write!(
                f,
                "decl {} {} = {}",
                Self::node_str(ch[0].expr_type()),
                Self::node_str(&ch[0]),
                Self::node_str(&ch[1])
            ),
            NodeKind::IfStmt => {
                write!(f, "if ({}) ", Self::node_str(&ch[0]))?;
                Self::write_node(&ch[1], indent, f)?;
                if !ch[2].children().is_empty() {
                    write!(f, " else ")?;
                    Self::write_node(&ch[2], indent, f)?;
                }
                Ok(())
            }
            NodeKind::WhileStmt => {
                write!(f, "while ({}) ", Self::node_str(&ch[0]))?;
                Self::write_node(&ch[1], indent, f)
            }
            NodeKind::ForStmt => {
                write!(
                    f,
                    "for ({} {} = {} .. {} : {}) ",
                    Self::node_str(ch[0].expr_type()),
                    Self::node_str(&ch[0]),
                    Self::node_str(&ch[1]),
                    Self::node_str(&ch[2]),
                    Self::node_str(&ch[3])
                )?;
                Self::write_node(&ch[4], indent, f)
            }
            NodeKind::ReturnStmt => {
                write!(f, "return {}", Self::node_str(&ch[0]))
            }
            NodeKind::BreakStmt => write!(f, "break"),
            NodeKind::ContinueStmt => write!(f, "continue"),

            NodeKind::Types => write!(f, "[{}]", Self::list_str(ch, ", ")),
            NodeKind::Expressions => {
                write!(f, "[{}]", Self::list_str(ch, ", "))
            }
            NodeKind::Parameters => write!(f, "({})", Self::list_str(ch, ", ")),
            NodeKind::NamedType => write!(
                f,
                "{}: {}",
                Self::node_str(&ch[0]),
                Self::node_str(&ch[1])
            ),
            NodeKind::NamedValue => write!(
                f,
                "{} = {}",
                Self::node_str(&ch[0]),
                Self::node_str(&ch[1])
            ),
            NodeKind::Program => {
                writeln!(f, "program {{")?;
                for entry in ch {
                    write!(f, "{:indent$}", "", indent = indent + 2)?;
                    Self::write_node(entry, indent + 2, f)?;
                    writeln!(f)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Builder, NodeStore};

    #[test]
    fn prints_expressions_and_types() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let v = b.variable_with_id(b.int_type(), 1);
        assert_eq!(b.add(v.clone(), b.int_lit(2)).to_string(), "int_add(v1, 2)");
        assert_eq!(b.ref_type(b.int_type()).to_string(), "ref<int>");
        assert_eq!(store.lang_basic().alpha.to_string(), "'a");
        assert_eq!(
            b.function_type([b.int_type(), b.int_type()], b.int_type())
                .to_string(),
            "(int, int) -> int"
        );
    }

    #[test]
    fn prints_statements() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let a = b.variable_with_id(b.ref_type(b.int_type()), 1);
        let decl = b.decl(a.clone(), b.ref_var(b.int_lit(10)));
        assert_eq!(decl.to_string(), "decl ref<int> v1 = ref_var(10)");
        let block = b.compound([decl, a]);
        assert_eq!(
            block.to_string(),
            "{\n  decl ref<int> v1 = ref_var(10);\n  v1;\n}"
        );
    }
}
