//! Driver for the arbor analyses.
use crate::cmdline::Opts;
use crate::kernels;
use arbor_ir::{visitor, Address, Builder, GetName, Node, NodeKind, NodeStore, RRC};
use arbor_opt::analysis::access::{Access, AccessClass, AccessManager, AliasMap};
use arbor_opt::analysis::polyhedral::{
    scop, to_ir, try_normalize, Constraint, IterationDomain,
};
use arbor_opt::{AnalysisConf, Named};
use arbor_utils::{ArborResult, Error};
use itertools::Itertools;
use std::collections::HashMap;
use std::io::Write;

/// A branch or loop condition read as an affine constraint.
pub struct Condition {
    /// Address of the condition expression.
    pub address: Address,
    pub constraint: Constraint,
    /// The normalized constraint converted back into the IR.
    pub normalized: Node,
    /// The value of the condition if it does not depend on any variable.
    pub verdict: Option<bool>,
}

/// Everything the analyses found out about one program.
pub struct Report {
    /// Iteration domain of the body of every loop.
    pub domains: Vec<(Address, IterationDomain)>,
    pub conditions: Vec<Condition>,
    pub accesses: Vec<(Access, RRC<AccessClass>)>,
    pub manager: AccessManager,
}

/// Runs the analyses on the program `root` built with `b`.
pub fn analyse(
    b: &Builder,
    root: &Node,
    conf: AnalysisConf,
) -> ArborResult<Report> {
    let root_addr = Address::root(root.clone());
    let mut domains = vec![];
    let mut conditions = vec![];
    visitor::try_visit_depth_first(&root_addr, |addr: &Address| {
        match addr.as_node().kind() {
            NodeKind::ForStmt => {
                let body = addr.child_address(4)?;
                domains.push((addr.clone(), scop::loop_domain(&body)));
            }
            NodeKind::IfStmt | NodeKind::WhileStmt => {
                let cond = addr.child_address(0)?;
                conditions.extend(condition(b, &cond));
            }
            _ => (),
        }
        Ok(())
    })?;

    let aliases = AliasMap::collect(b.store(), root);
    let mut manager = AccessManager::new(conf);
    let accesses = manager.classify_block(&root_addr, &aliases)?;
    Ok(Report {
        domains,
        conditions,
        accesses,
        manager,
    })
}

fn condition(b: &Builder, cond: &Address) -> Option<Condition> {
    let iters = scop::enclosing_loops(cond)
        .iter()
        .map(|l| l.as_node().child(0).clone())
        .collect_vec();
    let parsed = Constraint::from_expr(&iters, cond.as_node())
        .and_then(|c| Ok((try_normalize(&c)?, c)));
    let (normal, constraint) = match parsed {
        Ok(res) => res,
        Err(e) => {
            log::debug!("condition at {cond} is not affine: {e}");
            return None;
        }
    };
    let verdict = if normal.leaves().iter().all(|l| l.func.is_constant()) {
        normal.evaluate(&HashMap::new()).ok()
    } else {
        None
    };
    Some(Condition {
        address: cond.clone(),
        normalized: to_ir(b, &normal),
        constraint,
        verdict,
    })
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "loop domains:")?;
        for (addr, dom) in &self.domains {
            writeln!(f, "  {addr}: {dom}")?;
        }
        writeln!(f, "conditions:")?;
        for c in &self.conditions {
            write!(f, "  {}: {} => {}", c.address, c.constraint, c.normalized)?;
            match c.verdict {
                Some(v) => writeln!(f, " (always {v})")?,
                None => writeln!(f)?,
            }
        }
        writeln!(f, "access classes:")?;
        for class in self.manager.classes() {
            writeln!(f, "  {}", class.borrow())?;
        }
        Ok(())
    }
}

fn list(out: &mut impl Write) -> ArborResult<()> {
    writeln!(out, "kernels:")?;
    for k in kernels::all() {
        writeln!(out, "  {}: {}", k.name(), k.description())?;
    }
    writeln!(
        out,
        "options of `{}' ({}):",
        AccessManager::name(),
        AccessManager::description()
    )?;
    for opt in AccessManager::opts() {
        writeln!(
            out,
            "  -x {}:{}={}: {}",
            AccessManager::name(),
            opt.name(),
            opt.default(),
            opt.description()
        )?;
    }
    Ok(())
}

/// Run the analyses from the command line.
pub fn run_analyses() -> ArborResult<()> {
    let opts = Opts::get_opts();

    // enable tracing
    env_logger::Builder::new()
        .format_timestamp(None)
        .filter_level(opts.log_level)
        .target(env_logger::Target::Stderr)
        .init();

    let out = &mut std::io::stdout();
    if opts.list {
        return list(out);
    }

    let Some(name) = &opts.kernel else {
        return Err(Error::misc(
            "no kernel given, use --list to show the available ones",
        ));
    };
    let kernel = kernels::find(name)
        .ok_or_else(|| Error::misc(format!("unknown kernel `{name}'")))?;

    let store = NodeStore::new();
    let b = Builder::new(&store);
    let root = kernel.build(&b);
    log::debug!("built kernel `{}' with {} nodes", kernel.name(), store.len());
    if opts.print {
        writeln!(out, "{root}")?;
    }

    let conf = AnalysisConf::from_opts(&opts.extra_opts);
    let report = analyse(&b, &root, conf)?;
    write!(out, "{report}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_names_every_kernel() {
        let mut buf = vec![];
        list(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        for k in kernels::all() {
            assert!(text.contains(k.name().as_str()));
        }
        assert!(text.contains("-x access:enum-bound=256"));
    }

    #[test]
    fn conditions_that_overflow_are_skipped() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let n = b.variable(b.int_type());
        // n + MIN < 0 cannot be rewritten as -n - MIN - 1 >= 0
        let cond = b.lt(b.add(n, b.int_lit(i64::MIN)), b.int_lit(0));
        let root = b.compound([b.if_stmt(cond, b.compound([]), b.compound([]))]);
        let report = analyse(&b, &root, AnalysisConf::default()).unwrap();
        assert!(report.conditions.is_empty());
    }

    #[test]
    fn stencil_report() {
        let store = NodeStore::new();
        let b = Builder::new(&store);
        let root = kernels::stencil(&b);
        let report = analyse(&b, &root, AnalysisConf::default()).unwrap();
        assert_eq!(report.domains.len(), 3);
        assert!(report.conditions.is_empty());
        // a: the smoothing loop, a[0..4] and a[8..12]; out; p.x; p.y
        assert_eq!(report.manager.len(), 6);
        assert_eq!(report.accesses.len(), 7);
        let text = report.to_string();
        assert!(text.starts_with("loop domains:"));
        assert_eq!(text.lines().filter(|l| l.contains("class ")).count(), 6);
    }
}
