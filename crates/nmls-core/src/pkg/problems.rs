//! Tree integrity checks.
//!
//! Classification happens in place on the loaded tree:
//! - reachability from the root decides `extraneous` and the inherited
//!   `dev`/`optional`/`peer` flags
//! - a depth-first walk in declaration order classifies every edge as
//!   missing or invalid
//!
//! The aggregated report lists all invalid problems, then all missing,
//! then all extraneous, each in visit order. A node that is both invalid
//! and extraneous is reported as invalid only.

use std::collections::{HashSet, VecDeque};

use super::spec::DepSpec;
use super::tree::{DepType, NodeId, PackageTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    Invalid,
    Missing,
    Extraneous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub kind: ProblemKind,
    pub message: String,
    /// The node concerned; for missing dependencies, the declaring node.
    pub node: NodeId,
    /// A missing optional dependency. These never fail a listing.
    pub optional: bool,
}

impl Problem {
    fn new(kind: ProblemKind, message: String, node: NodeId) -> Self {
        Self {
            kind,
            message,
            node,
            optional: false,
        }
    }
}

/// Ordered problems for a whole tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemReport {
    pub problems: Vec<Problem>,
}

impl ProblemReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// True unless every problem is a missing optional dependency.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.problems.iter().any(|p| !p.optional)
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.problems.iter().map(|p| p.message.as_str())
    }

    /// Newline-joined problem list.
    #[must_use]
    pub fn to_message(&self) -> String {
        self.messages().collect::<Vec<_>>().join("\n")
    }
}

/// Classify every node of `tree` and return the ordered report.
///
/// Running it twice on the same tree yields the same report.
pub fn detect_problems(tree: &mut PackageTree) -> ProblemReport {
    if tree.load_failed {
        return ProblemReport::default();
    }

    reset(tree);
    mark_reachability(tree);

    let mut walk = Walk {
        visited: HashSet::new(),
        order: Vec::new(),
        invalid: Vec::new(),
        missing: Vec::new(),
    };
    walk.visit(tree, NodeId::ROOT);

    let mut extraneous = Vec::new();
    for &id in &walk.order {
        let node = tree.node_mut(id);
        if node.flags.invalid {
            node.flags.extraneous = false;
        }
        if node.flags.extraneous {
            let message = format!("extraneous: {} {}", node.pkgid(), node.path.display());
            if !node.problems.contains(&message) {
                node.problems.push(message.clone());
            }
            extraneous.push(Problem::new(ProblemKind::Extraneous, message, id));
        }
    }

    let mut problems = walk.invalid;
    problems.extend(walk.missing);
    problems.extend(extraneous);

    tracing::debug!(
        problems = problems.len(),
        visited = walk.order.len(),
        "classified tree"
    );
    ProblemReport { problems }
}

struct Walk {
    visited: HashSet<NodeId>,
    order: Vec<NodeId>,
    invalid: Vec<Problem>,
    missing: Vec<Problem>,
}

impl Walk {
    fn visit(&mut self, tree: &mut PackageTree, id: NodeId) {
        if !self.visited.insert(id) {
            return;
        }
        self.order.push(id);

        for index in 0..tree.node(id).edges_out.len() {
            let edge = &tree.node(id).edges_out[index];
            match edge.to {
                None => {
                    if edge.dep_type == DepType::PeerOptional {
                        continue;
                    }
                    let message = format!(
                        "missing: {}@{}, required by {}",
                        edge.name,
                        edge.spec,
                        tree.node(id).pkgid()
                    );
                    let optional = edge.dep_type == DepType::Optional;
                    tree.node_mut(id).edges_out[index].problem = Some(message.clone());
                    self.missing.push(Problem {
                        optional,
                        ..Problem::new(ProblemKind::Missing, message, id)
                    });
                }
                Some(target) => {
                    let valid = DepSpec::parse(&edge.spec).satisfied_by(tree.node(target));
                    if !valid {
                        self.mark_invalid(tree, target);
                    }
                    self.visit(tree, target);
                }
            }
        }

        let extraneous_children: Vec<NodeId> = tree
            .node(id)
            .children
            .values()
            .copied()
            .filter(|&child| tree.node(child).flags.extraneous)
            .collect();
        for child in extraneous_children {
            self.visit(tree, child);
        }
    }

    fn mark_invalid(&mut self, tree: &mut PackageTree, target: NodeId) {
        let node = tree.node_mut(target);
        if node.flags.invalid {
            return;
        }
        node.flags.invalid = true;
        let message = format!("invalid: {} {}", node.pkgid(), node.path.display());
        node.problems.push(message.clone());
        self.invalid.push(Problem::new(ProblemKind::Invalid, message, target));
    }
}

/// Clear results of an earlier classification.
fn reset(tree: &mut PackageTree) {
    for node in &mut tree.nodes {
        node.problems.clear();
        node.flags.invalid = false;
        for edge in &mut node.edges_out {
            edge.problem = None;
        }
    }
}

/// Set `extraneous` for nodes no edge path from the root reaches (or that an
/// authoritative lockfile does not list), and the inherited dependency-type
/// flags for the rest.
fn mark_reachability(tree: &mut PackageTree) {
    let all = reach(tree, |_, _| true);
    let prod = reach(tree, |from, dep_type| {
        !(from == NodeId::ROOT && dep_type == DepType::Dev)
    });
    let required = reach(tree, |_, dep_type| !dep_type.is_optional());

    let first_types = first_edge_types(tree);

    for id in tree.ids().skip(1).collect::<Vec<_>>() {
        let global = tree.global;
        let node = tree.node_mut(id);
        node.dep_type = first_types[id.0];

        let reached = all.contains(&id);
        node.flags.extraneous = !global && (!reached || node.unlisted);
        node.flags.dev = reached && !prod.contains(&id);
        node.flags.optional = reached && !required.contains(&id);
        node.flags.peer = node.dep_type.is_some_and(DepType::is_peer);
    }
}

/// Nodes reachable from the root following edges accepted by `follow`.
fn reach(tree: &PackageTree, follow: impl Fn(NodeId, DepType) -> bool) -> HashSet<NodeId> {
    let mut seen = HashSet::from([NodeId::ROOT]);
    let mut queue = VecDeque::from([NodeId::ROOT]);

    while let Some(id) = queue.pop_front() {
        for edge in &tree.node(id).edges_out {
            let Some(to) = edge.to else { continue };
            if follow(id, edge.dep_type) && seen.insert(to) {
                queue.push_back(to);
            }
        }
    }
    seen
}

/// Type of the first edge reaching each node in a breadth-first walk.
fn first_edge_types(tree: &PackageTree) -> Vec<Option<DepType>> {
    let mut types = vec![None; tree.len()];
    let mut seen = HashSet::from([NodeId::ROOT]);
    let mut queue = VecDeque::from([NodeId::ROOT]);

    while let Some(id) = queue.pop_front() {
        for edge in &tree.node(id).edges_out {
            let Some(to) = edge.to else { continue };
            if seen.insert(to) {
                types[to.0] = Some(edge.dep_type);
                queue.push_back(to);
            }
        }
    }
    types
}
