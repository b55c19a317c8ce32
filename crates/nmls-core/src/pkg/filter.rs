//! Filtered, deduplicated view of a classified tree.
//!
//! The view never mutates the tree, so several views can be built from one
//! load. Children are listed sorted by name. Expansion is breadth-first and
//! every child of a node is registered before any of them is expanded, so
//! each installed node is expanded once, at its shallowest occurrence; every
//! other occurrence (including cycle back-references) is a `deduped` leaf.
//! Filter terms are applied afterwards in one bottom-up pass.

use std::collections::{HashSet, VecDeque};

use super::spec::FilterTerm;
use super::tree::{DepType, EdgeRef, NodeId, PackageTree};

/// Which root edges a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepTypes {
    pub prod: bool,
    pub dev: bool,
    pub optional: bool,
    pub peer: bool,
}

impl DepTypes {
    #[must_use]
    pub fn all() -> Self {
        Self {
            prod: true,
            dev: true,
            optional: true,
            peer: true,
        }
    }

    /// `--dev` / `--only development`.
    #[must_use]
    pub fn only_dev() -> Self {
        Self {
            prod: false,
            dev: true,
            optional: false,
            peer: false,
        }
    }

    /// `--prod` / `--only production`: prod, optional and workspace edges.
    #[must_use]
    pub fn only_prod() -> Self {
        Self {
            prod: true,
            dev: false,
            optional: true,
            peer: false,
        }
    }

    #[must_use]
    pub fn allows(self, dep_type: DepType) -> bool {
        match dep_type {
            DepType::Prod | DepType::Workspace => self.prod,
            DepType::Dev => self.dev,
            DepType::Optional => self.optional,
            DepType::Peer | DepType::PeerOptional => self.peer,
        }
    }

    fn is_dev_only(self) -> bool {
        self == Self::only_dev()
    }
}

impl Default for DepTypes {
    fn default() -> Self {
        Self::all()
    }
}

/// Inputs of [`build_view`].
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub terms: Vec<FilterTerm>,
    /// Depth bound in edges below the display root; `None` is unbounded.
    pub depth: Option<usize>,
    pub dep_types: DepTypes,
    /// Only show symlinked packages at the top level.
    pub link: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Installed(NodeId),
    /// A declared dependency with nothing installed.
    Missing,
}

/// One displayed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNode {
    pub kind: ViewKind,
    /// Name under which the entry is shown.
    pub name: String,
    /// Edge through which the entry was reached; `None` for extraneous children.
    pub edge: Option<EdgeRef>,
    /// Depth below the display root, `0` for its direct children.
    pub depth: usize,
    /// Expanded at an earlier or shallower occurrence; children are not shown.
    pub deduped: bool,
    pub children: Vec<ViewNode>,
}

impl ViewNode {
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        match self.kind {
            ViewKind::Installed(id) => Some(id),
            ViewKind::Missing => None,
        }
    }
}

/// The filtered view below the display root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeView {
    pub root: NodeId,
    pub children: Vec<ViewNode>,
    /// Filter terms were given, so an empty view means nothing matched.
    pub filtered: bool,
}

impl TreeView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Installed, non-deduped nodes in display order, root first.
    #[must_use]
    pub fn installed(&self) -> Vec<NodeId> {
        fn walk(nodes: &[ViewNode], out: &mut Vec<NodeId>) {
            for view in nodes {
                if let (Some(id), false) = (view.node(), view.deduped) {
                    out.push(id);
                }
                walk(&view.children, out);
            }
        }

        let mut out = vec![self.root];
        walk(&self.children, &mut out);
        out
    }
}

/// Build the view of `tree` for `options`.
#[must_use]
pub fn build_view(tree: &PackageTree, options: &FilterOptions) -> TreeView {
    let mut builder = Builder {
        tree,
        options,
        dot: options.terms.contains(&FilterTerm::Root),
        named: options
            .terms
            .iter()
            .filter(|t| matches!(t, FilterTerm::Package { .. }))
            .collect(),
        seen: HashSet::from([NodeId::ROOT]),
        slots: Vec::new(),
    };

    let top = builder.register(NodeId::ROOT, 0);
    let mut queue: VecDeque<usize> = top.iter().copied().collect();
    while let Some(index) = queue.pop_front() {
        let slot = &builder.slots[index];
        let depth = slot.depth;
        let Some(target) = slot.target().filter(|_| builder.expands(slot)) else {
            continue;
        };
        let children = builder.register(target, depth + 1);
        queue.extend(children.iter().copied());
        builder.slots[index].children = children;
    }

    let children = top.into_iter().filter_map(|index| builder.finish(index)).collect();

    TreeView {
        root: NodeId::ROOT,
        children,
        filtered: !options.terms.is_empty(),
    }
}

/// A child entry before filtering.
struct Candidate {
    name: String,
    target: Option<NodeId>,
    edge: Option<EdgeRef>,
}

/// A registered entry and the slots of its children, if it was expanded.
struct Slot {
    candidate: Candidate,
    depth: usize,
    deduped: bool,
    children: Vec<usize>,
}

impl Slot {
    fn target(&self) -> Option<NodeId> {
        self.candidate.target
    }
}

struct Builder<'a> {
    tree: &'a PackageTree,
    options: &'a FilterOptions,
    dot: bool,
    named: Vec<&'a FilterTerm>,
    /// Nodes already registered somewhere in the view.
    seen: HashSet<NodeId>,
    slots: Vec<Slot>,
}

impl Builder<'_> {
    /// Edge targets, missing placeholders and extraneous children of `id`, by name.
    fn candidates(&self, id: NodeId) -> Vec<Candidate> {
        let node = self.tree.node(id);
        let top = id == NodeId::ROOT;
        let mut out: Vec<Candidate> = Vec::new();

        for (index, edge) in node.edges_out.iter().enumerate() {
            if top && !self.options.dep_types.allows(edge.dep_type) {
                continue;
            }
            if edge.to.is_none() && edge.dep_type == DepType::PeerOptional {
                continue;
            }
            if top && self.options.link && !edge.to.is_some_and(|t| self.tree.node(t).is_link) {
                continue;
            }
            if out.iter().any(|c| c.name == edge.name) {
                continue;
            }
            out.push(Candidate {
                name: edge.name.clone(),
                target: edge.to,
                edge: Some(EdgeRef { from: id, index }),
            });
        }

        let hide_extraneous =
            top && (self.options.link || self.options.dep_types.is_dev_only());
        if !hide_extraneous {
            for (name, &child) in &node.children {
                let shown = out.iter().any(|c| c.target == Some(child) || &c.name == name);
                if self.tree.node(child).flags.extraneous && !shown {
                    out.push(Candidate {
                        name: name.clone(),
                        target: Some(child),
                        edge: None,
                    });
                }
            }
        }

        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Register the children of `id`, shown at `depth`. A child whose node
    /// is already registered becomes a deduped leaf.
    fn register(&mut self, id: NodeId, depth: usize) -> Vec<usize> {
        let mut indices = Vec::new();
        for candidate in self.candidates(id) {
            let deduped = candidate.target.is_some_and(|t| !self.seen.insert(t));
            indices.push(self.slots.len());
            self.slots.push(Slot {
                candidate,
                depth,
                deduped,
                children: Vec::new(),
            });
        }
        indices
    }

    fn expands(&self, slot: &Slot) -> bool {
        !slot.deduped && slot.target().is_some() && self.descends(slot.depth)
    }

    /// Apply the filter terms below `index`: an entry is kept when it
    /// matches or anything kept below it does.
    fn finish(&self, index: usize) -> Option<ViewNode> {
        let slot = &self.slots[index];
        let candidate = &slot.candidate;

        let children: Vec<ViewNode> = slot
            .children
            .iter()
            .filter_map(|&child| self.finish(child))
            .collect();

        let matched = match candidate.target {
            Some(target) => self.matches(target),
            None => self.matches_missing(&candidate.name),
        };
        let by_dot = self.dot && slot.depth == 0 && candidate.edge.is_some();
        let include =
            self.options.terms.is_empty() || by_dot || matched || !children.is_empty();

        include.then(|| ViewNode {
            kind: candidate.target.map_or(ViewKind::Missing, ViewKind::Installed),
            name: candidate.name.clone(),
            edge: candidate.edge,
            depth: slot.depth,
            deduped: slot.deduped,
            children,
        })
    }

    /// Whether entries at `depth + 1` can still be shown.
    fn descends(&self, depth: usize) -> bool {
        let within = self.options.depth.map_or(true, |bound| depth < bound);
        if self.options.terms.is_empty() {
            within
        } else {
            within && !self.named.is_empty()
        }
    }

    fn matches(&self, id: NodeId) -> bool {
        let node = self.tree.node(id);
        self.named.iter().any(|term| term.matches(node))
    }

    /// Missing entries match terms by name when no range is given.
    fn matches_missing(&self, name: &str) -> bool {
        self.named.iter().any(|term| {
            matches!(term, FilterTerm::Package { name: n, range: None } if n == name)
        })
    }
}
