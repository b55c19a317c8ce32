//! Output formats for a filtered tree: JSON, parseable lines and the
//! box-drawing tree.

use serde_json::{Map, Value};
use std::fmt::Write as _;

use super::filter::{TreeView, ViewKind, ViewNode};
use super::problems::ProblemReport;
use super::resolved::relative_path;
use super::spec::DepSpec;
use super::tree::{DepType, EdgeRef, NodeId, PackageNode, PackageTree};

/// Presentation switches shared by all formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Include manifest details (descriptions, paths, realpaths).
    pub long: bool,
    /// Box drawing with unicode glyphs instead of ASCII.
    pub unicode: bool,
}

// ============================================================================
// JSON
// ============================================================================

/// JSON document for the view.
///
/// A root manifest that failed to parse renders as `{invalid, problems}`,
/// an empty location as `{}`.
#[must_use]
pub fn render_json(
    tree: &PackageTree,
    view: &TreeView,
    report: &ProblemReport,
    options: RenderOptions,
) -> Value {
    let root = tree.root();

    if tree.load_failed {
        let mut out = Map::new();
        out.insert("invalid".into(), Value::Bool(true));
        out.insert("problems".into(), strings(&root.problems));
        return Value::Object(out);
    }
    if root.manifest.is_none() && tree.is_empty() {
        return Value::Object(Map::new());
    }

    let mut out = if options.long {
        long_fields(tree, NodeId::ROOT)
    } else {
        let mut out = Map::new();
        if root.manifest.is_some() {
            if let Some(name) = root.package_name.as_ref().or(root.name.as_ref()) {
                out.insert("name".into(), Value::String(name.clone()));
            }
        }
        if let Some(version) = &root.version {
            out.insert("version".into(), Value::String(version.clone()));
        }
        out
    };

    if !report.is_empty() {
        let messages: Vec<String> = report.messages().map(String::from).collect();
        out.insert("problems".into(), strings(&messages));
    }
    if !view.children.is_empty() {
        out.insert("dependencies".into(), json_children(tree, &view.children, options));
    }

    Value::Object(out)
}

fn json_children(tree: &PackageTree, children: &[ViewNode], options: RenderOptions) -> Value {
    let mut map = Map::new();
    for child in children {
        map.insert(child.name.clone(), json_item(tree, child, options));
    }
    Value::Object(map)
}

fn json_item(tree: &PackageTree, view: &ViewNode, options: RenderOptions) -> Value {
    let ViewKind::Installed(id) = view.kind else {
        return json_missing(tree, view);
    };
    let node = tree.node(id);

    let mut item = if options.long {
        long_fields(tree, id)
    } else {
        let mut item = Map::new();
        if let Some(version) = &node.version {
            item.insert("version".into(), Value::String(version.clone()));
        }
        if let Some(resolved) = &node.resolved {
            item.insert("resolved".into(), Value::String(resolved.clone()));
        }
        item
    };

    if view.deduped {
        return Value::Object(item);
    }

    if node.flags.extraneous && !tree.global {
        item.insert("extraneous".into(), Value::Bool(true));
    }
    if node.flags.invalid {
        item.insert("invalid".into(), Value::Bool(true));
    }
    if !node.problems.is_empty() {
        item.insert("problems".into(), strings(&node.problems));
    }
    if !view.children.is_empty() {
        item.insert("dependencies".into(), json_children(tree, &view.children, options));
    }

    Value::Object(item)
}

/// Missing optional dependencies render as `{}`.
fn json_missing(tree: &PackageTree, view: &ViewNode) -> Value {
    let mut item = Map::new();
    let Some(edge) = view.edge.map(|e| tree.edge(e)) else {
        return Value::Object(item);
    };
    if edge.dep_type.is_optional() {
        return Value::Object(item);
    }

    item.insert("required".into(), Value::String(edge.spec.clone()));
    item.insert("missing".into(), Value::Bool(true));
    if let Some(problem) = &edge.problem {
        item.insert("problems".into(), strings(std::slice::from_ref(problem)));
    }
    Value::Object(item)
}

/// Manifest fields plus the computed `--long` details.
fn long_fields(tree: &PackageTree, id: NodeId) -> Map<String, Value> {
    let node = tree.node(id);
    let mut item = match &node.manifest {
        Some(Value::Object(manifest)) => manifest.clone(),
        _ => Map::new(),
    };
    item.remove("dependencies");

    if let Some(name) = node.package_name.as_ref().or(node.name.as_ref()) {
        item.insert("name".into(), Value::String(name.clone()));
    }
    if let Some(version) = &node.version {
        item.insert("version".into(), Value::String(version.clone()));
    }
    if let Some(resolved) = &node.resolved {
        item.insert("resolved".into(), Value::String(resolved.clone()));
    }
    if let Some(integrity) = &node.integrity {
        item.insert("integrity".into(), Value::String(integrity.clone()));
    }
    item.insert("_id".into(), Value::String(node.pkgid()));

    let mut declared = Map::new();
    for block in ["dependencies", "optionalDependencies"] {
        if let Some(Value::Object(deps)) = node.manifest_field(block) {
            declared.extend(deps.clone());
        }
    }
    item.insert("_dependencies".into(), Value::Object(declared));
    for block in ["devDependencies", "peerDependencies"] {
        let deps = node
            .manifest_field(block)
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        item.insert(block.into(), deps);
    }

    item.insert(
        "path".into(),
        Value::String(node.path.display().to_string()),
    );
    item.insert(
        "extraneous".into(),
        Value::Bool(node.flags.extraneous && !tree.global),
    );
    item.insert("dev".into(), Value::Bool(node.flags.dev));
    item.insert("optional".into(), Value::Bool(node.flags.optional));
    item.insert("peer".into(), Value::Bool(node.flags.peer));
    item
}

fn strings(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}

// ============================================================================
// Parseable
// ============================================================================

/// One line per displayed installed node, root first. Deduped references
/// and missing dependencies are omitted.
///
/// With `long`, lines read `path:name@version[:realpath][:EXTRANEOUS][:INVALID]`.
#[must_use]
pub fn render_parseable(tree: &PackageTree, view: &TreeView, options: RenderOptions) -> String {
    let mut out = String::new();
    for id in view.installed() {
        let node = tree.node(id);
        out.push_str(&node.path.display().to_string());
        if options.long {
            let _ = write!(out, ":{}", node.pkgid());
            if node.realpath != node.path && node.is_link {
                let _ = write!(out, ":{}", node.realpath.display());
            }
            if node.flags.extraneous && !tree.global {
                out.push_str(":EXTRANEOUS");
            }
            if node.flags.invalid {
                out.push_str(":INVALID");
            }
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// Tree
// ============================================================================

struct Glyphs {
    pipe: &'static str,
    tee: &'static str,
    corner: &'static str,
    dash: &'static str,
    fork: &'static str,
}

const UNICODE: Glyphs = Glyphs {
    pipe: "│",
    tee: "├",
    corner: "└",
    dash: "─",
    fork: "┬",
};

const ASCII: Glyphs = Glyphs {
    pipe: "|",
    tee: "+",
    corner: "`",
    dash: "-",
    fork: "-",
};

/// Human-readable tree, e.g.
///
/// ```text
/// app@1.0.0 /work/app
/// ├─┬ foo@1.0.0
/// │ └── bar@1.0.0
/// └── lorem@1.0.0
/// ```
#[must_use]
pub fn render_tree(tree: &PackageTree, view: &TreeView, options: RenderOptions) -> String {
    let glyphs = if options.unicode { &UNICODE } else { &ASCII };
    let root = tree.root();
    let mut out = String::new();

    let head = match (&root.manifest, root.package_name.as_ref().or(root.name.as_ref())) {
        (Some(_), Some(name)) => match &root.version {
            Some(version) => format!("{name}@{version} {}", root.path.display()),
            None => format!("{name} {}", root.path.display()),
        },
        _ => root.path.display().to_string(),
    };
    out.push_str(&head);
    out.push('\n');
    if options.long {
        let more = if view.children.is_empty() { " " } else { glyphs.pipe };
        let _ = writeln!(out, "{more} {}", description(root));
    }

    if view.children.is_empty() {
        let _ = writeln!(
            out,
            "{}{}{} (empty)",
            glyphs.corner, glyphs.dash, glyphs.dash
        );
        return out;
    }

    draw(&mut out, tree, &view.children, "", glyphs, options);
    out
}

fn draw(
    out: &mut String,
    tree: &PackageTree,
    children: &[ViewNode],
    prefix: &str,
    glyphs: &Glyphs,
    options: RenderOptions,
) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let more = !child.children.is_empty();

        let branch = if last { glyphs.corner } else { glyphs.tee };
        let mark = if more { glyphs.fork } else { glyphs.dash };
        let indent = if last { " " } else { glyphs.pipe };
        let continued = if more { glyphs.pipe } else { " " };

        let label = label(tree, child, options);
        let mut lines = label.lines();
        let first = lines.next().unwrap_or_default();
        let _ = writeln!(out, "{prefix}{branch}{}{mark} {first}", glyphs.dash);
        for line in lines {
            let _ = writeln!(out, "{prefix}{indent} {continued} {line}");
        }

        if more {
            let nested = format!("{prefix}{indent} ");
            draw(out, tree, &child.children, &nested, glyphs, options);
        }
    }
}

fn label(tree: &PackageTree, view: &ViewNode, options: RenderOptions) -> String {
    let ViewKind::Installed(id) = view.kind else {
        return missing_label(tree, view);
    };
    let node = tree.node(id);

    let mut label = printable(&view.name, node);
    if view.deduped {
        label.push_str(" deduped");
    }
    if let Some(invalid) = invalid_label(tree, view, node) {
        let _ = write!(label, " {invalid}");
    }
    if node.flags.extraneous && !tree.global {
        label.push_str(" extraneous");
    }
    if let Some(resolved) = node.resolved.as_deref().filter(|r| r.starts_with("git")) {
        let _ = write!(label, " ({resolved})");
    }
    if node.is_link {
        let _ = write!(label, " -> {}", link_target(tree, node));
    }
    if options.long {
        label.push('\n');
        label.push_str(description(node));
    }
    label
}

/// `name@version`, or `alias@npm:real@version` for aliased installs.
fn printable(name: &str, node: &PackageNode) -> String {
    match node.package_name.as_deref() {
        Some(real) if real != name && !node.is_link => {
            format!("{name}@npm:{real}@{}", node.version_str())
        }
        _ => format!("{name}@{}", node.version_str()),
    }
}

fn missing_label(tree: &PackageTree, view: &ViewNode) -> String {
    let Some(edge) = view.edge.map(|e| tree.edge(e)) else {
        return format!("UNMET DEPENDENCY {}", view.name);
    };
    let kind = match edge.dep_type {
        DepType::Peer | DepType::PeerOptional => "UNMET PEER DEPENDENCY",
        DepType::Optional => "UNMET OPTIONAL DEPENDENCY",
        _ => "UNMET DEPENDENCY",
    };
    format!("{kind} {}@{}", edge.name, edge.spec)
}

/// `invalid: "<spec>" from <requirer>` for the unsatisfied incoming edge.
fn invalid_label(tree: &PackageTree, view: &ViewNode, node: &PackageNode) -> Option<String> {
    if !node.flags.invalid {
        return None;
    }
    let unsatisfied = |edge: EdgeRef| !DepSpec::parse(&tree.edge(edge).spec).satisfied_by(node);

    let edge = view
        .edge
        .filter(|&e| unsatisfied(e))
        .or_else(|| node.edges_in.iter().copied().find(|&e| unsatisfied(e)))?;

    Some(format!(
        "invalid: \"{}\" from {}",
        tree.edge(edge).spec,
        tree.requirer_label(edge.from)
    ))
}

/// Link target relative to the project root, `./`-prefixed when inside it.
fn link_target(tree: &PackageTree, node: &PackageNode) -> String {
    let base = &tree.root().realpath;
    if !node.realpath.starts_with(base) {
        return node.realpath.display().to_string();
    }
    let relative = relative_path(base, &node.realpath)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("./{relative}")
}

fn description(node: &PackageNode) -> &str {
    node.manifest_field("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::filter::{build_view, FilterOptions};
    use crate::pkg::load::{load_tree, LoadOptions};
    use crate::pkg::problems::detect_problems;
    use crate::pkg::spec::FilterTerm;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn write_pkg(dir: &Path, json: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), json).unwrap();
    }

    fn simple(root_json: &str) -> TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write_pkg(root, root_json);
        write_pkg(
            &root.join("node_modules/foo"),
            r#"{"name":"foo","version":"1.0.0","dependencies":{"bar":"^1.0.0"}}"#,
        );
        write_pkg(&root.join("node_modules/bar"), r#"{"name":"bar","version":"1.0.0"}"#);
        write_pkg(
            &root.join("node_modules/lorem"),
            r#"{"name":"lorem","version":"1.0.0","description":"lorem ipsum"}"#,
        );
        dir
    }

    fn prepare(dir: &TempDir, options: &FilterOptions) -> (PackageTree, ProblemReport, TreeView) {
        let mut tree = load_tree(dir.path(), LoadOptions::default()).tree;
        let report = detect_problems(&mut tree);
        let view = build_view(&tree, options);
        (tree, report, view)
    }

    #[test]
    fn test_json_plain() {
        let dir = simple(
            r#"{"name":"test-npm-ls","version":"1.0.0","dependencies":{"foo":"^1.0.0","lorem":"^1.0.0"}}"#,
        );
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        let json = render_json(&tree, &view, &report, RenderOptions::default());

        assert_eq!(
            json,
            json!({
                "name": "test-npm-ls",
                "version": "1.0.0",
                "dependencies": {
                    "foo": { "version": "1.0.0", "dependencies": { "bar": { "version": "1.0.0" } } },
                    "lorem": { "version": "1.0.0" }
                }
            })
        );
    }

    #[test]
    fn test_json_problems() {
        let dir = simple(
            r#"{"name":"test-npm-ls","version":"1.0.0","dependencies":{"foo":"^2.0.0","ipsum":"^1.0.0"}}"#,
        );
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        let json = render_json(&tree, &view, &report, RenderOptions::default());

        let foo_path = dir.path().join("node_modules/foo");
        let lorem_path = dir.path().join("node_modules/lorem");
        let invalid = format!("invalid: foo@1.0.0 {}", foo_path.display());
        let missing = "missing: ipsum@^1.0.0, required by test-npm-ls@1.0.0";
        let extraneous = format!("extraneous: lorem@1.0.0 {}", lorem_path.display());

        assert_eq!(json["problems"], json!([invalid, missing, extraneous]));
        assert_eq!(json["dependencies"]["foo"]["invalid"], json!(true));
        assert_eq!(json["dependencies"]["foo"]["problems"], json!([invalid]));
        assert_eq!(json["dependencies"]["lorem"]["extraneous"], json!(true));
        assert_eq!(
            json["dependencies"]["ipsum"],
            json!({ "required": "^1.0.0", "missing": true, "problems": [missing] })
        );
    }

    #[test]
    fn test_json_missing_optional_is_empty_object() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","dependencies":{"foo":"^1.0.0","lorem":"^1.0.0"},"optionalDependencies":{"gone":"^1.0.0"}}"#,
        );
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        let json = render_json(&tree, &view, &report, RenderOptions::default());
        assert_eq!(json["dependencies"]["gone"], json!({}));
        assert!(!report.is_failure());
    }

    #[test]
    fn test_json_parse_failure_and_empty_location() {
        let dir = tempdir().unwrap();
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        assert_eq!(
            render_json(&tree, &view, &report, RenderOptions::default()),
            json!({})
        );

        fs::write(dir.path().join("package.json"), "{broken json").unwrap();
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        let json = render_json(&tree, &view, &report, RenderOptions::default());
        assert_eq!(json["invalid"], json!(true));
        let problem = json["problems"][0].as_str().unwrap();
        assert!(problem.ends_with("Failed to parse root package.json"));
    }

    #[test]
    fn test_json_long() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","dependencies":{"foo":"^1.0.0","lorem":"^1.0.0"}}"#,
        );
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        let json = render_json(
            &tree,
            &view,
            &report,
            RenderOptions {
                long: true,
                ..RenderOptions::default()
            },
        );

        assert_eq!(json["_id"], json!("r@1.0.0"));
        assert_eq!(json["extraneous"], json!(false));
        let lorem = &json["dependencies"]["lorem"];
        assert_eq!(lorem["description"], json!("lorem ipsum"));
        assert_eq!(lorem["_dependencies"], json!({}));
        assert_eq!(lorem["devDependencies"], json!({}));
        let foo = &json["dependencies"]["foo"];
        assert_eq!(foo["_dependencies"], json!({ "bar": "^1.0.0" }));
        assert_eq!(foo["dependencies"]["bar"]["name"], json!("bar"));
        assert_eq!(foo["dev"], json!(false));
        assert_eq!(foo["optional"], json!(false));
        assert!(foo.get("integrity").is_none());
    }

    #[test]
    fn test_json_long_flags_and_integrity() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write_pkg(
            root,
            r#"{"name":"r","version":"1.0.0","devDependencies":{"tool":"^1.0.0"},"optionalDependencies":{"maybe":"^1.0.0"}}"#,
        );
        write_pkg(
            &root.join("node_modules/tool"),
            r#"{"name":"tool","version":"1.0.0","_integrity":"sha512-tool"}"#,
        );
        write_pkg(&root.join("node_modules/maybe"), r#"{"name":"maybe","version":"1.0.0"}"#);
        let (tree, report, view) = prepare(&dir, &FilterOptions::default());
        let json = render_json(
            &tree,
            &view,
            &report,
            RenderOptions {
                long: true,
                ..RenderOptions::default()
            },
        );

        let tool = &json["dependencies"]["tool"];
        assert_eq!(tool["integrity"], json!("sha512-tool"));
        assert_eq!(tool["dev"], json!(true));
        assert_eq!(tool["optional"], json!(false));
        assert_eq!(tool["peer"], json!(false));
        let maybe = &json["dependencies"]["maybe"];
        assert_eq!(maybe["optional"], json!(true));
        assert_eq!(maybe["dev"], json!(false));
    }

    #[test]
    fn test_parseable() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","dependencies":{"foo":"^1.0.0"}}"#,
        );
        let (tree, _, view) = prepare(&dir, &FilterOptions::default());
        let root = dir.path();

        let plain = render_parseable(&tree, &view, RenderOptions::default());
        let expected: Vec<String> = [
            root.to_path_buf(),
            root.join("node_modules/foo"),
            root.join("node_modules/bar"),
            root.join("node_modules/lorem"),
        ]
        .iter()
        .map(|p| p.display().to_string())
        .collect();
        assert_eq!(plain.lines().collect::<Vec<_>>(), expected);

        let long = render_parseable(
            &tree,
            &view,
            RenderOptions {
                long: true,
                ..RenderOptions::default()
            },
        );
        let lorem = format!(
            "{}:lorem@1.0.0:EXTRANEOUS",
            root.join("node_modules/lorem").display()
        );
        assert!(long.lines().any(|l| l == lorem));
    }

    #[test]
    fn test_tree_unicode_and_ascii() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","dependencies":{"foo":"^1.0.0","lorem":"^1.0.0"}}"#,
        );
        let (tree, _, view) = prepare(&dir, &FilterOptions::default());
        let head = format!("r@1.0.0 {}", dir.path().display());

        let unicode = render_tree(
            &tree,
            &view,
            RenderOptions {
                unicode: true,
                ..RenderOptions::default()
            },
        );
        assert_eq!(
            unicode,
            format!("{head}\n├─┬ foo@1.0.0\n│ └── bar@1.0.0\n└── lorem@1.0.0\n")
        );

        let ascii = render_tree(&tree, &view, RenderOptions::default());
        assert_eq!(
            ascii,
            format!("{head}\n+-- foo@1.0.0\n| `-- bar@1.0.0\n`-- lorem@1.0.0\n")
        );
    }

    #[test]
    fn test_tree_labels() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","dependencies":{"foo":"^2.0.0","ipsum":"^1.0.0"},"optionalDependencies":{"maybe":"^1.0.0"}}"#,
        );
        let (tree, _, view) = prepare(&dir, &FilterOptions::default());
        let out = render_tree(
            &tree,
            &view,
            RenderOptions {
                unicode: true,
                ..RenderOptions::default()
            },
        );

        assert!(out.contains(r#"foo@1.0.0 invalid: "^2.0.0" from the root project"#));
        assert!(out.contains("UNMET DEPENDENCY ipsum@^1.0.0"));
        assert!(out.contains("UNMET OPTIONAL DEPENDENCY maybe@^1.0.0"));
        assert!(out.contains("lorem@1.0.0 extraneous"));
    }

    #[test]
    fn test_tree_deduped_and_empty() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","dependencies":{"foo":"^1.0.0","bar":"^1.0.0","lorem":"^1.0.0"}}"#,
        );
        let (tree, _, view) = prepare(&dir, &FilterOptions::default());
        let out = render_tree(&tree, &view, RenderOptions::default());
        assert!(out.contains("`-- bar@1.0.0 deduped"));

        let (tree, _, view) = prepare(
            &dir,
            &FilterOptions {
                terms: vec![FilterTerm::parse("notadep").unwrap()],
                ..FilterOptions::default()
            },
        );
        let out = render_tree(&tree, &view, RenderOptions::default());
        assert!(out.ends_with("`-- (empty)\n"));
    }

    #[test]
    fn test_tree_long_descriptions() {
        let dir = simple(
            r#"{"name":"r","version":"1.0.0","description":"root desc","dependencies":{"lorem":"^1.0.0"}}"#,
        );
        let (tree, _, view) = prepare(
            &dir,
            &FilterOptions {
                depth: Some(0),
                ..FilterOptions::default()
            },
        );
        let out = render_tree(
            &tree,
            &view,
            RenderOptions {
                long: true,
                unicode: true,
            },
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "│ root desc");
        assert!(lines.iter().any(|l| l.ends_with("lorem@1.0.0")));
        assert!(lines.iter().any(|l| l.ends_with("lorem ipsum")));
    }
}
