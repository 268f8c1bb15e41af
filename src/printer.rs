//! Serializes a node tree back to source text with canonical indentation.
//!
//! Bodies are stored dedented, so printing re-indents them by nesting
//! depth. Conflict marker lines are kept at the start of the line so that
//! standard conflict-resolution tooling recognizes them.

use itertools::Itertools;

use crate::{
    lang::node_type,
    settings::MergeSettings,
    tree::{NodeArena, NodeId},
};

const INDENT: &str = "    ";

/// Pretty-prints the tree rooted at `root`.
pub fn print(arena: &NodeArena, root: NodeId, settings: &MergeSettings) -> String {
    let mut output = print_node(arena, root, 0, settings);
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

fn print_node(arena: &NodeArena, id: NodeId, depth: usize, settings: &MergeSettings) -> String {
    let node = arena.node(id);
    if node.is_terminal() {
        return print_terminal(arena, id, depth, settings);
    }
    match node.node_type {
        node_type::CLASS => print_class(arena, id, depth, settings),
        _ => print_unit(arena, id, depth, settings),
    }
}

/// A compilation unit: package and import leaves on consecutive lines,
/// other declarations separated by a blank line.
fn print_unit(arena: &NodeArena, id: NodeId, depth: usize, settings: &MergeSettings) -> String {
    let mut output = String::new();
    let mut previous: Option<&'static str> = None;
    for child in arena.node(id).children() {
        let block = print_node(arena, *child, depth, settings);
        if block.is_empty() {
            continue;
        }
        let child_type = arena.node(*child).node_type;
        if let Some(previous) = previous {
            let tight = previous == node_type::IMPORT && child_type == node_type::IMPORT;
            output.push_str(if tight { "\n" } else { "\n\n" });
        }
        output.push_str(&block);
        previous = Some(child_type);
    }
    output
}

/// A class or interface: header leaf, members indented one level deeper and
/// separated by blank lines, footer leaf.
fn print_class(arena: &NodeArena, id: NodeId, depth: usize, settings: &MergeSettings) -> String {
    let children = arena.node(id).children();
    let mut header = String::new();
    let mut footer = String::new();
    let mut members: Vec<String> = Vec::new();
    for child in children {
        let block = match arena.node(*child).node_type {
            node_type::CLASS_HEADER => {
                header = print_terminal(arena, *child, depth, settings);
                continue;
            }
            node_type::CLASS_FOOTER => {
                footer = print_terminal(arena, *child, depth, settings);
                continue;
            }
            _ => print_node(arena, *child, depth + 1, settings),
        };
        if !block.is_empty() {
            members.push(block);
        }
    }
    let mut output = header;
    if !members.is_empty() {
        output.push('\n');
        output.push_str(&members.iter().join("\n\n"));
    }
    if !footer.is_empty() {
        output.push('\n');
        output.push_str(&footer);
    }
    output
}

fn print_terminal(arena: &NodeArena, id: NodeId, depth: usize, settings: &MergeSettings) -> String {
    let node = arena.node(id);
    if node.body().is_empty() && node.prefix().is_empty() {
        // a leaf emptied by the merge disappears from the output
        return String::new();
    }
    let indentation = INDENT.repeat(depth);
    let mut lines: Vec<&str> = Vec::new();
    if !node.prefix().is_empty() {
        lines.extend(node.prefix().lines());
    }
    if !node.body().is_empty() {
        lines.extend(node.body().lines());
    }
    lines
        .iter()
        .map(|line| reindent_line(line, &indentation, settings))
        .join("\n")
}

fn reindent_line(line: &str, indentation: &str, settings: &MergeSettings) -> String {
    if line.is_empty() || is_conflict_marker(line, settings) {
        line.to_owned()
    } else {
        format!("{indentation}{line}")
    }
}

fn is_conflict_marker(line: &str, settings: &MergeSettings) -> bool {
    let size = settings.conflict_marker_size;
    ['<', '|', '=', '>']
        .iter()
        .any(|marker| line.chars().take_while(|c| c == marker).count() == size)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{lang, revision::Revision};

    fn roundtrip(source: &str) -> String {
        let mut arena = NodeArena::new();
        let root = lang::parse(source, Revision::Base, &mut arena).expect("syntax error");
        print(&arena, root, &MergeSettings::default())
    }

    #[test]
    fn canonical_class_layout() {
        let source = "\
package com.example;

import java.util.List;
import java.util.Map;

public class A {
    int k = 0;

    // entry point
    void m() {
        x();
    }
}
";
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn nested_classes_are_reindented() {
        let source = "\
class Outer {
    class Inner {
        int j;
    }
}
";
        assert_eq!(roundtrip(source), source);
    }

    #[test]
    fn conflict_markers_stay_at_column_zero() {
        let settings = MergeSettings::default();
        let mut arena = NodeArena::new();
        let class = arena.new_non_terminal(node_type::CLASS, "A", Some(Revision::Base));
        let header = arena.new_terminal(
            node_type::CLASS_HEADER,
            "A",
            "class A {",
            "",
            Default::default(),
            Some(Revision::Base),
        );
        let method = arena.new_terminal(
            node_type::METHOD,
            "m()",
            "<<<<<<< MINE\nvoid m() { a(); }\n=======\nvoid m() { b(); }\n>>>>>>> YOURS",
            "",
            Default::default(),
            Some(Revision::Base),
        );
        let footer = arena.new_terminal(
            node_type::CLASS_FOOTER,
            "A",
            "}",
            "",
            Default::default(),
            Some(Revision::Base),
        );
        arena.attach_child(class, header);
        arena.attach_child(class, method);
        arena.attach_child(class, footer);

        let printed = print(&arena, class, &settings);
        assert_eq!(
            printed,
            "class A {\n<<<<<<< MINE\n    void m() { a(); }\n=======\n    void m() { b(); }\n>>>>>>> YOURS\n}\n"
        );
    }

    #[test]
    fn emptied_leaves_disappear() {
        let settings = MergeSettings::default();
        let mut arena = NodeArena::new();
        let unit = arena.new_non_terminal(node_type::COMPILATION_UNIT, "", Some(Revision::Base));
        let gone = arena.new_terminal(
            node_type::METHOD,
            "m()",
            "",
            "",
            Default::default(),
            Some(Revision::Base),
        );
        arena.attach_child(unit, gone);
        assert_eq!(print(&arena, unit, &settings), "");
    }
}
