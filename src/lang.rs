//! Folds a tree-sitter Java parse tree into the semistructured node tree
//! that the merge engine operates on.
//!
//! The granularity is declarative: type declarations become non-terminals
//! (with synthetic header and footer leaves carrying the surrounding
//! syntax), while methods, constructors, fields and initializer blocks
//! become terminals whose name is their signature. Comments are bundled
//! into the special-token prefix of the declaration they precede.

use log::warn;
use tree_sitter::Node as TsNode;

use crate::{
    error::MergeError,
    revision::Revision,
    textual::normalize_ws,
    tree::{MergingMechanism, NodeArena, NodeId},
};

/// Category tags of the nodes produced by this adapter.
pub mod node_type {
    pub const COMPILATION_UNIT: &str = "CompilationUnit";
    pub const PACKAGE: &str = "PackageDecl";
    pub const IMPORT: &str = "ImportDecl";
    pub const CLASS: &str = "ClassDecl";
    pub const CLASS_HEADER: &str = "ClassHeader";
    pub const CLASS_FOOTER: &str = "ClassFooter";
    pub const METHOD: &str = "MethodDecl";
    pub const CONSTRUCTOR: &str = "ConstructorDecl";
    pub const FIELD: &str = "FieldDecl";
    pub const INIT_BLOCK: &str = "InitializerBlock";
    pub const TYPE: &str = "TypeDecl";
    pub const DECLARATION: &str = "Declaration";
}

/// Parses Java source into a node tree, stamping every node with the
/// revision it comes from.
pub fn parse(
    contents: &str,
    revision: Revision,
    arena: &mut NodeArena,
) -> Result<NodeId, MergeError> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_java_orchard::LANGUAGE.into())
        .map_err(|err| MergeError::Parse(format!("error loading Java grammar: {err}")))?;
    let tree = parser
        .parse(contents, None)
        .ok_or_else(|| MergeError::Parse("the Java parser returned no tree".to_owned()))?;
    let root = tree.root_node();
    if root.has_error() {
        let range = find_error(root).map_or_else(|| root.byte_range(), |node| node.byte_range());
        return Err(MergeError::Parse(format!(
            "syntax error at bytes {}..{}, starting with: {}",
            range.start,
            range.end,
            contents[range.start..].chars().take(32).collect::<String>()
        )));
    }

    let unit = arena.new_non_terminal(node_type::COMPILATION_UNIT, "", Some(revision));
    let mut builder = Builder {
        contents,
        revision,
        arena,
    };
    let trailing = builder.fold_members(root, unit);
    if !trailing.is_empty() {
        // keep comments trailing the last declaration as an opaque leaf
        let name = normalize_ws(&trailing);
        builder.terminal(unit, node_type::DECLARATION, name, trailing, String::new());
    }
    Ok(unit)
}

fn find_error(node: TsNode) -> Option<TsNode> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(find_error)
}

struct Builder<'a> {
    contents: &'a str,
    revision: Revision,
    arena: &'a mut NodeArena,
}

impl Builder<'_> {
    fn text(&self, node: TsNode) -> &str {
        &self.contents[node.byte_range()]
    }

    /// The whitespace between the start of the node's first line and the
    /// node itself, used to strip inherited indentation from bodies.
    fn line_indentation(&self, node: TsNode) -> &str {
        let start = node.start_byte();
        let line_start = self.contents[..start].rfind('\n').map_or(0, |idx| idx + 1);
        let prefix = &self.contents[line_start..start];
        if prefix.trim().is_empty() { prefix } else { "" }
    }

    fn dedented(&self, node: TsNode) -> String {
        let indentation = self.line_indentation(node);
        if indentation.is_empty() {
            self.text(node).to_owned()
        } else {
            self.text(node).replace(&format!("\n{indentation}"), "\n")
        }
    }

    fn terminal(
        &mut self,
        parent: NodeId,
        node_type: &'static str,
        name: String,
        body: String,
        prefix: String,
    ) {
        let id = self.arena.new_terminal(
            node_type,
            name,
            body,
            prefix,
            MergingMechanism::ConflictMerge,
            Some(self.revision),
        );
        self.arena.attach_child(parent, id);
    }

    /// Folds the members of a program or of a type body into children of
    /// `parent`, bundling comments into the prefix of what follows them.
    /// Returns any comments trailing the last member, for the caller to
    /// attach to the closing leaf.
    fn fold_members(&mut self, container: TsNode, parent: NodeId) -> String {
        let mut cursor = container.walk();
        let children: Vec<_> = container.children(&mut cursor).collect();
        let mut pending_comments: Vec<String> = Vec::new();
        for child in children {
            match child.kind() {
                "line_comment" | "block_comment" => {
                    pending_comments.push(self.dedented(child));
                    continue;
                }
                "{" | "}" | ";" => continue,
                _ => {}
            }
            let prefix = pending_comments.join("\n");
            pending_comments.clear();
            self.fold_declaration(child, parent, prefix);
        }
        pending_comments.join("\n")
    }

    fn fold_declaration(&mut self, node: TsNode, parent: NodeId, prefix: String) {
        match node.kind() {
            "package_declaration" => {
                self.terminal(
                    parent,
                    node_type::PACKAGE,
                    "package".to_owned(),
                    self.text(node).to_owned(),
                    prefix,
                );
            }
            "import_declaration" => {
                let body = self.text(node).to_owned();
                self.terminal(parent, node_type::IMPORT, normalize_ws(&body), body, prefix);
            }
            "class_declaration" | "interface_declaration" => {
                self.fold_container(node, parent, prefix);
            }
            "enum_declaration" | "record_declaration" | "annotation_type_declaration" => {
                let name = self.declared_name(node);
                self.terminal(parent, node_type::TYPE, name, self.dedented(node), prefix);
            }
            "method_declaration" => {
                let signature = self.signature(node);
                self.terminal(parent, node_type::METHOD, signature, self.dedented(node), prefix);
            }
            "constructor_declaration" | "compact_constructor_declaration" => {
                let signature = self.signature(node);
                self.terminal(
                    parent,
                    node_type::CONSTRUCTOR,
                    signature,
                    self.dedented(node),
                    prefix,
                );
            }
            "field_declaration" | "constant_declaration" => {
                let name = self.field_names(node);
                self.terminal(parent, node_type::FIELD, name, self.dedented(node), prefix);
            }
            "static_initializer" | "block" => {
                self.terminal(
                    parent,
                    node_type::INIT_BLOCK,
                    String::new(),
                    self.dedented(node),
                    prefix,
                );
            }
            other => {
                // unknown member shapes are kept as opaque leaves so that
                // the merge can still carry them through
                warn!("unrecognized declaration kind `{other}`, keeping it as an opaque leaf");
                let body = self.dedented(node);
                self.terminal(
                    parent,
                    node_type::DECLARATION,
                    normalize_ws(&body),
                    body,
                    prefix,
                );
            }
        }
    }

    /// A class or interface becomes a non-terminal bracketed by synthetic
    /// header and footer leaves, so that serialization is a plain traversal
    /// and header edits (modifiers, extends, implements) merge textually.
    fn fold_container(&mut self, node: TsNode, parent: NodeId, prefix: String) {
        let name = self.declared_name(node);
        let Some(body) = node.child_by_field_name("body") else {
            // a bodyless type (e.g. truncated by the grammar) degrades to a leaf
            self.terminal(parent, node_type::TYPE, name, self.dedented(node), prefix);
            return;
        };
        let container = self
            .arena
            .new_non_terminal(node_type::CLASS, name.clone(), Some(self.revision));
        self.arena.attach_child(parent, container);

        let indentation = self.line_indentation(node);
        let header_src = &self.contents[node.start_byte()..=body.start_byte()];
        let header = if indentation.is_empty() {
            header_src.to_owned()
        } else {
            header_src.replace(&format!("\n{indentation}"), "\n")
        };
        self.terminal(container, node_type::CLASS_HEADER, name.clone(), header, prefix);
        let trailing = self.fold_members(body, container);
        self.terminal(
            container,
            node_type::CLASS_FOOTER,
            name,
            "}".to_owned(),
            trailing,
        );
    }

    fn declared_name(&self, node: TsNode) -> String {
        node.child_by_field_name("name")
            .map_or_else(|| normalize_ws(self.text(node)), |name| self.text(name).to_owned())
    }

    /// Signature of a method or constructor: its name followed by the
    /// comma-separated parameter types, which identifies the declaration
    /// across revisions regardless of parameter names.
    fn signature(&self, node: TsNode) -> String {
        let name = self.declared_name(node);
        let Some(parameters) = node.child_by_field_name("parameters") else {
            return format!("{name}()");
        };
        let mut cursor = parameters.walk();
        let types: Vec<String> = parameters
            .named_children(&mut cursor)
            .filter_map(|parameter| match parameter.kind() {
                "formal_parameter" => parameter
                    .child_by_field_name("type")
                    .map(|ty| normalize_ws(self.text(ty))),
                "spread_parameter" => parameter
                    .named_child(0)
                    .map(|ty| format!("{}...", normalize_ws(self.text(ty)))),
                "receiver_parameter" => None,
                _ => None,
            })
            .collect();
        format!("{name}({})", types.join(", "))
    }

    /// Identity of a field declaration: the declared variable names.
    fn field_names(&self, node: TsNode) -> String {
        let mut cursor = node.walk();
        let names: Vec<&str> = node
            .children_by_field_name("declarator", &mut cursor)
            .filter_map(|declarator| declarator.child_by_field_name("name"))
            .map(|name| self.text(name))
            .collect();
        if names.is_empty() {
            normalize_ws(self.text(node))
        } else {
            names.join(",")
        }
    }
}
