//! Template compilation and the compiled form.
//!
//! A [`Template`] is the reusable output of compiling source text: an
//! ordered list of [`Node`]s plus a name table of sub-templates declared
//! directly inside it. The name table is lexical by construction — it holds
//! only the sub-templates opened and closed at this template's own nesting
//! level, never an ancestor's or descendant's.
//!
//! Source markup:
//!
//! ```text
//! %-- comment --%
//! {{field}}  {{field>sub>sub}}
//! ##language-entry##
//! &&reference&&   @@loop@@   ??condition??   !!dump!!
//! [[name]] nested code [[]]
//! ```
//!
//! Compilation is a pure function of the source text; the compiled value is
//! immutable and may be shared across concurrent renders.

mod compile;
mod render;

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::CompileError;

/// One compiled unit of template behavior.
///
/// Each variant carries the raw text captured by the lexer; element specs
/// (`a:b:c`) are interpreted at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Verbatim text between markup spans.
    Literal(String),
    /// `%-- ... --%`, kept for introspection, never rendered.
    Comment(String),
    /// `##key##` language table lookup.
    LanguageRef(String),
    /// `&&name&&`, `&&name:field&&` or `&&:field:prefix&&`.
    Reference(String),
    /// `@@key@@` or `@@key:template@@`.
    Loop(String),
    /// `??key??` or `??key:template??`.
    Condition(String),
    /// `!!dump!!` / `!!list!!`.
    Debug(String),
    /// `{{path}}` scope lookup.
    Variable(String),
}

/// A compiled template: ordered nodes plus a lexical sub-template table.
///
/// Sub-templates are shared (`Arc`), so pipe aliases from `[[a|b]]` point to
/// the same compiled object, and cloning a template re-shares its table.
#[derive(Debug, Clone, Default)]
pub struct Template {
    name: String,
    nodes: Option<Vec<Node>>,
    subs: FxHashMap<String, Arc<Template>>,
}

impl Template {
    /// Create an empty, uncompiled template. Rendering it yields a fixed
    /// diagnostic string rather than panicking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile source text.
    ///
    /// Fails only on unbalanced `[[name]]` / `[[]]` markers; everything else
    /// the lexer does not recognize stays literal text.
    pub fn compile(source: &str) -> Result<Template, CompileError> {
        compile::structure(compile::scan(source))
    }

    /// Load and compile a template file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Template, CompileError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .map_err(|e| CompileError::Io(path.to_path_buf(), e))?;
        Self::compile(&source)
    }

    /// The name this template was declared under (empty for a root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compiled nodes, in order. `None` for an uncompiled template.
    pub fn nodes(&self) -> Option<&[Node]> {
        self.nodes.as_deref()
    }

    /// Register `template` under `name`, replacing any previous entry.
    pub fn add_template(&mut self, name: impl Into<String>, template: Template) {
        self.subs.insert(name.into(), Arc::new(template));
    }

    /// Look up a sub-template declared directly inside this template.
    pub fn get_template(&self, name: &str) -> Option<&Arc<Template>> {
        self.subs.get(name)
    }

    /// Names in this template's table, sorted.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.subs.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Display for Template {
    /// Deterministic structural summary for diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template{{")?;
        match &self.nodes {
            Some(nodes) => {
                let parts: Vec<String> = nodes.iter().map(|n| format!("{n:?}")).collect();
                write!(f, "{}", parts.join(" "))?;
            }
            None => write!(f, "<uncompiled>")?,
        }
        let names = self.template_names();
        if !names.is_empty() {
            write!(f, " subs=[{}]", names.join(" "))?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // Compilation structure
    // ------------------------------------------------------------------------

    #[test]
    fn test_compile_plain_text_single_literal() {
        let tmpl = Template::compile("no markup at all").unwrap();
        assert_eq!(
            tmpl.nodes().unwrap(),
            &[Node::Literal("no markup at all".into())]
        );
    }

    #[test]
    fn test_compile_all_node_kinds() {
        let tmpl =
            Template::compile("a%--c--%b##l##&&r&&@@o@@??i??!!dump!!{{v}}").unwrap();
        assert_eq!(
            tmpl.nodes().unwrap(),
            &[
                Node::Literal("a".into()),
                Node::Comment("c".into()),
                Node::Literal("b".into()),
                Node::LanguageRef("l".into()),
                Node::Reference("r".into()),
                Node::Loop("o".into()),
                Node::Condition("i".into()),
                Node::Debug("dump".into()),
                Node::Variable("v".into()),
            ]
        );
    }

    #[test]
    fn test_comment_consumes_one_trailing_newline() {
        let tmpl = Template::compile("a%--c--%\n\nb").unwrap();
        assert_eq!(
            tmpl.nodes().unwrap(),
            &[
                Node::Literal("a".into()),
                Node::Comment("c".into()),
                Node::Literal("\nb".into()),
            ]
        );
    }

    #[test]
    fn test_comment_spans_lines_and_markup() {
        // markup inside a comment is swallowed by the comment
        let tmpl = Template::compile("a%--x\n@@loop@@\ny--%b").unwrap();
        assert_eq!(
            tmpl.nodes().unwrap(),
            &[
                Node::Literal("a".into()),
                Node::Comment("x\n@@loop@@\ny".into()),
                Node::Literal("b".into()),
            ]
        );
    }

    #[test]
    fn test_subtemplate_registered_lexically() {
        let tmpl = Template::compile("body&&one&&[[one]]inner {{x}}[[]]tail").unwrap();
        // the sub-template's content is removed from the enclosing node list
        assert_eq!(
            tmpl.nodes().unwrap(),
            &[
                Node::Literal("body".into()),
                Node::Reference("one".into()),
                Node::Literal("tail".into()),
            ]
        );
        let one = tmpl.get_template("one").unwrap();
        assert_eq!(one.name(), "one");
        assert_eq!(
            one.nodes().unwrap(),
            &[Node::Literal("inner ".into()), Node::Variable("x".into())]
        );
    }

    #[test]
    fn test_nested_subtemplates_stay_at_their_level() {
        let tmpl = Template::compile("[[outer]]x[[inner]]y[[]]z[[]]").unwrap();
        let outer = tmpl.get_template("outer").unwrap();
        // inner is visible from outer, not from the root
        assert!(outer.get_template("inner").is_some());
        assert!(tmpl.get_template("inner").is_none());
        assert!(outer.get_template("outer").is_none());
    }

    #[test]
    fn test_pipe_aliases_share_one_object() {
        let tmpl = Template::compile("[[a|b|c]]shared[[]]").unwrap();
        let a = tmpl.get_template("a").unwrap();
        let b = tmpl.get_template("b").unwrap();
        let c = tmpl.get_template("c").unwrap();
        assert!(Arc::ptr_eq(a, b));
        assert!(Arc::ptr_eq(b, c));
    }

    #[test]
    fn test_empty_pipe_alias_ignored() {
        let tmpl = Template::compile("[[a||b]]shared[[]]").unwrap();
        assert_eq!(tmpl.template_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_same_name_overwrites_at_same_level() {
        let tmpl = Template::compile("[[x]]first[[]][[x]]second[[]]").unwrap();
        let x = tmpl.get_template("x").unwrap();
        assert_eq!(x.nodes().unwrap(), &[Node::Literal("second".into())]);
    }

    #[test]
    fn test_open_tag_consumes_trailing_newline() {
        let tmpl = Template::compile("[[x]]\nbody\n[[]]\nafter").unwrap();
        let x = tmpl.get_template("x").unwrap();
        assert_eq!(x.nodes().unwrap(), &[Node::Literal("body\n".into())]);
        assert_eq!(tmpl.nodes().unwrap(), &[Node::Literal("after".into())]);
    }

    // ------------------------------------------------------------------------
    // Compile failures
    // ------------------------------------------------------------------------

    #[test]
    fn test_unclosed_open_is_an_error() {
        let err = Template::compile("[[x]]").unwrap_err();
        assert!(matches!(err, CompileError::Unclosed(1)));
    }

    #[test]
    fn test_extra_close_is_an_error() {
        let err = Template::compile("text[[]]").unwrap_err();
        assert!(matches!(err, CompileError::UnexpectedClose));
    }

    #[test]
    fn test_nested_unclosed_counts_open_frames() {
        let err = Template::compile("[[a]][[b]]body[[]]").unwrap_err();
        assert!(matches!(err, CompileError::Unclosed(1)));
    }

    // ------------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------------

    #[test]
    fn test_add_template_by_hand() {
        let mut root = Template::compile("&&hello&&").unwrap();
        let sub = Template::compile("hi there").unwrap();
        root.add_template("hello", sub);
        assert_eq!(root.execute(None), "hi there");
    }

    #[test]
    fn test_clone_renders_identically() {
        let tmpl =
            Template::compile("Hi {{name}}! @@pets:pet@@[[pet]]- {{name}}[[]]").unwrap();
        let copy = tmpl.clone();
        let data = crate::Dataset::new();
        data.set("name", "Al");
        assert_eq!(tmpl.execute(Some(&data)), copy.execute(Some(&data)));
    }

    #[test]
    fn test_display_is_deterministic() {
        let tmpl = Template::compile("[[b]]x[[]][[a]]y[[]]text").unwrap();
        let first = tmpl.to_string();
        assert_eq!(first, tmpl.to_string());
        assert!(first.contains("subs=[a b]"));
    }
}
