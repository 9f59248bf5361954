//! Source scanning and the structural pass.
//!
//! Compilation is two passes. `scan` locates every markup span in one
//! left-to-right regex sweep, turning the source into a flat token list
//! (text between matches becomes literals, verbatim). `structure` then folds
//! `[[name]]` / `[[]]` pairs with a frame stack, producing the nested
//! [`Template`] tree and registering each sealed sub-template in its
//! enclosing frame's name table.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use super::{Node, Template};
use crate::error::CompileError;

/// All markup constructs, mutually exclusive, leftmost-first.
///
/// The element alternatives (`&&`, `@@`, `??`, `!!`, `{{`) share one
/// character class; comments span lines (`(?s)`) and comments, open tags and
/// close tags each swallow one trailing line break.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)",
        r"%--(?P<comment>.*?)--%(?:\r\n|\n\r|\n|\r)?",
        r"|##(?P<lang>[a-zA-Z0-9_.-]+?)##",
        r"|&&(?P<refer>[a-zA-Z0-9_=>:|.-]+?)&&",
        r"|@@(?P<loop>[a-zA-Z0-9_=>:|.-]+?)@@",
        r"|\?\?(?P<cond>[a-zA-Z0-9_=>:|.-]+?)\?\?",
        r"|!!(?P<debug>[a-zA-Z0-9_=>:|.-]+?)!!",
        r"|\{\{(?P<var>[a-zA-Z0-9_=>:|.-]+?)\}\}",
        r"|\[\[(?P<close>\])\](?:\r\n|\n\r|\n|\r)?",
        r"|\[\[(?P<open>[a-z0-9|._-]+?)\]\](?:\r\n|\n\r|\n|\r)?",
    ))
    .expect("markup pattern is valid")
});

/// Flat lexer output: compiled nodes plus the two structural markers.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Token {
    Node(Node),
    Open(String),
    Close,
}

/// Locate all markup spans; text between matches becomes literal nodes.
pub(super) fn scan(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in MARKUP.captures_iter(source) {
        let span = caps.get(0).expect("group 0 always participates");
        if span.start() > cursor {
            tokens.push(Token::Node(Node::Literal(
                source[cursor..span.start()].to_owned(),
            )));
        }

        let text = |name: &str| caps.name(name).map(|m| m.as_str().to_owned());
        let token = if let Some(data) = text("comment") {
            Token::Node(Node::Comment(data))
        } else if let Some(data) = text("lang") {
            Token::Node(Node::LanguageRef(data))
        } else if let Some(data) = text("refer") {
            Token::Node(Node::Reference(data))
        } else if let Some(data) = text("loop") {
            Token::Node(Node::Loop(data))
        } else if let Some(data) = text("cond") {
            Token::Node(Node::Condition(data))
        } else if let Some(data) = text("debug") {
            Token::Node(Node::Debug(data))
        } else if let Some(data) = text("var") {
            Token::Node(Node::Variable(data))
        } else if let Some(name) = text("open") {
            Token::Open(name)
        } else {
            Token::Close
        };
        tokens.push(token);
        cursor = span.end();
    }

    if cursor < source.len() {
        tokens.push(Token::Node(Node::Literal(source[cursor..].to_owned())));
    }
    tokens
}

/// An in-progress template while its span is still open.
struct Frame {
    name: String,
    nodes: Vec<Node>,
    subs: FxHashMap<String, Arc<Template>>,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            nodes: Vec::new(),
            subs: FxHashMap::default(),
        }
    }

    fn seal(self) -> Template {
        Template {
            name: self.name,
            nodes: Some(self.nodes),
            subs: self.subs,
        }
    }
}

/// Fold the flat token list into a template tree.
///
/// An open tag suspends the current frame; a close tag seals the top frame
/// and registers it in the enclosing one — once per `|` alias, all aliases
/// sharing the same compiled object, later declarations overwriting earlier
/// ones of the same name at the same level.
pub(super) fn structure(tokens: Vec<Token>) -> Result<Template, CompileError> {
    let mut current = Frame::new(String::new());
    let mut suspended: Vec<Frame> = Vec::new();

    for token in tokens {
        match token {
            Token::Node(node) => current.nodes.push(node),
            Token::Open(name) => {
                suspended.push(current);
                current = Frame::new(name);
            }
            Token::Close => {
                let Some(mut parent) = suspended.pop() else {
                    return Err(CompileError::UnexpectedClose);
                };
                let name = current.name.clone();
                let sealed = Arc::new(current.seal());
                if name.contains('|') {
                    for alias in name.split('|').filter(|a| !a.is_empty()) {
                        parent.subs.insert(alias.to_owned(), Arc::clone(&sealed));
                    }
                } else {
                    parent.subs.insert(name, sealed);
                }
                current = parent;
            }
        }
    }

    if !suspended.is_empty() {
        return Err(CompileError::Unclosed(suspended.len()));
    }
    Ok(current.seal())
}
