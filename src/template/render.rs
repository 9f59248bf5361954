//! Scope-aware rendering of compiled templates.
//!
//! Rendering is a total function: it never fails, and every unresolved
//! lookup (missing key, wrong kind, missing sub-template, absent language
//! table) contributes an empty string or a documented fallback template
//! choice. Templates are authored independently of the code supplying data,
//! so incomplete data must never abort output generation.
//!
//! Data scope is dynamic: a [`DatasetCollection`] used as a stack, searched
//! innermost-first. Template-name scope is lexical: sub-template lookups
//! always hit the *current* template's own name table. The two axes are
//! independent.

use std::sync::Arc;

use super::{Node, Template};
use crate::dataset::{Dataset, DatasetCollection};
use crate::value::{Lexicon, OpaqueValue, Value};

/// Rendered in place of a template whose body was never compiled.
const UNCOMPILED_MARKER: &str = "[template was not compiled]";

/// Reserved root key where the language table is looked up.
const LANGUAGE_KEY: &str = "#";

/// Counter key written onto each loop element, 1-based.
const COUNTER_KEY: &str = ".counter";

impl Template {
    /// Render this template against `data`.
    ///
    /// If `data` holds an opaque value at the reserved `"#"` key that
    /// exposes the [`Lexicon`] capability, it is captured once here and used
    /// for every `##key##` in the whole render. The scope stack starts with
    /// `data` alone at index 0.
    ///
    /// Side effect: loop evaluation writes a 1-based `".counter"` key onto
    /// each iterated element of the caller's data. Renders sharing a data
    /// graph are therefore racy; concurrent renders of the same (immutable)
    /// template must each own their data.
    pub fn execute(&self, data: Option<&Dataset>) -> String {
        match data {
            Some(root) => {
                let holder: Option<Arc<dyn OpaqueValue>> =
                    root.get(LANGUAGE_KEY).and_then(|v| v.as_opaque());
                let lexicon = holder.as_deref().and_then(OpaqueValue::as_lexicon);
                let scopes = DatasetCollection::new();
                scopes.push(root.clone());
                self.render(Some(&scopes), lexicon)
            }
            None => self.render(None, None),
        }
    }

    fn render(
        &self,
        scopes: Option<&DatasetCollection>,
        lexicon: Option<&dyn Lexicon>,
    ) -> String {
        let Some(nodes) = &self.nodes else {
            return UNCOMPILED_MARKER.to_owned();
        };

        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Literal(text) => out.push_str(text),
                Node::Comment(_) => {}
                Node::Variable(path) => {
                    if let Some(scopes) = scopes
                        && let Some(value) = scopes.get_data_string(path)
                    {
                        out.push_str(&value);
                    }
                }
                Node::LanguageRef(key) => {
                    if let Some(lexicon) = lexicon {
                        out.push_str(&lexicon.get(key));
                    }
                }
                Node::Reference(spec) => self.render_reference(spec, scopes, lexicon, &mut out),
                Node::Loop(spec) => self.render_loop(spec, scopes, lexicon, &mut out),
                Node::Condition(spec) => self.render_condition(spec, scopes, lexicon, &mut out),
                Node::Debug(mode) => render_debug(mode, scopes, &mut out),
            }
        }
        out
    }

    /// `&&name&&` renders a sub-template in place. `&&name:field&&`
    /// additionally pushes `field` as the top scope when it resolves to a
    /// dataset. `&&:field:prefix&&` selects the sub-template named
    /// `prefix` + formatted value of `field`, falling back to the literal
    /// `prefix` name (not `prefix.none`) when that one is absent.
    fn render_reference(
        &self,
        spec: &str,
        scopes: Option<&DatasetCollection>,
        lexicon: Option<&dyn Lexicon>,
        out: &mut String,
    ) {
        let parts: Vec<&str> = spec.split(':').collect();

        if parts.len() == 3 {
            let field = parts[1];
            let prefix = parts[2];
            let value = scopes
                .and_then(|s| s.get_data_string(field))
                .unwrap_or_default();
            let chosen = self
                .get_template(&format!("{prefix}{value}"))
                .or_else(|| self.get_template(prefix));
            if let Some(sub) = chosen {
                out.push_str(&sub.render(scopes, lexicon));
            }
            return;
        }

        let name = parts.first().copied().unwrap_or_default();
        let Some(sub) = self.get_template(name) else {
            return;
        };
        let mut pushed = false;
        if parts.len() == 2
            && let Some(stack) = scopes
            && let Some(ds) = stack.get_data(parts[1]).and_then(|v| v.as_dataset())
        {
            stack.push(ds);
            pushed = true;
        }
        out.push_str(&sub.render(scopes, lexicon));
        if pushed && let Some(stack) = scopes {
            stack.pop();
        }
    }

    /// `@@key[:id]@@`: iterate the collection at `key`, one sub-template
    /// render per element with that element pushed as the top scope.
    ///
    /// Sub-template selection per index, first match wins: `id.key.N`, then
    /// `id.first` (N == 0), `id.last` (N == count-1), `id.even` (N even),
    /// else the base `id`. An absent or empty collection renders `id.none`
    /// if declared, else the base, with the scope unchanged. The base
    /// template must exist or the loop renders nothing.
    fn render_loop(
        &self,
        spec: &str,
        scopes: Option<&DatasetCollection>,
        lexicon: Option<&dyn Lexicon>,
        out: &mut String,
    ) {
        let (data_key, template_id) = split_spec(spec);
        let Some(base) = self.get_template(template_id) else {
            return;
        };
        let Some(scopes) = scopes else {
            return;
        };

        let collection = scopes.get_collection(data_key);
        let count = collection.as_ref().map_or(0, DatasetCollection::count);
        if count == 0 {
            let chosen = self
                .get_template(&format!("{template_id}.none"))
                .unwrap_or(base);
            out.push_str(&chosen.render(Some(scopes), lexicon));
            return;
        }

        let collection = collection.unwrap_or_default();
        for index in 0..count {
            let mut chosen = self.get_template(&format!("{template_id}.key.{index}"));
            if chosen.is_none() && index == 0 {
                chosen = self.get_template(&format!("{template_id}.first"));
            }
            if chosen.is_none() && index == count - 1 {
                chosen = self.get_template(&format!("{template_id}.last"));
            }
            if chosen.is_none() && index % 2 == 0 {
                chosen = self.get_template(&format!("{template_id}.even"));
            }
            let chosen = chosen.unwrap_or(base);

            let Some(element) = collection.get(index) else {
                continue;
            };
            // observable write onto the caller's element
            element.set(COUNTER_KEY, Value::Int(index as i64 + 1));
            scopes.push(element);
            out.push_str(&chosen.render(Some(scopes), lexicon));
            scopes.pop();
        }
    }

    /// `??key[:id]??`: render a sub-template chosen by the value at `key`.
    ///
    /// A dataset value is pushed as scope and selects `id.array` (else the
    /// base). Any other present value selects `id.<formatted>` (else the
    /// base) when it formats non-empty, scope unchanged. Absent, null or
    /// empty-formatting values select `id.none` (else the base); when
    /// neither exists, nothing is rendered.
    fn render_condition(
        &self,
        spec: &str,
        scopes: Option<&DatasetCollection>,
        lexicon: Option<&dyn Lexicon>,
        out: &mut String,
    ) {
        let (data_key, template_id) = split_spec(spec);
        let base = self.get_template(template_id);
        let value = scopes
            .and_then(|s| s.get_data(data_key))
            .filter(|v| !v.is_null());

        if let (Some(stack), Some(value)) = (scopes, value) {
            if let Some(ds) = value.as_dataset() {
                if base.is_some() {
                    stack.push(ds);
                    let chosen = self.get_template(&format!("{template_id}.array")).or(base);
                    if let Some(sub) = chosen {
                        out.push_str(&sub.render(scopes, lexicon));
                    }
                    stack.pop();
                }
                return;
            }
            let formatted = value.format();
            if !formatted.is_empty() {
                if base.is_some() {
                    let chosen = self
                        .get_template(&format!("{template_id}.{formatted}"))
                        .or(base);
                    if let Some(sub) = chosen {
                        out.push_str(&sub.render(scopes, lexicon));
                    }
                }
                return;
            }
            // present but formats empty: fall through to the none branch
        }

        let chosen = self.get_template(&format!("{template_id}.none")).or(base);
        if let Some(sub) = chosen {
            out.push_str(&sub.render(scopes, lexicon));
        }
    }
}

/// `!!dump!!` / `!!list!!` emit a structural dump of the scope stack's index
/// 0 — always the original root dataset, regardless of nesting depth. Any
/// other mode emits an unsupported-mode marker.
fn render_debug(mode: &str, scopes: Option<&DatasetCollection>, out: &mut String) {
    match mode {
        "dump" | "list" => {
            if let Some(scopes) = scopes
                && let Some(root) = scopes.get(0)
            {
                out.push_str(&root.to_string());
            }
        }
        other => out.push_str(&format!("[debug mode `{other}` is not supported]")),
    }
}

/// Split an element spec into `(data_key, template_id)`; the template id
/// defaults to the data key when no second part is given.
fn split_spec(spec: &str) -> (&str, &str) {
    let mut parts = spec.splitn(3, ':');
    let data_key = parts.next().unwrap_or("");
    let template_id = parts.next().unwrap_or(data_key);
    (data_key, template_id)
}
