//! Assertion script: declarations plus asserted terms, renderable as
//! SMT-LIB 2 text.
//!
//! The script is the wire format towards the external solver collaborator.
//! Constants are declared on first use, in first-use order, so the rendered
//! output is deterministic for a deterministic recording.

use indexmap::IndexMap;

use crate::sort::Sort;
use crate::term::{Term, TermRef};

/// An SMT-LIB 2 script under construction.
#[derive(Debug, Default)]
pub struct Script {
    decls: IndexMap<String, Sort>,
    asserts: Vec<TermRef>,
}

impl Script {
    pub fn new() -> Self {
        Script::default()
    }

    /// Asserts a term, auto-declaring every constant it mentions.
    ///
    /// Panics if a constant name reappears with a different sort; symbol
    /// names are derived from unique event identifiers, so a clash means the
    /// id counters were not reset correctly.
    pub fn assert_term(&mut self, term: TermRef) {
        // Asserting a literal `true` adds nothing.
        if matches!(&*term, Term::BoolLit(true)) {
            return;
        }

        term.visit_consts(&mut |name, sort| {
            match self.decls.get(name) {
                None => {
                    self.decls.insert(name.to_string(), sort.clone());
                }
                Some(existing) => {
                    assert_eq!(
                        existing, sort,
                        "constant '{}' redeclared with a different sort",
                        name
                    );
                }
            }
        });
        self.asserts.push(term);
    }

    pub fn assertions(&self) -> &[TermRef] {
        &self.asserts
    }

    pub fn declarations(&self) -> impl Iterator<Item = (&str, &Sort)> {
        self.decls.iter().map(|(name, sort)| (name.as_str(), sort))
    }

    pub fn is_empty(&self) -> bool {
        self.asserts.is_empty()
    }

    pub fn clear(&mut self) {
        self.decls.clear();
        self.asserts.clear();
    }

    /// Renders the script as SMT-LIB 2 text ending in `(check-sat)`.
    ///
    /// The logic is declared as `ALL` because the formula mixes the data
    /// theory (bit-vectors or integers, with arrays) with integer clocks.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("(set-logic ALL)\n");
        for (name, sort) in &self.decls {
            out.push_str(&format!("(declare-const {} {})\n", name, sort));
        }
        for term in &self.asserts {
            out.push_str(&format!("(assert {})\n", term));
        }
        out.push_str("(check-sat)\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_constants_on_first_use() {
        let mut script = Script::new();
        let a = Term::constant("a", Sort::Int);
        let b = Term::constant("b", Sort::Int);
        script.assert_term(Term::lt(a.clone(), b.clone(), true));
        script.assert_term(Term::eq(a, Term::int_lit(0)));

        let decls: Vec<_> = script.declarations().map(|(n, _)| n.to_string()).collect();
        assert_eq!(decls, vec!["a", "b"]);
        assert_eq!(script.assertions().len(), 2);
    }

    #[test]
    fn trivially_true_assertions_are_dropped() {
        let mut script = Script::new();
        script.assert_term(Term::bool_lit(true));
        assert!(script.is_empty());
    }

    #[test]
    #[should_panic(expected = "redeclared")]
    fn sort_clash_panics() {
        let mut script = Script::new();
        script.assert_term(Term::eq(
            Term::constant("a", Sort::Int),
            Term::int_lit(0),
        ));
        script.assert_term(Term::eq(
            Term::constant("a", Sort::Bool),
            Term::bool_lit(true),
        ));
    }

    #[test]
    fn render_produces_complete_script() {
        let mut script = Script::new();
        let clock = Term::constant("c1", Sort::Int);
        script.assert_term(Term::lt(Term::int_lit(0), clock, true));

        let text = script.render();
        assert_eq!(
            text,
            "(set-logic ALL)\n(declare-const c1 Int)\n(assert (< 0 c1))\n(check-sat)\n"
        );
    }

    #[test]
    fn clear_resets_everything() {
        let mut script = Script::new();
        script.assert_term(Term::eq(
            Term::constant("a", Sort::Int),
            Term::int_lit(1),
        ));
        script.clear();
        assert!(script.is_empty());
        assert_eq!(script.declarations().count(), 0);
    }
}
