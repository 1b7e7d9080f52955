//! Street-field normalisation.
//!
//! User-supplied street values are rewritten by an ordered table of rules
//! before they reach the store. Each rule is a pattern, a rewrite and the set
//! of fields it applies to. Later rules assume the earlier ones already ran,
//! and running the whole table twice yields the same result as running it
//! once.
//!
//! # Examples
//! ```
//! use geomatch_core::normalize;
//!
//! assert_eq!(normalize("str_hnr", " Oranienstrasse 1 "), "Oranienstraße 1");
//! assert_eq!(normalize("str_hnr", "Kurfürstendamm 86 a"), "Kurfürstendamm 86A");
//! assert_eq!(normalize("strasse", "Kurfürstenstr."), "Kurfürstenstraße");
//! assert_eq!(normalize("plz", " 10719 "), "10719");
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::FieldValue;

/// Combined "street + house number" field.
pub const COMBINED_STREET_FIELD: &str = "str_hnr";
/// Plain street name field.
pub const STREET_FIELD: &str = "strasse";

/// Which fields a rule rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// Every textual field.
    AnyText,
    /// Both street-like fields.
    Street,
    /// Only the combined street + house number field.
    Combined,
}

impl FieldScope {
    /// Whether a rule with this scope rewrites `field`.
    #[must_use]
    pub fn applies_to(self, field: &str) -> bool {
        match self {
            Self::AnyText => true,
            Self::Street => field == COMBINED_STREET_FIELD || field == STREET_FIELD,
            Self::Combined => field == COMBINED_STREET_FIELD,
        }
    }
}

/// How a rule rewrites a matched span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rewrite {
    /// Substitute a `regex` replacement template.
    Template(&'static str),
    /// Keep capture group 1 and append capture group 2 in upper case.
    UppercaseSecondGroup,
}

/// One entry of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSpec {
    /// Stable rule name, used to address a rule in isolation.
    pub name: &'static str,
    /// Regular expression selecting the span to rewrite.
    pub pattern: &'static str,
    /// Rewrite applied to each match.
    pub rewrite: Rewrite,
    /// Fields the rule applies to.
    pub scope: FieldScope,
}

/// The built-in rule table, in application order.
pub const RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "trim",
        pattern: r"^\s+|\s+$",
        rewrite: Rewrite::Template(""),
        scope: FieldScope::AnyText,
    },
    RuleSpec {
        name: "street-word",
        pattern: r"\bStrasse\b",
        rewrite: Rewrite::Template("Straße"),
        scope: FieldScope::Street,
    },
    RuleSpec {
        name: "street-abbreviation",
        pattern: r"\bStr\.",
        rewrite: Rewrite::Template("Straße"),
        scope: FieldScope::Street,
    },
    RuleSpec {
        name: "street-compound-suffix",
        pattern: r"\B(?:strasse\b|str\.)",
        rewrite: Rewrite::Template("straße"),
        scope: FieldScope::Street,
    },
    RuleSpec {
        name: "house-number-letter",
        pattern: r"([0-9])\s*([A-Za-z])$",
        rewrite: Rewrite::UppercaseSecondGroup,
        scope: FieldScope::Combined,
    },
    RuleSpec {
        name: "house-number-range",
        pattern: r"\b([0-9]+)(?:-[0-9]+)+$",
        rewrite: Rewrite::Template("${1}"),
        scope: FieldScope::Combined,
    },
];

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    spec: RuleSpec,
    regex: Regex,
}

impl Rule {
    /// Compile a rule specification.
    ///
    /// # Errors
    /// Returns the `regex` error when the pattern does not compile.
    pub fn compile(spec: RuleSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            spec,
            regex: Regex::new(spec.pattern)?,
        })
    }

    /// The rule's specification.
    #[must_use]
    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    /// Apply the rule to `value` regardless of field scope.
    #[must_use]
    pub fn apply<'a>(&self, value: &'a str) -> Cow<'a, str> {
        match self.spec.rewrite {
            Rewrite::Template(template) => self.regex.replace_all(value, template),
            Rewrite::UppercaseSecondGroup => {
                self.regex.replace_all(value, |caps: &Captures<'_>| {
                    let kept = caps.get(1).map_or("", |m| m.as_str());
                    let raised = caps.get(2).map_or("", |m| m.as_str());
                    format!("{kept}{}", raised.to_uppercase())
                })
            }
        }
    }
}

/// Ordered, compiled rule table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<Rule>,
}

static SHARED: LazyLock<Normalizer> = LazyLock::new(|| {
    Normalizer::new(RULES)
        .unwrap_or_else(|err| panic!("built-in normalisation rules must compile: {err}"))
});

impl Normalizer {
    /// Compile a rule table.
    ///
    /// # Errors
    /// Returns the first `regex` compilation error.
    pub fn new(specs: &[RuleSpec]) -> Result<Self, regex::Error> {
        let rules = specs
            .iter()
            .copied()
            .map(Rule::compile)
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    /// The process-wide normaliser built from [`RULES`].
    #[must_use]
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// Look up a compiled rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.spec().name == name)
    }

    /// Rewrite `value` with every rule whose scope covers `field`.
    ///
    /// The table is reapplied until the value stops changing. A rewrite can
    /// turn the character in front of a later street token into a letter
    /// (`Astr.strasse` becomes `Astraßestrasse`), which only the next pass
    /// sees. Every pass after the first consumes at least one street token,
    /// so the input length bounds the number of passes.
    #[must_use]
    pub fn normalize(&self, field: &str, value: &str) -> String {
        let mut current = self.apply_once(field, value);
        for _ in 0..value.len() {
            let next = self.apply_once(field, &current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn apply_once(&self, field: &str, value: &str) -> String {
        self.rules
            .iter()
            .filter(|rule| rule.spec().scope.applies_to(field))
            .fold(value.to_owned(), |current, rule| {
                let rewritten = match rule.apply(&current) {
                    Cow::Borrowed(_) => None,
                    Cow::Owned(rewritten) => Some(rewritten),
                };
                rewritten.unwrap_or(current)
            })
    }

    /// Normalise a coerced value; numbers pass through untouched.
    #[must_use]
    pub fn normalize_value(&self, field: &str, value: FieldValue) -> FieldValue {
        match value {
            FieldValue::Text(text) => FieldValue::Text(self.normalize(field, &text)),
            number @ FieldValue::Number(_) => number,
        }
    }
}

/// Normalise `value` for `field` with the built-in rules.
#[must_use]
pub fn normalize(field: &str, value: &str) -> String {
    Normalizer::shared().normalize(field, value)
}
