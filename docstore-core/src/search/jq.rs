//! jq programs evaluated by jaq
//!
//! The program is compiled together with the jq standard library, so
//! object construction, boolean operators, arithmetic and builtins such as
//! `map`, `length` or `test` are all available to callers.

use super::SearchFilter;
use crate::error::{StoreError, StoreResult};
use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, FilterT, Native, RcIter};
use jaq_json::Val;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

type Compiled = jaq_core::Filter<Native<Val>>;

/// A jq program, checked to compile when parsed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JqFilter {
    source: String,
}

impl JqFilter {
    /// Parse and compile `source`.
    ///
    /// Syntax errors and references to undefined filters are
    /// `InvalidFilter`.
    pub fn parse(source: &str) -> StoreResult<Self> {
        let filter = Self {
            source: source.to_string(),
        };
        filter.compile()?;
        Ok(filter)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn compile(&self) -> StoreResult<Compiled> {
        let program = File {
            code: self.source.as_str(),
            path: (),
        };
        let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
        let arena = Arena::default();

        let modules = loader.load(&arena, program).map_err(|errors| {
            let reasons: Vec<String> = errors.iter().map(|(_, e)| format!("{:?}", e)).collect();
            StoreError::InvalidFilter(reasons.join("; "))
        })?;

        Compiler::default()
            .with_funs(jaq_std::funs().chain(jaq_json::funs()))
            .compile(modules)
            .map_err(|errors| {
                let reasons: Vec<String> =
                    errors.iter().map(|(_, e)| format!("undefined: {:?}", e)).collect();
                StoreError::InvalidFilter(reasons.join("; "))
            })
    }
}

/// Every output of `filter` for one document; the first runtime error wins
fn evaluate(filter: &Compiled, document: &Value) -> StoreResult<Vec<Value>> {
    let inputs = RcIter::new(core::iter::empty());
    filter
        .run((Ctx::new([], &inputs), Val::from(document.clone())))
        .map(|output| {
            output
                .map(Value::from)
                .map_err(|e| StoreError::FilterFailed(e.to_string()))
        })
        .collect()
}

impl SearchFilter for JqFilter {
    fn apply(&self, document: &Value) -> StoreResult<Vec<Value>> {
        evaluate(&self.compile()?, document)
    }

    fn apply_all(&self, documents: &[Value]) -> StoreResult<Vec<Vec<Value>>> {
        let compiled = self.compile()?;
        documents
            .iter()
            .map(|document| evaluate(&compiled, document))
            .collect()
    }
}

impl FromStr for JqFilter {
    type Err = StoreError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

impl fmt::Display for JqFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(filter: &str, document: Value) -> Vec<Value> {
        JqFilter::parse(filter).unwrap().apply(&document).unwrap()
    }

    fn jack() -> Value {
        json!({"name": "jack", "age": 25, "tags": ["x", "y", "z"]})
    }

    #[test]
    fn test_paths() {
        assert_eq!(run(".", json!({"a": 1})), vec![json!({"a": 1})]);
        assert_eq!(run(".name", jack()), vec![json!("jack")]);
        assert_eq!(run(".missing", jack()), vec![Value::Null]);
        assert_eq!(run(".tags[-1]", jack()), vec![json!("z")]);
        assert_eq!(run(".tags[7]", jack()), vec![Value::Null]);
        assert_eq!(
            run(".tags[]", jack()),
            vec![json!("x"), json!("y"), json!("z")]
        );
    }

    #[test]
    fn test_select() {
        assert_eq!(run("select(.age > 18) | .name", jack()), vec![json!("jack")]);
        assert_eq!(run("select(.age >= 25.0)", jack()).len(), 1);
        assert!(run("select(.age < 18)", jack()).is_empty());
        assert_eq!(run("select(.missing == null)", jack()).len(), 1);
        assert_eq!(
            run(r#"select(.age > 18 and .name == "jack") | .age"#, jack()),
            vec![json!(25)]
        );
        assert!(run(r#"select(.age > 18 and .name != "jack")"#, jack()).is_empty());
    }

    #[test]
    fn test_construction_and_builtins() {
        assert_eq!(run("{name: .name}", jack()), vec![json!({"name": "jack"})]);
        assert_eq!(run(".name | length", jack()), vec![json!(4)]);
        assert_eq!(run(".age + 1", jack()), vec![json!(26)]);
        assert_eq!(
            run(r#".tags | map(. + "!")"#, jack()),
            vec![json!(["x!", "y!", "z!"])]
        );
        assert_eq!(run("[.tags[] | select(. != \"y\")]", jack()), vec![json!(["x", "z"])]);
    }

    #[test]
    fn test_runtime_errors_are_filter_failures() {
        let filter = JqFilter::parse(".name.first").unwrap();
        assert!(matches!(
            filter.apply(&jack()),
            Err(StoreError::FilterFailed(_))
        ));

        let filter = JqFilter::parse(".[]").unwrap();
        assert!(matches!(filter.apply(&json!(3)), Err(StoreError::FilterFailed(_))));

        let filter = JqFilter::parse(r#"error("boom")"#).unwrap();
        assert!(matches!(filter.apply(&json!({})), Err(StoreError::FilterFailed(_))));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["select(", ".a |", "{name:", ")", "nosuchfilter", "select(.a; .b; .c)"] {
            assert!(
                matches!(JqFilter::parse(bad), Err(StoreError::InvalidFilter(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_apply_all_keeps_document_order() {
        let filter = JqFilter::parse(".n").unwrap();
        let outputs = filter
            .apply_all(&[json!({"n": 2}), json!({"n": 1})])
            .unwrap();
        assert_eq!(outputs, vec![vec![json!(2)], vec![json!(1)]]);
    }

    #[test]
    fn test_display_keeps_source() {
        let filter: JqFilter = ".a | .b".parse().unwrap();
        assert_eq!(filter.to_string(), ".a | .b");
        assert_eq!(filter.source(), ".a | .b");
    }
}
