//! Region classification of accepted events.
//!
//! Regions are declared once at setup; each holds an independent predicate
//! over the derived variables. An event can land in any number of regions.
//! `inclusive` is always declared and accepts every event that reaches
//! classification.

use std::sync::Arc;

use vbsel_core::{Error, Result};
use vbsel_io::{BoundExpr, CompiledExpr};

use crate::variables::{DerivedVariableSet, VariableCatalogue};

/// Name of the always-accepting region.
pub const INCLUSIVE: &str = "inclusive";

type RegionFn = Box<dyn Fn(&DerivedVariableSet) -> bool + Send + Sync>;

/// Membership test for one region.
pub enum RegionPredicate {
    /// Rust closure.
    Closure(RegionFn),
    /// Cut expression bound to the variable catalogue.
    Expr(BoundExpr),
}

impl RegionPredicate {
    fn test(&self, vars: &DerivedVariableSet) -> bool {
        match self {
            RegionPredicate::Closure(f) => f(vars),
            RegionPredicate::Expr(e) => e.passes(vars.values()),
        }
    }
}

impl std::fmt::Debug for RegionPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionPredicate::Closure(_) => f.write_str("Closure(..)"),
            RegionPredicate::Expr(e) => f.debug_tuple("Expr").field(&e.source()).finish(),
        }
    }
}

/// Acceptance flags for the declared regions of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSet {
    names: Arc<Vec<String>>,
    accepted: Vec<bool>,
}

impl RegionSet {
    /// All regions rejected.
    pub fn new(names: Arc<Vec<String>>) -> Self {
        let accepted = vec![false; names.len()];
        Self { names, accepted }
    }

    /// Mark `name` as accepted. Undeclared names are an error.
    pub fn accept(&mut self, name: &str) -> Result<()> {
        let i = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UndeclaredRegion(name.to_string()))?;
        self.accepted[i] = true;
        Ok(())
    }

    /// Whether `name` was accepted (false for undeclared names).
    pub fn is_accepted(&self, name: &str) -> bool {
        self.names.iter().position(|n| n == name).is_some_and(|i| self.accepted[i])
    }

    /// `(name, accepted)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.names.iter().map(String::as_str).zip(self.accepted.iter().copied())
    }

    /// Accepted region names in declaration order.
    pub fn accepted(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|(n, a)| a.then_some(n))
    }
}

/// Ordered registry of region predicates.
#[derive(Debug)]
pub struct RegionClassifier {
    names: Arc<Vec<String>>,
    predicates: Vec<RegionPredicate>,
}

impl Default for RegionClassifier {
    fn default() -> Self {
        Self {
            names: Arc::new(vec![INCLUSIVE.to_string()]),
            predicates: vec![RegionPredicate::Closure(Box::new(|_| true))],
        }
    }
}

impl RegionClassifier {
    /// Classifier holding only `inclusive`.
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, name: String, predicate: RegionPredicate) -> Result<()> {
        if name.is_empty() {
            return Err(Error::Config("region name must not be empty".into()));
        }
        if self.names.contains(&name) {
            return Err(Error::Config(format!("region '{name}' declared twice")));
        }
        Arc::make_mut(&mut self.names).push(name);
        self.predicates.push(predicate);
        Ok(())
    }

    /// Declare a region backed by a closure.
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F) -> Result<()>
    where
        F: Fn(&DerivedVariableSet) -> bool + Send + Sync + 'static,
    {
        self.declare(name.into(), RegionPredicate::Closure(Box::new(predicate)))
    }

    /// Declare a region from a cut expression over catalogue variables.
    pub fn register_expr(
        &mut self,
        name: impl Into<String>,
        cut: &str,
        catalogue: &VariableCatalogue,
    ) -> Result<()> {
        let name = name.into();
        let bound = CompiledExpr::compile(cut)
            .and_then(|e| e.bind(|v| catalogue.index_of(v)))
            .map_err(|e| Error::Config(format!("region '{name}': {e}")))?;
        self.declare(name, RegionPredicate::Expr(bound))
    }

    /// Declared region names in order.
    pub fn names(&self) -> &Arc<Vec<String>> {
        &self.names
    }

    /// Evaluate every predicate.
    pub fn classify(&self, vars: &DerivedVariableSet) -> RegionSet {
        let mut set = RegionSet::new(Arc::clone(&self.names));
        for (slot, predicate) in set.accepted.iter_mut().zip(&self.predicates) {
            *slot = predicate.test(vars);
        }
        set
    }
}
