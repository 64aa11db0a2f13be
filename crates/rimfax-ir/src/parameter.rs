//! Symbolic parameter expressions.
//!
//! Loop bodies carry a loop parameter that is bound to a concrete value per
//! iteration; binding is pure and returns a new expression. Expressions also
//! appear as rotation angles in parameterized gates.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A symbolic or concrete parameter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A constant numeric value.
    Constant(f64),
    /// A symbolic parameter.
    Symbol(String),
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Addition.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Subtraction.
    Sub(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Multiplication.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Division.
    Div(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl ParameterExpression {
    /// Create a constant parameter.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// Create a symbolic parameter.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// Check if this expression contains any unbound symbols.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Constant(_) => false,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    /// Try to evaluate as a concrete f64 value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Sub(a, b) => Some(a.as_f64()? - b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            ParameterExpression::Div(a, b) => {
                let divisor = b.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Some(a.as_f64()? / divisor)
            }
        }
    }

    /// Try to evaluate as a concrete integer. `None` if symbolic or not
    /// integral.
    pub fn as_i64(&self) -> Option<i64> {
        let v = self.as_f64()?;
        if v.fract() != 0.0 || !v.is_finite() {
            return None;
        }
        Some(v as i64)
    }

    /// Get all symbol names in this expression.
    pub fn symbols(&self) -> HashSet<String> {
        let mut set = HashSet::new();
        self.collect_symbols(&mut set);
        set
    }

    fn collect_symbols(&self, set: &mut HashSet<String>) {
        match self {
            ParameterExpression::Constant(_) => {}
            ParameterExpression::Symbol(name) => {
                set.insert(name.clone());
            }
            ParameterExpression::Neg(e) => e.collect_symbols(set),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => {
                a.collect_symbols(set);
                b.collect_symbols(set);
            }
        }
    }

    /// Bind a symbol to a value, returning a new expression.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        let mut bindings = FxHashMap::default();
        bindings.insert(name.to_string(), value);
        self.bind_all(&bindings)
    }

    /// Bind several symbols at once, returning a new expression. Symbols
    /// absent from the map are left untouched.
    pub fn bind_all(&self, bindings: &FxHashMap<String, f64>) -> Self {
        match self {
            ParameterExpression::Symbol(n) => match bindings.get(n) {
                Some(&v) => ParameterExpression::Constant(v),
                None => self.clone(),
            },
            ParameterExpression::Constant(_) => self.clone(),
            ParameterExpression::Neg(e) => {
                ParameterExpression::Neg(Box::new(e.bind_all(bindings)))
            }
            ParameterExpression::Add(a, b) => ParameterExpression::Add(
                Box::new(a.bind_all(bindings)),
                Box::new(b.bind_all(bindings)),
            ),
            ParameterExpression::Sub(a, b) => ParameterExpression::Sub(
                Box::new(a.bind_all(bindings)),
                Box::new(b.bind_all(bindings)),
            ),
            ParameterExpression::Mul(a, b) => ParameterExpression::Mul(
                Box::new(a.bind_all(bindings)),
                Box::new(b.bind_all(bindings)),
            ),
            ParameterExpression::Div(a, b) => ParameterExpression::Div(
                Box::new(a.bind_all(bindings)),
                Box::new(b.bind_all(bindings)),
            ),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(v: f64) -> Self {
        ParameterExpression::Constant(v)
    }
}

impl From<i64> for ParameterExpression {
    fn from(v: i64) -> Self {
        ParameterExpression::Constant(v as f64)
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(n) => write!(f, "{n}"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Sub(a, b) => write!(f, "({a} - {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
            ParameterExpression::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_evaluation() {
        let e = ParameterExpression::constant(2.5);
        assert!(!e.is_symbolic());
        assert_eq!(e.as_f64(), Some(2.5));
        assert_eq!(e.as_i64(), None);
    }

    #[test]
    fn test_integral_evaluation() {
        assert_eq!(ParameterExpression::constant(6.0).as_i64(), Some(6));
        assert_eq!(ParameterExpression::constant(-2.0).as_i64(), Some(-2));
    }

    #[test]
    fn test_bind_symbol() {
        let theta = ParameterExpression::symbol("theta");
        assert!(theta.is_symbolic());
        assert_eq!(theta.as_f64(), None);

        let bound = theta.bind("theta", 1.5);
        assert_eq!(bound.as_f64(), Some(1.5));
        // Binding is pure: the original is untouched.
        assert!(theta.is_symbolic());
    }

    #[test]
    fn test_bind_nested_expression() {
        let e = ParameterExpression::Mul(
            Box::new(ParameterExpression::symbol("i")),
            Box::new(ParameterExpression::constant(2.0)),
        );
        assert_eq!(e.bind("i", 3.0).as_f64(), Some(6.0));
        assert_eq!(e.bind("j", 3.0).as_f64(), None);
    }

    #[test]
    fn test_symbols() {
        let e = ParameterExpression::Add(
            Box::new(ParameterExpression::symbol("a")),
            Box::new(ParameterExpression::Neg(Box::new(
                ParameterExpression::symbol("b"),
            ))),
        );
        let syms = e.symbols();
        assert!(syms.contains("a"));
        assert!(syms.contains("b"));
        assert_eq!(syms.len(), 2);
    }

    #[test]
    fn test_division_by_zero() {
        let e = ParameterExpression::Div(
            Box::new(ParameterExpression::constant(1.0)),
            Box::new(ParameterExpression::constant(0.0)),
        );
        assert_eq!(e.as_f64(), None);
    }
}
