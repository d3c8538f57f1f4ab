//! Integer expressions used as allocation extents.

use std::fmt;

/// An integer expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    IntImm(i64),
    /// A value only known at run time.
    Var(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Min(Box<Expr>, Box<Expr>),
    Max(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::IntImm(value)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn add(a: Expr, b: Expr) -> Self {
        Expr::Add(Box::new(a), Box::new(b))
    }

    pub fn sub(a: Expr, b: Expr) -> Self {
        Expr::Sub(Box::new(a), Box::new(b))
    }

    pub fn mul(a: Expr, b: Expr) -> Self {
        Expr::Mul(Box::new(a), Box::new(b))
    }

    pub fn min(a: Expr, b: Expr) -> Self {
        Expr::Min(Box::new(a), Box::new(b))
    }

    pub fn max(a: Expr, b: Expr) -> Self {
        Expr::Max(Box::new(a), Box::new(b))
    }

    /// Fold the expression to a constant, if it has no free variables.
    ///
    /// Arithmetic saturates: an overflowing product is still a (huge)
    /// constant, never a dynamic value.
    pub fn as_const(&self) -> Option<i64> {
        match self {
            Expr::IntImm(value) => Some(*value),
            Expr::Var(_) => None,
            Expr::Add(a, b) => Some(a.as_const()?.saturating_add(b.as_const()?)),
            Expr::Sub(a, b) => Some(a.as_const()?.saturating_sub(b.as_const()?)),
            Expr::Mul(a, b) => Some(a.as_const()?.saturating_mul(b.as_const()?)),
            Expr::Min(a, b) => Some(a.as_const()?.min(b.as_const()?)),
            Expr::Max(a, b) => Some(a.as_const()?.max(b.as_const()?)),
        }
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::IntImm(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::IntImm(value.into())
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::var(name)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntImm(value) => write!(f, "{value}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a}*{b})"),
            Expr::Min(a, b) => write!(f, "min({a}, {b})"),
            Expr::Max(a, b) => write!(f, "max({a}, {b})"),
        }
    }
}
