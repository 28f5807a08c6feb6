//! Call-site capture for diagnostic dumps.
//!
//! Locations come from `#[track_caller]`; the variable name and enclosing
//! module come from the [`guarded_stack!`](crate::guarded_stack) macro.

use std::fmt;
use std::panic::Location;

use serde::Serialize;

/// Source location of a call into the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl CallSite {
    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    #[must_use]
    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Immutable record describing where a stack was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagnosticInfo {
    pub site: CallSite,
    /// Enclosing module or function path, when known.
    pub function: Option<&'static str>,
    /// Declared variable name, when known.
    pub var_name: Option<&'static str>,
}

impl DiagnosticInfo {
    /// Record with location only.
    #[must_use]
    pub const fn anonymous(site: CallSite) -> Self {
        Self {
            site,
            function: None,
            var_name: None,
        }
    }

    /// Fully-populated record, as built by [`guarded_stack!`](crate::guarded_stack).
    #[must_use]
    pub const fn named(site: CallSite, function: &'static str, var_name: &'static str) -> Self {
        Self {
            site,
            function: Some(function),
            var_name: Some(var_name),
        }
    }
}

impl fmt::Display for DiagnosticInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.site)?;
        if let Some(function) = self.function {
            write!(f, " {function}()")?;
        }
        if let Some(var_name) = self.var_name {
            write!(f, ": {var_name}")?;
        }
        Ok(())
    }
}

/// Construct a [`GuardedStack`](crate::GuardedStack) that remembers its variable
/// name and construction site.
///
/// ```
/// # fn main() -> guardstack::Result<()> {
/// let mut stk = guardstack::guarded_stack!(stk, 4)?;
/// stk.push(1)?;
/// assert_eq!(stk.info().var_name, Some("stk"));
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! guarded_stack {
    ($name:ident, $capacity:expr) => {
        $crate::guarded_stack!($name, $capacity, $crate::StackConfig::default())
    };
    ($name:ident, $capacity:expr, $config:expr) => {
        $crate::GuardedStack::construct_named(
            $capacity,
            $config,
            $crate::DiagnosticInfo::named(
                $crate::CallSite {
                    file: file!(),
                    line: line!(),
                    column: column!(),
                },
                module_path!(),
                stringify!($name),
            ),
        )
    };
}
