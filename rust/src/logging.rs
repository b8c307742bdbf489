//! Verbosity-gated diagnostics for the scheduling passes.
//!
//! Output goes to stderr and costs nothing when the level is `Silent`.
//! - `Changes`: date moves, conflicts, excluded cycles
//! - `Checks`: per-task constraint evaluation
//! - `Debug`: graph construction and pass internals

/// How much the engine reports while it runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Silent = 0,
    Changes = 1,
    Checks = 2,
    Debug = 3,
}

impl Verbosity {
    /// Map a numeric level (as used by host bindings) onto a verbosity.
    /// Anything above 3 is treated as `Debug`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Changes,
            2 => Verbosity::Checks,
            _ => Verbosity::Debug,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Log at `Changes` level.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::Verbosity::Changes {
            eprintln!($($arg)*);
        }
    };
}

/// Log at `Checks` level.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::Verbosity::Checks {
            eprintln!($($arg)*);
        }
    };
}

/// Log at `Debug` level.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::Verbosity::Debug {
            eprintln!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(Verbosity::Silent < Verbosity::Changes);
        assert!(Verbosity::Checks < Verbosity::Debug);
        assert_eq!(Verbosity::default(), Verbosity::Silent);
    }

    #[test]
    fn test_from_level_saturates() {
        assert_eq!(Verbosity::from_level(0), Verbosity::Silent);
        assert_eq!(Verbosity::from_level(2), Verbosity::Checks);
        assert_eq!(Verbosity::from_level(9), Verbosity::Debug);
        assert_eq!(Verbosity::Checks.level(), 2);
    }

    #[test]
    fn test_log_macros_compile() {
        let verbosity = Verbosity::Silent;
        log_changes!(verbosity, "moved {}", 1);
        log_checks!(verbosity, "checked {}", 2);
        log_debug!(verbosity, "graph {}", 3);
    }
}
