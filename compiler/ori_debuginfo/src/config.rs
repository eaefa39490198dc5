//! Debug info configuration.

/// Debug information detail level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugLevel {
    /// No debug information.
    #[default]
    None,
    /// Locations and function records only. Variables, globals, and
    /// signature types are skipped.
    LineTablesOnly,
    /// Types, variables, scopes, and locations.
    Full,
}

impl DebugLevel {
    /// Check if debug info should be generated.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Check if type and variable records should be generated.
    #[must_use]
    pub fn emits_types(self) -> bool {
        matches!(self, Self::Full)
    }
}

impl std::fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::LineTablesOnly => write!(f, "line-tables"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Debug format the downstream builder is asked to produce.
///
/// Recorded on the compile unit; this crate makes no encoding decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugFormat {
    /// DWARF (Linux, macOS, WASM).
    #[default]
    Dwarf,
    /// `CodeView` (Windows, MSVC toolchain).
    CodeView,
}

impl DebugFormat {
    /// Pick the format a target triple expects.
    #[must_use]
    pub fn for_target(target: &str) -> Self {
        if target.contains("windows") && target.contains("msvc") {
            Self::CodeView
        } else {
            Self::Dwarf
        }
    }
}

impl std::fmt::Display for DebugFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dwarf => write!(f, "DWARF"),
            Self::CodeView => write!(f, "CodeView"),
        }
    }
}

/// Configuration for a debug info session.
#[derive(Debug, Clone)]
pub struct DebugInfoConfig {
    pub level: DebugLevel,
    /// Optimized builds mark function records as such; debuggers then
    /// expect variables to be partially unavailable.
    pub optimized: bool,
    /// DWARF version recorded on the compile unit (4 or 5).
    pub dwarf_version: u32,
    pub format: DebugFormat,
    /// Producer string recorded on the compile unit.
    pub producer: String,
}

impl Default for DebugInfoConfig {
    fn default() -> Self {
        Self {
            level: DebugLevel::None,
            optimized: false,
            dwarf_version: 4,
            format: DebugFormat::Dwarf,
            producer: String::from("Ori Compiler"),
        }
    }
}

impl DebugInfoConfig {
    /// Create a configuration with the given level and defaults otherwise.
    #[must_use]
    pub fn new(level: DebugLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Full debug info, unoptimized.
    #[must_use]
    pub fn development() -> Self {
        Self::new(DebugLevel::Full)
    }

    /// Line tables for an optimized build.
    #[must_use]
    pub fn line_tables() -> Self {
        Self::new(DebugLevel::LineTablesOnly).with_optimized(true)
    }

    /// Create a configuration appropriate for a target triple.
    #[must_use]
    pub fn for_target(level: DebugLevel, target: &str) -> Self {
        Self::new(level).with_format(DebugFormat::for_target(target))
    }

    #[must_use]
    pub fn with_optimized(mut self, optimized: bool) -> Self {
        self.optimized = optimized;
        self
    }

    #[must_use]
    pub fn with_dwarf_version(mut self, version: u32) -> Self {
        self.dwarf_version = version;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: DebugFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }
}
