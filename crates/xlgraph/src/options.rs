//! Graph construction and evaluation options

/// Options for [`GraphBuilder`](crate::GraphBuilder)
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Call-stack depth at which the evaluation trace is discarded and an error logged
    /// (default: 10000)
    ///
    /// Evaluation carries on after the trace is discarded.
    pub max_call_stack: usize,
    /// Nesting depth evaluated on the native stack before the evaluator unwinds and
    /// resumes from the deepest cell (default: 64)
    ///
    /// Bounds native stack use, so reference chains of any length evaluate.
    pub max_recursion_depth: usize,
    /// Treat formula cells with a cached value as already computed (default: false)
    pub trust_cached_values: bool,
    /// Register only the key and result columns of VLOOKUP/HLOOKUP tables with a literal
    /// index (default: true)
    pub narrow_lookups: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_call_stack: 10_000,
            max_recursion_depth: 64,
            trust_cached_values: false,
            narrow_lookups: true,
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_stack(mut self, depth: usize) -> Self {
        self.max_call_stack = depth;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_trust_cached_values(mut self, trust: bool) -> Self {
        self.trust_cached_values = trust;
        self
    }

    pub fn with_narrow_lookups(mut self, narrow: bool) -> Self {
        self.narrow_lookups = narrow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_builders() {
        let options = BuildOptions::new();
        assert_eq!(options.max_call_stack, 10_000);
        assert_eq!(options.max_recursion_depth, 64);
        assert!(!options.trust_cached_values);
        assert!(options.narrow_lookups);

        let options = options
            .with_max_call_stack(5)
            .with_max_recursion_depth(8)
            .with_trust_cached_values(true)
            .with_narrow_lookups(false);
        assert_eq!(options.max_call_stack, 5);
        assert_eq!(options.max_recursion_depth, 8);
        assert!(options.trust_cached_values);
        assert!(!options.narrow_lookups);
    }
}
