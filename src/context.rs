//! Per-compilation state: configuration, names and diagnostics.

use crate::utils::{Diagnostic, DiagnosticSeverity, Symbol, SymbolInterner};
use log::{debug, warn};

/// Configuration for the linear loop transformation pass.
#[derive(Debug, Clone)]
pub struct LinearTransformConfig {
    /// Run the pass at all
    pub enabled: bool,
    /// Reject imperfect nests instead of trying to split them
    pub need_perfect_nest: bool,
    /// Report every extracted and transformed nest at `info` level
    pub dump_nests: bool,
}

impl Default for LinearTransformConfig {
    fn default() -> Self {
        Self { enabled: true, need_perfect_nest: true, dump_nests: false }
    }
}

/// Everything one compilation run owns. Nothing here is shared between
/// two contexts.
#[derive(Debug, Default)]
pub struct CompilationContext {
    pub config: LinearTransformConfig,
    pub interner: SymbolInterner,
    next_temp: usize,
    diagnostics: Vec<Diagnostic>,
}

impl CompilationContext {
    pub fn new(config: LinearTransformConfig) -> Self {
        Self { config, ..Default::default() }
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    pub fn name(&self, sym: Symbol) -> String {
        self.interner.name(sym)
    }

    /// A name `prefix.N` that has not been interned before.
    pub fn fresh_symbol(&mut self, prefix: &str) -> Symbol {
        loop {
            let name = format!("{}.{}", prefix, self.next_temp);
            self.next_temp += 1;
            if self.interner.get(&name).is_none() {
                return self.interner.intern(&name);
            }
        }
    }

    /// Record a diagnostic and log it.
    pub fn diagnose(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Warning => warn!("{}", diagnostic),
            DiagnosticSeverity::Note => debug!("{}", diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_symbols_do_not_collide() {
        let mut ctx = CompilationContext::default();
        ctx.intern("lniv.0");
        let a = ctx.fresh_symbol("lniv");
        let b = ctx.fresh_symbol("lniv");
        assert_ne!(a, b);
        assert_eq!(ctx.name(a), "lniv.1");
        assert_eq!(ctx.name(b), "lniv.2");
    }

    #[test]
    fn test_diagnostics_are_collected() {
        let mut ctx = CompilationContext::new(LinearTransformConfig { need_perfect_nest: false, ..Default::default() });
        ctx.diagnose(Diagnostic::warning("not transformable").with_loop(3));
        ctx.diagnose(Diagnostic::note("identity"));
        assert_eq!(ctx.diagnostics().len(), 2);
        assert_eq!(ctx.take_diagnostics()[0].loop_id, Some(3));
        assert!(ctx.diagnostics().is_empty());
    }
}
