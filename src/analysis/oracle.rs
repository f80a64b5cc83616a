//! Builder-type recognition and method classification
//!
//! The oracle answers exactly three questions: is this type the tracked
//! builder, does this method name return an independent builder, and does
//! this method name execute a query. Matching is by full package path so
//! a look-alike type in another package is never classified.

use std::collections::BTreeSet;

use crate::config::AnalyzerConfig;
use crate::ssa::{Program, TypeId, TypeKind, TypeTable, ValueId};

pub struct TypeOracle {
    handle_package: String,
    handle_type: String,
    immutable_methods: BTreeSet<String>,
    finisher_methods: BTreeSet<String>,
    session_constructor: String,
}

impl TypeOracle {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            handle_package: config.handle_package.clone(),
            handle_type: config.handle_type.clone(),
            immutable_methods: config.immutable_methods.clone(),
            finisher_methods: config.finisher_methods.clone(),
            session_constructor: config.session_constructor.clone(),
        }
    }

    /// True for the builder struct itself and for a single pointer to it.
    /// The struct carries an owning sub-pointer, so both are dangerous.
    /// Interfaces, double pointers, and aliases are deliberately excluded;
    /// the tracer surfaces those through its own traversal.
    pub fn is_handle(&self, types: &TypeTable, ty: TypeId) -> bool {
        match types.kind(ty) {
            TypeKind::Named { package, name } => {
                package == &self.handle_package && name == &self.handle_type
            }
            TypeKind::Pointer(elem) => matches!(
                types.kind(*elem),
                TypeKind::Named { package, name }
                    if package == &self.handle_package && name == &self.handle_type
            ),
            _ => false,
        }
    }

    pub fn is_handle_value(&self, program: &Program, v: ValueId) -> bool {
        program
            .type_of(v)
            .is_some_and(|ty| self.is_handle(program.types(), ty))
    }

    pub fn is_immutable_returning_builtin(&self, name: &str) -> bool {
        self.immutable_methods.contains(name)
    }

    pub fn is_finisher_builtin(&self, name: &str) -> bool {
        self.finisher_methods.contains(name)
    }

    pub fn session_constructor(&self) -> &str {
        &self.session_constructor
    }
}

impl Default for TypeOracle {
    fn default() -> Self {
        Self::new(crate::config::default_config())
    }
}
