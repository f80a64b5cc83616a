//! Per-root pollution state and cross-use detection
//!
//! Each mutable root accumulates the blocks where a consuming use was
//! seen. A second use reachable from an earlier one is a violation.
//! Because closures are swept with the tracker of their enclosing
//! analysis, polluted blocks are keyed by (function, block); reachability
//! between blocks of different functions falls back to source-position
//! order plus the closure-tree relationship.

use std::collections::{BTreeMap, HashSet};

use log::debug;

use super::cfg::CfgCache;
use crate::core::{Pos, UseKind, Violation};
use crate::directives::Directives;
use crate::ssa::{BlockId, FuncId, Program, ValueId};

/// Recorded state for one mutable root. Created lazily on the first
/// recording event, dropped with the function analysis.
#[derive(Debug, Default)]
pub struct OriginState {
    /// First consuming use per block
    pub polluted_blocks: BTreeMap<(FuncId, BlockId), Pos>,
    /// Every recorded use, for logs and tests
    pub uses: Vec<(Pos, UseKind)>,
}

pub struct PollutionTracker<'a> {
    program: &'a Program,
    /// The function this analysis was started for; closures swept by the
    /// same analysis hang below it.
    analyzed: FuncId,
    session_constructor: String,
    origins: BTreeMap<ValueId, OriginState>,
    violations: Vec<Violation>,
    reported: HashSet<(ValueId, Pos)>,
}

impl<'a> PollutionTracker<'a> {
    pub fn new(program: &'a Program, analyzed: FuncId, session_constructor: &str) -> Self {
        Self {
            program,
            analyzed,
            session_constructor: session_constructor.to_string(),
            origins: BTreeMap::new(),
            violations: Vec::new(),
            reported: HashSet::new(),
        }
    }

    fn origin_mut(&mut self, root: ValueId) -> &mut OriginState {
        self.origins.entry(root).or_default()
    }

    /// Record a consuming use. Idempotent per block; returns whether this
    /// was the first pollution in that block.
    pub fn mark_polluted(&mut self, root: ValueId, func: FuncId, block: BlockId, pos: Pos) -> bool {
        let origin = self.origin_mut(root);
        origin.uses.push((pos, UseKind::Polluting));
        let first = !origin.polluted_blocks.contains_key(&(func, block));
        origin.polluted_blocks.entry((func, block)).or_insert(pos);
        if first {
            debug!("root {:?} polluted at {} ({:?}/{:?})", root, pos, func, block);
        }
        first
    }

    /// An independent-builder use; counted but never polluting.
    pub fn record_pure_use(&mut self, root: ValueId, pos: Pos) {
        self.origin_mut(root).uses.push((pos, UseKind::Pure));
    }

    /// A result flowing straight into a variable; counted but never
    /// polluting.
    pub fn record_assignment(&mut self, root: ValueId, pos: Pos) {
        self.origin_mut(root).uses.push((pos, UseKind::Assignment));
    }

    /// A branch consuming the root, recorded as a polluting use.
    pub fn process_branch(&mut self, root: ValueId, func: FuncId, block: BlockId, pos: Pos) {
        self.mark_polluted(root, func, block, pos);
    }

    /// Whether pollution of `root` reaches the given block. Pollution
    /// recorded in a different function (a closure or a parent) is
    /// conservatively considered reaching.
    pub fn is_polluted_at(
        &self,
        root: ValueId,
        func: FuncId,
        block: BlockId,
        cfgs: &CfgCache,
    ) -> bool {
        let Some(origin) = self.origins.get(&root) else {
            return false;
        };
        origin.polluted_blocks.keys().any(|(pf, pb)| {
            if *pf == func {
                cfgs.get(func).reachable(*pb, block)
            } else {
                true
            }
        })
    }

    /// Whether the root was consumed anywhere in this analysis, nested
    /// closures included. Deferred calls run at function exit and observe
    /// all prior pollution.
    pub fn is_polluted_anywhere(&self, root: ValueId) -> bool {
        self.origins
            .get(&root)
            .is_some_and(|o| !o.polluted_blocks.is_empty())
    }

    /// Immediate violation at a call site. One report per (root, position).
    pub fn add_violation(&mut self, pos: Pos, root: ValueId) {
        if self.reported.insert((root, pos)) {
            self.violations
                .push(Violation::builder_reuse(pos, root, &self.session_constructor));
        }
    }

    /// After all recording: any pair of polluted blocks of one root where
    /// the source can reach the target yields a violation at the target.
    /// Across functions, direction comes from source-position order plus
    /// the closure-tree relationship; pairs with no identifiable
    /// direction are suppressed.
    pub fn detect_reachability_violations(&mut self, cfgs: &CfgCache) {
        let mut found: Vec<(Pos, ValueId)> = Vec::new();
        for (root, origin) in &self.origins {
            if origin.polluted_blocks.len() < 2 {
                continue;
            }
            for ((tf, tb), tpos) in &origin.polluted_blocks {
                let hit = origin.polluted_blocks.iter().any(|((sf, sb), spos)| {
                    if (sf, sb) == (tf, tb) {
                        return false;
                    }
                    if sf == tf {
                        cfgs.get(*sf).reachable(*sb, *tb)
                    } else {
                        spos < tpos && self.related(*sf, *tf)
                    }
                });
                if hit {
                    found.push((*tpos, *root));
                }
            }
        }
        for (pos, root) in found {
            self.add_violation(pos, root);
        }
    }

    /// Parent-to-closure, closure-to-parent, and sibling closures of the
    /// analyzed function all qualify.
    fn related(&self, a: FuncId, b: FuncId) -> bool {
        self.program.encloses(a, b)
            || self.program.encloses(b, a)
            || (self.program.encloses(self.analyzed, a) && self.program.encloses(self.analyzed, b))
    }

    /// Number of distinct roots with recorded state
    pub fn origin_count(&self) -> usize {
        self.origins.len()
    }

    pub fn uses_of(&self, root: ValueId) -> &[(Pos, UseKind)] {
        self.origins
            .get(&root)
            .map(|o| o.uses.as_slice())
            .unwrap_or(&[])
    }

    /// Flatten into the final report: source-position order, first-seen
    /// on ties, one record per position (alternative roots of one call
    /// site collapse into a single report), ignored lines dropped.
    pub fn collect(self, directives: &dyn Directives) -> Vec<Violation> {
        let mut violations = self.violations;
        violations.sort_by_key(|v| v.pos);
        let mut seen_pos = HashSet::new();
        violations.retain(|v| !directives.is_line_ignored(v.pos.line) && seen_pos.insert(v.pos));
        violations
    }
}
