//! Event hierarchy projection.
//!
//! After the reaction pass, each inferred reaction is an orphan. The
//! projector rebuilds the ancestor pathway chain in four passes over the
//! touched nodes:
//!
//! 1. walk the referrer graph upward from every inferred reaction and
//!    materialize a target-species counterpart for each ancestor pathway,
//!    reusing the existing event where the source already links a
//!    target-species counterpart (from an earlier run, or a manually
//!    curated substitute of any class);
//! 2. populate the counterparts' child lists, additively;
//! 3. carry `preceding` links between events whose counterparts both exist;
//! 4. stamp every touched node, on both sides, with the run timestamp,
//!    exactly once.
//!
//! The passes are ordered so that child attachment and preceding links only
//! ever look up counterparts that pass 1 has already registered.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::entity::DbId;
use crate::error::{OrthoResult, StoreError};
use crate::event::{Event, EventCore, Pathway};
use crate::storage::OrthologyStore;

/// What the projector did, for the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProjectionStats {
    /// Ancestor pathways created this run.
    pub pathways_created: u32,

    /// Ancestor pathways reused from earlier runs.
    pub pathways_reused: u32,

    /// Child edges added to counterpart pathways.
    pub events_attached: u32,

    /// Preceding-event links carried over.
    pub preceding_carried: u32,

    /// Nodes stamped with the run timestamp (both sides counted).
    pub nodes_stamped: u32,
}

/// Rebuilds the pathway hierarchy above the reactions inferred this run.
pub struct HierarchyProjector<'a> {
    store: &'a dyn OrthologyStore,
    ctx: &'a mut RunContext,
}

impl<'a> HierarchyProjector<'a> {
    /// Creates a projector over the given store and run context.
    pub fn new(store: &'a dyn OrthologyStore, ctx: &'a mut RunContext) -> Self {
        Self { store, ctx }
    }

    /// Runs all four passes. Call once, after the reaction pass.
    pub fn project(&mut self) -> OrthoResult<ProjectionStats> {
        let mut stats = ProjectionStats::default();

        let touched = self.materialize_ancestors(&mut stats)?;
        self.attach_children(&touched, &mut stats)?;
        self.carry_preceding(&touched, &mut stats)?;
        self.stamp_touched(&touched, &mut stats)?;

        info!(
            created = stats.pathways_created,
            reused = stats.pathways_reused,
            attached = stats.events_attached,
            preceding = stats.preceding_carried,
            stamped = stats.nodes_stamped,
            "hierarchy projected"
        );
        Ok(stats)
    }

    /// Pass 1: walk upward from every counterpart registered by the reaction
    /// pass and ensure each ancestor pathway has a counterpart. Returns the
    /// touched source ids in first-seen order.
    fn materialize_ancestors(&mut self, stats: &mut ProjectionStats) -> OrthoResult<Vec<DbId>> {
        let mut roots: Vec<DbId> = self.ctx.event_counterparts.keys().copied().collect();
        roots.sort_unstable();

        let mut touched: Vec<DbId> = Vec::new();
        let mut seen: HashSet<DbId> = HashSet::new();
        for root in roots {
            if !seen.insert(root) {
                continue;
            }
            touched.push(root);

            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                for parent in self.store.pathways_containing(id)? {
                    self.ensure_pathway_counterpart(parent, stats)?;
                    if seen.insert(parent) {
                        touched.push(parent);
                        stack.push(parent);
                    }
                }
            }
        }
        Ok(touched)
    }

    /// Registers a counterpart for one source pathway, reusing the linked
    /// event when the source already carries a target-species orthology link,
    /// creating a fresh pathway otherwise.
    fn ensure_pathway_counterpart(
        &mut self,
        source_id: DbId,
        stats: &mut ProjectionStats,
    ) -> OrthoResult<()> {
        if self.ctx.event_counterparts.contains_key(&source_id) {
            return Ok(());
        }

        let source = self
            .store
            .event(source_id)?
            .ok_or(StoreError::NotFound(source_id))?;
        let Event::Pathway(source) = source else {
            return Err(StoreError::ClassMismatch {
                id: source_id,
                expected: "Pathway",
                actual: "Reaction",
            }
            .into());
        };

        let target = self.ctx.target_species();
        for candidate in &source.core.orthologous_event {
            let Some(event) = self.store.event(*candidate)? else {
                continue;
            };
            if event.core().species.as_ref() != Some(&target) {
                continue;
            }
            // A manually curated substitute may be any event class; it is
            // still the counterpart. Child attachment handles the class.
            debug!(
                source = %source_id,
                counterpart = %candidate,
                class = event.class_name(),
                "reusing existing counterpart"
            );
            self.ctx.event_counterparts.insert(source_id, *candidate);
            stats.pathways_reused += 1;
            return Ok(());
        }

        let mut core = EventCore::new(source.core.name.clone());
        core.species = Some(target);
        core.stable_id = self.ctx.mint_stable_id(source.core.stable_id.as_ref());
        core.go_biological_process = source.core.go_biological_process.clone();
        core.release_date = source.core.release_date.clone();
        core.add_inferred_from(source_id);
        core.add_orthologous_event(source_id);

        let inferred = self.store.insert_event(Event::Pathway(Pathway {
            core,
            has_event: Vec::new(),
        }))?;

        let mut src = self
            .store
            .event(source_id)?
            .ok_or(StoreError::NotFound(source_id))?;
        src.core_mut().add_orthologous_event(inferred);
        self.store.update_event(src)?;

        debug!(source = %source_id, inferred = %inferred, "pathway counterpart created");
        self.ctx.event_counterparts.insert(source_id, inferred);
        stats.pathways_created += 1;
        Ok(())
    }

    /// Pass 2: mirror each source pathway's child list onto its counterpart,
    /// for children that have counterparts. Additive: edges already present
    /// (from earlier runs) are kept, never reordered or removed.
    fn attach_children(&mut self, touched: &[DbId], stats: &mut ProjectionStats) -> OrthoResult<()> {
        for &source_id in touched {
            let source = self
                .store
                .event(source_id)?
                .ok_or(StoreError::NotFound(source_id))?;
            let Event::Pathway(source) = source else {
                continue;
            };
            let Some(&counterpart_id) = self.ctx.event_counterparts.get(&source_id) else {
                continue;
            };

            let counterpart = self
                .store
                .event(counterpart_id)?
                .ok_or(StoreError::NotFound(counterpart_id))?;
            let Event::Pathway(mut counterpart) = counterpart else {
                warn!(
                    source = %source_id,
                    counterpart = %counterpart_id,
                    "counterpart is not a pathway, children not attached"
                );
                continue;
            };

            let before = counterpart.has_event.len();
            for child in &source.has_event {
                if let Some(&child_counterpart) = self.ctx.event_counterparts.get(child) {
                    counterpart.add_event(child_counterpart);
                }
            }
            let added = counterpart.has_event.len() - before;
            if added > 0 {
                #[allow(clippy::cast_possible_truncation)]
                {
                    stats.events_attached += added as u32;
                }
                self.store.update_event(Event::Pathway(counterpart))?;
            }
        }
        Ok(())
    }

    /// Pass 3: carry `preceding` links between counterparts. A preceding
    /// event without a counterpart is silently omitted.
    fn carry_preceding(&mut self, touched: &[DbId], stats: &mut ProjectionStats) -> OrthoResult<()> {
        for &source_id in touched {
            let Some(&counterpart_id) = self.ctx.event_counterparts.get(&source_id) else {
                continue;
            };
            let source = self
                .store
                .event(source_id)?
                .ok_or(StoreError::NotFound(source_id))?;
            if source.core().preceding.is_empty() {
                continue;
            }

            let mut counterpart = self
                .store
                .event(counterpart_id)?
                .ok_or(StoreError::NotFound(counterpart_id))?;
            let before = counterpart.core().preceding.len();
            for preceding in &source.core().preceding {
                if let Some(&preceding_counterpart) = self.ctx.event_counterparts.get(preceding) {
                    counterpart.core_mut().add_preceding(preceding_counterpart);
                }
            }
            let added = counterpart.core().preceding.len() - before;
            if added > 0 {
                #[allow(clippy::cast_possible_truncation)]
                {
                    stats.preceding_carried += added as u32;
                }
                self.store.update_event(counterpart)?;
            }
        }
        Ok(())
    }

    /// Pass 4: append the run timestamp to every touched node and its
    /// counterpart, exactly once each.
    fn stamp_touched(&mut self, touched: &[DbId], stats: &mut ProjectionStats) -> OrthoResult<()> {
        let mut stamped: HashSet<DbId> = HashSet::new();
        for &source_id in touched {
            let mut ids = vec![source_id];
            if let Some(&counterpart) = self.ctx.event_counterparts.get(&source_id) {
                ids.push(counterpart);
            }
            for id in ids {
                if !stamped.insert(id) {
                    continue;
                }
                let mut event = self
                    .store
                    .event(id)?
                    .ok_or(StoreError::NotFound(id))?;
                if event.core().modified.contains(&self.ctx.run_stamp) {
                    continue;
                }
                event.core_mut().modified.push(self.ctx.run_stamp);
                self.store.update_event(event)?;
                stats.nodes_stamped += 1;
            }
        }
        Ok(())
    }
}
