//! Tolerance-based dimension matching against the catalog.
//!
//! A candidate qualifies when its shape matches and every gated dimension is
//! within `reference * (1 ± tolerance)`. Among qualifying pairings the one
//! with the smallest `|Δlength| + |Δwidth| + |Δheight|` wins; height adds to
//! the score but is never gated.

use sorter_traits::{Catalog, DetectedObject, TargetSpec, TargetStatus};
use tracing::{debug, info};

use crate::config::{MatchCfg, MatchMode};
use crate::error::SorterError;
use crate::hw_error::map_catalog_error;

/// Outcome of one match attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    found: bool,
    pub target_id: String,
    pub target_length_mm: f32,
    pub target_width_mm: f32,
    pub target_height_mm: f32,
    /// Summed absolute deviation of the winning pairing.
    pub deviation_mm: f32,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self::default()
    }

    fn hit(t: &TargetSpec, deviation_mm: f32) -> Self {
        Self {
            found: true,
            target_id: t.common_id.clone(),
            target_length_mm: t.length_mm,
            target_width_mm: t.width_mm,
            target_height_mm: t.height_mm,
            deviation_mm,
        }
    }

    pub const fn found(&self) -> bool {
        self.found
    }
}

#[inline]
fn within(value: f32, reference: f32, tol: f32) -> bool {
    value >= reference * (1.0 - tol) && value <= reference * (1.0 + tol)
}

/// Pair measured (length, width) with the candidate footprint in both orientations.
fn footprint_score(m: &DetectedObject, t: &TargetSpec, tol: f32) -> Option<f32> {
    let dh = (m.height_mm - t.height_mm).abs();
    [(m.length_mm, m.width_mm), (m.width_mm, m.length_mm)]
        .into_iter()
        .filter(|&(a, b)| within(a, t.length_mm, tol) && within(b, t.width_mm, tol))
        .map(|(a, b)| (a - t.length_mm).abs() + (b - t.width_mm).abs() + dh)
        .min_by(f32::total_cmp)
}

fn sorted_desc(mut v: [f32; 3]) -> [f32; 3] {
    v.sort_by(|a, b| b.total_cmp(a));
    v
}

/// Compare both triples sorted descending, skipping the slot the measured height landed in.
fn sorted_score(m: &DetectedObject, t: &TargetSpec, tol: f32) -> Option<f32> {
    let measured = sorted_desc([m.length_mm, m.width_mm, m.height_mm]);
    let height_slot = measured
        .iter()
        .position(|v| v.total_cmp(&m.height_mm).is_eq())
        .unwrap_or(2);
    let target = sorted_desc([t.length_mm, t.width_mm, t.height_mm]);

    let gated = (0..3)
        .filter(|&i| i != height_slot)
        .all(|i| within(measured[i], target[i], tol));
    gated.then(|| (0..3).map(|i| (measured[i] - target[i]).abs()).sum())
}

/// Pure matching over a catalog snapshot.
pub fn match_object(
    measured: &DetectedObject,
    candidates: &[TargetSpec],
    tolerance: f32,
    mode: MatchMode,
) -> MatchResult {
    let mut best: Option<(f32, &TargetSpec)> = None;
    for t in candidates {
        if t.status != TargetStatus::Pending || t.shape != measured.shape {
            continue;
        }
        let score = match mode {
            MatchMode::Footprint => footprint_score(measured, t, tolerance),
            MatchMode::SortedDimensions => sorted_score(measured, t, tolerance),
        };
        if let Some(s) = score
            && best.is_none_or(|(b, _)| s < b)
        {
            best = Some((s, t));
        }
    }
    best.map_or_else(MatchResult::not_found, |(s, t)| MatchResult::hit(t, s))
}

/// Catalog-facing match engine.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    cfg: MatchCfg,
}

impl Matcher {
    pub fn new(cfg: MatchCfg) -> Self {
        Self { cfg }
    }

    pub fn cfg(&self) -> &MatchCfg {
        &self.cfg
    }

    /// Fetch pending records and match `measured` against them.
    pub fn find(
        &self,
        catalog: &mut dyn Catalog,
        measured: &DetectedObject,
    ) -> Result<MatchResult, SorterError> {
        let candidates = catalog
            .fetch_pending(&self.cfg.status_filter)
            .map_err(|e| map_catalog_error(&*e))?;
        let res = match_object(measured, &candidates, self.cfg.tolerance, self.cfg.mode);
        if res.found() {
            info!(
                target_id = %res.target_id,
                deviation_mm = res.deviation_mm,
                candidates = candidates.len(),
                "catalog match"
            );
        } else {
            debug!(
                length_mm = measured.length_mm,
                width_mm = measured.width_mm,
                height_mm = measured.height_mm,
                shape = %measured.shape,
                candidates = candidates.len(),
                "no catalog match"
            );
        }
        Ok(res)
    }

    pub fn mark_processed(&self, catalog: &mut dyn Catalog, target_id: &str) -> Result<(), SorterError> {
        catalog
            .mark_processed(target_id)
            .map_err(|e| map_catalog_error(&*e))?;
        info!(target_id, "target marked processed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use sorter_traits::Shape;

    fn target(id: &str, l: f32, w: f32, h: f32, shape: Shape) -> TargetSpec {
        TargetSpec {
            common_id: id.into(),
            length_mm: l,
            width_mm: w,
            height_mm: h,
            shape,
            status: TargetStatus::Pending,
        }
    }

    fn measured(l: f32, w: f32, h: f32, shape: Shape) -> DetectedObject {
        DetectedObject {
            length_mm: l,
            width_mm: w,
            height_mm: h,
            shape,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(595.0, 405.0, 205.0, true, 15.0)]
    #[case(400.0, 600.0, 205.0, true, 5.0)]
    #[case(500.0, 500.0, 205.0, false, 0.0)]
    fn reference_candidate(
        #[case] l: f32,
        #[case] w: f32,
        #[case] h: f32,
        #[case] found: bool,
        #[case] deviation: f32,
    ) {
        let cands = [target("A", 600.0, 400.0, 200.0, Shape::Box)];
        let r = match_object(&measured(l, w, h, Shape::Box), &cands, 0.10, MatchMode::Footprint);
        assert_eq!(r.found(), found);
        if found {
            assert_eq!(r.target_id, "A");
            assert!((r.deviation_mm - deviation).abs() < 1e-3);
        }
    }

    #[test]
    fn shape_must_match() {
        let cands = [target("A", 600.0, 400.0, 200.0, Shape::Cylinder)];
        let r = match_object(
            &measured(600.0, 400.0, 200.0, Shape::Box),
            &cands,
            0.10,
            MatchMode::Footprint,
        );
        assert!(!r.found());
    }

    #[test]
    fn height_breaks_ties_but_does_not_gate() {
        let cands = [
            target("tall", 600.0, 400.0, 900.0, Shape::Box),
            target("flat", 600.0, 400.0, 210.0, Shape::Box),
        ];
        let r = match_object(
            &measured(600.0, 400.0, 200.0, Shape::Box),
            &cands,
            0.10,
            MatchMode::Footprint,
        );
        assert_eq!(r.target_id, "flat");

        let only_tall = [target("tall", 600.0, 400.0, 900.0, Shape::Box)];
        let r = match_object(
            &measured(600.0, 400.0, 200.0, Shape::Box),
            &only_tall,
            0.10,
            MatchMode::Footprint,
        );
        assert!(r.found());
        assert!((r.deviation_mm - 700.0).abs() < 1e-3);
    }

    #[test]
    fn processed_records_are_skipped() {
        let mut t = target("A", 600.0, 400.0, 200.0, Shape::Box);
        t.status = TargetStatus::Processed;
        let r = match_object(
            &measured(600.0, 400.0, 200.0, Shape::Box),
            &[t],
            0.10,
            MatchMode::Footprint,
        );
        assert!(!r.found());
    }

    #[test]
    fn sorted_mode_ignores_axis_order() {
        let cands = [target("A", 200.0, 600.0, 400.0, Shape::Box)];
        let r = match_object(
            &measured(400.0, 600.0, 210.0, Shape::Box),
            &cands,
            0.10,
            MatchMode::SortedDimensions,
        );
        assert!(r.found());
        assert!((r.deviation_mm - 10.0).abs() < 1e-3);

        let r = match_object(
            &measured(500.0, 500.0, 210.0, Shape::Box),
            &cands,
            0.10,
            MatchMode::SortedDimensions,
        );
        assert!(!r.found());
    }
}
