//! Default ladder policy: which resolution rungs to produce for a given
//! source, after filtering out rungs already present (idempotent re-run) and
//! rungs that would upscale.

use std::collections::HashSet;

use crate::models::Resolution;

/// Filters the default ladder for a source of `source_height`, skipping rungs
/// that exceed the source height (no upscaling) and rungs already present in
/// `existing` (an idempotent re-run doesn't duplicate completed rungs).
pub fn plan(source_height: u32, existing: &HashSet<Resolution>) -> Vec<Resolution> {
    Resolution::ALL
        .into_iter()
        .filter(|r| r.target_height() <= source_height)
        .filter(|r| !existing.contains(r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_upscale_rungs() {
        let plan = plan(700, &HashSet::new());
        assert_eq!(plan, vec![Resolution::Sd]);
    }

    #[test]
    fn full_ladder_for_4k_source() {
        let plan = plan(2160, &HashSet::new());
        assert_eq!(
            plan,
            vec![
                Resolution::Sd,
                Resolution::Hd,
                Resolution::Fhd,
                Resolution::Uhd
            ]
        );
    }

    #[test]
    fn skips_existing_rungs_on_resume() {
        let mut existing = HashSet::new();
        existing.insert(Resolution::Sd);
        let plan = plan(1080, &existing);
        assert_eq!(plan, vec![Resolution::Hd, Resolution::Fhd]);
    }
}
