//! Step planning: metadata → the ordered list of pages to capture.
//!
//! Pure and deterministic. The plan follows natural playback order:
//! frame order for frame-based decks, slide-major/effect-minor for
//! build-step decks, where effect 0 is the slide before any reveal.
//! Step indices are 1-based and dense across the whole plan.

use crate::presentation::{CaptureStep, NavigationAddress, PresentationMetadata, StructureData};

/// Plan the capture sequence for `metadata`.
///
/// `Unknown` yields an empty plan. So does a frame-based deck with no
/// frames. Callers must treat an empty plan as a failure, never as a
/// zero-page success.
pub fn plan(metadata: &PresentationMetadata) -> Vec<CaptureStep> {
    let targets: Vec<NavigationAddress> = match &metadata.structure {
        StructureData::Unknown => Vec::new(),
        StructureData::Frames(ids) => ids
            .iter()
            .map(|id| NavigationAddress::Frame { id: id.clone() })
            .collect(),
        StructureData::Effects(counts) => counts
            .iter()
            .enumerate()
            .flat_map(|(i, &effects)| {
                (0..=effects as usize).map(move |effect| NavigationAddress::Slide {
                    slide: i + 1,
                    effect,
                })
            })
            .collect(),
    };

    targets
        .into_iter()
        .enumerate()
        .map(|(i, target)| CaptureStep {
            index: i + 1,
            target,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::DEFAULT_VIEWPORT;

    fn frames(ids: &[&str]) -> PresentationMetadata {
        PresentationMetadata::frames(
            ids.iter().map(|s| s.to_string()).collect(),
            1024,
            768,
            DEFAULT_VIEWPORT,
        )
    }

    fn effects(counts: &[u32]) -> PresentationMetadata {
        PresentationMetadata::effects(counts.to_vec(), 1024, 768, DEFAULT_VIEWPORT)
    }

    fn fragments(steps: &[CaptureStep]) -> Vec<String> {
        steps.iter().map(|s| s.target.to_string()).collect()
    }

    #[test]
    fn unknown_plans_nothing() {
        assert!(plan(&PresentationMetadata::unknown()).is_empty());
    }

    #[test]
    fn frames_in_declared_order() {
        let steps = plan(&frames(&["intro", "body", "end"]));
        assert_eq!(fragments(&steps), vec!["#intro", "#body", "#end"]);
    }

    #[test]
    fn frames_not_reordered() {
        let steps = plan(&frames(&["z", "a", "m"]));
        assert_eq!(fragments(&steps), vec!["#z", "#a", "#m"]);
    }

    #[test]
    fn zero_frames_plans_nothing() {
        assert!(plan(&frames(&[])).is_empty());
    }

    #[test]
    fn effects_are_slide_major_including_unrevealed_state() {
        let steps = plan(&effects(&[0, 2]));
        assert_eq!(fragments(&steps), vec!["#1_0", "#2_0", "#2_1", "#2_2"]);
    }

    #[test]
    fn effect_step_count_is_sum_plus_slides() {
        let counts = [3, 0, 1, 5, 0];
        let steps = plan(&effects(&counts));
        let expected: u32 = counts.iter().sum::<u32>() + counts.len() as u32;
        assert_eq!(steps.len(), expected as usize);

        for step in &steps {
            match step.target {
                NavigationAddress::Slide { slide, effect } => {
                    assert!(effect <= counts[slide - 1] as usize);
                }
                _ => panic!("unexpected target {:?}", step.target),
            }
        }
    }

    #[test]
    fn indices_are_dense_and_one_based() {
        let steps = plan(&effects(&[1, 1, 1]));
        let indices: Vec<usize> = steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, (1..=6).collect::<Vec<_>>());
    }

    #[test]
    fn viewport_does_not_affect_plan() {
        let small = PresentationMetadata::effects(vec![2], 320, 240, DEFAULT_VIEWPORT);
        let large = PresentationMetadata::effects(vec![2], 3840, 2160, DEFAULT_VIEWPORT);
        assert_eq!(plan(&small), plan(&large));
    }
}
