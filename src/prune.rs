use crate::config::SelectorPolicy;
use crate::domain::{ALL_PROJECTS, FlowcellRun, Lane, LaneSelector};

pub fn lane_matches(lane: &Lane, selector: &LaneSelector, policy: SelectorPolicy) -> bool {
    match selector {
        LaneSelector::Description(desc) if desc == ALL_PROJECTS => {
            policy.all_includes_undescribed || !lane.description.trim().is_empty()
        }
        LaneSelector::Description(desc) => lane.description == *desc,
        LaneSelector::Lanes(lanes) => lanes.contains(&lane.name),
    }
}

pub fn prune_lane(lane: &Lane, selector: &LaneSelector, policy: SelectorPolicy) -> Option<Lane> {
    lane_matches(lane, selector, policy).then(|| lane.clone())
}

/// New flowcell holding only the selected lanes, or `None` when nothing matches.
pub fn prune(
    fc: &FlowcellRun,
    selector: &LaneSelector,
    policy: SelectorPolicy,
) -> Option<FlowcellRun> {
    let lanes = fc
        .lanes()
        .iter()
        .filter_map(|lane| prune_lane(lane, selector, policy))
        .collect::<Vec<_>>();
    if lanes.is_empty() {
        return None;
    }
    Some(
        FlowcellRun::new(fc.name(), fc.date(), fc.directory(), lanes)
            .with_results_dir(fc.results_dir()),
    )
}
