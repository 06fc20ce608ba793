//! Change detail: the field-level diff handed to the rendering layer.
//!
//! Pure and independent of upstream visibility decisions; whatever survived
//! the filters gets a detail computed the same way. First-seen items produce
//! an empty detail.

use std::cmp::Ordering;

use epicdiff_types::{
    ChangeDetail, CommitmentDelta, FieldDelta, IterationShift, RatingDelta, RiskRating,
    TrackedItem,
};

use crate::label::parse_iteration_label;

/// Notes that read as "no concern"; a blank note turning into one of these is
/// suppressed.
fn is_on_track_note(note: &str) -> bool {
    matches!(note.trim().to_lowercase().as_str(), "on track" | "green")
}

fn note_change_is_noise(before: &str, after: &str) -> bool {
    before.trim().is_empty() && is_on_track_note(after)
}

/// Direction of a target move. `None` when the numbers match or either label
/// resists extraction.
fn iteration_shift(before: &str, after: &str) -> Option<IterationShift> {
    let before = parse_iteration_label(before)?;
    let after = parse_iteration_label(after)?;
    match after.cmp(&before) {
        Ordering::Less => Some(IterationShift::PulledIn),
        Ordering::Greater => Some(IterationShift::PushedOut),
        Ordering::Equal => None,
    }
}

/// Rating delta with noise suppression: blank to green is not a change.
fn rating_delta(before: RiskRating, after: RiskRating) -> Option<RatingDelta> {
    if before == after {
        return None;
    }
    if before == RiskRating::Blank && after == RiskRating::Green {
        return None;
    }
    Some(RatingDelta {
        before,
        after,
        mitigated: before.is_at_risk() && after == RiskRating::Green,
        newly_at_risk: !before.is_at_risk() && after.is_at_risk(),
    })
}

/// Build the diff for one item against its prior-iteration record.
pub fn build_detail(current: &TrackedItem, previous: Option<&TrackedItem>) -> ChangeDetail {
    let Some(previous) = previous else {
        return ChangeDetail::default();
    };
    let mut detail = ChangeDetail::default();

    if current.target_iteration != previous.target_iteration {
        detail.target_iteration = Some(FieldDelta::new(
            &previous.target_iteration,
            &current.target_iteration,
        ));
        detail.iteration_shift =
            iteration_shift(&previous.target_iteration, &current.target_iteration);
    }

    detail.risk_rating = rating_delta(previous.risk_rating, current.risk_rating);

    if current.risk_note != previous.risk_note
        && !note_change_is_noise(&previous.risk_note, &current.risk_note)
    {
        detail.risk_note = Some(FieldDelta::new(&previous.risk_note, &current.risk_note));
    }

    if current.dependency_team != previous.dependency_team {
        detail.dependency_team = Some(FieldDelta::new(
            &previous.dependency_team,
            &current.dependency_team,
        ));
    }
    if current.fix_version != previous.fix_version {
        detail.fix_version = Some(FieldDelta::new(&previous.fix_version, &current.fix_version));
    }
    if current.program_increment != previous.program_increment {
        detail.program_increment = Some(FieldDelta::new(
            &previous.program_increment,
            &current.program_increment,
        ));
    }

    if current.commitment != previous.commitment {
        detail.commitment = Some(CommitmentDelta {
            before: previous.commitment,
            after: current.commitment,
            newly_committed: !previous.commitment.is_committed()
                && current.commitment.is_committed(),
            decommitted: previous.commitment.is_committed()
                && !current.commitment.is_committed(),
        });
    }

    detail
}
