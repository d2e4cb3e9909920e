use serde::{Deserialize, Serialize};

use crate::{
    feature::{ConstraintMode, Feature, Segment, SegmentType},
    sharder::{in_percentage, Crc32Sharder, Sharder},
    User,
};

/// The branch of an experiment a user ended up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Branch {
    /// The feature is inactive for the user.
    Control,
    /// The feature is active for the user.
    Experiment,
}

impl Branch {
    /// Wire name of the branch.
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Control => "control",
            Branch::Experiment => "experiment",
        }
    }
}

impl From<bool> for Branch {
    fn from(active: bool) -> Branch {
        if active {
            Branch::Experiment
        } else {
            Branch::Control
        }
    }
}

/// Result of evaluating a feature for a user, along with what analytics events need to know
/// about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Server-issued id of the evaluated feature.
    pub feature_id: String,
    /// Key of the evaluated feature.
    pub feature_key: String,
    /// Whether the feature is active for the user.
    pub active: bool,
    /// Branch corresponding to `active`.
    pub branch: Branch,
}

impl Feature {
    /// Return `true` if the feature is active for `user`.
    ///
    /// Without a user, an active feature is on for everybody.
    pub fn is_active(&self, user: Option<&User>) -> bool {
        self.is_active_with_sharder(user, &Crc32Sharder)
    }

    /// Evaluate the feature for `user`.
    pub fn evaluate(&self, user: Option<&User>) -> Evaluation {
        let active = self.is_active(user);

        log::trace!(target: "molasses",
                    feature_key:display = self.key,
                    user_id = user.map(|u| u.id.as_str()),
                    active;
                    "evaluated a feature");

        Evaluation {
            feature_id: self.id.clone(),
            feature_key: self.key.clone(),
            active,
            branch: active.into(),
        }
    }

    pub(crate) fn is_active_with_sharder(&self, user: Option<&User>, sharder: &impl Sharder) -> bool {
        if !self.active {
            return false;
        }
        let Some(user) = user else {
            return true;
        };

        let mut always_control = None;
        let mut always_experiment = None;
        let mut everyone_else = None;
        // Later segments of the same type replace earlier ones.
        for segment in &self.segments {
            match segment.segment_type {
                SegmentType::AlwaysControl => always_control = Some(segment),
                SegmentType::AlwaysExperiment => always_experiment = Some(segment),
                SegmentType::EveryoneElse => everyone_else = Some(segment),
                SegmentType::Unknown => {}
            }
        }

        if always_control.is_some_and(|segment| segment.matches(user)) {
            return false;
        }
        if always_experiment.is_some_and(|segment| segment.matches(user)) {
            return true;
        }

        let percentage = everyone_else.map_or(0, |segment| segment.percentage);
        in_percentage(sharder, &user.id, percentage)
    }
}

impl Segment {
    /// Return `true` if `user` falls inside the segment.
    ///
    /// With [`ConstraintMode::All`] a segment without constraints matches everybody. With
    /// [`ConstraintMode::Any`] it matches nobody.
    pub fn matches(&self, user: &User) -> bool {
        let required = match self.constraint_mode {
            ConstraintMode::Any => 1,
            ConstraintMode::All | ConstraintMode::Unknown => self.user_constraints.len(),
        };

        let met = self
            .user_constraints
            .iter()
            .filter(|constraint| constraint.meets(user.resolve(&constraint.user_param).as_deref()))
            .count();

        met >= required
    }
}
