use std::collections::BTreeSet;

use dropwatch_core_types::{
    Classification, FusionResult, LayerId, LayerRole, LayerVerdict, VerdictDetails,
};
use serde::{Deserialize, Serialize};

use crate::errors::PolicyError;
use crate::rule::{AgreementField, FusionRule};

/// Outcome of a rule before it is packaged into a `FusionResult`.
struct Decision {
    found: bool,
    ambiguous: bool,
    contributing: Vec<LayerId>,
}

impl Decision {
    fn found(contributing: Vec<LayerId>) -> Self {
        Self {
            found: true,
            ambiguous: false,
            contributing,
        }
    }

    fn not_found() -> Self {
        Self {
            found: false,
            ambiguous: false,
            contributing: Vec::new(),
        }
    }

    fn ambiguous() -> Self {
        Self {
            found: false,
            ambiguous: true,
            contributing: Vec::new(),
        }
    }
}

/// The active fusion rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FusionPolicy {
    rule: FusionRule,
}

impl FusionPolicy {
    pub fn new(rule: FusionRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &FusionRule {
        &self.rule
    }

    /// Checks the rule against the layers that will actually be evaluated.
    pub fn validate(&self, registered: &[LayerId]) -> Result<(), PolicyError> {
        let known = |layer: &LayerId| -> Result<(), PolicyError> {
            if registered.contains(layer) {
                Ok(())
            } else {
                Err(PolicyError::UnknownLayer(layer.to_string()))
            }
        };
        match &self.rule {
            FusionRule::Authoritative { layer: Some(layer) } => known(layer),
            FusionRule::Authoritative { layer: None } | FusionRule::AnyPositive => Ok(()),
            FusionRule::Conjunctive { layers, .. } => {
                if layers.is_empty() {
                    return Err(PolicyError::EmptyConjunction);
                }
                layers.iter().try_for_each(known)
            }
        }
    }

    /// Combines an ordered verdict list into one decision. Pure: the result
    /// depends only on `verdicts` and the rule.
    pub fn decide(&self, verdicts: &[LayerVerdict]) -> FusionResult {
        let decision = match &self.rule {
            FusionRule::Authoritative { layer } => authoritative(verdicts, layer.as_ref()),
            FusionRule::AnyPositive => any_positive(verdicts),
            FusionRule::Conjunctive { layers, agree_on } => {
                conjunctive(verdicts, layers, agree_on)
            }
        };

        let mut details = VerdictDetails::default();
        for verdict in verdicts.iter().filter(|verdict| verdict.is_positive()) {
            if let Some(extra) = &verdict.details {
                details.merge(extra);
            }
        }

        FusionResult {
            found: decision.found,
            ambiguous: decision.ambiguous,
            rule: self.rule.to_string(),
            contributing: decision.contributing,
            details,
            evaluated_at: verdicts
                .iter()
                .map(|verdict| verdict.observed_at)
                .max()
                .unwrap_or_default(),
            verdicts: verdicts.to_vec(),
        }
    }
}

fn authoritative(verdicts: &[LayerVerdict], layer: Option<&LayerId>) -> Decision {
    let governing = match layer {
        Some(layer) => verdicts.iter().find(|verdict| &verdict.layer == layer),
        None => verdicts
            .iter()
            .find(|verdict| verdict.role == LayerRole::Authoritative),
    };
    match governing.map(|verdict| (verdict, verdict.classification)) {
        Some((verdict, Classification::Positive)) => Decision::found(vec![verdict.layer.clone()]),
        Some((_, Classification::Negative)) => Decision::not_found(),
        _ => Decision::ambiguous(),
    }
}

fn any_positive(verdicts: &[LayerVerdict]) -> Decision {
    let positives: Vec<LayerId> = verdicts
        .iter()
        .filter(|verdict| verdict.is_positive())
        .map(|verdict| verdict.layer.clone())
        .collect();
    if !positives.is_empty() {
        Decision::found(positives)
    } else if verdicts.iter().any(|verdict| verdict.classification.is_usable()) {
        Decision::not_found()
    } else {
        Decision::ambiguous()
    }
}

fn conjunctive(
    verdicts: &[LayerVerdict],
    layers: &[LayerId],
    agree_on: &[AgreementField],
) -> Decision {
    let required: Vec<Option<&LayerVerdict>> = layers
        .iter()
        .map(|layer| verdicts.iter().find(|verdict| &verdict.layer == layer))
        .collect();

    let negative = required
        .iter()
        .flatten()
        .any(|verdict| verdict.classification == Classification::Negative);
    if negative {
        return Decision::not_found();
    }
    let all_positive = !required.is_empty()
        && required
            .iter()
            .all(|verdict| verdict.map_or(false, LayerVerdict::is_positive));
    if !all_positive {
        return Decision::ambiguous();
    }

    let positives: Vec<&LayerVerdict> = required.into_iter().flatten().collect();
    if agree_on.iter().all(|field| agrees(&positives, *field)) {
        Decision::found(positives.iter().map(|verdict| verdict.layer.clone()).collect())
    } else {
        Decision::not_found()
    }
}

/// Every verdict shares at least one normalised value for `field`.
fn agrees(verdicts: &[&LayerVerdict], field: AgreementField) -> bool {
    let mut common: Option<BTreeSet<String>> = None;
    for verdict in verdicts {
        let values = verdict
            .details
            .as_ref()
            .map(|details| field.values(details))
            .unwrap_or_default();
        common = Some(match common {
            Some(acc) => acc.intersection(&values).cloned().collect(),
            None => values,
        });
    }
    common.map_or(false, |values| !values.is_empty())
}
