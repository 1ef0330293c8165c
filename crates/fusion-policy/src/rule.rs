use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use dropwatch_core_types::{LayerId, VerdictDetails};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::PolicyError;

/// How verdicts combine into `found`.
///
/// ```yaml
/// fusion:
///   rule: conjunctive
///   layers: [structured-metadata, status-text]
///   agree_on: [price]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum FusionRule {
    /// Only the designated layer governs. Without a name, the first verdict
    /// whose layer declares the authoritative role governs.
    Authoritative {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer: Option<LayerId>,
    },
    AnyPositive,
    /// Every listed layer must be positive and agree on the listed fields.
    Conjunctive {
        layers: Vec<LayerId>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        agree_on: Vec<AgreementField>,
    },
}

impl Default for FusionRule {
    fn default() -> Self {
        Self::Authoritative { layer: None }
    }
}

impl fmt::Display for FusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authoritative { layer: Some(layer) } => write!(f, "authoritative({layer})"),
            Self::Authoritative { layer: None } => f.write_str("authoritative(role)"),
            Self::AnyPositive => f.write_str("any-positive"),
            Self::Conjunctive { layers, agree_on } => {
                let names: Vec<&str> = layers.iter().map(LayerId::as_str).collect();
                write!(f, "conjunctive({})", names.join(" & "))?;
                if !agree_on.is_empty() {
                    let fields: Vec<&str> = agree_on.iter().map(|field| field.as_str()).collect();
                    write!(f, " agree on {}", fields.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

/// Short command-line form: `any-positive`, `authoritative`,
/// `authoritative:<layer>`, `conjunctive:<a>,<b>[@price,currency]`.
impl FromStr for FusionRule {
    type Err = PolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (kind, args) = match value.split_once(':') {
            Some((kind, args)) => (kind, Some(args)),
            None => (value, None),
        };
        match (kind, args) {
            ("any-positive", None) => Ok(Self::AnyPositive),
            ("authoritative", None) => Ok(Self::Authoritative { layer: None }),
            ("authoritative", Some(layer)) if !layer.trim().is_empty() => Ok(Self::Authoritative {
                layer: Some(LayerId::new(layer.trim())),
            }),
            ("conjunctive", Some(args)) => {
                let (layers, fields) = match args.split_once('@') {
                    Some((layers, fields)) => (layers, Some(fields)),
                    None => (args, None),
                };
                let layers = split_list(layers).map(LayerId::new).collect::<Vec<_>>();
                if layers.is_empty() {
                    return Err(PolicyError::EmptyConjunction);
                }
                let agree_on = match fields {
                    Some(fields) => split_list(fields)
                        .map(AgreementField::from_str)
                        .collect::<Result<Vec<_>, _>>()?,
                    None => Vec::new(),
                };
                Ok(Self::Conjunctive { layers, agree_on })
            }
            _ => Err(PolicyError::Invalid(value.to_string())),
        }
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Field the conjunctive layers' offers must have in common.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementField {
    Price,
    Currency,
    Domain,
}

impl AgreementField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Currency => "currency",
            Self::Domain => "domain",
        }
    }

    /// Normalised values this field takes across the offers in `details`.
    pub(crate) fn values(self, details: &VerdictDetails) -> BTreeSet<String> {
        match self {
            Self::Price => details.prices().map(normalize_price).collect(),
            Self::Currency => details
                .currencies()
                .map(|currency| currency.trim().to_uppercase())
                .collect(),
            Self::Domain => details.urls().filter_map(host_of).collect(),
        }
    }
}

impl FromStr for AgreementField {
    type Err = PolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "currency" => Ok(Self::Currency),
            "domain" => Ok(Self::Domain),
            other => Err(PolicyError::Invalid(format!("unknown agreement field `{other}`"))),
        }
    }
}

/// Canonical decimal text, so `45`, `45.0` and `45.00` compare equal.
/// Anything that is not a plain decimal is kept as written.
fn normalize_price(price: &str) -> String {
    let cleaned: String = price
        .chars()
        .filter(|ch| *ch != ',' && !ch.is_whitespace())
        .collect();
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
    let is_digits = |part: &str| part.chars().all(|ch| ch.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return cleaned;
    }

    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    match fraction.trim_end_matches('0') {
        "" => whole.to_string(),
        fraction => format!("{whole}.{fraction}"),
    }
}

fn host_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}
