//! Selector precedence resolution
//!
//! A target object can carry two competing selection mechanisms: the
//! deprecated label selector and the modern target reference. [`resolve`]
//! reduces them to a single governing selector plus the condition changes to
//! apply on the stored target. It is a pure function over the fetch
//! outcomes, independent of storage and transport, so the whole decision
//! table is unit-tested exhaustively.

use crate::model::{ConditionKind, Selector};

/// One condition change produced by resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionDelta {
    /// Add the condition, or replace its message if already present.
    Set {
        kind: ConditionKind,
        message: String,
    },
    /// Remove the condition if present; no-op otherwise.
    Clear { kind: ConditionKind },
}

/// Outcome of selector resolution for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub selector: Selector,
    pub conditions: Vec<ConditionDelta>,
}

/// Resolve which selection mechanism governs a target.
///
/// `modern` is the selector derived from the target reference (`None` when
/// absent or when its fetch failed), `legacy_present` whether the deprecated
/// label-selector mechanism produced a selector, and `fetch_error` the
/// modern fetch failure text, surfaced in the condition message. A legacy
/// fetch error is logged by the caller and never changes the selected row.
pub fn resolve(
    modern: Option<Selector>,
    legacy_present: bool,
    fetch_error: Option<&str>,
) -> Resolution {
    if let Some(selector) = modern {
        if legacy_present {
            return Resolution {
                selector: Selector::nothing(),
                conditions: vec![
                    ConditionDelta::Set {
                        kind: ConditionKind::ConfigUnsupported,
                        message: "Both targetRef and label selector defined. \
                                  Please remove label selector"
                            .to_string(),
                    },
                    ConditionDelta::Clear {
                        kind: ConditionKind::ConfigDeprecated,
                    },
                ],
            };
        }
        return Resolution {
            selector,
            conditions: vec![
                ConditionDelta::Clear {
                    kind: ConditionKind::ConfigUnsupported,
                },
                ConditionDelta::Clear {
                    kind: ConditionKind::ConfigDeprecated,
                },
            ],
        };
    }
    if legacy_present {
        return Resolution {
            selector: Selector::nothing(),
            conditions: vec![
                ConditionDelta::Set {
                    kind: ConditionKind::ConfigUnsupported,
                    message: "Label selector is no longer supported, \
                              please migrate to targetRef"
                        .to_string(),
                },
                ConditionDelta::Clear {
                    kind: ConditionKind::ConfigDeprecated,
                },
            ],
        };
    }
    let message = match fetch_error {
        Some(reason) => format!("Cannot read targetRef. Reason: {reason}"),
        None => "Cannot read targetRef".to_string(),
    };
    Resolution {
        selector: Selector::nothing(),
        conditions: vec![
            ConditionDelta::Set {
                kind: ConditionKind::ConfigUnsupported,
                message,
            },
            ConditionDelta::Clear {
                kind: ConditionKind::ConfigDeprecated,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modern_selector() -> Selector {
        Selector::match_labels([("app", "web")])
    }

    fn set_message(resolution: &Resolution, kind: ConditionKind) -> Option<&str> {
        resolution.conditions.iter().find_map(|delta| match delta {
            ConditionDelta::Set { kind: k, message } if *k == kind => Some(message.as_str()),
            _ => None,
        })
    }

    fn clears(resolution: &Resolution, kind: ConditionKind) -> bool {
        resolution
            .conditions
            .iter()
            .any(|delta| *delta == ConditionDelta::Clear { kind })
    }

    #[test]
    fn test_both_mechanisms_defined() {
        let resolution = resolve(Some(modern_selector()), true, None);

        assert_eq!(resolution.selector, Selector::Nothing);
        assert_eq!(
            set_message(&resolution, ConditionKind::ConfigUnsupported),
            Some("Both targetRef and label selector defined. Please remove label selector")
        );
        assert!(clears(&resolution, ConditionKind::ConfigDeprecated));
    }

    #[test]
    fn test_modern_only() {
        let resolution = resolve(Some(modern_selector()), false, None);

        assert_eq!(resolution.selector, modern_selector());
        assert!(clears(&resolution, ConditionKind::ConfigUnsupported));
        assert!(clears(&resolution, ConditionKind::ConfigDeprecated));
    }

    #[test]
    fn test_legacy_only() {
        let resolution = resolve(None, true, None);

        assert_eq!(resolution.selector, Selector::Nothing);
        assert_eq!(
            set_message(&resolution, ConditionKind::ConfigUnsupported),
            Some("Label selector is no longer supported, please migrate to targetRef")
        );
        assert!(clears(&resolution, ConditionKind::ConfigDeprecated));
    }

    #[test]
    fn test_neither_mechanism() {
        let resolution = resolve(None, false, None);

        assert_eq!(resolution.selector, Selector::Nothing);
        assert_eq!(
            set_message(&resolution, ConditionKind::ConfigUnsupported),
            Some("Cannot read targetRef")
        );
        assert!(clears(&resolution, ConditionKind::ConfigDeprecated));
    }

    #[test]
    fn test_neither_mechanism_with_fetch_error() {
        let resolution = resolve(None, false, Some("workload not found"));

        assert_eq!(resolution.selector, Selector::Nothing);
        assert_eq!(
            set_message(&resolution, ConditionKind::ConfigUnsupported),
            Some("Cannot read targetRef. Reason: workload not found")
        );
    }

    #[test]
    fn test_fetch_error_ignored_when_modern_present() {
        // A stale error string must not demote a successfully fetched selector.
        let resolution = resolve(Some(modern_selector()), false, Some("transient"));
        assert_eq!(resolution.selector, modern_selector());
        assert!(clears(&resolution, ConditionKind::ConfigUnsupported));
    }
}
