//! Repository events that can trigger a run.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// The recognized event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

/// An event delivered by the version-control host.
///
/// Events are created at the boundary (webhook payload, CLI flags) and
/// consumed once by the trigger evaluator. An unrecognized kind never
/// becomes an `Event` — construction fails and no run is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Push {
        branch: String,
    },
    PullRequest {
        #[serde(default)]
        source_branch: Option<String>,
        #[serde(default)]
        target_branch: Option<String>,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Push { .. } => EventKind::Push,
            Event::PullRequest { .. } => EventKind::PullRequest,
        }
    }

    /// Build an event from a raw kind string plus attributes.
    ///
    /// `push` requires a branch; `pull_request` accepts optional source and
    /// target branches. Anything else is rejected.
    pub fn from_kind(kind: &str, branch: Option<&str>) -> Result<Self> {
        match kind {
            "push" => {
                let branch = branch
                    .ok_or_else(|| Error::InvalidEvent("push event requires a branch".into()))?;
                Ok(Event::Push {
                    branch: branch.to_string(),
                })
            }
            "pull_request" => Ok(Event::PullRequest {
                source_branch: None,
                target_branch: branch.map(str::to_string),
            }),
            other => Err(Error::UnrecognizedEvent(other.to_string())),
        }
    }

    /// Human-readable one-liner for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Event::Push { branch } => format!("push to {}", branch),
            Event::PullRequest { target_branch, .. } => match target_branch {
                Some(target) => format!("pull request against {}", target),
                None => "pull request".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_kind_push() {
        let event = Event::from_kind("push", Some("main")).unwrap();
        assert_eq!(event.kind(), EventKind::Push);
        assert_eq!(
            event,
            Event::Push {
                branch: "main".to_string()
            }
        );
    }

    #[test]
    fn test_from_kind_push_requires_branch() {
        assert!(matches!(
            Event::from_kind("push", None),
            Err(Error::InvalidEvent(_))
        ));
    }

    #[test]
    fn test_from_kind_unrecognized() {
        let err = Event::from_kind("workflow_dispatch", None).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedEvent(k) if k == "workflow_dispatch"));
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let event = Event::PullRequest {
            source_branch: Some("feature/x".to_string()),
            target_branch: Some("main".to_string()),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
