// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Folds the outcomes of one reconcile pass into the cluster status.

use crate::domain::api::status::format_timestamp;
use crate::domain::api::{
    ClusterVersionStatus, Condition, HostedClusterStatus, LocalObjectReference, Release,
    UpdateHistory, UpdateState, CONDITION_AVAILABLE, CONDITION_DEGRADED,
    CONDITION_RECONCILIATION_SUCCEEDED, CONDITION_VALID_CONFIGURATION,
};
use crate::shared::error::HcpError;
use chrono::{DateTime, Utc};
use std::fmt;

const REASON_AS_EXPECTED: &str = "AsExpected";
const REASON_RECONCILED: &str = "ReconciliationSucceeded";
const REASON_COMPONENTS_FAILING: &str = "ComponentsFailing";
const REASON_WAITING: &str = "WaitingForComponents";

/// What a successful step did to its object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Unchanged,
    Written,
    Deleted,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Unchanged => write!(f, "unchanged"),
            StepOutcome::Written => write!(f, "written"),
            StepOutcome::Deleted => write!(f, "deleted"),
        }
    }
}

/// Result of one component step, keyed by `<kind>/<name>`.
#[derive(Debug)]
pub struct ComponentOutcome {
    pub component: String,
    pub result: Result<StepOutcome, HcpError>,
}

impl ComponentOutcome {
    pub fn new(component: impl Into<String>, result: Result<StepOutcome, HcpError>) -> Self {
        Self {
            component: component.into(),
            result,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything the status fold needs to know about a pass.
#[derive(Debug)]
pub struct PassReport {
    pub generation: i64,
    /// Set when the desired state was rejected before any write.
    pub invalid: Option<HcpError>,
    pub outcomes: Vec<ComponentOutcome>,
    pub kubeconfig: Option<LocalObjectReference>,
}

impl PassReport {
    pub fn new(generation: i64) -> Self {
        Self {
            generation,
            invalid: None,
            outcomes: Vec::new(),
            kubeconfig: None,
        }
    }

    pub fn invalid(generation: i64, err: HcpError) -> Self {
        Self {
            invalid: Some(err),
            ..Self::new(generation)
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &HcpError)> + '_ {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.component.as_str(), e)))
    }

    pub fn succeeded(&self) -> bool {
        self.invalid.is_none() && self.failures().next().is_none()
    }

    pub fn writes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(StepOutcome::Written) | Ok(StepOutcome::Deleted)))
            .count()
    }

    /// The error that drives the requeue decision, if any.
    pub fn first_error(&self) -> Option<&HcpError> {
        self.invalid
            .as_ref()
            .or_else(|| self.failures().next().map(|(_, e)| e))
    }
}

/// Whether a pass that observed `generation` may write status over `live`.
pub fn may_write_status(live: Option<&HostedClusterStatus>, generation: i64) -> bool {
    let recorded = live.and_then(|s| s.observed_generation()).unwrap_or(0);
    let condition_generation = live
        .into_iter()
        .flat_map(|s| s.conditions.iter())
        .filter_map(|c| c.observed_generation)
        .max()
        .unwrap_or(0);
    generation >= recorded && generation >= condition_generation
}

/// Upsert a condition, keeping the transition time while status holds.
fn set_condition(conditions: &mut Vec<Condition>, mut next: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == next.type_) {
        Some(current) => {
            if current.status == next.status {
                next.last_transition_time = current.last_transition_time.clone();
            }
            *current = next;
        }
        None => conditions.push(next),
    }
}

fn failure_message(report: &PassReport) -> (String, &'static str) {
    let failed: Vec<&str> = report.failures().map(|(component, _)| component).collect();
    let reason = report
        .failures()
        .next()
        .map(|(_, e)| e.condition_reason())
        .unwrap_or(REASON_COMPONENTS_FAILING);
    let details: Vec<String> = report
        .failures()
        .map(|(component, err)| format!("{}: {}", component, err))
        .collect();
    let message = format!(
        "{} of {} steps failed ({}): {}",
        failed.len(),
        report.outcomes.len(),
        failed.join(", "),
        details.join("; ")
    );
    (message, reason)
}

/// Compute the status for `report`.
///
/// `observedGeneration` only advances when every step succeeded; otherwise
/// the previous value stays, and the failing steps are named in the
/// conditions. History is newest first and bounded by `history_limit`.
pub fn fold_status(
    previous: Option<&HostedClusterStatus>,
    release: &Release,
    report: &PassReport,
    history_limit: usize,
    now: DateTime<Utc>,
) -> HostedClusterStatus {
    let mut status = previous.cloned().unwrap_or_default();
    let generation = Some(report.generation);
    let succeeded = report.succeeded();

    match &report.invalid {
        Some(err) => {
            set_condition(
                &mut status.conditions,
                Condition::new(
                    CONDITION_VALID_CONFIGURATION,
                    false,
                    err.condition_reason(),
                    err.to_string(),
                    generation,
                    now,
                ),
            );
            set_condition(
                &mut status.conditions,
                Condition::new(
                    CONDITION_RECONCILIATION_SUCCEEDED,
                    false,
                    err.condition_reason(),
                    "desired state rejected, nothing was applied",
                    generation,
                    now,
                ),
            );
        }
        None => {
            set_condition(
                &mut status.conditions,
                Condition::new(
                    CONDITION_VALID_CONFIGURATION,
                    true,
                    REASON_AS_EXPECTED,
                    "configuration is valid",
                    generation,
                    now,
                ),
            );
            let reconciled = if succeeded {
                Condition::new(
                    CONDITION_RECONCILIATION_SUCCEEDED,
                    true,
                    REASON_RECONCILED,
                    format!("{} steps reconciled", report.outcomes.len()),
                    generation,
                    now,
                )
            } else {
                let (message, reason) = failure_message(report);
                Condition::new(
                    CONDITION_RECONCILIATION_SUCCEEDED,
                    false,
                    reason,
                    message,
                    generation,
                    now,
                )
            };
            set_condition(&mut status.conditions, reconciled);
        }
    }

    let degraded = report.invalid.is_none() && !succeeded;
    let degraded_condition = if degraded {
        let (message, _) = failure_message(report);
        Condition::new(
            CONDITION_DEGRADED,
            true,
            REASON_COMPONENTS_FAILING,
            message,
            generation,
            now,
        )
    } else {
        Condition::new(
            CONDITION_DEGRADED,
            false,
            REASON_AS_EXPECTED,
            "",
            generation,
            now,
        )
    };
    set_condition(&mut status.conditions, degraded_condition);

    // Once available, a cluster stays available through a failed pass:
    // the previously applied objects keep serving.
    let was_available = previous.is_some_and(|s| s.is_condition_true(CONDITION_AVAILABLE));
    let available = if succeeded || was_available {
        Condition::new(
            CONDITION_AVAILABLE,
            true,
            REASON_AS_EXPECTED,
            "control plane objects are in place",
            generation,
            now,
        )
    } else {
        Condition::new(
            CONDITION_AVAILABLE,
            false,
            REASON_WAITING,
            "control plane has not converged yet",
            generation,
            now,
        )
    };
    set_condition(&mut status.conditions, available);
    status.conditions.sort_by(|a, b| a.type_.cmp(&b.type_));

    if report.kubeconfig.is_some() {
        status.kubeconfig = report.kubeconfig.clone();
    }

    if report.invalid.is_none() {
        status.version = Some(fold_version(
            status.version.take(),
            release,
            report.generation,
            succeeded,
            history_limit,
            now,
        ));
    }

    status
}

fn fold_version(
    previous: Option<ClusterVersionStatus>,
    release: &Release,
    generation: i64,
    succeeded: bool,
    history_limit: usize,
    now: DateTime<Utc>,
) -> ClusterVersionStatus {
    let (mut history, observed) = match previous {
        Some(v) => (v.history, v.observed_generation),
        None => (Vec::new(), 0),
    };

    let current_release = history.first().is_some_and(|h| h.image == release.image);
    if !current_release {
        // A newer release supersedes whatever was still rolling out.
        for entry in history.iter_mut().filter(|h| h.state == UpdateState::Partial) {
            entry.completion_time.get_or_insert_with(|| format_timestamp(now));
        }
        history.insert(
            0,
            UpdateHistory {
                state: UpdateState::Partial,
                started_time: format_timestamp(now),
                completion_time: None,
                image: release.image.clone(),
                verified: false,
            },
        );
    }

    if succeeded {
        if let Some(head) = history.first_mut() {
            if head.state == UpdateState::Partial {
                head.state = UpdateState::Completed;
                head.completion_time = Some(format_timestamp(now));
            }
        }
    }
    history.truncate(history_limit.max(1));

    ClusterVersionStatus {
        desired: release.clone(),
        history,
        observed_generation: if succeeded { generation } else { observed },
    }
}

/// Whether two statuses differ in anything but condition timestamps.
pub fn status_changed(live: Option<&HostedClusterStatus>, next: &HostedClusterStatus) -> bool {
    let live = match live {
        Some(live) => live,
        None => return true,
    };
    if live.version != next.version || live.kubeconfig != next.kubeconfig {
        return true;
    }
    if live.conditions.len() != next.conditions.len() {
        return true;
    }
    next.conditions.iter().any(|want| {
        live.conditions.iter().all(|have| {
            !have.same_state(want) || have.observed_generation != want.observed_generation
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api::ConditionStatus;
    use chrono::TimeZone;

    fn release(image: &str) -> Release {
        Release {
            image: image.to_string(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ok_report(generation: i64) -> PassReport {
        let mut report = PassReport::new(generation);
        report
            .outcomes
            .push(ComponentOutcome::new("Service/kube-apiserver", Ok(StepOutcome::Written)));
        report
    }

    fn failed_report(generation: i64) -> PassReport {
        let mut report = ok_report(generation);
        report.outcomes.push(ComponentOutcome::new(
            "Secret/etcd-server-crt",
            Err(HcpError::dependency_unavailable("Secret", "etcd-signer", "missing ca.key")),
        ));
        report
    }

    #[test]
    fn test_success_advances_generation_and_completes_history() {
        let status = fold_status(None, &release("r:1"), &ok_report(3), 10, at(0));
        let version = status.version.as_ref().unwrap();
        assert_eq!(version.observed_generation, 3);
        assert_eq!(version.history.len(), 1);
        assert_eq!(version.history[0].state, UpdateState::Completed);
        assert!(status.is_condition_true(CONDITION_AVAILABLE));
        assert!(status.is_condition_true(CONDITION_RECONCILIATION_SUCCEEDED));
        assert!(!status.is_condition_true(CONDITION_DEGRADED));
    }

    #[test]
    fn test_partial_failure_leaves_generation_stale() {
        let first = fold_status(None, &release("r:1"), &ok_report(3), 10, at(0));
        let second = fold_status(Some(&first), &release("r:1"), &failed_report(4), 10, at(60));

        assert_eq!(second.observed_generation(), Some(3));
        assert!(second.is_condition_true(CONDITION_DEGRADED));
        let reconciled = second.condition(CONDITION_RECONCILIATION_SUCCEEDED).unwrap();
        assert_eq!(reconciled.status, ConditionStatus::False);
        assert_eq!(reconciled.reason, "DependencyUnavailable");
        assert!(reconciled.message.contains("Secret/etcd-server-crt"));
        // still serving from the first pass
        assert!(second.is_condition_true(CONDITION_AVAILABLE));
    }

    #[test]
    fn test_first_pass_failure_is_not_available() {
        let status = fold_status(None, &release("r:1"), &failed_report(1), 10, at(0));
        assert_eq!(status.observed_generation(), Some(0));
        assert!(!status.is_condition_true(CONDITION_AVAILABLE));
        assert_eq!(
            status.version.as_ref().unwrap().history[0].state,
            UpdateState::Partial
        );
    }

    #[test]
    fn test_invalid_config_records_condition_only() {
        let report = PassReport::invalid(2, HcpError::validation("bad platform"));
        let status = fold_status(None, &release("r:1"), &report, 10, at(0));

        let valid = status.condition(CONDITION_VALID_CONFIGURATION).unwrap();
        assert_eq!(valid.status, ConditionStatus::False);
        assert_eq!(valid.reason, "InvalidConfiguration");
        assert!(status.version.is_none());
        assert!(!status.is_condition_true(CONDITION_DEGRADED));
    }

    #[test]
    fn test_history_is_bounded_newest_first() {
        let mut status = None;
        for i in 0..5 {
            let next = fold_status(
                status.as_ref(),
                &release(&format!("r:{}", i)),
                &ok_report(i + 1),
                3,
                at(i * 60),
            );
            status = Some(next);
        }
        let history = status.unwrap().version.unwrap().history;
        let images: Vec<&str> = history.iter().map(|h| h.image.as_str()).collect();
        assert_eq!(images, vec!["r:4", "r:3", "r:2"]);
    }

    #[test]
    fn test_transition_time_kept_while_status_holds() {
        let first = fold_status(None, &release("r:1"), &ok_report(1), 10, at(0));
        let second = fold_status(Some(&first), &release("r:1"), &ok_report(2), 10, at(600));
        assert_eq!(
            first.condition(CONDITION_AVAILABLE).unwrap().last_transition_time,
            second.condition(CONDITION_AVAILABLE).unwrap().last_transition_time
        );
        assert_eq!(second.observed_generation(), Some(2));
    }

    #[test]
    fn test_generation_guard() {
        let status = fold_status(None, &release("r:1"), &ok_report(6), 10, at(0));
        assert!(!may_write_status(Some(&status), 5));
        assert!(may_write_status(Some(&status), 6));
        assert!(may_write_status(Some(&status), 7));
        assert!(may_write_status(None, 1));

        // a failed pass at 7 records conditions for 7 but keeps version at 6
        let failed = fold_status(Some(&status), &release("r:1"), &failed_report(7), 10, at(1));
        assert_eq!(failed.observed_generation(), Some(6));
        assert!(!may_write_status(Some(&failed), 6));
    }

    #[test]
    fn test_status_changed_ignores_timestamps() {
        let first = fold_status(None, &release("r:1"), &ok_report(1), 10, at(0));
        let again = fold_status(Some(&first), &release("r:1"), &ok_report(1), 10, at(300));
        assert!(!status_changed(Some(&first), &again));
        assert!(status_changed(None, &again));

        let failed = fold_status(Some(&first), &release("r:1"), &failed_report(1), 10, at(300));
        assert!(status_changed(Some(&first), &failed));
    }
}
