//! Access gate: caller vs target family comparison.

use crate::model::device::Device;
use crate::model::family::{Family, FamilyId};
use crate::model::principal::{redact_email, Principal};
use log::info;

/// Outcome of one access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// Anything that belongs to (at most) one family.
pub trait FamilyScoped {
    fn owning_family(&self) -> Option<FamilyId>;
    /// Short, log-safe label for decision events.
    fn scope_label(&self) -> String;
}

impl FamilyScoped for Principal {
    fn owning_family(&self) -> Option<FamilyId> {
        self.family_id
    }

    fn scope_label(&self) -> String {
        format!("principal:{}", redact_email(&self.email))
    }
}

impl FamilyScoped for Device {
    fn owning_family(&self) -> Option<FamilyId> {
        self.family_id
    }

    fn scope_label(&self) -> String {
        format!("device:{}", self.device_name)
    }
}

impl FamilyScoped for Family {
    fn owning_family(&self) -> Option<FamilyId> {
        Some(self.family_id)
    }

    fn scope_label(&self) -> String {
        format!("family:{}", self.family_id)
    }
}

/// Stateless decision component.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGate;

impl AccessGate {
    pub fn new() -> Self {
        Self
    }

    /// ALLOW iff `caller` and `target` reference the same family id.
    pub fn authorize(&self, caller: &Principal, target: &impl FamilyScoped) -> Decision {
        let decision = decide(caller.family_id, target.owning_family());
        info!(
            "event=access_decision module=access status=ok caller={} target={} decision={}",
            caller.scope_label(),
            target.scope_label(),
            decision.as_str()
        );
        decision
    }
}

/// Pure family comparison; `None` on either side denies.
pub fn decide(caller_family: Option<FamilyId>, target_family: Option<FamilyId>) -> Decision {
    match (caller_family, target_family) {
        (Some(caller), Some(target)) if caller == target => Decision::Allow,
        _ => Decision::Deny,
    }
}

#[cfg(test)]
mod tests {
    use super::{decide, AccessGate, Decision};
    use crate::model::device::{Device, PowerState};
    use crate::model::family::{Family, FamilyId};
    use crate::model::principal::Principal;
    use chrono::Utc;

    fn device_owned_by(family_id: Option<FamilyId>) -> Device {
        Device {
            device_name: "thermostat-1".to_string(),
            family_id,
            created_by: "a@fam1.com".to_string(),
            created_time: Utc::now(),
            warranty_expiration: None,
            power_state: PowerState::Off,
        }
    }

    #[test]
    fn decide_allows_only_equal_present_ids() {
        for caller in [None, Some(FamilyId(1)), Some(FamilyId(2))] {
            for target in [None, Some(FamilyId(1)), Some(FamilyId(2))] {
                let expected = match (caller, target) {
                    (Some(a), Some(b)) if a == b => Decision::Allow,
                    _ => Decision::Deny,
                };
                assert_eq!(decide(caller, target), expected, "{caller:?} vs {target:?}");
            }
        }
    }

    #[test]
    fn gate_compares_by_id_not_name() {
        let gate = AccessGate::new();
        let caller = Principal::new("a@fam1.com", Some(FamilyId(1)));
        let same_name_other_family = Family::new(FamilyId(2), "Smith");
        let own_family = Family::new(FamilyId(1), "Jones");
        assert_eq!(gate.authorize(&caller, &same_name_other_family), Decision::Deny);
        assert_eq!(gate.authorize(&caller, &own_family), Decision::Allow);
    }

    #[test]
    fn gate_denies_devices_with_unresolved_family() {
        let gate = AccessGate::new();
        let caller = Principal::new("a@fam1.com", Some(FamilyId(1)));
        assert_eq!(gate.authorize(&caller, &device_owned_by(None)), Decision::Deny);
        assert_eq!(
            gate.authorize(&caller, &device_owned_by(Some(FamilyId(1)))),
            Decision::Allow
        );
    }

    #[test]
    fn gate_denies_family_less_caller() {
        let gate = AccessGate::new();
        let caller = Principal::new("loner@example.com", None);
        let target = Principal::new("other@example.com", None);
        assert_eq!(gate.authorize(&caller, &target), Decision::Deny);
        assert!(!gate.authorize(&caller, &target).is_allowed());
    }
}
