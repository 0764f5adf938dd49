//! Device operation façade.
//!
//! # Responsibility
//! - Run every device use-case through one gate sequence:
//!   `Start -> ResolvedCaller -> TargetLoaded -> Authorized -> Executed`,
//!   leaving early as `Rejected` on the first failure.
//! - Report failures with enough structure to pick an HTTP-like status.
//!
//! # Invariants
//! - A target principal outside the caller's family yields `AccessDenied`
//!   before any device lookup.
//! - A missing target principal or device is `*NotFound`, never `AccessDenied`.
//! - No retries happen here; persistence failures are surfaced as retryable.

use crate::access::gate::{AccessGate, Decision, FamilyScoped};
use crate::auth::credential::CredentialError;
use crate::auth::{IdentityError, IdentityResolver, TokenVerifier};
use crate::model::device::{
    Device, DeviceDescriptor, DeviceDetailsUpdate, DeviceValidationError, DeviceView, PowerState,
};
use crate::model::family::FamilyId;
use crate::model::principal::{redact_email, Principal};
use crate::repo::device_repo::DeviceRepository;
use crate::repo::membership_repo::{MembershipStore, RepoError};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Per-request progress through the gate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Start,
    ResolvedCaller,
    TargetLoaded,
    Authorized,
    Executed,
    Rejected,
}

impl RequestStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ResolvedCaller => "resolved_caller",
            Self::TargetLoaded => "target_loaded",
            Self::Authorized => "authorized",
            Self::Executed => "executed",
            Self::Rejected => "rejected",
        }
    }
}

/// Acknowledgement for power-state writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerAck {
    pub device_name: String,
    pub power_state: PowerState,
}

/// Device façade failures and refusals.
#[derive(Debug)]
pub enum DeviceServiceError {
    /// Credential absent, malformed or failed verification.
    InvalidCredential(CredentialError),
    /// Verified identity has no stored principal.
    UnknownPrincipal(String),
    /// Target principal email does not exist.
    PrincipalNotFound(String),
    DeviceNotFound(String),
    FamilyNotFound(FamilyId),
    /// Caller and target belong to different (or no) families.
    AccessDenied,
    DuplicateDeviceName(String),
    InvalidDescriptor(DeviceValidationError),
    /// Opaque storage failure; safe for the caller to retry.
    PersistenceUnavailable(RepoError),
    /// Write succeeded but read-back did not observe it.
    InconsistentState(&'static str),
}

impl DeviceServiceError {
    /// HTTP-analogous status for the consuming layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidCredential(_) | Self::UnknownPrincipal(_) => 401,
            Self::PrincipalNotFound(_) | Self::DeviceNotFound(_) | Self::FamilyNotFound(_) => 404,
            Self::AccessDenied => 403,
            Self::DuplicateDeviceName(_) => 409,
            Self::InvalidDescriptor(_) => 400,
            Self::PersistenceUnavailable(_) => 503,
            Self::InconsistentState(_) => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredential(_) => "invalid_credential",
            Self::UnknownPrincipal(_) => "unknown_principal",
            Self::PrincipalNotFound(_) => "principal_not_found",
            Self::DeviceNotFound(_) => "device_not_found",
            Self::FamilyNotFound(_) => "family_not_found",
            Self::AccessDenied => "access_denied",
            Self::DuplicateDeviceName(_) => "duplicate_device_name",
            Self::InvalidDescriptor(_) => "invalid_descriptor",
            Self::PersistenceUnavailable(_) => "persistence_unavailable",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PrincipalNotFound(_) | Self::DeviceNotFound(_) | Self::FamilyNotFound(_)
        )
    }

    /// `false` for access refusals, which are an expected outcome.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::AccessDenied)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceUnavailable(_))
    }
}

impl Display for DeviceServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredential(err) => write!(f, "invalid credential: {err}"),
            Self::UnknownPrincipal(email) => {
                write!(f, "unknown principal: {}", redact_email(email))
            }
            Self::PrincipalNotFound(email) => write!(f, "user not found: {email}"),
            Self::DeviceNotFound(name) => write!(f, "device not found: {name}"),
            Self::FamilyNotFound(id) => write!(f, "family not found: {id}"),
            Self::AccessDenied => write!(f, "you don't have access"),
            Self::DuplicateDeviceName(name) => write!(f, "device name already exists: {name}"),
            Self::InvalidDescriptor(err) => write!(f, "invalid device descriptor: {err}"),
            Self::PersistenceUnavailable(err) => write!(f, "persistence unavailable: {err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent device state: {details}"),
        }
    }
}

impl Error for DeviceServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCredential(err) => Some(err),
            Self::InvalidDescriptor(err) => Some(err),
            Self::PersistenceUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdentityError> for DeviceServiceError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::InvalidCredential(err) => Self::InvalidCredential(err),
            IdentityError::UnknownPrincipal(email) => Self::UnknownPrincipal(email),
            IdentityError::Store(err) => Self::PersistenceUnavailable(err),
        }
    }
}

impl From<RepoError> for DeviceServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::DuplicateDeviceName(name) => Self::DuplicateDeviceName(name),
            RepoError::DeviceNotFound(name) => Self::DeviceNotFound(name),
            RepoError::FamilyNotFound(id) => Self::FamilyNotFound(id),
            RepoError::InvalidDevice(err) => Self::InvalidDescriptor(err),
            other => Self::PersistenceUnavailable(other),
        }
    }
}

impl From<DeviceValidationError> for DeviceServiceError {
    fn from(value: DeviceValidationError) -> Self {
        Self::InvalidDescriptor(value)
    }
}

pub type DeviceServiceResult<T> = Result<T, DeviceServiceError>;

/// Stage tracker for one façade call; emits the `device_op` event.
struct RequestTrace {
    op: &'static str,
    stage: RequestStage,
    started_at: Instant,
}

impl RequestTrace {
    fn start(op: &'static str) -> Self {
        Self {
            op,
            stage: RequestStage::Start,
            started_at: Instant::now(),
        }
    }

    fn advance(&mut self, stage: RequestStage) {
        self.stage = stage;
    }

    fn finish<T>(mut self, result: &DeviceServiceResult<T>) {
        let duration_ms = self.started_at.elapsed().as_millis();
        match result {
            Ok(_) => {
                self.advance(RequestStage::Executed);
                info!(
                    "event=device_op module=service status=ok op={} stage={} duration_ms={duration_ms}",
                    self.op,
                    self.stage.as_str()
                );
            }
            Err(err) => {
                let failed_at = self.stage;
                self.advance(RequestStage::Rejected);
                if err.is_fault() {
                    warn!(
                        "event=device_op module=service status=error op={} stage={} failed_at={} duration_ms={duration_ms} error_code={} status_code={}",
                        self.op,
                        self.stage.as_str(),
                        failed_at.as_str(),
                        err.error_code(),
                        err.status_code()
                    );
                } else {
                    info!(
                        "event=device_op module=service status=denied op={} stage={} failed_at={} duration_ms={duration_ms}",
                        self.op,
                        self.stage.as_str(),
                        failed_at.as_str()
                    );
                }
            }
        }
    }
}

/// Caller and target principal that passed the membership gate.
struct Admission {
    caller: Principal,
    target: Principal,
}

/// Façade over identity resolution, access control and device persistence.
pub struct DeviceService<S, D, V>
where
    S: MembershipStore,
    D: DeviceRepository,
    V: TokenVerifier,
{
    identity: IdentityResolver<V>,
    store: S,
    devices: D,
    gate: AccessGate,
}

impl<S, D, V> DeviceService<S, D, V>
where
    S: MembershipStore,
    D: DeviceRepository,
    V: TokenVerifier,
{
    pub fn new(identity: IdentityResolver<V>, store: S, devices: D, gate: AccessGate) -> Self {
        Self {
            identity,
            store,
            devices,
            gate,
        }
    }

    /// Returns the read-only projection of a device in the caller's family.
    pub fn get_device_details(
        &self,
        credential: Option<&str>,
        target_email: &str,
        device_name: &str,
    ) -> DeviceServiceResult<DeviceView> {
        self.run("get_device_details", |trace| {
            let admission = self.admit(trace, credential, target_email)?;
            let device = self.authorized_device(trace, &admission, device_name)?;
            Ok(device.view())
        })
    }

    /// Sets the power state; repeating the same state acknowledges again.
    pub fn set_power_state(
        &self,
        credential: Option<&str>,
        target_email: &str,
        device_name: &str,
        desired: PowerState,
    ) -> DeviceServiceResult<PowerAck> {
        self.run("set_power_state", |trace| {
            let admission = self.admit(trace, credential, target_email)?;
            let device = self.authorized_device(trace, &admission, device_name)?;
            self.devices.set_power_state(&device.device_name, desired)?;
            Ok(PowerAck {
                device_name: device.device_name,
                power_state: desired,
            })
        })
    }

    /// Creates a device owned by the caller's family.
    ///
    /// # Errors
    /// - `InvalidDescriptor` for a blank, overlong or malformed name.
    /// - `DuplicateDeviceName` when the name exists in any family; no row
    ///   is written in that case.
    pub fn add_device(
        &self,
        credential: Option<&str>,
        target_email: &str,
        descriptor: &DeviceDescriptor,
    ) -> DeviceServiceResult<DeviceView> {
        self.run("add_device", |trace| {
            let admission = self.admit(trace, credential, target_email)?;
            trace.advance(RequestStage::TargetLoaded);
            let family_id = self.authorized_family(trace, &admission)?;

            descriptor.validate()?;
            let device = Device::from_descriptor(
                descriptor,
                family_id,
                admission.caller.email.as_str(),
                Utc::now(),
            );
            self.devices.create_device(&device)?;

            self.store
                .lookup_device(&device.device_name)?
                .map(|stored| stored.view())
                .ok_or(DeviceServiceError::InconsistentState(
                    "created device not found in read-back",
                ))
        })
    }

    /// Lists every device owned by the target's family (possibly none).
    pub fn list_devices_for_family(
        &self,
        credential: Option<&str>,
        target_email: &str,
    ) -> DeviceServiceResult<Vec<DeviceView>> {
        self.run("list_devices_for_family", |trace| {
            let admission = self.admit(trace, credential, target_email)?;
            trace.advance(RequestStage::TargetLoaded);
            let family_id = self.authorized_family(trace, &admission)?;

            let devices = self.devices.list_devices_for_family(family_id)?;
            Ok(devices.iter().map(DeviceView::from).collect())
        })
    }

    /// Replaces mutable device details and returns the refreshed view.
    pub fn update_device_details(
        &self,
        credential: Option<&str>,
        target_email: &str,
        device_name: &str,
        update: &DeviceDetailsUpdate,
    ) -> DeviceServiceResult<DeviceView> {
        self.run("update_device_details", |trace| {
            let admission = self.admit(trace, credential, target_email)?;
            let device = self.authorized_device(trace, &admission, device_name)?;
            self.devices.update_details(&device.device_name, update)?;

            self.store
                .lookup_device(&device.device_name)?
                .map(|stored| stored.view())
                .ok_or(DeviceServiceError::InconsistentState(
                    "updated device not found in read-back",
                ))
        })
    }

    fn run<T>(
        &self,
        op: &'static str,
        body: impl FnOnce(&mut RequestTrace) -> DeviceServiceResult<T>,
    ) -> DeviceServiceResult<T> {
        let mut trace = RequestTrace::start(op);
        let result = body(&mut trace);
        trace.finish(&result);
        result
    }

    /// Resolves the caller, loads the target principal and checks they share a family.
    fn admit(
        &self,
        trace: &mut RequestTrace,
        credential: Option<&str>,
        target_email: &str,
    ) -> DeviceServiceResult<Admission> {
        let caller = self.identity.resolve(credential, &self.store)?;
        trace.advance(RequestStage::ResolvedCaller);

        let target = self
            .store
            .lookup_principal(target_email)?
            .ok_or_else(|| DeviceServiceError::PrincipalNotFound(target_email.to_string()))?;
        self.require(&caller, &target)?;

        Ok(Admission { caller, target })
    }

    fn authorized_device(
        &self,
        trace: &mut RequestTrace,
        admission: &Admission,
        device_name: &str,
    ) -> DeviceServiceResult<Device> {
        let device = self
            .store
            .lookup_device(device_name)?
            .ok_or_else(|| DeviceServiceError::DeviceNotFound(device_name.trim().to_string()))?;
        trace.advance(RequestStage::TargetLoaded);

        self.require(&admission.caller, &device)?;
        trace.advance(RequestStage::Authorized);
        Ok(device)
    }

    fn authorized_family(
        &self,
        trace: &mut RequestTrace,
        admission: &Admission,
    ) -> DeviceServiceResult<FamilyId> {
        let family_id = admission
            .target
            .family_id
            .ok_or(DeviceServiceError::AccessDenied)?;
        let family = self
            .store
            .get_family(family_id)?
            .ok_or(DeviceServiceError::FamilyNotFound(family_id))?;

        self.require(&admission.caller, &family)?;
        trace.advance(RequestStage::Authorized);
        Ok(family.family_id)
    }

    fn require(&self, caller: &Principal, target: &impl FamilyScoped) -> DeviceServiceResult<()> {
        match self.gate.authorize(caller, target) {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(DeviceServiceError::AccessDenied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceServiceError, RequestStage};
    use crate::auth::credential::CredentialError;
    use crate::repo::membership_repo::RepoError;

    #[test]
    fn status_codes_follow_outcome_table() {
        assert_eq!(
            DeviceServiceError::InvalidCredential(CredentialError::Missing).status_code(),
            401
        );
        assert_eq!(
            DeviceServiceError::DeviceNotFound("x".to_string()).status_code(),
            404
        );
        assert_eq!(DeviceServiceError::AccessDenied.status_code(), 403);
        assert_eq!(
            DeviceServiceError::DuplicateDeviceName("x".to_string()).status_code(),
            409
        );
    }

    #[test]
    fn denial_is_not_a_fault_and_only_persistence_is_retryable() {
        assert!(!DeviceServiceError::AccessDenied.is_fault());
        assert!(!DeviceServiceError::AccessDenied.is_retryable());
        let unavailable =
            DeviceServiceError::PersistenceUnavailable(RepoError::InvalidData("x".to_string()));
        assert!(unavailable.is_fault());
        assert!(unavailable.is_retryable());
        assert_eq!(unavailable.status_code(), 503);
    }

    #[test]
    fn repo_errors_map_to_semantic_outcomes() {
        let mapped: DeviceServiceError =
            RepoError::DuplicateDeviceName("lamp-1".to_string()).into();
        assert!(matches!(mapped, DeviceServiceError::DuplicateDeviceName(name) if name == "lamp-1"));

        let mapped: DeviceServiceError = RepoError::DeviceNotFound("lamp-1".to_string()).into();
        assert!(mapped.is_not_found());
    }

    #[test]
    fn stage_labels_are_stable() {
        assert_eq!(RequestStage::ResolvedCaller.as_str(), "resolved_caller");
        assert_eq!(RequestStage::Rejected.as_str(), "rejected");
    }
}
