//! Claim/unclaim rules for pairing a device with an owner account.

/// What the claim handler should do, decided from the current rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDecision {
    /// Unknown device id: provision a fresh row with the supplied secret and
    /// claim it. Bootstrap path for first-time pairing; any authenticated
    /// owner who knows a fresh id can provision it.
    Provision,
    /// Device exists, secret matches, unowned or already ours: set (or keep)
    /// ownership. Re-claiming one's own device is a no-op.
    Claim,
    /// Secret mismatch -> 403.
    WrongSecret,
    /// Owned by a different account -> 400.
    ClaimedByOther,
    /// This owner already has a different device paired -> 400.
    OwnerHasDevice,
}

/// The slice of an existing device row the decision needs.
#[derive(Debug, Clone, Copy)]
pub struct ExistingDevice<'a> {
    pub secret: &'a str,
    pub user_id: Option<&'a str>,
}

pub fn evaluate_claim(
    owner_id: &str,
    device_id: &str,
    supplied_secret: &str,
    device: Option<ExistingDevice<'_>>,
    owners_device_id: Option<&str>,
) -> ClaimDecision {
    if let Some(dev) = device {
        if dev.secret != supplied_secret {
            return ClaimDecision::WrongSecret;
        }
        if let Some(holder) = dev.user_id {
            if holder != owner_id {
                return ClaimDecision::ClaimedByOther;
            }
        }
    }

    // One device per owner; the same device may be re-claimed.
    if let Some(current) = owners_device_id {
        if current != device_id {
            return ClaimDecision::OwnerHasDevice;
        }
    }

    if device.is_some() {
        ClaimDecision::Claim
    } else {
        ClaimDecision::Provision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "owner-1";

    #[test]
    fn unknown_device_is_provisioned() {
        assert_eq!(
            evaluate_claim(OWNER, "dev-1", "s1", None, None),
            ClaimDecision::Provision
        );
    }

    #[test]
    fn unowned_device_with_matching_secret_is_claimed() {
        let dev = ExistingDevice { secret: "s1", user_id: None };
        assert_eq!(
            evaluate_claim(OWNER, "dev-1", "s1", Some(dev), None),
            ClaimDecision::Claim
        );
    }

    #[test]
    fn wrong_secret_is_rejected_before_ownership_checks() {
        let dev = ExistingDevice { secret: "s1", user_id: Some("other") };
        assert_eq!(
            evaluate_claim(OWNER, "dev-1", "bad", Some(dev), None),
            ClaimDecision::WrongSecret
        );
    }

    #[test]
    fn foreign_ownership_is_rejected() {
        let dev = ExistingDevice { secret: "s1", user_id: Some("other") };
        assert_eq!(
            evaluate_claim(OWNER, "dev-1", "s1", Some(dev), None),
            ClaimDecision::ClaimedByOther
        );
    }

    #[test]
    fn second_device_is_rejected() {
        let dev = ExistingDevice { secret: "s2", user_id: None };
        assert_eq!(
            evaluate_claim(OWNER, "dev-2", "s2", Some(dev), Some("dev-1")),
            ClaimDecision::OwnerHasDevice
        );
        // Even when the second id is unknown and would otherwise bootstrap.
        assert_eq!(
            evaluate_claim(OWNER, "dev-2", "s2", None, Some("dev-1")),
            ClaimDecision::OwnerHasDevice
        );
    }

    #[test]
    fn reclaiming_own_device_is_idempotent() {
        let dev = ExistingDevice { secret: "s1", user_id: Some(OWNER) };
        assert_eq!(
            evaluate_claim(OWNER, "dev-1", "s1", Some(dev), Some("dev-1")),
            ClaimDecision::Claim
        );
    }
}
