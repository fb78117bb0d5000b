//! Multi-key signature finalization.
//!
//! `AddSig` accumulates public keys over the life of a top-level invocation; at
//! completion the aggregate key must satisfy a single Schnorr-style equation over the
//! funds accumulator's outstanding commitment. No individual signature ever needs to
//! be checked against a single key in isolation, which is what lets many `AddSig`
//! calls from different far-call frames compose into one finalization check.

use k256::elliptic_curve::group::GroupEncoding;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{ProjectivePoint, PublicKey, Scalar};
use types::BvmError;

/// An aggregated Schnorr signature over the combined public key accumulated by
/// `AddSig` calls: `s*G == r + e*sum(pubkeys)`.
#[derive(Debug, Clone)]
pub struct SchnorrSignature {
    pub r: ProjectivePoint,
    pub s: Scalar,
}

#[derive(Debug, Default)]
pub struct SignatureAccumulator {
    aggregate: Option<ProjectivePoint>,
}

impl SignatureAccumulator {
    pub fn new() -> Self {
        Self { aggregate: None }
    }

    /// Parses a SEC1-encoded public key and folds it into the running aggregate.
    pub fn add_sig(&mut self, pubkey_bytes: &[u8]) -> Result<(), BvmError> {
        let key = PublicKey::from_sec1_bytes(pubkey_bytes)
            .map_err(|_| BvmError::SignatureInvalid)?;
        let point = key.to_projective();
        self.aggregate = Some(match self.aggregate {
            Some(acc) => acc + point,
            None => point,
        });
        Ok(())
    }

    pub fn aggregate_point(&self) -> ProjectivePoint {
        self.aggregate.unwrap_or(ProjectivePoint::IDENTITY)
    }

    pub fn is_empty(&self) -> bool {
        self.aggregate.is_none()
    }

    /// Verifies `sig` closes out `message` against the funds accumulator's
    /// outstanding `commitment` and every public key folded in by `add_sig`.
    pub fn finalize(
        &self,
        message: &[u8],
        commitment: ProjectivePoint,
        sig: &SchnorrSignature,
    ) -> Result<(), BvmError> {
        let aggregate = self.aggregate_point();
        let r_bytes = sig.r.to_affine().to_encoded_point(true);
        let commitment_bytes = commitment.to_affine().to_encoded_point(true);
        let challenge_digest = types::ids::domain_hash(
            b"bvm.sig.e",
            &[r_bytes.as_bytes(), commitment_bytes.as_bytes(), message],
        );
        let e = Scalar::from_repr(challenge_digest.into()).unwrap_or(Scalar::ONE);

        let lhs = ProjectivePoint::GENERATOR * sig.s;
        let rhs = sig.r + aggregate * e;
        if lhs.to_bytes() == rhs.to_bytes() {
            Ok(())
        } else {
            Err(BvmError::SignatureInvalid)
        }
    }
}
