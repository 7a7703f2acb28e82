//! Recursive-proof seam.
//!
//! Proofs here are transcript MACs over `(vk, public_input,
//! public_output)`, standing in for a real recursive SNARK behind the same
//! surface: a compiled verification key, `attest` in place of the prover,
//! and `verify`/`verify_if` at the recursion boundary. Dummy proofs model
//! the proofs-disabled path and always fail verification.

use anyhow::{bail, ensure, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use alr_crypto::{Blake3Transcript, Field, Transcript};

const DS_VK: &str = "alr/vk/v1";
const DS_PROOF: &str = "alr/proof/v1";

/// Identity of a compiled program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationKey([u8; 32]);

impl VerificationKey {
    /// Derive the key for `program` specialized to `params`.
    ///
    /// Programs with different size parameters verify under different
    /// keys, the way circuit shapes differ per instantiation.
    #[must_use]
    pub fn compile(program: &str, params: &[u64]) -> Self {
        let mut tr = Blake3Transcript::new(DS_VK);
        tr.absorb("program", program.as_bytes());
        for &p in params {
            tr.absorb_u64("param", p);
        }
        let bytes = tr.challenge_bytes("vk", 32);
        let mut vk = [0u8; 32];
        vk.copy_from_slice(&bytes);
        Self(vk)
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Statement data a proof binds; absorbed into the attestation transcript.
pub trait PublicIo {
    /// Feed the statement into `tr`.
    fn absorb_into(&self, tr: &mut Blake3Transcript);
}

impl PublicIo for Field {
    fn absorb_into(&self, tr: &mut Blake3Transcript) {
        tr.absorb_field("field", self);
    }
}

/// An attestation that a program step carried `public_input` to
/// `public_output`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proof<In, Out> {
    /// Claimed statement input.
    pub public_input: In,
    /// Claimed statement output.
    pub public_output: Out,
    vk: VerificationKey,
    mac: [u8; 32],
    dummy: bool,
}

impl<In, Out> Proof<In, Out>
where
    In: PublicIo + Serialize + DeserializeOwned,
    Out: PublicIo + Serialize + DeserializeOwned,
{
    /// Produce a valid attestation under `vk`.
    #[must_use]
    pub fn attest(vk: VerificationKey, public_input: In, public_output: Out) -> Self {
        let mac = Self::mac(&vk, &public_input, &public_output);
        Self {
            public_input,
            public_output,
            vk,
            mac,
            dummy: false,
        }
    }

    /// Placeholder carrying the statement without attesting to it.
    ///
    /// Used on proofs-disabled paths; [`Proof::verify`] always rejects it.
    #[must_use]
    pub fn dummy(vk: VerificationKey, public_input: In, public_output: Out) -> Self {
        Self {
            public_input,
            public_output,
            vk,
            mac: [0u8; 32],
            dummy: true,
        }
    }

    /// Whether this is a placeholder from [`Proof::dummy`].
    #[must_use]
    pub const fn is_dummy(&self) -> bool {
        self.dummy
    }

    /// Check the attestation against its statement.
    pub fn verify(&self, vk: &VerificationKey) -> Result<()> {
        if self.dummy {
            bail!("dummy proof cannot be verified");
        }
        ensure!(self.vk == *vk, "proof was attested under a different key");
        let expect = Self::mac(&self.vk, &self.public_input, &self.public_output);
        ensure!(expect == self.mac, "proof does not match its statement");
        Ok(())
    }

    /// [`Proof::verify`] only when `cond` holds.
    pub fn verify_if(&self, cond: bool, vk: &VerificationKey) -> Result<()> {
        if cond {
            self.verify(vk)?;
        }
        Ok(())
    }

    fn mac(vk: &VerificationKey, input: &In, output: &Out) -> [u8; 32] {
        let mut tr = Blake3Transcript::new(DS_PROOF);
        tr.absorb("vk", vk.as_bytes());
        tr.absorb("io", b"input");
        input.absorb_into(&mut tr);
        tr.absorb("io", b"output");
        output.absorb_into(&mut tr);
        let bytes = tr.challenge_bytes("mac", 32);
        let mut mac = [0u8; 32];
        mac.copy_from_slice(&bytes);
        mac
    }
}
