//! Embedded (container) signatures
//!
//! Signing a document inside its own container format (a PDF with an embedded
//! certificate, say) is left to a `ContainerSigner`. The engine's part is to
//! turn the stored key pair, in either form, into a native private key for
//! the duration of the call and hand it over.

use crate::encoding::{EncodedKeyPair, Key};
use crate::error::{Result, SignError};
use crate::keygen::KeyParameters;
use crate::native;
use crate::sig::Verification;

use rsa::RsaPrivateKey;
use tracing::debug;

/// A collaborator that embeds signatures in, and checks them from, a
/// document container.
pub trait ContainerSigner {
    /// Returns the signed container.
    fn sign_container(&self, container: &[u8], key: &RsaPrivateKey) -> Result<Vec<u8>>;

    /// Checks the signature embedded in `container`.
    fn verify_container(&self, container: &[u8]) -> Result<Verification>;
}

/// Builds the native private key for `pair`. JSON pairs need both halves since
/// the private half alone carries no `e`.
fn native_private_key(pair: &EncodedKeyPair) -> Result<RsaPrivateKey> {
    match pair.decode()? {
        (_, Key::Native(blob)) => native::private_key(&blob),
        (Key::Json(public), Key::Json(private)) => {
            if public.n != private.n {
                return Err(SignError::ModulusMismatch);
            }
            native::private_key_from_parameters(&KeyParameters {
                p: None,
                q: None,
                e: public.exponent,
                d: private.exponent,
                n: private.n,
            })
        }
        _ => Err(SignError::MalformedKey(
            "public and private halves use different encodings".into(),
        )),
    }
}

/// Signs `container` through `signer`. The private key is built here and
/// dropped before returning, whatever the outcome.
pub fn sign_embedded<S: ContainerSigner + ?Sized>(
    container: &[u8],
    pair: &EncodedKeyPair,
    signer: &S,
) -> Result<Vec<u8>> {
    let key = native_private_key(pair)?;
    debug!(len = container.len(), "handing private key to container signer");
    signer.sign_container(container, &key)
}

pub fn verify_embedded<S: ContainerSigner + ?Sized>(
    container: &[u8],
    signer: &S,
) -> Result<Verification> {
    signer.verify_container(container)
}
