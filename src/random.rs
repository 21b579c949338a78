//! Cryptographic random source for the job object discriminator.
//!
//! Concurrent instances of this tool must not collide on the job object
//! name, so the discriminator comes from the system CSP rather than
//! something guessable like the pid or the clock.

use windows::Win32::Security::Cryptography::{
    CryptAcquireContextW, CryptGenRandom, CryptReleaseContext, CRYPT_SILENT, CRYPT_VERIFYCONTEXT,
    PROV_RSA_FULL,
};

use crate::error::{win32_code, FailureKind, TaskError};

/// An acquired crypto provider context, released on drop.
pub struct RandomSource {
    provider: usize,
}

impl RandomSource {
    /// Acquire a verify-context provider (no key container, no UI).
    pub fn acquire() -> Result<Self, TaskError> {
        let mut provider = 0usize;
        unsafe {
            CryptAcquireContextW(
                &mut provider,
                None,
                None,
                PROV_RSA_FULL,
                CRYPT_VERIFYCONTEXT | CRYPT_SILENT,
            )
        }
        .map_err(|e| {
            TaskError::new(
                FailureKind::ResourceCreation,
                "run CryptAcquireContext",
                win32_code(&e),
            )
        })?;
        Ok(Self { provider })
    }

    /// Draw a random 32-bit discriminator.
    pub fn next_u32(&self) -> Result<u32, TaskError> {
        let mut bytes = [0u8; 4];
        unsafe { CryptGenRandom(self.provider, &mut bytes) }.map_err(|e| {
            TaskError::new(
                FailureKind::ResourceCreation,
                "run CryptGenRandom",
                win32_code(&e),
            )
        })?;
        Ok(u32::from_ne_bytes(bytes))
    }
}

impl Drop for RandomSource {
    fn drop(&mut self) {
        unsafe {
            let _ = CryptReleaseContext(self.provider, 0);
        }
    }
}
