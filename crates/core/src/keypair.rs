//! Program keypair generation
//!
//! Anchor deploys a program to the address of `target/deploy/<name>-keypair.json`,
//! a JSON array of the 64 keypair bytes (32-byte secret followed by the
//! 32-byte public key). The base58 public key is the program id.

use crate::error::{HarnessError, Result};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::{fmt, path::Path};

/// Length of the serialized keypair
pub const KEYPAIR_LENGTH: usize = 64;

/// Ed25519 keypair backing a program id
pub struct ProgramKeypair {
    signing_key: SigningKey,
}

impl ProgramKeypair {
    /// Generates a fresh keypair from the operating system RNG
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Base58 public key, as used in `declare_id!` and `Anchor.toml`
    pub fn program_id(&self) -> String {
        bs58::encode(self.signing_key.verifying_key().as_bytes()).into_string()
    }

    /// Secret key followed by public key
    pub fn to_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        let mut bytes = [0u8; KEYPAIR_LENGTH];
        bytes[..32].copy_from_slice(&self.signing_key.to_bytes());
        bytes[32..].copy_from_slice(self.signing_key.verifying_key().as_bytes());
        bytes
    }

    /// Keypair file contents: `[b0, b1, ..., b63]`
    pub fn to_json(&self) -> String {
        let bytes: Vec<String> = self.to_bytes().iter().map(u8::to_string).collect();
        format!("[{}]", bytes.join(", "))
    }

    /// Writes the keypair file, readable only by the owner on unix
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(HarnessError::io("Failed to create directory", parent))?;
        }

        std::fs::write(path, self.to_json())
            .map_err(HarnessError::io("Failed to write keypair", path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(HarnessError::io("Failed to restrict keypair permissions", path))?;
        }

        tracing::debug!("Wrote program keypair to {}", path.display());
        Ok(())
    }
}

impl fmt::Debug for ProgramKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramKeypair")
            .field("program_id", &self.program_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keypair_from(secret: [u8; 32]) -> ProgramKeypair {
        ProgramKeypair {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    #[test]
    fn test_program_id_is_base58_public_key() {
        let keypair = keypair_from([7u8; 32]);
        let decoded = bs58::decode(keypair.program_id()).into_vec().unwrap();

        assert_eq!(decoded.len(), 32);
        assert_eq!(decoded.as_slice(), &keypair.to_bytes()[32..]);
    }

    #[test]
    fn test_keypair_bytes_layout() {
        let keypair = keypair_from([1u8; 32]);
        let bytes = keypair.to_bytes();

        assert_eq!(&bytes[..32], &[1u8; 32]);
        assert_eq!(&bytes[32..], keypair.signing_key.verifying_key().as_bytes());
    }

    #[test]
    fn test_to_json_format() {
        let keypair = keypair_from([0u8; 32]);
        let json = keypair.to_json();

        assert!(json.starts_with("[0, 0, 0,"));
        assert!(json.ends_with(']'));

        let parsed: Vec<u8> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, keypair.to_bytes().to_vec());
    }

    #[test]
    fn test_generated_keypairs_differ() {
        assert_ne!(
            ProgramKeypair::generate().program_id(),
            ProgramKeypair::generate().program_id()
        );
    }

    #[test]
    fn test_write_keypair_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("target/deploy/counter-keypair.json");
        let keypair = ProgramKeypair::generate();

        keypair.write(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), keypair.to_json());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = keypair_from([9u8; 32]);
        let debug = format!("{:?}", keypair);
        assert!(debug.contains(&keypair.program_id()));
        assert!(!debug.contains("signing_key"));
    }
}
