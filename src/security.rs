use std::convert::TryInto;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::SecurityError;

const PASSWORD_SALT: &str = "password.salt";
const USER_AUTH_PUBLIC: &str = "user_auth.pem.pub";
const USER_AUTH_PRIVATE: &str = "user_auth.pem";

#[cfg(feature = "generate-security")]
const GENERATED_KEY_BITS: usize = 4096;

pub type Salt = [u8; 16];

#[derive(Clone)]
pub struct KeySet {
    pub public: Vec<u8>,
    pub private: Vec<u8>,
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeySet(public: {} bytes)", self.public.len())
    }
}

/// Password salt, bcrypt cost and JWT signing keys shared by every request.
#[derive(Debug, Clone)]
pub struct Security {
    pub salt: Salt,
    pub hash_cost: u32,
    pub jwt_keys: KeySet,
}

#[inline]
fn security_dir() -> PathBuf {
    PathBuf::from(env::var("SECURITY_DIR").unwrap_or("./security".to_string()))
}

impl Security {
    pub fn load(hash_cost: u32) -> Result<Security, SecurityError> {
        Self::load_from(security_dir(), hash_cost)
    }

    pub fn load_from(dir: impl AsRef<Path>, hash_cost: u32) -> Result<Security, SecurityError> {
        let dir = dir.as_ref();

        if cfg!(feature = "generate-security") {
            fs::create_dir_all(dir)?;
        }

        tracing::info!("Loading password salt...");
        let salt: Option<Salt> = fs::read(dir.join(PASSWORD_SALT))
            .ok()
            .and_then(|s| s.try_into().ok());

        let salt = match salt {
            Some(salt) => {
                tracing::info!("Salt found and loaded.");
                salt
            }
            None => {
                tracing::info!("Salt not found in '{}'.", dir.join(PASSWORD_SALT).display());
                generate_salt(dir)?
            }
        };

        tracing::info!("Loading JWT signing keys...");
        let pub_key = fs::read(dir.join(USER_AUTH_PUBLIC)).ok();
        let priv_key = fs::read(dir.join(USER_AUTH_PRIVATE)).ok();

        let jwt_keys = match (pub_key, priv_key) {
            (Some(public), Some(private)) if !public.is_empty() && !private.is_empty() => {
                tracing::info!("Loaded JWT keys.");
                KeySet { public, private }
            }
            _ => generate_keys(dir)?,
        };

        Ok(Security {
            salt,
            hash_cost: hash_cost.clamp(4, 31),
            jwt_keys,
        })
    }
}

#[cfg(feature = "generate-security")]
fn generate_salt(dir: &Path) -> Result<Salt, SecurityError> {
    tracing::info!("Generating a new password salt.");
    let salt: Salt = rand::random();
    fs::write(dir.join(PASSWORD_SALT), salt)?;
    Ok(salt)
}

#[cfg(not(feature = "generate-security"))]
fn generate_salt(dir: &Path) -> Result<Salt, SecurityError> {
    Err(SecurityError::MissingSalt(dir.join(PASSWORD_SALT)))
}

#[cfg(feature = "generate-security")]
fn generate_keys(dir: &Path) -> Result<KeySet, SecurityError> {
    use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
    use rsa::pkcs8::EncodePublicKey;

    tracing::info!("Unable to load private and/or public user auth key(s). Generating a new pair.");

    tracing::info!("Generating a private RSA key. This will take a few minutes...");
    let mut rng = rand::thread_rng();
    let rsa_sk = rsa::RsaPrivateKey::new(&mut rng, GENERATED_KEY_BITS)
        .map_err(|e| SecurityError::KeyGeneration(e.to_string()))?;

    tracing::info!("Creating PS256 private key...");
    let private = rsa_sk
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| SecurityError::KeyGeneration(e.to_string()))?
        .to_string()
        .into_bytes();

    fs::write(dir.join(USER_AUTH_PRIVATE), private.as_slice())?;

    tracing::info!("Creating PS256 public key...");
    let public = rsa_sk
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| SecurityError::KeyGeneration(e.to_string()))?
        .into_bytes();

    fs::write(dir.join(USER_AUTH_PUBLIC), public.as_slice())?;

    tracing::info!("Done generating JWT keys.");

    Ok(KeySet { public, private })
}

#[cfg(not(feature = "generate-security"))]
fn generate_keys(dir: &Path) -> Result<KeySet, SecurityError> {
    Err(SecurityError::MissingKeys(dir.to_path_buf()))
}
