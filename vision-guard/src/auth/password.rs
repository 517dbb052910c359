use anyhow::{bail, Context, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
pub const DEFAULT_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;

fn stretch(salt: &[u8], password: &str, iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();

    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .finalize()
            .into();
    }

    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `sha256$<iterations>$<salt hex>$<digest hex>`
pub fn hash_password_with(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let digest = stretch(&salt, password, iterations.max(1));
    format!("{SCHEME}${}${}${}", iterations.max(1), hex::encode(salt), hex::encode(digest))
}

pub fn hash_password(password: &str) -> String {
    hash_password_with(password, DEFAULT_ITERATIONS)
}

fn parse(stored: &str) -> Result<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(digest), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        bail!("Malformed password hash");
    };
    if scheme != SCHEME {
        bail!("Unsupported password scheme {scheme:?}");
    }

    let iterations = iterations.parse::<u32>().context("Invalid iteration count")?;
    if iterations == 0 {
        bail!("Invalid iteration count");
    }

    Ok((
        iterations,
        hex::decode(salt).context("Invalid salt")?,
        hex::decode(digest).context("Invalid digest")?,
    ))
}

/// Malformed stored hashes never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    match parse(stored) {
        Ok((iterations, salt, digest)) => constant_time_eq(&stretch(&salt, password, iterations), &digest),
        Err(err) => {
            log::warn!("Rejecting stored password hash: {err}");
            false
        }
    }
}
