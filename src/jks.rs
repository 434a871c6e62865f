//! Reader for Java JKS keystores, trusted-certificate entries only.
//! Private-key entries are parsed past but not imported; this tool only
//! moves trust material.

use crate::{
    cert::ParsedCertificate,
    error::{AppResult, ErrorReason},
    keystore::Keystore,
};
use sha1::{Digest, Sha1};

pub const JKS_MAGIC: u32 = 0xFEED_FEED;
const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const SIGNATURE_WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;

pub fn is_jks(data: &[u8]) -> bool {
    data.len() >= 4 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == JKS_MAGIC
}

/// Parse a JKS keystore into a [Keystore] of its trusted certificates.
/// When a password is given, the trailing SHA-1 integrity digest is
/// verified; a mismatch means a wrong password or a corrupted file.
pub fn read_jks(data: &[u8], password: Option<&str>) -> AppResult<Keystore> {
    let mut cursor = Cursor::new(data);

    let magic = cursor.read_u32()?;
    if magic != JKS_MAGIC {
        return Err(ErrorReason::Load("invalid JKS magic number".to_string()).into());
    }
    let version = cursor.read_u32()?;
    if version != 1 && version != 2 {
        return Err(ErrorReason::Load(format!("unsupported JKS version {version}")).into());
    }

    let count = cursor.read_u32()?;
    let mut keystore = Keystore::new();
    for _ in 0..count {
        let tag = cursor.read_u32()?;
        let alias = cursor.read_utf()?;
        let _timestamp = cursor.read_u64()?;
        match tag {
            TAG_TRUSTED_CERT => {
                let _cert_type = cursor.read_utf()?;
                let der = cursor.read_bytes_u32()?;
                keystore.insert(alias, ParsedCertificate::from_der(der.to_vec())?);
            }
            TAG_PRIVATE_KEY => {
                let _key = cursor.read_bytes_u32()?;
                let chain_len = cursor.read_u32()?;
                for _ in 0..chain_len {
                    let _cert_type = cursor.read_utf()?;
                    let _der = cursor.read_bytes_u32()?;
                }
                debug!("skipping JKS private key entry at alias '{alias}'");
            }
            other => {
                return Err(ErrorReason::Load(format!("unknown JKS entry tag {other}")).into());
            }
        }
    }

    if let Some(password) = password {
        let body_len = cursor.position();
        let digest = cursor.read_exact(DIGEST_LEN)?;
        let expected = integrity_digest(password, &data[..body_len]);
        if digest != expected.as_slice() {
            return Err(ErrorReason::Load(
                "JKS integrity check failed (wrong password?)".to_string(),
            )
            .into());
        }
    }

    Ok(keystore)
}

/// SHA-1 over the UTF-16BE password, a fixed whitener string, and the
/// keystore body, as implemented by the JDK.
fn integrity_digest(password: &str, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for unit in password.encode_utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(SIGNATURE_WHITENER);
    hasher.update(body);
    hasher.finalize().into()
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn read_exact(&mut self, len: usize) -> AppResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ErrorReason::Load("truncated JKS keystore".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> AppResult<u16> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> AppResult<u32> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> AppResult<u64> {
        let bytes = self.read_exact(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    fn read_bytes_u32(&mut self) -> AppResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_exact(len)
    }

    fn read_utf(&mut self) -> AppResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_exact(len)?;
        // Aliases are ASCII in practice; reject anything that is not
        // valid UTF-8 rather than implement modified UTF-8.
        Ok(String::from_utf8(bytes.to_vec())
            .map_err(|_| ErrorReason::Load("malformed JKS entry alias".to_string()))?)
    }
}
