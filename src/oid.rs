//! 12-byte ObjectId.

use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, ErrorCode, Result};

const TIMESTAMP: usize = 0;
const PROCESS: usize = 4;
const COUNTER: usize = 9;

const MAX_COUNTER: u32 = 0x00FF_FFFF;

// Random per process, drawn once.
static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut b = [0u8; 5];
    b.iter_mut().for_each(|x| *x = fastrand::u8(..));
    b
});

static COUNTER_STATE: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(fastrand::u32(..=MAX_COUNTER)));

/// A 12-byte identifier: 4-byte big-endian seconds, 5-byte process unique
/// value and a 3-byte big-endian counter.
///
/// Ordering is lexicographic over the raw bytes, which orders by timestamp,
/// then by process value, then by counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub const LENGTH: usize = 12;

    /// Generates a new id for the current time.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let counter = COUNTER_STATE.fetch_add(1, Ordering::Relaxed) & MAX_COUNTER;

        let mut b = [0u8; 12];
        b[TIMESTAMP..PROCESS].copy_from_slice(&secs.to_be_bytes());
        b[PROCESS..COUNTER].copy_from_slice(&PROCESS_UNIQUE[..]);
        b[COUNTER..].copy_from_slice(&counter.to_be_bytes()[1..]);
        ObjectId(b)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    /// Copies an id out of a slice that must be exactly 12 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LENGTH {
            fail!(ErrorCode::InvalidOid);
        }
        let mut b = [0u8; 12];
        b.copy_from_slice(bytes);
        Ok(ObjectId(b))
    }

    /// Parses the 24 character hexadecimal representation.
    pub fn parse_str(s: &str) -> Result<Self> {
        Ok(decode_hex(s)?)
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Seconds since the Unix epoch at which the id was generated.
    pub fn timestamp(&self) -> u32 {
        let mut t = [0u8; 4];
        t.copy_from_slice(&self.0[TIMESTAMP..PROCESS]);
        u32::from_be_bytes(t)
    }

    pub fn to_hex(&self) -> String {
        bintext::hex::encode(&self.0[..]).to_ascii_lowercase()
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Error> {
        decode_hex(s)
    }
}

fn decode_hex(s: &str) -> std::result::Result<ObjectId, Error> {
    if s.len() != 2 * ObjectId::LENGTH || !s.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(ErrorCode::InvalidOid.into());
    }
    let bytes = bintext::hex::decode_noerr(s).map_err(|_| Error::from(ErrorCode::InvalidOid))?;
    if bytes.len() != ObjectId::LENGTH {
        return Err(ErrorCode::InvalidOid.into());
    }
    let mut b = [0u8; 12];
    b.copy_from_slice(&bytes);
    Ok(ObjectId(b))
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(timestamp: u32, value: [u8; 5], counter: u32) -> ObjectId {
        let mut b = [0u8; 12];
        b[..4].copy_from_slice(&timestamp.to_be_bytes());
        b[4..9].copy_from_slice(&value);
        b[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        ObjectId::from_bytes(b)
    }

    #[test]
    fn ordering_follows_timestamp_first() {
        let older = oid(1, [0xFF; 5], 0xFF_FFFF);
        let newer = oid(2, [0; 5], 0);
        assert!(newer > older);

        // Large timestamps are compared unsigned.
        assert!(oid(0x8000_0000, [0; 5], 0) > oid(0x7FFF_FFFF, [0xFF; 5], 0xFF_FFFF));
        assert!(oid(5, [0, 0, 0, 0, 1], 0) > oid(5, [0; 5], 0xFF_FFFF));
        assert!(oid(5, [1; 5], 2) > oid(5, [1; 5], 1));
    }

    #[test]
    fn hex_round_trip() {
        let s = "507f1f77bcf86cd799439011";
        let id: ObjectId = s.parse().unwrap();
        assert_eq!(id.to_string(), s);
        assert_eq!(id.timestamp(), 0x507f1f77);
        assert_eq!(ObjectId::parse_str(s).unwrap(), id);
    }

    #[test]
    fn rejects_bad_strings() {
        assert!("".parse::<ObjectId>().is_err());
        assert!("507f1f77bcf86cd79943901".parse::<ObjectId>().is_err());
        assert!("507f1f77bcf86cd79943901z".parse::<ObjectId>().is_err());
        assert!(ObjectId::from_slice(&[0u8; 11]).is_err());
    }

    #[test]
    fn generated_ids_share_process_value() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.bytes()[PROCESS..COUNTER], b.bytes()[PROCESS..COUNTER]);
        assert_eq!(a.bytes()[PROCESS..COUNTER], PROCESS_UNIQUE[..]);
    }

    #[test]
    fn counter_wrap_orders_by_timestamp() {
        // Same second: a wrapped counter sorts first
        assert!(oid(7, [3; 5], MAX_COUNTER) > oid(7, [3; 5], 0));
        assert!(oid(8, [3; 5], 0) > oid(7, [3; 5], MAX_COUNTER));
    }
}
