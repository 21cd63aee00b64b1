//! Big-endian primitive encoding shared by the blob-tree and solution-tree
//! wire formats. Every length-prefixed field uses a 4-byte unsigned count;
//! every signed scalar (matrix cells, raise amounts) is a 4-byte `i32`.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{WireError, WireResult};

pub const U32_SIZE: usize = 4;
pub const I32_SIZE: usize = 4;

pub fn need(buf: &[u8], at: usize, len: usize) -> WireResult<()> {
    if buf.len() < at + len {
        Err(WireError::UnexpectedEof {
            needed: at + len,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

pub fn encode_u32(buf: &mut Vec<u8>, value: u32) {
    let mut tmp = [0u8; U32_SIZE];
    BigEndian::write_u32(&mut tmp, value);
    buf.extend_from_slice(&tmp);
}

pub fn decode_u32(buf: &[u8], at: usize) -> WireResult<(u32, usize)> {
    need(buf, at, U32_SIZE)?;
    Ok((BigEndian::read_u32(&buf[at..at + U32_SIZE]), at + U32_SIZE))
}

pub fn encode_i32(buf: &mut Vec<u8>, value: i32) {
    let mut tmp = [0u8; I32_SIZE];
    BigEndian::write_i32(&mut tmp, value);
    buf.extend_from_slice(&tmp);
}

pub fn decode_i32(buf: &[u8], at: usize) -> WireResult<(i32, usize)> {
    need(buf, at, I32_SIZE)?;
    Ok((BigEndian::read_i32(&buf[at..at + I32_SIZE]), at + I32_SIZE))
}

pub fn encode_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    encode_u32(buf, value.len() as u32);
    buf.extend_from_slice(value);
}

pub fn decode_bytes(buf: &[u8], at: usize) -> WireResult<(Vec<u8>, usize)> {
    let (len, at) = decode_u32(buf, at)?;
    let len = len as usize;
    need(buf, at, len)?;
    Ok((buf[at..at + len].to_vec(), at + len))
}

pub fn encode_string(buf: &mut Vec<u8>, value: &str) {
    encode_bytes(buf, value.as_bytes());
}

pub fn decode_string(buf: &[u8], at: usize) -> WireResult<(String, usize)> {
    let (raw, next) = decode_bytes(buf, at)?;
    if !raw.is_ascii() {
        return Err(WireError::InvalidAsciiString);
    }
    // SAFETY: just checked is_ascii(), ascii is a strict subset of utf8.
    Ok((String::from_utf8(raw).expect("ascii is valid utf8"), next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_round_trips() {
        let mut buf = Vec::new();
        encode_u32(&mut buf, 0xdead_beef);
        let (v, next) = decode_u32(&buf, 0).unwrap();
        assert_eq!(v, 0xdead_beef);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn i32_round_trips_negative() {
        let mut buf = Vec::new();
        encode_i32(&mut buf, -12345);
        let (v, _) = decode_i32(&buf, 0).unwrap();
        assert_eq!(v, -12345);
    }

    #[test]
    fn string_rejects_non_ascii() {
        let mut buf = Vec::new();
        encode_bytes(&mut buf, "caf\u{e9}".as_bytes());
        assert!(matches!(
            decode_string(&buf, 0),
            Err(WireError::InvalidAsciiString)
        ));
    }

    #[test]
    fn decode_reports_eof() {
        let buf = [0u8, 0, 0];
        assert!(matches!(
            decode_u32(&buf, 0),
            Err(WireError::UnexpectedEof { .. })
        ));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn u32_round_trips_any_value(v in any::<u32>()) {
            let mut buf = Vec::new();
            encode_u32(&mut buf, v);
            let (got, next) = decode_u32(&buf, 0).unwrap();
            prop_assert_eq!(got, v);
            prop_assert_eq!(next, buf.len());
        }

        #[test]
        fn i32_round_trips_any_value(v in any::<i32>()) {
            let mut buf = Vec::new();
            encode_i32(&mut buf, v);
            let (got, next) = decode_i32(&buf, 0).unwrap();
            prop_assert_eq!(got, v);
            prop_assert_eq!(next, buf.len());
        }

        #[test]
        fn bytes_round_trip_any_payload(payload in prop::collection::vec(any::<u8>(), 0..256)) {
            let mut buf = Vec::new();
            encode_bytes(&mut buf, &payload);
            let (got, next) = decode_bytes(&buf, 0).unwrap();
            prop_assert_eq!(got, payload);
            prop_assert_eq!(next, buf.len());
        }

        #[test]
        fn ascii_string_round_trips(s in "[ -~]{0,64}") {
            let mut buf = Vec::new();
            encode_string(&mut buf, &s);
            let (got, next) = decode_string(&buf, 0).unwrap();
            prop_assert_eq!(got, s);
            prop_assert_eq!(next, buf.len());
        }
    }
}
