//! Protobuf wire encoding for dag-pb and UnixFS nodes
//!
//! Only the subset needed to serialize nodes: varints, length-delimited
//! fields and varint fields.

/// Protobuf wire type for varint fields
const WIRE_VARINT: u32 = 0;

/// Protobuf wire type for length-delimited fields
const WIRE_LEN: u32 = 2;

/// Append an unsigned LEB128 varint
pub(crate) fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Encoded length of a varint
pub(crate) fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

fn put_key(buf: &mut Vec<u8>, field: u32, wire_type: u32) {
    put_varint(buf, u64::from(field << 3 | wire_type));
}

/// Append a varint field (`key || varint`)
pub(crate) fn put_uint_field(buf: &mut Vec<u8>, field: u32, value: u64) {
    put_key(buf, field, WIRE_VARINT);
    put_varint(buf, value);
}

/// Append a length-delimited field (`key || len || bytes`)
pub(crate) fn put_bytes_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    put_key(buf, field, WIRE_LEN);
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
