// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two-call `clGet*Info` protocol and decoding of the returned bytes.

use std::mem::size_of;

use oclink_core::error::{OclinkError, Result};
use oclink_core::status::check;
use oclink_core::types::RawHandle;
use oclink_native::NativeApi;
use oclink_native::api::InfoTarget;
use tracing::trace;

/// Ask for the size, allocate exactly that, ask again for the value.
pub fn fetch(api: &dyn NativeApi, target: InfoTarget, param: u32) -> Result<Vec<u8>> {
    let op = target.entry().symbol();
    let mut size = 0usize;
    check(api.get_info(target, param, None, &mut size), op)?;
    if size == 0 {
        return Ok(Vec::new());
    }
    let mut value = vec![0u8; size];
    let mut written = 0usize;
    check(api.get_info(target, param, Some(&mut value), &mut written), op)?;
    if written != size {
        return Err(OclinkError::QueryDecode {
            op,
            param,
            reason: format!("size changed between calls: {size} then {written}"),
        });
    }
    trace!(op, param, size, "info fetched");
    Ok(value)
}

fn wrong_size(op: &'static str, param: u32, expected: usize, got: usize) -> OclinkError {
    OclinkError::QueryDecode {
        op,
        param,
        reason: format!("expected {expected} bytes, got {got}"),
    }
}

/// A NUL-terminated string; trailing NULs are stripped.
pub fn decode_string(op: &'static str, param: u32, bytes: Vec<u8>) -> Result<String> {
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let mut bytes = bytes;
    bytes.truncate(end);
    String::from_utf8(bytes).map_err(|e| OclinkError::QueryDecode {
        op,
        param,
        reason: e.to_string(),
    })
}

macro_rules! scalar_decoder {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(op: &'static str, param: u32, bytes: &[u8]) -> Result<$ty> {
                let array: [u8; size_of::<$ty>()] = bytes
                    .try_into()
                    .map_err(|_| wrong_size(op, param, size_of::<$ty>(), bytes.len()))?;
                Ok(<$ty>::from_ne_bytes(array))
            }
        )*
    };
}

scalar_decoder! {
    decode_u32 => u32,
    decode_i32 => i32,
    decode_u64 => u64,
    decode_usize => usize,
}

/// An array of `size_t`.
pub fn decode_usizes(op: &'static str, param: u32, bytes: &[u8]) -> Result<Vec<usize>> {
    const W: usize = size_of::<usize>();
    if bytes.len() % W != 0 {
        return Err(OclinkError::QueryDecode {
            op,
            param,
            reason: format!("{} bytes is not a whole number of size_t", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(W)
        .map(|chunk| {
            let mut word = [0u8; W];
            word.copy_from_slice(chunk);
            usize::from_ne_bytes(word)
        })
        .collect())
}

/// An array of object handles.
pub fn decode_handles(op: &'static str, param: u32, bytes: &[u8]) -> Result<Vec<RawHandle>> {
    Ok(decode_usizes(op, param, bytes)?.into_iter().map(RawHandle).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_lose_their_terminator() {
        let s = decode_string("clGetDeviceInfo", 0x102B, b"gpu0\0".to_vec()).expect("utf-8");
        assert_eq!(s, "gpu0");
        assert_eq!(decode_string("op", 0, vec![0]).expect("empty"), "");
    }

    #[test]
    fn scalar_size_is_enforced() {
        assert_eq!(decode_u32("op", 1, &7u32.to_ne_bytes()).expect("u32"), 7);
        let err = decode_u64("op", 1, &7u32.to_ne_bytes()).unwrap_err();
        assert!(matches!(err, OclinkError::QueryDecode { param: 1, .. }));
    }

    #[test]
    fn handle_arrays_split_on_pointer_width() {
        let bytes: Vec<u8> = [0x10usize, 0x20].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let handles = decode_handles("op", 2, &bytes).expect("aligned");
        assert_eq!(handles, vec![RawHandle(0x10), RawHandle(0x20)]);
        assert!(decode_handles("op", 2, &bytes[..3]).is_err());
    }
}
