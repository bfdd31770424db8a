use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Append-only output buffer for one message.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

macro_rules! put_scalar {
    ($($ty:ident => $put:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $ty(&mut self, v: $ty) {
                self.buf.$put(v);
            }
        )*
    };
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    put_scalar! {
        u8 => put_u8,
        u16 => put_u16_le,
        u32 => put_u32_le,
        u64 => put_u64_le,
        i32 => put_i32_le,
        f32 => put_f32_le,
        f64 => put_f64_le,
    }

    #[inline]
    pub fn bool(&mut self, v: bool) {
        self.buf.put_u8(u8::from(v));
    }

    /// Sequence or byte-string length prefix.
    ///
    /// Frames cap payloads far below `u32::MAX`, so an oversized length can
    /// never reach the peer intact.
    #[inline]
    pub fn length(&mut self, len: usize) {
        debug_assert!(u32::try_from(len).is_ok(), "length {len} overflows u32");
        self.buf.put_u32_le(len as u32);
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.length(v.len());
        self.buf.put_slice(v);
    }

    pub fn str(&mut self, v: &str) {
        self.bytes(v.as_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over one received payload.
///
/// Every read checks the remaining length first, so a truncated or hostile
/// payload surfaces as a [`WireError`] instead of a panic.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

macro_rules! get_scalar {
    ($($ty:ident => $get:ident),* $(,)?) => {
        $(
            #[inline]
            pub fn $ty(&mut self) -> Result<$ty> {
                let mut raw = self.take(std::mem::size_of::<$ty>())?;
                Ok(raw.$get())
            }
        )*
    };
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(WireError::UnexpectedEof {
                needed: n,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    get_scalar! {
        u8 => get_u8,
        u16 => get_u16_le,
        u32 => get_u32_le,
        u64 => get_u64_le,
        i32 => get_i32_le,
        f32 => get_f32_le,
        f64 => get_f64_le,
    }

    pub fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    /// Read a sequence length and check it against the remaining input.
    ///
    /// Every element occupies at least one byte, so a count larger than what
    /// is left cannot be honest. Checked before anything is allocated.
    pub fn length(&mut self) -> Result<usize> {
        let len = self.u32()? as usize;
        if len > self.buf.len() {
            return Err(WireError::LengthOverflow {
                len,
                remaining: self.buf.len(),
            });
        }
        Ok(len)
    }

    pub fn bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.length()?;
        self.take(len)
    }

    pub fn str(&mut self) -> Result<&'a str> {
        std::str::from_utf8(self.bytes()?).map_err(|_| WireError::InvalidUtf8)
    }

    /// Succeeds only if every byte was consumed.
    pub fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.buf.len()))
        }
    }
}

pub trait Encode {
    fn encode(&self, enc: &mut Encoder);
}

pub trait Decode: Sized {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self>;
}

/// Encode one value into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Bytes {
    let mut enc = Encoder::new();
    value.encode(&mut enc);
    enc.finish()
}

/// Decode one value that must span all of `buf`.
pub fn from_bytes<T: Decode>(buf: &[u8]) -> Result<T> {
    let mut dec = Decoder::new(buf);
    let value = T::decode(&mut dec)?;
    dec.finish()?;
    Ok(value)
}

macro_rules! scalar_codec {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, enc: &mut Encoder) {
                    enc.$ty(*self);
                }
            }

            impl Decode for $ty {
                fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
                    dec.$ty()
                }
            }
        )*
    };
}

scalar_codec!(u8, u16, u32, u64, i32, f32, f64, bool);

impl Encode for str {
    fn encode(&self, enc: &mut Encoder) {
        enc.str(self);
    }
}

impl Encode for String {
    fn encode(&self, enc: &mut Encoder) {
        enc.str(self);
    }
}

impl Decode for String {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.str().map(str::to_owned)
    }
}

impl Encode for Bytes {
    fn encode(&self, enc: &mut Encoder) {
        enc.bytes(self);
    }
}

impl Decode for Bytes {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        dec.bytes().map(Bytes::copy_from_slice)
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            None => enc.u8(0),
            Some(value) => {
                enc.u8(1);
                value.encode(enc);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.u8()? {
            0 => Ok(None),
            1 => T::decode(dec).map(Some),
            tag => Err(WireError::InvalidTag { ty: "Option", tag }),
        }
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, enc: &mut Encoder) {
        enc.length(self.len());
        for item in self {
            item.encode(enc);
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, enc: &mut Encoder) {
        self.as_slice().encode(enc);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let len = dec.length()?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(T::decode(dec)?);
        }
        Ok(items)
    }
}

impl<T: Encode, E: Encode> Encode for std::result::Result<T, E> {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Ok(value) => {
                enc.u8(0);
                value.encode(enc);
            }
            Err(err) => {
                enc.u8(1);
                err.encode(enc);
            }
        }
    }
}

impl<T: Decode, E: Decode> Decode for std::result::Result<T, E> {
    fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        match dec.u8()? {
            0 => T::decode(dec).map(Ok),
            1 => E::decode(dec).map(Err),
            tag => Err(WireError::InvalidTag { ty: "Result", tag }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_little_endian() {
        let mut enc = Encoder::new();
        enc.u16(0x0102);
        enc.u32(0x0304_0506);
        enc.i32(-2);
        assert_eq!(
            &enc.finish()[..],
            &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0xfe, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn bool_is_strict() {
        assert_eq!(from_bytes::<bool>(&[1]), Ok(true));
        assert_eq!(from_bytes::<bool>(&[0]), Ok(false));
        assert_eq!(from_bytes::<bool>(&[2]), Err(WireError::InvalidBool(2)));
    }

    #[test]
    fn truncated_scalar_reports_shortfall() {
        assert_eq!(
            from_bytes::<u64>(&[1, 2, 3]),
            Err(WireError::UnexpectedEof {
                needed: 8,
                remaining: 3
            })
        );
    }

    #[test]
    fn strings_carry_length_and_validate_utf8() {
        let bytes = to_bytes("label");
        assert_eq!(&bytes[..4], &5u32.to_le_bytes());
        assert_eq!(from_bytes::<String>(&bytes).unwrap(), "label");

        let mut bad = 2u32.to_le_bytes().to_vec();
        bad.extend_from_slice(&[0xc3, 0x28]);
        assert_eq!(from_bytes::<String>(&bad), Err(WireError::InvalidUtf8));
    }

    #[test]
    fn absent_option_is_one_byte() {
        assert_eq!(&to_bytes(&None::<u64>)[..], &[0]);
        assert_eq!(from_bytes::<Option<u64>>(&[0]), Ok(None));
        assert_eq!(
            from_bytes::<Option<u32>>(&[1, 7, 0, 0, 0]),
            Ok(Some(7))
        );
        assert_eq!(
            from_bytes::<Option<u32>>(&[9]),
            Err(WireError::InvalidTag {
                ty: "Option",
                tag: 9
            })
        );
    }

    #[test]
    fn hostile_sequence_length_rejected_before_allocating() {
        let mut raw = u32::MAX.to_le_bytes().to_vec();
        raw.push(0);
        assert_eq!(
            from_bytes::<Vec<u64>>(&raw),
            Err(WireError::LengthOverflow {
                len: u32::MAX as usize,
                remaining: 1
            })
        );
    }

    #[test]
    fn sequence_element_failure_aborts_whole_sequence() {
        let mut enc = Encoder::new();
        enc.length(3);
        enc.bool(true);
        enc.u8(5);
        enc.bool(false);
        assert_eq!(
            from_bytes::<Vec<bool>>(&enc.finish()),
            Err(WireError::InvalidBool(5))
        );
    }

    #[test]
    fn trailing_bytes_rejected() {
        assert_eq!(
            from_bytes::<u8>(&[1, 2]),
            Err(WireError::TrailingBytes(1))
        );
    }

    #[test]
    fn result_arms() {
        let ok: std::result::Result<u32, String> = Ok(4);
        let err: std::result::Result<u32, String> = Err("nope".into());
        assert_eq!(from_bytes::<std::result::Result<u32, String>>(&to_bytes(&ok)), Ok(ok));
        assert_eq!(from_bytes::<std::result::Result<u32, String>>(&to_bytes(&err)), Ok(err));
    }
}
