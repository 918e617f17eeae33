//! AMF0 serialization of structured values
//!
//! Data events travel to and from the server as AMF0 value sequences.
//!
//! Type mapping:
//! ```text
//! Null            <-> 0x05 Null (0x06 Undefined / 0x0D Unsupported decode as Null)
//! Boolean         <-> 0x01 Boolean
//! String          <-> 0x02 String / 0x0C Long String (0x0F XML decodes as String)
//! Integer/Float/
//! Double           -> 0x00 Number   (Number always decodes as Double)
//! Date            <-> 0x0B Date
//! Map             <-> 0x03 Object   (0x08 ECMA Array, 0x10 Typed Object decode as Map)
//! List            <-> 0x0A Strict Array
//! ```
//!
//! AMF0 has a single numeric type, so integer and float values come back as
//! doubles after a round trip.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::value::{DataList, DataMap, StructuredValue};
use crate::error::AmfError;

/// Nesting limit applied unless configured otherwise
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Decoded value limit per message applied unless configured otherwise
pub const DEFAULT_MAX_VALUES: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Marker {
    Number = 0x00,
    Boolean = 0x01,
    String = 0x02,
    Object = 0x03,
    Null = 0x05,
    Undefined = 0x06,
    Reference = 0x07,
    EcmaArray = 0x08,
    ObjectEnd = 0x09,
    StrictArray = 0x0A,
    Date = 0x0B,
    LongString = 0x0C,
    Unsupported = 0x0D,
    XmlDocument = 0x0F,
    TypedObject = 0x10,
}

impl Marker {
    fn from_byte(byte: u8) -> Option<Self> {
        let marker = match byte {
            0x00 => Marker::Number,
            0x01 => Marker::Boolean,
            0x02 => Marker::String,
            0x03 => Marker::Object,
            0x05 => Marker::Null,
            0x06 => Marker::Undefined,
            0x07 => Marker::Reference,
            0x08 => Marker::EcmaArray,
            0x09 => Marker::ObjectEnd,
            0x0A => Marker::StrictArray,
            0x0B => Marker::Date,
            0x0C => Marker::LongString,
            0x0D => Marker::Unsupported,
            0x0F => Marker::XmlDocument,
            0x10 => Marker::TypedObject,
            _ => return None,
        };
        Some(marker)
    }
}

fn ensure(buf: &Bytes, len: usize) -> Result<(), AmfError> {
    if buf.remaining() < len {
        return Err(AmfError::UnexpectedEof);
    }
    Ok(())
}

fn read_utf8(buf: &mut Bytes, len: usize) -> Result<String, AmfError> {
    ensure(buf, len)?;
    let raw = buf.split_to(len);
    std::str::from_utf8(&raw)
        .map(str::to_owned)
        .map_err(|_| AmfError::InvalidUtf8)
}

/// UTF-8 string with a 16-bit length prefix
fn read_short_string(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 2)?;
    let len = buf.get_u16() as usize;
    read_utf8(buf, len)
}

/// UTF-8 string with a 32-bit length prefix
fn read_long_string(buf: &mut Bytes) -> Result<String, AmfError> {
    ensure(buf, 4)?;
    let len = buf.get_u32() as usize;
    read_utf8(buf, len)
}

/// AMF0 decoder settings
///
/// Lenient decoding (the default) accepts what real servers send: objects
/// missing their end marker and unknown type markers (read as null).
///
/// Every decoded value counts against `max_values`, and a reference counts
/// as the full size of the value it points at, so a short message cannot
/// expand into an arbitrarily large tree.
#[derive(Debug, Clone)]
pub struct Amf0Decoder {
    lenient: bool,
    max_depth: usize,
    max_values: usize,
}

impl Amf0Decoder {
    pub fn new() -> Self {
        Self {
            lenient: true,
            max_depth: DEFAULT_MAX_DEPTH,
            max_values: DEFAULT_MAX_VALUES,
        }
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_values(mut self, count: usize) -> Self {
        self.max_values = count;
        self
    }

    /// Decode the next value from `buf`
    pub fn decode_one(&self, buf: &mut Bytes) -> Result<StructuredValue, AmfError> {
        Message::new(self, buf).value()
    }

    /// Decode values until `buf` is exhausted
    ///
    /// References resolve across the whole sequence, as they do within one
    /// AMF0 message, and the value budget covers the sequence as a whole.
    pub fn decode_all(&self, buf: &mut Bytes) -> Result<Vec<StructuredValue>, AmfError> {
        let mut message = Message::new(self, buf);
        let mut values = Vec::new();
        while message.buf.has_remaining() {
            values.push(message.value()?);
        }
        Ok(values)
    }
}

impl Default for Amf0Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoding state for one message
struct Message<'a> {
    settings: &'a Amf0Decoder,
    buf: &'a mut Bytes,
    /// Complex values seen so far, with their size in values
    references: Vec<(StructuredValue, usize)>,
    depth: usize,
    decoded: usize,
}

impl<'a> Message<'a> {
    fn new(settings: &'a Amf0Decoder, buf: &'a mut Bytes) -> Self {
        Self {
            settings,
            buf,
            references: Vec::new(),
            depth: 0,
            decoded: 0,
        }
    }

    fn charge(&mut self, count: usize) -> Result<(), AmfError> {
        self.decoded = self.decoded.saturating_add(count);
        if self.decoded > self.settings.max_values {
            return Err(AmfError::TooManyValues {
                max: self.settings.max_values,
            });
        }
        Ok(())
    }

    fn value(&mut self) -> Result<StructuredValue, AmfError> {
        if self.depth >= self.settings.max_depth {
            return Err(AmfError::NestingTooDeep);
        }
        self.charge(1)?;
        ensure(self.buf, 1)?;

        self.depth += 1;
        let marker = self.buf.get_u8();
        let value = self.typed(marker);
        self.depth -= 1;
        value
    }

    fn typed(&mut self, byte: u8) -> Result<StructuredValue, AmfError> {
        let Some(marker) = Marker::from_byte(byte) else {
            return match self.settings.lenient {
                true => Ok(StructuredValue::Null),
                false => Err(AmfError::UnknownMarker(byte)),
            };
        };

        match marker {
            Marker::Number => {
                ensure(self.buf, 8)?;
                Ok(StructuredValue::Double(self.buf.get_f64()))
            }
            Marker::Boolean => {
                ensure(self.buf, 1)?;
                Ok(StructuredValue::Boolean(self.buf.get_u8() != 0))
            }
            Marker::String => Ok(StructuredValue::String(read_short_string(self.buf)?)),
            Marker::LongString | Marker::XmlDocument => {
                Ok(StructuredValue::String(read_long_string(self.buf)?))
            }
            Marker::Date => {
                ensure(self.buf, 10)?;
                let millis = self.buf.get_f64();
                let _timezone = self.buf.get_i16();
                Ok(StructuredValue::Date(millis))
            }
            Marker::Object => self.map(),
            Marker::EcmaArray => {
                // The count is a hint some encoders get wrong; the end marker decides
                ensure(self.buf, 4)?;
                let _count = self.buf.get_u32();
                self.map()
            }
            Marker::TypedObject => {
                let _class_name = read_short_string(self.buf)?;
                self.map()
            }
            Marker::StrictArray => self.list(),
            Marker::Reference => self.reference(),
            Marker::Null | Marker::Undefined | Marker::Unsupported => Ok(StructuredValue::Null),
            Marker::ObjectEnd => match self.settings.lenient {
                true => Ok(StructuredValue::Null),
                false => Err(AmfError::InvalidObjectEnd),
            },
        }
    }

    fn reference(&mut self) -> Result<StructuredValue, AmfError> {
        ensure(self.buf, 2)?;
        let index = self.buf.get_u16();
        let size = match self.references.get(index as usize) {
            Some((_, size)) => *size,
            None => return Err(AmfError::InvalidReference(index)),
        };

        // The marker itself was already counted
        self.charge(size.saturating_sub(1))?;
        Ok(self.references[index as usize].0.clone())
    }

    fn map(&mut self) -> Result<StructuredValue, AmfError> {
        let slot = self.reserve_reference();
        let first = self.decoded;
        let mut map = DataMap::new();

        loop {
            if self.settings.lenient && !self.buf.has_remaining() {
                break;
            }
            let key = read_short_string(self.buf)?;
            if !key.is_empty() {
                let value = self.value()?;
                map.set(key, value);
                continue;
            }

            if !self.buf.has_remaining() {
                match self.settings.lenient {
                    true => break,
                    false => return Err(AmfError::UnexpectedEof),
                }
            }
            if self.buf.get_u8() == Marker::ObjectEnd as u8 || self.settings.lenient {
                break;
            }
            return Err(AmfError::InvalidObjectEnd);
        }

        Ok(self.fill_reference(slot, first, StructuredValue::Map(map)))
    }

    fn list(&mut self) -> Result<StructuredValue, AmfError> {
        ensure(self.buf, 4)?;
        let len = self.buf.get_u32() as usize;
        if len > DataList::MAX_SIZE {
            return Err(AmfError::ListTooLong {
                len,
                max: DataList::MAX_SIZE,
            });
        }

        let slot = self.reserve_reference();
        let first = self.decoded;
        let elements = (0..len)
            .map(|_| self.value())
            .collect::<Result<Vec<_>, _>>()?;
        let list = DataList::from_vec(elements).map_err(|_| AmfError::ListTooLong {
            len,
            max: DataList::MAX_SIZE,
        })?;

        Ok(self.fill_reference(slot, first, StructuredValue::List(list)))
    }

    fn reserve_reference(&mut self) -> usize {
        self.references.push((StructuredValue::Null, 1));
        self.references.len() - 1
    }

    /// `first` is the value count when the container's children began
    fn fill_reference(
        &mut self,
        slot: usize,
        first: usize,
        value: StructuredValue,
    ) -> StructuredValue {
        let size = self.decoded - first + 1;
        self.references[slot] = (value.clone(), size);
        value
    }
}

/// AMF0 encoder accumulating values into one buffer
#[derive(Debug, Default)]
pub struct Amf0Encoder {
    out: BytesMut,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: BytesMut::with_capacity(capacity),
        }
    }

    /// Append one value
    pub fn write(&mut self, value: &StructuredValue) -> &mut Self {
        write_value(&mut self.out, value);
        self
    }

    /// Append a sequence of values
    pub fn write_all(&mut self, values: &[StructuredValue]) -> &mut Self {
        for value in values {
            write_value(&mut self.out, value);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Take the encoded bytes, leaving the encoder empty
    pub fn take(&mut self) -> Bytes {
        self.out.split().freeze()
    }
}

fn write_value(out: &mut BytesMut, value: &StructuredValue) {
    match value {
        StructuredValue::Null => out.put_u8(Marker::Null as u8),
        StructuredValue::Boolean(flag) => {
            out.put_u8(Marker::Boolean as u8);
            out.put_u8(*flag as u8);
        }
        StructuredValue::Integer(n) => write_number(out, *n as f64),
        StructuredValue::Float(n) => write_number(out, f64::from(*n)),
        StructuredValue::Double(n) => write_number(out, *n),
        StructuredValue::String(text) => match u16::try_from(text.len()) {
            Ok(len) => {
                out.put_u8(Marker::String as u8);
                out.put_u16(len);
                out.put_slice(text.as_bytes());
            }
            Err(_) => {
                out.put_u8(Marker::LongString as u8);
                out.put_u32(text.len() as u32);
                out.put_slice(text.as_bytes());
            }
        },
        StructuredValue::Date(millis) => {
            out.put_u8(Marker::Date as u8);
            out.put_f64(*millis);
            out.put_i16(0);
        }
        StructuredValue::Map(map) => {
            out.put_u8(Marker::Object as u8);
            for (key, entry) in map {
                write_key(out, key);
                write_value(out, entry);
            }
            out.put_u16(0);
            out.put_u8(Marker::ObjectEnd as u8);
        }
        StructuredValue::List(list) => {
            out.put_u8(Marker::StrictArray as u8);
            out.put_u32(list.len() as u32);
            for element in list {
                write_value(out, element);
            }
        }
    }
}

fn write_number(out: &mut BytesMut, n: f64) {
    out.put_u8(Marker::Number as u8);
    out.put_f64(n);
}

/// Object keys carry a 16-bit length; longer keys are cut at a char boundary
fn write_key(out: &mut BytesMut, key: &str) {
    let mut end = key.len().min(u16::MAX as usize);
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    out.put_u16(end as u16);
    out.put_slice(&key.as_bytes()[..end]);
}

/// Encode a single value
pub fn encode(value: &StructuredValue) -> Bytes {
    Amf0Encoder::new().write(value).take()
}

/// Encode a sequence of values
pub fn encode_all(values: &[StructuredValue]) -> Bytes {
    Amf0Encoder::new().write_all(values).take()
}

/// Decode a single value (lenient)
pub fn decode(data: impl Into<Bytes>) -> Result<StructuredValue, AmfError> {
    Amf0Decoder::new().decode_one(&mut data.into())
}

/// Decode all values in the buffer (lenient)
pub fn decode_all(data: impl Into<Bytes>) -> Result<Vec<StructuredValue>, AmfError> {
    Amf0Decoder::new().decode_all(&mut data.into())
}
