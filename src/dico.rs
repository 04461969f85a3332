//! The dictionary: an ordered collection of typed, length-prefixed
//! attributes keyed by `(section, key)`. This is the only structured
//! sub-format the I/O core interprets; higher layers attach whatever
//! `type` tags they want, opaque to this module beyond the byte layout.
//!
//! On-wire attribute layout:
//! ```text
//! type:    u8
//! section: u8
//! key:     u16 LE
//! size:    u16 LE
//! value:   size bytes
//! ```
//! preceded by a `count: u16 LE` and followed, at the frame level, by a
//! trailing Fletcher-32 checksum (see `frame.rs`).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

/// Largest value a single attribute may carry (`size` is a `u16`).
pub const MAX_ATTR_SIZE: usize = 65535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: u8,
    pub section: u8,
    pub key: u16,
    pub value: Vec<u8>,
}

/// An ordered set of attributes, addressable by `(section, key)`.
///
/// Insertion order is preserved on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    items: Vec<Attribute>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.items.iter()
    }

    /// Add a raw attribute. Fails if `value` exceeds `MAX_ATTR_SIZE`.
    pub fn add_generic(
        &mut self,
        section: u8,
        key: u16,
        value: impl Into<Vec<u8>>,
        attr_type: u8,
    ) -> io::Result<()> {
        let value = value.into();
        if value.len() > MAX_ATTR_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("attribute value of {} bytes exceeds {MAX_ATTR_SIZE}", value.len()),
            ));
        }
        self.items.push(Attribute {
            attr_type,
            section,
            key,
            value,
        });
        Ok(())
    }

    pub fn add_u16(&mut self, section: u8, key: u16, v: u16) -> io::Result<()> {
        self.add_generic(section, key, v.to_le_bytes().to_vec(), TYPE_U16)
    }

    pub fn add_u32(&mut self, section: u8, key: u16, v: u32) -> io::Result<()> {
        self.add_generic(section, key, v.to_le_bytes().to_vec(), TYPE_U32)
    }

    pub fn add_u64(&mut self, section: u8, key: u16, v: u64) -> io::Result<()> {
        self.add_generic(section, key, v.to_le_bytes().to_vec(), TYPE_U64)
    }

    pub fn add_string(&mut self, section: u8, key: u16, v: &str) -> io::Result<()> {
        self.add_generic(section, key, v.as_bytes().to_vec(), TYPE_STRING)
    }

    fn find(&self, section: u8, key: u16) -> Option<&Attribute> {
        self.items.iter().find(|a| a.section == section && a.key == key)
    }

    pub fn get_u16(&self, section: u8, key: u16) -> Option<u16> {
        self.find(section, key)
            .filter(|a| a.value.len() == 2)
            .map(|a| u16::from_le_bytes([a.value[0], a.value[1]]))
    }

    pub fn get_u32(&self, section: u8, key: u16) -> Option<u32> {
        self.find(section, key)
            .filter(|a| a.value.len() == 4)
            .map(|a| u32::from_le_bytes(a.value[..4].try_into().unwrap()))
    }

    pub fn get_u64(&self, section: u8, key: u16) -> Option<u64> {
        self.find(section, key)
            .filter(|a| a.value.len() == 8)
            .map(|a| u64::from_le_bytes(a.value[..8].try_into().unwrap()))
    }

    pub fn get_string(&self, section: u8, key: u16) -> Option<String> {
        self.find(section, key).map(|a| String::from_utf8_lossy(&a.value).into_owned())
    }

    pub fn get_data(&self, section: u8, key: u16) -> Option<&[u8]> {
        self.find(section, key).map(|a| a.value.as_slice())
    }

    /// Multiset of `(section, key, value)` used to compare dictionaries for
    /// equality independent of insertion order (testable property #1).
    pub fn attribute_multiset(&self) -> HashMap<(u8, u16, Vec<u8>), usize> {
        let mut m = HashMap::new();
        for a in &self.items {
            *m.entry((a.section, a.key, a.value.clone())).or_insert(0) += 1;
        }
        m
    }

    /// Serialize to `header-bytes`: count then each attribute,
    /// without the trailing checksum — the frame codec appends that.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_u16::<LittleEndian>(self.items.len() as u16)?;
        for a in &self.items {
            buf.write_u8(a.attr_type)?;
            buf.write_u8(a.section)?;
            buf.write_u16::<LittleEndian>(a.key)?;
            buf.write_u16::<LittleEndian>(a.value.len() as u16)?;
            buf.write_all(&a.value)?;
        }
        Ok(buf)
    }

    /// Decode `header-bytes` (post checksum verification) into a dictionary.
    pub fn decode(bytes: &[u8]) -> io::Result<Self> {
        let mut cur = Cursor::new(bytes);
        let count = cur.read_u16::<LittleEndian>()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let attr_type = cur.read_u8()?;
            let section = cur.read_u8()?;
            let key = cur.read_u16::<LittleEndian>()?;
            let size = cur.read_u16::<LittleEndian>()? as usize;
            let mut value = vec![0u8; size];
            cur.read_exact(&mut value)?;
            items.push(Attribute {
                attr_type,
                section,
                key,
                value,
            });
        }
        Ok(Self { items })
    }
}

pub const TYPE_U16: u8 = 1;
pub const TYPE_U32: u8 = 2;
pub const TYPE_U64: u8 = 3;
pub const TYPE_STRING: u8 = 4;
pub const TYPE_BIN: u8 = 5;
