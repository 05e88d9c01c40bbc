//! Packing of 16-bit register words into bytes and reinterpretation as wider types.
//!
//! Registers are combined in one of two word orders, then each word is laid out with the
//! requested byte endianness. The packed bytes are always read back in host order, so a
//! non-native endianness swaps the bytes of every word.

use crate::common::error::DriftError;

/// byte endianness of each packed word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Native,
    Little,
    Big,
}

impl Endianness {
    /// struct-style codes `=`, `<`, `>`
    pub fn from_code(code: &str) -> Result<Self, DriftError> {
        match code {
            "=" | "@" => Ok(Endianness::Native),
            "<" => Ok(Endianness::Little),
            ">" | "!" => Ok(Endianness::Big),
            _ => Err(DriftError::Config(format!("invalid endianness {:?}", code))),
        }
    }

    fn is_little(&self) -> bool {
        match self {
            Endianness::Native => cfg!(target_endian = "little"),
            Endianness::Little => true,
            Endianness::Big => false,
        }
    }

    fn word_bytes(&self, word: u16) -> [u8; 2] {
        if self.is_little() {
            word.to_le_bytes()
        } else {
            word.to_be_bytes()
        }
    }

}

/// order in which multi-register values arrive from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WordOrder {
    #[default]
    MswFirst,
    LswFirst,
}

impl WordOrder {
    pub fn parse(text: &str) -> Result<Self, DriftError> {
        match text.to_lowercase().as_str() {
            "msw" | "msb" | "msw_first" | "big" => Ok(WordOrder::MswFirst),
            "lsw" | "lsb" | "lsw_first" | "little" => Ok(WordOrder::LswFirst),
            _ => Err(DriftError::Config(format!("invalid word order {:?}", text))),
        }
    }

    pub fn msb_first(&self) -> bool {
        *self == WordOrder::MswFirst
    }
}

/// Pack words into bytes.
/// With `msb_first` the sequence is taken as most significant word first and reversed before
/// packing, so `[10, 20]` little-endian gives `14 00 0A 00`.
pub fn data_to_bytes(data: &[u16], msb_first: bool, endianness: Endianness) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 2);
    let mut push = |word: &u16| bytes.extend_from_slice(&endianness.word_bytes(*word));
    if msb_first {
        data.iter().rev().for_each(&mut push);
    } else {
        data.iter().for_each(&mut push);
    }
    bytes
}

/// swap a single word into host order if it was sent in another byte order
pub fn data_to_uint16(data: u16, endianness: Endianness) -> u16 {
    let bytes = data_to_bytes(&[data], true, endianness);
    u16::from_ne_bytes([bytes[0], bytes[1]])
}

// host order read-back, the word reversal of `msb_first` assumes a little-endian host
fn packed_u32(data: [u16; 2], msb_first: bool, endianness: Endianness) -> u32 {
    let bytes = data_to_bytes(&data, msb_first, endianness);
    u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub fn data_to_uint32(data: [u16; 2], msb_first: bool, endianness: Endianness) -> u32 {
    packed_u32(data, msb_first, endianness)
}

pub fn data_to_int32(data: [u16; 2], msb_first: bool, endianness: Endianness) -> i32 {
    packed_u32(data, msb_first, endianness) as i32
}

pub fn data_to_float32(data: [u16; 2], msb_first: bool, endianness: Endianness) -> f32 {
    f32::from_bits(packed_u32(data, msb_first, endianness))
}
