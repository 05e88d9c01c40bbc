//! Reinterpretation of raw reads as typed values.
//!
//! Codes follow the struct-module letters (`?`, `b`, `B`, `h`, `H`, `i`, `I`, `f`), optionally
//! prefixed with a byte-order code (`=`, `<`, `>`, `!`, `@`). The raw value is packed in host
//! order and unpacked with the requested format, so the byte width must match exactly.

use crate::common::error::DriftError;
use crate::driver::convert::{self, Endianness, WordOrder};
use crate::entity::bo::value_bo::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    pub kind: DataKind,
    pub endianness: Endianness,
}

impl DataType {
    pub fn new(kind: DataKind) -> Self {
        DataType { kind, endianness: Endianness::Native }
    }

    pub fn parse(code: &str) -> Result<Self, DriftError> {
        let code = code.trim();
        let (endianness, letter) = match code.char_indices().nth(1) {
            Some((split, _)) if "=<>!@".contains(&code[..split]) => (Endianness::from_code(&code[..split])?, &code[split..]),
            _ => (Endianness::Native, code),
        };
        let kind = match letter {
            "?" => DataKind::Bool,
            "b" => DataKind::Int8,
            "B" => DataKind::UInt8,
            "h" => DataKind::Int16,
            "H" => DataKind::UInt16,
            "i" | "l" => DataKind::Int32,
            "I" | "L" => DataKind::UInt32,
            "f" => DataKind::Float32,
            _ => return Err(DriftError::Config(format!("invalid data type {:?}", code))),
        };
        Ok(DataType { kind, endianness })
    }

    /// packed width in bytes
    pub fn width(&self) -> usize {
        match self.kind {
            DataKind::Bool | DataKind::Int8 | DataKind::UInt8 => 1,
            DataKind::Int16 | DataKind::UInt16 => 2,
            DataKind::Int32 | DataKind::UInt32 | DataKind::Float32 => 4,
        }
    }

    /// spans two registers
    pub fn is_wide(&self) -> bool {
        self.width() == 4
    }

    pub fn register_count(&self) -> u16 {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    /// reinterpret a single bit, packed as one byte
    pub fn from_bit(&self, bit: bool) -> Result<Value, DriftError> {
        let byte = bit as u8;
        match self.kind {
            DataKind::Bool => Ok(Value::Bool(bit)),
            DataKind::Int8 => Ok(Value::Int(byte as i8 as i64)),
            DataKind::UInt8 => Ok(Value::Int(byte as i64)),
            _ => Err(self.width_mismatch(1)),
        }
    }

    /// reinterpret one 16-bit register
    pub fn from_word(&self, word: u16) -> Result<Value, DriftError> {
        let word = convert::data_to_uint16(word, self.endianness);
        match self.kind {
            DataKind::Int16 => Ok(Value::Int(word as i16 as i64)),
            DataKind::UInt16 => Ok(Value::Int(word as i64)),
            _ => Err(self.width_mismatch(2)),
        }
    }

    /// combine two registers into a 32-bit value
    pub fn from_words(&self, words: [u16; 2], word_order: WordOrder) -> Result<Value, DriftError> {
        let endianness = match self.endianness {
            Endianness::Native => Endianness::Little,
            other => other,
        };
        let msb_first = word_order.msb_first();
        match self.kind {
            DataKind::Int32 => Ok(Value::Int(convert::data_to_int32(words, msb_first, endianness) as i64)),
            DataKind::UInt32 => Ok(Value::Int(convert::data_to_uint32(words, msb_first, endianness) as i64)),
            DataKind::Float32 => Ok(Value::Float(convert::data_to_float32(words, msb_first, endianness) as f64)),
            _ => Err(self.width_mismatch(4)),
        }
    }

    fn width_mismatch(&self, raw_width: usize) -> DriftError {
        DriftError::Config(format!(
            "data type {:?} needs {} bytes but the raw value has {}",
            self.kind,
            self.width(),
            raw_width
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(DataType::parse("h").unwrap(), DataType::new(DataKind::Int16));
        assert_eq!(DataType::parse(">H").unwrap().endianness, Endianness::Big);
        assert!(DataType::parse("q").is_err());
        assert!(DataType::parse("").is_err());
        assert!(DataType::parse("f").unwrap().is_wide());
    }

    #[test]
    fn test_signed_word() {
        let h = DataType::parse("h").unwrap();
        assert_eq!(h.from_word(0xFFFE).unwrap(), Value::Int(-2));
        assert_eq!(DataType::parse("H").unwrap().from_word(0xFFFE).unwrap(), Value::Int(65534));
        assert!(matches!(h.from_bit(true), Err(DriftError::Config(_))));
        assert!(matches!(DataType::parse("b").unwrap().from_word(3), Err(DriftError::Config(_))));
    }

    #[test]
    fn test_bits() {
        assert_eq!(DataType::parse("?").unwrap().from_bit(true).unwrap(), Value::Bool(true));
        assert_eq!(DataType::parse("B").unwrap().from_bit(true).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_wide() {
        let i = DataType::parse("i").unwrap();
        assert_eq!(i.from_words([433, 2432], WordOrder::MswFirst).unwrap(), Value::Int(28379520));
        assert_eq!(i.from_words([2432, 433], WordOrder::LswFirst).unwrap(), Value::Int(28379520));
        let f = DataType::parse("f").unwrap().from_words([16181, 30372], WordOrder::MswFirst).unwrap();
        assert!((f.as_f64().unwrap() - 0.7089).abs() < 1e-4);
    }

    #[test]
    fn test_wide_big_endian() {
        if cfg!(target_endian = "big") {
            return;
        }
        let i = DataType::parse(">i").unwrap();
        assert_eq!(i.endianness, Endianness::Big);
        // byte-swapped words keep their word order
        assert_eq!(i.from_words([0xB101, 0x8009], WordOrder::MswFirst).unwrap(), Value::Int(28379520));
        assert_eq!(i.from_words([0x8009, 0xB101], WordOrder::LswFirst).unwrap(), Value::Int(28379520));
        assert_eq!(i.from_words([433, 2432], WordOrder::MswFirst).unwrap(), Value::Int(-1325301751));
        assert_eq!(DataType::parse("<i").unwrap().from_words([433, 2432], WordOrder::MswFirst).unwrap(), Value::Int(28379520));
        assert_eq!(DataType::parse("!I").unwrap().from_words([0x0100, 0x0200], WordOrder::MswFirst).unwrap(), Value::Int(65538));
    }
}
