//! Ruby Marshal format 4.8, restricted to the types a [`Value`] can hold.
//!
//! Older records were marshalled by Ruby, so the reader accepts what those
//! writers produced: raw (pre-1.9) strings, encoding-tagged strings,
//! symbol and object links, fixnums, bignums, floats, arrays, hashes and
//! user-marshalled `Date` objects. The writer emits the same bytes Ruby
//! 1.9.3 and later would for the same value.
//!
//! Layout of a stream:
//!
//! ```text
//!   [ 0x04 0x08 | root object ]
//! ```

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};

use super::value::Value;
use crate::errors::{CodecError, Result};

/// Major and minor version bytes that open every stream.
pub const HEADER: [u8; 2] = [4, 8];

/// Deepest nesting accepted in either direction.
const MAX_DEPTH: usize = 128;

/// Values a stream may expand to through object links, per input byte.
const LINK_EXPANSION: usize = 16;

/// Julian day number of 0001-01-01 minus one; `jd - JD_CE_OFFSET` gives
/// chrono's days-from-CE count.
const JD_CE_OFFSET: i64 = 1_721_425;

/// Day of calendar reform (`Date::ITALY`) that Ruby stores with every date.
const DATE_ITALY: f64 = 2_299_161.0;

/// Range Ruby writes as a fixnum (`i`); anything wider becomes a bignum (`l`).
const FIXNUM_MIN: i64 = i32::MIN as i64;
const FIXNUM_MAX: i64 = i32::MAX as i64;

fn malformed(msg: impl Into<String>) -> CodecError {
    CodecError::DeserializationFailed(format!("ruby marshal: {}", msg.into()))
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Parse a complete marshal stream.
pub fn load(bytes: &[u8]) -> Result<Value> {
    let mut reader = Reader {
        input: bytes,
        pos: 0,
        symbols: Vec::new(),
        objects: Vec::new(),
        link_budget: bytes.len().saturating_mul(LINK_EXPANSION),
    };

    let header = reader.take(2)?;
    if header != HEADER {
        return Err(malformed(format!(
            "unsupported version {}.{}",
            header[0], header[1]
        )));
    }

    let value = reader.read_value(0)?;
    if reader.pos != reader.input.len() {
        return Err(malformed("trailing bytes after root object"));
    }
    Ok(value)
}

struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
    /// Symbol table, indexed by `;` links.
    symbols: Vec<String>,
    /// Object table, indexed by `@` links.
    objects: Vec<Value>,
    /// Values still allowed to be copied out of `objects` by links.
    link_budget: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or_else(|| malformed("unexpected end of input"))?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(malformed("unexpected end of input"));
        }
        let input = self.input;
        let slice = &input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Ruby's packed `w_long` integer.
    fn read_long(&mut self) -> Result<i64> {
        let c = self.byte()? as i8;
        match c {
            0 => Ok(0),
            5..=127 => Ok(i64::from(c) - 5),
            -128..=-5 => Ok(i64::from(c) + 5),
            1..=4 => {
                let mut x: i64 = 0;
                for i in 0..c {
                    x |= i64::from(self.byte()?) << (8 * i);
                }
                Ok(x)
            }
            -4..=-1 => {
                let mut x: i64 = -1;
                for i in 0..-c {
                    x &= !(0xff << (8 * i));
                    x |= i64::from(self.byte()?) << (8 * i);
                }
                Ok(x)
            }
        }
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.read_long()?;
        usize::try_from(len).map_err(|_| malformed(format!("negative length {len}")))
    }

    fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Reserve a slot in the object table before the object's children are read.
    fn reserve(&mut self) -> usize {
        self.objects.push(Value::Nil);
        self.objects.len() - 1
    }

    fn register(&mut self, value: Value) -> Value {
        self.objects.push(value.clone());
        value
    }

    fn fill(&mut self, slot: usize, value: Value) -> Value {
        self.objects[slot] = value.clone();
        value
    }

    fn read_symbol(&mut self) -> Result<String> {
        match self.byte()? {
            b':' => self.read_symbol_body(),
            b';' => {
                let idx = self.read_len()?;
                self.symbols
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| malformed(format!("bad symbol link {idx}")))
            }
            b'I' => {
                if self.byte()? != b':' {
                    return Err(malformed("instance variables on a non-symbol key"));
                }
                let name = self.read_symbol_body()?;
                self.skip_ivars(0)?;
                Ok(name)
            }
            other => Err(malformed(format!(
                "expected symbol, found type byte 0x{other:02x}"
            ))),
        }
    }

    fn read_symbol_body(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        let name = String::from_utf8(bytes.to_vec())
            .map_err(|_| malformed("symbol is not valid UTF-8"))?;
        self.symbols.push(name.clone());
        Ok(name)
    }

    /// Consume an instance-variable list. Encoding markers (`E`,
    /// `encoding`) only matter to Ruby, and values here are always UTF-8.
    fn skip_ivars(&mut self, depth: usize) -> Result<()> {
        let count = self.read_len()?;
        for _ in 0..count {
            self.read_symbol()?;
            self.read_value(depth + 1)?;
        }
        Ok(())
    }

    fn read_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(malformed("nesting too deep"));
        }

        match self.byte()? {
            b'0' => Ok(Value::Nil),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' => Ok(Value::Integer(self.read_long()?)),
            b'l' => {
                let value = self.read_bignum()?;
                Ok(self.register(value))
            }
            b'f' => {
                let value = self.read_float()?;
                Ok(self.register(value))
            }
            b'"' => {
                let bytes = self.read_bytes()?;
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| malformed("string is not valid UTF-8"))?;
                Ok(self.register(Value::String(s)))
            }
            b'I' => {
                let value = self.read_value(depth + 1)?;
                self.skip_ivars(depth)?;
                Ok(value)
            }
            b':' => Ok(Value::Symbol(self.read_symbol_body()?)),
            b';' => {
                let idx = self.read_len()?;
                self.symbols
                    .get(idx)
                    .cloned()
                    .map(Value::Symbol)
                    .ok_or_else(|| malformed(format!("bad symbol link {idx}")))
            }
            b'@' => {
                let idx = self.read_len()?;
                let target = self
                    .objects
                    .get(idx)
                    .ok_or_else(|| malformed(format!("bad object link {idx}")))?;

                // Links copy the whole target, so they are charged by size.
                let (nodes, height) = shape(target);
                if depth + height > MAX_DEPTH + 1 {
                    return Err(malformed("nesting too deep"));
                }
                self.link_budget = self
                    .link_budget
                    .checked_sub(nodes)
                    .ok_or_else(|| malformed("object links expand past the size limit"))?;
                Ok(target.clone())
            }
            b'[' => {
                let len = self.read_len()?;
                let slot = self.reserve();
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.read_value(depth + 1)?);
                }
                Ok(self.fill(slot, Value::Array(items)))
            }
            tag @ (b'{' | b'}') => {
                let len = self.read_len()?;
                let slot = self.reserve();
                let mut pairs = Vec::with_capacity(len.min(self.remaining() / 2));
                for _ in 0..len {
                    let key = self.read_value(depth + 1)?;
                    let value = self.read_value(depth + 1)?;
                    pairs.push((key, value));
                }
                if tag == b'}' {
                    // Hash default value; a Value map has nowhere to keep it.
                    self.read_value(depth + 1)?;
                }
                Ok(self.fill(slot, Value::Map(pairs)))
            }
            b'U' => {
                let class = self.read_symbol()?;
                let slot = self.reserve();
                let data = self.read_value(depth + 1)?;
                let value = match class.as_str() {
                    "Date" => date_from_marshal(&data)?,
                    other => {
                        return Err(malformed(format!("unsupported user class '{other}'")))
                    }
                };
                Ok(self.fill(slot, value))
            }
            other => Err(malformed(format!(
                "unsupported type byte '{}'",
                char::from(other).escape_default()
            ))),
        }
    }

    fn read_bignum(&mut self) -> Result<Value> {
        let negative = match self.byte()? {
            b'+' => false,
            b'-' => true,
            other => return Err(malformed(format!("bad bignum sign 0x{other:02x}"))),
        };
        let shorts = self.read_len()?;
        let bytes = self.take(shorts.checked_mul(2).ok_or_else(|| malformed("bignum too long"))?)?;

        let significant = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        if significant > 8 {
            return Err(malformed("bignum does not fit in 64 bits"));
        }
        let magnitude = bytes[..significant]
            .iter()
            .rev()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));

        let value = if negative {
            if magnitude == 1 << 63 {
                Some(i64::MIN)
            } else {
                i64::try_from(magnitude).ok().map(|m| -m)
            }
        } else {
            i64::try_from(magnitude).ok()
        };
        value
            .map(Value::Integer)
            .ok_or_else(|| malformed("bignum does not fit in 64 bits"))
    }

    fn read_float(&mut self) -> Result<Value> {
        let bytes = self.read_bytes()?;
        // Ruby 1.8 appended mantissa bytes after a NUL terminator.
        let text = bytes.split(|b| *b == 0).next().unwrap_or_default();
        let text = std::str::from_utf8(text).map_err(|_| malformed("float is not ASCII"))?;
        let x = match text {
            "inf" => f64::INFINITY,
            "-inf" => f64::NEG_INFINITY,
            "nan" => f64::NAN,
            other => other
                .parse::<f64>()
                .map_err(|_| malformed(format!("bad float '{other}'")))?,
        };
        Ok(Value::Float(x))
    }
}

/// Node count and height of `value`, walked without recursion.
fn shape(value: &Value) -> (usize, usize) {
    let mut nodes = 0;
    let mut height = 0;
    let mut pending = vec![(value, 1usize)];
    while let Some((value, level)) = pending.pop() {
        nodes += 1;
        height = height.max(level);
        match value {
            Value::Array(items) => pending.extend(items.iter().map(|item| (item, level + 1))),
            Value::Map(pairs) => {
                for (key, item) in pairs {
                    pending.push((key, level + 1));
                    pending.push((item, level + 1));
                }
            }
            _ => {}
        }
    }
    (nodes, height)
}

/// Ruby's `Date#marshal_dump` is `[nth, jd, df, sf, of, sg]`.
fn date_from_marshal(data: &Value) -> Result<Value> {
    let fields = match data {
        Value::Array(fields) if fields.len() == 6 => fields,
        _ => return Err(malformed("Date payload is not a 6-element array")),
    };
    if fields[0] != Value::Integer(0) {
        return Err(malformed("Date outside the supported range"));
    }
    let jd = fields[1]
        .as_i64()
        .ok_or_else(|| malformed("Date julian day is not an integer"))?;

    jd.checked_sub(JD_CE_OFFSET)
        .and_then(|days| i32::try_from(days).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(Value::Date)
        .ok_or_else(|| malformed(format!("julian day {jd} out of range")))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Marshal `value` the way Ruby would.
pub fn dump(value: &Value) -> Result<Vec<u8>> {
    let mut writer = Writer {
        out: HEADER.to_vec(),
        symbols: HashMap::new(),
    };
    writer.write_value(value, 0)?;
    Ok(writer.out)
}

struct Writer {
    out: Vec<u8>,
    symbols: HashMap<String, usize>,
}

impl Writer {
    fn write_long(&mut self, x: i64) {
        if x == 0 {
            self.out.push(0);
        } else if 0 < x && x < 123 {
            self.out.push((x + 5) as u8);
        } else if -124 < x && x < 0 {
            self.out.push(((x - 5) & 0xff) as u8);
        } else {
            let mut buf = [0u8; 8];
            let mut rest = x;
            let mut len = 0usize;
            while len < buf.len() {
                buf[len] = (rest & 0xff) as u8;
                rest >>= 8;
                len += 1;
                if rest == 0 || rest == -1 {
                    break;
                }
            }
            let header = if rest == 0 { len as i8 } else { -(len as i8) };
            self.out.push(header as u8);
            self.out.extend_from_slice(&buf[..len]);
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_long(bytes.len() as i64);
        self.out.extend_from_slice(bytes);
    }

    fn write_symbol(&mut self, name: &str) {
        if let Some(idx) = self.symbols.get(name).copied() {
            self.out.push(b';');
            self.write_long(idx as i64);
            return;
        }

        let tagged = !name.is_ascii();
        if tagged {
            self.out.push(b'I');
        }
        self.out.push(b':');
        self.write_bytes(name.as_bytes());
        let idx = self.symbols.len();
        self.symbols.insert(name.to_string(), idx);
        if tagged {
            self.write_utf8_ivar();
        }
    }

    /// One instance variable: `E => true`, Ruby's marker for UTF-8.
    fn write_utf8_ivar(&mut self) {
        self.write_long(1);
        self.write_symbol("E");
        self.out.push(b'T');
    }

    fn write_integer(&mut self, i: i64) {
        if (FIXNUM_MIN..=FIXNUM_MAX).contains(&i) {
            self.out.push(b'i');
            self.write_long(i);
            return;
        }

        self.out.push(b'l');
        self.out.push(if i < 0 { b'-' } else { b'+' });
        let mut magnitude = i.unsigned_abs().to_le_bytes().to_vec();
        while magnitude.last() == Some(&0) {
            magnitude.pop();
        }
        if magnitude.len() % 2 == 1 {
            magnitude.push(0);
        }
        self.write_long((magnitude.len() / 2) as i64);
        self.out.extend_from_slice(&magnitude);
    }

    fn write_float(&mut self, x: f64) {
        self.out.push(b'f');
        let text = ruby_float_repr(x);
        self.write_bytes(text.as_bytes());
    }

    fn write_value(&mut self, value: &Value, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(CodecError::SerializationFailed(
                "ruby marshal: nesting too deep".into(),
            ));
        }

        match value {
            Value::Nil => self.out.push(b'0'),
            Value::Bool(true) => self.out.push(b'T'),
            Value::Bool(false) => self.out.push(b'F'),
            Value::Integer(i) => self.write_integer(*i),
            Value::Float(x) => self.write_float(*x),
            Value::String(s) => {
                self.out.extend_from_slice(b"I\"");
                self.write_bytes(s.as_bytes());
                self.write_utf8_ivar();
            }
            Value::Symbol(name) => self.write_symbol(name),
            Value::Date(date) => {
                self.out.push(b'U');
                self.write_symbol("Date");
                let jd = i64::from(date.num_days_from_ce()) + JD_CE_OFFSET;
                let fields = [
                    Value::Integer(0),
                    Value::Integer(jd),
                    Value::Integer(0),
                    Value::Integer(0),
                    Value::Integer(0),
                    Value::Float(DATE_ITALY),
                ];
                self.out.push(b'[');
                self.write_long(fields.len() as i64);
                for field in &fields {
                    self.write_value(field, depth + 1)?;
                }
            }
            Value::Array(items) => {
                self.out.push(b'[');
                self.write_long(items.len() as i64);
                for item in items {
                    self.write_value(item, depth + 1)?;
                }
            }
            Value::Map(pairs) => {
                self.out.push(b'{');
                self.write_long(pairs.len() as i64);
                for (k, v) in pairs {
                    self.write_value(k, depth + 1)?;
                    self.write_value(v, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

/// Ruby's float text: shortest round-trip digits, plain notation when the
/// decimal point falls inside or just left of the digits, exponent form
/// otherwise.
fn ruby_float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x < 0.0 { "-inf".into() } else { "inf".into() };
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0".into() } else { "0".into() };
    }

    // `{:e}` yields the shortest round-trip mantissa, e.g. "-2.299161e6".
    let sci = format!("{:e}", x.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let decpt = exponent.parse::<i32>().unwrap_or(0) + 1;
    let digs = digits.len() as i32;

    let mut out = String::new();
    if x < 0.0 {
        out.push('-');
    }
    if decpt < -3 || decpt > digs {
        out.push_str(&digits[..1]);
        if digs > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push_str(&format!("e{}", decpt - 1));
    } else if decpt > 0 {
        let split = decpt as usize;
        out.push_str(&digits[..split]);
        if digs > decpt {
            out.push('.');
            out.push_str(&digits[split..]);
        }
    } else {
        out.push_str("0.");
        out.push_str(&"0".repeat((-decpt) as usize));
        out.push_str(&digits);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_use_single_byte_form() {
        assert_eq!(dump(&Value::Integer(0)).unwrap(), b"\x04\x08i\x00");
        assert_eq!(dump(&Value::Integer(1)).unwrap(), b"\x04\x08i\x06");
        assert_eq!(dump(&Value::Integer(-1)).unwrap(), b"\x04\x08i\xfa");
        assert_eq!(dump(&Value::Integer(122)).unwrap(), b"\x04\x08i\x7f");
    }

    #[test]
    fn wider_integers_use_packed_form() {
        assert_eq!(dump(&Value::Integer(300)).unwrap(), b"\x04\x08i\x02\x2c\x01");
        assert_eq!(dump(&Value::Integer(-125)).unwrap(), b"\x04\x08i\xff\x83");
        assert_eq!(
            dump(&Value::Integer(2_455_752)).unwrap(),
            b"\x04\x08i\x03\xc8\x78\x25"
        );
    }

    #[test]
    fn integers_beyond_32_bits_become_bignums() {
        let bytes = dump(&Value::Integer(1 << 40)).unwrap();
        assert_eq!(bytes, b"\x04\x08l+\x08\x00\x00\x00\x00\x00\x01");
        assert_eq!(load(&bytes).unwrap(), Value::Integer(1 << 40));

        let bytes = dump(&Value::Integer(i64::MIN)).unwrap();
        assert_eq!(load(&bytes).unwrap(), Value::Integer(i64::MIN));
    }

    #[test]
    fn float_text_follows_ruby() {
        assert_eq!(ruby_float_repr(2_299_161.0), "2299161");
        assert_eq!(ruby_float_repr(1.5), "1.5");
        assert_eq!(ruby_float_repr(-0.25), "-0.25");
        assert_eq!(ruby_float_repr(0.0001), "0.0001");
        assert_eq!(ruby_float_repr(0.00001), "1e-5");
        assert_eq!(ruby_float_repr(1e20), "1e20");
        assert_eq!(ruby_float_repr(-0.0), "-0");
        assert_eq!(ruby_float_repr(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn strings_carry_the_utf8_marker() {
        let bytes = dump(&Value::from("a")).unwrap();
        assert_eq!(bytes, b"\x04\x08I\"\x06a\x06:\x06ET");
    }

    #[test]
    fn repeated_symbols_are_linked() {
        let value = Value::Map(vec![(Value::from("a"), Value::from("b"))]);
        let bytes = dump(&value).unwrap();
        assert_eq!(bytes, b"\x04\x08{\x06I\"\x06a\x06:\x06ETI\"\x06b\x06;\x00T");
        assert_eq!(load(&bytes).unwrap(), value);
    }

    #[test]
    fn raw_strings_from_old_writers_load() {
        assert_eq!(
            load(b"\x04\x08\"\x0f2011-07-09").unwrap(),
            Value::from("2011-07-09")
        );
    }

    #[test]
    fn object_links_resolve_to_earlier_objects() {
        // [s, s] where both elements are the same string object.
        let bytes = b"\x04\x08[\x07I\"\x06x\x06:\x06ET@\x06";
        assert_eq!(
            load(bytes).unwrap(),
            Value::Array(vec![Value::from("x"), Value::from("x")])
        );
    }

    #[test]
    fn hash_with_default_discards_default() {
        let bytes = b"\x04\x08}\x06:\x06ai\x060";
        assert_eq!(
            load(bytes).unwrap(),
            Value::Map(vec![(Value::Symbol("a".into()), Value::Integer(1))])
        );
    }

    #[test]
    fn ruby_18_float_mantissa_suffix_is_ignored() {
        let bytes = b"\x04\x08f\x0d1.5\x00\x00\x00\x00\x00";
        assert_eq!(load(bytes).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn malformed_streams_are_rejected() {
        let cases: [&[u8]; 9] = [
            b"",
            b"\x04\x09i\x00",
            b"\x04\x08",
            b"\x04\x08i\x00\x00",
            b"\x04\x08o:\x0bObject\x00",
            b"\x04\x08@\x06",
            b"\x04\x08[\x07i\x06",
            b"\x04\x08U:\x0dRational[\x07i\x06i\x07",
            // Julian day of i64::MIN.
            b"\x04\x08U:\x09Date[\x0bi\x00l-\x09\0\0\0\0\0\0\0\x80i\x00i\x00i\x00f\x0c2299161",
        ];
        for bytes in cases {
            assert!(
                matches!(load(bytes), Err(CodecError::DeserializationFailed(_))),
                "{bytes:?} should not load"
            );
        }
    }

    #[test]
    fn excessive_nesting_is_rejected() {
        let mut bytes = HEADER.to_vec();
        for _ in 0..(MAX_DEPTH + 2) {
            bytes.extend_from_slice(b"[\x06");
        }
        bytes.push(b'0');
        assert!(load(&bytes).is_err());
    }

    /// `[[[...[], @3], @2], @1]`: each level links to its own child.
    fn doubling_links(levels: usize) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        for _ in 0..levels {
            bytes.extend_from_slice(b"[\x07");
        }
        bytes.extend_from_slice(b"[\x00");
        for level in (1..=levels).rev() {
            bytes.push(b'@');
            bytes.push((level + 5) as u8);
        }
        bytes
    }

    #[test]
    fn links_that_double_per_level_are_rejected() {
        let bytes = doubling_links(26);
        assert_eq!(bytes.len(), 108);
        assert!(matches!(
            load(&bytes),
            Err(CodecError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn a_few_doubling_links_still_load() {
        let value = load(&doubling_links(2)).unwrap();
        let leaf = Value::Array(Vec::new());
        let child = Value::Array(vec![leaf.clone(), leaf]);
        assert_eq!(value, Value::Array(vec![child.clone(), child]));
    }

    /// `[A, B]` where `A` is 120 nested arrays and `B` wraps a link to
    /// `A` in `wrappers` more arrays.
    fn deep_link(wrappers: usize) -> Vec<u8> {
        let mut bytes = HEADER.to_vec();
        bytes.extend_from_slice(b"[\x07");
        for _ in 0..120 {
            bytes.extend_from_slice(b"[\x06");
        }
        bytes.push(b'0');
        for _ in 0..wrappers {
            bytes.extend_from_slice(b"[\x06");
        }
        bytes.extend_from_slice(b"@\x06");
        bytes
    }

    #[test]
    fn links_cannot_nest_past_the_depth_limit() {
        assert!(load(&deep_link(4)).is_ok());

        let err = load(&deep_link(20)).unwrap_err();
        assert!(
            matches!(&err, CodecError::DeserializationFailed(msg) if msg.contains("too deep")),
            "{err:?}"
        );
    }
}
