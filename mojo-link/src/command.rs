/// Largest payload a single transaction can carry.
pub const MAX_LEN: u8 = 0x7f;

/// Highest addressable peripheral register.
pub const MAX_ADDR: u8 = 0x7f;

/// Number of bytes a command word occupies on the wire.
pub const HEADER_LEN: usize = 2;

const WRITE_BIT: u16 = 1 << 14;
const LEN_SHIFT: u16 = 7;
const FIELD_MASK: u16 = 0x7f;

pub mod error {
    /// The serialization medium ran out
    /// before the command word was complete.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct EndOfInput;

    /// A command word field does not fit the protocol.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Invalid {
        /// Transaction length exceeds 7 bits.
        Length(usize),
        /// Register address exceeds 7 bits.
        Address(u8),
        /// Bit 15 of a packed word was set.
        Reserved,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Error {
        EndOfInput,
        Invalid(Invalid),
    }

    impl From<EndOfInput> for Error {
        fn from(_: EndOfInput) -> Self {
            Self::EndOfInput
        }
    }

    impl From<Invalid> for Error {
        fn from(value: Invalid) -> Self {
            Self::Invalid(value)
        }
    }
}

use error::{EndOfInput, Invalid};

/// Transfer direction of a transaction,
/// from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Read,
    Write,
}

impl From<bool> for Direction {
    fn from(write: bool) -> Self {
        if write {
            Self::Write
        } else {
            Self::Read
        }
    }
}

/// The header preceding every transaction.
///
/// Packed, the word is 15 bits wide:
///
/// | bit   | field         |
/// |-------|---------------|
/// | 14    | write / ~read |
/// | 13:7  | length        |
/// | 6:0   | address       |
///
/// On the wire it occupies two bytes, `[(w << 7) | len, addr]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandWord {
    direction: Direction,
    addr: u8,
    len: u8,
}

impl CommandWord {
    /// Create a command word, rejecting any
    /// field that does not fit in 7 bits.
    pub const fn new(direction: Direction, addr: u8, len: u8) -> Result<Self, Invalid> {
        if len > MAX_LEN {
            return Err(Invalid::Length(len as usize));
        }

        if addr > MAX_ADDR {
            return Err(Invalid::Address(addr));
        }

        Ok(Self {
            direction,
            addr,
            len,
        })
    }

    #[inline]
    pub const fn read(addr: u8, len: u8) -> Result<Self, Invalid> {
        Self::new(Direction::Read, addr, len)
    }

    #[inline]
    pub const fn write(addr: u8, len: u8) -> Result<Self, Invalid> {
        Self::new(Direction::Write, addr, len)
    }

    #[inline]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub const fn is_write(&self) -> bool {
        matches!(self.direction, Direction::Write)
    }

    #[inline]
    pub const fn addr(&self) -> u8 {
        self.addr
    }

    #[inline]
    pub const fn len(&self) -> u8 {
        self.len
    }

    /// Whether the transaction carries no payload.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pack into the 15-bit representation.
    pub const fn to_bits(&self) -> u16 {
        let write = if self.is_write() { WRITE_BIT } else { 0 };

        write | (self.len as u16) << LEN_SHIFT | self.addr as u16
    }

    /// Unpack from the 15-bit representation.
    pub const fn from_bits(bits: u16) -> Result<Self, Invalid> {
        if bits & !(WRITE_BIT | FIELD_MASK << LEN_SHIFT | FIELD_MASK) != 0 {
            return Err(Invalid::Reserved);
        }

        let direction = if bits & WRITE_BIT != 0 {
            Direction::Write
        } else {
            Direction::Read
        };

        Ok(Self {
            direction,
            addr: (bits & FIELD_MASK) as u8,
            len: ((bits >> LEN_SHIFT) & FIELD_MASK) as u8,
        })
    }

    /// The header as it is sent over the link.
    pub const fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let write = if self.is_write() { 0x80 } else { 0 };

        [write | self.len, self.addr]
    }

    /// Parse a header received from the link.
    pub const fn from_bytes(bytes: [u8; HEADER_LEN]) -> Result<Self, Invalid> {
        let [head, addr] = bytes;

        let direction = if head & 0x80 != 0 {
            Direction::Write
        } else {
            Direction::Read
        };

        Self::new(direction, addr, head & MAX_LEN)
    }

    /// Render the header to a serialization medium.
    pub fn render<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), EndOfInput> {
        let mut dst = dst.into_iter();

        for byte in self.to_bytes() {
            *dst.next().ok_or(EndOfInput)? = byte;
        }

        Ok(())
    }

    /// Construct a header from a serialization medium.
    ///
    /// Exactly [`HEADER_LEN`] bytes are taken from `src`
    /// when it holds enough of them.
    pub fn construct<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut src = src.into_iter();

        let head = *src.next().ok_or(EndOfInput)?;
        let addr = *src.next().ok_or(EndOfInput)?;

        Ok(Self::from_bytes([head, addr])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod packing {
        use super::*;

        #[test]
        fn fields() {
            for write in [false, true] {
                for addr in [0, 1, 0x2a, MAX_ADDR] {
                    for len in [0, 1, 0x55, MAX_LEN] {
                        let bits = CommandWord::new(write.into(), addr, len)
                            .unwrap()
                            .to_bits();

                        assert_eq!(bits & (1 << 14) != 0, write);
                        assert_eq!((bits >> 7) & 0x7f, len as u16);
                        assert_eq!(bits & 0x7f, (addr & 0x7f) as u16);
                        assert_eq!(bits >> 15, 0);
                    }
                }
            }
        }

        #[test]
        fn max_len() {
            let cmd = CommandWord::write(0x10, 127).unwrap();

            assert_eq!(cmd.to_bits(), 0x7f90);
            assert_eq!(cmd.to_bytes(), [0xff, 0x10]);
        }

        #[test]
        fn zero_len() {
            let cmd = CommandWord::read(0x05, 0).unwrap();

            assert!(cmd.is_empty());
            assert_eq!(cmd.to_bits(), 0x0005);
            assert_eq!(cmd.to_bytes(), [0x00, 0x05]);
        }

        #[test]
        fn unpack() {
            let cmd = CommandWord::from_bits(0x4000 | 3 << 7 | 0x21).unwrap();

            assert_eq!(cmd.direction(), Direction::Write);
            assert_eq!(cmd.len(), 3);
            assert_eq!(cmd.addr(), 0x21);

            assert_eq!(CommandWord::from_bits(0x8000), Err(Invalid::Reserved));
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn length_overflow() {
            assert_eq!(CommandWord::read(0, 128), Err(Invalid::Length(128)));
        }

        #[test]
        fn address_overflow() {
            assert_eq!(CommandWord::write(0x80, 1), Err(Invalid::Address(0x80)));
            assert_eq!(
                CommandWord::from_bytes([0x01, 0xc0]),
                Err(Invalid::Address(0xc0))
            );
        }
    }

    mod medium {
        use super::*;

        #[test]
        fn render() {
            let mut buf = [0u8; 3];

            CommandWord::write(0x42, 2)
                .unwrap()
                .render(buf.iter_mut())
                .unwrap();

            assert_eq!(buf, [0x82, 0x42, 0x00]);
        }

        #[test]
        fn render_short() {
            let mut buf = [0u8; 1];

            assert_eq!(
                CommandWord::read(0, 0).unwrap().render(buf.iter_mut()),
                Err(EndOfInput)
            );
        }

        #[test]
        fn construct() {
            let buf = [0x03, 0x7e, 0xaa];
            let mut src = buf.iter();

            let cmd = CommandWord::construct(&mut src).unwrap();

            assert!(!cmd.is_write());
            assert_eq!(cmd.len(), 3);
            assert_eq!(cmd.addr(), 0x7e);

            // payload is left untouched
            assert_eq!(src.next(), Some(&0xaa));
        }

        #[test]
        fn construct_partial() {
            let buf = [0x83];

            assert_eq!(
                CommandWord::construct(buf.iter()),
                Err(error::Error::EndOfInput)
            );
        }
    }
}
