use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use heapless::Deque;
use mojo_link::{
    command::error::{Error as CommandError, Invalid},
    CommandWord, Direction, HEADER_LEN, MAX_ADDR,
};

use crate::rx_buffer::{error::Overflow, RxBuffer};

/// Size of the emulated register file.
pub const REGISTER_COUNT: usize = MAX_ADDR as usize + 1;

/// Bytes that may be queued for the host before
/// it has to start reading them back.
const TX_CAPACITY: usize = 2 * REGISTER_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The host sent more than could be buffered.
    Overflow,
    /// The host sent a header the protocol does not allow.
    Invalid(Invalid),
}

impl From<Overflow> for Error {
    fn from(_: Overflow) -> Self {
        Self::Overflow
    }
}

impl embedded_io_async::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Overflow => ErrorKind::OutOfMemory,
            Self::Invalid(_) => ErrorKind::InvalidData,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a header.
    Idle,
    /// Storing write payload.
    Writing { addr: u8, remaining: u8 },
}

/// Register addresses auto-increment
/// and wrap within the register file.
#[inline]
fn next_addr(addr: u8) -> u8 {
    addr.wrapping_add(1) & MAX_ADDR
}

/// An emulated Mojo register file.
///
/// Bytes written to the peripheral are what the host transmits,
/// bytes read from it are what the host receives. `N` is the
/// capacity of the receive buffer and must be at least
/// [`mojo_link::HEADER_LEN`], otherwise no header could ever
/// be parsed:
///
/// ```compile_fail
/// let _ = mojo_sim::Peripheral::<1>::new();
/// ```
pub struct Peripheral<const N: usize> {
    registers: [u8; REGISTER_COUNT],
    rx: RxBuffer<N>,
    tx: Deque<u8, TX_CAPACITY>,
    state: State,
}

impl<const N: usize> Default for Peripheral<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Peripheral<N> {
    const HOLDS_HEADER: () = assert!(N >= HEADER_LEN, "receive buffer cannot hold a header");

    pub const fn new() -> Self {
        Self::with_registers([0; REGISTER_COUNT])
    }

    pub const fn with_registers(registers: [u8; REGISTER_COUNT]) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::HOLDS_HEADER;

        Self {
            registers,
            rx: RxBuffer::new(),
            tx: Deque::new(),
            state: State::Idle,
        }
    }

    #[inline]
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Get a register value. Addresses wrap like on the wire.
    #[inline]
    pub fn register(&self, addr: u8) -> u8 {
        self.registers[(addr & MAX_ADDR) as usize]
    }

    #[inline]
    pub fn set_register(&mut self, addr: u8, value: u8) {
        self.registers[(addr & MAX_ADDR) as usize] = value;
    }

    /// Number of bytes waiting to be read by the host.
    #[inline]
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    /// Whether the peripheral is between transactions.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle && self.rx.is_empty()
    }

    /// Act on as much of the received data as possible.
    ///
    /// A rejected transaction does not stop the rest of the
    /// received data from being applied. The first rejection
    /// is reported once everything has been processed.
    fn process(&mut self) -> Result<(), Error> {
        let mut first_error = None;

        loop {
            match self.state {
                State::Idle => {
                    let mut iter = self.rx.iter();
                    let result = CommandWord::construct(&mut iter);
                    let memento = iter.capture();

                    match result {
                        Ok(cmd) => {
                            self.rx.flush(memento);

                            if let Err(e) = self.dispatch(cmd) {
                                first_error.get_or_insert(e);
                            }
                        }
                        // wait for the rest of the header
                        Err(CommandError::EndOfInput) => break,
                        Err(CommandError::Invalid(invalid)) => {
                            warn!("mojo-sim: dropped invalid header {}", invalid);

                            self.rx.flush(memento);
                            first_error.get_or_insert(Error::Invalid(invalid));
                        }
                    }
                }
                State::Writing { remaining: 0, .. } => self.state = State::Idle,
                State::Writing { mut addr, remaining } => {
                    if self.rx.is_empty() {
                        break;
                    }

                    let mut iter = self.rx.iter();
                    let mut written = 0;

                    for &byte in iter.by_ref().take(remaining as usize) {
                        self.registers[addr as usize] = byte;
                        addr = next_addr(addr);
                        written += 1;
                    }

                    let memento = iter.capture();
                    self.rx.flush(memento);

                    self.state = State::Writing {
                        addr,
                        remaining: remaining - written,
                    };
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn dispatch(&mut self, cmd: CommandWord) -> Result<(), Error> {
        trace!("mojo-sim: txn {}", cmd);

        match cmd.direction() {
            Direction::Read => {
                if self.tx.capacity() - self.tx.len() < cmd.len() as usize {
                    warn!("mojo-sim: dropped read of {} bytes, queue full", cmd.len());

                    return Err(Error::Overflow);
                }

                let mut addr = cmd.addr();

                for _ in 0..cmd.len() {
                    self.tx
                        .push_back(self.registers[addr as usize])
                        .map_err(|_| Error::Overflow)?;
                    addr = next_addr(addr);
                }
            }
            Direction::Write => {
                self.state = State::Writing {
                    addr: cmd.addr(),
                    remaining: cmd.len(),
                };
            }
        }

        Ok(())
    }
}

impl<const N: usize> ErrorType for Peripheral<N> {
    type Error = Error;
}

impl<const N: usize> Write for Peripheral<N> {
    /// Accepts as many bytes as fit in the receive buffer.
    ///
    /// All accepted bytes are processed even when a transaction
    /// among them is rejected; the error reports the first rejection
    /// and the accepted bytes must not be sent again.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        let count = buf.len().min(self.rx.remaining());

        if count == 0 {
            return Err(Error::Overflow);
        }

        self.rx.ingest(&buf[..count])?;
        self.process()?;

        Ok(count)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<const N: usize> Read for Peripheral<N> {
    /// Yields queued response bytes. With nothing
    /// queued this reports end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;

        for slot in buf.iter_mut() {
            let Some(byte) = self.tx.pop_front() else {
                break;
            };

            *slot = byte;
            count += 1;
        }

        Ok(count)
    }
}
