use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, ReadExactError, Write};

use crate::command::{error::Invalid, CommandWord, Direction};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The underlying channel failed.
    Io(E),
    /// The channel ended before the whole payload arrived.
    UnexpectedEof,
    /// The transaction does not fit in a command word.
    Invalid(Invalid),
    /// The peripheral did not answer in time.
    Timeout,
}

impl<E> From<Invalid> for Error<E> {
    fn from(value: Invalid) -> Self {
        Self::Invalid(value)
    }
}

impl<E> From<ReadExactError<E>> for Error<E> {
    fn from(value: ReadExactError<E>) -> Self {
        match value {
            ReadExactError::UnexpectedEof => Self::UnexpectedEof,
            ReadExactError::Other(e) => Self::Io(e),
        }
    }
}

/// Converts a buffer length to a transaction length.
fn txn_len(len: usize) -> Result<u8, Invalid> {
    u8::try_from(len)
        .ok()
        .filter(|&len| len <= crate::MAX_LEN)
        .ok_or(Invalid::Length(len))
}

/// A host's connection to a Mojo over
/// a byte oriented serial channel.
pub struct MojoLink<Port> {
    port: Port,
}

impl<Port> MojoLink<Port> {
    pub const fn new(port: Port) -> Self {
        Self { port }
    }

    /// Access the underlying channel.
    pub fn port_mut(&mut self) -> &mut Port {
        &mut self.port
    }

    pub fn into_inner(self) -> Port {
        self.port
    }
}

impl<Port: Write> MojoLink<Port> {
    /// Emit a transaction header.
    ///
    /// Nothing follows the header; the caller is responsible
    /// for moving the `n` payload bytes.
    pub async fn send_txn_command(
        &mut self,
        write: bool,
        addr: u8,
        n: u8,
    ) -> Result<(), Error<Port::Error>> {
        let cmd = CommandWord::new(Direction::from(write), addr, n)?;

        self.send(cmd).await
    }

    async fn send(&mut self, cmd: CommandWord) -> Result<(), Error<Port::Error>> {
        trace!("mojo: txn {}", cmd);

        self.port
            .write_all(&cmd.to_bytes())
            .await
            .map_err(Error::Io)
    }

    /// Write `buf` to the peripheral starting at `addr`.
    pub async fn write_to_mojo(&mut self, addr: u8, buf: &[u8]) -> Result<(), Error<Port::Error>> {
        let cmd = CommandWord::write(addr, txn_len(buf.len())?)?;

        self.send(cmd).await?;
        self.port.write_all(buf).await.map_err(Error::Io)?;
        self.port.flush().await.map_err(Error::Io)
    }

    /// Write a single register.
    pub async fn write_register(&mut self, addr: u8, value: u8) -> Result<(), Error<Port::Error>> {
        self.write_to_mojo(addr, &[value]).await
    }
}

impl<Port: Read + Write> MojoLink<Port> {
    /// Fill `buf` from the peripheral starting at `addr`.
    ///
    /// Waits for as long as the channel does. See
    /// [`Self::read_from_mojo_within`] for a bounded wait.
    pub async fn read_from_mojo(
        &mut self,
        addr: u8,
        buf: &mut [u8],
    ) -> Result<(), Error<Port::Error>> {
        let cmd = CommandWord::read(addr, txn_len(buf.len())?)?;

        self.send(cmd).await?;
        self.port.flush().await.map_err(Error::Io)?;
        self.port.read_exact(buf).await?;

        debug!("mojo: read {} bytes from {=u8:#x}", buf.len(), addr);

        Ok(())
    }

    /// Like [`Self::read_from_mojo`] but gives up
    /// after `timeout_us` microseconds.
    ///
    /// A timed out read may leave late payload bytes
    /// in the channel. Resynchronizing is up to the caller.
    pub async fn read_from_mojo_within<D: DelayNs>(
        &mut self,
        addr: u8,
        buf: &mut [u8],
        delay: &mut D,
        timeout_us: u32,
    ) -> Result<(), Error<Port::Error>> {
        match select(self.read_from_mojo(addr, buf), delay.delay_us(timeout_us)).await {
            Either::First(result) => result,
            Either::Second(()) => {
                warn!("mojo: read from {=u8:#x} timed out", addr);

                Err(Error::Timeout)
            }
        }
    }

    /// Read a single register.
    pub async fn read_register(&mut self, addr: u8) -> Result<u8, Error<Port::Error>> {
        let mut value = [0];

        self.read_from_mojo(addr, &mut value).await?;

        Ok(value[0])
    }
}
