use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Byte link to the scope.
///
/// Implemented for an open serial port; tests substitute an in-memory link.
pub trait ScopeLink: Read + Write {
    /// Drop bytes that were received but not read yet.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl ScopeLink for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Short read: expected {expected} bytes but only {received} arrived before the timeout")]
    ShortRead { expected: usize, received: usize },
}

/// Request/response I/O over a [`ScopeLink`].
///
/// Only one request is ever in flight: [`ScopeTerminal::transact`] takes
/// `&mut self` and returns after the full response or the timeout.
#[derive(Debug)]
pub struct ScopeTerminal<L = Box<dyn SerialPort>> {
    link: L,
    timeout: Duration,
}

impl<L: ScopeLink> ScopeTerminal<L> {
    pub fn new(link: L, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send `command` and read exactly `response_len` bytes back.
    pub fn transact(
        &mut self,
        command: &str,
        response_len: usize,
    ) -> Result<Vec<u8>, TerminalError> {
        // A late answer to an earlier, timed out request must not be taken
        // for the start of this one.
        self.link.clear_input()?;

        log::trace!("Sending command {}", command);
        self.link.write_all(command.as_bytes())?;
        self.link.flush()?;

        self.read_response(response_len)
    }

    fn read_response(&mut self, response_len: usize) -> Result<Vec<u8>, TerminalError> {
        let mut response = vec![0u8; response_len];
        let mut received = 0;
        let start = Instant::now();

        while received < response_len {
            match self.link.read(&mut response[received..]) {
                Ok(0) => break,
                Ok(n) => received += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) => {}
                Err(e) => return Err(e.into()),
            }

            if received < response_len && start.elapsed() >= self.timeout {
                break;
            }
        }

        if received < response_len {
            return Err(TerminalError::ShortRead {
                expected: response_len,
                received,
            });
        }

        Ok(response)
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }
}
