//! PC/SC card reader management and the card channel boundary

use pcsc::{Card, Context, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

use crate::error::ChannelError;

/// One raw command/response exchange with a card.
///
/// The protocol engine only ever talks through this trait, so it can run
/// against a scripted in-memory card in tests instead of real hardware.
/// Implementations return the full response including the two trailing
/// status bytes; timeouts and retries are theirs to handle.
pub trait CardChannel {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, ChannelError>;
}

impl<C: CardChannel + ?Sized> CardChannel for &mut C {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, ChannelError> {
        (**self).transmit(command)
    }
}

/// Card channel backed by a connected PC/SC card
pub struct PcscChannel {
    card: Card,
}

impl PcscChannel {
    pub fn new(card: Card) -> Self {
        Self { card }
    }
}

impl CardChannel for PcscChannel {
    fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let mut response_buf = [0; MAX_BUFFER_SIZE];
        let response = self
            .card
            .transmit(command, &mut response_buf)
            .map_err(|err| ChannelError::new(err.to_string()))?;
        Ok(response.to_vec())
    }
}

/// Card reader wrapper for managing PC/SC connections
pub struct CardReader {
    context: Context,
}

impl CardReader {
    /// Create a new CardReader by establishing a PC/SC context
    pub fn new() -> Result<Self, pcsc::Error> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context })
    }

    /// List all available card readers
    pub fn list_readers(&self) -> Result<Vec<String>, pcsc::Error> {
        let mut readers_buf = [0; 2048];
        let readers = self.context.list_readers(&mut readers_buf)?;

        Ok(readers
            .map(|r| r.to_str().unwrap_or("Unknown").to_string())
            .collect())
    }

    /// Connect to the first available reader
    pub fn connect_first(&self) -> Result<(Card, String), pcsc::Error> {
        let mut readers_buf = [0; 2048];
        let mut readers = self.context.list_readers(&mut readers_buf)?;

        if let Some(reader) = readers.next() {
            let reader_name = reader.to_str().unwrap_or("Unknown").to_string();
            let card = self
                .context
                .connect(reader, ShareMode::Shared, Protocols::ANY)?;
            Ok((card, reader_name))
        } else {
            Err(pcsc::Error::NoReadersAvailable)
        }
    }

    /// Connect to a specific reader by name (CStr)
    pub fn connect(&self, reader_name: &std::ffi::CStr) -> Result<Card, pcsc::Error> {
        self.context
            .connect(reader_name, ShareMode::Shared, Protocols::ANY)
    }
}
