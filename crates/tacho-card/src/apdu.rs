//! APDU (Application Protocol Data Unit) command handling

use crate::error::ProtocolError;
use crate::reader::CardChannel;

/// APDU response containing data and status word
#[derive(Debug, Clone)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    /// Status word SW1
    pub sw1: u8,
    /// Status word SW2
    pub sw2: u8,
}

impl ApduResponse {
    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get the full status word as a 16-bit value
    pub fn status_word(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }
}

/// Send one command frame through the channel and return the payload.
///
/// The two trailing status bytes are validated and stripped; anything other
/// than `90 00` is an error carrying the raw status word. No retries happen
/// here — a failed exchange aborts the caller's whole operation.
pub fn exchange<C: CardChannel>(channel: &mut C, command: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let raw = channel.transmit(command)?;

    if raw.len() < 2 {
        return Err(ProtocolError::ShortResponse);
    }

    let sw1 = raw[raw.len() - 2];
    let sw2 = raw[raw.len() - 1];
    let response = ApduResponse {
        data: raw[..raw.len() - 2].to_vec(),
        sw1,
        sw2,
    };

    if !response.is_success() {
        return Err(ProtocolError::Status(response.status_word()));
    }

    Ok(response.data)
}

/// APDU command builder
pub struct ApduCommand {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Vec<u8>,
    le: Option<u8>,
}

impl ApduCommand {
    /// Create a new APDU command
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Set command data
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Set expected response length
    pub fn le(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Build the APDU command bytes
    pub fn build(&self) -> Vec<u8> {
        let mut apdu = vec![self.cla, self.ins, self.p1, self.p2];

        if !self.data.is_empty() {
            apdu.push(self.data.len() as u8);
            apdu.extend_from_slice(&self.data);
        }

        if let Some(le) = self.le {
            apdu.push(le);
        }

        apdu
    }
}

/// Tachograph card commands (Commission Regulation download protocol)
pub mod commands {
    use super::ApduCommand;

    /// SELECT an elementary file by its 16-bit identifier
    pub fn select_file(identifier: u16) -> ApduCommand {
        ApduCommand::new(0x00, 0xA4, 0x02, 0x0C).data(identifier.to_be_bytes().to_vec())
    }

    /// READ BINARY of up to `length` bytes at `offset`
    pub fn read_binary(offset: u16, length: u8) -> ApduCommand {
        let [hi, lo] = offset.to_be_bytes();
        ApduCommand::new(0x00, 0xB0, hi, lo).le(length)
    }

    /// SELECT the tachograph application by its 5-byte AID
    pub fn select_application(aid: &[u8; 5]) -> ApduCommand {
        let mut data = vec![0xFF];
        data.extend_from_slice(aid);
        ApduCommand::new(0x00, 0xA4, 0x04, 0x0C).data(data)
    }

    /// PERFORM HASH OF FILE — the card hashes the bytes read afterwards
    pub fn perform_hash() -> ApduCommand {
        ApduCommand::new(0x80, 0x2A, 0x90, 0x00)
    }

    /// PSO: COMPUTE DIGITAL SIGNATURE — export the accumulated hash signature
    pub fn compute_signature() -> ApduCommand {
        ApduCommand::new(0x00, 0x2A, 0x9E, 0x9A).le(0x80)
    }
}
