//! Tachograph card download protocol

use tracing::{debug, trace};

use crate::apdu::{commands, exchange};
use crate::catalog::RecordDefinition;
use crate::error::ProtocolError;
use crate::reader::CardChannel;

const SIGNATURE_LENGTH: usize = 0x80;

/// Tachograph application generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// First-generation application, AID "TACHO"
    Gen1,
    /// Second-generation application, AID "SMRDT".
    /// Carried for completeness; never exercised against real hardware.
    Gen2,
}

impl Generation {
    pub fn aid(self) -> &'static [u8; 5] {
        match self {
            Generation::Gen1 => b"TACHO",
            Generation::Gen2 => b"SMRDT",
        }
    }
}

/// Tachograph card interface
///
/// Wraps a card channel and speaks the download command set: file selection,
/// chunked binary reads, hash preparation and signature retrieval. Commands
/// run strictly in call order; the card keeps cursor and hash state between
/// exchanges, so nothing here may be reordered.
pub struct TachoCard<C> {
    channel: C,
}

impl<C: CardChannel> TachoCard<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Select an elementary file by identifier
    pub fn select_record(&mut self, identifier: u16) -> Result<(), ProtocolError> {
        exchange(&mut self.channel, &commands::select_file(identifier).build())?;
        Ok(())
    }

    /// Select the tachograph application for the given generation.
    /// The card must answer with an empty payload.
    pub fn select_application(&mut self, generation: Generation) -> Result<(), ProtocolError> {
        let payload = exchange(
            &mut self.channel,
            &commands::select_application(generation.aid()).build(),
        )?;
        if !payload.is_empty() {
            return Err(ProtocolError::UnexpectedSelectResponse(hex::encode_upper(
                payload,
            )));
        }
        Ok(())
    }

    /// Read the currently selected file in chunks of at most 255 bytes.
    ///
    /// The chunk offset is `chunk_index * 0xFF`, as mandated by the download
    /// protocol's addressing; it is NOT the cumulative number of bytes
    /// received, and must stay that way for dump compatibility.
    pub fn read_record(&mut self, length: usize) -> Result<Vec<u8>, ProtocolError> {
        if length == 0 {
            return Err(ProtocolError::InvalidLength(length));
        }

        let mut output = Vec::with_capacity(length);
        let mut remaining = length;
        let mut chunk_index: u32 = 0;
        loop {
            let offset = (chunk_index * 0xFF) as u16;
            let requested = remaining.min(0xFF) as u8;
            trace!(offset, requested, "reading chunk");
            let part = exchange(
                &mut self.channel,
                &commands::read_binary(offset, requested).build(),
            )?;
            output.extend_from_slice(&part);

            if remaining <= 0xFF {
                break;
            }
            remaining -= 0xFF;
            chunk_index += 1;
        }
        Ok(output)
    }

    /// Arm the card's hash computation; the card hashes the bytes of the
    /// file read next, so this must directly precede that read.
    pub fn prepare_hash(&mut self) -> Result<(), ProtocolError> {
        exchange(&mut self.channel, &commands::perform_hash().build())?;
        Ok(())
    }

    /// Retrieve the 128-byte signature over the bytes read since
    /// [`prepare_hash`](Self::prepare_hash)
    pub fn retrieve_hash(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let signature = exchange(&mut self.channel, &commands::compute_signature().build())?;
        if signature.len() != SIGNATURE_LENGTH {
            return Err(ProtocolError::SignatureLengthMismatch(signature.len()));
        }
        Ok(signature)
    }

    /// Download one record and assemble its dump chunk:
    /// `<id:2> 00 <len:2> <payload>`, followed for signed files by
    /// `<id:2> 01 00 80 <signature:128>`.
    pub fn process_record(
        &mut self,
        definition: &RecordDefinition,
    ) -> Result<Vec<u8>, ProtocolError> {
        debug!(record = definition.name, length = definition.length, "processing record");

        let mut output = Vec::new();
        output.extend_from_slice(&definition.identifier.to_be_bytes());
        output.push(0x00);

        self.select_record(definition.identifier)?;
        if definition.signature {
            self.prepare_hash()?;
        }
        let contents = self.read_record(definition.length)?;
        output.extend_from_slice(&(contents.len() as u16).to_be_bytes());
        output.extend_from_slice(&contents);

        if definition.signature {
            let signature = self.retrieve_hash()?;
            output.extend_from_slice(&definition.identifier.to_be_bytes());
            output.extend_from_slice(&[0x01, 0x00, 0x80]);
            output.extend_from_slice(&signature);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::error::ChannelError;
    use std::collections::VecDeque;

    struct QueuedChannel {
        responses: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
    }

    impl QueuedChannel {
        fn new(responses: &[Vec<u8>]) -> Self {
            Self {
                responses: responses.iter().cloned().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl CardChannel for QueuedChannel {
        fn transmit(&mut self, command: &[u8]) -> Result<Vec<u8>, ChannelError> {
            self.sent.push(command.to_vec());
            self.responses
                .pop_front()
                .ok_or_else(|| ChannelError::new("no scripted response left"))
        }
    }

    fn ok(payload: &[u8]) -> Vec<u8> {
        let mut response = payload.to_vec();
        response.extend_from_slice(&[0x90, 0x00]);
        response
    }

    #[test]
    fn read_record_chunks_and_concatenates() {
        // 300 bytes: one full 255-byte chunk plus 45 bytes
        let first: Vec<u8> = (0..255u16).map(|i| i as u8).collect();
        let second = vec![0xEE; 45];
        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&first), ok(&second)]));

        let payload = card.read_record(300).unwrap();
        assert_eq!(payload.len(), 300);
        assert_eq!(&payload[..255], &first[..]);
        assert_eq!(&payload[255..], &second[..]);

        let sent = &card.channel.sent;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], [0x00, 0xB0, 0x00, 0x00, 0xFF]);
        // second chunk addressed at 1 * 0xFF, requesting the remaining 45
        assert_eq!(sent[1], [0x00, 0xB0, 0x00, 0xFF, 45]);
    }

    #[test]
    fn read_record_single_chunk_requests_exact_length() {
        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&[0x11; 25])]));
        let payload = card.read_record(25).unwrap();
        assert_eq!(payload.len(), 25);
        assert_eq!(card.channel.sent[0], [0x00, 0xB0, 0x00, 0x00, 25]);
    }

    #[test]
    fn read_record_rejects_zero_length_without_traffic() {
        let mut card = TachoCard::new(QueuedChannel::new(&[]));
        let err = card.read_record(0).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidLength(0)));
        assert!(card.channel.sent.is_empty());
    }

    #[test]
    fn retrieve_hash_requires_128_bytes() {
        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&[0xAB; 127])]));
        let err = card.retrieve_hash().unwrap_err();
        assert!(matches!(err, ProtocolError::SignatureLengthMismatch(127)));

        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&[0xAB; 128])]));
        assert_eq!(card.retrieve_hash().unwrap().len(), 128);
    }

    #[test]
    fn select_application_requires_empty_payload() {
        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&[])]));
        card.select_application(Generation::Gen1).unwrap();
        assert_eq!(
            card.channel.sent[0],
            commands::select_application(b"TACHO").build()
        );

        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&[0x01])]));
        let err = card.select_application(Generation::Gen1).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedSelectResponse(_)));
    }

    #[test]
    fn process_record_assembles_unsigned_chunk() {
        let payload = vec![0x42; 25];
        let mut card = TachoCard::new(QueuedChannel::new(&[ok(&[]), ok(&payload)]));

        let chunk = card.process_record(&catalog::ICC).unwrap();
        assert_eq!(&chunk[..5], &[0x00, 0x02, 0x00, 0x00, 25]);
        assert_eq!(&chunk[5..], &payload[..]);

        let sent = &card.channel.sent;
        assert_eq!(sent[0], commands::select_file(0x0002).build());
        assert_eq!(sent[1], [0x00, 0xB0, 0x00, 0x00, 25]);
    }

    #[test]
    fn process_record_wraps_signed_chunk_with_trailer() {
        let payload = vec![0x42; 4];
        let signature = vec![0x5A; 128];
        let mut card = TachoCard::new(QueuedChannel::new(&[
            ok(&[]),
            ok(&[]),
            ok(&payload),
            ok(&signature),
        ]));

        let chunk = card.process_record(&catalog::CARD_DOWNLOAD).unwrap();
        assert_eq!(&chunk[..5], &[0x05, 0x0E, 0x00, 0x00, 4]);
        assert_eq!(&chunk[5..9], &payload[..]);
        assert_eq!(&chunk[9..14], &[0x05, 0x0E, 0x01, 0x00, 0x80]);
        assert_eq!(&chunk[14..], &signature[..]);

        // select, hash-prepare, read, hash-export — in that order
        let sent = &card.channel.sent;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], commands::select_file(0x050E).build());
        assert_eq!(sent[1], commands::perform_hash().build());
        assert_eq!(sent[2], [0x00, 0xB0, 0x00, 0x00, 4]);
        assert_eq!(sent[3], commands::compute_signature().build());
    }

    #[test]
    fn process_record_propagates_status_failures() {
        let mut card = TachoCard::new(QueuedChannel::new(&[vec![0x6A, 0x82]]));
        let err = card.process_record(&catalog::ICC).unwrap_err();
        assert!(matches!(err, ProtocolError::Status(0x6A82)));
    }
}
