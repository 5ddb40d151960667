//! Card dump orchestration: the download sequence, filename derivation and
//! the TGD file writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::info;

use crate::catalog;
use crate::error::{DumpError, ProtocolError};
use crate::protocol::{Generation, TachoCard};
use crate::reader::CardChannel;

/// Progress of one dump session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpState {
    Idle,
    HeaderRecords,
    ApplicationSelected,
    IdentificationRead,
    BodyRecords,
    Assembled,
    Written,
    Failed,
}

/// A fully assembled card dump and the filename it should be stored under
#[derive(Debug, Clone)]
pub struct CardDump {
    pub data: Vec<u8>,
    pub filename: String,
}

/// Drives one complete card download.
///
/// The session owns the channel for its whole lifetime and executes the
/// fixed record sequence: header records, application selection,
/// EF Application_Identification (whose payload resolves the variable file
/// lengths), then the body records. The first failure moves the session to
/// [`DumpState::Failed`] and nothing is written.
pub struct DumpSession<C> {
    card: TachoCard<C>,
    state: DumpState,
}

impl<C: CardChannel> DumpSession<C> {
    pub fn new(channel: C) -> Self {
        Self {
            card: TachoCard::new(channel),
            state: DumpState::Idle,
        }
    }

    pub fn state(&self) -> DumpState {
        self.state
    }

    /// Assemble the dump buffer and write it out.
    ///
    /// When `supplied_filename` is given it is used as the target path; the
    /// derived filename is still computed and validated, and logged as
    /// discarded.
    pub fn run(&mut self, supplied_filename: Option<&str>) -> Result<CardDump, DumpError> {
        let dump = self.assemble(supplied_filename)?;
        if let Err(err) = write_dump(&dump.data, Path::new(&dump.filename)) {
            self.state = DumpState::Failed;
            return Err(err);
        }
        self.state = DumpState::Written;
        info!(filename = %dump.filename, bytes = dump.data.len(), "dump written");
        Ok(dump)
    }

    /// Run the download sequence and return the assembled buffer without
    /// touching the filesystem
    pub fn assemble(&mut self, supplied_filename: Option<&str>) -> Result<CardDump, DumpError> {
        match self.assemble_inner(supplied_filename) {
            Ok(dump) => {
                self.state = DumpState::Assembled;
                Ok(dump)
            }
            Err(err) => {
                self.state = DumpState::Failed;
                Err(err)
            }
        }
    }

    fn assemble_inner(&mut self, supplied_filename: Option<&str>) -> Result<CardDump, DumpError> {
        let mut data = Vec::new();

        self.state = DumpState::HeaderRecords;
        for definition in &catalog::HEADER_RECORDS {
            info!(record = definition.name, "reading header record");
            data.extend(self.process(definition)?);
        }

        self.card
            .select_application(Generation::Gen1)
            .map_err(DumpError::SelectApplication)?;
        self.state = DumpState::ApplicationSelected;

        let app_id = catalog::APPLICATION_IDENTIFICATION;
        info!(record = app_id.name, "reading identification header");
        let app_id_chunk = self.process(&app_id)?;
        // resolver input is the 10-byte payload behind the 5-byte chunk prefix
        let resolver_payload: &[u8; 10] = app_id_chunk
            .get(5..15)
            .and_then(|s| s.try_into().ok())
            .ok_or(DumpError::Record {
                name: app_id.name,
                source: ProtocolError::ShortResponse,
            })?;
        let resolved = catalog::resolve_lengths(resolver_payload);
        self.state = DumpState::IdentificationRead;
        data.extend(app_id_chunk);

        self.state = DumpState::BodyRecords;
        let mut derived_filename = None;
        for definition in &catalog::BODY_RECORDS {
            let definition = resolved.apply(definition);
            assert!(
                definition.length > 0,
                "record {} read before its length was resolved",
                definition.name
            );
            info!(record = definition.name, "reading body record");
            let chunk = self.process(&definition)?;

            if definition.identifier == catalog::IDENTIFICATION.identifier {
                let field: &[u8; 11] = chunk
                    .get(5..16)
                    .and_then(|s| s.try_into().ok())
                    .ok_or(DumpError::Record {
                        name: definition.name,
                        source: ProtocolError::ShortResponse,
                    })?;
                derived_filename = Some(build_filename(field, Local::now())?);
            }

            data.extend(chunk);
        }

        let derived_filename =
            derived_filename.expect("Identification is always part of the body sequence");
        let filename = match supplied_filename {
            Some(supplied) => {
                info!(
                    derived = %derived_filename,
                    "ignoring derived filename in favor of the supplied one"
                );
                supplied.to_string()
            }
            None => derived_filename,
        };

        Ok(CardDump { data, filename })
    }

    fn process(&mut self, definition: &catalog::RecordDefinition) -> Result<Vec<u8>, DumpError> {
        self.card
            .process_record(definition)
            .map_err(|source| DumpError::Record {
                name: definition.name,
                source,
            })
    }
}

/// Derive the canonical dump filename from the 11-byte card-type/card-number
/// field of EF Identification.
///
/// Format: `C_<cardnumber>_<type as 2 hex digits>_<yymmdd_HHMM>.TGD`. The
/// card number is right-trimmed of padding spaces and must be non-empty
/// ASCII alphanumeric.
pub fn build_filename(field: &[u8; 11], timestamp: DateTime<Local>) -> Result<String, DumpError> {
    let card_type = field[0];
    let card_number = String::from_utf8_lossy(&field[1..]);
    let card_number = card_number.trim_end_matches(' ');

    if card_number.is_empty() || !card_number.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DumpError::InvalidCardNumber(card_number.to_string()));
    }

    Ok(format!(
        "C_{}_{:02X}_{}.TGD",
        card_number,
        card_type,
        timestamp.format("%y%m%d_%H%M")
    ))
}

/// Write the assembled dump buffer to `path` in one shot, verifying the
/// write is complete
pub fn write_dump(data: &[u8], path: &Path) -> Result<(), DumpError> {
    let mut file = File::create(path).map_err(|source| DumpError::Create {
        path: path.display().to_string(),
        source,
    })?;
    let written = file.write(data).map_err(DumpError::Write)?;
    if written != data.len() {
        return Err(DumpError::ShortWrite {
            expected: data.len(),
            written,
        });
    }
    Ok(())
}
