//! Catalog of the elementary files downloaded from a tachograph card
//!
//! The base table is immutable. The five records whose size depends on the
//! card's contents carry a zero length here and are overlaid with a
//! [`ResolvedLengths`] value computed once from EF Application_Identification
//! before the body sequence is read.

/// One elementary file as it appears in the download sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDefinition {
    /// Symbolic name used in logs and error context
    pub name: &'static str,
    /// 16-bit file identifier
    pub identifier: u16,
    /// Declared payload length; 0 means resolved at runtime
    pub length: usize,
    /// Whether the card computes a signature over this file's bytes
    pub signature: bool,
}

impl RecordDefinition {
    const fn new(name: &'static str, identifier: u16, length: usize, signature: bool) -> Self {
        Self {
            name,
            identifier,
            length,
            signature,
        }
    }

    /// Copy of this definition with the length replaced
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }
}

pub const ICC: RecordDefinition = RecordDefinition::new("ICC", 0x0002, 25, false);
pub const IC: RecordDefinition = RecordDefinition::new("IC", 0x0005, 8, false);

pub const APPLICATION_IDENTIFICATION: RecordDefinition =
    RecordDefinition::new("Application_Identification", 0x0501, 10, true);

pub const CARD_CERTIFICATE: RecordDefinition =
    RecordDefinition::new("Card_Certificate", 0xC100, 194, false);
pub const CA_CERTIFICATE: RecordDefinition =
    RecordDefinition::new("CA_Certificate", 0xC108, 194, false);
pub const IDENTIFICATION: RecordDefinition =
    RecordDefinition::new("Identification", 0x0520, 143, true);
pub const CARD_DOWNLOAD: RecordDefinition = RecordDefinition::new("Card_Download", 0x050E, 4, true);
pub const DRIVING_LICENSE_INFO: RecordDefinition =
    RecordDefinition::new("Driving_License_Info", 0x0521, 53, true);
pub const EVENTS_DATA: RecordDefinition = RecordDefinition::new("Events_Data", 0x0502, 0, true);
pub const FAULTS_DATA: RecordDefinition = RecordDefinition::new("Faults_Data", 0x0503, 0, true);
pub const DRIVER_ACTIVITY_DATA: RecordDefinition =
    RecordDefinition::new("Driver_Activity_Data", 0x0504, 0, true);
pub const VEHICLES_USED: RecordDefinition = RecordDefinition::new("Vehicles_Used", 0x0505, 0, true);
pub const PLACES: RecordDefinition = RecordDefinition::new("Places", 0x0506, 0, true);
pub const CURRENT_USAGE: RecordDefinition = RecordDefinition::new("Current_Usage", 0x0507, 19, true);
pub const CONTROL_ACTIVITY_DATA: RecordDefinition =
    RecordDefinition::new("Control_Activity_Data", 0x0508, 46, true);
pub const SPECIFIC_CONDITIONS: RecordDefinition =
    RecordDefinition::new("Specific_Conditions", 0x0522, 280, true);

/// Files read before the tachograph application is selected
pub const HEADER_RECORDS: [RecordDefinition; 2] = [ICC, IC];

/// Files read after EF Application_Identification, in download order
pub const BODY_RECORDS: [RecordDefinition; 13] = [
    CARD_CERTIFICATE,
    CA_CERTIFICATE,
    IDENTIFICATION,
    CARD_DOWNLOAD,
    DRIVING_LICENSE_INFO,
    EVENTS_DATA,
    FAULTS_DATA,
    DRIVER_ACTIVITY_DATA,
    VEHICLES_USED,
    PLACES,
    CURRENT_USAGE,
    CONTROL_ACTIVITY_DATA,
    SPECIFIC_CONDITIONS,
];

/// Lengths of the five variable-size files, computed from the 10-byte
/// EF Application_Identification payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLengths {
    pub events_data: usize,
    pub faults_data: usize,
    pub driver_activity_data: usize,
    pub vehicles_used: usize,
    pub places: usize,
}

impl ResolvedLengths {
    /// Effective length for a file identifier, if this overlay covers it
    pub fn length_for(&self, identifier: u16) -> Option<usize> {
        match identifier {
            0x0502 => Some(self.events_data),
            0x0503 => Some(self.faults_data),
            0x0504 => Some(self.driver_activity_data),
            0x0505 => Some(self.vehicles_used),
            0x0506 => Some(self.places),
            _ => None,
        }
    }

    /// Apply this overlay to a definition, leaving fixed-size files untouched
    pub fn apply(&self, definition: &RecordDefinition) -> RecordDefinition {
        match self.length_for(definition.identifier) {
            Some(length) => definition.with_length(length),
            None => *definition,
        }
    }
}

/// Compute the variable file lengths from the EF Application_Identification
/// payload (the 10 bytes following the chunk's 5-byte prefix).
///
/// Byte offsets and size formulas are fixed by the download standard:
/// events and faults counts are per event/fault type, the activity field is
/// the structure length, vehicles and places are record counts.
pub fn resolve_lengths(payload: &[u8; 10]) -> ResolvedLengths {
    let events_per_type = payload[3] as usize;
    let faults_per_type = payload[4] as usize;
    let activity_structure_length = u16::from_be_bytes([payload[5], payload[6]]) as usize;
    let vehicle_records = u16::from_be_bytes([payload[7], payload[8]]) as usize;
    let place_records = payload[9] as usize;

    ResolvedLengths {
        events_data: events_per_type * 24 * 6,
        faults_data: faults_per_type * 24 * 2,
        driver_activity_data: activity_structure_length + 4,
        vehicles_used: vehicle_records * 31 + 2,
        places: place_records * 10 + 1,
    }
}
