//! Hardware-dependent integration tests
//!
//! These tests require a physical tachograph card in a card reader.
//! They are ignored by default and must be explicitly run with:
//!
//!     cargo test --package tacho-card --test hardware_integration -- --ignored

use tacho_card::catalog;
use tacho_card::{CardReader, DumpSession, Generation, PcscChannel, TachoCard};

/// Test that we can connect to a card reader
///
/// **Requires**: Card reader connected (card not required)
#[test]
#[ignore = "requires hardware: card reader"]
fn test_connect_to_reader() {
    let result = CardReader::new();
    assert!(
        result.is_ok(),
        "Failed to connect to card reader. Is a reader connected?"
    );
}

/// Test that we can detect an inserted card
///
/// **Requires**: Card reader with card inserted
#[test]
#[ignore = "requires hardware: card inserted in reader"]
fn test_card_present() {
    let reader = CardReader::new().expect("Failed to connect to reader");
    let (_card, reader_name) = reader.connect_first().expect("Failed to connect to card");

    println!("Connected to reader: {}", reader_name);
}

/// Test selecting the tachograph application and resolving record lengths
///
/// **Requires**: Tachograph driver card inserted
#[test]
#[ignore = "requires hardware: tachograph card"]
fn test_select_application_and_resolve_lengths() {
    let reader = CardReader::new().expect("Failed to connect to reader");
    let (card, _reader_name) = reader.connect_first().expect("Failed to connect to card");

    let mut card = TachoCard::new(PcscChannel::new(card));
    card.select_application(Generation::Gen1)
        .expect("Failed to select tachograph application");

    let chunk = card
        .process_record(&catalog::APPLICATION_IDENTIFICATION)
        .expect("Failed to process Application_Identification");

    let payload: &[u8; 10] = chunk[5..15].try_into().unwrap();
    let resolved = catalog::resolve_lengths(payload);
    println!("Resolved lengths: {:?}", resolved);
    assert!(resolved.driver_activity_data >= 4);
}

/// Full end-to-end test: assemble a complete dump buffer
///
/// **Requires**: Tachograph driver card inserted
#[test]
#[ignore = "requires hardware: tachograph card"]
fn test_full_dump_assembly() {
    let reader = CardReader::new().expect("Failed to connect to reader");
    let (card, reader_name) = reader.connect_first().expect("Failed to connect to card");
    println!("Reader: {}", reader_name);

    let mut session = DumpSession::new(PcscChannel::new(card));
    let dump = session.assemble(None).expect("Failed to assemble dump");

    println!("Dump: {} bytes as {}", dump.data.len(), dump.filename);
    assert!(dump.filename.starts_with("C_"));
    assert!(dump.filename.ends_with(".TGD"));
    assert!(!dump.data.is_empty());
}
