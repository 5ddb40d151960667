//! Tacho Card - Digital tachograph card download over PC/SC
//!
//! This crate speaks the tachograph card data-download protocol: it selects
//! the card application, reads the regulated set of elementary files
//! (retrieving the card's signature for the files that carry one) and
//! assembles them into the standard TGD dump layout with a derived filename.

pub mod apdu;
pub mod catalog;
pub mod dump;
pub mod error;
pub mod protocol;
pub mod reader;

pub use catalog::{RecordDefinition, ResolvedLengths};
pub use dump::{build_filename, write_dump, CardDump, DumpSession, DumpState};
pub use error::{ChannelError, DumpError, ProtocolError};
pub use protocol::{Generation, TachoCard};
pub use reader::{CardChannel, CardReader, PcscChannel};

/// Re-export commonly used types
pub use pcsc::{Card, Context, Error as PcscError};
