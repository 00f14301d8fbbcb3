//! On-disk envelope of the encrypted configuration file.
//!
//! - **`codec`** – Header layout, sealing (serialize + encrypt) and opening
//!   (verify + decrypt + deserialize).

pub mod codec;

pub use codec::{open, parse_header, seal, CodecError, ENVELOPE_VERSION, HEADER_SIZE, MAGIC, TAG_LEN};
