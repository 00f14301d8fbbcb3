//! Domain types with no I/O and no cryptography.
//!
//! - **`settings`**  – The persisted application preferences.
//! - **`unique_id`** – Generation of the per-installation identifier.

pub mod settings;
pub mod unique_id;
