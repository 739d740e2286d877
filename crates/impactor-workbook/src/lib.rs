pub mod backends;
pub mod error;
pub mod lock;
#[cfg(feature = "umya")]
pub mod session;
pub mod traits;

#[cfg(feature = "calamine")]
pub use backends::CalamineAdapter;
#[cfg(feature = "umya")]
pub use backends::UmyaAdapter;
pub use error::IoError;
pub use lock::{ensure_unlocked, lock_holder};
#[cfg(feature = "umya")]
pub use session::WriteSession;
pub use traits::{SheetData, SpreadsheetReader, SpreadsheetWriter};

// Re-export for convenience
pub use impactor_common::CellValue;
