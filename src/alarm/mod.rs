pub mod draft;
pub mod model;

pub use draft::{AlarmDraft, DraftError, ModalOutcome};
pub use model::{AlarmData, AlarmOptions, AlarmTime, AlarmTimeError, AlertStrategy, PreAlert};
