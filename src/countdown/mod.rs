pub mod controller;
pub mod state;

pub use controller::{CompletionCallback, CountdownContext, CountdownController, CountdownSnapshot};
pub use state::{
    format_remaining, CalculationStatus, CountdownPhase, CountdownState, TickOutcome, ALARM_MESSAGE,
    AWAITING_MESSAGE,
};
