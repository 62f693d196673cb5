use anyhow::Result;

use crate::alarm::{AlarmData, ModalOutcome};
use crate::countdown::{
    CompletionCallback, CountdownContext, CountdownController, CountdownSnapshot,
};

/// A search result view: the resolved target URL plus at most one alarm.
///
/// The view owns the alarm's lifecycle. Confirming a new alarm unmounts the
/// previous countdown before the new one starts, so two tickers never overlap.
pub struct ResultView {
    final_url: Option<String>,
    ctx: CountdownContext,
    active: Option<CountdownController>,
}

impl ResultView {
    pub fn new(final_url: Option<String>, ctx: CountdownContext) -> Self {
        Self {
            final_url,
            ctx,
            active: None,
        }
    }

    pub fn final_url(&self) -> Option<&str> {
        self.final_url.as_deref()
    }

    pub fn alarm(&self) -> Option<&AlarmData> {
        self.active.as_ref().map(|c| c.alarm())
    }

    pub fn countdown(&self) -> Option<&CountdownController> {
        self.active.as_ref()
    }

    pub fn snapshot(&self) -> Option<CountdownSnapshot> {
        self.active.as_ref().map(|c| c.snapshot())
    }

    /// Applies the alarm form's result. `Cancelled` leaves the current alarm alone.
    pub async fn apply(
        &mut self,
        outcome: ModalOutcome,
        on_complete: Option<CompletionCallback>,
    ) -> Result<()> {
        match outcome {
            ModalOutcome::Confirmed(alarm) => self.set_alarm(alarm, on_complete).await,
            ModalOutcome::Cancelled => Ok(()),
        }
    }

    pub async fn set_alarm(
        &mut self,
        alarm: AlarmData,
        on_complete: Option<CompletionCallback>,
    ) -> Result<()> {
        self.delete_alarm().await;
        let controller =
            CountdownController::mount(alarm, self.final_url.clone(), &self.ctx, on_complete)?;
        self.active = Some(controller);
        Ok(())
    }

    pub async fn delete_alarm(&mut self) {
        if let Some(controller) = self.active.take() {
            controller.unmount().await;
        }
    }
}
