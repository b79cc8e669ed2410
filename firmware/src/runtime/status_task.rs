//! Periodic status broadcast.
//!
//! The controller lock is held only to build the frame and to record the
//! outcome, never across the bounded transmit wait. Polls are stamped with the
//! scheduled deadline so lock contention cannot push a period past its slot.

use embassy_stm32::can::CanTx;
use embassy_time::{Instant, Timer, with_timeout};
use pcm_core::status::PublishOutcome;

use super::SharedController;
use crate::hw::can::to_can_frame;
use crate::instant::{FirmwareInstant, next_deadline, to_embassy};
use crate::log;

#[embassy_executor::task]
pub async fn run(mut tx: CanTx<'static>, controller: &'static SharedController) -> ! {
    let (interval, send_wait) = {
        let controller = controller.lock().await;
        let config = controller.config();
        (to_embassy(config.status_interval), to_embassy(config.status_send_wait))
    };
    let mut deadline = Instant::now();

    loop {
        Timer::at(deadline).await;
        let scheduled = deadline;
        deadline = next_deadline(deadline, interval, Instant::now());

        let Some(status) = controller.lock().await.poll_status(scheduled.into()) else {
            continue;
        };

        let outcome = match to_can_frame(&status) {
            Some(frame) => match with_timeout(send_wait, tx.write(&frame)).await {
                Ok(_) => PublishOutcome::Sent,
                Err(_) => PublishOutcome::Dropped,
            },
            None => PublishOutcome::Dropped,
        };

        let mut controller = controller.lock().await;
        controller.record_status(outcome, FirmwareInstant::now());
        if outcome == PublishOutcome::Dropped {
            log::status_dropped(controller.status_counters());
        }
    }
}
