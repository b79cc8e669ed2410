use embassy_time::Ticker;

use super::SharedController;
use crate::instant::{FirmwareInstant, to_embassy};
use crate::log;

#[embassy_executor::task]
pub async fn run(controller: &'static SharedController) -> ! {
    let period = controller.lock().await.config().sweep_period;
    let mut ticker = Ticker::every(to_embassy(period));
    loop {
        ticker.next().await;
        let aborted = controller.lock().await.sweep(FirmwareInstant::now());
        if let Some(reason) = aborted {
            log::provisioning_aborted(reason);
        }
    }
}
