use embassy_stm32::can::CanRx;

use super::SharedController;
use crate::hw::can::to_bus_frame;
use crate::instant::FirmwareInstant;
use crate::log;

#[embassy_executor::task]
pub async fn run(mut rx: CanRx<'static>, controller: &'static SharedController) -> ! {
    loop {
        let envelope = match rx.read().await {
            Ok(envelope) => envelope,
            Err(error) => {
                log::bus_error(&error);
                continue;
            }
        };

        let frame = match to_bus_frame(&envelope.frame) {
            Ok(frame) => frame,
            Err(error) => {
                log::frame_unconvertible(&error);
                continue;
            }
        };

        let now = FirmwareInstant::now();
        let mut controller = controller.lock().await;
        let dispatch = controller.handle_frame(&frame, now);
        drop(controller);
        log::dispatch(&dispatch, now);
    }
}
