use embassy_time::Timer;

use super::SharedController;
use crate::hw::OutputBank;
use crate::instant::to_embassy;
use crate::log;
use crate::shows::ShowReceiver;

/// Plays queued shows on the outputs, then puts the light bank back.
#[embassy_executor::task]
pub async fn run(
    requests: ShowReceiver<'static>,
    outputs: &'static OutputBank,
    controller: &'static SharedController,
) -> ! {
    loop {
        let show = requests.receive().await;
        log::show_started(show);

        for frame in show.template().cursor() {
            outputs.lock(|bank| {
                let mut bank = bank.borrow_mut();
                for (channel, level) in frame.writes() {
                    bank.set(channel, level);
                }
            });
            Timer::after(to_embassy(frame.hold)).await;
        }

        controller.lock().await.restore_outputs();
        log::show_finished(show);
    }
}
