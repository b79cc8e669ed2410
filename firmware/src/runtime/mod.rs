use core::cell::RefCell;

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::can::{self, CanConfigurator};
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::{Input, OutputType, Pull};
use embassy_stm32::peripherals::FDCAN1;
use embassy_stm32::time::khz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;
use pcm_core::config::{BUS_BITRATE, ControllerConfig};
use pcm_core::router::Controller;
use static_cell::StaticCell;

use crate::hw::flash::FlashCredentialStore;
use crate::hw::update::FirmwareUpdateAgent;
use crate::hw::{OutputBank, PwmBank, SharedOutputs};
use crate::instant::FirmwareInstant;
use crate::log;
use crate::shows::{ShowQueue, ShowRequests};

mod rx_task;
mod show_task;
mod status_task;
mod sweep_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

embassy_stm32::bind_interrupts!(struct CanIrqs {
    TIM16_FDCAN_IT0 => can::IT0InterruptHandler<FDCAN1>;
    TIM17_FDCAN_IT1 => can::IT1InterruptHandler<FDCAN1>;
});

pub type FirmwareController = Controller<
    SharedOutputs,
    FlashCredentialStore,
    FirmwareUpdateAgent,
    ShowRequests<'static>,
    FirmwareInstant,
>;

pub type SharedController = Mutex<ThreadModeRawMutex, FirmwareController>;

const PWM_FREQUENCY_KHZ: u32 = 1;

static SHOW_QUEUE: ShowQueue = ShowQueue::new();
static OUTPUTS: StaticCell<OutputBank> = StaticCell::new();
static CONTROLLER: StaticCell<SharedController> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        TIM2,
        TIM3,
        PA0,
        PA1,
        PA2,
        PA3,
        PA6,
        PA7,
        PB0,
        PB1,
        PB4,
        FDCAN1,
        PA11,
        PA12,
        FLASH,
        ..
    } = hal::init(config);

    let low = SimplePwm::new(
        TIM2,
        Some(PwmPin::new(PA0, OutputType::PushPull)),
        Some(PwmPin::new(PA1, OutputType::PushPull)),
        Some(PwmPin::new(PA2, OutputType::PushPull)),
        Some(PwmPin::new(PA3, OutputType::PushPull)),
        khz(PWM_FREQUENCY_KHZ),
        CountingMode::EdgeAlignedUp,
    );
    let high = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        Some(PwmPin::new(PA7, OutputType::PushPull)),
        Some(PwmPin::new(PB0, OutputType::PushPull)),
        Some(PwmPin::new(PB1, OutputType::PushPull)),
        khz(PWM_FREQUENCY_KHZ),
        CountingMode::EdgeAlignedUp,
    );
    let outputs: &'static OutputBank = OUTPUTS.init(BlockingMutex::new(RefCell::new(
        PwmBank::new(low.split(), high.split()),
    )));

    let controller_config = ControllerConfig::new();
    let agent = FirmwareUpdateAgent::new(
        controller_config.hostname_prefix,
        Input::new(PB4, Pull::Down),
    )
    .expect("device identity fits hostname buffer");
    let store = FlashCredentialStore::new(Flash::new_blocking(FLASH));

    let mut controller = Controller::new(
        controller_config,
        SharedOutputs::new(outputs),
        store,
        agent,
        ShowRequests::new(SHOW_QUEUE.sender()),
    );
    match controller.load_credentials() {
        Ok(credentials) => log::credentials_loaded(credentials.is_some()),
        Err(error) => log::credentials_unreadable(&error),
    }
    controller.restore_outputs();
    let controller: &'static SharedController = CONTROLLER.init(Mutex::new(controller));

    let mut can = CanConfigurator::new(FDCAN1, PA11, PA12, CanIrqs);
    can.set_bitrate(BUS_BITRATE);
    let (tx, rx, _properties) = can.into_normal_mode().split();

    spawner
        .spawn(rx_task::run(rx, controller))
        .expect("failed to spawn bus receive task");
    spawner
        .spawn(sweep_task::run(controller))
        .expect("failed to spawn provisioning sweep task");
    spawner
        .spawn(status_task::run(tx, controller))
        .expect("failed to spawn status task");
    spawner
        .spawn(show_task::run(SHOW_QUEUE.receiver(), outputs, controller))
        .expect("failed to spawn show task");

    core::future::pending::<()>().await;
}
