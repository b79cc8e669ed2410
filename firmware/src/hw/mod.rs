//! Board peripherals behind the controller's collaborator traits.

#![cfg(target_os = "none")]

use core::cell::RefCell;

use embassy_stm32::peripherals::{TIM2, TIM3};
use embassy_stm32::timer::simple_pwm::{SimplePwmChannel, SimplePwmChannels};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use pcm_core::lights::{ChannelIndex, OutputSink};

pub mod can;
pub mod flash;
pub mod update;

/// Eight PWM outputs: TIM2 CH1..CH4 drive channels 1-4, TIM3 CH1..CH4 drive 5-8.
pub struct PwmBank {
    low: SimplePwmChannels<'static, TIM2>,
    high: SimplePwmChannels<'static, TIM3>,
}

impl PwmBank {
    pub fn new(
        mut low: SimplePwmChannels<'static, TIM2>,
        mut high: SimplePwmChannels<'static, TIM3>,
    ) -> Self {
        for channel in [&mut low.ch1, &mut low.ch2, &mut low.ch3, &mut low.ch4] {
            channel.set_duty_cycle_fully_off();
            channel.enable();
        }
        for channel in [&mut high.ch1, &mut high.ch2, &mut high.ch3, &mut high.ch4] {
            channel.set_duty_cycle_fully_off();
            channel.enable();
        }
        Self { low, high }
    }

    pub fn set(&mut self, channel: ChannelIndex, level: u8) {
        match channel.get() {
            0 => duty(&mut self.low.ch1, level),
            1 => duty(&mut self.low.ch2, level),
            2 => duty(&mut self.low.ch3, level),
            3 => duty(&mut self.low.ch4, level),
            4 => duty(&mut self.high.ch1, level),
            5 => duty(&mut self.high.ch2, level),
            6 => duty(&mut self.high.ch3, level),
            _ => duty(&mut self.high.ch4, level),
        }
    }
}

fn duty<T>(output: &mut SimplePwmChannel<'static, T>, level: u8)
where
    T: embassy_stm32::timer::GeneralInstance4Channel,
{
    output.set_duty_cycle_fraction(u16::from(level), u16::from(u8::MAX));
}

pub type OutputBank = BlockingMutex<ThreadModeRawMutex, RefCell<PwmBank>>;

/// Output sink shared between the controller and the show player.
#[derive(Copy, Clone)]
pub struct SharedOutputs {
    bank: &'static OutputBank,
}

impl SharedOutputs {
    pub const fn new(bank: &'static OutputBank) -> Self {
        Self { bank }
    }
}

impl OutputSink for SharedOutputs {
    fn set_intensity(&mut self, channel: ChannelIndex, level: u8) {
        self.bank.lock(|bank| bank.borrow_mut().set(channel, level));
    }
}
