//! Conversions between FDCAN driver frames and [`BusFrame`].

use embassy_stm32::can::Frame;
use embedded_can::Id;
use pcm_core::frame::{BusFrame, FrameError};

pub fn to_bus_frame(frame: &Frame) -> Result<BusFrame, FrameError> {
    let header = frame.header();
    let converted = match header.id() {
        Id::Standard(id) => BusFrame::new(u32::from(id.as_raw()), frame.data())?,
        Id::Extended(id) => BusFrame::new_extended(id.as_raw(), frame.data())?,
    };
    Ok(converted.with_remote_request(header.rtr()))
}

/// Builds a classic data frame; `None` when the identifier does not fit.
pub fn to_can_frame(frame: &BusFrame) -> Option<Frame> {
    if frame.is_extended() {
        Frame::new_extended(frame.id(), frame.payload()).ok()
    } else {
        let id = u16::try_from(frame.id()).ok()?;
        Frame::new_standard(id, frame.payload()).ok()
    }
}
