//! Minimal abstraction for a stream of received frames. Implemented by the
//! driver and by test doubles feeding the traffic analyzer.
use crate::driver::frame::CanFrame;
use core::future::Future;

/// Contract to pull received CAN frames.
pub trait FrameSource {
    /// Next buffered frame, if any. Never blocks.
    fn try_receive(&mut self) -> Option<CanFrame>;
    /// Next frame. Asynchronously waits until data arrives.
    fn receive<'a>(&'a mut self) -> impl Future<Output = CanFrame> + 'a;
}
