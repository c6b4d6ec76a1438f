//! Write side of the collector: closed events wait in a [buffer::FlushBuffer] until the flush
//! policy hands them to an [buffer::EventSink].

pub mod buffer;
