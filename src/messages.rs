//! Outbound messages and the channel they travel on.
//!
//! The processor posts three shapes: one `init` message, raw PCM frames and
//! periodic `stats`. Frames carry no envelope; the structured messages
//! serialize to tagged JSON objects for the consumer side.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use serde::Serialize;

use crate::frame::PcmFrame;

/// Sent once when a processor is created
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "init", rename_all = "camelCase")]
pub struct InitMessage {
    pub input_rate: u32,
    pub target_rate: u32,
    pub ratio: f64,
}

/// Periodic diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "stats", rename_all = "camelCase")]
pub struct StatsMessage {
    pub process_count: u64,
    pub input_samples: u64,
    pub output_samples: u64,
    /// inputSamples / max(1, outputSamples), three decimals
    pub actual_ratio: String,
    /// Configured ratio, three decimals
    pub expected_ratio: String,
    /// Input backlog plus unframed output
    pub buffer_size: usize,
    /// Messages the sink refused before this one
    pub dropped_messages: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorMessage {
    Init(InitMessage),
    Frame(PcmFrame),
    Stats(StatsMessage),
}

impl ProcessorMessage {
    pub fn is_frame(&self) -> bool {
        matches!(self, ProcessorMessage::Frame(_))
    }

    pub fn as_frame(&self) -> Option<&PcmFrame> {
        match self {
            ProcessorMessage::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    /// JSON form of the structured messages; frames have none
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            ProcessorMessage::Init(init) => serde_json::to_value(init).ok(),
            ProcessorMessage::Stats(stats) => serde_json::to_value(stats).ok(),
            ProcessorMessage::Frame(_) => None,
        }
    }
}

/// Non-blocking outbound channel.
///
/// Called from the real-time thread: implementations must not block,
/// sleep or do I/O. Returns `false` if the message was dropped.
pub trait MessageSink {
    fn post(&mut self, message: ProcessorMessage) -> bool;
}

impl MessageSink for Vec<ProcessorMessage> {
    fn post(&mut self, message: ProcessorMessage) -> bool {
        self.push(message);
        true
    }
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn post(&mut self, message: ProcessorMessage) -> bool {
        (**self).post(message)
    }
}

/// Adapts a closure into a sink
pub struct CallbackSink<F>(pub F);

impl<F> MessageSink for CallbackSink<F>
where
    F: FnMut(ProcessorMessage),
{
    fn post(&mut self, message: ProcessorMessage) -> bool {
        (self.0)(message);
        true
    }
}

/// Producer half of a lock-free SPSC message ring.
///
/// When the ring is full the newest message is dropped.
pub struct RingSink {
    producer: HeapProd<ProcessorMessage>,
}

impl MessageSink for RingSink {
    fn post(&mut self, message: ProcessorMessage) -> bool {
        self.producer.try_push(message).is_ok()
    }
}

/// Consumer half of a lock-free SPSC message ring
pub struct MessageReceiver {
    consumer: HeapCons<ProcessorMessage>,
}

impl MessageReceiver {
    pub fn try_recv(&mut self) -> Option<ProcessorMessage> {
        self.consumer.try_pop()
    }

    /// Pop everything currently queued, in emission order
    pub fn drain(&mut self) -> impl Iterator<Item = ProcessorMessage> + '_ {
        std::iter::from_fn(move || self.consumer.try_pop())
    }

    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// Create a bounded SPSC message channel
pub fn message_channel(capacity: usize) -> (RingSink, MessageReceiver) {
    let rb = HeapRb::<ProcessorMessage>::new(capacity.max(1));
    let (producer, consumer) = rb.split();
    (RingSink { producer }, MessageReceiver { consumer })
}
