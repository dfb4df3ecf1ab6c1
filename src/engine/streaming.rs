// Copyright 2024-2026 couponlm Contributors
// SPDX-License-Identifier: Apache-2.0

//! Text streaming output for incremental responses.
//!
//! One fragment is pushed per emitted token, followed by a final event that
//! carries the complete text. The stream is finite and not restartable.

use tokio::sync::mpsc;

/// A single streamed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text contributed by one emitted token.
    Fragment(String),
    /// Generation finished; carries the full decoded text.
    Done(String),
}

/// Async stream of generated text.
pub struct TextStream {
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
}

impl TextStream {
    /// Create a new text stream with sender/receiver pair.
    pub fn new() -> (TextStreamSender, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (TextStreamSender { sender }, Self { receiver })
    }

    /// Receive the next event, if available.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Collect fragments until the final event or until the sender is gone.
    ///
    /// Returns the fragments and the final text, if one arrived.
    pub async fn collect(mut self) -> (Vec<String>, Option<String>) {
        let mut fragments = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Fragment(text) => fragments.push(text),
                StreamEvent::Done(text) => return (fragments, Some(text)),
            }
        }
        (fragments, None)
    }
}

/// Sender half for pushing text to a stream.
#[derive(Clone)]
pub struct TextStreamSender {
    sender: mpsc::UnboundedSender<StreamEvent>,
}

impl TextStreamSender {
    /// Push a fragment. Returns false once the receiver is gone.
    pub fn fragment(&self, text: &str) -> bool {
        self.sender.send(StreamEvent::Fragment(text.to_string())).is_ok()
    }

    /// Push the final text and close the stream.
    pub fn finish(self, text: String) {
        let _ = self.sender.send(StreamEvent::Done(text));
    }
}
