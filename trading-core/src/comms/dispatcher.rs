use crate::framework::StopSignal;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Consumer already started: {0}")]
    AlreadyStarted(String),
    #[error("No consumer for topic: {0}")]
    UnknownTopic(String),
    #[error("Queue closed: {0}")]
    QueueClosed(String),
}

/// Work performed by a `Consumer` on each dequeued event.
#[async_trait]
pub trait EventHandler<E>: Send + Sync {
    async fn handle(&self, event: E) -> Result<()>;
}

/// Sending half of a consumer's inbound queue.
pub struct ConsumerQueue<E> {
    name: String,
    sender: mpsc::UnboundedSender<E>,
}

impl<E> Clone for ConsumerQueue<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<E> ConsumerQueue<E> {
    pub fn push(&self, event: E) -> Result<(), DispatchError> {
        self.sender
            .send(event)
            .map_err(|_| DispatchError::QueueClosed(self.name.clone()))
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A single sequential processing loop over an unbounded queue.
///
/// Events are handled strictly in arrival order. `stop()` is cooperative:
/// the event being handled runs to completion and the loop exits before
/// popping the next one.
pub struct Consumer<E> {
    name: String,
    sender: mpsc::UnboundedSender<E>,
    receiver: Option<mpsc::UnboundedReceiver<E>>,
    handler: Arc<dyn EventHandler<E>>,
    stop: StopSignal,
}

impl<E: Send + 'static> Consumer<E> {
    pub fn new(name: impl Into<String>, handler: Arc<dyn EventHandler<E>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            sender,
            receiver: Some(receiver),
            handler,
            stop: StopSignal::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> ConsumerQueue<E> {
        ConsumerQueue {
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }

    /// Spawns the processing loop. A consumer can only be started once.
    pub fn start(&mut self) -> Result<JoinHandle<()>, DispatchError> {
        let mut receiver = self
            .receiver
            .take()
            .ok_or_else(|| DispatchError::AlreadyStarted(self.name.clone()))?;
        let handler = self.handler.clone();
        let stop = self.stop.clone();
        let name = self.name.clone();

        Ok(tokio::spawn(async move {
            debug!("Consumer {} started", name);
            loop {
                if stop.is_stopped() {
                    break;
                }
                let event = tokio::select! {
                    biased;
                    _ = stop.stopped() => break,
                    event = receiver.recv() => event,
                };
                let Some(event) = event else {
                    break;
                };
                if let Err(e) = handler.handle(event).await {
                    error!("Consumer {}: handler failed: {:#}", name, e);
                }
            }
            debug!("Consumer {} stopped", name);
        }))
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

/// Fans an event out to every subscribed consumer queue.
pub struct Producer<E> {
    subscribers: Mutex<Vec<ConsumerQueue<E>>>,
}

impl<E> Default for Producer<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> Producer<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, queue: ConsumerQueue<E>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.push(queue);
    }

    /// Delivers `event` to every live subscriber and returns how many got it.
    /// Subscribers whose consumer is gone are dropped.
    pub fn send(&self, event: &E) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|queue| match queue.push(event.clone()) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping subscriber: {}", e);
                false
            }
        });
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.len()
    }
}
