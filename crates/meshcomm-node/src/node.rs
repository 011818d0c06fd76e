//! Core Node struct and async event loop.
//!
//! The node owns the engine context and the runtime platform. Timer tasks,
//! the simulated stack and the console all post [`WorkItem`]s to one
//! queue; the loop feeds them to the engine one at a time, so every
//! transition runs to completion before the next event is looked at.
//!
//! Stack signals are delivered in arrival order. One that carries a payload
//! needs a pool buffer; while the pool is empty it waits, along with every
//! signal behind it, until some other event frees a buffer.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use meshcomm_commissioning::{
    BufferError, ButtonEvent, ButtonId, Indicator, NodeContext, TimerHandle, commissioning,
    dispatch,
};
use meshcomm_core::Status;

use crate::config::NodeConfig;
use crate::console::{self, ConsoleCommand};
use crate::error::NodeError;
use crate::platform::RuntimePlatform;

const WORK_QUEUE_DEPTH: usize = 256;

/// Work delivered to the event loop.
#[derive(Debug)]
pub enum WorkItem {
    /// A timer task's sleep ran out.
    TimerExpired(TimerHandle),
    /// The stack raised a signal; a non-empty payload is copied into a pool
    /// buffer on delivery.
    StackSignal {
        tag: u16,
        status: Status,
        payload: Vec<u8>,
    },
    Console(ConsoleCommand),
}

#[derive(Debug)]
struct PendingSignal {
    tag: u16,
    status: Status,
    payload: Vec<u8>,
}

/// Cloneable handle that asks a running node to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

/// A commissioning mesh node on the host runtime.
pub struct Node {
    config: NodeConfig,
    ctx: NodeContext,
    platform: RuntimePlatform,
    work_tx: mpsc::Sender<WorkItem>,
    work_rx: mpsc::Receiver<WorkItem>,
    signals: VecDeque<PendingSignal>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
    started: bool,
    console: Option<JoinHandle<()>>,
}

impl Node {
    /// Create a node from configuration.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let settings = config.settings()?;
        let (work_tx, work_rx) = mpsc::channel(WORK_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let platform = RuntimePlatform::new(&config, settings.role, work_tx.clone());

        Ok(Self {
            config,
            ctx: NodeContext::new(settings),
            platform,
            work_tx,
            work_rx,
            signals: VecDeque::new(),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            started: false,
            console: None,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The engine's state, for inspection.
    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        self.platform.board.indicator(indicator)
    }

    /// Buffers currently leased from the pool.
    pub fn buffers_outstanding(&self) -> usize {
        self.platform.pool.outstanding()
    }

    /// Stack signals waiting for a free buffer.
    pub fn signals_waiting(&self) -> usize {
        self.signals.len()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// A sender for injecting work, as the console does.
    pub fn work_sender(&self) -> mpsc::Sender<WorkItem> {
        self.work_tx.clone()
    }

    /// Configure the radio from the sleepy button and boot the stack.
    pub fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyRunning);
        }
        commissioning::configure_sleep(&mut self.ctx, &mut self.platform);
        self.platform.stack.boot();
        self.started = true;

        tracing::info!(
            role = ?self.ctx.settings.role,
            controller = self.ctx.settings.controller,
            channel = self.config.node.channel,
            buffers = self.platform.pool.capacity(),
            "node started"
        );
        Ok(())
    }

    /// Read operator commands from stdin.
    pub fn spawn_console(&mut self) {
        if self.console.is_none() {
            self.console = Some(console::spawn_reader(self.work_tx.clone()));
        }
    }

    /// Run the event loop until shutdown is requested.
    pub async fn run(&mut self) -> Result<(), NodeError> {
        if !self.started {
            return Err(NodeError::NotStarted);
        }

        tracing::info!("entering event loop");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received");
                    break;
                }

                item = self.work_rx.recv() => {
                    match item {
                        Some(item) => self.handle(item),
                        None => {
                            tracing::info!("work queue closed, exiting");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn handle(&mut self, item: WorkItem) {
        match item {
            WorkItem::TimerExpired(handle) => {
                if let Some(buf) = self.platform.expire(handle) {
                    dispatch::on_timer(&mut self.ctx, &mut self.platform, handle.purpose, buf);
                }
            }
            WorkItem::StackSignal {
                tag,
                status,
                payload,
            } => self.signals.push_back(PendingSignal {
                tag,
                status,
                payload,
            }),
            WorkItem::Console(command) => self.handle_console(command),
        }
        self.deliver_signals();
    }

    /// Hand queued stack signals to the engine, oldest first, until one
    /// needs a buffer the pool can't supply.
    fn deliver_signals(&mut self) {
        while let Some(next) = self.signals.front() {
            let buf = if next.payload.is_empty() {
                None
            } else {
                match self.platform.buffer_with(&next.payload) {
                    Ok(buf) => Some(buf),
                    Err(BufferError::Exhausted) => {
                        tracing::debug!(
                            tag = next.tag,
                            waiting = self.signals.len(),
                            "no buffer for stack signal, holding it"
                        );
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(tag = next.tag, "dropping stack signal: {e}");
                        self.signals.pop_front();
                        continue;
                    }
                }
            };

            let Some(signal) = self.signals.pop_front() else {
                return;
            };
            self.platform.stack.signal_delivered(signal.tag);
            dispatch::on_signal(
                &mut self.ctx,
                &mut self.platform,
                signal.tag,
                signal.status,
                buf,
            );
        }
    }

    fn handle_console(&mut self, command: ConsoleCommand) {
        match command {
            ConsoleCommand::Press(button) => self.press(button),
            ConsoleCommand::Release(button) => self.release(button),
            ConsoleCommand::Click(button) => {
                self.press(button);
                self.release(button);
            }
            ConsoleCommand::Leave { rejoin } => self.platform.stack.request_leave(rejoin),
            ConsoleCommand::Status => {
                tracing::info!(
                    state = self.ctx.state.as_str(),
                    peer = ?self.ctx.peer.get(),
                    sleepy = self.ctx.sleep_capable,
                    buffers_outstanding = self.platform.pool.outstanding(),
                    "status"
                );
            }
            ConsoleCommand::Quit => self.trigger_shutdown(),
        }
    }

    fn press(&mut self, button: ButtonId) {
        self.platform.board.press(button);
        dispatch::on_button(&mut self.ctx, &mut self.platform, ButtonEvent::pressed(button));
    }

    fn release(&mut self, button: ButtonId) {
        self.platform.board.release(button);
        dispatch::on_button(&mut self.ctx, &mut self.platform, ButtonEvent::released(button));
    }

    /// Signal the node to shut down.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop the console and every timer.
    pub async fn shutdown(mut self) {
        tracing::info!("shutting down node");
        self.trigger_shutdown();

        if let Some(console) = self.console.take() {
            console.abort();
            let _ = console.await;
        }
        self.platform.shutdown();

        tracing::info!(
            state = self.ctx.state.as_str(),
            buffers_outstanding = self.platform.pool.outstanding(),
            signals_pending = self.signals.len(),
            "node stopped"
        );
    }
}
