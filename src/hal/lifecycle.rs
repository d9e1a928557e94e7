use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Device, Frame, MetadataField, StreamProfile};
use crate::core::StreamMonitor;

/// Streaming session states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    Started,
    Stopped,
}

/// One streaming session bound to a device and a profile.
///
/// Each `start` creates a fresh [`StreamMonitor`] fed by the device callback;
/// monitors are never carried over between starts.
pub struct StreamingSession<'d> {
    device: &'d mut dyn Device,
    profile: StreamProfile,
    state: SessionState,
    monitor: Option<Arc<StreamMonitor>>,
}

impl<'d> StreamingSession<'d> {
    pub fn new(device: &'d mut dyn Device, profile: StreamProfile) -> Self {
        Self {
            device,
            profile,
            state: SessionState::Closed,
            monitor: None,
        }
    }

    pub async fn open(&mut self) -> Result<()> {
        if self.state != SessionState::Closed {
            return Err(anyhow!("Cannot open session in state {:?}", self.state));
        }
        self.device.open(&self.profile).await?;
        self.state = SessionState::Open;
        debug!(device = self.device.name(), profile = %self.profile, "session opened");
        Ok(())
    }

    /// Start streaming, recording `field` from every delivered frame
    pub async fn start(&mut self, field: MetadataField) -> Result<Arc<StreamMonitor>> {
        if self.state != SessionState::Open && self.state != SessionState::Stopped {
            return Err(anyhow!("Cannot start session in state {:?}", self.state));
        }

        let monitor = Arc::new(StreamMonitor::new(field));
        let sink = Arc::clone(&monitor);
        self.device
            .start(Box::new(move |frame: Frame| sink.record(&frame)))
            .await?;

        self.state = SessionState::Started;
        self.monitor = Some(Arc::clone(&monitor));
        debug!(device = self.device.name(), "session started");
        Ok(monitor)
    }

    pub async fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Started {
            return Ok(()); // Already stopped
        }
        // Stopped even when the device complains: it is not delivering to us anymore
        self.state = SessionState::Stopped;
        self.device.stop().await
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Started {
            self.stop().await?;
        }
        if self.state != SessionState::Closed {
            self.state = SessionState::Closed;
            self.device.close().await?;
        }
        Ok(())
    }

    /// Best-effort stop and close. Device errors are logged and swallowed.
    pub async fn teardown(&mut self) {
        if let Err(e) = self.stop().await {
            warn!(device = self.device.name(), error = %e, "ignoring stop failure during teardown");
        }
        if let Err(e) = self.close().await {
            warn!(device = self.device.name(), error = %e, "ignoring close failure during teardown");
        }
    }

    pub fn device(&self) -> &dyn Device {
        &*self.device
    }

    pub fn profile(&self) -> &StreamProfile {
        &self.profile
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Monitor of the current (or most recent) start
    pub fn monitor(&self) -> Option<&Arc<StreamMonitor>> {
        self.monitor.as_ref()
    }
}
