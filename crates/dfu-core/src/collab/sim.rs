//! Simulated update repository.
//!
//! Validates packages on disk with [`probe_archive`] and fakes the transfer
//! with a tokio task that walks through the status sequence a real DFU
//! engine reports. Used by the CLI and for end-to-end runs without hardware.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, instrument, warn};

use super::traits::{StatusStream, UpdateRepository};
use crate::model::{
    ArchiveHandle, DeviceHandle, EngineStatus, UpdateRequest, UploadProgress, probe_archive,
};

/// Number of progress reports per transfer, 0% included.
const PROGRESS_STEPS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Abort,
}

struct Transfer {
    control: watch::Sender<Control>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct SimState {
    archive: Option<ArchiveHandle>,
    device: Option<DeviceHandle>,
    transfer: Option<Transfer>,
}

pub struct SimulatedRepository {
    inner: Mutex<SimState>,
    statuses: broadcast::Sender<EngineStatus>,
    /// Delay between two reported statuses.
    step: Duration,
}

impl SimulatedRepository {
    pub fn new(step: Duration) -> Self {
        let (statuses, _) = broadcast::channel(256);
        Self {
            inner: Mutex::new(SimState::default()),
            statuses,
            step,
        }
    }

    /// Whether a transfer task is alive.
    pub fn is_transferring(&self) -> bool {
        self.inner
            .lock()
            .transfer
            .as_ref()
            .is_some_and(|t| !t.task.is_finished())
    }

    fn send_control(&self, control: Control) {
        match &self.inner.lock().transfer {
            Some(transfer) if !transfer.task.is_finished() => {
                transfer.control.send_replace(control);
            }
            _ => debug!(?control, "No transfer running"),
        }
    }
}

impl UpdateRepository for SimulatedRepository {
    fn set_archive(&self, uri: &str) -> Option<ArchiveHandle> {
        match probe_archive(uri) {
            Ok(archive) => {
                self.inner.lock().archive = Some(archive.clone());
                Some(archive)
            }
            Err(e) => {
                warn!(uri = %uri, error = %e, "Invalid update package");
                None
            }
        }
    }

    fn archive(&self) -> Option<ArchiveHandle> {
        self.inner.lock().archive.clone()
    }

    fn device(&self) -> Option<DeviceHandle> {
        self.inner.lock().device.clone()
    }

    fn set_device(&self, device: Option<DeviceHandle>) {
        self.inner.lock().device = device;
    }

    fn status_stream(&self) -> StatusStream {
        Box::pin(BroadcastStream::new(self.statuses.subscribe()).filter_map(Result::ok))
    }

    #[instrument(skip_all, fields(archive = %request.archive.name, device = %request.device))]
    fn start(&self, request: UpdateRequest) {
        let mut inner = self.inner.lock();
        if let Some(transfer) = &inner.transfer
            && !transfer.task.is_finished()
        {
            if *transfer.control.borrow() == Control::Pause {
                info!("Resuming transfer");
                transfer.control.send_replace(Control::Run);
            } else {
                debug!("Transfer already running");
            }
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let _ = self.statuses.send(EngineStatus::Failed {
                message: "no async runtime available".into(),
            });
            return;
        };

        info!("Starting simulated transfer");
        let (control, control_rx) = watch::channel(Control::Run);
        let task = runtime.spawn(run_transfer(
            request,
            self.statuses.clone(),
            control_rx,
            self.step,
        ));
        inner.transfer = Some(Transfer { control, task });
    }

    fn pause(&self) {
        self.send_control(Control::Pause);
    }

    fn stop(&self) {
        self.send_control(Control::Abort);
    }

    fn release(&self) {
        let mut inner = self.inner.lock();
        if let Some(transfer) = inner.transfer.take() {
            transfer.task.abort();
        }
        inner.archive = None;
        inner.device = None;
    }
}

async fn run_transfer(
    request: UpdateRequest,
    statuses: broadcast::Sender<EngineStatus>,
    mut control: watch::Receiver<Control>,
    step: Duration,
) {
    let emit = |status: EngineStatus| {
        let _ = statuses.send(status);
    };

    for status in [
        EngineStatus::Connecting,
        EngineStatus::Connected,
        EngineStatus::Starting,
        EngineStatus::EnablingDfuMode,
        EngineStatus::Started,
    ] {
        emit(status);
        if !pace(&mut control, step).await {
            emit(EngineStatus::Aborted);
            return;
        }
    }

    let chunk = request.archive.size.div_ceil(u64::from(PROGRESS_STEPS));
    let step_ms = step.as_millis().max(1) as u64;
    let speed_bps = u32::try_from(chunk * 1000 / step_ms).unwrap_or(u32::MAX);
    for i in 0..=PROGRESS_STEPS {
        emit(EngineStatus::Uploading(UploadProgress {
            percent: i * (100 / PROGRESS_STEPS),
            speed_bps,
            avg_speed_bps: speed_bps,
            current_part: 1,
            parts_total: 1,
        }));
        if !pace(&mut control, step).await {
            emit(EngineStatus::Aborted);
            return;
        }
    }

    for status in [
        EngineStatus::Validating,
        EngineStatus::Disconnecting,
        EngineStatus::Disconnected,
    ] {
        emit(status);
        tokio::time::sleep(step).await;
    }
    emit(EngineStatus::Completed);
}

/// Wait one step, holding while paused. `false` once aborted.
async fn pace(control: &mut watch::Receiver<Control>, step: Duration) -> bool {
    tokio::time::sleep(step).await;
    loop {
        let current = *control.borrow_and_update();
        match current {
            Control::Run => return true,
            Control::Abort => return false,
            Control::Pause => {}
        }
        if control.changed().await.is_err() {
            return false;
        }
    }
}
