use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use groundlink_frame::{ids, DialectMessage, MavCodec, RawPacket};
use groundlink_transport::LinkStream;
use mavlink::ardupilotmega::{
    MavFrame, MavParamType, PositionTargetTypemask, PARAM_REQUEST_LIST_DATA, PARAM_SET_DATA,
    SET_POSITION_TARGET_LOCAL_NED_DATA,
};
use num_traits::FromPrimitive;
use serde::Serialize;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::command::{
    build_command, request_message, resolve_command, CommandNamespace, CommandParams,
    CommandShape,
};
use crate::config::LinkConfig;
use crate::connector::Connector;
use crate::error::{LinkError, Result};
use crate::ingest::decode_entry;
use crate::log_buffer::{LogBuffer, LogEntry};
use crate::mission::{MissionPlan, MissionSink, MissionUploader};

/// Width of the PARAM_SET parameter id field.
pub const PARAM_ID_LEN: usize = 16;

/// SET_POSITION_TARGET_LOCAL_NED mask: position only. Velocity,
/// acceleration, yaw and yaw rate are ignored.
pub const POSITION_ONLY_MASK: u16 = 0b0000_1101_1111_1000;

/// Telemetry requested by [`LinkManager::request_status`], in send order.
pub const STATUS_MESSAGES: [u32; 4] = [
    ids::GLOBAL_POSITION_INT,
    ids::GPS_RAW_INT,
    ids::MISSION_CURRENT,
    ids::BATTERY_STATUS,
];

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
        }
    }
}

type FrameSink = FramedWrite<WriteHalf<LinkStream>, MavCodec>;
type FrameSource = FramedRead<ReadHalf<LinkStream>, MavCodec>;

struct Writer {
    generation: u64,
    sink: FrameSink,
}

struct ReconnectTimer {
    id: u64,
    handle: JoinHandle<()>,
}

struct LinkInner {
    state: LinkState,
    online: bool,
    /// Bumped for every attached transport. Reader notifications carrying an
    /// older generation are ignored.
    generation: u64,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<ReconnectTimer>,
    next_timer_id: u64,
    opens: u64,
}

struct Shared<C> {
    connector: C,
    config: LinkConfig,
    logs: LogBuffer,
    inner: Mutex<LinkInner>,
    writer: tokio::sync::Mutex<Option<Writer>>,
}

/// Owner of the single vehicle link.
///
/// Cloning yields another handle to the same link. At most one transport is
/// open at a time and at most one reconnect timer is pending.
pub struct LinkManager<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for LinkManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for LinkManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LinkManager")
            .field("link", &self.shared.connector.describe())
            .field("state", &inner.state)
            .field("online", &inner.online)
            .field("reconnect_pending", &inner.reconnect.is_some())
            .finish()
    }
}

impl<C: Connector> LinkManager<C> {
    /// Create a manager. Nothing is opened until [`ensure_connected`](Self::ensure_connected).
    pub fn new(connector: C, config: LinkConfig) -> Self {
        let logs = LogBuffer::with_capacity(config.log_capacity);
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                logs,
                inner: Mutex::new(LinkInner {
                    state: LinkState::Disconnected,
                    online: false,
                    generation: 0,
                    reader: None,
                    reconnect: None,
                    next_timer_id: 0,
                    opens: 0,
                }),
                writer: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.shared.config
    }

    pub fn connector(&self) -> &C {
        &self.shared.connector
    }

    pub fn state(&self) -> LinkState {
        self.lock().state
    }

    /// Connected and at least one registered frame seen since the last
    /// (re)connect.
    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    pub fn is_connecting(&self) -> bool {
        self.lock().state == LinkState::Connecting
    }

    /// Whether a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.lock().reconnect.is_some()
    }

    /// Number of transports opened so far.
    pub fn opens(&self) -> u64 {
        self.lock().opens
    }

    /// Take every log entry not yet returned by a previous drain.
    pub fn drain_unread(&self) -> Vec<LogEntry> {
        self.shared.logs.drain_unread()
    }

    pub fn latest_entry(&self) -> Option<LogEntry> {
        self.shared.logs.latest()
    }

    pub fn log_len(&self) -> usize {
        self.shared.logs.len()
    }

    pub fn unread_len(&self) -> usize {
        self.shared.logs.unread_len()
    }

    /// The retained log, oldest first.
    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.shared.logs.snapshot()
    }

    /// Open the link unless it is already open or being opened.
    ///
    /// On failure a reconnect is scheduled and the error is returned; the
    /// open is never retried synchronously. An open overtaken by
    /// [`disconnect`](Self::disconnect) closes its stream and returns
    /// [`LinkError::NotReady`] without touching the link.
    pub async fn ensure_connected(&self) -> Result<()> {
        let epoch = {
            let mut inner = self.lock();
            match inner.state {
                LinkState::Connected | LinkState::Connecting => return Ok(()),
                LinkState::Disconnected => {
                    inner.state = LinkState::Connecting;
                    inner.online = false;
                    inner.generation
                }
            }
        };
        let guard = ConnectingGuard {
            shared: &self.shared,
            epoch,
            armed: true,
        };

        self.teardown().await;

        debug!(link = %self.shared.connector.describe(), "opening link");
        match self.shared.connector.connect().await {
            Ok(stream) => {
                let attached = self.attach(stream, epoch).await;
                guard.disarm();
                attached
            }
            Err(err) => {
                warn!(link = %self.shared.connector.describe(), error = %err, "link open failed");
                guard.disarm();
                let mut inner = self.lock();
                if inner.generation == epoch && inner.state == LinkState::Connecting {
                    inner.state = LinkState::Disconnected;
                    self.schedule_reconnect(&mut inner);
                }
                Err(err.into())
            }
        }
    }

    /// Close the link and cancel any pending reconnect. No new timer is armed.
    pub async fn disconnect(&self) {
        {
            let mut inner = self.lock();
            if let Some(timer) = inner.reconnect.take() {
                timer.handle.abort();
            }
            inner.state = LinkState::Disconnected;
            inner.online = false;
            inner.generation += 1;
        }
        self.teardown().await;
        info!(link = %self.shared.connector.describe(), "link closed");
    }

    /// Request position, GPS, mission-current and battery telemetry, one
    /// awaited request each. Does nothing while the link is down.
    pub async fn request_status(&self) -> Result<()> {
        if self.state() != LinkState::Connected {
            debug!("status request skipped, link down");
            return Ok(());
        }
        let config = &self.shared.config;
        for id in STATUS_MESSAGES {
            debug!(message = ids::id_name(id), "requesting message");
            self.send_message(request_message(
                id,
                config.target_system,
                config.target_component,
            ))
            .await?;
        }
        Ok(())
    }

    /// Ask the vehicle for its full parameter list. Values arrive as
    /// PARAM_VALUE frames in the log.
    pub async fn request_parameters(&self) -> Result<()> {
        let config = &self.shared.config;
        self.send_message(DialectMessage::PARAM_REQUEST_LIST(PARAM_REQUEST_LIST_DATA {
            target_system: config.target_system,
            target_component: config.target_component,
        }))
        .await
    }

    /// Set parameter `id` to `value`. `param_type` is a MAV_PARAM_TYPE code.
    pub async fn write_parameter(&self, id: &str, value: f32, param_type: u8) -> Result<()> {
        let param_id = param_id_field(id)?;
        let param_type =
            MavParamType::from_u8(param_type).ok_or(LinkError::InvalidParamType(param_type))?;
        let config = &self.shared.config;
        self.send_message(DialectMessage::PARAM_SET(PARAM_SET_DATA {
            param_value: value,
            target_system: config.target_system,
            target_component: config.target_component,
            param_id,
            param_type,
        }))
        .await
    }

    /// Send command `name` from `namespace` with the given wire shape.
    ///
    /// The name and parameters are validated before anything is written.
    pub async fn send_command(
        &self,
        name: &str,
        params: &CommandParams,
        namespace: CommandNamespace,
        shape: CommandShape,
    ) -> Result<()> {
        let command = resolve_command(name, namespace)?;
        let config = &self.shared.config;
        debug!(command = name, %namespace, ?shape, "sending command");
        let message = build_command(
            command,
            params,
            shape,
            config.target_system,
            config.target_component,
        )?;
        self.send_message(message).await
    }

    /// Upload `plan` with the fixed mission cadence.
    pub async fn upload_mission(&self, plan: &MissionPlan) -> Result<()> {
        self.ready()?;
        info!(items = plan.len(), "uploading mission");
        self.uploader().upload(self, plan).await
    }

    pub async fn clear_mission(&self) -> Result<()> {
        self.uploader().clear_all(self).await
    }

    /// Fly to a local NED position, metres from the EKF origin.
    pub async fn set_local_position_target(&self, x: f32, y: f32, z: f32) -> Result<()> {
        let config = &self.shared.config;
        self.send_message(DialectMessage::SET_POSITION_TARGET_LOCAL_NED(
            SET_POSITION_TARGET_LOCAL_NED_DATA {
                time_boot_ms: 0,
                x,
                y,
                z,
                target_system: config.target_system,
                target_component: config.target_component,
                coordinate_frame: MavFrame::MAV_FRAME_LOCAL_NED,
                type_mask: PositionTargetTypemask::from_bits_truncate(POSITION_ONLY_MASK),
                ..SET_POSITION_TARGET_LOCAL_NED_DATA::default()
            },
        ))
        .await
    }

    /// Write one message to the open link.
    pub async fn send_message(&self, message: DialectMessage) -> Result<()> {
        let generation = self.ready()?;
        let mut writer = self.shared.writer.lock().await;
        let Some(writer) = writer.as_mut().filter(|w| w.generation == generation) else {
            return Err(LinkError::NotReady);
        };
        writer.sink.send(message).await.map_err(|err| {
            warn!(error = %err, "write failed");
            LinkError::Write(err)
        })
    }

    fn ready(&self) -> Result<u64> {
        let inner = self.lock();
        if inner.state == LinkState::Connected {
            Ok(inner.generation)
        } else {
            Err(LinkError::NotReady)
        }
    }

    fn uploader(&self) -> MissionUploader {
        let config = &self.shared.config;
        MissionUploader::new(
            config.target_system,
            config.target_component,
            config.mission_item_delay,
        )
    }

    fn lock(&self) -> MutexGuard<'_, LinkInner> {
        self.shared.lock()
    }

    /// Install `stream` as the open link if the open that produced it,
    /// started at generation `epoch`, is still the current one.
    async fn attach(&self, mut stream: LinkStream, epoch: u64) -> Result<()> {
        let config = &self.shared.config;
        let kind = stream.kind();
        let codec = MavCodec::new(config.protocol, config.system_id, config.component_id);

        // Lock order: writer, then inner.
        let mut writer = self.shared.writer.lock().await;
        let attached = {
            let mut inner = self.lock();
            if inner.generation != epoch || inner.state != LinkState::Connecting {
                None
            } else {
                inner.generation += 1;
                let generation = inner.generation;
                inner.state = LinkState::Connected;
                inner.online = false;
                inner.opens += 1;
                if let Some(timer) = inner.reconnect.take() {
                    debug!(timer = timer.id, "cancelling pending reconnect");
                    timer.handle.abort();
                }
                Some((generation, inner.reader.take()))
            }
        };
        let Some((generation, stale_reader)) = attached else {
            drop(writer);
            debug!(epoch, "open superseded, closing its stream");
            stream.close().await;
            return Err(LinkError::NotReady);
        };
        if let Some(reader) = stale_reader {
            reader.abort();
        }

        let (read_half, write_half) = tokio::io::split(stream);
        let replaced = writer.replace(Writer {
            generation,
            sink: FramedWrite::new(write_half, codec.clone()),
        });
        drop(writer);

        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.shared),
            generation,
            FramedRead::new(read_half, codec),
        ));
        {
            let mut inner = self.lock();
            if inner.generation == generation {
                if let Some(old) = inner.reader.replace(reader) {
                    old.abort();
                }
            } else {
                reader.abort();
            }
        }
        info!(link = %self.shared.connector.describe(), kind, generation, "link connected");

        if let Some(mut stale) = replaced {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, stale.sink.close()).await;
        }
        Ok(())
    }

    /// Stop the reader and close the transport. Errors are swallowed.
    async fn teardown(&self) {
        let reader = self.lock().reader.take();
        if let Some(reader) = reader {
            reader.abort();
        }
        let writer = self.shared.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match tokio::time::timeout(CLOSE_TIMEOUT, writer.sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => debug!(error = %err, "ignoring close error"),
                Err(_) => debug!("transport close timed out"),
            }
        }
    }

    async fn on_link_lost(&self, generation: u64, reason: &str) {
        {
            let mut inner = self.lock();
            if inner.generation != generation || inner.state != LinkState::Connected {
                debug!(generation, "ignoring loss of a replaced link");
                return;
            }
            inner.state = LinkState::Disconnected;
            inner.online = false;
            inner.reader = None;
            warn!(link = %self.shared.connector.describe(), reason, "link lost");
            self.schedule_reconnect(&mut inner);
        }

        let mut writer = self.shared.writer.lock().await;
        if writer.as_ref().is_some_and(|w| w.generation == generation) {
            if let Some(mut stale) = writer.take() {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, stale.sink.close()).await;
            }
        }
    }

    /// Arm the reconnect timer unless one is already pending.
    fn schedule_reconnect(&self, inner: &mut LinkInner) {
        if inner.reconnect.is_some() {
            debug!("reconnect already pending");
            return;
        }
        inner.next_timer_id += 1;
        let id = inner.next_timer_id;
        let delay = self.shared.config.reconnect_delay;
        let shared = Arc::downgrade(&self.shared);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                LinkManager { shared }.reconnect_fired(id).await;
            }
        });
        inner.reconnect = Some(ReconnectTimer { id, handle });
        warn!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
    }

    async fn reconnect_fired(&self, id: u64) {
        {
            let mut inner = self.lock();
            match &inner.reconnect {
                Some(timer) if timer.id == id => inner.reconnect = None,
                _ => {
                    debug!(timer = id, "stale reconnect timer");
                    return;
                }
            }
            if inner.state != LinkState::Disconnected {
                debug!(timer = id, state = %inner.state, "reconnect not needed");
                return;
            }
        }
        info!(link = %self.shared.connector.describe(), "reconnecting");
        if let Err(err) = self.ensure_connected().await {
            debug!(error = %err, "reconnect attempt failed");
        }
    }
}

#[async_trait::async_trait]
impl<C: Connector> MissionSink for LinkManager<C> {
    async fn send_message(&self, message: DialectMessage) -> Result<()> {
        LinkManager::send_message(self, message).await
    }
}

impl<C> Shared<C> {
    fn lock(&self) -> MutexGuard<'_, LinkInner> {
        // State transitions complete before any await, so a poisoned lock
        // still holds consistent state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ingest(&self, generation: u64, packet: &RawPacket) {
        let Some(entry) = decode_entry(packet, Utc::now()) else {
            return;
        };
        // Held across the push so a frame from a replaced transport can never
        // land after the link has moved on.
        let mut inner = self.lock();
        if inner.generation != generation || inner.state != LinkState::Connected {
            debug!(generation, "dropping frame from a replaced link");
            return;
        }
        self.logs.push(entry);
        if !inner.online {
            inner.online = true;
            info!("vehicle online");
        }
    }
}

/// Resets `Connecting` if an open is abandoned midway, unless the link has
/// moved past the generation the open started from.
struct ConnectingGuard<'a, C> {
    shared: &'a Shared<C>,
    epoch: u64,
    armed: bool,
}

impl<C> ConnectingGuard<'_, C> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<C> Drop for ConnectingGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.shared.lock();
            if inner.generation == self.epoch && inner.state == LinkState::Connecting {
                inner.state = LinkState::Disconnected;
            }
        }
    }
}

async fn read_loop<C: Connector>(shared: Weak<Shared<C>>, generation: u64, mut frames: FrameSource) {
    let reason = loop {
        match frames.next().await {
            Some(Ok(packet)) => match shared.upgrade() {
                Some(shared) => shared.ingest(generation, &packet),
                None => return,
            },
            Some(Err(err)) => break err.to_string(),
            None => break "transport closed".to_string(),
        }
    };
    if let Some(shared) = shared.upgrade() {
        LinkManager { shared }.on_link_lost(generation, &reason).await;
    }
}

/// Zero-pad `id` into the fixed-width parameter id field.
pub fn param_id_field(id: &str) -> Result<[u8; PARAM_ID_LEN]> {
    let bytes = id.as_bytes();
    if bytes.len() > PARAM_ID_LEN {
        return Err(LinkError::ParamIdTooLong(id.to_string()));
    }
    let mut field = [0u8; PARAM_ID_LEN];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_id_is_null_padded() {
        let field = param_id_field("ROLL_LIMIT").unwrap();
        assert_eq!(&field[..10], b"ROLL_LIMIT");
        assert_eq!(&field[10..], &[0u8; 6]);
    }

    #[test]
    fn param_id_of_exactly_sixteen_bytes_fits() {
        let field = param_id_field("SERIAL1_PROTOCOL").unwrap();
        assert_eq!(&field, b"SERIAL1_PROTOCOL");
    }

    #[test]
    fn long_param_id_is_rejected() {
        let err = param_id_field("SERIAL1_PROTOCOL2").unwrap_err();
        assert!(matches!(err, LinkError::ParamIdTooLong(id) if id == "SERIAL1_PROTOCOL2"));
    }

    #[test]
    fn position_mask_keeps_only_position() {
        // Bits 0..=2 are x/y/z; everything else the controller may use is set.
        assert_eq!(POSITION_ONLY_MASK & 0b111, 0);
        assert_eq!(POSITION_ONLY_MASK & 0b1_1111_1000, 0b1_1111_1000);
        assert_eq!(POSITION_ONLY_MASK & (1 << 10), 1 << 10);
        assert_eq!(POSITION_ONLY_MASK & (1 << 11), 1 << 11);
        assert_eq!(POSITION_ONLY_MASK, 3576);
    }

    #[test]
    fn state_display() {
        assert_eq!(LinkState::Connecting.to_string(), "connecting");
        assert_eq!(
            serde_json::to_string(&LinkState::Connected).unwrap(),
            "\"connected\""
        );
    }
}
