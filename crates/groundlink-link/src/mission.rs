//! Mission plans and the fixed-cadence uploader.

use std::collections::BTreeMap;
use std::time::Duration;

use groundlink_frame::DialectMessage;
use mavlink::ardupilotmega::{
    MavCmd, MavFrame, MISSION_CLEAR_ALL_DATA, MISSION_COUNT_DATA, MISSION_ITEM_INT_DATA,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{resolve_command, CommandNamespace};
use crate::error::{LinkError, Result};

/// One waypoint or action of a mission plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    /// Command name, e.g. `NAV_WAYPOINT`. The `NAV_` prefix may be omitted.
    #[serde(rename = "type")]
    pub kind: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude relative to home, metres. Sent as 0 when unset.
    #[serde(default)]
    pub alt: Option<f32>,
    #[serde(default)]
    pub param1: Option<f32>,
    #[serde(default)]
    pub param2: Option<f32>,
    #[serde(default)]
    pub param3: Option<f32>,
    #[serde(default)]
    pub param4: Option<f32>,
}

impl MissionItem {
    /// Item of `kind` at `lat`/`lon` with every optional field unset.
    pub fn new(kind: impl Into<String>, lat: f64, lon: f64) -> Self {
        Self {
            kind: kind.into(),
            lat,
            lon,
            alt: None,
            param1: None,
            param2: None,
            param3: None,
            param4: None,
        }
    }

    /// Set the altitude.
    pub fn with_alt(mut self, alt: f32) -> Self {
        self.alt = Some(alt);
        self
    }
}

/// Mission items keyed by sequence index, iterated in ascending order.
///
/// In JSON the keys are decimal strings: `{"0": {...}, "1": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MissionPlan {
    items: BTreeMap<u16, MissionItem>,
}

impl MissionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the item at `index`.
    pub fn insert(&mut self, index: u16, item: MissionItem) -> Option<MissionItem> {
        self.items.insert(index, item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &MissionItem)> {
        self.items.iter().map(|(index, item)| (*index, item))
    }
}

impl FromIterator<(u16, MissionItem)> for MissionPlan {
    fn from_iter<T: IntoIterator<Item = (u16, MissionItem)>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Resolve a mission item type against the common command table.
///
/// `WAYPOINT` resolves to `NAV_WAYPOINT`; full names resolve as-is.
pub fn resolve_item_command(kind: &str) -> Option<MavCmd> {
    resolve_command(kind, CommandNamespace::Common)
        .or_else(|_| resolve_command(&format!("NAV_{kind}"), CommandNamespace::Common))
        .ok()
}

/// Degrees to the 1e7-scaled integer wire representation.
pub fn scale_degrees(degrees: f64) -> i32 {
    (degrees * 1e7).round() as i32
}

/// Where outbound mission messages go.
///
/// Implemented by the link manager; kept as a seam so upload sequencing can
/// be exercised without a transport.
#[async_trait::async_trait]
pub trait MissionSink: Send + Sync {
    async fn send_message(&self, message: DialectMessage) -> Result<()>;
}

/// Uploads a plan with fixed delays standing in for the vehicle's item
/// requests. No acknowledgement is awaited.
#[derive(Debug, Clone, Copy)]
pub struct MissionUploader {
    target_system: u8,
    target_component: u8,
    item_delay: Duration,
}

impl MissionUploader {
    pub fn new(target_system: u8, target_component: u8, item_delay: Duration) -> Self {
        Self {
            target_system,
            target_component,
            item_delay,
        }
    }

    /// Send MISSION_COUNT, then wait one item delay.
    pub async fn set_mission_count<S: MissionSink + ?Sized>(&self, sink: &S, count: u16) -> Result<()> {
        sink.send_message(DialectMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count,
            target_system: self.target_system,
            target_component: self.target_component,
            ..MISSION_COUNT_DATA::default()
        }))
        .await?;
        tokio::time::sleep(self.item_delay).await;
        Ok(())
    }

    /// Upload `plan`: the count, then every item in ascending index order,
    /// each preceded by one item delay and awaited before the next.
    ///
    /// Every item is validated before anything is sent.
    pub async fn upload<S: MissionSink + ?Sized>(&self, sink: &S, plan: &MissionPlan) -> Result<()> {
        let count = u16::try_from(plan.len()).map_err(|_| LinkError::InvalidMissionItem {
            index: u16::MAX,
            reason: format!("{} items exceed the mission size limit", plan.len()),
        })?;
        let messages = plan
            .iter()
            .map(|(index, item)| self.mission_item(index, item))
            .collect::<Result<Vec<_>>>()?;

        self.set_mission_count(sink, count).await?;
        for ((index, _), message) in plan.iter().zip(messages) {
            tokio::time::sleep(self.item_delay).await;
            debug!(index, "sending mission item");
            sink.send_message(message).await?;
        }
        Ok(())
    }

    /// Single MISSION_CLEAR_ALL, no delay.
    pub async fn clear_all<S: MissionSink + ?Sized>(&self, sink: &S) -> Result<()> {
        sink.send_message(DialectMessage::MISSION_CLEAR_ALL(MISSION_CLEAR_ALL_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            ..MISSION_CLEAR_ALL_DATA::default()
        }))
        .await
    }

    /// Build the MISSION_ITEM_INT for `item` at sequence `index`.
    pub fn mission_item(&self, index: u16, item: &MissionItem) -> Result<DialectMessage> {
        let command =
            resolve_item_command(&item.kind).ok_or_else(|| LinkError::InvalidMissionItem {
                index,
                reason: format!("unknown item type {:?}", item.kind),
            })?;
        if !(-90.0..=90.0).contains(&item.lat) {
            return Err(LinkError::InvalidMissionItem {
                index,
                reason: format!("latitude {} outside [-90, 90]", item.lat),
            });
        }
        if !(-180.0..=180.0).contains(&item.lon) {
            return Err(LinkError::InvalidMissionItem {
                index,
                reason: format!("longitude {} outside [-180, 180]", item.lon),
            });
        }

        Ok(DialectMessage::MISSION_ITEM_INT(MISSION_ITEM_INT_DATA {
            param1: item.param1.unwrap_or_default(),
            param2: item.param2.unwrap_or_default(),
            param3: item.param3.unwrap_or_default(),
            param4: item.param4.unwrap_or_default(),
            x: scale_degrees(item.lat),
            y: scale_degrees(item.lon),
            z: item.alt.unwrap_or_default(),
            seq: index,
            command,
            target_system: self.target_system,
            target_component: self.target_component,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
            current: u8::from(index == 0),
            autocontinue: 1,
            ..MISSION_ITEM_INT_DATA::default()
        }))
    }
}
