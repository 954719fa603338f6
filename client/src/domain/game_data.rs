//! The game's fixed data categories and their defaults.
//!
//! Field names on the wire follow the remote tables' column names.

use serde::{Deserialize, Deserializer, Serialize};

use super::{CategoryDescriptor, DataCategory};

/// Highest unlocked stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Stage number, starting at 1.
    #[serde(rename = "stagedata")]
    pub stage: u32,
}

/// Ids of unlocked items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedItems {
    /// Unlocked item ids; item `0` is owned from the start.
    #[serde(rename = "ItemList", default)]
    pub item_list: Vec<u32>,
}

/// On-screen controller layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerOptions {
    /// Distance of the stick from its anchor.
    #[serde(rename = "ControllerOffset")]
    pub offset: f32,
    /// Resting scale.
    #[serde(rename = "ControllerDefScale")]
    pub def_scale: f32,
    /// Scale while pressed.
    #[serde(rename = "ControllerMaxScale")]
    pub max_scale: f32,
    /// Opacity, `0.0` to `1.0`.
    #[serde(rename = "ControllerAlpha")]
    pub alpha: f32,
    /// Horizontal anchor position.
    #[serde(rename = "ControllerPosX")]
    pub pos_x: f32,
    /// Vertical anchor position.
    #[serde(rename = "ControllerPosY")]
    pub pos_y: f32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            offset: 0.0,
            def_scale: 1.0,
            max_scale: 1.5,
            alpha: 1.0,
            pos_x: 0.0,
            pos_y: 0.0,
        }
    }
}

/// In-app purchase flags.
///
/// The remote column stores the flag as the string `"true"`/`"false"`; both
/// that form and a JSON boolean are accepted on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseFlags {
    /// Whether the ad-removal purchase was made.
    #[serde(
        rename = "IAP",
        serialize_with = "bool_as_string",
        deserialize_with = "flexible_bool"
    )]
    pub ads_removed: bool,
}

/// Snapshot written by periodic saves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Whether the ad-removal purchase was made.
    #[serde(
        rename = "IAP",
        serialize_with = "bool_as_string",
        deserialize_with = "flexible_bool"
    )]
    pub ads_removed: bool,
    /// Gold held.
    #[serde(rename = "Gold")]
    pub gold: u64,
    /// Enemies defeated.
    #[serde(rename = "Kill")]
    pub kills: u64,
    /// Elapsed play time as reported by the game clock.
    #[serde(rename = "Time")]
    pub elapsed: String,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            ads_removed: false,
            gold: 0,
            kills: 0,
            elapsed: "0".to_owned(),
        }
    }
}

fn bool_as_string<S: serde::Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}

fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => Ok(value),
        // An unparsable string reads as `false`, matching how the flag was
        // always interpreted.
        Raw::Text(text) => Ok(text.trim().eq_ignore_ascii_case("true")),
    }
}

/// Stage progress category.
pub static STAGE: DataCategory<StageProgress> =
    DataCategory::new("stage", || StageProgress { stage: 1 });

/// Owned items category.
pub static ITEM: DataCategory<OwnedItems> = DataCategory::new("item", || OwnedItems {
    item_list: vec![0],
});

/// Controller options category.
pub static OPTION: DataCategory<ControllerOptions> =
    DataCategory::new("option", ControllerOptions::default);

/// Purchase flags category.
pub static IAP: DataCategory<PurchaseFlags> = DataCategory::new("iap", PurchaseFlags::default);

/// Player snapshot category; only ever saved, never loaded at login.
pub static PLAYER: DataCategory<PlayerSnapshot> =
    DataCategory::new("player", PlayerSnapshot::default);

/// The categories loaded after every successful login, in load order.
pub struct GameCatalog;

impl GameCatalog {
    /// Categories loaded after login.
    pub fn login_categories() -> [&'static dyn CategoryDescriptor; 4] {
        [&STAGE, &ITEM, &OPTION, &IAP]
    }
}
