//! Runtime-format (`.json`) room documents.
//!
//! Field names match the JSON keys the engine reads. Keys the reverse
//! translator must check for are `Option`s so their absence can be reported
//! as malformed input instead of a serde error. Keys that are not modelled
//! are kept in each struct's `extra` map and written back unchanged.

use crate::error::MapError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Unmodelled keys of a JSON object.
pub type JsonMap = serde_json::Map<String, JsonValue>;

pub(crate) const DEFAULT_VERSION: &str = "1.10";
pub(crate) const DEFAULT_TILED_VERSION: &str = "1.11.2";
pub(crate) const DEFAULT_ORIENTATION: &str = "orthogonal";
pub(crate) const DEFAULT_RENDER_ORDER: &str = "right-down";
pub(crate) const DEFAULT_DRAW_ORDER: &str = "topdown";
const DEFAULT_COLOR: &str = "#000000";

fn default_compression() -> i32 {
    -1
}
fn default_true() -> bool {
    true
}
fn one() -> f64 {
    1.0
}
fn default_color() -> String {
    DEFAULT_COLOR.to_owned()
}
fn default_map_type() -> String {
    "map".to_owned()
}
fn default_version() -> String {
    DEFAULT_VERSION.to_owned()
}
fn default_tiled_version() -> String {
    DEFAULT_TILED_VERSION.to_owned()
}
fn default_orientation() -> String {
    DEFAULT_ORIENTATION.to_owned()
}
fn default_render_order() -> String {
    DEFAULT_RENDER_ORDER.to_owned()
}
fn default_draw_order() -> String {
    DEFAULT_DRAW_ORDER.to_owned()
}
fn default_csv() -> String {
    "csv".to_owned()
}
fn default_string_type() -> String {
    "string".to_owned()
}

/// Root of a runtime room document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDocument {
    #[serde(default = "default_compression")]
    pub compressionlevel: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub infinite: bool,
    #[serde(default)]
    pub layers: Vec<RoomLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextlayerid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nextobjectid: Option<u32>,
    #[serde(default = "default_orientation")]
    pub orientation: String,
    #[serde(default = "default_render_order")]
    pub renderorder: String,
    #[serde(default = "default_tiled_version")]
    pub tiledversion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tileheight: Option<u32>,
    #[serde(default)]
    pub tilesets: Vec<RoomTileset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilewidth: Option<u32>,
    #[serde(rename = "type", default = "default_map_type")]
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default = "default_color")]
    pub backgroundcolor: String,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl Default for RoomDocument {
    fn default() -> Self {
        RoomDocument {
            compressionlevel: default_compression(),
            height: None,
            infinite: false,
            layers: Vec::new(),
            nextlayerid: None,
            nextobjectid: None,
            orientation: default_orientation(),
            renderorder: default_render_order(),
            tiledversion: default_tiled_version(),
            tileheight: None,
            tilesets: Vec::new(),
            tilewidth: None,
            kind: default_map_type(),
            version: default_version(),
            width: None,
            backgroundcolor: default_color(),
            extra: JsonMap::new(),
        }
    }
}

impl RoomDocument {
    /// Parse a room from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, MapError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_json_string(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTileset {
    pub firstgid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

const TILE_LAYER_TAG: &str = "tilelayer";
const OBJECT_GROUP_TAG: &str = "objectgroup";

/// Layers are tagged by their `type` key.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomLayer {
    Tiles(RoomTileLayer),
    Objects(RoomObjectGroup),
    /// Image layers, groups and anything else the pipeline does not handle,
    /// kept verbatim
    Other(JsonValue),
}

impl RoomLayer {
    /// Layer name; layers the pipeline does not handle report none.
    pub fn name(&self) -> Option<&str> {
        match self {
            RoomLayer::Tiles(l) => Some(l.name.as_str()),
            RoomLayer::Objects(g) => Some(g.name.as_str()),
            RoomLayer::Other(_) => None,
        }
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    #[serde(rename = "type")]
    tag: &'static str,
    #[serde(flatten)]
    layer: &'a T,
}

impl Serialize for RoomLayer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RoomLayer::Tiles(layer) => Tagged {
                tag: TILE_LAYER_TAG,
                layer,
            }
            .serialize(serializer),
            RoomLayer::Objects(layer) => Tagged {
                tag: OBJECT_GROUP_TAG,
                layer,
            }
            .serialize(serializer),
            RoomLayer::Other(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RoomLayer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = JsonValue::deserialize(deserializer)?;
        let tag = raw.get("type").and_then(JsonValue::as_str).map(str::to_owned);
        let known = matches!(tag.as_deref(), Some(TILE_LAYER_TAG | OBJECT_GROUP_TAG));
        if !known {
            return Ok(RoomLayer::Other(raw));
        }
        if let JsonValue::Object(fields) = &mut raw {
            fields.remove("type");
        }
        let layer = if tag.as_deref() == Some(TILE_LAYER_TAG) {
            serde_json::from_value(raw).map(RoomLayer::Tiles)
        } else {
            serde_json::from_value(raw).map(RoomLayer::Objects)
        };
        layer.map_err(serde::de::Error::custom)
    }
}

/// Tile data is CSV text when `encoding` is `csv`; plain Tiled exports use a
/// JSON array of GIDs instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomTileData {
    Csv(String),
    Gids(Vec<u32>),
}

impl Default for RoomTileData {
    fn default() -> Self {
        RoomTileData::Csv(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTileLayer {
    #[serde(default)]
    pub data: RoomTileData,
    #[serde(default = "default_csv")]
    pub encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub offsetx: f64,
    #[serde(default)]
    pub offsety: f64,
    #[serde(default = "one")]
    pub parallaxx: f64,
    #[serde(default = "one")]
    pub parallaxy: f64,
    #[serde(default = "default_color")]
    pub tintcolor: String,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl RoomTileLayer {
    /// A CSV layer carrying the runtime defaults for every display field.
    pub fn new(id: u32, name: impl Into<String>, width: u32, height: u32, csv: String) -> Self {
        RoomTileLayer {
            data: RoomTileData::Csv(csv),
            encoding: default_csv(),
            height: Some(height),
            id: Some(id),
            name: name.into(),
            opacity: 1.0,
            visible: true,
            width: Some(width),
            x: 0,
            y: 0,
            offsetx: 0.0,
            offsety: 0.0,
            parallaxx: 1.0,
            parallaxy: 1.0,
            tintcolor: default_color(),
            extra: JsonMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomObjectGroup {
    #[serde(default = "default_draw_order")]
    pub draworder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objects: Vec<RoomObject>,
    #[serde(default = "one")]
    pub opacity: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomObject {
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub properties: Vec<RoomProperty>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomProperty {
    pub name: String,
    #[serde(rename = "type", default = "default_string_type")]
    pub kind: String,
    /// Text when produced by the converter; hand-edited rooms may hold
    /// JSON numbers or booleans here.
    #[serde(default)]
    pub value: JsonValue,
}

impl RoomProperty {
    /// The value as the text the authoring format stores.
    pub fn value_text(&self) -> String {
        match &self.value {
            JsonValue::Null => String::new(),
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
